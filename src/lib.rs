pub mod core;
pub mod index;
pub mod compression;
pub mod storage;
pub mod analysis;
pub mod parallel;
pub mod filter;
pub mod query;
pub mod search;

/*
┌──────────────────────────────────── BUILD (gln_index) ─────────────────────────────────────┐
│                                                                                            │
│  filter::walk ──► PathClassifier ──► Scheduler ──► ThreadWorker × N (FileTokenizer)        │
│   (ignore)        (rules | cmd)        │  ▲            "path\n" ──►                         │
│                                        │  └── "token count\n" ... " DONE\n" / " SKIP\n"     │
│                                        ▼                                                   │
│                         TokenSet / FilenameSet  (ChainedHashSet arenas)                    │
│                                        │                                                   │
│                            StopwordDetector (optional)                                     │
│                                        ▼                                                   │
│          IndexWriter: one compressed blob per bucket ──► .gln/fname.db  .gln/token.db      │
│                                                          .gln/tokens  settings  timestamp  │
└────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── QUERY (gln) ───────────────────────────────────────────┐
│                                                                                            │
│  Query::from_terms ──► VocabularyMatcher ──► token hashes                                  │
│                                                  │                                         │
│                              IndexReader(token.db).lookup_tokens ──► per-clause HashArray  │
│                                                  │                                         │
│                     fold: AND/NEAR ∩   OR ∪   NOT −   (strictly left to right)              │
│                                                  │                                         │
│                              IndexReader(fname.db).lookup_filenames ──► paths              │
│                                                  │                                         │
│                                   GrepPipeline (batches of 100) ──► matching lines         │
└────────────────────────────────────────────────────────────────────────────────────────────┘
*/
