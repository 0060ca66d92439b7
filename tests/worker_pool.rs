use std::fs;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use tempfile::TempDir;

use glean::analysis::tokenizer::FileTokenizer;
use glean::core::types::hash_word;
use glean::index::filename::FilenameSet;
use glean::index::token::TokenSet;
use glean::parallel::scheduler::Scheduler;
use glean::parallel::worker::spawn_pool;

const WORDS: [&str; 8] = ["north", "south", "east", "west", "river", "hill", "forest", "plain"];

#[test]
fn every_file_is_tokenized_once() {
    let dir = TempDir::new().unwrap();
    let mut rng = rand::thread_rng();
    let mut expected = vec![0u64; WORDS.len()];
    let mut paths = Vec::new();

    for i in 0..60 {
        let mut text = String::new();
        for _ in 0..rng.gen_range(1..400) {
            let w = rng.gen_range(0..WORDS.len());
            expected[w] += 1;
            text.push_str(WORDS[w]);
            text.push(if rng.gen_bool(0.1) { '\n' } else { ' ' });
        }
        let path = dir.path().join(format!("file{:02}.txt", i));
        fs::write(&path, text).unwrap();
        paths.push(path.to_string_lossy().into_owned());
    }
    paths.shuffle(&mut rng);

    let pool = spawn_pool(3, &FileTokenizer::default(), Duration::from_secs(30)).unwrap();
    assert_eq!(pool.iter().map(|w| w.id()).collect::<Vec<_>>(), vec![0, 1, 2]);
    let mut sched = Scheduler::new(pool, Duration::from_millis(5));
    for p in &paths {
        sched.enqueue(p.clone());
    }
    let (mut tokens, mut names) = (TokenSet::new(), FilenameSet::new());
    let outcome = sched.run(&mut tokens, &mut names).unwrap();
    sched.shutdown().unwrap();

    assert_eq!(outcome.assigned, paths.len());
    assert_eq!(outcome.indexed, paths.len());
    assert_eq!(names.len(), paths.len());
    for (w, word) in WORDS.iter().enumerate() {
        if expected[w] == 0 {
            continue;
        }
        let token = tokens.get(word).unwrap();
        assert_eq!(token.count, expected[w], "{}", word);
        for f in token.files.iter() {
            assert!(paths.iter().any(|p| hash_word(p) == f));
        }
    }
}

#[test]
fn unreadable_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    let present = dir.path().join("here.txt");
    fs::write(&present, "lantern lantern").unwrap();
    let missing = dir.path().join("gone.txt");

    let pool = spawn_pool(2, &FileTokenizer::default(), Duration::from_secs(30)).unwrap();
    let mut sched = Scheduler::new(pool, Duration::from_millis(5));
    sched.enqueue(missing.to_string_lossy().into_owned());
    sched.enqueue(present.to_string_lossy().into_owned());

    let (mut tokens, mut names) = (TokenSet::new(), FilenameSet::new());
    let outcome = sched.run(&mut tokens, &mut names).unwrap();
    sched.shutdown().unwrap();

    assert_eq!((outcome.indexed, outcome.skipped), (1, 1));
    assert_eq!(tokens.get("lantern").unwrap().count, 2);
    assert!(names.contains(&present.to_string_lossy()));
}
