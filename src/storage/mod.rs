pub mod codec;
pub mod file_lock;
pub mod format;
pub mod index_reader;
pub mod index_writer;
pub mod layout;

pub use format::TableKind;
pub use index_reader::IndexReader;
pub use index_writer::IndexWriter;
pub use layout::IndexLayout;
