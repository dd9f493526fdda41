pub mod chunker;
pub mod indexer;
pub mod watcher;

pub use chunker::chunk_file;
pub use indexer::{IndexOutcome, Indexer};
pub use watcher::{FileEvent, FileWatcher, ShutdownMarker, WatchMessage};
