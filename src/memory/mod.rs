//! In-process collaborators for the demo binary and tests.

mod extractor;
mod progress_stream;
mod publisher;
mod storage;

pub use extractor::MemoryFrameExtractor;
pub use progress_stream::ProgressStream;
pub use publisher::{MemoryPublisher, RecordingNavigator};
pub use storage::{MemoryStorage, DEFAULT_CHUNK_SIZE};
