mod coordinator;
mod errors;
mod paths;
mod progress;
mod session;
mod traits;
mod types;
mod worker;

pub use coordinator::{
    CoordinatorConfig,
    FilteredEventReceiver,
    UploadCoordinator,
    UploadCoordinatorHandle,
    DEFAULT_NAVIGATE_DELAY,
};
pub use errors::{
    ConfigError,
    ExtractorError,
    NavigationError,
    PublishError,
    Result,
    StorageError,
    UploadError,
};
pub use paths::RemotePaths;
pub use progress::{combine, ProgressAggregator};
pub use session::{BarrierTransition, UploadSession};
pub use traits::{
    BlobStorage,
    Collaborators,
    FrameExtractor,
    MetadataPublisher,
    Navigator,
    StorageTask,
    StorageTaskSender,
};
pub use types::*;
