//! Bulk evaluation: read scripted conversations from CSV, run them with
//! bounded concurrency, and persist every outcome as a result artifact.

pub mod dispatcher;
pub mod input;
pub mod persist;
pub mod progress;

pub use dispatcher::{BulkDispatcher, DispatchError};
pub use input::{parse_records, read_records};
pub use persist::{
    artifact_file_name, latest_artifact, read_artifact, write_artifact, PersistError,
    ResultPersister,
};
pub use progress::{
    ConsoleProgress, ProgressReporter, RecordEvent, RecordingProgress, SilentProgress,
};
