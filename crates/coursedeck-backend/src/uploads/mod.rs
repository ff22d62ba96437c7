pub mod cleanup;
pub mod pipeline;
pub mod storage;

pub use pipeline::{IncomingFile, IngestReport, Ingested, StepOutcome, UploadPipeline};
pub use storage::{StorageError, StoredFile, UploadStorage};
