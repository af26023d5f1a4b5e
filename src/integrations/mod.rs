pub mod blob_store;
pub mod content_check;

pub use blob_store::{BlobError, BlobStore, MemoryBlobStore, PutOpts, S3BlobStore, StoredObject};
pub use content_check::{
    ContentCheckError, ContentChecker, ContentVerdict, DisabledContentChecker, OpenAiContentChecker,
};
