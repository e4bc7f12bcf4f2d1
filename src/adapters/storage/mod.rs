//! Storage backends for containers and signed documents.

pub mod content;

pub use content::{
    ContentStore, DocumentSource, DocumentStore, FsContentStore, FsDocumentSource,
    FsDocumentStore, MemoryContentStore, MemoryDocumentSource, MemoryDocumentStore,
};
