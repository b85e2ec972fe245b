//! 文档层：文档库协作方接口与内存参考实现

pub mod store;

pub use store::{DocumentChunk, DocumentStore, InMemoryDocumentStore, ScoredChunk, FILENAME_KEY};
