//! Core library: scanning, risk extraction, embeddings, persistence, RAG.

pub mod completion;
pub mod config;
pub mod embeddings;
pub mod extractor;
pub mod indexer;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod scanner;
pub mod store;
pub mod text;
pub mod vectorstore;
