//! ragbridge - streaming and evaluation-job bridge for RAG chat backends
//!
//! Turns the chat backend's token event stream into a stable canonical event
//! sequence, and tracks long-running evaluation jobs until they settle.

pub mod adapters;
pub mod backend;
pub mod canonical;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod jobs;
pub mod models;
pub mod sse;
pub mod stream;
pub mod traits;
