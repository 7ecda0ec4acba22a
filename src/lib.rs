//! Parley: a conversation engine.
//!
//! Each user message or file upload becomes a background job. The job
//! optimizes the conversation so far into a bounded context (profile,
//! best-scoring turns, summary of the rest), asks a chain of LLM providers
//! with retry and fallback, and stores the reply. Analytics are computed on
//! demand from the job registry.
//!
//! [`service::ChatService`] is the entry point for embedding the engine.

pub mod analytics;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};
pub use service::{ChatService, PollPolicy, Submission};
