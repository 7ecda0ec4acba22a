//! Job lifecycle.
//!
//! Every submission becomes a [`Job`] that moves through
//! `pending -> processing -> done | error`. The [`JobManager`] owns the
//! registry and runs one background task per job: optimize the history,
//! ask the fallback chain, store the reply.

mod manager;
mod model;
mod validation;
mod worker;

pub use manager::JobManager;
pub use model::{FileCategory, Job, JobInput, JobKind, JobStatus, size_label};
pub use validation::{
    DEFAULT_ALLOWED_TYPES, DEFAULT_MAX_UPLOAD_BYTES, UploadPolicy, check_message, extension_of,
};
pub use worker::GENERIC_ERROR_MESSAGE;
