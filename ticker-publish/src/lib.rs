//! Core publishing pipeline: webhook payload normalisation, HTML patching,
//! and the two publish targets the server can be configured with.
//!
//! The flow per request is linear: the server hands a raw body to
//! [`record::parse_webhook_body`], then the resulting [`record::DocumentRecord`]
//! to exactly one [`target::PublishTarget`]. No state survives the request.

pub mod page;
pub mod record;
pub mod remote;
pub mod repo;
pub mod target;

pub use record::{parse_webhook_body, DocumentRecord};
pub use remote::RemoteApiTarget;
pub use repo::{RepositoryPatchTarget, RepositorySettings};
pub use target::{PublishError, PublishReceipt, PublishTarget};
