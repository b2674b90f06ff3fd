//! Router and handler surface of the webhook server, split out from the
//! binary so integration tests can drive it with `tower::ServiceExt`.

pub mod webhook;
