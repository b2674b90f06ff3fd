//! Shared utilities for the ticker workspace.
//!
//! Currently this is only the centralised `tracing` setup in [`observability`].
//! The crate is intentionally lightweight so every member can depend on it
//! without pulling in the HTTP or publishing stacks.

pub mod observability;
