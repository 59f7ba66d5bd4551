//! Command implementations.

pub mod cache;
pub mod common;
pub mod completions;
pub mod flush;
pub mod init;
pub mod list;
pub mod outbox;
pub mod run;
pub mod status;
pub mod submit;
pub mod version;
