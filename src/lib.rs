//! Community bot — content submissions, passes and keyword archiving.

pub mod archive;
pub mod channels;
pub mod config;
pub mod content;
pub mod error;
pub mod locks;
pub mod routes;
pub mod store;
pub mod validation;
