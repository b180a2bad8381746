//! Member submissions and passes.

pub mod model;
pub mod notify;
pub mod service;

pub use model::{Category, Content, ContentType, User};
pub use service::{ContentService, SubmitContentRequest, SubmitPassRequest};
