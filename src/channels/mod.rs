//! Chat platform I/O.

pub mod dispatcher;
pub mod signature;
pub mod slack;

pub use dispatcher::{Dispatcher, ReactionOutcome};
pub use signature::SignatureVerifier;
pub use slack::SlackDispatcher;
