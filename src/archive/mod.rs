//! Keyword triggers and edit-aware message archiving.

pub mod model;
pub mod pipeline;
pub mod registry;
pub mod resolver;

pub use model::{ArchiveKind, ArchiveMessage, ArchiveOutcome, InboundEvent, TriggerMessage};
pub use pipeline::ArchivePipeline;
pub use registry::TriggerRegistry;
pub use resolver::{IdentifierResolver, MapResolver};
