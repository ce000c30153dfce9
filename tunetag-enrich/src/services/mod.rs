//! Enrichment services used by the HTTP handlers

pub mod orchestrator;
pub mod tag_mutation;

pub use orchestrator::{EnrichmentOrchestrator, OrchestratorError};
pub use tag_mutation::{MutationError, TagField, TagMutationService};
