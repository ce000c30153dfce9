//! HTTP API handlers for tunetag-enrich

pub mod analysis;
pub mod capabilities;
pub mod enrichment;
pub mod health;
pub mod song_tags;

pub use analysis::analysis_routes;
pub use capabilities::capability_routes;
pub use enrichment::enrichment_routes;
pub use health::health_routes;
pub use song_tags::song_tag_routes;
