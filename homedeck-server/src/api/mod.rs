//! HTTP API handlers for homedeck-server
//!
//! REST endpoints for control actions, one SSE endpoint for the job event
//! push channel.

pub mod buildinfo;
pub mod files;
pub mod health;
pub mod jobs;
pub mod media;
mod serve;
pub mod services;
pub mod sse;
pub mod stats;

pub use buildinfo::buildinfo_routes;
pub use files::file_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use media::media_routes;
pub use services::service_routes;
pub use sse::event_stream;
pub use stats::stats_routes;
