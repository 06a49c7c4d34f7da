//! Domain services used by the HTTP handlers

pub mod directory_indexer;
pub mod host_stats;
pub mod job_controller;
pub mod path_sandbox;
pub mod service_registry;
