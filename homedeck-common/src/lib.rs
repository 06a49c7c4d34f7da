//! # homedeck Common Library
//!
//! Shared code for the homedeck console services:
//! - Event types (`DeckEvent`) and the `EventBus`
//! - Server-Sent Events helpers
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
