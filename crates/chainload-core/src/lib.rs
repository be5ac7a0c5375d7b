//! # Chainload Core
//!
//! Data model shared by the Chainload load-generation engine and its CLI.
//!
//! This crate provides:
//! - `RunConfig` / `ApiStepConfig` - the immutable description of a run
//! - `SessionState` - per-iteration values threaded between workflow steps
//! - Template resolution (`{{key}}` placeholders)
//! - Response extraction (`ExtractionRule::ByPath` / `ExtractionRule::ByName`)
//! - The configuration error taxonomy and failure classification
//!
//! ## Data flow within one iteration
//!
//! ```text
//!   TestDataRecord ──► SessionState ──► resolve templates ──► request
//!                          ▲                                     │
//!                          └──────── extraction rules ◄── response
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod template;
pub mod types;

pub use config::*;
pub use error::*;
pub use extract::ExtractionRule;
pub use types::*;
