//! External processing stages.
//!
//! The orchestrator drives two collaborators: a [`PartialProcessor`] that
//! handles one batch at a time, and a [`FinalizeStage`] that aggregates the
//! whole session once. Both are injected as trait objects; the `http` module
//! provides implementations that call out to worker services.

mod config;
mod error;
mod http;
mod traits;
mod types;

pub use config::StagesConfig;
pub use error::StageError;
pub use http::{HttpFinalizeStage, HttpPartialProcessor};
pub use traits::{FinalizeStage, PartialProcessor};
pub use types::FinalizeInput;
