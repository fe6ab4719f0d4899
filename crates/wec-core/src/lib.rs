//! Shared data model and error taxonomy for the Workflow Execution Core.

pub mod error;
pub mod result;
pub mod types;

pub use error::DocumentError;
pub use result::StepResult;
pub use types::*;
