//! C1 (partial): the document Loader.
//!
//! Reads a `.aol.toml` workflow document, deserializes it against the
//! shared data model, and runs the structural validation that must pass
//! before the Interpreter is allowed to start (§4.1, §9 supplements).

mod load;
mod references;
mod validate;

pub use load::load_document;
pub use references::{extract_variable_references, validate_outputs_exist};
pub use validate::validate_dependencies;
