//! C5: the Tool Dispatcher.
//!
//! Extensions are black-box tool providers behind a `describe`/`invoke`
//! contract (§4.5), normalized through [`dispatch::dispatch`] into the
//! shared [`wec_core::StepResult`] shape the Context Store records.

mod bash;
mod dispatch;
mod extension;
mod registry;

pub use bash::BashExtension;
pub use dispatch::{dispatch, interpolate_inputs, normalize, DispatchError};
pub use extension::{ContentItem, Extension, ToolDefinition, ToolResponse};
pub use registry::Registry;
