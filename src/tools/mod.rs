//! Tool layer: catalog and dispatch.
//!
//! The catalog owns metadata and validation, the registry binds the fixed
//! database tool set to handlers, and the dispatcher turns every call into a
//! [`ToolCallResult`].

pub mod args;
pub mod call;
pub mod catalog;
pub mod dispatch;
pub mod registry;

pub use args::ToolArgs;
pub use call::{ToolCallRequest, ToolCallResult, ToolFailure};
pub use catalog::{ParamDef, ParamType, ToolCatalog, ToolDescriptor};
pub use dispatch::{Dispatcher, ToolContext, ToolFuture, ToolHandler};
pub use registry::database_tools;
