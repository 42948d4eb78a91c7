//! Tool dispatcher: resolves a call to its handler and normalizes the outcome.
//!
//! `dispatch` never returns an error or lets a handler panic escape: every
//! outcome is a [`ToolCallResult`].

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::{debug, info_span, warn, Instrument};

use super::args::ToolArgs;
use super::call::{ToolCallRequest, ToolCallResult};
use super::catalog::{ToolCatalog, ToolDescriptor};
use super::registry;
use crate::db::Database;
use crate::types::{Error, Result};

/// Future returned by a tool handler.
pub type ToolFuture = BoxFuture<'static, Result<Value>>;

/// A tool implementation.
pub type ToolHandler = fn(ToolContext, ToolArgs) -> ToolFuture;

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct ToolContext {
    pub database: Arc<dyn Database>,
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext").finish_non_exhaustive()
    }
}

/// Static name → handler map plus the catalog that describes it.
pub struct Dispatcher {
    catalog: ToolCatalog,
    handlers: HashMap<String, ToolHandler>,
    context: ToolContext,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tools", &self.catalog.len())
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher with no tools registered.
    pub fn empty(database: Arc<dyn Database>) -> Self {
        Self {
            catalog: ToolCatalog::new(),
            handlers: HashMap::new(),
            context: ToolContext { database },
        }
    }

    /// Dispatcher with every database tool registered.
    pub fn with_database_tools(database: Arc<dyn Database>) -> Result<Self> {
        let mut dispatcher = Self::empty(database);
        for (descriptor, handler) in registry::database_tools() {
            dispatcher.register(descriptor, handler)?;
        }
        Ok(dispatcher)
    }

    /// Bind a handler to a descriptor. Fails on empty or duplicate names.
    pub fn register(&mut self, descriptor: ToolDescriptor, handler: ToolHandler) -> Result<()> {
        let name = descriptor.name.clone();
        self.catalog.register(descriptor)?;
        self.handlers.insert(name, handler);
        Ok(())
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Registered descriptors in stable order.
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        self.catalog.list()
    }

    /// Route a call to its handler and normalize the outcome.
    pub async fn dispatch(&self, request: ToolCallRequest) -> ToolCallResult {
        let span = info_span!("tool_call", tool = %request.name);
        async move {
            let started = Instant::now();
            let outcome = match self.prepare(&request) {
                Ok((handler, args)) => self.invoke(handler, args).await,
                Err(e) => Err(e),
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(payload) => {
                    debug!(elapsed_ms, "tool call succeeded");
                    ToolCallResult::Success(payload)
                }
                Err(e) => {
                    warn!(kind = %e.kind(), elapsed_ms, error = %e, "tool call failed");
                    ToolCallResult::from(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    fn prepare(&self, request: &ToolCallRequest) -> Result<(ToolHandler, ToolArgs)> {
        let handler = *self
            .handlers
            .get(&request.name)
            .ok_or_else(|| Error::unknown_tool(request.name.clone()))?;

        let mut args = match &request.arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(Error::invalid_argument(format!(
                    "arguments must be an object, got {}",
                    match other {
                        Value::Array(_) => "array",
                        Value::String(_) => "string",
                        Value::Number(_) => "number",
                        _ => "boolean",
                    }
                )))
            }
        };

        let unknown = self.catalog.validate_args(&request.name, &args)?;
        if !unknown.is_empty() {
            debug!(?unknown, "ignoring unknown arguments");
        }
        self.catalog.fill_defaults(&request.name, &mut args)?;

        Ok((handler, ToolArgs::new(args)))
    }

    async fn invoke(&self, handler: ToolHandler, args: ToolArgs) -> Result<Value> {
        let context = self.context.clone();
        let call = std::panic::catch_unwind(AssertUnwindSafe(|| handler(context, args)));
        let future = match call {
            Ok(future) => future,
            Err(panic) => return Err(panic_error(panic)),
        };
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(panic_error(panic)),
        }
    }
}

fn panic_error(panic: Box<dyn Any + Send>) -> Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string());
    tracing::error!("panic_recovered: {}", message);
    Error::handler(message)
}
