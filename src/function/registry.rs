//! Registry of wrapped streaming handlers, keyed by name.

use crate::error::HandlerError;
use crate::function::handler::{CompletionCallback, InvocationContext};
use crate::function::wrapper::HandlerWrapper;
use crate::http::{InvocationEvent, Outcome};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Registry the host server routes invocations through.
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<HandlerWrapper>>>,
    /// Environment copied into every invocation context.
    global_env: HashMap<String, String>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::with_env(HashMap::new())
    }

    pub fn with_env(env: HashMap<String, String>) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            global_env: env,
        }
    }

    /// Register a wrapped handler. Names must be unique.
    pub async fn register(
        &self,
        name: impl Into<String>,
        wrapper: HandlerWrapper,
    ) -> Result<(), HandlerError> {
        let name = name.into();
        let mut handlers = self.handlers.write().await;

        if handlers.contains_key(&name) {
            return Err(HandlerError::new(format!(
                "Handler '{}' is already registered",
                name
            )));
        }

        handlers.insert(name.clone(), Arc::new(wrapper));
        info!("Registered streaming handler: {}", name);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<HandlerWrapper>> {
        self.handlers.read().await.get(name).cloned()
    }

    /// Names of all registered handlers, sorted.
    pub async fn list(&self) -> Vec<String> {
        let handlers = self.handlers.read().await;
        let mut names: Vec<String> = handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn remove(&self, name: &str) -> Result<(), HandlerError> {
        let mut handlers = self.handlers.write().await;
        handlers
            .remove(name)
            .ok_or_else(|| HandlerError::with_code(404, format!("Handler '{}' not found", name)))?;

        info!("Removed streaming handler: {}", name);
        Ok(())
    }

    /// Invoke the handler registered under `name`.
    ///
    /// Returns `None` when no such handler exists.
    pub async fn invoke(
        &self,
        name: &str,
        event: InvocationEvent,
        callback: Option<CompletionCallback>,
    ) -> Option<Outcome> {
        let wrapper = self.get(name).await?;

        let mut ctx = InvocationContext::new(name, event.request_id().unwrap_or_default());
        for (k, v) in &self.global_env {
            ctx.env.insert(k.clone(), v.clone());
        }

        debug!("Dispatching invocation to '{}'", name);
        Some(wrapper.invoke(event, ctx, callback).await)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
