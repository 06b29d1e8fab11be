//! Immutable name-to-handler registries for workflows and activities.

use std::collections::HashMap;
use std::sync::Arc;

use crate::activity::{ActivityHandler, FnActivity};
use crate::errors::Failure;
use crate::runner::{FnWorkflow, WorkflowHandler};

/// Generic registry mapping names to shared handlers.
///
/// Built once through [`RegistryBuilder`] and immutable afterwards; clones
/// share the same map.
pub struct Registry<H: ?Sized> {
    inner: Arc<HashMap<String, Arc<H>>>,
}

// Manual Clone impl since H: ?Sized doesn't auto-derive Clone
impl<H: ?Sized> Clone for Registry<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: ?Sized> std::fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("count", &self.inner.len())
            .finish()
    }
}

impl<H: ?Sized> Default for Registry<H> {
    fn default() -> Self {
        Self {
            inner: Arc::new(HashMap::new()),
        }
    }
}

pub struct RegistryBuilder<H: ?Sized> {
    map: HashMap<String, Arc<H>>,
    errors: Vec<String>,
}

pub type WorkflowRegistry = Registry<dyn WorkflowHandler>;
pub type ActivityRegistry = Registry<dyn ActivityHandler>;
pub type WorkflowRegistryBuilder = RegistryBuilder<dyn WorkflowHandler>;
pub type ActivityRegistryBuilder = RegistryBuilder<dyn ActivityHandler>;

impl<H: ?Sized> Registry<H> {
    pub fn builder() -> RegistryBuilder<H> {
        RegistryBuilder {
            map: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<H>> {
        self.inner.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn list_names(&self) -> Vec<String> {
        self.inner.keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.inner.len()
    }
}

impl<H: ?Sized> RegistryBuilder<H> {
    pub fn build(self) -> Registry<H> {
        Registry {
            inner: Arc::new(self.map),
        }
    }

    /// Build the registry, returning an error if any registrations collided.
    pub fn build_result(self) -> Result<Registry<H>, String> {
        if self.errors.is_empty() {
            Ok(self.build())
        } else {
            Err(self.errors.join("; "))
        }
    }

    pub fn register_handler(mut self, name: impl Into<String>, handler: Arc<H>) -> Self {
        let name = name.into();
        if self.map.contains_key(&name) {
            self.errors.push(format!("duplicate registration: {name}"));
            return self;
        }
        self.map.insert(name, handler);
        self
    }
}

impl WorkflowRegistryBuilder {
    pub fn register<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(crate::context::WorkflowContext, String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<String, crate::errors::WorkflowError>>
            + Send
            + 'static,
    {
        self.register_handler(name, Arc::new(FnWorkflow(f)))
    }
}

impl ActivityRegistryBuilder {
    pub fn register<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(crate::activity::ActivityContext, String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<String, Failure>> + Send + 'static,
    {
        self.register_handler(name, Arc::new(FnActivity(f)))
    }
}
