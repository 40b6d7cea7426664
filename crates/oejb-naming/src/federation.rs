//! Naming providers outside the intra-VM tree.
//!
//! Two kinds of collaborators live here:
//! - URL-scheme factories consulted when a local lookup misses ("federation").
//! - Named external contexts that `JndiReference`s resolve through.
//!
//! Factories are registered under a tag and activated from configuration, so
//! the set of providers is closed once the container starts.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::binding::Binding;
use crate::error::Result;

/// A naming context owned by another provider.
///
/// Implementations are not required to be reentrant; callers serialize access
/// through the `Mutex` the context is registered behind.
pub trait ExternalContext: Send {
    /// Returns `Ok(None)` when the name is not bound in this context.
    fn lookup(&mut self, name: &str) -> Result<Option<Binding>>;
}

pub type SharedExternalContext = Arc<Mutex<dyn ExternalContext>>;

/// Result of asking a URL-scheme factory about a name.
pub enum FederatedObject {
    /// A context the original name should be looked up in.
    Context(SharedExternalContext),
    Object(Binding),
}

pub trait UrlContextFactory: Send + Sync {
    /// Returns `Ok(None)` when this factory does not handle `name`.
    fn object_instance(&self, name: &str) -> Result<Option<FederatedObject>>;
}

type FactoryConstructor = Box<dyn Fn() -> Arc<dyn UrlContextFactory> + Send + Sync>;

/// Registry of federation factories for one container instance.
#[derive(Default)]
pub struct FederationRegistry {
    constructors: RwLock<BTreeMap<String, FactoryConstructor>>,
    active: RwLock<Vec<(String, Arc<dyn UrlContextFactory>)>>,
}

impl fmt::Debug for FederationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active: Vec<String> = self.active.read().iter().map(|(tag, _)| tag.clone()).collect();
        f.debug_struct("FederationRegistry")
            .field("registered", &self.constructors.read().keys().collect::<Vec<_>>())
            .field("active", &active)
            .finish()
    }
}

impl FederationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory constructor under `tag`. Re-registering replaces it.
    pub fn register(
        &self,
        tag: impl Into<String>,
        constructor: impl Fn() -> Arc<dyn UrlContextFactory> + Send + Sync + 'static,
    ) {
        self.constructors.write().insert(tag.into(), Box::new(constructor));
    }

    /// Instantiates the factories named by `tags`, in order.
    ///
    /// Tags without a registered constructor are skipped.
    pub fn activate<S: AsRef<str>>(&self, tags: &[S]) {
        let constructors = self.constructors.read();
        let mut active = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = tag.as_ref();
            match constructors.get(tag) {
                Some(constructor) => active.push((tag.to_owned(), constructor())),
                None => tracing::warn!(
                    target: "oejb.naming",
                    tag,
                    "no federation factory registered for tag; skipping"
                ),
            }
        }
        *self.active.write() = active;
    }

    /// Activates a factory instance directly.
    pub fn push_active(&self, tag: impl Into<String>, factory: Arc<dyn UrlContextFactory>) {
        self.active.write().push((tag.into(), factory));
    }

    pub fn factories(&self) -> Vec<Arc<dyn UrlContextFactory>> {
        self.active.read().iter().map(|(_, factory)| factory.clone()).collect()
    }

    /// Asks every active factory for `name`; the first non-empty answer wins.
    ///
    /// Factory failures are not fatal: the next factory is tried.
    pub fn federate(&self, name: &str) -> Option<Binding> {
        for factory in self.factories() {
            match factory.object_instance(name) {
                Ok(Some(FederatedObject::Context(context))) => {
                    match context.lock().lookup(name) {
                        Ok(Some(binding)) => return Some(binding),
                        Ok(None) => {}
                        Err(err) => tracing::debug!(
                            target: "oejb.naming",
                            name,
                            error = %err,
                            "federated context lookup failed"
                        ),
                    }
                }
                Ok(Some(FederatedObject::Object(binding))) => return Some(binding),
                Ok(None) => {}
                Err(err) => tracing::debug!(
                    target: "oejb.naming",
                    name,
                    error = %err,
                    "federation factory failed"
                ),
            }
        }
        None
    }
}

/// Named external contexts, each guarded by its own lock.
#[derive(Default)]
pub struct ExternalContexts {
    contexts: RwLock<HashMap<String, SharedExternalContext>>,
}

impl fmt::Debug for ExternalContexts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.contexts.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("ExternalContexts").field("names", &names).finish()
    }
}

impl ExternalContexts {
    pub fn register(&self, name: impl Into<String>, context: SharedExternalContext) {
        self.contexts.write().insert(name.into(), context);
    }

    pub fn get(&self, name: &str) -> Option<SharedExternalContext> {
        self.contexts.read().get(name).cloned()
    }
}

/// An in-memory [`ExternalContext`], handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MapContext {
    entries: HashMap<String, Binding>,
    lookups: usize,
}

impl MapContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.entries.insert(name.into(), binding);
        self
    }

    pub fn shared(self) -> SharedExternalContext {
        Arc::new(Mutex::new(self))
    }

    /// Number of lookups served so far.
    pub fn lookups(&self) -> usize {
        self.lookups
    }
}

impl ExternalContext for MapContext {
    fn lookup(&mut self, name: &str) -> Result<Option<Binding>> {
        self.lookups += 1;
        Ok(self.entries.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NamingError;

    struct Failing;

    impl UrlContextFactory for Failing {
        fn object_instance(&self, _name: &str) -> Result<Option<FederatedObject>> {
            Err(NamingError::External {
                context: "failing".into(),
                message: "boom".into(),
            })
        }
    }

    struct Constant(&'static str);

    impl UrlContextFactory for Constant {
        fn object_instance(&self, name: &str) -> Result<Option<FederatedObject>> {
            Ok((name == self.0).then(|| FederatedObject::Object(Binding::object(self.0))))
        }
    }

    #[test]
    fn failing_factories_fall_through_to_the_next() {
        let registry = FederationRegistry::new();
        registry.register("failing", || Arc::new(Failing));
        registry.register("constant", || Arc::new(Constant("ext/value")));
        registry.activate(&["failing", "missing", "constant"]);

        assert_eq!(registry.factories().len(), 2);
        let binding = registry.federate("ext/value").expect("constant factory answers");
        match binding {
            Binding::Object(object) => {
                assert_eq!(object.downcast_ref::<&str>(), Some(&"ext/value"))
            }
            other => panic!("unexpected binding {other:?}"),
        }
        assert!(registry.federate("other").is_none());
    }

    #[test]
    fn context_factories_look_the_name_up() {
        let shared = MapContext::new()
            .with("remote/queue", Binding::object(7u32))
            .shared();
        let registry = FederationRegistry::new();
        let context = shared.clone();
        registry.push_active("ctx", Arc::new(ContextFactory(context)));

        assert!(registry.federate("remote/queue").is_some());
        assert!(registry.federate("remote/topic").is_none());
    }

    struct ContextFactory(SharedExternalContext);

    impl UrlContextFactory for ContextFactory {
        fn object_instance(&self, _name: &str) -> Result<Option<FederatedObject>> {
            Ok(Some(FederatedObject::Context(self.0.clone())))
        }
    }
}
