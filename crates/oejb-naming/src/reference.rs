//! Bindings that produce their object at lookup time.
//!
//! A reference is dereferenced on every lookup, never when bound, so guards
//! such as [`EncReference`] are evaluated against the invocation that actually
//! performs the lookup.

use std::fmt;
use std::sync::Arc;

use crate::binding::{Binding, BoundObject};
use crate::context::IvmContext;
use crate::error::{NamingError, Result};
use crate::invocation::{InvocationContext, OperationSet};

/// Wraps an already-constructed object.
#[derive(Clone, Debug)]
pub struct StaticReference {
    pub object: BoundObject,
}

/// Looks a name up in the container's own naming tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntraVmJndiReference {
    pub jndi_name: String,
}

/// Looks a name up, optionally through a named context.
///
/// `context_name` first selects a registered external context; failing that it
/// is treated as a subcontext of the intra-VM tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JndiReference {
    pub context_name: Option<String>,
    pub jndi_name: String,
}

/// Reads an entry the invocation carries with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationMapReference {
    pub key: String,
}

/// An enterprise bean's business interface, as published by its deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EjbReference {
    pub deployment_id: String,
    pub interface: String,
}

impl EjbReference {
    /// Where the deployment publishes the interface in the container tree.
    pub fn jndi_name(&self) -> String {
        format!("openejb/Deployment/{}/{}", self.deployment_id, self.interface)
    }
}

type ObjectFactory = dyn Fn(&InvocationContext) -> Result<BoundObject> + Send + Sync;

/// Builds its object on demand, e.g. a web-service port or a resource handle.
#[derive(Clone)]
pub struct FactoryReference {
    pub name: String,
    factory: Arc<ObjectFactory>,
}

impl FactoryReference {
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn(&InvocationContext) -> Result<BoundObject> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }
}

impl fmt::Debug for FactoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryReference")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// An environment-naming-context entry only readable during some operations.
///
/// Outside an invocation the entry is always readable. During an invocation
/// whose operation is not in `allowed`, the entry reports "not found".
#[derive(Clone, Debug)]
pub struct EncReference {
    pub inner: Box<Reference>,
    pub allowed: OperationSet,
}

/// A name resolved under the calling application's prefix first.
#[derive(Clone, Debug)]
pub struct ContextualJndiReference {
    pub jndi_name: String,
    pub default_value: Option<BoundObject>,
}

#[derive(Clone, Debug)]
pub enum Reference {
    Static(StaticReference),
    IntraVm(IntraVmJndiReference),
    Jndi(JndiReference),
    InvocationMap(InvocationMapReference),
    Ejb(EjbReference),
    Factory(FactoryReference),
    Enc(EncReference),
    Contextual(ContextualJndiReference),
}

impl Reference {
    pub fn object(object: BoundObject) -> Self {
        Reference::Static(StaticReference { object })
    }

    pub fn intra_vm(jndi_name: impl Into<String>) -> Self {
        Reference::IntraVm(IntraVmJndiReference {
            jndi_name: jndi_name.into(),
        })
    }

    pub fn jndi(context_name: Option<String>, jndi_name: impl Into<String>) -> Self {
        Reference::Jndi(JndiReference {
            context_name,
            jndi_name: jndi_name.into(),
        })
    }

    pub fn invocation_entry(key: impl Into<String>) -> Self {
        Reference::InvocationMap(InvocationMapReference { key: key.into() })
    }

    pub fn ejb(deployment_id: impl Into<String>, interface: impl Into<String>) -> Self {
        Reference::Ejb(EjbReference {
            deployment_id: deployment_id.into(),
            interface: interface.into(),
        })
    }

    pub fn contextual(jndi_name: impl Into<String>, default_value: Option<BoundObject>) -> Self {
        Reference::Contextual(ContextualJndiReference {
            jndi_name: jndi_name.into(),
            default_value,
        })
    }

    /// Guards this reference so it only resolves during `allowed` operations.
    pub fn guarded(self, allowed: OperationSet) -> Self {
        Reference::Enc(EncReference {
            inner: Box::new(self),
            allowed,
        })
    }

    /// Type name reported when the reference is listed.
    pub fn class_name(&self) -> &'static str {
        match self {
            Reference::Static(_) => std::any::type_name::<StaticReference>(),
            Reference::IntraVm(_) => std::any::type_name::<IntraVmJndiReference>(),
            Reference::Jndi(_) => std::any::type_name::<JndiReference>(),
            Reference::InvocationMap(_) => std::any::type_name::<InvocationMapReference>(),
            Reference::Ejb(_) => std::any::type_name::<EjbReference>(),
            Reference::Factory(_) => std::any::type_name::<FactoryReference>(),
            Reference::Enc(_) => std::any::type_name::<EncReference>(),
            Reference::Contextual(_) => std::any::type_name::<ContextualJndiReference>(),
        }
    }

    /// Contextual references depend on the caller and are never memoized.
    pub fn is_cacheable(&self) -> bool {
        match self {
            Reference::Contextual(_) => false,
            Reference::Enc(enc) => enc.inner.is_cacheable(),
            _ => true,
        }
    }

    /// Produces the referenced value on behalf of `invocation`.
    ///
    /// `context` is the context the lookup was issued from; intra-VM names are
    /// resolved from the root of its tree. The result may itself be a reference
    /// or link, which the caller keeps following.
    pub fn get_object(&self, context: &IvmContext, invocation: &InvocationContext) -> Result<Binding> {
        self.resolve(context, invocation, 0)
    }

    pub(crate) fn resolve(
        &self,
        context: &IvmContext,
        invocation: &InvocationContext,
        depth: usize,
    ) -> Result<Binding> {
        match self {
            Reference::Static(reference) => Ok(Binding::Object(reference.object.clone())),
            Reference::IntraVm(reference) => {
                root_lookup(context, &reference.jndi_name, invocation, depth)
            }
            Reference::Jndi(reference) => reference.resolve(context, invocation, depth),
            Reference::InvocationMap(reference) => invocation
                .entry(&reference.key)
                .cloned()
                .map(Binding::Object)
                .ok_or_else(|| NamingError::not_found(reference.key.as_str())),
            Reference::Ejb(reference) => {
                root_lookup(context, &reference.jndi_name(), invocation, depth)
            }
            Reference::Factory(reference) => (reference.factory)(invocation).map(Binding::Object),
            Reference::Enc(reference) => match invocation.operation() {
                Some(operation) if !reference.allowed.contains(operation) => {
                    tracing::trace!(
                        target: "oejb.naming",
                        ?operation,
                        "ENC entry not accessible during operation"
                    );
                    Err(NamingError::not_found(reference.inner.class_name()))
                }
                _ => reference.inner.resolve(context, invocation, depth),
            },
            Reference::Contextual(reference) => reference.resolve(context, invocation, depth),
        }
    }
}

fn root_lookup(
    context: &IvmContext,
    name: &str,
    invocation: &InvocationContext,
    depth: usize,
) -> Result<Binding> {
    context
        .root_context()
        .lookup_at_depth(name, invocation, depth)
        .map(Binding::from)
}

impl JndiReference {
    fn resolve(
        &self,
        context: &IvmContext,
        invocation: &InvocationContext,
        depth: usize,
    ) -> Result<Binding> {
        let Some(context_name) = self.context_name.as_deref() else {
            return root_lookup(context, &self.jndi_name, invocation, depth);
        };

        if let Some(external) = context.services().external_contexts().get(context_name) {
            // External contexts are not required to support concurrent callers.
            let mut external = external.lock();
            return external
                .lookup(&self.jndi_name)?
                .ok_or_else(|| NamingError::not_found(self.jndi_name.as_str()));
        }

        let subcontext = context
            .root_context()
            .lookup_at_depth(context_name, invocation, depth)?
            .into_context()
            .ok_or_else(|| NamingError::NotContext {
                name: context_name.to_owned(),
            })?;
        subcontext
            .lookup_at_depth(&self.jndi_name, invocation, depth)
            .map(Binding::from)
    }
}

impl ContextualJndiReference {
    fn resolve(
        &self,
        context: &IvmContext,
        invocation: &InvocationContext,
        depth: usize,
    ) -> Result<Binding> {
        let services = context.services();
        let application = invocation
            .application()
            .filter(|application| services.is_live_application(application));

        if let Some(application) = application {
            let scoped = format!("{application}/{}", self.jndi_name);
            match root_lookup(context, &scoped, invocation, depth) {
                Ok(found) => return Ok(found),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }

        match &self.default_value {
            Some(default) => Ok(Binding::Object(default.clone())),
            None => root_lookup(context, &self.jndi_name, invocation, depth),
        }
    }
}
