//! Intra-VM JNDI naming.
//!
//! The tree is an arena of [`NameNode`](node)s: each naming level is a binary
//! search tree of siblings with a link down to the next level. [`IvmContext`]
//! is the context facade over one node. Bindings are append-only; lookups are
//! memoized per context and [`Reference`]s are dereferenced on every lookup
//! against the caller's [`InvocationContext`].

mod artifact;
mod binding;
mod context;
mod error;
mod federation;
mod invocation;
mod node;
mod parsed_name;
mod reference;
mod services;

pub use artifact::JndiEncArtifact;
pub use binding::{Binding, BoundObject, LinkRef, ListedBinding, NameClassPair, NamingObject};
pub use context::{ContextState, IvmContext};
pub use error::{NamingError, Result};
pub use federation::{
    ExternalContext, ExternalContexts, FederatedObject, FederationRegistry, MapContext,
    SharedExternalContext, UrlContextFactory,
};
pub use invocation::{CopyOperation, InvocationContext, Operation, OperationSet};
pub use parsed_name::{component_hash, ParsedName};
pub use reference::{
    ContextualJndiReference, EjbReference, EncReference, FactoryReference, InvocationMapReference,
    IntraVmJndiReference, JndiReference, Reference, StaticReference,
};
pub use services::{NamingServices, NamingSettings};
