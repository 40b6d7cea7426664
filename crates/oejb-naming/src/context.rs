//! The naming-context facade over the node arena.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::artifact::JndiEncArtifact;
use crate::binding::{Binding, ListedBinding, NameClassPair, NamingObject};
use crate::error::{NamingError, Result};
use crate::invocation::{CopyOperation, InvocationContext};
use crate::node::{Arena, NodeId, NodeValue, Resolved};
use crate::parsed_name::ParsedName;
use crate::services::NamingServices;

/// Per-node context state, shared by every handle onto the same node.
#[derive(Debug, Default)]
pub struct ContextState {
    fast_cache: Mutex<HashMap<String, CacheEntry>>,
    env: Mutex<Option<BTreeMap<String, String>>>,
    read_only: AtomicBool,
}

/// A memoized lookup result.
///
/// Contexts of the owning tree are kept as node ids. The arena owns every
/// `ContextState`, so caching a handle would keep the tree alive forever.
#[derive(Clone, Debug)]
enum CacheEntry {
    Node(NodeId),
    Binding(Binding),
}

impl CacheEntry {
    fn is_cacheable(&self) -> bool {
        match self {
            CacheEntry::Node(_) => true,
            CacheEntry::Binding(binding) => binding.is_cacheable(),
        }
    }
}

pub(crate) struct NamingTree {
    arena: RwLock<Arena>,
    root: NodeId,
    services: Arc<NamingServices>,
}

/// A context rooted at one node of an intra-VM naming tree.
///
/// Handles are cheap to clone. The tree is append-only: names are bound once and
/// never removed, which is what lets lookups be memoized per context without
/// invalidation.
#[derive(Clone)]
pub struct IvmContext {
    tree: Arc<NamingTree>,
    node: NodeId,
    state: Arc<ContextState>,
}

impl fmt::Debug for IvmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IvmContext")
            .field("path", &self.path())
            .field("read_only", &self.is_read_only())
            .finish_non_exhaustive()
    }
}

impl IvmContext {
    /// A fresh, empty tree with default services.
    pub fn create_root_context() -> Self {
        Self::with_services(Arc::new(NamingServices::default()))
    }

    pub fn with_services(services: Arc<NamingServices>) -> Self {
        Self::named("", services)
    }

    /// A fresh tree whose root node carries `name`.
    pub fn named(name: &str, services: Arc<NamingServices>) -> Self {
        let (arena, root) = Arena::new(name);
        let state = arena.node(root).context_state();
        let tree = Arc::new(NamingTree {
            arena: RwLock::new(arena),
            root,
            services,
        });
        Self {
            tree,
            node: root,
            state,
        }
    }

    /// Replaces this context's environment with a copy of `env`.
    pub fn with_environment(self, env: BTreeMap<String, String>) -> Self {
        *self.state.env.lock() = Some(env);
        self
    }

    pub fn services(&self) -> &Arc<NamingServices> {
        &self.tree.services
    }

    /// The context at the root of this context's tree.
    pub fn root_context(&self) -> IvmContext {
        self.context_at(&self.tree.arena.read(), self.tree.root)
    }

    /// Whether both handles address the same node of the same tree.
    pub fn same_context(&self, other: &IvmContext) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && self.node == other.node
    }

    /// The name component this context's node was bound under.
    pub fn atomic_name(&self) -> String {
        self.tree.arena.read().node(self.node).atomic_name().to_owned()
    }

    /// Path from the tree root down to this context.
    pub fn path(&self) -> String {
        self.tree.arena.read().path(self.node, self.tree.root)
    }

    /// Indented dump of everything bound below this context.
    pub fn tree(&self) -> String {
        self.tree.arena.read().tree(self.node, self.tree.root)
    }

    fn context_at(&self, arena: &Arena, node: NodeId) -> IvmContext {
        IvmContext {
            tree: self.tree.clone(),
            node,
            state: arena.node(node).context_state(),
        }
    }

    fn compound_name(&self, name: &str) -> String {
        let arena = self.tree.arena.read();
        let atomic = arena.node(self.node).atomic_name();
        ParsedName::new(&format!("{atomic}/{name}")).to_string()
    }

    pub fn lookup(&self, name: &str, invocation: &InvocationContext) -> Result<NamingObject> {
        self.lookup_at_depth(name, invocation, 0)
    }

    /// Same as [`IvmContext::lookup`]; links are always followed.
    pub fn lookup_link(&self, name: &str, invocation: &InvocationContext) -> Result<NamingObject> {
        self.lookup(name, invocation)
    }

    /// Looks `name` up and requires the result to be a context.
    pub fn lookup_context(&self, name: &str, invocation: &InvocationContext) -> Result<IvmContext> {
        self.lookup(name, invocation)?
            .into_context()
            .ok_or_else(|| NamingError::NotContext {
                name: name.to_owned(),
            })
    }

    pub(crate) fn lookup_at_depth(
        &self,
        name: &str,
        invocation: &InvocationContext,
        depth: usize,
    ) -> Result<NamingObject> {
        if name.is_empty() {
            return Ok(NamingObject::Context(self.clone()));
        }

        if let Some((prefix, path)) = name.split_once(':') {
            let parsed = ParsedName::new(path);
            return match prefix {
                "openejb" => self
                    .openejb_context(invocation, depth)?
                    .lookup_at_depth(&parsed.path(), invocation, depth),
                "java" if parsed.component() == "openejb" => {
                    let rest = parsed.components()[1..].join("/");
                    self.openejb_context(invocation, depth)?
                        .lookup_at_depth(&rest, invocation, depth)
                }
                "java" => {
                    let root = match invocation.jndi_root() {
                        Some(root) => root.clone(),
                        None => self.root_context(),
                    };
                    root.lookup_at_depth(&parsed.path(), invocation, depth)
                }
                other => Err(NamingError::UnknownScheme {
                    prefix: other.to_owned(),
                }),
            };
        }

        let key = self.compound_name(name);
        let cached = self.state.fast_cache.lock().get(&key).cloned();
        let entry = match cached {
            Some(entry) => entry,
            None => {
                let (entry, cacheable) = match self.resolve_local(&key, invocation, depth) {
                    Ok(found) => found,
                    Err(err) if err.is_not_found() => {
                        let federated = self
                            .tree
                            .services
                            .federation()
                            .federate(name)
                            .ok_or_else(|| NamingError::not_found(name))?;
                        (CacheEntry::Binding(federated), true)
                    }
                    Err(err) => return Err(err),
                };
                if cacheable && entry.is_cacheable() {
                    self.state.fast_cache.lock().insert(key, entry.clone());
                }
                entry
            }
        };
        let binding = match entry {
            CacheEntry::Node(id) => Binding::Context(self.context_at(&self.tree.arena.read(), id)),
            CacheEntry::Binding(binding) => binding,
        };

        self.dereference(name, binding, invocation, depth)
    }

    /// Resolves a compound name against the arena.
    ///
    /// The flag is false when the walk continued inside a foreign context: that
    /// result is already dereferenced and must not be memoized.
    fn resolve_local(
        &self,
        key: &str,
        invocation: &InvocationContext,
        depth: usize,
    ) -> Result<(CacheEntry, bool)> {
        let arena = self.tree.arena.read();
        let resolved = arena.resolve(self.node, &mut ParsedName::new(key))?;
        match resolved {
            Resolved::Node(id) => {
                let entry = match arena.node(id).value() {
                    NodeValue::Bound(binding) => CacheEntry::Binding(binding.clone()),
                    NodeValue::Empty | NodeValue::Context => CacheEntry::Node(id),
                };
                Ok((entry, true))
            }
            Resolved::Through { node, remaining } => {
                let foreign = match arena.node(node).value() {
                    NodeValue::Bound(Binding::Context(context)) => context.clone(),
                    _ => return Err(NamingError::not_found(key)),
                };
                drop(arena);
                let object = foreign.lookup_at_depth(&remaining, invocation, depth)?;
                Ok((CacheEntry::Binding(Binding::from(object)), false))
            }
        }
    }

    fn dereference(
        &self,
        name: &str,
        binding: Binding,
        invocation: &InvocationContext,
        depth: usize,
    ) -> Result<NamingObject> {
        let limit = self.tree.services.settings().max_reference_depth;
        let mut hops = depth;
        let mut current = binding;
        loop {
            match current {
                Binding::Object(object) => return Ok(NamingObject::Object(object)),
                Binding::Context(context) => {
                    if !context.same_context(self) {
                        context.inherit_from(self);
                    }
                    return Ok(NamingObject::Context(context));
                }
                Binding::Reference(reference) => {
                    hops += 1;
                    if hops > limit {
                        return Err(NamingError::ReferenceDepth {
                            name: name.to_owned(),
                            limit,
                        });
                    }
                    current = reference
                        .resolve(self, invocation, hops)
                        .map_err(|err| match err {
                            NamingError::NotFound { .. } => NamingError::not_found(name),
                            other => other,
                        })?;
                }
                Binding::Link(link) => {
                    hops += 1;
                    if hops > limit {
                        return Err(NamingError::ReferenceDepth {
                            name: name.to_owned(),
                            limit,
                        });
                    }
                    return self.lookup_at_depth(&link.link_name, invocation, hops);
                }
            }
        }
    }

    /// A looked-up context takes over the caller's environment and read-only flag.
    fn inherit_from(&self, caller: &IvmContext) {
        let env = caller.state.env.lock().clone();
        *self.state.env.lock() = env;
        if caller.is_read_only() {
            self.set_read_only(true);
        }
    }

    fn openejb_context(&self, invocation: &InvocationContext, depth: usize) -> Result<IvmContext> {
        self.root_context()
            .lookup_at_depth("openejb", invocation, depth)?
            .into_context()
            .ok_or_else(|| NamingError::NotContext {
                name: "openejb".to_owned(),
            })
    }

    /// Binds `binding` at `name`, creating intermediate contexts as needed.
    pub fn bind(&self, name: &str, binding: impl Into<Binding>) -> Result<()> {
        if self.check_read_only("bind")? {
            return Ok(());
        }
        self.bind_node(name, Some(binding.into())).map(|_| ())
    }

    /// Creates an empty context at `name` and returns it.
    ///
    /// `None` when this context is read-only and failed writes are ignored.
    pub fn create_subcontext(&self, name: &str) -> Result<Option<IvmContext>> {
        if self.check_read_only("create_subcontext")? {
            return Ok(None);
        }
        let id = self.bind_node(name, None)?;
        Ok(Some(self.context_at(&self.tree.arena.read(), id)))
    }

    fn bind_node(&self, name: &str, value: Option<Binding>) -> Result<NodeId> {
        let name = strip_scheme(name);
        if ParsedName::new(name).is_empty() {
            return Err(NamingError::InvalidName {
                name: name.to_owned(),
            });
        }
        let key = self.compound_name(name);
        if self.state.fast_cache.lock().contains_key(&key) {
            return Err(NamingError::already_bound(name));
        }
        let id = self
            .tree
            .arena
            .write()
            .bind(self.node, &mut ParsedName::new(&key), value)?;
        tracing::trace!(target: "oejb.naming", name = %key, "bound");
        Ok(id)
    }

    pub fn rebind(&self, _name: &str, _binding: impl Into<Binding>) -> Result<()> {
        Err(NamingError::NotSupported { operation: "rebind" })
    }

    pub fn unbind(&self, _name: &str) -> Result<()> {
        Err(NamingError::NotSupported { operation: "unbind" })
    }

    pub fn rename(&self, _old_name: &str, _new_name: &str) -> Result<()> {
        Err(NamingError::NotSupported { operation: "rename" })
    }

    pub fn destroy_subcontext(&self, _name: &str) -> Result<()> {
        Err(NamingError::NotSupported {
            operation: "destroy_subcontext",
        })
    }

    /// Names are always parsed by [`ParsedName`]; no custom parser is handed out.
    pub fn name_parser(&self, _name: &str) -> Result<Infallible> {
        Err(NamingError::NotSupported {
            operation: "name_parser",
        })
    }

    /// Direct children of the context at `name`, with their class names.
    pub fn list(&self, name: &str, invocation: &InvocationContext) -> Result<Vec<NameClassPair>> {
        let target = self.lookup_context(name, invocation)?;
        Ok(target
            .children()
            .into_iter()
            .map(|child| NameClassPair {
                name: child.name,
                class_name: child.class_name,
            })
            .collect())
    }

    /// Like [`IvmContext::list`], with the raw binding of each child.
    pub fn list_bindings(
        &self,
        name: &str,
        invocation: &InvocationContext,
    ) -> Result<Vec<ListedBinding>> {
        Ok(self.lookup_context(name, invocation)?.children())
    }

    fn children(&self) -> Vec<ListedBinding> {
        let arena = self.tree.arena.read();
        arena
            .children(self.node, self.tree.root)
            .into_iter()
            .map(|id| {
                let node = arena.node(id);
                let binding = match node.value() {
                    NodeValue::Bound(binding) => binding.clone(),
                    NodeValue::Empty | NodeValue::Context => {
                        Binding::Context(self.context_at(&arena, id))
                    }
                };
                ListedBinding {
                    name: node.atomic_name().to_owned(),
                    class_name: binding.class_name().to_owned(),
                    binding,
                }
            })
            .collect()
    }

    /// Joins `name` onto `prefix` as composite names.
    pub fn compose_name(&self, name: &str, prefix: &str) -> String {
        prefix
            .split('/')
            .chain(name.split('/'))
            .filter(|component| !component.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Sets an environment property, returning the previous value.
    pub fn add_to_environment(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.state
            .env
            .lock()
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into())
    }

    pub fn remove_from_environment(&self, key: &str) -> Option<String> {
        self.state.env.lock().as_mut().and_then(|env| env.remove(key))
    }

    /// A copy of the environment; empty when none was ever set.
    pub fn environment(&self) -> BTreeMap<String, String> {
        self.state.env.lock().clone().unwrap_or_default()
    }

    pub fn name_in_namespace(&self) -> String {
        String::new()
    }

    /// Closing an intra-VM context releases nothing and is allowed on read-only contexts.
    pub fn close(&self) -> Result<()> {
        Ok(())
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.state.read_only.store(read_only, Ordering::Release);
    }

    pub fn is_read_only(&self) -> bool {
        self.state.read_only.load(Ordering::Acquire)
    }

    /// `Ok(true)` means "skip the write silently".
    fn check_read_only(&self, operation: &'static str) -> Result<bool> {
        if !self.is_read_only() {
            return Ok(false);
        }
        if self.tree.services.settings().exception_on_failed_write {
            return Err(NamingError::NotSupported { operation });
        }
        tracing::debug!(target: "oejb.naming", operation, path = %self.path(), "ignored write to read-only context");
        Ok(true)
    }

    /// The serialized form of this context.
    ///
    /// Contexts only leave the VM while a stateful bean is passivated or state is
    /// copied across class loaders; in both cases the context travels as its
    /// path and is re-resolved on activation.
    pub fn write_replace(&self, invocation: &InvocationContext) -> Result<JndiEncArtifact> {
        match invocation.copy() {
            CopyOperation::StatefulPassivation | CopyOperation::CrossClassLoader => {
                Ok(JndiEncArtifact::new(self.path()))
            }
            CopyOperation::None => Err(NamingError::NotSerializable),
        }
    }
}

fn strip_scheme(name: &str) -> &str {
    match name.find(':') {
        Some(index) => &name[index + 1..],
        None => name,
    }
}
