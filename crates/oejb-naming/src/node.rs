//! Arena-backed naming tree.
//!
//! Each naming level is an unbalanced binary search tree of sibling nodes keyed
//! by `(component hash, component text)`. A node's `sub` link descends one
//! level; `parent` points at the node owning the level and is only used to
//! rebuild paths.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use crate::binding::Binding;
use crate::context::ContextState;
use crate::error::{NamingError, Result};
use crate::parsed_name::ParsedName;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub(crate) enum NodeValue {
    /// Created implicitly along a bound path.
    Empty,
    /// Created through `create_subcontext`.
    Context,
    Bound(Binding),
}

/// Outcome of walking a name through the arena.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Resolved {
    Node(NodeId),
    /// The walk reached a node bound to a foreign context with components left
    /// over; the caller continues the lookup in that context.
    Through { node: NodeId, remaining: String },
}

#[derive(Debug)]
pub(crate) struct NameNode {
    atomic_name: String,
    atomic_hash: i32,
    less: Option<NodeId>,
    grtr: Option<NodeId>,
    sub: Option<NodeId>,
    parent: Option<NodeId>,
    value: NodeValue,
    context: OnceLock<Arc<ContextState>>,
}

impl NameNode {
    fn new(name: &ParsedName, parent: Option<NodeId>) -> Self {
        Self {
            atomic_name: name.component().to_owned(),
            atomic_hash: name.component_hash(),
            less: None,
            grtr: None,
            sub: None,
            parent,
            value: NodeValue::Empty,
            context: OnceLock::new(),
        }
    }

    pub(crate) fn atomic_name(&self) -> &str {
        &self.atomic_name
    }

    pub(crate) fn value(&self) -> &NodeValue {
        &self.value
    }

    pub(crate) fn context_state(&self) -> Arc<ContextState> {
        self.context.get_or_init(Default::default).clone()
    }

    /// Total order between the name's current component and this node.
    fn order(&self, name: &ParsedName) -> Ordering {
        name.compare_to(self.atomic_hash)
            .then_with(|| name.component().cmp(self.atomic_name.as_str()))
    }
}

/// Node ids are `u32` indexes.
const MAX_NODES: usize = u32::MAX as usize;

#[derive(Debug)]
pub(crate) struct Arena {
    nodes: Vec<NameNode>,
    max_nodes: usize,
}

impl Arena {
    /// Creates an arena holding a single root node named `root_name`.
    pub(crate) fn new(root_name: &str) -> (Self, NodeId) {
        let root = NameNode::new(&ParsedName::new(root_name), None);
        let arena = Self {
            nodes: vec![root],
            max_nodes: MAX_NODES,
        };
        (arena, NodeId(0))
    }

    #[cfg(test)]
    fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub(crate) fn node(&self, id: NodeId) -> &NameNode {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NameNode {
        &mut self.nodes[id.index()]
    }

    /// Callers reserve room through [`Arena::reserve`] first.
    fn alloc(&mut self, name: &ParsedName, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NameNode::new(name, parent));
        id
    }

    fn reserve(&self, name: &ParsedName, count: usize) -> Result<()> {
        if self.nodes.len().saturating_add(count) > self.max_nodes {
            return Err(NamingError::TreeFull {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Finds the node addressed by `name`, starting the walk at `start`.
    pub(crate) fn resolve(&self, start: NodeId, name: &mut ParsedName) -> Result<Resolved> {
        let mut current = start;
        loop {
            let node = self.node(current);
            let next = match node.order(name) {
                Ordering::Equal => {
                    if !name.next() {
                        return Ok(Resolved::Node(current));
                    }
                    if let NodeValue::Bound(Binding::Context(_)) = node.value {
                        return Ok(Resolved::Through {
                            node: current,
                            remaining: name.path(),
                        });
                    }
                    node.sub
                }
                Ordering::Less => node.less,
                Ordering::Greater => node.grtr,
            };
            current = next.ok_or_else(|| NamingError::not_found(name.to_string()))?;
        }
    }

    /// Binds `value` at `name`, creating missing nodes on the way.
    ///
    /// A `None` value marks the target as an explicit (empty) context. Fails when
    /// the target already holds a binding or a sub-level, or when the path runs
    /// through a leaf binding.
    pub(crate) fn bind(
        &mut self,
        start: NodeId,
        name: &mut ParsedName,
        value: Option<Binding>,
    ) -> Result<NodeId> {
        let mut current = start;
        loop {
            let node = self.node(current);
            let order = node.order(name);
            let (sub, less, grtr, parent) = (node.sub, node.less, node.grtr, node.parent);
            let is_leaf = matches!(node.value, NodeValue::Bound(_));
            let is_empty = matches!(node.value, NodeValue::Empty);

            match order {
                Ordering::Equal => {
                    if name.next() {
                        if is_leaf {
                            return Err(NamingError::already_bound(name.to_string()));
                        }
                        match sub {
                            Some(sub) => current = sub,
                            None => {
                                let (head, leaf) = self.push_chain(name, Some(current), value)?;
                                self.node_mut(current).sub = Some(head);
                                return Ok(leaf);
                            }
                        }
                    } else {
                        if !is_empty || sub.is_some() {
                            return Err(NamingError::already_bound(name.to_string()));
                        }
                        self.node_mut(current).value = match value {
                            Some(binding) => NodeValue::Bound(binding),
                            None => NodeValue::Context,
                        };
                        return Ok(current);
                    }
                }
                Ordering::Less => match less {
                    Some(less) => current = less,
                    None => {
                        let (head, leaf) = self.push_chain(name, parent, value)?;
                        self.node_mut(current).less = Some(head);
                        return Ok(leaf);
                    }
                },
                Ordering::Greater => match grtr {
                    Some(grtr) => current = grtr,
                    None => {
                        let (head, leaf) = self.push_chain(name, parent, value)?;
                        self.node_mut(current).grtr = Some(head);
                        return Ok(leaf);
                    }
                },
            }
        }
    }

    /// Allocates one node per remaining component, each the `sub` of the previous.
    fn push_chain(
        &mut self,
        name: &mut ParsedName,
        parent: Option<NodeId>,
        value: Option<Binding>,
    ) -> Result<(NodeId, NodeId)> {
        self.reserve(name, name.len() - name.pos())?;
        let head = self.alloc(name, parent);
        let mut current = head;
        while name.next() {
            let child = self.alloc(name, Some(current));
            self.node_mut(current).sub = Some(child);
            current = child;
        }
        self.node_mut(current).value = match value {
            Some(binding) => NodeValue::Bound(binding),
            None => NodeValue::Context,
        };
        Ok((head, current))
    }

    /// The direct children of `id`, in tree order (pre-order over the sibling tree).
    ///
    /// The root of the tree has no sub-level; its children are its own top-level
    /// siblings.
    pub(crate) fn children(&self, id: NodeId, root: NodeId) -> Vec<NodeId> {
        let node = self.node(id);
        let mut out = Vec::new();
        match node.sub {
            Some(sub) => self.collect_level(sub, &mut out),
            None if id == root => {
                self.collect_level(root, &mut out);
                out.retain(|child| *child != root);
            }
            None => {}
        }
        out
    }

    fn collect_level(&self, start: NodeId, out: &mut Vec<NodeId>) {
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            out.push(id);
            let node = self.node(id);
            if let Some(grtr) = node.grtr {
                stack.push(grtr);
            }
            if let Some(less) = node.less {
                stack.push(less);
            }
        }
    }

    /// Path of `id` relative to `root`, following parent links.
    pub(crate) fn path(&self, id: NodeId, root: NodeId) -> String {
        let mut components = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == root {
                break;
            }
            let node = self.node(node_id);
            components.push(node.atomic_name.as_str());
            current = node.parent;
        }
        components.reverse();
        components.join("/")
    }

    /// Indented dump of the subtree under `id`.
    pub(crate) fn tree(&self, id: NodeId, root: NodeId) -> String {
        let mut out = String::new();
        self.write_tree(id, root, 0, &mut out);
        out
    }

    fn write_tree(&self, id: NodeId, root: NodeId, depth: usize, out: &mut String) {
        for child in self.children(id, root) {
            let node = self.node(child);
            let kind = match &node.value {
                NodeValue::Bound(binding) => binding.class_name(),
                NodeValue::Empty | NodeValue::Context => "context",
            };
            let _ = writeln!(out, "{:indent$}{} ({kind})", "", node.atomic_name, indent = depth * 2);
            self.write_tree(child, root, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(arena: &mut Arena, root: NodeId, path: &str, value: &'static str) -> Result<NodeId> {
        let mut name = ParsedName::new(&format!("/{path}"));
        arena.bind(root, &mut name, Some(Binding::object(value)))
    }

    fn resolve(arena: &Arena, root: NodeId, path: &str) -> Result<NodeId> {
        match arena.resolve(root, &mut ParsedName::new(&format!("/{path}")))? {
            Resolved::Node(id) => Ok(id),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bind_then_resolve_returns_same_node() {
        let (mut arena, root) = Arena::new("");
        let id = bind(&mut arena, root, "comp/env/value", "v").unwrap();
        assert_eq!(resolve(&arena, root, "comp/env/value").unwrap(), id);
        assert_eq!(arena.path(id, root), "comp/env/value");
    }

    #[test]
    fn binding_twice_fails() {
        let (mut arena, root) = Arena::new("");
        bind(&mut arena, root, "a/b", "first").unwrap();
        let err = bind(&mut arena, root, "a/b", "second").unwrap_err();
        assert!(matches!(err, NamingError::AlreadyBound { .. }));
    }

    #[test]
    fn binding_over_intermediate_or_through_leaf_fails() {
        let (mut arena, root) = Arena::new("");
        bind(&mut arena, root, "a/b/c", "leaf").unwrap();
        assert!(bind(&mut arena, root, "a/b", "x").is_err());
        assert!(bind(&mut arena, root, "a/b/c/d", "x").is_err());
    }

    #[test]
    fn missing_paths_are_not_found() {
        let (mut arena, root) = Arena::new("");
        bind(&mut arena, root, "a/b", "v").unwrap();
        for path in ["a/c", "z", "a/b/c"] {
            let err = resolve(&arena, root, path).unwrap_err();
            assert!(err.is_not_found(), "{path}: {err:?}");
        }
    }

    #[test]
    fn siblings_with_colliding_hashes_stay_distinct() {
        // "Aa" and "BB" share a string hash.
        assert_eq!(
            crate::parsed_name::component_hash("Aa"),
            crate::parsed_name::component_hash("BB")
        );
        let (mut arena, root) = Arena::new("");
        let aa = bind(&mut arena, root, "x/Aa", "aa").unwrap();
        let bb = bind(&mut arena, root, "x/BB", "bb").unwrap();
        assert_ne!(aa, bb);
        assert_eq!(resolve(&arena, root, "x/Aa").unwrap(), aa);
        assert_eq!(resolve(&arena, root, "x/BB").unwrap(), bb);
    }

    #[test]
    fn full_arena_rejects_new_paths_without_partial_nodes() {
        let (arena, root) = Arena::new("");
        let mut arena = arena.with_max_nodes(3);
        bind(&mut arena, root, "a/b", "v").unwrap();

        let err = bind(&mut arena, root, "c/d", "w").unwrap_err();
        assert!(matches!(err, NamingError::TreeFull { .. }), "{err:?}");
        assert_eq!(arena.nodes.len(), 3);
        assert!(resolve(&arena, root, "c").unwrap_err().is_not_found());
        assert!(resolve(&arena, root, "a/b").is_ok());
    }

    #[test]
    fn children_of_root_are_top_level_siblings() {
        let (mut arena, root) = Arena::new("");
        bind(&mut arena, root, "b", "1").unwrap();
        bind(&mut arena, root, "a/x", "2").unwrap();
        let mut names: Vec<_> = arena
            .children(root, root)
            .into_iter()
            .map(|id| arena.node(id).atomic_name().to_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
