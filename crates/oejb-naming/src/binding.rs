use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::context::IvmContext;
use crate::reference::Reference;

/// An arbitrary value bound into the naming tree.
///
/// The concrete type name is captured at construction so listings can report it.
#[derive(Clone)]
pub struct BoundObject {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl BoundObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    /// Whether both handles point at the same bound value.
    pub fn ptr_eq(&self, other: &BoundObject) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for BoundObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundObject")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// A symbolic link to another name, followed on lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkRef {
    pub link_name: String,
}

impl LinkRef {
    pub fn new(link_name: impl Into<String>) -> Self {
        Self {
            link_name: link_name.into(),
        }
    }
}

/// What a node in the naming tree holds.
#[derive(Clone, Debug)]
pub enum Binding {
    Object(BoundObject),
    Reference(Reference),
    Link(LinkRef),
    Context(IvmContext),
}

impl Binding {
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Binding::Object(BoundObject::new(value))
    }

    /// Name of the bound value's type, as reported by `list`.
    pub fn class_name(&self) -> &'static str {
        match self {
            Binding::Object(object) => object.type_name(),
            Binding::Reference(reference) => reference.class_name(),
            Binding::Link(_) => std::any::type_name::<LinkRef>(),
            Binding::Context(_) => std::any::type_name::<IvmContext>(),
        }
    }

    pub(crate) fn is_cacheable(&self) -> bool {
        match self {
            Binding::Reference(reference) => reference.is_cacheable(),
            _ => true,
        }
    }
}

impl From<Reference> for Binding {
    fn from(value: Reference) -> Self {
        Binding::Reference(value)
    }
}

impl From<BoundObject> for Binding {
    fn from(value: BoundObject) -> Self {
        Binding::Object(value)
    }
}

impl From<NamingObject> for Binding {
    fn from(value: NamingObject) -> Self {
        match value {
            NamingObject::Object(object) => Binding::Object(object),
            NamingObject::Context(context) => Binding::Context(context),
        }
    }
}

/// The result of a lookup: references and links are already followed.
#[derive(Clone, Debug)]
pub enum NamingObject {
    Object(BoundObject),
    Context(IvmContext),
}

impl NamingObject {
    pub fn as_object(&self) -> Option<&BoundObject> {
        match self {
            NamingObject::Object(object) => Some(object),
            NamingObject::Context(_) => None,
        }
    }

    pub fn as_context(&self) -> Option<&IvmContext> {
        match self {
            NamingObject::Context(context) => Some(context),
            NamingObject::Object(_) => None,
        }
    }

    pub fn into_context(self) -> Option<IvmContext> {
        match self {
            NamingObject::Context(context) => Some(context),
            NamingObject::Object(_) => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_object().and_then(BoundObject::downcast_ref::<T>)
    }
}

/// A listed child: its atomic name and the type name of its binding.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NameClassPair {
    pub name: String,
    pub class_name: String,
}

/// A listed child together with its raw (not dereferenced) binding.
#[derive(Clone, Debug)]
pub struct ListedBinding {
    pub name: String,
    pub class_name: String,
    pub binding: Binding,
}
