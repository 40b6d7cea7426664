//! The caller's invocation state, passed explicitly into every resolution.

use std::collections::HashMap;
use std::fmt;

use crate::binding::BoundObject;
use crate::context::IvmContext;

/// Bean lifecycle phase an invocation is currently in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Bean instance construction.
    Construct,
    /// Dependency injection and context setters.
    Injection,
    PostConstruct,
    /// A business method through a component interface.
    Business,
    /// A business method through a web-service endpoint.
    BusinessWs,
    Timeout,
    AfterBegin,
    BeforeCompletion,
    AfterCompletion,
    PrePassivate,
    PostActivate,
    PreDestroy,
    Remove,
}

impl Operation {
    pub const ALL: [Operation; 13] = [
        Operation::Construct,
        Operation::Injection,
        Operation::PostConstruct,
        Operation::Business,
        Operation::BusinessWs,
        Operation::Timeout,
        Operation::AfterBegin,
        Operation::BeforeCompletion,
        Operation::AfterCompletion,
        Operation::PrePassivate,
        Operation::PostActivate,
        Operation::PreDestroy,
        Operation::Remove,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// A set of operations, used to express which phases may resolve a reference.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OperationSet(u16);

impl OperationSet {
    pub const EMPTY: OperationSet = OperationSet(0);

    /// Every phase except construction.
    pub const ENC_ACCESS: OperationSet = OperationSet::of(&[
        Operation::Injection,
        Operation::PostConstruct,
        Operation::Business,
        Operation::BusinessWs,
        Operation::Timeout,
        Operation::AfterBegin,
        Operation::BeforeCompletion,
        Operation::AfterCompletion,
        Operation::PrePassivate,
        Operation::PostActivate,
        Operation::PreDestroy,
        Operation::Remove,
    ]);

    /// Phases where resource managers and other beans may be used.
    pub const RESOURCE_ACCESS: OperationSet = OperationSet::of(&[
        Operation::PostConstruct,
        Operation::Business,
        Operation::BusinessWs,
        Operation::Timeout,
        Operation::AfterBegin,
        Operation::BeforeCompletion,
        Operation::PrePassivate,
        Operation::PostActivate,
        Operation::PreDestroy,
        Operation::Remove,
    ]);

    /// Business methods only.
    pub const BUSINESS: OperationSet =
        OperationSet::of(&[Operation::Business, Operation::BusinessWs, Operation::Timeout]);

    pub const fn of(operations: &[Operation]) -> OperationSet {
        let mut bits = 0u16;
        let mut i = 0;
        while i < operations.len() {
            bits |= operations[i].bit();
            i += 1;
        }
        OperationSet(bits)
    }

    pub const fn contains(self, operation: Operation) -> bool {
        self.0 & operation.bit() != 0
    }

    pub const fn with(self, operation: Operation) -> OperationSet {
        OperationSet(self.0 | operation.bit())
    }

    pub fn iter(self) -> impl Iterator<Item = Operation> {
        Operation::ALL.into_iter().filter(move |op| self.contains(*op))
    }
}

impl fmt::Debug for OperationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Whether the current invocation is copying state across a boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CopyOperation {
    #[default]
    None,
    StatefulPassivation,
    CrossClassLoader,
}

/// State of the invocation on whose behalf a name is resolved.
///
/// `InvocationContext::default()` means "no invocation": ENC guards let every
/// lookup through.
#[derive(Clone, Debug, Default)]
pub struct InvocationContext {
    operation: Option<Operation>,
    application: Option<String>,
    copy: CopyOperation,
    jndi_root: Option<IvmContext>,
    entries: HashMap<String, BoundObject>,
}

impl InvocationContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(operation: Operation) -> Self {
        Self {
            operation: Some(operation),
            ..Self::default()
        }
    }

    /// The application the caller belongs to.
    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    pub fn with_copy(mut self, copy: CopyOperation) -> Self {
        self.copy = copy;
        self
    }

    /// JNDI root of the deployment the caller runs in; `java:` names resolve here.
    pub fn with_jndi_root(mut self, root: IvmContext) -> Self {
        self.jndi_root = Some(root);
        self
    }

    /// Adds an entry readable through invocation-scoped references.
    pub fn with_entry(mut self, key: impl Into<String>, value: BoundObject) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn set_operation(&mut self, operation: Option<Operation>) {
        self.operation = operation;
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub fn application(&self) -> Option<&str> {
        self.application.as_deref()
    }

    pub fn copy(&self) -> CopyOperation {
        self.copy
    }

    pub fn jndi_root(&self) -> Option<&IvmContext> {
        self.jndi_root.as_ref()
    }

    pub fn entry(&self, key: &str) -> Option<&BoundObject> {
        self.entries.get(key)
    }
}
