pub type Result<T> = std::result::Result<T, NamingError>;

/// Errors produced by the naming subsystem.
///
/// Lifecycle denials from ENC references surface as [`NamingError::NotFound`] so
/// callers cannot tell a denied entry from an absent one.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NamingError {
    #[error("Name \"{name}\" not found.")]
    NotFound { name: String },

    #[error("Name \"{name}\" is already bound")]
    AlreadyBound { name: String },

    #[error("operation `{operation}` is not supported by the intra-VM naming tree")]
    NotSupported { operation: &'static str },

    #[error("Name \"{name}\" is not bound to a context")]
    NotContext { name: String },

    #[error("invalid name \"{name}\"")]
    InvalidName { name: String },

    #[error("Unknown JNDI name prefix '{prefix}:'")]
    UnknownScheme { prefix: String },

    #[error("IntraVM naming contexts can not be passed as arguments")]
    NotSerializable,

    #[error("no active deployment to rebind \"{path}\" against")]
    NoActiveDeployment { path: String },

    #[error("reference chain for \"{name}\" exceeds {limit} hops")]
    ReferenceDepth { name: String, limit: usize },

    #[error("naming tree is full; can't bind \"{name}\"")]
    TreeFull { name: String },

    #[error("external context \"{context}\" failed: {message}")]
    External { context: String, message: String },
}

impl NamingError {
    pub fn not_found(name: impl Into<String>) -> Self {
        NamingError::NotFound { name: name.into() }
    }

    pub fn already_bound(name: impl Into<String>) -> Self {
        NamingError::AlreadyBound { name: name.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, NamingError::NotFound { .. })
    }
}
