use serde::{Deserialize, Serialize};

use crate::context::IvmContext;
use crate::error::{NamingError, Result};
use crate::invocation::InvocationContext;

/// Serialized stand-in for an [`IvmContext`]: only the context's path travels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JndiEncArtifact {
    path: String,
}

impl JndiEncArtifact {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Re-resolves the path against the JNDI root of the invocation's deployment.
    pub fn read_resolve(&self, invocation: &InvocationContext) -> Result<IvmContext> {
        let root = invocation
            .jndi_root()
            .ok_or_else(|| NamingError::NoActiveDeployment {
                path: self.path.clone(),
            })?
            .root_context();
        root.lookup_context(&self.path, invocation)
    }
}
