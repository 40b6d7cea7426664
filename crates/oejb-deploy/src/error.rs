use oejb_archive::ArchiveError;
use oejb_descriptors::DescriptorError;
use oejb_naming::NamingError;

pub type Result<T> = std::result::Result<T, DeploymentError>;

/// A failed deployment operation, naming the archive it concerned.
#[derive(Debug, thiserror::Error)]
#[error("deployment of {archive} failed: {kind}")]
pub struct DeploymentError {
    pub archive: String,
    #[source]
    pub kind: DeployErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum DeployErrorKind {
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("naming error: {0}")]
    Naming(#[from] NamingError),

    #[error("container is not started")]
    NotStarted,

    #[error("nothing is deployed under this name")]
    NotDeployed,
}

impl DeploymentError {
    pub fn new(archive: impl Into<String>, kind: impl Into<DeployErrorKind>) -> Self {
        Self {
            archive: archive.into(),
            kind: kind.into(),
        }
    }

    /// Adapter for `map_err` that attaches the archive name.
    pub(crate) fn wrap<E: Into<DeployErrorKind>>(archive: &str) -> impl FnOnce(E) -> Self + '_ {
        move |err| Self::new(archive, err)
    }
}
