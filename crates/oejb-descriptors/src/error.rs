pub type Result<T> = std::result::Result<T, DescriptorError>;

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("failed to parse {descriptor}: {source}")]
    Xml {
        descriptor: &'static str,
        #[source]
        source: roxmltree::Error,
    },

    #[error("invalid {descriptor}: {reason}")]
    Invalid {
        descriptor: &'static str,
        reason: String,
    },

    #[error("cannot merge beans.xml from {url}: {reason}")]
    Merge { url: String, reason: String },
}

impl DescriptorError {
    pub(crate) fn invalid(descriptor: &'static str, reason: impl Into<String>) -> Self {
        DescriptorError::Invalid {
            descriptor,
            reason: reason.into(),
        }
    }
}
