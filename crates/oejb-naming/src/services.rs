use std::collections::BTreeSet;

use oejb_config::NamingConfig;
use parking_lot::RwLock;

use crate::federation::{ExternalContexts, FederationRegistry};

/// Tunables read by naming contexts at resolution time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NamingSettings {
    /// Upper bound on chained reference/link hops for a single lookup.
    pub max_reference_depth: usize,
    /// Whether writes to a read-only context fail instead of being ignored.
    pub exception_on_failed_write: bool,
}

impl Default for NamingSettings {
    fn default() -> Self {
        Self::from(&NamingConfig::default())
    }
}

impl From<&NamingConfig> for NamingSettings {
    fn from(config: &NamingConfig) -> Self {
        Self {
            max_reference_depth: config.max_reference_depth.max(1),
            exception_on_failed_write: config.exception_on_failed_write,
        }
    }
}

/// Collaborators shared by every context of one container instance.
///
/// Replaces process-wide registries: two containers in one process each own
/// their own `NamingServices`.
#[derive(Debug, Default)]
pub struct NamingServices {
    settings: NamingSettings,
    federation: FederationRegistry,
    externals: ExternalContexts,
    applications: RwLock<BTreeSet<String>>,
}

impl NamingServices {
    pub fn new(settings: NamingSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Builds services from configuration, activating the configured federation
    /// tags out of `federation`.
    pub fn from_config(config: &NamingConfig, federation: FederationRegistry) -> Self {
        federation.activate(&config.federation);
        Self {
            settings: NamingSettings::from(config),
            federation,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> NamingSettings {
        self.settings
    }

    pub fn federation(&self) -> &FederationRegistry {
        &self.federation
    }

    pub fn external_contexts(&self) -> &ExternalContexts {
        &self.externals
    }

    /// Marks `application` as live; contextual references resolve under its prefix.
    pub fn register_application(&self, application: impl Into<String>) {
        self.applications.write().insert(application.into());
    }

    pub fn unregister_application(&self, application: &str) -> bool {
        self.applications.write().remove(application)
    }

    pub fn is_live_application(&self, application: &str) -> bool {
        self.applications.read().contains(application)
    }

    pub fn live_applications(&self) -> Vec<String> {
        self.applications.read().iter().cloned().collect()
    }
}
