use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use oejb_archive::{Archive, ArchiveRegistry, BootstrapLoader, ResourceLoader};
use oejb_config::ContainerConfig;
use oejb_naming::{FederationRegistry, InvocationContext, IvmContext, NamingObject, NamingServices};
use parking_lot::Mutex;

use crate::assembler::{DefaultAssembler, JndiAssembler};
use crate::closeables::Closeables;
use crate::error::{DeployErrorKind, DeploymentError, Result};
use crate::module::{AppModule, AppSummary};
use crate::processor::{ArchiveProcessor, TestClass};

/// A live deployment: its module graph, JNDI tree and scoped resources.
pub struct DeploymentInfo {
    archive_name: String,
    app: AppModule,
    jndi: IvmContext,
    closeables: Closeables,
}

impl fmt::Debug for DeploymentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentInfo")
            .field("archive_name", &self.archive_name)
            .field("app", &self.app)
            .field("closeables", &self.closeables)
            .finish_non_exhaustive()
    }
}

impl DeploymentInfo {
    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    pub fn app(&self) -> &AppModule {
        &self.app
    }

    pub fn summary(&self) -> AppSummary {
        self.app.summary()
    }

    pub fn jndi_context(&self) -> &IvmContext {
        &self.jndi
    }

    /// Invocation context of a caller running inside this application.
    pub fn invocation(&self) -> InvocationContext {
        InvocationContext::none()
            .with_application(self.app.module_id.clone())
            .with_jndi_root(self.jndi.clone())
    }

    /// Looks `name` up in the deployment's JNDI tree on behalf of the application.
    pub fn lookup(&self, name: &str) -> oejb_naming::Result<NamingObject> {
        self.jndi.lookup(name, &self.invocation())
    }
}

/// Deploys archives into an embedded container.
///
/// Deployments are cached by archive name: deploying a name that is already
/// deployed returns the existing deployment.
pub struct DeployableContainer {
    registry: Arc<ArchiveRegistry>,
    naming: Arc<NamingServices>,
    parent: Arc<dyn ResourceLoader>,
    processor: ArchiveProcessor,
    assembler: Box<dyn JndiAssembler>,
    deployments: Mutex<HashMap<String, Arc<DeploymentInfo>>>,
    started: AtomicBool,
}

impl fmt::Debug for DeployableContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployableContainer")
            .field("deployments", &self.deployment_names())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl DeployableContainer {
    pub fn new(config: &ContainerConfig) -> Self {
        let registry = Arc::new(ArchiveRegistry::new());
        Self {
            naming: Arc::new(NamingServices::from_config(&config.naming, FederationRegistry::new())),
            parent: Arc::new(BootstrapLoader),
            processor: ArchiveProcessor::new(
                registry.clone(),
                config.classloader.clone(),
                config.deployment.clone(),
            ),
            registry,
            assembler: Box::new(DefaultAssembler),
            deployments: Mutex::new(HashMap::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Uses `naming` instead of services built from configuration.
    pub fn with_naming(mut self, naming: Arc<NamingServices>) -> Self {
        self.naming = naming;
        self
    }

    /// Loader consulted before the deployed archives, e.g. the container's class path.
    pub fn with_parent(mut self, parent: Arc<dyn ResourceLoader>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_assembler(mut self, assembler: impl JndiAssembler + 'static) -> Self {
        self.assembler = Box::new(assembler);
        self
    }

    pub fn registry(&self) -> &Arc<ArchiveRegistry> {
        &self.registry
    }

    pub fn naming(&self) -> &Arc<NamingServices> {
        &self.naming
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn start(&self) {
        if !self.started.swap(true, Ordering::AcqRel) {
            tracing::info!(target: "oejb.deploy", "container started");
        }
    }

    /// Undeploys everything and stops accepting deployments.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::AcqRel) {
            return;
        }
        let deployments: Vec<_> = self.deployments.lock().drain().map(|(_, info)| info).collect();
        for info in deployments {
            self.release(&info);
        }
        tracing::info!(target: "oejb.deploy", "container stopped");
    }

    pub fn deployment(&self, archive_name: &str) -> Option<Arc<DeploymentInfo>> {
        self.deployments.lock().get(archive_name).cloned()
    }

    pub fn deployment_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.deployments.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn deploy(&self, archive: impl Into<Arc<Archive>>, test_class: Option<&TestClass>) -> Result<Arc<DeploymentInfo>> {
        let archive: Arc<Archive> = archive.into();
        let name = archive.name().to_owned();
        if !self.is_started() {
            return Err(DeploymentError::new(name, DeployErrorKind::NotStarted));
        }
        if let Some(existing) = self.deployment(&name) {
            tracing::debug!(target: "oejb.deploy", archive = %name, "archive already deployed");
            return Ok(existing);
        }

        let closeables = Closeables::new();
        let app = match self
            .processor
            .create_module(archive, test_class, self.parent.clone(), &closeables)
        {
            Ok(app) => app,
            Err(err) => {
                closeables.close();
                return Err(err);
            }
        };

        let jndi = IvmContext::with_services(self.naming.clone());
        if let Err(err) = self.assembler.assemble(&app, &jndi) {
            closeables.close();
            return Err(DeploymentError::new(name, err));
        }

        let info = Arc::new(DeploymentInfo {
            archive_name: name.clone(),
            app,
            jndi,
            closeables,
        });
        match self.deployments.lock().entry(name.clone()) {
            Entry::Occupied(existing) => {
                // Lost a race against a concurrent deploy of the same name.
                info.closeables.close();
                return Ok(existing.get().clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(info.clone());
            }
        }
        self.naming.register_application(info.app.module_id.clone());
        tracing::info!(
            target: "oejb.deploy",
            archive = %name,
            ejb_modules = info.app.ejb_modules.len(),
            web_modules = info.app.web_modules.len(),
            "deployed archive"
        );
        Ok(info)
    }

    /// Closes the deployment's resources in reverse registration order.
    pub fn undeploy(&self, archive_name: &str) -> Result<()> {
        let Some(info) = self.deployments.lock().remove(archive_name) else {
            return Err(DeploymentError::new(archive_name, DeployErrorKind::NotDeployed));
        };
        self.release(&info);
        Ok(())
    }

    fn release(&self, info: &DeploymentInfo) {
        self.naming.unregister_application(&info.app.module_id);
        let failures = info.closeables.close();
        tracing::info!(
            target: "oejb.deploy",
            archive = %info.archive_name,
            failures,
            "undeployed archive"
        );
    }
}

impl Drop for DeployableContainer {
    fn drop(&mut self) {
        self.stop();
    }
}
