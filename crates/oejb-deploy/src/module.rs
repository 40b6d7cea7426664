//! The in-memory application module graph produced by archive processing.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use oejb_archive::{ArchiveClassLoader, Asset, ResourceLoader, ResourceUrl};
use oejb_descriptors::{CompositeBeans, EjbJar, OpenejbJar, Properties, WebApp};
use serde::Serialize;

use crate::finder::ClassFinder;

/// Prefix of the module aggregating an enterprise archive's library beans.
pub const EAR_SCOPED_CDI_BEANS: &str = "ear-scoped-cdi-beans_";

/// Raw descriptor content still held by its archive.
#[derive(Clone)]
pub struct DescriptorSource {
    origin: String,
    asset: Asset,
}

impl fmt::Debug for DescriptorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DescriptorSource({})", self.origin)
    }
}

impl DescriptorSource {
    pub fn new(origin: impl Into<String>, asset: Asset) -> Self {
        Self {
            origin: origin.into(),
            asset,
        }
    }

    /// Where the descriptor came from, e.g. `archive:app.jar/META-INF/resources.xml`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn read_to_string(&self) -> oejb_archive::Result<String> {
        self.asset.read_to_string()
    }
}

/// An alternate deployment descriptor, keyed by file name in a module.
#[derive(Clone, Debug)]
pub enum AltDescriptor {
    Source(DescriptorSource),
    /// Descriptors left on disk.
    Urls(Vec<ResourceUrl>),
    Beans(CompositeBeans),
    Properties(Properties),
}

impl AltDescriptor {
    pub fn as_properties(&self) -> Option<&Properties> {
        match self {
            AltDescriptor::Properties(properties) => Some(properties),
            _ => None,
        }
    }

    pub fn as_beans(&self) -> Option<&CompositeBeans> {
        match self {
            AltDescriptor::Beans(beans) => Some(beans),
            _ => None,
        }
    }

    pub fn as_source(&self) -> Option<&DescriptorSource> {
        match self {
            AltDescriptor::Source(source) => Some(source),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AltDescriptor::Source(source) => source.origin().to_owned(),
            AltDescriptor::Urls(urls) => urls
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            AltDescriptor::Beans(beans) => format!("{} merged beans.xml", beans.len()),
            AltDescriptor::Properties(properties) => format!("{} properties", properties.len()),
        }
    }
}

pub type AltDescriptors = BTreeMap<String, AltDescriptor>;

#[derive(Clone)]
pub struct EjbModule {
    pub module_id: String,
    pub ejb_jar: EjbJar,
    pub openejb_jar: OpenejbJar,
    pub beans: Option<CompositeBeans>,
    pub alt_dds: AltDescriptors,
    pub properties: Properties,
    pub finder: Option<Arc<ClassFinder>>,
    pub class_loader: Option<Arc<dyn ResourceLoader>>,
    pub webapp: bool,
}

impl fmt::Debug for EjbModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EjbModule")
            .field("module_id", &self.module_id)
            .field("beans", &self.ejb_jar.enterprise_beans().len())
            .field("alt_dds", &self.alt_dds.keys().collect::<Vec<_>>())
            .field("webapp", &self.webapp)
            .finish()
    }
}

impl EjbModule {
    pub fn new(module_id: impl Into<String>, ejb_jar: EjbJar, openejb_jar: OpenejbJar) -> Self {
        Self {
            module_id: module_id.into(),
            ejb_jar,
            openejb_jar,
            beans: None,
            alt_dds: AltDescriptors::new(),
            properties: Properties::new(),
            finder: None,
            class_loader: None,
            webapp: false,
        }
    }

    pub fn alt_dd(&self, name: &str) -> Option<&AltDescriptor> {
        self.alt_dds.get(name)
    }

    pub fn is_test_module(&self) -> bool {
        self.properties.get("openejb.test.module") == Some("true")
    }
}

#[derive(Clone)]
pub struct WebModule {
    pub module_id: String,
    pub context_root: String,
    pub web_app: WebApp,
    pub class_loader: Arc<ArchiveClassLoader>,
    pub urls: Vec<PathBuf>,
    pub scannable_urls: Vec<PathBuf>,
    pub finder: Option<Arc<ClassFinder>>,
}

impl fmt::Debug for WebModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebModule")
            .field("module_id", &self.module_id)
            .field("context_root", &self.context_root)
            .finish()
    }
}

impl WebModule {
    pub fn new(
        web_app: WebApp,
        context_root: impl Into<String>,
        class_loader: Arc<ArchiveClassLoader>,
        module_id: impl Into<String>,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            context_root: context_root.into(),
            web_app,
            class_loader,
            urls: Vec::new(),
            scannable_urls: Vec::new(),
            finder: None,
        }
    }
}

/// An application: its class loader and the EJB and web modules it contains.
#[derive(Clone)]
pub struct AppModule {
    pub module_id: String,
    pub archive_name: String,
    pub class_loader: Arc<ArchiveClassLoader>,
    pub ejb_modules: Vec<EjbModule>,
    pub web_modules: Vec<WebModule>,
    pub alt_dds: AltDescriptors,
    pub additional_libraries: Vec<PathBuf>,
    pub ear_lib_finder: Option<Arc<ClassFinder>>,
    pub delegate_first: bool,
    pub standalone_module: bool,
}

impl fmt::Debug for AppModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppModule")
            .field("module_id", &self.module_id)
            .field("ejb_modules", &self.ejb_modules)
            .field("web_modules", &self.web_modules)
            .finish()
    }
}

impl AppModule {
    /// The module id is the archive name without its `.jar`/`.war`/`.ear` extension.
    pub fn new(class_loader: Arc<ArchiveClassLoader>, archive_name: impl Into<String>) -> Self {
        let archive_name = archive_name.into();
        Self {
            module_id: module_id_for(&archive_name),
            archive_name,
            class_loader,
            ejb_modules: Vec::new(),
            web_modules: Vec::new(),
            alt_dds: AltDescriptors::new(),
            additional_libraries: Vec::new(),
            ear_lib_finder: None,
            delegate_first: true,
            standalone_module: false,
        }
    }

    pub fn is_webapp(&self) -> bool {
        !self.web_modules.is_empty()
    }

    pub fn ejb_module(&self, module_id: &str) -> Option<&EjbModule> {
        self.ejb_modules.iter().find(|m| m.module_id == module_id)
    }

    pub fn summary(&self) -> AppSummary {
        AppSummary {
            module_id: self.module_id.clone(),
            archive: self.archive_name.clone(),
            standalone: self.standalone_module,
            ejb_modules: self
                .ejb_modules
                .iter()
                .map(|module| EjbModuleSummary {
                    module_id: module.module_id.clone(),
                    webapp: module.webapp,
                    test_module: module.is_test_module(),
                    enterprise_beans: module
                        .ejb_jar
                        .enterprise_beans()
                        .iter()
                        .map(|bean| bean.ejb_name.clone())
                        .collect(),
                    scanned_classes: module
                        .finder
                        .as_ref()
                        .map(|finder| finder.classes().len())
                        .unwrap_or(0),
                    beans_urls: module
                        .beans
                        .as_ref()
                        .map(|beans| beans.urls().map(str::to_owned).collect())
                        .unwrap_or_default(),
                    alt_dds: module
                        .alt_dds
                        .iter()
                        .map(|(name, dd)| (name.clone(), dd.describe()))
                        .collect(),
                })
                .collect(),
            web_modules: self
                .web_modules
                .iter()
                .map(|module| WebModuleSummary {
                    module_id: module.module_id.clone(),
                    context_root: module.context_root.clone(),
                    servlets: module.web_app.servlets.len(),
                })
                .collect(),
            additional_libraries: self.additional_libraries.clone(),
        }
    }
}

fn module_id_for(archive_name: &str) -> String {
    let lower = archive_name.to_ascii_lowercase();
    [".jar", ".war", ".ear"]
        .iter()
        .find(|ext| lower.ends_with(*ext) && archive_name.len() > ext.len())
        .map(|ext| archive_name[..archive_name.len() - ext.len()].to_owned())
        .unwrap_or_else(|| archive_name.to_owned())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppSummary {
    pub module_id: String,
    pub archive: String,
    pub standalone: bool,
    pub ejb_modules: Vec<EjbModuleSummary>,
    pub web_modules: Vec<WebModuleSummary>,
    pub additional_libraries: Vec<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EjbModuleSummary {
    pub module_id: String,
    pub webapp: bool,
    pub test_module: bool,
    pub enterprise_beans: Vec<String>,
    pub scanned_classes: usize,
    pub beans_urls: Vec<String>,
    pub alt_dds: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebModuleSummary {
    pub module_id: String,
    pub context_root: String,
    pub servlets: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_ids_drop_archive_extensions() {
        assert_eq!(module_id_for("shop.war"), "shop");
        assert_eq!(module_id_for("orders.JAR"), "orders");
        assert_eq!(module_id_for("bundle"), "bundle");
        assert_eq!(module_id_for(".jar"), ".jar");
    }
}
