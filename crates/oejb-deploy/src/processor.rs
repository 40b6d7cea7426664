//! Turns a deployment archive into an [`AppModule`].
//!
//! Plain jars and web archives produce one EJB module (plus an optional test
//! module). Enterprise archives produce an ear-scoped CDI module for their
//! libraries and a web module with a paired EJB module per nested war.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use oejb_archive::{
    Archive, ArchiveClassLoader, ArchiveKind, ArchiveRegistry, Asset, ClasspathEntry,
    LoadedClass, PathClassLoader, ResourceLoader, ResourceUrl,
};
use oejb_config::{ClassLoaderConfig, DeploymentConfig};
use oejb_descriptors::names::{
    BEANS_XML, EJB_JAR_XML, ENV_ENTRIES_PROPERTIES, OPENEJB_JAR_XML, PERSISTENCE_XML,
    RESOURCES_XML, VALIDATION_XML, WEB_XML,
};
use oejb_descriptors::{
    CompositeBeans, DescriptorError, EjbJar, EnterpriseBean, OpenejbJar, Properties,
    TransactionType, WebApp,
};
use regex::Regex;

use crate::closeables::Closeables;
use crate::error::{DeployErrorKind, DeploymentError, Result};
use crate::finder::{load_classes, ClassFinder};
use crate::module::{
    AltDescriptor, AltDescriptors, AppModule, DescriptorSource, EjbModule, WebModule,
    EAR_SCOPED_CDI_BEANS,
};

const META_INF: &str = "/META-INF/";
const WEB_INF: &str = "/WEB-INF/";
const WEB_INF_CLASSES_META_INF: &str = "/WEB-INF/classes/META-INF/";

/// Key of the main archive's `beans.xml`; no host so the key never resolves.
pub const MAIN_BEANS_XML_URL: &str = "jar:file://!/WEB-INF/beans.xml";

/// The test class made injectable as a managed bean of the deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestClass {
    pub name: String,
}

impl TestClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Synthetic URL identifying a library inside the deployment, suffixed with
/// its `beans.xml` path when it is a bean archive.
pub fn library_url(library: &str, has_beans_xml: bool) -> String {
    if has_beans_xml {
        format!("jar:file://!/lib/{library}!/META-INF/beans.xml")
    } else {
        format!("jar:file://!/lib/{library}")
    }
}

/// What library analysis gathered from an archive's nested jars.
#[derive(Default)]
struct LibraryScan {
    additional_paths: Vec<PathBuf>,
    archives: Vec<Arc<Archive>>,
    beans: CompositeBeans,
    /// Class names per library URL; resolved once the class loader exists.
    pending_classes: Vec<(String, Arc<Archive>)>,
    classes_by_url: BTreeMap<String, Vec<String>>,
    alt_dds: AltDescriptors,
}

impl LibraryScan {
    /// Loads the pending library classes through `loader`, keeping only the
    /// names that loaded.
    fn load_classes(&mut self, loader: &Arc<dyn ResourceLoader>) -> Vec<LoadedClass> {
        let mut all = Vec::new();
        for (url, archive) in std::mem::take(&mut self.pending_classes) {
            let loaded = load_classes(&archive, loader);
            self.classes_by_url
                .entry(url)
                .or_default()
                .extend(loaded.iter().map(|class| class.name.clone()));
            all.extend(loaded);
        }
        all
    }
}

#[derive(Clone, Debug)]
pub struct ArchiveProcessor {
    registry: Arc<ArchiveRegistry>,
    loader_config: ClassLoaderConfig,
    config: DeploymentConfig,
}

impl ArchiveProcessor {
    pub fn new(
        registry: Arc<ArchiveRegistry>,
        loader_config: ClassLoaderConfig,
        config: DeploymentConfig,
    ) -> Self {
        Self {
            registry,
            loader_config,
            config,
        }
    }

    /// Assembles the application module for `archive`.
    ///
    /// Every class loader created on the way is registered in `closeables`.
    pub fn create_module(
        &self,
        archive: Arc<Archive>,
        test_class: Option<&TestClass>,
        parent: Arc<dyn ResourceLoader>,
        closeables: &Closeables,
    ) -> Result<AppModule> {
        let name = archive.name().to_owned();
        let kind = archive.kind();
        let prefix = kind.descriptor_dir();
        let test_class = test_class.filter(|_| self.config.scan_test_class);

        let mut libs = LibraryScan::default();
        // Plain jars may bundle libraries too; they are scanned like ear libraries.
        let library_pattern = match kind {
            ArchiveKind::War => web_libraries(),
            ArchiveKind::Jar | ArchiveKind::Ear => bundled_libraries(),
        };
        self.analyze_libs(&archive, library_pattern, &mut libs)
            .map_err(DeploymentError::wrap(&name))?;

        let path_loader = Arc::new(PathClassLoader::with_entries(
            Some(parent.clone()),
            libs.additional_paths.iter().cloned().map(ClasspathEntry::Jar),
        ));
        closeables.add(path_loader.clone());

        let mut loader_archives = libs.archives.clone();
        if kind != ArchiveKind::Ear {
            loader_archives.push(archive.clone());
        }
        let loader = Arc::new(ArchiveClassLoader::new(
            self.registry.clone(),
            path_loader,
            loader_archives,
            &self.loader_config,
        ));
        closeables.add(loader.clone());
        let dyn_loader: Arc<dyn ResourceLoader> = loader.clone();
        let lib_classes = libs.load_classes(&dyn_loader);

        let mut app = AppModule::new(loader.clone(), &name);
        match kind {
            ArchiveKind::War => {
                app.delegate_first = false;
                app.standalone_module = true;
                let mut web = WebModule::new(
                    create_web_app(&archive),
                    context_root(&name),
                    loader.clone(),
                    app.module_id.clone(),
                );
                web.urls = libs.additional_paths.clone();
                app.web_modules.push(web);
            }
            ArchiveKind::Ear => {
                self.add_ear_modules(&archive, &mut app, &libs, lib_classes, &parent, closeables)
                    .map_err(DeploymentError::wrap(&name))?;
                if let Some(test_class) = test_class {
                    add_test_class_as_managed_bean(test_class, &dyn_loader, &mut app);
                }
                return Ok(app);
            }
            ArchiveKind::Jar => {}
        }

        let test_module = test_class
            .map(|test_class| add_test_class_as_managed_bean(test_class, &dyn_loader, &mut app));

        let mut ejb_jar = create_ejb_jar(prefix, &archive).map_err(DeploymentError::wrap(&name))?;
        let module_name = ejb_jar
            .module_name
            .get_or_insert_with(|| default_module_name(&name))
            .clone();
        let mut ejb_module = EjbModule::new(module_name, ejb_jar, OpenejbJar::new());
        ejb_module.class_loader = Some(dyn_loader.clone());

        let beans_xml = find_beans_xml(&archive, prefix);
        let finder = finder_archive(
            beans_xml,
            &archive,
            &dyn_loader,
            lib_classes,
            std::mem::take(&mut libs.classes_by_url),
            &mut libs.beans,
        )
        .map_err(DeploymentError::wrap(&name))?;
        let finder = Arc::new(finder);
        ejb_module.finder = Some(finder.clone());
        ejb_module.beans = Some(libs.beans.clone());
        ejb_module
            .alt_dds
            .insert(BEANS_XML.to_owned(), AltDescriptor::Beans(libs.beans.clone()));
        ejb_module.alt_dds.extend(std::mem::take(&mut libs.alt_dds));

        if let Some(web) = app.web_modules.first_mut() {
            web.finder = Some(finder);
        }

        add_persistence_xml(&archive, prefix, &mut app.alt_dds);
        add_openejb_jar_xml(&archive, prefix, &mut ejb_module);
        let validation = find_validation_xml(&archive, prefix);
        if let (Some(source), Some(idx)) = (&validation, test_module) {
            app.ejb_modules[idx]
                .alt_dds
                .insert(VALIDATION_XML.to_owned(), AltDescriptor::Source(source.clone()));
        }
        if let Some(source) = validation {
            ejb_module
                .alt_dds
                .insert(VALIDATION_XML.to_owned(), AltDescriptor::Source(source));
        }
        add_resources_xml(&archive, prefix, &mut ejb_module);
        app.ejb_modules.push(ejb_module);
        let main = app.ejb_modules.len() - 1;
        add_env_entries(&archive, prefix, &mut app, main);

        if !app.is_webapp() {
            app.additional_libraries.extend(libs.additional_paths);
        }
        if name.ends_with(".jar") {
            app.standalone_module = true;
        }

        tracing::debug!(
            target: "oejb.deploy",
            archive = %name,
            ejb_modules = app.ejb_modules.len(),
            web_modules = app.web_modules.len(),
            "created application module"
        );
        Ok(app)
    }

    /// Scans the nested jars of `archive` matching `pattern`.
    ///
    /// In-memory libraries become class loader archives and contribute their
    /// `beans.xml` and `ejb-jar.xml`; libraries left on disk go onto the
    /// parent class path.
    fn analyze_libs(
        &self,
        archive: &Archive,
        pattern: &Regex,
        scan: &mut LibraryScan,
    ) -> oejb_descriptors::Result<()> {
        for (path, asset) in archive.content_matching(pattern) {
            match asset {
                Asset::Archive(library) => {
                    if self.config.is_excluded(library.name()) {
                        tracing::debug!(target: "oejb.deploy", library = %library.name(), "skipping excluded library");
                    } else {
                        scan.archives.push(library.clone());
                        let beans_xml = library.get(&format!("{META_INF}{BEANS_XML}"));
                        let url = library_url(library.name(), beans_xml.is_some());
                        if let Some(beans_xml) = beans_xml {
                            let text = read_descriptor(beans_xml, &url)?;
                            scan.beans.merge_text(url.clone(), &text)?;
                        }
                        scan.pending_classes.push((url, library.clone()));
                    }

                    if let Some(ejb_jar) = library.get(&format!("{META_INF}{EJB_JAR_XML}")) {
                        scan.alt_dds.insert(
                            EJB_JAR_XML.to_owned(),
                            AltDescriptor::Source(DescriptorSource::new(
                                ResourceUrl::archive(library.name(), &format!("{META_INF}{EJB_JAR_XML}")).to_string(),
                                ejb_jar.clone(),
                            )),
                        );
                    }
                }
                Asset::File(file) => self.analyze_file_library(file, scan)?,
                Asset::Bytes(_) => {
                    tracing::debug!(target: "oejb.deploy", entry = %path, "library entry is not a readable archive");
                }
            }
        }
        Ok(())
    }

    fn analyze_file_library(&self, file: &Path, scan: &mut LibraryScan) -> oejb_descriptors::Result<()> {
        scan.additional_paths.push(file.to_path_buf());
        let library = match Archive::open(file) {
            Ok(library) => library,
            Err(err) => {
                tracing::debug!(target: "oejb.deploy", library = %file.display(), error = %err, "can't read library");
                return Ok(());
            }
        };
        if let Some(beans_xml) = library.get(&format!("{META_INF}{BEANS_XML}")) {
            let url = ResourceUrl::Jar {
                jar: file.to_path_buf(),
                entry: format!("META-INF/{BEANS_XML}"),
            }
            .to_string();
            match beans_xml.read_to_string() {
                Ok(text) => scan.beans.merge_text(url.clone(), &text)?,
                Err(err) => {
                    tracing::debug!(target: "oejb.deploy", url = %url, error = %err, "can't read beans.xml");
                    return Ok(());
                }
            }
            scan.classes_by_url.insert(url, library.class_names());
        }
        Ok(())
    }

    fn add_ear_modules(
        &self,
        ear: &Archive,
        app: &mut AppModule,
        libs: &LibraryScan,
        lib_classes: Vec<LoadedClass>,
        parent: &Arc<dyn ResourceLoader>,
        closeables: &Closeables,
    ) -> std::result::Result<(), DeployErrorKind> {
        let ear_lib_finder = Arc::new(ClassFinder::new(lib_classes, libs.classes_by_url.clone()));
        app.ear_lib_finder = Some(ear_lib_finder.clone());

        let ejb_jar = match libs.alt_dds.get(EJB_JAR_XML).and_then(AltDescriptor::as_source) {
            Some(source) => EjbJar::parse(&source.read_to_string()?)?,
            None => EjbJar::new(),
        };
        let mut cdi_module = EjbModule::new(
            format!("{EAR_SCOPED_CDI_BEANS}{}", app.module_id),
            ejb_jar,
            OpenejbJar::new(),
        );
        cdi_module.beans = Some(libs.beans.clone());
        cdi_module.finder = Some(ear_lib_finder);
        cdi_module.class_loader = Some(app.class_loader.clone());
        app.ejb_modules.push(cdi_module);

        for (_, asset) in ear.content_matching(web_archives()) {
            let Some(web_archive) = asset.as_archive().filter(|a| a.kind() == ArchiveKind::War) else {
                continue;
            };
            let beans_xml = find_beans_xml(web_archive, WEB_INF);

            let mut web_libs = LibraryScan::default();
            self.analyze_libs(web_archive, web_libraries(), &mut web_libs)?;
            let mut loader_archives = web_libs.archives.clone();
            loader_archives.push(web_archive.clone());
            let web_loader = Arc::new(ArchiveClassLoader::new(
                self.registry.clone(),
                parent.clone(),
                loader_archives,
                &self.loader_config,
            ));
            closeables.add(web_loader.clone());
            let dyn_web_loader: Arc<dyn ResourceLoader> = web_loader.clone();
            let web_lib_classes = web_libs.load_classes(&dyn_web_loader);

            let finder = Arc::new(finder_archive(
                beans_xml,
                web_archive,
                &dyn_web_loader,
                web_lib_classes,
                std::mem::take(&mut web_libs.classes_by_url),
                &mut web_libs.beans,
            )?);

            let context_root = context_root(web_archive.name());
            let mut web_module = WebModule::new(
                create_web_app(web_archive),
                context_root.clone(),
                web_loader.clone(),
                format!("{}_{context_root}", app.module_id),
            );
            web_module.finder = Some(finder.clone());

            let mut ejb_module = EjbModule::new(
                web_module.module_id.clone(),
                create_ejb_jar(WEB_INF, web_archive)?,
                OpenejbJar::new(),
            );
            ejb_module.beans = Some(web_libs.beans.clone());
            ejb_module.alt_dds.extend(std::mem::take(&mut web_libs.alt_dds));
            ejb_module
                .alt_dds
                .insert(BEANS_XML.to_owned(), AltDescriptor::Beans(web_libs.beans));
            ejb_module.finder = Some(finder);
            ejb_module.class_loader = Some(dyn_web_loader);
            ejb_module.webapp = true;

            add_persistence_xml(web_archive, WEB_INF, &mut app.alt_dds);
            add_openejb_jar_xml(web_archive, WEB_INF, &mut ejb_module);
            if let Some(source) = find_validation_xml(web_archive, WEB_INF) {
                ejb_module
                    .alt_dds
                    .insert(VALIDATION_XML.to_owned(), AltDescriptor::Source(source));
            }
            add_resources_xml(web_archive, WEB_INF, &mut ejb_module);

            app.ejb_modules.push(ejb_module);
            app.web_modules.push(web_module);
            let idx = app.ejb_modules.len() - 1;
            add_env_entries(web_archive, WEB_INF, app, idx);
        }
        Ok(())
    }
}

fn bundled_libraries() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/.*\.jar$").expect("library regex should compile"))
}

fn web_libraries() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/WEB-INF/lib/.*\.jar$").expect("library regex should compile"))
}

fn web_archives() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/.*\.war$").expect("web archive regex should compile"))
}

fn read_descriptor(asset: &Asset, url: &str) -> oejb_descriptors::Result<String> {
    asset
        .read_to_string()
        .map_err(|err| DescriptorError::Merge {
            url: url.to_owned(),
            reason: err.to_string(),
        })
}

/// Module name used when `ejb-jar.xml` declares none: the archive name with
/// a four character `.?ar` extension removed.
pub fn default_module_name(archive_name: &str) -> String {
    let stem = archive_name
        .len()
        .checked_sub(4)
        .filter(|_| archive_name.len() > 4 && archive_name.ends_with("ar"))
        .and_then(|end| archive_name.get(..end));
    stem.unwrap_or(archive_name).to_owned()
}

pub fn context_root(archive_name: &str) -> String {
    archive_name
        .strip_suffix(".war")
        .unwrap_or(archive_name)
        .to_owned()
}

fn source(archive: &Archive, path: &str, asset: &Asset) -> DescriptorSource {
    DescriptorSource::new(ResourceUrl::archive(archive.name(), path).to_string(), asset.clone())
}

/// Looks `name` up in the descriptor directory, then, for web archives,
/// under `WEB-INF/classes/META-INF`.
fn find_descriptor(archive: &Archive, prefix: &str, name: &str) -> Option<(String, Asset)> {
    let primary = format!("{prefix}{name}");
    if let Some(asset) = archive.get(&primary) {
        return Some((primary, asset.clone()));
    }
    if prefix == WEB_INF {
        let fallback = format!("{WEB_INF_CLASSES_META_INF}{name}");
        return archive.get(&fallback).map(|asset| (fallback, asset.clone()));
    }
    None
}

fn find_beans_xml(archive: &Archive, prefix: &str) -> Option<Asset> {
    find_descriptor(archive, prefix, BEANS_XML).map(|(_, asset)| asset)
}

fn find_validation_xml(archive: &Archive, prefix: &str) -> Option<DescriptorSource> {
    find_descriptor(archive, prefix, VALIDATION_XML).map(|(path, asset)| source(archive, &path, &asset))
}

fn create_web_app(archive: &Archive) -> WebApp {
    let Some(asset) = archive.get(&format!("{WEB_INF}{WEB_XML}")) else {
        return WebApp::default();
    };
    match asset.read_to_string() {
        Ok(text) => WebApp::parse_or_default(&text),
        Err(err) => {
            tracing::debug!(target: "oejb.deploy", archive = %archive.name(), error = %err, "can't read web.xml");
            WebApp::default()
        }
    }
}

fn create_ejb_jar(prefix: &str, archive: &Archive) -> std::result::Result<EjbJar, DeployErrorKind> {
    match archive.get(&format!("{prefix}{EJB_JAR_XML}")) {
        Some(asset) => Ok(EjbJar::parse(&asset.read_to_string()?)?),
        None => Ok(EjbJar::new()),
    }
}

/// Adds the managed bean wrapping the test class as its own EJB module and
/// returns that module's index.
fn add_test_class_as_managed_bean(
    test_class: &TestClass,
    loader: &Arc<dyn ResourceLoader>,
    app: &mut AppModule,
) -> usize {
    let ejb_name = format!("{}_{}", app.module_id, test_class.name);
    let mut ejb_jar = EjbJar::new();
    let mut openejb_jar = OpenejbJar::new();
    let bean = ejb_jar.add_enterprise_bean(
        EnterpriseBean::managed(ejb_name.clone(), test_class.name.clone(), true)
            .local_bean()
            .with_transaction_type(TransactionType::Bean),
    );
    openejb_jar.add_ejb_deployment(bean).deployment_id = Some(ejb_name.clone());

    let mut module = EjbModule::new(ejb_name, ejb_jar, openejb_jar);
    module.properties.set("openejb.cdi.activated", "false");
    module.properties.set("openejb.test.module", "true");
    module.beans = Some(CompositeBeans::new());
    module.class_loader = Some(loader.clone());
    app.ejb_modules.push(module);
    app.ejb_modules.len() - 1
}

/// Builds the class view of `archive`: its own classes loaded through
/// `loader`, plus the library classes. The archive's `beans.xml`, if any, is
/// merged under [`MAIN_BEANS_XML_URL`].
fn finder_archive(
    beans_xml: Option<Asset>,
    archive: &Archive,
    loader: &Arc<dyn ResourceLoader>,
    lib_classes: Vec<LoadedClass>,
    mut classes_by_url: BTreeMap<String, Vec<String>>,
    beans: &mut CompositeBeans,
) -> oejb_descriptors::Result<ClassFinder> {
    let mut classes = load_classes(archive, loader);
    if let Some(beans_xml) = beans_xml {
        let text = read_descriptor(&beans_xml, MAIN_BEANS_XML_URL)?;
        beans.merge_text(MAIN_BEANS_XML_URL, &text)?;
        classes_by_url.insert(
            MAIN_BEANS_XML_URL.to_owned(),
            classes.iter().map(|class| class.name.clone()).collect(),
        );
    }
    classes.extend(lib_classes);
    Ok(ClassFinder::new(classes, classes_by_url))
}

fn add_persistence_xml(archive: &Archive, prefix: &str, alt_dds: &mut AltDescriptors) {
    let Some((path, asset)) = find_descriptor(archive, prefix, PERSISTENCE_XML) else {
        return;
    };
    let descriptor = match &asset {
        Asset::File(file) => AltDescriptor::Urls(vec![ResourceUrl::File(file.clone())]),
        _ => AltDescriptor::Source(source(archive, &path, &asset)),
    };
    alt_dds.insert(PERSISTENCE_XML.to_owned(), descriptor);
}

fn add_openejb_jar_xml(archive: &Archive, prefix: &str, module: &mut EjbModule) {
    let path = format!("{prefix}{OPENEJB_JAR_XML}");
    if let Some(asset) = archive.get(&path) {
        module.alt_dds.insert(
            OPENEJB_JAR_XML.to_owned(),
            AltDescriptor::Source(source(archive, &path, asset)),
        );
    }
}

fn add_resources_xml(archive: &Archive, prefix: &str, module: &mut EjbModule) {
    let path = format!("{prefix}{RESOURCES_XML}");
    if let Some(asset) = archive.get(&path) {
        module.alt_dds.insert(
            RESOURCES_XML.to_owned(),
            AltDescriptor::Source(source(archive, &path, asset)),
        );
    }
}

/// Attaches `env-entries.properties` to `app.ejb_modules[module]` and to the
/// application's first EJB module. Unreadable files are logged and skipped.
fn add_env_entries(archive: &Archive, prefix: &str, app: &mut AppModule, module: usize) {
    let Some(asset) = archive.get(&format!("{prefix}{ENV_ENTRIES_PROPERTIES}")) else {
        return;
    };
    let properties = match asset.read_to_string() {
        Ok(text) => Properties::parse(&text),
        Err(err) => {
            tracing::error!(target: "oejb.deploy", archive = %archive.name(), error = %err, "can't read env-entries.properties");
            return;
        }
    };
    for idx in [module, 0] {
        if let Some(target) = app.ejb_modules.get_mut(idx) {
            target.alt_dds.insert(
                ENV_ENTRIES_PROPERTIES.to_owned(),
                AltDescriptor::Properties(properties.clone()),
            );
        }
    }
}
