use std::io::Read;
use std::sync::Arc;

use oejb_archive::{
    Archive, ArchiveClassLoader, ArchiveRegistry, BootstrapLoader, ClasspathEntry,
    PathClassLoader, ResourceLoader, ResourceUrl, CDI_EXTENSION_SERVICES,
};
use oejb_config::ClassLoaderConfig;
use oejb_test_utils::{temp_dir, JarBuilder};
use pretty_assertions::assert_eq;

fn archive_loader(
    parent: Arc<dyn ResourceLoader>,
    archives: Vec<Archive>,
    config: &ClassLoaderConfig,
) -> ArchiveClassLoader {
    ArchiveClassLoader::new(
        Arc::new(ArchiveRegistry::new()),
        parent,
        archives.into_iter().map(Arc::new),
        config,
    )
}

fn read(loader: &dyn ResourceLoader, url: &ResourceUrl) -> String {
    let mut text = String::new();
    loader
        .open_resource(url)
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    text
}

#[test]
fn single_lookup_prefers_the_last_archive() {
    let loader = archive_loader(
        Arc::new(BootstrapLoader),
        vec![
            Archive::new("a.jar").with_text("/META-INF/app.properties", "a"),
            Archive::new("b.jar").with_text("/META-INF/other.txt", "b"),
            Archive::new("c.jar").with_text("/META-INF/app.properties", "c"),
        ],
        &ClassLoaderConfig::default(),
    );

    let url = loader.find_resource("META-INF/app.properties").unwrap();
    assert_eq!(url.to_string(), "archive:c.jar/META-INF/app.properties");
    assert_eq!(read(&loader, &url), "c");

    let all: Vec<String> = loader
        .find_resources("/META-INF/app.properties")
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        all,
        vec![
            "archive:a.jar/META-INF/app.properties",
            "archive:c.jar/META-INF/app.properties",
        ]
    );
}

#[test]
fn missing_resources_fall_through_to_the_parent() {
    let dir = temp_dir();
    let jar = JarBuilder::new()
        .text("logging.properties", "level=INFO")
        .write(dir.path(), "container.jar");
    let parent = Arc::new(PathClassLoader::with_entries(
        None,
        [ClasspathEntry::Jar(jar.clone())],
    ));
    let loader = archive_loader(
        parent,
        vec![Archive::new("app.jar")],
        &ClassLoaderConfig::default(),
    );

    let url = loader.find_resource("logging.properties").unwrap();
    assert_eq!(
        url,
        ResourceUrl::Jar {
            jar,
            entry: "logging.properties".into()
        }
    );
    assert_eq!(read(&loader, &url), "level=INFO");
    assert_eq!(loader.find_resource("absent.txt"), None);
}

#[test]
fn get_resources_lists_own_archives_then_the_parent() {
    let dir = temp_dir();
    let jar = JarBuilder::new()
        .text("META-INF/beans.xml", "<beans/>")
        .write(dir.path(), "container.jar");
    let parent = Arc::new(PathClassLoader::with_entries(None, [ClasspathEntry::Jar(jar)]));
    let loader = archive_loader(
        parent,
        vec![Archive::new("app.jar").with_text("/META-INF/beans.xml", "<beans/>")],
        &ClassLoaderConfig::default(),
    );

    let urls = loader.get_resources("META-INF/beans.xml");
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0].archive_name(), Some("app.jar"));
    assert!(matches!(urls[1], ResourceUrl::Jar { .. }));
}

fn extension_parent() -> (tempfile::TempDir, Arc<PathClassLoader>) {
    let dir = temp_dir();
    let service = CDI_EXTENSION_SERVICES[1];
    let container = JarBuilder::new()
        .text(service, "org.apache.webbeans.ContainerExtension")
        .write(dir.path(), "openwebbeans-impl-2.0.jar");
    let user = JarBuilder::new()
        .text(service, "com.acme.ClasspathExtension")
        .write(dir.path(), "acme-extensions.jar");
    let parent = PathClassLoader::with_entries(
        None,
        [ClasspathEntry::Jar(container), ClasspathEntry::Jar(user)],
    );
    (dir, Arc::new(parent))
}

#[test]
fn only_container_extensions_come_from_the_parent() {
    let (_dir, parent) = extension_parent();
    let service = CDI_EXTENSION_SERVICES[1];
    let loader = archive_loader(
        parent,
        vec![Archive::new("app.jar").with_text(&format!("/{service}"), "com.acme.AppExtension")],
        &ClassLoaderConfig::default(),
    );

    let urls = loader.get_resources(service);
    assert_eq!(urls.len(), 2, "{urls:?}");
    assert_eq!(urls[0].archive_name(), Some("app.jar"));
    assert!(urls[1].to_string().contains("openwebbeans-impl-2.0.jar"));
}

#[test]
fn container_extensions_can_be_disabled() {
    let (_dir, parent) = extension_parent();
    let service = CDI_EXTENSION_SERVICES[1];
    let config = ClassLoaderConfig {
        container_extensions: false,
        ..ClassLoaderConfig::default()
    };
    let loader = archive_loader(
        parent.clone(),
        vec![Archive::new("app.jar").with_text(&format!("/{service}"), "com.acme.AppExtension")],
        &config,
    );

    let urls = loader.get_resources(service);
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].archive_name(), Some("app.jar"));
    // The parent itself still sees both.
    assert_eq!(parent.get_resources(service).len(), 2);
}

#[test]
fn closing_the_loader_closes_open_streams() {
    let loader = archive_loader(
        Arc::new(BootstrapLoader),
        vec![Archive::new("app.jar").with_text("/data.txt", "0123456789")],
        &ClassLoaderConfig::default(),
    );
    let url = loader.find_resource("data.txt").unwrap();
    let mut stream = loader.open_resource(&url).unwrap();
    assert_eq!(loader.registry().open_streams("app.jar"), 1);

    loader.close();
    let mut buf = [0u8; 4];
    assert!(stream.read(&mut buf).is_err());
    assert!(loader.open_resource(&url).is_err());
}
