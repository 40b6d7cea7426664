use std::sync::Arc;

use oejb_archive::{
    Archive, ArchiveClassLoader, ArchiveError, ArchiveRegistry, BootstrapLoader, ClasspathEntry,
    PathClassLoader, ResourceLoader,
};
use oejb_config::ClassLoaderConfig;
use oejb_test_utils::{class_file, temp_dir, JarBuilder};
use pretty_assertions::assert_eq;

#[test]
fn classes_are_loaded_parent_first() {
    let dir = temp_dir();
    let jar = JarBuilder::new()
        .class("", "com.acme.Shared", &[])
        .write(dir.path(), "container.jar");
    let parent = Arc::new(PathClassLoader::with_entries(None, [ClasspathEntry::Jar(jar)]));
    let loader = ArchiveClassLoader::new(
        Arc::new(ArchiveRegistry::new()),
        parent,
        [Arc::new(
            Archive::new("app.jar")
                .with_bytes("/com/acme/Shared.class", class_file("com.acme.Shared", None, &[]))
                .with_bytes("/com/acme/Own.class", class_file("com.acme.Own", None, &[])),
        )],
        &ClassLoaderConfig::default(),
    );

    let shared = loader.load_class("com.acme.Shared").unwrap();
    assert!(shared.url.to_string().starts_with("jar:file:"), "{}", shared.url);
    let own = loader.load_class("com.acme.Own").unwrap();
    assert_eq!(own.url.to_string(), "archive:app.jar/com/acme/Own.class");
}

#[test]
fn web_archive_libraries_are_searched() {
    let bytes = JarBuilder::new()
        .class("WEB-INF/classes/", "com.acme.web.CartServlet", &["jakarta.servlet.annotation.WebServlet"])
        .archive(
            "WEB-INF/lib/acme-util.jar",
            JarBuilder::new().class("", "com.acme.util.Money", &[]),
        )
        .build();
    let war = Archive::from_zip_bytes("shop.war", &bytes).unwrap();
    let loader = ArchiveClassLoader::new(
        Arc::new(ArchiveRegistry::new()),
        Arc::new(BootstrapLoader),
        [Arc::new(war)],
        &ClassLoaderConfig::default(),
    );

    let servlet = loader.load_class("com.acme.web.CartServlet").unwrap();
    assert!(servlet.info.has_annotation("jakarta.servlet.annotation.WebServlet"));
    let money = loader.load_class("com.acme.util.Money").unwrap();
    assert_eq!(money.url.archive_name(), Some("acme-util.jar"));
}

#[test]
fn malformed_class_files_are_reported() {
    let loader = ArchiveClassLoader::new(
        Arc::new(ArchiveRegistry::new()),
        Arc::new(BootstrapLoader),
        [Arc::new(
            Archive::new("broken.jar")
                .with_bytes("/com/acme/Broken.class", b"\0\0\0\0garbage".to_vec())
                .with_bytes("/com/acme/Renamed.class", class_file("com.acme.Other", None, &[])),
        )],
        &ClassLoaderConfig::default(),
    );

    for name in ["com.acme.Broken", "com.acme.Renamed"] {
        let err = loader.load_class(name).unwrap_err();
        assert!(matches!(err, ArchiveError::ClassFormat { .. }), "{name}: {err:?}");
    }
    assert!(loader.load_class("com.acme.Missing").unwrap_err().is_class_not_found());
}
