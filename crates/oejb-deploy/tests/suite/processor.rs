use std::sync::Arc;

use oejb_archive::{Archive, ArchiveRegistry, BootstrapLoader, ResourceLoader, ResourceUrl};
use oejb_config::{ClassLoaderConfig, DeploymentConfig};
use oejb_deploy::{
    AltDescriptor, AppModule, ArchiveProcessor, Closeables, DeployErrorKind, DeploymentError,
    TestClass, EAR_SCOPED_CDI_BEANS, MAIN_BEANS_XML_URL,
};
use oejb_descriptors::names::{ENV_ENTRIES_PROPERTIES, PERSISTENCE_XML, VALIDATION_XML};
use oejb_descriptors::{BeanKind, DescriptorError, DiscoveryMode, TransactionType};
use oejb_test_utils::{class_file, temp_dir, JarBuilder};
use pretty_assertions::assert_eq;

const STATELESS: &str = "jakarta.ejb.Stateless";

fn processor(config: DeploymentConfig) -> ArchiveProcessor {
    ArchiveProcessor::new(
        Arc::new(ArchiveRegistry::new()),
        ClassLoaderConfig::default(),
        config,
    )
}

fn try_process(
    archive: Archive,
    test_class: Option<&TestClass>,
    config: DeploymentConfig,
) -> Result<(AppModule, Closeables), DeploymentError> {
    let closeables = Closeables::new();
    let app = processor(config).create_module(
        Arc::new(archive),
        test_class,
        Arc::new(BootstrapLoader),
        &closeables,
    )?;
    Ok((app, closeables))
}

fn process(archive: Archive, test_class: Option<&TestClass>) -> AppModule {
    try_process(archive, test_class, DeploymentConfig::default())
        .unwrap()
        .0
}

fn beans_urls(app: &AppModule, module: usize) -> Vec<String> {
    app.ejb_modules[module]
        .beans
        .as_ref()
        .unwrap()
        .urls()
        .map(str::to_owned)
        .collect()
}

fn util_library() -> Archive {
    Archive::new("util.jar")
        .with_text(
            "/META-INF/beans.xml",
            "<beans><decorators><class>com.acme.util.Fancy</class></decorators></beans>",
        )
        .with_bytes(
            "/com/acme/util/Fancy.class",
            class_file("com.acme.util.Fancy", None, &[]),
        )
}

#[test]
fn jar_and_library_beans_xml_merge_under_distinct_urls() {
    let jar = Archive::new("app.jar")
        .with_text(
            "/META-INF/beans.xml",
            "<beans><interceptors><class>com.acme.Audit</class></interceptors></beans>",
        )
        .with_bytes("/com/acme/Cart.class", class_file("com.acme.Cart", None, &[STATELESS]))
        .with_archive("/lib/util.jar", util_library());

    let app = process(jar, None);
    assert_eq!(app.module_id, "app");
    assert!(app.standalone_module);
    assert_eq!(app.ejb_modules.len(), 1);

    let lib_url = "jar:file://!/lib/util.jar!/META-INF/beans.xml";
    assert_eq!(beans_urls(&app, 0), vec![lib_url, MAIN_BEANS_XML_URL]);

    let module = &app.ejb_modules[0];
    assert_eq!(module.module_id, "app");
    let beans = module.beans.as_ref().unwrap();
    assert_eq!(beans.interceptors().collect::<Vec<_>>(), vec!["com.acme.Audit"]);
    assert_eq!(beans.decorators().collect::<Vec<_>>(), vec!["com.acme.util.Fancy"]);
    assert_eq!(
        module.alt_dd("beans.xml").and_then(AltDescriptor::as_beans),
        Some(beans)
    );

    let finder = module.finder.as_ref().unwrap();
    assert!(finder.contains("com.acme.Cart"));
    assert!(finder.contains("com.acme.util.Fancy"));
    assert_eq!(finder.classes_by_url()[lib_url], vec!["com.acme.util.Fancy"]);
    assert_eq!(finder.classes_by_url()[MAIN_BEANS_XML_URL], vec!["com.acme.Cart"]);

    let beans: Vec<(BeanKind, &str)> = finder
        .enterprise_beans()
        .into_iter()
        .map(|(kind, class)| (kind, class.name.as_str()))
        .collect();
    assert_eq!(beans, vec![(BeanKind::Stateless, "com.acme.Cart")]);
}

#[test]
fn web_archive_becomes_a_standalone_web_module() {
    let war = Archive::new("shop.war")
        .with_text(
            "/WEB-INF/web.xml",
            r#"<web-app version="4.0"><display-name>Shop</display-name></web-app>"#,
        )
        .with_text(
            "/WEB-INF/classes/META-INF/beans.xml",
            r#"<beans bean-discovery-mode="annotated"/>"#,
        )
        .with_bytes(
            "/WEB-INF/classes/com/acme/Cart.class",
            class_file("com.acme.Cart", None, &[STATELESS]),
        )
        .with_archive("/WEB-INF/lib/util.jar", util_library())
        .with_archive(
            "/WEB-INF/lib/arquillian-junit.jar",
            Archive::new("arquillian-junit.jar")
                .with_text("/META-INF/beans.xml", "")
                .with_bytes("/org/junit/Runner.class", class_file("org.junit.Runner", None, &[])),
        );

    let app = process(war, None);
    assert!(app.standalone_module);
    assert!(!app.delegate_first);
    assert!(app.additional_libraries.is_empty());

    assert_eq!(app.web_modules.len(), 1);
    let web = &app.web_modules[0];
    assert_eq!(web.module_id, "shop");
    assert_eq!(web.context_root, "shop");
    assert_eq!(web.web_app.display_name.as_deref(), Some("Shop"));

    let module = &app.ejb_modules[0];
    assert_eq!(module.module_id, "shop");
    assert_eq!(
        beans_urls(&app, 0),
        vec!["jar:file://!/lib/util.jar!/META-INF/beans.xml", MAIN_BEANS_XML_URL]
    );
    assert_eq!(
        module.beans.as_ref().unwrap().discovery_mode(MAIN_BEANS_XML_URL),
        Some(DiscoveryMode::Annotated)
    );

    let finder = module.finder.as_ref().unwrap();
    assert!(Arc::ptr_eq(finder, web.finder.as_ref().unwrap()));
    assert!(finder.contains("com.acme.Cart"));
    assert!(finder.contains("com.acme.util.Fancy"));
    assert!(!finder.contains("org.junit.Runner"));
}

#[test]
fn web_xml_parse_failures_fall_back_to_an_empty_web_app() {
    let war = Archive::new("broken.war").with_text("/WEB-INF/web.xml", "<web-app");
    let app = process(war, None);
    assert_eq!(app.web_modules[0].web_app, Default::default());
}

#[test]
fn test_class_becomes_a_hidden_managed_bean() {
    let jar = Archive::new("app.jar")
        .with_bytes("/com/acme/Cart.class", class_file("com.acme.Cart", None, &[STATELESS]))
        .with_text("/META-INF/validation.xml", "<validation-config/>")
        .with_text("/META-INF/env-entries.properties", "greeting = hello\n");

    let app = process(jar, Some(&TestClass::new("com.acme.CartTest")));
    let ids: Vec<&str> = app.ejb_modules.iter().map(|m| m.module_id.as_str()).collect();
    assert_eq!(ids, vec!["app_com.acme.CartTest", "app"]);

    let test_module = &app.ejb_modules[0];
    assert!(test_module.is_test_module());
    assert_eq!(test_module.properties.get("openejb.cdi.activated"), Some("false"));
    assert!(test_module.beans.as_ref().unwrap().is_empty());

    let bean = test_module
        .ejb_jar
        .enterprise_bean("app_com.acme.CartTest")
        .unwrap();
    assert_eq!(bean.kind, BeanKind::Managed);
    assert_eq!(bean.ejb_class.as_deref(), Some("com.acme.CartTest"));
    assert!(bean.hidden);
    assert!(bean.local_bean);
    assert_eq!(bean.transaction_type, Some(TransactionType::Bean));
    assert_eq!(
        test_module
            .openejb_jar
            .deployment("app_com.acme.CartTest")
            .and_then(|d| d.deployment_id.as_deref()),
        Some("app_com.acme.CartTest")
    );

    for module in &app.ejb_modules {
        assert!(module.alt_dd(VALIDATION_XML).is_some(), "{}", module.module_id);
        let env = module
            .alt_dd(ENV_ENTRIES_PROPERTIES)
            .and_then(AltDescriptor::as_properties)
            .unwrap();
        assert_eq!(env.get("greeting"), Some("hello"));
    }
}

#[test]
fn test_class_is_ignored_when_scanning_is_disabled() {
    let config = DeploymentConfig {
        scan_test_class: false,
        ..DeploymentConfig::default()
    };
    let (app, _closeables) = try_process(
        Archive::new("app.jar"),
        Some(&TestClass::new("com.acme.CartTest")),
        config,
    )
    .unwrap();
    assert_eq!(app.ejb_modules.len(), 1);
    assert!(!app.ejb_modules[0].is_test_module());
}

#[test]
fn module_name_comes_from_ejb_jar_xml() {
    let jar = Archive::new("app.jar").with_text(
        "/META-INF/ejb-jar.xml",
        "<ejb-jar><module-name>orders</module-name><enterprise-beans><session>\
         <ejb-name>Orders</ejb-name><ejb-class>com.acme.Orders</ejb-class>\
         </session></enterprise-beans></ejb-jar>",
    );
    let app = process(jar, None);
    let module = &app.ejb_modules[0];
    assert_eq!(module.module_id, "orders");
    assert_eq!(module.ejb_jar.enterprise_beans().len(), 1);
}

#[test]
fn unloadable_classes_are_skipped() {
    let jar = Archive::new("app.jar")
        .with_bytes("/com/acme/Broken.class", b"not a class".to_vec())
        .with_bytes("/com/acme/Cart.class", class_file("com.acme.Cart", None, &[]));
    let app = process(jar, None);
    let finder = app.ejb_modules[0].finder.as_ref().unwrap();
    assert_eq!(finder.class_names().collect::<Vec<_>>(), vec!["com.acme.Cart"]);
}

#[test]
fn library_beans_xml_merge_failure_aborts_processing() {
    let jar = Archive::new("app.jar").with_archive(
        "/lib/util.jar",
        Archive::new("util.jar").with_text("/META-INF/beans.xml", "<beans"),
    );
    let err = try_process(jar, None, DeploymentConfig::default()).unwrap_err();
    assert_eq!(err.archive, "app.jar");
    match err.kind {
        DeployErrorKind::Descriptor(DescriptorError::Merge { url, .. }) => {
            assert_eq!(url, "jar:file://!/lib/util.jar!/META-INF/beans.xml")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn libraries_on_disk_join_the_parent_class_path() {
    let dir = temp_dir();
    let disk_jar = JarBuilder::new()
        .text("META-INF/beans.xml", "")
        .class("", "com.acme.disk.Tool", &[])
        .write(dir.path(), "disk.jar");
    let persistence = dir.path().join("persistence.xml");
    std::fs::write(&persistence, "<persistence/>").unwrap();

    let jar = Archive::new("app.jar")
        .with_file("/lib/disk.jar", disk_jar.clone())
        .with_file("/META-INF/persistence.xml", persistence.clone());
    let app = process(jar, None);

    assert_eq!(app.additional_libraries, vec![disk_jar.clone()]);
    let url = format!("jar:file:{}!/META-INF/beans.xml", disk_jar.display());
    assert_eq!(beans_urls(&app, 0), vec![url.clone()]);
    let finder = app.ejb_modules[0].finder.as_ref().unwrap();
    assert_eq!(finder.classes_by_url()[&url], vec!["com.acme.disk.Tool"]);

    let tool = app.class_loader.load_class("com.acme.disk.Tool").unwrap();
    assert_eq!(
        tool.url,
        ResourceUrl::Jar {
            jar: disk_jar,
            entry: "com/acme/disk/Tool.class".to_owned(),
        }
    );

    match app.alt_dds.get(PERSISTENCE_XML) {
        Some(AltDescriptor::Urls(urls)) => assert_eq!(urls, &vec![ResourceUrl::File(persistence)]),
        other => panic!("unexpected persistence.xml descriptor: {other:?}"),
    }
}

#[test]
fn enterprise_archive_gets_a_cdi_module_and_one_module_pair_per_war() {
    let shared = Archive::new("shared.jar")
        .with_text("/META-INF/beans.xml", "")
        .with_text(
            "/META-INF/ejb-jar.xml",
            "<ejb-jar><enterprise-beans><session><ejb-name>Pricing</ejb-name>\
             <ejb-class>com.acme.shared.Pricing</ejb-class></session></enterprise-beans></ejb-jar>",
        )
        .with_bytes(
            "/com/acme/shared/Pricing.class",
            class_file("com.acme.shared.Pricing", None, &[]),
        );
    let web = Archive::new("web.war")
        .with_text("/WEB-INF/beans.xml", "")
        .with_text("/WEB-INF/env-entries.properties", "mode=ear")
        .with_text("/WEB-INF/classes/META-INF/persistence.xml", "<persistence/>")
        .with_bytes(
            "/WEB-INF/classes/com/acme/web/Front.class",
            class_file("com.acme.web.Front", None, &[]),
        );
    let ear = Archive::new("store.ear")
        .with_archive("/lib/shared.jar", shared)
        .with_archive("/web.war", web);

    let app = process(ear, Some(&TestClass::new("com.acme.StoreTest")));
    assert_eq!(app.module_id, "store");
    assert!(!app.standalone_module);

    let ids: Vec<&str> = app.ejb_modules.iter().map(|m| m.module_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            format!("{EAR_SCOPED_CDI_BEANS}store").as_str(),
            "store_web",
            "store_com.acme.StoreTest",
        ]
    );

    let cdi = &app.ejb_modules[0];
    assert!(cdi.ejb_jar.enterprise_bean("Pricing").is_some());
    assert_eq!(beans_urls(&app, 0), vec!["jar:file://!/lib/shared.jar!/META-INF/beans.xml"]);
    assert!(app.ear_lib_finder.as_ref().unwrap().contains("com.acme.shared.Pricing"));

    let web_ejb = &app.ejb_modules[1];
    assert!(web_ejb.webapp);
    assert_eq!(beans_urls(&app, 1), vec![MAIN_BEANS_XML_URL]);
    assert!(web_ejb.finder.as_ref().unwrap().contains("com.acme.web.Front"));
    for module in &app.ejb_modules[..2] {
        let env = module
            .alt_dd(ENV_ENTRIES_PROPERTIES)
            .and_then(AltDescriptor::as_properties)
            .unwrap();
        assert_eq!(env.get("mode"), Some("ear"));
    }
    assert!(matches!(app.alt_dds.get(PERSISTENCE_XML), Some(AltDescriptor::Source(_))));

    assert_eq!(app.web_modules.len(), 1);
    assert_eq!(app.web_modules[0].module_id, "store_web");
    assert_eq!(app.web_modules[0].context_root, "web");
}

#[test]
fn closing_the_closeables_unregisters_the_archives() {
    let (app, closeables) = try_process(
        Archive::new("app.jar").with_text("/META-INF/app.properties", "x"),
        None,
        DeploymentConfig::default(),
    )
    .unwrap();
    assert_eq!(closeables.len(), 2);
    let registry = app.class_loader.registry().clone();
    assert!(registry.is_registered("app.jar"));

    assert_eq!(closeables.close(), 0);
    assert!(!registry.is_registered("app.jar"));
    assert_eq!(app.class_loader.find_resource("META-INF/app.properties"), None);
}
