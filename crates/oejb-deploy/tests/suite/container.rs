use std::io::Read;
use std::sync::Arc;

use oejb_archive::{Archive, ResourceLoader};
use oejb_config::ContainerConfig;
use oejb_deploy::{
    AppModule, BeanHandle, DeployErrorKind, DeployableContainer, DeploymentInfo, JndiAssembler,
    TestClass,
};
use oejb_descriptors::BeanKind;
use oejb_naming::{IvmContext, NamingError};
use oejb_test_utils::class_file;
use pretty_assertions::assert_eq;

fn started() -> DeployableContainer {
    let container = DeployableContainer::new(&ContainerConfig::default());
    container.start();
    container
}

fn app_jar() -> Archive {
    Archive::new("app.jar")
        .with_bytes(
            "/com/acme/Cart.class",
            class_file("com.acme.Cart", None, &["jakarta.ejb.Stateless"]),
        )
        .with_text("/META-INF/env-entries.properties", "greeting=hello\n")
}

#[test]
fn deploying_requires_a_started_container() {
    let container = DeployableContainer::new(&ContainerConfig::default());
    let err = container.deploy(app_jar(), None).unwrap_err();
    assert_eq!(err.archive, "app.jar");
    assert!(matches!(err.kind, DeployErrorKind::NotStarted));
}

#[test]
fn deployment_wires_beans_and_env_entries_into_jndi() {
    let container = started();
    let info = container
        .deploy(app_jar(), Some(&TestClass::new("com.acme.CartTest")))
        .unwrap();

    let greeting = info.lookup("comp/env/greeting").unwrap();
    assert_eq!(greeting.downcast_ref::<String>().map(String::as_str), Some("hello"));

    let cart = info.lookup("global/app/Cart").unwrap();
    assert_eq!(
        cart.downcast_ref::<BeanHandle>(),
        Some(&BeanHandle {
            deployment_id: "Cart".to_owned(),
            module_id: "app".to_owned(),
            ejb_name: "Cart".to_owned(),
            ejb_class: "com.acme.Cart".to_owned(),
            kind: BeanKind::Stateless,
        })
    );

    // The test bean is reachable through its deployment but not exported globally.
    let test_bean = "app_com.acme.CartTest";
    assert!(info
        .lookup(&format!("openejb/Deployment/{test_bean}/com.acme.CartTest"))
        .is_ok());
    assert!(info
        .lookup(&format!("global/{test_bean}/{test_bean}"))
        .unwrap_err()
        .is_not_found());

    let summary = info.summary();
    assert_eq!(summary.module_id, "app");
    assert_eq!(summary.ejb_modules.len(), 2);
    assert!(summary.ejb_modules[0].test_module);
}

#[test]
fn deployments_are_cached_by_archive_name() {
    let container = started();
    let first = container.deploy(app_jar(), None).unwrap();
    let second = container.deploy(app_jar(), None).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(container.deployment_names(), vec!["app.jar"]);
}

#[test]
fn undeploy_releases_the_deployment() {
    let container = started();
    let info = container.deploy(app_jar(), None).unwrap();
    assert!(container.registry().is_registered("app.jar"));
    assert!(container.naming().is_live_application("app"));

    container.undeploy("app.jar").unwrap();
    assert!(!container.registry().is_registered("app.jar"));
    assert!(!container.naming().is_live_application("app"));
    assert!(info.app().class_loader.is_closed());
    assert!(container.deployment("app.jar").is_none());

    let err = container.undeploy("app.jar").unwrap_err();
    assert!(matches!(err.kind, DeployErrorKind::NotDeployed));

    // A fresh deploy starts from a clean tree.
    let again = container.deploy(app_jar(), None).unwrap();
    assert!(!Arc::ptr_eq(&info, &again));
    assert!(again.lookup("global/app/Cart").is_ok());
}

fn with_util_library(name: &str, config: &str) -> Archive {
    Archive::new(name).with_archive(
        "/lib/util.jar",
        Archive::new("util.jar").with_text("/config.txt", config),
    )
}

fn read_config(info: &DeploymentInfo) -> String {
    let loader = &info.app().class_loader;
    let url = loader.get_resource("config.txt").unwrap();
    let mut text = String::new();
    loader
        .open_resource(&url)
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    text
}

#[test]
fn deployments_bundling_same_named_libraries_stay_isolated() {
    let container = started();
    let a = container.deploy(with_util_library("a.jar", "from-a"), None).unwrap();
    let b = container.deploy(with_util_library("b.jar", "from-b"), None).unwrap();
    assert_eq!(read_config(&a), "from-a");
    assert_eq!(read_config(&b), "from-b");

    container.undeploy("b.jar").unwrap();
    assert_eq!(read_config(&a), "from-a");

    container.undeploy("a.jar").unwrap();
    assert!(!container.registry().is_registered("util.jar"));
}

#[test]
fn stop_undeploys_everything() {
    let container = started();
    container.deploy(app_jar(), None).unwrap();
    container.deploy(Archive::new("other.jar"), None).unwrap();
    assert_eq!(container.deployment_names(), vec!["app.jar", "other.jar"]);

    container.stop();
    assert!(!container.is_started());
    assert!(container.deployment_names().is_empty());
    assert!(!container.registry().is_registered("other.jar"));
    assert!(container.naming().live_applications().is_empty());
}

struct FailingAssembler;

impl JndiAssembler for FailingAssembler {
    fn assemble(&self, _app: &AppModule, _root: &IvmContext) -> Result<(), NamingError> {
        Err(NamingError::AlreadyBound {
            name: "global/app/Cart".to_owned(),
        })
    }
}

#[test]
fn assembly_failures_release_the_class_loaders() {
    let container = DeployableContainer::new(&ContainerConfig::default()).with_assembler(FailingAssembler);
    container.start();

    let err = container.deploy(app_jar(), None).unwrap_err();
    assert!(matches!(err.kind, DeployErrorKind::Naming(NamingError::AlreadyBound { .. })));
    assert!(!container.registry().is_registered("app.jar"));
    assert!(container.deployment("app.jar").is_none());
}
