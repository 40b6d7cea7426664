use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use oejb_naming::{
    Binding, BoundObject, FederatedObject, FederationRegistry, InvocationContext, IvmContext,
    NameClassPair, NamingError, NamingServices, NamingSettings, Reference, UrlContextFactory,
};
use pretty_assertions::assert_eq;

fn none() -> InvocationContext {
    InvocationContext::none()
}

#[test]
fn bound_values_are_returned_by_lookup() {
    let root = IvmContext::create_root_context();
    let value = BoundObject::new(String::from("payload"));
    root.bind("comp/env/plain", value.clone()).unwrap();
    root.bind("comp/env/wrapped", Reference::object(value.clone()))
        .unwrap();

    for name in ["comp/env/plain", "comp/env/wrapped", "/comp//env/plain/"] {
        let found = root.lookup(name, &none()).unwrap();
        assert!(found.as_object().unwrap().ptr_eq(&value), "{name}");
    }
}

#[test]
fn binding_twice_fails_even_after_lookups() {
    let root = IvmContext::create_root_context();
    root.bind("a/b", Binding::object(1u8)).unwrap();
    root.lookup("a/b", &none()).unwrap();

    let err = root.bind("a/b", Binding::object(2u8)).unwrap_err();
    assert!(matches!(err, NamingError::AlreadyBound { .. }), "{err:?}");
    let err = root.bind("java:a/b", Binding::object(2u8)).unwrap_err();
    assert!(matches!(err, NamingError::AlreadyBound { .. }), "{err:?}");
    assert_eq!(
        root.lookup("a/b", &none()).unwrap().downcast_ref::<u8>(),
        Some(&1)
    );
}

#[test]
fn empty_name_is_the_context_itself() {
    let root = IvmContext::create_root_context();
    let sub = root.create_subcontext("x/y").unwrap().unwrap();
    assert!(root.lookup("", &none()).unwrap().as_context().unwrap().same_context(&root));
    assert!(sub.lookup("", &none()).unwrap().as_context().unwrap().same_context(&sub));
}

#[test]
fn list_yields_direct_children_with_class_names() {
    let root = IvmContext::create_root_context();
    root.bind("root/x/y", Binding::object(1u32)).unwrap();
    root.bind("root/x/z", Binding::object(String::from("z"))).unwrap();
    root.bind("root/x/w/deep", Binding::object(3u32)).unwrap();

    let mut listed = root.list("root/x", &none()).unwrap();
    listed.sort();
    assert_eq!(
        listed,
        vec![
            NameClassPair {
                name: "w".into(),
                class_name: std::any::type_name::<IvmContext>().into(),
            },
            NameClassPair {
                name: "y".into(),
                class_name: "u32".into(),
            },
            NameClassPair {
                name: "z".into(),
                class_name: std::any::type_name::<String>().into(),
            },
        ]
    );

    let x = root.lookup_context("root/x", &none()).unwrap();
    let mut names: Vec<String> = x.list("", &none()).unwrap().into_iter().map(|p| p.name).collect();
    names.sort();
    assert_eq!(names, vec!["w", "y", "z"]);
}

#[test]
fn listing_two_siblings_yields_both() {
    let root = IvmContext::create_root_context();
    root.bind("root/x/y", Binding::object(1u8)).unwrap();
    root.bind("root/x/z", Binding::object(2u8)).unwrap();

    let mut names: Vec<String> = root
        .list("root/x", &none())
        .unwrap()
        .into_iter()
        .map(|pair| pair.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["y", "z"]);
}

#[test]
fn list_of_a_leaf_is_not_a_context() {
    let root = IvmContext::create_root_context();
    root.bind("leaf", Binding::object(1u8)).unwrap();
    let err = root.list("leaf", &none()).unwrap_err();
    assert_eq!(err, NamingError::NotContext { name: "leaf".into() });
}

#[test]
fn list_bindings_keeps_raw_references() {
    let root = IvmContext::create_root_context();
    root.bind("env/ref", Reference::intra_vm("env/target")).unwrap();
    root.bind("env/target", Binding::object(1u8)).unwrap();

    let bindings = root.list_bindings("env", &none()).unwrap();
    let reference = bindings.iter().find(|b| b.name == "ref").unwrap();
    assert!(matches!(reference.binding, Binding::Reference(_)));
    assert!(reference.class_name.ends_with("IntraVmJndiReference"));
}

#[test]
fn mutating_operations_are_unsupported() {
    let root = IvmContext::create_root_context();
    root.bind("a", Binding::object(1u8)).unwrap();
    for name in ["a", "missing", ""] {
        assert!(matches!(
            root.rebind(name, Binding::object(2u8)),
            Err(NamingError::NotSupported { .. })
        ));
        assert!(matches!(root.unbind(name), Err(NamingError::NotSupported { .. })));
        assert!(matches!(
            root.rename(name, "b"),
            Err(NamingError::NotSupported { .. })
        ));
        assert!(matches!(
            root.destroy_subcontext(name),
            Err(NamingError::NotSupported { .. })
        ));
        assert!(matches!(
            root.name_parser(name),
            Err(NamingError::NotSupported { .. })
        ));
    }
}

#[test]
fn subcontexts_resolve_through_the_same_path() {
    let root = IvmContext::create_root_context();
    let created = root.create_subcontext("app/module").unwrap().unwrap();
    let found = root.lookup_context("app/module", &none()).unwrap();
    assert!(created.same_context(&found));
    assert_eq!(found.path(), "app/module");
    assert!(root.create_subcontext("app/module").is_err());
}

#[test]
fn tree_dump_lists_nested_bindings() {
    let root = IvmContext::create_root_context();
    root.bind("global/app/Bean", Binding::object(1u8)).unwrap();
    let dump = root.tree();
    assert!(dump.contains("global (context)"), "{dump}");
    assert!(dump.contains("    Bean (u8)"), "{dump}");
}

struct Counting {
    calls: Arc<AtomicUsize>,
}

impl UrlContextFactory for Counting {
    fn object_instance(&self, name: &str) -> oejb_naming::Result<Option<FederatedObject>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((name == "remote/thing").then(|| FederatedObject::Object(Binding::object(77u32))))
    }
}

#[test]
fn federation_answers_misses_and_is_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = FederationRegistry::new();
    let counter = calls.clone();
    registry.register("counting", move || {
        Arc::new(Counting {
            calls: counter.clone(),
        })
    });
    let config = oejb_config::NamingConfig {
        federation: vec!["counting".into()],
        ..Default::default()
    };
    let services = Arc::new(NamingServices::from_config(&config, registry));
    assert_eq!(services.settings(), NamingSettings::from(&config));
    let root = IvmContext::with_services(services);

    for _ in 0..3 {
        let found = root.lookup("remote/thing", &none()).unwrap();
        assert_eq!(found.downcast_ref::<u32>(), Some(&77));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let err = root.lookup("remote/other", &none()).unwrap_err();
    assert_eq!(err, NamingError::not_found("remote/other"));
}
