use oejb_naming::{
    Binding, BoundObject, InvocationContext, IvmContext, NamingError, Operation, OperationSet, Reference,
};

fn guarded_root() -> IvmContext {
    let root = IvmContext::create_root_context();
    root.bind("comp/env/jdbc/orders", Binding::object("datasource")).unwrap();
    root.bind(
        "comp/env/orders",
        Reference::intra_vm("comp/env/jdbc/orders").guarded(OperationSet::BUSINESS),
    )
    .unwrap();
    root.bind(
        "comp/env/limit",
        Reference::object(BoundObject::new(10u32)).guarded(OperationSet::ENC_ACCESS),
    )
    .unwrap();
    root
}

#[test]
fn business_only_entry_is_hidden_during_construction() {
    let root = guarded_root();
    let err = root
        .lookup("comp/env/orders", &InvocationContext::new(Operation::Construct))
        .unwrap_err();
    assert_eq!(err, NamingError::not_found("comp/env/orders"));

    let found = root
        .lookup("comp/env/orders", &InvocationContext::new(Operation::Business))
        .unwrap();
    assert_eq!(found.downcast_ref::<&str>(), Some(&"datasource"));
}

#[test]
fn cached_entries_are_still_checked() {
    let root = guarded_root();
    let env = root
        .lookup_context("comp/env", &InvocationContext::none())
        .unwrap();

    assert!(env
        .lookup("orders", &InvocationContext::new(Operation::Business))
        .is_ok());
    for operation in [Operation::Construct, Operation::PostConstruct, Operation::PreDestroy] {
        let err = env
            .lookup("orders", &InvocationContext::new(operation))
            .unwrap_err();
        assert!(err.is_not_found(), "{operation:?}: {err:?}");
    }
}

#[test]
fn every_operation_but_construction_reads_the_environment() {
    let root = guarded_root();
    for operation in Operation::ALL {
        let result = root.lookup("comp/env/limit", &InvocationContext::new(operation));
        assert_eq!(result.is_ok(), operation != Operation::Construct, "{operation:?}");
    }
}
