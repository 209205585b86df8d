//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use hive_translate::diff::{self, Operation};
use hive_translate::engine::{ChangeState, SyncEngine};
use hive_translate::error::{Error, HandlerError, MappingError};
use hive_translate::handler::{WriteContext, Writer, list_key, parse};
use hive_translate::naming::NamingContext;
use hive_translate::registry::{Handler, Registry};
use hive_utils::device::DeviceErrorKind;
use hive_utils::tree::{DataPath, DataTree};
use serde::Deserialize;
use serde_json::{Value, json};

use common::{CallLog, RecordingWriter, calls, scope, tree};

const INTERFACE: &str = "/interfaces/interface";
const SUB_INTERFACE: &str = "/interfaces/interface/sub-interfaces/sub-interface";
const L2: &str = "/interfaces/interface/l2";
const BRIDGE_DOMAIN: &str = "/bridge-domains/bridge-domain";
const LOCATOR_SET: &str = "/lisp/locator-sets/locator-set";
const LOCATOR_SET_INTERFACE: &str =
    "/lisp/locator-sets/locator-set/interface";

// Writer mapping interface names to the index carried in their data.
struct IndexedWriter {
    context: NamingContext,
}

#[derive(Deserialize)]
struct IndexedData {
    index: u32,
}

#[async_trait]
impl Writer for IndexedWriter {
    async fn create(
        &self,
        path: &DataPath,
        after: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let name = list_key(path, "interface")?;
        let data: IndexedData = parse(after)?;
        self.context.add_name(data.index, name, ctx.mapping)?;
        Ok(())
    }

    async fn delete(
        &self,
        path: &DataPath,
        _before: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let name = list_key(path, "interface")?;
        self.context.remove_name(name, ctx.mapping)?;
        Ok(())
    }
}

fn engine(log: &CallLog) -> SyncEngine {
    let registry = Registry::builder()
        .register(INTERFACE, Handler::writer(RecordingWriter::new(log)))
        .register(SUB_INTERFACE, Handler::writer(RecordingWriter::new(log)))
        .register(L2, Handler::writer(RecordingWriter::new(log)))
        .register(BRIDGE_DOMAIN, Handler::writer(RecordingWriter::new(log)))
        .register_subtree(
            LOCATOR_SET,
            [LOCATOR_SET_INTERFACE],
            Handler::writer(RecordingWriter::new(log)),
        )
        .register_after(L2, [BRIDGE_DOMAIN])
        .register_after(LOCATOR_SET, [INTERFACE])
        .build()
        .unwrap();
    SyncEngine::new(Arc::new(registry))
}

#[tokio::test]
async fn interface_created_before_membership() {
    let log = CallLog::default();
    let engine = engine(&log);
    let after = tree(&[
        ("/interfaces/interface[eth0]/l2", json!({"bridge-domain": "bd1"})),
        ("/bridge-domains/bridge-domain[bd1]", json!({})),
        ("/interfaces/interface[eth0]", json!({"type": "ethernet"})),
    ]);

    let report = engine
        .apply(&DataTree::new(), &after, &scope())
        .await
        .unwrap();
    assert_eq!(
        calls(&log),
        vec![
            "create /interfaces/interface[eth0]",
            "create /bridge-domains/bridge-domain[bd1]",
            "create /interfaces/interface[eth0]/l2",
        ]
    );
    assert_eq!(report.committed().count(), 3);
}

#[tokio::test]
async fn sub_interface_deleted_before_parent() {
    let log = CallLog::default();
    let engine = engine(&log);
    let before = tree(&[
        ("/interfaces/interface[eth0]", json!({})),
        ("/interfaces/interface[eth0]/sub-interfaces/sub-interface[1]", json!({})),
        ("/interfaces/interface[eth1]", json!({})),
    ]);
    let after = tree(&[("/interfaces/interface[eth1]", json!({}))]);

    engine.apply(&before, &after, &scope()).await.unwrap();
    assert_eq!(
        calls(&log),
        vec![
            "delete /interfaces/interface[eth0]/sub-interfaces/sub-interface[1]",
            "delete /interfaces/interface[eth0]",
        ]
    );
}

#[tokio::test]
async fn deletes_precede_creates() {
    let log = CallLog::default();
    let engine = engine(&log);
    let before = tree(&[
        ("/interfaces/interface[eth0]", json!({})),
        ("/interfaces/interface[eth0]/l2", json!({"bridge-domain": "bd1"})),
        ("/bridge-domains/bridge-domain[bd1]", json!({})),
    ]);
    let after = tree(&[
        ("/interfaces/interface[eth0]", json!({})),
        ("/interfaces/interface[eth0]/l2", json!({"bridge-domain": "bd2"})),
        ("/bridge-domains/bridge-domain[bd2]", json!({})),
    ]);

    engine.apply(&before, &after, &scope()).await.unwrap();
    assert_eq!(
        calls(&log),
        vec![
            "delete /bridge-domains/bridge-domain[bd1]",
            "create /bridge-domains/bridge-domain[bd2]",
            "update /interfaces/interface[eth0]/l2",
        ]
    );
}

#[tokio::test]
async fn naming_entry_lifecycle() {
    let registry = Registry::builder()
        .register(
            INTERFACE,
            Handler::writer(IndexedWriter {
                context: NamingContext::new("if", "interface-context"),
            }),
        )
        .build()
        .unwrap();
    let engine = SyncEngine::new(Arc::new(registry));
    let scope = scope();
    let context = NamingContext::new("if", "interface-context");

    // Transaction 1: create eth0.
    let config = tree(&[("/interfaces/interface[eth0]", json!({"index": 5}))]);
    engine.apply(&DataTree::new(), &config, &scope).await.unwrap();
    assert_eq!(context.get_index("eth0", &scope), Ok(5));
    assert!(context.contains_name(5, &scope));

    // Transaction 2: delete eth0.
    engine.apply(&config, &DataTree::new(), &scope).await.unwrap();
    assert_eq!(
        context.get_index("eth0", &scope),
        Err(MappingError::UnknownName(
            "interface-context".to_owned(),
            "eth0".to_owned()
        ))
    );
    assert!(!context.contains_name(5, &scope));
}

#[tokio::test]
async fn naming_conflict_fails_change() {
    let registry = Registry::builder()
        .register(
            INTERFACE,
            Handler::writer(IndexedWriter {
                context: NamingContext::new("if", "interface-context"),
            }),
        )
        .build()
        .unwrap();
    let engine = SyncEngine::new(Arc::new(registry));
    let scope = scope();

    let config = tree(&[
        ("/interfaces/interface[eth0]", json!({"index": 5})),
        ("/interfaces/interface[eth1]", json!({"index": 5})),
    ]);
    let error = engine
        .apply(&DataTree::new(), &config, &scope)
        .await
        .unwrap_err();
    assert!(matches!(
        error.error,
        Error::CreateFailed(
            _,
            HandlerError::Mapping(MappingError::Conflict(..))
        )
    ));
    assert_eq!(error.report.committed().count(), 1);
}

#[tokio::test]
async fn failure_stops_transaction() {
    let log = CallLog::default();
    let failing = "/interfaces/interface[eth2]";
    let registry = Registry::builder()
        .register(
            INTERFACE,
            Handler::writer(RecordingWriter::failing_on(&log, failing)),
        )
        .build()
        .unwrap();
    let engine = SyncEngine::new(Arc::new(registry));
    let after = tree(&[
        ("/interfaces/interface[eth0]", json!({})),
        ("/interfaces/interface[eth1]", json!({})),
        ("/interfaces/interface[eth2]", json!({})),
        ("/interfaces/interface[eth3]", json!({})),
        ("/interfaces/interface[eth4]", json!({})),
    ]);

    let error = engine
        .apply(&DataTree::new(), &after, &scope())
        .await
        .unwrap_err();
    let states = error
        .report
        .changes
        .iter()
        .map(|change| change.state)
        .collect::<Vec<_>>();
    assert_eq!(
        states,
        vec![
            ChangeState::Committed,
            ChangeState::Committed,
            ChangeState::Failed,
            ChangeState::Pending,
            ChangeState::Pending,
        ]
    );
    assert_eq!(calls(&log).len(), 3);
    assert_eq!(error.report.failed().unwrap().path, DataPath::from(failing));
    match error.error {
        Error::CreateFailed(path, HandlerError::Device(cause)) => {
            assert_eq!(path, DataPath::from(failing));
            assert_eq!(cause.kind, DeviceErrorKind::Call(-1));
        }
        error => panic!("unexpected error: {error}"),
    }
}

#[tokio::test]
async fn idempotent_apply() {
    let log = CallLog::default();
    let engine = engine(&log);
    let scope = scope();
    let config = tree(&[
        ("/interfaces/interface[eth0]", json!({"mtu": 1500})),
        ("/interfaces/interface[eth0]/l2", json!({"bridge-domain": "bd1"})),
        ("/bridge-domains/bridge-domain[bd1]", json!({})),
        ("/lisp/locator-sets/locator-set[ls1]", json!({})),
        ("/lisp/locator-sets/locator-set[ls1]/interface[eth0]", json!({})),
    ]);

    let report = engine
        .apply(&DataTree::new(), &config, &scope)
        .await
        .unwrap();
    assert_eq!(report.changes.len(), 4);

    let report = engine.apply(&config, &config, &scope).await.unwrap();
    assert!(report.changes.is_empty());
    assert_eq!(calls(&log).len(), 4);
}

#[tokio::test]
async fn subtree_dispatched_through_root() {
    let log = CallLog::default();
    let engine = engine(&log);
    let before = tree(&[
        ("/interfaces/interface[eth0]", json!({})),
        ("/lisp/locator-sets/locator-set[ls1]", json!({})),
        ("/lisp/locator-sets/locator-set[ls1]/interface[eth0]", json!({})),
    ]);
    let after = tree(&[
        ("/interfaces/interface[eth0]", json!({})),
        ("/interfaces/interface[eth1]", json!({})),
        ("/lisp/locator-sets/locator-set[ls1]", json!({})),
        ("/lisp/locator-sets/locator-set[ls1]/interface[eth0]", json!({})),
        ("/lisp/locator-sets/locator-set[ls1]/interface[eth1]", json!({})),
        ("/lisp/locator-sets/locator-set[ls2]/interface[eth1]", json!({})),
    ]);

    engine.apply(&before, &after, &scope()).await.unwrap();
    assert_eq!(
        calls(&log),
        vec![
            "create /interfaces/interface[eth1]",
            "update /lisp/locator-sets/locator-set[ls1]",
            "create /lisp/locator-sets/locator-set[ls2]",
        ]
    );
}

#[tokio::test]
async fn ordering_property() {
    let log = CallLog::default();
    let engine = engine(&log);
    let registry = engine.registry();
    let before = tree(&[
        ("/bridge-domains/bridge-domain[a]", json!({})),
        ("/bridge-domains/bridge-domain[b]", json!({})),
        ("/interfaces/interface[x]", json!({})),
        ("/interfaces/interface[x]/l2", json!({"bridge-domain": "a"})),
        ("/interfaces/interface[y]", json!({})),
        ("/interfaces/interface[y]/l2", json!({"bridge-domain": "b"})),
    ]);
    let after = tree(&[
        ("/bridge-domains/bridge-domain[c]", json!({})),
        ("/bridge-domains/bridge-domain[d]", json!({})),
        ("/interfaces/interface[z]", json!({})),
        ("/interfaces/interface[z]/l2", json!({"bridge-domain": "c"})),
        ("/interfaces/interface[w]", json!({})),
        ("/interfaces/interface[w]/l2", json!({"bridge-domain": "d"})),
    ]);

    let changes = diff::compute(registry, &before, &after).unwrap();
    let position = |schema: &str, operation: Operation| {
        changes
            .iter()
            .enumerate()
            .filter(|(_, change)| {
                change.operation() == operation
                    && change.path.schema().to_string() == schema
            })
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>()
    };

    // Bridge domains precede memberships on create, follow them on delete.
    let bd = position(BRIDGE_DOMAIN, Operation::Create);
    let l2 = position(L2, Operation::Create);
    assert!(bd.iter().max() < l2.iter().min());
    let bd = position(BRIDGE_DOMAIN, Operation::Delete);
    let l2 = position(L2, Operation::Delete);
    assert!(l2.iter().max() < bd.iter().min());
    let interface = position(INTERFACE, Operation::Delete);
    assert!(l2.iter().max() < interface.iter().min());
    assert_eq!(changes.len(), 12);
}

#[tokio::test]
async fn validation_failure_makes_no_calls() {
    let log = CallLog::default();
    let writer = RecordingWriter {
        log: log.clone(),
        fail_on: None,
        reject: Some(DataPath::from("/interfaces/interface[eth1]")),
    };
    let registry = Registry::builder()
        .register(INTERFACE, Handler::writer(writer))
        .build()
        .unwrap();
    let engine = SyncEngine::new(Arc::new(registry));
    let after = tree(&[
        ("/interfaces/interface[eth0]", json!({})),
        ("/interfaces/interface[eth1]", json!({})),
    ]);

    let error = engine
        .apply(&DataTree::new(), &after, &scope())
        .await
        .unwrap_err();
    assert!(matches!(error.error, Error::ValidationFailed(..)));
    assert_eq!(error.report.pending().count(), 2);
    assert!(calls(&log).is_empty());
}

#[tokio::test]
async fn unsupported_update() {
    let registry = Registry::builder()
        .register(
            INTERFACE,
            Handler::writer(IndexedWriter {
                context: NamingContext::new("if", "interface-context"),
            }),
        )
        .build()
        .unwrap();
    let engine = SyncEngine::new(Arc::new(registry));
    let scope = scope();
    let before = tree(&[("/interfaces/interface[eth0]", json!({"index": 1}))]);
    let after = tree(&[("/interfaces/interface[eth0]", json!({"index": 2}))]);

    let error = engine.apply(&before, &after, &scope).await.unwrap_err();
    assert!(matches!(
        error.error,
        Error::UpdateFailed(_, HandlerError::Unsupported(..))
    ));
}

#[tokio::test]
async fn missing_handler() {
    let log = CallLog::default();
    let engine = engine(&log);
    let after = tree(&[
        ("/interfaces/interface[eth0]", json!({})),
        ("/acls/acl[deny-all]", json!({})),
    ]);

    let error = engine
        .apply(&DataTree::new(), &after, &scope())
        .await
        .unwrap_err();
    assert!(matches!(error.error, Error::MissingHandler(..)));
    assert!(error.report.changes.is_empty());
    assert!(calls(&log).is_empty());
}
