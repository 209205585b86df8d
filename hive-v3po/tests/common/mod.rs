//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hive_translate::engine::{SyncEngine, TransactionError, TransactionReport};
use hive_translate::naming::MappingContext;
use hive_utils::tree::{DataPath, DataTree};
use hive_v3po::V3po;
use hive_v3po::dataplane::Dataplane;
use hive_v3po::northbound;
use pickledb::{PickleDb, PickleDbDumpPolicy, SerializationMethod};
use serde_json::{Value, json};

pub const ETH0: &str = "GigabitEthernet0/8/0";
pub const ETH1: &str = "GigabitEthernet0/9/0";

// Engine wired to an in-memory dataplane with two physical interfaces.
pub struct Setup {
    pub dataplane: Arc<Dataplane>,
    pub v3po: V3po,
    pub engine: SyncEngine,
    pub scope: MappingContext,
}

// ===== impl Setup =====

impl Setup {
    pub fn new() -> Setup {
        let dataplane = Arc::new(Dataplane::new([ETH0, ETH1]));
        let v3po = V3po::new(dataplane.clone(), Duration::from_secs(1));
        let registry = northbound::registry(&v3po).unwrap();
        let db = PickleDb::new(
            "v3po-test.db",
            PickleDbDumpPolicy::NeverDump,
            SerializationMethod::Bin,
        );

        Setup {
            dataplane,
            v3po,
            engine: SyncEngine::new(Arc::new(registry)),
            scope: MappingContext::new(Arc::new(Mutex::new(db))),
        }
    }

    pub async fn apply(
        &self,
        before: &DataTree,
        after: &DataTree,
    ) -> Result<TransactionReport, TransactionError> {
        self.engine.apply(before, after, &self.scope).await
    }

    pub async fn read_all(&self) -> DataTree {
        self.engine.registry().read_all(&self.scope).await.unwrap()
    }
}

//
// Helper functions.
//

pub fn tree(entries: &[(String, Value)]) -> DataTree {
    entries
        .iter()
        .map(|(path, value)| (DataPath::from(path.as_str()), value.clone()))
        .collect()
}

pub fn interface(name: &str) -> String {
    format!("/interfaces/interface[{name}]")
}

pub fn sub_interface(name: &str, sub_id: u32) -> String {
    format!("{}/sub-interfaces/sub-interface[{sub_id}]", interface(name))
}

pub fn l2(name: &str) -> String {
    format!("{}/l2", interface(name))
}

pub fn bridge_domain(name: &str) -> String {
    format!("/bridge-domains/bridge-domain[{name}]")
}

pub fn locator_set(name: &str) -> String {
    format!("/lisp/locator-sets/locator-set[{name}]")
}

pub fn locator(name: &str, ifname: &str) -> String {
    format!("{}/interface[{ifname}]", locator_set(name))
}

pub fn ethernet(enabled: bool) -> Value {
    json!({"type": "ethernet", "enabled": enabled})
}

pub fn loopback(enabled: bool) -> Value {
    json!({"type": "loopback", "enabled": enabled})
}

pub fn bridge_domain_flags() -> Value {
    json!({
        "flood": true,
        "forward": true,
        "learn": true,
        "unknown-unicast-flood": true,
        "arp-termination": false,
    })
}

pub fn membership(bd: &str) -> Value {
    json!({
        "bridge-domain": bd,
        "split-horizon-group": 0,
        "bridged-virtual-interface": false,
    })
}
