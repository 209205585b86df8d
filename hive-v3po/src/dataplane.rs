//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use hive_utils::device::{DeviceApi, DeviceError, DeviceReply, DeviceRequest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, debug_span};

use crate::api::*;

/// In-memory dataplane implementing the device API.
///
/// Objects are identified by dataplane-assigned indexes, the same way a real
/// forwarder identifies them. Calls can be counted, failed or stalled for
/// testing purposes.
#[derive(Debug, Default)]
pub struct Dataplane {
    state: Mutex<DataplaneState>,
    faults: Mutex<Faults>,
}

/// Forwarding state of the dataplane.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DataplaneState {
    interfaces: BTreeMap<u32, SwInterfaceDetails>,
    bridge_domains: BTreeMap<u32, BridgeDomainFlags>,
    locator_sets: BTreeMap<String, LocatorSetDetails>,
    next_sw_if_index: u32,
    next_loopback: u32,
    next_ls_index: u32,
}

#[derive(Debug, Default)]
struct Faults {
    calls: HashMap<String, usize>,
    injected: HashMap<String, i32>,
    stalled: HashSet<String>,
}

type CallResult = Result<Value, i32>;

// ===== impl Dataplane =====

impl Dataplane {
    // Creates a dataplane with the given physical interfaces.
    pub fn new<I, S>(ethernets: I) -> Dataplane
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = DataplaneState {
            next_sw_if_index: 1,
            ..Default::default()
        };
        for name in ethernets {
            state.add_interface(name.into(), InterfaceKind::Ethernet, 0, 0, 0);
        }
        Dataplane::from_state(state)
    }

    pub fn from_state(state: DataplaneState) -> Dataplane {
        Dataplane {
            state: Mutex::new(state),
            faults: Default::default(),
        }
    }

    // Returns a copy of the current forwarding state.
    pub fn state(&self) -> DataplaneState {
        self.state.lock().unwrap().clone()
    }

    // Number of times a message was received.
    pub fn calls(&self, message: &str) -> usize {
        let faults = self.faults.lock().unwrap();
        faults.calls.get(message).copied().unwrap_or(0)
    }

    // Makes every subsequent `message` fail with `retval`.
    pub fn inject_fault(&self, message: &str, retval: i32) {
        let mut faults = self.faults.lock().unwrap();
        faults.injected.insert(message.to_owned(), retval);
    }

    pub fn clear_faults(&self) {
        let mut faults = self.faults.lock().unwrap();
        faults.injected.clear();
        faults.stalled.clear();
    }

    // Makes every subsequent `message` hang without a reply.
    pub fn stall(&self, message: &str) {
        let mut faults = self.faults.lock().unwrap();
        faults.stalled.insert(message.to_owned());
    }

    pub fn interface(&self, name: &str) -> Option<SwInterfaceDetails> {
        let state = self.state.lock().unwrap();
        state
            .interfaces
            .values()
            .find(|iface| iface.interface_name == name)
            .cloned()
    }

    pub fn interface_count(&self) -> usize {
        self.state.lock().unwrap().interfaces.len()
    }

    pub fn bridge_domain(&self, bd_id: u32) -> Option<BridgeDomainDetails> {
        let state = self.state.lock().unwrap();
        state.bridge_domain_details(bd_id)
    }

    pub fn locator_set(&self, name: &str) -> Option<LocatorSetDetails> {
        let state = self.state.lock().unwrap();
        state.locator_sets.get(name).cloned()
    }
}

#[async_trait]
impl DeviceApi for Dataplane {
    async fn call(
        &self,
        request: DeviceRequest,
    ) -> Result<DeviceReply, DeviceError> {
        let stalled = {
            let mut faults = self.faults.lock().unwrap();
            *faults.calls.entry(request.message.clone()).or_default() += 1;
            if let Some(retval) = faults.injected.get(&request.message) {
                return Ok(DeviceReply::new(*retval, Value::Null));
            }
            faults.stalled.contains(&request.message)
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        let result = {
            let mut state = self.state.lock().unwrap();
            state.dispatch(&request)?
        };
        debug_span!("dataplane").in_scope(|| {
            debug!(message = %request.message, ?result, "processed request");
        });

        match result {
            Ok(data) => Ok(DeviceReply::ok(data)),
            Err(retval) => Ok(DeviceReply::new(retval, Value::Null)),
        }
    }
}

// ===== impl DataplaneState =====

impl DataplaneState {
    fn dispatch(
        &mut self,
        request: &DeviceRequest,
    ) -> Result<CallResult, DeviceError> {
        let args = &request.args;
        let result = match request.message.as_str() {
            SwInterfaceDump::NAME => {
                self.handle(args, DataplaneState::sw_interface_dump)
            }
            CreateLoopback::NAME => {
                self.handle(args, DataplaneState::create_loopback)
            }
            DeleteLoopback::NAME => {
                self.handle(args, DataplaneState::delete_loopback)
            }
            SwInterfaceSetFlags::NAME => {
                self.handle(args, DataplaneState::sw_interface_set_flags)
            }
            CreateSubif::NAME => self.handle(args, DataplaneState::create_subif),
            DeleteSubif::NAME => self.handle(args, DataplaneState::delete_subif),
            BridgeDomainAddDel::NAME => {
                self.handle(args, DataplaneState::bridge_domain_add_del)
            }
            BridgeDomainSetFlags::NAME => {
                self.handle(args, DataplaneState::bridge_domain_set_flags)
            }
            BridgeDomainDump::NAME => {
                self.handle(args, DataplaneState::bridge_domain_dump)
            }
            SwInterfaceSetL2Bridge::NAME => {
                self.handle(args, DataplaneState::sw_interface_set_l2_bridge)
            }
            LispAddDelLocatorSet::NAME => {
                self.handle(args, DataplaneState::lisp_add_del_locator_set)
            }
            LispLocatorSetDump::NAME => {
                self.handle(args, DataplaneState::lisp_locator_set_dump)
            }
            message => {
                return Err(DeviceError::transport(format!(
                    "unknown message: {message}"
                )));
            }
        };

        Ok(result)
    }

    fn handle<M, F>(&mut self, args: &Value, f: F) -> CallResult
    where
        M: DeserializeOwned,
        F: FnOnce(&mut DataplaneState, M) -> CallResult,
    {
        let msg = M::deserialize(args).map_err(|_| ERR_INVALID_VALUE)?;
        f(self, msg)
    }

    fn add_interface(
        &mut self,
        name: String,
        kind: InterfaceKind,
        sup_sw_if_index: u32,
        sub_id: u32,
        outer_vlan_id: u16,
    ) -> u32 {
        let sw_if_index = self.next_sw_if_index;
        self.next_sw_if_index += 1;
        self.interfaces.insert(
            sw_if_index,
            SwInterfaceDetails {
                sw_if_index,
                interface_name: name,
                kind,
                admin_up: false,
                sup_sw_if_index: match kind {
                    InterfaceKind::SubInterface => sup_sw_if_index,
                    _ => sw_if_index,
                },
                sub_id,
                outer_vlan_id,
                bd_id: None,
                shg: 0,
                bvi: false,
            },
        );
        sw_if_index
    }

    // Checks whether other objects still reference an interface.
    fn interface_in_use(&self, sw_if_index: u32) -> bool {
        let iface = &self.interfaces[&sw_if_index];
        iface.bd_id.is_some()
            || self.interfaces.values().any(|other| {
                other.kind == InterfaceKind::SubInterface
                    && other.sup_sw_if_index == sw_if_index
            })
            || self.locator_sets.values().any(|ls| {
                ls.locators
                    .iter()
                    .any(|locator| locator.sw_if_index == sw_if_index)
            })
    }

    fn bridge_domain_details(&self, bd_id: u32) -> Option<BridgeDomainDetails> {
        let flags = self.bridge_domains.get(&bd_id)?;
        let members = self
            .interfaces
            .values()
            .filter(|iface| iface.bd_id == Some(bd_id))
            .map(|iface| iface.sw_if_index)
            .collect();
        Some(BridgeDomainDetails {
            bd_id,
            flags: *flags,
            members,
        })
    }

    //
    // Message handlers.
    //

    fn sw_interface_dump(&mut self, _msg: SwInterfaceDump) -> CallResult {
        reply(&self.interfaces.values().collect::<Vec<_>>())
    }

    fn create_loopback(&mut self, _msg: CreateLoopback) -> CallResult {
        let name = format!("loop{}", self.next_loopback);
        self.next_loopback += 1;
        let sw_if_index =
            self.add_interface(name, InterfaceKind::Loopback, 0, 0, 0);
        reply(&CreateLoopbackReply { sw_if_index })
    }

    fn delete_loopback(&mut self, msg: DeleteLoopback) -> CallResult {
        match self.interfaces.get(&msg.sw_if_index) {
            Some(iface) if iface.kind == InterfaceKind::Loopback => (),
            _ => return Err(ERR_INVALID_SW_IF_INDEX),
        }
        if self.interface_in_use(msg.sw_if_index) {
            return Err(ERR_IN_USE);
        }
        self.interfaces.remove(&msg.sw_if_index);
        Ok(Value::Null)
    }

    fn sw_interface_set_flags(&mut self, msg: SwInterfaceSetFlags) -> CallResult {
        let iface = self
            .interfaces
            .get_mut(&msg.sw_if_index)
            .ok_or(ERR_INVALID_SW_IF_INDEX)?;
        iface.admin_up = msg.admin_up;
        Ok(Value::Null)
    }

    fn create_subif(&mut self, msg: CreateSubif) -> CallResult {
        let name = match self.interfaces.get(&msg.sw_if_index) {
            Some(sup) if sup.kind != InterfaceKind::SubInterface => {
                format!("{}.{}", sup.interface_name, msg.sub_id)
            }
            _ => return Err(ERR_INVALID_SW_IF_INDEX),
        };
        if self.interfaces.values().any(|iface| {
            iface.kind == InterfaceKind::SubInterface
                && iface.sup_sw_if_index == msg.sw_if_index
                && iface.sub_id == msg.sub_id
        }) {
            return Err(ERR_ENTRY_ALREADY_EXISTS);
        }

        let sw_if_index = self.add_interface(
            name,
            InterfaceKind::SubInterface,
            msg.sw_if_index,
            msg.sub_id,
            msg.outer_vlan_id,
        );
        reply(&CreateSubifReply { sw_if_index })
    }

    fn delete_subif(&mut self, msg: DeleteSubif) -> CallResult {
        match self.interfaces.get(&msg.sw_if_index) {
            Some(iface) if iface.kind == InterfaceKind::SubInterface => (),
            _ => return Err(ERR_INVALID_SW_IF_INDEX),
        }
        if self.interface_in_use(msg.sw_if_index) {
            return Err(ERR_IN_USE);
        }
        self.interfaces.remove(&msg.sw_if_index);
        Ok(Value::Null)
    }

    fn bridge_domain_add_del(&mut self, msg: BridgeDomainAddDel) -> CallResult {
        if msg.is_add {
            if self.bridge_domains.contains_key(&msg.bd_id) {
                return Err(ERR_ENTRY_ALREADY_EXISTS);
            }
            self.bridge_domains.insert(msg.bd_id, msg.flags);
        } else {
            if !self.bridge_domains.contains_key(&msg.bd_id) {
                return Err(ERR_NO_SUCH_ENTRY);
            }
            if self
                .interfaces
                .values()
                .any(|iface| iface.bd_id == Some(msg.bd_id))
            {
                return Err(ERR_IN_USE);
            }
            self.bridge_domains.remove(&msg.bd_id);
        }
        Ok(Value::Null)
    }

    fn bridge_domain_set_flags(
        &mut self,
        msg: BridgeDomainSetFlags,
    ) -> CallResult {
        let flags = self
            .bridge_domains
            .get_mut(&msg.bd_id)
            .ok_or(ERR_NO_SUCH_ENTRY)?;
        *flags = msg.flags;
        Ok(Value::Null)
    }

    fn bridge_domain_dump(&mut self, _msg: BridgeDomainDump) -> CallResult {
        let details = self
            .bridge_domains
            .keys()
            .filter_map(|bd_id| self.bridge_domain_details(*bd_id))
            .collect::<Vec<_>>();
        reply(&details)
    }

    fn sw_interface_set_l2_bridge(
        &mut self,
        msg: SwInterfaceSetL2Bridge,
    ) -> CallResult {
        if msg.enable && !self.bridge_domains.contains_key(&msg.bd_id) {
            return Err(ERR_NO_SUCH_ENTRY);
        }
        let iface = self
            .interfaces
            .get_mut(&msg.rx_sw_if_index)
            .ok_or(ERR_INVALID_SW_IF_INDEX)?;
        if msg.enable {
            iface.bd_id = Some(msg.bd_id);
            iface.shg = msg.shg;
            iface.bvi = msg.bvi;
        } else {
            iface.bd_id = None;
            iface.shg = 0;
            iface.bvi = false;
        }
        Ok(Value::Null)
    }

    fn lisp_add_del_locator_set(
        &mut self,
        msg: LispAddDelLocatorSet,
    ) -> CallResult {
        if !msg.is_add {
            let ls = self
                .locator_sets
                .remove(&msg.locator_set_name)
                .ok_or(ERR_NO_SUCH_ENTRY)?;
            return reply(&LispAddDelLocatorSetReply {
                ls_index: ls.ls_index,
            });
        }

        if msg
            .locators
            .iter()
            .any(|locator| !self.interfaces.contains_key(&locator.sw_if_index))
        {
            return Err(ERR_INVALID_SW_IF_INDEX);
        }

        // Adding an existing locator set replaces its locators.
        let ls_index = match self.locator_sets.get(&msg.locator_set_name) {
            Some(ls) => ls.ls_index,
            None => {
                let ls_index = self.next_ls_index;
                self.next_ls_index += 1;
                ls_index
            }
        };
        self.locator_sets.insert(
            msg.locator_set_name.clone(),
            LocatorSetDetails {
                ls_index,
                locator_set_name: msg.locator_set_name,
                locators: msg.locators,
            },
        );
        reply(&LispAddDelLocatorSetReply { ls_index })
    }

    fn lisp_locator_set_dump(&mut self, _msg: LispLocatorSetDump) -> CallResult {
        reply(&self.locator_sets.values().collect::<Vec<_>>())
    }
}

// ===== helper functions =====

fn reply<T: Serialize>(data: &T) -> CallResult {
    serde_json::to_value(data).map_err(|_| ERR_INVALID_VALUE)
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    async fn call<M: ApiMessage>(dataplane: &Dataplane, msg: M) -> DeviceReply {
        dataplane.call(msg.request().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn interface_lifecycle() {
        let dataplane = Dataplane::new(["GigabitEthernet0/8/0"]);

        let reply = call(&dataplane, CreateLoopback::new(None)).await;
        assert_eq!(reply.data["sw_if_index"], 2);
        assert_eq!(dataplane.interface("loop0").unwrap().sw_if_index, 2);

        let reply = call(&dataplane, CreateSubif::new(1, 100, 100)).await;
        assert_eq!(reply.data["sw_if_index"], 3);
        let reply = call(&dataplane, CreateSubif::new(1, 100, 100)).await;
        assert_eq!(reply.retval, ERR_ENTRY_ALREADY_EXISTS);
        let subif = dataplane.interface("GigabitEthernet0/8/0.100").unwrap();
        assert_eq!(subif.sup_sw_if_index, 1);

        let reply = call(&dataplane, DeleteLoopback::new(1)).await;
        assert_eq!(reply.retval, ERR_INVALID_SW_IF_INDEX);
        let reply = call(&dataplane, DeleteLoopback::new(2)).await;
        assert_eq!(reply.retval, 0);
        assert_eq!(dataplane.interface_count(), 2);
    }

    #[tokio::test]
    async fn bridge_domain_in_use() {
        let dataplane = Dataplane::new(["eth0"]);
        let flags = BridgeDomainFlags::default();

        call(&dataplane, BridgeDomainAddDel::new(1, true, flags)).await;
        let reply =
            call(&dataplane, SwInterfaceSetL2Bridge::new(1, 1, 0, false, true))
                .await;
        assert_eq!(reply.retval, 0);
        assert_eq!(dataplane.bridge_domain(1).unwrap().members, vec![1]);

        let reply =
            call(&dataplane, BridgeDomainAddDel::new(1, false, flags)).await;
        assert_eq!(reply.retval, ERR_IN_USE);

        call(&dataplane, SwInterfaceSetL2Bridge::new(1, 1, 0, false, false))
            .await;
        let reply =
            call(&dataplane, BridgeDomainAddDel::new(1, false, flags)).await;
        assert_eq!(reply.retval, 0);
        assert!(dataplane.bridge_domain(1).is_none());
    }

    #[tokio::test]
    async fn faults() {
        let dataplane = Dataplane::new(["eth0"]);
        dataplane.inject_fault(CreateLoopback::NAME, -99);

        let reply = call(&dataplane, CreateLoopback::new(None)).await;
        assert_eq!(reply.retval, -99);
        assert_eq!(dataplane.calls(CreateLoopback::NAME), 1);
        assert_eq!(dataplane.interface_count(), 1);

        dataplane.clear_faults();
        let reply = call(&dataplane, CreateLoopback::new(None)).await;
        assert_eq!(reply.retval, 0);

        let request = DeviceRequest::new("show_version".to_owned(), Value::Null);
        assert!(dataplane.call(request).await.is_err());
    }

    #[test]
    fn state_round_trip() {
        let dataplane = Dataplane::new(["eth0", "eth1"]);
        let state = dataplane.state();
        let restored = Dataplane::from_state(state.clone());
        assert_eq!(restored.state(), state);
        assert_eq!(restored.interface("eth1").unwrap().sw_if_index, 2);
    }
}
