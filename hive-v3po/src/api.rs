//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use derive_new::new;
use hive_utils::device::DeviceRequest;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

// Return codes used by the dataplane.
pub const ERR_INVALID_VALUE: i32 = -1;
pub const ERR_INVALID_SW_IF_INDEX: i32 = -2;
pub const ERR_NO_SUCH_ENTRY: i32 = -6;
pub const ERR_ENTRY_ALREADY_EXISTS: i32 = -16;
pub const ERR_IN_USE: i32 = -39;

/// Typed dataplane API message.
pub trait ApiMessage: Serialize {
    const NAME: &'static str;

    type Reply: DeserializeOwned;

    fn request(&self) -> Result<DeviceRequest, serde_json::Error> {
        let args = serde_json::to_value(self)?;
        Ok(DeviceRequest::new(Self::NAME.to_owned(), args))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceKind {
    Ethernet,
    Loopback,
    SubInterface,
}

//
// Interface messages.
//

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SwInterfaceDump {}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SwInterfaceDetails {
    pub sw_if_index: u32,
    pub interface_name: String,
    pub kind: InterfaceKind,
    pub admin_up: bool,
    pub sup_sw_if_index: u32,
    pub sub_id: u32,
    pub outer_vlan_id: u16,
    // L2 bridge domain membership.
    pub bd_id: Option<u32>,
    pub shg: u8,
    pub bvi: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct CreateLoopback {
    pub mac_address: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct CreateLoopbackReply {
    pub sw_if_index: u32,
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct DeleteLoopback {
    pub sw_if_index: u32,
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct SwInterfaceSetFlags {
    pub sw_if_index: u32,
    pub admin_up: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct CreateSubif {
    pub sw_if_index: u32,
    pub sub_id: u32,
    pub outer_vlan_id: u16,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct CreateSubifReply {
    pub sw_if_index: u32,
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct DeleteSubif {
    pub sw_if_index: u32,
}

//
// Bridge domain messages.
//

#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct BridgeDomainAddDel {
    pub bd_id: u32,
    pub is_add: bool,
    pub flags: BridgeDomainFlags,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct BridgeDomainFlags {
    pub flood: bool,
    pub forward: bool,
    pub learn: bool,
    pub uu_flood: bool,
    pub arp_term: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct BridgeDomainSetFlags {
    pub bd_id: u32,
    pub flags: BridgeDomainFlags,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct BridgeDomainDump {}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct BridgeDomainDetails {
    pub bd_id: u32,
    pub flags: BridgeDomainFlags,
    pub members: Vec<u32>,
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct SwInterfaceSetL2Bridge {
    pub rx_sw_if_index: u32,
    pub bd_id: u32,
    pub shg: u8,
    pub bvi: bool,
    pub enable: bool,
}

//
// LISP messages.
//

#[derive(Clone, Copy, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct Locator {
    pub sw_if_index: u32,
    pub priority: u8,
    pub weight: u8,
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct LispAddDelLocatorSet {
    pub is_add: bool,
    pub locator_set_name: String,
    pub locators: Vec<Locator>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LispAddDelLocatorSetReply {
    pub ls_index: u32,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LispLocatorSetDump {}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LocatorSetDetails {
    pub ls_index: u32,
    pub locator_set_name: String,
    pub locators: Vec<Locator>,
}

// ===== impl ApiMessage =====

impl ApiMessage for SwInterfaceDump {
    const NAME: &'static str = "sw_interface_dump";
    type Reply = Vec<SwInterfaceDetails>;
}

impl ApiMessage for CreateLoopback {
    const NAME: &'static str = "create_loopback";
    type Reply = CreateLoopbackReply;
}

impl ApiMessage for DeleteLoopback {
    const NAME: &'static str = "delete_loopback";
    type Reply = IgnoredAny;
}

impl ApiMessage for SwInterfaceSetFlags {
    const NAME: &'static str = "sw_interface_set_flags";
    type Reply = IgnoredAny;
}

impl ApiMessage for CreateSubif {
    const NAME: &'static str = "create_subif";
    type Reply = CreateSubifReply;
}

impl ApiMessage for DeleteSubif {
    const NAME: &'static str = "delete_subif";
    type Reply = IgnoredAny;
}

impl ApiMessage for BridgeDomainAddDel {
    const NAME: &'static str = "bridge_domain_add_del";
    type Reply = IgnoredAny;
}

impl ApiMessage for BridgeDomainSetFlags {
    const NAME: &'static str = "bridge_domain_set_flags";
    type Reply = IgnoredAny;
}

impl ApiMessage for BridgeDomainDump {
    const NAME: &'static str = "bridge_domain_dump";
    type Reply = Vec<BridgeDomainDetails>;
}

impl ApiMessage for SwInterfaceSetL2Bridge {
    const NAME: &'static str = "sw_interface_set_l2_bridge";
    type Reply = IgnoredAny;
}

impl ApiMessage for LispAddDelLocatorSet {
    const NAME: &'static str = "lisp_add_del_locator_set";
    type Reply = LispAddDelLocatorSetReply;
}

impl ApiMessage for LispLocatorSetDump {
    const NAME: &'static str = "lisp_locator_set_dump";
    type Reply = Vec<LocatorSetDetails>;
}
