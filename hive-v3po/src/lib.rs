//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod api;
pub mod dataplane;
pub mod northbound;

use std::sync::Arc;
use std::time::Duration;

use hive_translate::cache::ModificationCache;
use hive_translate::error::HandlerError;
use hive_translate::naming::{MultiNamingContext, NamingContext};
use hive_utils::device::{self, DeviceApi};

use crate::api::{
    ApiMessage, BridgeDomainDetails, BridgeDomainDump, LispLocatorSetDump,
    LocatorSetDetails, SwInterfaceDetails, SwInterfaceDump,
};

// Cache keys of the dataplane dumps.
pub const INTERFACE_DUMP: &str = "interface-dump";
pub const BRIDGE_DOMAIN_DUMP: &str = "bridge-domain-dump";
pub const LOCATOR_SET_DUMP: &str = "locator-set-dump";

/// Access to the dataplane shared by all v3po handlers.
#[derive(Clone)]
pub struct V3po {
    // Dataplane API.
    pub device: Arc<dyn DeviceApi>,
    // Maximum time to wait for each reply.
    pub timeout: Duration,
    // Interface name <-> sw_if_index.
    pub interfaces: NamingContext,
    // Parent interface name -> sub-interface ids and names.
    pub sub_interfaces: MultiNamingContext,
    // Bridge domain name <-> bd_id.
    pub bridge_domains: NamingContext,
    // Locator set name <-> ls_index.
    pub locator_sets: NamingContext,
}

// ===== impl V3po =====

impl V3po {
    pub fn new(device: Arc<dyn DeviceApi>, timeout: Duration) -> V3po {
        V3po {
            device,
            timeout,
            interfaces: NamingContext::new("interface-", "interface-context"),
            sub_interfaces: MultiNamingContext::new(
                "sub-interface-context",
                1,
            ),
            bridge_domains: NamingContext::new(
                "bridge-domain-",
                "bridge-domain-context",
            ),
            locator_sets: NamingContext::new(
                "locator-set-",
                "locator-set-context",
            ),
        }
    }

    // Sends a message to the dataplane and decodes its reply.
    pub async fn call<M>(&self, msg: &M) -> Result<M::Reply, HandlerError>
    where
        M: ApiMessage + Sync,
    {
        let request = msg.request()?;
        let reply =
            device::invoke(self.device.as_ref(), request, self.timeout).await?;
        let reply = serde_json::from_value(reply.data)?;
        Ok(reply)
    }

    pub async fn interface_dump(
        &self,
        cache: &mut ModificationCache,
    ) -> Result<Vec<SwInterfaceDetails>, HandlerError> {
        cache
            .get_or_dump(INTERFACE_DUMP, || async move {
                self.call(&SwInterfaceDump {}).await
            })
            .await
    }

    pub async fn bridge_domain_dump(
        &self,
        cache: &mut ModificationCache,
    ) -> Result<Vec<BridgeDomainDetails>, HandlerError> {
        cache
            .get_or_dump(BRIDGE_DOMAIN_DUMP, || async move {
                self.call(&BridgeDomainDump {}).await
            })
            .await
    }

    pub async fn locator_set_dump(
        &self,
        cache: &mut ModificationCache,
    ) -> Result<Vec<LocatorSetDetails>, HandlerError> {
        cache
            .get_or_dump(LOCATOR_SET_DUMP, || async move {
                self.call(&LispLocatorSetDump {}).await
            })
            .await
    }

    // Looks up an interface in the (cached) interface dump.
    pub async fn interface(
        &self,
        sw_if_index: u32,
        cache: &mut ModificationCache,
    ) -> Result<Option<SwInterfaceDetails>, HandlerError> {
        let dump = self.interface_dump(cache).await?;
        Ok(dump
            .into_iter()
            .find(|iface| iface.sw_if_index == sw_if_index))
    }
}

impl std::fmt::Debug for V3po {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V3po")
            .field("timeout", &self.timeout)
            .field("interfaces", &self.interfaces)
            .field("sub_interfaces", &self.sub_interfaces)
            .field("bridge_domains", &self.bridge_domains)
            .field("locator_sets", &self.locator_sets)
            .finish_non_exhaustive()
    }
}
