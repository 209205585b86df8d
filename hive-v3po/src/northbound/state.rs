//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use async_trait::async_trait;
use hive_translate::error::HandlerError;
use hive_translate::handler::{ReadContext, Reader, list_key};
use hive_utils::tree::DataPath;
use serde_json::{Value, json};

use crate::V3po;
use crate::api::{InterfaceKind, SwInterfaceDetails};
use crate::northbound::configuration::{
    BridgeDomainCfg, InterfaceCfg, InterfaceType, L2Cfg, LocatorCfg,
    SubInterfaceCfg,
};
use crate::northbound::{
    BridgeDomainHandler, InterfaceHandler, L2Handler, LocatorSetHandler,
    SubInterfaceHandler,
};

// ===== impl InterfaceHandler =====

#[async_trait]
impl Reader for InterfaceHandler {
    async fn list_keys(
        &self,
        _parent: &DataPath,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Option<Vec<String>>, HandlerError> {
        let v3po = &self.v3po;
        let dump = v3po.interface_dump(ctx.cache).await?;
        let names = dump
            .iter()
            .filter(|iface| iface.kind != InterfaceKind::SubInterface)
            .map(|iface| interface_name(v3po, iface, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(names))
    }

    async fn read(
        &self,
        path: &DataPath,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Option<Value>, HandlerError> {
        let name = list_key(path, "interface")?;
        let Some(iface) = lookup(&self.v3po, name, ctx).await? else {
            return Ok(None);
        };
        let kind = match iface.kind {
            InterfaceKind::Ethernet => InterfaceType::Ethernet,
            InterfaceKind::Loopback => InterfaceType::Loopback,
            InterfaceKind::SubInterface => return Ok(None),
        };

        let cfg = InterfaceCfg {
            kind,
            enabled: iface.admin_up,
        };
        Ok(Some(serde_json::to_value(cfg)?))
    }
}

// ===== impl SubInterfaceHandler =====

#[async_trait]
impl Reader for SubInterfaceHandler {
    async fn list_keys(
        &self,
        parent: &DataPath,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Option<Vec<String>>, HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(parent, "interface")?;
        let Some(sup) = lookup(v3po, name, ctx).await? else {
            return Ok(Some(vec![]));
        };

        let dump = v3po.interface_dump(ctx.cache).await?;
        let keys = dump
            .iter()
            .filter(|iface| iface.kind == InterfaceKind::SubInterface)
            .filter(|iface| iface.sup_sw_if_index == sup.sw_if_index)
            .map(|iface| iface.sub_id.to_string())
            .collect();
        Ok(Some(keys))
    }

    async fn read(
        &self,
        path: &DataPath,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Option<Value>, HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "interface")?;
        let sub_id = list_key(path, "sub-interface")?;
        let Some(sup) = lookup(v3po, name, ctx).await? else {
            return Ok(None);
        };

        let dump = v3po.interface_dump(ctx.cache).await?;
        let subif = dump.iter().find(|iface| {
            iface.kind == InterfaceKind::SubInterface
                && iface.sup_sw_if_index == sup.sw_if_index
                && iface.sub_id.to_string() == sub_id
        });
        let Some(subif) = subif else {
            return Ok(None);
        };

        let cfg = SubInterfaceCfg {
            vlan_id: subif.outer_vlan_id,
            enabled: subif.admin_up,
        };
        Ok(Some(serde_json::to_value(cfg)?))
    }
}

// ===== impl L2Handler =====

#[async_trait]
impl Reader for L2Handler {
    async fn read(
        &self,
        path: &DataPath,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Option<Value>, HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "interface")?;
        let Some(iface) = lookup(v3po, name, ctx).await? else {
            return Ok(None);
        };
        let Some(bd_id) = iface.bd_id else {
            return Ok(None);
        };

        let cfg = L2Cfg {
            bridge_domain: v3po.bridge_domains.get_name(bd_id, ctx.mapping)?,
            split_horizon_group: iface.shg,
            bridged_virtual_interface: iface.bvi,
        };
        Ok(Some(serde_json::to_value(cfg)?))
    }
}

// ===== impl BridgeDomainHandler =====

#[async_trait]
impl Reader for BridgeDomainHandler {
    async fn list_keys(
        &self,
        _parent: &DataPath,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Option<Vec<String>>, HandlerError> {
        let v3po = &self.v3po;
        let dump = v3po.bridge_domain_dump(ctx.cache).await?;
        let names = dump
            .iter()
            .map(|bd| v3po.bridge_domains.get_name(bd.bd_id, ctx.mapping))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(names))
    }

    async fn read(
        &self,
        path: &DataPath,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Option<Value>, HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "bridge-domain")?;
        let Ok(bd_id) = v3po.bridge_domains.get_index(name, ctx.mapping) else {
            return Ok(None);
        };

        let dump = v3po.bridge_domain_dump(ctx.cache).await?;
        let Some(bd) = dump.into_iter().find(|bd| bd.bd_id == bd_id) else {
            return Ok(None);
        };
        let cfg = BridgeDomainCfg::from(bd.flags);
        Ok(Some(serde_json::to_value(cfg)?))
    }
}

// ===== impl LocatorSetHandler =====

#[async_trait]
impl Reader for LocatorSetHandler {
    async fn list_keys(
        &self,
        _parent: &DataPath,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Option<Vec<String>>, HandlerError> {
        let dump = self.v3po.locator_set_dump(ctx.cache).await?;
        let names = dump.into_iter().map(|ls| ls.locator_set_name).collect();
        Ok(Some(names))
    }

    async fn read(
        &self,
        path: &DataPath,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Option<Value>, HandlerError> {
        let name = list_key(path, "locator-set")?;
        let dump = self.v3po.locator_set_dump(ctx.cache).await?;
        if !dump.iter().any(|ls| ls.locator_set_name == name) {
            return Ok(None);
        }
        Ok(Some(json!({})))
    }

    async fn read_subtree(
        &self,
        path: &DataPath,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Vec<(DataPath, Value)>, HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "locator-set")?;
        let dump = v3po.locator_set_dump(ctx.cache).await?;
        let Some(ls) = dump.iter().find(|ls| ls.locator_set_name == name) else {
            return Ok(vec![]);
        };

        ls.locators
            .iter()
            .map(|locator| -> Result<_, HandlerError> {
                let ifname =
                    v3po.interfaces.get_name(locator.sw_if_index, ctx.mapping)?;
                let cfg = LocatorCfg {
                    priority: locator.priority,
                    weight: locator.weight,
                };
                let value = serde_json::to_value(cfg)?;
                Ok((path.child("interface", Some(&ifname)), value))
            })
            .collect()
    }
}

// ===== helper functions =====

// Returns the name of an interface learned from the dataplane.
//
// Physical interfaces are known by their dataplane name. Other interfaces
// that weren't configured locally get an artificial name.
fn interface_name(
    v3po: &V3po,
    iface: &SwInterfaceDetails,
    ctx: &ReadContext<'_>,
) -> Result<String, HandlerError> {
    let interfaces = &v3po.interfaces;
    if let Some(name) =
        interfaces.get_name_if_present(iface.sw_if_index, ctx.mapping)
    {
        return Ok(name);
    }

    match iface.kind {
        InterfaceKind::Ethernet
            if !interfaces.contains_index(&iface.interface_name, ctx.mapping) =>
        {
            interfaces.add_name(
                iface.sw_if_index,
                &iface.interface_name,
                ctx.mapping,
            )?;
            Ok(iface.interface_name.clone())
        }
        _ => Ok(interfaces.get_name(iface.sw_if_index, ctx.mapping)?),
    }
}

// Finds the dataplane interface known under `name`.
async fn lookup(
    v3po: &V3po,
    name: &str,
    ctx: &mut ReadContext<'_>,
) -> Result<Option<SwInterfaceDetails>, HandlerError> {
    let dump = v3po.interface_dump(ctx.cache).await?;
    let iface = match v3po.interfaces.get_index(name, ctx.mapping) {
        Ok(sw_if_index) => {
            dump.into_iter().find(|iface| iface.sw_if_index == sw_if_index)
        }
        // Physical interfaces may not have been learned yet.
        Err(_) => dump.into_iter().find(|iface| {
            iface.kind == InterfaceKind::Ethernet
                && iface.interface_name == name
        }),
    };
    Ok(iface)
}
