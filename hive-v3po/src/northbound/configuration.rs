//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use async_trait::async_trait;
use hive_translate::error::HandlerError;
use hive_translate::handler::{WriteContext, Writer, list_key, parse};
use hive_utils::tree::{DataPath, DataTree};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::api::{
    BridgeDomainAddDel, BridgeDomainFlags, BridgeDomainSetFlags,
    CreateLoopback, CreateSubif, DeleteLoopback, DeleteSubif, InterfaceKind,
    LispAddDelLocatorSet, Locator, SwInterfaceSetFlags, SwInterfaceSetL2Bridge,
};
use crate::northbound::{
    BridgeDomainHandler, InterfaceHandler, L2Handler, LocatorSetHandler,
    SubInterfaceHandler,
};
use crate::{INTERFACE_DUMP, V3po};

// ===== configuration structs =====

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceType {
    Ethernet,
    Loopback,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct InterfaceCfg {
    #[serde(rename = "type")]
    pub kind: InterfaceType,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SubInterfaceCfg {
    pub vlan_id: u16,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct L2Cfg {
    pub bridge_domain: String,
    #[serde(default)]
    pub split_horizon_group: u8,
    #[serde(default)]
    pub bridged_virtual_interface: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BridgeDomainCfg {
    pub flood: bool,
    pub forward: bool,
    pub learn: bool,
    pub unknown_unicast_flood: bool,
    pub arp_termination: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocatorCfg {
    pub priority: u8,
    pub weight: u8,
}

// ===== impl InterfaceHandler =====

#[async_trait]
impl Writer for InterfaceHandler {
    async fn create(
        &self,
        path: &DataPath,
        after: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "interface")?;
        let cfg = parse::<InterfaceCfg>(after)?;

        match cfg.kind {
            InterfaceType::Loopback => {
                let reply = v3po.call(&CreateLoopback::new(None)).await?;
                ctx.cache.remove(INTERFACE_DUMP);
                let sw_if_index = reply.sw_if_index;
                if let Err(error) =
                    init_interface(v3po, name, sw_if_index, cfg.enabled, ctx)
                        .await
                {
                    // Leave nothing behind for the next attempt.
                    if let Err(error) =
                        v3po.call(&DeleteLoopback::new(sw_if_index)).await
                    {
                        warn!(%name, %sw_if_index, %error, "failed to remove loopback");
                    }
                    ctx.cache.remove(INTERFACE_DUMP);
                    release_name(v3po, name, sw_if_index, ctx);
                    return Err(error);
                }
            }
            InterfaceType::Ethernet => {
                // Physical interfaces can't be created, only adopted.
                let dump = v3po.interface_dump(ctx.cache).await?;
                let iface = dump
                    .iter()
                    .find(|iface| {
                        iface.kind == InterfaceKind::Ethernet
                            && iface.interface_name == name
                    })
                    .ok_or_else(|| {
                        HandlerError::InvalidData(format!(
                            "ethernet interface {name} doesn't exist"
                        ))
                    })?;
                init_interface(v3po, name, iface.sw_if_index, cfg.enabled, ctx)
                    .await?;
            }
        }

        Ok(())
    }

    async fn update(
        &self,
        path: &DataPath,
        before: &Value,
        after: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "interface")?;
        let old = parse::<InterfaceCfg>(before)?;
        let new = parse::<InterfaceCfg>(after)?;
        if old.kind != new.kind {
            return Err(HandlerError::Unsupported(format!(
                "type of interface {name} can't be changed"
            )));
        }

        let sw_if_index = v3po.interfaces.get_index(name, ctx.mapping)?;
        v3po.call(&SwInterfaceSetFlags::new(sw_if_index, new.enabled))
            .await?;
        Ok(())
    }

    async fn delete(
        &self,
        path: &DataPath,
        before: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "interface")?;
        let cfg = parse::<InterfaceCfg>(before)?;
        if cfg.kind == InterfaceType::Ethernet {
            return Err(HandlerError::Unsupported(format!(
                "ethernet interface {name} can't be deleted"
            )));
        }

        let sw_if_index = v3po.interfaces.get_index(name, ctx.mapping)?;
        v3po.call(&DeleteLoopback::new(sw_if_index)).await?;
        ctx.cache.remove(INTERFACE_DUMP);
        v3po.interfaces.remove_name(name, ctx.mapping)?;
        Ok(())
    }
}

// ===== impl SubInterfaceHandler =====

#[async_trait]
impl Writer for SubInterfaceHandler {
    fn validate(
        &self,
        _path: &DataPath,
        after: &Value,
        _config: &DataTree,
    ) -> Result<(), String> {
        let cfg = parse::<SubInterfaceCfg>(after)
            .map_err(|error| error.to_string())?;
        if !(1..=4094).contains(&cfg.vlan_id) {
            return Err(format!("invalid VLAN id: {}", cfg.vlan_id));
        }
        Ok(())
    }

    async fn create(
        &self,
        path: &DataPath,
        after: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let v3po = &self.v3po;
        let (sup_name, sub_id) = sub_interface_key(path)?;
        let cfg = parse::<SubInterfaceCfg>(after)?;

        let sup_sw_if_index = v3po.interfaces.get_index(sup_name, ctx.mapping)?;
        let name = sub_interface_name(sup_name, sub_id);
        v3po.sub_interfaces
            .add_child(sup_name, sub_id, &name, ctx.mapping)?;

        let reply = match v3po
            .call(&CreateSubif::new(sup_sw_if_index, sub_id, cfg.vlan_id))
            .await
        {
            Ok(reply) => reply,
            Err(error) => {
                release_sub_id(v3po, sup_name, &name, ctx);
                return Err(error);
            }
        };
        ctx.cache.remove(INTERFACE_DUMP);

        let sw_if_index = reply.sw_if_index;
        if let Err(error) =
            init_interface(v3po, &name, sw_if_index, cfg.enabled, ctx).await
        {
            // Leave nothing behind for the next attempt.
            if let Err(error) = v3po.call(&DeleteSubif::new(sw_if_index)).await
            {
                warn!(%name, %sw_if_index, %error, "failed to remove sub-interface");
            }
            ctx.cache.remove(INTERFACE_DUMP);
            release_name(v3po, &name, sw_if_index, ctx);
            release_sub_id(v3po, sup_name, &name, ctx);
            return Err(error);
        }

        Ok(())
    }

    async fn delete(
        &self,
        path: &DataPath,
        _before: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let v3po = &self.v3po;
        let (sup_name, sub_id) = sub_interface_key(path)?;
        let name =
            v3po.sub_interfaces
                .get_child_name(sup_name, sub_id, ctx.mapping)?;

        let sw_if_index = v3po.interfaces.get_index(&name, ctx.mapping)?;
        v3po.call(&DeleteSubif::new(sw_if_index)).await?;
        ctx.cache.remove(INTERFACE_DUMP);
        v3po.interfaces.remove_name(&name, ctx.mapping)?;
        v3po.sub_interfaces
            .remove_child(sup_name, &name, ctx.mapping)?;
        Ok(())
    }
}

// ===== impl L2Handler =====

#[async_trait]
impl Writer for L2Handler {
    fn validate(
        &self,
        _path: &DataPath,
        after: &Value,
        config: &DataTree,
    ) -> Result<(), String> {
        let cfg = parse::<L2Cfg>(after).map_err(|error| error.to_string())?;
        if !config.contains(&bridge_domain_path(&cfg.bridge_domain)) {
            return Err(format!(
                "bridge domain {} isn't configured",
                cfg.bridge_domain
            ));
        }
        Ok(())
    }

    async fn create(
        &self,
        path: &DataPath,
        after: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let cfg = parse::<L2Cfg>(after)?;
        self.set_bridge(path, &cfg, true, ctx).await
    }

    async fn update(
        &self,
        path: &DataPath,
        _before: &Value,
        after: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        // The dataplane moves the interface when it joins another domain.
        let cfg = parse::<L2Cfg>(after)?;
        self.set_bridge(path, &cfg, true, ctx).await
    }

    async fn delete(
        &self,
        path: &DataPath,
        before: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let cfg = parse::<L2Cfg>(before)?;
        self.set_bridge(path, &cfg, false, ctx).await
    }
}

impl L2Handler {
    async fn set_bridge(
        &self,
        path: &DataPath,
        cfg: &L2Cfg,
        enable: bool,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "interface")?;
        let sw_if_index = v3po.interfaces.get_index(name, ctx.mapping)?;
        let bd_id = v3po
            .bridge_domains
            .get_index(&cfg.bridge_domain, ctx.mapping)?;

        v3po.call(&SwInterfaceSetL2Bridge::new(
            sw_if_index,
            bd_id,
            cfg.split_horizon_group,
            cfg.bridged_virtual_interface,
            enable,
        ))
        .await?;
        Ok(())
    }
}

// ===== impl BridgeDomainHandler =====

#[async_trait]
impl Writer for BridgeDomainHandler {
    async fn create(
        &self,
        path: &DataPath,
        after: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "bridge-domain")?;
        let cfg = parse::<BridgeDomainCfg>(after)?;

        // Bridge domain ids are allocated locally.
        let bd_id = v3po.bridge_domains.add_name_next(name, ctx.mapping)?;
        let msg = BridgeDomainAddDel::new(bd_id, true, (&cfg).into());
        if let Err(error) = v3po.call(&msg).await {
            v3po.bridge_domains.remove_name(name, ctx.mapping)?;
            return Err(error);
        }
        Ok(())
    }

    async fn update(
        &self,
        path: &DataPath,
        _before: &Value,
        after: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "bridge-domain")?;
        let cfg = parse::<BridgeDomainCfg>(after)?;

        let bd_id = v3po.bridge_domains.get_index(name, ctx.mapping)?;
        v3po.call(&BridgeDomainSetFlags::new(bd_id, (&cfg).into()))
            .await?;
        Ok(())
    }

    async fn delete(
        &self,
        path: &DataPath,
        before: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "bridge-domain")?;
        let cfg = parse::<BridgeDomainCfg>(before)?;

        let bd_id = v3po.bridge_domains.get_index(name, ctx.mapping)?;
        v3po.call(&BridgeDomainAddDel::new(bd_id, false, (&cfg).into()))
            .await?;
        v3po.bridge_domains.remove_name(name, ctx.mapping)?;
        Ok(())
    }
}

// ===== impl LocatorSetHandler =====

#[async_trait]
impl Writer for LocatorSetHandler {
    fn validate(
        &self,
        path: &DataPath,
        _after: &Value,
        config: &DataTree,
    ) -> Result<(), String> {
        if config.children(path, "interface").next().is_none() {
            return Err(format!("locator set {path} has no locators"));
        }
        Ok(())
    }

    async fn create(
        &self,
        path: &DataPath,
        _after: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "locator-set")?;
        let locators = self.locators(path, ctx)?;

        let reply = v3po
            .call(&LispAddDelLocatorSet::new(true, name.to_owned(), locators))
            .await?;
        v3po.locator_sets.add_name(reply.ls_index, name, ctx.mapping)?;
        Ok(())
    }

    async fn update(
        &self,
        path: &DataPath,
        _before: &Value,
        _after: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        // Adding an existing locator set replaces all of its locators.
        let v3po = &self.v3po;
        let name = list_key(path, "locator-set")?;
        let locators = self.locators(path, ctx)?;

        v3po.call(&LispAddDelLocatorSet::new(true, name.to_owned(), locators))
            .await?;
        Ok(())
    }

    async fn delete(
        &self,
        path: &DataPath,
        _before: &Value,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        let v3po = &self.v3po;
        let name = list_key(path, "locator-set")?;

        v3po.call(&LispAddDelLocatorSet::new(false, name.to_owned(), vec![]))
            .await?;
        v3po.locator_sets.remove_name(name, ctx.mapping)?;
        Ok(())
    }
}

impl LocatorSetHandler {
    // Collects the desired locators of a locator set.
    fn locators(
        &self,
        path: &DataPath,
        ctx: &WriteContext<'_>,
    ) -> Result<Vec<Locator>, HandlerError> {
        ctx.after
            .children(path, "interface")
            .map(|(child, value)| -> Result<_, HandlerError> {
                let name = list_key(child, "interface")?;
                let cfg = parse::<LocatorCfg>(value)?;
                let sw_if_index =
                    self.v3po.interfaces.get_index(name, ctx.mapping)?;
                Ok(Locator::new(sw_if_index, cfg.priority, cfg.weight))
            })
            .collect()
    }
}

// ===== impl BridgeDomainCfg =====

impl Default for BridgeDomainCfg {
    fn default() -> BridgeDomainCfg {
        BridgeDomainCfg {
            flood: true,
            forward: true,
            learn: true,
            unknown_unicast_flood: true,
            arp_termination: false,
        }
    }
}

impl From<&BridgeDomainCfg> for BridgeDomainFlags {
    fn from(cfg: &BridgeDomainCfg) -> BridgeDomainFlags {
        BridgeDomainFlags {
            flood: cfg.flood,
            forward: cfg.forward,
            learn: cfg.learn,
            uu_flood: cfg.unknown_unicast_flood,
            arp_term: cfg.arp_termination,
        }
    }
}

impl From<BridgeDomainFlags> for BridgeDomainCfg {
    fn from(flags: BridgeDomainFlags) -> BridgeDomainCfg {
        BridgeDomainCfg {
            flood: flags.flood,
            forward: flags.forward,
            learn: flags.learn,
            unknown_unicast_flood: flags.uu_flood,
            arp_termination: flags.arp_term,
        }
    }
}

// ===== helper functions =====

// Returns the parent interface name and the id of a sub-interface.
fn sub_interface_key(path: &DataPath) -> Result<(&str, u32), HandlerError> {
    let sup_name = list_key(path, "interface")?;
    let sub_id = list_key(path, "sub-interface")?;
    let sub_id = sub_id.parse::<u32>().map_err(|_| {
        HandlerError::InvalidData(format!("invalid sub-interface id: {sub_id}"))
    })?;
    Ok((sup_name, sub_id))
}

// Maps a new interface and applies its administrative state.
async fn init_interface(
    v3po: &V3po,
    name: &str,
    sw_if_index: u32,
    enabled: bool,
    ctx: &mut WriteContext<'_>,
) -> Result<(), HandlerError> {
    v3po.interfaces.add_name(sw_if_index, name, ctx.mapping)?;
    v3po.call(&SwInterfaceSetFlags::new(sw_if_index, enabled))
        .await?;
    Ok(())
}

// Drops the mapping of `name`, but only if it points to `sw_if_index`.
fn release_name(
    v3po: &V3po,
    name: &str,
    sw_if_index: u32,
    ctx: &WriteContext<'_>,
) {
    let interfaces = &v3po.interfaces;
    if interfaces
        .get_name_if_present(sw_if_index, ctx.mapping)
        .as_deref()
        != Some(name)
    {
        return;
    }
    if let Err(error) = interfaces.remove_name(name, ctx.mapping) {
        warn!(%name, %error, "failed to remove interface mapping");
    }
}

fn release_sub_id(
    v3po: &V3po,
    sup_name: &str,
    name: &str,
    ctx: &WriteContext<'_>,
) {
    if let Err(error) =
        v3po.sub_interfaces.remove_child(sup_name, name, ctx.mapping)
    {
        warn!(%name, %error, "failed to remove sub-interface mapping");
    }
}

// Name under which a sub-interface is known in the interface context.
pub(crate) fn sub_interface_name(sup_name: &str, sub_id: u32) -> String {
    format!("{sup_name}.{sub_id}")
}

// Returns the instance path of the bridge domain named `name`.
pub(crate) fn bridge_domain_path(name: &str) -> DataPath {
    DataPath::root()
        .child("bridge-domains", None)
        .child("bridge-domain", Some(name))
}
