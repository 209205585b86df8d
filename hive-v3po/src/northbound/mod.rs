//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod configuration;
pub mod state;

use derive_new::new;
use hive_translate::error::Error;
use hive_translate::registry::{Handler, Registry};

use crate::V3po;

// Schema paths of the nodes handled by this crate.
pub mod paths {
    pub mod interfaces {
        pub mod interface {
            pub const PATH: &str = "/interfaces/interface";

            pub mod sub_interface {
                pub const PATH: &str =
                    "/interfaces/interface/sub-interfaces/sub-interface";
            }

            pub mod l2 {
                pub const PATH: &str = "/interfaces/interface/l2";
            }
        }
    }

    pub mod bridge_domains {
        pub mod bridge_domain {
            pub const PATH: &str = "/bridge-domains/bridge-domain";
        }
    }

    pub mod lisp {
        pub mod locator_set {
            pub const PATH: &str = "/lisp/locator-sets/locator-set";

            pub mod interface {
                pub const PATH: &str =
                    "/lisp/locator-sets/locator-set/interface";
            }
        }
    }
}

use paths::bridge_domains::bridge_domain;
use paths::interfaces::interface::{self, l2, sub_interface};
use paths::lisp::locator_set;

#[derive(Debug, new)]
pub struct InterfaceHandler {
    v3po: V3po,
}

#[derive(Debug, new)]
pub struct SubInterfaceHandler {
    v3po: V3po,
}

#[derive(Debug, new)]
pub struct L2Handler {
    v3po: V3po,
}

#[derive(Debug, new)]
pub struct BridgeDomainHandler {
    v3po: V3po,
}

// Owns the locator set together with its locators, which the dataplane
// configures in a single call.
#[derive(Debug, new)]
pub struct LocatorSetHandler {
    v3po: V3po,
}

// ===== global functions =====

// Builds the handler registry of the v3po data model.
pub fn registry(v3po: &V3po) -> Result<Registry, Error> {
    Registry::builder()
        .register(
            interface::PATH,
            Handler::new(InterfaceHandler::new(v3po.clone())),
        )
        .register(
            sub_interface::PATH,
            Handler::new(SubInterfaceHandler::new(v3po.clone())),
        )
        .register(
            bridge_domain::PATH,
            Handler::new(BridgeDomainHandler::new(v3po.clone())),
        )
        .register(l2::PATH, Handler::new(L2Handler::new(v3po.clone())))
        .register_subtree(
            locator_set::PATH,
            [locator_set::interface::PATH],
            Handler::new(LocatorSetHandler::new(v3po.clone())),
        )
        // Interfaces join bridge domains that must already exist.
        .register_after(l2::PATH, [bridge_domain::PATH])
        // Locators reference interfaces and sub-interfaces.
        .register_after(
            locator_set::PATH,
            [interface::PATH, sub_interface::PATH],
        )
        .build()
}
