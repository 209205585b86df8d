//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use hive_utils::tree::{DataPath, SchemaPath};
use tracing::{debug, debug_span, trace, trace_span};

use crate::diff::Operation;

#[derive(Debug)]
pub enum Debug<'a> {
    RegistryBuilt(&'a [SchemaPath]),
    ChangesComputed(usize),
    ValidationCallback(&'a DataPath),
    WriteCallback(Operation, &'a DataPath),
    ReadCallback(&'a SchemaPath, &'a DataPath),
    CacheHit(&'a str),
    CacheMiss(&'a str),
    MappingAdd(&'a str, &'a str, u32),
    MappingDel(&'a str, &'a str, u32),
}

// ===== impl Debug =====

impl Debug<'_> {
    pub fn log(&self) {
        match self {
            Debug::RegistryBuilt(order) => {
                debug_span!("translate").in_scope(|| {
                    let order = order
                        .iter()
                        .map(|path| path.to_string())
                        .collect::<Vec<_>>();
                    debug!(?order, "{}", self);
                });
            }
            Debug::ChangesComputed(count) => {
                debug_span!("translate").in_scope(|| {
                    debug!(%count, "{}", self);
                });
            }
            Debug::ValidationCallback(path) => {
                trace_span!("translate").in_scope(|| {
                    trace!(%path, "{}", self);
                });
            }
            Debug::WriteCallback(operation, path) => {
                trace_span!("translate").in_scope(|| {
                    trace!(?operation, %path, "{}", self);
                });
            }
            Debug::ReadCallback(schema, parent) => {
                trace_span!("translate").in_scope(|| {
                    trace!(%schema, %parent, "{}", self);
                });
            }
            Debug::CacheHit(key) | Debug::CacheMiss(key) => {
                trace_span!("translate")
                    .in_scope(|| trace!(%key, "{}", self));
            }
            Debug::MappingAdd(context, name, index)
            | Debug::MappingDel(context, name, index) => {
                trace_span!("translate").in_scope(|| {
                    trace!(%context, %name, %index, "{}", self);
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::RegistryBuilt(..) => {
                write!(f, "handler registry built")
            }
            Debug::ChangesComputed(..) => {
                write!(f, "computed configuration changes")
            }
            Debug::ValidationCallback(..) => {
                write!(f, "validation callback")
            }
            Debug::WriteCallback(..) => {
                write!(f, "write callback")
            }
            Debug::ReadCallback(..) => {
                write!(f, "read callback")
            }
            Debug::CacheHit(..) => {
                write!(f, "cache hit")
            }
            Debug::CacheMiss(..) => {
                write!(f, "cache miss")
            }
            Debug::MappingAdd(..) => {
                write!(f, "mapping added")
            }
            Debug::MappingDel(..) => {
                write!(f, "mapping removed")
            }
        }
    }
}
