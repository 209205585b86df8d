//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod cache;
pub mod debug;
pub mod diff;
pub mod engine;
pub mod error;
pub mod handler;
pub mod naming;
pub mod registry;
pub mod state;

pub use crate::engine::{SyncEngine, TransactionError, TransactionReport};
pub use crate::error::Error;
pub use crate::registry::{Handler, Registry, RegistryBuilder};
