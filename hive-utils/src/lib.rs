//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

use std::sync::{Arc, Mutex};

use pickledb::PickleDb;

pub mod device;
pub mod serde {
    pub mod data_tree;
}
pub mod tree;

pub type Database = Arc<Mutex<PickleDb>>;
pub type DatabaseError = pickledb::error::Error;
