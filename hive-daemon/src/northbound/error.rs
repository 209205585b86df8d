//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use hive_translate as translate;
use hive_translate::TransactionError;
use hive_utils::tree::TreeError;

//
// Type aliases.
//
pub type Result<T> = std::result::Result<T, Error>;

//
// Northbound errors.
//
#[derive(Debug)]
pub enum Error {
    Registry(translate::Error),
    ConfigLoad(std::io::Error),
    ConfigParse(serde_json::Error),
    ConfigInvalid(TreeError),
    Transaction(TransactionError),
    Get(translate::Error),
}

// ===== impl Error =====

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Registry(err) => {
                write!(f, "Failed to build handler registry: {}", err)
            }
            Error::ConfigLoad(err) => {
                write!(f, "Failed to load configuration: {}", err)
            }
            Error::ConfigParse(err) => {
                write!(f, "Invalid configuration data: {}", err)
            }
            Error::ConfigInvalid(err) => {
                write!(f, "Invalid configuration tree: {}", err)
            }
            Error::Transaction(err) => {
                write!(f, "Transaction failed: {}", err)
            }
            Error::Get(err) => {
                write!(f, "Failed to get operational data: {}", err)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Registry(err) | Error::Get(err) => Some(err),
            Error::ConfigLoad(err) => Some(err),
            Error::ConfigParse(err) => Some(err),
            Error::ConfigInvalid(err) => Some(err),
            Error::Transaction(err) => Some(err),
        }
    }
}
