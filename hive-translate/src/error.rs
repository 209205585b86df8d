//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use hive_utils::device::DeviceError;
use hive_utils::tree::{DataPath, SchemaPath};
use tracing::{error, warn};

// Translation errors.
#[derive(Debug)]
pub enum Error {
    Configuration(ConfigError),
    Mapping(MappingError),
    MissingHandler(DataPath),
    ValidationFailed(DataPath, String),
    CreateFailed(DataPath, HandlerError),
    UpdateFailed(DataPath, HandlerError),
    DeleteFailed(DataPath, HandlerError),
    ReadFailed(DataPath, HandlerError),
}

// Registry build errors. These are fatal at startup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    DuplicatePath(SchemaPath),
    SubtreeOverlap(SchemaPath),
    InvalidSubtreeChild(SchemaPath, SchemaPath),
    UnknownPath(SchemaPath),
    Cycle(Vec<SchemaPath>),
}

// Naming context errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MappingError {
    UnknownName(String, String),
    UnknownIndex(String, u32),
    Conflict(String, String, u32),
    InvalidIndex(String, u32),
    Store(String),
}

// Failure cause reported by a handler.
#[derive(Debug)]
pub enum HandlerError {
    Device(DeviceError),
    Mapping(MappingError),
    Unsupported(String),
    InvalidData(String),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::Configuration(error) => {
                error!(%error, "{}", self);
            }
            Error::Mapping(error) => {
                warn!(%error, "{}", self);
            }
            Error::MissingHandler(path) => {
                warn!(%path, "{}", self);
            }
            Error::ValidationFailed(path, error) => {
                warn!(%path, %error, "{}", self);
            }
            Error::CreateFailed(path, error)
            | Error::UpdateFailed(path, error)
            | Error::DeleteFailed(path, error)
            | Error::ReadFailed(path, error) => {
                warn!(%path, %error, "{}", self);
            }
        }
    }

    // Data path of the node that caused the error, if any.
    pub fn path(&self) -> Option<&DataPath> {
        match self {
            Error::Configuration(..) | Error::Mapping(..) => None,
            Error::MissingHandler(path)
            | Error::ValidationFailed(path, _)
            | Error::CreateFailed(path, _)
            | Error::UpdateFailed(path, _)
            | Error::DeleteFailed(path, _)
            | Error::ReadFailed(path, _) => Some(path),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Configuration(..) => {
                write!(f, "invalid handler registry configuration")
            }
            Error::Mapping(..) => {
                write!(f, "naming context operation failed")
            }
            Error::MissingHandler(path) => {
                write!(f, "no handler registered for {}", path)
            }
            Error::ValidationFailed(path, _) => {
                write!(f, "validation failed for {}", path)
            }
            Error::CreateFailed(path, _) => {
                write!(f, "failed to create {}", path)
            }
            Error::UpdateFailed(path, _) => {
                write!(f, "failed to update {}", path)
            }
            Error::DeleteFailed(path, _) => {
                write!(f, "failed to delete {}", path)
            }
            Error::ReadFailed(path, _) => {
                write!(f, "failed to read {}", path)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Configuration(error) => Some(error),
            Error::Mapping(error) => Some(error),
            Error::CreateFailed(_, error)
            | Error::UpdateFailed(_, error)
            | Error::DeleteFailed(_, error)
            | Error::ReadFailed(_, error) => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Error {
        Error::Configuration(error)
    }
}

impl From<MappingError> for Error {
    fn from(error: MappingError) -> Error {
        Error::Mapping(error)
    }
}

// ===== impl ConfigError =====

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::DuplicatePath(path) => {
                write!(f, "handler already registered for {}", path)
            }
            ConfigError::SubtreeOverlap(path) => {
                write!(f, "{} is claimed by more than one handler", path)
            }
            ConfigError::InvalidSubtreeChild(root, child) => {
                write!(f, "{} is not a descendant of subtree {}", child, root)
            }
            ConfigError::UnknownPath(path) => {
                write!(f, "ordering constraint on unregistered path {}", path)
            }
            ConfigError::Cycle(paths) => {
                write!(f, "ordering cycle between: ")?;
                for (i, path) in paths.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", path)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ===== impl MappingError =====

impl std::fmt::Display for MappingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingError::UnknownName(context, name) => {
                write!(f, "{}: no mapping stored for name {}", context, name)
            }
            MappingError::UnknownIndex(context, index) => {
                write!(f, "{}: no mapping stored for index {}", context, index)
            }
            MappingError::Conflict(context, name, index) => {
                write!(
                    f,
                    "{}: mapping {} <-> {} conflicts with an existing entry",
                    context, name, index
                )
            }
            MappingError::InvalidIndex(context, index) => {
                write!(f, "{}: index {} is out of range", context, index)
            }
            MappingError::Store(error) => {
                write!(f, "mapping store failure: {}", error)
            }
        }
    }
}

impl std::error::Error for MappingError {}

// ===== impl HandlerError =====

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerError::Device(error) => write!(f, "{}", error),
            HandlerError::Mapping(error) => write!(f, "{}", error),
            HandlerError::Unsupported(reason) => {
                write!(f, "operation not supported: {}", reason)
            }
            HandlerError::InvalidData(reason) => {
                write!(f, "invalid node data: {}", reason)
            }
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandlerError::Device(error) => Some(error),
            HandlerError::Mapping(error) => Some(error),
            _ => None,
        }
    }
}

impl From<DeviceError> for HandlerError {
    fn from(error: DeviceError) -> HandlerError {
        HandlerError::Device(error)
    }
}

impl From<MappingError> for HandlerError {
    fn from(error: MappingError) -> HandlerError {
        HandlerError::Mapping(error)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> HandlerError {
        HandlerError::InvalidData(error.to_string())
    }
}
