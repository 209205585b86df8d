//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hive_translate::error::HandlerError;
use hive_translate::handler::{WriteContext, Writer};
use hive_translate::naming::MappingContext;
use hive_utils::device::DeviceError;
use hive_utils::tree::{DataPath, DataTree};
use pickledb::{PickleDb, PickleDbDumpPolicy, SerializationMethod};
use serde_json::Value;

pub type CallLog = Arc<Mutex<Vec<String>>>;

// Writer recording every invocation, optionally failing for one path.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    pub log: CallLog,
    pub fail_on: Option<DataPath>,
    pub reject: Option<DataPath>,
}

// ===== impl RecordingWriter =====

impl RecordingWriter {
    pub fn new(log: &CallLog) -> RecordingWriter {
        RecordingWriter {
            log: log.clone(),
            ..Default::default()
        }
    }

    pub fn failing_on(log: &CallLog, path: &str) -> RecordingWriter {
        RecordingWriter {
            log: log.clone(),
            fail_on: Some(DataPath::from(path)),
            ..Default::default()
        }
    }

    fn record(&self, operation: &str, path: &DataPath) -> Result<(), HandlerError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{} {}", operation, path));
        if self.fail_on.as_ref() == Some(path) {
            return Err(DeviceError::call(-1, "injected failure").into());
        }
        Ok(())
    }
}

#[async_trait]
impl Writer for RecordingWriter {
    fn validate(
        &self,
        path: &DataPath,
        _after: &Value,
        _config: &DataTree,
    ) -> Result<(), String> {
        match self.reject.as_ref() == Some(path) {
            true => Err("rejected".to_owned()),
            false => Ok(()),
        }
    }

    async fn create(
        &self,
        path: &DataPath,
        _after: &Value,
        _ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        self.record("create", path)
    }

    async fn update(
        &self,
        path: &DataPath,
        _before: &Value,
        _after: &Value,
        _ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        self.record("update", path)
    }

    async fn delete(
        &self,
        path: &DataPath,
        _before: &Value,
        _ctx: &mut WriteContext<'_>,
    ) -> Result<(), HandlerError> {
        self.record("delete", path)
    }
}

//
// Helper functions.
//

pub fn scope() -> MappingContext {
    let db = PickleDb::new(
        "hive-test.db",
        PickleDbDumpPolicy::NeverDump,
        SerializationMethod::Bin,
    );
    MappingContext::new(Arc::new(Mutex::new(db)))
}

pub fn tree(entries: &[(&str, Value)]) -> DataTree {
    entries
        .iter()
        .map(|(path, value)| (DataPath::from(*path), value.clone()))
        .collect()
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}
