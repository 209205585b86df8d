//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use derive_new::new;
use hive_utils::tree::{DataPath, DataTree};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, debug_span};

use crate::cache::ModificationCache;
use crate::debug::Debug;
use crate::diff::{self, Change, Operation};
use crate::error::Error;
use crate::handler::{WriteContext, Writer};
use crate::naming::MappingContext;
use crate::registry::Registry;

/// Applies configuration changes to the device, one at a time.
#[derive(Debug)]
pub struct SyncEngine {
    registry: Arc<Registry>,
    // Serializes transactions against the device.
    lock: Mutex<()>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum ChangeState {
    Pending,
    InProgress,
    Committed,
    Failed,
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct ChangeStatus {
    pub path: DataPath,
    pub operation: Operation,
    pub state: ChangeState,
}

/// Outcome of every change of a transaction, in execution order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct TransactionReport {
    pub changes: Vec<ChangeStatus>,
}

/// Failed transaction.
///
/// Changes committed before the failure are not rolled back. The report
/// tells which ones they are.
#[derive(Debug)]
pub struct TransactionError {
    pub error: Error,
    pub report: TransactionReport,
}

// ===== impl SyncEngine =====

impl SyncEngine {
    pub fn new(registry: Arc<Registry>) -> SyncEngine {
        SyncEngine {
            registry,
            lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    // Moves the device from the `before` configuration to `after`.
    //
    // All writers validate their data before the first device call is made.
    // Changes are then committed strictly in order and processing stops at
    // the first failure.
    pub async fn apply(
        &self,
        before: &DataTree,
        after: &DataTree,
        scope: &MappingContext,
    ) -> Result<TransactionReport, TransactionError> {
        let _guard = self.lock.lock().await;

        let changes = diff::compute(&self.registry, before, after)
            .map_err(|error| TransactionError::new(error, Default::default()))?;
        let mut report = TransactionReport {
            changes: changes
                .iter()
                .map(|change| {
                    ChangeStatus::new(
                        change.path.clone(),
                        change.operation(),
                        ChangeState::Pending,
                    )
                })
                .collect(),
        };

        // Phase 1: validate all changes.
        if let Err(error) = self.validate(&changes, after) {
            error.log();
            return Err(TransactionError::new(error, report));
        }

        // Phase 2: commit changes in order.
        let mut cache = ModificationCache::new();
        let mut ctx = WriteContext {
            mapping: scope,
            cache: &mut cache,
            before,
            after,
        };
        for (idx, change) in changes.iter().enumerate() {
            report.changes[idx].state = ChangeState::InProgress;
            match self.commit(change, &mut ctx).await {
                Ok(()) => report.changes[idx].state = ChangeState::Committed,
                Err(error) => {
                    report.changes[idx].state = ChangeState::Failed;
                    error.log();
                    return Err(TransactionError::new(error, report));
                }
            }
        }

        debug_span!("translate").in_scope(|| {
            debug!(changes = %report.changes.len(), "transaction committed");
        });

        Ok(report)
    }

    fn validate(&self, changes: &[Change], after: &DataTree) -> Result<(), Error> {
        for change in changes {
            let Some(value) = &change.after else {
                continue;
            };

            Debug::ValidationCallback(&change.path).log();
            self.writer(&change.path)?
                .validate(&change.path, value, after)
                .map_err(|error| {
                    Error::ValidationFailed(change.path.clone(), error)
                })?;
        }

        Ok(())
    }

    async fn commit(
        &self,
        change: &Change,
        ctx: &mut WriteContext<'_>,
    ) -> Result<(), Error> {
        let writer = self.writer(&change.path)?;
        let path = &change.path;
        let operation = change.operation();
        Debug::WriteCallback(operation, path).log();

        match (&change.before, &change.after) {
            (None, Some(after)) => writer
                .create(path, after, ctx)
                .await
                .map_err(|error| Error::CreateFailed(path.clone(), error)),
            (Some(before), Some(after)) => writer
                .update(path, before, after, ctx)
                .await
                .map_err(|error| Error::UpdateFailed(path.clone(), error)),
            (Some(before), None) => writer
                .delete(path, before, ctx)
                .await
                .map_err(|error| Error::DeleteFailed(path.clone(), error)),
            (None, None) => Ok(()),
        }
    }

    fn writer(&self, path: &DataPath) -> Result<&Arc<dyn Writer>, Error> {
        self.registry
            .resolve(&path.schema())
            .and_then(|(_, handler)| handler.writer.as_ref())
            .ok_or_else(|| Error::MissingHandler(path.clone()))
    }
}

// ===== impl TransactionReport =====

impl TransactionReport {
    fn with_state(
        &self,
        state: ChangeState,
    ) -> impl Iterator<Item = &ChangeStatus> {
        self.changes
            .iter()
            .filter(move |change| change.state == state)
    }

    pub fn committed(&self) -> impl Iterator<Item = &ChangeStatus> {
        self.with_state(ChangeState::Committed)
    }

    pub fn pending(&self) -> impl Iterator<Item = &ChangeStatus> {
        self.with_state(ChangeState::Pending)
    }

    pub fn failed(&self) -> Option<&ChangeStatus> {
        self.with_state(ChangeState::Failed).next()
    }
}

// ===== impl TransactionError =====

impl TransactionError {
    fn new(error: Error, report: TransactionReport) -> TransactionError {
        TransactionError { error, report }
    }
}

impl std::fmt::Display for TransactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "transaction failed after {} committed change(s): {}",
            self.report.committed().count(),
            self.error
        )
    }
}

impl std::error::Error for TransactionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
