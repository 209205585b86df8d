//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use derive_new::new;
use hive_translate::engine::TransactionReport;
use hive_translate::naming::MappingContext;
use hive_translate::{Registry, SyncEngine};
use hive_utils::Database;
use hive_utils::tree::{DataPath, DataTree};
use hive_v3po::V3po;
use hive_v3po::dataplane::Dataplane;
use pickledb::PickleDb;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, instrument, warn};

use crate::Signal;
use crate::config::Config;
use crate::northbound::{Error, Result, db};

pub struct Northbound {
    // Configuration the dataplane is known to be in.
    running_config: DataTree,
    // Non-volatile storage.
    db: Database,
    // Name mappings shared by all handlers.
    scope: MappingContext,
    // Translation engine.
    engine: SyncEngine,
    // Simulated dataplane.
    dataplane: Arc<Dataplane>,
    // Configuration applied at startup and on reload.
    startup_config: Option<String>,
}

#[derive(Debug, new)]
#[derive(Deserialize, Serialize)]
pub struct Transaction {
    // Unique identifier for the transaction.
    #[new(default)]
    pub id: u32,

    // Date and time for when the transaction occurred.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub date: DateTime<Utc>,

    // Optional comment for the transaction.
    pub comment: String,

    // Configuration that was committed.
    #[serde(with = "hive_utils::serde::data_tree")]
    pub configuration: DataTree,
}

// ===== impl Northbound =====

impl Northbound {
    pub(crate) fn init(config: &Config, db: PickleDb) -> Result<Northbound> {
        let db = Arc::new(Mutex::new(db));

        // Restore the dataplane, or bring up a fresh one.
        let (dataplane, running_config) = {
            let db = db.lock().unwrap();
            let dataplane = match db::dataplane_get(&db) {
                Some(state) => Dataplane::from_state(state),
                None => Dataplane::new(config.device.interfaces.iter()),
            };
            let transactions = db::transaction_get_all(&db).len();
            debug!(%transactions, "loaded transaction log");
            let running_config = db::transaction_last(&db)
                .map(|transaction| transaction.configuration)
                .unwrap_or_default();
            (Arc::new(dataplane), running_config)
        };

        // Register the v3po handlers.
        let v3po = V3po::new(
            dataplane.clone(),
            Duration::from_secs(config.device.timeout),
        );
        let registry =
            hive_v3po::northbound::registry(&v3po).map_err(Error::Registry)?;
        debug!(?registry, "handler registry");

        Ok(Northbound {
            running_config,
            scope: MappingContext::new(db.clone()),
            db,
            engine: SyncEngine::new(Arc::new(registry)),
            dataplane,
            startup_config: config.startup_config.clone(),
        })
    }

    // Main event loop.
    #[instrument(skip_all, "northbound")]
    pub(crate) async fn run(
        mut self: Northbound,
        mut signal_rx: Receiver<Signal>,
    ) {
        self.load_startup_config().await;

        loop {
            match signal_rx.recv().await {
                Some(Signal::Reload) => {
                    info!("reloading startup configuration");
                    self.load_startup_config().await;
                }
                Some(Signal::Exit) | None => break,
            }
        }
    }

    // Replaces the running configuration with the startup one.
    async fn load_startup_config(&mut self) {
        let Some(path) = self.startup_config.clone() else {
            return;
        };

        let result = match read_config(&path) {
            Ok(candidate) => {
                self.commit(candidate, "startup configuration".to_owned())
                    .await
            }
            Err(error) => Err(error),
        };
        if let Err(error) = result {
            warn!(%path, %error, "failed to apply startup configuration");
        }

        match self.get_state().await {
            Ok(state) => {
                let state = serde_json::to_string(&state).unwrap_or_default();
                debug!(%state, "dataplane state");
            }
            Err(error) => warn!(%error, "failed to read dataplane state"),
        }
    }

    // Moves the dataplane to the candidate configuration and records the
    // outcome in the transaction log.
    //
    // Returns the transaction ID, or zero if nothing changed.
    pub(crate) async fn commit(
        &mut self,
        candidate: DataTree,
        comment: String,
    ) -> Result<u32> {
        // Check if the configuration has changed.
        if candidate == self.running_config {
            return Ok(0);
        }

        match self
            .engine
            .apply(&self.running_config, &candidate, &self.scope)
            .await
        {
            Ok(report) => {
                debug!(changes = %report.changes.len(), "configuration transaction");

                // Update the running configuration.
                self.running_config = candidate.clone();

                // Record transaction.
                let mut transaction =
                    Transaction::new(Utc::now(), comment, candidate);
                self.record(&mut transaction);
                info!(id = %transaction.id, "configuration committed");

                Ok(transaction.id)
            }
            Err(error) => {
                if error.report.committed().next().is_some() {
                    // Keep track of what did reach the dataplane.
                    fold_committed(
                        self.engine.registry(),
                        &mut self.running_config,
                        &candidate,
                        &error.report,
                    );
                    let mut transaction = Transaction::new(
                        Utc::now(),
                        format!("{comment} (partially applied)"),
                        self.running_config.clone(),
                    );
                    self.record(&mut transaction);
                    warn!(id = %transaction.id, "configuration partially committed");
                }

                Err(Error::Transaction(error))
            }
        }
    }

    // Reads the current state of the dataplane.
    pub(crate) async fn get_state(&self) -> Result<DataTree> {
        self.engine
            .registry()
            .read_all(&self.scope)
            .await
            .map_err(Error::Get)
    }

    fn record(&self, transaction: &mut Transaction) {
        let mut db = self.db.lock().unwrap();
        db::transaction_record(&mut db, transaction);
        db::dataplane_record(&mut db, &self.dataplane.state());
    }
}

// ===== helper functions =====

fn read_config(path: &str) -> Result<DataTree> {
    let data = std::fs::read_to_string(path).map_err(Error::ConfigLoad)?;
    let config: DataTree =
        serde_json::from_str(&data).map_err(Error::ConfigParse)?;
    config.validate().map_err(Error::ConfigInvalid)?;
    Ok(config)
}

// Copies the entries touched by committed changes from the candidate into
// the running configuration.
fn fold_committed(
    registry: &Registry,
    running: &mut DataTree,
    candidate: &DataTree,
    report: &TransactionReport,
) {
    for status in report.committed() {
        let root = status.path.schema();
        let owned = |path: &DataPath| {
            registry
                .resolve(&path.schema())
                .is_some_and(|(handler_path, _)| *handler_path == root)
        };

        let stale = running
            .subtree(&status.path)
            .map(|(path, _)| path)
            .filter(|path| owned(path))
            .cloned()
            .collect::<Vec<_>>();
        for path in stale {
            running.remove(&path);
        }
        running.extend(
            candidate
                .subtree(&status.path)
                .filter(|(path, _)| owned(path))
                .map(|(path, value)| (path.clone(), value.clone())),
        );
    }
}

// ===== unit tests =====
