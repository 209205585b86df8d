//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::Path;

use hive_v3po::dataplane::DataplaneState;
use pickledb::{PickleDb, PickleDbDumpPolicy, SerializationMethod};
use tracing::error;

use crate::northbound::core::Transaction;

const DATAPLANE_KEY: &str = "dataplane";

// Loads the non-volatile storage from a file, or initializes a new one if it
// doesn't exist.
pub(crate) fn init<P: AsRef<Path>>(
    path: P,
) -> Result<PickleDb, pickledb::error::Error> {
    let dump_policy = PickleDbDumpPolicy::AutoDump;
    let serialization_method = SerializationMethod::Bin;
    match path.as_ref().exists() {
        true => PickleDb::load(path, dump_policy, serialization_method),
        false => Ok(PickleDb::new(path, dump_policy, serialization_method)),
    }
}

// Records a transaction in the transaction log.
pub(crate) fn transaction_record(
    db: &mut PickleDb,
    transaction: &mut Transaction,
) {
    transaction.id = transaction_next_key(db);
    let key = format!("transaction{}", transaction.id);
    if let Err(error) = db.set(&key, transaction) {
        error!(%error, "failed to record transaction in the transaction log");
    }
}

// Retrieves a transaction from the transaction log, identified by its ID.
pub(crate) fn transaction_get(
    db: &PickleDb,
    transaction_id: u32,
) -> Option<Transaction> {
    let key = format!("transaction{}", transaction_id);
    db.get(&key)
}

// Retrieves the most recent transaction.
pub(crate) fn transaction_last(db: &PickleDb) -> Option<Transaction> {
    let last_id = db.get::<u32>("next_id")?;
    transaction_get(db, last_id)
}

// Retrieves all transactions from the transaction log, oldest first.
pub(crate) fn transaction_get_all(db: &PickleDb) -> Vec<Transaction> {
    let mut transactions = db
        .iter()
        .filter(|entry| entry.get_key().starts_with("transaction"))
        .filter_map(|entry| entry.get_value::<Transaction>())
        .collect::<Vec<_>>();
    transactions.sort_by_key(|transaction| transaction.id);
    transactions
}

// Saves the forwarding state of the simulated dataplane.
pub(crate) fn dataplane_record(db: &mut PickleDb, state: &DataplaneState) {
    if let Err(error) = db.set(DATAPLANE_KEY, state) {
        error!(%error, "failed to record dataplane state");
    }
}

// Retrieves the saved forwarding state of the simulated dataplane.
pub(crate) fn dataplane_get(db: &PickleDb) -> Option<DataplaneState> {
    db.get(DATAPLANE_KEY)
}

// Retrieves the next available transaction ID and updates it.
fn transaction_next_key(db: &mut PickleDb) -> u32 {
    let mut next_id = db.get("next_id").unwrap_or(0);
    next_id += 1;
    if let Err(error) = db.set("next_id", &next_id) {
        error!(%error, "failed to update the next transaction ID in the transaction log");
    }
    next_id
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use hive_utils::tree::{DataPath, DataTree};
    use hive_v3po::dataplane::Dataplane;
    use serde_json::json;

    use super::*;

    fn db() -> PickleDb {
        PickleDb::new(
            "hived-test.db",
            PickleDbDumpPolicy::NeverDump,
            SerializationMethod::Bin,
        )
    }

    fn configuration(enabled: bool) -> DataTree {
        [(
            DataPath::from("/interfaces/interface[loop-a]"),
            json!({"type": "loopback", "enabled": enabled}),
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn transaction_log() {
        let mut db = db();
        assert!(transaction_last(&db).is_none());

        let mut first =
            Transaction::new(Utc::now(), "first".to_owned(), configuration(false));
        transaction_record(&mut db, &mut first);
        let mut second =
            Transaction::new(Utc::now(), "second".to_owned(), configuration(true));
        transaction_record(&mut db, &mut second);
        assert_eq!((first.id, second.id), (1, 2));

        let last = transaction_last(&db).unwrap();
        assert_eq!(last.comment, "second");
        assert_eq!(last.configuration, configuration(true));
        assert_eq!(transaction_get(&db, 1).unwrap().comment, "first");
        assert!(transaction_get(&db, 3).is_none());

        let ids = transaction_get_all(&db)
            .into_iter()
            .map(|transaction| transaction.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn dataplane_state() {
        let mut db = db();
        assert!(dataplane_get(&db).is_none());

        let state = Dataplane::new(["eth0"]).state();
        dataplane_record(&mut db, &state);
        assert_eq!(dataplane_get(&db), Some(state));
    }
}
