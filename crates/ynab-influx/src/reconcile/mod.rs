//! Reconciling transactions already stored as points against a full fetch from the budget API.

mod stored;

pub use stored::StoredTransaction;

use crate::model::Transaction;
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
pub enum ReconcileItem<'a> {
    /// Present remotely but never written: insert.
    OnlyInRemote(&'a Transaction),
    /// Stored but gone remotely: delete by id.
    OnlyInStore(&'a str),
    /// Present on both sides under the same id, possibly stored more than once.
    InBoth(&'a Transaction, Vec<&'a StoredTransaction>),
}

/// Partition remote transactions and stored records by exact id equality.
///
/// Remote items keep their fetch order, stale ids follow in the order they were first stored.
pub fn reconcile<'a>(
    remote: impl IntoIterator<Item = &'a Transaction>,
    stored: &'a [StoredTransaction],
) -> Vec<ReconcileItem<'a>> {
    let mut stored_by_id: HashMap<&str, Vec<&StoredTransaction>> = HashMap::new();
    for record in stored {
        stored_by_id.entry(record.id.as_str()).or_default().push(record);
    }

    let mut results = Vec::new();
    let mut remote_ids = HashSet::new();
    for transaction in remote {
        if !remote_ids.insert(transaction.id.as_str()) {
            tracing::warn!("Transaction {} listed twice by the budget API", transaction.id);
            continue;
        }
        match stored_by_id.get(transaction.id.as_str()) {
            Some(records) => results.push(ReconcileItem::InBoth(transaction, records.clone())),
            None => results.push(ReconcileItem::OnlyInRemote(transaction)),
        }
    }

    let mut stale_seen = HashSet::new();
    for record in stored {
        let id = record.id.as_str();
        if !remote_ids.contains(id) && stale_seen.insert(id) {
            results.push(ReconcileItem::OnlyInStore(id));
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(ids: &[&str]) -> Vec<Transaction> {
        ids.iter()
            .map(|id| Transaction {
                id: id.to_string(),
                account_name: "Checking".to_owned(),
                ..Default::default()
            })
            .collect()
    }

    fn stored(ids: &[&str]) -> Vec<StoredTransaction> {
        ids.iter().map(|id| StoredTransaction::new(*id)).collect()
    }

    fn diff(remote_ids: &[&str], stored_ids: &[&str]) -> (Vec<String>, Vec<String>) {
        let remote = remote(remote_ids);
        let stored = stored(stored_ids);
        let mut new = Vec::new();
        let mut stale = Vec::new();
        for item in reconcile(&remote, &stored) {
            match item {
                ReconcileItem::OnlyInRemote(transaction) => new.push(transaction.id.clone()),
                ReconcileItem::OnlyInStore(id) => stale.push(id.to_owned()),
                ReconcileItem::InBoth(..) => {}
            }
        }
        (new, stale)
    }

    #[test]
    fn reconcile_all_match() {
        assert_eq!(
            diff(&["a", "b", "c"], &["c", "b", "a"]),
            (vec![], vec![])
        );
    }

    #[test]
    fn reconcile_empty_both() {
        assert_eq!(diff(&[], &[]), (vec![], vec![]));
    }

    #[test]
    fn reconcile_nothing_stored() {
        assert_eq!(
            diff(&["a", "b"], &[]),
            (vec!["a".to_owned(), "b".to_owned()], vec![])
        );
    }

    #[test]
    fn reconcile_nothing_remote() {
        assert_eq!(
            diff(&[], &["a", "b"]),
            (vec![], vec!["a".to_owned(), "b".to_owned()])
        );
    }

    #[test]
    fn reconcile_mixed_scenario() {
        let (new, stale) = diff(&["a", "b", "d"], &["b", "c", "e"]);
        assert_eq!(new, ["a", "d"]);
        assert_eq!(stale, ["c", "e"]);
        assert!(new.iter().all(|id| !stale.contains(id)));
    }

    #[test]
    fn reconcile_uses_exact_ids() {
        let (new, stale) = diff(&["txn-100"], &["txn-1"]);
        assert_eq!(new, ["txn-100"]);
        assert_eq!(stale, ["txn-1"]);

        let (new, stale) = diff(&["txn-1"], &["txn-100"]);
        assert_eq!(new, ["txn-1"]);
        assert_eq!(stale, ["txn-100"]);
    }

    #[test]
    fn reconcile_duplicate_stored_ids() {
        let remote = remote(&["a"]);
        let stored = stored(&["a", "a", "b", "b"]);
        let items = reconcile(&remote, &stored);

        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], ReconcileItem::InBoth(t, records) if t.id == "a" && records.len() == 2));
        assert!(matches!(items[1], ReconcileItem::OnlyInStore("b")));
    }

    #[test]
    fn reconcile_duplicate_remote_ids() {
        let (new, stale) = diff(&["a", "a"], &[]);
        assert_eq!(new, ["a"]);
        assert!(stale.is_empty());
    }
}
