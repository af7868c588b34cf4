use anyhow::bail;
use chrono::NaiveDate;
use std::cell::{Cell, RefCell};
use ynab_influx::Result;
use ynab_influx::model::{Account, Budget, Category, Transaction};
use ynab_influx::point::Point;
use ynab_influx::points::TRANSACTIONS;
use ynab_influx::reconcile::StoredTransaction;
use ynab_influx::sync::{BudgetSource, PointStore, SyncOptions, SyncReport, sync};

struct FakeBudgetApi {
    budget: RefCell<Budget>,
    unreachable: bool,
}

impl FakeBudgetApi {
    fn new(budget: Budget) -> Self {
        FakeBudgetApi {
            budget: RefCell::new(budget),
            unreachable: false,
        }
    }
}

impl BudgetSource for FakeBudgetApi {
    async fn fetch_budget(&self, budget_id: &str) -> Result<Budget> {
        if self.unreachable {
            bail!("budget API unreachable");
        }
        assert_eq!(budget_id, "budget-1");
        Ok(self.budget.borrow().clone())
    }
}

/// Keeps points the way InfluxDB does: a write with the same series and time overwrites.
#[derive(Default)]
struct MemoryStore {
    prepared: bool,
    points: RefCell<Vec<Point>>,
    deletes: RefCell<Vec<String>>,
    writes: Cell<usize>,
    fail_writes: bool,
}

impl MemoryStore {
    fn transaction_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .points
            .borrow()
            .iter()
            .filter(|point| point.measurement == TRANSACTIONS)
            .filter_map(|point| point.tag_value("id").map(ToOwned::to_owned))
            .collect();
        ids.sort();
        ids
    }

    fn transaction_amount(&self, id: &str) -> Vec<i64> {
        self.points
            .borrow()
            .iter()
            .filter(|point| point.measurement == TRANSACTIONS && point.tag_value("id") == Some(id))
            .filter_map(|point| match point.fields.get("amount") {
                Some(ynab_influx::point::FieldValue::Integer(amount)) => Some(*amount),
                _ => None,
            })
            .collect()
    }
}

impl PointStore for MemoryStore {
    async fn prepare(&mut self) -> Result<()> {
        self.prepared = true;
        Ok(())
    }

    async fn stored_transactions(&self) -> Result<Vec<StoredTransaction>> {
        assert!(self.prepared, "queried before prepare");
        Ok(self
            .points
            .borrow()
            .iter()
            .filter(|point| point.measurement == TRANSACTIONS)
            .map(StoredTransaction::from)
            .collect())
    }

    async fn delete_transaction(&self, id: &str) -> Result<()> {
        self.deletes.borrow_mut().push(id.to_owned());
        self.points
            .borrow_mut()
            .retain(|point| !(point.measurement == TRANSACTIONS && point.tag_value("id") == Some(id)));
        Ok(())
    }

    async fn write_points(&self, points: &[Point]) -> Result<()> {
        if self.fail_writes {
            bail!("store rejected the write");
        }
        self.writes.set(self.writes.get() + 1);
        let mut stored = self.points.borrow_mut();
        for point in points {
            stored.retain(|existing| {
                !(existing.measurement == point.measurement
                    && existing.tags == point.tags
                    && existing.time == point.time)
            });
            stored.push(point.clone());
        }
        Ok(())
    }
}

fn transaction(id: &str, day: u32, amount: i64) -> Transaction {
    Transaction {
        id: id.to_owned(),
        date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
        amount,
        account_name: "Checking".to_owned(),
        payee_name: Some("Grocer".to_owned()),
        category_name: Some("Food".to_owned()),
        category_group_name: Some("Everyday".to_owned()),
        ..Default::default()
    }
}

fn budget() -> Budget {
    Budget {
        id: "budget-1".to_owned(),
        name: "Home 🏠".to_owned(),
        accounts: vec![Account {
            id: "acc-1".to_owned(),
            name: "Checking".to_owned(),
            account_type: "checking".to_owned(),
            on_budget: true,
            balance: 100_000,
            ..Default::default()
        }],
        categories: vec![Category {
            id: "cat-1".to_owned(),
            name: "Food".to_owned(),
            category_group_name: "Everyday".to_owned(),
            ..Default::default()
        }],
        payees: Vec::new(),
        transactions: vec![
            transaction("txn-1", 1, -10_000),
            transaction("txn-2", 2, -20_000),
            transaction("txn-3", 3, -30_000),
        ],
    }
}

#[tokio::test]
async fn first_run_writes_everything() {
    let api = FakeBudgetApi::new(budget());
    let mut store = MemoryStore::default();

    let report = sync(&api, &mut store, "budget-1", &SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(
        report,
        SyncReport {
            accounts: 1,
            categories: 1,
            new: 3,
            changed: 0,
            deleted: 0,
            points_written: 5,
        }
    );
    assert_eq!(store.transaction_ids(), ["txn-1", "txn-2", "txn-3"]);
    assert_eq!(store.writes.get(), 1);
    assert!(
        store
            .points
            .borrow()
            .iter()
            .all(|point| point.tag_value("budget") == Some("Home"))
    );
}

#[tokio::test]
async fn second_run_without_remote_changes_is_a_no_op() {
    let api = FakeBudgetApi::new(budget());
    let mut store = MemoryStore::default();
    let options = SyncOptions {
        detect_changes: true,
    };

    sync(&api, &mut store, "budget-1", &options).await.unwrap();
    let transactions_after_first = store.transaction_ids();

    let report = sync(&api, &mut store, "budget-1", &options).await.unwrap();

    assert_eq!((report.new, report.changed, report.deleted), (0, 0, 0));
    assert_eq!(report.points_written, 2);
    assert_eq!(store.transaction_ids(), transactions_after_first);
    assert!(store.deletes.borrow().is_empty());
}

#[tokio::test]
async fn removed_transactions_are_deleted_and_added_ones_written() {
    let api = FakeBudgetApi::new(budget());
    let mut store = MemoryStore::default();
    sync(&api, &mut store, "budget-1", &SyncOptions::default())
        .await
        .unwrap();

    {
        let mut budget = api.budget.borrow_mut();
        budget.transactions.retain(|t| t.id != "txn-2");
        budget.transactions.push(transaction("txn-20", 20, -5_000));
    }

    let report = sync(&api, &mut store, "budget-1", &SyncOptions::default())
        .await
        .unwrap();

    assert_eq!((report.new, report.deleted), (1, 1));
    assert_eq!(*store.deletes.borrow(), ["txn-2"]);
    assert_eq!(store.transaction_ids(), ["txn-1", "txn-20", "txn-3"]);
}

#[tokio::test]
async fn edited_transaction_is_rewritten_only_with_change_detection() {
    let api = FakeBudgetApi::new(budget());
    let mut store = MemoryStore::default();
    sync(&api, &mut store, "budget-1", &SyncOptions::default())
        .await
        .unwrap();

    {
        let mut budget = api.budget.borrow_mut();
        budget.transactions[0].amount = -11_000;
        budget.transactions[0].category_name = Some("Dining".to_owned());
    }

    let report = sync(&api, &mut store, "budget-1", &SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(report.changed, 0);
    assert_eq!(store.transaction_amount("txn-1"), [-10_000]);

    let options = SyncOptions {
        detect_changes: true,
    };
    let report = sync(&api, &mut store, "budget-1", &options).await.unwrap();
    assert_eq!((report.changed, report.deleted), (1, 1));
    assert_eq!(store.transaction_amount("txn-1"), [-11_000]);
}

#[tokio::test]
async fn unreachable_budget_api_aborts_before_touching_the_store() {
    let api = FakeBudgetApi {
        unreachable: true,
        ..FakeBudgetApi::new(budget())
    };
    let mut store = MemoryStore::default();

    let error = sync(&api, &mut store, "budget-1", &SyncOptions::default())
        .await
        .unwrap_err();

    assert_eq!(error.to_string(), "budget API unreachable");
    assert_eq!(store.writes.get(), 0);
    assert!(store.points.borrow().is_empty());
}

#[tokio::test]
async fn failed_write_keeps_deletions() {
    let api = FakeBudgetApi::new(budget());
    let mut store = MemoryStore::default();
    sync(&api, &mut store, "budget-1", &SyncOptions::default())
        .await
        .unwrap();

    api.budget.borrow_mut().transactions.truncate(1);
    store.fail_writes = true;

    let result = sync(&api, &mut store, "budget-1", &SyncOptions::default()).await;

    assert!(result.is_err());
    assert_eq!(*store.deletes.borrow(), ["txn-2", "txn-3"]);
    assert_eq!(store.transaction_ids(), ["txn-1"]);
}
