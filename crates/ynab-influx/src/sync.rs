//! One sync run: read what is stored, fetch the budget, reconcile, then delete and write.

use crate::Result;
use crate::model::Budget;
use crate::point::Point;
use crate::points::{account_points, category_points, execution_time, transaction_point};
use crate::reconcile::{ReconcileItem, StoredTransaction, reconcile};
use chrono::{DateTime, Local, Utc};
use std::future::Future;
use tracing::{debug, info};

/// Read access to the budgeting API.
pub trait BudgetSource {
    fn fetch_budget(&self, budget_id: &str) -> impl Future<Output = Result<Budget>>;
}

/// The time-series store the budget is mirrored into.
pub trait PointStore {
    /// Create the target database if it is missing and direct every later call at it.
    fn prepare(&mut self) -> impl Future<Output = Result<()>>;
    fn stored_transactions(&self) -> impl Future<Output = Result<Vec<StoredTransaction>>>;
    fn delete_transaction(&self, id: &str) -> impl Future<Output = Result<()>>;
    fn write_points(&self, points: &[Point]) -> impl Future<Output = Result<()>>;
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Rewrite transactions whose stored point no longer matches the budget.
    pub detect_changes: bool,
}

/// Everything a run is going to delete and write.
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub budget_name: String,
    pub accounts: usize,
    pub categories: usize,
    pub new: Vec<String>,
    pub changed: Vec<String>,
    pub stale: Vec<String>,
    pub points: Vec<Point>,
}

impl SyncPlan {
    pub fn build(
        budget: &Budget,
        stored: &[StoredTransaction],
        time: DateTime<Utc>,
        options: &SyncOptions,
    ) -> Self {
        let mut points = account_points(&budget.name, budget.active_accounts(), time);
        let accounts = points.len();
        points.extend(category_points(
            &budget.name,
            budget.active_categories(),
            time,
        ));
        let categories = points.len() - accounts;

        let mut new = Vec::new();
        let mut changed = Vec::new();
        let mut stale = Vec::new();
        for item in reconcile(budget.active_transactions(), stored) {
            match item {
                ReconcileItem::OnlyInRemote(transaction) => {
                    new.push(transaction.id.clone());
                    points.push(transaction_point(&budget.name, transaction));
                }
                ReconcileItem::OnlyInStore(id) => stale.push(id.to_owned()),
                ReconcileItem::InBoth(transaction, records) if options.detect_changes => {
                    let point = transaction_point(&budget.name, transaction);
                    let unchanged =
                        matches!(records.as_slice(), [record] if record.matches(&point));
                    if !unchanged {
                        changed.push(transaction.id.clone());
                        points.push(point);
                    }
                }
                ReconcileItem::InBoth(..) => {}
            }
        }

        SyncPlan {
            budget_name: budget.name.clone(),
            accounts,
            categories,
            new,
            changed,
            stale,
            points,
        }
    }

    /// Ids removed before writing: stale ones, and changed ones which are written again.
    pub fn deletions(&self) -> impl Iterator<Item = &str> {
        self.stale.iter().chain(&self.changed).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub accounts: usize,
    pub categories: usize,
    pub new: usize,
    pub changed: usize,
    pub deleted: usize,
    pub points_written: usize,
}

/// Steps up to reconciliation, without touching stored data beyond creating the database.
pub async fn plan<S, P>(
    source: &S,
    store: &mut P,
    budget_id: &str,
    options: &SyncOptions,
) -> Result<SyncPlan>
where
    S: BudgetSource,
    P: PointStore,
{
    store.prepare().await?;

    let stored = store.stored_transactions().await?;
    info!("Found {} stored transaction points", stored.len());

    let budget = source.fetch_budget(budget_id).await?;
    info!(
        "Fetched budget '{}': {} accounts, {} categories, {} payees, {} transactions",
        budget.name,
        budget.accounts.len(),
        budget.categories.len(),
        budget.payees.len(),
        budget.transactions.len()
    );

    Ok(SyncPlan::build(
        &budget,
        &stored,
        execution_time(Local::now()),
        options,
    ))
}

/// Delete stale and changed transactions, then write every point in one batch.
///
/// There is no rollback: a failed write leaves the deletions in place until the next run.
pub async fn apply<P: PointStore>(store: &P, plan: &SyncPlan) -> Result<SyncReport> {
    let mut deleted = 0;
    for id in plan.deletions() {
        debug!("Deleting transaction {id}");
        store.delete_transaction(id).await?;
        deleted += 1;
    }

    if !plan.points.is_empty() {
        store.write_points(&plan.points).await?;
    }

    Ok(SyncReport {
        accounts: plan.accounts,
        categories: plan.categories,
        new: plan.new.len(),
        changed: plan.changed.len(),
        deleted,
        points_written: plan.points.len(),
    })
}

pub async fn sync<S, P>(
    source: &S,
    store: &mut P,
    budget_id: &str,
    options: &SyncOptions,
) -> Result<SyncReport>
where
    S: BudgetSource,
    P: PointStore,
{
    let plan = plan(source, store, budget_id, options).await?;
    info!(
        "{} new, {} changed, {} stale transactions",
        plan.new.len(),
        plan.changed.len(),
        plan.stale.len()
    );
    apply(store, &plan).await
}
