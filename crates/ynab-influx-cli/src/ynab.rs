//! Client for the YNAB REST API, reading a whole budget in one request.

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};
use ynab_influx::model::{Account, Budget, Category, Payee, Transaction};
use ynab_influx::sync::BudgetSource;

pub struct YnabClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl YnabClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        YnabClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        }
    }
}

impl BudgetSource for YnabClient {
    async fn fetch_budget(&self, budget_id: &str) -> Result<Budget> {
        let url = format!("{}/budgets/{}", self.base_url, budget_id);
        debug!("GET {url}");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .with_context(|| format!("Failed to reach the budget API at {}", self.base_url))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read the budget API response")?;

        if !status.is_success() {
            bail!(
                "budget API request failed with {status}: {}",
                error_detail(&body)
            );
        }

        let response: BudgetResponse =
            serde_json::from_str(&body).context("Failed to decode budget from the budget API")?;
        response.data.budget.resolve()
    }
}

fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse { error }) => match error.detail {
            Some(detail) => format!("{} ({detail})", error.name),
            None => error.name,
        },
        Err(_) => body.trim().to_owned(),
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    name: String,
    detail: Option<String>,
}

#[derive(Deserialize)]
struct BudgetResponse {
    data: BudgetData,
}

#[derive(Deserialize)]
struct BudgetData {
    budget: BudgetDetail,
}

#[derive(Deserialize)]
struct BudgetDetail {
    id: String,
    name: String,
    #[serde(default)]
    accounts: Vec<AccountRecord>,
    #[serde(default)]
    payees: Vec<PayeeRecord>,
    #[serde(default)]
    category_groups: Vec<CategoryGroupRecord>,
    #[serde(default)]
    categories: Vec<CategoryRecord>,
    #[serde(default)]
    transactions: Vec<TransactionRecord>,
}

#[derive(Deserialize)]
struct AccountRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    account_type: String,
    on_budget: bool,
    closed: bool,
    balance: i64,
    cleared_balance: i64,
    uncleared_balance: i64,
    #[serde(default)]
    deleted: bool,
}

#[derive(Deserialize)]
struct PayeeRecord {
    id: String,
    name: String,
    #[serde(default)]
    deleted: bool,
}

#[derive(Deserialize)]
struct CategoryGroupRecord {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct CategoryRecord {
    id: String,
    category_group_id: String,
    category_group_name: Option<String>,
    name: String,
    #[serde(default)]
    hidden: bool,
    budgeted: i64,
    activity: i64,
    balance: i64,
    goal_type: Option<String>,
    goal_target: Option<i64>,
    goal_target_month: Option<NaiveDate>,
    goal_percentage_complete: Option<i64>,
    #[serde(default)]
    deleted: bool,
}

#[derive(Deserialize)]
struct TransactionRecord {
    id: String,
    date: NaiveDate,
    amount: i64,
    memo: Option<String>,
    flag_color: Option<String>,
    account_id: String,
    payee_id: Option<String>,
    category_id: Option<String>,
    #[serde(default)]
    deleted: bool,
}

impl BudgetDetail {
    /// Replace id references with the names points are tagged with.
    fn resolve(self) -> Result<Budget> {
        let account_names: HashMap<&str, &str> = self
            .accounts
            .iter()
            .map(|account| (account.id.as_str(), account.name.as_str()))
            .collect();
        let payee_names: HashMap<&str, &str> = self
            .payees
            .iter()
            .map(|payee| (payee.id.as_str(), payee.name.as_str()))
            .collect();
        let group_names: HashMap<&str, &str> = self
            .category_groups
            .iter()
            .map(|group| (group.id.as_str(), group.name.as_str()))
            .collect();

        let mut categories = Vec::with_capacity(self.categories.len());
        let mut category_names: HashMap<&str, (&str, String)> = HashMap::new();
        for record in &self.categories {
            let group_name = match &record.category_group_name {
                Some(name) => name.clone(),
                None => group_names
                    .get(record.category_group_id.as_str())
                    .map(|name| name.to_string())
                    .ok_or_else(|| {
                        anyhow!(
                            "Category {} references unknown category group {}",
                            record.id,
                            record.category_group_id
                        )
                    })?,
            };
            category_names.insert(
                record.id.as_str(),
                (record.name.as_str(), group_name.clone()),
            );
            categories.push(Category {
                id: record.id.clone(),
                name: record.name.clone(),
                category_group_name: group_name,
                hidden: record.hidden,
                deleted: record.deleted,
                budgeted: record.budgeted,
                activity: record.activity,
                balance: record.balance,
                goal_type: record.goal_type.clone(),
                goal_target: record.goal_target,
                goal_target_month: record.goal_target_month,
                goal_percentage_complete: record.goal_percentage_complete,
            });
        }

        let mut transactions = Vec::with_capacity(self.transactions.len());
        for record in &self.transactions {
            let account_name = account_names
                .get(record.account_id.as_str())
                .ok_or_else(|| {
                    anyhow!(
                        "Transaction {} references unknown account {}",
                        record.id,
                        record.account_id
                    )
                })?;
            let payee_name = record.payee_id.as_deref().and_then(|id| {
                let name = payee_names.get(id);
                if name.is_none() {
                    warn!("Transaction {} references unknown payee {id}", record.id);
                }
                name.map(|name| name.to_string())
            });
            let category = record.category_id.as_deref().and_then(|id| {
                let category = category_names.get(id);
                if category.is_none() {
                    warn!("Transaction {} references unknown category {id}", record.id);
                }
                category
            });

            transactions.push(Transaction {
                id: record.id.clone(),
                date: record.date,
                amount: record.amount,
                memo: record.memo.clone(),
                flag_color: record.flag_color.clone(),
                account_name: account_name.to_string(),
                payee_name,
                category_name: category.map(|(name, _)| name.to_string()),
                category_group_name: category.map(|(_, group)| group.clone()),
                deleted: record.deleted,
            });
        }

        let accounts = self
            .accounts
            .iter()
            .map(|record| Account {
                id: record.id.clone(),
                name: record.name.clone(),
                account_type: record.account_type.clone(),
                on_budget: record.on_budget,
                closed: record.closed,
                deleted: record.deleted,
                balance: record.balance,
                cleared_balance: record.cleared_balance,
                uncleared_balance: record.uncleared_balance,
            })
            .collect();
        let payees = self
            .payees
            .iter()
            .map(|record| Payee {
                id: record.id.clone(),
                name: record.name.clone(),
                deleted: record.deleted,
            })
            .collect();

        Ok(Budget {
            id: self.id.clone(),
            name: self.name.clone(),
            accounts,
            categories,
            payees,
            transactions,
        })
    }
}
