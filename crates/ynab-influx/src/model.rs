//! Budget snapshot as fetched from the budgeting API, with every reference already resolved to a name.

use chrono::NaiveDate;

/// Currency amount in thousandths of the budget's currency unit.
pub type Milliunits = i64;

#[derive(Debug, Clone, Default)]
pub struct Budget {
    pub id: String,
    pub name: String,
    pub accounts: Vec<Account>,
    pub categories: Vec<Category>,
    pub payees: Vec<Payee>,
    pub transactions: Vec<Transaction>,
}

impl Budget {
    pub fn active_accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter().filter(|account| !account.deleted)
    }

    pub fn active_categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().filter(|category| !category.deleted)
    }

    pub fn active_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions
            .iter()
            .filter(|transaction| !transaction.deleted)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub account_type: String,
    pub on_budget: bool,
    pub closed: bool,
    pub deleted: bool,
    pub balance: Milliunits,
    pub cleared_balance: Milliunits,
    pub uncleared_balance: Milliunits,
}

#[derive(Debug, Clone, Default)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub category_group_name: String,
    pub hidden: bool,
    pub deleted: bool,
    pub budgeted: Milliunits,
    pub activity: Milliunits,
    pub balance: Milliunits,
    pub goal_type: Option<String>,
    pub goal_target: Option<Milliunits>,
    pub goal_target_month: Option<NaiveDate>,
    pub goal_percentage_complete: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct Payee {
    pub id: String,
    pub name: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: Milliunits,
    pub memo: Option<String>,
    pub flag_color: Option<String>,
    pub account_name: String,
    pub payee_name: Option<String>,
    pub category_name: Option<String>,
    pub category_group_name: Option<String>,
    pub deleted: bool,
}
