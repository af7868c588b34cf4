//! Mapping budget entities onto the `accounts`, `categories` and `transactions` measurements.

use crate::model::{Account, Category, Transaction};
use crate::point::Point;
use crate::remove_emojis;
use chrono::{DateTime, NaiveTime, TimeDelta, TimeZone, Timelike, Utc};

pub const ACCOUNTS: &str = "accounts";
pub const CATEGORIES: &str = "categories";
pub const TRANSACTIONS: &str = "transactions";

/// Top of the current hour in the caller's time zone. Account and category snapshots are
/// stamped with it so repeated runs within an hour overwrite the same points.
///
/// The offset into the hour is subtracted from the instant instead of rebuilding the local
/// time, which has no unique answer in the repeated hour after a daylight saving change.
pub fn execution_time<Tz: TimeZone>(now: DateTime<Tz>) -> DateTime<Utc> {
    let into_hour = TimeDelta::minutes(now.minute().into())
        + TimeDelta::seconds(now.second().into())
        + TimeDelta::nanoseconds(now.nanosecond().into());
    (now - into_hour).with_timezone(&Utc)
}

// Stored series use the capitalized form.
fn bool_tag(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

pub fn account_points<'a>(
    budget_name: &str,
    accounts: impl IntoIterator<Item = &'a Account>,
    time: DateTime<Utc>,
) -> Vec<Point> {
    let budget = remove_emojis(Some(budget_name));
    accounts
        .into_iter()
        .map(|account| {
            Point::new(ACCOUNTS, time)
                .tag_opt("account", remove_emojis(Some(account.name.as_str())))
                .tag("id", &account.id)
                .tag_opt("budget", budget.clone())
                .tag("type", &account.account_type)
                .tag("closed", bool_tag(account.closed))
                .tag("deleted", bool_tag(account.deleted))
                .tag("on_budget", bool_tag(account.on_budget))
                .field("balance", account.balance)
                // Swapped on purpose: existing series were written this way.
                .field("unclearedBalance", account.cleared_balance)
                .field("clearedBalance", account.uncleared_balance)
        })
        .collect()
}

pub fn category_points<'a>(
    budget_name: &str,
    categories: impl IntoIterator<Item = &'a Category>,
    time: DateTime<Utc>,
) -> Vec<Point> {
    let budget = remove_emojis(Some(budget_name));
    categories
        .into_iter()
        .map(|category| {
            Point::new(CATEGORIES, time)
                .tag_opt("budget", budget.clone())
                .tag_opt("category", remove_emojis(Some(category.name.as_str())))
                .tag_opt(
                    "categoryGroup",
                    remove_emojis(Some(category.category_group_name.as_str())),
                )
                .tag_opt("goalType", category.goal_type.as_deref())
                .tag_opt(
                    "goalTargetMonth",
                    category.goal_target_month.map(|month| month.to_string()),
                )
                .tag("id", &category.id)
                .tag("deleted", bool_tag(category.deleted))
                .tag("hidden", bool_tag(category.hidden))
                .field("budgeted", category.budgeted)
                .field("activity", category.activity)
                .field("balance", category.balance)
                .field_opt("goalTarget", category.goal_target)
                .field_opt("goalPercentageComplete", category.goal_percentage_complete)
        })
        .collect()
}

/// Transactions are stamped with their own date, at midnight UTC.
pub fn transaction_point(budget_name: &str, transaction: &Transaction) -> Point {
    let time = transaction.date.and_time(NaiveTime::MIN).and_utc();
    Point::new(TRANSACTIONS, time)
        .tag_opt("account", remove_emojis(Some(transaction.account_name.as_str())))
        .tag_opt("budget", remove_emojis(Some(budget_name)))
        .tag_opt("category", remove_emojis(transaction.category_name.as_deref()))
        .tag_opt(
            "categoryGroup",
            remove_emojis(transaction.category_group_name.as_deref()),
        )
        .tag("id", &transaction.id)
        .tag_opt("payee", transaction.payee_name.as_deref())
        .tag_opt("flagColor", transaction.flag_color.as_deref())
        .field("amount", transaction.amount)
        .field_opt("memo", transaction.memo.as_deref())
}
