use anstyle::{AnsiColor, Color, Style};
use std::fmt::Write as _;
use ynab_influx::point::{FieldValue, Point};
use ynab_influx::points::TRANSACTIONS;
use ynab_influx::sync::SyncPlan;

pub fn show_plan(plan: &SyncPlan) {
    print!("{}", render_plan(plan, true));
}

fn render_plan(plan: &SyncPlan, color: bool) -> String {
    let paint = |style: Style| if color { style } else { Style::new() };
    let new_style = paint(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))));
    let changed_style = paint(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))));
    let stale_style = paint(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))));
    let bold = paint(Style::new().bold());

    let mut out = String::new();
    let sections = [
        ("New", new_style, &plan.new),
        ("Changed (rewritten)", changed_style, &plan.changed),
    ];
    for (title, style, ids) in sections {
        if ids.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{style}━━━ {title} ━━━{style:#}");
        for id in ids {
            match transaction_point(plan, id) {
                Some(point) => {
                    let _ = writeln!(out, "{}", describe(point));
                }
                None => {
                    let _ = writeln!(out, "{id}");
                }
            }
        }
        out.push('\n');
    }

    if !plan.stale.is_empty() {
        let _ = writeln!(out, "{stale_style}━━━ Stale (deleted) ━━━{stale_style:#}");
        for id in &plan.stale {
            let _ = writeln!(out, "{id}");
        }
        out.push('\n');
    }

    let _ = writeln!(out, "{bold}━━━ Summary ━━━{bold:#}");
    let _ = writeln!(
        out,
        "  budget '{}': {} account point(s), {} category point(s)",
        plan.budget_name, plan.accounts, plan.categories
    );
    if plan.new.is_empty() && plan.changed.is_empty() && plan.stale.is_empty() {
        let _ = writeln!(out, "  ✓ Stored transactions are up to date");
    } else {
        let _ = writeln!(
            out,
            "  {new_style}{}{new_style:#} new, {changed_style}{}{changed_style:#} changed, {stale_style}{}{stale_style:#} stale transaction(s)",
            plan.new.len(),
            plan.changed.len(),
            plan.stale.len()
        );
    }
    out
}

fn transaction_point<'a>(plan: &'a SyncPlan, id: &str) -> Option<&'a Point> {
    plan.points
        .iter()
        .find(|point| point.measurement == TRANSACTIONS && point.tag_value("id") == Some(id))
}

fn describe(point: &Point) -> String {
    let amount = match point.fields.get("amount") {
        Some(FieldValue::Integer(milliunits)) => format!("{:.2}", *milliunits as f64 / 1000.0),
        _ => String::new(),
    };
    let text = |key| point.tag_value(key).unwrap_or("-");
    format!(
        "{}  {:>10}  {}  {}  {}  ({})",
        point.time.format("%Y-%m-%d"),
        amount,
        text("account"),
        text("payee"),
        text("category"),
        text("id"),
    )
}
