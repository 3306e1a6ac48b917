//! Answer text for each intent.
//!
//! Numbers are rendered here and nowhere else: unit totals are truncated to
//! whole units with thousands separators, means use two decimals and
//! percentages one.

use jarvis_core::simulation::{ExpectedSales, KeyDriver, PromoStockInteraction, SimulationResult};
use jarvis_db::{CategoryTotal, PromoEffect, RegionTotal};

pub const FALLBACK_ANSWER: &str = "I understood the question, but I cannot answer it yet.";

/// Whole units with `,` grouping. Fractions are truncated toward zero.
pub fn format_units(value: f64) -> String {
    let whole = value.trunc() as i64;
    let digits = whole.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if whole < 0 {
        grouped.push('-');
    }
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

pub fn sales_summary(year: i32, total_units: f64) -> String {
    format!("Total units sold in {year}: {} units.", format_units(total_units))
}

pub fn top_category(top: &CategoryTotal) -> String {
    format!(
        "The best performing category is {}, with {} units sold.",
        top.category,
        format_units(top.total_units)
    )
}

pub fn region_performance(top: &RegionTotal) -> String {
    format!(
        "The top performing region is {}, contributing {} units.",
        top.region,
        format_units(top.total_units)
    )
}

pub fn promo_effect(effect: &PromoEffect) -> String {
    match effect.uplift_pct() {
        Some(uplift) => format!(
            "Promotions {} average sales by ~{:.1}% compared to non-promotional periods.",
            if uplift < 0.0 { "decrease" } else { "increase" },
            uplift.abs()
        ),
        None => "The promotional uplift is undefined because non-promotional periods \
                 averaged zero sales."
            .to_string(),
    }
}

pub fn expected_sales(expected: &ExpectedSales) -> String {
    format!(
        "Expected daily sales are approximately {:.2} units per SKU under current conditions.",
        expected.expected_daily_sales
    )
}

pub fn stock_drop(drop_pct: f64, result: &SimulationResult) -> String {
    let drop = format_fraction_as_pct(drop_pct);
    match result.pct_change {
        Some(change) => format!(
            "A {drop}% reduction in stock is expected to {} average daily sales by {:.1}% \
             (from {:.2} to {:.2} units).",
            change_verb(change),
            change.abs(),
            result.base,
            result.sim
        ),
        None => format!(
            "A {drop}% reduction in stock moves average daily sales from {:.2} to {:.2} units; \
             the percentage change is undefined because baseline sales are zero.",
            result.base, result.sim
        ),
    }
}

pub fn promo_stock_interaction(result: &PromoStockInteraction) -> String {
    format!(
        "Promotions increase demand by {} under normal stock, but only {} when inventory is \
         constrained.\n\nRecommendation: fix stock availability before running promotions.",
        approximate_pct(result.normal_stock_uplift_pct()),
        approximate_pct(result.low_stock_uplift_pct())
    )
}

pub fn promo_off(result: &SimulationResult) -> String {
    match result.pct_change {
        Some(change) if change < 0.0 => format!(
            "Turning off promotions is expected to reduce sales by {:.1}%, indicating \
             promotions are a significant demand driver.",
            change.abs()
        ),
        Some(change) => format!(
            "Turning off promotions is expected to {} sales by {:.1}%.",
            change_verb(change),
            change.abs()
        ),
        None => "The effect of turning off promotions is undefined because baseline sales are \
                 zero."
            .to_string(),
    }
}

pub fn key_drivers(drivers: &[KeyDriver]) -> String {
    if drivers.is_empty() {
        return "No sales drivers are available for the current model.".to_string();
    }

    let ranked = drivers
        .iter()
        .enumerate()
        .map(|(rank, driver)| {
            format!("{}. {} ({:.2}%)", rank + 1, driver.feature, driver.importance * 100.0)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("The top sales drivers are: {ranked}.")
}

pub fn fallback() -> String {
    FALLBACK_ANSWER.to_string()
}

fn change_verb(change: f64) -> &'static str {
    if change < 0.0 {
        "reduce"
    } else if change > 0.0 {
        "increase"
    } else {
        "change"
    }
}

fn approximate_pct(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("~{value:.1}%"),
        None => "an undefined amount".to_string(),
    }
}

fn format_fraction_as_pct(fraction: f64) -> String {
    let pct = fraction * 100.0;
    if (pct - pct.round()).abs() < 1e-9 {
        format!("{pct:.0}")
    } else {
        format!("{pct:.1}")
    }
}
