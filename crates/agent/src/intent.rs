use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SalesSummary,
    TopCategory,
    RegionPerformance,
    PromoEffect,
    ExpectedSales,
    ForecastSales,
    PromoStockInteraction,
    StockDrop,
    PromoOff,
    KeyDrivers,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SalesSummary => "sales_summary",
            Self::TopCategory => "top_category",
            Self::RegionPerformance => "region_performance",
            Self::PromoEffect => "promo_effect",
            Self::ExpectedSales => "expected_sales",
            Self::ForecastSales => "forecast_sales",
            Self::PromoStockInteraction => "promo_stock_interaction",
            Self::StockDrop => "stock_drop",
            Self::PromoOff => "promo_off",
            Self::KeyDrivers => "key_drivers",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const STOCK_CHANGE_KEYWORDS: &[&str] = &["drop", "drops", "reduce", "reduction", "%"];

/// Maps a question to an [`Intent`] by keyword containment.
///
/// Rules are checked in a fixed order and the first match wins. Keywords match
/// as substrings of the lower-cased text, so "promotions" satisfies
/// "promotion". Reordering the rules changes answers: anything mentioning both
/// promotion and stock must land on `PromoStockInteraction` before the
/// `StockDrop` and `PromoOff` rules are reached.
pub fn classify(text: &str) -> Intent {
    let text = normalize_text(text);
    let has = |keyword: &str| text.contains(keyword);

    if has("total") && has("sold") {
        Intent::SalesSummary
    } else if has("category") && (has("most") || has("top")) {
        Intent::TopCategory
    } else if has("region") && (has("best") || has("top")) {
        Intent::RegionPerformance
    } else if has("promotion") && has("increase") {
        Intent::PromoEffect
    } else if has("expected") && has("sales") {
        Intent::ExpectedSales
    } else if has("predict") || has("forecast") {
        Intent::ForecastSales
    } else if has("promotion") && has("stock") {
        Intent::PromoStockInteraction
    } else if has("stock") && STOCK_CHANGE_KEYWORDS.iter().any(|keyword| has(keyword)) {
        Intent::StockDrop
    } else if has("promotion") && (has("stop") || has("off")) {
        Intent::PromoOff
    } else if has("affect") || has("driver") {
        Intent::KeyDrivers
    } else {
        Intent::Unknown
    }
}

/// Scalars a question can carry alongside its intent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QuestionParameters {
    pub year: Option<i32>,
    /// Fraction in `0.0..=1.0`, read from the first `NN%` token.
    pub percent: Option<f64>,
}

pub fn extract_parameters(text: &str) -> QuestionParameters {
    let tokens = tokenize(&normalize_text(text));
    QuestionParameters { year: extract_year(&tokens), percent: extract_percent(&tokens) }
}

fn normalize_text(text: &str) -> String {
    text.to_lowercase()
}

/// A leading `-` stays on its token so signed values fail the range checks.
fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        let starts_token = sanitized.is_empty() || sanitized.ends_with(' ');
        if character.is_ascii_alphanumeric()
            || matches!(character, '%' | '.')
            || (character == '-' && starts_token)
        {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized
        .split_whitespace()
        .map(|token| token.trim_end_matches('.').to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

fn extract_year(tokens: &[String]) -> Option<i32> {
    tokens
        .iter()
        .filter(|token| token.len() == 4 && token.bytes().all(|byte| byte.is_ascii_digit()))
        .filter_map(|token| token.parse::<i32>().ok())
        .find(|year| (1900..=2999).contains(year))
}

fn extract_percent(tokens: &[String]) -> Option<f64> {
    tokens
        .iter()
        .filter_map(|token| token.strip_suffix('%'))
        .filter_map(|raw| raw.parse::<f64>().ok())
        .find(|percent| percent.is_finite() && (0.0..=100.0).contains(percent))
        .map(|percent| percent / 100.0)
}
