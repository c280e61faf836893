//! Amount coercion and the dashboard summary.
//!
//! Amounts arrive as user-typed text or as whatever JSON the server stored.
//! Nothing here fails: anything that is not a finite number becomes `0`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::Expense;

/// Parse user-typed text into an amount, substituting `0` on failure.
pub fn parse_amount(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Coerce an arbitrary JSON value into an amount.
pub fn coerce_amount(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(text) => parse_amount(text),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    }
}

/// Serde adapter for amount fields that never rejects a value.
pub(crate) fn deserialize_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_amount(&value))
}

/// Total and count shown above the expense table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub total: f64,
    pub count: usize,
}

impl Summary {
    /// Negative amounts count towards the total by magnitude.
    pub fn of(expenses: &[Expense]) -> Self {
        Self {
            total: expenses.iter().fold(0.0, |acc, e| acc + e.amount.abs()),
            count: expenses.len(),
        }
    }

    pub fn formatted_total(&self) -> String {
        format_amount(self.total)
    }
}

/// Two-decimal rendering used for every displayed amount.
pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}
