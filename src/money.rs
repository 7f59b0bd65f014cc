// src/money.rs

use serde::{Deserialize, Serialize};

/// Tolerance used everywhere money values are compared.
/// Balances at or below this are treated as zero.
pub const MONEY_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: f64, currency: &str) -> Self {
        Money {
            amount,
            currency: currency.to_string(),
        }
    }

    pub fn usd(amount: f64) -> Self {
        Money::new(amount, "USD")
    }

    pub fn zero(currency: &str) -> Self {
        Money::new(0.0, currency)
    }

    /// True once the balance is at or below the epsilon threshold.
    pub fn is_settled(&self) -> bool {
        self.amount <= MONEY_EPSILON
    }

    /// Same-currency sum. Arithmetic across currencies is never exercised
    /// by this crate and is not guarded here.
    pub fn plus(&self, other: f64) -> Money {
        Money::new(self.amount + other, &self.currency)
    }

    pub fn minus(&self, other: f64) -> Money {
        Money::new(self.amount - other, &self.currency)
    }
}

/// Display formatting used by every money-carrying view: "$1,234.56 USD"
/// for USD, "1234.56 EUR" otherwise.
pub fn format_currency(m: &Money) -> String {
    if m.currency == "USD" {
        format!("${} {}", group_thousands(m.amount), m.currency)
    } else {
        format!("{:.2} {}", m.amount, m.currency)
    }
}

fn group_thousands(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as i64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{frac:02}")
}
