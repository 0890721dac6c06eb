use std::sync::LazyLock;

use error_stack::{report, ResultExt};
use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::instrument;

use super::number_parser::parse_number;
use crate::domain::BalanceReading;

/// Text that precedes the amount on the balance page.
pub const BALANCE_MARKER: &str = "Overall balance";

static MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(&regex::escape(BALANCE_MARKER))
        .case_insensitive(true)
        .build()
        .expect("escaped marker is a valid regex")
});

// Grouped thousands (`12,345,678.90`) are tried before the loose form
// (`1234.56`, `1,234.56`) so large balances are not cut to their last groups.
static AMOUNT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-?(?:[0-9]{1,3}(?:,[0-9]{3})+|[0-9]*,?[0-9]*)\.[0-9]{2}")
        .expect("amount pattern is a valid regex")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Overall balance not found")]
    BalanceMarkerNotFound,
    #[error("Amount not found after the balance marker")]
    BalanceAmountNotFound,
    #[error("Amount found but could not be parsed")]
    MalformedNumber,
}

/// Finds the account balance in the page source served by the bank.
///
/// The markup around the amount changes between sessions, so this scans text
/// instead of walking the DOM: quotes are dropped, the first case-insensitive
/// `Overall balance` is located and the first amount after it is parsed.
#[instrument(skip(source), fields(len = source.len()))]
pub fn extract_balance(source: &str) -> error_stack::Result<BalanceReading, ExtractionError> {
    // quoted attribute values otherwise sit between the marker and the amount
    let html = source.replace('"', "");

    let marker = MARKER_REGEX
        .find(&html)
        .ok_or_else(|| report!(ExtractionError::BalanceMarkerNotFound))?;
    let after_marker = &html[marker.end()..];

    let amount = AMOUNT_REGEX
        .find(after_marker)
        .ok_or_else(|| report!(ExtractionError::BalanceAmountNotFound))?
        .as_str();
    tracing::debug!(amount, "Found amount after balance marker");

    let value = parse_number(amount)
        .change_context(ExtractionError::MalformedNumber)
        .attach_printable_lazy(|| format!("Matched amount: {:?}", amount))?;

    BalanceReading::new(value)
        .ok_or_else(|| report!(ExtractionError::MalformedNumber))
        .attach_printable_lazy(|| format!("Non-finite amount: {}", value))
}
