//! Alert conditions: a tiny, side-effect free expression language over the
//! single variable `balance`.
//!
//! ```text
//! balance < 100
//! balance < 0 or balance > 10000
//! not (500 <= balance <= 1000)
//! ```
//!
//! Only numeric literals, `true`/`false`, arithmetic (`+ - * /`),
//! comparisons (chained like `a < b < c`) and `and`/`or`/`not` (also `&&`,
//! `||`, `!`) exist. Keywords are case-insensitive.

mod ast;
mod lexer;
mod parser;

use std::fmt;

use error_stack::{bail, ResultExt};
use thiserror::Error;
use tracing::instrument;

use crate::domain::{AlertDecision, BalanceReading};
use ast::{Expr, Kind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionEvaluationError {
    #[error("Condition is empty")]
    Empty,
    #[error("Unexpected character {found:?} at position {position}")]
    UnexpectedCharacter { found: char, position: usize },
    #[error("Invalid number literal {0:?}")]
    InvalidNumber(String),
    #[error("Unknown identifier {0:?}, only `balance` is available")]
    UnknownIdentifier(String),
    #[error("Unexpected {found} at position {position}")]
    UnexpectedToken { found: String, position: usize },
    #[error("Condition ended unexpectedly")]
    UnexpectedEnd,
    #[error("Condition nests deeper than {limit} levels")]
    TooDeep { limit: usize },
    #[error("Condition is longer than {limit} tokens")]
    TooLong { limit: usize },
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Arithmetic result is not a finite number")]
    NonFinite,
}

/// A parsed and type-checked alert condition.
#[derive(Debug, Clone)]
pub struct AlertCondition {
    source: String,
    expr: Expr,
}

impl AlertCondition {
    pub fn parse(source: &str) -> error_stack::Result<Self, ConditionEvaluationError> {
        let tokens = lexer::tokenize(source)
            .attach_printable_lazy(|| format!("Condition: {:?}", source))?;
        let expr = parser::Parser::new(tokens)
            .parse()
            .attach_printable_lazy(|| format!("Condition: {:?}", source))?;

        match expr.kind().attach_printable_lazy(|| format!("Condition: {:?}", source))? {
            Kind::Bool => Ok(Self {
                source: source.trim().to_string(),
                expr,
            }),
            Kind::Number => bail!(ConditionEvaluationError::TypeMismatch(format!(
                "condition {:?} yields a number, expected true or false",
                source
            ))),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, balance: f64) -> error_stack::Result<bool, ConditionEvaluationError> {
        self.expr
            .evaluate_bool(balance)
            .attach_printable_lazy(|| format!("Condition {:?} with balance {}", self.source, balance))
    }
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Decides whether `reading` raises the operator's alert.
#[instrument(skip(reading), fields(balance = reading.value()))]
pub fn evaluate_condition(
    condition: &str,
    reading: BalanceReading,
) -> error_stack::Result<AlertDecision, ConditionEvaluationError> {
    let condition = AlertCondition::parse(condition)?;
    let triggered = condition.evaluate(reading.value())?;

    Ok(AlertDecision {
        triggered,
        condition: condition.source().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(value: f64) -> BalanceReading {
        BalanceReading::new(value).unwrap()
    }

    fn holds(condition: &str, balance: f64) -> bool {
        evaluate_condition(condition, reading(balance))
            .unwrap()
            .triggered
    }

    fn failure(condition: &str, balance: f64) -> ConditionEvaluationError {
        evaluate_condition(condition, reading(balance))
            .unwrap_err()
            .current_context()
            .clone()
    }

    #[test]
    fn test_below_threshold_triggers() {
        let decision = evaluate_condition("balance < 100", reading(50.0)).unwrap();
        assert_eq!(
            decision,
            AlertDecision {
                triggered: true,
                condition: "balance < 100".to_string(),
            }
        );
    }

    #[test]
    fn test_above_threshold_does_not_trigger() {
        assert!(!holds("balance < 100", 500.0));
    }

    #[test]
    fn test_literal_conditions() {
        assert!(!holds("False", 10.0));
        assert!(holds("True", 10.0));
    }

    #[test]
    fn test_boolean_combinations() {
        let condition = "balance < 0 or balance > 10000";
        assert!(holds(condition, -5.0));
        assert!(holds(condition, 10000.01));
        assert!(!holds(condition, 300.0));
        assert!(holds("balance > 1 && !(balance > 5)", 3.0));
    }

    #[test]
    fn test_chained_comparison() {
        assert!(holds("500 <= balance <= 1000", 750.0));
        assert!(!holds("500 <= balance <= 1000", 1000.5));
    }

    #[test]
    fn test_arithmetic() {
        assert!(holds("balance * 2 - 10 == 90", 50.0));
        assert!(holds("-balance > 20", -25.0));
    }

    #[test]
    fn test_boolean_equality() {
        assert!(holds("(balance < 10) == false", 50.0));
    }

    #[test]
    fn test_numeric_condition_rejected() {
        assert!(matches!(
            failure("balance + 1", 1.0),
            ConditionEvaluationError::TypeMismatch(_)
        ));
    }

    #[test]
    fn test_mixed_types_rejected() {
        assert!(matches!(
            failure("balance < true", 1.0),
            ConditionEvaluationError::TypeMismatch(_)
        ));
        assert!(matches!(
            failure("balance and true", 1.0),
            ConditionEvaluationError::TypeMismatch(_)
        ));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            failure("100 / balance > 1", 0.0),
            ConditionEvaluationError::DivisionByZero
        );
        assert!(holds("100 / balance > 1", 50.0));
    }

    #[test]
    fn test_code_is_not_executed() {
        assert_eq!(
            failure("__import__('os').system('true')", 1.0),
            ConditionEvaluationError::UnknownIdentifier("__import__".to_string())
        );
        assert!(matches!(
            failure("open('/etc/passwd')", 1.0),
            ConditionEvaluationError::UnknownIdentifier(_)
        ));
    }

    #[test]
    fn test_parse_once_evaluate_many() {
        let condition = AlertCondition::parse("  balance >= 0 ").unwrap();
        assert_eq!(condition.source(), "balance >= 0");
        assert!(condition.evaluate(0.0).unwrap());
        assert!(!condition.evaluate(-0.01).unwrap());
    }

    #[test]
    fn test_deeply_nested_condition_is_an_error() {
        let source = format!("{}balance < 1{}", "(".repeat(2_000), ")".repeat(2_000));

        assert!(AlertCondition::parse(&source).is_err());
        assert!(matches!(
            failure(&source, 50.0),
            ConditionEvaluationError::TooLong { .. }
        ));

        let source = format!("{}balance < 1{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(
            failure(&source, 50.0),
            ConditionEvaluationError::TooDeep { .. }
        ));
    }
}
