use error_stack::{bail, Report};

use super::ConditionEvaluationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ComparisonOp {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Expr {
    Number(f64),
    Bool(bool),
    Balance,
    Negate(Box<Expr>),
    Not(Box<Expr>),
    Arithmetic {
        op: ArithmeticOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `a < b <= c` holds when every adjacent pair holds.
    Comparison {
        first: Box<Expr>,
        rest: Vec<(ComparisonOp, Expr)>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Kind {
    Number,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Number(f64),
    Bool(bool),
}

impl Value {
    fn kind(&self) -> Kind {
        match self {
            Value::Number(_) => Kind::Number,
            Value::Bool(_) => Kind::Bool,
        }
    }
}

fn mismatch(message: impl Into<String>) -> Report<ConditionEvaluationError> {
    Report::new(ConditionEvaluationError::TypeMismatch(message.into()))
}

impl Expr {
    /// Static type of the expression, so malformed conditions are caught
    /// before the first reading is available.
    pub fn kind(&self) -> Result<Kind, Report<ConditionEvaluationError>> {
        match self {
            Expr::Number(_) | Expr::Balance => Ok(Kind::Number),
            Expr::Bool(_) => Ok(Kind::Bool),
            Expr::Negate(inner) => match inner.kind()? {
                Kind::Number => Ok(Kind::Number),
                Kind::Bool => Err(mismatch("cannot negate a boolean")),
            },
            Expr::Not(inner) => match inner.kind()? {
                Kind::Bool => Ok(Kind::Bool),
                Kind::Number => Err(mismatch("`not` needs a boolean operand")),
            },
            Expr::Arithmetic { lhs, rhs, .. } => match (lhs.kind()?, rhs.kind()?) {
                (Kind::Number, Kind::Number) => Ok(Kind::Number),
                _ => Err(mismatch("arithmetic needs numeric operands")),
            },
            Expr::Comparison { first, rest } => {
                let mut left = first.kind()?;
                for (op, operand) in rest {
                    let right = operand.kind()?;
                    let ordered = !matches!(op, ComparisonOp::Equal | ComparisonOp::NotEqual);
                    if left != right || (ordered && left == Kind::Bool) {
                        return Err(mismatch("comparison operands must both be numbers"));
                    }
                    left = right;
                }
                Ok(Kind::Bool)
            }
            Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => match (lhs.kind()?, rhs.kind()?) {
                (Kind::Bool, Kind::Bool) => Ok(Kind::Bool),
                _ => Err(mismatch("`and`/`or` need boolean operands")),
            },
        }
    }

    pub fn evaluate_bool(&self, balance: f64) -> Result<bool, Report<ConditionEvaluationError>> {
        match self.evaluate(balance)? {
            Value::Bool(result) => Ok(result),
            Value::Number(_) => Err(mismatch("condition must be true or false, not a number")),
        }
    }

    fn evaluate_number(&self, balance: f64) -> Result<f64, Report<ConditionEvaluationError>> {
        match self.evaluate(balance)? {
            Value::Number(value) => Ok(value),
            Value::Bool(_) => Err(mismatch("expected a number, found a boolean")),
        }
    }

    fn evaluate(&self, balance: f64) -> Result<Value, Report<ConditionEvaluationError>> {
        let value = match self {
            Expr::Number(value) => Value::Number(*value),
            Expr::Bool(value) => Value::Bool(*value),
            Expr::Balance => Value::Number(balance),
            Expr::Negate(inner) => Value::Number(-inner.evaluate_number(balance)?),
            Expr::Not(inner) => Value::Bool(!inner.evaluate_bool(balance)?),
            Expr::Arithmetic { op, lhs, rhs } => {
                let lhs = lhs.evaluate_number(balance)?;
                let rhs = rhs.evaluate_number(balance)?;
                let result = match op {
                    ArithmeticOp::Add => lhs + rhs,
                    ArithmeticOp::Subtract => lhs - rhs,
                    ArithmeticOp::Multiply => lhs * rhs,
                    ArithmeticOp::Divide if rhs == 0.0 => {
                        bail!(ConditionEvaluationError::DivisionByZero)
                    }
                    ArithmeticOp::Divide => lhs / rhs,
                };
                if !result.is_finite() {
                    bail!(ConditionEvaluationError::NonFinite);
                }
                Value::Number(result)
            }
            Expr::Comparison { first, rest } => {
                let mut left = first.evaluate(balance)?;
                for (op, operand) in rest {
                    let right = operand.evaluate(balance)?;
                    if !compare(*op, left, right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Value::Bool(true)
            }
            Expr::And(lhs, rhs) => {
                Value::Bool(lhs.evaluate_bool(balance)? && rhs.evaluate_bool(balance)?)
            }
            Expr::Or(lhs, rhs) => {
                Value::Bool(lhs.evaluate_bool(balance)? || rhs.evaluate_bool(balance)?)
            }
        };
        Ok(value)
    }
}

fn compare(
    op: ComparisonOp,
    left: Value,
    right: Value,
) -> Result<bool, Report<ConditionEvaluationError>> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok(match op {
            ComparisonOp::Less => l < r,
            ComparisonOp::LessEqual => l <= r,
            ComparisonOp::Greater => l > r,
            ComparisonOp::GreaterEqual => l >= r,
            ComparisonOp::Equal => l == r,
            ComparisonOp::NotEqual => l != r,
        }),
        (Value::Bool(l), Value::Bool(r)) => match op {
            ComparisonOp::Equal => Ok(l == r),
            ComparisonOp::NotEqual => Ok(l != r),
            _ => Err(mismatch("booleans can only be compared with == or !=")),
        },
        (l, r) => Err(mismatch(format!(
            "cannot compare {:?} with {:?}",
            l.kind(),
            r.kind()
        ))),
    }
}
