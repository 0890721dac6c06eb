use error_stack::{bail, Report};

use super::ast::{ArithmeticOp, ComparisonOp, Expr};
use super::lexer::{Spanned, Token};
use super::ConditionEvaluationError;

type ParseResult = Result<Expr, Report<ConditionEvaluationError>>;

/// Deepest nesting of parentheses, `not` and unary minus accepted.
pub(super) const MAX_NESTING: usize = 64;
/// Longest token stream accepted. Also bounds the depth of operator chains.
pub(super) const MAX_TOKENS: usize = 1024;

/// Recursive descent over the token stream, lowest precedence first:
/// `or`, `and`, `not`, comparisons, `+ -`, `* /`, unary minus.
pub(super) struct Parser {
    tokens: Vec<Spanned>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            cursor: 0,
            depth: 0,
        }
    }

    pub fn parse(mut self) -> ParseResult {
        if self.tokens.is_empty() {
            bail!(ConditionEvaluationError::Empty);
        }
        if self.tokens.len() > MAX_TOKENS {
            bail!(ConditionEvaluationError::TooLong { limit: MAX_TOKENS });
        }

        let expr = self.or()?;
        if let Some(extra) = self.tokens.get(self.cursor) {
            bail!(ConditionEvaluationError::UnexpectedToken {
                found: extra.token.to_string(),
                position: extra.position,
            });
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|spanned| &spanned.token)
    }

    fn advance(&mut self) -> Result<Spanned, Report<ConditionEvaluationError>> {
        let spanned = self
            .tokens
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| Report::new(ConditionEvaluationError::UnexpectedEnd))?;
        self.cursor += 1;
        Ok(spanned)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult) -> ParseResult {
        if self.depth >= MAX_NESTING {
            bail!(ConditionEvaluationError::TooDeep { limit: MAX_NESTING });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn or(&mut self) -> ParseResult {
        let mut expr = self.and()?;
        while self.eat(&Token::Or) {
            expr = Expr::Or(Box::new(expr), Box::new(self.and()?));
        }
        Ok(expr)
    }

    fn and(&mut self) -> ParseResult {
        let mut expr = self.not()?;
        while self.eat(&Token::And) {
            expr = Expr::And(Box::new(expr), Box::new(self.not()?));
        }
        Ok(expr)
    }

    fn not(&mut self) -> ParseResult {
        if self.eat(&Token::Not) {
            let inner = self.nested(Self::not)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ParseResult {
        let first = self.sum()?;
        let mut rest = Vec::new();
        while let Some(op) = self.peek().and_then(comparison_op) {
            self.cursor += 1;
            rest.push((op, self.sum()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Comparison {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn sum(&mut self) -> ParseResult {
        let mut expr = self.product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithmeticOp::Add,
                Some(Token::Minus) => ArithmeticOp::Subtract,
                _ => return Ok(expr),
            };
            self.cursor += 1;
            expr = Expr::Arithmetic {
                op,
                lhs: Box::new(expr),
                rhs: Box::new(self.product()?),
            };
        }
    }

    fn product(&mut self) -> ParseResult {
        let mut expr = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithmeticOp::Multiply,
                Some(Token::Slash) => ArithmeticOp::Divide,
                _ => return Ok(expr),
            };
            self.cursor += 1;
            expr = Expr::Arithmetic {
                op,
                lhs: Box::new(expr),
                rhs: Box::new(self.unary()?),
            };
        }
    }

    fn unary(&mut self) -> ParseResult {
        if self.eat(&Token::Minus) {
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> ParseResult {
        let spanned = self.advance()?;
        match spanned.token {
            Token::Number(value) => Ok(Expr::Number(value)),
            Token::Balance => Ok(Expr::Balance),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::LeftParen => {
                let inner = self.nested(Self::or)?;
                let closing = self.advance()?;
                if closing.token != Token::RightParen {
                    bail!(ConditionEvaluationError::UnexpectedToken {
                        found: closing.token.to_string(),
                        position: closing.position,
                    });
                }
                Ok(inner)
            }
            other => bail!(ConditionEvaluationError::UnexpectedToken {
                found: other.to_string(),
                position: spanned.position,
            }),
        }
    }
}

fn comparison_op(token: &Token) -> Option<ComparisonOp> {
    match token {
        Token::Less => Some(ComparisonOp::Less),
        Token::LessEqual => Some(ComparisonOp::LessEqual),
        Token::Greater => Some(ComparisonOp::Greater),
        Token::GreaterEqual => Some(ComparisonOp::GreaterEqual),
        Token::Equal => Some(ComparisonOp::Equal),
        Token::NotEqual => Some(ComparisonOp::NotEqual),
        _ => None,
    }
}
