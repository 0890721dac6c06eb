use error_stack::{bail, Report};

use super::ConditionEvaluationError;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    Number(f64),
    Balance,
    True,
    False,
    And,
    Or,
    Not,
    LeftParen,
    RightParen,
    Plus,
    Minus,
    Star,
    Slash,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Token::Number(value) => return write!(f, "number {}", value),
            Token::Balance => "`balance`",
            Token::True => "`true`",
            Token::False => "`false`",
            Token::And => "`and`",
            Token::Or => "`or`",
            Token::Not => "`not`",
            Token::LeftParen => "`(`",
            Token::RightParen => "`)`",
            Token::Plus => "`+`",
            Token::Minus => "`-`",
            Token::Star => "`*`",
            Token::Slash => "`/`",
            Token::Less => "`<`",
            Token::LessEqual => "`<=`",
            Token::Greater => "`>`",
            Token::GreaterEqual => "`>=`",
            Token::Equal => "`==`",
            Token::NotEqual => "`!=`",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Spanned {
    pub token: Token,
    /// Character offset of the token's first character.
    pub position: usize,
}

pub(super) fn tokenize(source: &str) -> Result<Vec<Spanned>, Report<ConditionEvaluationError>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let current = chars[index];
        let position = index;

        if current.is_whitespace() {
            index += 1;
            continue;
        }

        let next = chars.get(index + 1).copied();
        let (token, width) = match (current, next) {
            ('(', _) => (Token::LeftParen, 1),
            (')', _) => (Token::RightParen, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('<', Some('=')) => (Token::LessEqual, 2),
            ('<', _) => (Token::Less, 1),
            ('>', Some('=')) => (Token::GreaterEqual, 2),
            ('>', _) => (Token::Greater, 1),
            ('=', Some('=')) => (Token::Equal, 2),
            ('!', Some('=')) => (Token::NotEqual, 2),
            ('!', _) => (Token::Not, 1),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            (c, _) if c.is_ascii_digit() || c == '.' => {
                let end = scan(&chars, index, |c| c.is_ascii_digit() || c == '.');
                let literal: String = chars[index..end].iter().collect();
                let value = literal.parse::<f64>().map_err(|_| {
                    Report::new(ConditionEvaluationError::InvalidNumber(literal.clone()))
                })?;
                (Token::Number(value), end - index)
            }
            (c, _) if c.is_alphabetic() || c == '_' => {
                let end = scan(&chars, index, |c| c.is_alphanumeric() || c == '_');
                let word: String = chars[index..end].iter().collect();
                (keyword(&word)?, end - index)
            }
            (found, _) => bail!(ConditionEvaluationError::UnexpectedCharacter { found, position }),
        };

        tokens.push(Spanned { token, position });
        index += width;
    }

    Ok(tokens)
}

fn scan(chars: &[char], start: usize, accept: impl Fn(char) -> bool) -> usize {
    chars[start..]
        .iter()
        .position(|c| !accept(*c))
        .map_or(chars.len(), |offset| start + offset)
}

fn keyword(word: &str) -> Result<Token, Report<ConditionEvaluationError>> {
    match word.to_ascii_lowercase().as_str() {
        "balance" => Ok(Token::Balance),
        "true" => Ok(Token::True),
        "false" => Ok(Token::False),
        "and" => Ok(Token::And),
        "or" => Ok(Token::Or),
        "not" => Ok(Token::Not),
        _ => bail!(ConditionEvaluationError::UnknownIdentifier(word.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn test_tokenize_comparison() {
        assert_eq!(
            tokens("balance < 100"),
            vec![Token::Balance, Token::Less, Token::Number(100.0)]
        );
    }

    #[test]
    fn test_tokenize_two_char_operators() {
        assert_eq!(
            tokens("<= >= == != && ||"),
            vec![
                Token::LessEqual,
                Token::GreaterEqual,
                Token::Equal,
                Token::NotEqual,
                Token::And,
                Token::Or
            ]
        );
    }

    #[test]
    fn test_tokenize_keywords_any_case() {
        assert_eq!(
            tokens("False OR NOT Balance"),
            vec![Token::False, Token::Or, Token::Not, Token::Balance]
        );
    }

    #[test]
    fn test_tokenize_positions() {
        let spanned = tokenize("  balance>1.5").unwrap();
        let positions: Vec<usize> = spanned.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![2, 9, 10]);
        assert_eq!(spanned[2].token, Token::Number(1.5));
    }

    #[test]
    fn test_tokenize_rejects_unknown_identifier() {
        let report = tokenize("__import__('os')").unwrap_err();
        assert_eq!(
            report.current_context(),
            &ConditionEvaluationError::UnknownIdentifier("__import__".to_string())
        );
    }

    #[test]
    fn test_tokenize_rejects_single_equals() {
        let report = tokenize("balance = 1").unwrap_err();
        assert_eq!(
            report.current_context(),
            &ConditionEvaluationError::UnexpectedCharacter {
                found: '=',
                position: 8
            }
        );
    }

    #[test]
    fn test_tokenize_rejects_bad_number() {
        let report = tokenize("balance < 1.2.3").unwrap_err();
        assert_eq!(
            report.current_context(),
            &ConditionEvaluationError::InvalidNumber("1.2.3".to_string())
        );
    }
}
