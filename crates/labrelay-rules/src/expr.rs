//! Tokenizer and recursive-descent parser for rule expressions.

use crate::error::RuleError;
use crate::eval::EvalLimits;

/// Comparison operators supported in rule expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Contains
    Co,
    /// Starts with
    Sw,
    /// Ends with
    Ew,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal
    Ge,
    /// Less than or equal
    Le,
}

impl ComparisonOp {
    fn from_word(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "co" => Some(Self::Co),
            "sw" => Some(Self::Sw),
            "ew" => Some(Self::Ew),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "ge" => Some(Self::Ge),
            "le" => Some(Self::Le),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Co => "co",
            Self::Sw => "sw",
            Self::Ew => "ew",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Ge => "ge",
            Self::Le => "le",
        }
    }
}

/// Logical operators for combining expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// A parsed rule expression.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleExpression {
    /// Literal `true` / `false`
    Literal(bool),
    /// `exists(path)` — the path resolves to at least one value
    Exists(String),
    /// A comparison: path op value
    Comparison {
        path: String,
        op: ComparisonOp,
        value: String,
    },
    /// Logical AND or OR of two expressions
    Logical {
        op: LogicalOp,
        left: Box<RuleExpression>,
        right: Box<RuleExpression>,
    },
    /// Negation of an expression
    Not(Box<RuleExpression>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    QuotedString(String),
    Number(String),
    OpenParen,
    CloseParen,
    And,
    Or,
    Not,
    Exists,
    True,
    False,
    Operator(ComparisonOp),
    Eof,
}

/// Tokenizer for rule expressions.
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    emitted: usize,
    max_tokens: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str, max_tokens: usize) -> Self {
        Self {
            input,
            pos: 0,
            emitted: 0,
            max_tokens,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next_token(&mut self) -> Result<Token, RuleError> {
        self.skip_whitespace();

        if self.pos >= self.input.len() {
            return Ok(Token::Eof);
        }
        self.emitted += 1;
        if self.emitted > self.max_tokens {
            return Err(RuleError::limit(format!(
                "more than {} tokens",
                self.max_tokens
            )));
        }

        let ch = match self.peek_char() {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        if ch == '(' {
            self.pos += 1;
            return Ok(Token::OpenParen);
        }
        if ch == ')' {
            self.pos += 1;
            return Ok(Token::CloseParen);
        }

        // Quoted strings
        if ch == '"' || ch == '\'' {
            let quote = ch;
            self.pos += 1;
            let start = self.pos;
            while let Some(c) = self.peek_char() {
                if c == quote {
                    let value = &self.input[start..self.pos];
                    self.pos += 1;
                    return Ok(Token::QuotedString(value.to_string()));
                }
                self.pos += c.len_utf8();
            }
            return Err(RuleError::parse("unterminated quoted string"));
        }

        // Identifiers, operators, and keywords. Advances whole characters so
        // non-ASCII property names tokenize instead of splitting mid-char.
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '.' || c == '_' || c == '-' || c == ':' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }

        if self.pos == start {
            return Err(RuleError::parse(format!("unexpected character '{ch}'")));
        }

        let word = &self.input[start..self.pos];
        match word.to_lowercase().as_str() {
            "and" => Ok(Token::And),
            "or" => Ok(Token::Or),
            "not" => Ok(Token::Not),
            "exists" => Ok(Token::Exists),
            "true" => Ok(Token::True),
            "false" => Ok(Token::False),
            _ => {
                if let Some(op) = ComparisonOp::from_word(word) {
                    Ok(Token::Operator(op))
                } else if word
                    .chars()
                    .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
                {
                    Ok(Token::Number(word.to_string()))
                } else {
                    Ok(Token::Identifier(word.to_string()))
                }
            }
        }
    }
}

/// Parser for rule expressions.
struct Parser<'a> {
    tokenizer: Tokenizer<'a>,
    current: Token,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, limits: &EvalLimits) -> Result<Self, RuleError> {
        let mut tokenizer = Tokenizer::new(input, limits.max_tokens);
        let current = tokenizer.next_token()?;
        Ok(Self {
            tokenizer,
            current,
            depth: 0,
            max_depth: limits.max_depth,
        })
    }

    fn advance(&mut self) -> Result<(), RuleError> {
        self.current = self.tokenizer.next_token()?;
        Ok(())
    }

    fn enter(&mut self) -> Result<(), RuleError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(RuleError::limit(format!(
                "nesting deeper than {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn parse(&mut self) -> Result<RuleExpression, RuleError> {
        self.enter()?;
        let expr = self.parse_or()?;
        self.depth -= 1;
        Ok(expr)
    }

    /// OR has the lowest precedence.
    fn parse_or(&mut self) -> Result<RuleExpression, RuleError> {
        let mut left = self.parse_and()?;
        while self.current == Token::Or {
            self.advance()?;
            let right = self.parse_and()?;
            left = RuleExpression::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<RuleExpression, RuleError> {
        let mut left = self.parse_not()?;
        while self.current == Token::And {
            self.advance()?;
            let right = self.parse_not()?;
            left = RuleExpression::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<RuleExpression, RuleError> {
        if self.current == Token::Not {
            self.advance()?;
            let expr = self.parse_primary()?;
            return Ok(RuleExpression::Not(Box::new(expr)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<RuleExpression, RuleError> {
        match self.current.clone() {
            Token::OpenParen => {
                self.advance()?;
                let expr = self.parse()?;
                self.expect_close_paren()?;
                Ok(expr)
            }
            Token::True => {
                self.advance()?;
                Ok(RuleExpression::Literal(true))
            }
            Token::False => {
                self.advance()?;
                Ok(RuleExpression::Literal(false))
            }
            Token::Exists => {
                self.advance()?;
                if self.current != Token::OpenParen {
                    return Err(RuleError::parse("expected '(' after exists"));
                }
                self.advance()?;
                let path = match &self.current {
                    Token::Identifier(s) => s.clone(),
                    _ => return Err(RuleError::parse("expected path in exists()")),
                };
                self.advance()?;
                self.expect_close_paren()?;
                Ok(RuleExpression::Exists(path))
            }
            Token::Identifier(path) => {
                self.advance()?;
                let op = match &self.current {
                    Token::Operator(op) => *op,
                    _ => return Err(RuleError::parse("expected comparison operator")),
                };
                self.advance()?;
                let value = match &self.current {
                    Token::QuotedString(s) => s.clone(),
                    Token::Identifier(s) => s.clone(),
                    Token::Number(s) => s.clone(),
                    Token::True => "true".to_string(),
                    Token::False => "false".to_string(),
                    _ => return Err(RuleError::parse("expected comparison value")),
                };
                self.advance()?;
                Ok(RuleExpression::Comparison { path, op, value })
            }
            _ => Err(RuleError::parse("expected expression")),
        }
    }

    fn expect_close_paren(&mut self) -> Result<(), RuleError> {
        if self.current != Token::CloseParen {
            return Err(RuleError::parse("expected ')'"));
        }
        self.advance()
    }
}

/// Parse a rule expression string under the given limits.
pub fn parse_expression(input: &str, limits: &EvalLimits) -> Result<RuleExpression, RuleError> {
    if input.len() > limits.max_expression_len {
        return Err(RuleError::limit(format!(
            "expression longer than {} bytes",
            limits.max_expression_len
        )));
    }
    let mut parser = Parser::new(input, limits)?;
    let expr = parser.parse()?;
    if parser.current != Token::Eof {
        return Err(RuleError::parse("unexpected tokens after expression"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> RuleExpression {
        parse_expression(input, &EvalLimits::default()).unwrap()
    }

    #[test]
    fn test_parse_comparison() {
        let expr = parse("patient.state eq \"CA\"");
        assert_eq!(
            expr,
            RuleExpression::Comparison {
                path: "patient.state".to_string(),
                op: ComparisonOp::Eq,
                value: "CA".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_literals_and_exists() {
        assert_eq!(parse("true"), RuleExpression::Literal(true));
        assert_eq!(parse("false"), RuleExpression::Literal(false));
        assert_eq!(
            parse("exists(patient.dob)"),
            RuleExpression::Exists("patient.dob".to_string())
        );
    }

    #[test]
    fn test_precedence_or_is_lowest() {
        // a and b or c  ==  (a and b) or c
        let expr = parse("a eq 1 and b eq 2 or c eq 3");
        match expr {
            RuleExpression::Logical {
                op: LogicalOp::Or,
                left,
                ..
            } => {
                assert!(matches!(
                    *left,
                    RuleExpression::Logical {
                        op: LogicalOp::And,
                        ..
                    }
                ));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_parse_not_and_parens() {
        let expr = parse("not (status eq \"draft\")");
        assert!(matches!(expr, RuleExpression::Not(_)));
    }

    #[test]
    fn test_non_ascii_identifiers_and_strings_tokenize() {
        let expr = parse("café eq \"x\"");
        assert_eq!(
            expr,
            RuleExpression::Comparison {
                path: "café".to_string(),
                op: ComparisonOp::Eq,
                value: "x".to_string(),
            }
        );
        let expr = parse("city eq \"Zürich\"");
        assert_eq!(
            expr,
            RuleExpression::Comparison {
                path: "city".to_string(),
                op: ComparisonOp::Eq,
                value: "Zürich".to_string(),
            }
        );
    }

    #[test]
    fn test_rejects_trailing_tokens() {
        assert!(parse_expression("true garbage", &EvalLimits::default()).is_err());
    }

    #[test]
    fn test_rejects_unterminated_string() {
        assert!(parse_expression("state eq \"CA", &EvalLimits::default()).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let limits = EvalLimits {
            max_depth: 4,
            ..EvalLimits::default()
        };
        let deep = format!("{}true{}", "(".repeat(10), ")".repeat(10));
        let err = parse_expression(&deep, &limits).unwrap_err();
        assert!(matches!(err, RuleError::LimitExceeded(_)));
    }

    #[test]
    fn test_expression_length_limit() {
        let limits = EvalLimits {
            max_expression_len: 16,
            ..EvalLimits::default()
        };
        let err = parse_expression("patient.state eq \"CA\"", &limits).unwrap_err();
        assert!(matches!(err, RuleError::LimitExceeded(_)));
    }
}
