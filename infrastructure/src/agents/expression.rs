//! Local arithmetic evaluation
//!
//! A small recursive-descent evaluator so that plain arithmetic never needs a
//! reasoning backend. Grammar (lowest to highest precedence):
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := power (('*' | '/' | '%') power)*
//! power  := unary ('^' power)?
//! unary  := '-' unary | '+' unary | atom
//! atom   := number | '(' expr ')' | 'sqrt' '(' expr ')'
//! ```

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Square root of a negative number")]
    NegativeRoot,

    #[error("Result is not a finite number")]
    NotFinite,

    #[error("Expression nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Nesting limit for parentheses, unary signs and exponent chains
const MAX_DEPTH: usize = 256;

static PERCENT_OF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(?:percent|%)\s+of\s+(\d+(?:\.\d+)?)").expect("valid regex")
});

static SQUARE_ROOT_OF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"square\s+root\s+of\s+(\(?[\d.\s+\-*/^%()]*\d\)?)").expect("valid regex")
});

static LEAD_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:please\s+)?(?:what\s+is|what's|whats|calculate|compute|evaluate|solve)\s+")
        .expect("valid regex")
});

/// Word operators rewritten to symbols before parsing
const WORD_OPERATORS: [(&str, &str); 9] = [
    ("multiplied by", "*"),
    ("divided by", "/"),
    ("to the power of", "^"),
    ("times", "*"),
    ("plus", "+"),
    ("minus", "-"),
    ("mod", "%"),
    ("**", "^"),
    ("×", "*"),
];

/// Turn a natural-language request into a bare arithmetic expression.
///
/// Returns `None` unless what remains after normalization consists only of
/// numbers, operators, parentheses and `sqrt`.
pub fn extract_expression(task: &str) -> Option<String> {
    let mut text = task.trim().to_lowercase();
    text = LEAD_IN.replace(&text, "").into_owned();
    text = text
        .trim_end_matches(|c: char| c == '?' || c == '.' || c == '=' || c.is_whitespace())
        .to_string();

    for (word, symbol) in WORD_OPERATORS {
        text = text.replace(word, symbol);
    }
    text = PERCENT_OF
        .replace_all(&text, "($1/100*$2)")
        .into_owned();
    text = SQUARE_ROOT_OF
        .replace_all(&text, "sqrt($1)")
        .into_owned();

    let candidate = text.trim();
    let allowed = candidate
        .replace("sqrt", "")
        .chars()
        .all(|c| c.is_ascii_digit() || "+-*/%^(). ".contains(c));
    let has_digit = candidate.chars().any(|c| c.is_ascii_digit());

    (allowed && has_digit && !candidate.is_empty()).then(|| candidate.to_string())
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64, ExpressionError> {
    let mut parser = Parser {
        chars: expression.chars().collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(c) = parser.peek() {
        return Err(ExpressionError::UnexpectedChar(c));
    }
    if !value.is_finite() {
        return Err(ExpressionError::NotFinite);
    }
    Ok(value)
}

/// Render a result: integers without a decimal point, others with at most
/// ten decimal places.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let fixed = format!("{:.10}", value);
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Next non-whitespace character, without consuming it
    fn peek(&mut self) -> Option<char> {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ExpressionError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(ExpressionError::UnexpectedChar(c)),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    /// Run one recursive production, failing once nesting exceeds [`MAX_DEPTH`]
    fn nested(
        &mut self,
        production: impl FnOnce(&mut Self) -> Result<f64, ExpressionError>,
    ) -> Result<f64, ExpressionError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = production(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> Result<f64, ExpressionError> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, ExpressionError> {
        let mut value = self.power()?;
        loop {
            if self.eat('*') {
                value *= self.power()?;
            } else if self.eat('/') {
                let rhs = self.power()?;
                if rhs == 0.0 {
                    return Err(ExpressionError::DivisionByZero);
                }
                value /= rhs;
            } else if self.eat('%') {
                let rhs = self.power()?;
                if rhs == 0.0 {
                    return Err(ExpressionError::DivisionByZero);
                }
                value %= rhs;
            } else {
                return Ok(value);
            }
        }
    }

    fn power(&mut self) -> Result<f64, ExpressionError> {
        self.nested(|parser| {
            let base = parser.unary()?;
            if parser.eat('^') {
                // Right-associative: 2^3^2 == 2^9
                let exponent = parser.power()?;
                return Ok(base.powf(exponent));
            }
            Ok(base)
        })
    }

    fn unary(&mut self) -> Result<f64, ExpressionError> {
        self.nested(|parser| {
            if parser.eat('-') {
                return Ok(-parser.unary()?);
            }
            if parser.eat('+') {
                return parser.unary();
            }
            parser.atom()
        })
    }

    fn atom(&mut self) -> Result<f64, ExpressionError> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let value = self.expr()?;
                self.expect_char(')')?;
                Ok(value)
            }
            Some('s') => {
                for expected in "sqrt".chars() {
                    self.expect_char(expected)?;
                }
                self.expect_char('(')?;
                let value = self.expr()?;
                self.expect_char(')')?;
                if value < 0.0 {
                    return Err(ExpressionError::NegativeRoot);
                }
                Ok(value.sqrt())
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(ExpressionError::UnexpectedChar(c)),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn number(&mut self) -> Result<f64, ExpressionError> {
        let start = self.pos;
        while let Some(&c) = self.chars.get(self.pos) {
            if c.is_ascii_digit() || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| ExpressionError::UnexpectedChar(self.chars[start]))
    }
}
