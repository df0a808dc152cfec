//! Literal codec for canonical edit strings
//!
//! Edits print their payload as a comma-separated list of literals:
//! single-quoted strings, integers, floats, `True`/`False`/`None` and
//! parenthesised tuples. [`Value`] holds one such literal and
//! [`parse_args`] reads a whole argument list back.

use crate::error::ParseError;
use std::fmt::{self, Display, Formatter, Write as _};
use std::hash::{Hash, Hasher};

/// A single literal value
#[derive(Debug, Clone)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    Tuple(Vec<Value>),
}

impl Value {
    /// Borrow as string slice if this is a string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as tuple items if this is a tuple
    #[inline]
    #[must_use]
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric view (ints widen to float)
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Plain text form, as used when comparing parameter values
    ///
    /// Strings are rendered without quotes, everything else as its literal.
    #[must_use]
    pub fn plain(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::None, Self::None) => true,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Str(s) => s.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(x) => x.to_bits().hash(state),
            Self::Bool(b) => b.hash(state),
            Self::None => {}
            Self::Tuple(items) => items.hash(state),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(&quote(s)),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{}", format_float(*x)),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::None => f.write_str("None"),
            Self::Tuple(items) => {
                f.write_char('(')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                if items.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Float rendering that always keeps a decimal point or exponent
#[must_use]
pub fn format_float(x: f64) -> String {
    let s = format!("{x:?}");
    if s.contains(['.', 'e', 'E', 'n', 'N', 'i']) {
        s
    } else {
        format!("{s}.0")
    }
}

/// Quote a string, preferring single quotes
#[must_use]
pub fn quote(s: &str) -> String {
    let delim = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delim);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delim);
    out
}

/// Parse a single literal spanning the whole input
///
/// # Errors
/// Returns [`ParseError::Literal`] on malformed or trailing input.
pub fn parse_value(input: &str) -> Result<Value, ParseError> {
    let mut parser = Parser::new(input);
    let value = parser.value()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

/// Parse a comma-separated argument list (no surrounding brackets)
///
/// # Errors
/// Returns [`ParseError::Literal`] on malformed input.
pub fn parse_args(input: &str) -> Result<Vec<Value>, ParseError> {
    let mut parser = Parser::new(input);
    let mut out = Vec::new();
    parser.skip_ws();
    while !parser.at_end() {
        out.push(parser.value()?);
        parser.skip_ws();
        if parser.at_end() {
            break;
        }
        parser.expect(',')?;
        parser.skip_ws();
    }
    Ok(out)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::Literal {
            input: self.input.to_string(),
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.peek() == Some(c) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn value(&mut self) -> Result<Value, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some('(') => self.tuple(),
            Some('\'' | '"') => self.string().map(Value::Str),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(_) => self.keyword(),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn tuple(&mut self) -> Result<Value, ParseError> {
        self.expect('(')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(')') {
                self.bump();
                return Ok(Value::Tuple(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => {}
                Some(')') => return Ok(Value::Tuple(items)),
                _ => return Err(self.error("expected ',' or ')' in tuple")),
            }
        }
    }

    fn string(&mut self) -> Result<String, ParseError> {
        let delim = self.bump().ok_or_else(|| self.error("expected quote"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => return Err(self.error("dangling escape")),
                },
                Some(c) if c == delim => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'))
        {
            self.bump();
        }
        let text = &self.input[start..self.pos];
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Int(i));
        }
        text.parse::<f64>()
            .map(Value::Float)
            .map_err(|_| self.error(&format!("bad number \"{text}\"")))
    }

    fn keyword(&mut self) -> Result<Value, ParseError> {
        for (word, value) in [
            ("True", Value::Bool(true)),
            ("False", Value::Bool(false)),
            ("None", Value::None),
        ] {
            if self.rest().starts_with(word) {
                self.pos += word.len();
                return Ok(value);
            }
        }
        Err(self.error("unknown literal"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_prefers_single_quotes() {
        assert_eq!(quote("abc"), "'abc'");
        assert_eq!(quote("it's"), "\"it's\"");
        assert_eq!(quote("a'b\"c"), "'a\\'b\"c'");
    }

    #[test]
    fn parse_location_tuple() {
        let v = parse_value("('foo.c', 'line', 3)").unwrap();
        assert_eq!(
            v,
            Value::Tuple(vec!["foo.c".into(), "line".into(), Value::Int(3)])
        );
    }

    #[test]
    fn parse_mixed_args() {
        let args = parse_args("('a', 'b', 1), 0.5, True, None, ('(', '+1)')").unwrap();
        assert_eq!(args.len(), 5);
        assert_eq!(args[1], Value::Float(0.5));
        assert_eq!(args[2], Value::Bool(true));
        assert_eq!(args[3], Value::None);
        assert_eq!(args[4].to_string(), "('(', '+1)')");
    }

    #[test]
    fn float_keeps_decimal_point() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(parse_value("2.0").unwrap(), Value::Float(2.0));
    }

    #[test]
    fn single_item_tuple_has_trailing_comma() {
        let v = Value::Tuple(vec![Value::Int(1)]);
        assert_eq!(v.to_string(), "(1,)");
        assert_eq!(parse_value("(1,)").unwrap(), v);
    }

    #[test]
    fn escaped_strings_roundtrip() {
        let s = "tab\there\nnew 'q' \\ end";
        let v = Value::Str(s.to_string());
        assert_eq!(parse_value(&v.to_string()).unwrap(), v);
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_value("'a' b").is_err());
        assert!(parse_value("('a', 1").is_err());
    }
}
