//! Rate API body parsing
//!
//! The rate API does not answer with JSON. Its body is a bracketed list of
//! dict literals such as
//!
//! ```text
//! [{'prefix': 32, 'retail_rate': 0.025, 'prefix__destination': u'Belgium'}]
//! ```
//!
//! sometimes wrapped once more as a JSON string. Strings may use single or
//! double quotes with an optional `u` prefix; bare values are numbers (with
//! an optional `L` suffix), `None`, `True`, `False`, or `Decimal('...')`.
//!
//! # Examples
//!
//! ```
//! use voipbill_rates::parser::parse_rate_list;
//!
//! let rows = parse_rate_list("[{'prefix': 32, 'retail_rate': 0.025, 'prefix__destination': 'Belgium'}]").unwrap();
//! assert_eq!(rows[0].destination, "Belgium");
//! assert_eq!(rows[0].retail_rate, "0.025");
//! ```

use std::collections::HashMap;
use voipbill_core::error::{BillingError, Result};
use voipbill_core::types::RateRow;

/// A scalar inside a dict literal
#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Str(String),
    Num(String),
    Bool(bool),
    None,
}

impl Literal {
    fn into_text(self) -> String {
        match self {
            Literal::Str(s) | Literal::Num(s) => s,
            Literal::Bool(true) => "True".to_string(),
            Literal::Bool(false) => "False".to_string(),
            Literal::None => String::new(),
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> BillingError {
        BillingError::RateParse {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => {
                self.pos -= c.len_utf8();
                Err(self.error(format!("expected '{expected}', found '{c}'")))
            }
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.src.len()
    }

    fn parse_list(&mut self) -> Result<Vec<HashMap<String, Literal>>> {
        let mut dicts = Vec::new();
        self.skip_ws();
        let bracketed = self.peek() == Some('[');
        if bracketed {
            self.bump();
        }

        loop {
            self.skip_ws();
            match self.peek() {
                Some(']') if bracketed => {
                    self.bump();
                    break;
                }
                None if !bracketed => break,
                None => return Err(self.error("unterminated list")),
                _ => {}
            }

            dicts.push(self.parse_dict()?);

            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') if bracketed => {}
                None if !bracketed => {}
                Some(c) => return Err(self.error(format!("unexpected '{c}' after dict"))),
                None => return Err(self.error("unterminated list")),
            }
        }

        if !self.at_end() {
            return Err(self.error("trailing characters after list"));
        }
        Ok(dicts)
    }

    fn parse_dict(&mut self) -> Result<HashMap<String, Literal>> {
        let mut dict = HashMap::new();
        self.expect('{')?;
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(dict);
            }

            let key = match self.parse_literal()? {
                Literal::Str(s) => s,
                other => return Err(self.error(format!("dict key must be a string, got {other:?}"))),
            };
            self.expect(':')?;
            let value = self.parse_literal()?;
            dict.insert(key, value);

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(dict),
                Some(c) => {
                    self.pos -= c.len_utf8();
                    return Err(self.error(format!("expected ',' or '}}', found '{c}'")));
                }
                None => return Err(self.error("unterminated dict")),
            }
        }
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        self.skip_ws();
        match self.peek() {
            Some('\'') | Some('"') => self.parse_string().map(Literal::Str),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_word(),
            Some(c) => Err(self.error(format!("unexpected '{c}'"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_word(&mut self) -> Result<Literal> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let word = &self.src[start..self.pos];

        // String prefixes such as u'...' or b"..."
        if matches!(self.peek(), Some('\'') | Some('"'))
            && word.len() <= 2
            && word.chars().all(|c| matches!(c, 'u' | 'U' | 'b' | 'B' | 'r' | 'R'))
        {
            return self.parse_string().map(Literal::Str);
        }

        match word {
            "None" => Ok(Literal::None),
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            "Decimal" => {
                self.expect('(')?;
                let inner = match self.parse_literal()? {
                    Literal::Str(s) | Literal::Num(s) => s,
                    other => return Err(self.error(format!("bad Decimal argument {other:?}"))),
                };
                self.expect(')')?;
                Ok(Literal::Num(inner))
            }
            _ => {
                self.pos = start;
                Err(self.error(format!("unknown identifier '{word}'")))
            }
        }
    }

    fn parse_number(&mut self) -> Result<Literal> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                self.bump();
            } else {
                break;
            }
        }
        let text = self.src[start..self.pos].to_string();
        // Python 2 long suffix
        if matches!(self.peek(), Some('L') | Some('l')) {
            self.bump();
        }
        if text.parse::<f64>().is_err() {
            self.pos = start;
            return Err(self.error(format!("invalid number '{text}'")));
        }
        Ok(Literal::Num(text))
    }

    fn parse_string(&mut self) -> Result<String> {
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected string")),
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escaped = self.bump().ok_or_else(|| self.error("dangling escape"))?;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '\\' | '\'' | '"' => out.push(escaped),
                        'x' => out.push(self.parse_hex_escape(2)?),
                        'u' => out.push(self.parse_hex_escape(4)?),
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Result<char> {
        let start = self.pos;
        let end = start + digits;
        let hex = self
            .src
            .get(start..end)
            .ok_or_else(|| self.error("truncated escape"))?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid hex escape"))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }
}

fn dict_to_row(mut dict: HashMap<String, Literal>, index: usize) -> Result<RateRow> {
    let mut take = |keys: &[&str]| -> Result<String> {
        keys.iter()
            .find_map(|k| dict.remove(*k))
            .map(Literal::into_text)
            .ok_or_else(|| BillingError::RateParse {
                offset: index,
                message: format!("rate #{index} is missing '{}'", keys[0]),
            })
    };
    Ok(RateRow {
        prefix: take(&["prefix"])?,
        destination: take(&["prefix__destination", "destination"])?,
        retail_rate: take(&["retail_rate"])?,
    })
}

/// Parse a rate API body into rate rows
///
/// An empty body or an empty list yields no rows.
pub fn parse_rate_list(body: &str) -> Result<Vec<RateRow>> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    // Some deployments serialize the listing once more as a JSON string
    let unwrapped;
    let source = if trimmed.starts_with('"') {
        unwrapped = serde_json::from_str::<String>(trimmed)?;
        unwrapped.as_str()
    } else {
        trimmed
    };

    let dicts = Parser::new(source).parse_list()?;
    dicts
        .into_iter()
        .enumerate()
        .map(|(index, dict)| dict_to_row(dict, index))
        .collect()
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn bare_or_quoted(s: &str) -> String {
    if !s.is_empty() && s.parse::<f64>().is_ok() {
        s.to_string()
    } else {
        quote(s)
    }
}

/// Encode rate rows in the rate API body format
pub fn encode_rate_list(rows: &[RateRow]) -> String {
    let items: Vec<String> = rows
        .iter()
        .map(|row| {
            format!(
                "{{'prefix': {}, 'retail_rate': {}, 'prefix__destination': {}}}",
                bare_or_quoted(&row.prefix),
                bare_or_quoted(&row.retail_rate),
                quote(&row.destination)
            )
        })
        .collect();
    format!("[{}]", items.join(", "))
}
