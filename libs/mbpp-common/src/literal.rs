/// Python list-literal reader and writer
///
/// MBPP ships `test_list` either as a real sequence or as the `repr()` of a
/// Python list of strings. This module reads the latter back into owned
/// strings and renders lists in the same notation for the results file.
///
/// Accepted grammar (a strict subset of what `ast.literal_eval` takes):
/// - a list `[...]` or tuple `(...)` of string literals, trailing comma allowed
/// - single, double and triple quoted strings
/// - `r`/`u` prefixes (case-insensitive), raw strings keep backslashes
/// - adjacent literals concatenate, as in Python
/// - escapes: `\\ \' \" \n \r \t \a \b \f \v \0 \xhh \uXXXX \UXXXXXXXX`,
///   backslash-newline continuation; unknown escapes are kept verbatim

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LiteralError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected character {found:?} at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),
    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),
    #[error("trailing characters after literal at offset {0}")]
    TrailingInput(usize),
}

struct Reader {
    chars: Vec<(usize, char)>,
    pos: usize,
    len: usize,
}

impl Reader {
    fn new(src: &str) -> Self {
        Self {
            chars: src.char_indices().collect(),
            pos: 0,
            len: src.len(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars.get(self.pos).map(|&(o, _)| o).unwrap_or(self.len)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '\\' && self.peek_at(1) == Some('\n') {
                self.pos += 2;
            } else {
                break;
            }
        }
    }

    fn unexpected(&self) -> LiteralError {
        match self.peek() {
            Some(found) => LiteralError::Unexpected {
                found,
                offset: self.offset(),
            },
            None => LiteralError::UnexpectedEof,
        }
    }

    fn starts_string(&self) -> bool {
        match self.peek() {
            Some('\'') | Some('"') => true,
            Some(c) if matches!(c, 'r' | 'R' | 'u' | 'U') => {
                matches!(self.peek_at(1), Some('\'') | Some('"'))
                    || (matches!(self.peek_at(1), Some('r' | 'R' | 'u' | 'U'))
                        && matches!(self.peek_at(2), Some('\'') | Some('"')))
            }
            _ => false,
        }
    }

    fn read_sequence(&mut self) -> Result<Vec<String>, LiteralError> {
        self.skip_ws();
        let close = match self.bump() {
            Some('[') => ']',
            Some('(') => ')',
            Some(found) => {
                self.pos -= 1;
                return Err(LiteralError::Unexpected {
                    found,
                    offset: self.offset(),
                });
            }
            None => return Err(LiteralError::UnexpectedEof),
        };

        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                break;
            }
            items.push(self.read_concatenated()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                Some(c) if c == close => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.unexpected()),
            }
        }
        Ok(items)
    }

    fn read_concatenated(&mut self) -> Result<String, LiteralError> {
        if !self.starts_string() {
            return Err(self.unexpected());
        }
        let mut out = self.read_string()?;
        loop {
            self.skip_ws();
            if self.starts_string() {
                out.push_str(&self.read_string()?);
            } else {
                return Ok(out);
            }
        }
    }

    fn read_string(&mut self) -> Result<String, LiteralError> {
        let start = self.offset();
        let mut raw = false;
        while let Some(c) = self.peek() {
            match c {
                'r' | 'R' => {
                    raw = true;
                    self.pos += 1;
                }
                'u' | 'U' => self.pos += 1,
                _ => break,
            }
        }

        let quote = self.bump().ok_or(LiteralError::UnexpectedEof)?;
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            let c = self.bump().ok_or(LiteralError::UnterminatedString(start))?;
            if c == quote {
                if !triple {
                    return Ok(out);
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.pos += 2;
                    return Ok(out);
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(LiteralError::UnterminatedString(start));
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            let escape_offset = self.offset();
            let next = self.bump().ok_or(LiteralError::UnterminatedString(start))?;
            if raw {
                out.push('\\');
                out.push(next);
                continue;
            }
            match next {
                '\n' => {}
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                'a' => out.push('\u{07}'),
                'b' => out.push('\u{08}'),
                'f' => out.push('\u{0c}'),
                'v' => out.push('\u{0b}'),
                '0'..='7' => {
                    let mut value = next.to_digit(8).unwrap_or(0);
                    for _ in 0..2 {
                        match self.peek().and_then(|d| d.to_digit(8)) {
                            Some(d) => {
                                value = value * 8 + d;
                                self.pos += 1;
                            }
                            None => break,
                        }
                    }
                    out.push(char::from_u32(value).ok_or(LiteralError::InvalidEscape(escape_offset))?);
                }
                'x' => out.push(self.read_hex(2, escape_offset)?),
                'u' => out.push(self.read_hex(4, escape_offset)?),
                'U' => out.push(self.read_hex(8, escape_offset)?),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    fn read_hex(&mut self, digits: usize, escape_offset: usize) -> Result<char, LiteralError> {
        let mut value = 0u32;
        for _ in 0..digits {
            let d = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or(LiteralError::InvalidEscape(escape_offset))?;
            value = value * 16 + d;
        }
        char::from_u32(value).ok_or(LiteralError::InvalidEscape(escape_offset))
    }
}

/// Parse the `repr()` of a Python list (or tuple) of strings
pub fn parse_string_list(src: &str) -> Result<Vec<String>, LiteralError> {
    let mut reader = Reader::new(src);
    let items = reader.read_sequence()?;
    reader.skip_ws();
    if reader.peek().is_some() {
        return Err(LiteralError::TrailingInput(reader.offset()));
    }
    Ok(items)
}

/// Render a string the way Python's `repr()` does
pub fn quote_string(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Render a list of strings the way Python's `repr()` does
pub fn format_string_list(items: &[String]) -> String {
    let inner: Vec<String> = items.iter().map(|s| quote_string(s)).collect();
    format!("[{}]", inner.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mbpp_style_list() {
        let src = r#"['assert add(2,3)==5', 'assert add(-1,1)==0']"#;
        assert_eq!(
            parse_string_list(src).unwrap(),
            vec!["assert add(2,3)==5", "assert add(-1,1)==0"]
        );
    }

    #[test]
    fn test_parse_empty_and_trailing_comma() {
        assert!(parse_string_list("[]").unwrap().is_empty());
        assert!(parse_string_list("  [ ]  ").unwrap().is_empty());
        assert_eq!(parse_string_list("['a',]").unwrap(), vec!["a"]);
        assert_eq!(parse_string_list("('a', \"b\")").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_mixed_quotes_and_escapes() {
        let src = r#"["assert f('x') == \"y\"", 'line\nbreak', 'tab\there', 'it\'s']"#;
        assert_eq!(
            parse_string_list(src).unwrap(),
            vec![
                "assert f('x') == \"y\"",
                "line\nbreak",
                "tab\there",
                "it's"
            ]
        );
    }

    #[test]
    fn test_parse_hex_unicode_and_raw() {
        assert_eq!(parse_string_list(r"['\x41é']").unwrap(), vec!["Aé"]);
        assert_eq!(parse_string_list(r"[r'\d+']").unwrap(), vec![r"\d+"]);
        // Unknown escapes survive verbatim, like Python
        assert_eq!(parse_string_list(r"['\d']").unwrap(), vec![r"\d"]);
    }

    #[test]
    fn test_parse_triple_and_concatenated() {
        assert_eq!(
            parse_string_list("['''a 'quoted'\nline''', 'x' \"y\"]").unwrap(),
            vec!["a 'quoted'\nline", "xy"]
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            parse_string_list("['unterminated"),
            Err(LiteralError::UnterminatedString(1))
        ));
        assert!(matches!(
            parse_string_list("[1, 2]"),
            Err(LiteralError::Unexpected { found: '1', .. })
        ));
        assert!(matches!(
            parse_string_list("['a'] extra"),
            Err(LiteralError::TrailingInput(_))
        ));
        assert!(matches!(parse_string_list("assert x"), Err(LiteralError::Unexpected { .. })));
        assert_eq!(parse_string_list("['a'"), Err(LiteralError::UnexpectedEof));
    }

    #[test]
    fn test_quote_string_matches_python_repr() {
        assert_eq!(quote_string("abc"), "'abc'");
        assert_eq!(quote_string("it's"), "\"it's\"");
        assert_eq!(quote_string("both ' and \""), "'both \\' and \"'");
        assert_eq!(quote_string("a\\b\n"), "'a\\\\b\\n'");
    }

    #[test]
    fn test_format_is_readable_by_parser() {
        let tests = vec![
            "assert f(\"it's\") == 1".to_string(),
            "assert g('\\n') == '\\t'".to_string(),
        ];
        let rendered = format_string_list(&tests);
        assert_eq!(parse_string_list(&rendered).unwrap(), tests);
    }
}
