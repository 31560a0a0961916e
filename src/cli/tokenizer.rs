//! Quoted-value reader over the raw argument list.
//!
//! Shells normally strip quotes, but arguments forwarded through wrappers
//! (scripts, `cmd.exe`, CI runners) can arrive split on spaces with the quote
//! characters still attached. The reader stitches those back together.

use crate::error::ParseError;

/// Prefix that marks an option name
pub const OPTION_PREFIX: &str = "--";

const QUOTE: char = '"';

/// Outcome of reading one logical value at an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueRead {
    /// A value was produced; `next` is the first unconsumed index
    Value { value: String, next: usize },
    /// The token at the index is an option name and was not consumed
    Option,
    /// The index is past the end of the argument list
    End,
}

enum State {
    Normal,
    InQuote { start: usize, buf: String },
}

/// Read the logical value beginning at `start`.
///
/// A token starting with `"` opens a quoted value that runs until a token
/// ending with `"`. The pieces are rejoined with single spaces and the outer
/// quotes are stripped.
pub fn read_value(args: &[String], start: usize) -> Result<ValueRead, ParseError> {
    let mut state = State::Normal;
    let mut i = start;

    loop {
        let Some(token) = args.get(i) else {
            return match state {
                State::Normal => Ok(ValueRead::End),
                State::InQuote { start, .. } => Err(ParseError::UnterminatedQuote { start }),
            };
        };

        state = match state {
            State::Normal => {
                if token.starts_with(OPTION_PREFIX) {
                    return Ok(ValueRead::Option);
                }
                if !token.starts_with(QUOTE) {
                    return Ok(ValueRead::Value {
                        value: token.clone(),
                        next: i + 1,
                    });
                }
                if closes_quote(token, true) {
                    return Ok(ValueRead::Value {
                        value: strip_quotes(token),
                        next: i + 1,
                    });
                }
                State::InQuote {
                    start: i,
                    buf: token.clone(),
                }
            }
            State::InQuote { start, mut buf } => {
                buf.push(' ');
                buf.push_str(token);
                if closes_quote(token, false) {
                    return Ok(ValueRead::Value {
                        value: strip_quotes(&buf),
                        next: i + 1,
                    });
                }
                State::InQuote { start, buf }
            }
        };
        i += 1;
    }
}

/// The opening token needs its own closing quote in addition to the opening one
fn closes_quote(token: &str, is_opening: bool) -> bool {
    let min_len = if is_opening { 2 } else { 1 };
    token.len() >= min_len && token.ends_with(QUOTE)
}

fn strip_quotes(s: &str) -> String {
    s[1..s.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plain_token() {
        let a = args(&["sql", "Server=x"]);
        assert_eq!(
            read_value(&a, 1).unwrap(),
            ValueRead::Value {
                value: "Server=x".to_string(),
                next: 2
            }
        );
    }

    #[test]
    fn test_quoted_value_spanning_tokens() {
        let a = args(&["\"a", "b", "c\"", "--key-filter", "x"]);
        assert_eq!(
            read_value(&a, 0).unwrap(),
            ValueRead::Value {
                value: "a b c".to_string(),
                next: 3
            }
        );
    }

    #[test]
    fn test_self_closing_quote() {
        let a = args(&["\"prod\""]);
        assert_eq!(
            read_value(&a, 0).unwrap(),
            ValueRead::Value {
                value: "prod".to_string(),
                next: 1
            }
        );
    }

    #[test]
    fn test_empty_quoted_value() {
        let a = args(&["\"\""]);
        assert_eq!(
            read_value(&a, 0).unwrap(),
            ValueRead::Value {
                value: String::new(),
                next: 1
            }
        );
    }

    #[test]
    fn test_lone_quote_opens() {
        let a = args(&["\"", "a", "\""]);
        assert_eq!(
            read_value(&a, 0).unwrap(),
            ValueRead::Value {
                value: " a ".to_string(),
                next: 3
            }
        );
    }

    #[test]
    fn test_option_is_pushed_back() {
        let a = args(&["--label-filter", "prod"]);
        assert_eq!(read_value(&a, 0).unwrap(), ValueRead::Option);
    }

    #[test]
    fn test_option_prefix_inside_quotes_is_literal() {
        let a = args(&["\"x", "--y\""]);
        assert_eq!(
            read_value(&a, 0).unwrap(),
            ValueRead::Value {
                value: "x --y".to_string(),
                next: 2
            }
        );
    }

    #[test]
    fn test_end_of_input() {
        let a = args(&["sql"]);
        assert_eq!(read_value(&a, 1).unwrap(), ValueRead::End);
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        let a = args(&["sql", "\"Server=x;", "Database=y"]);
        assert_eq!(
            read_value(&a, 1).unwrap_err(),
            ParseError::UnterminatedQuote { start: 1 }
        );
    }

    #[test]
    fn test_next_index_always_advances() {
        let a = args(&["a", "\"b", "c\"", "\"d\"", "e"]);
        let mut i = 0;
        while let ValueRead::Value { next, .. } = read_value(&a, i).unwrap() {
            assert!(next > i);
            i = next;
        }
        assert_eq!(i, a.len());
    }
}
