//! Conversions from CQL terms to SQL sub-languages.
//!
//! CQL masks `* ? ^ \` with a backslash; SQL LIKE masks `\ % _`, POSIX
//! regexps mask their own metacharacters, and tsquery text must not contain
//! the `&`/`'` characters that would change its meaning. Each function here
//! is a single pass over the input with a single-level backslash state: two
//! consecutive backslashes collapse to one literal backslash.
//!
//! The output never contains an unbalanced single quote, so embedding it in
//! a `'...'` SQL literal cannot terminate the literal early.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{QueryError, QueryResult};

/// PostgreSQL numeric constant, see
/// <https://www.postgresql.org/docs/current/sql-syntax-lexical.html#SQL-SYNTAX-CONSTANTS-NUMERIC>
static POSTGRES_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+|\d+\.\d*|\.\d+)([eE][+-]?\d+)?$").unwrap());

/// Converts a CQL string to an SQL LIKE pattern.
///
/// `*` and `?` become `%` and `_`; literal `%` and `_` are masked; `'` is
/// doubled. A backslash-masked wildcard stays masked (`\*` matches a
/// literal asterisk). A single backslash at the end is an error in CQL but
/// is handled gracefully by matching one literal backslash.
pub fn to_like_pattern(s: &str) -> String {
    let mut like = String::with_capacity(s.len() + 8);
    // true if the previous character is an escaping backslash
    let mut backslash = false;
    for c in s.chars() {
        match c {
            '\\' => {
                if backslash {
                    like.push_str("\\\\");
                    backslash = false;
                } else {
                    backslash = true;
                }
            }
            '%' | '_' => {
                like.push('\\');
                like.push(c);
                backslash = false;
            }
            '?' => {
                if backslash {
                    like.push_str("\\?");
                    backslash = false;
                } else {
                    like.push('_');
                }
            }
            '*' => {
                if backslash {
                    like.push_str("\\*");
                    backslash = false;
                } else {
                    like.push('%');
                }
            }
            '\'' => {
                like.push_str("''");
                backslash = false;
            }
            _ => {
                like.push(c);
                backslash = false;
            }
        }
    }
    if backslash {
        like.push_str("\\\\");
    }
    like
}

/// Converts a CQL string to the content of an SQL string constant.
///
/// `*`, `?` and `^` are reserved CQL operators: an unescaped occurrence is
/// an error because this conversion is only used where a plain literal is
/// expected. An unterminated trailing backslash is an error as well.
pub fn to_string_literal(s: &str) -> QueryResult<String> {
    let mut literal = String::with_capacity(s.len() + 2);
    let mut backslash = false;
    for c in s.chars() {
        match c {
            '\\' => {
                if backslash {
                    literal.push('\\');
                    backslash = false;
                } else {
                    backslash = true;
                }
            }
            '*' | '?' | '^' => {
                if backslash {
                    literal.push(c);
                    backslash = false;
                } else {
                    return Err(QueryError::UnsupportedQueryOperator {
                        operator: c,
                        term: s.to_string(),
                    });
                }
            }
            '\'' => {
                literal.push_str("''");
                backslash = false;
            }
            _ => {
                literal.push(c);
                backslash = false;
            }
        }
    }
    if backslash {
        return Err(QueryError::MalformedEscape {
            term: s.to_string(),
        });
    }
    Ok(literal)
}

/// Converts a CQL string to a POSIX regexp for the `~` operator.
///
/// `?` becomes `.`, `*` becomes `.*`, and an unescaped `^` becomes `(^|$)`
/// because CQL anchors either end of the string. Regexp metacharacters
/// present literally are masked; `'` is doubled.
pub fn to_regexp(s: &str) -> String {
    let mut regexp = String::with_capacity(s.len() + 8);
    let mut backslash = false;
    for c in s.chars() {
        match c {
            '\\' => {
                if backslash {
                    regexp.push_str("\\\\");
                    backslash = false;
                } else {
                    backslash = true;
                }
            }
            '.' | '+' | '(' | ')' | '{' | '}' | '[' | ']' | '$' => {
                regexp.push('\\');
                regexp.push(c);
                backslash = false;
            }
            '?' => {
                if backslash {
                    regexp.push_str("\\?");
                    backslash = false;
                } else {
                    regexp.push('.');
                }
            }
            '*' => {
                if backslash {
                    regexp.push_str("\\*");
                    backslash = false;
                } else {
                    regexp.push_str(".*");
                }
            }
            '\'' => {
                regexp.push_str("''");
                backslash = false;
            }
            '^' => {
                if backslash {
                    regexp.push_str("\\^");
                    backslash = false;
                } else {
                    regexp.push_str("(^|$)");
                }
            }
            _ => {
                regexp.push(c);
                backslash = false;
            }
        }
    }
    if backslash {
        regexp.push_str("\\\\");
    }
    regexp
}

/// Converts a CQL string to a tsquery expression where all words must match.
///
/// Words are whitespace-separated; each becomes a quoted tsquery lexeme,
/// and the lexemes are joined with `&`. A `*` at the end of a word turns
/// into `:*` right-hand truncation. `&` and `'` inside a word become `,`, a
/// plain word separator, so they can neither act as tsquery operators nor
/// terminate the surrounding SQL literal.
pub fn to_tsquery_and(s: &str, remove_accents: bool) -> QueryResult<String> {
    let words = ts_words(s)?;
    let mut literal = String::with_capacity(s.len() + 16);
    for (i, (word, truncated)) in words.iter().enumerate() {
        if i != 0 {
            literal.push_str(" & ");
        }
        literal.push_str("''");
        literal.push_str(word);
        literal.push_str("''");
        if *truncated {
            literal.push_str(":*");
        }
    }
    if remove_accents {
        Ok(format!("to_tsquery('simple', f_unaccent('{literal}'))"))
    } else {
        Ok(format!("to_tsquery('simple', ('{literal}'))"))
    }
}

/// Converts a CQL string to a tsquery expression where any word may match.
///
/// Derived from the AND form by a textual operator substitution so that all
/// three variants tokenize identically.
pub fn to_tsquery_or(s: &str, remove_accents: bool) -> QueryResult<String> {
    Ok(replace_tsquery_operator(
        &to_tsquery_and(s, remove_accents)?,
        "|",
    ))
}

/// Converts a CQL string to a tsquery phrase expression where the words
/// must match adjacently and in order.
pub fn to_tsquery_phrase(s: &str, remove_accents: bool) -> QueryResult<String> {
    Ok(replace_tsquery_operator(
        &to_tsquery_and(s, remove_accents)?,
        "<->",
    ))
}

fn replace_tsquery_operator(and_form: &str, operator: &str) -> String {
    format!("replace(({and_form})::text, '&', '{operator}')::tsquery")
}

/// Splits a full-text term into words with per-word truncation flags.
///
/// Rejects unescaped `?` and `^` (the `simple` configuration supports
/// neither single-character masks nor anchors) and `*` anywhere but at the
/// end of a word. A stand-alone `*` word is dropped. A backslash-escaped
/// whitespace character stays inside the word.
fn ts_words(s: &str) -> QueryResult<Vec<(String, bool)>> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut backslash = false;
    let mut truncated = false;
    for c in s.chars() {
        if truncated && !c.is_whitespace() {
            return Err(QueryError::UnsupportedQueryOperator {
                operator: '*',
                term: s.to_string(),
            });
        }
        match c {
            _ if c.is_whitespace() => {
                if backslash {
                    word.push(c);
                    backslash = false;
                } else {
                    if !word.is_empty() {
                        words.push((std::mem::take(&mut word), truncated));
                    }
                    truncated = false;
                }
            }
            '\\' => {
                if backslash {
                    word.push('\\');
                    backslash = false;
                } else {
                    backslash = true;
                }
            }
            '?' | '^' => {
                if backslash {
                    word.push(c);
                    backslash = false;
                } else {
                    return Err(QueryError::UnsupportedQueryOperator {
                        operator: c,
                        term: s.to_string(),
                    });
                }
            }
            '*' => {
                if backslash {
                    word.push('*');
                    backslash = false;
                } else {
                    truncated = true;
                }
            }
            '&' | '\'' => {
                word.push(',');
                backslash = false;
            }
            _ => {
                word.push(c);
                backslash = false;
            }
        }
    }
    if backslash {
        return Err(QueryError::MalformedEscape {
            term: s.to_string(),
        });
    }
    if !word.is_empty() {
        words.push((word, truncated));
    }
    Ok(words)
}

/// Reports whether `s` contains an unescaped `*` or `?` wildcard.
///
/// One scan with one backslash state, so `\\*` is a wildcard following a
/// literal backslash while `\*` is a masked literal asterisk.
pub fn has_cql_wildcard(s: &str) -> bool {
    let mut backslash = false;
    for c in s.chars() {
        match c {
            '\\' => backslash = !backslash,
            '*' | '?' if !backslash => return true,
            _ => backslash = false,
        }
    }
    false
}

/// Tests whether `s` is for sure a syntactically correct SQL number.
///
/// PostgreSQL also parses `1e` but that may change in the future.
pub fn is_postgres_number(s: &str) -> bool {
    POSTGRES_NUMBER.is_match(s)
}
