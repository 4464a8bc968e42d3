//! Tokenizer for attribute expressions.

use crate::expr::ExpressionError;

#[derive(Clone, Debug, PartialEq)]
pub enum Tok {
    Num(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    Comma,
    Dot,
    Semi,
    Question,
    Colon,
    Assign,
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Not,
    And,
    Or,
    Eof,
}

/// A token and the byte offset where it starts.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub pos: usize,
}

fn syntax(pos: usize, msg: impl Into<String>) -> ExpressionError {
    ExpressionError::Syntax {
        pos,
        msg: msg.into(),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Splits `src` into tokens, ending with [`Tok::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut out = Vec::new();
    let mut i = 0;
    let at = |i: usize| chars.get(i).map(|&(_, c)| c);
    while i < chars.len() {
        let (pos, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let (tok, len) = match c {
            '0'..='9' | '.' if c != '.' || at(i + 1).is_some_and(|d| d.is_ascii_digit()) => {
                let start = i;
                while at(i).is_some_and(|d| d.is_ascii_digit() || d == '.') {
                    i += 1;
                }
                if at(i).is_some_and(|d| d == 'e' || d == 'E') {
                    let mut j = i + 1;
                    if at(j).is_some_and(|d| d == '+' || d == '-') {
                        j += 1;
                    }
                    if at(j).is_some_and(|d| d.is_ascii_digit()) {
                        i = j;
                        while at(i).is_some_and(|d| d.is_ascii_digit()) {
                            i += 1;
                        }
                    }
                }
                let end = chars.get(i).map_or(src.len(), |&(p, _)| p);
                let text = &src[chars[start].0..end];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| syntax(pos, format!("malformed number `{text}`")))?;
                out.push(Token {
                    tok: Tok::Num(value),
                    pos,
                });
                continue;
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match at(i) {
                        None => return Err(syntax(pos, "unterminated string")),
                        Some(q) if q == quote => break,
                        Some('\\') => {
                            let escaped = at(i + 1).ok_or_else(|| syntax(pos, "unterminated string"))?;
                            s.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                            i += 2;
                        }
                        Some(ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                i += 1;
                out.push(Token { tok: Tok::Str(s), pos });
                continue;
            }
            c if is_ident_start(c) => {
                let start = i;
                while at(i).is_some_and(is_ident_char) {
                    i += 1;
                }
                let end = chars.get(i).map_or(src.len(), |&(p, _)| p);
                out.push(Token {
                    tok: Tok::Ident(src[chars[start].0..end].to_string()),
                    pos,
                });
                continue;
            }
            '(' => (Tok::LParen, 1),
            ')' => (Tok::RParen, 1),
            ',' => (Tok::Comma, 1),
            '.' => (Tok::Dot, 1),
            ';' => (Tok::Semi, 1),
            '?' => (Tok::Question, 1),
            ':' => (Tok::Colon, 1),
            '+' => (Tok::Plus, 1),
            '-' => (Tok::Minus, 1),
            '*' => (Tok::Star, 1),
            '/' => (Tok::Slash, 1),
            '%' => (Tok::Percent, 1),
            '=' => match (at(i + 1), at(i + 2)) {
                (Some('='), Some('=')) => (Tok::StrictEq, 3),
                (Some('='), _) => (Tok::Eq, 2),
                _ => (Tok::Assign, 1),
            },
            '!' => match (at(i + 1), at(i + 2)) {
                (Some('='), Some('=')) => (Tok::StrictNe, 3),
                (Some('='), _) => (Tok::Ne, 2),
                _ => (Tok::Not, 1),
            },
            '<' if at(i + 1) == Some('=') => (Tok::Le, 2),
            '<' => (Tok::Lt, 1),
            '>' if at(i + 1) == Some('=') => (Tok::Ge, 2),
            '>' => (Tok::Gt, 1),
            '&' if at(i + 1) == Some('&') => (Tok::And, 2),
            '|' if at(i + 1) == Some('|') => (Tok::Or, 2),
            other => return Err(syntax(pos, format!("unexpected character `{other}`"))),
        };
        out.push(Token { tok, pos });
        i += len;
    }
    out.push(Token {
        tok: Tok::Eof,
        pos: src.len(),
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn operators_and_literals() {
        assert_eq!(
            toks("a >= 1.5 && b !== 'x'"),
            vec![
                Tok::Ident("a".into()),
                Tok::Ge,
                Tok::Num(1.5),
                Tok::And,
                Tok::Ident("b".into()),
                Tok::StrictNe,
                Tok::Str("x".into()),
                Tok::Eof
            ]
        );
    }

    #[test]
    fn geometry_member_and_exponent() {
        assert_eq!(
            toks("$.area > 2e3"),
            vec![
                Tok::Ident("$".into()),
                Tok::Dot,
                Tok::Ident("area".into()),
                Tok::Gt,
                Tok::Num(2000.0),
                Tok::Eof
            ]
        );
    }

    #[test]
    fn bad_input_reports_position() {
        assert_eq!(
            tokenize("a # b"),
            Err(ExpressionError::Syntax {
                pos: 2,
                msg: "unexpected character `#`".into()
            })
        );
        assert!(tokenize("'open").is_err());
    }
}
