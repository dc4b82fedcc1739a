//! Tokenizer for resolver expressions.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Eof,
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, ExprError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            '.' => Some(Token::Dot),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push(Spanned { token, pos });
            i += 1;
            continue;
        }

        if c == '\'' || c == '"' {
            let (text, next) = lex_string(&chars, i, c)?;
            tokens.push(Spanned {
                token: Token::Str(text),
                pos,
            });
            i = next;
            continue;
        }

        if c.is_ascii_digit() {
            let (token, next) = lex_number(src, &chars, i)?;
            tokens.push(Spanned { token, pos });
            i = next;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().map(|(_, c)| c).collect();
            tokens.push(Spanned {
                token: Token::Ident(ident),
                pos,
            });
            continue;
        }

        return Err(ExprError::syntax(pos, format!("unexpected character '{}'", c)));
    }

    tokens.push(Spanned {
        token: Token::Eof,
        pos: src.len(),
    });
    Ok(tokens)
}

fn lex_string(chars: &[(usize, char)], start: usize, quote: char) -> Result<(String, usize), ExprError> {
    let mut text = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let (pos, c) = chars[i];
        match c {
            c if c == quote => return Ok((text, i + 1)),
            '\\' => {
                let Some(&(_, escaped)) = chars.get(i + 1) else {
                    return Err(ExprError::syntax(pos, "dangling escape"));
                };
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '\\' => '\\',
                    '\'' => '\'',
                    '"' => '"',
                    other => {
                        return Err(ExprError::syntax(pos, format!("unknown escape '\\{}'", other)));
                    }
                });
                i += 2;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }

    Err(ExprError::syntax(chars[start].0, "unterminated string"))
}

fn lex_number(src: &str, chars: &[(usize, char)], start: usize) -> Result<(Token, usize), ExprError> {
    let digits = |mut i: usize| {
        while i < chars.len() && chars[i].1.is_ascii_digit() {
            i += 1;
        }
        i
    };
    let at = |i: usize| chars.get(i).map(|(_, c)| *c);

    let mut i = digits(start);
    let mut is_float = false;

    // `1.5` is a float, `1.x` is an int followed by attribute access
    if at(i) == Some('.') && at(i + 1).is_some_and(|c| c.is_ascii_digit()) {
        is_float = true;
        i = digits(i + 1);
    }
    if matches!(at(i), Some('e') | Some('E')) {
        let mut j = i + 1;
        if matches!(at(j), Some('+') | Some('-')) {
            j += 1;
        }
        if at(j).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            i = digits(j);
        }
    }

    let begin = chars[start].0;
    let end = chars.get(i).map(|(p, _)| *p).unwrap_or(src.len());
    let text = &src[begin..end];

    let token = if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| ExprError::syntax(begin, format!("invalid number '{}'", text)))?
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| ExprError::syntax(begin, format!("integer literal too large '{}'", text)))?
    };
    Ok((token, i))
}
