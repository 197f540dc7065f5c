//! SQL LIKE matching.
//!
//! `%` matches any run of characters (including none), `_` matches exactly
//! one, and `\` makes the following character literal. Matching is
//! case-sensitive over Unicode scalar values.

use alloc::vec::Vec;

#[derive(Clone, Copy, PartialEq)]
enum Token {
    Any,
    One,
    Lit(char),
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => Token::Any,
            '_' => Token::One,
            '\\' => Token::Lit(chars.next().unwrap_or('\\')),
            other => Token::Lit(other),
        });
    }
    tokens
}

/// Returns true when `value` matches the LIKE `pattern`.
///
/// ```
/// use resumedb_core::pattern_match::like;
/// assert!(like("hello", "h%o"));
/// assert!(like("hello", "_ello"));
/// assert!(like("50%", "50\\%"));
/// assert!(!like("hello", "world"));
/// ```
pub fn like(value: &str, pattern: &str) -> bool {
    let text: Vec<char> = value.chars().collect();
    let tokens = tokenize(pattern);

    // greedy scan remembering the last `%` to backtrack to
    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Any) => {
                star = Some((p, t));
                p += 1;
            }
            Some(Token::One) => {
                t += 1;
                p += 1;
            }
            Some(Token::Lit(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|tok| *tok == Token::Any)
}
