//! `$search` grammar: terms, `"quoted phrases"`, `AND` / `OR` / `NOT`,
//! parentheses, and implicit `AND` between adjacent terms.

use crate::errors::{ODataError, Result};
use crate::kind::QueryOptionKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchExpr {
    Term(String),
    Phrase(String),
    And(Box<SearchExpr>, Box<SearchExpr>),
    Or(Box<SearchExpr>, Box<SearchExpr>),
    Not(Box<SearchExpr>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Not,
    Word(String),
    Phrase(String),
}

fn err(message: impl Into<String>) -> ODataError {
    ODataError::parse(QueryOptionKind::Search, message)
}

fn tokenize(raw: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '"' => {
                chars.next();
                let mut phrase = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => phrase.push(escaped),
                            None => return Err(err("dangling escape in phrase")),
                        },
                        Some('"') => break,
                        Some(ch) => phrase.push(ch),
                        None => return Err(err("unterminated phrase")),
                    }
                }
                if phrase.is_empty() {
                    return Err(err("empty phrase"));
                }
                tokens.push(Token::Phrase(phrase));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || ch == '(' || ch == ')' || ch == '"' {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(match word.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    _ => Token::Word(word),
                });
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn or_expr(&mut self) -> Result<SearchExpr> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = SearchExpr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<SearchExpr> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.pos += 1;
                }
                Some(Token::Word(_) | Token::Phrase(_) | Token::Not | Token::Open) => {}
                _ => break,
            }
            let rhs = self.unary()?;
            lhs = SearchExpr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<SearchExpr> {
        match self.bump() {
            Some(Token::Not) => Ok(SearchExpr::Not(Box::new(self.unary()?))),
            Some(Token::Open) => {
                let inner = self.or_expr()?;
                match self.bump() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(err("missing ')'")),
                }
            }
            Some(Token::Word(w)) => Ok(SearchExpr::Term(w)),
            Some(Token::Phrase(p)) => Ok(SearchExpr::Phrase(p)),
            Some(other) => Err(err(format!("unexpected {other:?}"))),
            None => Err(err("unexpected end of search expression")),
        }
    }
}

pub(super) fn parse(raw: &str) -> Result<SearchExpr> {
    let tokens = tokenize(raw)?;
    if tokens.is_empty() {
        return Err(err("empty search expression"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if let Some(extra) = parser.peek() {
        return Err(err(format!("unexpected {extra:?} after search expression")));
    }
    Ok(expr)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn term(s: &str) -> Box<SearchExpr> {
        Box::new(SearchExpr::Term(s.to_owned()))
    }

    #[test]
    fn adjacent_terms_are_conjunctive() {
        assert_eq!(
            parse("blue green").unwrap(),
            SearchExpr::And(term("blue"), term("green"))
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        assert_eq!(
            parse("a OR b AND NOT c").unwrap(),
            SearchExpr::Or(
                term("a"),
                Box::new(SearchExpr::And(term("b"), Box::new(SearchExpr::Not(term("c"))))),
            )
        );
    }

    #[test]
    fn phrases_and_groups() {
        assert_eq!(
            parse("(\"light blue\" OR navy) shirt").unwrap(),
            SearchExpr::And(
                Box::new(SearchExpr::Or(
                    Box::new(SearchExpr::Phrase("light blue".to_owned())),
                    term("navy"),
                )),
                term("shirt"),
            )
        );
    }

    #[test]
    fn malformed_input_fails() {
        assert!(parse("").is_err());
        assert!(parse("(a OR b").is_err());
        assert!(parse("a OR").is_err());
        assert!(parse("\"open").is_err());
        assert!(parse("a)").is_err());
    }
}
