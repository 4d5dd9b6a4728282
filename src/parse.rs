//! Production rule set text import.
//!
//! # Format
//!
//! ```text
//! // one rule per transition
//! a & b -> c-
//! ~a | ~b -> c+
//! /* a bubbled group */
//! ~(x & y) | z -> w+
//! ```
//!
//! - `&` binds tighter than `|`, `~` binds tightest.
//! - `~name` is a negated literal, `~(...)` puts a bubble on the group.
//! - Rules end with the target name followed by `+` or `-`, optionally
//!   followed by `;`. Line breaks are not significant.
//! - `//` starts a line comment, `/* ... */` is a block comment.
//!
//! Export is the inverse [`RuleSet::display`][crate::rule::RuleSet::display].

use crate::error::{Error, Result};
use crate::expr::{Expr, ExprKind};
use crate::rule::{Rule, RuleSet};
use crate::types::Direction;
use crate::variable::VariableSet;

#[derive(Debug, Clone, Eq, PartialEq)]
enum Token {
    Ident(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
    Arrow,
    Plus,
    Minus,
    Semi,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']' | '\'')
}

fn tokenize(text: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        let token = match c {
            '\n' => {
                line += 1;
                continue;
            }
            c if c.is_whitespace() => continue,
            '/' => match chars.next() {
                Some('/') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            line += 1;
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    let start = line;
                    let mut prev = '\0';
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '\n' {
                            line += 1;
                        }
                        if prev == '*' && c == '/' {
                            closed = true;
                            break;
                        }
                        prev = c;
                    }
                    if !closed {
                        return Err(Error::Parse {
                            line: start,
                            message: "unterminated block comment".to_string(),
                        });
                    }
                    continue;
                }
                _ => {
                    return Err(Error::Parse {
                        line,
                        message: "unexpected '/'".to_string(),
                    })
                }
            },
            '&' => Token::And,
            '|' => Token::Or,
            '~' => Token::Not,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '+' => Token::Plus,
            ';' => Token::Semi,
            '-' => {
                if chars.peek() == Some(&'>') {
                    chars.next();
                    Token::Arrow
                } else {
                    Token::Minus
                }
            }
            c if is_ident_start(c) => {
                let mut name = String::from(c);
                while let Some(&c) = chars.peek() {
                    if !is_ident_char(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                Token::Ident(name)
            }
            c => {
                return Err(Error::Parse {
                    line,
                    message: format!("unexpected character '{}'", c),
                })
            }
        };
        tokens.push(Spanned { token, line });
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Spanned>,
    pos: usize,
    vars: &'a mut VariableSet,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |s| s.line)
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(Error::Parse {
            line: self.line(),
            message: message.into(),
        })
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            self.error(format!("expected {}", what))
        }
    }

    fn rule(&mut self) -> Result<Rule> {
        let guard = self.or_expr()?;
        self.expect(Token::Arrow, "'->'")?;
        let target = match self.advance() {
            Some(Token::Ident(name)) => self.vars.get_or_define(&name),
            _ => {
                self.pos -= 1;
                return self.error("expected target variable");
            }
        };
        let direction = match self.advance() {
            Some(Token::Plus) => Direction::Rise,
            Some(Token::Minus) => Direction::Fall,
            _ => {
                self.pos -= 1;
                return self.error("expected '+' or '-' after target");
            }
        };
        Ok(Rule::new(guard, target, direction))
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut operands = vec![self.and_expr()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            operands.push(self.and_expr()?);
        }
        if operands.len() == 1 {
            return Ok(operands.remove(0));
        }
        Expr::or(operands)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut operands = vec![self.unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            operands.push(self.unary()?);
        }
        if operands.len() == 1 {
            return Ok(operands.remove(0));
        }
        Expr::and(operands)
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Not) => {
                let group = self.peek() == Some(&Token::LParen);
                let operand = self.unary()?;
                Ok(invert(operand, group))
            }
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => Ok(Expr::var(self.vars.get_or_define(&name))),
            Some(_) => {
                self.pos -= 1;
                self.error("expected a literal or '('")
            }
            None => self.error("unexpected end of input"),
        }
    }
}

/// `~` on a group bubbles the group, `~` on a literal toggles its polarity.
fn invert(expr: Expr, group: bool) -> Expr {
    match expr.kind() {
        ExprKind::Literal(lit) if !group => {
            let mut out = Expr::literal(lit.var, !lit.negated);
            out.set_bubble(expr.bubble());
            out
        }
        _ => expr.not(),
    }
}

/// Parses a production rule set, defining every name it mentions in `vars`.
///
/// The resulting rule set is validated against `vars`.
pub fn parse_prs(text: &str, vars: &mut VariableSet) -> Result<RuleSet> {
    let mut rules = RuleSet::new();
    parse_prs_into(text, vars, &mut rules)?;
    Ok(rules)
}

/// Parses one segment of a production rule set and appends its rules to
/// `rules`.
///
/// Line numbers in errors are relative to `text`. On error `rules` is left
/// untouched, though names read before the error stay defined in `vars`.
pub fn parse_prs_into(text: &str, vars: &mut VariableSet, rules: &mut RuleSet) -> Result<()> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0, vars };
    let mut segment = RuleSet::new();
    while let Some(token) = parser.peek() {
        if *token == Token::Semi {
            parser.pos += 1;
            continue;
        }
        let rule = parser.rule()?;
        segment.push(rule);
    }
    segment.validate(parser.vars)?;
    rules.extend(segment);
    Ok(())
}

/// Parses a single guard expression.
pub fn parse_expr(text: &str, vars: &mut VariableSet) -> Result<Expr> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0, vars };
    let expr = parser.or_expr()?;
    if parser.peek().is_some() {
        return parser.error("trailing input after expression");
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::types::Var;

    #[test]
    fn test_parse_rules() {
        let mut vars = VariableSet::new();
        let rules = parse_prs("a & b -> c-\n~a | ~b -> c+\n", &mut vars).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(vars.len(), 3);
        let c = vars.find("c").unwrap();
        let first = rules.get(0).unwrap();
        assert_eq!(first.target, c);
        assert_eq!(first.direction, Direction::Fall);
        assert!(first.guard.is_and());
        assert_eq!(rules.get(1).unwrap().direction, Direction::Rise);
    }

    #[test]
    fn test_precedence() {
        let mut vars = VariableSet::new();
        let e = parse_expr("a & b | c", &mut vars).unwrap();
        assert!(e.is_or());
        assert!(e.children()[0].is_and());
        let e = parse_expr("a & (b | c)", &mut vars).unwrap();
        assert!(e.is_and());
        assert!(e.children()[1].is_or());
    }

    #[test]
    fn test_negation_forms() {
        let mut vars = VariableSet::new();
        let e = parse_expr("~a", &mut vars).unwrap();
        assert_eq!(e, Expr::not_var(Var::new(0)));
        let e = parse_expr("~(a)", &mut vars).unwrap();
        assert_eq!(e, Expr::var(Var::new(0)).not());
        let e = parse_expr("~~a", &mut vars).unwrap();
        assert_eq!(e, Expr::var(Var::new(0)));
        let e = parse_expr("~(a & b)", &mut vars).unwrap();
        assert!(e.is_and() && e.bubble());
    }

    #[test]
    fn test_comments() {
        let mut vars = VariableSet::new();
        let text = "// header\na -> b+ /* block\n spanning */ b -> a-\n";
        let rules = parse_prs(text, &mut vars).unwrap();
        assert_eq!(rules.len(), 2);

        let rules = parse_prs("a -> b+; ~a -> b-;", &mut vars).unwrap();
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn test_identifiers() {
        let mut vars = VariableSet::new();
        parse_prs("l.t[0] & _r' -> x.e-", &mut vars).unwrap();
        assert!(vars.find("l.t[0]").is_some());
        assert!(vars.find("_r'").is_some());
        assert!(vars.find("x.e").is_some());
    }

    #[test]
    fn test_errors_carry_line() {
        let mut vars = VariableSet::new();
        let err = parse_prs("a -> b+\na & -> c-", &mut vars).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));

        let err = parse_prs("a -> b", &mut vars).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));

        let err = parse_prs("a -> b+ /* open", &mut vars).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));

        let err = parse_prs("a # b -> c+", &mut vars).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_segments_share_variables() {
        let mut vars = VariableSet::new();
        let mut rules = RuleSet::new();
        parse_prs_into("a & b -> c-\n~a | ~b -> c+\nc -> d+\n", &mut vars, &mut rules).unwrap();
        parse_prs_into("c & e -> f-", &mut vars, &mut rules).unwrap();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules.get(3).unwrap().guard.children()[0], Expr::var(vars.find("c").unwrap()));

        // Lines count from the start of the failing segment.
        let err = parse_prs_into("x & -> y+", &mut vars, &mut rules).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
        assert_eq!(rules.len(), 4);
    }

    #[test]
    fn test_display_round_trip() {
        let mut vars = VariableSet::new();
        let text = "~(a&~b)|c -> x+\n(a|b)&~(c) -> x-\n~(~a) -> y+\n";
        let rules = parse_prs(text, &mut vars).unwrap();
        let printed = rules.display(&vars).to_string();
        assert_eq!(printed, text);
        let again = parse_prs(&printed, &mut vars).unwrap();
        assert_eq!(again, rules);
    }
}
