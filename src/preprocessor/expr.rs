//! Evaluator for `#if`/`#elif` controlling expressions.
//!
//! Implements the usual integer-constant-expression subset: `defined`,
//! logical and bitwise operators, comparisons, shifts and arithmetic.
//! Undefined identifiers evaluate to 0. A malformed expression evaluates
//! to 0 rather than aborting the file.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(i64),
    Ident(String),
    Defined,
    LParen,
    RParen,
    Not,
    Tilde,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    AndAnd,
    OrOr,
}

fn lex(input: &str) -> Option<Vec<Tok>> {
    let mut toks = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '0'..='9' => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == 'x' || c == 'X' {
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Num(parse_int(&text)?));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name == "defined" {
                    toks.push(Tok::Defined);
                } else {
                    toks.push(Tok::Ident(name));
                }
            }
            '(' => {
                chars.next();
                toks.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                toks.push(Tok::RParen);
            }
            '~' => {
                chars.next();
                toks.push(Tok::Tilde);
            }
            '+' => {
                chars.next();
                toks.push(Tok::Plus);
            }
            '-' => {
                chars.next();
                toks.push(Tok::Minus);
            }
            '*' => {
                chars.next();
                toks.push(Tok::Star);
            }
            '/' => {
                chars.next();
                toks.push(Tok::Slash);
            }
            '%' => {
                chars.next();
                toks.push(Tok::Percent);
            }
            '^' => {
                chars.next();
                toks.push(Tok::BitXor);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::Ne);
                } else {
                    toks.push(Tok::Not);
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    toks.push(Tok::EqEq);
                } else {
                    return None;
                }
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => {
                        chars.next();
                        toks.push(Tok::Le);
                    }
                    Some('<') => {
                        chars.next();
                        toks.push(Tok::Shl);
                    }
                    _ => toks.push(Tok::Lt),
                }
            }
            '>' => {
                chars.next();
                match chars.peek() {
                    Some('=') => {
                        chars.next();
                        toks.push(Tok::Ge);
                    }
                    Some('>') => {
                        chars.next();
                        toks.push(Tok::Shr);
                    }
                    _ => toks.push(Tok::Gt),
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    toks.push(Tok::AndAnd);
                } else {
                    toks.push(Tok::BitAnd);
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    toks.push(Tok::OrOr);
                } else {
                    toks.push(Tok::BitOr);
                }
            }
            _ => return None,
        }
    }
    Some(toks)
}

fn parse_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_end_matches(['u', 'U', 'l', 'L']);
    if let Some(hex) = trimmed.strip_prefix("0x").or(trimmed.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if trimmed.len() > 1 && trimmed.starts_with('0') {
        return i64::from_str_radix(&trimmed[1..], 8).ok();
    }
    trimmed.parse().ok()
}

struct Parser<'a> {
    toks: &'a [Tok],
    pos: usize,
    defines: &'a HashMap<String, String>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<&Tok> {
        let t = self.toks.get(self.pos);
        self.pos += 1;
        t
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Resolve an identifier through the define table. A macro may expand
    /// to another macro name; follow a few levels, then give up at 0.
    fn lookup(&self, name: &str) -> i64 {
        let mut current = name;
        for _ in 0..8 {
            match self.defines.get(current) {
                None => return 0,
                Some(value) => {
                    if let Some(n) = parse_int(value.trim()) {
                        return n;
                    }
                    current = value.trim();
                }
            }
        }
        0
    }

    fn primary(&mut self) -> Option<i64> {
        match self.bump()?.clone() {
            Tok::Num(n) => Some(n),
            Tok::Ident(name) => Some(self.lookup(&name)),
            Tok::Defined => {
                let parens = self.eat(&Tok::LParen);
                let name = match self.bump()? {
                    Tok::Ident(name) => name.clone(),
                    _ => return None,
                };
                if parens && !self.eat(&Tok::RParen) {
                    return None;
                }
                Some(i64::from(self.defines.contains_key(&name)))
            }
            Tok::LParen => {
                let value = self.or_expr()?;
                self.eat(&Tok::RParen).then_some(value)
            }
            Tok::Not => Some(i64::from(self.primary()? == 0)),
            Tok::Tilde => Some(!self.primary()?),
            Tok::Minus => Some(-self.primary()?),
            Tok::Plus => self.primary(),
            _ => None,
        }
    }

    fn mul_expr(&mut self) -> Option<i64> {
        let mut lhs = self.primary()?;
        loop {
            match self.peek() {
                Some(Tok::Star) => {
                    self.pos += 1;
                    lhs = lhs.wrapping_mul(self.primary()?);
                }
                Some(Tok::Slash) => {
                    self.pos += 1;
                    let rhs = self.primary()?;
                    lhs = if rhs == 0 { 0 } else { lhs / rhs };
                }
                Some(Tok::Percent) => {
                    self.pos += 1;
                    let rhs = self.primary()?;
                    lhs = if rhs == 0 { 0 } else { lhs % rhs };
                }
                _ => return Some(lhs),
            }
        }
    }

    fn add_expr(&mut self) -> Option<i64> {
        let mut lhs = self.mul_expr()?;
        loop {
            match self.peek() {
                Some(Tok::Plus) => {
                    self.pos += 1;
                    lhs = lhs.wrapping_add(self.mul_expr()?);
                }
                Some(Tok::Minus) => {
                    self.pos += 1;
                    lhs = lhs.wrapping_sub(self.mul_expr()?);
                }
                _ => return Some(lhs),
            }
        }
    }

    fn shift_expr(&mut self) -> Option<i64> {
        let mut lhs = self.add_expr()?;
        loop {
            match self.peek() {
                Some(Tok::Shl) => {
                    self.pos += 1;
                    lhs = lhs.wrapping_shl(self.add_expr()? as u32);
                }
                Some(Tok::Shr) => {
                    self.pos += 1;
                    lhs = lhs.wrapping_shr(self.add_expr()? as u32);
                }
                _ => return Some(lhs),
            }
        }
    }

    fn rel_expr(&mut self) -> Option<i64> {
        let mut lhs = self.shift_expr()?;
        loop {
            let op = match self.peek() {
                Some(t @ (Tok::Lt | Tok::Le | Tok::Gt | Tok::Ge)) => t.clone(),
                _ => return Some(lhs),
            };
            self.pos += 1;
            let rhs = self.shift_expr()?;
            lhs = i64::from(match op {
                Tok::Lt => lhs < rhs,
                Tok::Le => lhs <= rhs,
                Tok::Gt => lhs > rhs,
                _ => lhs >= rhs,
            });
        }
    }

    fn eq_expr(&mut self) -> Option<i64> {
        let mut lhs = self.rel_expr()?;
        loop {
            match self.peek() {
                Some(Tok::EqEq) => {
                    self.pos += 1;
                    lhs = i64::from(lhs == self.rel_expr()?);
                }
                Some(Tok::Ne) => {
                    self.pos += 1;
                    lhs = i64::from(lhs != self.rel_expr()?);
                }
                _ => return Some(lhs),
            }
        }
    }

    fn bitand_expr(&mut self) -> Option<i64> {
        let mut lhs = self.eq_expr()?;
        while self.eat(&Tok::BitAnd) {
            lhs &= self.eq_expr()?;
        }
        Some(lhs)
    }

    fn bitxor_expr(&mut self) -> Option<i64> {
        let mut lhs = self.bitand_expr()?;
        while self.eat(&Tok::BitXor) {
            lhs ^= self.bitand_expr()?;
        }
        Some(lhs)
    }

    fn bitor_expr(&mut self) -> Option<i64> {
        let mut lhs = self.bitxor_expr()?;
        while self.eat(&Tok::BitOr) {
            lhs |= self.bitxor_expr()?;
        }
        Some(lhs)
    }

    fn and_expr(&mut self) -> Option<i64> {
        let mut lhs = self.bitor_expr()?;
        while self.eat(&Tok::AndAnd) {
            let rhs = self.bitor_expr()?;
            lhs = i64::from(lhs != 0 && rhs != 0);
        }
        Some(lhs)
    }

    fn or_expr(&mut self) -> Option<i64> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Tok::OrOr) {
            let rhs = self.and_expr()?;
            lhs = i64::from(lhs != 0 || rhs != 0);
        }
        Some(lhs)
    }
}

/// Evaluate an `#if` expression with the given define table.
pub fn eval(input: &str, defines: &HashMap<String, String>) -> i64 {
    let Some(toks) = lex(input) else {
        return 0;
    };
    let mut parser = Parser {
        toks: &toks,
        pos: 0,
        defines,
    };
    match parser.or_expr() {
        Some(value) if parser.pos == toks.len() => value,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_literals() {
        let d = HashMap::new();
        assert_eq!(eval("1", &d), 1);
        assert_eq!(eval("0", &d), 0);
        assert_eq!(eval("0x10", &d), 16);
        assert_eq!(eval("010", &d), 8);
        assert_eq!(eval("42L", &d), 42);
    }

    #[test]
    fn test_arithmetic_precedence() {
        let d = HashMap::new();
        assert_eq!(eval("1 + 2 * 3", &d), 7);
        assert_eq!(eval("(1 + 2) * 3", &d), 9);
        assert_eq!(eval("10 - 4 - 3", &d), 3);
        assert_eq!(eval("7 % 3", &d), 1);
    }

    #[test]
    fn test_division_by_zero_is_zero() {
        let d = HashMap::new();
        assert_eq!(eval("1 / 0", &d), 0);
        assert_eq!(eval("1 % 0", &d), 0);
    }

    #[test]
    fn test_comparisons_and_logic() {
        let d = HashMap::new();
        assert_eq!(eval("1 < 2 && 2 < 3", &d), 1);
        assert_eq!(eval("1 > 2 || 3 >= 3", &d), 1);
        assert_eq!(eval("1 == 1", &d), 1);
        assert_eq!(eval("1 != 1", &d), 0);
        assert_eq!(eval("!0", &d), 1);
        assert_eq!(eval("!5", &d), 0);
    }

    #[test]
    fn test_bitwise_and_shift() {
        let d = HashMap::new();
        assert_eq!(eval("1 << 4", &d), 16);
        assert_eq!(eval("6 & 3", &d), 2);
        assert_eq!(eval("6 | 1", &d), 7);
        assert_eq!(eval("6 ^ 3", &d), 5);
        assert_eq!(eval("~0 & 1", &d), 1);
    }

    #[test]
    fn test_defined_operator() {
        let d = defs(&[("FOO", "1")]);
        assert_eq!(eval("defined(FOO)", &d), 1);
        assert_eq!(eval("defined FOO", &d), 1);
        assert_eq!(eval("defined(BAR)", &d), 0);
        assert_eq!(eval("defined(FOO) && !defined(BAR)", &d), 1);
    }

    #[test]
    fn test_identifier_lookup() {
        let d = defs(&[("MAX", "10"), ("ALIAS", "MAX")]);
        assert_eq!(eval("MAX", &d), 10);
        assert_eq!(eval("MAX > 5", &d), 1);
        // One level of macro indirection.
        assert_eq!(eval("ALIAS", &d), 10);
        // Undefined identifiers are 0.
        assert_eq!(eval("UNDEFINED", &d), 0);
    }

    #[test]
    fn test_self_referential_macro_terminates() {
        let d = defs(&[("A", "B"), ("B", "A")]);
        assert_eq!(eval("A", &d), 0);
    }

    #[test]
    fn test_malformed_is_false() {
        let d = HashMap::new();
        assert_eq!(eval("1 +", &d), 0);
        assert_eq!(eval("(1", &d), 0);
        assert_eq!(eval("@", &d), 0);
        assert_eq!(eval("", &d), 0);
        assert_eq!(eval("1 = 2", &d), 0);
    }

    #[test]
    fn test_unary_minus() {
        let d = HashMap::new();
        assert_eq!(eval("-1 + 2", &d), 1);
        assert_eq!(eval("-(3)", &d), -3);
    }
}
