//! Token stream rewrite rules.
//!
//! Each rule makes one kind of local rewrite and reports whether it
//! changed anything; the tokenizer drives them to a fixed point. A rule
//! that deletes tokens must leave the bracket links of every surviving
//! token intact: `validate_links` runs after every pass and a violation
//! aborts simplification.

use super::{TokenId, TokenList, TYPE_KEYWORDS};

/// Contexts in which a constant (sub)expression can start without
/// changing the meaning of its left neighborhood.
const EXPR_START: &[&str] = &[
    "=", "(", "[", ",", ";", "{", "return", "<", ">", "<=", ">=", "==", "!=", "&&", "||", "<<",
    ">>",
];

/// Canonicalize null constants: `NULL` and `nullptr` become `0`, so the
/// checks only ever have to look for one spelling.
pub(crate) fn simplify_null_constants(list: &mut TokenList) {
    let mut id = list.front();
    while let Some(current) = id {
        if matches!(list.text(current), "NULL" | "nullptr") {
            list.set_text(current, "0");
        }
        id = list.next(current);
    }
}

/// `( ( X ) )` → `( X )`, and `= ( x ) ;` / `return ( x ) ;` → without
/// the parentheses. Both pairs being removed die together, so no stale
/// link can survive.
pub(crate) fn remove_redundant_parentheses(list: &mut TokenList) -> bool {
    let mut changed = false;
    let mut id = list.front();
    while let Some(current) = id {
        if list.text(current) == "(" {
            let close = list.at(current).link();

            // Double parentheses.
            if let (Some(inner), Some(close)) = (list.next(current), close) {
                if list.text(inner) == "(" {
                    if let Some(inner_close) = list.at(inner).link() {
                        if list.next(inner_close) == Some(close) {
                            list.delete(current);
                            list.delete(close);
                            changed = true;
                            id = Some(inner);
                            continue;
                        }
                    }
                }
            }

            // Parentheses around a single value are redundant after an
            // operator or `return`. A preceding name or closing bracket
            // means a call, so those stay.
            let prev_ok = list.prev(current).is_some_and(|p| {
                let prev = list.at(p);
                prev.is_op() || prev.text() == "return"
            });
            if prev_ok {
                if let Some(close) = close {
                    let single = list.nth_next(current, 2) == Some(close)
                        && list.next(current).is_some_and(|inner| {
                            let tok = list.at(inner);
                            tok.is_name() || tok.is_number() || tok.text().starts_with('"')
                        });
                    if single {
                        let inner = list.next(current).unwrap();
                        list.delete(current);
                        list.delete(close);
                        changed = true;
                        id = Some(inner);
                        continue;
                    }
                }
            }
        }
        id = list.next(current);
    }
    changed
}

/// Remove redundant C-style casts before a plain value:
/// `a = ( int * ) p ;` → `a = p ;`.
pub(crate) fn remove_redundant_casts(list: &mut TokenList) -> bool {
    let mut changed = false;
    let mut id = list.front();
    while let Some(current) = id {
        id = list.next(current);
        if list.text(current) != "(" {
            continue;
        }
        let prev_ok = match list.prev(current) {
            None => true,
            Some(p) => matches!(list.text(p), "=" | "(" | "," | ";" | "return"),
        };
        if !prev_ok {
            continue;
        }
        let Some(close) = list.at(current).link() else {
            continue;
        };

        // Everything between the parentheses must be type keywords and '*'.
        let mut cursor = list.next(current);
        let mut saw_type = false;
        let mut is_cast = true;
        while let Some(t) = cursor {
            if t == close {
                break;
            }
            let text = list.text(t);
            if TYPE_KEYWORDS.contains(&text) || text == "void" {
                saw_type = true;
            } else if text != "*" {
                is_cast = false;
                break;
            }
            cursor = list.next(t);
        }
        if !is_cast || !saw_type {
            continue;
        }
        let value_ok = list.next(close).is_some_and(|v| {
            let tok = list.at(v);
            tok.is_name() || tok.is_number() || tok.text().starts_with('"')
        });
        if !value_ok {
            continue;
        }

        // Delete the whole cast, open and close included.
        let mut doomed = vec![current];
        let mut cursor = list.next(current);
        while let Some(t) = cursor {
            doomed.push(t);
            if t == close {
                break;
            }
            cursor = list.next(t);
        }
        id = list.next(close);
        for t in doomed {
            list.delete(t);
        }
        changed = true;
    }
    changed
}

fn parse_const(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or(text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    text.parse().ok()
}

fn apply_op(lhs: i64, op: &str, rhs: i64) -> Option<i64> {
    match op {
        "+" => lhs.checked_add(rhs),
        "-" => lhs.checked_sub(rhs),
        "*" => lhs.checked_mul(rhs),
        // Division by zero is left in the stream for the checks to see.
        "/" if rhs != 0 => lhs.checked_div(rhs),
        "%" if rhs != 0 => lhs.checked_rem(rhs),
        "<<" if (0..63).contains(&rhs) => lhs.checked_shl(rhs as u32),
        ">>" if (0..63).contains(&rhs) => lhs.checked_shr(rhs as u32),
        _ => None,
    }
}

/// Fold `num op num` into one number where the surrounding context makes
/// that safe with respect to precedence and associativity.
pub(crate) fn fold_constants(list: &mut TokenList) -> bool {
    let mut changed = false;
    let mut id = list.front();
    while let Some(current) = id {
        if let Some(folded) = try_fold_at(list, current) {
            list.set_text(current, &folded);
            let op = list.next(current).unwrap();
            let rhs = list.next(op).unwrap();
            list.delete(op);
            list.delete(rhs);
            changed = true;
            // Stay here: the merged number may start another fold.
            continue;
        }
        id = list.next(current);
    }
    changed
}

fn try_fold_at(list: &TokenList, current: TokenId) -> Option<String> {
    if !list.at(current).is_number() {
        return None;
    }
    let op_id = list.next(current)?;
    let rhs_id = list.next(op_id)?;
    if !list.at(rhs_id).is_number() {
        return None;
    }
    let op = list.text(op_id);
    if !matches!(op, "+" | "-" | "*" | "/" | "%" | "<<" | ">>") {
        return None;
    }

    let prev_text = list.prev(current).map(|p| list.text(p));
    let start_ok = match prev_text {
        None => true,
        Some(t) => {
            EXPR_START.contains(&t)
                || (matches!(op, "*" | "/" | "%") && matches!(t, "+" | "-"))
        }
    };
    if !start_ok {
        return None;
    }

    // A following higher-precedence operator binds the right operand
    // tighter than this fold would.
    let next_text = list.next(rhs_id).map(|n| list.text(n));
    if matches!(op, "+" | "-" | "<<" | ">>")
        && next_text.is_some_and(|t| matches!(t, "*" | "/" | "%"))
    {
        return None;
    }
    if matches!(op, "<<" | ">>") && next_text.is_some_and(|t| matches!(t, "+" | "-")) {
        return None;
    }

    let lhs = parse_const(list.text(current))?;
    let rhs = parse_const(list.text(rhs_id))?;
    apply_op(lhs, op, rhs).map(|v| v.to_string())
}

/// Drop statement separators that separate nothing: a `;` directly after
/// `;` or `{`.
pub(crate) fn remove_empty_statements(list: &mut TokenList) -> bool {
    let mut changed = false;
    let mut id = list.front();
    while let Some(current) = id {
        let next = list.next(current);
        if list.text(current) == ";"
            && list
                .prev(current)
                .is_some_and(|p| matches!(list.text(p), ";" | "{"))
        {
            list.delete(current);
            changed = true;
        }
        id = next;
    }
    changed
}

#[cfg(test)]
mod tests {
    use crate::config::Settings;
    use crate::tokenizer::Tokenizer;

    fn simplified(code: &str) -> String {
        let settings = Settings::default();
        let mut tokenizer = Tokenizer::new(&settings);
        tokenizer.tokenize(code, "test.c", "").unwrap();
        assert!(tokenizer.simplify_token_list());
        tokenizer.tokens().to_text()
    }

    #[test]
    fn test_null_becomes_zero() {
        assert_eq!(simplified("p = NULL;\n"), "p = 0 ;");
        assert_eq!(simplified("p = nullptr;\n"), "p = 0 ;");
    }

    #[test]
    fn test_double_parentheses_removed() {
        assert_eq!(simplified("if ((x)) {}\n"), "if ( x ) { }");
        assert_eq!(simplified("if (((x))) {}\n"), "if ( x ) { }");
    }

    #[test]
    fn test_single_value_parens_after_assign() {
        assert_eq!(simplified("a = (5);\n"), "a = 5 ;");
        assert_eq!(simplified("void f() { return (x); }\n"), "void f ( ) { return x ; }");
    }

    #[test]
    fn test_constant_folding() {
        assert_eq!(simplified("a = 1 + 2;\n"), "a = 3 ;");
        assert_eq!(simplified("a = 2 * 3 + 1;\n"), "a = 7 ;");
        assert_eq!(simplified("a = 1 + 2 + 3;\n"), "a = 6 ;");
        assert_eq!(simplified("a = 10 - 4 - 3;\n"), "a = 3 ;");
        assert_eq!(simplified("a = 1 << 4;\n"), "a = 16 ;");
    }

    #[test]
    fn test_folding_respects_precedence() {
        // (x - 1) + 2 must not become x - 3.
        assert_eq!(simplified("a = x - 1 + 2;\n"), "a = x - 1 + 2 ;");
        // 1 + 2 * 3: the multiplication binds first.
        assert_eq!(simplified("a = 1 + 2 * 3;\n"), "a = 7 ;");
        // a / 2 * 3 is (a/2)*3, not a/6.
        assert_eq!(simplified("b = a / 2 * 3;\n"), "b = a / 2 * 3 ;");
        // Shift binds looser than addition.
        assert_eq!(simplified("a = 1 << 2 + 3;\n"), "a = 32 ;");
    }

    #[test]
    fn test_division_by_zero_not_folded() {
        assert_eq!(simplified("a = 1 / 0;\n"), "a = 1 / 0 ;");
        assert_eq!(simplified("a = 1 % 0;\n"), "a = 1 % 0 ;");
    }

    #[test]
    fn test_folding_inside_parens_cascades() {
        // Fold, then the now-single-token parentheses are dropped.
        assert_eq!(simplified("a = (1 + 2);\n"), "a = 3 ;");
    }

    #[test]
    fn test_redundant_cast_removed() {
        assert_eq!(simplified("a = (int) b;\n"), "a = b ;");
        assert_eq!(simplified("a = (unsigned long) b;\n"), "a = b ;");
        assert_eq!(simplified("p = (char *) q;\n"), "p = q ;");
    }

    #[test]
    fn test_function_call_not_treated_as_cast() {
        assert_eq!(simplified("a = f(b);\n"), "a = f ( b ) ;");
    }

    #[test]
    fn test_empty_statements_removed() {
        assert_eq!(simplified("void f() { ;; int a;; }\n"), "void f ( ) { int a ; }");
    }

    #[test]
    fn test_simplify_is_fixed_point() {
        let codes = [
            "a = (1 + 2) * 3;\n",
            "void f() { p = NULL; if ((p)) { ; } }\n",
            "a = (int) b + 1 + 2;\n",
            "int main() { return 0; }\n",
        ];
        let settings = Settings::default();
        for code in codes {
            let mut tokenizer = Tokenizer::new(&settings);
            tokenizer.tokenize(code, "test.c", "").unwrap();
            assert!(tokenizer.simplify_token_list());
            let once = tokenizer.tokens().to_text();
            assert!(tokenizer.simplify_token_list());
            assert_eq!(tokenizer.tokens().to_text(), once, "not a fixed point: {code}");
        }
    }

    #[test]
    fn test_links_valid_after_simplification() {
        let settings = Settings::default();
        let mut tokenizer = Tokenizer::new(&settings);
        tokenizer
            .tokenize("void f() { a = ((1 + 2)); g((int) x); }\n", "test.c", "")
            .unwrap();
        assert!(tokenizer.simplify_token_list());
        assert!(tokenizer.tokens().validate_links());
    }
}
