//! Comparisons, boolean operators, predicates, selection.

use super::{bool_arg, num_arg};
use crate::error::ErrorKind;
use crate::eval::EvalCtx;
use crate::value::{Callable, FuncDef, Token};
use std::cmp::Ordering;

pub(crate) static LT_OP: FuncDef =
    FuncDef { name: "<", call: Callable::Pure2(lt), precedence: 6, right_to_left: false };
pub(crate) static LE_OP: FuncDef =
    FuncDef { name: "<=", call: Callable::Pure2(le), precedence: 6, right_to_left: false };
pub(crate) static GT_OP: FuncDef =
    FuncDef { name: ">", call: Callable::Pure2(gt), precedence: 6, right_to_left: false };
pub(crate) static GE_OP: FuncDef =
    FuncDef { name: ">=", call: Callable::Pure2(ge), precedence: 6, right_to_left: false };
pub(crate) static EQ_OP: FuncDef =
    FuncDef { name: "==", call: Callable::Pure2(eq), precedence: 7, right_to_left: false };
pub(crate) static NE_OP: FuncDef =
    FuncDef { name: "!=", call: Callable::Pure2(ne), precedence: 7, right_to_left: false };
pub(crate) static AND_OP: FuncDef =
    FuncDef { name: "&&", call: Callable::Pure2(and), precedence: 8, right_to_left: false };
pub(crate) static OR_OP: FuncDef =
    FuncDef { name: "||", call: Callable::Pure2(or), precedence: 9, right_to_left: false };

pub(crate) static NOT: FuncDef =
    FuncDef { name: "not", call: Callable::Pure1(not), precedence: 0, right_to_left: false };
pub(crate) static ISINF: FuncDef =
    FuncDef { name: "isinf", call: Callable::Pure1(isinf), precedence: 0, right_to_left: false };
pub(crate) static ISNAN: FuncDef =
    FuncDef { name: "isnan", call: Callable::Pure1(isnan), precedence: 0, right_to_left: false };
pub(crate) static ISERROR: FuncDef = FuncDef {
    name: "iserror",
    call: Callable::Pure1(iserror),
    precedence: 0,
    right_to_left: false,
};
pub(crate) static MIN: FuncDef =
    FuncDef { name: "min", call: Callable::Pure2(min), precedence: 0, right_to_left: false };
pub(crate) static MAX: FuncDef =
    FuncDef { name: "max", call: Callable::Pure2(max), precedence: 0, right_to_left: false };
pub(crate) static CLAMP: FuncDef =
    FuncDef { name: "clamp", call: Callable::Pure3(clamp), precedence: 0, right_to_left: false };
pub(crate) static IFELSE: FuncDef =
    FuncDef { name: "ifelse", call: Callable::Pure3(ifelse), precedence: 0, right_to_left: false };

/// Ordering between two same-kind values; `None` for unordered numbers
/// (NaN operands). Strings compare byte-wise.
fn compare(a: Token, b: Token, ctx: &EvalCtx<'_, '_>) -> Result<Option<Ordering>, ErrorKind> {
    match (a, b) {
        (Token::Error(e), _) => Err(e),
        (_, Token::Error(e)) => Err(e),
        (Token::Number(x), Token::Number(y)) => Ok(x.partial_cmp(&y)),
        (Token::Datetime(x), Token::Datetime(y)) => Ok(Some(x.cmp(&y))),
        (Token::Str(x), Token::Str(y)) => {
            Ok(Some(ctx.str_of(x).as_bytes().cmp(ctx.str_of(y).as_bytes())))
        }
        _ => Err(ErrorKind::Value),
    }
}

fn lt(a: Token, b: Token, ctx: &EvalCtx<'_, '_>) -> Token {
    match compare(a, b, ctx) {
        Ok(ord) => Token::Bool(ord == Some(Ordering::Less)),
        Err(e) => Token::Error(e),
    }
}

fn le(a: Token, b: Token, ctx: &EvalCtx<'_, '_>) -> Token {
    match compare(a, b, ctx) {
        Ok(ord) => Token::Bool(matches!(ord, Some(Ordering::Less | Ordering::Equal))),
        Err(e) => Token::Error(e),
    }
}

fn gt(a: Token, b: Token, ctx: &EvalCtx<'_, '_>) -> Token {
    match compare(a, b, ctx) {
        Ok(ord) => Token::Bool(ord == Some(Ordering::Greater)),
        Err(e) => Token::Error(e),
    }
}

fn ge(a: Token, b: Token, ctx: &EvalCtx<'_, '_>) -> Token {
    match compare(a, b, ctx) {
        Ok(ord) => Token::Bool(matches!(ord, Some(Ordering::Greater | Ordering::Equal))),
        Err(e) => Token::Error(e),
    }
}

fn equality(a: Token, b: Token, ctx: &EvalCtx<'_, '_>) -> Result<bool, ErrorKind> {
    match (a, b) {
        (Token::Bool(x), Token::Bool(y)) => Ok(x == y),
        _ => Ok(compare(a, b, ctx)? == Some(Ordering::Equal)),
    }
}

fn eq(a: Token, b: Token, ctx: &EvalCtx<'_, '_>) -> Token {
    match equality(a, b, ctx) {
        Ok(r) => Token::Bool(r),
        Err(e) => Token::Error(e),
    }
}

fn ne(a: Token, b: Token, ctx: &EvalCtx<'_, '_>) -> Token {
    match equality(a, b, ctx) {
        Ok(r) => Token::Bool(!r),
        Err(e) => Token::Error(e),
    }
}

fn and(a: Token, b: Token, _: &EvalCtx<'_, '_>) -> Token {
    match (bool_arg(a), bool_arg(b)) {
        (Ok(x), Ok(y)) => Token::Bool(x && y),
        (Err(e), _) | (_, Err(e)) => Token::Error(e),
    }
}

fn or(a: Token, b: Token, _: &EvalCtx<'_, '_>) -> Token {
    match (bool_arg(a), bool_arg(b)) {
        (Ok(x), Ok(y)) => Token::Bool(x || y),
        (Err(e), _) | (_, Err(e)) => Token::Error(e),
    }
}

fn not(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match bool_arg(x) {
        Ok(b) => Token::Bool(!b),
        Err(e) => Token::Error(e),
    }
}

fn isinf(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => Token::Bool(v.is_infinite()),
        Err(e) => Token::Error(e),
    }
}

fn isnan(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => Token::Bool(v.is_nan()),
        Err(e) => Token::Error(e),
    }
}

/// The one function that consumes errors instead of propagating them.
fn iserror(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    Token::Bool(matches!(x, Token::Error(_)))
}

fn min(a: Token, b: Token, ctx: &EvalCtx<'_, '_>) -> Token {
    match compare(a, b, ctx) {
        Ok(Some(Ordering::Greater)) => b,
        Ok(_) => a,
        Err(e) => Token::Error(e),
    }
}

fn max(a: Token, b: Token, ctx: &EvalCtx<'_, '_>) -> Token {
    match compare(a, b, ctx) {
        Ok(Some(Ordering::Less)) => b,
        Ok(_) => a,
        Err(e) => Token::Error(e),
    }
}

fn clamp(x: Token, lo: Token, hi: Token, ctx: &EvalCtx<'_, '_>) -> Token {
    for t in [x, lo, hi] {
        if let Token::Error(e) = t {
            return Token::Error(e);
        }
    }
    match compare(x, lo, ctx) {
        Ok(Some(Ordering::Less)) => return lo,
        Ok(_) => {}
        Err(e) => return Token::Error(e),
    }
    match compare(x, hi, ctx) {
        Ok(Some(Ordering::Greater)) => hi,
        Ok(_) => x,
        Err(e) => Token::Error(e),
    }
}

/// Selects one branch on a boolean condition. Only an error *condition*
/// propagates; the unselected branch may hold an error freely.
fn ifelse(cond: Token, x: Token, y: Token, _: &EvalCtx<'_, '_>) -> Token {
    match cond {
        Token::Bool(true) => x,
        Token::Bool(false) => y,
        Token::Error(e) => Token::Error(e),
        _ => Token::Error(ErrorKind::Value),
    }
}
