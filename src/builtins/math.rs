//! Arithmetic operators and numeric functions.

use super::{arith1, arith2, num2, num_arg};
use crate::error::ErrorKind;
use crate::eval::EvalCtx;
use crate::value::{Callable, FuncDef, Token};

// Operators (precedence > 0, consulted by the shunting-yard pop rule).
pub(crate) static POW_OP: FuncDef =
    FuncDef { name: "^", call: Callable::Pure2(pow), precedence: 2, right_to_left: false };
pub(crate) static NEG: FuncDef =
    FuncDef { name: "neg", call: Callable::Pure1(neg), precedence: 3, right_to_left: true };
pub(crate) static IDENT: FuncDef =
    FuncDef { name: "ident", call: Callable::Pure1(ident), precedence: 3, right_to_left: true };
pub(crate) static MUL_OP: FuncDef =
    FuncDef { name: "*", call: Callable::Pure2(mul), precedence: 4, right_to_left: false };
pub(crate) static DIV_OP: FuncDef =
    FuncDef { name: "/", call: Callable::Pure2(div), precedence: 4, right_to_left: false };
pub(crate) static MOD_OP: FuncDef =
    FuncDef { name: "%", call: Callable::Pure2(modulo), precedence: 4, right_to_left: false };
pub(crate) static ADD_OP: FuncDef =
    FuncDef { name: "+", call: Callable::Pure2(add), precedence: 5, right_to_left: false };
pub(crate) static SUB_OP: FuncDef =
    FuncDef { name: "-", call: Callable::Pure2(sub), precedence: 5, right_to_left: false };

// Regular functions.
pub(crate) static ABS: FuncDef =
    FuncDef { name: "abs", call: Callable::Pure1(abs), precedence: 0, right_to_left: false };
pub(crate) static SQRT: FuncDef =
    FuncDef { name: "sqrt", call: Callable::Pure1(sqrt), precedence: 0, right_to_left: false };
pub(crate) static SIN: FuncDef =
    FuncDef { name: "sin", call: Callable::Pure1(sin), precedence: 0, right_to_left: false };
pub(crate) static COS: FuncDef =
    FuncDef { name: "cos", call: Callable::Pure1(cos), precedence: 0, right_to_left: false };
pub(crate) static TAN: FuncDef =
    FuncDef { name: "tan", call: Callable::Pure1(tan), precedence: 0, right_to_left: false };
pub(crate) static EXP: FuncDef =
    FuncDef { name: "exp", call: Callable::Pure1(exp), precedence: 0, right_to_left: false };
pub(crate) static LOG: FuncDef =
    FuncDef { name: "log", call: Callable::Pure1(log), precedence: 0, right_to_left: false };
pub(crate) static TRUNC: FuncDef =
    FuncDef { name: "trunc", call: Callable::Pure1(trunc), precedence: 0, right_to_left: false };
pub(crate) static CEIL: FuncDef =
    FuncDef { name: "ceil", call: Callable::Pure1(ceil), precedence: 0, right_to_left: false };
pub(crate) static FLOOR: FuncDef =
    FuncDef { name: "floor", call: Callable::Pure1(floor), precedence: 0, right_to_left: false };
pub(crate) static POW_FN: FuncDef =
    FuncDef { name: "pow", call: Callable::Pure2(pow), precedence: 0, right_to_left: false };
pub(crate) static MOD_FN: FuncDef =
    FuncDef { name: "mod", call: Callable::Pure2(modulo), precedence: 0, right_to_left: false };

/// Unary plus: kept callable for completeness, but the simplifier drops
/// it from the stream before it can ever run.
fn ident(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    x
}

fn neg(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => Token::Number(-v),
        Err(e) => Token::Error(e),
    }
}

fn add(x: Token, y: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num2(x, y) {
        Ok((a, b)) => arith2(a + b, a, b),
        Err(e) => Token::Error(e),
    }
}

fn sub(x: Token, y: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num2(x, y) {
        Ok((a, b)) => arith2(a - b, a, b),
        Err(e) => Token::Error(e),
    }
}

fn mul(x: Token, y: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num2(x, y) {
        Ok((a, b)) => arith2(a * b, a, b),
        Err(e) => Token::Error(e),
    }
}

fn div(x: Token, y: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num2(x, y) {
        Ok((a, b)) => {
            if b == 0.0 {
                if a == 0.0 {
                    Token::Error(ErrorKind::Nan)
                } else {
                    Token::Error(ErrorKind::DivByZero)
                }
            } else {
                arith2(a / b, a, b)
            }
        }
        Err(e) => Token::Error(e),
    }
}

fn modulo(x: Token, y: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num2(x, y) {
        Ok((a, b)) => {
            if b == 0.0 {
                Token::Error(ErrorKind::DivByZero)
            } else {
                arith2(a % b, a, b)
            }
        }
        Err(e) => Token::Error(e),
    }
}

fn pow(x: Token, y: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num2(x, y) {
        Ok((a, b)) => arith2(a.powf(b), a, b),
        Err(e) => Token::Error(e),
    }
}

fn abs(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => Token::Number(v.abs()),
        Err(e) => Token::Error(e),
    }
}

fn sqrt(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => arith1(v.sqrt(), v),
        Err(e) => Token::Error(e),
    }
}

fn sin(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => arith1(v.sin(), v),
        Err(e) => Token::Error(e),
    }
}

fn cos(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => arith1(v.cos(), v),
        Err(e) => Token::Error(e),
    }
}

fn tan(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => arith1(v.tan(), v),
        Err(e) => Token::Error(e),
    }
}

fn exp(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => arith1(v.exp(), v),
        Err(e) => Token::Error(e),
    }
}

/// Natural logarithm.
fn log(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => arith1(v.ln(), v),
        Err(e) => Token::Error(e),
    }
}

fn trunc(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => Token::Number(v.trunc()),
        Err(e) => Token::Error(e),
    }
}

fn ceil(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => Token::Number(v.ceil()),
        Err(e) => Token::Error(e),
    }
}

fn floor(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match num_arg(x) {
        Ok(v) => Token::Number(v.floor()),
        Err(e) => Token::Error(e),
    }
}
