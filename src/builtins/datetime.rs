//! Datetime functions: `now`, part extraction and part-wise arithmetic.
//!
//! All results stay inside the representable range
//! `[1970-01-01T00:00:00.000Z, 2999-12-31T23:59:59.999Z]`; arithmetic
//! that would leave it clamps to the nearest bound. Adding months or
//! years preserves the day-of-month, clamped to the target month length.

use super::{datetime_arg, num_arg};
use crate::datetime::{
    month_len, to_fields, MAX_DATETIME, MAX_YEAR, MILLIS_PER_DAY, MILLIS_PER_HOUR,
    MILLIS_PER_MINUTE, MILLIS_PER_SECOND, MIN_YEAR, PART_DAY, PART_HOUR, PART_MILLIS, PART_MINUTE,
    PART_MONTH, PART_SECOND, PART_YEAR,
};
use crate::error::ErrorKind;
use crate::eval::EvalCtx;
use crate::value::{Callable, FuncDef, Token};
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) static NOW: FuncDef =
    FuncDef { name: "now", call: Callable::Impure0(now), precedence: 0, right_to_left: false };
pub(crate) static DATEPART: FuncDef = FuncDef {
    name: "datepart",
    call: Callable::Pure2(datepart),
    precedence: 0,
    right_to_left: false,
};
pub(crate) static DATEADD: FuncDef = FuncDef {
    name: "dateadd",
    call: Callable::Pure3(dateadd),
    precedence: 0,
    right_to_left: false,
};
pub(crate) static DATESET: FuncDef = FuncDef {
    name: "dateset",
    call: Callable::Pure3(dateset),
    precedence: 0,
    right_to_left: false,
};
pub(crate) static DATETRUNC: FuncDef = FuncDef {
    name: "datetrunc",
    call: Callable::Pure2(datetrunc),
    precedence: 0,
    right_to_left: false,
};

/// A datepart argument: the parser rewrites the literal to 0..6, but a
/// folded error or stray value still has to be rejected here.
fn part_arg(t: Token) -> Result<u32, ErrorKind> {
    let v = num_arg(t)?;
    if !v.is_finite() || v.fract() != 0.0 || !(0.0..=6.0).contains(&v) {
        return Err(ErrorKind::Value);
    }
    Ok(v as u32)
}

/// Current UTC time. Impure by nature, so it survives constant folding.
fn now(_: &mut EvalCtx<'_, '_>) -> Token {
    let millis = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => (elapsed.as_millis() as u64).min(MAX_DATETIME),
        Err(_) => 0,
    };
    Token::Datetime(millis)
}

fn datepart(date: Token, part: Token, _: &EvalCtx<'_, '_>) -> Token {
    let (millis, part) = match (datetime_arg(date), part_arg(part)) {
        (Ok(d), Ok(p)) => (d, p),
        (Err(e), _) | (_, Err(e)) => return Token::Error(e),
    };
    let f = to_fields(millis);
    let value = match part {
        PART_YEAR => f.year as f64,
        PART_MONTH => f.month as f64,
        PART_DAY => f.day as f64,
        PART_HOUR => f.hour as f64,
        PART_MINUTE => f.minute as f64,
        PART_SECOND => f.second as f64,
        _ => f.millis as f64,
    };
    Token::Number(value)
}

fn dateadd(date: Token, value: Token, part: Token, _: &EvalCtx<'_, '_>) -> Token {
    let (millis, value, part) = match (datetime_arg(date), num_arg(value), part_arg(part)) {
        (Ok(d), Ok(v), Ok(p)) => (d, v, p),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return Token::Error(e),
    };
    if !value.is_finite() {
        return Token::Error(ErrorKind::Value);
    }
    let n = value.trunc() as i64;

    let result = match part {
        PART_YEAR => add_months(millis, n.saturating_mul(12)),
        PART_MONTH => add_months(millis, n),
        _ => {
            let unit = match part {
                PART_DAY => MILLIS_PER_DAY,
                PART_HOUR => MILLIS_PER_HOUR,
                PART_MINUTE => MILLIS_PER_MINUTE,
                PART_SECOND => MILLIS_PER_SECOND,
                _ => 1,
            };
            let shifted = millis as i128 + n as i128 * unit as i128;
            shifted.clamp(0, MAX_DATETIME as i128) as u64
        }
    };
    Token::Datetime(result)
}

/// Month arithmetic preserving the day-of-month, clamped to the target
/// month length (`2024-01-31 + 1 month` is `2024-02-29`).
fn add_months(millis: u64, n: i64) -> u64 {
    let mut f = to_fields(millis);
    let total = (f.year * 12 + f.month as i64 - 1).saturating_add(n);
    let year = total.div_euclid(12);
    let month = (total.rem_euclid(12) + 1) as u32;
    if year < MIN_YEAR {
        return 0;
    }
    if year > MAX_YEAR {
        return MAX_DATETIME;
    }
    f.year = year;
    f.month = month;
    f.day = f.day.min(month_len(year, month));
    f.to_millis().unwrap_or(millis)
}

fn dateset(date: Token, value: Token, part: Token, _: &EvalCtx<'_, '_>) -> Token {
    let (millis, value, part) = match (datetime_arg(date), num_arg(value), part_arg(part)) {
        (Ok(d), Ok(v), Ok(p)) => (d, v, p),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return Token::Error(e),
    };
    if !value.is_finite() {
        return Token::Error(ErrorKind::Value);
    }
    let v = value.trunc() as i64;

    let mut f = to_fields(millis);
    match part {
        PART_YEAR => {
            f.year = v.clamp(MIN_YEAR, MAX_YEAR);
            f.day = f.day.min(month_len(f.year, f.month));
        }
        PART_MONTH => {
            f.month = v.clamp(1, 12) as u32;
            f.day = f.day.min(month_len(f.year, f.month));
        }
        PART_DAY => f.day = v.clamp(1, month_len(f.year, f.month) as i64) as u32,
        PART_HOUR => f.hour = v.clamp(0, 23) as u32,
        PART_MINUTE => f.minute = v.clamp(0, 59) as u32,
        PART_SECOND => f.second = v.clamp(0, 59) as u32,
        _ => f.millis = v.clamp(0, 999) as u32,
    }
    Token::Datetime(f.to_millis().unwrap_or(millis))
}

/// Zero every part finer than the given one.
fn datetrunc(date: Token, part: Token, _: &EvalCtx<'_, '_>) -> Token {
    let (millis, part) = match (datetime_arg(date), part_arg(part)) {
        (Ok(d), Ok(p)) => (d, p),
        (Err(e), _) | (_, Err(e)) => return Token::Error(e),
    };
    let mut f = to_fields(millis);
    if part < PART_MONTH {
        f.month = 1;
    }
    if part < PART_DAY {
        f.day = 1;
    }
    if part < PART_HOUR {
        f.hour = 0;
    }
    if part < PART_MINUTE {
        f.minute = 0;
    }
    if part < PART_SECOND {
        f.second = 0;
    }
    if part < PART_MILLIS {
        f.millis = 0;
    }
    Token::Datetime(f.to_millis().unwrap_or(millis))
}
