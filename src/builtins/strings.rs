//! String functions. The producers among them are impure: they write
//! their results into the evaluation arena instead of returning slices of
//! their inputs, except where the result is an argument's exact storage or
//! a sub-range of a non-temporary string.

use super::{floor_char_boundary, num_arg, str_arg};
use crate::datetime::Iso;
use crate::error::ErrorKind;
use crate::eval::{intern_resolved, EvalCtx};
use crate::stack::ArenaWriter;
use crate::value::{Callable, DisplayNumber, FuncDef, Span, StrVal, Token};
use std::fmt::Write;

pub(crate) static LENGTH: FuncDef =
    FuncDef { name: "length", call: Callable::Pure1(length), precedence: 0, right_to_left: false };
pub(crate) static FIND: FuncDef =
    FuncDef { name: "find", call: Callable::Pure3(find), precedence: 0, right_to_left: false };
pub(crate) static LOWER: FuncDef =
    FuncDef { name: "lower", call: Callable::Impure1(lower), precedence: 0, right_to_left: false };
pub(crate) static UPPER: FuncDef =
    FuncDef { name: "upper", call: Callable::Impure1(upper), precedence: 0, right_to_left: false };
pub(crate) static TRIM: FuncDef =
    FuncDef { name: "trim", call: Callable::Impure1(trim), precedence: 0, right_to_left: false };
pub(crate) static CONCAT_OP: FuncDef = FuncDef {
    name: "concat",
    call: Callable::Impure2(concat),
    precedence: 5,
    right_to_left: false,
};
pub(crate) static SUBSTR: FuncDef = FuncDef {
    name: "substr",
    call: Callable::Impure3(substr),
    precedence: 0,
    right_to_left: false,
};
pub(crate) static REPLACE: FuncDef = FuncDef {
    name: "replace",
    call: Callable::Impure3(replace),
    precedence: 0,
    right_to_left: false,
};
pub(crate) static UNESCAPE: FuncDef = FuncDef {
    name: "unescape",
    call: Callable::Impure1(unescape),
    precedence: 0,
    right_to_left: false,
};
pub(crate) static STR: FuncDef =
    FuncDef { name: "str", call: Callable::Impure1(str_fn), precedence: 0, right_to_left: false };
pub(crate) static VARIABLE: FuncDef = FuncDef {
    name: "variable",
    call: Callable::Impure1(variable),
    precedence: 0,
    right_to_left: false,
};

/// Byte length, not character count.
fn length(x: Token, _: &EvalCtx<'_, '_>) -> Token {
    match str_arg(x) {
        Ok(sv) => Token::Number(sv.len() as f64),
        Err(e) => Token::Error(e),
    }
}

/// Byte index of `needle` in `haystack` at or after `start`, or -1.
fn find(needle: Token, haystack: Token, start: Token, ctx: &EvalCtx<'_, '_>) -> Token {
    let (needle, hay, start) = match (str_arg(needle), str_arg(haystack), num_arg(start)) {
        (Ok(n), Ok(h), Ok(s)) => (n, h, s),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return Token::Error(e),
    };
    if !start.is_finite() {
        return Token::Error(ErrorKind::Value);
    }

    let hay = ctx.str_of(hay);
    let needle = ctx.str_of(needle);
    let from = (start.trunc().max(0.0) as usize).min(hay.len());
    let from = floor_char_boundary(hay, from);
    match hay[from..].find(needle) {
        Some(i) => Token::Number((from + i) as f64),
        None => Token::Number(-1.0),
    }
}

fn map_ascii_copy(x: Token, ctx: &mut EvalCtx<'_, '_>, f: fn(u8) -> u8) -> Token {
    let sv = match str_arg(x) {
        Ok(sv) => sv,
        Err(e) => return Token::Error(e),
    };
    match ctx.copy_str(sv) {
        Ok(copy) => {
            ctx.arena.map_ascii(copy.span(), f);
            Token::Str(copy)
        }
        Err(e) => Token::Error(e),
    }
}

fn lower(x: Token, ctx: &mut EvalCtx<'_, '_>) -> Token {
    map_ascii_copy(x, ctx, |b| b.to_ascii_lowercase())
}

fn upper(x: Token, ctx: &mut EvalCtx<'_, '_>) -> Token {
    map_ascii_copy(x, ctx, |b| b.to_ascii_uppercase())
}

fn is_space_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{0B}' | '\u{0C}' | '\u{A0}')
}

fn trim(x: Token, ctx: &mut EvalCtx<'_, '_>) -> Token {
    let sv = match str_arg(x) {
        Ok(sv) => sv,
        Err(e) => return Token::Error(e),
    };

    let s = ctx.str_of(sv);
    let trimmed = s.trim_matches(is_space_char);
    if trimmed.len() == s.len() {
        return x;
    }
    let offset = trimmed.as_ptr() as usize - s.as_ptr() as usize;
    let len = trimmed.len();

    match sv {
        StrVal::Source(span) => {
            Token::Str(StrVal::Source(Span::new(span.start as usize + offset, len)))
        }
        StrVal::Temp(_) => {
            let mark = ctx.arena.mark();
            match ctx.append_range(sv, offset, len) {
                Ok(()) => Token::Str(ctx.arena.finish(mark)),
                Err(e) => Token::Error(e),
            }
        }
    }
}

fn concat(a: Token, b: Token, ctx: &mut EvalCtx<'_, '_>) -> Token {
    let (a, b) = match (str_arg(a), str_arg(b)) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => return Token::Error(e),
    };
    let mark = ctx.arena.mark();
    if let Err(e) = ctx.append_range(a, 0, a.len()) {
        return Token::Error(e);
    }
    if let Err(e) = ctx.append_range(b, 0, b.len()) {
        return Token::Error(e);
    }
    Token::Str(ctx.arena.finish(mark))
}

/// `substr(s, start, count)` with out-of-range indices clamped to the
/// string (and to UTF-8 boundaries).
fn substr(s: Token, start: Token, count: Token, ctx: &mut EvalCtx<'_, '_>) -> Token {
    let (sv, start, count) = match (str_arg(s), num_arg(start), num_arg(count)) {
        (Ok(sv), Ok(a), Ok(b)) => (sv, a, b),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return Token::Error(e),
    };
    if !start.is_finite() || !count.is_finite() {
        return Token::Error(ErrorKind::Value);
    }

    let text = ctx.str_of(sv);
    let len = text.len();
    let from = (start.trunc().max(0.0) as usize).min(len);
    let cnt = (count.trunc().max(0.0) as usize).min(len - from);
    let from = floor_char_boundary(text, from);
    let to = floor_char_boundary(text, from + cnt).max(from);

    if from == 0 && to == len {
        return s;
    }

    match sv {
        StrVal::Source(span) => {
            Token::Str(StrVal::Source(Span::new(span.start as usize + from, to - from)))
        }
        StrVal::Temp(_) => {
            let mark = ctx.arena.mark();
            match ctx.append_range(sv, from, to - from) {
                Ok(()) => Token::Str(ctx.arena.finish(mark)),
                Err(e) => Token::Error(e),
            }
        }
    }
}

/// Replace every occurrence of `old` with `new`. An empty pattern leaves
/// the string untouched.
fn replace(s: Token, old: Token, new: Token, ctx: &mut EvalCtx<'_, '_>) -> Token {
    let (sv, old, new) = match (str_arg(s), str_arg(old), str_arg(new)) {
        (Ok(a), Ok(b), Ok(c)) => (a, b, c),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return Token::Error(e),
    };
    if old.is_empty() {
        return s;
    }

    let mark = ctx.arena.mark();
    let mut cursor = 0usize;
    loop {
        let found = {
            let hay = ctx.str_of(sv);
            let needle = ctx.str_of(old);
            hay.get(cursor..).and_then(|tail| tail.find(needle)).map(|i| cursor + i)
        };
        match found {
            Some(i) => {
                if let Err(e) = ctx.append_range(sv, cursor, i - cursor) {
                    return Token::Error(e);
                }
                if let Err(e) = ctx.append_range(new, 0, new.len()) {
                    return Token::Error(e);
                }
                cursor = i + old.len();
            }
            None => {
                if cursor == 0 {
                    // Nothing matched: hand the argument back untouched.
                    ctx.arena.truncate_to(mark);
                    return s;
                }
                if let Err(e) = ctx.append_range(sv, cursor, sv.len() - cursor) {
                    return Token::Error(e);
                }
                return Token::Str(ctx.arena.finish(mark));
            }
        }
    }
}

/// Process `\\ \" \n \t`; any other backslash sequence stays verbatim.
/// Escape-free strings pass through without touching the arena.
fn unescape(x: Token, ctx: &mut EvalCtx<'_, '_>) -> Token {
    let sv = match str_arg(x) {
        Ok(sv) => sv,
        Err(e) => return Token::Error(e),
    };
    if !ctx.str_of(sv).contains('\\') {
        return x;
    }
    let copy = match ctx.copy_str(sv) {
        Ok(copy) => copy,
        Err(e) => return Token::Error(e),
    };
    let span = copy.span();
    let new_len = ctx.arena.compact_escapes(span);
    ctx.arena.truncate_to(span.start as usize + new_len as usize);
    Token::Str(StrVal::Temp(Span { start: span.start, len: new_len }))
}

/// Render any value as a string. Strings pass through; errors propagate.
fn str_fn(x: Token, ctx: &mut EvalCtx<'_, '_>) -> Token {
    match x {
        Token::Str(_) => x,
        Token::Error(e) => Token::Error(e),
        Token::Bool(b) => match ctx.alloc_str(if b { "true" } else { "false" }) {
            Ok(sv) => Token::Str(sv),
            Err(e) => Token::Error(e),
        },
        Token::Number(n) => write_to_arena(ctx, format_args!("{}", DisplayNumber(n))),
        Token::Datetime(d) => write_to_arena(ctx, format_args!("{}", Iso(d))),
        _ => Token::Error(ErrorKind::Value),
    }
}

fn write_to_arena(ctx: &mut EvalCtx<'_, '_>, args: std::fmt::Arguments<'_>) -> Token {
    let mark = ctx.arena.mark();
    let mut writer = ArenaWriter { arena: &mut *ctx.arena };
    if writer.write_fmt(args).is_err() {
        ctx.arena.truncate_to(mark);
        return Token::Error(ErrorKind::Mem);
    }
    Token::Str(ctx.arena.finish(mark))
}

/// Resolve a computed variable name at evaluation time. Unlike the `$x`
/// form this goes through the evaluation context, so the name may itself
/// be the result of string work.
fn variable(x: Token, ctx: &mut EvalCtx<'_, '_>) -> Token {
    let sv = match str_arg(x) {
        Ok(sv) => sv,
        Err(e) => return Token::Error(e),
    };
    let resolved = {
        let name = match sv {
            StrVal::Source(span) => span.slice(ctx.text),
            StrVal::Temp(span) => ctx.arena.str(span),
        };
        match ctx.resolver.as_mut() {
            None => return Token::Error(ErrorKind::Ref),
            Some(r) => (**r)(name),
        }
    };
    intern_resolved(resolved, ctx.arena)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::Arena;

    fn source_token(start: usize, len: usize) -> Token {
        Token::Str(StrVal::Source(Span::new(start, len)))
    }

    #[test]
    fn test_trim_returns_source_subrange() {
        let text = "  hi  ";
        let mut arena = Arena::with_capacity(64);
        let mut ctx = EvalCtx::new(text, &mut arena, None);
        let result = trim(source_token(0, 6), &mut ctx);
        let Token::Str(StrVal::Source(span)) = result else {
            panic!("trim of a source string should stay a source sub-range");
        };
        assert_eq!(span.slice(text), "hi");
        assert_eq!(ctx.arena.len(), 0);
    }

    #[test]
    fn test_trim_is_identity_when_clean() {
        let text = "hi";
        let mut arena = Arena::with_capacity(64);
        let mut ctx = EvalCtx::new(text, &mut arena, None);
        let arg = source_token(0, 2);
        let result = trim(arg, &mut ctx);
        assert!(matches!(
            result,
            Token::Str(StrVal::Source(span)) if span == Span::new(0, 2)
        ));
    }

    #[test]
    fn test_upper_allocates_temp() {
        let text = "mixed";
        let mut arena = Arena::with_capacity(64);
        let mut ctx = EvalCtx::new(text, &mut arena, None);
        let result = upper(source_token(0, 5), &mut ctx);
        let Token::Str(sv @ StrVal::Temp(_)) = result else {
            panic!("upper should allocate in the arena");
        };
        assert_eq!(ctx.str_of(sv), "MIXED");
    }

    #[test]
    fn test_find_and_length_are_byte_oriented() {
        let text = "lorem ipsum";
        let mut arena = Arena::with_capacity(64);
        let ctx = EvalCtx::new(text, &mut arena, None);
        let hay = source_token(0, 11);
        let needle = source_token(3, 2); // "em"
        assert!(matches!(
            find(needle, hay, Token::Number(0.0), &ctx),
            Token::Number(n) if n == 3.0
        ));
        assert!(matches!(
            find(needle, hay, Token::Number(4.0), &ctx),
            Token::Number(n) if n == -1.0
        ));
        assert!(matches!(length(hay, &ctx), Token::Number(n) if n == 11.0));
    }

    #[test]
    fn test_unescape_passthrough_and_processing() {
        let text = r#"a\nb"#;
        let mut arena = Arena::with_capacity(64);
        let mut ctx = EvalCtx::new(text, &mut arena, None);

        let clean = unescape(source_token(0, 1), &mut ctx);
        assert!(matches!(clean, Token::Str(StrVal::Source(_))));

        let processed = unescape(source_token(0, 4), &mut ctx);
        let Token::Str(sv @ StrVal::Temp(_)) = processed else {
            panic!("unescape should allocate for escaped input");
        };
        assert_eq!(ctx.str_of(sv), "a\nb");
    }

    #[test]
    fn test_unknown_escape_stays_verbatim() {
        let text = r#"a\qb"#;
        let mut arena = Arena::with_capacity(64);
        let mut ctx = EvalCtx::new(text, &mut arena, None);
        let result = unescape(source_token(0, 4), &mut ctx);
        let Token::Str(sv) = result else { panic!("expected a string") };
        assert_eq!(ctx.str_of(sv), r#"a\qb"#);
    }

    #[test]
    fn test_substr_clamps() {
        let text = "hello world";
        let mut arena = Arena::with_capacity(64);
        let mut ctx = EvalCtx::new(text, &mut arena, None);
        let s = source_token(0, 11);

        let r = substr(s, Token::Number(6.0), Token::Number(5.0), &mut ctx);
        let Token::Str(sv) = r else { panic!("expected a string") };
        assert_eq!(ctx.str_of(sv), "world");

        let r = substr(s, Token::Number(6.0), Token::Number(99.0), &mut ctx);
        let Token::Str(sv) = r else { panic!("expected a string") };
        assert_eq!(ctx.str_of(sv), "world");

        let r = substr(s, Token::Number(-3.0), Token::Number(2.0), &mut ctx);
        let Token::Str(sv) = r else { panic!("expected a string") };
        assert_eq!(ctx.str_of(sv), "he");

        let r = substr(s, Token::Number(0.0), Token::Number(99.0), &mut ctx);
        assert!(matches!(r, Token::Str(StrVal::Source(span)) if span.len == 11));
    }

    #[test]
    fn test_replace_all_occurrences() {
        let text = "banana|an|AN";
        let mut arena = Arena::with_capacity(64);
        let mut ctx = EvalCtx::new(text, &mut arena, None);
        let s = source_token(0, 6);
        let old = source_token(7, 2);
        let new = source_token(10, 2);
        let r = replace(s, old, new, &mut ctx);
        let Token::Str(sv) = r else { panic!("expected a string") };
        assert_eq!(ctx.str_of(sv), "bANANa");

        // No match returns the argument untouched.
        let r = replace(old, new, s, &mut ctx);
        assert!(matches!(r, Token::Str(StrVal::Source(span)) if span == Span::new(7, 2)));
    }

    #[test]
    fn test_str_formats_values() {
        let mut arena = Arena::with_capacity(64);
        let mut ctx = EvalCtx::new("", &mut arena, None);
        let r = str_fn(Token::Number(3.5), &mut ctx);
        let Token::Str(sv) = r else { panic!("expected a string") };
        assert_eq!(ctx.str_of(sv), "3.5");

        let r = str_fn(Token::Bool(true), &mut ctx);
        let Token::Str(sv) = r else { panic!("expected a string") };
        assert_eq!(ctx.str_of(sv), "true");

        let r = str_fn(Token::Datetime(86_400_000), &mut ctx);
        let Token::Str(sv) = r else { panic!("expected a string") };
        assert_eq!(ctx.str_of(sv), "1970-01-02T00:00:00.000Z");

        assert!(matches!(
            str_fn(Token::Error(ErrorKind::Ref), &mut ctx),
            Token::Error(ErrorKind::Ref)
        ));
    }
}
