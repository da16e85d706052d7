// ABOUTME: Postfix evaluator: walks a compiled stream against a resolver,
// with temporary strings bump-allocated in the caller's workspace.

use crate::error::ErrorKind;
use crate::parser;
use crate::stack::{Arena, EvalStack, Stack};
use crate::value::{Callable, FuncDef, StrVal, Token, Value, TOKEN_BYTES};
use std::borrow::Cow;

/// What a host resolver returns for a variable name. Borrowed strings
/// avoid a copy when the host's storage outlives the evaluation; owned
/// strings work for computed or cached values. Either way the content is
/// interned into the evaluation workspace.
pub enum Resolved<'a> {
    Bool(bool),
    Number(f64),
    Datetime(u64),
    Str(Cow<'a, str>),
    Error(ErrorKind),
}

/// Resolver callback: variable name in, value out. Hosts that detect
/// reference cycles themselves return [`ErrorKind::CircularRef`].
pub type Resolver<'r> = dyn FnMut(&str) -> Resolved<'r> + 'r;

/// Everything a function implementation may touch while running: the
/// expression text (string spans point into it), the temporary-string
/// arena, and the host resolver. Pure functions get it read-only.
pub struct EvalCtx<'c, 'r> {
    pub(crate) text: &'c str,
    pub(crate) arena: &'c mut Arena,
    pub(crate) resolver: Option<&'c mut Resolver<'r>>,
}

impl<'c, 'r> EvalCtx<'c, 'r> {
    pub(crate) fn new(
        text: &'c str,
        arena: &'c mut Arena,
        resolver: Option<&'c mut Resolver<'r>>,
    ) -> Self {
        Self { text, arena, resolver }
    }

    /// The bytes behind a string value, wherever they live.
    pub(crate) fn str_of(&self, sv: StrVal) -> &str {
        match sv {
            StrVal::Source(span) => span.slice(self.text),
            StrVal::Temp(span) => self.arena.str(span),
        }
    }

    /// Copy `len` bytes of `sv` starting at `start` onto the arena top.
    pub(crate) fn append_range(
        &mut self,
        sv: StrVal,
        start: usize,
        len: usize,
    ) -> Result<(), ErrorKind> {
        match sv {
            StrVal::Source(span) => {
                let s = span.slice(self.text);
                let piece = s.get(start..start + len).unwrap_or("");
                self.arena.append_str(piece)
            }
            StrVal::Temp(span) => self.arena.append_from_self(span.start as usize + start, len),
        }
    }

    /// Allocate a fresh copy of a whole string value.
    pub(crate) fn copy_str(&mut self, sv: StrVal) -> Result<StrVal, ErrorKind> {
        let mark = self.arena.mark();
        match self.append_range(sv, 0, sv.len()) {
            Ok(()) => Ok(self.arena.finish(mark)),
            Err(e) => {
                self.arena.truncate_to(mark);
                Err(e)
            }
        }
    }

    /// Allocate a literal string.
    pub(crate) fn alloc_str(&mut self, s: &str) -> Result<StrVal, ErrorKind> {
        let mark = self.arena.mark();
        match self.arena.append_str(s) {
            Ok(()) => Ok(self.arena.finish(mark)),
            Err(e) => {
                self.arena.truncate_to(mark);
                Err(e)
            }
        }
    }
}

/// Turn a resolver result into a stack token, interning string content
/// into the arena.
pub(crate) fn intern_resolved(resolved: Resolved<'_>, arena: &mut Arena) -> Token {
    match resolved {
        Resolved::Bool(b) => Token::Bool(b),
        Resolved::Number(n) => Token::Number(n),
        Resolved::Datetime(d) => Token::Datetime(d),
        Resolved::Error(e) => Token::Error(e),
        Resolved::Str(cow) => {
            let mark = arena.mark();
            match arena.append_str(&cow) {
                Ok(()) => Token::Str(arena.finish(mark)),
                Err(e) => {
                    arena.truncate_to(mark);
                    Token::Error(e)
                }
            }
        }
    }
}

/// Dispatch one function call over its argument tokens.
pub(crate) fn call_function(def: &FuncDef, args: &[Token], ctx: &mut EvalCtx<'_, '_>) -> Token {
    if args.len() != def.arity() {
        return Token::Error(ErrorKind::Eval);
    }
    match def.call {
        Callable::Pure0(f) => f(ctx),
        Callable::Pure1(f) => f(args[0], ctx),
        Callable::Pure2(f) => f(args[0], args[1], ctx),
        Callable::Pure3(f) => f(args[0], args[1], args[2], ctx),
        Callable::Impure0(f) => f(ctx),
        Callable::Impure1(f) => f(args[0], ctx),
        Callable::Impure2(f) => f(args[0], args[1], ctx),
        Callable::Impure3(f) => f(args[0], args[1], args[2], ctx),
    }
}

/// Evaluate a compiled stream against `text` (the expression it was
/// compiled from) using the caller-owned workspace `aux`.
///
/// Blocking errors abort and become the result; value errors flow through
/// the stream. A well-formed stream leaves exactly one residual value.
pub fn evaluate<'a, 'r>(
    program: &Stack,
    text: &'a str,
    aux: &'a mut EvalStack,
    mut resolver: Option<&mut Resolver<'r>>,
) -> Value<'a> {
    if program.is_empty() {
        return Value::Error(ErrorKind::Generic);
    }

    aux.values.clear();
    aux.arena.clear();
    let budget = aux.reserved * TOKEN_BYTES;

    for token in program.tokens() {
        match *token {
            t @ (Token::Bool(_) | Token::Number(_) | Token::Datetime(_) | Token::Str(_)) => {
                if !aux.fits_one_more() {
                    return Value::Error(ErrorKind::Mem);
                }
                aux.values.push(t);
            }

            Token::Error(e) => {
                if e.is_blocking() {
                    return Value::Error(e);
                }
                if !aux.fits_one_more() {
                    return Value::Error(ErrorKind::Mem);
                }
                aux.values.push(Token::Error(e));
            }

            Token::Var(span) => {
                if !aux.fits_one_more() {
                    return Value::Error(ErrorKind::Mem);
                }
                let Some(r) = resolver.as_mut() else {
                    return Value::Error(ErrorKind::Ref);
                };
                let resolved = (**r)(span.slice(text));
                aux.arena
                    .set_limit(budget.saturating_sub((aux.values.len() + 1) * TOKEN_BYTES));
                let tok = intern_resolved(resolved, &mut aux.arena);
                if let Token::Error(e) = tok {
                    if e.is_blocking() {
                        return Value::Error(e);
                    }
                }
                aux.values.push(tok);
            }

            Token::Func(def) => {
                let arity = def.arity();
                if aux.values.len() < arity {
                    return Value::Error(ErrorKind::Eval);
                }
                let base = aux.values.len() - arity;
                let mut args = [Token::Null; 3];
                args[..arity].copy_from_slice(&aux.values[base..]);

                aux.arena
                    .set_limit(budget.saturating_sub(aux.values.len() * TOKEN_BYTES));
                let mut ctx = EvalCtx {
                    text,
                    arena: &mut aux.arena,
                    resolver: resolver.as_deref_mut(),
                };
                let mut result = call_function(def, &args[..arity], &mut ctx);
                if let Token::Error(e) = result {
                    if e.is_blocking() {
                        return Value::Error(e);
                    }
                }

                // Release temporary-string arguments in reverse allocation
                // order. A result reusing an argument's storage keeps it; a
                // result allocated above a freed argument slides down.
                for arg in aux.values[base..].iter().rev() {
                    let Token::Str(StrVal::Temp(arg_span)) = *arg else {
                        continue;
                    };
                    if let Token::Str(StrVal::Temp(res_span)) = &mut result {
                        if res_span.start == arg_span.start {
                            continue;
                        }
                        if res_span.start > arg_span.start {
                            res_span.start -= arg_span.len;
                        }
                    }
                    aux.arena.release(arg_span);
                }

                aux.values.truncate(base);
                if arity == 0 && !aux.fits_one_more() {
                    return Value::Error(ErrorKind::Mem);
                }
                aux.values.push(result);
            }

            Token::Null => return Value::Error(ErrorKind::Eval),
        }
    }

    if aux.values.len() != 1 {
        return Value::Error(ErrorKind::Eval);
    }
    token_to_value(aux.values[0], text, &aux.arena)
}

fn token_to_value<'a>(token: Token, text: &'a str, arena: &'a Arena) -> Value<'a> {
    match token {
        Token::Bool(b) => Value::Bool(b),
        Token::Number(n) => Value::Number(n),
        Token::Datetime(d) => Value::Datetime(d),
        Token::Str(StrVal::Source(span)) => Value::Str(span.slice(text)),
        Token::Str(StrVal::Temp(span)) => Value::Str(arena.str(span)),
        Token::Error(e) => Value::Error(e),
        Token::Var(_) | Token::Func(_) | Token::Null => Value::Error(ErrorKind::Eval),
    }
}

// ============================================================================
// One-shot compile + evaluate
// ============================================================================

/// Compile `text` as a numeric expression and evaluate it in one call.
pub fn eval_number<'a, 'r>(
    text: &'a str,
    stack: &mut Stack,
    aux: &'a mut EvalStack,
    resolver: Option<&mut Resolver<'r>>,
) -> Value<'a> {
    match parser::compile_number(text, stack) {
        Ok(()) => evaluate(stack, text, aux, resolver),
        Err(err) => Value::Error(err.kind),
    }
}

/// Compile `text` as a boolean expression and evaluate it in one call.
pub fn eval_bool<'a, 'r>(
    text: &'a str,
    stack: &mut Stack,
    aux: &'a mut EvalStack,
    resolver: Option<&mut Resolver<'r>>,
) -> Value<'a> {
    match parser::compile_bool(text, stack) {
        Ok(()) => evaluate(stack, text, aux, resolver),
        Err(err) => Value::Error(err.kind),
    }
}

/// Compile `text` as a datetime expression and evaluate it in one call.
pub fn eval_datetime<'a, 'r>(
    text: &'a str,
    stack: &mut Stack,
    aux: &'a mut EvalStack,
    resolver: Option<&mut Resolver<'r>>,
) -> Value<'a> {
    match parser::compile_datetime(text, stack) {
        Ok(()) => evaluate(stack, text, aux, resolver),
        Err(err) => Value::Error(err.kind),
    }
}

/// Compile `text` as a string expression and evaluate it in one call.
pub fn eval_string<'a, 'r>(
    text: &'a str,
    stack: &mut Stack,
    aux: &'a mut EvalStack,
    resolver: Option<&mut Resolver<'r>>,
) -> Value<'a> {
    match parser::compile_string(text, stack) {
        Ok(()) => evaluate(stack, text, aux, resolver),
        Err(err) => Value::Error(err.kind),
    }
}

/// Compile `text` generically (bool, number, datetime, string tried in
/// that order) and evaluate it in one call.
pub fn eval<'a, 'r>(
    text: &'a str,
    stack: &mut Stack,
    aux: &'a mut EvalStack,
    resolver: Option<&mut Resolver<'r>>,
) -> Value<'a> {
    match parser::compile(text, stack) {
        Ok(_) => evaluate(stack, text, aux, resolver),
        Err(err) => Value::Error(err.kind),
    }
}
