// ABOUTME: Type-directed recursive-descent parser with shunting-yard
// linearization and compile-time constant folding.

use crate::builtins::{math, strings};
use crate::error::{CompileError, ErrorKind};
use crate::eval::{call_function, EvalCtx};
use crate::lexer::{read_symbol, skip_spaces, SymVal, Symbol};
use crate::scan;
use crate::stack::{Arena, Stack};
use crate::symbols::{create_token, SymKind};
use crate::value::{Token, ValueType};

/// Compile a numeric expression into `stack`.
pub fn compile_number(text: &str, stack: &mut Stack) -> Result<(), CompileError> {
    let mut parser = Parser::new(text, stack);
    parser.parse_expr_number();
    parser.finalize();
    parser.into_result()
}

/// Compile a string expression into `stack`.
pub fn compile_string(text: &str, stack: &mut Stack) -> Result<(), CompileError> {
    let mut parser = Parser::new(text, stack);
    parser.parse_expr_string();
    parser.finalize();
    parser.into_result()
}

/// Compile a boolean expression into `stack`.
pub fn compile_bool(text: &str, stack: &mut Stack) -> Result<(), CompileError> {
    let mut parser = Parser::new(text, stack);
    parser.parse_expr_bool();
    parser.finalize();
    parser.into_result()
}

/// Compile a datetime expression into `stack`.
pub fn compile_datetime(text: &str, stack: &mut Stack) -> Result<(), CompileError> {
    let mut parser = Parser::new(text, stack);
    parser.parse_expr_datetime();
    parser.finalize();
    parser.into_result()
}

/// Compile an expression whose type is determined by its content: bool,
/// number, datetime and string are attempted in that order, and the type
/// that parsed is reported back.
pub fn compile(text: &str, stack: &mut Stack) -> Result<ValueType, CompileError> {
    let mut parser = Parser::new(text, stack);
    let ty = parser.parse_expr_generic(true);
    if ty.is_some() {
        parser.finalize();
    }
    match (parser.into_result(), ty) {
        (Ok(()), Some(ty)) => Ok(ty),
        (Err(err), _) => Err(err),
        (Ok(()), None) => Err(CompileError { kind: ErrorKind::Generic, offset: 0 }),
    }
}

struct Parser<'e, 's> {
    text: &'e str,
    /// Byte offset of the current (not yet accepted) symbol.
    pos: usize,
    stack: &'s mut Stack,
    ops_len: usize,
    curr: Symbol,
    prev: Symbol,
    error: Option<ErrorKind>,
}

/// Snapshot for the generic dispatcher's checkpointed rollback.
#[derive(Clone, Copy)]
struct Checkpoint {
    pos: usize,
    out_len: usize,
    ops_len: usize,
    curr: Symbol,
    prev: Symbol,
}

impl<'e, 's> Parser<'e, 's> {
    fn new(text: &'e str, stack: &'s mut Stack) -> Self {
        stack.clear();
        let mut parser = Parser {
            text,
            pos: 0,
            stack,
            ops_len: 0,
            curr: Symbol::none(),
            prev: Symbol::none(),
            error: None,
        };
        if parser.stack.reserved() == 0 {
            parser.error = Some(ErrorKind::Mem);
        }
        parser.consume();
        parser
    }

    fn into_result(self) -> Result<(), CompileError> {
        match self.error {
            None => Ok(()),
            Some(kind) => Err(CompileError { kind, offset: self.pos }),
        }
    }

    // ------------------------------------------------------------------
    // Symbol consumption
    // ------------------------------------------------------------------

    /// Accept the current symbol (feeding it to the shunting-yard driver)
    /// and read the next one.
    fn consume(&mut self) {
        if self.error.is_some() {
            return;
        }

        if self.curr.kind != SymKind::None {
            self.process_current_symbol();
            if self.error.is_some() {
                return;
            }
            self.pos = self.curr.lexeme.end();
        }

        if self.curr.kind == SymKind::End {
            return;
        }

        self.prev = self.curr;
        self.pos = skip_spaces(self.text, self.pos);
        match read_symbol(self.text, self.pos) {
            Ok(symbol) => self.curr = symbol,
            Err(kind) => self.error = Some(kind),
        }
    }

    /// Require the current symbol to be `kind`, then move past it.
    fn expect(&mut self, kind: SymKind) {
        if self.error.is_some() {
            return;
        }
        if self.curr.kind != kind {
            self.error = Some(ErrorKind::Syntax);
            return;
        }
        self.consume();
    }

    fn finalize(&mut self) {
        if self.error.is_some() {
            return;
        }
        if self.curr.kind == SymKind::End {
            self.consume();
        } else {
            self.error = Some(ErrorKind::Syntax);
        }
    }

    // ------------------------------------------------------------------
    // Shunting-yard driver
    // ------------------------------------------------------------------

    fn top_operator(&self) -> Option<Token> {
        if self.ops_len == 0 {
            None
        } else {
            Some(self.stack.data[self.stack.reserved() - self.ops_len])
        }
    }

    fn pop_operator(&mut self) {
        self.ops_len -= 1;
    }

    fn push_to_stack(&mut self, token: Token) {
        if self.stack.len + self.ops_len >= self.stack.reserved() {
            self.error = Some(ErrorKind::Mem);
            return;
        }
        self.stack.data[self.stack.len] = token;
        self.stack.len += 1;

        if matches!(token, Token::Func(_)) {
            self.simplify_stack();
        }
    }

    fn push_to_operators(&mut self, token: Token) {
        if self.stack.len + self.ops_len >= self.stack.reserved() {
            self.error = Some(ErrorKind::Mem);
            return;
        }
        let reserved = self.stack.reserved();
        self.ops_len += 1;
        self.stack.data[reserved - self.ops_len] = token;
    }

    /// Route one accepted symbol: values go to the output, operators pop
    /// by precedence, grouping symbols manipulate the sentinel.
    fn process_current_symbol(&mut self) {
        let kind = self.curr.kind;
        let token = create_token(&self.curr);

        if token.is_value() {
            self.push_to_stack(token);
            if kind == SymKind::EscapedStringVal {
                self.push_to_stack(Token::Func(&strings::UNESCAPE));
            }
            return;
        }

        if let Token::Func(def) = token {
            if def.precedence > 0 {
                while let Some(top) = self.top_operator() {
                    let Token::Func(top_def) = top else { break };
                    if def.precedence < top_def.precedence {
                        break;
                    }
                    if def.precedence == top_def.precedence && def.right_to_left {
                        break;
                    }
                    self.push_to_stack(top);
                    self.pop_operator();
                    if self.error.is_some() {
                        return;
                    }
                }
            }
            self.push_to_operators(token);
            return;
        }

        match kind {
            SymKind::ParenLeft => self.push_to_operators(Token::Null),
            SymKind::ParenRight => {
                loop {
                    match self.top_operator() {
                        None => {
                            self.error = Some(ErrorKind::Generic);
                            return;
                        }
                        Some(Token::Null) => {
                            self.pop_operator();
                            break;
                        }
                        Some(op) => {
                            self.push_to_stack(op);
                            self.pop_operator();
                            if self.error.is_some() {
                                return;
                            }
                        }
                    }
                }
                if let Some(op) = self.top_operator() {
                    if op.is_regular_func() {
                        self.push_to_stack(op);
                        self.pop_operator();
                    }
                }
            }
            SymKind::Comma => {
                while let Some(op) = self.top_operator() {
                    if matches!(op, Token::Null) {
                        break;
                    }
                    self.push_to_stack(op);
                    self.pop_operator();
                    if self.error.is_some() {
                        return;
                    }
                }
            }
            SymKind::End => {
                while let Some(op) = self.top_operator() {
                    if matches!(op, Token::Null) {
                        // Unmatched parenthesis.
                        self.error = Some(ErrorKind::Generic);
                        return;
                    }
                    self.push_to_stack(op);
                    self.pop_operator();
                    if self.error.is_some() {
                        return;
                    }
                }
            }
            _ => self.error = Some(ErrorKind::Generic),
        }
    }

    // ------------------------------------------------------------------
    // Constant folding
    // ------------------------------------------------------------------

    /// Fold the top of the output stack when it is a pure function over
    /// literal values. The unary-plus identity is dropped outright.
    fn simplify_stack(&mut self) {
        let len = self.stack.len;
        let Token::Func(def) = self.stack.data[len - 1] else {
            return;
        };
        if !def.is_pure() {
            return;
        }

        if std::ptr::eq(def, &math::IDENT) {
            self.stack.len -= 1;
            return;
        }

        let arity = def.arity();
        if len < arity + 1 {
            return;
        }
        for i in 0..arity {
            if !self.stack.data[len - 2 - i].is_fixed_value() {
                return;
            }
        }

        let mut scratch = Arena::empty();
        let mut ctx = EvalCtx::new(self.text, &mut scratch, None);
        let result = call_function(def, &self.stack.data[len - 1 - arity..len - 1], &mut ctx);

        self.stack.data[len - 1 - arity] = result;
        self.stack.len = len - arity;
    }

    // ------------------------------------------------------------------
    // Recursive descent, one routine per expression type
    // ------------------------------------------------------------------

    fn parse_expr_number(&mut self) {
        loop {
            if self.error.is_some() {
                return;
            }
            self.parse_term_number();
            if self.error.is_some() {
                return;
            }
            match self.curr.kind {
                SymKind::Add
                | SymKind::Sub
                | SymKind::Mul
                | SymKind::Div
                | SymKind::Mod
                | SymKind::Pow => self.consume(),
                _ => return,
            }
        }
    }

    fn parse_term_number(&mut self) {
        if self.error.is_some() {
            return;
        }

        match self.curr.kind {
            SymKind::ConstE
            | SymKind::ConstPi
            | SymKind::ConstInf
            | SymKind::ConstNan
            | SymKind::NumberVal
            | SymKind::Variable => self.consume(),
            SymKind::VariableFn => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_string();
                self.expect(SymKind::ParenRight);
            }
            SymKind::Abs
            | SymKind::Sqrt
            | SymKind::Sin
            | SymKind::Cos
            | SymKind::Tan
            | SymKind::Exp
            | SymKind::Log
            | SymKind::Ceil
            | SymKind::Floor
            | SymKind::Trunc => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_number();
                self.expect(SymKind::ParenRight);
            }
            SymKind::Max | SymKind::Min | SymKind::Modulo | SymKind::Power => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_number();
                self.expect(SymKind::Comma);
                self.parse_expr_number();
                self.expect(SymKind::ParenRight);
            }
            SymKind::Clamp => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_number();
                self.expect(SymKind::Comma);
                self.parse_expr_number();
                self.expect(SymKind::Comma);
                self.parse_expr_number();
                self.expect(SymKind::ParenRight);
            }
            SymKind::ParenLeft => {
                self.consume();
                self.parse_expr_number();
                self.expect(SymKind::ParenRight);
            }
            SymKind::Add => {
                if is_numeric_operator(self.prev.kind) {
                    self.error = Some(ErrorKind::Syntax);
                    return;
                }
                self.curr.kind = SymKind::Plus;
                self.consume();
                self.parse_expr_number();
            }
            SymKind::Sub => {
                if is_numeric_operator(self.prev.kind) {
                    self.error = Some(ErrorKind::Syntax);
                    return;
                }
                self.curr.kind = SymKind::Minus;
                self.consume();
                self.parse_expr_number();
            }
            SymKind::Length => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_string();
                self.expect(SymKind::ParenRight);
            }
            SymKind::Find => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_string();
                self.expect(SymKind::Comma);
                self.parse_expr_string();
                self.expect(SymKind::Comma);
                self.parse_expr_number();
                self.expect(SymKind::ParenRight);
            }
            SymKind::DatePart => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_datetime();
                self.expect(SymKind::Comma);
                self.parse_datepart();
                self.expect(SymKind::ParenRight);
            }
            SymKind::IfElse => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_bool();
                self.expect(SymKind::Comma);
                self.parse_expr_number();
                self.expect(SymKind::Comma);
                self.parse_expr_number();
                self.expect(SymKind::ParenRight);
            }
            _ => self.error = Some(ErrorKind::Syntax),
        }
    }

    fn parse_expr_string(&mut self) {
        loop {
            if self.error.is_some() {
                return;
            }
            self.parse_term_string();
            if self.error.is_some() {
                return;
            }
            match self.curr.kind {
                SymKind::Add => {
                    // String `+` is concatenation.
                    self.curr.kind = SymKind::Concat;
                    self.consume();
                }
                _ => return,
            }
        }
    }

    fn parse_term_string(&mut self) {
        if self.error.is_some() {
            return;
        }

        match self.curr.kind {
            SymKind::StringVal | SymKind::EscapedStringVal | SymKind::Variable => self.consume(),
            SymKind::VariableFn | SymKind::Trim | SymKind::Lower | SymKind::Upper
            | SymKind::Unescape => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_string();
                self.expect(SymKind::ParenRight);
            }
            SymKind::Str => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                let _ = self.parse_expr_generic(true);
                self.expect(SymKind::ParenRight);
            }
            SymKind::Min | SymKind::Max => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_string();
                self.expect(SymKind::Comma);
                self.parse_expr_string();
                self.expect(SymKind::ParenRight);
            }
            SymKind::Substr => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_string();
                self.expect(SymKind::Comma);
                self.parse_expr_number();
                self.expect(SymKind::Comma);
                self.parse_expr_number();
                self.expect(SymKind::ParenRight);
            }
            SymKind::Replace => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_string();
                self.expect(SymKind::Comma);
                self.parse_expr_string();
                self.expect(SymKind::Comma);
                self.parse_expr_string();
                self.expect(SymKind::ParenRight);
            }
            SymKind::IfElse => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_bool();
                self.expect(SymKind::Comma);
                self.parse_expr_string();
                self.expect(SymKind::Comma);
                self.parse_expr_string();
                self.expect(SymKind::ParenRight);
            }
            SymKind::ParenLeft => {
                self.consume();
                self.parse_expr_string();
                self.expect(SymKind::ParenRight);
            }
            _ => self.error = Some(ErrorKind::Syntax),
        }
    }

    fn parse_expr_bool(&mut self) {
        loop {
            if self.error.is_some() {
                return;
            }
            self.parse_term_bool();
            if self.error.is_some() {
                return;
            }
            match self.curr.kind {
                SymKind::And | SymKind::Or | SymKind::Eq | SymKind::Ne => self.consume(),
                _ => return,
            }
        }
    }

    fn parse_term_bool(&mut self) {
        if self.error.is_some() {
            return;
        }

        match self.curr.kind {
            SymKind::True | SymKind::False | SymKind::Variable => {
                self.consume();
                return;
            }
            SymKind::VariableFn => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_string();
                self.expect(SymKind::ParenRight);
                return;
            }
            SymKind::Not => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_bool();
                self.expect(SymKind::ParenRight);
                return;
            }
            SymKind::IsInf | SymKind::IsNan => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_number();
                self.expect(SymKind::ParenRight);
                return;
            }
            SymKind::IsError => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                let _ = self.parse_expr_generic(true);
                self.expect(SymKind::ParenRight);
                return;
            }
            SymKind::IfElse => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_bool();
                self.expect(SymKind::Comma);
                self.parse_expr_bool();
                self.expect(SymKind::Comma);
                self.parse_expr_bool();
                self.expect(SymKind::ParenRight);
                return;
            }
            SymKind::ParenLeft => {
                self.consume();
                self.parse_expr_bool();
                self.expect(SymKind::ParenRight);
                return;
            }
            _ => {}
        }

        // Not a boolean term: a comparison between two same-typed
        // sub-expressions (the type discovered generically).
        let Some(ty) = self.parse_expr_generic(false) else {
            return;
        };

        match self.curr.kind {
            SymKind::Lt
            | SymKind::Le
            | SymKind::Gt
            | SymKind::Ge
            | SymKind::Eq
            | SymKind::Ne => {
                self.consume();
                self.parse_expr_by_type(ty);
            }
            _ => self.error = Some(ErrorKind::Syntax),
        }
    }

    fn parse_expr_datetime(&mut self) {
        self.parse_term_datetime();
    }

    fn parse_term_datetime(&mut self) {
        if self.error.is_some() {
            return;
        }

        match self.curr.kind {
            SymKind::StringVal => self.parse_datetime_val(),
            SymKind::Variable => self.consume(),
            SymKind::VariableFn => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_string();
                self.expect(SymKind::ParenRight);
            }
            SymKind::Now => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.expect(SymKind::ParenRight);
            }
            SymKind::DateAdd | SymKind::DateSet => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_datetime();
                self.expect(SymKind::Comma);
                self.parse_expr_number();
                self.expect(SymKind::Comma);
                self.parse_datepart();
                self.expect(SymKind::ParenRight);
            }
            SymKind::DateTrunc => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_datetime();
                self.expect(SymKind::Comma);
                self.parse_datepart();
                self.expect(SymKind::ParenRight);
            }
            SymKind::Min | SymKind::Max => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_datetime();
                self.expect(SymKind::Comma);
                self.parse_expr_datetime();
                self.expect(SymKind::ParenRight);
            }
            SymKind::Clamp => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_datetime();
                self.expect(SymKind::Comma);
                self.parse_expr_datetime();
                self.expect(SymKind::Comma);
                self.parse_expr_datetime();
                self.expect(SymKind::ParenRight);
            }
            SymKind::IfElse => {
                self.consume();
                self.expect(SymKind::ParenLeft);
                self.parse_expr_bool();
                self.expect(SymKind::Comma);
                self.parse_expr_datetime();
                self.expect(SymKind::Comma);
                self.parse_expr_datetime();
                self.expect(SymKind::ParenRight);
            }
            _ => self.error = Some(ErrorKind::Syntax),
        }
    }

    /// A datetime literal is an ISO-8601 timestamp inside a plain string
    /// literal; the string is re-read lazily, only where the grammar
    /// expects a datetime.
    fn parse_datetime_val(&mut self) {
        if self.error.is_some() {
            return;
        }
        let SymVal::Str(span) = self.curr.val else {
            self.error = Some(ErrorKind::Syntax);
            return;
        };
        match scan::parse_datetime(span.slice(self.text)) {
            Ok(millis) => {
                self.curr.kind = SymKind::DatetimeVal;
                self.curr.val = SymVal::Datetime(millis);
                self.consume();
            }
            Err(_) => self.error = Some(ErrorKind::Syntax),
        }
    }

    /// A datepart is a plain string literal from the closed set
    /// `year month day hour minute second millis`, rewritten at parse
    /// time into its index 0..6.
    fn parse_datepart(&mut self) {
        if self.error.is_some() {
            return;
        }
        if self.curr.kind != SymKind::StringVal {
            self.error = Some(ErrorKind::Syntax);
            return;
        }
        let SymVal::Str(span) = self.curr.val else {
            self.error = Some(ErrorKind::Syntax);
            return;
        };
        match crate::datetime::get_datepart(span.slice(self.text)) {
            Some(part) => {
                self.curr.kind = SymKind::NumberVal;
                self.curr.val = SymVal::Number(part as f64);
                self.consume();
            }
            None => self.error = Some(ErrorKind::Syntax),
        }
    }

    // ------------------------------------------------------------------
    // Generic dispatch
    // ------------------------------------------------------------------

    fn parse_expr_by_type(&mut self, ty: ValueType) {
        if self.error.is_some() {
            return;
        }
        match ty {
            ValueType::Bool => self.parse_expr_bool(),
            ValueType::Number => self.parse_expr_number(),
            ValueType::Datetime => self.parse_expr_datetime(),
            ValueType::String => self.parse_expr_string(),
        }
    }

    /// Parse an expression whose type is unknown: checkpoint, try each
    /// type in order, roll back on failure. Memory, evaluation and
    /// circular-reference errors short-circuit; otherwise the worst error
    /// seen (and its position) is what the caller gets.
    fn parse_expr_generic(&mut self, check_bool: bool) -> Option<ValueType> {
        const TYPES: [ValueType; 4] = [
            ValueType::Bool,
            ValueType::Number,
            ValueType::Datetime,
            ValueType::String,
        ];

        if self.error.is_some() {
            return None;
        }

        let checkpoint = Checkpoint {
            pos: self.pos,
            out_len: self.stack.len,
            ops_len: self.ops_len,
            curr: self.curr,
            prev: self.prev,
        };
        let mut worst: Option<(ErrorKind, usize)> = None;

        for &ty in &TYPES[if check_bool { 0 } else { 1 }..] {
            self.parse_expr_by_type(ty);

            // An attempt counts only when it parsed to completion: the
            // next symbol must be one an enclosing context can accept.
            // Otherwise a bare `$x` would parse as a boolean and hijack
            // the dispatch from `$x + 1`.
            let kind = match self.error {
                None if self.at_expression_boundary() => return Some(ty),
                None => ErrorKind::Syntax,
                Some(kind) => kind,
            };
            if matches!(kind, ErrorKind::Mem | ErrorKind::Eval | ErrorKind::CircularRef) {
                return None;
            }
            if worst.map_or(true, |(w, _)| kind > w) {
                worst = Some((kind, self.pos));
            }
            self.restore(checkpoint);
        }

        if let Some((kind, pos)) = worst {
            self.error = Some(kind);
            self.pos = pos;
        }
        None
    }

    /// Symbols that may follow a completed generic sub-expression: end of
    /// input, a closing parenthesis, or a comparison operator (for the
    /// boolean fallthrough).
    fn at_expression_boundary(&self) -> bool {
        matches!(
            self.curr.kind,
            SymKind::End
                | SymKind::ParenRight
                | SymKind::Lt
                | SymKind::Le
                | SymKind::Gt
                | SymKind::Ge
                | SymKind::Eq
                | SymKind::Ne
        )
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.stack.len = checkpoint.out_len;
        self.ops_len = checkpoint.ops_len;
        self.curr = checkpoint.curr;
        self.prev = checkpoint.prev;
        self.error = None;
    }
}

fn is_numeric_operator(kind: SymKind) -> bool {
    matches!(
        kind,
        SymKind::Plus
            | SymKind::Minus
            | SymKind::Add
            | SymKind::Sub
            | SymKind::Mul
            | SymKind::Div
            | SymKind::Mod
            | SymKind::Pow
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::StrVal;

    fn compiled(text: &str) -> Stack {
        let mut stack = Stack::with_capacity(64);
        compile(text, &mut stack).expect("expression should compile");
        stack
    }

    fn number_stream(text: &str) -> Vec<String> {
        let mut stack = Stack::with_capacity(64);
        compile_number(text, &mut stack).expect("expression should compile");
        stack
            .tokens()
            .iter()
            .map(|t| match t {
                Token::Number(n) => n.to_string(),
                Token::Var(span) => format!("${}", span.slice(text)),
                Token::Func(def) => def.name.to_string(),
                Token::Error(e) => e.code().to_string(),
                other => format!("{other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_literal_expression_folds_to_single_token() {
        for (expr, expected) in [
            ("1+2*3", 7.0),
            ("2^2^3", 64.0), // power is left-associative
            ("-2^2", -4.0),  // unary minus binds looser than power
            ("trunc(3.7)^2", 9.0),
            ("min(4, 2) + max(1, 3)", 5.0),
            ("clamp(10, 1, 5)", 5.0),
            ("(1+2)*(3+4)", 21.0),
            ("mod(10, 3)", 1.0),
            ("abs(-5)", 5.0),
        ] {
            let stack = compiled(expr);
            assert_eq!(stack.len(), 1, "{expr} should fold to one token");
            let Token::Number(n) = stack.tokens()[0] else {
                panic!("{expr} should fold to a number");
            };
            assert_eq!(n, expected, "folding {expr}");
        }
    }

    #[test]
    fn test_unary_plus_is_dropped() {
        let stack = compiled("+5");
        assert_eq!(stack.len(), 1);
        assert!(matches!(stack.tokens()[0], Token::Number(n) if n == 5.0));
    }

    #[test]
    fn test_rpn_order_with_variables() {
        assert_eq!(number_stream("1 + $a"), vec!["1", "$a", "+"]);
        assert_eq!(number_stream("$a + $b * $c"), vec!["$a", "$b", "$c", "*", "+"]);
        assert_eq!(number_stream("($a + $b) * $c"), vec!["$a", "$b", "+", "$c", "*"]);
        assert_eq!(number_stream("-$a^2"), vec!["$a", "2", "^", "neg"]);
        assert_eq!(number_stream("min($a, 1)"), vec!["$a", "1", "min"]);
        // Constant sub-expressions still fold around variables.
        assert_eq!(number_stream("$a + 2 * 3"), vec!["$a", "6", "+"]);
    }

    #[test]
    fn test_datepart_literal_rewrites_to_number() {
        let mut stack = Stack::with_capacity(64);
        compile_number("datepart($d, \"day\")", &mut stack).unwrap();
        let names: Vec<String> = stack
            .tokens()
            .iter()
            .map(|t| match t {
                Token::Number(n) => n.to_string(),
                Token::Var(_) => "$".into(),
                Token::Func(def) => def.name.into(),
                _ => "?".into(),
            })
            .collect();
        assert_eq!(names, vec!["$", "2", "datepart"]);
    }

    #[test]
    fn test_impure_calls_do_not_fold() {
        let mut stack = Stack::with_capacity(64);
        compile_string("upper(\"ab\")", &mut stack).unwrap();
        assert_eq!(stack.len(), 2);
        assert!(matches!(stack.tokens()[0], Token::Str(StrVal::Source(_))));
        assert!(matches!(stack.tokens()[1], Token::Func(def) if def.name == "upper"));

        let mut stack = Stack::with_capacity(64);
        compile_datetime("now()", &mut stack).unwrap();
        assert_eq!(stack.len(), 1);
        assert!(matches!(stack.tokens()[0], Token::Func(def) if def.name == "now"));

        let mut stack = Stack::with_capacity(64);
        compile_number("variable(\"a\")", &mut stack).unwrap();
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_escaped_string_emits_unescape() {
        let mut stack = Stack::with_capacity(64);
        compile_string("\"a\\nb\"", &mut stack).unwrap();
        assert_eq!(stack.len(), 2);
        assert!(matches!(stack.tokens()[1], Token::Func(def) if def.name == "unescape"));

        // A plain string does not.
        let mut stack = Stack::with_capacity(64);
        compile_string("\"ab\"", &mut stack).unwrap();
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_division_by_zero_folds_to_error_value() {
        let mut stack = Stack::with_capacity(64);
        compile_number("1/0", &mut stack).unwrap();
        assert_eq!(stack.len(), 1);
        assert!(matches!(
            stack.tokens()[0],
            Token::Error(ErrorKind::DivByZero)
        ));
    }

    #[test]
    fn test_generic_compile_reports_type() {
        let mut stack = Stack::with_capacity(64);
        assert_eq!(compile("1+1", &mut stack), Ok(ValueType::Number));
        assert_eq!(compile("true || false", &mut stack), Ok(ValueType::Bool));
        assert_eq!(compile("\"a\" + \"b\"", &mut stack), Ok(ValueType::String));
        assert_eq!(
            compile("datetrunc(\"2024-05-06\", \"month\")", &mut stack),
            Ok(ValueType::Datetime)
        );
        assert_eq!(compile("1 < 2", &mut stack), Ok(ValueType::Bool));
        assert_eq!(
            compile("\"2024-01-01\" < \"2024-06-01\"", &mut stack),
            Ok(ValueType::Bool)
        );
    }

    #[test]
    fn test_syntax_error_offsets() {
        let mut stack = Stack::with_capacity(64);

        let err = compile("(", &mut stack).unwrap_err();
        assert_eq!(err, CompileError { kind: ErrorKind::Syntax, offset: 1 });

        let err = compile("1 + ", &mut stack).unwrap_err();
        assert_eq!(err, CompileError { kind: ErrorKind::Syntax, offset: 4 });

        let err = compile_number("1 +", &mut stack).unwrap_err();
        assert_eq!(err, CompileError { kind: ErrorKind::Syntax, offset: 3 });

        let err = compile_number("", &mut stack).unwrap_err();
        assert_eq!(err, CompileError { kind: ErrorKind::Syntax, offset: 0 });

        // Trailing input is caught at finalization.
        let err = compile_number("1)", &mut stack).unwrap_err();
        assert_eq!(err, CompileError { kind: ErrorKind::Syntax, offset: 1 });

        let err = compile_number("(1", &mut stack).unwrap_err();
        assert_eq!(err, CompileError { kind: ErrorKind::Syntax, offset: 2 });
    }

    #[test]
    fn test_sign_after_numeric_operator_is_rejected() {
        let mut stack = Stack::with_capacity(64);
        assert!(compile_number("1 * -3", &mut stack).is_err());
        assert!(compile_number("2^-1", &mut stack).is_err());
        assert!(compile_number("1 + + 2", &mut stack).is_err());
        // Parenthesized signs are fine.
        assert!(compile_number("1 * (-3)", &mut stack).is_ok());
    }

    #[test]
    fn test_value_error_wins_over_syntax_position() {
        let mut stack = Stack::with_capacity(64);
        // 2^53 + 1 cannot be represented: a value error, not a syntax one.
        let err = compile_number("9007199254740993", &mut stack).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Value);
    }

    #[test]
    fn test_workspace_exhaustion_is_memory_error() {
        let mut stack = Stack::with_capacity(2);
        let err = compile_number("$a + $b", &mut stack).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Mem);

        let mut stack = Stack::with_capacity(0);
        let err = compile_number("1", &mut stack).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Mem);
    }

    #[test]
    fn test_unknown_identifier_is_syntax_error() {
        let mut stack = Stack::with_capacity(64);
        let err = compile_number("bogus(1)", &mut stack).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn test_datetime_literals_are_lazy() {
        let mut stack = Stack::with_capacity(64);
        // As a datetime expression the string re-reads as a timestamp...
        compile_datetime("\"2024-08-24\"", &mut stack).unwrap();
        assert!(matches!(stack.tokens()[0], Token::Datetime(_)));
        // ...as a string expression it stays a string.
        compile_string("\"2024-08-24\"", &mut stack).unwrap();
        assert!(matches!(stack.tokens()[0], Token::Str(_)));
        // And a malformed timestamp is rejected where a datetime is needed.
        assert!(compile_datetime("\"2024-13-01\"", &mut stack).is_err());
    }

    #[test]
    fn test_bool_chains_and_precedence() {
        let mut stack = Stack::with_capacity(64);
        compile_bool("true && false || true", &mut stack).unwrap();
        assert_eq!(stack.len(), 1);
        assert!(matches!(stack.tokens()[0], Token::Bool(true)));

        compile_bool("1 < 2 == true", &mut stack).unwrap();
        assert!(matches!(stack.tokens()[0], Token::Bool(true)));
    }
}
