//! An embeddable spreadsheet-style expression language.
//!
//! Expressions over four value kinds (boolean, number, datetime, string)
//! compile into a reverse-Polish instruction stream held in a caller-owned
//! [`Stack`], then evaluate against a caller-supplied variable resolver
//! using a caller-owned [`EvalStack`]. Neither step allocates beyond the
//! workspaces the host created up front.
//!
//! ```
//! use formulet::{EvalStack, Stack, Value};
//!
//! let mut stack = Stack::with_capacity(64);
//! let mut aux = EvalStack::with_capacity(64);
//! let result = formulet::eval_number("trunc(3.7)^2", &mut stack, &mut aux, None);
//! assert_eq!(result, Value::Number(9.0));
//! ```

mod builtins;
mod datetime;
mod error;
mod eval;
mod lexer;
mod parser;
mod scan;
mod stack;
mod symbols;
mod value;

pub use datetime::Iso;
pub use error::{CompileError, ErrorKind};
pub use eval::{
    eval, eval_bool, eval_datetime, eval_number, eval_string, evaluate, EvalCtx, Resolved,
    Resolver,
};
pub use parser::{compile, compile_bool, compile_datetime, compile_number, compile_string};
pub use scan::{parse_any, parse_bool, parse_datetime, parse_number, parse_string};
pub use stack::{EvalStack, Stack};
pub use symbols::identifier_names;
pub use value::{Callable, FuncDef, Span, StrVal, Token, Value, ValueType, TOKEN_BYTES};
