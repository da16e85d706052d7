mod config;
mod highlighter;

use clap::Parser;
use config::{
    DEFAULT_STACK_SIZE, HISTORY_FILE, INFO_TEXT, VERSION, WELCOME_FOOTER, WELCOME_MESSAGE,
    WELCOME_SUBTITLE,
};
use formulet::{
    compile, evaluate, identifier_names, parse_datetime, CompileError, ErrorKind, EvalStack,
    Resolved, Stack, Value,
};
use highlighter::ExprHelper;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use serde::Deserialize;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;

/// Formula calculator: each line is compiled and evaluated, and earlier
/// lines are available as `${<line number>}`.
#[derive(Parser, Debug)]
#[command(name = "formulet")]
#[command(version = VERSION)]
#[command(about = "A calculator for spreadsheet-style formulas")]
#[command(long_about = "Each input line compiles to an expression and is evaluated \
immediately; line <n> is then available to later lines as ${<n>}.")]
struct CliArgs {
    /// Script file to evaluate line by line (reads stdin when omitted)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Workspace size, in tokens, for compiling and evaluating each line
    #[arg(long = "stack-size", value_name = "TOKENS", default_value_t = DEFAULT_STACK_SIZE)]
    stack_size: usize,

    /// JSON file with named variables (bools, numbers, strings;
    /// ISO-8601 strings load as datetimes)
    #[arg(long = "vars", value_name = "FILE")]
    vars: Option<PathBuf>,
}

/// A line's result, owned so it can be cached across lines.
#[derive(Debug, Clone, PartialEq)]
enum OwnedValue {
    Bool(bool),
    Number(f64),
    Datetime(u64),
    Str(String),
    Error(ErrorKind),
}

impl OwnedValue {
    fn from_value(value: Value<'_>) -> Self {
        match value {
            Value::Bool(b) => OwnedValue::Bool(b),
            Value::Number(n) => OwnedValue::Number(n),
            Value::Datetime(d) => OwnedValue::Datetime(d),
            Value::Str(s) => OwnedValue::Str(s.to_string()),
            Value::Error(e) => OwnedValue::Error(e),
        }
    }

    fn to_resolved(&self) -> Resolved<'static> {
        match self {
            OwnedValue::Bool(b) => Resolved::Bool(*b),
            OwnedValue::Number(n) => Resolved::Number(*n),
            OwnedValue::Datetime(d) => Resolved::Datetime(*d),
            OwnedValue::Str(s) => Resolved::Str(Cow::Owned(s.clone())),
            OwnedValue::Error(e) => Resolved::Error(*e),
        }
    }
}

impl fmt::Display for OwnedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnedValue::Bool(b) => write!(f, "{}", Value::Bool(*b)),
            OwnedValue::Number(n) => write!(f, "{}", Value::Number(*n)),
            OwnedValue::Datetime(d) => write!(f, "{}", Value::Datetime(*d)),
            OwnedValue::Str(s) => write!(f, "{}", Value::Str(s)),
            OwnedValue::Error(e) => write!(f, "{}", Value::Error(*e)),
        }
    }
}

/// One REPL session: entered lines, named variables, and memoized line
/// results. Referencing a line that is still being evaluated is a cycle.
struct Session {
    stack_size: usize,
    lines: Vec<String>,
    vars: HashMap<String, OwnedValue>,
    cache: RefCell<HashMap<usize, OwnedValue>>,
    in_flight: RefCell<HashSet<usize>>,
}

impl Session {
    fn new(stack_size: usize, vars: HashMap<String, OwnedValue>) -> Self {
        Self {
            stack_size,
            lines: Vec::new(),
            vars,
            cache: RefCell::new(HashMap::new()),
            in_flight: RefCell::new(HashSet::new()),
        }
    }

    /// Record one input line and evaluate it. Returns the text to print,
    /// or `None` for blank and comment lines.
    fn process_line(&mut self, line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        self.lines.push(trimmed.to_string());
        let n = self.lines.len();

        Some(match self.eval_line(n) {
            Ok(value) => value.to_string(),
            Err(CompileError { kind: ErrorKind::Syntax, offset }) => {
                format!("Syntax error at position {}", offset + 1)
            }
            Err(CompileError { kind: ErrorKind::Mem, .. }) => "Not enough memory".to_string(),
            Err(CompileError { kind, .. }) => format!("Unexpected error ({kind})"),
        })
    }

    /// Compile and evaluate line `n` (1-based), memoizing the result.
    fn eval_line(&self, n: usize) -> Result<OwnedValue, CompileError> {
        self.in_flight.borrow_mut().insert(n);
        let result = self.eval_line_inner(n);
        self.in_flight.borrow_mut().remove(&n);

        let value = match &result {
            Ok(v) => v.clone(),
            Err(e) => OwnedValue::Error(e.kind),
        };
        self.cache.borrow_mut().insert(n, value);
        result
    }

    fn eval_line_inner(&self, n: usize) -> Result<OwnedValue, CompileError> {
        let text = &self.lines[n - 1];
        let mut stack = Stack::with_capacity(self.stack_size);
        compile(text, &mut stack)?;

        let mut aux = EvalStack::with_capacity(self.stack_size);
        let mut resolver = |name: &str| self.resolve(name);
        let value = evaluate(&stack, text, &mut aux, Some(&mut resolver));
        Ok(OwnedValue::from_value(value))
    }

    /// Resolver callback: named variables first, then `${<n>}` line
    /// references evaluated on demand.
    fn resolve(&self, name: &str) -> Resolved<'static> {
        if let Some(value) = self.vars.get(name) {
            return value.to_resolved();
        }

        let Ok(n) = name.parse::<usize>() else {
            return Resolved::Error(ErrorKind::Ref);
        };
        if n == 0 || n > self.lines.len() {
            return Resolved::Error(ErrorKind::Ref);
        }
        if self.in_flight.borrow().contains(&n) {
            return Resolved::Error(ErrorKind::CircularRef);
        }
        if let Some(cached) = self.cache.borrow().get(&n) {
            return cached.to_resolved();
        }

        match self.eval_line(n) {
            Ok(value) => value.to_resolved(),
            Err(err) => Resolved::Error(err.kind),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let vars = match &args.vars {
        Some(path) => load_vars(path)?,
        None => HashMap::new(),
    };
    let mut session = Session::new(args.stack_size.max(1), vars);

    if let Some(path) = &args.script {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read script file {}: {}", path.display(), e))?;
        for line in contents.lines() {
            if let Some(output) = session.process_line(line) {
                println!("{output}");
            }
        }
        return Ok(());
    }

    if !std::io::stdin().is_terminal() {
        stream_mode(&mut session);
        return Ok(());
    }

    interactive_mode(&mut session)
}

/// Piped input: echo the prompt and the line, then the result.
fn stream_mode(session: &mut Session) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        println!("formulet[{}]> {}", session.lines.len() + 1, line);
        if let Some(output) = session.process_line(&line) {
            println!("{output}");
        }
    }
}

fn interactive_mode(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl = Editor::with_config(config)
        .map_err(|e| format!("Failed to initialize REPL: {}", e))?;
    rl.set_helper(Some(ExprHelper::new()));
    let _ = rl.load_history(HISTORY_FILE);

    println!("{WELCOME_MESSAGE}");
    println!("{WELCOME_SUBTITLE}");
    println!("{WELCOME_FOOTER}");
    println!();

    loop {
        let prompt = format!("formulet[{}]> ", session.lines.len() + 1);
        match rl.readline(&prompt) {
            Ok(line) => {
                match line.trim() {
                    "" => continue,
                    "exit" => break,
                    "info" => {
                        println!("{INFO_TEXT}");
                        continue;
                    }
                    "identifiers" => {
                        print_identifiers();
                        continue;
                    }
                    _ => {}
                }
                if let Some(output) = session.process_line(&line) {
                    println!("{output}");
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    Ok(())
}

/// Render the identifier list as a markdown table.
fn print_identifiers() {
    let mut md = String::from("|:-:|:-:|:-:|:-:|:-:|\n");
    let names: Vec<&str> = identifier_names().collect();
    for row in names.chunks(5) {
        md.push('|');
        for name in row {
            md.push_str(name);
            md.push('|');
        }
        md.push('\n');
    }
    md.push_str("|-\n");
    termimad::print_text(&md);
}

/// One `--vars` entry: a JSON scalar.
#[derive(Deserialize)]
#[serde(untagged)]
enum VarScalar {
    Bool(bool),
    Number(f64),
    Str(String),
}

/// Load `--vars`: a JSON object of scalars. ISO-8601 strings become
/// datetimes; everything else keeps its JSON type.
fn load_vars(path: &PathBuf) -> Result<HashMap<String, OwnedValue>, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read vars file {}: {}", path.display(), e))?;
    let parsed: HashMap<String, VarScalar> = serde_json::from_str(&contents)
        .map_err(|e| format!("Invalid vars file {}: {}", path.display(), e))?;

    let vars = parsed
        .into_iter()
        .map(|(name, value)| {
            let owned = match value {
                VarScalar::Bool(b) => OwnedValue::Bool(b),
                VarScalar::Number(n) => OwnedValue::Number(n),
                VarScalar::Str(s) => match parse_datetime(&s) {
                    Ok(millis) => OwnedValue::Datetime(millis),
                    Err(_) => OwnedValue::Str(s),
                },
            };
            (name, owned)
        })
        .collect();
    Ok(vars)
}
