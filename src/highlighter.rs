// ABOUTME: Syntax highlighter for the REPL
// Implements rustyline's Highlighter trait to colorize expression syntax
// while preserving display width.

use rustyline::highlight::{CmdKind, Highlighter};
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;

// ANSI color codes (3-bit/4-bit colors for maximum terminal compatibility)
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_PARENS: &str = "\x1b[1;34m"; // Bold blue
const COLOR_IDENT: &str = "\x1b[36m"; // Cyan
const COLOR_NUMBER: &str = "\x1b[33m"; // Yellow
const COLOR_STRING: &str = "\x1b[32m"; // Green
const COLOR_VARIABLE: &str = "\x1b[1;35m"; // Bold magenta
const COLOR_COMMENT: &str = "\x1b[90m"; // Bright black (gray)

/// Rustyline helper providing color highlighting for expression syntax.
#[derive(Completer, Helper, Hinter, Validator)]
pub struct ExprHelper;

impl ExprHelper {
    pub fn new() -> Self {
        ExprHelper
    }
}

impl Default for ExprHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter for ExprHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let highlighted = highlight_line(line);
        if highlighted == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(highlighted)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn push_colored(out: &mut String, color: &str, text: &str) {
    out.push_str(color);
    out.push_str(text);
    out.push_str(COLOR_RESET);
}

fn highlight_line(line: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            // Comment lines (the host skips them, still worth dimming).
            '#' if i == 0 => {
                push_colored(&mut out, COLOR_COMMENT, &chars[i..].iter().collect::<String>());
                break;
            }

            '"' => {
                let start = i;
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        i += 2;
                    } else if chars[i] == '"' {
                        i += 1;
                        break;
                    } else {
                        i += 1;
                    }
                }
                push_colored(&mut out, COLOR_STRING, &chars[start..i].iter().collect::<String>());
            }

            '$' => {
                let start = i;
                i += 1;
                if i < chars.len() && chars[i] == '{' {
                    while i < chars.len() && chars[i] != '}' {
                        i += 1;
                    }
                    if i < chars.len() {
                        i += 1;
                    }
                } else {
                    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                        i += 1;
                    }
                }
                push_colored(&mut out, COLOR_VARIABLE, &chars[start..i].iter().collect::<String>());
            }

            '0'..='9' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E' | '+' | '-'))
                {
                    // Signs only continue a number right after an exponent.
                    if matches!(chars[i], '+' | '-')
                        && !matches!(chars[i - 1], 'e' | 'E')
                    {
                        break;
                    }
                    i += 1;
                }
                push_colored(&mut out, COLOR_NUMBER, &chars[start..i].iter().collect::<String>());
            }

            'A'..='Z' | 'a'..='z' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                push_colored(&mut out, COLOR_IDENT, &chars[start..i].iter().collect::<String>());
            }

            '(' | ')' | ',' => {
                push_colored(&mut out, COLOR_PARENS, &chars[i].to_string());
                i += 1;
            }

            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}
