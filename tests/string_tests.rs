// ABOUTME: String function behavior and temporary-string arena discipline

use formulet::{eval_string, ErrorKind, EvalStack, Resolved, Stack, Value, TOKEN_BYTES};
use std::borrow::Cow;

fn resolve(name: &str) -> Resolved<'static> {
    match name {
        "p" => Resolved::Str(Cow::Borrowed("Bob")),
        "q" => Resolved::Str(Cow::Borrowed("John")),
        "s" => Resolved::Str(Cow::Borrowed("lorem ipsum")),
        "pad" => Resolved::Str(Cow::Borrowed("  MiXeD case  ")),
        "esc" => Resolved::Str(Cow::Borrowed(r"a\nb\qc")),
        "wide" => Resolved::Str(Cow::Borrowed("año nuevo")),
        _ => Resolved::Error(ErrorKind::Ref),
    }
}

fn run(expr: &str, capacity: usize) -> Result<String, ErrorKind> {
    let mut stack = Stack::with_capacity(128);
    let mut aux = EvalStack::with_capacity(capacity);
    let mut resolver = |name: &str| resolve(name);
    match eval_string(expr, &mut stack, &mut aux, Some(&mut resolver)) {
        Value::Str(s) => Ok(s.to_string()),
        Value::Error(e) => Err(e),
        other => panic!("{expr}: expected a string, got {other:?}"),
    }
}

fn check(expr: &str, expected: &str) {
    assert_eq!(run(expr, 256).as_deref(), Ok(expected), "{expr}");
}

#[test]
fn test_case_mapping() {
    check("upper($p)", "BOB");
    check("lower($q)", "john");
    check("upper(\"mixed UP\")", "MIXED UP");
    // ASCII-only mapping: multibyte characters pass through untouched.
    check("upper($wide)", "AñO NUEVO");
}

#[test]
fn test_trim() {
    check("trim(\"  padded  \")", "padded");
    check("trim(\"nothing\")", "nothing");
    check("trim(\"\")", "");
    check("trim(upper($pad))", "MIXED CASE");
}

#[test]
fn test_concat() {
    check("\"Hi \" + $p + \"!\"", "Hi Bob!");
    check("\"\" + $p", "Bob");
    check("$p + $q", "BobJohn");
}

#[test]
fn test_substr() {
    check("substr($s, 6, 5)", "ipsum");
    check("substr($s, 6, 99)", "ipsum");
    check("substr($s, 0, 5)", "lorem");
    check("substr(\"hello\", 1, 3)", "ell");
    check("substr($s, 99, 1)", "");
}

#[test]
fn test_replace() {
    check("replace($s, \"o\", \"0\")", "l0rem ipsum");
    check("replace(\"banana\", \"an\", \"AN\")", "bANANa");
    check("replace($s, \"zzz\", \"x\")", "lorem ipsum");
    check("replace(\"aaa\", \"\", \"x\")", "aaa");
}

#[test]
fn test_escaped_literals_unescape_automatically() {
    check(r#""a\nb""#, "a\nb");
    check(r#""tab\there""#, "tab\there");
    check(r#""say \"hi\"""#, "say \"hi\"");
    check(r#""back\\slash""#, "back\\slash");
    // Unrecognized escapes stay verbatim.
    check(r#""odd\qescape""#, "odd\\qescape");
}

#[test]
fn test_unescape_function_is_idempotent() {
    check("unescape($esc)", "a\nb\\qc");
    assert_eq!(run("unescape(unescape($esc))", 256), run("unescape($esc)", 256));
}

#[test]
fn test_trim_lower_upper_idempotence() {
    for (once, twice) in [
        ("trim($pad)", "trim(trim($pad))"),
        ("lower($pad)", "lower(lower($pad))"),
        ("upper($pad)", "upper(upper($pad))"),
    ] {
        assert_eq!(run(once, 256), run(twice, 256), "{twice}");
    }
}

#[test]
fn test_string_selection() {
    check("min($p, $q)", "Bob");
    check("max($p, $q)", "John");
    check("ifelse(length($p) < length($q), $p, $q)", "Bob");
    check("str(2.5)", "2.5");
    check("str(true)", "true");
    check("str($p)", "Bob");
}

#[test]
fn test_pipeline_reuses_arena_storage() {
    // Each stage frees its consumed temporary, so a chain of rewrites
    // fits a workspace sized for roughly two live copies, not five.
    let expr = "trim(upper(lower(trim($pad))))";
    let needed = 6 + (3 * "  MiXeD case  ".len()).div_ceil(TOKEN_BYTES);
    assert_eq!(run(expr, needed).as_deref(), Ok("MIXED CASE"), "capacity {needed}");
}

#[test]
fn test_arena_exhaustion_is_memory_error() {
    assert_eq!(run("upper($s) + lower($s)", 2), Err(ErrorKind::Mem));
}

#[test]
fn test_length_and_find_are_byte_based() {
    let mut stack = Stack::with_capacity(128);
    let mut aux = EvalStack::with_capacity(128);
    let mut resolver = |name: &str| resolve(name);
    assert_eq!(
        formulet::eval_number("length($wide)", &mut stack, &mut aux, Some(&mut resolver)),
        Value::Number(10.0)
    );
    let mut resolver = |name: &str| resolve(name);
    assert_eq!(
        formulet::eval_number(
            "find(\"ipsum\", $s, 0)",
            &mut stack,
            &mut aux,
            Some(&mut resolver)
        ),
        Value::Number(6.0)
    );
    let mut resolver = |name: &str| resolve(name);
    assert_eq!(
        formulet::eval_number(
            "find(\"ipsum\", $s, 7)",
            &mut stack,
            &mut aux,
            Some(&mut resolver)
        ),
        Value::Number(-1.0)
    );
}
