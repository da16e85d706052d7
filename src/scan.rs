// ABOUTME: Strict single-literal parsers (numbers, booleans, ISO-8601
// datetimes, strings), used standalone and by the lexer.

use crate::datetime::Fields;
use crate::error::ErrorKind;
use crate::value::Value;
use nom::{
    branch::alt,
    bytes::complete::take_while_m_n,
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map_res, opt, recognize, verify},
    sequence::preceded,
    IResult, Parser,
};

// ============================================================================
// Numbers (RFC-7159 grammar)
// ============================================================================

/// `0 | [1-9][0-9]*`, also the exponent body, which forbids leading zeros.
fn dec_uint(input: &str) -> IResult<&str, &str> {
    alt((
        recognize((one_of("123456789"), digit0)),
        recognize(char('0')),
    ))
    .parse(input)
}

fn number_lexeme(input: &str) -> IResult<&str, &str> {
    recognize((
        dec_uint,
        opt((char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), dec_uint)),
    ))
    .parse(input)
}

/// Scan an unsigned number prefix, returning the consumed byte count and
/// the value. Integer lexemes longer than 16 digits or above 2^53 are
/// value errors; float overflow is a value error.
pub(crate) fn scan_number(input: &str) -> Result<(usize, f64), ErrorKind> {
    let (rest, lexeme) = number_lexeme(input).map_err(|_| ErrorKind::Syntax)?;

    // A trailing digit can only appear after a lone `0` integer part or a
    // zero exponent; the former is always malformed, the latter only when
    // the digit is non-zero (`1e00` lexes as `1e0`, `1e04` does not lex).
    if let Some(&b) = rest.as_bytes().first() {
        if b.is_ascii_digit() && (lexeme == "0" || b != b'0') {
            return Err(ErrorKind::Syntax);
        }
    }

    let is_float = lexeme.bytes().any(|b| matches!(b, b'.' | b'e' | b'E'));
    let value = if is_float {
        let v: f64 = lexeme.parse().map_err(|_| ErrorKind::Value)?;
        if !v.is_finite() {
            return Err(ErrorKind::Value);
        }
        v
    } else {
        if lexeme.len() > 16 {
            return Err(ErrorKind::Value);
        }
        let v: i64 = lexeme.parse().map_err(|_| ErrorKind::Value)?;
        if v > 1i64 << 53 {
            return Err(ErrorKind::Value);
        }
        v as f64
    };

    Ok((lexeme.len(), value))
}

/// Parse a whole input as a JSON-style number with an optional sign.
pub fn parse_number(text: &str) -> Result<f64, ErrorKind> {
    let (negated, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (len, value) = scan_number(rest).map_err(|_| ErrorKind::Value)?;
    if len != rest.len() {
        return Err(ErrorKind::Value);
    }
    Ok(if negated { -value } else { value })
}

// ============================================================================
// Booleans
// ============================================================================

/// Accepted spellings: `true True TRUE false False FALSE`.
pub fn parse_bool(text: &str) -> Result<bool, ErrorKind> {
    match text {
        "true" | "True" | "TRUE" => Ok(true),
        "false" | "False" | "FALSE" => Ok(false),
        _ => Err(ErrorKind::Value),
    }
}

// ============================================================================
// Datetimes (ISO-8601, `YYYY-MM-DD[Thh:mm:ss[.SSS][Z]]`)
// ============================================================================

fn two_digits(input: &str) -> IResult<&str, u32> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_digit()),
        str::parse,
    )
    .parse(input)
}

fn time_part(input: &str) -> IResult<&str, (u32, u32, u32, u32)> {
    let (input, hour) = verify(two_digits, |h| *h <= 23).parse(input)?;
    let (input, _) = char(':').parse(input)?;
    let (input, minute) = verify(two_digits, |m| *m <= 59).parse(input)?;
    let (input, _) = char(':').parse(input)?;
    let (input, second) = verify(two_digits, |s| *s <= 59).parse(input)?;
    let (input, millis) = opt(preceded(
        char('.'),
        map_res(
            take_while_m_n(1, 3, |c: char| c.is_ascii_digit()),
            str::parse::<u32>,
        ),
    ))
    .parse(input)?;
    let (input, _) = opt(char('Z')).parse(input)?;
    Ok((input, (hour, minute, second, millis.unwrap_or(0))))
}

fn datetime_fields(input: &str) -> IResult<&str, Fields> {
    let (input, year) = verify(
        map_res(
            take_while_m_n(4, 4, |c: char| c.is_ascii_digit()),
            str::parse::<i64>,
        ),
        |y| (1970..=2999).contains(y),
    )
    .parse(input)?;
    let (input, _) = char('-').parse(input)?;
    let (input, month) = verify(two_digits, |m| (1..=12).contains(m)).parse(input)?;
    let (input, _) = char('-').parse(input)?;
    let (input, day) = verify(two_digits, |d| (1..=31).contains(d)).parse(input)?;
    let (input, time) = opt(preceded(char('T'), time_part)).parse(input)?;
    let (hour, minute, second, millis) = time.unwrap_or((0, 0, 0, 0));
    Ok((input, Fields { year, month, day, hour, minute, second, millis }))
}

/// Parse a whole input as an ISO-8601 datetime, returning epoch millis.
/// The day is validated against the month length and the leap-year rule.
pub fn parse_datetime(text: &str) -> Result<u64, ErrorKind> {
    let (rest, fields) = datetime_fields(text).map_err(|_| ErrorKind::Value)?;
    if !rest.is_empty() {
        return Err(ErrorKind::Value);
    }
    fields.to_millis().ok_or(ErrorKind::Value)
}

// ============================================================================
// Strings and the generic entry point
// ============================================================================

/// Any byte range qualifies as a string as long as it has no interior NUL
/// and fits a 32-bit length. No quotes, no unescaping.
pub fn parse_string(text: &str) -> Result<&str, ErrorKind> {
    if text.len() > u32::MAX as usize || text.bytes().any(|b| b == 0) {
        return Err(ErrorKind::Value);
    }
    Ok(text)
}

/// Try number, bool, datetime, string in that order; first success wins.
pub fn parse_any(text: &str) -> Result<Value<'_>, ErrorKind> {
    if let Ok(n) = parse_number(text) {
        return Ok(Value::Number(n));
    }
    if let Ok(b) = parse_bool(text) {
        return Ok(Value::Bool(b));
    }
    if let Ok(d) = parse_datetime(text) {
        return Ok(Value::Datetime(d));
    }
    parse_string(text).map(Value::Str).map_err(|_| ErrorKind::Syntax)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(text: &str) -> f64 {
        parse_number(text).unwrap()
    }

    #[test]
    fn test_parse_number_ok() {
        assert_eq!(num("0"), 0.0);
        assert_eq!(num("42"), 42.0);
        assert_eq!(num("+42"), 42.0);
        assert_eq!(num("-42"), -42.0);
        assert_eq!(num("3.14"), 3.14);
        assert_eq!(num("0.5"), 0.5);
        assert_eq!(num("0.24e-4"), 0.24e-4);
        assert_eq!(num("2e3"), 2000.0);
        assert_eq!(num("1e0"), 1.0);
        // 2^53 is the last exactly representable integer literal.
        assert_eq!(num("9007199254740992"), 9007199254740992.0);
        assert_eq!(num("1234567890123456"), 1234567890123456.0);
    }

    #[test]
    fn test_parse_number_ko() {
        for bad in [
            "", " 1", "1 ", "00", "01", ".5", "1.", "1.e1", "1e", "1e+", "1e04", "abc", "0x10",
            "--1", "+-1", "1..2", "NaN", "Inf",
        ] {
            assert!(parse_number(bad).is_err(), "should reject {bad:?}");
        }
    }

    #[test]
    fn test_parse_number_range() {
        // 17 integer digits.
        assert_eq!(parse_number("12345678901234567"), Err(ErrorKind::Value));
        // Above 2^53.
        assert_eq!(parse_number("9007199254740993"), Err(ErrorKind::Value));
        // Float overflow.
        assert_eq!(parse_number("1e999"), Err(ErrorKind::Value));
    }

    #[test]
    fn test_scan_number_prefix() {
        assert_eq!(scan_number("1+2").unwrap(), (1, 1.0));
        assert_eq!(scan_number("3.5)").unwrap(), (3, 3.5));
        assert_eq!(scan_number("10e2,").unwrap(), (4, 1000.0));
        // A digit directly after a zero integer part never lexes.
        assert_eq!(scan_number("007"), Err(ErrorKind::Syntax));
        assert_eq!(scan_number("1e04"), Err(ErrorKind::Syntax));
        // ...but a zero exponent stops the lexeme instead.
        assert_eq!(scan_number("1e00").unwrap(), (3, 1.0));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Ok(true));
        assert_eq!(parse_bool("True"), Ok(true));
        assert_eq!(parse_bool("TRUE"), Ok(true));
        assert_eq!(parse_bool("false"), Ok(false));
        assert_eq!(parse_bool("False"), Ok(false));
        assert_eq!(parse_bool("FALSE"), Ok(false));
        for bad in ["TRue", "t", "1", "", "true ", "falsey"] {
            assert!(parse_bool(bad).is_err(), "should reject {bad:?}");
        }
    }

    #[test]
    fn test_parse_datetime_ok() {
        assert_eq!(parse_datetime("1970-01-01").unwrap(), 0);
        assert_eq!(parse_datetime("1970-01-01T00:00:00").unwrap(), 0);
        assert_eq!(parse_datetime("1970-01-01T00:00:00.000Z").unwrap(), 0);
        assert_eq!(parse_datetime("1970-01-02").unwrap(), 86_400_000);
        assert_eq!(parse_datetime("1970-01-01T01:00:00").unwrap(), 3_600_000);
        assert_eq!(parse_datetime("1970-01-01T00:00:00.5").unwrap(), 5);
        assert_eq!(parse_datetime("1970-01-01T00:00:00.12Z").unwrap(), 12);
        assert_eq!(parse_datetime("1970-01-01T00:00:00.123").unwrap(), 123);
        // Leap day.
        assert!(parse_datetime("2024-02-29").is_ok());
        assert!(parse_datetime("2000-02-29").is_ok());
    }

    #[test]
    fn test_parse_datetime_ko() {
        for bad in [
            "",
            "1969-12-31",
            "3000-01-01",
            "2024-00-10",
            "2024-13-10",
            "2024-01-00",
            "2024-01-32",
            "2024-04-31",
            "2023-02-29",
            "1900-02-29",
            "2024-1-05",
            "2024-01-05T",
            "2024-01-05Z",
            "2024-01-05T24:00:00",
            "2024-01-05T10:60:00",
            "2024-01-05T10:00:60",
            "2024-01-05T10:00:00.",
            "2024-01-05T10:00:00.1234",
            "2024-01-05T10:00:00Zx",
            "2024-01-05x",
            "\"2024-01-05\"",
        ] {
            assert!(parse_datetime(bad).is_err(), "should reject {bad:?}");
        }
    }

    #[test]
    fn test_datetime_round_trip() {
        use crate::datetime::Iso;
        for s in [
            "1970-01-01T00:00:00.000Z",
            "2024-08-24T09:05:58.123Z",
            "2999-12-31T23:59:59.999Z",
        ] {
            let millis = parse_datetime(s).unwrap();
            assert_eq!(Iso(millis).to_string(), s);
            assert_eq!(parse_datetime(&Iso(millis).to_string()).unwrap(), millis);
        }
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(parse_string("hello"), Ok("hello"));
        assert_eq!(parse_string(""), Ok(""));
        assert_eq!(parse_string("with \\n escape"), Ok("with \\n escape"));
        assert_eq!(parse_string("nul\0byte"), Err(ErrorKind::Value));
    }

    #[test]
    fn test_parse_any_order() {
        assert_eq!(parse_any("42").unwrap(), Value::Number(42.0));
        assert_eq!(parse_any("true").unwrap(), Value::Bool(true));
        assert_eq!(parse_any("1970-01-02").unwrap(), Value::Datetime(86_400_000));
        assert_eq!(parse_any("hello").unwrap(), Value::Str("hello"));
        // Numbers win over strings even though both would parse.
        assert!(matches!(parse_any("7"), Ok(Value::Number(_))));
    }
}
