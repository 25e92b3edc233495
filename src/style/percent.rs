//! Percent-style (`%(name)s`) formatting.
//!
//! Used both for composing a record's message from its positional args and
//! as the `%` format style of the formatters, where directive names may be
//! dotted paths into nested attributes.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::{FormatterError, Result};
use crate::record::log_record::{AttributeSource, Lookup};
use crate::record::value::AttrValue;
use crate::style::numeric::{
    as_float, as_integer, as_truncated_integer, exponent, fixed, general, integer_digits,
    non_finite, sign_prefix,
};

lazy_static! {
    /// A complete named directive; the name may contain dots.
    static ref VALIDATION_PATTERN: Regex =
        Regex::new(r"(?i)%\([\w\.]+\)[#0+ -]*(\*|\d+)?(\.(\*|\d+))?[diouxefgcrsa%]").unwrap();
}

/// True when `expression` contains a named percent directive.
pub fn validate(expression: &str) -> bool {
    VALIDATION_PATTERN.is_match(expression)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Count {
    Fixed(usize),
    Star,
}

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    alternate: bool,
    zero: bool,
    left: bool,
    space: bool,
    plus: bool,
}

#[derive(Debug, Clone)]
struct Directive {
    key: Option<String>,
    flags: Flags,
    width: Option<Count>,
    precision: Option<Count>,
    conversion: char,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Directive(Directive),
}

/// A parsed percent-style format string.
#[derive(Debug, Clone)]
pub struct PercentFormat {
    source: String,
    segments: Vec<Segment>,
    // Set when the string validated as an expression but failed to parse.
    broken: Option<String>,
}

impl PercentFormat {
    pub fn parse(fmt: &str) -> Result<Self> {
        let chars: Vec<char> = fmt.chars().collect();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        let incomplete = || FormatterError::format(fmt, "incomplete format");

        while i < chars.len() {
            if chars[i] != '%' {
                literal.push(chars[i]);
                i += 1;
                continue;
            }
            i += 1;

            let mut key = None;
            if chars.get(i) == Some(&'(') {
                let mut depth = 1;
                let start = i + 1;
                i += 1;
                while i < chars.len() && depth > 0 {
                    match chars[i] {
                        '(' => depth += 1,
                        ')' => depth -= 1,
                        _ => {}
                    }
                    i += 1;
                }
                if depth > 0 {
                    return Err(FormatterError::format(fmt, "incomplete format key"));
                }
                key = Some(chars[start..i - 1].iter().collect::<String>());
            }

            let mut flags = Flags::default();
            while let Some(c) = chars.get(i) {
                match c {
                    '#' => flags.alternate = true,
                    '0' => flags.zero = true,
                    '-' => flags.left = true,
                    ' ' => flags.space = true,
                    '+' => flags.plus = true,
                    _ => break,
                }
                i += 1;
            }

            let width = parse_count(&chars, &mut i);
            let precision = if chars.get(i) == Some(&'.') {
                i += 1;
                Some(parse_count(&chars, &mut i).unwrap_or(Count::Fixed(0)))
            } else {
                None
            };

            // Length modifiers are accepted and ignored.
            while matches!(chars.get(i), Some('h') | Some('l') | Some('L')) {
                i += 1;
            }

            let conversion = *chars.get(i).ok_or_else(incomplete)?;
            i += 1;

            if conversion == '%' {
                literal.push('%');
                continue;
            }
            if !"diouxXeEfFgGcrsa".contains(conversion) {
                return Err(FormatterError::format(
                    fmt,
                    format!(
                        "unsupported format character '{}' (0x{:x})",
                        conversion, conversion as u32
                    ),
                ));
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Directive(Directive {
                key,
                flags,
                width,
                precision,
                conversion,
            }));
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: fmt.to_string(),
            segments,
            broken: None,
        })
    }

    /// An expression that fails with `error` whenever it is rendered.
    pub(crate) fn broken(fmt: &str, error: FormatterError) -> Self {
        let reason = match error {
            FormatterError::Format { reason, .. } => reason,
            other => other.to_string(),
        };
        Self {
            source: fmt.to_string(),
            segments: Vec::new(),
            broken: Some(reason),
        }
    }

    fn check(&self) -> Result<()> {
        match &self.broken {
            Some(reason) => Err(FormatterError::format(&self.source, reason.clone())),
            None => Ok(()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether any directive uses a `%(name)` key.
    pub fn has_named(&self) -> bool {
        self.directives().any(|d| d.key.is_some())
    }

    /// Keys referenced by named directives, in order.
    pub fn keys(&self) -> Vec<&str> {
        self.directives().filter_map(|d| d.key.as_deref()).collect()
    }

    fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Directive(d) => Some(d),
            Segment::Literal(_) => None,
        })
    }

    /// Render consuming positional arguments in order.
    pub fn render_positional(&self, args: &[AttrValue]) -> Result<String> {
        self.check()?;
        let mut out = String::new();
        let mut next = 0;

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Directive(d) => {
                    if d.key.is_some() {
                        return Err(FormatterError::format(&self.source, "format requires a mapping"));
                    }
                    let width = match d.width {
                        Some(Count::Star) => Some(star_value(take_arg(args, &mut next, &self.source)?, &self.source)?),
                        Some(Count::Fixed(w)) => Some(w),
                        None => None,
                    };
                    let precision = match d.precision {
                        Some(Count::Star) => Some(star_value(take_arg(args, &mut next, &self.source)?, &self.source)?),
                        Some(Count::Fixed(p)) => Some(p),
                        None => None,
                    };
                    let value = take_arg(args, &mut next, &self.source)?;
                    out.push_str(&render_directive(&self.source, d, value, width, precision)?);
                }
            }
        }

        if next < args.len() {
            return Err(FormatterError::format(
                &self.source,
                "not all arguments converted during string formatting",
            ));
        }
        Ok(out)
    }

    /// Render looking each directive key up through `lookup`.
    pub fn render_mapping<F>(&self, mut lookup: F) -> Result<String>
    where
        F: FnMut(&str) -> Result<AttrValue>,
    {
        self.check()?;
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Directive(d) => {
                    let key = d
                        .key
                        .as_deref()
                        .ok_or_else(|| FormatterError::format(&self.source, "format requires a mapping key"))?;
                    let width = fixed_count(d.width, &self.source)?;
                    let precision = fixed_count(d.precision, &self.source)?;
                    let value = lookup(key)?;
                    out.push_str(&render_directive(&self.source, d, &value, width, precision)?);
                }
            }
        }
        Ok(out)
    }

    /// Render against an attribute source, using `missing` for absent keys
    /// when given.
    pub fn render_source(&self, source: &dyn AttributeSource, missing: Option<&AttrValue>) -> Result<String> {
        self.render_mapping(|key| match source.attribute(key) {
            Lookup::Found(v) => Ok(v),
            Lookup::Missing => missing
                .cloned()
                .ok_or_else(|| FormatterError::missing(key, key)),
        })
    }
}

fn take_arg<'a>(args: &'a [AttrValue], next: &mut usize, fmt: &str) -> Result<&'a AttrValue> {
    let arg = args
        .get(*next)
        .ok_or_else(|| FormatterError::format(fmt, "not enough arguments for format string"))?;
    *next += 1;
    Ok(arg)
}

fn parse_count(chars: &[char], i: &mut usize) -> Option<Count> {
    if chars.get(*i) == Some(&'*') {
        *i += 1;
        return Some(Count::Star);
    }
    let start = *i;
    while chars.get(*i).is_some_and(|c| c.is_ascii_digit()) {
        *i += 1;
    }
    if *i == start {
        return None;
    }
    chars[start..*i].iter().collect::<String>().parse().ok().map(Count::Fixed)
}

fn fixed_count(count: Option<Count>, fmt: &str) -> Result<Option<usize>> {
    match count {
        Some(Count::Star) => Err(FormatterError::format(fmt, "* wants int")),
        Some(Count::Fixed(n)) => Ok(Some(n)),
        None => Ok(None),
    }
}

fn star_value(value: &AttrValue, fmt: &str) -> Result<usize> {
    as_integer(value)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| FormatterError::format(fmt, "* wants int"))
}

fn pad(body: String, width: Option<usize>, left: bool) -> String {
    let width = width.unwrap_or(0);
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let fill = " ".repeat(width - len);
    if left {
        body + &fill
    } else {
        fill + &body
    }
}

/// Pad a signed number: zero padding goes between sign/prefix and digits.
fn pad_number(prefix: &str, digits: &str, width: Option<usize>, flags: &Flags) -> String {
    let width = width.unwrap_or(0);
    let len = prefix.chars().count() + digits.chars().count();
    if flags.zero && !flags.left && len < width {
        return format!("{}{}{}", prefix, "0".repeat(width - len), digits);
    }
    pad(format!("{}{}", prefix, digits), Some(width), flags.left)
}

fn truncate(text: String, precision: Option<usize>) -> String {
    match precision {
        Some(p) => text.chars().take(p).collect(),
        None => text,
    }
}

/// Escape non-ASCII characters the way `%a` and `!a` show them.
pub(crate) fn ascii_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
        } else if (c as u32) <= 0xffff {
            out.push_str(&format!("\\u{:04x}", c as u32));
        } else {
            out.push_str(&format!("\\U{:08x}", c as u32));
        }
    }
    out
}

fn render_directive(
    fmt: &str,
    d: &Directive,
    value: &AttrValue,
    width: Option<usize>,
    precision: Option<usize>,
) -> Result<String> {
    let flags = &d.flags;
    match d.conversion {
        's' => Ok(pad(truncate(value.to_text(), precision), width, flags.left)),
        'r' => Ok(pad(truncate(value.to_repr(), precision), width, flags.left)),
        'a' => Ok(pad(truncate(ascii_escape(&value.to_repr()), precision), width, flags.left)),
        'c' => {
            let c = match value {
                AttrValue::Json(Value::String(s)) if s.chars().count() == 1 => s.clone(),
                _ => as_integer(value)
                    .and_then(|n| u32::try_from(n).ok())
                    .and_then(char::from_u32)
                    .map(String::from)
                    .ok_or_else(|| FormatterError::format(fmt, "%c requires int or char"))?,
            };
            Ok(pad(c, width, flags.left))
        }
        'd' | 'i' | 'u' | 'o' | 'x' | 'X' => {
            let n = if matches!(d.conversion, 'd' | 'i' | 'u') {
                as_truncated_integer(value)
            } else {
                as_integer(value)
            }
            .ok_or_else(|| {
                FormatterError::format(
                    fmt,
                    format!("%{} format: a number is required, not {}", d.conversion, value.type_name()),
                )
            })?;
            let (base, upper, alt_prefix) = match d.conversion {
                'o' => (8, false, "0o"),
                'x' => (16, false, "0x"),
                'X' => (16, true, "0X"),
                _ => (10, false, ""),
            };
            let mut digits = integer_digits(n, base, upper);
            if let Some(p) = precision {
                if digits.len() < p {
                    digits = format!("{}{}", "0".repeat(p - digits.len()), digits);
                }
            }
            let mut prefix = sign_prefix(n < 0, flags.plus, flags.space).to_string();
            if flags.alternate {
                prefix.push_str(alt_prefix);
            }
            Ok(pad_number(&prefix, &digits, width, flags))
        }
        'e' | 'E' | 'f' | 'F' | 'g' | 'G' => {
            let v = as_float(value).ok_or_else(|| {
                FormatterError::format(
                    fmt,
                    format!("%{} format: a real number is required, not {}", d.conversion, value.type_name()),
                )
            })?;
            let upper = d.conversion.is_ascii_uppercase();
            let prefix = sign_prefix(v.is_sign_negative() && !v.is_nan(), flags.plus, flags.space);
            if let Some(text) = non_finite(v, upper) {
                return Ok(pad(format!("{}{}", prefix, text), width, flags.left));
            }
            let p = precision.unwrap_or(6);
            let body = match d.conversion.to_ascii_lowercase() {
                'e' => exponent(v.abs(), p, upper, flags.alternate),
                'f' => fixed(v.abs(), p, flags.alternate),
                _ => general(v.abs(), p, upper, flags.alternate),
            };
            Ok(pad_number(prefix, &body, width, flags))
        }
        other => Err(FormatterError::format(
            fmt,
            format!("unsupported format character '{}'", other),
        )),
    }
}

/// Merge a message template with its positional args.
///
/// Without args the template is returned untouched, so literal `%` signs in
/// plain messages are safe. A single object argument supplies named keys.
pub fn compose_message(template: &str, args: &[Value]) -> Result<String> {
    if args.is_empty() {
        return Ok(template.to_string());
    }
    let parsed = PercentFormat::parse(template)?;
    if let [Value::Object(mapping)] = args {
        if parsed.has_named() {
            return parsed.render_source(mapping, None);
        }
    }
    let args: Vec<AttrValue> = args.iter().cloned().map(AttrValue::Json).collect();
    parsed.render_positional(&args)
}

/// Record attributes plus every nested object leaf under its dotted key.
#[derive(Debug, Default)]
pub struct FlattenedAttributes {
    values: HashMap<String, AttrValue>,
}

impl FlattenedAttributes {
    pub fn new(source: &dyn AttributeSource) -> Self {
        let mut values = HashMap::new();
        for (key, value) in source.attributes() {
            if let AttrValue::Json(Value::Object(map)) = &value {
                flatten_into(&mut values, &key, map);
            }
            values.insert(key, value);
        }
        Self { values }
    }
}

fn flatten_into(values: &mut HashMap<String, AttrValue>, parent: &str, map: &serde_json::Map<String, Value>) {
    for (key, value) in map {
        let dotted = format!("{}.{}", parent, key);
        match value {
            Value::Object(inner) => flatten_into(values, &dotted, inner),
            _ => {
                values.insert(dotted, AttrValue::Json(value.clone()));
            }
        }
    }
}

impl AttributeSource for FlattenedAttributes {
    fn attribute(&self, name: &str) -> Lookup {
        match self.values.get(name) {
            Some(v) => Lookup::Found(v.clone()),
            None => Lookup::Missing,
        }
    }

    fn attributes(&self) -> Vec<(String, AttrValue)> {
        self.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(fmt: &str, args: Vec<Value>) -> String {
        compose_message(fmt, &args).unwrap()
    }

    #[test]
    fn test_validation_pattern_matches() {
        for value in [
            "%(asctime)s",
            "%(my.dotted.key)s",
            "%(my.dotted.key)s with constant",
            "leading constant %(my.dotted.key)s with constant",
            "constant%(my.dotted.key)sconstant",
            "%(my.dotted.key)d",
            "%(my.dotted.key)3.4d",
        ] {
            assert!(validate(value), "{} should validate", value);
        }
    }

    #[test]
    fn test_validation_pattern_rejects() {
        for value in [
            "my.key", "my.key2", "my.", "k1.k3.", "k_1.", "k_.sk_2", "_my.key", "_1.", "_1._1",
            "_1a._2b._3b", "a.b.c.", "a1a.b2b.c2c.", "a1a_.b2_b.c_2c.", "my key.", "1.2",
            "This is a text. It contains dot.", "my.key ", " my.key", "my.key-test", "1",
            "1.test", "_1.1test", "%()s", "asd %()s asdf",
        ] {
            assert!(!validate(value), "{} should not validate", value);
        }
    }

    #[test]
    fn test_positional_conversions() {
        assert_eq!(render("user %s logged in %d times", vec![json!("alice"), json!(3)]), "user alice logged in 3 times");
        assert_eq!(render("%5d|%-5d|%05d", vec![json!(42), json!(42), json!(-42)]), "   42|42   |-0042");
        assert_eq!(render("%x %X %#o %#x", vec![json!(255), json!(255), json!(8), json!(255)]), "ff FF 0o10 0xff");
        assert_eq!(render("%.2f %e %g", vec![json!(3.14159), json!(1234.5), json!(0.00001)]), "3.14 1.234500e+03 1e-05");
        assert_eq!(render("%+d % d", vec![json!(5), json!(5)]), "+5  5");
        assert_eq!(render("%.3s|%r", vec![json!("abcdef"), json!("q")]), "abc|\"q\"");
        assert_eq!(render("%c%c", vec![json!(65), json!("b")]), "Ab");
        assert_eq!(render("%*d", vec![json!(4), json!(7)]), "   7");
        assert_eq!(render("100%% of %s", vec![json!("it")]), "100% of it");
    }

    #[test]
    fn test_mapping_argument() {
        assert_eq!(render("%(user)s did %(n)d", vec![json!({"user": "bob", "n": 2})]), "bob did 2");
    }

    #[test]
    fn test_argument_count_errors() {
        assert!(compose_message("%s %s", &[json!(1)]).is_err());
        assert!(compose_message("%s", &[json!(1), json!(2)]).is_err());
        assert!(compose_message("%d", &[json!("x")]).is_err());
        assert!(compose_message("%q", &[json!(1)]).is_err());
    }

    #[test]
    fn test_flattened_lookup() {
        let map = json!({"request": {"path": "/a", "meta": {"id": 1}}, "plain": 2});
        let source = FlattenedAttributes::new(map.as_object().unwrap());
        let fmt = PercentFormat::parse("%(request.path)s %(request.meta.id)d %(plain)s").unwrap();
        assert_eq!(fmt.render_source(&source, None).unwrap(), "/a 1 2");
        assert!(!source.attribute("request.meta").is_found());
        assert!(source.attribute("request").is_found());
    }

    #[test]
    fn test_missing_with_and_without_default() {
        let map = json!({"a": 1});
        let fmt = PercentFormat::parse("%(a)s:%(b)s").unwrap();
        let source = map.as_object().unwrap();
        assert_eq!(fmt.render_source(source, Some(&AttrValue::default())).unwrap(), "1:");
        assert!(matches!(
            fmt.render_source(source, None),
            Err(FormatterError::MissingKey { .. })
        ));
    }
}
