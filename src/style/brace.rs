//! Brace-style (`{name!r:>10}`) formatting.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::{FormatterError, Result};
use crate::record::log_record::{AttributeSource, Lookup};
use crate::record::value::AttrValue;
use crate::style::numeric::{
    as_float, as_integer, exponent, fixed, general, group_digits, integer_digits, non_finite,
    sign_prefix,
};
use crate::style::percent::ascii_escape;

lazy_static! {
    static ref FIELD_PATTERN: Regex = Regex::new(r"^(\d+|\w+)(\.\w+|\[[^]]+\])*$").unwrap();
    static ref SPEC_PATTERN: Regex =
        Regex::new(r"(?i)^(.?[<>=^])?[+ -]?#?0?(\d+)?[,_]?(\.(\d+))?[bcdefgnosx%]?$").unwrap();
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    conversion: Option<char>,
    spec: String,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A parsed brace-style format string.
#[derive(Debug, Clone)]
pub struct BraceFormat {
    source: String,
    segments: Vec<Segment>,
}

/// True when `expression` parses and every replacement field is well formed.
pub fn validate(expression: &str) -> bool {
    let parsed = match BraceFormat::parse(expression) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    let mut fields = 0;
    for segment in &parsed.segments {
        if let Segment::Field(field) = segment {
            if !FIELD_PATTERN.is_match(&field.name) || !SPEC_PATTERN.is_match(&field.spec) {
                return false;
            }
            fields += 1;
        }
    }
    fields > 0
}

impl BraceFormat {
    pub fn parse(fmt: &str) -> Result<Self> {
        let chars: Vec<char> = fmt.chars().collect();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '{' if chars.get(i + 1) == Some(&'{') => {
                    literal.push('{');
                    i += 2;
                }
                '}' if chars.get(i + 1) == Some(&'}') => {
                    literal.push('}');
                    i += 2;
                }
                '}' => return Err(FormatterError::format(fmt, "single '}' encountered in format string")),
                '{' => {
                    let start = i + 1;
                    let mut depth = 1;
                    i += 1;
                    while i < chars.len() {
                        match chars[i] {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        i += 1;
                    }
                    if depth != 0 {
                        return Err(FormatterError::format(fmt, "expected '}' before end of string"));
                    }
                    let body: String = chars[start..i].iter().collect();
                    i += 1;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(parse_field(fmt, &body)?));
                }
                c => {
                    literal.push(c);
                    i += 1;
                }
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self {
            source: fmt.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Top-level attribute names referenced by the fields.
    pub fn keys(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field(f) => Some(head(&f.name).0),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub fn render_source(&self, source: &dyn AttributeSource, missing: Option<&AttrValue>) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => {
                    let value = resolve_field(&field.name, source, missing)?;
                    out.push_str(&self.render_field(field, value)?);
                }
            }
        }
        Ok(out)
    }

    fn render_field(&self, field: &Field, value: AttrValue) -> Result<String> {
        let value = match field.conversion {
            None => value,
            Some('s') => AttrValue::from(value.to_text()),
            Some('r') => AttrValue::from(value.to_repr()),
            Some('a') => AttrValue::from(ascii_escape(&value.to_repr())),
            Some(other) => {
                return Err(FormatterError::format(
                    &self.source,
                    format!("unknown conversion specifier {}", other),
                ))
            }
        };
        let spec = FormatSpec::parse(&field.spec)
            .ok_or_else(|| FormatterError::format(&self.source, format!("invalid format specifier {:?}", field.spec)))?;
        spec.apply(&self.source, &value)
    }
}

/// Split a field body into name, conversion and spec. Brackets in the name
/// may contain `!` and `:`.
fn parse_field(fmt: &str, body: &str) -> Result<Field> {
    let mut bracket = 0;
    let mut name_end = body.len();
    for (index, c) in body.char_indices() {
        match c {
            '[' => bracket += 1,
            ']' => bracket -= 1,
            '!' | ':' if bracket == 0 => {
                name_end = index;
                break;
            }
            _ => {}
        }
    }
    let name = body[..name_end].to_string();
    let mut rest = &body[name_end..];

    let mut conversion = None;
    if let Some(after) = rest.strip_prefix('!') {
        let mut chars = after.chars();
        let c = chars
            .next()
            .ok_or_else(|| FormatterError::format(fmt, "end of string while looking for conversion specifier"))?;
        conversion = Some(c);
        rest = chars.as_str();
        if !rest.is_empty() && !rest.starts_with(':') {
            return Err(FormatterError::format(fmt, "expected ':' after conversion specifier"));
        }
    }
    let spec = rest.strip_prefix(':').unwrap_or(rest).to_string();
    Ok(Field { name, conversion, spec })
}

/// First name component and the accessor tail.
fn head(name: &str) -> (&str, &str) {
    let end = name.find(['.', '[']).unwrap_or(name.len());
    name.split_at(end)
}

enum Accessor<'a> {
    Attr(&'a str),
    Item(&'a str),
}

fn accessors<'a>(fmt_name: &str, mut tail: &'a str) -> Result<Vec<Accessor<'a>>> {
    let mut out = Vec::new();
    while !tail.is_empty() {
        if let Some(rest) = tail.strip_prefix('.') {
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            if end == 0 {
                return Err(FormatterError::format(fmt_name, "empty attribute in format string"));
            }
            out.push(Accessor::Attr(&rest[..end]));
            tail = &rest[end..];
        } else if let Some(rest) = tail.strip_prefix('[') {
            let end = rest
                .find(']')
                .ok_or_else(|| FormatterError::format(fmt_name, "missing ']' in format string"))?;
            out.push(Accessor::Item(&rest[..end]));
            tail = &rest[end + 1..];
        } else {
            return Err(FormatterError::format(
                fmt_name,
                "only '.' or '[' may follow ']' in format field specifier",
            ));
        }
    }
    Ok(out)
}

fn resolve_field(name: &str, source: &dyn AttributeSource, missing: Option<&AttrValue>) -> Result<AttrValue> {
    let (first, tail) = head(name);
    if first.is_empty() {
        return Err(FormatterError::format(name, "format fields must be named"));
    }
    let mut current = match source.attribute(first) {
        Lookup::Found(value) => value,
        Lookup::Missing => return missing.cloned().ok_or_else(|| FormatterError::missing(first, name)),
    };
    for accessor in accessors(name, tail)? {
        let key = match accessor {
            Accessor::Attr(key) | Accessor::Item(key) => key,
        };
        let next = match &current {
            AttrValue::Json(Value::Object(map)) => map.get(key).cloned(),
            AttrValue::Json(Value::Array(items)) => match key.parse::<usize>() {
                Ok(index) => items.get(index).cloned(),
                Err(_) => return Err(FormatterError::NotAMapping { key: key.to_string(), path: name.to_string() }),
            },
            _ => {
                return Err(FormatterError::NotAMapping {
                    key: key.to_string(),
                    path: name.to_string(),
                })
            }
        };
        current = match next {
            Some(value) => AttrValue::Json(value),
            None => return missing.cloned().ok_or_else(|| FormatterError::missing(key, name)),
        };
    }
    Ok(current)
}

#[derive(Debug, Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    alternate: bool,
    zero: bool,
    width: Option<usize>,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> Option<Self> {
        let chars: Vec<char> = spec.chars().collect();
        let mut out = FormatSpec::default();
        let mut i = 0;
        let is_align = |c: Option<&char>| matches!(c, Some('<') | Some('>') | Some('=') | Some('^'));

        if chars.len() >= 2 && is_align(chars.get(1)) {
            out.fill = Some(chars[0]);
            out.align = Some(chars[1]);
            i = 2;
        } else if is_align(chars.first()) {
            out.align = Some(chars[0]);
            i = 1;
        }
        if let Some(c @ ('+' | '-' | ' ')) = chars.get(i) {
            out.sign = Some(*c);
            i += 1;
        }
        if chars.get(i) == Some(&'#') {
            out.alternate = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            out.zero = true;
            i += 1;
        }
        out.width = read_number(&chars, &mut i);
        if let Some(c @ (',' | '_')) = chars.get(i) {
            out.grouping = Some(*c);
            i += 1;
        }
        if chars.get(i) == Some(&'.') {
            i += 1;
            out.precision = Some(read_number(&chars, &mut i)?);
        }
        if let Some(c) = chars.get(i) {
            if !"bcdeEfFgGnosxX%".contains(*c) {
                return None;
            }
            out.kind = Some(*c);
            i += 1;
        }
        if i != chars.len() {
            return None;
        }
        Some(out)
    }

    fn apply(&self, fmt: &str, value: &AttrValue) -> Result<String> {
        let is_number = matches!(value, AttrValue::Json(Value::Number(_)))
            || (matches!(value, AttrValue::Json(Value::Bool(_))) && self.kind.is_some());

        if !is_number {
            return match self.kind {
                None | Some('s') => {
                    if self.sign.is_some() || self.alternate {
                        return Err(FormatterError::format(fmt, "sign and '#' not allowed in string format specifier"));
                    }
                    let text = value.to_text();
                    let text = match self.precision {
                        Some(p) => text.chars().take(p).collect(),
                        None => text,
                    };
                    Ok(self.pad("", &text, '<'))
                }
                Some(kind) => Err(FormatterError::format(
                    fmt,
                    format!("unknown format code '{}' for object of type '{}'", kind, value.type_name()),
                )),
            };
        }

        if let (Some(n), Some('b' | 'c' | 'd' | 'o' | 'x' | 'X' | 'n') | None) = (as_integer(value), self.kind) {
            return self.integer(fmt, n);
        }
        let v = as_float(value).ok_or_else(|| FormatterError::format(fmt, "a number is required"))?;
        self.float(fmt, v)
    }

    fn integer(&self, fmt: &str, n: i128) -> Result<String> {
        if self.precision.is_some() {
            return Err(FormatterError::format(fmt, "precision not allowed in integer format specifier"));
        }
        if self.kind == Some('c') {
            let c = u32::try_from(n)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| FormatterError::format(fmt, "%c arg not in range"))?;
            return Ok(self.pad("", &c.to_string(), '<'));
        }
        let (base, upper, prefix) = match self.kind {
            Some('b') => (2, false, "0b"),
            Some('o') => (8, false, "0o"),
            Some('x') => (16, false, "0x"),
            Some('X') => (16, true, "0X"),
            _ => (10, false, ""),
        };
        let mut digits = integer_digits(n, base, upper);
        if let Some(separator) = self.grouping {
            digits = group_digits(&digits, separator, if base == 10 { 3 } else { 4 });
        }
        let mut sign = self.sign_text(n < 0).to_string();
        if self.alternate {
            sign.push_str(prefix);
        }
        Ok(self.pad(&sign, &digits, '>'))
    }

    fn float(&self, fmt: &str, v: f64) -> Result<String> {
        let sign = self.sign_text(v.is_sign_negative() && !v.is_nan());
        let upper = matches!(self.kind, Some('E' | 'F' | 'G'));
        if let Some(text) = non_finite(v, upper) {
            let text = if self.kind == Some('%') { format!("{}%", text) } else { text };
            return Ok(self.pad(sign, &text, '>'));
        }
        let magnitude = v.abs();
        let mut body = match self.kind {
            Some('e' | 'E') => exponent(magnitude, self.precision.unwrap_or(6), upper, self.alternate),
            Some('f' | 'F') => fixed(magnitude, self.precision.unwrap_or(6), self.alternate),
            Some('g' | 'G' | 'n') => general(magnitude, self.precision.unwrap_or(6), upper, self.alternate),
            Some('%') => format!("{}%", fixed(magnitude * 100.0, self.precision.unwrap_or(6), self.alternate)),
            None => match self.precision {
                Some(p) => general(magnitude, p, false, self.alternate),
                None => shortest_float(magnitude),
            },
            Some(kind) => {
                return Err(FormatterError::format(
                    fmt,
                    format!("unknown format code '{}' for object of type 'float'", kind),
                ))
            }
        };
        if let Some(separator) = self.grouping {
            body = group_digits(&body, separator, 3);
        }
        Ok(self.pad(sign, &body, '>'))
    }

    fn sign_text(&self, negative: bool) -> &'static str {
        sign_prefix(negative, self.sign == Some('+'), self.sign == Some(' '))
    }

    /// Lay out `sign` and `body` within the field width.
    fn pad(&self, sign: &str, body: &str, default_align: char) -> String {
        let width = self.width.unwrap_or(0);
        let len = sign.chars().count() + body.chars().count();
        let (fill, align) = match (self.fill, self.align) {
            (fill, Some(align)) => (fill.unwrap_or(if self.zero { '0' } else { ' ' }), align),
            (_, None) if self.zero => ('0', if default_align == '>' { '=' } else { default_align }),
            (_, None) => (' ', default_align),
        };
        if len >= width {
            return format!("{}{}", sign, body);
        }
        let padding = width - len;
        let repeat = |n: usize| fill.to_string().repeat(n);
        match align {
            '<' => format!("{}{}{}", sign, body, repeat(padding)),
            '^' => format!("{}{}{}{}", repeat(padding / 2), sign, body, repeat(padding - padding / 2)),
            '=' => format!("{}{}{}", sign, repeat(padding), body),
            _ => format!("{}{}{}", repeat(padding), sign, body),
        }
    }
}

fn read_number(chars: &[char], i: &mut usize) -> Option<usize> {
    let start = *i;
    while chars.get(*i).is_some_and(|c| c.is_ascii_digit()) {
        *i += 1;
    }
    if *i == start {
        return None;
    }
    chars[start..*i].iter().collect::<String>().parse().ok()
}

/// Float text without a format type: shortest round-trip form, always
/// with a fractional part or exponent.
fn shortest_float(v: f64) -> String {
    let text = format!("{}", v);
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{}.0", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(fmt: &str, data: Value) -> String {
        BraceFormat::parse(fmt)
            .unwrap()
            .render_source(data.as_object().unwrap(), None)
            .unwrap()
    }

    #[test]
    fn test_validate() {
        assert!(validate("{levelname}"));
        assert!(validate("{levelname}:{name}:{message}"));
        assert!(validate("{request.path!r:>20}"));
        assert!(validate("{items[0]}"));
        assert!(!validate("levelname"));
        assert!(!validate("{}"));
        assert!(!validate("{levelname"));
        assert!(!validate("{a:q}"));
        assert!(!validate("{a-b}"));
        assert!(!validate("{{escaped}}"));
    }

    #[test]
    fn test_render_fields() {
        let data = json!({"levelname": "INFO", "n": 1234567, "f": 3.14159, "request": {"path": "/a"}, "items": [10, 20]});
        assert_eq!(render("{levelname}", data.clone()), "INFO");
        assert_eq!(render("[{levelname:<6}]", data.clone()), "[INFO  ]");
        assert_eq!(render("[{levelname:*^8}]", data.clone()), "[**INFO**]");
        assert_eq!(render("{n:,}", data.clone()), "1,234,567");
        assert_eq!(render("{f:.2f} {f:8.3f}", data.clone()), "3.14    3.142");
        assert_eq!(render("{n:x} {n:#X}", data.clone()), "12d687 0X12D687");
        assert_eq!(render("{request.path} {request[path]} {items[1]}", data.clone()), "/a /a 20");
        assert_eq!(render("{levelname!r}", data.clone()), "\"INFO\"");
        assert_eq!(render("{{literal}} {levelname}", data), "{literal} INFO");
    }

    #[test]
    fn test_zero_padding_and_sign() {
        let data = json!({"a": -42, "b": 0.5});
        assert_eq!(render("{a:06d}", data.clone()), "-00042");
        assert_eq!(render("{b:+.1%}", data.clone()), "+50.0%");
        assert_eq!(render("{b}", data), "0.5");
    }

    #[test]
    fn test_missing_field() {
        let data = json!({"a": 1});
        let fmt = BraceFormat::parse("{a}-{b}").unwrap();
        let source = data.as_object().unwrap();
        assert!(matches!(fmt.render_source(source, None), Err(FormatterError::MissingKey { .. })));
        assert_eq!(fmt.render_source(source, Some(&AttrValue::from("?"))).unwrap(), "1-?");
    }

    #[test]
    fn test_type_errors() {
        let data = json!({"s": "text", "n": 1});
        let source = data.as_object().unwrap();
        assert!(BraceFormat::parse("{s:d}").unwrap().render_source(source, None).is_err());
        assert!(BraceFormat::parse("{n.x}").unwrap().render_source(source, None).is_err());
        assert!(BraceFormat::parse("{n}}").is_err());
    }
}
