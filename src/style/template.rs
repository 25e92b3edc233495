//! Template-style (`$name`, `${name}`) formatting.

use crate::error::{FormatterError, Result};
use crate::record::log_record::{AttributeSource, Lookup};
use crate::record::value::AttrValue;

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed template string.
#[derive(Debug, Clone)]
pub struct TemplateFormat {
    source: String,
    segments: Vec<Segment>,
}

/// True when `expression` has at least one placeholder and no bare `$`.
pub fn validate(expression: &str) -> bool {
    TemplateFormat::parse(expression)
        .map(|parsed| !parsed.keys().is_empty())
        .unwrap_or(false)
}

fn is_identifier_start(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphabetic()
}

fn is_identifier_char(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphanumeric()
}

fn identifier_len(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(c) if is_identifier_start(*c) => {
            1 + bytes[1..].iter().take_while(|c| is_identifier_char(**c)).count()
        }
        _ => 0,
    }
}

impl TemplateFormat {
    pub fn parse(fmt: &str) -> Result<Self> {
        let bytes = fmt.as_bytes();
        let mut segments = Vec::new();
        let mut literal_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] != b'$' {
                i += 1;
                continue;
            }
            let literal = &fmt[literal_start..i];
            let rest = &bytes[i + 1..];

            let (segment, consumed) = if rest.first() == Some(&b'$') {
                (Segment::Literal("$".to_string()), 2)
            } else if rest.first() == Some(&b'{') {
                let len = identifier_len(&rest[1..]);
                if len == 0 || rest.get(1 + len) != Some(&b'}') {
                    return Err(invalid_placeholder(fmt, i));
                }
                (Segment::Field(fmt[i + 2..i + 2 + len].to_string()), len + 3)
            } else {
                let len = identifier_len(rest);
                if len == 0 {
                    return Err(invalid_placeholder(fmt, i));
                }
                (Segment::Field(fmt[i + 1..i + 1 + len].to_string()), len + 1)
            };

            if !literal.is_empty() {
                segments.push(Segment::Literal(literal.to_string()));
            }
            segments.push(segment);
            i += consumed;
            literal_start = i;
        }
        if literal_start < fmt.len() {
            segments.push(Segment::Literal(fmt[literal_start..].to_string()));
        }

        Ok(Self {
            source: fmt.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn keys(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub fn render_source(&self, source: &dyn AttributeSource, missing: Option<&AttrValue>) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => match source.attribute(name) {
                    Lookup::Found(value) => out.push_str(&value.to_text()),
                    Lookup::Missing => match missing {
                        Some(default) => out.push_str(&default.to_text()),
                        None => return Err(FormatterError::missing(name, name)),
                    },
                },
            }
        }
        Ok(out)
    }
}

fn invalid_placeholder(fmt: &str, index: usize) -> FormatterError {
    FormatterError::format(fmt, format!("invalid placeholder at index {}", index))
}
