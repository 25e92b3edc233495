//! Output encoding.
//!
//! The finished tree is written through a serde_json formatter configured by
//! [`SerializeOptions`]: separators, indentation, key sorting and ASCII
//! escaping.

use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use serde_json::{Map, Value};

use crate::error::{FormatterError, Result};
use crate::record::value::Opaque;

/// Turns a value that is not natively JSON into JSON. Returning `None`
/// reports the value as not serializable.
pub type DefaultSerializer = Arc<dyn Fn(&Opaque) -> Option<Value> + Send + Sync>;

/// Default serializer that stringifies through `Display`.
pub fn stringify_default() -> DefaultSerializer {
    Arc::new(|value: &Opaque| Some(Value::String(value.to_string())))
}

/// Encoder settings passed through from formatter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializeOptions {
    /// Pretty print with this many spaces per level.
    pub indent: Option<usize>,
    /// Emit object keys sorted at every level instead of schema order.
    pub sort_keys: bool,
    /// Escape every non-ASCII character as `\uXXXX`.
    pub ensure_ascii: bool,
    /// Item and key separators. Defaults to `(",", ":")`, or `(",", ": ")`
    /// when indenting.
    pub separators: Option<(String, String)>,
}

impl SerializeOptions {
    fn separators(&self) -> (&str, &str) {
        match (&self.separators, self.indent) {
            (Some((item, key)), _) => (item.as_str(), key.as_str()),
            (None, Some(_)) => (",", ": "),
            (None, None) => (",", ":"),
        }
    }
}

struct OutputFormatter<'a> {
    indent: Option<Vec<u8>>,
    item_separator: &'a [u8],
    key_separator: &'a [u8],
    ensure_ascii: bool,
    depth: usize,
    has_value: bool,
}

impl<'a> OutputFormatter<'a> {
    fn new(options: &'a SerializeOptions) -> Self {
        let (item, key) = options.separators();
        Self {
            indent: options.indent.map(|n| vec![b' '; n]),
            item_separator: item.as_bytes(),
            key_separator: key.as_bytes(),
            ensure_ascii: options.ensure_ascii,
            depth: 0,
            has_value: false,
        }
    }

    fn newline<W: ?Sized + io::Write>(&self, writer: &mut W) -> io::Result<()> {
        if let Some(indent) = &self.indent {
            writer.write_all(b"\n")?;
            for _ in 0..self.depth {
                writer.write_all(indent)?;
            }
        }
        Ok(())
    }

    fn begin_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if !first {
            writer.write_all(self.item_separator)?;
        }
        self.newline(writer)
    }

    fn end_container<W: ?Sized + io::Write>(&mut self, writer: &mut W, close: &[u8]) -> io::Result<()> {
        self.depth -= 1;
        if self.has_value {
            self.newline(writer)?;
        }
        writer.write_all(close)
    }
}

impl Formatter for OutputFormatter<'_> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.depth += 1;
        self.has_value = false;
        writer.write_all(b"[")
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.end_container(writer, b"]")
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.begin_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        self.has_value = true;
        Ok(())
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.depth += 1;
        self.has_value = false;
        writer.write_all(b"{")
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.end_container(writer, b"}")
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.begin_value(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.key_separator)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, _writer: &mut W) -> io::Result<()> {
        self.has_value = true;
        Ok(())
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        if !self.ensure_ascii || fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect::<Map<_, _>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

/// Encode `tree` as JSON text.
pub fn to_json_string(tree: Map<String, Value>, options: &SerializeOptions) -> Result<String> {
    let tree = if options.sort_keys {
        sorted(Value::Object(tree))
    } else {
        Value::Object(tree)
    };
    let mut out = Vec::with_capacity(128);
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, OutputFormatter::new(options));
    tree.serialize(&mut serializer)
        .map_err(|err| FormatterError::Encode(err.into()))?;
    String::from_utf8(out).map_err(|err| FormatterError::Encode(io::Error::new(io::ErrorKind::InvalidData, err)))
}
