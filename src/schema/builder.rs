//! Schema tree builder.
//!
//! The schema is compiled once: every string leaf is classified up front as
//! the exception flag, a style expression or a dotted path. Building then
//! walks the compiled tree for each record and produces an output object with
//! the same shape.

use std::cell::OnceCell;

use serde_json::{Map, Value};

use crate::error::{FormatterError, Result};
use crate::formatter::serialize::DefaultSerializer;
use crate::record::log_record::AttributeSource;
use crate::record::value::{is_empty_value, AttrValue};
use crate::schema::dotted::DottedPath;
use crate::schema::parse::SchemaInput;
use crate::style::{CompiledStyle, FlattenedAttributes, Style};

/// Leaf naming the exception flag.
pub const EXC_INFO_LEAF: &str = "exc_info";

#[derive(Debug, Clone)]
enum Node {
    Object(Vec<(String, Node)>),
    List(Vec<Node>),
    Literal(Value),
    ExcFlag,
    Leaf(Leaf),
}

#[derive(Debug, Clone)]
struct Leaf {
    raw: String,
    style: Option<CompiledStyle>,
    path: DottedPath,
}

/// A compiled output schema. Read-only once built, so one schema can serve
/// many threads.
#[derive(Debug, Clone)]
pub struct Schema {
    root: Vec<(String, Node)>,
    uses_time: bool,
}

/// Per-call switches for [`Schema::build`].
#[derive(Clone, Copy, Default)]
pub struct BuildOptions<'a> {
    pub remove_empty: bool,
    pub ignore_missing: bool,
    pub default: Option<&'a DefaultSerializer>,
}

/// What one build resolves against.
pub struct RenderContext<'a> {
    source: &'a dyn AttributeSource,
    has_exc_info: bool,
    flattened: OnceCell<FlattenedAttributes>,
}

impl<'a> RenderContext<'a> {
    pub fn new(source: &'a dyn AttributeSource, has_exc_info: bool) -> Self {
        Self {
            source,
            has_exc_info,
            flattened: OnceCell::new(),
        }
    }

    /// Attributes plus dotted keys for nested objects, built on first use.
    fn flattened(&self) -> &FlattenedAttributes {
        self.flattened.get_or_init(|| FlattenedAttributes::new(self.source))
    }
}

fn mentions_asctime(key: &str, value: &Value) -> bool {
    if key.contains("asctime") {
        return true;
    }
    match value {
        Value::String(s) => s.contains("asctime"),
        Value::Object(map) => map.iter().any(|(k, v)| mentions_asctime(k, v)),
        Value::Array(items) => items.iter().any(|v| mentions_asctime("", v)),
        _ => false,
    }
}

fn compile_node(value: Value, style: Style) -> Node {
    match value {
        Value::Object(map) => Node::Object(
            map.into_iter()
                .map(|(key, value)| (key, compile_node(value, style)))
                .collect(),
        ),
        Value::Array(items) => Node::List(items.into_iter().map(|v| compile_node(v, style)).collect()),
        Value::String(s) if s == EXC_INFO_LEAF => Node::ExcFlag,
        Value::String(s) => Node::Leaf(Leaf {
            style: CompiledStyle::compile(style, &s),
            path: DottedPath::parse(&s),
            raw: s,
        }),
        literal => Node::Literal(literal),
    }
}

impl Schema {
    pub fn compile(input: SchemaInput, style: Style) -> Result<Self> {
        let tree = input.into_tree()?;
        let uses_time = tree.iter().any(|(k, v)| mentions_asctime(k, v));
        let root: Vec<(String, Node)> = tree
            .into_iter()
            .map(|(key, value)| (key, compile_node(value, style)))
            .collect();
        log::debug!(
            "SCHEMA_COMPILED keys={} style={} uses_time={}",
            root.len(),
            style,
            uses_time
        );
        Ok(Self { root, uses_time })
    }

    /// Whether any key or leaf mentions `asctime`.
    pub fn uses_time(&self) -> bool {
        self.uses_time
    }

    /// Resolve the schema for one record.
    pub fn build(&self, ctx: &RenderContext<'_>, options: &BuildOptions<'_>) -> Result<Map<String, Value>> {
        build_object(&self.root, ctx, options)
    }
}

fn build_object(entries: &[(String, Node)], ctx: &RenderContext<'_>, options: &BuildOptions<'_>) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for (key, node) in entries {
        let value = resolve_node(node, ctx, options)?;
        // Children are pruned first, so an object emptied by pruning is
        // itself pruned here.
        if options.remove_empty && is_empty_value(&value) {
            continue;
        }
        out.insert(key.clone(), value);
    }
    Ok(out)
}

fn build_list(items: &[Node], ctx: &RenderContext<'_>, options: &BuildOptions<'_>) -> Result<Vec<Value>> {
    let mut out = Vec::with_capacity(items.len());
    for node in items {
        let value = resolve_node(node, ctx, options)?;
        if options.remove_empty && is_empty_value(&value) {
            continue;
        }
        out.push(value);
    }
    Ok(out)
}

fn resolve_node(node: &Node, ctx: &RenderContext<'_>, options: &BuildOptions<'_>) -> Result<Value> {
    match node {
        Node::Object(entries) => Ok(Value::Object(build_object(entries, ctx, options)?)),
        Node::List(items) => Ok(Value::Array(build_list(items, ctx, options)?)),
        Node::Literal(value) => Ok(value.clone()),
        Node::ExcFlag => Ok(Value::Bool(ctx.has_exc_info)),
        Node::Leaf(leaf) => resolve_leaf(leaf, ctx, options),
    }
}

fn resolve_leaf(leaf: &Leaf, ctx: &RenderContext<'_>, options: &BuildOptions<'_>) -> Result<Value> {
    // An attribute set on the record wins over any other reading of the
    // leaf and keeps its native type.
    if let Some(value) = ctx.source.attribute(&leaf.raw).found() {
        return encode(value, options.default);
    }

    if let Some(style) = &leaf.style {
        let missing = if options.ignore_missing {
            Some(AttrValue::default())
        } else {
            ctx.source.missing_default()
        };
        let text = match style {
            CompiledStyle::Percent(_) => style.render(ctx.flattened(), missing.as_ref())?,
            _ => style.render(ctx.source, missing.as_ref())?,
        };
        return Ok(Value::String(text));
    }

    let value = leaf.path.resolve(ctx.source, options.ignore_missing)?;
    encode(value, options.default)
}

/// Turn an attribute into JSON, routing opaque values through `default`.
pub fn encode(value: AttrValue, default: Option<&DefaultSerializer>) -> Result<Value> {
    match value {
        AttrValue::Json(value) => Ok(value),
        AttrValue::Opaque(opaque) => default
            .and_then(|serialize| serialize(&opaque))
            .ok_or_else(|| FormatterError::Serialization {
                type_name: opaque.type_name().to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::serialize::stringify_default;
    use crate::record::value::Opaque;
    use crate::record::DictIgnoreMissing;
    use serde_json::json;

    fn compile(schema: Value) -> Schema {
        Schema::compile(SchemaInput::from(schema), Style::Percent).unwrap()
    }

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn build(schema: &Schema, source: &dyn AttributeSource, options: BuildOptions<'_>) -> Result<Value> {
        schema
            .build(&RenderContext::new(source, false), &options)
            .map(Value::Object)
    }

    #[test]
    fn test_attribute_fast_path_keeps_type() {
        let schema = compile(json!({"n": "count", "m": "message"}));
        let source = attrs(json!({"count": 3, "message": "hello"}));
        assert_eq!(
            build(&schema, &source, BuildOptions::default()).unwrap(),
            json!({"n": 3, "m": "hello"})
        );
    }

    #[test]
    fn test_style_and_dotted_leaves() {
        let schema = compile(json!({
            "line": "%(levelname)s %(request.path)s",
            "path": "request.path",
            "list": ["levelname", "request.method"]
        }));
        let source = attrs(json!({"levelname": "INFO", "request": {"path": "/a", "method": "GET"}}));
        assert_eq!(
            build(&schema, &source, BuildOptions::default()).unwrap(),
            json!({"line": "INFO /a", "path": "/a", "list": ["INFO", "GET"]})
        );
    }

    #[test]
    fn test_exc_flag() {
        let schema = compile(json!({"exc": "exc_info"}));
        let source = attrs(json!({}));
        let out = schema
            .build(&RenderContext::new(&source, true), &BuildOptions::default())
            .unwrap();
        assert_eq!(Value::Object(out), json!({"exc": true}));
    }

    #[test]
    fn test_literals_pass_through() {
        let tree = json!({"a": 1, "b": [true, null, 2.5], "c": {"d": [[]], "e": {}}});
        let schema = compile(tree.clone());
        let source = attrs(json!({}));
        assert_eq!(build(&schema, &source, BuildOptions::default()).unwrap(), tree);
    }

    #[test]
    fn test_pruning_cascades() {
        let schema = compile(json!({
            "request": {"path": "request.path", "headers": "request.headers."},
            "tags": ["request.tags..", "levelname"],
            "keep": 0
        }));
        let source = attrs(json!({"levelname": "INFO"}));

        let kept = BuildOptions { ignore_missing: true, ..BuildOptions::default() };
        assert_eq!(
            build(&schema, &source, kept).unwrap(),
            json!({"request": {"path": "", "headers": {}}, "tags": [[], "INFO"], "keep": 0})
        );

        let pruned = BuildOptions { ignore_missing: true, remove_empty: true, ..BuildOptions::default() };
        assert_eq!(
            build(&schema, &source, pruned).unwrap(),
            json!({"tags": ["INFO"], "keep": 0})
        );
    }

    #[test]
    fn test_missing_without_ignore() {
        let schema = compile(json!({"path": "request.path"}));
        let source = attrs(json!({}));
        assert!(matches!(
            build(&schema, &source, BuildOptions::default()),
            Err(FormatterError::MissingKey { .. })
        ));
        let schema = compile(json!({"line": "%(absent)s"}));
        assert!(build(&schema, &source, BuildOptions::default()).is_err());
        let tolerant = BuildOptions { ignore_missing: true, ..BuildOptions::default() };
        assert_eq!(build(&schema, &source, tolerant).unwrap(), json!({"line": ""}));
    }

    #[test]
    fn test_source_missing_default_without_flag() {
        let schema = compile(json!({"user": "user", "line": "%(levelname)s %(user)s", "path": "request.path"}));
        let source = DictIgnoreMissing::new(
            vec![("levelname".to_string(), AttrValue::from("INFO"))],
            AttrValue::from("-"),
        );
        assert!(matches!(
            build(&schema, &source, BuildOptions::default()),
            Err(FormatterError::MissingKey { .. })
        ));

        let schema = compile(json!({"user": "user", "line": "%(levelname)s %(user)s"}));
        assert_eq!(
            build(&schema, &source, BuildOptions::default()).unwrap(),
            json!({"user": "-", "line": "INFO -"})
        );
        let tolerant = BuildOptions { ignore_missing: true, ..BuildOptions::default() };
        assert_eq!(
            build(&schema, &source, tolerant).unwrap(),
            json!({"user": "", "line": "INFO "})
        );
    }

    #[test]
    fn test_opaque_needs_default_serializer() {
        let schema = compile(json!({"ip": "client"}));
        let source = DictIgnoreMissing::new(
            vec![("client".to_string(), AttrValue::Opaque(Opaque::new(std::net::Ipv4Addr::LOCALHOST)))],
            AttrValue::default(),
        );
        assert!(matches!(
            build(&schema, &source, BuildOptions::default()),
            Err(FormatterError::Serialization { .. })
        ));
        let default = stringify_default();
        let options = BuildOptions { default: Some(&default), ..BuildOptions::default() };
        assert_eq!(build(&schema, &source, options).unwrap(), json!({"ip": "127.0.0.1"}));
    }

    #[test]
    fn test_uses_time() {
        assert!(compile(json!({"time": "%(asctime)s"})).uses_time());
        assert!(compile(json!({"nested": {"asctime": 1}})).uses_time());
        assert!(!compile(json!({"level": "levelname"})).uses_time());
    }

    #[test]
    fn test_brace_style_leaf() {
        let schema = Schema::compile(SchemaInput::from(json!({"lvl": "{levelname}"})), Style::Brace).unwrap();
        let source = attrs(json!({"levelname": "INFO"}));
        assert_eq!(build(&schema, &source, BuildOptions::default()).unwrap(), json!({"lvl": "INFO"}));
    }
}
