//! End-to-end formatting scenarios through the public API.

use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde_json::{json, Value};

use logging_utilities::formatter::{
    ExtraFormatter, ExtraFormatterConfig, Format, JsonFormatter, JsonFormatterConfig, TextFormatterConfig,
};
use logging_utilities::record::{
    installed_record_hooks, reset_log_record_factory, reset_record_hooks, set_log_record_ignore_missing_factory,
    AttrValue, ExcInfo, Level, LogRecord, IGNORE_MISSING_HOOK,
};
use logging_utilities::schema::SchemaInput;
use logging_utilities::{FormatterError, Style};

lazy_static! {
    // Formatters built with ignore_missing install a process-wide record hook.
    static ref GLOBAL_HOOKS: Mutex<()> = Mutex::new(());
}

fn json_formatter(schema: Value, configure: impl FnOnce(&mut JsonFormatterConfig)) -> JsonFormatter {
    let mut config = JsonFormatterConfig {
        fmt: SchemaInput::from(schema),
        ..JsonFormatterConfig::default()
    };
    configure(&mut config);
    JsonFormatter::new(config).unwrap()
}

fn info(msg: &str) -> LogRecord {
    LogRecord::builder("my-logger", Level::INFO, msg).build_pristine()
}

#[test]
fn test_level_and_message() {
    let f = json_formatter(json!({"level": "levelname", "message": "message"}), |_| {});
    assert_eq!(f.format(&info("hello")).unwrap(), r#"{"level":"INFO","message":"hello"}"#);
}

#[test]
fn test_missing_nested_path_defaults_and_prunes() {
    let _guard = GLOBAL_HOOKS.lock();
    let schema = json!({"request": {"path": "request.path"}});

    let f = json_formatter(schema.clone(), |c| c.ignore_missing = true);
    assert_eq!(f.format(&info("m")).unwrap(), r#"{"request":{"path":""}}"#);

    // The emptied `request` object is pruned from its parent as well.
    let f = json_formatter(schema, |c| {
        c.ignore_missing = true;
        c.remove_empty = true;
    });
    assert_eq!(f.format(&info("m")).unwrap(), "{}");

    reset_log_record_factory();
}

#[test]
fn test_missing_nested_path_is_an_error() {
    let f = json_formatter(json!({"request": {"path": "request.path"}}), |_| {});
    match f.format(&info("m")) {
        Err(FormatterError::MissingKey { key, path }) => {
            assert_eq!(key, "path");
            assert_eq!(path, "request.path");
        }
        other => panic!("expected a missing key error, got {:?}", other),
    }
}

#[test]
fn test_always_extra_merges_user_id() {
    let f = json_formatter(json!({"level": "levelname", "message": "message"}), |c| {
        c.add_always_extra = true
    });
    let record = LogRecord::builder("my-logger", Level::INFO, "hello")
        .extra("user_id", json!(42))
        .build_pristine();
    assert_eq!(
        f.format(&record).unwrap(),
        r#"{"level":"INFO","message":"hello","user_id":42}"#
    );
}

#[test]
fn test_brace_style_schema() {
    let f = json_formatter(json!({"lvl": "{levelname}"}), |c| c.style = Style::Brace);
    assert_eq!(f.format(&info("m")).unwrap(), r#"{"lvl":"INFO"}"#);
}

#[test]
fn test_trailing_dot_defaults() {
    let _guard = GLOBAL_HOOKS.lock();
    let f = json_formatter(
        json!({"text": "ctx.value", "object": "ctx.value.", "list": "ctx.value.."}),
        |c| c.ignore_missing = true,
    );
    assert_eq!(
        f.format(&info("m")).unwrap(),
        r#"{"text":"","object":{},"list":[]}"#
    );
    reset_log_record_factory();
}

#[test]
fn test_ignore_missing_installs_hook_once() {
    let _guard = GLOBAL_HOOKS.lock();
    reset_record_hooks();
    json_formatter(json!({"m": "message"}), |c| c.ignore_missing = true);
    json_formatter(json!({"m": "message"}), |c| c.ignore_missing = true);
    assert_eq!(installed_record_hooks(), vec![IGNORE_MISSING_HOOK]);

    let record = LogRecord::builder("app", Level::INFO, "m").build();
    assert_eq!(record.get_or_default("absent").unwrap(), AttrValue::from(""));
    reset_log_record_factory();
    assert!(installed_record_hooks().is_empty());
}

#[test]
fn test_records_under_ignore_missing_factory_use_its_default() {
    let _guard = GLOBAL_HOOKS.lock();
    reset_record_hooks();
    set_log_record_ignore_missing_factory(json!("-"));

    let f = json_formatter(
        json!({"m": "message", "u": "user", "line": "%(levelname)s by %(user)s"}),
        |_| {},
    );
    let record = LogRecord::builder("app", Level::INFO, "hi").build();
    assert_eq!(
        f.format(&record).unwrap(),
        r#"{"m":"hi","u":"-","line":"INFO by -"}"#
    );

    // Nested lookups go through plain objects and still raise.
    let f = json_formatter(json!({"p": "request.path"}), |_| {});
    let record = LogRecord::builder("app", Level::INFO, "hi").build();
    assert!(matches!(f.format(&record), Err(FormatterError::MissingKey { .. })));

    // Records built without the hooks keep failing on a missing key.
    let f = json_formatter(json!({"u": "user"}), |_| {});
    assert!(f.format(&info("hi")).is_err());

    reset_log_record_factory();
}

#[test]
fn test_field_name_wins_over_format_parse() {
    // "message" would also be a (degenerate) dotted path; the field is used.
    let f = json_formatter(json!({"message": "message", "line": "lineno"}), |_| {});
    let record = LogRecord::builder("app", Level::INFO, "m")
        .location("src/main.rs", 10)
        .build_pristine();
    assert_eq!(f.format(&record).unwrap(), r#"{"message":"m","line":10}"#);
}

#[test]
fn test_exception_text_computed_once() {
    let f = json_formatter(
        json!({"a": "exc_text", "b": {"nested": "exc_text"}, "has_exc": "exc_info"}),
        |_| {},
    );
    let record = LogRecord::builder("app", Level::ERROR, "failed")
        .exc_info(ExcInfo::new("ValueError", "bad").with_frame("parse_input"))
        .build_pristine();

    let first = f.format(&record).unwrap();
    let text = record.exc_text().unwrap() as *const str;
    let second = f.format(&record).unwrap();
    assert_eq!(first, second);
    assert_eq!(record.exc_text().unwrap() as *const str, text);

    let tree: Value = serde_json::from_str(&first).unwrap();
    assert_eq!(tree["a"], tree["b"]["nested"]);
    assert_eq!(tree["has_exc"], json!(true));
    assert_eq!(tree["exc_text"], tree["a"]);
}

#[test]
fn test_nested_schema_with_styles_and_lists() {
    let f = json_formatter(
        json!({
            "app": {"logger": "name", "where": "%(filename)s:%(lineno)d"},
            "tags": ["%(levelname)s", "levelno"],
            "version": 2,
            "enabled": true
        }),
        |_| {},
    );
    let record = LogRecord::builder("svc.db", Level::WARNING, "slow")
        .location("/srv/svc/src/db.rs", 88)
        .build_pristine();
    assert_eq!(
        f.format(&record).unwrap(),
        r#"{"app":{"logger":"svc.db","where":"db.rs:88"},"tags":["WARNING",30],"version":2,"enabled":true}"#
    );
}

#[test]
fn test_extra_formatter_end_to_end() {
    let f = ExtraFormatter::new(ExtraFormatterConfig {
        text: TextFormatterConfig {
            fmt: Some("%(levelname)s %(message)s".to_string()),
            ..TextFormatterConfig::default()
        },
        extra_fmt: Some(" - %s".to_string()),
        ..ExtraFormatterConfig::default()
    })
    .unwrap();
    let record = LogRecord::builder("app", Level::INFO, "saved")
        .extra("id", json!(7))
        .build_pristine();
    assert_eq!(f.format(&record).unwrap(), r#"INFO saved - {"id":7}"#);
}

#[test]
fn test_formatter_shared_between_threads() {
    let f = std::sync::Arc::new(json_formatter(json!({"msg": "message", "n": "n"}), |_| {}));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let f = std::sync::Arc::clone(&f);
            std::thread::spawn(move || {
                let record = LogRecord::builder("app", Level::INFO, "worker %d")
                    .arg(i)
                    .extra("n", json!(i))
                    .build_pristine();
                f.format(&record).unwrap()
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!(r#"{{"msg":"worker {}","n":{}}}"#, i, i));
    }
}
