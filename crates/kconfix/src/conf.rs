//! Reading and writing persisted configuration files.
//!
//! The format is line-oriented UTF-8 with LF endings. One record per symbol:
//!
//! ```text
//! CONFIG_NAME=y
//! CONFIG_NAME=42
//! CONFIG_NAME=0x1A
//! CONFIG_NAME="text with \"escapes\""
//! # CONFIG_NAME is not set
//! ```
//!
//! A `# default:` line marks the next record as system-inferred rather than
//! user-chosen; the writer re-emits the pragma for every value the user did
//! not pick explicitly, so the distinction survives round trips.

use {
    crate::{
        eval::{Engine, Origin, ValueSource},
        model::SymbolId,
        parser::{KconfigError, Kind},
        renames::RenameMap,
        report::{Category, Severity, Verbosity},
        value::{escape, unescape, Value},
    },
    log::debug,
    std::{env, fs, path::Path, str::FromStr},
};

/// Prefix on every record name.
pub const CONFIG_PREFIX: &str = "CONFIG_";

/// Marks the next record as system-inferred.
pub const DEFAULT_PRAGMA: &str = "# default:";

/// Opens the deprecated-options section.
pub const DEP_BEGIN: &str = "# Deprecated options for backward compatibility";

/// Closes the deprecated-options section.
pub const DEP_END: &str = "# End of deprecated options";

/// Environment variable selecting the defaults policy.
pub const DEFAULTS_POLICY_ENV: &str = "KCONFIG_DEFAULTS_POLICY";

/// What wins when a stored default value disagrees with the Kconfig default.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DefaultsPolicy {
    /// Keep the stored value.
    #[default]
    Sdkconfig,

    /// Adopt the Kconfig default.
    Kconfig,

    /// Let the surrounding UI decide; the loader keeps the stored value and
    /// reports the conflict for the caller to resolve.
    Interactive,
}

impl DefaultsPolicy {
    /// Read the policy from `KCONFIG_DEFAULTS_POLICY`, defaulting to
    /// [`DefaultsPolicy::Sdkconfig`].
    pub fn from_env() -> Self {
        env::var(DEFAULTS_POLICY_ENV).ok().and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for DefaultsPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sdkconfig" => Ok(Self::Sdkconfig),
            "kconfig" => Ok(Self::Kconfig),
            "interactive" => Ok(Self::Interactive),
            _ => Err(()),
        }
    }
}

/// One record parsed from a configuration file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfRecord {
    /// The symbol name, without the `CONFIG_` prefix.
    pub name: String,

    /// The raw value text after `=`; empty for `is not set` records.
    pub raw: String,

    /// Whether this is a `# CONFIG_X is not set` record.
    pub not_set: bool,

    /// Whether a `# default:` pragma preceded the record.
    pub is_default: bool,

    /// Whether the record sits inside the deprecated-options section.
    pub deprecated: bool,

    /// 1-based line number.
    pub line: usize,
}

/// Parse configuration text into records. Blank lines and ordinary comments
/// are skipped; a `# default:` pragma attaches to the next record only.
pub fn parse_records(text: &str) -> Vec<ConfRecord> {
    let mut records = Vec::new();
    let mut pending_default = false;
    let mut deprecated = false;

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();

        if line == DEFAULT_PRAGMA {
            pending_default = true;
            continue;
        }

        if line == DEP_BEGIN {
            deprecated = true;
            continue;
        }

        if line == DEP_END {
            deprecated = false;
            continue;
        }

        if let Some(rest) = line.strip_prefix("# ").and_then(|r| r.strip_suffix(" is not set")) {
            if let Some(name) = rest.strip_prefix(CONFIG_PREFIX) {
                records.push(ConfRecord {
                    name: name.to_string(),
                    raw: String::new(),
                    not_set: true,
                    is_default: pending_default,
                    deprecated,
                    line: idx + 1,
                });
                pending_default = false;
                continue;
            }
        }

        if line.is_empty() || line.starts_with('#') {
            pending_default = false;
            continue;
        }

        if let Some(rest) = line.strip_prefix(CONFIG_PREFIX) {
            if let Some((name, raw)) = rest.split_once('=') {
                records.push(ConfRecord {
                    name: name.to_string(),
                    raw: raw.to_string(),
                    not_set: false,
                    is_default: pending_default,
                    deprecated,
                    line: idx + 1,
                });
            }
        }

        pending_default = false;
    }

    records
}

/// Parse a record's value text for a symbol of the given kind.
fn parse_record_value(kind: Kind, record: &ConfRecord) -> Option<Value> {
    if record.not_set {
        return Some(Value::Bool(false));
    }

    let raw = record.raw.trim();

    match kind {
        Kind::Bool => match raw {
            "y" => Some(Value::Bool(true)),
            // An empty assignment reads as n, as defaults overlays use it.
            "n" | "" => Some(Value::Bool(false)),
            _ => None,
        },
        Kind::Int => raw.parse().ok().map(Value::Int),
        Kind::Hex => {
            let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw);
            u64::from_str_radix(digits, 16).ok().map(Value::Hex)
        }
        Kind::Float => raw.parse().ok().map(Value::Float),
        Kind::String | Kind::Unknown => {
            let inner = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')).unwrap_or(raw);
            Some(Value::Str(unescape(inner)))
        }
    }
}

/// A loaded record whose stored value lost to the evaluator.
#[derive(Clone, Debug)]
pub struct Mismatch {
    /// The symbol name.
    pub name: String,

    /// The value the file stored.
    pub stored: Value,

    /// The value the evaluator computed.
    pub computed: Value,
}

/// The outcome of loading a configuration file.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Prompt-bearing symbols whose effective value differs from the stored one.
    pub mismatches: Vec<Mismatch>,

    /// Default-marked records in conflict with the Kconfig default that the
    /// interactive policy left for the caller to decide.
    pub undecided: Vec<Mismatch>,
}

/// Load a configuration file into the engine.
pub fn load_config(
    engine: &mut Engine,
    renames: &RenameMap,
    path: &Path,
    origin: Origin,
    policy: DefaultsPolicy,
) -> Result<LoadOutcome, KconfigError> {
    let text = fs::read_to_string(path)?;
    debug!("Loading configuration from {}", path.display());
    Ok(load_config_str(engine, renames, &text, origin, policy))
}

/// Load configuration text into the engine. See the load algorithm in the
/// module docs: rename routing, promptless filtering, policy application.
pub fn load_config_str(
    engine: &mut Engine,
    renames: &RenameMap,
    text: &str,
    origin: Origin,
    policy: DefaultsPolicy,
) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    let model = engine.model.clone();
    let mut installed: Vec<(SymbolId, Value)> = Vec::new();

    for record in parse_records(text) {
        // Defaults overlays only ever carry defaults.
        let is_default = record.is_default || origin == Origin::DefaultsFile;

        // Route the name through the rename map, in either direction.
        let (id, inverted) = match model.lookup(&record.name).filter(|id| model.sym(*id).defined) {
            Some(id) => (Some(id), false),
            None => match renames
                .canonical(&record.name)
                .and_then(|canon| model.lookup(&canon))
                .filter(|id| model.sym(*id).defined)
            {
                Some(id) => (Some(id), renames.is_inversion(&record.name)),
                None => match renames
                    .reverse_of(&record.name)
                    .and_then(|old| model.lookup(old))
                    .filter(|id| model.sym(*id).defined)
                {
                    Some(id) => (Some(id), renames.is_inversion(&model.sym(id).name)),
                    None => (None, false),
                },
            },
        };

        let Some(id) = id else {
            engine.report.warn(
                Category::Misc,
                None,
                format!("unknown configuration symbol {}{}", CONFIG_PREFIX, record.name),
            );
            continue;
        };

        let sym = model.sym(id);

        let Some(mut value) = parse_record_value(sym.kind, &record) else {
            engine.report.warn(
                Category::Misc,
                None,
                format!(
                    "value {:?} on line {} is invalid for {}, which has kind {}; record ignored",
                    record.raw, record.line, sym.name, sym.kind
                ),
            );
            continue;
        };

        if inverted {
            if let Value::Bool(b) = value {
                value = Value::Bool(!b);
            }
        }

        // Stored values for promptless symbols are never user decisions;
        // the Kconfig default wins.
        if !sym.has_prompt() {
            let computed = engine.value(id);
            if computed != value {
                let severity =
                    if engine.report.verbosity() == Verbosity::Verbose { Severity::Warning } else { Severity::Info };
                engine.report.add(
                    severity,
                    Category::PromptlessOverride,
                    None,
                    format!(
                        "{} has no prompt; ignoring stored value {value} in favor of {computed}",
                        sym.name
                    ),
                );
            }
            continue;
        }

        if engine.load_user(id, value.clone(), origin, is_default).is_ok() {
            installed.push((id, value));
        }
    }

    // Everything is installed; judge the outcome against the evaluator.
    for (id, stored) in &installed {
        let sym = model.sym(*id);
        let effective = engine.value(*id);

        if effective != *stored {
            engine.report.notify(
                Category::DefaultMismatch,
                None,
                format!("stored value {stored} for {} is overridden; effective value is {effective}", sym.name),
            );
            outcome.mismatches.push(Mismatch {
                name: sym.name.clone(),
                stored: stored.clone(),
                computed: effective,
            });
        }
    }

    // Default-marked records compete with the Kconfig defaults under the
    // configured policy.
    for (id, stored) in &installed {
        let is_default = engine.user_value(*id).map(|u| !u.is_explicit()).unwrap_or(false);
        if !is_default {
            continue;
        }

        engine.unset_user(*id);
        let kconfig_default = engine.value(*id);

        if kconfig_default == *stored {
            _ = engine.load_user(*id, stored.clone(), origin, true);
            continue;
        }

        let name = model.sym(*id).name.clone();
        engine.report.notify(
            Category::DefaultMismatch,
            None,
            format!("stored default {stored} for {name} differs from the Kconfig default {kconfig_default}"),
        );

        let mismatch = Mismatch {
            name,
            stored: stored.clone(),
            computed: kconfig_default,
        };

        match policy {
            DefaultsPolicy::Kconfig => {
                // Leave the assignment removed; the Kconfig default applies.
            }
            DefaultsPolicy::Sdkconfig => {
                _ = engine.load_user(*id, stored.clone(), origin, true);
            }
            DefaultsPolicy::Interactive => {
                _ = engine.load_user(*id, stored.clone(), origin, true);
                outcome.undecided.push(mismatch);
                continue;
            }
        }
    }

    outcome
}

/// Render the configuration as file contents, in menu declaration order.
pub fn config_contents(engine: &mut Engine, renames: &RenameMap, header: Option<&str>) -> String {
    let model = engine.model.clone();
    let mut out = String::new();

    if let Some(header) = header {
        out.push_str(header);
        if !header.ends_with('\n') {
            out.push('\n');
        }
    }

    let mut deprecated: Vec<(bool, String)> = Vec::new();

    for id in written_symbols(engine) {
        let sym = model.sym(id);
        let value = engine.value(id);
        let pragma = engine.value_source(id) != ValueSource::User;

        if pragma {
            out.push_str(DEFAULT_PRAGMA);
            out.push('\n');
        }

        let record = record_line(&sym.name, &value);
        out.push_str(&record);
        out.push('\n');

        for old in renames.all_deprecated_for(&sym.name) {
            let old_value = if renames.is_inversion(&old) {
                match &value {
                    Value::Bool(b) => Value::Bool(!b),
                    other => other.clone(),
                }
            } else {
                value.clone()
            };
            deprecated.push((pragma, record_line(&old, &old_value)));
        }
    }

    if !deprecated.is_empty() {
        out.push('\n');
        out.push_str(DEP_BEGIN);
        out.push('\n');
        for (pragma, line) in deprecated {
            // The pragma mirrors the canonical record, so reloading through
            // the rename map preserves the default marker.
            if pragma {
                out.push_str(DEFAULT_PRAGMA);
                out.push('\n');
            }
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str(DEP_END);
        out.push('\n');
    }

    out
}

/// The symbols the writer emits, in menu declaration order, each at most once.
fn written_symbols(engine: &mut Engine) -> Vec<SymbolId> {
    let model = engine.model.clone();
    let mut seen = std::collections::HashSet::new();
    let mut ordered = Vec::new();

    model.walk_nodes(|node| {
        if let crate::model::NodeItem::Symbol(id) = model.node(node).item {
            if seen.insert(id) {
                ordered.push(id);
            }
        }
    });

    ordered
        .into_iter()
        .filter(|id| {
            let sym = model.sym(*id);
            if !sym.defined || sym.env_var.is_some() {
                return false;
            }

            match engine.value_source(*id) {
                ValueSource::User
                | ValueSource::Set
                | ValueSource::Select
                | ValueSource::Imply
                | ValueSource::Default
                | ValueSource::DefaultUser => true,
                ValueSource::Choice => engine.visible(*id),
                // int/hex/float symbols with no value at all stay unwritten.
                ValueSource::Zero => engine.visible(*id) && matches!(sym.kind, Kind::Bool | Kind::String),
            }
        })
        .collect()
}

fn record_line(name: &str, value: &Value) -> String {
    match value {
        Value::Bool(false) => format!("# {CONFIG_PREFIX}{name} is not set"),
        Value::Bool(true) => format!("{CONFIG_PREFIX}{name}=y"),
        Value::Str(s) => format!("{CONFIG_PREFIX}{name}=\"{}\"", escape(s)),
        other => format!("{CONFIG_PREFIX}{name}={other}"),
    }
}

/// Write the configuration to a file, only touching it when the contents
/// changed. The new contents land in a temporary sibling first, so a failed
/// write never leaves a half-written config behind.
///
/// Returns whether the file was rewritten.
pub fn write_config(
    engine: &mut Engine,
    renames: &RenameMap,
    path: &Path,
    header: Option<&str>,
) -> Result<bool, KconfigError> {
    let contents = config_contents(engine, renames, header);
    write_if_changed(path, &contents)
}

/// Render the C header for the configuration.
pub fn header_contents(engine: &mut Engine, renames: &RenameMap, banner: Option<&str>) -> String {
    let model = engine.model.clone();
    let mut out = String::new();

    out.push_str(banner.unwrap_or("/*\n * Automatically generated file. DO NOT EDIT.\n */\n"));
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("#pragma once\n");

    let mut deprecated: Vec<String> = Vec::new();

    for id in written_symbols(engine) {
        let sym = model.sym(id);
        let value = engine.value(id);

        let defined = match &value {
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        };
        if !defined {
            continue;
        }

        let rendered = match &value {
            Value::Bool(_) => "1".to_string(),
            Value::Str(s) => format!("\"{}\"", escape(s)),
            other => other.to_string(),
        };

        out.push_str(&format!("#define {CONFIG_PREFIX}{} {rendered}\n", sym.name));

        for old in renames.all_deprecated_for(&sym.name) {
            let bang = if renames.is_inversion(&old) { "!" } else { "" };
            deprecated.push(format!("#define {CONFIG_PREFIX}{old} {bang}{CONFIG_PREFIX}{}\n", sym.name));
        }
    }

    if !deprecated.is_empty() {
        out.push_str("\n/* List of deprecated options */\n");
        for line in deprecated {
            out.push_str(&line);
        }
    }

    out
}

/// Write the C header, only touching the file when the contents changed.
pub fn write_header(
    engine: &mut Engine,
    renames: &RenameMap,
    path: &Path,
    banner: Option<&str>,
) -> Result<bool, KconfigError> {
    let contents = header_contents(engine, renames, banner);
    write_if_changed(path, &contents)
}

fn write_if_changed(path: &Path, contents: &str) -> Result<bool, KconfigError> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == contents {
            return Ok(false);
        }
    }

    let tmp = path.with_file_name(format!(
        ".{}.tmp",
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "config".to_string())
    ));
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use {
        super::{config_contents, load_config_str, parse_records, DefaultsPolicy},
        crate::{
            eval::{Engine, Origin},
            model::Model,
            parser::{Kconfig, ParseContext, PeekableChars},
            renames::RenameMap,
            report::{Category, Report, Verbosity},
            value::Value,
        },
        std::{collections::HashMap, path::Path},
    };

    fn engine(input: &str) -> Engine {
        let ctx = ParseContext::with_env(HashMap::new());
        let kconfig = Kconfig::from_str(PeekableChars::new(input, Path::new("test")), Path::new("/tmp"), &ctx).unwrap();
        let mut report = Report::with_verbosity(Verbosity::Verbose);
        let model = Model::build(&kconfig, &ctx, &mut report).unwrap();
        Engine::new(model, report)
    }

    const AB: &str = r#"config A
    bool "A"
    default y

config B
    int "B"
    depends on A
    default 42 if A
    default 0
"#;

    #[test]
    fn record_parsing() {
        let records = parse_records(
            "# comment\n\n# default:\nCONFIG_A=y\n# CONFIG_B is not set\nCONFIG_S=\"hi \\\"there\\\"\"\n",
        );

        assert_eq!(records.len(), 3);
        assert!(records[0].is_default);
        assert_eq!(records[0].name, "A");
        assert!(records[1].not_set && !records[1].is_default);
        assert_eq!(records[2].raw, "\"hi \\\"there\\\"\"");
    }

    #[test]
    fn user_set_a_n_writes_without_pragma() {
        let mut e = engine(AB);
        let renames = RenameMap::new();

        load_config_str(&mut e, &renames, "CONFIG_A=n\n", Origin::PrimaryConfig, DefaultsPolicy::Sdkconfig);

        let out = config_contents(&mut e, &renames, None);
        assert_eq!(out, "# CONFIG_A is not set\n# default:\nCONFIG_B=0\n");
    }

    #[test]
    fn default_marked_records_keep_their_pragma() {
        let mut e = engine(AB);
        let renames = RenameMap::new();

        load_config_str(
            &mut e,
            &renames,
            "# default:\nCONFIG_A=y\n# default:\nCONFIG_B=42\n",
            Origin::PrimaryConfig,
            DefaultsPolicy::Sdkconfig,
        );

        let out = config_contents(&mut e, &renames, None);
        assert_eq!(out, "# default:\nCONFIG_A=y\n# default:\nCONFIG_B=42\n");

        // The first explicit user write removes the pragma.
        let a = e.lookup("A").unwrap();
        e.set_user(a, Value::Bool(false), Origin::PrimaryConfig, false).unwrap();

        let out = config_contents(&mut e, &renames, None);
        assert_eq!(out, "# CONFIG_A is not set\n# default:\nCONFIG_B=0\n");
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let mut e = engine(AB);
        let renames = RenameMap::new();

        load_config_str(&mut e, &renames, "CONFIG_A=n\n", Origin::PrimaryConfig, DefaultsPolicy::Sdkconfig);
        let first = config_contents(&mut e, &renames, None);

        let mut e2 = engine(AB);
        load_config_str(&mut e2, &renames, &first, Origin::PrimaryConfig, DefaultsPolicy::Sdkconfig);
        let second = config_contents(&mut e2, &renames, None);

        assert_eq!(first, second);
    }

    #[test]
    fn promptless_stored_values_are_dropped() {
        let mut e = engine(
            r#"config X
    int
    default 100
"#,
        );
        let renames = RenameMap::new();

        load_config_str(&mut e, &renames, "CONFIG_X=42\n", Origin::PrimaryConfig, DefaultsPolicy::Sdkconfig);

        let x = e.lookup("X").unwrap();
        assert_eq!(e.value(x), Value::Int(100));
        assert_eq!(e.report.by_category(Category::PromptlessOverride).count(), 1);

        let out = config_contents(&mut e, &renames, None);
        assert_eq!(out, "# default:\nCONFIG_X=100\n");
    }

    #[test]
    fn defaults_policy_kconfig_adopts_the_kconfig_default() {
        let kconfig = r#"config FOO
    bool "Foo config option"
    default y
"#;
        let renames = RenameMap::new();

        let mut keep = engine(kconfig);
        load_config_str(&mut keep, &renames, "# default:\nCONFIG_FOO=n\n", Origin::PrimaryConfig, DefaultsPolicy::Sdkconfig);
        assert_eq!(keep.value(keep.lookup("FOO").unwrap()), Value::Bool(false));

        let mut adopt = engine(kconfig);
        load_config_str(&mut adopt, &renames, "# default:\nCONFIG_FOO=n\n", Origin::PrimaryConfig, DefaultsPolicy::Kconfig);
        assert_eq!(adopt.value(adopt.lookup("FOO").unwrap()), Value::Bool(true));
    }

    #[test]
    fn renamed_records_are_routed_and_inverted() {
        let mut e = engine(
            r#"config NEW
    bool "new"
    default n
"#,
        );

        let mut renames = RenameMap::new();
        renames.parse("CONFIG_OLD !CONFIG_NEW\n", "r").unwrap();

        // The stored file still uses the deprecated, inverted name.
        load_config_str(&mut e, &renames, "# CONFIG_OLD is not set\n", Origin::PrimaryConfig, DefaultsPolicy::Sdkconfig);
        assert_eq!(e.value(e.lookup("NEW").unwrap()), Value::Bool(true));

        // The writer mirrors the record into the deprecated section.
        let out = config_contents(&mut e, &renames, None);
        assert!(out.contains("CONFIG_NEW=y\n"));
        assert!(out.contains(super::DEP_BEGIN));
        assert!(out.contains("# CONFIG_OLD is not set\n"));
        assert!(out.contains(super::DEP_END));
    }

    #[test]
    fn deprecated_section_records_load_through_the_map() {
        let mut e = engine(
            r#"config NEW
    int "new"
    default 1
"#,
        );

        let mut renames = RenameMap::new();
        renames.parse("CONFIG_OLD CONFIG_NEW\n", "r").unwrap();

        let text = format!("{}\nCONFIG_OLD=7\n{}\n", super::DEP_BEGIN, super::DEP_END);
        load_config_str(&mut e, &renames, &text, Origin::PrimaryConfig, DefaultsPolicy::Sdkconfig);
        assert_eq!(e.value(e.lookup("NEW").unwrap()), Value::Int(7));
    }

    #[test]
    fn unknown_symbols_warn_and_are_dropped() {
        let mut e = engine(AB);
        let renames = RenameMap::new();

        load_config_str(&mut e, &renames, "CONFIG_NOPE=y\n", Origin::PrimaryConfig, DefaultsPolicy::Sdkconfig);

        let out = config_contents(&mut e, &renames, None);
        assert!(!out.contains("NOPE"));
        assert!(e.report.diagnostics().iter().any(|d| d.message.contains("unknown configuration symbol")));
    }

    #[test]
    fn string_escaping_round_trips() {
        let mut e = engine(
            r#"config S
    string "s"
    default ""
"#,
        );
        let renames = RenameMap::new();

        let s = e.lookup("S").unwrap();
        e.set_user(s, Value::Str("say \"hi\" \\ bye".into()), Origin::PrimaryConfig, false).unwrap();

        let out = config_contents(&mut e, &renames, None);
        assert_eq!(out, "CONFIG_S=\"say \\\"hi\\\" \\\\ bye\"\n");

        let mut e2 = engine(
            r#"config S
    string "s"
    default ""
"#,
        );
        load_config_str(&mut e2, &renames, &out, Origin::PrimaryConfig, DefaultsPolicy::Sdkconfig);
        assert_eq!(e2.value(e2.lookup("S").unwrap()), Value::Str("say \"hi\" \\ bye".into()));
    }
}
