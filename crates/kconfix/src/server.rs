//! The line-delimited JSON protocol used for IDE integration.
//!
//! Each request is one JSON object on one line of standard input; each
//! response is one JSON object on one line of standard output. Out-of-band
//! progress goes to standard error (through the `log` facade here). Requests
//! complete or fail as a unit: a malformed request produces an `error`
//! response and leaves the engine untouched.

use {
    crate::{
        conf::{self, DefaultsPolicy},
        eval::{Engine, Origin},
        model::{NodeId, NodeItem, SymbolId},
        parser::Kind,
        renames::RenameMap,
        value::Value,
    },
    log::info,
    serde::Deserialize,
    serde_json::{json, Map, Value as Json},
    std::{collections::HashMap, path::PathBuf},
};

/// Oldest supported protocol version.
pub const MIN_PROTOCOL_VERSION: u64 = 1;

/// Newest supported protocol version.
pub const MAX_PROTOCOL_VERSION: u64 = 3;

/// One request from the client.
#[derive(Debug, Default, Deserialize)]
pub struct Request {
    /// Protocol version; mandatory, must be within the supported range.
    pub version: Option<u64>,

    /// Symbol assignments to apply, in order.
    #[serde(default)]
    pub set: Option<Map<String, Json>>,

    /// Load a configuration file; `null` reloads the current path.
    #[serde(default, deserialize_with = "nullable")]
    pub load: Option<Option<String>>,

    /// Save the configuration; `null` saves to the current path.
    #[serde(default, deserialize_with = "nullable")]
    pub save: Option<Option<String>>,

    /// Symbols, menu identifiers, or `["all"]` to reset to defaults (v3).
    #[serde(default)]
    pub reset: Option<Vec<String>>,
}

/// Distinguishes `"load": null` from an absent `load` key.
fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Snapshot {
    values: HashMap<String, Json>,
    ranges: HashMap<String, Json>,
    visible: HashMap<String, bool>,
    defaults: HashMap<String, bool>,
}

/// A protocol session over one engine.
pub struct Session {
    engine: Engine,
    renames: RenameMap,
    config_path: PathBuf,
    policy: DefaultsPolicy,
    default_version: u64,
}

impl Session {
    /// Create a session. `default_version` is used for the initial state
    /// message and for error responses to requests without a usable version.
    pub fn new(engine: Engine, renames: RenameMap, config_path: PathBuf, default_version: u64) -> Self {
        Self {
            engine,
            renames,
            config_path,
            policy: DefaultsPolicy::from_env(),
            default_version,
        }
    }

    /// The engine, for callers that inspect state between requests.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// The initial state message sent before any request.
    pub fn initial_state(&mut self) -> Json {
        let snapshot = self.snapshot();
        let version = self.default_version;

        let mut response = if version == 1 {
            // V1 has no visibility map; invisible items read as null.
            let values = Self::mask_invisible(&snapshot.values, &snapshot.visible);
            json!({ "version": 1, "values": values, "ranges": snapshot.ranges })
        } else {
            json!({
                "version": version,
                "values": snapshot.values,
                "ranges": snapshot.ranges,
                "visible": snapshot.visible,
            })
        };

        if version >= 3 {
            response["defaults"] = json!(snapshot.defaults);
        }

        response["warnings"] = json!(self.warnings());
        response
    }

    /// Handle one request line, returning the response object.
    pub fn handle_line(&mut self, line: &str) -> Json {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                return json!({
                    "version": self.default_version,
                    "error": [format!("JSON formatting error: {e}")],
                });
            }
        };

        self.handle_request(&request)
    }

    /// Handle one request, returning the response with only changed entries.
    pub fn handle_request(&mut self, request: &Request) -> Json {
        let Some(version) = request.version else {
            return json!({
                "version": self.default_version,
                "error": ["All requests must have a 'version'"],
            });
        };

        if !(MIN_PROTOCOL_VERSION..=MAX_PROTOCOL_VERSION).contains(&version) {
            return json!({
                "version": self.default_version,
                "error": [format!(
                    "Unsupported request version {version}. Server supports versions \
                     {MIN_PROTOCOL_VERSION}-{MAX_PROTOCOL_VERSION}"
                )],
            });
        }

        let before = if version == 1 && request.load.is_some() {
            // V1 clients expect the full state after a load.
            Snapshot::default()
        } else {
            self.snapshot()
        };

        let mut errors = Vec::new();

        if let Some(load) = &request.load {
            if let Some(path) = load {
                self.config_path = PathBuf::from(path);
            }
            info!("Loading config from {}", self.config_path.display());

            self.reset_all();
            if let Err(e) = conf::load_config(
                &mut self.engine,
                &self.renames,
                &self.config_path.clone(),
                Origin::PrimaryConfig,
                self.policy,
            ) {
                errors.push(format!("Failed to load from {}: {e}", self.config_path.display()));
            }
        }

        if let Some(set) = &request.set {
            self.handle_set(set, &mut errors);
        }

        if let Some(reset) = &request.reset {
            if version >= 3 {
                self.handle_reset(reset, &mut errors);
            } else {
                errors.push(format!("Resetting config symbols is not supported in protocol version {version}"));
            }
        }

        if let Some(save) = &request.save {
            if let Some(path) = save {
                self.config_path = PathBuf::from(path);
            }
            info!("Saving config to {}", self.config_path.display());

            if let Err(e) = conf::write_config(&mut self.engine, &self.renames, &self.config_path.clone(), None) {
                errors.push(format!("Failed to save to {}: {e}", self.config_path.display()));
            }
        }

        let after = self.snapshot();

        let mut values_diff = diff(&before.values, &after.values);
        let ranges_diff = diff(&before.ranges, &after.ranges);
        let visible_diff = diff_bool(&before.visible, &after.visible);

        let mut response = if version == 1 {
            // V1 reports invisible items as null values.
            for (name, visible) in &visible_diff {
                if !visible {
                    values_diff.insert(name.clone(), Json::Null);
                }
            }
            json!({ "version": 1, "values": values_diff, "ranges": ranges_diff })
        } else {
            json!({
                "version": version,
                "values": values_diff,
                "ranges": ranges_diff,
                "visible": visible_diff,
            })
        };

        if version >= 3 {
            response["defaults"] = json!(diff_bool(&before.defaults, &after.defaults));
        }

        if !errors.is_empty() {
            response["error"] = json!(errors);
        }

        response
    }

    /// Apply assignments, deferring symbols that are not yet visible: an
    /// earlier assignment in the same request may be what makes them visible.
    fn handle_set(&mut self, set: &Map<String, Json>, errors: &mut Vec<String>) {
        let mut pending: Vec<(SymbolId, String, Json)> = Vec::new();

        for (name, value) in set {
            match self.engine.lookup(name).filter(|id| self.engine.model.sym(*id).defined) {
                Some(id) => pending.push((id, name.clone(), value.clone())),
                None => errors.push(format!("Unknown symbol: {name}")),
            }
        }

        loop {
            let mut applied = Vec::new();

            for (idx, (id, name, value)) in pending.iter().enumerate() {
                if !self.engine.visible(*id) {
                    continue;
                }

                let kind = self.engine.model.sym(*id).kind;
                match json_to_value(kind, value) {
                    Some(value) => {
                        if let Err(e) = self.engine.set_user(*id, value, Origin::PrimaryConfig, false) {
                            errors.push(e.to_string());
                        } else {
                            info!("Set {name}");
                        }
                    }
                    None => errors.push(format!("Invalid value {value} for symbol {name} of kind {kind}")),
                }

                applied.push(idx);
            }

            if applied.is_empty() {
                break;
            }

            for idx in applied.into_iter().rev() {
                pending.remove(idx);
            }
        }

        if !pending.is_empty() {
            let names: Vec<&str> = pending.iter().map(|(_, name, _)| name.as_str()).collect();
            errors.push(format!(
                "The following config symbol(s) were not visible so were not updated: {}",
                names.join(", ")
            ));
        }
    }

    /// Reset symbols, menus, or everything to computed defaults. Symbol names
    /// never contain `-`; menu identifiers always do.
    fn handle_reset(&mut self, to_reset: &[String], errors: &mut Vec<String>) {
        if to_reset.iter().any(|n| n == "all") {
            self.reset_all();
            info!("Reset the whole configuration to default values");
            return;
        }

        for name in to_reset {
            if name.contains('-') {
                match self.engine.model.menu_ids.get(name).copied() {
                    Some(node) => {
                        self.reset_node(node);
                        info!("Reset menu {name} to default values");
                    }
                    None => errors.push(format!("The following menu(s) were not found: {name}")),
                }
            } else {
                match self.engine.lookup(name).filter(|id| self.engine.model.sym(*id).defined) {
                    Some(id) => {
                        self.engine.unset_user(id);
                        info!("Reset {name} to default value");
                    }
                    None => errors.push(format!("The following config symbol(s) were not found: {name}")),
                }
            }
        }
    }

    fn reset_all(&mut self) {
        for id in self.engine.model.clone().sym_ids() {
            if self.engine.user_value(id).is_some() {
                self.engine.unset_user(id);
            }
        }
    }

    fn reset_node(&mut self, node: NodeId) {
        let model = self.engine.model.clone();

        fn rec(session: &mut Session, model: &crate::model::Model, node: NodeId) {
            match model.node(node).item {
                NodeItem::Symbol(id) => {
                    if session.engine.user_value(id).is_some() {
                        session.engine.unset_user(id);
                    }
                }
                _ => {}
            }
            for child in &model.node(node).children {
                rec(session, model, *child);
            }
        }

        rec(self, &model, node);
    }

    fn snapshot(&mut self) -> Snapshot {
        let model = self.engine.model.clone();
        let mut snapshot = Snapshot::default();

        for id in model.sym_ids() {
            let sym = model.sym(id);
            if !sym.defined {
                continue;
            }

            let value = self.engine.value(id);
            snapshot.values.insert(sym.name.clone(), value_to_json(&value));
            snapshot.visible.insert(sym.name.clone(), self.engine.visible(id));
            snapshot.defaults.insert(sym.name.clone(), self.engine.is_at_default(id));

            if let Some((low, high)) = self.engine.active_range(id) {
                snapshot.ranges.insert(sym.name.clone(), json!([range_to_json(&low), range_to_json(&high)]));
            }
        }

        // A menu is visible when any of its children is.
        let menu_ids: Vec<(String, NodeId)> = model.menu_ids.iter().map(|(k, v)| (k.clone(), *v)).collect();
        for (menu_id, node) in menu_ids {
            let visible = self.any_child_visible(node);
            snapshot.visible.insert(menu_id, visible);
        }

        snapshot
    }

    fn any_child_visible(&mut self, node: NodeId) -> bool {
        let model = self.engine.model.clone();

        for child in &model.node(node).children {
            let item = &model.node(*child).item;
            if self.engine.node_visible(item) {
                return true;
            }
            if matches!(item, NodeItem::Menu { .. }) && self.any_child_visible(*child) {
                return true;
            }
        }

        false
    }

    /// Active warnings per symbol.
    pub fn warnings(&mut self) -> HashMap<String, String> {
        let model = self.engine.model.clone();
        let mut warnings = HashMap::new();

        for id in model.sym_ids() {
            if let Some(message) = self.engine.active_warning(id) {
                warnings.insert(model.sym(id).name.clone(), message);
            }
        }

        warnings
    }

    fn mask_invisible(values: &HashMap<String, Json>, visible: &HashMap<String, bool>) -> HashMap<String, Json> {
        values
            .iter()
            .map(|(name, value)| {
                let value = if visible.get(name).copied().unwrap_or(false) { value.clone() } else { Json::Null };
                (name.clone(), value)
            })
            .collect()
    }
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Hex(h) => json!(h),
        Value::Str(s) => json!(s),
        Value::Float(x) => json!(x),
    }
}

fn range_to_json(value: &Value) -> Json {
    match value {
        Value::Int(i) => json!(i),
        Value::Hex(h) => json!(h),
        Value::Float(x) => json!(x),
        other => json!(other.to_string()),
    }
}

/// Decode a JSON request value for a symbol of the given kind. Hex symbols
/// accept a decimal JSON number or a string of hex digits.
fn json_to_value(kind: Kind, value: &Json) -> Option<Value> {
    match kind {
        Kind::Bool => value.as_bool().map(Value::Bool),
        Kind::Int => match value {
            Json::Number(n) => n.as_i64().map(Value::Int),
            Json::String(s) => s.parse().ok().map(Value::Int),
            _ => None,
        },
        Kind::Hex => match value {
            Json::Number(n) => n.as_u64().map(Value::Hex),
            Json::String(s) => {
                let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
                u64::from_str_radix(digits, 16).ok().map(Value::Hex)
            }
            _ => None,
        },
        Kind::Float => value.as_f64().map(Value::Float),
        Kind::String | Kind::Unknown => value.as_str().map(|s| Value::Str(s.to_string())),
    }
}

fn diff(before: &HashMap<String, Json>, after: &HashMap<String, Json>) -> Map<String, Json> {
    let mut changed = Map::new();
    for (name, value) in after {
        if before.get(name) != Some(value) {
            changed.insert(name.clone(), value.clone());
        }
    }
    changed
}

fn diff_bool(before: &HashMap<String, bool>, after: &HashMap<String, bool>) -> HashMap<String, bool> {
    after
        .iter()
        .filter(|(name, value)| before.get(name.as_str()) != Some(value))
        .map(|(name, value)| (name.clone(), *value))
        .collect()
}

#[cfg(test)]
mod tests {
    use {
        super::{Session, MAX_PROTOCOL_VERSION},
        crate::{
            eval::Engine,
            model::Model,
            parser::{Kconfig, ParseContext, PeekableChars},
            renames::RenameMap,
            report::Report,
        },
        serde_json::json,
        std::{collections::HashMap, path::Path, path::PathBuf},
    };

    fn session(input: &str) -> Session {
        let ctx = ParseContext::with_env(HashMap::new());
        let kconfig = Kconfig::from_str(PeekableChars::new(input, Path::new("test")), Path::new("/tmp"), &ctx).unwrap();
        let mut report = Report::new();
        let model = Model::build(&kconfig, &ctx, &mut report).unwrap();
        Session::new(Engine::new(model, report), RenameMap::new(), PathBuf::from("/tmp/config"), MAX_PROTOCOL_VERSION)
    }

    const KCONFIG: &str = r#"config A
    bool "A"
    default n

config N
    int "N"
    range 1 10
    default 5
"#;

    #[test]
    fn initial_state_carries_all_maps() {
        let mut s = session(KCONFIG);
        let state = s.initial_state();

        assert_eq!(state["version"], json!(3));
        assert_eq!(state["values"]["A"], json!(false));
        assert_eq!(state["values"]["N"], json!(5));
        assert_eq!(state["ranges"]["N"], json!([1, 10]));
        assert_eq!(state["visible"]["A"], json!(true));
        assert_eq!(state["defaults"]["A"], json!(true));
    }

    #[test]
    fn set_applies_and_reports_unknown_symbols() {
        let mut s = session(KCONFIG);
        _ = s.initial_state();

        let response = s.handle_line(r#"{"version":3,"set":{"A":true,"UNKNOWN":1}}"#);

        assert_eq!(response["values"]["A"], json!(true));
        assert_eq!(response["error"], json!(["Unknown symbol: UNKNOWN"]));
        // A moved off its default.
        assert_eq!(response["defaults"]["A"], json!(false));
    }

    #[test]
    fn unsupported_version_is_rejected_without_state_change() {
        let mut s = session(KCONFIG);
        _ = s.initial_state();

        let response = s.handle_line(r#"{"version":9,"set":{"A":true}}"#);
        assert!(response["error"][0].as_str().unwrap().contains("Unsupported request version 9"));

        let a = s.engine_mut().lookup("A").unwrap();
        assert_eq!(s.engine_mut().value(a), crate::value::Value::Bool(false));
    }

    #[test]
    fn malformed_json_is_an_error_response() {
        let mut s = session(KCONFIG);
        let response = s.handle_line("{not json");
        assert!(response["error"][0].as_str().unwrap().contains("JSON formatting error"));
    }

    #[test]
    fn missing_version_is_rejected() {
        let mut s = session(KCONFIG);
        let response = s.handle_line(r#"{"set":{"A":true}}"#);
        assert_eq!(response["error"], json!(["All requests must have a 'version'"]));
    }

    #[test]
    fn choice_set_flips_members_in_one_response() {
        let mut s = session(
            r#"choice C
    prompt "c"

    config M1
        bool "1"

    config M2
        bool "2"
endchoice
"#,
        );
        _ = s.initial_state();

        let response = s.handle_line(r#"{"version":3,"set":{"M2":true}}"#);
        assert_eq!(response["values"]["M2"], json!(true));
        assert_eq!(response["values"]["M1"], json!(false));
        assert!(response.get("error").is_none());
    }

    #[test]
    fn reset_requires_v3() {
        let mut s = session(KCONFIG);
        _ = s.initial_state();

        let response = s.handle_line(r#"{"version":2,"reset":["A"]}"#);
        assert!(response["error"][0].as_str().unwrap().contains("not supported in protocol version 2"));
    }

    #[test]
    fn reset_all_restores_defaults() {
        let mut s = session(KCONFIG);
        _ = s.initial_state();

        _ = s.handle_line(r#"{"version":3,"set":{"A":true}}"#);
        let response = s.handle_line(r#"{"version":3,"reset":["all"]}"#);

        assert_eq!(response["values"]["A"], json!(false));
        assert_eq!(response["defaults"]["A"], json!(true));
    }

    #[test]
    fn deferred_set_waits_for_visibility() {
        let mut s = session(
            r#"config GATE
    bool "gate"
    default n

config DEP
    int "dep"
    depends on GATE
    default 1
"#,
        );
        _ = s.initial_state();

        // DEP only becomes visible once GATE flips; same request, any order.
        let response = s.handle_line(r#"{"version":3,"set":{"DEP":7,"GATE":true}}"#);
        assert!(response.get("error").is_none(), "unexpected errors: {response}");
        assert_eq!(response["values"]["DEP"], json!(7));
    }

    #[test]
    fn invisible_set_reports_error() {
        let mut s = session(
            r#"config GATE
    bool "gate"
    default n

config DEP
    int "dep"
    depends on GATE
    default 1
"#,
        );
        _ = s.initial_state();

        let response = s.handle_line(r#"{"version":3,"set":{"DEP":7}}"#);
        assert!(response["error"][0].as_str().unwrap().contains("not visible"));
    }
}
