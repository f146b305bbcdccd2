//! End-to-end flows over real files: source inclusion, configuration
//! round-trips, and rename routing.

use {
    kconfix::{
        conf::{self, DefaultsPolicy},
        eval::{Engine, Origin},
        model::Model,
        parser::{Kconfig, ParseContext},
        renames::RenameMap,
        report::Report,
        value::Value,
    },
    std::{collections::HashMap, fs, path::Path},
    tempfile::TempDir,
};

fn build_engine(root: &Path, kconfig: &Path, env: HashMap<String, String>) -> Engine {
    let ctx = ParseContext::with_env(env);
    let kconfig = Kconfig::from_file(kconfig, root, &ctx).unwrap();
    let mut report = Report::new();
    let model = Model::build(&kconfig, &ctx, &mut report).unwrap();
    Engine::new(model, report)
}

#[test]
fn source_tree_is_inlined() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::create_dir(root.join("comp")).unwrap();
    fs::write(
        root.join("Kconfig"),
        "mainmenu \"Project\"\n\nsource \"comp/Kconfig.comp\"\nosource \"missing/Kconfig.opt\"\n",
    )
    .unwrap();
    fs::write(
        root.join("comp/Kconfig.comp"),
        "config FROM_COMPONENT\n    bool \"from component\"\n    default y\n\nrsource \"Kconfig.nested\"\n",
    )
    .unwrap();
    fs::write(root.join("comp/Kconfig.nested"), "config NESTED\n    int \"nested\"\n    default 3\n").unwrap();

    let mut engine = build_engine(root, &root.join("Kconfig"), HashMap::new());

    assert_eq!(engine.model.mainmenu.as_deref(), Some("Project"));
    let from_component = engine.lookup("FROM_COMPONENT").unwrap();
    let nested = engine.lookup("NESTED").unwrap();
    assert_eq!(engine.value(from_component), Value::Bool(true));
    assert_eq!(engine.value(nested), Value::Int(3));
}

#[test]
fn missing_required_source_fails() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::write(root.join("Kconfig"), "source \"nope/Kconfig.missing\"\n").unwrap();

    let ctx = ParseContext::with_env(HashMap::new());
    assert!(Kconfig::from_file(&root.join("Kconfig"), root, &ctx).is_err());
}

#[test]
fn macro_paths_expand_with_literal_final_component() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::create_dir(root.join("target-a")).unwrap();
    fs::write(root.join("Kconfig"), "TARGET_DIR = target-a\nsource \"$(TARGET_DIR)/Kconfig.target\"\n").unwrap();
    fs::write(root.join("target-a/Kconfig.target"), "config TARGETED\n    bool \"targeted\"\n    default y\n").unwrap();

    let mut engine = build_engine(root, &root.join("Kconfig"), HashMap::new());
    assert_eq!(engine.value(engine.lookup("TARGETED").unwrap()), Value::Bool(true));
}

#[test]
fn environment_is_captured_at_parse_time() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::write(
        root.join("Kconfig"),
        "config TARGET\n    string \"target\"\n    default \"$(TARGET_NAME)\"\n",
    )
    .unwrap();

    let mut env = HashMap::new();
    env.insert("TARGET_NAME".to_string(), "esp32".to_string());

    let mut engine = build_engine(root, &root.join("Kconfig"), env);
    assert_eq!(engine.value(engine.lookup("TARGET").unwrap()), Value::Str("esp32".into()));
}

#[test]
fn config_file_round_trip_on_disk() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::write(
        root.join("Kconfig"),
        r#"menu "Options"

config ENABLE
    bool "enable"
    default y

config COUNT
    int "count"
    depends on ENABLE
    range 1 8
    default 4

config LABEL
    string "label"
    default "none"
endmenu
"#,
    )
    .unwrap();

    let config_path = root.join("config");
    fs::write(&config_path, "CONFIG_ENABLE=y\nCONFIG_COUNT=6\n").unwrap();

    let renames = RenameMap::new();
    let mut engine = build_engine(root, &root.join("Kconfig"), HashMap::new());

    conf::load_config(&mut engine, &renames, &config_path, Origin::PrimaryConfig, DefaultsPolicy::Sdkconfig).unwrap();
    assert!(conf::write_config(&mut engine, &renames, &config_path, None).unwrap());

    let first = fs::read_to_string(&config_path).unwrap();
    assert!(first.contains("CONFIG_ENABLE=y\n"));
    assert!(first.contains("CONFIG_COUNT=6\n"));
    assert!(first.contains("# default:\nCONFIG_LABEL=\"none\"\n"));

    // Loading the written file and writing again changes nothing.
    let mut engine2 = build_engine(root, &root.join("Kconfig"), HashMap::new());
    conf::load_config(&mut engine2, &renames, &config_path, Origin::PrimaryConfig, DefaultsPolicy::Sdkconfig).unwrap();
    assert!(!conf::write_config(&mut engine2, &renames, &config_path, None).unwrap());
    assert_eq!(fs::read_to_string(&config_path).unwrap(), first);
}

#[test]
fn rename_chain_of_three_routes_to_canonical() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::write(root.join("Kconfig"), "config NEWEST\n    int \"newest\"\n    default 1\n").unwrap();

    let mut renames = RenameMap::new();
    renames.parse("CONFIG_OLDEST CONFIG_OLDER\nCONFIG_OLDER CONFIG_OLD\nCONFIG_OLD CONFIG_NEWEST\n", "r").unwrap();

    let mut engine = build_engine(root, &root.join("Kconfig"), HashMap::new());
    conf::load_config_str(&mut engine, &renames, "CONFIG_OLDEST=9\n", Origin::PrimaryConfig, DefaultsPolicy::Sdkconfig);

    assert_eq!(engine.value(engine.lookup("NEWEST").unwrap()), Value::Int(9));

    // The deprecated section carries every chained alias.
    let out = conf::config_contents(&mut engine, &renames, None);
    assert!(out.contains("CONFIG_OLDEST=9"));
    assert!(out.contains("CONFIG_OLDER=9"));
    assert!(out.contains("CONFIG_OLD=9"));
}

#[test]
fn header_output_defines_set_options() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::write(
        root.join("Kconfig"),
        r#"config ON
    bool "on"
    default y

config OFF
    bool "off"
    default n

config SIZE
    hex "size"
    default 0x1000

config NAME
    string "name"
    default "device"
"#,
    )
    .unwrap();

    let renames = RenameMap::new();
    let mut engine = build_engine(root, &root.join("Kconfig"), HashMap::new());

    let header = conf::header_contents(&mut engine, &renames, None);
    assert!(header.contains("#pragma once"));
    assert!(header.contains("#define CONFIG_ON 1\n"));
    assert!(!header.contains("CONFIG_OFF"));
    assert!(header.contains("#define CONFIG_SIZE 0x1000\n"));
    assert!(header.contains("#define CONFIG_NAME \"device\"\n"));
}

#[test]
fn empty_configuration_is_fine() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::write(root.join("Kconfig"), "").unwrap();

    let mut engine = build_engine(root, &root.join("Kconfig"), HashMap::new());
    let renames = RenameMap::new();
    assert_eq!(conf::config_contents(&mut engine, &renames, None), "");
}
