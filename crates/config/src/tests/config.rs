use core::time::Duration;

use camino::Utf8PathBuf;
use claims::{assert_none, assert_ok, assert_some_eq};
use tempdir::TempDir;

use super::*;

fn temp_home() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new("proofnet-config").expect("failed to create temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().to_owned()).expect("temp dir is not UTF-8");

    (dir, path)
}

#[test]
fn test_save_then_load() {
    let (_guard, home) = temp_home();
    let listen: SocketAddr = "127.0.0.1:7640".parse().unwrap();
    let hook: SocketAddr = "10.0.0.1:7640".parse().unwrap();

    let mut config = ConfigFile::generate(Gender::Female, Some(listen), vec![hook]);
    config.timeouts.dialog = Duration::from_millis(1_500);

    assert!(!ConfigFile::exists(&home));
    assert_ok!(config.save(&home));
    assert!(ConfigFile::exists(&home));

    let loaded = ConfigFile::load(&home).unwrap();

    assert_eq!(loaded.identity.node_id, config.identity.node_id);
    assert_eq!(loaded.network.gender, Gender::Female);
    assert_some_eq!(loaded.network.listen, listen);
    assert_none!(loaded.network.public_address);
    assert_eq!(loaded.network.hooks, vec![hook]);
    assert_eq!(loaded.timeouts.dialog, Duration::from_millis(1_500));
}

#[test]
fn test_missing_sections_use_defaults() {
    let (_guard, home) = temp_home();
    let node_id = NodeId::random();

    let content = format!(
        "[identity]\nnode_id = \"{node_id}\"\n\n[network]\ngender = \"male\"\n"
    );
    write(home.join(CONFIG_FILE), content).unwrap();

    let loaded = ConfigFile::load(&home).unwrap();
    let node = loaded.to_node_config();

    assert_eq!(node.node_id, node_id);
    assert_eq!(node.network.gender, Gender::Male);
    assert_none!(node.network.listen);
    assert!(node.network.hooks.is_empty());
    assert_eq!(node.timeouts.dialog, TimeoutConfig::default().dialog);
    assert_eq!(node.limits.max_frame_len, LimitsConfig::default().max_frame_len);
}

#[test]
fn test_durations_are_stored_as_milliseconds() {
    let mut config = ConfigFile::generate(Gender::Male, None, Vec::new());
    config.timeouts.connect = Duration::from_secs(3);

    let content = toml::to_string_pretty(&config).unwrap();

    assert!(content.contains("connect_ms = 3000"), "{content}");
}

#[test]
fn test_save_if_changed() {
    let (_guard, home) = temp_home();
    let mut config = ConfigFile::generate(Gender::Male, None, Vec::new());

    assert!(config.save_if_changed(&home).unwrap());
    assert!(!config.save_if_changed(&home).unwrap());

    config.network.hooks.push("10.0.0.2:7640".parse().unwrap());

    assert!(config.save_if_changed(&home).unwrap());
}

#[test]
fn test_load_reports_missing_file() {
    let (_guard, home) = temp_home();

    let err = ConfigFile::load(&home).unwrap_err();

    assert!(err.to_string().contains("failed to read configuration"));
}
