//! Tests for global flags and how they override the loaded config.

use super::parse_cli;
use ordersink_core::config::AppConfig;
use std::path::Path;

#[test]
fn global_flags_default_off() {
    let cli = parse_cli(&["ordersink", "insert"]);
    assert!(cli.config.is_none());
    assert!(!cli.no_retry);
    assert!(cli.max_retries.is_none());
    assert!(!cli.log_stderr);
}

#[test]
fn global_flags_after_subcommand() {
    let cli = parse_cli(&[
        "ordersink",
        "load",
        "--no-retry",
        "--max-retries",
        "2",
        "--config",
        "/tmp/os.toml",
        "--log-stderr",
    ]);
    assert!(cli.no_retry);
    assert_eq!(cli.max_retries, Some(2));
    assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/os.toml")));
    assert!(cli.log_stderr);
}

#[test]
fn flags_override_config() {
    let cli = parse_cli(&["ordersink", "--no-retry", "--max-retries", "0", "serve"]);
    let mut cfg = AppConfig::default();
    cli.apply_overrides(&mut cfg);
    assert!(!cfg.retry.enabled);
    assert_eq!(cfg.retry.max_retries, 0);
}

#[test]
fn absent_flags_keep_config() {
    let cli = parse_cli(&["ordersink", "serve"]);
    let mut cfg = AppConfig::default();
    cli.apply_overrides(&mut cfg);
    assert_eq!(cfg, AppConfig::default());
}

#[test]
fn effective_config_reads_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "listen_addr = \"127.0.0.1:7000\"\n[retry]\nmax_retries = 3\n").unwrap();
    let path_str = path.to_str().unwrap();
    let cli = parse_cli(&["ordersink", "--config", path_str, "--max-retries", "1", "config"]);
    let cfg = cli.effective_config().unwrap();
    assert_eq!(cfg.listen_addr, "127.0.0.1:7000");
    assert_eq!(cfg.retry.max_retries, 1);
}
