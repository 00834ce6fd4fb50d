use super::*;

use std::collections::HashMap;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(
        normalize_database_url("sqlite:data/test.db"),
        "sqlite://data/test.db"
    );
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
}

#[test]
fn settings_file_overrides_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("server.toml");
    fs::write(
        &path,
        "bind_addr = \"0.0.0.0:9000\"\nmax_upload_bytes = 2048\n",
    )
    .expect("write settings");

    let mut settings = Settings::default();
    apply_file(&mut settings, &path);

    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.max_upload_bytes, 2048);
    assert_eq!(settings.database_url, Settings::default().database_url);
}

#[test]
fn unreadable_settings_file_is_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("server.toml");
    fs::write(&path, "max_upload_bytes = \"lots\"").expect("write settings");

    let mut settings = Settings::default();
    apply_file(&mut settings, &path);
    apply_file(&mut settings, &dir.path().join("missing.toml"));

    assert_eq!(settings, Settings::default());
}

#[test]
fn prefixed_env_wins_over_short_names() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_of(&[
            ("SERVER_BIND", "127.0.0.1:1"),
            ("APP__BIND_ADDR", "127.0.0.1:2"),
            ("DATABASE_URL", "sqlite://short.db"),
            ("APP__MAX_UPLOAD_BYTES", "512"),
        ]),
    );

    assert_eq!(settings.server_bind, "127.0.0.1:2");
    assert_eq!(settings.database_url, "sqlite://short.db");
    assert_eq!(settings.max_upload_bytes, 512);
}

#[test]
fn invalid_upload_limit_keeps_previous_value() {
    let mut settings = Settings::default();
    apply_env(&mut settings, env_of(&[("APP__MAX_UPLOAD_BYTES", "ten")]));
    assert_eq!(settings.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
}

#[tokio::test]
async fn normalized_url_opens_nested_sqlite_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("nested").join("server.db");

    let database_url = normalize_database_url(db_path.to_string_lossy().as_ref());
    let storage = storage::Storage::new(&database_url)
        .await
        .expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );
}
