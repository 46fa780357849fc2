#![cfg(test)]

use serde_json::json;
use tempfile::tempdir;
use tokio::test;

use crate::config::ConfigData;
use crate::kernel::bootstrap::Kernel;

#[test]
async fn test_kernel_boots_from_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keel.json");
    tokio::fs::write(
        &path,
        r#"{ "modules": { "storage": { "type": "memory" } }, "services": { "storage": { "type": "memory" } } }"#,
    )
    .await
    .unwrap();

    let config = ConfigData::load_from_path(&path).await.unwrap();
    let kernel = Kernel::new();
    kernel.init(config).await.unwrap();

    let effective = kernel.config();
    assert_eq!(
        effective.section("services").section("storage").get::<String>("type"),
        Some("memory".to_string())
    );
    assert_eq!(
        effective.section("modules").section("storage").to_value(),
        json!({ "type": "memory" })
    );
}

#[cfg(feature = "yaml-config")]
#[test]
async fn test_kernel_boots_from_yaml_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keel.yaml");
    tokio::fs::write(&path, "modules:\n  ui:\n    theme: dark\n")
        .await
        .unwrap();

    let kernel = Kernel::new();
    kernel
        .init(ConfigData::load_from_path(&path).await.unwrap())
        .await
        .unwrap();
    assert_eq!(
        kernel.config().section("modules").section("ui").get::<String>("theme"),
        Some("dark".to_string())
    );
    // Defaults survive keys the file does not mention.
    assert!(kernel.config().contains_key("services"));
}
