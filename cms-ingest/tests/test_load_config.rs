use cms_ingest::load_config::{base_url_from_env, load_catalog, parse_trigger};
use serde_json::json;
use serial_test::serial;
use std::env;
use std::fs::write;
use tempfile::NamedTempFile;

const BASE: &str = "https://example.org/provider-data/files";

fn catalog_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

#[test]
fn test_load_catalog_defaults_to_builtin() {
    let catalog = load_catalog(None, BASE).expect("built-in catalog loads");
    assert_eq!(catalog.len(), 9);
    assert_eq!(catalog.categories().next(), Some("dialysis-facilities"));
}

#[test]
fn test_load_catalog_from_yaml_keeps_file_order() {
    let file = catalog_file(
        r#"
categories:
  - name: supplier-directory
    locators:
      - archive/Supplier%20directory/current/supplier_directory_current_data.zip
  - name: hospice-care
    locators:
      - https://mirror.example.net/hospice.zip
      - data_dictionaries/hospice/HOSPICE_Data_Dictionary.pdf
"#,
    );

    let catalog = load_catalog(Some(file.path()), BASE).expect("Catalog should load");

    let names: Vec<&str> = catalog.categories().collect();
    assert_eq!(names, vec!["supplier-directory", "hospice-care"]);
    let hospice: Vec<&str> = catalog
        .locators("hospice-care")
        .unwrap()
        .iter()
        .map(|u| u.as_str())
        .collect();
    assert_eq!(
        hospice,
        vec![
            "https://mirror.example.net/hospice.zip",
            "https://example.org/provider-data/files/data_dictionaries/hospice/HOSPICE_Data_Dictionary.pdf",
        ]
    );
}

#[test]
fn test_load_catalog_allows_empty_file() {
    let file = catalog_file("");
    let catalog = load_catalog(Some(file.path()), BASE).expect("empty catalog is legal");
    assert!(catalog.is_empty());

    let file = catalog_file("categories: []\n");
    assert!(load_catalog(Some(file.path()), BASE).unwrap().is_empty());
}

#[test]
fn test_load_catalog_rejects_category_without_locators() {
    let file = catalog_file("categories:\n  - name: lonely\n    locators: []\n");
    let err = load_catalog(Some(file.path()), BASE).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("lonely"), "got: {msg}");
}

#[test]
fn test_load_catalog_errors_for_invalid_yaml() {
    let file = catalog_file("not-yaml: [:::");
    let err = load_catalog(Some(file.path()), BASE).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
fn test_load_catalog_errors_for_missing_file() {
    let err = load_catalog(Some(std::path::Path::new("/nonexistent/catalog.yaml")), BASE)
        .unwrap_err();
    assert!(err.to_string().contains("Failed to read catalog file"));
}

#[test]
fn test_parse_trigger() {
    assert_eq!(
        parse_trigger(Some(r#"{"source":"aws.events"}"#)).unwrap(),
        json!({"source": "aws.events"})
    );
    assert!(parse_trigger(None).unwrap().is_object());
    assert!(parse_trigger(Some("{not json")).is_err());
}

#[test]
#[serial]
fn test_base_url_from_env() {
    env::set_var("BASE_URL", format!("  {BASE}  "));
    assert_eq!(base_url_from_env().unwrap(), BASE);

    env::set_var("BASE_URL", "");
    assert!(base_url_from_env().is_err());

    env::remove_var("BASE_URL");
    let err = base_url_from_env().unwrap_err();
    assert!(err.to_string().contains("BASE_URL"));
}
