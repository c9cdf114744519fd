//! `load_config` module: startup configuration for the CLI.
//!
//! Two inputs feed a run: the process environment (bucket, staging folder, mail
//! settings, see [`cms_ingest_core::config::Settings`]) and the category catalog.
//! The catalog is the built-in CMS provider catalog unless a YAML file is given.
//!
//! # Catalog file schema
//!
//! ```yaml
//! categories:
//!   - name: hospice-care
//!     locators:
//!       - archive/Hospice%20care/current/hospice_care_current_data.zip
//!       - https://example.org/absolute/locator.pdf
//! ```
//!
//! Relative locators are appended to `BASE_URL`.
//!
//! # Errors
//! All errors are `anyhow::Error` with context and surface at the CLI boundary.

use anyhow::{Context, Result};
use cms_ingest_core::catalog::{Catalog, CatalogFile};
use cms_ingest_core::config::{ConfigurationError, BASE_URL};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Reads `BASE_URL` alone, for commands that only need to resolve the catalog.
pub fn base_url_from_env() -> Result<String> {
    match std::env::var(BASE_URL) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        Ok(_) => Err(ConfigurationError::Empty(BASE_URL).into()),
        Err(_) => Err(ConfigurationError::Missing(BASE_URL).into()),
    }
}

/// Loads the catalog from `path` when given, otherwise the built-in CMS provider catalog.
pub fn load_catalog(path: Option<&Path>, base_url: &str) -> Result<Catalog> {
    let Some(path_ref) = path else {
        info!(base_url, "Using built-in CMS provider catalog");
        return Catalog::cms_provider(base_url).context("Built-in catalog is invalid");
    };
    info!(catalog_path = ?path_ref, "Loading catalog from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(catalog_path = ?path_ref, "Catalog file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, catalog_path = ?path_ref, "Failed to read catalog file");
            return Err(anyhow::anyhow!(
                "Failed to read catalog file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let file: CatalogFile = match serde_yaml::from_str::<Option<CatalogFile>>(&content) {
        Ok(parsed) => {
            info!(catalog_path = ?path_ref, "Parsed catalog YAML successfully");
            parsed.unwrap_or_default()
        }
        Err(e) => {
            error!(error = ?e, catalog_path = ?path_ref, "Failed to parse catalog YAML");
            return Err(anyhow::anyhow!("Failed to parse catalog YAML: {e}"));
        }
    };

    let catalog = Catalog::from_specs(base_url, &file.categories)
        .with_context(|| format!("Invalid catalog in {}", path_ref.display()))?;
    info!(categories = catalog.len(), "Catalog loaded");
    Ok(catalog)
}

/// Parses the invocation event. Without one, a placeholder event marks a CLI invocation.
pub fn parse_trigger(raw: Option<&str>) -> Result<Value> {
    match raw {
        Some(raw) => serde_json::from_str(raw).context("--event is not valid JSON"),
        None => Ok(json!({ "source": "cms-ingest", "detail": "cli invocation" })),
    }
}
