use anyhow::{Context, Result};
use jwst_catalog_core::resolve::SearchPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReferenceConfig {
    pub path: PathBuf,
    #[serde(default = "default_policy")]
    pub policy: String,
}

fn default_policy() -> String {
    "standard".to_string()
}

impl ReferenceConfig {
    pub fn search_policy(&self) -> Result<SearchPolicy> {
        self.policy.parse()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_product_extension")]
    pub product_extension: String,
    #[serde(default = "default_manifest_extension")]
    pub manifest_extension: String,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_read_headers")]
    pub read_headers: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: None,
            product_extension: default_product_extension(),
            manifest_extension: default_manifest_extension(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            read_headers: default_read_headers(),
        }
    }
}

fn default_product_extension() -> String {
    "fits".to_string()
}
fn default_manifest_extension() -> String {
    "json".to_string()
}
fn default_read_headers() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Extensions are compared without the leading dot
    let scan = &mut config.scan;
    scan.product_extension = scan.product_extension.trim_start_matches('.').to_string();
    scan.manifest_extension = scan.manifest_extension.trim_start_matches('.').to_string();

    if scan.product_extension.is_empty() || scan.manifest_extension.is_empty() {
        anyhow::bail!("scan.product_extension and scan.manifest_extension must be non-empty");
    }
    if scan.product_extension.eq_ignore_ascii_case(&scan.manifest_extension) {
        anyhow::bail!(
            "scan.product_extension and scan.manifest_extension must differ (both '{}')",
            scan.product_extension
        );
    }

    config.reference.search_policy()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("jwscan.toml");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_defaults() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "./data/catalog.sqlite"

[reference]
path = "./jwstproducts.db"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.scan.product_extension, "fits");
        assert_eq!(config.scan.manifest_extension, "json");
        assert!(config.scan.read_headers);
        assert!(config.scan.root.is_none());
        assert_eq!(config.log.level, "info");
        assert_eq!(
            config.reference.search_policy().unwrap(),
            SearchPolicy::Standard
        );
    }

    #[test]
    fn test_extension_dots_stripped() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "catalog.sqlite"

[reference]
path = "ref.toml"
policy = "exposure-gated"

[scan]
product_extension = ".fits"
manifest_extension = ".json"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.scan.product_extension, "fits");
        assert_eq!(
            config.reference.search_policy().unwrap(),
            SearchPolicy::ExposureGated
        );
    }

    #[test]
    fn test_rejects_same_extensions() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "catalog.sqlite"

[reference]
path = "ref.toml"

[scan]
product_extension = "json"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "catalog.sqlite"

[reference]
path = "ref.toml"
policy = "first-wins"
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("first-wins"));
    }
}
