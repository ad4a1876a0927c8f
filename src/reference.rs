//! Loading suffix reference tables into memory.
//!
//! Two storage formats are understood, chosen by file extension:
//!
//! - **SQLite** (`.db`, `.sqlite`, `.sqlite3`): one table per stage, named as in
//!   [`StageTable::name`]. Columns are read by position as
//!   `(suffix, description, units, level)` and cast to text. Missing stage
//!   tables are treated as empty.
//! - **TOML**: one array of tables per stage:
//!
//! ```toml
//! [[image2]]
//! suffix = "cal"
//! description = "Calibrated image"
//! units = "MJy/sr"
//! level = "2b"
//! ```
//!
//! The whole reference is loaded once, before resolution starts, and is
//! read-only afterwards.

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use jwst_catalog_core::reference::memory::MemoryReference;
use jwst_catalog_core::reference::{StageTable, SuffixEntry};

/// Load the reference tables at `path`.
pub async fn load_reference(path: &Path) -> Result<MemoryReference> {
    if !path.exists() {
        bail!("Reference tables not found: {}", path.display());
    }

    let reference = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => load_toml(path)?,
        Some("db" | "sqlite" | "sqlite3") => load_sqlite(path).await?,
        _ => bail!(
            "Unsupported reference file: {} (expected .db, .sqlite, .sqlite3 or .toml)",
            path.display()
        ),
    };

    tracing::info!(
        path = %path.display(),
        rows = reference.total_rows(),
        "reference tables loaded"
    );
    Ok(reference)
}

fn load_toml(path: &Path) -> Result<MemoryReference> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference file: {}", path.display()))?;
    let tables: BTreeMap<String, Vec<SuffixEntry>> = toml::from_str(&content)
        .with_context(|| format!("Failed to parse reference file: {}", path.display()))?;

    let mut reference = MemoryReference::new();
    for (name, rows) in tables {
        let table = StageTable::from_str(&name)?;
        for row in rows {
            reference.insert(table, row);
        }
    }
    Ok(reference)
}

async fn load_sqlite(path: &Path) -> Result<MemoryReference> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .read_only(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open reference database: {}", path.display()))?;

    let mut reference = MemoryReference::new();
    for table in StageTable::ALL {
        let columns: Vec<String> = sqlx::query(&format!("PRAGMA table_info({})", table.name()))
            .fetch_all(&pool)
            .await?
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();

        if columns.is_empty() {
            tracing::warn!(table = %table, "reference table missing, treating as empty");
            continue;
        }
        if columns.len() < 4 {
            pool.close().await;
            bail!(
                "Reference table '{}' needs (suffix, description, units, level) columns, found {}",
                table,
                columns.len()
            );
        }

        let select = columns[..4]
            .iter()
            .map(|c| format!("CAST(\"{}\" AS TEXT)", c.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(", ");
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} ORDER BY rowid",
            select,
            table.name()
        ))
        .fetch_all(&pool)
        .await?;

        for row in &rows {
            let suffix: Option<String> = row.try_get(0)?;
            let Some(suffix) = suffix else { continue };
            reference.insert(
                table,
                SuffixEntry {
                    suffix,
                    description: row.try_get(1)?,
                    units: row.try_get(2)?,
                    level: row.try_get(3)?,
                },
            );
        }
    }

    pool.close().await;
    Ok(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jwst_catalog_core::reference::SuffixReference;

    #[tokio::test]
    async fn test_load_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("reference.toml");
        std::fs::write(
            &path,
            r#"
[[detector1]]
suffix = "rate"
description = "Countrate image"
units = "DN/s"
level = "2a"

[[coron3]]
suffix = "psfsub"
description = "PSF-subtracted image"
"#,
        )
        .unwrap();

        let reference = load_reference(&path).await.unwrap();
        let rate = reference.lookup(StageTable::Detector1, "rate").unwrap();
        assert_eq!(rate.units.as_deref(), Some("DN/s"));
        let psfsub = reference.lookup(StageTable::Coron3, "psfsub").unwrap();
        assert_eq!(psfsub.level, None);
    }

    #[tokio::test]
    async fn test_toml_unknown_stage() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("reference.toml");
        std::fs::write(&path, "[[stage9]]\nsuffix = \"x\"\n").unwrap();
        assert!(load_reference(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_load_sqlite() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("jwstproducts.db");

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .unwrap()
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE image2 (suffix TEXT, description TEXT, units TEXT, level INTEGER)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO image2 VALUES ('cal', 'Calibrated image', 'MJy/sr', 2)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let reference = load_reference(&path).await.unwrap();
        let cal = reference.lookup(StageTable::Image2, "cal").unwrap();
        assert_eq!(cal.description.as_deref(), Some("Calibrated image"));
        assert_eq!(cal.level.as_deref(), Some("2"));
        assert_eq!(reference.total_rows(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("reference.csv");
        std::fs::write(&path, "suffix,description\ncal,Calibrated\n").unwrap();
        let err = load_reference(&path).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported reference file"));
    }

    #[tokio::test]
    async fn test_missing_reference() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = load_reference(&tmp.path().join("none.db")).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
