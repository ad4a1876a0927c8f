//! Catalog persistence.
//!
//! A scan replaces the whole catalog in one transaction: associations and
//! their member lists, resolved products, per-program counts and the
//! `program_<id>_products` / `program_<id>_associations` views. Each run
//! also appends a `scan_runs` row and its diagnostics, which are kept
//! across scans.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use jwst_catalog_core::diagnostics::Diagnostic;
use jwst_catalog_core::enrich::Enrichment;
use jwst_catalog_core::models::{AssociationRecord, Pointing, ProductRecord};

/// Identity and timing of one scan.
#[derive(Debug, Clone)]
pub struct ScanRun {
    pub id: String,
    pub root: String,
    pub started_at: i64,
    pub finished_at: i64,
}

/// Replace the catalog with `enrichment` and record the run.
pub async fn write_catalog(
    pool: &SqlitePool,
    run: &ScanRun,
    enrichment: &Enrichment,
    diagnostics: &[Diagnostic],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM association_members")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM associations")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM products").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM programs").execute(&mut *tx).await?;
    drop_program_views(&mut tx).await?;

    for asn in &enrichment.associations {
        insert_association(&mut tx, asn).await?;
    }
    for product in &enrichment.products {
        insert_product(&mut tx, product).await?;
    }

    for (program_id, group) in &enrichment.programs {
        sqlx::query(
            "INSERT INTO programs (program_id, product_count, association_count) VALUES (?, ?, ?)",
        )
        .bind(program_id)
        .bind(group.products.len() as i64)
        .bind(group.associations.len() as i64)
        .execute(&mut *tx)
        .await?;
        create_program_views(&mut tx, program_id).await?;
    }

    let stats = &enrichment.stats;
    sqlx::query(
        r#"
        INSERT INTO scan_runs (id, root, started_at, finished_at, manifests_seen, associations, products_seen, products_resolved, malformed, unresolved, programs)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&run.id)
    .bind(&run.root)
    .bind(run.started_at)
    .bind(run.finished_at)
    .bind(stats.manifests_seen as i64)
    .bind(stats.associations as i64)
    .bind(stats.products_seen as i64)
    .bind(stats.products_resolved as i64)
    .bind((stats.diagnostics.malformed + stats.diagnostics.invalid_dates) as i64)
    .bind(stats.diagnostics.unresolved as i64)
    .bind(stats.programs as i64)
    .execute(&mut *tx)
    .await?;

    for diagnostic in diagnostics {
        let (kind, filename) = diagnostic_key(diagnostic);
        sqlx::query(
            "INSERT INTO scan_diagnostics (run_id, kind, filename, detail) VALUES (?, ?, ?, ?)",
        )
        .bind(&run.id)
        .bind(kind)
        .bind(filename)
        .bind(serde_json::to_string(diagnostic)?)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn insert_association(tx: &mut Transaction<'_, Sqlite>, asn: &AssociationRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO associations (filename, program_id, candidate_id, observation_date, pipeline_tag, sequence_number, asn_type, asn_pool, product_names, member_count)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(filename) DO UPDATE SET
            program_id = excluded.program_id,
            candidate_id = excluded.candidate_id,
            observation_date = excluded.observation_date,
            pipeline_tag = excluded.pipeline_tag,
            sequence_number = excluded.sequence_number,
            asn_type = excluded.asn_type,
            asn_pool = excluded.asn_pool,
            product_names = excluded.product_names,
            member_count = excluded.member_count
        "#,
    )
    .bind(&asn.filename)
    .bind(&asn.program_id)
    .bind(&asn.candidate_id)
    .bind(asn.observation_date.format("%Y-%m-%d").to_string())
    .bind(&asn.pipeline_tag)
    .bind(&asn.sequence_number)
    .bind(&asn.asn_type)
    .bind(&asn.asn_pool)
    .bind(serde_json::to_string(&asn.product_names)?)
    .bind(asn.member_filenames.len() as i64)
    .execute(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM association_members WHERE association = ?")
        .bind(&asn.filename)
        .execute(&mut **tx)
        .await?;
    for (position, member) in asn.member_filenames.iter().enumerate() {
        sqlx::query(
            "INSERT INTO association_members (association, position, member) VALUES (?, ?, ?)",
        )
        .bind(&asn.filename)
        .bind(position as i64)
        .bind(member)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_product(tx: &mut Transaction<'_, Sqlite>, product: &ProductRecord) -> Result<()> {
    let (visit_group, parallel_sequence, activity_number) = match &product.pointing {
        Pointing::Visit {
            visit_group,
            parallel_sequence,
            activity_number,
        } => (
            Some(visit_group.as_str()),
            Some(parallel_sequence.as_str()),
            Some(activity_number.as_str()),
        ),
        _ => (None, None, None),
    };
    let header = product.header.as_ref();
    let stage = product
        .metadata
        .as_ref()
        .map(|m| m.stage.as_str())
        .unwrap_or_default();

    sqlx::query(
        r#"
        INSERT INTO products (filename, program_id, association_number, member_of, instrument, detector, optical_elements, target_id, source_id, observation_number, visit_number, visit_group, parallel_sequence, activity_number, exposure_number, suffix, exp_type, tso_visit, date_obs, target, stage, description, units, level)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&product.filename)
    .bind(&product.program_id)
    .bind(product.association_number())
    .bind(&product.member_of)
    .bind(&product.instrument)
    .bind(&product.detector)
    .bind(&product.optical_elements)
    .bind(product.target_id())
    .bind(product.source_id())
    .bind(product.observation_number())
    .bind(product.visit_number())
    .bind(visit_group)
    .bind(parallel_sequence)
    .bind(activity_number)
    .bind(&product.exposure_number)
    .bind(&product.suffix)
    .bind(header.and_then(|h| h.exp_type.as_deref()))
    .bind(header.map(|h| h.tso_visit))
    .bind(header.and_then(|h| h.date_obs.as_deref()))
    .bind(header.and_then(|h| h.target.as_deref()))
    .bind(stage)
    .bind(product.description())
    .bind(product.units())
    .bind(product.level())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Program ids become part of view names, so only plain ASCII
/// alphanumerics are accepted.
fn view_safe(program_id: &str) -> bool {
    !program_id.is_empty() && program_id.chars().all(|c| c.is_ascii_alphanumeric())
}

async fn create_program_views(tx: &mut Transaction<'_, Sqlite>, program_id: &str) -> Result<()> {
    if !view_safe(program_id) {
        tracing::warn!(program = %program_id, "program id not usable as a view name, skipping views");
        return Ok(());
    }
    sqlx::query(&format!(
        "CREATE VIEW program_{0}_products AS SELECT * FROM products WHERE program_id = '{0}'",
        program_id
    ))
    .execute(&mut **tx)
    .await?;
    sqlx::query(&format!(
        "CREATE VIEW program_{0}_associations AS SELECT * FROM associations WHERE program_id = '{0}'",
        program_id
    ))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn drop_program_views(tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'view' AND name LIKE 'program\\_%' ESCAPE '\\'",
    )
    .fetch_all(&mut **tx)
    .await?;
    for name in names {
        sqlx::query(&format!("DROP VIEW IF EXISTS \"{}\"", name.replace('"', "\"\"")))
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

fn diagnostic_key(diagnostic: &Diagnostic) -> (&'static str, Option<&str>) {
    match diagnostic {
        Diagnostic::Malformed { filename, .. } => ("malformed", Some(filename.as_str())),
        Diagnostic::InvalidDate { filename, .. } => ("invalid_date", Some(filename.as_str())),
        Diagnostic::ManifestDegraded { filename, .. } => ("manifest_degraded", Some(filename.as_str())),
        Diagnostic::Unresolved { filename, .. } => ("unresolved", Some(filename.as_str())),
        Diagnostic::ContestedMember { member, .. } => ("contested_member", Some(member.as_str())),
        Diagnostic::OrphanedAssociation { filename, .. } => {
            ("orphaned_association", Some(filename.as_str()))
        }
        Diagnostic::MissingExposureType { filename } => ("missing_exposure_type", Some(filename.as_str())),
        Diagnostic::DuplicateAssociation { filename } => ("duplicate_association", Some(filename.as_str())),
    }
}

/// A stored product, as returned by `get` and `export`.
#[derive(Debug, Clone, Serialize)]
pub struct ProductRow {
    pub filename: String,
    pub program_id: String,
    pub association_number: Option<String>,
    pub member_of: Option<String>,
    pub instrument: Option<String>,
    pub detector: Option<String>,
    pub optical_elements: Option<String>,
    pub target_id: Option<String>,
    pub source_id: Option<String>,
    pub observation_number: Option<String>,
    pub visit_number: Option<String>,
    pub visit_group: Option<String>,
    pub parallel_sequence: Option<String>,
    pub activity_number: Option<String>,
    pub exposure_number: Option<String>,
    pub suffix: String,
    pub exp_type: Option<String>,
    pub tso_visit: Option<bool>,
    pub date_obs: Option<String>,
    pub target: Option<String>,
    pub stage: String,
    pub description: Option<String>,
    pub units: Option<String>,
    pub level: Option<String>,
}

fn product_row(row: &SqliteRow) -> ProductRow {
    ProductRow {
        filename: row.get("filename"),
        program_id: row.get("program_id"),
        association_number: row.get("association_number"),
        member_of: row.get("member_of"),
        instrument: row.get("instrument"),
        detector: row.get("detector"),
        optical_elements: row.get("optical_elements"),
        target_id: row.get("target_id"),
        source_id: row.get("source_id"),
        observation_number: row.get("observation_number"),
        visit_number: row.get("visit_number"),
        visit_group: row.get("visit_group"),
        parallel_sequence: row.get("parallel_sequence"),
        activity_number: row.get("activity_number"),
        exposure_number: row.get("exposure_number"),
        suffix: row.get("suffix"),
        exp_type: row.get("exp_type"),
        tso_visit: row.get("tso_visit"),
        date_obs: row.get("date_obs"),
        target: row.get("target"),
        stage: row.get("stage"),
        description: row.get("description"),
        units: row.get("units"),
        level: row.get("level"),
    }
}

/// All stored products, optionally for one program, in scan order.
pub async fn fetch_products(pool: &SqlitePool, program: Option<&str>) -> Result<Vec<ProductRow>> {
    let rows = sqlx::query("SELECT * FROM products WHERE (? IS NULL OR program_id = ?) ORDER BY id")
        .bind(program)
        .bind(program)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(product_row).collect())
}

/// Every stored product with this exact filename.
pub async fn fetch_products_named(pool: &SqlitePool, filename: &str) -> Result<Vec<ProductRow>> {
    let rows = sqlx::query("SELECT * FROM products WHERE filename = ? ORDER BY id")
        .bind(filename)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(product_row).collect())
}

/// A stored association with its member list.
#[derive(Debug, Clone, Serialize)]
pub struct AssociationRow {
    pub filename: String,
    pub program_id: String,
    pub candidate_id: String,
    pub observation_date: String,
    pub pipeline_tag: String,
    pub sequence_number: String,
    pub asn_type: Option<String>,
    pub asn_pool: Option<String>,
    pub product_names: Vec<String>,
    pub members: Vec<String>,
}

/// All stored associations, optionally for one program, by filename.
pub async fn fetch_associations(
    pool: &SqlitePool,
    program: Option<&str>,
) -> Result<Vec<AssociationRow>> {
    let rows = sqlx::query(
        "SELECT * FROM associations WHERE (? IS NULL OR program_id = ?) ORDER BY filename",
    )
    .bind(program)
    .bind(program)
    .fetch_all(pool)
    .await?;

    let mut associations = Vec::with_capacity(rows.len());
    for row in &rows {
        associations.push(association_row(pool, row).await?);
    }
    Ok(associations)
}

/// One stored association by filename, whatever its program.
pub async fn fetch_association(pool: &SqlitePool, filename: &str) -> Result<Option<AssociationRow>> {
    let row = sqlx::query("SELECT * FROM associations WHERE filename = ?")
        .bind(filename)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => Ok(Some(association_row(pool, &row).await?)),
        None => Ok(None),
    }
}

async fn association_row(pool: &SqlitePool, row: &SqliteRow) -> Result<AssociationRow> {
    let filename: String = row.get("filename");
    let members: Vec<String> = sqlx::query_scalar(
        "SELECT member FROM association_members WHERE association = ? ORDER BY position",
    )
    .bind(&filename)
    .fetch_all(pool)
    .await?;
    let product_names: String = row.get("product_names");
    let product_names: Vec<String> = serde_json::from_str(&product_names)
        .with_context(|| format!("Corrupt product_names stored for association {}", filename))?;

    Ok(AssociationRow {
        program_id: row.get("program_id"),
        candidate_id: row.get("candidate_id"),
        observation_date: row.get("observation_date"),
        pipeline_tag: row.get("pipeline_tag"),
        sequence_number: row.get("sequence_number"),
        asn_type: row.get("asn_type"),
        asn_pool: row.get("asn_pool"),
        product_names,
        members,
        filename,
    })
}

/// Per-program counts.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramRow {
    pub program_id: String,
    pub product_count: i64,
    pub association_count: i64,
}

pub async fn fetch_programs(pool: &SqlitePool) -> Result<Vec<ProgramRow>> {
    let rows = sqlx::query(
        "SELECT program_id, product_count, association_count FROM programs ORDER BY program_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|row| ProgramRow {
            program_id: row.get("program_id"),
            product_count: row.get("product_count"),
            association_count: row.get("association_count"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::create_schema;
    use jwst_catalog_core::diagnostics::Diagnostics;
    use jwst_catalog_core::enrich::enrich;
    use jwst_catalog_core::models::{ManifestFile, ProductFile};
    use jwst_catalog_core::reference::memory::MemoryReference;
    use jwst_catalog_core::reference::StageTable;
    use jwst_catalog_core::resolve::SearchPolicy;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        pool
    }

    fn sample() -> (Enrichment, Vec<Diagnostic>) {
        let asn = "jw00001-a3001_20170101T120000_image2_001_asn.json";
        let member = "jw00001001001_01101_00001_nrca1_cal.fits";
        let body = serde_json::json!({
            "asn_type": "image2",
            "products": [{ "name": "p", "members": [{ "expname": member }] }]
        })
        .to_string();
        let reference = MemoryReference::new().with_row(
            StageTable::Image2,
            "cal",
            "Calibrated image",
            "MJy/sr",
            "2b",
        );
        let mut diagnostics = Diagnostics::new();
        let enrichment = enrich(
            &[ManifestFile::new(asn, Some(body))],
            &[
                ProductFile::new(member),
                ProductFile::new("jw00001001001_01101_00001_nrca1_bogus.fits"),
            ],
            &reference,
            SearchPolicy::Standard,
            &mut diagnostics,
        );
        (enrichment, diagnostics.into_events())
    }

    fn run(id: &str) -> ScanRun {
        ScanRun {
            id: id.to_string(),
            root: "/data".to_string(),
            started_at: 0,
            finished_at: 1,
        }
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let pool = memory_pool().await;
        let (enrichment, diagnostics) = sample();
        write_catalog(&pool, &run("run-1"), &enrichment, &diagnostics)
            .await
            .unwrap();

        let products = fetch_products(&pool, None).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(
            products[0].member_of.as_deref(),
            Some("jw00001-a3001_20170101T120000_image2_001_asn.json")
        );
        assert_eq!(products[0].stage, "image2");
        assert_eq!(products[0].visit_group.as_deref(), Some("01"));

        let associations = fetch_associations(&pool, Some("00001")).await.unwrap();
        assert_eq!(associations.len(), 1);
        assert_eq!(associations[0].members.len(), 1);
        assert_eq!(associations[0].observation_date, "2017-01-01");

        let programs = fetch_programs(&pool).await.unwrap();
        assert_eq!(programs.len(), 1);
        assert_eq!(programs[0].product_count, 1);

        let view_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM program_00001_products")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(view_count, 1);

        let unresolved: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM scan_diagnostics WHERE kind = 'unresolved'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(unresolved, 1);
    }

    #[tokio::test]
    async fn test_rescan_replaces_catalog() {
        let pool = memory_pool().await;
        let (enrichment, diagnostics) = sample();
        write_catalog(&pool, &run("run-1"), &enrichment, &diagnostics)
            .await
            .unwrap();
        write_catalog(&pool, &run("run-2"), &enrichment, &diagnostics)
            .await
            .unwrap();

        assert_eq!(fetch_products(&pool, None).await.unwrap().len(), 1);
        let runs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scan_runs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(runs, 2);
    }

    #[test]
    fn test_view_safe() {
        assert!(view_safe("00001"));
        assert!(!view_safe(""));
        assert!(!view_safe("0001'; DROP"));
    }

    #[tokio::test]
    async fn test_fetch_association_by_filename() {
        let pool = memory_pool().await;
        let (enrichment, diagnostics) = sample();
        write_catalog(&pool, &run("run-1"), &enrichment, &diagnostics)
            .await
            .unwrap();

        let asn = fetch_association(&pool, "jw00001-a3001_20170101T120000_image2_001_asn.json")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(asn.program_id, "00001");
        assert_eq!(asn.members, vec!["jw00001001001_01101_00001_nrca1_cal.fits"]);
        assert!(fetch_association(&pool, "missing_asn.json")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_corrupt_product_names_is_an_error() {
        let pool = memory_pool().await;
        let (enrichment, diagnostics) = sample();
        write_catalog(&pool, &run("run-1"), &enrichment, &diagnostics)
            .await
            .unwrap();
        sqlx::query("UPDATE associations SET product_names = 'not json'")
            .execute(&pool)
            .await
            .unwrap();

        let err = fetch_associations(&pool, None).await.unwrap_err();
        assert!(err.to_string().contains("Corrupt product_names"));
    }
}
