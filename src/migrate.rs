use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every catalog table and index. Idempotent.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Create associations table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS associations (
            filename TEXT PRIMARY KEY,
            program_id TEXT NOT NULL,
            candidate_id TEXT NOT NULL,
            observation_date TEXT NOT NULL,
            pipeline_tag TEXT NOT NULL,
            sequence_number TEXT NOT NULL,
            asn_type TEXT,
            asn_pool TEXT,
            product_names TEXT NOT NULL DEFAULT '[]',
            member_count INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create association_members table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS association_members (
            association TEXT NOT NULL,
            position INTEGER NOT NULL,
            member TEXT NOT NULL,
            PRIMARY KEY (association, position),
            FOREIGN KEY (association) REFERENCES associations(filename)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create products table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL,
            program_id TEXT NOT NULL,
            association_number TEXT,
            member_of TEXT,
            instrument TEXT,
            detector TEXT,
            optical_elements TEXT,
            target_id TEXT,
            source_id TEXT,
            observation_number TEXT,
            visit_number TEXT,
            visit_group TEXT,
            parallel_sequence TEXT,
            activity_number TEXT,
            exposure_number TEXT,
            suffix TEXT NOT NULL,
            exp_type TEXT,
            tso_visit INTEGER,
            date_obs TEXT,
            target TEXT,
            stage TEXT NOT NULL,
            description TEXT,
            units TEXT,
            level TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create programs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS programs (
            program_id TEXT PRIMARY KEY,
            product_count INTEGER NOT NULL,
            association_count INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create scan_runs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_runs (
            id TEXT PRIMARY KEY,
            root TEXT NOT NULL,
            started_at INTEGER NOT NULL,
            finished_at INTEGER NOT NULL,
            manifests_seen INTEGER NOT NULL,
            associations INTEGER NOT NULL,
            products_seen INTEGER NOT NULL,
            products_resolved INTEGER NOT NULL,
            malformed INTEGER NOT NULL,
            unresolved INTEGER NOT NULL,
            programs INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create scan_diagnostics table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_diagnostics (
            run_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            filename TEXT,
            detail TEXT NOT NULL,
            FOREIGN KEY (run_id) REFERENCES scan_runs(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_program ON products(program_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_filename ON products(filename)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_associations_program ON associations(program_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_association_members_member ON association_members(member)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
