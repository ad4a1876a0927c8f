//! Scan orchestration.
//!
//! Coordinates the full scan flow: discovery → reference load → decode →
//! membership → resolution → partition → storage. Per-file problems become
//! diagnostics; only a missing scan root or reference is fatal.

use anyhow::{bail, Result};
use std::path::PathBuf;
use uuid::Uuid;

use jwst_catalog_core::diagnostics::Diagnostics;
use jwst_catalog_core::enrich::{enrich, Enrichment};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::reference::load_reference;
use crate::scan::{find_files, load_manifests, load_products};
use crate::store::{self, ScanRun};

/// Run a scan and return what it produced.
///
/// `root_override` (from `--root`) wins over `scan.root` in the config.
/// With `dry_run` nothing is written to the catalog.
pub async fn run_scan(
    config: &Config,
    root_override: Option<PathBuf>,
    dry_run: bool,
) -> Result<Enrichment> {
    let root = match root_override.or_else(|| config.scan.root.clone()) {
        Some(root) => root,
        None => bail!("No scan root: pass --root or set scan.root in the config"),
    };

    let started_at = chrono::Utc::now().timestamp();
    let found = find_files(&root, &config.scan)?;
    let reference = load_reference(&config.reference.path).await?;
    let policy = config.reference.search_policy()?;

    let manifests = load_manifests(&found.manifests);
    let products = load_products(&found.products, config.scan.read_headers);

    let mut diagnostics = Diagnostics::new();
    let enrichment = enrich(&manifests, &products, &reference, policy, &mut diagnostics);
    let stats = &enrichment.stats;

    if dry_run {
        println!("scan {} (dry-run)", found.root.display());
        print_counts(&enrichment);
        return Ok(enrichment);
    }

    let pool = db::connect(config).await?;
    migrate::create_schema(&pool).await?;

    let run = ScanRun {
        id: Uuid::new_v4().to_string(),
        root: found.root.display().to_string(),
        started_at,
        finished_at: chrono::Utc::now().timestamp(),
    };
    store::write_catalog(&pool, &run, &enrichment, diagnostics.events()).await?;
    pool.close().await;

    tracing::info!(
        run = %run.id,
        products = stats.products_resolved,
        associations = stats.associations,
        programs = stats.programs,
        "catalog written"
    );

    println!("scan {}", found.root.display());
    print_counts(&enrichment);
    println!("  run: {}", run.id);
    println!("ok");

    Ok(enrichment)
}

fn print_counts(enrichment: &Enrichment) {
    let stats = &enrichment.stats;
    let summary = &stats.diagnostics;
    println!("  manifests found: {}", stats.manifests_seen);
    println!("  associations: {}", stats.associations);
    println!("  products found: {}", stats.products_seen);
    println!("  products decoded: {}", stats.products_decoded);
    println!("  products resolved: {}", stats.products_resolved);
    println!("  with association: {}", stats.products_with_association);
    println!("  malformed: {}", summary.malformed + summary.invalid_dates);
    println!("  unresolved: {}", summary.unresolved);
    if summary.manifests_degraded > 0 {
        println!("  manifests degraded: {}", summary.manifests_degraded);
    }
    if summary.duplicate_associations > 0 {
        println!("  duplicate associations: {}", summary.duplicate_associations);
    }
    if summary.contested_members > 0 {
        println!("  contested members: {}", summary.contested_members);
    }
    println!("  programs: {}", stats.programs);
}
