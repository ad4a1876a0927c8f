//! Catalog statistics and program listing.
//!
//! `jwscan stats` summarises the catalog and the most recent scan run;
//! `jwscan programs` lists the per-program partition.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::store;

/// Run the stats command: query the catalog and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&pool)
        .await?;
    let total_associations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM associations")
        .fetch_one(&pool)
        .await?;
    let total_members: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM association_members")
        .fetch_one(&pool)
        .await?;
    let with_association: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE member_of IS NOT NULL")
            .fetch_one(&pool)
            .await?;
    let total_programs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM programs")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("JWST Catalog Stats");
    println!("==================");
    println!();
    println!("  Database:      {}", config.db.path.display());
    println!("  Size:          {}", format_bytes(db_size));
    println!();
    println!("  Programs:      {}", total_programs);
    println!("  Associations:  {} ({} members)", total_associations, total_members);
    println!(
        "  Products:      {} ({} in an association)",
        total_products, with_association
    );

    let stage_rows = sqlx::query(
        "SELECT stage, COUNT(*) AS n FROM products GROUP BY stage ORDER BY n DESC, stage",
    )
    .fetch_all(&pool)
    .await?;
    if !stage_rows.is_empty() {
        println!();
        println!("  By stage:");
        for row in &stage_rows {
            let stage: String = row.get("stage");
            let count: i64 = row.get("n");
            println!("  {:<12} {:>8}", stage, count);
        }
    }

    let last_run = sqlx::query(
        "SELECT id, root, finished_at, products_seen, products_resolved, malformed, unresolved \
         FROM scan_runs ORDER BY finished_at DESC, rowid DESC LIMIT 1",
    )
    .fetch_optional(&pool)
    .await?;

    println!();
    match last_run {
        Some(row) => {
            let finished_at: i64 = row.get("finished_at");
            let root: String = row.get("root");
            let id: String = row.get("id");
            println!("  Last scan:     {} ({})", format_ts_relative(finished_at), id);
            println!("  Root:          {}", root);
            println!(
                "  Resolved:      {} / {}",
                row.get::<i64, _>("products_resolved"),
                row.get::<i64, _>("products_seen")
            );
            println!("  Malformed:     {}", row.get::<i64, _>("malformed"));
            println!("  Unresolved:    {}", row.get::<i64, _>("unresolved"));
        }
        None => println!("  Last scan:     never"),
    }
    println!();

    pool.close().await;
    Ok(())
}

/// Run the programs command: one line per program.
pub async fn run_programs(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let programs = store::fetch_programs(&pool).await?;
    pool.close().await;

    if programs.is_empty() {
        println!("No programs in catalog. Run `jwscan scan` first.");
        return Ok(());
    }

    println!("{:<10} {:>10} {:>14}", "PROGRAM", "PRODUCTS", "ASSOCIATIONS");
    for p in &programs {
        println!(
            "{:<10} {:>10} {:>14}",
            p.program_id, p.product_count, p.association_count
        );
    }
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now ("3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }

    let (count, unit) = match delta {
        0..=59 => return "just now".to_string(),
        60..=3599 => (delta / 60, "min"),
        3600..=86399 => (delta / 3600, "hour"),
        86400..=2591999 => (delta / 86400, "day"),
        _ => return format_ts_iso(ts),
    };
    format!("{} {}{} ago", count, unit, if count == 1 { "" } else { "s" })
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_ts_relative() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 120), "2 mins ago");
        assert_eq!(format_ts_relative(now - 3600), "1 hour ago");
        assert_eq!(format_ts_relative(0), "1970-01-01 00:00");
    }
}
