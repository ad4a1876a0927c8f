//! Export the catalog as JSON.
//!
//! Produces one document holding the program table, associations (with
//! members) and products, either for the whole catalog or for a single
//! program.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::store::{self, AssociationRow, ProductRow, ProgramRow};

#[derive(Serialize)]
struct ExportData {
    programs: Vec<ProgramRow>,
    associations: Vec<AssociationRow>,
    products: Vec<ProductRow>,
}

/// Export the catalog, or one program of it, as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, program: Option<&str>, output: Option<&Path>) -> Result<()> {
    let pool = db::connect(config).await?;

    let mut programs = store::fetch_programs(&pool).await?;
    if let Some(program) = program {
        programs.retain(|p| p.program_id == program);
        if programs.is_empty() {
            pool.close().await;
            bail!("program not found: {}", program);
        }
    }
    let associations = store::fetch_associations(&pool, program).await?;
    let products = store::fetch_products(&pool, program).await?;
    pool.close().await;

    let association_count = associations.len();
    let product_count = products.len();

    let data = ExportData {
        programs,
        associations,
        products,
    };
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!(
                "Exported {} associations, {} products to {}",
                association_count,
                product_count,
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}
