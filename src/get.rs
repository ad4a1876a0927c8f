//! Product retrieval by filename.
//!
//! Looks up a product in the catalog together with the association that
//! owns it, and prints both as JSON.

use anyhow::{bail, Result};
use serde::Serialize;

use jwst_catalog_core::decode::base_name;

use crate::config::Config;
use crate::db;
use crate::store::{self, AssociationRow, ProductRow};

/// `get` response: the stored product and its owning association.
#[derive(Debug, Clone, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: ProductRow,
    pub association: Option<AssociationRow>,
}

/// Fetch a product by filename. A leading directory is ignored.
pub async fn get_product(config: &Config, filename: &str) -> Result<ProductResponse> {
    let filename = base_name(filename);
    let pool = db::connect(config).await?;

    let mut products = store::fetch_products_named(&pool, filename).await?;
    if products.is_empty() {
        pool.close().await;
        bail!("product not found: {}", filename);
    }
    if products.len() > 1 {
        tracing::warn!(
            filename,
            count = products.len(),
            "filename stored more than once, returning the first"
        );
    }
    let product = products.swap_remove(0);

    // The owner may belong to a different program than the product
    let association = match &product.member_of {
        Some(owner) => store::fetch_association(&pool, owner).await?,
        None => None,
    };

    pool.close().await;
    Ok(ProductResponse {
        product,
        association,
    })
}

/// CLI entry point: prints the product as pretty JSON.
pub async fn run_get(config: &Config, filename: &str) -> Result<()> {
    let response = get_product(config, filename).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
