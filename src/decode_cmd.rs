//! `jwscan decode`: decode filenames without touching disk or a database.
//!
//! Each argument is printed as one JSON line. Names ending in `.json` are
//! decoded as association manifests, everything else as data products.

use anyhow::{bail, Result};
use serde::Serialize;

use jwst_catalog_core::decode::{decode_association, decode_product};
use jwst_catalog_core::models::{AssociationRecord, ProductRecord};

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decoded {
    Association {
        input: String,
        record: AssociationRecord,
    },
    Product {
        input: String,
        record: ProductRecord,
    },
    Error {
        input: String,
        error: String,
    },
}

impl Decoded {
    pub fn is_error(&self) -> bool {
        matches!(self, Decoded::Error { .. })
    }
}

/// Decode one filename, picking the grammar from its extension.
pub fn decode_name(input: &str) -> Decoded {
    let result = if input.ends_with(".json") {
        decode_association(input).map(|record| Decoded::Association {
            input: input.to_string(),
            record,
        })
    } else {
        decode_product(input).map(|record| Decoded::Product {
            input: input.to_string(),
            record,
        })
    };

    result.unwrap_or_else(|e| Decoded::Error {
        input: input.to_string(),
        error: e.to_string(),
    })
}

pub fn run_decode(names: &[String]) -> Result<()> {
    let mut failed = 0;
    for name in names {
        let decoded = decode_name(name);
        if decoded.is_error() {
            failed += 1;
        }
        println!("{}", serde_json::to_string(&decoded)?);
    }

    if failed > 0 {
        bail!("{} of {} filenames could not be decoded", failed, names.len());
    }
    Ok(())
}
