//! Association manifest bodies.
//!
//! A manifest is a JSON document of the form
//! `{ "asn_type": ..., "asn_pool": ..., "products": [{ "name": ..., "members": [{ "expname": ... }] }] }`.
//! Only `expname` values are needed for membership; `asn_type`, `asn_pool`
//! and product names are carried along as descriptive metadata.

use serde::Deserialize;
use thiserror::Error;

use crate::models::AssociationRecord;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest body could not be read")]
    Unreadable,
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("manifest has no products list")]
    MissingProducts,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    asn_type: Option<String>,
    #[serde(default)]
    asn_pool: Option<String>,
    products: Option<Vec<RawProduct>>,
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    members: Vec<RawMember>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    expname: String,
}

/// The parts of a manifest body the catalog keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSummary {
    pub asn_type: Option<String>,
    pub asn_pool: Option<String>,
    pub product_names: Vec<String>,
    /// Every member `expname`, across all products, in document order.
    pub members: Vec<String>,
}

/// Parse a manifest body.
pub fn parse_manifest(body: &str) -> Result<ManifestSummary, ManifestError> {
    let raw: RawManifest = serde_json::from_str(body)?;
    let products = raw.products.ok_or(ManifestError::MissingProducts)?;

    let mut summary = ManifestSummary {
        asn_type: raw.asn_type.filter(|s| !s.is_empty()),
        asn_pool: raw.asn_pool.filter(|s| !s.is_empty()),
        ..Default::default()
    };
    for product in products {
        if let Some(name) = product.name {
            summary.product_names.push(name);
        }
        summary
            .members
            .extend(product.members.into_iter().map(|m| m.expname));
    }
    Ok(summary)
}

impl AssociationRecord {
    /// Copy membership and descriptive metadata from a parsed manifest.
    pub fn attach_manifest(&mut self, summary: ManifestSummary) {
        self.asn_type = summary.asn_type;
        self.asn_pool = summary.asn_pool;
        self.product_names = summary.product_names;
        self.member_filenames = summary.members;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_flattened_across_products() {
        let body = r#"{
            "asn_type": "image2",
            "asn_pool": "jw00017_20170101T120000_pool",
            "products": [
                {"name": "prod_a", "members": [{"expname": "a_cal.fits", "exptype": "science"}]},
                {"name": "prod_b", "members": [{"expname": "b_cal.fits"}, {"expname": "c_cal.fits"}]}
            ]
        }"#;
        let summary = parse_manifest(body).unwrap();
        assert_eq!(summary.members, vec!["a_cal.fits", "b_cal.fits", "c_cal.fits"]);
        assert_eq!(summary.product_names, vec!["prod_a", "prod_b"]);
        assert_eq!(summary.asn_type.as_deref(), Some("image2"));
    }

    #[test]
    fn test_missing_products() {
        let err = parse_manifest(r#"{"asn_type": "image2"}"#).unwrap_err();
        assert!(matches!(err, ManifestError::MissingProducts));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_manifest("{not json").unwrap_err();
        assert!(matches!(err, ManifestError::Json(_)));
    }

    #[test]
    fn test_member_without_expname_is_an_error() {
        let err = parse_manifest(r#"{"products": [{"members": [{"exptype": "science"}]}]}"#)
            .unwrap_err();
        assert!(matches!(err, ManifestError::Json(_)));
    }

    #[test]
    fn test_empty_products() {
        let summary = parse_manifest(r#"{"products": []}"#).unwrap();
        assert!(summary.members.is_empty());
        assert_eq!(summary.asn_type, None);
    }
}
