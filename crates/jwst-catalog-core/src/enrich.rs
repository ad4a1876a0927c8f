//! Enrichment pipeline orchestration.
//!
//! A fixed sequence over a pre-enumerated input set:
//!
//! 1. Decode association filenames, dropping malformed ones, and attach
//!    manifest membership (degrading to empty when the body is unusable).
//! 2. Build the [`AssociationIndex`].
//! 3. Decode product filenames, dropping malformed ones.
//! 4. Attach `member_of` by exact filename lookup.
//! 5. Resolve suffix metadata; unresolved products are dropped.
//! 6. Group surviving products, and the associations sharing their
//!    program, into one bucket per program.
//!
//! No failure in steps 1–5 aborts the batch. Each one is recorded in the
//! caller's [`Diagnostics`] and the affected record is excluded. Input
//! order is preserved throughout since it decides membership ties.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::decode::{decode_association, decode_product};
use crate::diagnostics::{Diagnostic, DiagnosticSummary, Diagnostics};
use crate::index::{build_index, AssociationIndex};
use crate::manifest::parse_manifest;
use crate::models::{AssociationRecord, ManifestFile, ProductFile, ProductRecord, ProgramGroup};
use crate::reference::SuffixReference;
use crate::resolve::{resolve, Resolution, SearchPolicy};

/// Result of one enrichment pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Enrichment {
    /// Every well-formed association, in input order.
    pub associations: Vec<AssociationRecord>,
    /// Every resolved product, in input order.
    pub products: Vec<ProductRecord>,
    /// Records grouped by program id.
    pub programs: BTreeMap<String, ProgramGroup>,
    pub stats: EnrichmentStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentStats {
    pub manifests_seen: usize,
    pub associations: usize,
    pub products_seen: usize,
    pub products_decoded: usize,
    pub products_resolved: usize,
    pub products_with_association: usize,
    pub programs: usize,
    pub diagnostics: DiagnosticSummary,
}

/// Decode every manifest name and attach its membership list.
pub fn decode_associations(
    manifests: &[ManifestFile],
    diagnostics: &mut Diagnostics,
) -> Vec<AssociationRecord> {
    let mut associations: Vec<AssociationRecord> = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        let mut record = match decode_association(&manifest.name) {
            Ok(record) => record,
            Err(err) => {
                diagnostics.record(err.to_diagnostic());
                continue;
            }
        };

        let parsed = match &manifest.body {
            Some(body) => parse_manifest(body).map_err(|e| e.to_string()),
            None => Err("manifest body could not be read".to_string()),
        };
        match parsed {
            Ok(summary) => record.attach_manifest(summary),
            Err(reason) => diagnostics.record(Diagnostic::ManifestDegraded {
                filename: record.filename.clone(),
                reason,
            }),
        }

        // Same name in two directories: the later path replaces the earlier
        if let Some(pos) = associations
            .iter()
            .position(|a| a.filename == record.filename)
        {
            associations.remove(pos);
            diagnostics.record(Diagnostic::DuplicateAssociation {
                filename: record.filename.clone(),
            });
        }
        associations.push(record);
    }
    associations
}

/// Decode every product name, carrying its header along.
pub fn decode_products(products: &[ProductFile], diagnostics: &mut Diagnostics) -> Vec<ProductRecord> {
    let mut decoded = Vec::with_capacity(products.len());
    for file in products {
        match decode_product(&file.name) {
            Ok(mut record) => {
                record.header = file.header.clone();
                decoded.push(record);
            }
            Err(err) => diagnostics.record(err.to_diagnostic()),
        }
    }
    decoded
}

/// Set `member_of` on each product from the index.
pub fn attach_membership(products: &mut [ProductRecord], index: &AssociationIndex) {
    for product in products.iter_mut() {
        product.member_of = index.owner(&product.filename).map(str::to_string);
    }
}

/// Resolve suffix metadata, keeping only the products that resolve.
pub fn resolve_products(
    products: Vec<ProductRecord>,
    reference: &dyn SuffixReference,
    policy: SearchPolicy,
    diagnostics: &mut Diagnostics,
) -> Vec<ProductRecord> {
    products
        .into_iter()
        .filter_map(|mut product| match resolve(&product, reference, policy, diagnostics) {
            Resolution::Resolved(metadata) => {
                product.metadata = Some(metadata);
                Some(product)
            }
            Resolution::Unresolved { searched } => {
                diagnostics.record(Diagnostic::Unresolved {
                    filename: product.filename.clone(),
                    suffix: product.suffix.clone(),
                    searched: searched.iter().map(|t| t.name().to_string()).collect(),
                });
                None
            }
        })
        .collect()
}

/// One bucket per distinct, non-empty product program id. Associations
/// whose program has no bucket are reported and left out.
pub fn partition_by_program(
    associations: &[AssociationRecord],
    products: &[ProductRecord],
    diagnostics: &mut Diagnostics,
) -> BTreeMap<String, ProgramGroup> {
    let mut programs: BTreeMap<String, ProgramGroup> = BTreeMap::new();
    for product in products.iter().filter(|p| !p.program_id.is_empty()) {
        programs
            .entry(product.program_id.clone())
            .or_insert_with(|| ProgramGroup {
                program_id: product.program_id.clone(),
                ..Default::default()
            })
            .products
            .push(product.clone());
    }

    for asn in associations {
        match programs.get_mut(&asn.program_id) {
            Some(group) => group.associations.push(asn.clone()),
            None => diagnostics.record(Diagnostic::OrphanedAssociation {
                filename: asn.filename.clone(),
                program_id: asn.program_id.clone(),
            }),
        }
    }

    programs
}

/// Run the whole pipeline over already-discovered inputs.
pub fn enrich(
    manifests: &[ManifestFile],
    products: &[ProductFile],
    reference: &dyn SuffixReference,
    policy: SearchPolicy,
    diagnostics: &mut Diagnostics,
) -> Enrichment {
    let associations = decode_associations(manifests, diagnostics);
    let index = build_index(&associations, diagnostics);
    tracing::debug!(
        associations = associations.len(),
        members = index.len(),
        "association index built"
    );

    let mut decoded = decode_products(products, diagnostics);
    let products_decoded = decoded.len();
    attach_membership(&mut decoded, &index);

    let resolved = resolve_products(decoded, reference, policy, diagnostics);
    let programs = partition_by_program(&associations, &resolved, diagnostics);

    let stats = EnrichmentStats {
        manifests_seen: manifests.len(),
        associations: associations.len(),
        products_seen: products.len(),
        products_decoded,
        products_resolved: resolved.len(),
        products_with_association: resolved.iter().filter(|p| p.member_of.is_some()).count(),
        programs: programs.len(),
        diagnostics: diagnostics.summary(),
    };

    Enrichment {
        associations,
        products: resolved,
        programs,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::memory::MemoryReference;
    use crate::reference::StageTable;

    const ASN: &str = "jw00001-a3001_20170101T120000_image2_001_asn.json";
    const MEMBER: &str = "jw00001001001_01101_00001_nrca1_cal.fits";

    fn reference() -> MemoryReference {
        MemoryReference::new()
            .with_row(StageTable::Detector1, "rate", "Countrate image", "DN/s", "2a")
            .with_row(StageTable::Image2, "cal", "Calibrated image", "MJy/sr", "2b")
            .with_row(StageTable::Image3, "i2d", "Resampled image", "MJy/sr", "3")
    }

    fn manifest_body(members: &[&str]) -> String {
        let members: Vec<serde_json::Value> = members
            .iter()
            .map(|m| serde_json::json!({ "expname": m, "exptype": "science" }))
            .collect();
        serde_json::json!({
            "asn_type": "image2",
            "asn_pool": "pool",
            "products": [{ "name": "prod", "members": members }]
        })
        .to_string()
    }

    #[test]
    fn test_member_of_exact_match() {
        let manifests = vec![ManifestFile::new(ASN, Some(manifest_body(&[MEMBER])))];
        let products = vec![
            ProductFile::new(MEMBER),
            ProductFile::new("jw00001001001_01101_00002_nrca1_cal.fits"),
        ];
        let mut d = Diagnostics::new();
        let out = enrich(&manifests, &products, &reference(), SearchPolicy::Standard, &mut d);

        assert_eq!(out.products.len(), 2);
        assert_eq!(out.products[0].member_of.as_deref(), Some(ASN));
        assert_eq!(out.products[1].member_of, None);
        assert_eq!(out.stats.products_with_association, 1);
        assert_eq!(out.associations[0].asn_type.as_deref(), Some("image2"));
    }

    #[test]
    fn test_unresolved_dropped_and_counted() {
        let products = vec![
            ProductFile::new(MEMBER),
            ProductFile::new("jw00001001001_01101_00001_nrca1_bogus.fits"),
        ];
        let mut d = Diagnostics::new();
        let out = enrich(&[], &products, &reference(), SearchPolicy::Standard, &mut d);

        assert_eq!(out.products.len(), 1);
        assert_eq!(out.products[0].suffix, "cal");
        assert!(out.products.iter().all(|p| p.suffix != "bogus"));
        assert_eq!(out.stats.diagnostics.unresolved, 1);
        assert_eq!(out.stats.products_decoded, 2);
        assert_eq!(out.stats.products_resolved, 1);
    }

    #[test]
    fn test_malformed_inputs_excluded() {
        let manifests = vec![
            ManifestFile::new("jw00001_asn.json", Some("{}".to_string())),
            ManifestFile::new("jw00001-a3001_notadate_image2_001_asn.json", None),
        ];
        let products = vec![ProductFile::new("jw00001001001_cal.fits")];
        let mut d = Diagnostics::new();
        let out = enrich(&manifests, &products, &reference(), SearchPolicy::Standard, &mut d);

        assert!(out.associations.is_empty());
        assert!(out.products.is_empty());
        let summary = d.summary();
        assert_eq!(summary.malformed, 2);
        assert_eq!(summary.invalid_dates, 1);
    }

    #[test]
    fn test_degraded_manifest_keeps_association() {
        let manifests = vec![
            ManifestFile::new(ASN, Some("not json".to_string())),
            ManifestFile::new("jw00001-a3002_20170101T120000_image3_001_asn.json", None),
        ];
        let products = vec![ProductFile::new(MEMBER)];
        let mut d = Diagnostics::new();
        let out = enrich(&manifests, &products, &reference(), SearchPolicy::Standard, &mut d);

        assert_eq!(out.associations.len(), 2);
        assert!(out.associations.iter().all(|a| a.member_filenames.is_empty()));
        assert_eq!(out.products[0].member_of, None);
        assert_eq!(d.summary().manifests_degraded, 2);
    }

    #[test]
    fn test_partition_by_program() {
        let manifests = vec![
            ManifestFile::new(ASN, Some(manifest_body(&[MEMBER]))),
            ManifestFile::new(
                "jw00099-a3001_20170101T120000_image2_001_asn.json",
                Some(manifest_body(&[])),
            ),
        ];
        let products = vec![
            ProductFile::new(MEMBER),
            ProductFile::new("jw00017-o001_t001_nircam_f150w_i2d.fits"),
        ];
        let mut d = Diagnostics::new();
        let out = enrich(&manifests, &products, &reference(), SearchPolicy::Standard, &mut d);

        assert_eq!(out.programs.len(), 2);
        let p1 = &out.programs["00001"];
        assert_eq!(p1.products.len(), 1);
        assert_eq!(p1.associations.len(), 1);
        let p17 = &out.programs["00017"];
        assert_eq!(p17.products.len(), 1);
        assert!(p17.associations.is_empty());
        assert_eq!(d.summary().orphaned_associations, 1);
    }

    #[test]
    fn test_input_order_preserved() {
        let products = vec![
            ProductFile::new("jw00002001001_01101_00001_nrca1_cal.fits"),
            ProductFile::new("jw00001001001_01101_00001_nrca1_rate.fits"),
            ProductFile::new("jw00003001001_01101_00001_nrca1_cal.fits"),
        ];
        let mut d = Diagnostics::new();
        let out = enrich(&[], &products, &reference(), SearchPolicy::Standard, &mut d);
        let names: Vec<&str> = out.products.iter().map(|p| p.filename.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "jw00002001001_01101_00001_nrca1_cal.fits",
                "jw00001001001_01101_00001_nrca1_rate.fits",
                "jw00003001001_01101_00001_nrca1_cal.fits",
            ]
        );
    }

    #[test]
    fn test_duplicate_manifest_name_keeps_last() {
        const OTHER: &str = "jw00001001001_01101_00002_nrca1_cal.fits";
        let manifests = vec![
            ManifestFile::new(ASN, Some(manifest_body(&[MEMBER]))),
            ManifestFile::new(ASN, Some(manifest_body(&[OTHER]))),
        ];
        let products = vec![ProductFile::new(MEMBER), ProductFile::new(OTHER)];
        let mut d = Diagnostics::new();
        let out = enrich(&manifests, &products, &reference(), SearchPolicy::Standard, &mut d);

        assert_eq!(out.associations.len(), 1);
        assert_eq!(out.associations[0].member_filenames, vec![OTHER.to_string()]);
        assert_eq!(out.stats.associations, 1);
        assert_eq!(out.products[0].member_of, None);
        assert_eq!(out.products[1].member_of.as_deref(), Some(ASN));
        assert_eq!(d.summary().duplicate_associations, 1);
    }

    #[test]
    fn test_exposure_gated_changes_winning_table() {
        use crate::models::ExposureHeader;

        let reference = reference().with_row(
            StageTable::Coron3,
            "cal",
            "Coronagraphic calibrated",
            "MJy/sr",
            "3",
        );
        let header = ExposureHeader {
            exp_type: Some("MIR_IMAGE".to_string()),
            ..Default::default()
        };
        let products = vec![
            ProductFile::new("jw00001001001_01101_00001_mirimage_cal.fits").with_header(header)
        ];

        let mut d = Diagnostics::new();
        let standard = enrich(&[], &products, &reference, SearchPolicy::Standard, &mut d);
        let meta = standard.products[0].metadata.as_ref().unwrap();
        assert_eq!(meta.stage, "coron3");

        let mut d = Diagnostics::new();
        let gated = enrich(&[], &products, &reference, SearchPolicy::ExposureGated, &mut d);
        let meta = gated.products[0].metadata.as_ref().unwrap();
        assert_eq!(meta.stage, "image2");
        assert_eq!(meta.description.as_deref(), Some("Calibrated image"));
        assert!(d.is_empty());
    }

    #[test]
    fn test_exposure_gated_without_header_uses_standard() {
        let products = vec![ProductFile::new(MEMBER)];
        let mut d = Diagnostics::new();
        let out = enrich(&[], &products, &reference(), SearchPolicy::ExposureGated, &mut d);

        assert_eq!(out.products[0].metadata.as_ref().unwrap().stage, "image2");
        assert_eq!(out.stats.diagnostics.missing_exposure_types, 1);
    }
}
