//! Suffix → processing-stage metadata resolution.
//!
//! A product's suffix is looked up in an ordered list of stage tables. Every
//! table that has a row for the suffix is a match, and the **last** match
//! in traversal order is authoritative. Precedence is purely positional:
//! moving a table in [`search_order`] changes which row wins.
//!
//! # Search order
//!
//! [`SearchPolicy::Standard`]:
//!
//! 1. `detector1`, `image2`, `spec2`, `image3`, `spec3`, `tso3` (always)
//! 2. `ami3` when the instrument is `ami` or `niriss`
//! 3. `coron3` when the instrument is `miri` or `nircam`, or the exposure
//!    type is a coronagraphic mode
//!
//! [`SearchPolicy::ExposureGated`] searches `detector1` and then only the
//! stage-2/3 tables appropriate to the header exposure type, `tso3` only
//! for time-series visits. Without an exposure type it falls back to the
//! standard order.

use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::models::{ProductRecord, SuffixMetadata};
use crate::reference::{StageTable, SuffixReference};

/// Exposure modes searched against `image2`.
const IMAGE2_MODES: [&str; 10] = [
    "IMAGE",
    "LYOT",
    "MIR4QPM",
    "CORONCAL",
    "CORON",
    "TSIMAGE",
    "TACONFIRM",
    "TACQ",
    "IMAGING",
    "CONFIRM",
];

/// Exposure modes searched against `image3`.
const IMAGE3_MODES: [&str; 5] = ["IMAGE", "TACONFIRM", "TACQ", "IMAGING", "CONFIRM"];

/// Exposure modes searched against `spec2` and `spec3`.
const SPEC_MODES: [&str; 12] = [
    "LRS-FIXEDSLIT",
    "LRS-SLITLESS",
    "MRS",
    "GRISM",
    "TSGRISM",
    "WFSS",
    "SOSS",
    "FIXEDSLIT",
    "MSASPEC",
    "BRIGHTOBJ",
    "LAMP",
    "IFU",
];

/// Coronagraphic exposure modes.
const CORON_MODES: [&str; 4] = ["LYOT", "MIR4QPM", "CORONCAL", "CORON"];

/// Tables searched for every product under the standard policy.
const BASE_ORDER: [StageTable; 6] = [
    StageTable::Detector1,
    StageTable::Image2,
    StageTable::Spec2,
    StageTable::Image3,
    StageTable::Spec3,
    StageTable::Tso3,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchPolicy {
    #[default]
    Standard,
    ExposureGated,
}

impl FromStr for SearchPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "standard" => Ok(SearchPolicy::Standard),
            "exposure-gated" => Ok(SearchPolicy::ExposureGated),
            other => bail!(
                "Unknown search policy: '{}'. Must be standard or exposure-gated.",
                other
            ),
        }
    }
}

/// Outcome of resolving one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(SuffixMetadata),
    Unresolved { searched: Vec<StageTable> },
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// The ordered list of stage tables to search for `product`.
pub fn search_order(
    product: &ProductRecord,
    policy: SearchPolicy,
    diagnostics: &mut Diagnostics,
) -> Vec<StageTable> {
    match policy {
        SearchPolicy::Standard => standard_order(product),
        SearchPolicy::ExposureGated => match product.exposure_mode() {
            Some(mode) => gated_order(product, mode),
            None => {
                diagnostics.record(Diagnostic::MissingExposureType {
                    filename: product.filename.clone(),
                });
                standard_order(product)
            }
        },
    }
}

fn standard_order(product: &ProductRecord) -> Vec<StageTable> {
    let mut order = BASE_ORDER.to_vec();
    if instrument_is(product, &["ami", "niriss"]) {
        order.push(StageTable::Ami3);
    }
    let coron_mode = product
        .exposure_mode()
        .is_some_and(|mode| CORON_MODES.contains(&mode));
    if instrument_is(product, &["miri", "nircam"]) || coron_mode {
        order.push(StageTable::Coron3);
    }
    order
}

fn gated_order(product: &ProductRecord, mode: &str) -> Vec<StageTable> {
    let tso = product.header.as_ref().is_some_and(|h| h.tso_visit);
    let mut order = vec![StageTable::Detector1];
    if IMAGE2_MODES.contains(&mode) {
        order.push(StageTable::Image2);
    }
    if SPEC_MODES.contains(&mode) {
        order.push(StageTable::Spec2);
    }
    if IMAGE3_MODES.contains(&mode) {
        order.push(StageTable::Image3);
    }
    if SPEC_MODES.contains(&mode) {
        order.push(StageTable::Spec3);
    }
    if tso {
        order.push(StageTable::Tso3);
    }
    if instrument_is(product, &["niriss"]) {
        order.push(StageTable::Ami3);
    }
    if CORON_MODES.contains(&mode) {
        order.push(StageTable::Coron3);
    }
    order
}

fn instrument_is(product: &ProductRecord, names: &[&str]) -> bool {
    product
        .instrument
        .as_deref()
        .is_some_and(|inst| names.contains(&inst))
}

/// Resolve `product`'s suffix against `reference`; the last matching table
/// in [`search_order`] wins.
pub fn resolve(
    product: &ProductRecord,
    reference: &dyn SuffixReference,
    policy: SearchPolicy,
    diagnostics: &mut Diagnostics,
) -> Resolution {
    let searched = search_order(product, policy, diagnostics);

    let mut authoritative = None;
    for table in &searched {
        if let Some(entry) = reference.lookup(*table, &product.suffix) {
            authoritative = Some((*table, entry));
        }
    }

    match authoritative {
        Some((table, entry)) => Resolution::Resolved(SuffixMetadata {
            stage: table.name().to_string(),
            description: entry.description.clone(),
            units: entry.units.clone(),
            level: entry.level.clone(),
        }),
        None => Resolution::Unresolved { searched },
    }
}
