//! Core data models used throughout the catalog engine.
//!
//! These types represent the decoded association manifests and data
//! products that flow through the enrichment pipeline, plus the raw inputs
//! handed to it by the directory scan.

use chrono::NaiveDate;
use serde::Serialize;

/// One manifest file discovered by the scan, before decoding.
///
/// `body` is `None` when the file could not be read; the orchestrator
/// degrades membership to empty in that case.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    pub name: String,
    pub body: Option<String>,
}

impl ManifestFile {
    pub fn new(name: impl Into<String>, body: Option<String>) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

/// One product file discovered by the scan, before decoding.
#[derive(Debug, Clone)]
pub struct ProductFile {
    pub name: String,
    pub header: Option<ExposureHeader>,
}

impl ProductFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            header: None,
        }
    }

    pub fn with_header(mut self, header: ExposureHeader) -> Self {
        self.header = Some(header);
        self
    }
}

/// Keywords taken from a product's primary header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExposureHeader {
    /// Full `EXP_TYPE` value, e.g. `MIR_IMAGE` or `NRC_CORON`.
    pub exp_type: Option<String>,
    pub tso_visit: bool,
    pub date_obs: Option<String>,
    pub target: Option<String>,
}

impl ExposureHeader {
    /// The mode token of `EXP_TYPE`: everything after the last `_`.
    ///
    /// `MIR_LRS-FIXEDSLIT` yields `LRS-FIXEDSLIT`; an empty value yields `None`.
    pub fn exposure_mode(&self) -> Option<&str> {
        let exp_type = self.exp_type.as_deref()?;
        let mode = exp_type.rsplit('_').next().unwrap_or(exp_type);
        if mode.is_empty() {
            None
        } else {
            Some(mode)
        }
    }
}

/// A decoded association manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationRecord {
    pub filename: String,
    pub program_id: String,
    pub candidate_id: String,
    pub observation_date: NaiveDate,
    pub pipeline_tag: String,
    pub sequence_number: String,
    /// Product filenames this association claims to have produced.
    pub member_filenames: Vec<String>,
    pub asn_type: Option<String>,
    pub asn_pool: Option<String>,
    pub product_names: Vec<String>,
}

impl AssociationRecord {
    pub fn has_member(&self, filename: &str) -> bool {
        self.member_filenames.iter().any(|m| m == filename)
    }
}

/// The second-segment shape of a product filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pointing {
    Target {
        target_id: String,
    },
    Source {
        source_id: String,
    },
    Visit {
        visit_group: String,
        parallel_sequence: String,
        activity_number: String,
    },
}

/// Which of the two product filename shapes was decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProductOrigin {
    /// `jw<ppppp><ooo><vvv>_...`: a single exposure.
    Exposure {
        observation_number: String,
        visit_number: String,
    },
    /// `jw<ppppp>-<asn>_...`: a product built from an association.
    Association { association_number: String },
}

/// Metadata attached by the suffix resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuffixMetadata {
    /// Stage table the metadata was taken from.
    pub stage: String,
    pub description: Option<String>,
    pub units: Option<String>,
    pub level: Option<String>,
}

/// A decoded data-product filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    pub filename: String,
    pub program_id: String,
    pub origin: ProductOrigin,
    pub pointing: Pointing,
    pub exposure_number: Option<String>,
    pub instrument: Option<String>,
    pub detector: Option<String>,
    pub optical_elements: Option<String>,
    pub suffix: String,
    pub header: Option<ExposureHeader>,
    pub member_of: Option<String>,
    pub metadata: Option<SuffixMetadata>,
}

impl ProductRecord {
    pub fn observation_number(&self) -> Option<&str> {
        match &self.origin {
            ProductOrigin::Exposure {
                observation_number, ..
            } => Some(observation_number),
            ProductOrigin::Association { .. } => None,
        }
    }

    pub fn visit_number(&self) -> Option<&str> {
        match &self.origin {
            ProductOrigin::Exposure { visit_number, .. } => Some(visit_number),
            ProductOrigin::Association { .. } => None,
        }
    }

    pub fn association_number(&self) -> Option<&str> {
        match &self.origin {
            ProductOrigin::Association { association_number } => Some(association_number),
            ProductOrigin::Exposure { .. } => None,
        }
    }

    pub fn target_id(&self) -> Option<&str> {
        match &self.pointing {
            Pointing::Target { target_id } => Some(target_id),
            _ => None,
        }
    }

    pub fn source_id(&self) -> Option<&str> {
        match &self.pointing {
            Pointing::Source { source_id } => Some(source_id),
            _ => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.description.as_deref())
    }

    pub fn units(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.units.as_deref())
    }

    pub fn level(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.level.as_deref())
    }

    pub fn exposure_mode(&self) -> Option<&str> {
        self.header.as_ref().and_then(|h| h.exposure_mode())
    }
}

/// Records sharing one program identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgramGroup {
    pub program_id: String,
    pub associations: Vec<AssociationRecord>,
    pub products: Vec<ProductRecord>,
}
