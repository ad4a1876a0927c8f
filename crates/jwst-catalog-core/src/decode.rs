//! Positional filename grammar for association manifests and data products.
//!
//! Both grammars split the file stem (everything before the first `.`) on
//! `_` and require at least [`MIN_SEGMENTS`] segments. Decoding is total:
//! a structural violation comes back as [`DecodeError::Malformed`] and the
//! caller excludes the record. The one loud failure is an embedded
//! observation date that does not parse as `YYYYMMDD`, reported as
//! [`DecodeError::InvalidDate`] rather than silently accepted.
//!
//! # Association names
//!
//! ```text
//! jw<program>-<candidate>_<YYYYMMDD>T<HHMMSS>_<pipeline>_<sequence>_asn.json
//! ```
//!
//! # Product names
//!
//! ```text
//! jw<ppppp><ooo><vvv>_<gg><s><aa>_<exposure>_<detector>_<suffix>.fits
//! jw<ppppp>-<asn>_<t|s><id>_<instrument>_<optical elements...>_<suffix>.fits
//! ```
//!
//! # Example
//!
//! ```rust
//! use jwst_catalog_core::decode::decode_product;
//!
//! let product = decode_product("jw00001001001_01101_00001_nrca1_cal.fits").unwrap();
//! assert_eq!(product.program_id, "00001");
//! assert_eq!(product.instrument.as_deref(), Some("nircam"));
//! assert_eq!(product.suffix, "cal");
//! ```

use chrono::NaiveDate;
use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::models::{AssociationRecord, Pointing, ProductOrigin, ProductRecord};

/// Minimum number of `_`-delimited segments in either filename shape.
pub const MIN_SEGMENTS: usize = 5;

/// Length of the fixed mission prefix (`jw`) on the first segment.
const PREFIX_LEN: usize = 2;

/// Placeholder detector for association-derived products.
const NO_DETECTOR: &str = "N/A";

/// Detector-code prefixes and the instrument each implies.
const DETECTOR_PREFIXES: [(&str, &str); 4] = [
    ("mir", "miri"),
    ("nrc", "nircam"),
    ("nis", "niriss"),
    ("nrs", "nirspec"),
];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{filename} filename not formatted properly: {reason}")]
    Malformed {
        filename: String,
        reason: &'static str,
    },
    #[error("{filename} has an invalid observation date '{token}': {source}")]
    InvalidDate {
        filename: String,
        token: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl DecodeError {
    pub fn filename(&self) -> &str {
        match self {
            DecodeError::Malformed { filename, .. } => filename,
            DecodeError::InvalidDate { filename, .. } => filename,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            DecodeError::Malformed { filename, reason } => Diagnostic::Malformed {
                filename: filename.clone(),
                reason: reason.to_string(),
            },
            DecodeError::InvalidDate {
                filename, token, ..
            } => Diagnostic::InvalidDate {
                filename: filename.clone(),
                token: token.clone(),
            },
        }
    }
}

/// Strip any directory components, keeping the final path element.
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// The part of a file name before its first `.`.
pub fn file_stem(name: &str) -> &str {
    let base = base_name(name);
    base.split('.').next().unwrap_or(base)
}

/// Decode an association manifest filename.
///
/// Membership and manifest metadata are left empty; see
/// [`crate::manifest`] for reading the body.
pub fn decode_association(name: &str) -> Result<AssociationRecord, DecodeError> {
    let filename = base_name(name).to_string();
    let segments: Vec<&str> = file_stem(name).split('_').collect();
    if segments.len() < MIN_SEGMENTS {
        return Err(malformed(filename, "fewer than 5 segments"));
    }

    let ids = char_slice(segments[0], PREFIX_LEN, None);
    let mut ids = ids.split('-');
    let (program_id, candidate_id) = match (ids.next(), ids.next()) {
        (Some(program), Some(candidate)) => (program.to_string(), candidate.to_string()),
        _ => {
            return Err(malformed(
                filename,
                "missing program-candidate separator",
            ))
        }
    };

    let lowered = segments[1].to_lowercase();
    let token = lowered.split('t').next().unwrap_or_default().to_string();
    let observation_date = match NaiveDate::parse_from_str(&token, "%Y%m%d") {
        Ok(date) => date,
        Err(source) => {
            return Err(DecodeError::InvalidDate {
                filename,
                token,
                source,
            })
        }
    };

    Ok(AssociationRecord {
        filename,
        program_id,
        candidate_id,
        observation_date,
        pipeline_tag: segments[2].to_string(),
        sequence_number: segments[3].to_string(),
        member_filenames: Vec::new(),
        asn_type: None,
        asn_pool: None,
        product_names: Vec::new(),
    })
}

/// Decode a data-product filename.
pub fn decode_product(name: &str) -> Result<ProductRecord, DecodeError> {
    let filename = base_name(name).to_string();
    let segments: Vec<&str> = file_stem(name).split('_').collect();
    if segments.len() < MIN_SEGMENTS {
        return Err(malformed(filename, "fewer than 5 segments"));
    }

    let first = segments[0];
    let (program_id, origin) = match first.split_once('-') {
        None => (
            char_slice(first, PREFIX_LEN, Some(7)),
            ProductOrigin::Exposure {
                observation_number: char_slice(first, 7, Some(10)),
                visit_number: char_slice(first, 10, Some(13)),
            },
        ),
        Some((program, rest)) => {
            let association_number = rest.split('-').next().unwrap_or(rest);
            (
                char_slice(program, PREFIX_LEN, None),
                ProductOrigin::Association {
                    association_number: association_number.to_string(),
                },
            )
        }
    };

    let second = segments[1];
    let pointing = if second.starts_with('t') {
        Pointing::Target {
            target_id: second.to_string(),
        }
    } else if second.starts_with('s') {
        Pointing::Source {
            source_id: second.to_string(),
        }
    } else {
        if second.chars().count() < 3 {
            return Err(malformed(filename, "visit segment shorter than 3 characters"));
        }
        Pointing::Visit {
            visit_group: char_slice(second, 0, Some(2)),
            parallel_sequence: char_slice(second, 2, Some(3)),
            activity_number: char_slice(second, 3, None),
        }
    };

    let third = segments[2];
    let (exposure_number, mut instrument) = if is_all_digits(third) {
        (Some(third.to_string()), None)
    } else {
        (None, Some(third.to_string()))
    };

    let middle = &segments[3..segments.len() - 1];
    let (mut detector, optical_elements) = match &origin {
        ProductOrigin::Association { .. } => {
            let joined = middle.join("_");
            let optical = if joined.is_empty() { None } else { Some(joined) };
            (Some(NO_DETECTOR.to_string()), optical)
        }
        ProductOrigin::Exposure { .. } => (middle.first().map(|d| d.to_string()), None),
    };

    match detector.as_deref().and_then(instrument_for_detector) {
        Some(inferred) => instrument = Some(inferred.to_string()),
        None => detector = None,
    }

    Ok(ProductRecord {
        filename,
        program_id,
        origin,
        pointing,
        exposure_number,
        instrument,
        detector,
        optical_elements,
        suffix: segments[segments.len() - 1].to_string(),
        header: None,
        member_of: None,
        metadata: None,
    })
}

/// Instrument implied by a detector token, matched case-insensitively on
/// its prefix.
pub fn instrument_for_detector(detector: &str) -> Option<&'static str> {
    let lowered = detector.to_ascii_lowercase();
    DETECTOR_PREFIXES
        .iter()
        .find(|(prefix, _)| lowered.starts_with(prefix))
        .map(|(_, instrument)| *instrument)
}

fn malformed(filename: String, reason: &'static str) -> DecodeError {
    DecodeError::Malformed { filename, reason }
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Character-indexed slice that clamps out-of-range bounds instead of
/// panicking. `end = None` runs to the end of the string.
fn char_slice(s: &str, start: usize, end: Option<usize>) -> String {
    let chars = s.chars().skip(start);
    match end {
        Some(end) => chars.take(end.saturating_sub(start)).collect(),
        None => chars.collect(),
    }
}
