//! FITS primary-header reader.
//!
//! Reads only the primary header of a product file: 80-byte ASCII cards
//! packed into 2880-byte blocks, ending at the `END` card. Pixel data is
//! never touched. The keywords the resolver cares about are lifted into an
//! [`ExposureHeader`].

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use jwst_catalog_core::models::ExposureHeader;

/// Size of one FITS header block.
pub const BLOCK_LEN: usize = 2880;
/// Size of one header card.
pub const CARD_LEN: usize = 80;
/// Stop reading a header after this many blocks without an `END` card.
const MAX_HEADER_BLOCKS: usize = 256;

/// Header read error. The scan logs it and carries on without a header.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("header read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a FITS file (no SIMPLE card)")]
    NotFits,
    #[error("primary header has no END card")]
    MissingEnd,
}

/// Keyword → value map of a primary header. String values are unquoted;
/// logical values are `T` / `F`.
pub type HeaderCards = HashMap<String, String>;

/// Read and parse the primary header of the file at `path`.
pub fn read_exposure_header(path: &Path) -> Result<ExposureHeader, HeaderError> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::with_capacity(BLOCK_LEN);
    let mut block = [0u8; BLOCK_LEN];

    for _ in 0..MAX_HEADER_BLOCKS {
        file.read_exact(&mut block).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof if bytes.is_empty() => HeaderError::NotFits,
            std::io::ErrorKind::UnexpectedEof => HeaderError::MissingEnd,
            _ => HeaderError::Io(e),
        })?;
        bytes.extend_from_slice(&block);
        if let Some(cards) = parse_primary_header(&bytes)? {
            return Ok(exposure_header(&cards));
        }
    }
    Err(HeaderError::MissingEnd)
}

/// Parse header cards from `bytes`. Returns `Ok(None)` when no `END` card
/// has been seen yet.
pub fn parse_primary_header(bytes: &[u8]) -> Result<Option<HeaderCards>, HeaderError> {
    let mut cards = HeaderCards::new();

    for (i, raw) in bytes.chunks(CARD_LEN).enumerate() {
        let card = String::from_utf8_lossy(raw);
        let keyword = card.get(..card.len().min(8)).unwrap_or("").trim_end();
        if i == 0 && keyword != "SIMPLE" {
            return Err(HeaderError::NotFits);
        }
        if keyword == "END" {
            return Ok(Some(cards));
        }
        if keyword.is_empty() || card.get(8..10) != Some("= ") {
            continue;
        }
        if let Some(value) = card.get(10..).map(parse_value) {
            cards.insert(keyword.to_string(), value);
        }
    }

    Ok(None)
}

fn parse_value(field: &str) -> String {
    let field = field.trim_start();
    match field.strip_prefix('\'') {
        Some(rest) => {
            let mut value = String::new();
            let mut chars = rest.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '\'' {
                    if chars.peek() == Some(&'\'') {
                        value.push('\'');
                        chars.next();
                    } else {
                        break;
                    }
                } else {
                    value.push(c);
                }
            }
            value.trim_end().to_string()
        }
        None => field.split('/').next().unwrap_or("").trim().to_string(),
    }
}

/// Lift the resolver-relevant keywords out of a parsed header.
pub fn exposure_header(cards: &HeaderCards) -> ExposureHeader {
    let text = |key: &str| cards.get(key).filter(|v| !v.is_empty()).cloned();
    ExposureHeader {
        exp_type: text("EXP_TYPE"),
        tso_visit: cards.get("TSOVISIT").is_some_and(|v| v == "T"),
        date_obs: text("DATE-OBS"),
        target: text("TARGPROP"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(text: &str) -> String {
        format!("{:<80}", text)
    }

    fn header(cards: &[&str]) -> Vec<u8> {
        let mut out: String = cards.iter().map(|c| card(c)).collect();
        let padded = out.len().div_ceil(BLOCK_LEN) * BLOCK_LEN;
        out.push_str(&" ".repeat(padded - out.len()));
        out.into_bytes()
    }

    #[test]
    fn test_parse_keywords() {
        let bytes = header(&[
            "SIMPLE  =                    T / conforms to FITS standard",
            "EXP_TYPE= 'NRC_CORON'          / Type of data in the exposure",
            "TSOVISIT=                    F / Time Series Observation visit indicator",
            "DATE-OBS= '2017-01-01'         / UT date at start of exposure",
            "TARGPROP= 'HD 12345'           / Proposer's name for the target",
            "END",
        ]);
        let cards = parse_primary_header(&bytes).unwrap().unwrap();
        let exposure = exposure_header(&cards);
        assert_eq!(exposure.exp_type.as_deref(), Some("NRC_CORON"));
        assert!(!exposure.tso_visit);
        assert_eq!(exposure.date_obs.as_deref(), Some("2017-01-01"));
        assert_eq!(exposure.target.as_deref(), Some("HD 12345"));
        assert_eq!(exposure.exposure_mode(), Some("CORON"));
    }

    #[test]
    fn test_tso_visit_and_quoted_quote() {
        let bytes = header(&[
            "SIMPLE  =                    T",
            "TSOVISIT=                    T",
            "TARGPROP= 'O''BRIEN'",
            "END",
        ]);
        let cards = parse_primary_header(&bytes).unwrap().unwrap();
        assert_eq!(cards.get("TARGPROP").map(String::as_str), Some("O'BRIEN"));
        assert!(exposure_header(&cards).tso_visit);
    }

    #[test]
    fn test_missing_end_needs_more() {
        let bytes = header(&["SIMPLE  =                    T", "EXP_TYPE= 'MIR_IMAGE'"]);
        assert!(parse_primary_header(&bytes).unwrap().is_none());
    }

    #[test]
    fn test_not_fits() {
        let bytes = header(&["{\"products\": []}"]);
        assert!(matches!(
            parse_primary_header(&bytes),
            Err(HeaderError::NotFits)
        ));
    }

    #[test]
    fn test_read_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("jw00001001001_01101_00001_nrca1_cal.fits");
        let bytes = header(&[
            "SIMPLE  =                    T",
            "EXP_TYPE= 'NRC_IMAGE'",
            "END",
        ]);
        std::fs::write(&path, bytes).unwrap();
        let exposure = read_exposure_header(&path).unwrap();
        assert_eq!(exposure.exp_type.as_deref(), Some("NRC_IMAGE"));

        let missing = read_exposure_header(&tmp.path().join("absent.fits")).unwrap_err();
        assert!(matches!(missing, HeaderError::Io(_)));
        assert!(missing.to_string().starts_with("header read failed"));

        let empty = tmp.path().join("empty.fits");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(
            read_exposure_header(&empty),
            Err(HeaderError::NotFits)
        ));
    }
}
