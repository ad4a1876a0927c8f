//! Explicit diagnostics sink for the enrichment engine.
//!
//! Every component takes a `&mut Diagnostics` instead of writing to an
//! ambient logger. Each event is kept as a structured [`Diagnostic`] so the
//! caller can count and persist outcomes, and is mirrored to a `tracing`
//! event at a level matching its severity.

use serde::Serialize;

/// One noteworthy per-record event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Filename does not follow the segment grammar; record excluded.
    Malformed { filename: String, reason: String },
    /// Embedded observation date failed to parse; record excluded.
    InvalidDate { filename: String, token: String },
    /// Manifest body missing or unparseable; membership degraded to empty.
    ManifestDegraded { filename: String, reason: String },
    /// No stage table matched the product's suffix; product excluded.
    Unresolved {
        filename: String,
        suffix: String,
        searched: Vec<String>,
    },
    /// A member filename is listed by more than one association.
    ContestedMember {
        member: String,
        previous: String,
        winner: String,
    },
    /// An association's program has no product bucket.
    OrphanedAssociation { filename: String, program_id: String },
    /// The exposure-gated policy had no exposure type to work with.
    MissingExposureType { filename: String },
    /// Two manifests share a filename; the later one replaces the earlier.
    DuplicateAssociation { filename: String },
}

/// Per-category counts derived from the recorded events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticSummary {
    pub malformed: usize,
    pub invalid_dates: usize,
    pub manifests_degraded: usize,
    pub unresolved: usize,
    pub contested_members: usize,
    pub orphaned_associations: usize,
    pub missing_exposure_types: usize,
    pub duplicate_associations: usize,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    events: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::Malformed { filename, reason } => {
                tracing::warn!(filename = %filename, reason = %reason, "filename not formatted properly");
            }
            Diagnostic::InvalidDate { filename, token } => {
                tracing::error!(filename = %filename, token = %token, "invalid observation date in filename");
            }
            Diagnostic::ManifestDegraded { filename, reason } => {
                tracing::warn!(filename = %filename, reason = %reason, "association membership unavailable");
            }
            Diagnostic::Unresolved {
                filename,
                suffix,
                searched,
            } => {
                tracing::warn!(
                    filename = %filename,
                    suffix = %suffix,
                    searched = ?searched,
                    "not a valid file type"
                );
            }
            Diagnostic::ContestedMember {
                member,
                previous,
                winner,
            } => {
                tracing::debug!(member = %member, previous = %previous, winner = %winner, "member claimed by several associations");
            }
            Diagnostic::OrphanedAssociation {
                filename,
                program_id,
            } => {
                tracing::warn!(filename = %filename, program = %program_id, "no products found for association program");
            }
            Diagnostic::MissingExposureType { filename } => {
                tracing::warn!(filename = %filename, "missing EXP_TYPE, using standard search order");
            }
            Diagnostic::DuplicateAssociation { filename } => {
                tracing::warn!(filename = %filename, "association manifest seen more than once, keeping the last");
            }
        }
        self.events.push(diagnostic);
    }

    pub fn events(&self) -> &[Diagnostic] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Diagnostic> {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn summary(&self) -> DiagnosticSummary {
        let mut summary = DiagnosticSummary::default();
        for event in &self.events {
            match event {
                Diagnostic::Malformed { .. } => summary.malformed += 1,
                Diagnostic::InvalidDate { .. } => summary.invalid_dates += 1,
                Diagnostic::ManifestDegraded { .. } => summary.manifests_degraded += 1,
                Diagnostic::Unresolved { .. } => summary.unresolved += 1,
                Diagnostic::ContestedMember { .. } => summary.contested_members += 1,
                Diagnostic::OrphanedAssociation { .. } => summary.orphaned_associations += 1,
                Diagnostic::MissingExposureType { .. } => summary.missing_exposure_types += 1,
                Diagnostic::DuplicateAssociation { .. } => summary.duplicate_associations += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_by_category() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record(Diagnostic::Malformed {
            filename: "a".to_string(),
            reason: "short".to_string(),
        });
        diagnostics.record(Diagnostic::Unresolved {
            filename: "b".to_string(),
            suffix: "bogus".to_string(),
            searched: vec!["detector1".to_string()],
        });
        diagnostics.record(Diagnostic::Unresolved {
            filename: "c".to_string(),
            suffix: "bogus".to_string(),
            searched: vec![],
        });

        let summary = diagnostics.summary();
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.unresolved, 2);
        assert_eq!(summary.manifests_degraded, 0);
        assert_eq!(diagnostics.events().len(), 3);
    }
}
