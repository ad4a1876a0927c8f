//! Member filename → owning association lookup.
//!
//! Built once from the decoded associations before any product is looked
//! up. When a filename is listed by several associations, the one that
//! comes **last** in the supplied order owns it. The scan hands manifests
//! over sorted by path, so that order is deterministic.

use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::models::AssociationRecord;

#[derive(Debug, Default, Clone)]
pub struct AssociationIndex {
    owners: HashMap<String, String>,
}

impl AssociationIndex {
    /// The association filename that owns `member`, matched exactly.
    pub fn owner(&self, member: &str) -> Option<&str> {
        self.owners.get(member).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Index every member of every association, later associations winning.
pub fn build_index(
    associations: &[AssociationRecord],
    diagnostics: &mut Diagnostics,
) -> AssociationIndex {
    let mut owners: HashMap<String, String> = HashMap::new();

    for asn in associations {
        for member in &asn.member_filenames {
            if let Some(previous) = owners.insert(member.clone(), asn.filename.clone()) {
                if previous != asn.filename {
                    diagnostics.record(Diagnostic::ContestedMember {
                        member: member.clone(),
                        previous,
                        winner: asn.filename.clone(),
                    });
                }
            }
        }
    }

    AssociationIndex { owners }
}
