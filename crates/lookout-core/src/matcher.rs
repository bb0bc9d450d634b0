//! First-match recognition over the enrolled gallery.
//!
//! A probe embedding is compared pairwise against every stored embedding
//! of every person, in the gallery's iteration order, stopping at the
//! first verification. Linear scan is fine at demo scale; cost grows as
//! O(people × embeddings per person) per probe.

use crate::types::{Embedding, PersonRecord};

/// The (name, age, nationality) triple rendered next to a face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub age: String,
    pub nationality: String,
}

impl Identity {
    /// Sentinel for a face no stored embedding verifies against.
    pub fn unknown() -> Self {
        Self {
            name: "Unknown".to_string(),
            age: "N/A".to_string(),
            nationality: "N/A".to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.name == "Unknown"
    }
}

impl From<&PersonRecord> for Identity {
    fn from(record: &PersonRecord) -> Self {
        Self {
            name: record.name.clone(),
            age: record.age.clone(),
            nationality: record.nationality.clone(),
        }
    }
}

/// First-match policy: scan people in gallery order, stop at the first
/// person with a verifying embedding. Deterministic as long as the
/// gallery order is (the store hands records out sorted by identifier).
pub struct FirstMatchMatcher {
    pub threshold: f32,
}

impl FirstMatchMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Match a probe against the gallery, returning the first verifying
    /// person's identity or the `Unknown` sentinel.
    pub fn find(&self, probe: &Embedding, gallery: &[(String, PersonRecord)]) -> Identity {
        for (identifier, record) in gallery {
            for stored in &record.embeddings {
                if probe.verifies(stored, self.threshold) {
                    tracing::debug!(identifier = %identifier, "probe verified");
                    return Identity::from(record);
                }
            }
        }
        Identity::unknown()
    }
}
