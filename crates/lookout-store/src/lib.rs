//! lookout-store — the on-disk enrollment store.
//!
//! One directory per enrolled person under the uploads root:
//!
//! ```text
//! uploads/
//!   alice/
//!     image_1.jpg
//!     image_2.jpg
//!     info.json      # PersonRecord: name, age, nationality, embeddings
//! ```
//!
//! Writes are whole-record, last-write-wins. Re-enrolling an identifier
//! replaces the directory contents, so a shorter second upload cannot
//! leave stale image files behind. `load_all` isolates entries: a broken
//! `info.json` is warned about and skipped, never aborts the load.

use lookout_core::PersonRecord;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const METADATA_FILE: &str = "info.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata encode/decode: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

/// Handle to the uploads root directory.
#[derive(Debug, Clone)]
pub struct EnrollmentStore {
    root: PathBuf,
}

impl EnrollmentStore {
    /// Open the store at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derive the storage identifier (directory name) for a person.
    ///
    /// Bytes outside `[A-Za-z0-9._-]` become `_`. Names that sanitize
    /// to nothing but dots and underscores map to `"unnamed"`: `put`
    /// deletes the identifier's directory before writing, so `"."` or
    /// `".."` must never survive as a directory name. The identifier is
    /// the store key: two people whose names sanitize identically
    /// overwrite each other.
    pub fn identifier_for(name: &str) -> String {
        let slug: String = name
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if slug.is_empty() || slug.chars().all(|c| matches!(c, '_' | '.')) {
            "unnamed".to_string()
        } else {
            slug
        }
    }

    /// Write a person's record and raw image bytes, replacing any
    /// previous enrollment under the same identifier.
    pub fn put(
        &self,
        identifier: &str,
        record: &PersonRecord,
        images: &[Vec<u8>],
    ) -> Result<(), StoreError> {
        // The directory is removed before writing, so the identifier
        // must name a child of the root — never the root itself, its
        // parent, or anything reached through a separator.
        if matches!(identifier, "" | "." | "..")
            || identifier.contains(['/', '\\'])
        {
            return Err(StoreError::InvalidIdentifier(identifier.to_string()));
        }

        let dir = self.root.join(identifier);
        if dir.exists() {
            tracing::info!(identifier, "replacing existing enrollment");
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        for (i, bytes) in images.iter().enumerate() {
            fs::write(dir.join(format!("image_{}.jpg", i + 1)), bytes)?;
        }

        let json = serde_json::to_vec_pretty(record)?;
        fs::write(dir.join(METADATA_FILE), json)?;

        tracing::info!(
            identifier,
            images = images.len(),
            embeddings = record.embeddings.len(),
            "enrollment stored"
        );
        Ok(())
    }

    /// Read one person's record, if enrolled.
    pub fn get(&self, identifier: &str) -> Result<Option<PersonRecord>, StoreError> {
        let path = self.root.join(identifier).join(METADATA_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Load every enrollment, sorted by identifier for deterministic
    /// matching order. Entries with a missing or malformed metadata
    /// file are skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<(String, PersonRecord)>, StoreError> {
        let mut people = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let identifier = entry.file_name().to_string_lossy().into_owned();

            match self.get(&identifier) {
                Ok(Some(record)) => people.push((identifier, record)),
                Ok(None) => {
                    tracing::warn!(identifier, "enrollment has no info.json, skipping");
                }
                Err(err) => {
                    tracing::warn!(identifier, error = %err, "unreadable enrollment, skipping");
                }
            }
        }

        people.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(people)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_core::Embedding;

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding { values, model_version: None }
    }

    fn record(name: &str, embeddings: Vec<Embedding>) -> PersonRecord {
        PersonRecord {
            name: name.into(),
            age: "30".into(),
            nationality: "FR".into(),
            embeddings,
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn test_identifier_sanitization() {
        assert_eq!(EnrollmentStore::identifier_for("alice"), "alice");
        assert_eq!(EnrollmentStore::identifier_for("Mary Jane"), "Mary_Jane");
        assert_eq!(EnrollmentStore::identifier_for("a/b\\c"), "a_b_c");
        assert_eq!(EnrollmentStore::identifier_for("  bob  "), "bob");
        assert_eq!(EnrollmentStore::identifier_for("///"), "unnamed");
        assert_eq!(EnrollmentStore::identifier_for(""), "unnamed");
    }

    #[test]
    fn test_identifier_dot_names_never_escape() {
        // "." would alias the store root and ".." its parent; both get
        // the fallback, as does any dot/underscore-only mixture.
        assert_eq!(EnrollmentStore::identifier_for("."), "unnamed");
        assert_eq!(EnrollmentStore::identifier_for(".."), "unnamed");
        assert_eq!(EnrollmentStore::identifier_for("..."), "unnamed");
        assert_eq!(EnrollmentStore::identifier_for("._."), "unnamed");
        assert_eq!(EnrollmentStore::identifier_for(" .. "), "unnamed");
        // Dots inside a real name stay valid.
        assert_eq!(EnrollmentStore::identifier_for("j.r.r"), "j.r.r");
        assert_eq!(EnrollmentStore::identifier_for(".hidden"), ".hidden");
    }

    #[test]
    fn test_put_rejects_path_traversing_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnrollmentStore::open(dir.path()).unwrap();

        for bad in ["", ".", "..", "a/b", "a\\b", "../alice"] {
            assert!(
                matches!(
                    store.put(bad, &record("x", vec![]), &[]),
                    Err(StoreError::InvalidIdentifier(_))
                ),
                "identifier {bad:?} must be rejected"
            );
        }
    }

    #[test]
    fn test_dot_name_upload_cannot_destroy_other_enrollments() {
        // A parent directory with a file in it, the store one level down.
        let parent = tempfile::tempdir().unwrap();
        std::fs::write(parent.path().join("precious.txt"), b"keep me").unwrap();
        let root = parent.path().join("uploads");
        let store = EnrollmentStore::open(&root).unwrap();

        store.put("alice", &record("alice", vec![]), &[vec![1]]).unwrap();

        // Enroll under hostile names the way the handlers do: through
        // the sanitizer.
        for name in [".", ".."] {
            let id = EnrollmentStore::identifier_for(name);
            store.put(&id, &record(name, vec![]), &[]).unwrap();
        }

        assert!(store.get("alice").unwrap().is_some());
        assert!(root.join("alice/image_1.jpg").exists());
        assert!(parent.path().join("precious.txt").exists());
    }

    #[test]
    fn test_put_then_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnrollmentStore::open(dir.path()).unwrap();

        let rec = record("alice", vec![emb(vec![1.0, 0.0]), emb(vec![0.0, 1.0])]);
        store.put("alice", &rec, &[vec![1, 2, 3], vec![4, 5]]).unwrap();

        let loaded = store.get("alice").unwrap().unwrap();
        assert_eq!(loaded.name, "alice");
        assert_eq!(loaded.embeddings.len(), 2);

        // Raw image bytes land next to the metadata, 1-based.
        assert!(dir.path().join("alice/image_1.jpg").exists());
        assert!(dir.path().join("alice/image_2.jpg").exists());
    }

    #[test]
    fn test_embedding_count_tracks_successes_not_uploads() {
        // 3 images uploaded, only 1 yielded an embedding.
        let dir = tempfile::tempdir().unwrap();
        let store = EnrollmentStore::open(dir.path()).unwrap();

        let rec = record("bob", vec![emb(vec![0.5, 0.5])]);
        store.put("bob", &rec, &[vec![1], vec![2], vec![3]]).unwrap();

        let loaded = store.get("bob").unwrap().unwrap();
        assert_eq!(loaded.embeddings.len(), 1);
        assert!(dir.path().join("bob/image_3.jpg").exists());
    }

    #[test]
    fn test_reenroll_overwrites_and_removes_stale_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnrollmentStore::open(dir.path()).unwrap();

        let first = record("alice", vec![emb(vec![1.0]), emb(vec![2.0])]);
        store.put("alice", &first, &[vec![1], vec![2]]).unwrap();

        let mut second = record("alice", vec![emb(vec![9.0])]);
        second.age = "31".into();
        store.put("alice", &second, &[vec![9]]).unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1.age, "31");
        assert_eq!(all[0].1.embeddings.len(), 1);

        // The first upload's second image must be gone.
        assert!(dir.path().join("alice/image_1.jpg").exists());
        assert!(!dir.path().join("alice/image_2.jpg").exists());
    }

    #[test]
    fn test_load_all_sorted_by_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnrollmentStore::open(dir.path()).unwrap();

        for name in ["zara", "alice", "mike"] {
            store.put(name, &record(name, vec![]), &[]).unwrap();
        }

        let names: Vec<String> =
            store.load_all().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(names, vec!["alice", "mike", "zara"]);
    }

    #[test]
    fn test_load_all_skips_malformed_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnrollmentStore::open(dir.path()).unwrap();

        store.put("alice", &record("alice", vec![]), &[]).unwrap();

        // A directory with corrupt metadata and one with none at all.
        std::fs::create_dir(dir.path().join("broken")).unwrap();
        std::fs::write(dir.path().join("broken/info.json"), b"{ not json").unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, "alice");
    }

    #[test]
    fn test_load_all_ignores_plain_files_in_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnrollmentStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("README.txt"), b"not a person").unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_get_missing_person() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnrollmentStore::open(dir.path()).unwrap();
        assert!(store.get("nobody").unwrap().is_none());
    }
}
