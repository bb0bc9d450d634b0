use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Clamp the box to the given frame dimensions, returning integer
    /// pixel coordinates `(x, y, w, h)`. Degenerate boxes collapse to
    /// zero width/height rather than wrapping.
    pub fn clamped(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        let x = self.x.max(0.0).min(frame_width as f32) as u32;
        let y = self.y.max(0.0).min(frame_height as f32) as u32;
        let w = (self.width.max(0.0) as u32).min(frame_width.saturating_sub(x));
        let h = (self.height.max(0.0) as u32).min(frame_height.saturating_sub(y));
        (x, y, w, h)
    }
}

/// Face embedding vector (512-dimensional for ArcFace), L2-normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl Embedding {
    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }

    /// Pairwise verification: do two embeddings belong to the same person?
    pub fn verifies(&self, other: &Embedding, threshold: f32) -> bool {
        self.similarity(other) >= threshold
    }
}

/// An enrolled person: metadata plus one embedding per reference image.
///
/// Serialized as `info.json` in the person's upload directory. The field
/// holding the vectors is named `embeddings` on disk — they are model
/// outputs, not image bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    pub name: String,
    /// Stored as given by the form; never parsed or validated.
    pub age: String,
    pub nationality: String,
    pub embeddings: Vec<Embedding>,
    /// RFC 3339 enrollment timestamp.
    pub created_at: String,
}
