//! lookout-core — Face detection, embedding extraction and matching.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both
//! running via ONNX Runtime for CPU inference. Matching is a first-match
//! linear scan over enrolled people.

pub mod alignment;
pub mod config;
pub mod detector;
pub mod matcher;
pub mod recognizer;
pub mod types;

pub use config::Config;
pub use detector::FaceDetector;
pub use matcher::{FirstMatchMatcher, Identity};
pub use recognizer::FaceRecognizer;
pub use types::{BoundingBox, Embedding, PersonRecord};
