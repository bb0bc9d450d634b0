//! ArcFace face embedding extractor via ONNX Runtime.
//!
//! Produces 512-dimensional L2-normalized embeddings from face crops,
//! using the w600k_r50 ArcFace model. Crops are landmark-aligned when
//! the detector supplied landmarks, otherwise cropped and resized.

use crate::alignment::{self, ALIGNED_SIZE};
use crate::types::{BoundingBox, Embedding};
use image::{imageops, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // NOT 128.0 — ArcFace uses symmetric normalization
const ARCFACE_EMBEDDING_DIM: usize = 512;
const ARCFACE_MODEL_VERSION: &str = "w600k_r50";

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0} — download from insightface and place in models/")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face region is empty")]
    EmptyFaceRegion,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based embedding extractor.
pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, RecognizerError> {
        if !Path::new(model_path).exists() {
            return Err(RecognizerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "loaded ArcFace model");

        Ok(Self { session })
    }

    /// Extract an embedding for one detected face in an RGB frame.
    ///
    /// Prefers landmark alignment to the canonical 112×112 positions;
    /// falls back to a plain crop+resize when landmarks are absent or
    /// geometrically degenerate.
    pub fn extract(
        &mut self,
        frame: &RgbImage,
        face: &BoundingBox,
    ) -> Result<Embedding, RecognizerError> {
        let crop = match face.landmarks.as_ref().and_then(|lms| alignment::align_face(frame, lms)) {
            Some(aligned) => aligned,
            None => crop_and_resize(frame, face)?,
        };

        let input = Self::preprocess(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding {
            values: l2_normalize(raw),
            model_version: Some(ARCFACE_MODEL_VERSION.to_string()),
        })
    }

    /// Build a normalized NCHW tensor from a 112×112 RGB crop.
    fn preprocess(crop: &RgbImage) -> Array4<f32> {
        let size = ALIGNED_SIZE as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for (x, y, pixel) in crop.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel.0[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
            }
        }

        tensor
    }
}

/// Fallback path: crop the bounding box and resize to the model input.
fn crop_and_resize(frame: &RgbImage, face: &BoundingBox) -> Result<RgbImage, RecognizerError> {
    let (w, h) = frame.dimensions();
    let (x, y, cw, ch) = face.clamped(w, h);
    if cw == 0 || ch == 0 {
        return Err(RecognizerError::EmptyFaceRegion);
    }
    let crop = imageops::crop_imm(frame, x, y, cw, ch).to_image();
    Ok(imageops::resize(&crop, ALIGNED_SIZE, ALIGNED_SIZE, imageops::FilterType::Triangle))
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_preprocess_output_shape() {
        let crop = RgbImage::new(ALIGNED_SIZE, ALIGNED_SIZE);
        let tensor = FaceRecognizer::preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 3, ALIGNED_SIZE as usize, ALIGNED_SIZE as usize]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let mut crop = RgbImage::new(ALIGNED_SIZE, ALIGNED_SIZE);
        for p in crop.pixels_mut() {
            *p = Rgb([128, 0, 255]);
        }
        let tensor = FaceRecognizer::preprocess(&crop);
        assert!((tensor[[0, 0, 0, 0]] - (128.0 - ARCFACE_MEAN) / ARCFACE_STD).abs() < 1e-6);
        assert!((tensor[[0, 1, 0, 0]] - (0.0 - ARCFACE_MEAN) / ARCFACE_STD).abs() < 1e-6);
        assert!((tensor[[0, 2, 0, 0]] - (255.0 - ARCFACE_MEAN) / ARCFACE_STD).abs() < 1e-6);
    }

    #[test]
    fn test_crop_and_resize_dimensions() {
        let frame = RgbImage::new(320, 240);
        let face = BoundingBox {
            x: 50.0, y: 40.0, width: 80.0, height: 100.0,
            confidence: 0.9, landmarks: None,
        };
        let crop = crop_and_resize(&frame, &face).unwrap();
        assert_eq!(crop.dimensions(), (ALIGNED_SIZE, ALIGNED_SIZE));
    }

    #[test]
    fn test_crop_and_resize_rejects_degenerate_box() {
        let frame = RgbImage::new(320, 240);
        let face = BoundingBox {
            x: 400.0, y: 40.0, width: 80.0, height: 100.0,
            confidence: 0.9, landmarks: None,
        };
        assert!(matches!(
            crop_and_resize(&frame, &face),
            Err(RecognizerError::EmptyFaceRegion)
        ));
    }

    #[test]
    fn test_l2_normalize_unit_length() {
        let v = l2_normalize(&[3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
