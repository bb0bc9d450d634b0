//! Embedding engine for the upload daemon.
//!
//! A dedicated OS thread owns the ONNX sessions; HTTP handlers talk to
//! it through an mpsc request channel with oneshot replies, so model
//! inference never blocks the async runtime.

use image::RgbImage;
use lookout_core::{detector, recognizer, Embedding, FaceDetector, FaceRecognizer};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] detector::DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] recognizer::RecognizerError),
    #[error("no face detected in image")]
    NoFaceDetected,
    #[error("engine thread exited")]
    ChannelClosed,
}

enum EngineRequest {
    Represent {
        image: RgbImage,
        reply: oneshot::Sender<Result<Embedding, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Detect the most confident face in `image` and return its embedding.
    pub async fn represent(&self, image: RgbImage) -> Result<Embedding, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Represent { image, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads both ONNX models synchronously so a missing model fails the
/// daemon at startup instead of on the first upload.
pub fn spawn_engine(detector_path: &str, recognizer_path: &str) -> Result<EngineHandle, EngineError> {
    let mut detector = FaceDetector::load(detector_path)?;
    tracing::info!(path = detector_path, "SCRFD detector loaded");

    let mut recognizer = FaceRecognizer::load(recognizer_path)?;
    tracing::info!(path = recognizer_path, "ArcFace recognizer loaded");

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("lookout-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Represent { image, reply } => {
                        let result = run_represent(&mut detector, &mut recognizer, &image);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

/// Detect faces, pick the most confident one, extract its embedding.
fn run_represent(
    detector: &mut FaceDetector,
    recognizer: &mut FaceRecognizer,
    image: &RgbImage,
) -> Result<Embedding, EngineError> {
    let faces = detector.detect(image)?;

    // detect() sorts by confidence, so the first face is the best one.
    let face = faces.first().ok_or(EngineError::NoFaceDetected)?;
    tracing::debug!(
        faces = faces.len(),
        confidence = face.confidence,
        "represent: face selected"
    );

    Ok(recognizer.extract(image, face)?)
}
