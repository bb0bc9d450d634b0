//! Per-frame embedding fan-out.
//!
//! A fixed pool of worker threads, each owning its own ArcFace session.
//! The watch loop submits one job per detected face, tagged with the
//! face's index, and blocks until every job of the frame has reported
//! back. Results are re-associated by tag, never by completion order,
//! so out-of-order workers cannot mis-pair a face with someone else's
//! embedding. There is no cross-frame pipelining: the barrier drains
//! the frame completely before the loop moves on.

use image::RgbImage;
use lookout_core::recognizer::RecognizerError;
use lookout_core::{BoundingBox, Embedding, FaceRecognizer};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Seam between the pool and the model, so tests can run the pool
/// without ONNX weights on disk.
pub trait EmbeddingExtractor: Send + 'static {
    fn extract(&mut self, frame: &RgbImage, face: &BoundingBox)
        -> Result<Embedding, RecognizerError>;
}

impl EmbeddingExtractor for FaceRecognizer {
    fn extract(
        &mut self,
        frame: &RgbImage,
        face: &BoundingBox,
    ) -> Result<Embedding, RecognizerError> {
        FaceRecognizer::extract(self, frame, face)
    }
}

struct Job {
    tag: usize,
    frame: Arc<RgbImage>,
    face: BoundingBox,
}

type TaggedResult = (usize, Result<Embedding, RecognizerError>);

pub struct EmbeddingPool {
    job_tx: Option<Sender<Job>>,
    result_rx: Receiver<TaggedResult>,
    workers: Vec<JoinHandle<()>>,
}

impl EmbeddingPool {
    /// Spawn one worker per ArcFace session loaded from `model_path`.
    pub fn new(model_path: &str, workers: usize) -> Result<Self, RecognizerError> {
        let mut extractors: Vec<Box<dyn EmbeddingExtractor>> = Vec::new();
        for _ in 0..workers.max(1) {
            extractors.push(Box::new(FaceRecognizer::load(model_path)?));
        }
        Ok(Self::with_extractors(extractors))
    }

    /// Build a pool around pre-constructed extractors.
    pub fn with_extractors(extractors: Vec<Box<dyn EmbeddingExtractor>>) -> Self {
        let (job_tx, job_rx) = channel::<Job>();
        let (result_tx, result_rx) = channel::<TaggedResult>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let workers = extractors
            .into_iter()
            .enumerate()
            .map(|(i, mut extractor)| {
                let job_rx = Arc::clone(&job_rx);
                let result_tx = result_tx.clone();
                std::thread::Builder::new()
                    .name(format!("lookout-embed-{i}"))
                    .spawn(move || loop {
                        let job = {
                            let rx = job_rx.lock().expect("job queue poisoned");
                            rx.recv()
                        };
                        let Ok(job) = job else {
                            break; // pool dropped
                        };
                        let result = extractor.extract(&job.frame, &job.face);
                        if result_tx.send((job.tag, result)).is_err() {
                            break;
                        }
                    })
                    .expect("failed to spawn embedding worker")
            })
            .collect();

        Self {
            job_tx: Some(job_tx),
            result_rx,
            workers,
        }
    }

    /// Extract an embedding for every face in the frame, in parallel.
    ///
    /// Blocks until all jobs complete. Slot `i` of the result holds the
    /// embedding for `faces[i]`, or `None` when extraction failed for
    /// that face (logged, never fatal). Zero faces submits zero jobs.
    pub fn extract_all(
        &self,
        frame: &Arc<RgbImage>,
        faces: &[BoundingBox],
    ) -> Vec<Option<Embedding>> {
        if faces.is_empty() {
            return Vec::new();
        }

        let job_tx = self.job_tx.as_ref().expect("pool already shut down");
        for (tag, face) in faces.iter().enumerate() {
            let job = Job {
                tag,
                frame: Arc::clone(frame),
                face: face.clone(),
            };
            if job_tx.send(job).is_err() {
                tracing::error!("embedding workers gone, no results for this frame");
                return vec![None; faces.len()];
            }
        }

        let mut slots: Vec<Option<Embedding>> = vec![None; faces.len()];
        for _ in 0..faces.len() {
            match self.result_rx.recv() {
                Ok((tag, Ok(embedding))) => slots[tag] = Some(embedding),
                Ok((tag, Err(err))) => {
                    tracing::warn!(face = tag, error = %err, "embedding extraction failed");
                }
                Err(_) => {
                    tracing::error!("embedding workers gone mid-frame");
                    break;
                }
            }
        }
        slots
    }
}

impl Drop for EmbeddingPool {
    fn drop(&mut self) {
        // Closing the job channel lets every worker's recv() fail out.
        self.job_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
