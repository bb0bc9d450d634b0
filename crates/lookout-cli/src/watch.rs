//! The live recognition loop.
//!
//! capture → detect → fan-out embeddings → fan-in → match → annotate →
//! render, one frame at a time. The enrollment store is read once at
//! startup; people enrolled while the loop runs appear after a restart.

use crate::draw::Annotator;
use crate::pool::EmbeddingPool;
use anyhow::{anyhow, Context, Result};
use image::{imageops, RgbImage};
use lookout_core::{Config, FaceDetector, FirstMatchMatcher, Identity};
use lookout_hw::Camera;
use lookout_store::EnrollmentStore;
use minifb::{Key, Window, WindowOptions};
use std::sync::Arc;

pub fn run(config: &Config) -> Result<()> {
    let store = EnrollmentStore::open(&config.uploads_dir)
        .with_context(|| format!("opening store at {}", config.uploads_dir.display()))?;
    let gallery = store.load_all().context("loading enrollments")?;
    if gallery.is_empty() {
        tracing::warn!("no enrollments found; every face will be Unknown");
    } else {
        tracing::info!(people = gallery.len(), "gallery loaded");
    }

    let matcher = FirstMatchMatcher::new(config.similarity_threshold);
    let mut detector =
        FaceDetector::load(&config.detector_model_path()).context("loading detector model")?;
    let pool = EmbeddingPool::new(&config.recognizer_model_path(), config.embed_workers)
        .context("loading recognizer model")?;
    let annotator = Annotator::load(&config.font_path);

    let camera = Camera::open(&config.camera_device, config.frame_width, config.frame_height)
        .with_context(|| format!("opening camera {}", config.camera_device))?;
    let mut stream = camera.stream().context("starting capture stream")?;

    let (win_w, win_h) = (config.frame_width as usize, config.frame_height as usize);
    let mut window = Window::new("Lookout", win_w, win_h, WindowOptions::default())
        .context("creating display window")?;
    window.set_target_fps(30);

    tracing::info!("watch loop running, press 'q' to quit");

    while window.is_open() && !window.is_key_down(Key::Q) {
        // A failed camera read is fatal; there is no recovery path once
        // the device stops delivering frames.
        let frame = stream.next_frame().context("camera read failed")?;
        let img = frame
            .into_image()
            .ok_or_else(|| anyhow!("frame buffer has wrong length"))?;

        let img = resize_for_processing(img, config.frame_width, config.frame_height);

        let faces = match detector.detect(&img) {
            Ok(faces) => faces,
            Err(err) => {
                tracing::warn!(error = %err, "detection failed, frame skipped");
                Vec::new()
            }
        };
        tracing::debug!(faces = faces.len(), "frame processed");

        let shared = Arc::new(img);
        let embeddings = pool.extract_all(&shared, &faces);
        let mut img = Arc::try_unwrap(shared).unwrap_or_else(|arc| (*arc).clone());

        for (face, embedding) in faces.iter().zip(embeddings) {
            let identity = match embedding {
                Some(probe) => matcher.find(&probe, &gallery),
                None => Identity::unknown(),
            };
            annotator.annotate(&mut img, face, &identity);
        }

        let buffer = rgb_to_argb(&img);
        window
            .update_with_buffer(&buffer, win_w, win_h)
            .context("rendering frame")?;
    }

    tracing::info!("watch loop exiting");
    Ok(())
}

fn resize_for_processing(img: RgbImage, width: u32, height: u32) -> RgbImage {
    if img.dimensions() == (width, height) {
        img
    } else {
        imageops::resize(&img, width, height, imageops::FilterType::Triangle)
    }
}

/// Pack RGB pixels into the 0RGB u32 layout minifb expects.
fn rgb_to_argb(img: &RgbImage) -> Vec<u32> {
    img.pixels()
        .map(|p| ((p.0[0] as u32) << 16) | ((p.0[1] as u32) << 8) | p.0[2] as u32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rgb_to_argb_packing() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([0xAB, 0xCD, 0xEF]));
        img.put_pixel(1, 0, Rgb([0x00, 0xFF, 0x00]));
        assert_eq!(rgb_to_argb(&img), vec![0x00ABCDEF, 0x0000FF00]);
    }

    #[test]
    fn test_resize_noop_at_target_size() {
        let img = RgbImage::new(640, 480);
        let out = resize_for_processing(img, 640, 480);
        assert_eq!(out.dimensions(), (640, 480));
    }

    #[test]
    fn test_resize_downscales() {
        let img = RgbImage::new(1280, 720);
        let out = resize_for_processing(img, 640, 480);
        assert_eq!(out.dimensions(), (640, 480));
    }
}
