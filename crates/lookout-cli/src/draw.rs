//! Frame annotation: bounding boxes and identity labels.

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use lookout_core::{BoundingBox, Identity};
use std::path::Path;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_SCALE: f32 = 16.0;
const LABEL_LINE_HEIGHT: i32 = 18;

/// Draws face overlays. Labels need a TrueType font; when none could be
/// loaded only the boxes are drawn.
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    /// Load the label font from `path`. A missing or unparsable font is
    /// downgraded to a warning — the loop still runs, boxes only.
    pub fn load(path: &Path) -> Self {
        let font = match std::fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => Some(font),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "unusable font, labels disabled");
                    None
                }
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "font not found, labels disabled");
                None
            }
        };
        Self { font }
    }

    #[cfg(test)]
    fn without_font() -> Self {
        Self { font: None }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw one face's box and its three label lines onto the frame.
    pub fn annotate(&self, img: &mut RgbImage, face: &BoundingBox, identity: &Identity) {
        let (w, h) = img.dimensions();
        let (x, y, bw, bh) = face.clamped(w, h);
        if bw == 0 || bh == 0 {
            return;
        }

        draw_hollow_rect_mut(img, Rect::at(x as i32, y as i32).of_size(bw, bh), BOX_COLOR);

        let Some(font) = &self.font else {
            return;
        };

        let lines = [
            format!("Name: {}", identity.name),
            format!("Age: {}", identity.age),
            format!("Nationality: {}", identity.nationality),
        ];

        // Stack the lines above the box; push them below the top edge
        // when the face sits at the top of the frame.
        let mut text_y = y as i32 - LABEL_LINE_HEIGHT * lines.len() as i32;
        if text_y < 0 {
            text_y = y as i32 + 2;
        }

        let scale = PxScale::from(LABEL_SCALE);
        for line in &lines {
            draw_text_mut(img, BOX_COLOR, x as i32, text_y, scale, font, line);
            text_y += LABEL_LINE_HEIGHT;
        }
    }
}
