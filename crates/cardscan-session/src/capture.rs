// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture job — perspective-correct a retained detection and save it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use cardscan_bridge::NativePhotoLibrary;
use cardscan_core::error::Result;
use cardscan_core::{FrameId, NormalizedQuad, SurfaceSize, map_to_surface};
use cardscan_vision::PerspectiveCorrector;
use cardscan_vision::frame::encode_png;

use crate::retention::Retained;

/// Record of a completed capture.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReceipt {
    pub id: Uuid,
    /// Where the photo library put the image.
    pub location: String,
    pub width: u32,
    pub height: u32,
    pub source_frame: FrameId,
    pub quad: NormalizedQuad,
    pub captured_at: DateTime<Utc>,
}

/// Map the retained quad into the frame's pixels, flatten it, and store the
/// result as PNG. Blocking; run it off the session task.
#[instrument(skip_all, fields(frame = %retained.frame.id()))]
pub fn run_capture(
    retained: Retained,
    corrector: &dyn PerspectiveCorrector,
    photos: &dyn NativePhotoLibrary,
) -> Result<CaptureReceipt> {
    let Retained { quad, frame } = retained;

    let image_size = SurfaceSize::from_pixels(frame.width(), frame.height())?;
    let region = map_to_surface(&quad, image_size);
    let corrected = corrector.correct(&frame, &region)?;
    let png = encode_png(&corrected)?;
    let location = photos.save_image(&png)?;

    let receipt = CaptureReceipt {
        id: Uuid::new_v4(),
        location,
        width: corrected.width(),
        height: corrected.height(),
        source_frame: frame.id(),
        quad,
        captured_at: Utc::now(),
    };
    info!(id = %receipt.id, location = %receipt.location, "card captured");
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use cardscan_core::error::CardscanError;
    use cardscan_core::{Frame, Point, ViewQuad};
    use cardscan_vision::ProjectionCorrector;
    use image::{Rgba, RgbaImage};

    #[derive(Default)]
    struct MemoryPhotos {
        saved: Mutex<Vec<Vec<u8>>>,
    }

    impl NativePhotoLibrary for MemoryPhotos {
        fn save_image(&self, png: &[u8]) -> Result<String> {
            let mut saved = self.saved.lock().expect("photos lock");
            saved.push(png.to_vec());
            Ok(format!("memory://{}", saved.len()))
        }
    }

    struct FailingCorrector;

    impl PerspectiveCorrector for FailingCorrector {
        fn correct(&self, _frame: &Frame, _quad: &ViewQuad) -> Result<RgbaImage> {
            Err(CardscanError::Correction("nope".into()))
        }
    }

    fn retained() -> Retained {
        let rgba = RgbaImage::from_pixel(100, 200, Rgba([0, 128, 255, 255]));
        let frame = Frame::from_rgba(100, 200, rgba.as_raw()).expect("frame");
        // Middle half of the frame in both directions.
        let quad = NormalizedQuad::new(
            Point::new(0.25, 0.75),
            Point::new(0.75, 0.75),
            Point::new(0.25, 0.25),
            Point::new(0.75, 0.25),
        )
        .expect("quad");
        Retained { quad, frame }
    }

    #[test]
    fn capture_saves_corrected_png() {
        let photos = MemoryPhotos::default();
        let receipt = run_capture(retained(), &ProjectionCorrector::new(), &photos).expect("capture");

        assert_eq!((receipt.width, receipt.height), (50, 100));
        assert_eq!(receipt.location, "memory://1");

        let saved = photos.saved.lock().expect("photos lock");
        let decoded = image::load_from_memory(&saved[0]).expect("decode").to_rgba8();
        assert_eq!(decoded.dimensions(), (50, 100));
        assert_eq!(decoded.get_pixel(25, 50).0, [0, 128, 255, 255]);
    }

    #[test]
    fn correction_failure_saves_nothing() {
        let photos = MemoryPhotos::default();
        let result = run_capture(retained(), &FailingCorrector, &photos);
        assert!(matches!(result, Err(CardscanError::Correction(_))));
        assert!(photos.saved.lock().expect("photos lock").is_empty());
    }
}
