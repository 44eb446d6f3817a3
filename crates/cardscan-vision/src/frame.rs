// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversions between BGRA camera frames and `image` buffers, plus encoding.

use cardscan_core::error::{CardscanError, Result};
use cardscan_core::Frame;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbaImage};

/// Copy a frame into an RGBA image.
pub fn frame_to_rgba(frame: &Frame) -> Result<RgbaImage> {
    RgbaImage::from_raw(frame.width(), frame.height(), frame.to_rgba()).ok_or_else(|| {
        CardscanError::InvalidFrame(format!(
            "frame {} pixel buffer does not match {}x{}",
            frame.id(),
            frame.width(),
            frame.height()
        ))
    })
}

/// Luminance of a frame, read straight from the BGRA buffer.
pub fn frame_to_luma(frame: &Frame) -> GrayImage {
    let stride = frame.bytes_per_row();
    let data = frame.bgra();
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let i = y as usize * stride + x as usize * 4;
        let (b, g, r) = (data[i] as u32, data[i + 1] as u32, data[i + 2] as u32);
        // BT.601 weights in 8.8 fixed point.
        Luma([((77 * r + 150 * g + 29 * b) >> 8) as u8])
    })
}

/// Build a frame from any decoded image.
pub fn frame_from_image(image: &DynamicImage) -> Result<Frame> {
    let rgba = image.to_rgba8();
    Frame::from_rgba(rgba.width(), rgba.height(), rgba.as_raw())
}

/// Encode an RGBA image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image.write_to(&mut cursor, ImageFormat::Png).map_err(|err| {
        CardscanError::ImageError(format!("PNG encoding failed: {}", err))
    })?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn rgba_conversion_preserves_pixels() {
        let mut img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        img.put_pixel(2, 1, Rgba([200, 100, 50, 7]));
        let frame = frame_from_image(&DynamicImage::ImageRgba8(img.clone())).expect("frame");

        assert_eq!(frame_to_rgba(&frame).expect("rgba"), img);
    }

    #[test]
    fn luma_of_white_and_black() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let frame = frame_from_image(&DynamicImage::ImageRgba8(img)).expect("frame");
        let gray = frame_to_luma(&frame);

        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        assert_eq!(gray.get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn png_encoding_decodes_back() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([9, 8, 7, 255]));
        let png = encode_png(&img).expect("encode");
        let decoded = image::load_from_memory(&png).expect("decode").to_rgba8();
        assert_eq!(decoded, img);
    }
}
