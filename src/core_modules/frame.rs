// THEORY:
// A `Frame` is one RGB image handed to the engine: a still photo or a single video
// frame. It is the only image type that crosses the public API. Every derived view
// the algorithms need is produced on demand from it:
// - `hsv()`   → byte-packed HSV samples for segmentation and colour histograms,
// - `luma()`  → an f32 grayscale `Plane` for corners and point tracking,
// - `crop()`  → an owned sub-frame, used when only a margin of the frame is rescanned.
//
// Construction validates the input once, so downstream stages can assume a
// non-empty image.

use std::path::Path;

use image::RgbImage;

use crate::core_modules::geometry::Rect;
use crate::core_modules::pixel::pixel::Pixel;
use crate::core_modules::plane::Plane;
use crate::error::{Error, Result};

/// One RGB image (a still or a video frame). Never empty.
#[derive(Debug, Clone)]
pub struct Frame {
    rgb: RgbImage,
}

impl Frame {
    pub fn new(rgb: RgbImage) -> Result<Self> {
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(Error::InvalidInput(format!(
                "frame has no pixels ({}x{})",
                rgb.width(),
                rgb.height()
            )));
        }
        Ok(Self { rgb })
    }

    /// Builds a frame from tightly packed RGB8 bytes.
    pub fn from_raw(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if bytes.len() != expected {
            return Err(Error::InvalidInput(format!(
                "expected {expected} RGB bytes for a {width}x{height} frame, got {}",
                bytes.len()
            )));
        }
        let rgb = RgbImage::from_raw(width, height, bytes).ok_or_else(|| {
            Error::InvalidInput(format!("could not build a {width}x{height} RGB frame"))
        })?;
        Self::new(rgb)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|source| Error::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(image.to_rgb8())
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    /// The rectangle covering the whole frame.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width() as i32, self.height() as i32)
    }

    /// Copies out the part of the frame under `rect`.
    pub fn crop(&self, rect: &Rect) -> Result<Frame> {
        if rect.is_empty() || !self.bounds().contains_rect(rect) {
            return Err(Error::InvalidInput(format!(
                "crop {rect:?} is empty or outside the {}x{} frame",
                self.width(),
                self.height()
            )));
        }
        let view = image::imageops::crop_imm(
            &self.rgb,
            rect.x as u32,
            rect.y as u32,
            rect.width as u32,
            rect.height as u32,
        );
        Frame::new(view.to_image())
    }

    /// Byte-packed HSV view of the frame.
    pub fn hsv(&self) -> HsvImage {
        let samples = self
            .rgb
            .pixels()
            .map(|rgb| Pixel::from(*rgb).to_hsv8())
            .collect();
        HsvImage {
            width: self.width() as usize,
            height: self.height() as usize,
            samples,
        }
    }

    /// Grayscale (Rec. 601) plane on the 0..255 scale.
    pub fn luma(&self) -> Plane {
        let data = self
            .rgb
            .pixels()
            .map(|rgb| Pixel::from(*rgb).luminance())
            .collect();
        Plane::from_vec(self.width() as usize, self.height() as usize, data)
    }
}

/// Row-major byte-packed HSV samples (hue in [0, 180), saturation/value in [0, 255]).
#[derive(Debug, Clone, PartialEq)]
pub struct HsvImage {
    pub width: usize,
    pub height: usize,
    pub samples: Vec<[u8; 3]>,
}

impl HsvImage {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        self.samples[y * self.width + x]
    }

    /// Splits the samples into one f32 plane per channel.
    pub fn channel_planes(&self) -> [Plane; 3] {
        let channel = |c: usize| {
            Plane::from_vec(
                self.width,
                self.height,
                self.samples.iter().map(|s| s[c] as f32).collect(),
            )
        };
        [channel(0), channel(1), channel(2)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frames_are_rejected() {
        assert!(matches!(
            Frame::new(RgbImage::new(0, 10)),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            Frame::from_raw(4, 4, vec![0; 10]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn crop_copies_the_sub_image() {
        let mut rgb = RgbImage::new(20, 10);
        rgb.put_pixel(12, 6, image::Rgb([255, 0, 0]));
        let frame = Frame::new(rgb).unwrap();

        let sub = frame.crop(&Rect::new(10, 5, 5, 5)).unwrap();
        assert_eq!(sub.bounds(), Rect::new(0, 0, 5, 5));
        let hsv = sub.hsv();
        assert_eq!(hsv.get(2, 1), [0, 255, 255]);
        assert_eq!(hsv.get(0, 0), [0, 0, 0]);

        assert!(frame.crop(&Rect::new(18, 0, 5, 5)).is_err());
        assert!(frame.crop(&Rect::new(0, 0, 0, 5)).is_err());
    }

    #[test]
    fn hsv_and_luma_match_frame_size() {
        let frame = Frame::new(RgbImage::from_pixel(7, 3, image::Rgb([0, 0, 255]))).unwrap();
        let hsv = frame.hsv();
        assert_eq!(hsv.samples.len(), 21);
        assert_eq!(hsv.get(6, 2), [120, 255, 255]);

        let luma = frame.luma();
        assert_eq!((luma.width(), luma.height()), (7, 3));
    }
}
