use anyhow::{bail, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbaImage};

use crate::monitor::config::{MonitorConfig, RegionKind};

/// Constants that shape a captured frame into a recognizer-ready image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreprocessSettings {
    pub upscale_factor: u32,
    /// Columns removed from the left of the upscaled proximity frame
    pub icon_crop: u32,
    pub proximity_threshold: u8,
    pub death_threshold: u8,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

impl PreprocessSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            upscale_factor: config.upscale_factor.max(1),
            icon_crop: config.icon_crop,
            proximity_threshold: config.proximity_threshold,
            death_threshold: config.death_threshold,
        }
    }
}

/// Normalizes a captured region into a single-channel binary image.
///
/// Both kinds are upscaled with a bicubic filter first since game text is
/// small. Proximity frames lose their icon column and are thresholded as-is
/// (text lighter than background). Death frames are inverted before
/// thresholding because the overlay is light text on a dark backdrop.
pub fn preprocess_frame(
    img: &RgbaImage,
    kind: RegionKind,
    settings: &PreprocessSettings,
) -> Result<GrayImage> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        bail!("Cannot preprocess an empty {} frame", kind);
    }

    let factor = settings.upscale_factor.max(1);
    let (Some(scaled_w), Some(scaled_h)) = (width.checked_mul(factor), height.checked_mul(factor))
    else {
        bail!(
            "Upscaling a {}x{} {} frame by {} overflows",
            width,
            height,
            kind,
            factor
        );
    };
    let scaled = imageops::resize(img, scaled_w, scaled_h, FilterType::CatmullRom);

    match kind {
        RegionKind::Proximity => {
            let (sw, sh) = scaled.dimensions();
            let crop = settings.icon_crop.min(sw);
            if crop == sw {
                bail!(
                    "Icon crop of {}px leaves nothing of a {}px wide proximity frame",
                    crop,
                    sw
                );
            }
            let cropped = imageops::crop_imm(&scaled, crop, 0, sw - crop, sh).to_image();
            let gray = imageops::grayscale(&cropped);
            Ok(binarize(&gray, settings.proximity_threshold))
        }
        RegionKind::Death => {
            let mut gray = imageops::grayscale(&scaled);
            imageops::invert(&mut gray);
            Ok(binarize(&gray, settings.death_threshold))
        }
    }
}

/// Fixed-threshold binarization.
///
/// Pixels brighter than `threshold` become white (255), all others black (0).
pub fn binarize(img: &GrayImage, threshold: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let value = if pixel[0] > threshold { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    #[test]
    fn test_binarize() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([100]));
        img.put_pixel(1, 0, Luma([171]));
        img.put_pixel(2, 0, Luma([170]));

        let result = binarize(&img, 170);

        assert_eq!(result.get_pixel(0, 0)[0], 0, "Dark pixel should become black");
        assert_eq!(result.get_pixel(1, 0)[0], 255, "Bright pixel should become white");
        assert_eq!(result.get_pixel(2, 0)[0], 0, "Threshold itself is not above threshold");
    }

    #[test]
    fn test_proximity_upscales_and_crops_icon() {
        let settings = PreprocessSettings::default();
        let out = preprocess_frame(&solid(100, 20, 200), RegionKind::Proximity, &settings).unwrap();

        assert_eq!(out.dimensions(), (300 - 65, 60));
        assert!(out.pixels().all(|p| p[0] == 255), "Light text stays white");
    }

    #[test]
    fn test_proximity_dark_background_goes_black() {
        let settings = PreprocessSettings::default();
        let out = preprocess_frame(&solid(50, 10, 40), RegionKind::Proximity, &settings).unwrap();
        assert!(out.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_death_is_inverted() {
        let settings = PreprocessSettings::default();

        // Light overlay text turns dark after inversion
        let light = preprocess_frame(&solid(10, 10, 240), RegionKind::Death, &settings).unwrap();
        assert_eq!(light.dimensions(), (30, 30));
        assert!(light.pixels().all(|p| p[0] == 0));

        // Dark backdrop turns light
        let dark = preprocess_frame(&solid(10, 10, 15), RegionKind::Death, &settings).unwrap();
        assert!(dark.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_empty_frame_is_an_error() {
        let settings = PreprocessSettings::default();
        assert!(preprocess_frame(&RgbaImage::new(0, 0), RegionKind::Death, &settings).is_err());
    }

    #[test]
    fn test_oversized_upscale_is_an_error() {
        let settings = PreprocessSettings {
            upscale_factor: u32::MAX,
            ..PreprocessSettings::default()
        };
        let err = preprocess_frame(&solid(4, 2, 200), RegionKind::Death, &settings).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_crop_wider_than_frame_is_an_error() {
        let settings = PreprocessSettings {
            icon_crop: 500,
            ..PreprocessSettings::default()
        };
        assert!(preprocess_frame(&solid(20, 20, 200), RegionKind::Proximity, &settings).is_err());
    }
}
