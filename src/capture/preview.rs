//! Region outlines for calibration.
//!
//! Draws the configured proximity and death regions over a full-monitor
//! frame so the user can check where the monitor is actually looking.

use image::{Rgba, RgbaImage};

use crate::monitor::config::{MonitorConfig, RegionKind, ScreenRegion};

pub const COLOR_PROXIMITY_REGION: Rgba<u8> = Rgba([0, 255, 0, 255]); // Green
pub const COLOR_DEATH_REGION: Rgba<u8> = Rgba([255, 0, 0, 255]); // Red

const OUTLINE_THICKNESS: u32 = 3;

pub fn region_color(kind: RegionKind) -> Rgba<u8> {
    match kind {
        RegionKind::Proximity => COLOR_PROXIMITY_REGION,
        RegionKind::Death => COLOR_DEATH_REGION,
    }
}

/// Returns a copy of `frame` with both watched regions outlined.
pub fn render_region_preview(frame: &RgbaImage, config: &MonitorConfig) -> RgbaImage {
    let mut img = frame.clone();
    for kind in [RegionKind::Proximity, RegionKind::Death] {
        draw_rect(&mut img, &config.region(kind), region_color(kind), OUTLINE_THICKNESS);
    }
    img
}

/// Draws a rectangle border on an image. Parts outside the image are clipped.
pub fn draw_rect(img: &mut RgbaImage, region: &ScreenRegion, color: Rgba<u8>, thickness: u32) {
    let (img_w, img_h) = img.dimensions();
    let left = i64::from(region.x);
    let top = i64::from(region.y);
    let right = left + i64::from(region.width) - 1;
    let bottom = top + i64::from(region.height) - 1;
    let thickness = i64::from(thickness);

    let mut put = |x: i64, y: i64| {
        if let (Ok(px), Ok(py)) = (u32::try_from(x), u32::try_from(y)) {
            if px < img_w && py < img_h {
                img.put_pixel(px, py, color);
            }
        }
    };

    // Only the visible span of each edge is walked
    let x_span = left.max(0)..=right.min(i64::from(img_w) - 1);
    let y_span = top.max(0)..=bottom.min(i64::from(img_h) - 1);

    for d in 0..thickness {
        // Top and bottom edges
        for x in x_span.clone() {
            put(x, top + d);
            put(x, bottom - d);
        }
        // Left and right edges
        for y in y_span.clone() {
            put(left + d, y);
            put(right - d, y);
        }
    }
}
