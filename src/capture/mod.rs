//! Screen capture of the watched regions.
//!
//! This module provides:
//! - The `CaptureSource` seam used by the monitor loop
//! - GDI-based region capture on Windows (`ScreenCapture`)
//! - Region outlines drawn over a full-monitor frame for calibration

pub mod preview;
pub mod screen;

pub use screen::ScreenCapture;

use anyhow::{anyhow, Result};
use image::RgbaImage;

use crate::monitor::config::ScreenRegion;

/// One attached display. `index` is the 1-based number used in the config.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorInfo {
    pub index: u32,
    pub width: u32,
    pub height: u32,
}

impl MonitorInfo {
    pub fn label(&self) -> String {
        format!("Monitor {} ({}x{})", self.index, self.width, self.height)
    }

    /// The region covering the whole monitor.
    pub fn full_region(&self) -> ScreenRegion {
        ScreenRegion {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        }
    }
}

/// Grabs one region of one monitor.
///
/// `monitor_index` is 1-based. Fails when the monitor does not exist.
pub trait CaptureSource: Send + Sync {
    fn capture(&self, region: &ScreenRegion, monitor_index: u32) -> Result<RgbaImage>;

    /// Attached monitors in enumeration order. Empty when they cannot be listed.
    fn monitors(&self) -> Vec<MonitorInfo> {
        Vec::new()
    }

    /// Grabs the whole of one monitor.
    fn capture_monitor(&self, monitor_index: u32) -> Result<RgbaImage> {
        let monitors = self.monitors();
        let monitor = monitors
            .iter()
            .find(|m| m.index == monitor_index)
            .ok_or_else(|| {
                anyhow!(
                    "Monitor {} not found ({} connected)",
                    monitor_index,
                    monitors.len()
                )
            })?;
        self.capture(&monitor.full_region(), monitor_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoScreens;

    impl CaptureSource for TwoScreens {
        fn capture(&self, region: &ScreenRegion, _monitor_index: u32) -> Result<RgbaImage> {
            Ok(RgbaImage::new(region.width, region.height))
        }

        fn monitors(&self) -> Vec<MonitorInfo> {
            vec![
                MonitorInfo { index: 1, width: 1920, height: 1080 },
                MonitorInfo { index: 2, width: 1280, height: 1024 },
            ]
        }
    }

    #[test]
    fn test_capture_monitor_uses_monitor_size() {
        let img = TwoScreens.capture_monitor(2).unwrap();
        assert_eq!(img.dimensions(), (1280, 1024));
    }

    #[test]
    fn test_capture_unknown_monitor_fails() {
        let err = TwoScreens.capture_monitor(3).unwrap_err();
        assert!(err.to_string().contains("2 connected"));
    }

    #[test]
    fn test_monitor_label() {
        let info = MonitorInfo { index: 1, width: 2560, height: 1440 };
        assert_eq!(info.label(), "Monitor 1 (2560x1440)");
    }
}
