//! Region capture from the desktop using GDI.

use anyhow::{anyhow, bail, Result};
use image::RgbaImage;

use super::{CaptureSource, MonitorInfo};
use crate::monitor::config::ScreenRegion;

/// Captures desktop regions relative to a monitor's top-left corner.
#[derive(Default)]
pub struct ScreenCapture;

impl ScreenCapture {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureSource for ScreenCapture {
    fn capture(&self, region: &ScreenRegion, monitor_index: u32) -> Result<RgbaImage> {
        if region.width == 0 || region.height == 0 {
            bail!("Capture region has no area: {:?}", region);
        }
        let len = buffer_len(region)?;
        platform::capture_region(region, monitor_index, len)
    }

    fn monitors(&self) -> Vec<MonitorInfo> {
        platform::monitors()
    }
}

/// Bytes needed for a 32-bit capture of `region`. GDI takes signed sizes.
fn buffer_len(region: &ScreenRegion) -> Result<usize> {
    if i32::try_from(region.width).is_err() || i32::try_from(region.height).is_err() {
        bail!("Capture region is too large: {:?}", region);
    }
    usize::try_from(region.width)
        .ok()
        .zip(usize::try_from(region.height).ok())
        .and_then(|(w, h)| w.checked_mul(h))
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| anyhow!("Capture region is too large: {:?}", region))
}

/// Converts GDI's BGRA rows into an RGBA image.
#[cfg_attr(not(windows), allow(dead_code))]
fn bgra_to_rgba(width: u32, height: u32, mut buffer: Vec<u8>) -> Result<RgbaImage> {
    for pixel in buffer.chunks_exact_mut(4) {
        pixel.swap(0, 2);
        // GDI leaves alpha undefined for screen blits
        pixel[3] = 255;
    }
    RgbaImage::from_raw(width, height, buffer)
        .ok_or_else(|| anyhow!("Captured buffer does not match {}x{}", width, height))
}

#[cfg(windows)]
mod platform {
    use anyhow::{anyhow, Result};
    use image::RgbaImage;
    use std::ffi::c_void;

    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT, TRUE};
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject,
        EnumDisplayMonitors, GetDC, GetDIBits, GetMonitorInfoW, ReleaseDC, SelectObject,
        BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HDC, HMONITOR, MONITORINFO, SRCCOPY,
    };

    use super::bgra_to_rgba;
    use crate::capture::MonitorInfo;
    use crate::monitor::config::ScreenRegion;

    /// Returns the desktop rectangle of every monitor, in enumeration order.
    fn monitor_rects() -> Vec<RECT> {
        unsafe extern "system" fn enum_callback(
            hmonitor: HMONITOR,
            _hdc: HDC,
            _rect: *mut RECT,
            lparam: LPARAM,
        ) -> BOOL {
            unsafe {
                let rects = &mut *(lparam.0 as *mut Vec<RECT>);
                let mut info = MONITORINFO {
                    cbSize: std::mem::size_of::<MONITORINFO>() as u32,
                    ..Default::default()
                };
                if GetMonitorInfoW(hmonitor, &mut info).as_bool() {
                    rects.push(info.rcMonitor);
                }
            }
            TRUE
        }

        let mut rects: Vec<RECT> = Vec::new();
        unsafe {
            let _ = EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(enum_callback),
                LPARAM(&mut rects as *mut Vec<RECT> as isize),
            );
        }
        rects
    }

    pub fn monitors() -> Vec<MonitorInfo> {
        monitor_rects()
            .iter()
            .zip(1u32..)
            .map(|(rect, index)| MonitorInfo {
                index,
                width: u32::try_from(rect.right - rect.left).unwrap_or(0),
                height: u32::try_from(rect.bottom - rect.top).unwrap_or(0),
            })
            .collect()
    }

    pub fn capture_region(region: &ScreenRegion, monitor_index: u32, len: usize) -> Result<RgbaImage> {
        let monitors = monitor_rects();
        let monitor = monitor_index
            .checked_sub(1)
            .and_then(|i| monitors.get(i as usize))
            .ok_or_else(|| {
                anyhow!(
                    "Monitor {} not found ({} connected)",
                    monitor_index,
                    monitors.len()
                )
            })?;

        let left = monitor.left + region.x;
        let top = monitor.top + region.y;
        let width = i32::try_from(region.width)?;
        let height = i32::try_from(region.height)?;

        let mut buffer = vec![0u8; len];

        unsafe {
            let screen_dc = GetDC(HWND::default());
            if screen_dc.is_invalid() {
                return Err(anyhow!("GetDC failed for the desktop"));
            }
            let mem_dc = CreateCompatibleDC(screen_dc);
            let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            let previous = SelectObject(mem_dc, bitmap);

            let blit = BitBlt(mem_dc, 0, 0, width, height, screen_dc, left, top, SRCCOPY);

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    // Negative height = top-down rows
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let copied = if blit.is_ok() {
                GetDIBits(
                    mem_dc,
                    bitmap,
                    0,
                    region.height,
                    Some(buffer.as_mut_ptr() as *mut c_void),
                    &mut info,
                    DIB_RGB_COLORS,
                )
            } else {
                0
            };

            SelectObject(mem_dc, previous);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(mem_dc);
            ReleaseDC(HWND::default(), screen_dc);

            blit.map_err(|e| anyhow!("BitBlt failed: {}", e))?;
            if copied != height {
                return Err(anyhow!("GetDIBits copied {} of {} rows", copied, height));
            }
        }

        bgra_to_rgba(region.width, region.height, buffer)
    }
}

#[cfg(not(windows))]
mod platform {
    use anyhow::{bail, Result};
    use image::RgbaImage;

    use crate::capture::MonitorInfo;
    use crate::monitor::config::ScreenRegion;

    pub fn monitors() -> Vec<MonitorInfo> {
        Vec::new()
    }

    pub fn capture_region(_region: &ScreenRegion, _monitor_index: u32, _len: usize) -> Result<RgbaImage> {
        bail!("Screen capture is only supported on Windows")
    }
}
