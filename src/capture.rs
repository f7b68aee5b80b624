use image::{imageops, GrayImage, RgbaImage};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CaptureError;

/// A rectangle in screen (or image) pixel coordinates.
///
/// The origin may be negative while a region is being derived from a badge
/// location; `clamp` trims it back into the frame before any pixels are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a region from its top-left and bottom-right corners.
    pub fn from_corners(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self::new(
            x0,
            y0,
            x1.saturating_sub(x0).max(0) as u32,
            y1.saturating_sub(y0).max(0) as u32,
        )
    }

    /// Whole-image region for the given dimensions.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width as i32)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height as i32)
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Overlap of two regions, `None` when they do not intersect.
    pub fn intersect(&self, other: &CaptureRegion) -> Option<CaptureRegion> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self::from_corners(x0, y0, x1, y1))
    }

    /// Trim the region to a `width` x `height` frame.
    pub fn clamp(&self, width: u32, height: u32) -> Option<CaptureRegion> {
        self.intersect(&Self::full(width, height))
    }

    pub fn as_array(&self) -> [u32; 4] {
        [self.x.max(0) as u32, self.y.max(0) as u32, self.width, self.height]
    }

    pub fn from_array(arr: [u32; 4]) -> Self {
        Self::new(arr[0] as i32, arr[1] as i32, arr[2], arr[3])
    }
}

/// Copy `region` out of `image`, clamped to its bounds.
pub fn crop_gray(image: &GrayImage, region: CaptureRegion) -> Option<GrayImage> {
    let r = region.clamp(image.width(), image.height())?;
    Some(imageops::crop_imm(image, r.x as u32, r.y as u32, r.width, r.height).to_image())
}

fn crop_rgba(image: &RgbaImage, region: CaptureRegion) -> Result<RgbaImage, CaptureError> {
    let r = region
        .clamp(image.width(), image.height())
        .ok_or(CaptureError::OutOfBounds {
            region: region.as_array(),
            width: image.width(),
            height: image.height(),
        })?;
    Ok(imageops::crop_imm(image, r.x as u32, r.y as u32, r.width, r.height).to_image())
}

/// Anything that can hand over the pixels of a screen rectangle.
///
/// Implementations must be cheap to call from several detection threads at
/// once; the orchestrator shares one source between all signal loops.
pub trait FrameSource: Send + Sync {
    fn capture_region(&self, region: CaptureRegion) -> Result<RgbaImage, CaptureError>;

    /// Short label used in logs.
    fn name(&self) -> &'static str {
        "frame-source"
    }
}

/// Live capture of one monitor through xcap.
///
/// # Platform notes
/// - macOS requires the Screen Recording permission for the host terminal.
/// - Windows and Linux (X11) need no extra setup; Wayland support depends on
///   the compositor.
pub struct ScreenCapture {
    index: usize,
    // xcap monitors are re-enumerated per grab so the handle never crosses
    // threads; loops ticking close together share the cached grab.
    cache: FrameCache,
}

/// Frames younger than this are handed out again instead of grabbing anew.
pub const FRAME_REUSE: Duration = Duration::from_millis(50);

/// Most recent full frame, shared by every loop until it goes stale.
pub struct FrameCache {
    max_age: Duration,
    latest: Mutex<Option<(Instant, Arc<RgbaImage>)>>,
}

impl FrameCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            latest: Mutex::new(None),
        }
    }

    /// Cached frame when fresh at `now`, otherwise the result of `grab`.
    ///
    /// Callers arriving during a grab wait for it and reuse its frame.
    pub fn get_or_grab(
        &self,
        now: Instant,
        grab: impl FnOnce() -> Result<RgbaImage, CaptureError>,
    ) -> Result<Arc<RgbaImage>, CaptureError> {
        let mut latest = self.latest.lock();
        if let Some((at, frame)) = latest.as_ref() {
            if now.saturating_duration_since(*at) < self.max_age {
                return Ok(Arc::clone(frame));
            }
        }
        let frame = Arc::new(grab()?);
        *latest = Some((Instant::now(), Arc::clone(&frame)));
        Ok(frame)
    }
}

impl ScreenCapture {
    /// Open the monitor at `index` (0 is the first monitor xcap reports).
    pub fn new(index: usize) -> Result<Self, CaptureError> {
        let monitors =
            xcap::Monitor::all().map_err(|e| CaptureError::InitFailed(Box::new(e)))?;
        if monitors.is_empty() {
            return Err(CaptureError::NoDisplays);
        }
        if index >= monitors.len() {
            return Err(CaptureError::InvalidDisplayIndex(index));
        }
        tracing::info!(
            "Screen capture attached to monitor {} of {}",
            index,
            monitors.len()
        );
        Ok(Self {
            index,
            cache: FrameCache::new(FRAME_REUSE),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of monitors currently attached.
    pub fn monitor_count() -> usize {
        xcap::Monitor::all().map(|m| m.len()).unwrap_or(0)
    }
}

impl FrameSource for ScreenCapture {
    fn capture_region(&self, region: CaptureRegion) -> Result<RgbaImage, CaptureError> {
        let frame = self.cache.get_or_grab(Instant::now(), || {
            let monitor = xcap::Monitor::all()
                .map_err(|e| CaptureError::CaptureFailed(Box::new(e)))?
                .into_iter()
                .nth(self.index)
                .ok_or(CaptureError::InvalidDisplayIndex(self.index))?;
            monitor
                .capture_image()
                .map_err(|e| CaptureError::CaptureFailed(Box::new(e)))
        })?;
        crop_rgba(&frame, region)
    }

    fn name(&self) -> &'static str {
        "screen"
    }
}

/// A fixed frame, used for replaying a screenshot and for tests.
pub struct StillFrame {
    frame: RgbaImage,
}

impl StillFrame {
    pub fn new(frame: RgbaImage) -> Self {
        Self { frame }
    }

    pub fn open(path: &std::path::Path) -> Result<Self, CaptureError> {
        let frame = image::open(path)
            .map_err(|e| CaptureError::InitFailed(Box::new(e)))?
            .to_rgba8();
        Ok(Self::new(frame))
    }
}

impl FrameSource for StillFrame {
    fn capture_region(&self, region: CaptureRegion) -> Result<RgbaImage, CaptureError> {
        crop_rgba(&self.frame, region)
    }

    fn name(&self) -> &'static str {
        "still"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_region_intersect() {
        let a = CaptureRegion::new(0, 0, 100, 50);
        let b = CaptureRegion::new(80, 40, 50, 50);
        assert_eq!(a.intersect(&b), Some(CaptureRegion::new(80, 40, 20, 10)));

        let c = CaptureRegion::new(200, 0, 10, 10);
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn test_region_clamp_negative_origin() {
        let r = CaptureRegion::from_corners(-50, -30, 200, 75);
        let clamped = r.clamp(120, 60).unwrap();
        assert_eq!(clamped, CaptureRegion::new(0, 0, 120, 60));
    }

    #[test]
    fn test_from_corners_inverted_is_empty() {
        let r = CaptureRegion::from_corners(10, 10, 5, 20);
        assert!(r.is_empty());
    }

    #[test]
    fn test_still_frame_crop() {
        let mut img = RgbaImage::from_pixel(40, 30, Rgba([0, 0, 0, 255]));
        img.put_pixel(12, 7, Rgba([255, 255, 255, 255]));
        let source = StillFrame::new(img);

        let out = source
            .capture_region(CaptureRegion::new(10, 5, 10, 10))
            .unwrap();
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(out.get_pixel(2, 2), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_frame_cache_reuses_fresh_frame() {
        let cache = FrameCache::new(Duration::from_millis(50));
        let mut grabs = 0;
        let t0 = Instant::now();

        for offset in [0, 10, 40] {
            let frame = cache
                .get_or_grab(t0 + Duration::from_millis(offset), || {
                    grabs += 1;
                    Ok(RgbaImage::new(4, 4))
                })
                .unwrap();
            assert_eq!(frame.dimensions(), (4, 4));
        }
        assert_eq!(grabs, 1);

        cache
            .get_or_grab(Instant::now() + Duration::from_millis(200), || {
                grabs += 1;
                Ok(RgbaImage::new(4, 4))
            })
            .unwrap();
        assert_eq!(grabs, 2);
    }

    #[test]
    fn test_frame_cache_keeps_nothing_on_failure() {
        let cache = FrameCache::new(Duration::from_secs(1));
        let now = Instant::now();
        assert!(cache
            .get_or_grab(now, || Err(CaptureError::NoDisplays))
            .is_err());
        let frame = cache.get_or_grab(now, || Ok(RgbaImage::new(2, 2))).unwrap();
        assert_eq!(frame.width(), 2);
    }

    #[test]
    fn test_still_frame_out_of_bounds() {
        let source = StillFrame::new(RgbaImage::new(10, 10));
        let err = source
            .capture_region(CaptureRegion::new(50, 50, 5, 5))
            .unwrap_err();
        assert!(matches!(err, CaptureError::OutOfBounds { .. }));
    }
}
