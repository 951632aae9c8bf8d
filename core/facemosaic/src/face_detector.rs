/// Axis-aligned rectangle of a detected face, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// X coordinate of the top-left corner (pixels).
    pub x: u32,
    /// Y coordinate of the top-left corner (pixels).
    pub y: u32,
    /// Width of the rectangle (pixels).
    pub width: u32,
    /// Height of the rectangle (pixels).
    pub height: u32,
}

impl Region {
    /// Create a region from its top-left corner and size.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersect this region with a `width` × `height` grid.
    ///
    /// Returns `None` when the region lies entirely outside the grid or is empty.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Region::new(self.x, self.y, w, h))
    }

    /// Build a region from signed detector coordinates, clipped to the grid.
    ///
    /// Detectors may report boxes that start left of or above the image.
    pub fn from_signed(
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        bounds: (u32, u32),
    ) -> Option<Region> {
        let (left, top) = (i64::from(x), i64::from(y));
        let right = (left + i64::from(width)).min(i64::from(bounds.0));
        let bottom = (top + i64::from(height)).min(i64::from(bounds.1));
        let (left, top) = (left.max(0), top.max(0));
        if right <= left || bottom <= top {
            return None;
        }
        Some(Region::new(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }

    /// Whether this region lies fully inside a `width` × `height` grid.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.width) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(height)
    }
}

/// Pluggable face detection backend.
///
/// Implement this trait to provide a custom face locator and pass it to
/// [`crate::MosaicPipeline::new`]. Implementations are shared across threads,
/// so `detect` takes `&self` and must not need exclusive access to the model.
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a row-major grayscale buffer of `width` × `height` bytes.
    ///
    /// Every returned region must lie within the buffer bounds. The order must
    /// be stable for a given input.
    fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<Region>;
}
