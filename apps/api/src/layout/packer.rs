//! Rectangle packing across an unbounded run of equally sized pages.
//!
//! The page-fit loop only talks to [`RectanglePacker`]. The default
//! implementation keeps one `guillotiere` atlas per page: rectangles are
//! sorted by area, each goes to the first page whose atlas can allocate it,
//! and a new page opens whenever none can. Rectangles are never rotated.

use guillotiere::{size2, AtlasAllocator};
use tracing::warn;

/// Coordinate convention of a packer's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// y grows downward from the top edge.
    TopLeft,
    /// y grows upward from the bottom edge.
    BottomLeft,
}

/// A rectangle to place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackRequest {
    pub id: usize,
    pub width: f32,
    pub height: f32,
}

/// A placed rectangle in page-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackedRect {
    pub id: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Assigns every rectangle a page and a position on it.
///
/// Returns one `Vec` per page. Implementations must be deterministic for the
/// page-fit loop to be.
pub trait RectanglePacker: Send + Sync {
    fn origin(&self) -> Origin {
        Origin::TopLeft
    }

    fn pack(&self, rects: &[PackRequest], page_width: f32, page_height: f32) -> Vec<Vec<PackedRect>>;
}

/// Allocator units per point; the allocator works on integer sizes.
const UNITS_PER_PT: f32 = 100.0;

fn to_units(pt: f32) -> i32 {
    ((pt * UNITS_PER_PT).ceil() as i32).max(1)
}

/// One page backed by a guillotine atlas allocator.
struct PageBin {
    atlas: AtlasAllocator,
    placed: Vec<PackedRect>,
}

impl PageBin {
    fn new(width: f32, height: f32) -> Self {
        Self {
            atlas: AtlasAllocator::new(size2(to_units(width), to_units(height))),
            placed: Vec::new(),
        }
    }

    fn try_place(&mut self, req: &PackRequest) -> bool {
        let Some(allocation) = self
            .atlas
            .allocate(size2(to_units(req.width), to_units(req.height)))
        else {
            return false;
        };
        let origin = allocation.rectangle.min;
        self.placed.push(PackedRect {
            id: req.id,
            x: origin.x as f32 / UNITS_PER_PT,
            y: origin.y as f32 / UNITS_PER_PT,
            width: req.width,
            height: req.height,
        });
        true
    }
}

/// Offline guillotine packer, largest area first.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuillotinePacker;

impl RectanglePacker for GuillotinePacker {
    fn pack(&self, rects: &[PackRequest], page_width: f32, page_height: f32) -> Vec<Vec<PackedRect>> {
        let mut order: Vec<&PackRequest> = rects.iter().collect();
        order.sort_by(|a, b| {
            let (area_a, area_b) = (a.width * a.height, b.width * b.height);
            area_b.total_cmp(&area_a).then(a.id.cmp(&b.id))
        });

        let mut bins: Vec<PageBin> = Vec::new();
        for req in order {
            if bins.iter_mut().any(|bin| bin.try_place(req)) {
                continue;
            }
            let mut bin = PageBin::new(page_width, page_height);
            if bin.try_place(req) {
                bins.push(bin);
            } else {
                warn!(
                    id = req.id,
                    width = req.width,
                    height = req.height,
                    "Rectangle larger than an empty page; left unplaced"
                );
            }
        }

        bins.into_iter().map(|b| b.placed).collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
