use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Pixel dimensions as enumerated by the camera hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height. `None` for degenerate sizes.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(self.width as f64 / self.height as f64)
        }
    }

    /// Swap the axes, e.g. to express a portrait surface in landscape terms
    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

/// Select the candidate whose aspect ratio is closest to the requested surface.
///
/// Hardware enumerates sizes in landscape terms, so a portrait request has its
/// width and height swapped before the comparison. Ties keep the first minimal
/// candidate in list order. Returns `None` when nothing can be configured.
pub fn best_preview_size(
    candidates: &[Size],
    requested_width: u32,
    requested_height: u32,
    portrait: bool,
) -> Option<Size> {
    let requested = if portrait {
        Size::new(requested_height, requested_width)
    } else {
        Size::new(requested_width, requested_height)
    };

    let target = requested.aspect_ratio()?;
    nearest_aspect_ratio(candidates, target)
}

/// Select the picture size for an already chosen preview size.
///
/// An exact match wins outright; otherwise the nearest aspect ratio is used.
pub fn best_picture_size(candidates: &[Size], preview: Size) -> Option<Size> {
    if let Some(exact) = candidates.iter().find(|size| **size == preview) {
        return Some(*exact);
    }

    let target = preview.aspect_ratio()?;
    nearest_aspect_ratio(candidates, target)
}

fn nearest_aspect_ratio(candidates: &[Size], target: f64) -> Option<Size> {
    let mut best: Option<(Size, f64)> = None;

    for candidate in candidates {
        let Some(ratio) = candidate.aspect_ratio() else {
            continue;
        };

        let delta = (target - ratio).abs();
        trace!("Candidate {} ratio {:.3} delta {:.3}", candidate, ratio, delta);

        // strict comparison keeps the first minimal candidate
        if best.map_or(true, |(_, best_delta)| delta < best_delta) {
            best = Some((*candidate, delta));
        }
    }

    best.map(|(size, _)| size)
}
