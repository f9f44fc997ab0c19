//! Pure calculation functions for resize geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{Fit, MAX_DIMENSION, MAX_PIXELS};

/// What the engine has to do to satisfy a `resize` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// Scale to exactly these dimensions.
    Exact { width: u32, height: u32 },
    /// Scale to cover the box, then center-crop to it.
    Crop { width: u32, height: u32 },
    /// Scale to `inner`, then center it on a transparent `canvas`.
    Pad { inner: (u32, u32), canvas: (u32, u32) },
}

impl ResizePlan {
    /// Largest image the plan allocates for a source of `source` dimensions.
    ///
    /// A crop first scales to cover the box, which can exceed it on one side.
    pub fn peak_size(&self, source: (u32, u32)) -> (u32, u32) {
        match *self {
            Self::Exact { width, height } => (width, height),
            Self::Crop { width, height } => fit_outside(source, (width, height)),
            Self::Pad { canvas, .. } => canvas,
        }
    }
}

/// Whether an image of `size` stays within [`MAX_DIMENSION`] per side and
/// [`MAX_PIXELS`] overall.
pub fn within_limits(size: (u32, u32)) -> bool {
    size.0 <= MAX_DIMENSION
        && size.1 <= MAX_DIMENSION
        && u64::from(size.0) * u64::from(size.1) <= MAX_PIXELS
}

/// Scale `value` by `num / den`, rounding, never below one pixel.
fn scale(value: u32, num: u32, den: u32) -> u32 {
    ((value as f64 * num as f64 / den as f64).round() as u32).max(1)
}

/// Dimensions that fit entirely inside `target`, preserving the source aspect ratio.
///
/// # Examples
/// ```
/// # use deferred_images::imaging::calculations::fit_inside;
/// assert_eq!(fit_inside((400, 200), (100, 100)), (100, 50));
/// ```
pub fn fit_inside(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: width matches, height shrinks
        (tgt_w, scale(tgt_w, src_h, src_w))
    } else {
        (scale(tgt_h, src_w, src_h), tgt_h)
    }
}

/// Dimensions that completely cover `target`, preserving the source aspect ratio.
///
/// One dimension matches exactly, the other may exceed.
pub fn fit_outside(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height matches, width exceeds
        (scale(tgt_h, src_w, src_h), tgt_h)
    } else {
        (tgt_w, scale(tgt_w, src_h, src_w))
    }
}

/// Top-left offset that centers `inner` on `outer`.
pub fn center_offset(outer: (u32, u32), inner: (u32, u32)) -> (u32, u32) {
    (
        outer.0.saturating_sub(inner.0) / 2,
        outer.1.saturating_sub(inner.1) / 2,
    )
}

/// Work out the resize for a source of `source` dimensions.
///
/// A single dimension scales the other to preserve aspect ratio, whatever the
/// fit. Returns `None` when neither dimension is given or the source is empty.
pub fn plan_resize(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    fit: Fit,
) -> Option<ResizePlan> {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return None;
    }
    let plan = match (width, height) {
        (None, None) => return None,
        (Some(w), None) => ResizePlan::Exact {
            width: w,
            height: scale(w, src_h, src_w),
        },
        (None, Some(h)) => ResizePlan::Exact {
            width: scale(h, src_w, src_h),
            height: h,
        },
        (Some(w), Some(h)) => match fit {
            Fit::Cover => ResizePlan::Crop {
                width: w,
                height: h,
            },
            Fit::Fill => ResizePlan::Exact {
                width: w,
                height: h,
            },
            Fit::Inside => {
                let (width, height) = fit_inside(source, (w, h));
                ResizePlan::Exact { width, height }
            }
            Fit::Outside => {
                let (width, height) = fit_outside(source, (w, h));
                ResizePlan::Exact { width, height }
            }
            Fit::Contain => ResizePlan::Pad {
                inner: fit_inside(source, (w, h)),
                canvas: (w, h),
            },
        },
    };
    Some(plan)
}
