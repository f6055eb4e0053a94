//! Per-display cutout bookkeeping.
//!
//! Notch rectangles are registered per display in the panel's natural frame.
//! [`DisplayCutoutController::cutout_info`] turns them into the display's
//! current frame; waterfall edges are only reported for the default display,
//! the one backed by the curved built-in panel.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use dms_core::{CurvedBoundary, CutoutInfo, DisplayId, Rect, Rotation, ScreenMode};

use crate::infrastructure::storage::config::CutoutConfig;

/// Display the configured built-in cutout belongs to.
pub const BUILTIN_DISPLAY: DisplayId = DisplayId(0);

struct CutoutState {
    rects: HashMap<DisplayId, Vec<Rect>>,
    waterfall_display: bool,
    boundary: CurvedBoundary,
    compression_when_horizontal: bool,
    compression_size: u32,
}

pub struct DisplayCutoutController {
    state: Mutex<CutoutState>,
}

impl DisplayCutoutController {
    pub fn new(config: &CutoutConfig) -> Self {
        let mut rects = HashMap::new();
        if !config.builtin_rects.is_empty() {
            rects.insert(BUILTIN_DISPLAY, config.builtin_rects.clone());
        }
        let waterfall_display = config.waterfall_display;
        Self {
            state: Mutex::new(CutoutState {
                rects,
                waterfall_display,
                boundary: CurvedBoundary::from_sides(&config.curved_screen_boundary),
                compression_when_horizontal: waterfall_display
                    && config.waterfall_compression_when_horizontal,
                compression_size: config.waterfall_compression_size,
            }),
        }
    }

    /// Replaces the notch rectangles of `display`.  An empty list clears them.
    pub fn set_cutout_rects(&self, display: DisplayId, rects: Vec<Rect>) {
        let mut state = self.state.lock();
        let display_id = display.0;
        info!(display_id, count = rects.len(), "cutout rects updated");
        if rects.is_empty() {
            state.rects.remove(&display);
        } else {
            state.rects.insert(display, rects);
        }
    }

    pub fn set_builtin_cutout(&self, rects: Vec<Rect>) {
        self.set_cutout_rects(BUILTIN_DISPLAY, rects);
    }

    pub fn set_waterfall_display(&self, waterfall: bool) {
        let mut state = self.state.lock();
        state.waterfall_display = waterfall;
        if !waterfall {
            state.compression_when_horizontal = false;
        }
    }

    pub fn is_waterfall_display(&self) -> bool {
        self.state.lock().waterfall_display
    }

    /// Sets the curved strip widths as `[left, top, right, bottom]`.
    pub fn set_curved_screen_boundary(&self, sides: &[u32]) {
        self.state.lock().boundary = CurvedBoundary::from_sides(sides);
    }

    /// Compression only takes effect on a waterfall display.
    pub fn set_waterfall_compression_when_horizontal(&self, enabled: bool) {
        let mut state = self.state.lock();
        state.compression_when_horizontal = state.waterfall_display && enabled;
    }

    pub fn is_waterfall_compression_enabled_when_horizontal(&self) -> bool {
        self.state.lock().compression_when_horizontal
    }

    pub fn set_waterfall_compression_size(&self, size: u32) {
        self.state.lock().compression_size = size;
    }

    /// Compression size in pixels, or `0` while compression is off.
    pub fn waterfall_compression_size_when_horizontal(&self) -> u32 {
        let state = self.state.lock();
        if state.compression_when_horizontal {
            state.compression_size
        } else {
            0
        }
    }

    /// Cutout of `display` in its current frame.
    ///
    /// `mode` is the unrotated active mode of the screen behind the display.
    /// Rectangles that do not fit it are dropped.
    pub fn cutout_info(
        &self,
        display: DisplayId,
        rotation: Rotation,
        mode: ScreenMode,
        is_default: bool,
    ) -> CutoutInfo {
        let state = self.state.lock();
        let (width, height) = (mode.width, mode.height);
        let bounding_rects = state
            .rects
            .get(&display)
            .map(|rects| {
                rects
                    .iter()
                    .filter(|rect| {
                        let fits = rect.fits_within(width, height);
                        if !fits {
                            let display_id = display.0;
                            warn!(display_id, ?rect, width, height, "cutout rect outside the panel");
                        }
                        fits
                    })
                    .map(|rect| rect.rotated(rotation, width, height))
                    .collect()
            })
            .unwrap_or_default();
        let waterfall = if is_default && state.waterfall_display {
            state.boundary.areas(rotation, width, height)
        } else {
            Default::default()
        };
        let display_id = display.0;
        debug!(display_id, ?rotation, rects = ?bounding_rects, "cutout info");
        CutoutInfo {
            bounding_rects,
            waterfall,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
