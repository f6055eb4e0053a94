//! Seam to the renderer backend.
//!
//! The renderer owns the real outputs: it enumerates modes, switches them,
//! composes pixels, captures frames and drives power.  The display manager
//! only *asks* it to do these things through the [`Renderer`] trait and keeps
//! its own bookkeeping in terms of stable ids.
//!
//! # Testability
//!
//! [`mock::MockRenderer`] is an in-memory renderer with scriptable screens,
//! failures and capture behaviour.  The binary uses it as a headless backend.

use thiserror::Error;

use dms_core::{
    DmError, NodeId, Rotation, RsScreenId, ScreenColorGamut, ScreenGamutMap, ScreenMode,
    ScreenPowerState,
};

pub mod mock;

/// Errors reported by a renderer backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendererError {
    /// The renderer does not know the output.
    #[error("renderer has no screen {0}")]
    UnknownScreen(RsScreenId),

    /// The renderer refused the request.
    #[error("renderer rejected request: {0}")]
    Rejected(String),

    /// The renderer service is not reachable yet.
    #[error("renderer service unavailable")]
    Unavailable,
}

impl From<RendererError> for DmError {
    fn from(err: RendererError) -> Self {
        DmError::RendererFailure(err.to_string())
    }
}

/// Hot-plug and mode events pushed by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererScreenEvent {
    Connected,
    Disconnected,
    ModeChanged,
}

/// Callback installed through [`Renderer::subscribe_screen_events`].
pub type ScreenEventCallback = Box<dyn Fn(RsScreenId, RendererScreenEvent) + Send + Sync>;

/// Completion callback of a capture; `None` means the capture failed.
pub type CaptureCallback = Box<dyn FnOnce(Option<PixelBuffer>) + Send>;

/// Captured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixels.
    pub data: Vec<u8>,
}

/// Parameters for a renderer-side virtual output.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualScreenRequest {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Consumer surface the virtual output renders into.
    pub surface: Option<u64>,
    /// Output whose content should be mirrored from the start.
    pub mirror_of: Option<RsScreenId>,
    pub flags: u32,
}

/// Capabilities the display manager requests of the renderer backend.
pub trait Renderer: Send + Sync {
    /// Installs the hot-plug callback.  May fail while the backend is still
    /// starting; the caller retries.
    fn subscribe_screen_events(&self, callback: ScreenEventCallback) -> Result<(), RendererError>;

    /// Renderer id of the default (primary) output.
    fn default_screen_id(&self) -> Option<RsScreenId>;

    fn supported_modes(&self, id: RsScreenId) -> Vec<ScreenMode>;

    fn active_mode_index(&self, id: RsScreenId) -> Option<usize>;

    fn set_active_mode(&self, id: RsScreenId, mode_idx: usize) -> Result<(), RendererError>;

    fn create_virtual_screen(&self, request: &VirtualScreenRequest) -> Result<RsScreenId, RendererError>;

    fn remove_virtual_screen(&self, id: RsScreenId);

    /// Creates a node that mirrors `source` onto `target`.
    fn create_mirror_node(&self, target: RsScreenId, source: RsScreenId) -> Result<NodeId, RendererError>;

    fn remove_mirror_node(&self, node: NodeId);

    /// Starts an asynchronous capture of the output.  `callback` is invoked
    /// exactly once, possibly on another thread, possibly never if the
    /// backend stalls.
    fn take_surface_capture(&self, id: RsScreenId, callback: CaptureCallback) -> Result<(), RendererError>;

    fn request_rotation(&self, id: RsScreenId, rotation: Rotation) -> Result<(), RendererError>;

    fn screen_power(&self, id: RsScreenId) -> Result<ScreenPowerState, RendererError>;

    fn set_screen_power(&self, id: RsScreenId, state: ScreenPowerState) -> Result<(), RendererError>;

    fn screen_brightness(&self, id: RsScreenId) -> Result<u32, RendererError>;

    fn set_screen_brightness(&self, id: RsScreenId, level: u32) -> Result<(), RendererError>;

    fn supported_color_gamuts(&self, id: RsScreenId) -> Result<Vec<ScreenColorGamut>, RendererError>;

    fn color_gamut(&self, id: RsScreenId) -> Result<ScreenColorGamut, RendererError>;

    /// Selects the gamut at `gamut_idx` of [`Renderer::supported_color_gamuts`].
    fn set_color_gamut(&self, id: RsScreenId, gamut_idx: usize) -> Result<(), RendererError>;

    fn gamut_map(&self, id: RsScreenId) -> Result<ScreenGamutMap, RendererError>;

    fn set_gamut_map(&self, id: RsScreenId, map: ScreenGamutMap) -> Result<(), RendererError>;

    /// Re-applies the current color transform on the output.
    fn set_color_transform(&self, id: RsScreenId) -> Result<(), RendererError>;
}
