//! # dms-core
//!
//! Domain model of the display manager service: screens, screen groups,
//! logical displays, the renderer-id translation table and the pure rotation
//! math.
//!
//! This crate is used by the service crate (`dms-server`) and by anything that
//! wants to interpret the snapshots the service publishes.  It has zero
//! dependencies on renderer backends, threads or I/O.
//!
//! # Architecture overview (for beginners)
//!
//! A device can have several outputs: the built-in panel, an HDMI monitor, a
//! virtual screen used for casting.  The display manager keeps three layers of
//! bookkeeping on top of them:
//!
//! - **Screens** – one per renderer output, identified by a stable
//!   [`ScreenId`] that the service hands out (see [`domain::id_table`]).
//!
//! - **Screen groups** – screens that share content, either mirroring one
//!   source or tiling one large desktop.
//!
//! - **Displays** – the logical surfaces applications draw into.  Each display
//!   is bound to one screen and follows its size and rotation.
//!
//! The [`domain::rotation`] module turns gravity-sensor readings into display
//! rotations.

pub mod domain;
pub mod error;

// Re-export the most-used types at the crate root so callers can write
// `dms_core::ScreenId` instead of `dms_core::domain::ids::ScreenId`.
pub use domain::cutout::{CurvedBoundary, CutoutInfo, Rect, WaterfallAreas};
pub use domain::display::{Display, DisplayInfo, FreezeFlag};
pub use domain::events::{
    DisplayChangeEvent, DisplayStateChangeType, ScreenChangeEvent, ScreenGroupChangeEvent,
};
pub use domain::id_table::ScreenIdTable;
pub use domain::ids::{AgentId, DisplayId, NodeId, RsScreenId, ScreenId};
pub use domain::orientation::{DeviceRotation, Orientation, Rotation, SensorRotation};
pub use domain::power::{
    DisplayPowerEvent, DisplayState, EventStatus, ScreenColorGamut, ScreenGamutMap,
    ScreenPowerState,
};
pub use domain::rotation::{GravitySample, NaturalOrientation, RotationMapping};
pub use domain::screen::{
    GroupChild, Point, Screen, ScreenCombination, ScreenGroup, ScreenGroupInfo, ScreenInfo,
    ScreenMode, ScreenSourceMode, ScreenType,
};
pub use error::DmError;
