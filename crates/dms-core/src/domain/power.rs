//! Power and color capabilities requested of the renderer.
//!
//! The display manager does not compute anything with these values; it only
//! validates ids and forwards requests.  They live in the domain crate so that
//! notifications and the renderer seam share one vocabulary.

use serde::{Deserialize, Serialize};

/// Power state of the whole display pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayState {
    #[default]
    Unknown,
    On,
    Off,
}

/// Power state of one output as understood by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenPowerState {
    On,
    Standby,
    Suspend,
    Off,
}

/// Power transition broadcast to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayPowerEvent {
    WakeUp,
    Sleep,
    DisplayOn,
    DisplayOff,
    DesktopReady,
}

/// Phase of a power transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    Begin,
    End,
}

/// Color gamut an output can be driven in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenColorGamut {
    Native,
    StandardBt601,
    StandardBt709,
    DciP3,
    Srgb,
    AdobeRgb,
    DisplayP3,
    Bt2020,
    Bt2100Pq,
    Bt2100Hlg,
    DisplayBt2020,
}

/// Strategy for mapping content gamut onto the output gamut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenGamutMap {
    Constant,
    Extension,
    Hdr,
    HdrExtension,
}
