//! Rotation and orientation vocabulary shared by screens, displays and the
//! rotation decision engine.
//!
//! # Rotation vs. orientation (for beginners)
//!
//! A **rotation** is a fact: the picture on a display is turned by 0, 90, 180
//! or 270 degrees.  An **orientation** is a wish expressed by an application:
//! "keep me upright", "follow the sensor", "landscape only, but let the user
//! lock it".  The rotation engine turns wishes plus gravity-sensor readings
//! into facts.
//!
//! Two more rotation-like types describe the physical device:
//!
//! - [`SensorRotation`] – what the gravity sensor says, bucketed to quarter
//!   turns (or `Invalid` when the reading is ambiguous, e.g. lying flat).
//! - [`DeviceRotation`] – the sensor reading corrected for how the panel is
//!   mounted, expressed as portrait/landscape and their inverses.

use serde::{Deserialize, Serialize};

/// Clockwise rotation of a screen or display, in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl Rotation {
    /// Rotation expressed in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Rotation0 => 0,
            Rotation::Rotation90 => 90,
            Rotation::Rotation180 => 180,
            Rotation::Rotation270 => 270,
        }
    }

    /// Parses a multiple of 90 degrees; anything else is `None`.
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Rotation0),
            90 => Some(Rotation::Rotation90),
            180 => Some(Rotation::Rotation180),
            270 => Some(Rotation::Rotation270),
            _ => None,
        }
    }

    /// `true` for 0° and 180°, the rotations that keep the panel's native axes.
    pub fn is_vertical(self) -> bool {
        matches!(self, Rotation::Rotation0 | Rotation::Rotation180)
    }
}

/// Orientation requested by an application for a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Unspecified,
    Vertical,
    Horizontal,
    ReverseVertical,
    ReverseHorizontal,
    Sensor,
    SensorVertical,
    SensorHorizontal,
    AutoRestricted,
    AutoPortraitRestricted,
    AutoLandscapeRestricted,
    Locked,
}

impl Orientation {
    /// `true` when the orientation consumes gravity-sensor samples.
    ///
    /// The fixed orientations (`Unspecified` through `ReverseHorizontal`) and
    /// `Locked` never do.
    pub fn is_sensor_related(self) -> bool {
        !matches!(
            self,
            Orientation::Unspecified
                | Orientation::Vertical
                | Orientation::Horizontal
                | Orientation::ReverseVertical
                | Orientation::ReverseHorizontal
                | Orientation::Locked
        )
    }
}

/// Gravity-sensor reading bucketed to a quarter turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SensorRotation {
    #[default]
    Invalid,
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl SensorRotation {
    /// Quarter-turn index 0..=3, or `None` for `Invalid`.
    pub fn quarter_turns(self) -> Option<u32> {
        match self {
            SensorRotation::Invalid => None,
            SensorRotation::Rotation0 => Some(0),
            SensorRotation::Rotation90 => Some(1),
            SensorRotation::Rotation180 => Some(2),
            SensorRotation::Rotation270 => Some(3),
        }
    }
}

/// Physical pose of the device relative to how its panel is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceRotation {
    #[default]
    Invalid,
    Portrait,
    Landscape,
    PortraitInverted,
    LandscapeInverted,
}

impl DeviceRotation {
    pub(crate) fn from_index(index: u32) -> Self {
        match index {
            0 => DeviceRotation::Portrait,
            1 => DeviceRotation::Landscape,
            2 => DeviceRotation::PortraitInverted,
            3 => DeviceRotation::LandscapeInverted,
            _ => DeviceRotation::Invalid,
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, DeviceRotation::Portrait | DeviceRotation::PortraitInverted)
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, DeviceRotation::Landscape | DeviceRotation::LandscapeInverted)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
