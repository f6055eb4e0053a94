//! Rotation decision engine.
//!
//! Turns gravity-sensor samples and orientation requests into a display
//! rotation for the default display.
//!
//! # Pipeline (for beginners)
//!
//! ```text
//! GravitySample ──► heading (0..359°) ──► SensorRotation bucket
//!                                              │  mounting offset,
//!                                              ▼  natural orientation
//!                                        DeviceRotation ──► display Rotation
//! ```
//!
//! The requested [`Orientation`] of the default screen then decides whether
//! the sensor's opinion is followed, held (e.g. a portrait-only request while
//! the device is held sideways), or ignored because rotation is locked.
//!
//! The engine itself never touches topology or display state; it talks to a
//! [`RotationHost`], which the service implements.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use dms_core::domain::rotation::{calc_rotation_degree, sensor_rotation_from_degree};
use dms_core::{
    DeviceRotation, DisplayId, DmError, GravitySample, NaturalOrientation, Orientation, Rotation,
    RotationMapping, ScreenMode,
};

/// Minimum spacing between two processed sensor samples.
pub const DEFAULT_CALLBACK_INTERVAL: Duration = Duration::from_millis(200);

/// What the engine needs from the rest of the service.
#[cfg_attr(test, mockall::automock)]
pub trait RotationHost {
    fn default_display(&self) -> Option<DisplayId>;

    fn display_rotation(&self, display: DisplayId) -> Option<Rotation>;

    /// Orientation requested for the screen bound to `display`.
    fn preferred_orientation(&self, display: DisplayId) -> Orientation;

    /// Unrotated active mode of the screen bound to `display`.
    fn display_mode(&self, display: DisplayId) -> Option<ScreenMode>;

    /// Applies `rotation` to the display and its screen.
    fn set_display_rotation(&self, display: DisplayId, rotation: Rotation) -> Result<bool, DmError>;
}

#[derive(Debug)]
struct EngineState {
    mapping: RotationMapping,
    /// Set once the natural orientation was read from a bound default display.
    natural_known: bool,
    locked: bool,
    rotation_locked_rotation: Rotation,
    last_sensor_decided: Rotation,
    last_orientation: Orientation,
    last_sensor_rotation: DeviceRotation,
    last_callback: Option<Instant>,
    interval: Duration,
}

/// Rotation decision engine.
pub struct ScreenRotationController {
    state: Mutex<EngineState>,
}

impl ScreenRotationController {
    pub fn new(callback_interval: Duration, start_locked: bool) -> Self {
        Self {
            state: Mutex::new(EngineState {
                mapping: RotationMapping::default(),
                natural_known: false,
                locked: start_locked,
                rotation_locked_rotation: Rotation::Rotation0,
                last_sensor_decided: Rotation::Rotation0,
                last_orientation: Orientation::Unspecified,
                last_sensor_rotation: DeviceRotation::Invalid,
                last_callback: None,
                interval: callback_interval,
            }),
        }
    }

    /// Derives the natural orientation from the default display and seeds
    /// the remembered rotations with the current one.
    pub fn init(&self, host: &dyn RotationHost) {
        let mut state = self.state.lock();
        let display = host.default_display();
        learn_natural(&mut state, host, display);
        let current = current_rotation(host, display);
        state.last_sensor_decided = current;
        state.rotation_locked_rotation = current;
        debug!(natural = ?state.mapping.natural(), ?current, "rotation engine initialised");
    }

    pub fn is_rotation_locked(&self) -> bool {
        self.state.lock().locked
    }

    /// Locks or unlocks sensor rotation.  Locking records the current
    /// rotation so restricted orientations can return to it.
    pub fn set_rotation_locked(&self, locked: bool, host: &dyn RotationHost) {
        let mut state = self.state.lock();
        if locked {
            state.rotation_locked_rotation = current_rotation(host, host.default_display());
        }
        state.locked = locked;
        info!(locked, "screen rotation lock changed");
    }

    /// Sets the mounting offset of the sensor.
    ///
    /// # Errors
    ///
    /// [`DmError::InvalidParameter`] for anything but 0, 90, 180 or 270.
    pub fn set_device_rotation_offset(&self, degrees: u32) -> Result<(), DmError> {
        self.state
            .lock()
            .mapping
            .set_offset_degrees(degrees)
            .map_err(|e| DmError::InvalidParameter(e.to_string()))
    }

    pub fn device_rotation_offset(&self) -> u32 {
        self.state.lock().mapping.offset_degrees()
    }

    /// Device pose derived from the most recent processed sample.
    pub fn last_sensor_rotation(&self) -> DeviceRotation {
        self.state.lock().last_sensor_rotation
    }

    /// Processes one gravity sample received at `now`.
    ///
    /// Returns the rotation that was applied, if any.
    pub fn handle_gravity_sample(
        &self,
        sample: &GravitySample,
        now: Instant,
        host: &dyn RotationHost,
    ) -> Option<Rotation> {
        let mut state = self.state.lock();
        if let Some(last) = state.last_callback {
            if now.saturating_duration_since(last) < state.interval {
                return None;
            }
        }
        state.last_callback = Some(now);

        let display = host.default_display();
        if !state.natural_known {
            learn_natural(&mut state, host, display);
        }
        let orientation = display.map_or(Orientation::Unspecified, |d| host.preferred_orientation(d));
        let current = current_rotation(host, display);
        let device = state
            .mapping
            .device_rotation(sensor_rotation_from_degree(calc_rotation_degree(sample)));
        state.last_sensor_rotation = device;

        if !orientation.is_sensor_related() {
            return None;
        }
        let sensor_rotation = state.mapping.display_rotation(device)?;
        if sensor_rotation == current {
            return None;
        }
        let target = target_rotation(&mut state, orientation, device, current);
        apply(host, display?, target, current)
    }

    /// Reacts to the default screen switching to `orientation`.
    ///
    /// Only the transition into a sensor-driven orientation can rotate here;
    /// fixed orientations are applied by the topology manager.  Repeating the
    /// previous orientation is a no-op.
    pub fn process_orientation_switch(
        &self,
        orientation: Orientation,
        host: &dyn RotationHost,
    ) -> Option<Rotation> {
        let mut state = self.state.lock();
        if state.last_orientation == orientation {
            return None;
        }
        state.last_orientation = orientation;
        if !orientation.is_sensor_related() {
            return None;
        }

        let display = host.default_display()?;
        if !state.natural_known {
            learn_natural(&mut state, host, Some(display));
        }
        let current = current_rotation(host, Some(display));
        let device = state.last_sensor_rotation;
        let target = match orientation {
            Orientation::AutoRestricted if state.locked => Some(state.rotation_locked_rotation),
            Orientation::AutoRestricted | Orientation::Sensor => {
                (device == DeviceRotation::Invalid).then_some(state.last_sensor_decided)
            }
            Orientation::AutoPortraitRestricted if state.locked => {
                restricted_target(&state, current, DeviceRotation::Portrait)
            }
            Orientation::AutoPortraitRestricted | Orientation::SensorVertical => {
                switch_target(&state, device, current, DeviceRotation::Portrait)
            }
            Orientation::AutoLandscapeRestricted if state.locked => {
                restricted_target(&state, current, DeviceRotation::Landscape)
            }
            Orientation::AutoLandscapeRestricted | Orientation::SensorHorizontal => {
                switch_target(&state, device, current, DeviceRotation::Landscape)
            }
            _ => None,
        };
        debug!(?orientation, ?device, ?target, "orientation switch");
        target.and_then(|target| apply(host, display, target, current))
    }
}

fn learn_natural(state: &mut EngineState, host: &dyn RotationHost, display: Option<DisplayId>) {
    if let Some(mode) = display.and_then(|d| host.display_mode(d)) {
        state
            .mapping
            .set_natural(NaturalOrientation::from_dimensions(mode.width, mode.height));
        state.natural_known = true;
    }
}

fn current_rotation(host: &dyn RotationHost, display: Option<DisplayId>) -> Rotation {
    display
        .and_then(|d| host.display_rotation(d))
        .unwrap_or(Rotation::Rotation0)
}

fn apply(host: &dyn RotationHost, display_id: DisplayId, target: Rotation, current: Rotation) -> Option<Rotation> {
    if target == current {
        return None;
    }
    match host.set_display_rotation(display_id, target) {
        Ok(_) => {
            info!(display_id = display_id.0, ?target, "display rotation set");
            Some(target)
        }
        Err(e) => {
            warn!(display_id = display_id.0, ?target, "failed to apply rotation: {e}");
            None
        }
    }
}

/// Per-sample decision for a sensor-related orientation.
fn target_rotation(
    state: &mut EngineState,
    orientation: Orientation,
    device: DeviceRotation,
    current: Rotation,
) -> Rotation {
    match orientation {
        Orientation::Sensor => follow_sensor(state, device, current),
        Orientation::SensorVertical => follow_if(state, device, current, !device.is_horizontal()),
        Orientation::SensorHorizontal => follow_if(state, device, current, !device.is_vertical()),
        Orientation::Unspecified | Orientation::AutoRestricted if state.locked => current,
        Orientation::Unspecified | Orientation::AutoRestricted => follow_sensor(state, device, current),
        Orientation::AutoPortraitRestricted if state.locked => current,
        Orientation::AutoPortraitRestricted => follow_if(state, device, current, !device.is_horizontal()),
        Orientation::AutoLandscapeRestricted if state.locked => current,
        Orientation::AutoLandscapeRestricted => follow_if(state, device, current, !device.is_vertical()),
        _ => current,
    }
}

fn follow_sensor(state: &mut EngineState, device: DeviceRotation, current: Rotation) -> Rotation {
    let rotation = state.mapping.display_rotation(device).unwrap_or(current);
    state.last_sensor_decided = rotation;
    rotation
}

fn follow_if(state: &mut EngineState, device: DeviceRotation, current: Rotation, allowed: bool) -> Rotation {
    if allowed {
        follow_sensor(state, device, current)
    } else {
        current
    }
}

/// Unlocked switch into a portrait- or landscape-only orientation.
fn switch_target(
    state: &EngineState,
    device: DeviceRotation,
    current: Rotation,
    axis: DeviceRotation,
) -> Option<Rotation> {
    let (display_matches, device_matches) = match axis {
        DeviceRotation::Portrait => (state.mapping.is_display_rotation_vertical(current), device.is_vertical()),
        _ => (state.mapping.is_display_rotation_horizontal(current), device.is_horizontal()),
    };
    if display_matches || device_matches {
        return None;
    }
    state.mapping.display_rotation(axis)
}

/// Locked switch into a portrait- or landscape-only orientation.
fn restricted_target(state: &EngineState, current: Rotation, axis: DeviceRotation) -> Option<Rotation> {
    let matches = |rotation: Rotation| match axis {
        DeviceRotation::Portrait => state.mapping.is_display_rotation_vertical(rotation),
        _ => state.mapping.is_display_rotation_horizontal(rotation),
    };
    if matches(current) {
        return None;
    }
    if matches(state.rotation_locked_rotation) {
        return Some(state.rotation_locked_rotation);
    }
    state.mapping.display_rotation(axis)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
