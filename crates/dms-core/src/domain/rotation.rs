//! Pure rotation math: gravity vector → heading → sensor bucket → device pose
//! → display rotation.
//!
//! Everything here is stateless and allocation-free so that it can run on
//! every sensor sample.  The stateful decision logic (throttling, rotation
//! lock, orientation policy) lives in the service crate's rotation
//! controller.
//!
//! # How a gravity vector becomes a heading (for beginners)
//!
//! The sensor reports the gravity vector `(x, y, z)` in device coordinates.
//! When the device is held upright, gravity points "down" the `y` axis; when
//! it lies flat on a table, gravity points along `z` and the in-plane
//! components `x`/`y` are tiny.  The heading is the angle of the in-plane
//! component, and a reading is rejected when the device is too close to flat
//! to tell which edge is "down".

use serde::{Deserialize, Serialize};

use super::orientation::{DeviceRotation, Rotation, SensorRotation};

/// One gravity-sensor sample in device coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GravitySample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl GravitySample {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Converts a gravity sample to a heading in `0..360` degrees.
///
/// Returns `None` when `3·(x² + y²) < z²`, i.e. the device lies too flat for
/// the in-plane component to be meaningful.
pub fn calc_rotation_degree(sample: &GravitySample) -> Option<u32> {
    let GravitySample { x, y, z } = *sample;
    if (x * x + y * y) * 3.0 < z * z {
        return None;
    }
    let angle = (y.atan2(-x) / std::f32::consts::PI * 180.0).round() as i32;
    Some((90 - angle).rem_euclid(360) as u32)
}

/// Buckets a heading into a quarter turn.
///
/// Headings in the 30° gaps between buckets are ambiguous and yield
/// [`SensorRotation::Invalid`].
pub fn sensor_rotation_from_degree(degree: Option<u32>) -> SensorRotation {
    match degree {
        Some(d) if d <= 30 || (330..360).contains(&d) => SensorRotation::Rotation0,
        Some(d) if (60..=120).contains(&d) => SensorRotation::Rotation90,
        Some(d) if (150..=210).contains(&d) => SensorRotation::Rotation180,
        Some(d) if (240..=300).contains(&d) => SensorRotation::Rotation270,
        _ => SensorRotation::Invalid,
    }
}

/// Natural (rotation 0) orientation of the default display's panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NaturalOrientation {
    #[default]
    Portrait,
    Landscape,
}

impl NaturalOrientation {
    /// Derives the natural orientation from the active mode dimensions.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width < height {
            NaturalOrientation::Portrait
        } else {
            NaturalOrientation::Landscape
        }
    }
}

/// Error returned for a device rotation offset that is not a quarter turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("device rotation offset must be 0, 90, 180 or 270, got {0}")]
pub struct InvalidOffset(pub u32);

/// Maps sensor buckets to device poses and device poses to display rotations
/// for one panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotationMapping {
    natural: NaturalOrientation,
    offset_turns: u32,
}

impl RotationMapping {
    pub fn new(natural: NaturalOrientation) -> Self {
        Self { natural, offset_turns: 0 }
    }

    pub fn natural(&self) -> NaturalOrientation {
        self.natural
    }

    pub fn set_natural(&mut self, natural: NaturalOrientation) {
        self.natural = natural;
    }

    /// Mounting offset of the sensor relative to the panel, in degrees.
    pub fn offset_degrees(&self) -> u32 {
        self.offset_turns * 90
    }

    /// Sets the mounting offset; only quarter turns are accepted.
    pub fn set_offset_degrees(&mut self, degrees: u32) -> Result<(), InvalidOffset> {
        match Rotation::from_degrees(degrees) {
            Some(_) => {
                self.offset_turns = degrees / 90;
                Ok(())
            }
            None => Err(InvalidOffset(degrees)),
        }
    }

    /// Corrects a sensor bucket for the mounting offset and the panel's
    /// natural orientation.
    pub fn device_rotation(&self, sensor: SensorRotation) -> DeviceRotation {
        let Some(turns) = sensor.quarter_turns() else {
            return DeviceRotation::Invalid;
        };
        let mut value = (turns + 4 - self.offset_turns) % 4;
        if self.natural == NaturalOrientation::Landscape {
            value += 1;
            if value % 2 == 0 {
                value -= 2;
            }
        }
        DeviceRotation::from_index(value)
    }

    /// Display rotation that presents content upright for a device pose.
    pub fn display_rotation(&self, device: DeviceRotation) -> Option<Rotation> {
        let rotation = match (self.natural, device) {
            (_, DeviceRotation::Invalid) => return None,
            (NaturalOrientation::Portrait, DeviceRotation::Portrait) => Rotation::Rotation0,
            (NaturalOrientation::Portrait, DeviceRotation::Landscape) => Rotation::Rotation90,
            (NaturalOrientation::Portrait, DeviceRotation::PortraitInverted) => Rotation::Rotation180,
            (NaturalOrientation::Portrait, DeviceRotation::LandscapeInverted) => Rotation::Rotation270,
            (NaturalOrientation::Landscape, DeviceRotation::Portrait) => Rotation::Rotation90,
            (NaturalOrientation::Landscape, DeviceRotation::Landscape) => Rotation::Rotation0,
            (NaturalOrientation::Landscape, DeviceRotation::PortraitInverted) => Rotation::Rotation270,
            (NaturalOrientation::Landscape, DeviceRotation::LandscapeInverted) => Rotation::Rotation180,
        };
        Some(rotation)
    }

    /// Display rotation for a device pose that is known to be valid.
    pub fn display_rotation_or_default(&self, device: DeviceRotation) -> Rotation {
        self.display_rotation(device).unwrap_or_default()
    }

    /// `true` when `rotation` presents the content in portrait.
    pub fn is_display_rotation_vertical(&self, rotation: Rotation) -> bool {
        rotation == self.display_rotation_or_default(DeviceRotation::Portrait)
            || rotation == self.display_rotation_or_default(DeviceRotation::PortraitInverted)
    }

    /// `true` when `rotation` presents the content in landscape.
    pub fn is_display_rotation_horizontal(&self, rotation: Rotation) -> bool {
        rotation == self.display_rotation_or_default(DeviceRotation::Landscape)
            || rotation == self.display_rotation_or_default(DeviceRotation::LandscapeInverted)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const G: f32 = 9.8;

    #[test]
    fn test_upright_device_reads_zero_degrees() {
        // Arrange: gravity straight down the y axis
        let sample = GravitySample::new(0.0, G, 0.0);

        // Act
        let degree = calc_rotation_degree(&sample);

        // Assert
        assert_eq!(degree, Some(0));
    }

    #[test]
    fn test_device_on_its_side_reads_quarter_turns() {
        assert_eq!(calc_rotation_degree(&GravitySample::new(-G, 0.0, 0.0)), Some(90));
        assert_eq!(calc_rotation_degree(&GravitySample::new(0.0, -G, 0.0)), Some(180));
        assert_eq!(calc_rotation_degree(&GravitySample::new(G, 0.0, 0.0)), Some(270));
    }

    #[test]
    fn test_flat_device_is_rejected() {
        let sample = GravitySample::new(0.5, 0.5, G);
        assert_eq!(calc_rotation_degree(&sample), None);
    }

    #[test]
    fn test_bucket_boundaries_are_inclusive() {
        assert_eq!(sensor_rotation_from_degree(Some(0)), SensorRotation::Rotation0);
        assert_eq!(sensor_rotation_from_degree(Some(30)), SensorRotation::Rotation0);
        assert_eq!(sensor_rotation_from_degree(Some(330)), SensorRotation::Rotation0);
        assert_eq!(sensor_rotation_from_degree(Some(359)), SensorRotation::Rotation0);
        assert_eq!(sensor_rotation_from_degree(Some(60)), SensorRotation::Rotation90);
        assert_eq!(sensor_rotation_from_degree(Some(120)), SensorRotation::Rotation90);
        assert_eq!(sensor_rotation_from_degree(Some(150)), SensorRotation::Rotation180);
        assert_eq!(sensor_rotation_from_degree(Some(210)), SensorRotation::Rotation180);
        assert_eq!(sensor_rotation_from_degree(Some(240)), SensorRotation::Rotation270);
        assert_eq!(sensor_rotation_from_degree(Some(300)), SensorRotation::Rotation270);
    }

    #[test]
    fn test_gap_headings_are_invalid() {
        for degree in [31, 45, 59, 121, 149, 211, 239, 301, 329] {
            assert_eq!(
                sensor_rotation_from_degree(Some(degree)),
                SensorRotation::Invalid,
                "heading {degree} must be ambiguous"
            );
        }
        assert_eq!(sensor_rotation_from_degree(None), SensorRotation::Invalid);
    }

    #[test]
    fn test_portrait_panel_maps_sensor_straight_to_device() {
        let mapping = RotationMapping::new(NaturalOrientation::Portrait);

        assert_eq!(mapping.device_rotation(SensorRotation::Rotation0), DeviceRotation::Portrait);
        assert_eq!(mapping.device_rotation(SensorRotation::Rotation90), DeviceRotation::Landscape);
        assert_eq!(
            mapping.device_rotation(SensorRotation::Rotation180),
            DeviceRotation::PortraitInverted
        );
        assert_eq!(
            mapping.device_rotation(SensorRotation::Rotation270),
            DeviceRotation::LandscapeInverted
        );
        assert_eq!(mapping.device_rotation(SensorRotation::Invalid), DeviceRotation::Invalid);
    }

    #[test]
    fn test_landscape_panel_shifts_device_rotation() {
        let mapping = RotationMapping::new(NaturalOrientation::Landscape);

        assert_eq!(mapping.device_rotation(SensorRotation::Rotation0), DeviceRotation::Landscape);
        assert_eq!(mapping.device_rotation(SensorRotation::Rotation90), DeviceRotation::Portrait);
        assert_eq!(
            mapping.device_rotation(SensorRotation::Rotation180),
            DeviceRotation::LandscapeInverted
        );
        assert_eq!(
            mapping.device_rotation(SensorRotation::Rotation270),
            DeviceRotation::PortraitInverted
        );
    }

    #[test]
    fn test_landscape_panel_sensor_zero_maps_to_display_zero() {
        let mapping = RotationMapping::new(NaturalOrientation::Landscape);
        let device = mapping.device_rotation(SensorRotation::Rotation0);
        assert_eq!(mapping.display_rotation(device), Some(Rotation::Rotation0));
    }

    #[test]
    fn test_offset_is_subtracted_modulo_four() {
        // Arrange
        let mut mapping = RotationMapping::new(NaturalOrientation::Portrait);
        mapping.set_offset_degrees(90).expect("quarter turn accepted");

        // Act / Assert
        assert_eq!(mapping.device_rotation(SensorRotation::Rotation90), DeviceRotation::Portrait);
        assert_eq!(
            mapping.device_rotation(SensorRotation::Rotation0),
            DeviceRotation::LandscapeInverted
        );
    }

    #[test]
    fn test_offset_rejects_non_quarter_turns() {
        let mut mapping = RotationMapping::new(NaturalOrientation::Portrait);

        assert_eq!(mapping.set_offset_degrees(45), Err(InvalidOffset(45)));
        assert_eq!(mapping.offset_degrees(), 0);
    }

    #[test]
    fn test_display_rotation_verticality_follows_panel() {
        let portrait = RotationMapping::new(NaturalOrientation::Portrait);
        let landscape = RotationMapping::new(NaturalOrientation::Landscape);

        assert!(portrait.is_display_rotation_vertical(Rotation::Rotation0));
        assert!(portrait.is_display_rotation_horizontal(Rotation::Rotation90));
        assert!(landscape.is_display_rotation_vertical(Rotation::Rotation90));
        assert!(landscape.is_display_rotation_horizontal(Rotation::Rotation0));
    }

    #[test]
    fn test_natural_orientation_from_dimensions() {
        assert_eq!(NaturalOrientation::from_dimensions(1080, 1920), NaturalOrientation::Portrait);
        assert_eq!(NaturalOrientation::from_dimensions(1920, 1080), NaturalOrientation::Landscape);
    }
}
