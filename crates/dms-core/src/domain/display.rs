//! Logical displays.
//!
//! A [`Display`] is what applications draw into.  It is bound to exactly one
//! screen and follows that screen's active mode, rotation, orientation and
//! pixel ratio.  Width and height are stored *as presented*: rotating a
//! 1080×1920 display by 90° turns it into a 1920×1080 display.

use serde::{Deserialize, Serialize};

use super::ids::{DisplayId, ScreenId};
use super::orientation::{Orientation, Rotation};
use super::screen::ScreenMode;

/// Whether the display's content is currently frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FreezeFlag {
    #[default]
    Unfreezing,
    Freezing,
}

/// One logical display.
#[derive(Debug, Clone, PartialEq)]
pub struct Display {
    pub id: DisplayId,
    /// Bound screen, `None` while the display is a placeholder.
    pub screen_id: Option<ScreenId>,
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
    pub rotation: Rotation,
    pub orientation: Orientation,
    pub virtual_pixel_ratio: f32,
    pub freeze: FreezeFlag,
}

impl Display {
    pub fn new(id: DisplayId, screen_id: ScreenId, mode: ScreenMode) -> Self {
        Self {
            id,
            screen_id: Some(screen_id),
            width: mode.width,
            height: mode.height,
            refresh_rate: mode.refresh_rate,
            rotation: Rotation::Rotation0,
            orientation: Orientation::Unspecified,
            virtual_pixel_ratio: 1.0,
            freeze: FreezeFlag::Unfreezing,
        }
    }

    /// Unbound display waiting for the first screen.
    pub fn placeholder(id: DisplayId) -> Self {
        Self {
            id,
            screen_id: None,
            width: 0,
            height: 0,
            refresh_rate: 0,
            rotation: Rotation::Rotation0,
            orientation: Orientation::Unspecified,
            virtual_pixel_ratio: 1.0,
            freeze: FreezeFlag::Unfreezing,
        }
    }

    /// Applies a new rotation, swapping width and height when it crosses the
    /// vertical/horizontal boundary.
    ///
    /// Returns `false` when the rotation is unchanged.
    pub fn request_rotation(&mut self, rotation: Rotation) -> bool {
        if self.rotation == rotation {
            return false;
        }
        if self.rotation.is_vertical() != rotation.is_vertical() {
            std::mem::swap(&mut self.width, &mut self.height);
        }
        self.rotation = rotation;
        true
    }

    /// Follows a new active mode, honouring the current rotation.
    ///
    /// Returns `false` when the presented size and refresh rate are unchanged.
    pub fn update_size(&mut self, mode: ScreenMode) -> bool {
        let (width, height) = if self.rotation.is_vertical() {
            (mode.width, mode.height)
        } else {
            (mode.height, mode.width)
        };
        if self.width == width && self.height == height && self.refresh_rate == mode.refresh_rate {
            return false;
        }
        self.width = width;
        self.height = height;
        self.refresh_rate = mode.refresh_rate;
        true
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze == FreezeFlag::Freezing
    }

    pub fn to_info(&self) -> DisplayInfo {
        DisplayInfo {
            id: self.id,
            screen_id: self.screen_id,
            width: self.width,
            height: self.height,
            refresh_rate: self.refresh_rate,
            rotation: self.rotation,
            orientation: self.orientation,
            virtual_pixel_ratio: self.virtual_pixel_ratio,
            freeze: self.freeze,
        }
    }
}

/// Value snapshot of a display handed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub id: DisplayId,
    pub screen_id: Option<ScreenId>,
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
    pub rotation: Rotation,
    pub orientation: Orientation,
    pub virtual_pixel_ratio: f32,
    pub freeze: FreezeFlag,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn portrait_display() -> Display {
        Display::new(DisplayId(0), ScreenId(0), ScreenMode::new(1080, 1920, 60))
    }

    #[test]
    fn test_request_rotation_swaps_dimensions_across_axis() {
        // Arrange
        let mut display = portrait_display();

        // Act
        let changed = display.request_rotation(Rotation::Rotation90);

        // Assert
        assert!(changed);
        assert_eq!((display.width, display.height), (1920, 1080));
    }

    #[test]
    fn test_request_rotation_keeps_dimensions_on_same_axis() {
        let mut display = portrait_display();

        display.request_rotation(Rotation::Rotation180);

        assert_eq!((display.width, display.height), (1080, 1920));
    }

    #[test]
    fn test_request_same_rotation_is_reported_unchanged() {
        let mut display = portrait_display();

        assert!(!display.request_rotation(Rotation::Rotation0));
    }

    #[test]
    fn test_swap_law_holds_for_every_transition() {
        let all = [
            Rotation::Rotation0,
            Rotation::Rotation90,
            Rotation::Rotation180,
            Rotation::Rotation270,
        ];
        for from in all {
            for to in all {
                let mut display = portrait_display();
                display.request_rotation(from);
                let (w, h) = (display.width, display.height);

                display.request_rotation(to);

                if from.is_vertical() == to.is_vertical() {
                    assert_eq!((display.width, display.height), (w, h));
                } else {
                    assert_eq!((display.width, display.height), (h, w));
                }
            }
        }
    }

    #[test]
    fn test_update_size_honours_rotation() {
        // Arrange
        let mut display = portrait_display();
        display.request_rotation(Rotation::Rotation90);

        // Act
        let changed = display.update_size(ScreenMode::new(720, 1280, 60));

        // Assert
        assert!(changed);
        assert_eq!((display.width, display.height), (1280, 720));
    }

    #[test]
    fn test_update_size_with_same_mode_is_unchanged() {
        let mut display = portrait_display();
        assert!(!display.update_size(ScreenMode::new(1080, 1920, 60)));
    }

    #[test]
    fn test_placeholder_has_no_bound_screen() {
        let display = Display::placeholder(DisplayId(3));
        assert_eq!(display.screen_id, None);
        assert!(!display.is_frozen());
    }
}
