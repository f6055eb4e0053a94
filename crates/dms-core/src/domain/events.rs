//! Change kinds carried by outbound notifications.

use serde::{Deserialize, Serialize};

/// What changed on a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenChangeEvent {
    ChangeMode,
    UpdateRotation,
    UpdateOrientation,
    VirtualPixelRatioChanged,
}

/// How a screen's group membership changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenGroupChangeEvent {
    AddToGroup,
    RemoveFromGroup,
    ChangeGroup,
}

/// What changed on a display, as reported to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayChangeEvent {
    UpdateRotation,
    UpdateOrientation,
    DisplaySizeChanged,
    UpdateVirtualPixelRatio,
    DisplayFreezed,
    DisplayUnfreezed,
}

/// What changed on a display, as reported to the in-process display-change
/// listener (window management).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayStateChangeType {
    Create,
    Destroy,
    SizeChange,
    UpdateRotation,
    UpdateOrientation,
    VirtualPixelRatioChange,
    Freeze,
    Unfreeze,
}

impl From<DisplayChangeEvent> for DisplayStateChangeType {
    fn from(event: DisplayChangeEvent) -> Self {
        match event {
            DisplayChangeEvent::UpdateRotation => DisplayStateChangeType::UpdateRotation,
            DisplayChangeEvent::UpdateOrientation => DisplayStateChangeType::UpdateOrientation,
            DisplayChangeEvent::DisplaySizeChanged => DisplayStateChangeType::SizeChange,
            DisplayChangeEvent::UpdateVirtualPixelRatio => {
                DisplayStateChangeType::VirtualPixelRatioChange
            }
            DisplayChangeEvent::DisplayFreezed => DisplayStateChangeType::Freeze,
            DisplayChangeEvent::DisplayUnfreezed => DisplayStateChangeType::Unfreeze,
        }
    }
}
