//! Screens and screen groups.
//!
//! A [`Screen`] is one renderer-visible output, physical or virtual.  A
//! [`ScreenGroup`] aggregates screens that either mirror one source or tile a
//! shared desktop.  Groups are registered under stable ids from the same
//! numbering space as screens, but they never carry a renderer id, modes or a
//! rotation of their own.
//!
//! # Group combinations (for beginners)
//!
//! ```text
//!            make_mirror                 make_expand
//!   Alone  ─────────────►  Mirror  ◄─────────────────►  Expand
//!     ▲                       │                            │
//!     └───────────────────────┴────── child count drops to 1
//! ```
//!
//! - `Alone`  – exactly one member (or a group that lost all but one member).
//! - `Mirror` – every member shows the content of the *mirror source*.
//! - `Expand` – members are tiles of one large desktop; each has an offset.

use serde::{Deserialize, Serialize};

use super::ids::{AgentId, RsScreenId, ScreenId};
use super::orientation::{Orientation, Rotation};

/// Width, height and refresh rate of one supported output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScreenMode {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
}

impl ScreenMode {
    pub fn new(width: u32, height: u32, refresh_rate: u32) -> Self {
        Self { width, height, refresh_rate }
    }
}

/// Kind of output behind a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScreenType {
    #[default]
    Undefined,
    Real,
    Virtual,
}

/// How the members of a group share content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScreenCombination {
    #[default]
    Alone,
    Mirror,
    Expand,
}

/// Role a screen plays inside its group, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenSourceMode {
    /// Default screen of a mirror group.
    Main,
    /// Non-default member of a mirror group.
    Mirror,
    /// Tile of an expand group.
    Extend,
    /// Not sharing content with anyone.
    Alone,
}

/// Offset of a group member in the group's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

// ── Screen ────────────────────────────────────────────────────────────────────

/// One renderer-visible output.
#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub id: ScreenId,
    pub rs_id: RsScreenId,
    pub name: String,
    pub screen_type: ScreenType,
    modes: Vec<ScreenMode>,
    active_idx: Option<usize>,
    pub rotation: Rotation,
    /// Orientation currently in effect.
    pub orientation: Orientation,
    /// Baseline recorded by non-window requests; window requests for
    /// `Unspecified` fall back to it.
    pub requested_orientation: Orientation,
    pub virtual_pixel_ratio: f32,
    /// Owning group, `None` for virtual screens not yet placed.
    pub group_id: Option<ScreenId>,
    /// Agent that created this screen (virtual screens only).
    pub owner: Option<AgentId>,
}

impl Screen {
    /// Builds a screen, rejecting an empty mode list or an out-of-range index.
    pub fn new(
        id: ScreenId,
        rs_id: RsScreenId,
        name: impl Into<String>,
        screen_type: ScreenType,
        modes: Vec<ScreenMode>,
        active_idx: usize,
    ) -> Option<Self> {
        if active_idx >= modes.len() {
            return None;
        }
        Some(Self {
            id,
            rs_id,
            name: name.into(),
            screen_type,
            modes,
            active_idx: Some(active_idx),
            rotation: Rotation::Rotation0,
            orientation: Orientation::Unspecified,
            requested_orientation: Orientation::Unspecified,
            virtual_pixel_ratio: 1.0,
            group_id: None,
            owner: None,
        })
    }

    pub fn modes(&self) -> &[ScreenMode] {
        &self.modes
    }

    pub fn active_mode_index(&self) -> Option<usize> {
        self.active_idx
    }

    pub fn active_mode(&self) -> Option<ScreenMode> {
        self.active_idx.and_then(|idx| self.modes.get(idx).copied())
    }

    /// Switches the active mode; an out-of-range index is refused.
    pub fn set_active_mode(&mut self, idx: usize) -> bool {
        if idx >= self.modes.len() {
            return false;
        }
        self.active_idx = Some(idx);
        true
    }

    /// Replaces the mode list, keeping `active_idx` valid.
    pub fn replace_modes(&mut self, modes: Vec<ScreenMode>, active_idx: usize) -> bool {
        if active_idx >= modes.len() {
            return false;
        }
        self.modes = modes;
        self.active_idx = Some(active_idx);
        true
    }

    /// Fixed rotation that honours `orientation` on this screen's aspect ratio.
    ///
    /// Sensor-driven orientations and screens without an active mode map to
    /// 0°.
    pub fn calc_rotation(&self, orientation: Orientation) -> Rotation {
        let Some(mode) = self.active_mode() else {
            return Rotation::Rotation0;
        };
        let is_vertical = mode.width < mode.height;
        match orientation {
            Orientation::Vertical if is_vertical => Rotation::Rotation0,
            Orientation::Vertical => Rotation::Rotation90,
            Orientation::Horizontal if is_vertical => Rotation::Rotation90,
            Orientation::Horizontal => Rotation::Rotation0,
            Orientation::ReverseVertical if is_vertical => Rotation::Rotation180,
            Orientation::ReverseVertical => Rotation::Rotation270,
            Orientation::ReverseHorizontal if is_vertical => Rotation::Rotation270,
            Orientation::ReverseHorizontal => Rotation::Rotation180,
            _ => Rotation::Rotation0,
        }
    }

    pub fn to_info(&self, source_mode: ScreenSourceMode) -> ScreenInfo {
        ScreenInfo {
            id: self.id,
            name: self.name.clone(),
            parent: self.group_id,
            screen_type: self.screen_type,
            modes: self.modes.clone(),
            active_mode_index: self.active_idx,
            rotation: self.rotation,
            orientation: self.orientation,
            virtual_pixel_ratio: self.virtual_pixel_ratio,
            source_mode,
        }
    }
}

// ── ScreenGroup ───────────────────────────────────────────────────────────────

/// A member of a group together with its tile offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChild {
    pub screen_id: ScreenId,
    pub position: Point,
}

/// Aggregate of screens sharing content.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenGroup {
    pub id: ScreenId,
    pub name: String,
    pub combination: ScreenCombination,
    pub mirror_source: Option<ScreenId>,
    children: Vec<GroupChild>,
}

impl ScreenGroup {
    pub fn new(id: ScreenId, combination: ScreenCombination) -> Self {
        Self {
            id,
            name: format!("ScreenGroup_{}", id.0),
            combination,
            mirror_source: None,
            children: Vec::new(),
        }
    }

    /// Adds a member; returns `false` when it is already a member.
    pub fn add_child(&mut self, screen_id: ScreenId, position: Point) -> bool {
        if self.has_child(screen_id) {
            return false;
        }
        self.children.push(GroupChild { screen_id, position });
        true
    }

    /// Removes a member; returns `false` when it was not a member.
    pub fn remove_child(&mut self, screen_id: ScreenId) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c.screen_id != screen_id);
        self.children.len() != before
    }

    pub fn set_position(&mut self, screen_id: ScreenId, position: Point) -> bool {
        match self.children.iter_mut().find(|c| c.screen_id == screen_id) {
            Some(child) => {
                child.position = position;
                true
            }
            None => false,
        }
    }

    pub fn has_child(&self, screen_id: ScreenId) -> bool {
        self.children.iter().any(|c| c.screen_id == screen_id)
    }

    pub fn children(&self) -> &[GroupChild] {
        &self.children
    }

    pub fn child_ids(&self) -> Vec<ScreenId> {
        self.children.iter().map(|c| c.screen_id).collect()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Degrades a single-member Mirror or Expand group to Alone.
    ///
    /// Returns `true` when the combination changed.
    pub fn degrade_if_single(&mut self) -> bool {
        if self.children.len() == 1 && self.combination != ScreenCombination::Alone {
            self.combination = ScreenCombination::Alone;
            return true;
        }
        false
    }

    /// Role of `screen_id` inside this group given the current default screen.
    pub fn source_mode_of(&self, screen_id: ScreenId, default_screen: Option<ScreenId>) -> ScreenSourceMode {
        match self.combination {
            ScreenCombination::Mirror if default_screen == Some(screen_id) => ScreenSourceMode::Main,
            ScreenCombination::Mirror => ScreenSourceMode::Mirror,
            ScreenCombination::Expand => ScreenSourceMode::Extend,
            ScreenCombination::Alone => ScreenSourceMode::Alone,
        }
    }

    pub fn to_info(&self) -> ScreenGroupInfo {
        ScreenGroupInfo {
            id: self.id,
            name: self.name.clone(),
            combination: self.combination,
            mirror_source: self.mirror_source,
            children: self.child_ids(),
            positions: self.children.iter().map(|c| c.position).collect(),
        }
    }
}

// ── Snapshots ─────────────────────────────────────────────────────────────────

/// Value snapshot of a screen handed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenInfo {
    pub id: ScreenId,
    pub name: String,
    pub parent: Option<ScreenId>,
    pub screen_type: ScreenType,
    pub modes: Vec<ScreenMode>,
    pub active_mode_index: Option<usize>,
    pub rotation: Rotation,
    pub orientation: Orientation,
    pub virtual_pixel_ratio: f32,
    pub source_mode: ScreenSourceMode,
}

/// Value snapshot of a screen group handed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenGroupInfo {
    pub id: ScreenId,
    pub name: String,
    pub combination: ScreenCombination,
    pub mirror_source: Option<ScreenId>,
    pub children: Vec<ScreenId>,
    pub positions: Vec<Point>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
