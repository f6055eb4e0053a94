//! Identifier newtypes for the two numbering spaces the service juggles.
//!
//! # Why two kinds of screen id? (for beginners)
//!
//! The renderer backend numbers its outputs however it likes, and those
//! numbers can be recycled when a monitor is unplugged and another one is
//! plugged in.  Clients of the display manager need ids that never change
//! meaning while they hold them, so the manager hands out its own *stable*
//! ids and keeps a translation table between the two spaces
//! (see [`super::id_table::ScreenIdTable`]).
//!
//! Wrapping each space in its own newtype means the compiler refuses to mix
//! them up: a [`RsScreenId`] cannot be passed where a [`ScreenId`] is
//! expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable, controller-assigned id of a screen or a screen group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScreenId(pub u64);

/// Renderer-native id of a physical or virtual output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RsScreenId(pub u64);

/// Stable id of a logical display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisplayId(pub u64);

/// Renderer-side node mirroring a screen's content onto another output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Client process (agent) that owns virtual screens.
pub type AgentId = Uuid;

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RsScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rs:{}", self.0)
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}
