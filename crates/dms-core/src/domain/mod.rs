//! Domain entities of the display manager.
//!
//! This module contains pure business logic with no infrastructure
//! dependencies: no renderer calls, no locks, no threads.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain** (or "entities" layer).  Domain code:
//!
//! - Contains the core rules of the system: when a group degrades, how a
//!   display's size follows its rotation, which heading means "upside down".
//! - Has **no** imports from renderer backends, IPC, or sensor drivers.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! The service crate depends on the domain, but the domain never depends on
//! it.

/// Stable and renderer-native identifier newtypes.
pub mod ids;

/// Renderer id ↔ stable id translation table.
pub mod id_table;

/// Screens, screen groups and their snapshots.
pub mod screen;

/// Logical displays.
pub mod display;

/// Notch rectangles and waterfall edges, turned with the display.
pub mod cutout;

pub mod events;
pub mod orientation;
pub mod power;

/// Gravity vector → display rotation math.
pub mod rotation;
