//! Application layer of the display manager service.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure rules about screens, groups, displays and rotation) and the
//! infrastructure (renderer, sensor, worker thread, configuration).
//!
//! Controllers in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a request (e.g. "mirror screen A
//!   onto screens B and C").
//! - **Depend on abstractions** (the `Renderer`, `GravitySensor` and sink
//!   traits) rather than concrete backends, so tests run against mocks.
//! - **Own the locks** that guard shared state.
//!
//! # Sub-modules
//!
//! - **`screen_controller`**   – Screen identity and topology: hot-plug,
//!   virtual screens, mirror / expand groups, per-screen properties.
//! - **`display_controller`**  – Logical displays bound to screens; follows
//!   topology changes through a callback.
//! - **`rotation_controller`** – Gravity sensor → display rotation decisions.
//! - **`power_controller`**    – Display power state and power events.
//! - **`cutout_controller`**   – Notch and waterfall areas per display.
//! - **`service`**             – Composition root exposing every operation.

pub mod cutout_controller;
pub mod display_controller;
pub mod power_controller;
pub mod rotation_controller;
pub mod screen_controller;
pub mod service;
