//! Infrastructure layer of the display manager service.
//!
//! Contains the seams to everything outside the service: the renderer
//! backend, the gravity sensor, the notification sinks, the worker thread and
//! configuration storage.  Each seam is a trait plus an in-memory `mock`
//! implementation.
//!
//! **Dependency rule**: this layer may depend on `dms_core`, but MUST NOT
//! import the `application` layer.

pub mod notification;
pub mod renderer;
pub mod sensor;
pub mod storage;
pub mod worker;
