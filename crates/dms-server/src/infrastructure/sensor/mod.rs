//! Gravity sensor seam.
//!
//! The sensor driver delivers samples on its own thread.  The callback runs
//! the rotation decision engine directly; it never goes through the worker
//! queue, so a slow renderer cannot delay sensor handling.

use std::time::Duration;

use thiserror::Error;

use dms_core::GravitySample;

pub mod mock;

/// Sample callback installed by [`GravitySensor::subscribe`].
pub type GravityCallback = Box<dyn Fn(GravitySample) + Send + Sync>;

/// Errors reported by a sensor driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("gravity sensor not available on this device")]
    NotAvailable,

    #[error("gravity sensor subscription failed: {0}")]
    SubscribeFailed(String),
}

/// Source of gravity samples.
pub trait GravitySensor: Send + Sync {
    /// Starts delivering samples roughly every `interval`.
    fn subscribe(&self, interval: Duration, callback: GravityCallback) -> Result<(), SensorError>;

    /// Stops delivery.  Unsubscribing twice is harmless.
    fn unsubscribe(&self);
}
