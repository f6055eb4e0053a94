//! Mock gravity sensor for unit testing.
//!
//! Allows tests to inject synthetic [`GravitySample`]s without a sensor
//! driver.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dms_core::GravitySample;

use super::{GravityCallback, GravitySensor, SensorError};

/// A mock implementation of [`GravitySensor`] that allows tests to inject
/// samples.
pub struct MockGravitySensor {
    callback: Mutex<Option<Arc<GravityCallback>>>,
    subscribe_count: Mutex<u32>,
    available: bool,
}

impl MockGravitySensor {
    pub fn new() -> Self {
        Self {
            callback: Mutex::new(None),
            subscribe_count: Mutex::new(0),
            available: true,
        }
    }

    /// A sensor that refuses every subscription.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Delivers a sample to the subscriber, if any.
    ///
    /// Returns `false` when nobody is subscribed.
    pub fn emit(&self, sample: GravitySample) -> bool {
        let callback = self.callback.lock().expect("lock poisoned").clone();
        match callback {
            Some(callback) => {
                callback(sample);
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.callback.lock().expect("lock poisoned").is_some()
    }

    /// Number of successful subscriptions so far.
    pub fn subscribe_count(&self) -> u32 {
        *self.subscribe_count.lock().expect("lock poisoned")
    }
}

impl Default for MockGravitySensor {
    fn default() -> Self {
        Self::new()
    }
}

impl GravitySensor for MockGravitySensor {
    fn subscribe(&self, _interval: Duration, callback: GravityCallback) -> Result<(), SensorError> {
        if !self.available {
            return Err(SensorError::NotAvailable);
        }
        *self.callback.lock().expect("lock poisoned") = Some(Arc::new(callback));
        *self.subscribe_count.lock().expect("lock poisoned") += 1;
        Ok(())
    }

    fn unsubscribe(&self) {
        *self.callback.lock().expect("lock poisoned") = None;
    }
}
