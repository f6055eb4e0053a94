//! Display manager service: the composition root.
//!
//! [`DisplayManagerService`] owns one instance of every controller and the
//! worker queue, wires the topology callback to the display controller and
//! exposes the public operations keyed by stable ids.  There are no
//! process-wide singletons: whoever builds the service passes in the
//! renderer, the agent sink and (optionally) a gravity sensor.
//!
//! # Threads (for beginners)
//!
//! - Caller threads enter through the methods below.
//! - The worker thread runs renderer events, deferred mode changes and every
//!   notification.
//! - The sensor thread calls [`DisplayManagerService::handle_gravity_sample`]
//!   directly.
//!
//! Locks are always taken rotation engine → topology → display.

use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use dms_core::{
    AgentId, CutoutInfo, DisplayId, DisplayInfo, DisplayPowerEvent, DisplayState, DmError, EventStatus,
    GravitySample, Orientation, Point, Rotation, RsScreenId, ScreenColorGamut, ScreenGamutMap,
    ScreenGroupInfo, ScreenId, ScreenInfo, ScreenMode, ScreenPowerState,
};

use crate::application::cutout_controller::DisplayCutoutController;
use crate::application::display_controller::DisplayController;
use crate::application::power_controller::DisplayPowerController;
use crate::application::rotation_controller::{RotationHost, ScreenRotationController};
use crate::application::screen_controller::{ScreenController, VirtualScreenOption};
use crate::infrastructure::notification::{AgentEventSink, DisplayChangeListener, Notifier};
use crate::infrastructure::renderer::{PixelBuffer, Renderer};
use crate::infrastructure::sensor::{GravitySensor, SensorError};
use crate::infrastructure::storage::config::DmsConfig;
use crate::infrastructure::worker::{WorkerHandle, WorkerQueue, WorkerSpawnError};

/// The display manager service.
pub struct DisplayManagerService {
    weak_self: Weak<DisplayManagerService>,
    config: DmsConfig,
    notifier: Notifier,
    queue: WorkerQueue,
    screens: Arc<ScreenController>,
    displays: Arc<DisplayController>,
    rotation: ScreenRotationController,
    power: DisplayPowerController,
    cutouts: DisplayCutoutController,
    sensor: Option<Arc<dyn GravitySensor>>,
    sensor_subscribed: Mutex<bool>,
}

impl DisplayManagerService {
    /// Builds the service and starts its worker thread.
    ///
    /// Call [`Self::init`] afterwards to subscribe to the renderer.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerSpawnError`] if the worker thread cannot be spawned.
    pub fn new(
        renderer: Arc<dyn Renderer>,
        agents: Arc<dyn AgentEventSink>,
        sensor: Option<Arc<dyn GravitySensor>>,
        config: DmsConfig,
    ) -> Result<(Arc<Self>, WorkerHandle), WorkerSpawnError> {
        let (queue, handle) = WorkerQueue::start(&config.worker.thread_name)?;
        let notifier = Notifier::new(queue.clone(), agents);
        let screens = ScreenController::new(Arc::clone(&renderer), notifier.clone(), queue.clone());
        let displays = Arc::new(DisplayController::new(
            renderer,
            notifier.clone(),
            config.service.capture_timeout(),
        ));
        screens.set_callback(displays.clone());
        let rotation = ScreenRotationController::new(
            config.rotation.callback_interval(),
            config.rotation.start_locked,
        );
        let power = DisplayPowerController::new(notifier.clone());
        let cutouts = DisplayCutoutController::new(&config.cutout);

        let service = Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            config,
            notifier,
            queue,
            screens,
            displays,
            rotation,
            power,
            cutouts,
            sensor,
            sensor_subscribed: Mutex::new(false),
        });
        Ok((service, handle))
    }

    /// Creates the placeholder display (when configured), applies the
    /// rotation offset and subscribes to renderer screen events.
    ///
    /// # Errors
    ///
    /// [`DmError::RendererFailure`] when the renderer subscription exhausts
    /// its attempts.
    pub fn init(&self) -> Result<(), DmError> {
        if self.config.service.placeholder_display {
            self.displays.create_placeholder();
        }
        if let Err(e) = self
            .rotation
            .set_device_rotation_offset(self.config.rotation.device_rotation_offset)
        {
            warn!("ignoring configured device rotation offset: {e}");
        }
        self.screens.subscribe_renderer_events(
            self.config.service.subscribe_retry(),
            self.config.service.subscribe_max_attempts,
        )?;
        info!("display manager service initialised");
        Ok(())
    }

    /// Stops sensor delivery.  The worker thread exits once the service is
    /// dropped.
    pub fn shutdown(&self) {
        self.unsubscribe_gravity_sensor();
        info!("display manager service shut down");
    }

    pub fn set_display_change_listener(&self, listener: Arc<dyn DisplayChangeListener>) {
        self.notifier.set_display_change_listener(listener);
    }

    /// Queue used for notifications; tests flush it to observe delivery.
    pub fn worker_queue(&self) -> &WorkerQueue {
        &self.queue
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    // ── Topology ──────────────────────────────────────────────────────────────

    /// Creates a virtual screen, optionally mirroring the screen behind
    /// `mirror_display`.
    pub fn create_virtual_screen(
        &self,
        option: &VirtualScreenOption,
        mirror_display: Option<DisplayId>,
        agent: Option<AgentId>,
    ) -> Result<ScreenId, DmError> {
        let mirror_of = match mirror_display {
            Some(display) => {
                let screen = self
                    .displays
                    .screen_id_by_display(display)
                    .ok_or(DmError::display_not_found(display))?;
                Some(self.screens.rs_screen_id(screen)?)
            }
            None => None,
        };
        self.screens.create_virtual_screen(option, mirror_of, agent)
    }

    pub fn destroy_virtual_screen(&self, id: ScreenId) -> Result<(), DmError> {
        self.screens.destroy_virtual_screen(id)
    }

    pub fn on_agent_died(&self, agent: AgentId) -> usize {
        self.screens.on_agent_died(agent)
    }

    pub fn make_mirror(&self, source: ScreenId, targets: &[ScreenId]) -> Result<ScreenId, DmError> {
        self.screens.make_mirror(source, targets)
    }

    pub fn make_expand(&self, targets: &[ScreenId], offsets: &[Point]) -> Result<ScreenId, DmError> {
        self.screens.make_expand(targets, offsets)
    }

    /// Requests an orientation.  For the default screen, sensor-driven
    /// orientations also go through the rotation engine (subscribing to the
    /// sensor on first use when it is enabled).
    ///
    /// Returns whether the orientation changed.
    pub fn set_orientation(
        &self,
        id: ScreenId,
        orientation: Orientation,
        from_window: bool,
    ) -> Result<bool, DmError> {
        let update = self.screens.set_orientation(id, orientation, from_window)?;
        if !update.changed || self.screens.default_screen_id() != Some(id) {
            return Ok(update.changed);
        }
        if update.orientation.is_sensor_related() && self.config.rotation.sensor_enabled {
            if let Err(e) = self.subscribe_gravity_sensor() {
                warn!("sensor orientation requested but the sensor is unusable: {e}");
            }
        }
        self.rotation.process_orientation_switch(update.orientation, self);
        Ok(true)
    }

    pub fn set_rotation(&self, id: ScreenId, rotation: Rotation) -> Result<bool, DmError> {
        self.screens.set_rotation(id, rotation)
    }

    pub fn set_active_mode(&self, id: ScreenId, mode_idx: usize) -> bool {
        self.screens.set_active_mode(id, mode_idx)
    }

    pub fn set_virtual_pixel_ratio(&self, id: ScreenId, ratio: f32) -> Result<(), DmError> {
        self.screens.set_virtual_pixel_ratio(id, ratio)
    }

    pub fn supported_color_gamuts(&self, id: ScreenId) -> Result<Vec<ScreenColorGamut>, DmError> {
        self.screens.supported_color_gamuts(id)
    }

    pub fn color_gamut(&self, id: ScreenId) -> Result<ScreenColorGamut, DmError> {
        self.screens.color_gamut(id)
    }

    pub fn set_color_gamut(&self, id: ScreenId, gamut_idx: usize) -> Result<(), DmError> {
        self.screens.set_color_gamut(id, gamut_idx)
    }

    pub fn gamut_map(&self, id: ScreenId) -> Result<ScreenGamutMap, DmError> {
        self.screens.gamut_map(id)
    }

    pub fn set_gamut_map(&self, id: ScreenId, map: ScreenGamutMap) -> Result<(), DmError> {
        self.screens.set_gamut_map(id, map)
    }

    pub fn set_color_transform(&self, id: ScreenId) -> Result<(), DmError> {
        self.screens.set_color_transform(id)
    }

    pub fn all_screen_ids(&self) -> Vec<ScreenId> {
        self.screens.all_screen_ids()
    }

    pub fn screen_info(&self, id: ScreenId) -> Option<ScreenInfo> {
        self.screens.screen_info(id)
    }

    pub fn all_screen_infos(&self) -> Vec<ScreenInfo> {
        self.screens.all_screen_infos()
    }

    pub fn screen_group_info(&self, id: ScreenId) -> Option<ScreenGroupInfo> {
        self.screens.screen_group_info(id)
    }

    pub fn is_screen_group(&self, id: ScreenId) -> bool {
        self.screens.is_screen_group(id)
    }

    pub fn default_screen_id(&self) -> Option<ScreenId> {
        self.screens.default_screen_id()
    }

    pub fn rs_screen_id(&self, id: ScreenId) -> Result<RsScreenId, DmError> {
        self.screens.rs_screen_id(id)
    }

    /// Screen behind a display.
    pub fn screen_info_by_display(&self, display: DisplayId) -> Option<ScreenInfo> {
        let screen = self.displays.screen_id_by_display(display)?;
        self.screens.screen_info(screen)
    }

    // ── Displays ──────────────────────────────────────────────────────────────

    pub fn display_info(&self, id: DisplayId) -> Option<DisplayInfo> {
        self.displays.display_info(id)
    }

    pub fn default_display_info(&self) -> Option<DisplayInfo> {
        self.displays
            .default_display_id()
            .and_then(|id| self.displays.display_info(id))
    }

    pub fn all_display_ids(&self) -> Vec<DisplayId> {
        self.displays.all_display_ids()
    }

    pub fn display_id_by_screen(&self, screen: ScreenId) -> Option<DisplayId> {
        self.displays.display_id_by_screen(screen)
    }

    pub fn set_freeze(&self, ids: &[DisplayId], freeze: bool) {
        self.displays.set_freeze(ids, freeze);
    }

    /// Captures the screen behind a display.
    ///
    /// # Errors
    ///
    /// - [`DmError::NotFound`] for an unknown or unbound display.
    /// - [`DmError::Timeout`] / [`DmError::RendererFailure`] from the capture.
    pub fn snapshot(&self, display: DisplayId) -> Result<PixelBuffer, DmError> {
        let screen = self
            .displays
            .screen_id_by_display(display)
            .ok_or(DmError::display_not_found(display))?;
        let rs_id = self.screens.rs_screen_id(screen)?;
        self.displays.snapshot_screen(rs_id)
    }

    // ── Cutout ────────────────────────────────────────────────────────────────

    /// Notch rectangles and waterfall edges of a display, in its current
    /// rotation.  An unbound display has no panel and reports no cutout.
    ///
    /// # Errors
    ///
    /// [`DmError::NotFound`] for an unknown display.
    pub fn cutout_info(&self, display: DisplayId) -> Result<CutoutInfo, DmError> {
        let info = self
            .displays
            .display_info(display)
            .ok_or(DmError::display_not_found(display))?;
        let Some(mode) = RotationHost::display_mode(self, display) else {
            return Ok(CutoutInfo::default());
        };
        let is_default = self.displays.default_display_id() == Some(display);
        Ok(self.cutouts.cutout_info(display, info.rotation, mode, is_default))
    }

    /// Cutout registry, for updating rectangles and waterfall settings.
    pub fn cutouts(&self) -> &DisplayCutoutController {
        &self.cutouts
    }

    // ── Rotation ──────────────────────────────────────────────────────────────

    /// Subscribes the rotation engine to the gravity sensor.
    ///
    /// Returns `Ok(false)` when already subscribed.
    ///
    /// # Errors
    ///
    /// [`SensorError::NotAvailable`] without a sensor, or the driver's error.
    pub fn subscribe_gravity_sensor(&self) -> Result<bool, SensorError> {
        let sensor = self.sensor.as_ref().ok_or(SensorError::NotAvailable)?;
        let mut subscribed = self.sensor_subscribed.lock();
        if *subscribed {
            debug!("gravity sensor already subscribed");
            return Ok(false);
        }
        self.rotation.init(self);
        let weak = self.weak_self.clone();
        sensor.subscribe(
            self.config.rotation.callback_interval(),
            Box::new(move |sample| {
                if let Some(service) = weak.upgrade() {
                    service.handle_gravity_sample(&sample);
                }
            }),
        )?;
        *subscribed = true;
        info!("gravity sensor subscribed");
        Ok(true)
    }

    /// Returns `false` when nothing was subscribed.
    pub fn unsubscribe_gravity_sensor(&self) -> bool {
        let mut subscribed = self.sensor_subscribed.lock();
        if !*subscribed {
            return false;
        }
        if let Some(sensor) = &self.sensor {
            sensor.unsubscribe();
        }
        *subscribed = false;
        info!("gravity sensor unsubscribed");
        true
    }

    pub fn is_gravity_sensor_subscribed(&self) -> bool {
        *self.sensor_subscribed.lock()
    }

    /// Entry point of the sensor thread.
    pub fn handle_gravity_sample(&self, sample: &GravitySample) -> Option<Rotation> {
        self.rotation.handle_gravity_sample(sample, Instant::now(), self)
    }

    pub fn set_rotation_locked(&self, locked: bool) {
        self.rotation.set_rotation_locked(locked, self);
    }

    pub fn is_rotation_locked(&self) -> bool {
        self.rotation.is_rotation_locked()
    }

    pub fn set_device_rotation_offset(&self, degrees: u32) -> Result<(), DmError> {
        self.rotation.set_device_rotation_offset(degrees)
    }

    // ── Power ─────────────────────────────────────────────────────────────────

    pub fn set_display_state(&self, state: DisplayState) -> bool {
        self.power.set_display_state(state, self.displays.default_display_id())
    }

    /// Logical power state; unknown displays report [`DisplayState::Unknown`].
    pub fn display_state(&self, display: DisplayId) -> DisplayState {
        if self.displays.display_info(display).is_none() {
            return DisplayState::Unknown;
        }
        self.power.display_state()
    }

    pub fn wake_up_begin(&self) {
        self.power.notify_power_event(DisplayPowerEvent::WakeUp, EventStatus::Begin);
    }

    pub fn wake_up_end(&self) {
        self.power.notify_power_event(DisplayPowerEvent::WakeUp, EventStatus::End);
    }

    pub fn suspend_begin(&self) {
        self.power.notify_power_event(DisplayPowerEvent::Sleep, EventStatus::Begin);
    }

    pub fn suspend_end(&self) {
        self.power.notify_power_event(DisplayPowerEvent::Sleep, EventStatus::End);
    }

    pub fn screen_power(&self, id: ScreenId) -> Result<ScreenPowerState, DmError> {
        self.screens.screen_power(id)
    }

    pub fn set_screen_power(&self, id: ScreenId, power: ScreenPowerState) -> Result<(), DmError> {
        self.screens.set_screen_power(id, power)
    }

    /// Powers every real screen and announces the result.
    pub fn set_screen_power_for_all(&self, power: ScreenPowerState) -> Result<(), DmError> {
        self.screens.set_screen_power_for_all(power)?;
        self.power.notify_screen_power_applied(power);
        Ok(())
    }

    pub fn screen_brightness(&self, id: ScreenId) -> Result<u32, DmError> {
        self.screens.screen_brightness(id)
    }

    pub fn set_screen_brightness(&self, id: ScreenId, level: u32) -> Result<(), DmError> {
        self.screens.set_screen_brightness(id, level)
    }

    /// Topology and display registry as text.
    pub fn dump(&self) -> String {
        let mut out = self.screens.dump();
        for info in self.displays.all_display_infos() {
            out.push_str(&format!(
                "display {} screen={:?} {}x{}@{} rotation={:?} freeze={:?}\n",
                info.id.0,
                info.screen_id,
                info.width,
                info.height,
                info.refresh_rate,
                info.rotation,
                info.freeze
            ));
        }
        out
    }
}

impl RotationHost for DisplayManagerService {
    fn default_display(&self) -> Option<DisplayId> {
        self.displays.default_display_id()
    }

    fn display_rotation(&self, display: DisplayId) -> Option<Rotation> {
        self.displays.display_info(display).map(|info| info.rotation)
    }

    fn preferred_orientation(&self, display: DisplayId) -> Orientation {
        self.screen_info_by_display(display)
            .map_or(Orientation::Unspecified, |info| info.orientation)
    }

    fn display_mode(&self, display: DisplayId) -> Option<ScreenMode> {
        let info = self.screen_info_by_display(display)?;
        info.active_mode_index.and_then(|idx| info.modes.get(idx).copied())
    }

    fn set_display_rotation(&self, display: DisplayId, rotation: Rotation) -> Result<bool, DmError> {
        let before = self
            .displays
            .display_info(display)
            .ok_or(DmError::display_not_found(display))?
            .rotation;
        // Screen first: a refused renderer request must leave the display untouched.
        if let Some(screen) = self.displays.screen_id_by_display(display) {
            self.screens.set_rotation(screen, rotation)?;
        }
        self.displays.apply_rotation(display, rotation)?;
        Ok(before != rotation)
    }
}
