//! Display projection manager.
//!
//! Maintains the logical [`Display`]s clients see and binds each one to a
//! screen.  It follows topology changes through [`ScreenCallback`]:
//!
//! | Group combination | Screen joins                       | Screen leaves                      |
//! |-------------------|------------------------------------|------------------------------------|
//! | Alone             | create (or adopt the placeholder)  | rebind to a survivor, else destroy |
//! | Mirror            | only the source gets a display     | rebind to a survivor, else destroy |
//! | Expand            | every member gets a display        | destroy                            |
//!
//! Rebinding prefers the default screen, then any surviving member that has
//! no display yet.  A member whose role changes in place follows the same
//! table: a new mirror secondary hands its display to the source or loses it,
//! anything else gets one.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use dms_core::{
    Display, DisplayChangeEvent, DisplayId, DisplayInfo, DisplayStateChangeType, DmError,
    FreezeFlag, Rotation, RsScreenId, ScreenCombination, ScreenGroup, ScreenId, ScreenMode,
    ScreenType,
};

use crate::application::screen_controller::{DepartedScreen, ScreenCallback, ScreenTopology};
use crate::infrastructure::notification::{AgentEvent, DisplayStateChange, Notifier};
use crate::infrastructure::renderer::{PixelBuffer, Renderer};

#[derive(Debug, Default)]
struct DisplayRegistry {
    displays: BTreeMap<DisplayId, Display>,
    next_id: u64,
    default_display: Option<DisplayId>,
    /// Unbound display created at boot, adopted by the first bound screen.
    placeholder: Option<DisplayId>,
}

impl DisplayRegistry {
    fn allocate_id(&mut self) -> DisplayId {
        let id = DisplayId(self.next_id);
        self.next_id += 1;
        id
    }

    fn display_for_screen(&self, screen_id: ScreenId) -> Option<DisplayId> {
        self.displays
            .values()
            .find(|d| d.screen_id == Some(screen_id))
            .map(|d| d.id)
    }

    fn infos(&self) -> BTreeMap<DisplayId, DisplayInfo> {
        self.displays.iter().map(|(id, d)| (*id, d.to_info())).collect()
    }

    /// Points the default display at the one bound to the default screen,
    /// falling back to the lowest remaining id.
    fn refresh_default(&mut self, topology: &ScreenTopology) {
        let bound = topology
            .default_screen_id()
            .and_then(|screen_id| self.display_for_screen(screen_id));
        self.default_display = bound
            .or_else(|| self.default_display.filter(|id| self.displays.contains_key(id)))
            .or_else(|| self.displays.keys().next().copied());
    }
}

/// Display projection manager.
pub struct DisplayController {
    state: Mutex<DisplayRegistry>,
    renderer: Arc<dyn Renderer>,
    notifier: Notifier,
    capture_timeout: Duration,
}

impl DisplayController {
    pub fn new(renderer: Arc<dyn Renderer>, notifier: Notifier, capture_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(DisplayRegistry::default()),
            renderer,
            notifier,
            capture_timeout,
        }
    }

    /// Creates the boot-time placeholder display.  Idempotent.
    pub fn create_placeholder(&self) -> DisplayId {
        let mut reg = self.state.lock();
        if let Some(id) = reg.placeholder {
            return id;
        }
        let id = reg.allocate_id();
        reg.displays.insert(id, Display::placeholder(id));
        reg.placeholder = Some(id);
        reg.default_display.get_or_insert(id);
        debug!(display_id = %id.0, "placeholder display created");
        id
    }

    // ── Mutators ──────────────────────────────────────────────────────────────

    /// Rotates a display, swapping its size when verticality changes.
    ///
    /// Returns `Ok(false)` when the rotation is unchanged.
    ///
    /// # Errors
    ///
    /// [`DmError::NotFound`] for an unknown display.
    pub fn apply_rotation(&self, id: DisplayId, rotation: Rotation) -> Result<bool, DmError> {
        let mut reg = self.state.lock();
        let display = reg.displays.get_mut(&id).ok_or(DmError::display_not_found(id))?;
        if !display.request_rotation(rotation) {
            return Ok(false);
        }
        self.notify_change(&reg, id, DisplayChangeEvent::UpdateRotation);
        Ok(true)
    }

    /// Follows a new mode; returns `true` when the presented size changed.
    pub fn resize_if_needed(&self, id: DisplayId, mode: ScreenMode) -> bool {
        let mut reg = self.state.lock();
        let Some(display) = reg.displays.get_mut(&id) else {
            return false;
        };
        if !display.update_size(mode) {
            return false;
        }
        self.notify_change(&reg, id, DisplayChangeEvent::DisplaySizeChanged);
        true
    }

    /// Freezes or unfreezes a batch of displays.  Unknown ids and displays
    /// already in the requested state are skipped.
    pub fn set_freeze(&self, ids: &[DisplayId], freeze: bool) {
        let (flag, event) = if freeze {
            (FreezeFlag::Freezing, DisplayChangeEvent::DisplayFreezed)
        } else {
            (FreezeFlag::Unfreezing, DisplayChangeEvent::DisplayUnfreezed)
        };
        let mut reg = self.state.lock();
        for &id in ids {
            let Some(display) = reg.displays.get_mut(&id) else {
                warn!(display_id = %id.0, "freeze request for unknown display");
                continue;
            };
            if display.freeze == flag {
                continue;
            }
            display.freeze = flag;
            self.notify_change(&reg, id, event);
        }
    }

    /// Captures one frame of a renderer screen, waiting at most the
    /// configured capture timeout.
    ///
    /// # Errors
    ///
    /// - [`DmError::RendererFailure`] when the renderer refuses or reports a
    ///   failed capture.
    /// - [`DmError::Timeout`] when no frame arrives in time.
    pub fn snapshot_screen(&self, rs_id: RsScreenId) -> Result<PixelBuffer, DmError> {
        let (tx, rx) = bounded(1);
        self.renderer.take_surface_capture(
            rs_id,
            Box::new(move |frame| {
                let _ = tx.send(frame);
            }),
        )?;
        match rx.recv_timeout(self.capture_timeout) {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) | Err(RecvTimeoutError::Disconnected) => {
                Err(DmError::RendererFailure(format!("capture of {rs_id} failed")))
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(%rs_id, timeout_ms = self.capture_timeout.as_millis() as u64, "capture timed out");
                Err(DmError::Timeout(self.capture_timeout.as_millis() as u64))
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn display_info(&self, id: DisplayId) -> Option<DisplayInfo> {
        self.state.lock().displays.get(&id).map(Display::to_info)
    }

    pub fn all_display_ids(&self) -> Vec<DisplayId> {
        self.state.lock().displays.keys().copied().collect()
    }

    pub fn all_display_infos(&self) -> Vec<DisplayInfo> {
        self.state.lock().displays.values().map(Display::to_info).collect()
    }

    pub fn default_display_id(&self) -> Option<DisplayId> {
        self.state.lock().default_display
    }

    pub fn display_id_by_screen(&self, screen_id: ScreenId) -> Option<DisplayId> {
        self.state.lock().display_for_screen(screen_id)
    }

    pub fn screen_id_by_display(&self, id: DisplayId) -> Option<ScreenId> {
        self.state.lock().displays.get(&id).and_then(|d| d.screen_id)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn notify_change(&self, reg: &DisplayRegistry, id: DisplayId, event: DisplayChangeEvent) {
        let Some(display) = reg.displays.get(&id) else {
            return;
        };
        let info = display.to_info();
        self.notifier.notify_agents(AgentEvent::DisplayChanged {
            info: info.clone(),
            event,
        });
        self.notify_state(reg, info, event.into());
    }

    fn notify_state(&self, reg: &DisplayRegistry, info: DisplayInfo, kind: DisplayStateChangeType) {
        self.notifier.notify_display_state(DisplayStateChange {
            default_display: reg.default_display,
            info,
            all: reg.infos(),
            kind,
        });
    }

    /// Mode a display bound to `screen_id` presents.
    ///
    /// Virtual screens borrow the default screen's refresh rate when they
    /// report none.
    fn mode_for(topology: &ScreenTopology, screen_id: ScreenId) -> Option<ScreenMode> {
        let screen = topology.screen(screen_id)?;
        let default_mode = topology.default_screen().and_then(|s| s.active_mode());
        match (screen.active_mode(), screen.screen_type) {
            (Some(mode), ScreenType::Virtual) if mode.refresh_rate == 0 => Some(ScreenMode {
                refresh_rate: default_mode.map_or(0, |m| m.refresh_rate),
                ..mode
            }),
            (Some(mode), _) => Some(mode),
            (None, ScreenType::Virtual) => default_mode,
            (None, _) => None,
        }
    }

    fn bind_screen(&self, topology: &ScreenTopology, screen_id: ScreenId) {
        let Some(screen) = topology.screen(screen_id) else {
            return;
        };
        let Some(group) = topology.group_of(screen_id) else {
            debug!(screen_id = %screen_id, "ungrouped screen gets no display");
            return;
        };
        if is_mirror_secondary(group, screen_id) {
            debug!(screen_id = %screen_id, "mirror secondary gets no display");
            return;
        }

        let mut reg = self.state.lock();
        if reg.display_for_screen(screen_id).is_some() {
            return;
        }
        let Some(mode) = Self::mode_for(topology, screen_id) else {
            warn!(screen_id = %screen_id, "screen has no usable mode; no display bound");
            return;
        };

        let adopt = reg.placeholder.take();
        let id = match adopt {
            Some(id) => id,
            None => reg.allocate_id(),
        };
        let mut display = Display::new(id, screen_id, mode);
        display.request_rotation(screen.rotation);
        display.orientation = screen.orientation;
        display.virtual_pixel_ratio = screen.virtual_pixel_ratio;
        reg.displays.insert(id, display);
        reg.refresh_default(topology);

        if let Some(info) = reg.displays.get(&id).map(Display::to_info) {
            self.notifier.notify_agents(AgentEvent::DisplayCreated(info.clone()));
            self.notify_state(&reg, info, DisplayStateChangeType::Create);
        }
        info!(display_id = %id.0, screen_id = %screen_id, adopted = adopt.is_some(), "display bound");
    }

    fn unbind_screen(&self, topology: &ScreenTopology, departed: &DepartedScreen) {
        let mut reg = self.state.lock();
        let Some(id) = reg.display_for_screen(departed.screen_id) else {
            return;
        };

        let successor = match departed.combination {
            ScreenCombination::Expand => None,
            ScreenCombination::Alone | ScreenCombination::Mirror => {
                let unbound = |candidate: &ScreenId| reg.display_for_screen(*candidate).is_none();
                topology
                    .default_screen_id()
                    .filter(|d| departed.remaining.contains(d) && unbound(d))
                    .or_else(|| departed.remaining.iter().copied().find(|c| unbound(c)))
            }
        };

        match successor {
            Some(target) => self.rebind(&mut reg, topology, id, target),
            None => self.destroy(&mut reg, topology, id),
        }
    }

    fn reassign_screen(&self, topology: &ScreenTopology, screen_id: ScreenId) {
        let Some(group) = topology.group_of(screen_id) else {
            return;
        };
        if !is_mirror_secondary(group, screen_id) {
            self.bind_screen(topology, screen_id);
            return;
        }
        let mut reg = self.state.lock();
        let Some(id) = reg.display_for_screen(screen_id) else {
            return;
        };
        let heir = group
            .mirror_source
            .filter(|source| reg.display_for_screen(*source).is_none());
        match heir {
            Some(source) => self.rebind(&mut reg, topology, id, source),
            None => self.destroy(&mut reg, topology, id),
        }
    }

    fn rebind(&self, reg: &mut DisplayRegistry, topology: &ScreenTopology, id: DisplayId, target: ScreenId) {
        let mode = Self::mode_for(topology, target);
        let Some(display) = reg.displays.get_mut(&id) else {
            return;
        };
        display.screen_id = Some(target);
        if let Some(screen) = topology.screen(target) {
            display.request_rotation(screen.rotation);
            display.orientation = screen.orientation;
            display.virtual_pixel_ratio = screen.virtual_pixel_ratio;
        }
        if let Some(mode) = mode {
            display.update_size(mode);
        }
        reg.refresh_default(topology);
        self.notify_change(reg, id, DisplayChangeEvent::DisplaySizeChanged);
        info!(display_id = %id.0, screen_id = %target, "display rebound");
    }

    fn destroy(&self, reg: &mut DisplayRegistry, topology: &ScreenTopology, id: DisplayId) {
        let Some(display) = reg.displays.remove(&id) else {
            return;
        };
        reg.refresh_default(topology);
        self.notifier.notify_agents(AgentEvent::DisplayDestroyed(id));
        self.notify_state(reg, display.to_info(), DisplayStateChangeType::Destroy);
        info!(display_id = %id.0, "display destroyed");
    }

    fn follow_screen_change(&self, topology: &ScreenTopology, screen_id: ScreenId, event: DisplayChangeEvent) {
        let mut reg = self.state.lock();
        let Some(id) = reg.display_for_screen(screen_id) else {
            debug!(screen_id = %screen_id, ?event, "change on a screen without display");
            return;
        };
        let Some(screen) = topology.screen(screen_id) else {
            return;
        };
        let mode = Self::mode_for(topology, screen_id);
        let Some(display) = reg.displays.get_mut(&id) else {
            return;
        };

        let changed = match event {
            DisplayChangeEvent::UpdateRotation => display.request_rotation(screen.rotation),
            DisplayChangeEvent::DisplaySizeChanged => mode.is_some_and(|m| display.update_size(m)),
            DisplayChangeEvent::UpdateOrientation => {
                let changed = display.orientation != screen.orientation;
                display.orientation = screen.orientation;
                changed
            }
            DisplayChangeEvent::UpdateVirtualPixelRatio => {
                let changed = display.virtual_pixel_ratio != screen.virtual_pixel_ratio;
                display.virtual_pixel_ratio = screen.virtual_pixel_ratio;
                changed
            }
            DisplayChangeEvent::DisplayFreezed | DisplayChangeEvent::DisplayUnfreezed => false,
        };
        if changed {
            self.notify_change(&reg, id, event);
        }
    }
}

impl ScreenCallback for DisplayController {
    fn on_connect(&self, topology: &ScreenTopology, screen_id: ScreenId) {
        self.bind_screen(topology, screen_id);
    }

    fn on_disconnect(&self, topology: &ScreenTopology, departed: &DepartedScreen) {
        self.unbind_screen(topology, departed);
    }

    fn on_role_change(&self, topology: &ScreenTopology, screen_id: ScreenId) {
        self.reassign_screen(topology, screen_id);
    }

    fn on_change(&self, topology: &ScreenTopology, screen_id: ScreenId, event: DisplayChangeEvent) {
        self.follow_screen_change(topology, screen_id, event);
    }
}

fn is_mirror_secondary(group: &ScreenGroup, screen_id: ScreenId) -> bool {
    group.combination == ScreenCombination::Mirror
        && group.mirror_source != Some(screen_id)
        && group.child_count() > 1
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use crate::application::screen_controller::ScreenController;
    use crate::infrastructure::notification::mock::{RecordingListener, RecordingSink};
    use crate::infrastructure::renderer::mock::{CaptureBehavior, MockRenderer};
    use crate::infrastructure::worker::{WorkerHandle, WorkerQueue};
    use dms_core::Point;

    struct Fixture {
        renderer: Arc<MockRenderer>,
        sink: Arc<RecordingSink>,
        listener: Arc<RecordingListener>,
        queue: WorkerQueue,
        screens: Arc<ScreenController>,
        displays: Arc<DisplayController>,
        _handle: WorkerHandle,
    }

    impl Fixture {
        fn new() -> Self {
            let (queue, handle) = WorkerQueue::start("test-display").expect("spawn");
            let renderer = Arc::new(MockRenderer::new());
            let sink = Arc::new(RecordingSink::new());
            let listener = Arc::new(RecordingListener::new());
            let notifier = Notifier::new(queue.clone(), sink.clone());
            notifier.set_display_change_listener(listener.clone());
            let screens = ScreenController::new(renderer.clone(), notifier.clone(), queue.clone());
            let displays = Arc::new(DisplayController::new(
                renderer.clone(),
                notifier,
                Duration::from_millis(100),
            ));
            screens.set_callback(displays.clone());
            Self { renderer, sink, listener, queue, screens, displays, _handle: handle }
        }

        fn connect(&self, rs: u64, width: u32, height: u32) -> ScreenId {
            self.renderer
                .add_screen(RsScreenId(rs), vec![ScreenMode::new(width, height, 60)], 0);
            self.screens.on_connected(RsScreenId(rs));
            self.screens
                .with_topology(|t| t.id_table().to_stable(RsScreenId(rs)))
                .expect("registered")
        }

        fn flush(&self) {
            assert!(self.queue.flush(Duration::from_secs(2)));
        }
    }

    #[test]
    fn test_connected_screen_gets_display() {
        // Arrange
        let fx = Fixture::new();

        // Act
        let screen = fx.connect(7, 1080, 1920);
        fx.flush();

        // Assert
        let id = fx.displays.display_id_by_screen(screen).expect("bound");
        let info = fx.displays.display_info(id).expect("info");
        assert_eq!((info.width, info.height, info.refresh_rate), (1080, 1920, 60));
        assert_eq!(fx.displays.default_display_id(), Some(id));
        assert_eq!(fx.sink.count(|e| matches!(e, AgentEvent::DisplayCreated(_))), 1);
        assert_eq!(fx.listener.changes()[0].kind, DisplayStateChangeType::Create);
    }

    #[test]
    fn test_placeholder_is_adopted_by_first_screen() {
        let fx = Fixture::new();
        let placeholder = fx.displays.create_placeholder();

        let screen = fx.connect(7, 1080, 1920);

        assert_eq!(fx.displays.display_id_by_screen(screen), Some(placeholder));
        assert_eq!(fx.displays.all_display_ids(), vec![placeholder]);
    }

    #[test]
    fn test_disconnecting_last_screen_destroys_display() {
        let fx = Fixture::new();
        fx.connect(7, 1080, 1920);

        fx.screens.on_disconnected(RsScreenId(7));
        fx.flush();

        assert!(fx.displays.all_display_ids().is_empty());
        assert_eq!(fx.displays.default_display_id(), None);
        assert_eq!(fx.sink.count(|e| matches!(e, AgentEvent::DisplayDestroyed(_))), 1);
    }

    #[test]
    fn test_mirror_secondary_loses_its_display() {
        // Arrange
        let fx = Fixture::new();
        let a = fx.connect(1, 1080, 1920);
        let b = fx.connect(2, 1920, 1080);
        assert_eq!(fx.displays.all_display_ids().len(), 2);

        // Act
        fx.screens.make_mirror(a, &[b]).expect("mirror");

        // Assert
        assert!(fx.displays.display_id_by_screen(a).is_some());
        assert!(fx.displays.display_id_by_screen(b).is_none());
        assert_eq!(fx.displays.all_display_ids().len(), 1);
    }

    #[test]
    fn test_mirror_source_leaving_rebinds_display() {
        // Arrange
        let fx = Fixture::new();
        let a = fx.connect(1, 1080, 1920);
        let b = fx.connect(2, 1920, 1080);
        fx.screens.make_mirror(a, &[b]).expect("mirror");
        let display = fx.displays.display_id_by_screen(a).expect("source display");

        // Act
        fx.renderer.unplug(RsScreenId(1));
        fx.screens.on_disconnected(RsScreenId(1));

        // Assert
        assert_eq!(fx.displays.screen_id_by_display(display), Some(b));
        let info = fx.displays.display_info(display).expect("info");
        assert_eq!((info.width, info.height), (1920, 1080));
    }

    #[test]
    fn test_unlisted_expand_member_loses_display_when_group_turns_mirror() {
        // Arrange
        let fx = Fixture::new();
        let a = fx.connect(1, 1080, 1920);
        let b = fx.connect(2, 1920, 1080);
        let c = fx.connect(3, 1920, 1080);
        fx.screens
            .make_expand(&[b, c], &[Point::new(1080, 0), Point::new(3000, 0)])
            .expect("expand");
        assert_eq!(fx.displays.all_display_ids().len(), 3);

        // Act
        fx.screens.make_mirror(a, &[b]).expect("mirror");

        // Assert
        assert!(fx.displays.display_id_by_screen(a).is_some());
        assert_eq!(fx.displays.display_id_by_screen(b), None);
        assert_eq!(fx.displays.display_id_by_screen(c), None);
        assert_eq!(fx.displays.all_display_ids().len(), 1);
        assert_eq!(fx.renderer.mirror_node_count(), 2);
    }

    #[test]
    fn test_unlisted_mirror_secondary_gains_display_when_group_turns_expand() {
        // Arrange
        let fx = Fixture::new();
        let a = fx.connect(1, 1080, 1920);
        let b = fx.connect(2, 1920, 1080);
        let c = fx.connect(3, 1920, 1080);
        fx.screens.make_mirror(a, &[b, c]).expect("mirror");
        assert_eq!(fx.displays.all_display_ids().len(), 1);

        // Act
        fx.screens.make_expand(&[b], &[Point::new(1080, 0)]).expect("expand");

        // Assert
        for screen in [a, b, c] {
            assert!(fx.displays.display_id_by_screen(screen).is_some(), "{screen} has no display");
        }
        assert_eq!(fx.renderer.mirror_node_count(), 0);
    }

    #[test]
    fn test_new_mirror_source_inherits_display_of_demoted_source() {
        // Arrange
        let fx = Fixture::new();
        let a = fx.connect(1, 1080, 1920);
        let b = fx.connect(2, 1920, 1080);
        let c = fx.connect(3, 1920, 1080);
        fx.screens.make_mirror(a, &[b, c]).expect("mirror");
        let display = fx.displays.display_id_by_screen(a).expect("source display");

        // Act: b takes over as source, a is left unlisted
        fx.screens.make_mirror(b, &[c]).expect("re-mirror");

        // Assert
        assert_eq!(fx.displays.screen_id_by_display(display), Some(b));
        assert_eq!(fx.displays.display_id_by_screen(a), None);
        assert_eq!(fx.displays.all_display_ids(), vec![display]);
    }

    #[test]
    fn test_expand_member_leaving_destroys_its_display() {
        let fx = Fixture::new();
        let a = fx.connect(1, 1080, 1920);
        let b = fx.connect(2, 1920, 1080);
        fx.screens.make_expand(&[b], &[Point::new(1080, 0)]).expect("expand");
        let b_display = fx.displays.display_id_by_screen(b).expect("expand member display");

        fx.screens.on_disconnected(RsScreenId(2));

        assert!(fx.displays.display_info(b_display).is_none());
        assert!(fx.displays.display_id_by_screen(a).is_some());
    }

    #[test]
    fn test_screen_rotation_swaps_display_size() {
        let fx = Fixture::new();
        let a = fx.connect(1, 1080, 1920);

        fx.screens.set_rotation(a, Rotation::Rotation90).expect("rotate");

        let id = fx.displays.display_id_by_screen(a).expect("bound");
        let info = fx.displays.display_info(id).expect("info");
        assert_eq!((info.width, info.height, info.rotation), (1920, 1080, Rotation::Rotation90));
    }

    #[test]
    fn test_apply_rotation_unknown_display_is_not_found() {
        let fx = Fixture::new();

        let result = fx.displays.apply_rotation(DisplayId(9), Rotation::Rotation90);

        assert!(matches!(result, Err(DmError::NotFound { .. })));
    }

    #[test]
    fn test_apply_same_rotation_is_noop() {
        let fx = Fixture::new();
        let a = fx.connect(1, 1080, 1920);
        let id = fx.displays.display_id_by_screen(a).expect("bound");

        assert_eq!(fx.displays.apply_rotation(id, Rotation::Rotation0), Ok(false));
        assert_eq!(fx.displays.apply_rotation(id, Rotation::Rotation180), Ok(true));
    }

    #[test]
    fn test_resize_if_needed_reports_change_once() {
        let fx = Fixture::new();
        let a = fx.connect(1, 1080, 1920);
        let id = fx.displays.display_id_by_screen(a).expect("bound");

        assert!(fx.displays.resize_if_needed(id, ScreenMode::new(720, 1280, 60)));
        assert!(!fx.displays.resize_if_needed(id, ScreenMode::new(720, 1280, 60)));
    }

    #[test]
    fn test_freeze_notifies_once_per_transition() {
        // Arrange
        let fx = Fixture::new();
        let a = fx.connect(1, 1080, 1920);
        let id = fx.displays.display_id_by_screen(a).expect("bound");
        fx.flush();
        fx.sink.take();

        // Act
        fx.displays.set_freeze(&[id, DisplayId(99)], true);
        fx.displays.set_freeze(&[id], true);
        fx.displays.set_freeze(&[id], false);
        fx.flush();

        // Assert
        let events: Vec<_> = fx
            .sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                AgentEvent::DisplayChanged { event, .. } => Some(event),
                _ => None,
            })
            .collect();
        assert_eq!(events, vec![DisplayChangeEvent::DisplayFreezed, DisplayChangeEvent::DisplayUnfreezed]);
    }

    #[test]
    fn test_snapshot_returns_frame() {
        let fx = Fixture::new();
        fx.renderer.add_screen(RsScreenId(1), vec![ScreenMode::new(4, 4, 60)], 0);

        let frame = fx.displays.snapshot_screen(RsScreenId(1)).expect("frame");

        assert_eq!(frame.data.len(), 64);
    }

    #[test]
    fn test_snapshot_times_out_when_renderer_never_answers() {
        let fx = Fixture::new();
        fx.renderer.add_screen(RsScreenId(1), vec![ScreenMode::new(4, 4, 60)], 0);
        fx.renderer.set_capture_behavior(CaptureBehavior::Never);

        let result = fx.displays.snapshot_screen(RsScreenId(1));

        assert_eq!(result, Err(DmError::Timeout(100)));
    }

    #[test]
    fn test_snapshot_failure_maps_to_renderer_failure() {
        let fx = Fixture::new();
        fx.renderer.add_screen(RsScreenId(1), vec![ScreenMode::new(4, 4, 60)], 0);

        fx.renderer.set_capture_behavior(CaptureBehavior::Fail);
        assert!(matches!(
            fx.displays.snapshot_screen(RsScreenId(1)),
            Err(DmError::RendererFailure(_))
        ));

        fx.renderer.set_capture_behavior(CaptureBehavior::Reject);
        assert!(matches!(
            fx.displays.snapshot_screen(RsScreenId(1)),
            Err(DmError::RendererFailure(_))
        ));
    }
}
