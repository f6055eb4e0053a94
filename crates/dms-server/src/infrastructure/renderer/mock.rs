//! In-memory renderer for tests and headless runs.
//!
//! Tests script hot-plug events with [`MockRenderer::plug`] /
//! [`MockRenderer::unplug`], inject failures, and inspect what the display
//! manager asked the renderer to do.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use dms_core::{
    NodeId, Rotation, RsScreenId, ScreenColorGamut, ScreenGamutMap, ScreenMode, ScreenPowerState,
};

use super::{
    CaptureCallback, PixelBuffer, Renderer, RendererError, RendererScreenEvent,
    ScreenEventCallback, VirtualScreenRequest,
};

/// First renderer id handed out for virtual outputs.
const FIRST_VIRTUAL_ID: u64 = 1000;

/// How [`MockRenderer::take_surface_capture`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureBehavior {
    /// Deliver a frame of the active mode's size synchronously.
    #[default]
    Immediate,
    /// Invoke the callback with `None`.
    Fail,
    /// Accept the request but hold the callback until
    /// [`MockRenderer::complete_pending_captures`].
    Never,
    /// Refuse the request outright.
    Reject,
}

#[derive(Debug, Clone)]
struct MockScreen {
    modes: Vec<ScreenMode>,
    active: usize,
    is_virtual: bool,
    power: ScreenPowerState,
    brightness: u32,
    gamut_idx: usize,
    gamut_map: ScreenGamutMap,
}

impl MockScreen {
    fn new(modes: Vec<ScreenMode>, active: usize, is_virtual: bool) -> Self {
        Self {
            modes,
            active,
            is_virtual,
            power: ScreenPowerState::On,
            brightness: 128,
            gamut_idx: 0,
            gamut_map: ScreenGamutMap::Constant,
        }
    }
}

#[derive(Default)]
struct MockState {
    screens: BTreeMap<RsScreenId, MockScreen>,
    default: Option<RsScreenId>,
    next_virtual: u64,
    next_node: u64,
    subscribe_failures_left: u32,
    subscribe_attempts: u32,
    capture: CaptureBehavior,
    pending_captures: Vec<CaptureCallback>,
    rotation_requests: Vec<(RsScreenId, Rotation)>,
    mirror_nodes: HashMap<NodeId, (RsScreenId, RsScreenId)>,
    removed_virtual: Vec<RsScreenId>,
    fail_virtual_creation: bool,
    fail_color_requests: bool,
    fail_rotation_requests: bool,
}

/// A scriptable in-memory [`Renderer`].
pub struct MockRenderer {
    state: Mutex<MockState>,
    callback: Mutex<Option<Arc<ScreenEventCallback>>>,
}

const GAMUTS: [ScreenColorGamut; 3] = [
    ScreenColorGamut::Native,
    ScreenColorGamut::Srgb,
    ScreenColorGamut::DisplayP3,
];

impl MockRenderer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_virtual: FIRST_VIRTUAL_ID,
                ..MockState::default()
            }),
            callback: Mutex::new(None),
        }
    }

    /// Registers an output without emitting an event.
    ///
    /// The first real output becomes the default screen.
    pub fn add_screen(&self, id: RsScreenId, modes: Vec<ScreenMode>, active: usize) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.screens.insert(id, MockScreen::new(modes, active, false));
        if state.default.is_none() {
            state.default = Some(id);
        }
    }

    /// Registers an output and emits `Connected`.
    pub fn plug(&self, id: RsScreenId, modes: Vec<ScreenMode>, active: usize) {
        self.add_screen(id, modes, active);
        self.emit(id, RendererScreenEvent::Connected);
    }

    /// Removes an output and emits `Disconnected`.
    ///
    /// When the default output is removed, the lowest remaining real output
    /// becomes the default.
    pub fn unplug(&self, id: RsScreenId) {
        {
            let mut state = self.state.lock().expect("lock poisoned");
            state.screens.remove(&id);
            if state.default == Some(id) {
                state.default = state
                    .screens
                    .iter()
                    .find(|(_, s)| !s.is_virtual)
                    .map(|(rs, _)| *rs);
            }
        }
        self.emit(id, RendererScreenEvent::Disconnected);
    }

    /// Switches the active mode from the renderer side and emits `ModeChanged`.
    pub fn change_mode(&self, id: RsScreenId, active: usize) {
        {
            let mut state = self.state.lock().expect("lock poisoned");
            if let Some(screen) = state.screens.get_mut(&id) {
                screen.active = active;
            }
        }
        self.emit(id, RendererScreenEvent::ModeChanged);
    }

    pub fn set_default_screen(&self, id: Option<RsScreenId>) {
        self.state.lock().expect("lock poisoned").default = id;
    }

    /// Makes the next `count` subscription attempts fail.
    pub fn fail_next_subscriptions(&self, count: u32) {
        self.state.lock().expect("lock poisoned").subscribe_failures_left = count;
    }

    pub fn subscribe_attempts(&self) -> u32 {
        self.state.lock().expect("lock poisoned").subscribe_attempts
    }

    pub fn has_subscriber(&self) -> bool {
        self.callback.lock().expect("lock poisoned").is_some()
    }

    pub fn set_capture_behavior(&self, behavior: CaptureBehavior) {
        self.state.lock().expect("lock poisoned").capture = behavior;
    }

    /// Delivers an empty frame to every capture held by [`CaptureBehavior::Never`].
    pub fn complete_pending_captures(&self) {
        let pending = std::mem::take(&mut self.state.lock().expect("lock poisoned").pending_captures);
        for callback in pending {
            callback(Some(PixelBuffer { width: 0, height: 0, data: Vec::new() }));
        }
    }

    pub fn fail_virtual_screen_creation(&self, fail: bool) {
        self.state.lock().expect("lock poisoned").fail_virtual_creation = fail;
    }

    pub fn fail_color_requests(&self, fail: bool) {
        self.state.lock().expect("lock poisoned").fail_color_requests = fail;
    }

    pub fn fail_rotation_requests(&self, fail: bool) {
        self.state.lock().expect("lock poisoned").fail_rotation_requests = fail;
    }

    pub fn rotation_requests(&self) -> Vec<(RsScreenId, Rotation)> {
        self.state.lock().expect("lock poisoned").rotation_requests.clone()
    }

    pub fn mirror_node_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").mirror_nodes.len()
    }

    pub fn removed_virtual_screens(&self) -> Vec<RsScreenId> {
        self.state.lock().expect("lock poisoned").removed_virtual.clone()
    }

    pub fn contains_screen(&self, id: RsScreenId) -> bool {
        self.state.lock().expect("lock poisoned").screens.contains_key(&id)
    }

    fn emit(&self, id: RsScreenId, event: RendererScreenEvent) {
        let callback = self.callback.lock().expect("lock poisoned").clone();
        if let Some(callback) = callback {
            callback(id, event);
        }
    }

    fn with_screen<T>(
        &self,
        id: RsScreenId,
        f: impl FnOnce(&mut MockScreen) -> T,
    ) -> Result<T, RendererError> {
        let mut state = self.state.lock().expect("lock poisoned");
        state
            .screens
            .get_mut(&id)
            .map(f)
            .ok_or(RendererError::UnknownScreen(id))
    }

    fn with_color_screen<T>(
        &self,
        id: RsScreenId,
        f: impl FnOnce(&mut MockScreen) -> T,
    ) -> Result<T, RendererError> {
        if self.state.lock().expect("lock poisoned").fail_color_requests {
            return Err(RendererError::Rejected("color management unavailable".to_string()));
        }
        self.with_screen(id, f)
    }
}

impl Default for MockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for MockRenderer {
    fn subscribe_screen_events(&self, callback: ScreenEventCallback) -> Result<(), RendererError> {
        {
            let mut state = self.state.lock().expect("lock poisoned");
            state.subscribe_attempts += 1;
            if state.subscribe_failures_left > 0 {
                state.subscribe_failures_left -= 1;
                return Err(RendererError::Unavailable);
            }
        }
        *self.callback.lock().expect("lock poisoned") = Some(Arc::new(callback));
        Ok(())
    }

    fn default_screen_id(&self) -> Option<RsScreenId> {
        self.state.lock().expect("lock poisoned").default
    }

    fn supported_modes(&self, id: RsScreenId) -> Vec<ScreenMode> {
        self.with_screen(id, |s| s.modes.clone()).unwrap_or_default()
    }

    fn active_mode_index(&self, id: RsScreenId) -> Option<usize> {
        self.with_screen(id, |s| s.active).ok()
    }

    fn set_active_mode(&self, id: RsScreenId, mode_idx: usize) -> Result<(), RendererError> {
        self.with_screen(id, |s| {
            if mode_idx < s.modes.len() {
                s.active = mode_idx;
                Ok(())
            } else {
                Err(RendererError::Rejected(format!("mode {mode_idx} out of range")))
            }
        })?
    }

    fn create_virtual_screen(&self, request: &VirtualScreenRequest) -> Result<RsScreenId, RendererError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.fail_virtual_creation {
            return Err(RendererError::Rejected("virtual screen creation disabled".to_string()));
        }
        let id = RsScreenId(state.next_virtual);
        state.next_virtual += 1;
        let mode = ScreenMode::new(request.width, request.height, 0);
        state.screens.insert(id, MockScreen::new(vec![mode], 0, true));
        Ok(id)
    }

    fn remove_virtual_screen(&self, id: RsScreenId) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.screens.remove(&id);
        state.removed_virtual.push(id);
    }

    fn create_mirror_node(&self, target: RsScreenId, source: RsScreenId) -> Result<NodeId, RendererError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if !state.screens.contains_key(&target) {
            return Err(RendererError::UnknownScreen(target));
        }
        let node = NodeId(state.next_node);
        state.next_node += 1;
        state.mirror_nodes.insert(node, (target, source));
        Ok(node)
    }

    fn remove_mirror_node(&self, node: NodeId) {
        self.state.lock().expect("lock poisoned").mirror_nodes.remove(&node);
    }

    fn take_surface_capture(&self, id: RsScreenId, callback: CaptureCallback) -> Result<(), RendererError> {
        let mut state = self.state.lock().expect("lock poisoned");
        let screen = state.screens.get(&id).ok_or(RendererError::UnknownScreen(id))?;
        let mode = screen.modes.get(screen.active).copied().unwrap_or_default();
        let behavior = state.capture;
        match behavior {
            CaptureBehavior::Immediate => {
                drop(state);
                let len = (mode.width * mode.height * 4) as usize;
                callback(Some(PixelBuffer {
                    width: mode.width,
                    height: mode.height,
                    data: vec![0; len],
                }));
            }
            CaptureBehavior::Fail => {
                drop(state);
                callback(None);
            }
            CaptureBehavior::Never => state.pending_captures.push(callback),
            CaptureBehavior::Reject => {
                return Err(RendererError::Rejected("capture refused".to_string()))
            }
        }
        Ok(())
    }

    fn request_rotation(&self, id: RsScreenId, rotation: Rotation) -> Result<(), RendererError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if !state.screens.contains_key(&id) {
            return Err(RendererError::UnknownScreen(id));
        }
        if state.fail_rotation_requests {
            return Err(RendererError::Rejected(format!("rotation of {id}")));
        }
        state.rotation_requests.push((id, rotation));
        Ok(())
    }

    fn screen_power(&self, id: RsScreenId) -> Result<ScreenPowerState, RendererError> {
        self.with_screen(id, |s| s.power)
    }

    fn set_screen_power(&self, id: RsScreenId, power: ScreenPowerState) -> Result<(), RendererError> {
        self.with_screen(id, |s| s.power = power)
    }

    fn screen_brightness(&self, id: RsScreenId) -> Result<u32, RendererError> {
        self.with_screen(id, |s| s.brightness)
    }

    fn set_screen_brightness(&self, id: RsScreenId, level: u32) -> Result<(), RendererError> {
        self.with_screen(id, |s| s.brightness = level)
    }

    fn supported_color_gamuts(&self, id: RsScreenId) -> Result<Vec<ScreenColorGamut>, RendererError> {
        self.with_color_screen(id, |_| GAMUTS.to_vec())
    }

    fn color_gamut(&self, id: RsScreenId) -> Result<ScreenColorGamut, RendererError> {
        self.with_color_screen(id, |s| GAMUTS[s.gamut_idx])
    }

    fn set_color_gamut(&self, id: RsScreenId, gamut_idx: usize) -> Result<(), RendererError> {
        self.with_color_screen(id, |s| {
            if gamut_idx < GAMUTS.len() {
                s.gamut_idx = gamut_idx;
                Ok(())
            } else {
                Err(RendererError::Rejected(format!("gamut {gamut_idx} out of range")))
            }
        })?
    }

    fn gamut_map(&self, id: RsScreenId) -> Result<ScreenGamutMap, RendererError> {
        self.with_color_screen(id, |s| s.gamut_map)
    }

    fn set_gamut_map(&self, id: RsScreenId, map: ScreenGamutMap) -> Result<(), RendererError> {
        self.with_color_screen(id, |s| s.gamut_map = map)
    }

    fn set_color_transform(&self, id: RsScreenId) -> Result<(), RendererError> {
        self.with_color_screen(id, |_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portrait() -> Vec<ScreenMode> {
        vec![ScreenMode::new(1080, 1920, 60)]
    }

    #[test]
    fn test_mock_renderer_first_real_screen_becomes_default() {
        // Arrange
        let renderer = MockRenderer::new();

        // Act
        renderer.add_screen(RsScreenId(7), portrait(), 0);
        renderer.add_screen(RsScreenId(8), portrait(), 0);

        // Assert
        assert_eq!(renderer.default_screen_id(), Some(RsScreenId(7)));
    }

    #[test]
    fn test_mock_renderer_unplugging_default_promotes_next_real_screen() {
        let renderer = MockRenderer::new();
        renderer.add_screen(RsScreenId(7), portrait(), 0);
        renderer.add_screen(RsScreenId(8), portrait(), 0);

        renderer.unplug(RsScreenId(7));

        assert_eq!(renderer.default_screen_id(), Some(RsScreenId(8)));
    }

    #[test]
    fn test_mock_renderer_plug_invokes_subscriber() {
        // Arrange
        let renderer = MockRenderer::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        renderer
            .subscribe_screen_events(Box::new(move |id, event| {
                sink.lock().expect("lock poisoned").push((id, event));
            }))
            .expect("subscribe");

        // Act
        renderer.plug(RsScreenId(3), portrait(), 0);
        renderer.unplug(RsScreenId(3));

        // Assert
        assert_eq!(
            *seen.lock().expect("lock poisoned"),
            vec![
                (RsScreenId(3), RendererScreenEvent::Connected),
                (RsScreenId(3), RendererScreenEvent::Disconnected),
            ]
        );
    }

    #[test]
    fn test_mock_renderer_scripted_subscription_failures() {
        let renderer = MockRenderer::new();
        renderer.fail_next_subscriptions(2);

        assert!(renderer.subscribe_screen_events(Box::new(|_, _| {})).is_err());
        assert!(renderer.subscribe_screen_events(Box::new(|_, _| {})).is_err());
        assert!(renderer.subscribe_screen_events(Box::new(|_, _| {})).is_ok());
        assert_eq!(renderer.subscribe_attempts(), 3);
        assert!(renderer.has_subscriber());
    }

    #[test]
    fn test_mock_renderer_capture_immediate_delivers_active_mode_frame() {
        let renderer = MockRenderer::new();
        renderer.add_screen(RsScreenId(1), vec![ScreenMode::new(4, 2, 60)], 0);
        let frame = Arc::new(Mutex::new(None));
        let out = Arc::clone(&frame);

        renderer
            .take_surface_capture(
                RsScreenId(1),
                Box::new(move |buf| *out.lock().expect("lock poisoned") = buf),
            )
            .expect("capture accepted");

        let frame = frame.lock().expect("lock poisoned").clone().expect("frame delivered");
        assert_eq!((frame.width, frame.height, frame.data.len()), (4, 2, 32));
    }

    #[test]
    fn test_mock_renderer_virtual_ids_start_above_physical_range() {
        let renderer = MockRenderer::new();
        let request = VirtualScreenRequest {
            name: "v".to_string(),
            width: 800,
            height: 600,
            surface: None,
            mirror_of: None,
            flags: 0,
        };

        let id = renderer.create_virtual_screen(&request).expect("created");

        assert_eq!(id, RsScreenId(FIRST_VIRTUAL_ID));
        assert_eq!(renderer.supported_modes(id), vec![ScreenMode::new(800, 600, 0)]);
    }
}
