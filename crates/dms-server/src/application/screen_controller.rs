//! Screen identity and topology manager.
//!
//! Owns every [`Screen`], every [`ScreenGroup`] and the renderer-id
//! translation table.  It reacts to renderer hot-plug events, decides group
//! membership (alone / mirror / expand), manages virtual screens on behalf of
//! agents and forwards per-screen property changes to the renderer.
//!
//! # Locking (for beginners)
//!
//! All topology state sits behind one `parking_lot::Mutex`.  Whenever the
//! topology changes in a way that affects displays, the controller calls the
//! registered [`ScreenCallback`] *while still holding the lock* and hands it a
//! read-only `&ScreenTopology`.  The callback (the display controller) takes
//! its own lock next, so the global order is always:
//!
//! ```text
//! topology lock  ──►  display lock
//! ```
//!
//! Nothing ever acquires them the other way round, and notifications are
//! posted to the worker queue instead of being delivered inline.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use dms_core::{
    AgentId, DisplayChangeEvent, DmError, NodeId, Orientation, Point, Rotation, RsScreenId,
    Screen, ScreenChangeEvent, ScreenColorGamut, ScreenCombination, ScreenGamutMap, ScreenGroup,
    ScreenGroupChangeEvent, ScreenGroupInfo, ScreenId, ScreenIdTable, ScreenInfo, ScreenMode,
    ScreenPowerState, ScreenSourceMode, ScreenType,
};

use crate::infrastructure::notification::{AgentEvent, Notifier};
use crate::infrastructure::renderer::{
    Renderer, RendererScreenEvent, ScreenEventCallback, VirtualScreenRequest,
};
use crate::infrastructure::worker::{TaskPriority, WorkerQueue};

// ── Callback seam ─────────────────────────────────────────────────────────────

/// A screen that just left its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartedScreen {
    pub screen_id: ScreenId,
    pub group_id: ScreenId,
    /// Combination of the group *before* the screen left.
    pub combination: ScreenCombination,
    /// Members still in the group after the departure.
    pub remaining: Vec<ScreenId>,
}

/// Receives topology changes that affect displays.
///
/// Every method runs under the topology lock; implementations must not call
/// back into the [`ScreenController`].
pub trait ScreenCallback: Send + Sync {
    /// A screen joined a group.
    fn on_connect(&self, topology: &ScreenTopology, screen_id: ScreenId);

    /// A screen left its group.
    fn on_disconnect(&self, topology: &ScreenTopology, departed: &DepartedScreen);

    /// A screen stayed in its group while its role there changed, e.g. an
    /// expand member that is now a mirror secondary.
    fn on_role_change(&self, topology: &ScreenTopology, screen_id: ScreenId);

    /// A property of a grouped screen changed.
    fn on_change(&self, topology: &ScreenTopology, screen_id: ScreenId, event: DisplayChangeEvent);
}

/// Parameters of a virtual screen requested by an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualScreenOption {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Becomes the screen's virtual pixel ratio.
    pub density: f32,
    /// Consumer surface the renderer draws the virtual output into.
    pub surface: Option<u64>,
    pub flags: u32,
}

/// Combination a group change moves its entries into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupTarget {
    Mirror { source: ScreenId },
    Expand,
}

impl GroupTarget {
    fn combination(self) -> ScreenCombination {
        match self {
            GroupTarget::Mirror { .. } => ScreenCombination::Mirror,
            GroupTarget::Expand => ScreenCombination::Expand,
        }
    }
}

/// Result of [`ScreenController::set_orientation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationUpdate {
    pub changed: bool,
    /// Orientation in effect after the call.
    pub orientation: Orientation,
}

// ── Topology state ────────────────────────────────────────────────────────────

/// Registry of screens and groups.  Only reachable through the controller's
/// lock.
#[derive(Debug, Default)]
pub struct ScreenTopology {
    ids: ScreenIdTable,
    screens: HashMap<ScreenId, Screen>,
    groups: HashMap<ScreenId, ScreenGroup>,
    agents: HashMap<AgentId, Vec<ScreenId>>,
    mirror_nodes: HashMap<ScreenId, NodeId>,
    default_rs: Option<RsScreenId>,
}

impl ScreenTopology {
    pub fn screen(&self, id: ScreenId) -> Option<&Screen> {
        self.screens.get(&id)
    }

    pub fn group(&self, id: ScreenId) -> Option<&ScreenGroup> {
        self.groups.get(&id)
    }

    /// Group the screen currently belongs to.
    pub fn group_of(&self, screen_id: ScreenId) -> Option<&ScreenGroup> {
        self.screens
            .get(&screen_id)?
            .group_id
            .and_then(|group_id| self.groups.get(&group_id))
    }

    pub fn is_group(&self, id: ScreenId) -> bool {
        self.groups.contains_key(&id)
    }

    /// Stable id of the renderer's default screen, if it is registered.
    pub fn default_screen_id(&self) -> Option<ScreenId> {
        let id = self.ids.to_stable(self.default_rs?)?;
        self.screens.contains_key(&id).then_some(id)
    }

    pub fn default_screen(&self) -> Option<&Screen> {
        self.default_screen_id().and_then(|id| self.screens.get(&id))
    }

    /// Role the screen plays in its group.
    pub fn source_mode(&self, screen_id: ScreenId) -> ScreenSourceMode {
        self.group_of(screen_id)
            .map(|g| g.source_mode_of(screen_id, self.default_screen_id()))
            .unwrap_or(ScreenSourceMode::Alone)
    }

    pub fn screen_info(&self, screen_id: ScreenId) -> Option<ScreenInfo> {
        let screen = self.screens.get(&screen_id)?;
        Some(screen.to_info(self.source_mode(screen_id)))
    }

    /// Sorted ids of all non-group screens.
    pub fn screen_ids(&self) -> Vec<ScreenId> {
        let mut ids: Vec<_> = self.screens.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Sorted ids of all groups.
    pub fn group_ids(&self) -> Vec<ScreenId> {
        let mut ids: Vec<_> = self.groups.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn id_table(&self) -> &ScreenIdTable {
        &self.ids
    }

    fn require_screen_mut(&mut self, id: ScreenId) -> Result<&mut Screen, DmError> {
        if self.groups.contains_key(&id) {
            return Err(DmError::InvalidParameter(format!(
                "screen {id} is a group and cannot be modified directly"
            )));
        }
        self.screens.get_mut(&id).ok_or(DmError::screen_not_found(id))
    }

    fn infos(&self, ids: &[ScreenId]) -> Vec<ScreenInfo> {
        ids.iter().filter_map(|id| self.screen_info(*id)).collect()
    }
}

// ── Controller ────────────────────────────────────────────────────────────────

/// Screen identity and topology manager.
pub struct ScreenController {
    weak_self: Weak<ScreenController>,
    state: Mutex<ScreenTopology>,
    renderer: Arc<dyn Renderer>,
    notifier: Notifier,
    queue: WorkerQueue,
    callback: RwLock<Option<Arc<dyn ScreenCallback>>>,
}

impl ScreenController {
    pub fn new(renderer: Arc<dyn Renderer>, notifier: Notifier, queue: WorkerQueue) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            state: Mutex::new(ScreenTopology::default()),
            renderer,
            notifier,
            queue,
            callback: RwLock::new(None),
        })
    }

    /// Installs the topology callback (normally the display controller).
    pub fn set_callback(&self, callback: Arc<dyn ScreenCallback>) {
        *self.callback.write() = Some(callback);
    }

    /// Runs `f` against a consistent view of the topology.
    pub fn with_topology<R>(&self, f: impl FnOnce(&ScreenTopology) -> R) -> R {
        let mut state = self.state.lock();
        self.refresh_default(&mut state);
        f(&state)
    }

    /// Subscribes to renderer hot-plug events, retrying every `retry` until
    /// the renderer accepts.  `max_attempts == 0` retries forever.
    ///
    /// Events are posted to the worker queue with high priority.
    ///
    /// # Errors
    ///
    /// Returns [`DmError::RendererFailure`] once `max_attempts` is exhausted.
    pub fn subscribe_renderer_events(&self, retry: Duration, max_attempts: u32) -> Result<u32, DmError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let weak = self.weak_self.clone();
            let queue = self.queue.clone();
            let callback: ScreenEventCallback = Box::new(move |rs_id, event| {
                let weak = weak.clone();
                queue.post_with_priority(TaskPriority::High, move || {
                    if let Some(controller) = weak.upgrade() {
                        controller.handle_renderer_event(rs_id, event);
                    }
                });
            });
            match self.renderer.subscribe_screen_events(callback) {
                Ok(()) => {
                    info!(attempts, "subscribed to renderer screen events");
                    return Ok(attempts);
                }
                Err(e) if max_attempts != 0 && attempts >= max_attempts => {
                    error!(attempts, "giving up on renderer subscription: {e}");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(attempts, "renderer subscription failed, retrying: {e}");
                    std::thread::sleep(retry);
                }
            }
        }
    }

    /// Dispatches one renderer event.
    pub fn handle_renderer_event(&self, rs_id: RsScreenId, event: RendererScreenEvent) {
        match event {
            RendererScreenEvent::Connected => self.on_connected(rs_id),
            RendererScreenEvent::Disconnected => self.on_disconnected(rs_id),
            RendererScreenEvent::ModeChanged => self.on_mode_changed(rs_id),
        }
    }

    // ── Renderer events ───────────────────────────────────────────────────────

    /// Registers a newly connected renderer screen and places it in a group.
    pub fn on_connected(&self, rs_id: RsScreenId) {
        let mut state = self.state.lock();
        self.refresh_default(&mut state);

        if state.ids.has_renderer_id(rs_id) {
            warn!(%rs_id, "reconnect of an already tracked screen ignored");
            return;
        }

        let modes = self.renderer.supported_modes(rs_id);
        if modes.is_empty() {
            error!(%rs_id, "connected screen reports no modes");
            return;
        }
        let Some(active_idx) = self.renderer.active_mode_index(rs_id).filter(|i| *i < modes.len())
        else {
            error!(%rs_id, mode_count = modes.len(), "connected screen reports an invalid active mode");
            return;
        };

        let id = state.ids.allocate(Some(rs_id));
        let name = format!("Screen_{}", rs_id.0);
        let Some(screen) = Screen::new(id, rs_id, name, ScreenType::Real, modes, active_idx) else {
            state.ids.release(id);
            return;
        };
        state.screens.insert(id, screen);
        if let Some(info) = state.screen_info(id) {
            self.notifier.notify_agents(AgentEvent::ScreenConnected(info));
        }

        self.add_to_new_group(&mut state, id);
        self.notifier.notify_group_changed(
            "on_connected",
            state.infos(&[id]),
            ScreenGroupChangeEvent::AddToGroup,
        );
        if let Some(callback) = self.callback() {
            callback.on_connect(&state, id);
        }
        info!(%rs_id, screen_id = %id, "screen connected");
    }

    /// Removes a disconnected renderer screen.  Unknown ids are ignored.
    pub fn on_disconnected(&self, rs_id: RsScreenId) {
        let mut state = self.state.lock();
        self.refresh_default(&mut state);

        let Some(id) = state.ids.to_stable(rs_id) else {
            debug!(%rs_id, "disconnect of an unknown screen ignored");
            return;
        };
        self.disconnect_locked(&mut state, id);
        info!(%rs_id, screen_id = %id, "screen disconnected");
    }

    /// Re-reads the renderer's active mode for a screen.
    pub fn on_mode_changed(&self, rs_id: RsScreenId) {
        let mut state = self.state.lock();
        self.refresh_default(&mut state);

        let Some(id) = state.ids.to_stable(rs_id) else {
            debug!(%rs_id, "mode change of an unknown screen ignored");
            return;
        };
        let modes = self.renderer.supported_modes(rs_id);
        let active = self.renderer.active_mode_index(rs_id);
        let Some(screen) = state.screens.get_mut(&id) else {
            return;
        };
        let accepted = match active {
            Some(idx) => screen.replace_modes(modes, idx),
            None => false,
        };
        if !accepted {
            error!(%rs_id, ?active, "renderer reported an invalid active mode");
            return;
        }
        self.publish_mode_change(&state, id);
    }

    // ── Virtual screens ───────────────────────────────────────────────────────

    /// Creates a renderer-side virtual screen and registers it.
    ///
    /// The new screen stays ungrouped until a mirror or expand request places
    /// it.
    ///
    /// # Errors
    ///
    /// - [`DmError::InvalidParameter`] for a zero-sized request.
    /// - [`DmError::RendererFailure`] if the renderer refuses.
    pub fn create_virtual_screen(
        &self,
        option: &VirtualScreenOption,
        mirror_of: Option<RsScreenId>,
        agent: Option<AgentId>,
    ) -> Result<ScreenId, DmError> {
        if option.width == 0 || option.height == 0 {
            return Err(DmError::InvalidParameter(format!(
                "virtual screen size {}x{} is empty",
                option.width, option.height
            )));
        }
        let request = VirtualScreenRequest {
            name: option.name.clone(),
            width: option.width,
            height: option.height,
            surface: option.surface,
            mirror_of,
            flags: option.flags,
        };

        let mut state = self.state.lock();
        self.refresh_default(&mut state);

        let rs_id = self.renderer.create_virtual_screen(&request)?;
        if let Some(existing) = state.ids.to_stable(rs_id) {
            debug!(%rs_id, screen_id = %existing, "virtual screen already tracked");
            return Ok(existing);
        }

        let refresh_rate = state
            .default_screen()
            .and_then(Screen::active_mode)
            .map_or(0, |m| m.refresh_rate);
        let mode = ScreenMode::new(option.width, option.height, refresh_rate);

        let id = state.ids.allocate(Some(rs_id));
        let Some(mut screen) = Screen::new(id, rs_id, option.name.clone(), ScreenType::Virtual, vec![mode], 0)
        else {
            state.ids.release(id);
            return Err(DmError::InvalidParameter("virtual screen mode rejected".to_string()));
        };
        screen.virtual_pixel_ratio = option.density;
        screen.owner = agent;
        state.screens.insert(id, screen);
        if let Some(agent) = agent {
            state.agents.entry(agent).or_default().push(id);
        }

        if let Some(info) = state.screen_info(id) {
            self.notifier.notify_agents(AgentEvent::ScreenConnected(info));
        }
        info!(%rs_id, screen_id = %id, name = %option.name, "virtual screen created");
        Ok(id)
    }

    /// Destroys a virtual screen.
    ///
    /// # Errors
    ///
    /// - [`DmError::NotFound`] when the id has no renderer mapping; the
    ///   registry is left untouched.
    /// - [`DmError::InvalidParameter`] for a real screen.
    pub fn destroy_virtual_screen(&self, id: ScreenId) -> Result<(), DmError> {
        let rs_id = {
            let mut state = self.state.lock();
            self.refresh_default(&mut state);

            let rs_id = state.ids.to_renderer(id).ok_or(DmError::screen_not_found(id))?;
            let is_virtual = state
                .screens
                .get(&id)
                .is_some_and(|s| s.screen_type == ScreenType::Virtual);
            if !is_virtual {
                return Err(DmError::InvalidParameter(format!("screen {id} is not virtual")));
            }
            self.disconnect_locked(&mut state, id);
            rs_id
        };
        self.renderer.remove_virtual_screen(rs_id);
        info!(screen_id = %id, %rs_id, "virtual screen destroyed");
        Ok(())
    }

    /// Destroys every virtual screen owned by a dead agent.
    ///
    /// Returns the number of screens destroyed.
    pub fn on_agent_died(&self, agent: AgentId) -> usize {
        let owned = self.state.lock().agents.remove(&agent).unwrap_or_default();
        let mut destroyed = 0;
        for id in owned {
            match self.destroy_virtual_screen(id) {
                Ok(()) => destroyed += 1,
                Err(e) => debug!(screen_id = %id, "agent screen already gone: {e}"),
            }
        }
        if destroyed > 0 {
            info!(%agent, destroyed, "cleaned up virtual screens of dead agent");
        }
        destroyed
    }

    // ── Group changes ─────────────────────────────────────────────────────────

    /// Mirrors `source` onto `targets`.
    ///
    /// # Errors
    ///
    /// - [`DmError::NotFound`] for an unknown source.
    /// - [`DmError::InvalidParameter`] when the source is not a real screen or
    ///   no target remains after removing the source.
    pub fn make_mirror(&self, source: ScreenId, targets: &[ScreenId]) -> Result<ScreenId, DmError> {
        let mut state = self.state.lock();
        self.refresh_default(&mut state);
        self.make_mirror_locked(&mut state, source, targets)
    }

    /// Tiles `targets` at `offsets` into the default screen's group.
    ///
    /// # Errors
    ///
    /// - [`DmError::InvalidParameter`] when the lengths differ, the list is
    ///   empty or there is no grouped default screen.
    pub fn make_expand(&self, targets: &[ScreenId], offsets: &[Point]) -> Result<ScreenId, DmError> {
        if targets.len() != offsets.len() {
            return Err(DmError::InvalidParameter(format!(
                "{} targets but {} offsets",
                targets.len(),
                offsets.len()
            )));
        }
        if targets.is_empty() {
            return Err(DmError::InvalidParameter("no expand targets".to_string()));
        }

        let mut state = self.state.lock();
        self.refresh_default(&mut state);

        let group_id = state
            .default_screen()
            .and_then(|s| s.group_id)
            .ok_or_else(|| DmError::InvalidParameter("no grouped default screen".to_string()))?;

        let entries: Vec<_> = targets.iter().copied().zip(offsets.iter().copied()).collect();
        self.change_group_locked(&mut state, group_id, entries, GroupTarget::Expand, "make_expand");
        info!(group_id = %group_id, ?targets, "screens expanded");
        Ok(group_id)
    }

    // ── Property mutators ─────────────────────────────────────────────────────

    /// Requests an orientation for a screen.
    ///
    /// `from_window == false` records the requested baseline; a window
    /// request for `Unspecified` falls back to that baseline.  Fixed
    /// orientations apply their rotation immediately; sensor-related ones are
    /// left to the rotation engine.
    ///
    /// # Errors
    ///
    /// - [`DmError::InvalidParameter`] for a group id.
    /// - [`DmError::NotFound`] for an unknown id.
    /// - [`DmError::RendererFailure`] if the fixed rotation is refused.
    pub fn set_orientation(
        &self,
        id: ScreenId,
        orientation: Orientation,
        from_window: bool,
    ) -> Result<OrientationUpdate, DmError> {
        let mut state = self.state.lock();
        self.refresh_default(&mut state);

        let screen = state.require_screen_mut(id)?;
        let previous = (screen.orientation, screen.requested_orientation);
        let target = if !from_window {
            screen.requested_orientation = orientation;
            orientation
        } else if orientation == Orientation::Unspecified {
            screen.requested_orientation
        } else {
            orientation
        };
        if screen.orientation == target {
            return Ok(OrientationUpdate { changed: false, orientation: target });
        }
        screen.orientation = target;
        let fixed_rotation = (!target.is_sensor_related()).then(|| screen.calc_rotation(target));

        if let Some(rotation) = fixed_rotation {
            if let Err(e) = self.set_rotation_locked(&mut state, id, rotation) {
                if let Some(screen) = state.screens.get_mut(&id) {
                    (screen.orientation, screen.requested_orientation) = previous;
                }
                return Err(e);
            }
        }
        if let Some(info) = state.screen_info(id) {
            self.notifier.notify_agents(AgentEvent::ScreenChanged {
                info,
                event: ScreenChangeEvent::UpdateOrientation,
            });
        }
        if let Some(callback) = self.callback() {
            callback.on_change(&state, id, DisplayChangeEvent::UpdateOrientation);
        }
        debug!(screen_id = %id, ?target, from_window, "orientation updated");
        Ok(OrientationUpdate { changed: true, orientation: target })
    }

    /// Pushes a rotation to the renderer and the screen.
    ///
    /// Returns `Ok(false)` when the rotation is unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`Self::set_orientation`].
    pub fn set_rotation(&self, id: ScreenId, rotation: Rotation) -> Result<bool, DmError> {
        let mut state = self.state.lock();
        self.refresh_default(&mut state);
        self.set_rotation_locked(&mut state, id, rotation)
    }

    /// Switches the active mode.  The mode-change notifications are emitted
    /// asynchronously on the worker queue.
    ///
    /// Returns `false` for an unknown screen, an out-of-range index or a
    /// renderer refusal.
    pub fn set_active_mode(&self, id: ScreenId, mode_idx: usize) -> bool {
        let previous = {
            let mut state = self.state.lock();
            let Some(screen) = state.screens.get_mut(&id) else {
                warn!(screen_id = %id, "set_active_mode on unknown screen");
                return false;
            };
            if mode_idx >= screen.modes().len() {
                warn!(screen_id = %id, mode_idx, "set_active_mode index out of range");
                return false;
            }
            if let Err(e) = self.renderer.set_active_mode(screen.rs_id, mode_idx) {
                error!(screen_id = %id, "renderer refused mode switch: {e}");
                return false;
            }
            let previous = screen.active_mode_index();
            screen.set_active_mode(mode_idx);
            previous
        };

        if previous != Some(mode_idx) {
            let weak = self.weak_self.clone();
            self.queue.post_with_priority(TaskPriority::High, move || {
                if let Some(controller) = weak.upgrade() {
                    controller.process_mode_changed(id);
                }
            });
        }
        true
    }

    /// Sets the screen's virtual pixel ratio.
    ///
    /// # Errors
    ///
    /// - [`DmError::InvalidParameter`] for a non-positive ratio or a group id.
    /// - [`DmError::NotFound`] for an unknown id.
    pub fn set_virtual_pixel_ratio(&self, id: ScreenId, ratio: f32) -> Result<(), DmError> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(DmError::InvalidParameter(format!("virtual pixel ratio {ratio}")));
        }
        let mut state = self.state.lock();
        self.refresh_default(&mut state);

        let screen = state.require_screen_mut(id)?;
        if screen.virtual_pixel_ratio == ratio {
            return Ok(());
        }
        screen.virtual_pixel_ratio = ratio;
        if let Some(info) = state.screen_info(id) {
            self.notifier.notify_agents(AgentEvent::ScreenChanged {
                info,
                event: ScreenChangeEvent::VirtualPixelRatioChanged,
            });
        }
        if let Some(callback) = self.callback() {
            callback.on_change(&state, id, DisplayChangeEvent::UpdateVirtualPixelRatio);
        }
        Ok(())
    }

    // ── Renderer delegations ──────────────────────────────────────────────────

    /// Renderer id of a stable screen id.
    ///
    /// # Errors
    ///
    /// [`DmError::NotFound`] when the id has no renderer mapping.
    pub fn rs_screen_id(&self, id: ScreenId) -> Result<RsScreenId, DmError> {
        self.state
            .lock()
            .ids
            .to_renderer(id)
            .ok_or(DmError::screen_not_found(id))
    }

    pub fn supported_color_gamuts(&self, id: ScreenId) -> Result<Vec<ScreenColorGamut>, DmError> {
        Ok(self.renderer.supported_color_gamuts(self.rs_screen_id(id)?)?)
    }

    pub fn color_gamut(&self, id: ScreenId) -> Result<ScreenColorGamut, DmError> {
        Ok(self.renderer.color_gamut(self.rs_screen_id(id)?)?)
    }

    pub fn set_color_gamut(&self, id: ScreenId, gamut_idx: usize) -> Result<(), DmError> {
        Ok(self.renderer.set_color_gamut(self.rs_screen_id(id)?, gamut_idx)?)
    }

    pub fn gamut_map(&self, id: ScreenId) -> Result<ScreenGamutMap, DmError> {
        Ok(self.renderer.gamut_map(self.rs_screen_id(id)?)?)
    }

    pub fn set_gamut_map(&self, id: ScreenId, map: ScreenGamutMap) -> Result<(), DmError> {
        Ok(self.renderer.set_gamut_map(self.rs_screen_id(id)?, map)?)
    }

    pub fn set_color_transform(&self, id: ScreenId) -> Result<(), DmError> {
        Ok(self.renderer.set_color_transform(self.rs_screen_id(id)?)?)
    }

    pub fn screen_power(&self, id: ScreenId) -> Result<ScreenPowerState, DmError> {
        Ok(self.renderer.screen_power(self.rs_screen_id(id)?)?)
    }

    pub fn set_screen_power(&self, id: ScreenId, power: ScreenPowerState) -> Result<(), DmError> {
        Ok(self.renderer.set_screen_power(self.rs_screen_id(id)?, power)?)
    }

    /// Applies `power` to every real screen.
    ///
    /// # Errors
    ///
    /// The first renderer failure; screens after it are still attempted.
    pub fn set_screen_power_for_all(&self, power: ScreenPowerState) -> Result<(), DmError> {
        let targets: Vec<RsScreenId> = {
            let state = self.state.lock();
            state
                .screens
                .values()
                .filter(|s| s.screen_type == ScreenType::Real)
                .map(|s| s.rs_id)
                .collect()
        };
        let mut first_error = None;
        for rs_id in targets {
            if let Err(e) = self.renderer.set_screen_power(rs_id, power) {
                warn!(%rs_id, "failed to set screen power: {e}");
                first_error.get_or_insert(DmError::from(e));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn screen_brightness(&self, id: ScreenId) -> Result<u32, DmError> {
        Ok(self.renderer.screen_brightness(self.rs_screen_id(id)?)?)
    }

    pub fn set_screen_brightness(&self, id: ScreenId, level: u32) -> Result<(), DmError> {
        Ok(self.renderer.set_screen_brightness(self.rs_screen_id(id)?, level)?)
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Every live stable id, screens and groups alike.
    pub fn all_screen_ids(&self) -> Vec<ScreenId> {
        let state = self.state.lock();
        let mut ids = state.screen_ids();
        ids.extend(state.group_ids());
        ids.sort();
        ids
    }

    pub fn screen_info(&self, id: ScreenId) -> Option<ScreenInfo> {
        self.with_topology(|t| t.screen_info(id))
    }

    pub fn all_screen_infos(&self) -> Vec<ScreenInfo> {
        self.with_topology(|t| t.infos(&t.screen_ids()))
    }

    pub fn screen_group_info(&self, id: ScreenId) -> Option<ScreenGroupInfo> {
        self.state.lock().groups.get(&id).map(ScreenGroup::to_info)
    }

    pub fn is_screen_group(&self, id: ScreenId) -> bool {
        self.state.lock().is_group(id)
    }

    pub fn default_screen_id(&self) -> Option<ScreenId> {
        self.with_topology(ScreenTopology::default_screen_id)
    }

    /// Renders the registry as text and logs it at debug level.
    pub fn dump(&self) -> String {
        let state = self.state.lock();
        let mut out = String::new();
        for id in state.group_ids() {
            if let Some(group) = state.groups.get(&id) {
                out.push_str(&format!(
                    "group {} {:?} source={:?} children={:?}\n",
                    id,
                    group.combination,
                    group.mirror_source,
                    group.child_ids()
                ));
            }
        }
        for id in state.screen_ids() {
            if let Some(screen) = state.screens.get(&id) {
                out.push_str(&format!(
                    "screen {} {} {:?} group={:?} mode={:?} rotation={:?} orientation={:?}\n",
                    id,
                    screen.rs_id,
                    screen.screen_type,
                    screen.group_id,
                    screen.active_mode(),
                    screen.rotation,
                    screen.orientation
                ));
            }
        }
        debug!("topology dump:\n{out}");
        out
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn callback(&self) -> Option<Arc<dyn ScreenCallback>> {
        self.callback.read().clone()
    }

    fn refresh_default(&self, state: &mut ScreenTopology) {
        state.default_rs = self.renderer.default_screen_id();
    }

    fn process_mode_changed(&self, id: ScreenId) {
        let mut state = self.state.lock();
        self.refresh_default(&mut state);
        if state.screens.contains_key(&id) {
            self.publish_mode_change(&state, id);
        }
    }

    fn publish_mode_change(&self, state: &ScreenTopology, id: ScreenId) {
        if let Some(info) = state.screen_info(id) {
            self.notifier.notify_agents(AgentEvent::ScreenChanged {
                info,
                event: ScreenChangeEvent::ChangeMode,
            });
        }
        if let Some(callback) = self.callback() {
            callback.on_change(state, id, DisplayChangeEvent::DisplaySizeChanged);
        }
    }

    fn set_rotation_locked(
        &self,
        state: &mut ScreenTopology,
        id: ScreenId,
        rotation: Rotation,
    ) -> Result<bool, DmError> {
        let screen = state.require_screen_mut(id)?;
        if screen.rotation == rotation {
            return Ok(false);
        }
        self.renderer.request_rotation(screen.rs_id, rotation)?;
        screen.rotation = rotation;

        if let Some(info) = state.screen_info(id) {
            self.notifier.notify_agents(AgentEvent::ScreenChanged {
                info,
                event: ScreenChangeEvent::UpdateRotation,
            });
        }
        if let Some(callback) = self.callback() {
            callback.on_change(state, id, DisplayChangeEvent::UpdateRotation);
        }
        debug!(screen_id = %id, ?rotation, "screen rotated");
        Ok(true)
    }

    /// Creates a fresh Alone group containing only `screen_id`.
    ///
    /// The very first group records its screen as mirror source.
    fn add_to_new_group(&self, state: &mut ScreenTopology, screen_id: ScreenId) -> ScreenId {
        let group_id = state.ids.allocate(None);
        let mut group = ScreenGroup::new(group_id, ScreenCombination::Alone);
        if state.groups.is_empty() {
            group.mirror_source = Some(screen_id);
        }
        group.add_child(screen_id, Point::default());
        state.groups.insert(group_id, group);
        if let Some(screen) = state.screens.get_mut(&screen_id) {
            screen.group_id = Some(group_id);
        }
        debug!(screen_id = %screen_id, group_id = %group_id, "screen placed in new group");
        group_id
    }

    /// Detaches a screen from its group, degrading or tearing the group down.
    fn remove_from_group(&self, state: &mut ScreenTopology, screen_id: ScreenId) -> Option<DepartedScreen> {
        let group_id = state.screens.get(&screen_id)?.group_id?;
        let group = state.groups.get_mut(&group_id)?;
        let combination = group.combination;
        if !group.remove_child(screen_id) {
            return None;
        }
        group.degrade_if_single();
        let remaining = group.child_ids();

        if let Some(screen) = state.screens.get_mut(&screen_id) {
            screen.group_id = None;
        }
        if let Some(node) = state.mirror_nodes.remove(&screen_id) {
            self.renderer.remove_mirror_node(node);
        }
        if remaining.is_empty() {
            state.groups.remove(&group_id);
            state.ids.release(group_id);
            debug!(group_id = %group_id, "empty group removed");
        }
        Some(DepartedScreen {
            screen_id,
            group_id,
            combination,
            remaining,
        })
    }

    /// Full disconnect path shared by hot-unplug and virtual-screen
    /// destruction.
    fn disconnect_locked(&self, state: &mut ScreenTopology, id: ScreenId) {
        let was_mirror_source = state
            .group_of(id)
            .is_some_and(|g| g.combination == ScreenCombination::Mirror && g.mirror_source == Some(id));

        if let Some(departed) = self.remove_from_group(state, id) {
            if let Some(callback) = self.callback() {
                callback.on_disconnect(state, &departed);
            }
            self.notifier.notify_group_changed(
                "on_disconnected",
                state.infos(&[id]),
                ScreenGroupChangeEvent::RemoveFromGroup,
            );
            if was_mirror_source && !departed.remaining.is_empty() {
                self.remirror_survivors(state, departed.group_id, &departed.remaining);
            }
        }

        if let Some(owner) = state.screens.get(&id).and_then(|s| s.owner) {
            if let Some(owned) = state.agents.get_mut(&owner) {
                owned.retain(|s| *s != id);
                if owned.is_empty() {
                    state.agents.remove(&owner);
                }
            }
        }
        state.screens.remove(&id);
        state.ids.release(id);
        self.notifier.notify_agents(AgentEvent::ScreenDisconnected(id));
    }

    /// Re-points a mirror group whose source left at the default screen.
    fn remirror_survivors(&self, state: &mut ScreenTopology, group_id: ScreenId, survivors: &[ScreenId]) {
        let Some(default_id) = state.default_screen_id() else {
            warn!(group_id = %group_id, "mirror source left but no default screen is available");
            return;
        };

        if !survivors.contains(&default_id) {
            // One move per survivor so each gets its own group notification.
            for &survivor in survivors {
                if let Err(e) = self.make_mirror_locked(state, default_id, &[survivor]) {
                    warn!(group_id = %group_id, screen_id = %survivor, "could not re-mirror survivor: {e}");
                }
            }
            info!(group_id = %group_id, source = %default_id, "survivors re-mirrored onto default screen");
            return;
        }

        let Some(source_rs) = state.screens.get(&default_id).map(|s| s.rs_id) else {
            return;
        };
        if let Some(group) = state.groups.get_mut(&group_id) {
            group.mirror_source = Some(default_id);
        }
        if let Some(node) = state.mirror_nodes.remove(&default_id) {
            self.renderer.remove_mirror_node(node);
        }
        let is_mirror = state
            .groups
            .get(&group_id)
            .is_some_and(|g| g.combination == ScreenCombination::Mirror);
        for &survivor in survivors {
            if is_mirror && survivor != default_id {
                self.attach_mirror_node(state, survivor, source_rs);
            }
            self.notifier.notify_group_changed(
                "remirror",
                state.infos(&[survivor]),
                ScreenGroupChangeEvent::ChangeGroup,
            );
        }
        info!(group_id = %group_id, source = %default_id, "mirror group re-pointed at default screen");
    }

    fn attach_mirror_node(&self, state: &mut ScreenTopology, target: ScreenId, source_rs: RsScreenId) {
        let Some(target_rs) = state.screens.get(&target).map(|s| s.rs_id) else {
            return;
        };
        if let Some(old) = state.mirror_nodes.remove(&target) {
            self.renderer.remove_mirror_node(old);
        }
        match self.renderer.create_mirror_node(target_rs, source_rs) {
            Ok(node) => {
                state.mirror_nodes.insert(target, node);
            }
            Err(e) => warn!(screen_id = %target, "failed to create mirror node: {e}"),
        }
    }

    fn make_mirror_locked(
        &self,
        state: &mut ScreenTopology,
        source: ScreenId,
        targets: &[ScreenId],
    ) -> Result<ScreenId, DmError> {
        let screen = state.screens.get(&source).ok_or(DmError::screen_not_found(source))?;
        if screen.screen_type != ScreenType::Real {
            return Err(DmError::InvalidParameter(format!(
                "mirror source {source} is not a real screen"
            )));
        }
        let source_group = screen.group_id;

        let mut entries = Vec::new();
        for &target in targets {
            if target != source && !entries.iter().any(|(id, _)| *id == target) {
                entries.push((target, Point::default()));
            }
        }
        if entries.is_empty() {
            return Err(DmError::InvalidParameter("no mirror targets".to_string()));
        }

        let group_id = match source_group {
            Some(group_id) => group_id,
            None => {
                let group_id = self.add_to_new_group(state, source);
                self.notifier.notify_group_changed(
                    "make_mirror",
                    state.infos(&[source]),
                    ScreenGroupChangeEvent::AddToGroup,
                );
                if let Some(callback) = self.callback() {
                    callback.on_connect(state, source);
                }
                group_id
            }
        };

        if !state.groups.contains_key(&group_id) {
            return Err(DmError::screen_not_found(group_id));
        }

        self.change_group_locked(state, group_id, entries, GroupTarget::Mirror { source }, "make_mirror");
        info!(source = %source, group_id = %group_id, ?targets, "screens mirrored");
        Ok(group_id)
    }

    /// Moves `entries` into `group_id` under `target`.
    ///
    /// When the group already has the target's combination and source,
    /// entries already in it only get their offset updated.  The last member
    /// of the group is never pulled out.  Unlisted members of a group whose
    /// combination or source changes take on their new role in place.
    fn change_group_locked(
        &self,
        state: &mut ScreenTopology,
        group_id: ScreenId,
        entries: Vec<(ScreenId, Point)>,
        target: GroupTarget,
        trigger: &str,
    ) {
        let callback = self.callback();
        let Some((prev_combination, prev_source)) =
            state.groups.get(&group_id).map(|g| (g.combination, g.mirror_source))
        else {
            error!(group_id = %group_id, trigger, "destination group vanished");
            return;
        };
        let combination = target.combination();
        let source = match target {
            GroupTarget::Mirror { source } => Some(source),
            GroupTarget::Expand => prev_source,
        };
        let filter = prev_combination == combination && prev_source == source;
        let mut to_add = Vec::new();

        for (id, position) in entries {
            let Some(current_group) = state.screens.get(&id).map(|s| s.group_id) else {
                warn!(screen_id = %id, trigger, "unknown screen skipped");
                continue;
            };
            if current_group == Some(group_id) {
                let Some(group) = state.groups.get_mut(&group_id) else {
                    continue;
                };
                if filter || group.child_count() == 1 {
                    group.set_position(id, position);
                    continue;
                }
            }
            let had_origin = match self.remove_from_group(state, id) {
                Some(departed) => {
                    if let Some(callback) = &callback {
                        callback.on_disconnect(state, &departed);
                    }
                    true
                }
                None => false,
            };
            to_add.push((id, position, had_origin));
        }

        let Some(group) = state.groups.get_mut(&group_id) else {
            error!(group_id = %group_id, trigger, "destination group vanished");
            return;
        };
        group.combination = combination;
        group.mirror_source = source;
        let source_rs = source
            .and_then(|source| state.screens.get(&source))
            .map(|s| s.rs_id);
        let moved: Vec<ScreenId> = to_add.iter().map(|(id, _, _)| *id).collect();

        let mut added = Vec::new();
        let mut changed = Vec::new();
        let mut removed = Vec::new();
        for (id, position, had_origin) in to_add {
            let joined = state
                .groups
                .get_mut(&group_id)
                .is_some_and(|g| g.add_child(id, position));
            if joined {
                if let Some(screen) = state.screens.get_mut(&id) {
                    screen.group_id = Some(group_id);
                }
                if combination == ScreenCombination::Mirror {
                    if let Some(source_rs) = source_rs {
                        self.attach_mirror_node(state, id, source_rs);
                    }
                }
            }
            match (had_origin, joined) {
                (true, true) => changed.push(id),
                (true, false) => removed.push(id),
                (false, true) => added.push(id),
                (false, false) => {}
            }
            if let Some(callback) = &callback {
                callback.on_connect(state, id);
            }
        }
        if prev_combination != ScreenCombination::Alone && !filter {
            changed.extend(self.reassign_roles(state, group_id, &moved));
        }
        if let Some(group) = state.groups.get_mut(&group_id) {
            group.degrade_if_single();
        }

        self.notifier.notify_group_changed(trigger, state.infos(&removed), ScreenGroupChangeEvent::RemoveFromGroup);
        self.notifier.notify_group_changed(trigger, state.infos(&changed), ScreenGroupChangeEvent::ChangeGroup);
        self.notifier.notify_group_changed(trigger, state.infos(&added), ScreenGroupChangeEvent::AddToGroup);
    }

    /// Brings the members of `group_id` that were not just moved in line with
    /// the group's current combination and source.  Returns those members.
    fn reassign_roles(&self, state: &mut ScreenTopology, group_id: ScreenId, moved: &[ScreenId]) -> Vec<ScreenId> {
        let Some(group) = state.groups.get(&group_id) else {
            return Vec::new();
        };
        let source = group.mirror_source;
        let is_mirror = group.combination == ScreenCombination::Mirror;
        let (secondaries, others): (Vec<ScreenId>, Vec<ScreenId>) = group
            .child_ids()
            .into_iter()
            .filter(|id| !moved.contains(id))
            .partition(|id| is_mirror && Some(*id) != source);
        let source_rs = source
            .and_then(|source| state.screens.get(&source))
            .map(|s| s.rs_id);
        let callback = self.callback();

        // Secondaries first: a demoted source hands its display to the new one.
        for &id in &secondaries {
            if let Some(source_rs) = source_rs {
                self.attach_mirror_node(state, id, source_rs);
            }
            if let Some(callback) = &callback {
                callback.on_role_change(state, id);
            }
        }
        for &id in &others {
            if let Some(node) = state.mirror_nodes.remove(&id) {
                self.renderer.remove_mirror_node(node);
            }
            if let Some(callback) = &callback {
                callback.on_role_change(state, id);
            }
        }
        debug!(group_id = %group_id, ?secondaries, ?others, "group roles reassigned");
        secondaries.into_iter().chain(others).collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
