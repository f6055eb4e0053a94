//! Integration tests for screen topology and display projection.
//!
//! These tests drive the full [`DisplayManagerService`] against the in-memory
//! renderer: hot-plug events travel through the renderer subscription and
//! the worker queue, topology changes reach the display registry through the
//! screen callback, and agent notifications land in a recording sink.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dms_core::{
    DisplayId, DmError, Point, RsScreenId, ScreenCombination, ScreenGroupChangeEvent, ScreenId,
    ScreenMode, ScreenSourceMode, ScreenType,
};
use dms_server::application::screen_controller::VirtualScreenOption;
use dms_server::application::service::DisplayManagerService;
use dms_server::infrastructure::notification::mock::RecordingSink;
use dms_server::infrastructure::notification::AgentEvent;
use dms_server::infrastructure::renderer::mock::MockRenderer;
use dms_server::infrastructure::storage::config::DmsConfig;
use dms_server::infrastructure::worker::WorkerHandle;

// ── Helpers ───────────────────────────────────────────────────────────────────

struct Harness {
    service: Arc<DisplayManagerService>,
    renderer: Arc<MockRenderer>,
    sink: Arc<RecordingSink>,
    _worker: WorkerHandle,
}

impl Harness {
    fn new() -> Self {
        let renderer = Arc::new(MockRenderer::new());
        let sink = Arc::new(RecordingSink::new());
        let (service, worker) =
            DisplayManagerService::new(renderer.clone(), sink.clone(), None, DmsConfig::default())
                .expect("service should start");
        service.init().expect("renderer subscription");
        Self {
            service,
            renderer,
            sink,
            _worker: worker,
        }
    }

    /// Plugs a portrait 1080x1920 output and waits for the topology to settle.
    fn plug(&self, rs: u64) -> ScreenId {
        self.renderer
            .plug(RsScreenId(rs), vec![ScreenMode::new(1080, 1920, 60)], 0);
        self.settle();
        self.screen_for(rs).expect("plugged screen registered")
    }

    fn unplug(&self, rs: u64) {
        self.renderer.unplug(RsScreenId(rs));
        self.settle();
    }

    /// Renderer events are posted at high priority and post their own
    /// notifications, so one flush is not always enough.
    fn settle(&self) {
        for _ in 0..3 {
            assert!(self.service.worker_queue().flush(Duration::from_secs(2)));
        }
    }

    fn screen_for(&self, rs: u64) -> Option<ScreenId> {
        self.service
            .all_screen_ids()
            .into_iter()
            .filter(|id| !self.service.is_screen_group(*id))
            .find(|id| self.service.rs_screen_id(*id) == Ok(RsScreenId(rs)))
    }
}

fn virtual_option(name: &str) -> VirtualScreenOption {
    VirtualScreenOption {
        name: name.to_string(),
        width: 800,
        height: 600,
        density: 1.0,
        surface: None,
        flags: 0,
    }
}

/// Checks the structural properties every topology must keep.
fn assert_topology_consistent(service: &DisplayManagerService) {
    let mut seen_rs = HashSet::new();
    for id in service.all_screen_ids() {
        if service.is_screen_group(id) {
            let group = service.screen_group_info(id).expect("group info");
            assert!(!group.children.is_empty(), "group {id} has no children");
            if group.children.len() == 1 {
                assert_eq!(group.combination, ScreenCombination::Alone, "group {id} not degraded");
            }
            assert!(service.rs_screen_id(id).is_err(), "group {id} has a renderer id");
            continue;
        }

        let rs = service.rs_screen_id(id).expect("screen has a renderer id");
        assert!(seen_rs.insert(rs), "renderer id {rs} is mapped twice");

        let info = service.screen_info(id).expect("screen info");
        let display = service.display_id_by_screen(id);
        match info.parent.and_then(|g| service.screen_group_info(g)) {
            Some(group)
                if group.combination == ScreenCombination::Mirror && group.mirror_source != Some(id) =>
            {
                assert!(display.is_none(), "mirror secondary {id} owns a display");
            }
            Some(_) => assert!(display.is_some(), "grouped screen {id} has no display"),
            None => assert!(display.is_none(), "ungrouped screen {id} owns a display"),
        }
    }
}

fn change_group_batches(events: &[AgentEvent]) -> Vec<Vec<ScreenId>> {
    events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ScreenGroupChanged {
                infos,
                event: ScreenGroupChangeEvent::ChangeGroup,
                ..
            } => Some(infos.iter().map(|i| i.id).collect()),
            _ => None,
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_hotplug_creates_screen_group_and_display() {
    // Arrange
    let harness = Harness::new();

    // Act
    let screen = harness.plug(7);

    // Assert
    assert_eq!(screen, ScreenId(0));
    assert_eq!(harness.service.all_screen_ids(), vec![ScreenId(0), ScreenId(1)]);
    assert!(harness.service.is_screen_group(ScreenId(1)));

    let group = harness.service.screen_group_info(ScreenId(1)).expect("group");
    assert_eq!(group.combination, ScreenCombination::Alone);
    assert_eq!(group.children, vec![ScreenId(0)]);

    let info = harness.service.screen_info(screen).expect("screen info");
    assert_eq!(info.screen_type, ScreenType::Real);
    assert_eq!(info.parent, Some(ScreenId(1)));
    assert_eq!(info.source_mode, ScreenSourceMode::Alone);

    let display = harness.service.display_info(DisplayId(0)).expect("display");
    assert_eq!(display.screen_id, Some(screen));
    assert_eq!((display.width, display.height), (1080, 1920));
    assert_eq!(harness.service.default_display_info(), Some(display));

    assert_eq!(harness.sink.count(|e| matches!(e, AgentEvent::ScreenConnected(_))), 1);
    assert_eq!(harness.sink.count(|e| matches!(e, AgentEvent::DisplayCreated(_))), 1);
    assert_topology_consistent(&harness.service);
}

#[test]
fn test_repeated_connect_event_keeps_one_screen() {
    let harness = Harness::new();
    harness.plug(7);

    harness
        .renderer
        .plug(RsScreenId(7), vec![ScreenMode::new(1080, 1920, 60)], 0);
    harness.settle();

    assert_eq!(harness.service.all_screen_ids().len(), 2);
    assert_eq!(harness.service.all_display_ids(), vec![DisplayId(0)]);
    assert_topology_consistent(&harness.service);
}

#[test]
fn test_expand_virtual_screen_into_default_group() {
    // Arrange
    let harness = Harness::new();
    let default_screen = harness.plug(7);
    let virt = harness
        .service
        .create_virtual_screen(&virtual_option("cast"), None, None)
        .expect("virtual screen");
    harness.settle();
    assert_eq!(harness.service.display_id_by_screen(virt), None);

    // Act
    let group_id = harness
        .service
        .make_expand(&[virt], &[Point::new(0, 0)])
        .expect("expand");
    harness.settle();

    // Assert
    let group = harness.service.screen_group_info(group_id).expect("group");
    assert_eq!(group.combination, ScreenCombination::Expand);
    assert_eq!(group.children, vec![default_screen, virt]);
    assert_eq!(harness.service.all_display_ids().len(), 2);

    let display = harness
        .service
        .display_id_by_screen(virt)
        .and_then(|id| harness.service.display_info(id))
        .expect("virtual display");
    assert_eq!((display.width, display.height, display.refresh_rate), (800, 600, 60));
    assert_eq!(
        harness.service.screen_info(virt).map(|i| i.source_mode),
        Some(ScreenSourceMode::Extend)
    );
    assert_topology_consistent(&harness.service);
}

#[test]
fn test_destroy_unknown_virtual_screen_is_not_found() {
    let harness = Harness::new();
    harness.plug(7);
    let before = harness.service.dump();

    let result = harness.service.destroy_virtual_screen(ScreenId(42));

    assert!(matches!(result, Err(DmError::NotFound { .. })));
    assert_eq!(harness.service.dump(), before);
}

#[test]
fn test_destroy_real_screen_as_virtual_is_rejected() {
    let harness = Harness::new();
    let screen = harness.plug(7);

    let result = harness.service.destroy_virtual_screen(screen);

    assert!(matches!(result, Err(DmError::InvalidParameter(_))));
    assert!(harness.service.screen_info(screen).is_some());
}

#[test]
fn test_mirror_source_unplug_remirrors_onto_new_default() {
    // Arrange
    let harness = Harness::new();
    let a = harness.plug(1);
    let b = harness.plug(2);
    let c = harness.plug(3);
    let group_id = harness.service.make_mirror(a, &[b, c]).expect("mirror");
    harness.settle();
    assert_eq!(harness.service.all_display_ids(), vec![DisplayId(0)]);
    assert_eq!(harness.renderer.mirror_node_count(), 2);
    harness.sink.take();

    // Act
    harness.unplug(1);

    // Assert
    assert_eq!(harness.service.default_screen_id(), Some(b));
    let group = harness.service.screen_group_info(group_id).expect("group survives");
    assert_eq!(group.combination, ScreenCombination::Mirror);
    assert_eq!(group.mirror_source, Some(b));
    assert_eq!(group.children, vec![b, c]);

    assert_eq!(harness.service.all_display_ids(), vec![DisplayId(0)]);
    assert_eq!(harness.service.display_id_by_screen(b), Some(DisplayId(0)));
    assert_eq!(harness.renderer.mirror_node_count(), 1);

    let events = harness.sink.events();
    assert_eq!(change_group_batches(&events), vec![vec![b], vec![c]]);
    assert!(events.contains(&AgentEvent::ScreenDisconnected(a)));
    assert!(!events.iter().any(|e| matches!(e, AgentEvent::DisplayDestroyed(_))));
    assert_topology_consistent(&harness.service);
}

#[test]
fn test_mirror_moves_targets_in_one_change_batch() {
    let harness = Harness::new();
    let a = harness.plug(1);
    let b = harness.plug(2);
    let c = harness.plug(3);
    harness.sink.take();

    harness.service.make_mirror(a, &[b, c]).expect("mirror");
    harness.settle();

    let events = harness.sink.events();
    assert_eq!(change_group_batches(&events), vec![vec![b, c]]);
    assert_eq!(harness.sink.count(|e| matches!(e, AgentEvent::DisplayDestroyed(_))), 2);
    assert_eq!(
        harness.service.screen_info(b).map(|i| i.source_mode),
        Some(ScreenSourceMode::Mirror)
    );
    assert_eq!(
        harness.service.screen_info(a).map(|i| i.source_mode),
        Some(ScreenSourceMode::Main)
    );
    assert_topology_consistent(&harness.service);
}

#[test]
fn test_unplugging_secondary_degrades_two_member_mirror() {
    let harness = Harness::new();
    let a = harness.plug(1);
    let b = harness.plug(2);
    let group_id = harness.service.make_mirror(a, &[b]).expect("mirror");
    harness.settle();

    harness.unplug(2);

    let group = harness.service.screen_group_info(group_id).expect("group");
    assert_eq!(group.combination, ScreenCombination::Alone);
    assert_eq!(group.children, vec![a]);
    assert_eq!(harness.renderer.mirror_node_count(), 0);
    assert_topology_consistent(&harness.service);
}

#[test]
fn test_unplugging_last_screen_tears_down_group_and_display() {
    let harness = Harness::new();
    harness.plug(7);

    harness.unplug(7);

    assert!(harness.service.all_screen_ids().is_empty());
    assert!(harness.service.all_display_ids().is_empty());
    assert_eq!(harness.sink.count(|e| matches!(e, AgentEvent::DisplayDestroyed(_))), 1);
}

#[test]
fn test_agent_death_destroys_owned_virtual_screens() {
    // Arrange
    let harness = Harness::new();
    harness.plug(7);
    let agent = uuid::Uuid::new_v4();
    let first = harness
        .service
        .create_virtual_screen(&virtual_option("one"), None, Some(agent))
        .expect("first");
    let second = harness
        .service
        .create_virtual_screen(&virtual_option("two"), None, Some(agent))
        .expect("second");
    harness
        .service
        .make_expand(&[first], &[Point::new(1080, 0)])
        .expect("expand");
    harness.settle();

    // Act
    let destroyed = harness.service.on_agent_died(agent);
    harness.settle();

    // Assert
    assert_eq!(destroyed, 2);
    assert!(harness.service.screen_info(first).is_none());
    assert!(harness.service.screen_info(second).is_none());
    assert_eq!(harness.renderer.removed_virtual_screens().len(), 2);
    assert_eq!(harness.service.all_display_ids(), vec![DisplayId(0)]);
    assert_eq!(harness.service.on_agent_died(agent), 0);
    assert_topology_consistent(&harness.service);
}

#[test]
fn test_virtual_screen_mirroring_a_display() {
    let harness = Harness::new();
    let a = harness.plug(7);

    let virt = harness
        .service
        .create_virtual_screen(&virtual_option("mirror"), Some(DisplayId(0)), None)
        .expect("virtual screen");
    let group_id = harness.service.make_mirror(a, &[virt]).expect("mirror");
    harness.settle();

    let group = harness.service.screen_group_info(group_id).expect("group");
    assert_eq!(group.children, vec![a, virt]);
    assert_eq!(harness.service.display_id_by_screen(virt), None);
    assert_topology_consistent(&harness.service);
}

#[test]
fn test_virtual_screen_for_unknown_display_is_not_found() {
    let harness = Harness::new();
    harness.plug(7);

    let result = harness
        .service
        .create_virtual_screen(&virtual_option("ghost"), Some(DisplayId(5)), None);

    assert!(matches!(result, Err(DmError::NotFound { kind: "display", id: 5 })));
}

#[test]
fn test_mode_change_resizes_bound_display() {
    // Arrange
    let harness = Harness::new();
    harness.renderer.plug(
        RsScreenId(7),
        vec![ScreenMode::new(1080, 1920, 60), ScreenMode::new(720, 1280, 60)],
        0,
    );
    harness.settle();
    let screen = harness.screen_for(7).expect("screen");

    // Act
    assert!(harness.service.set_active_mode(screen, 1));
    harness.settle();

    // Assert
    let display = harness.service.display_info(DisplayId(0)).expect("display");
    assert_eq!((display.width, display.height), (720, 1280));
    assert_eq!(
        harness.sink.count(|e| matches!(
            e,
            AgentEvent::ScreenChanged {
                event: dms_core::ScreenChangeEvent::ChangeMode,
                ..
            }
        )),
        1
    );
}

#[test]
fn test_operations_on_group_ids_are_invalid() {
    let harness = Harness::new();
    harness.plug(7);

    let rotation = harness
        .service
        .set_rotation(ScreenId(1), dms_core::Rotation::Rotation90);
    let ratio = harness.service.set_virtual_pixel_ratio(ScreenId(1), 2.0);

    assert!(matches!(rotation, Err(DmError::InvalidParameter(_))));
    assert!(matches!(ratio, Err(DmError::InvalidParameter(_))));
}

#[test]
fn test_topology_stays_consistent_through_mixed_sequence() {
    let harness = Harness::new();
    let a = harness.plug(1);
    let b = harness.plug(2);
    assert_topology_consistent(&harness.service);

    harness.service.make_mirror(a, &[b]).expect("mirror");
    harness.settle();
    assert_topology_consistent(&harness.service);

    harness.unplug(1);
    assert_eq!(harness.service.default_screen_id(), Some(b));
    assert_topology_consistent(&harness.service);

    let virt = harness
        .service
        .create_virtual_screen(&virtual_option("v"), None, None)
        .expect("virtual");
    assert_topology_consistent(&harness.service);

    harness
        .service
        .make_expand(&[virt], &[Point::new(1080, 0)])
        .expect("expand");
    harness.settle();
    assert_topology_consistent(&harness.service);

    harness.service.destroy_virtual_screen(virt).expect("destroy");
    harness.settle();
    assert_topology_consistent(&harness.service);

    let c = harness.plug(3);
    assert_ne!(c, a);
    assert_topology_consistent(&harness.service);
}

#[test]
fn test_mirror_source_unplug_moves_survivors_to_default_one_by_one() {
    // Arrange: default screen alone, a second mirror group elsewhere
    let harness = Harness::new();
    let a = harness.plug(1);
    let b = harness.plug(2);
    let c = harness.plug(3);
    let d = harness.plug(4);
    harness.service.make_mirror(b, &[c, d]).expect("mirror");
    harness.settle();
    assert_eq!(harness.service.default_screen_id(), Some(a));
    harness.sink.take();

    // Act
    harness.unplug(2);

    // Assert
    let group_id = harness
        .service
        .screen_info(a)
        .and_then(|i| i.parent)
        .expect("default screen grouped");
    let group = harness.service.screen_group_info(group_id).expect("group");
    assert_eq!(group.combination, ScreenCombination::Mirror);
    assert_eq!(group.mirror_source, Some(a));
    assert_eq!(group.children, vec![a, c, d]);
    assert_eq!(harness.renderer.mirror_node_count(), 2);
    assert_eq!(harness.service.all_display_ids(), vec![DisplayId(0)]);

    let events = harness.sink.events();
    assert_eq!(change_group_batches(&events), vec![vec![c], vec![d]]);
    assert_topology_consistent(&harness.service);
}

#[test]
fn test_switching_group_combination_keeps_unlisted_members_consistent() {
    let harness = Harness::new();
    let a = harness.plug(1);
    let b = harness.plug(2);
    let c = harness.plug(3);

    harness
        .service
        .make_expand(&[b, c], &[Point::new(1080, 0), Point::new(2160, 0)])
        .expect("expand");
    harness.settle();
    assert_topology_consistent(&harness.service);

    harness.service.make_mirror(a, &[b]).expect("mirror over expand");
    harness.settle();
    assert_eq!(harness.service.display_id_by_screen(c), None);
    assert_topology_consistent(&harness.service);

    harness
        .service
        .make_expand(&[b], &[Point::new(1080, 0)])
        .expect("expand over mirror");
    harness.settle();
    assert!(harness.service.display_id_by_screen(c).is_some());
    assert_eq!(harness.renderer.mirror_node_count(), 0);
    assert_topology_consistent(&harness.service);
}
