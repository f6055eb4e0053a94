//! Outbound notifications: agent events and display state changes.
//!
//! Two audiences listen to the display manager:
//!
//! - **Agents** (client processes) receive [`AgentEvent`]s through an
//!   [`AgentEventSink`].  The IPC fan-out that delivers them to remote
//!   subscribers lives outside this crate.
//! - **The window manager** receives [`DisplayStateChange`]s through a
//!   [`DisplayChangeListener`], including the full display map so it can
//!   re-lay-out windows in one pass.
//!
//! The [`Notifier`] never calls a sink inline: every delivery is posted to the
//! [`WorkerQueue`], so a sink can never observe (or deadlock on) the
//! topology or display locks.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use dms_core::{
    DisplayChangeEvent, DisplayId, DisplayInfo, DisplayPowerEvent, DisplayState,
    DisplayStateChangeType, EventStatus, ScreenChangeEvent, ScreenGroupChangeEvent, ScreenId,
    ScreenInfo,
};

use crate::infrastructure::worker::WorkerQueue;

pub mod mock;

/// Event delivered to agents.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    ScreenConnected(ScreenInfo),
    ScreenDisconnected(ScreenId),
    ScreenChanged {
        info: ScreenInfo,
        event: ScreenChangeEvent,
    },
    /// One batch of group membership changes.
    ScreenGroupChanged {
        trigger: String,
        infos: Vec<ScreenInfo>,
        event: ScreenGroupChangeEvent,
    },
    DisplayCreated(DisplayInfo),
    DisplayDestroyed(DisplayId),
    DisplayChanged {
        info: DisplayInfo,
        event: DisplayChangeEvent,
    },
    DisplayPower {
        event: DisplayPowerEvent,
        status: EventStatus,
    },
    DisplayStateChanged {
        display_id: Option<DisplayId>,
        state: DisplayState,
    },
}

/// Display change delivered to the in-process window manager.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayStateChange {
    pub default_display: Option<DisplayId>,
    pub info: DisplayInfo,
    pub all: BTreeMap<DisplayId, DisplayInfo>,
    pub kind: DisplayStateChangeType,
}

/// Receives agent events.
pub trait AgentEventSink: Send + Sync {
    fn on_agent_event(&self, event: AgentEvent);
}

/// Receives display state changes.
pub trait DisplayChangeListener: Send + Sync {
    fn on_display_state_change(&self, change: DisplayStateChange);
}

/// Forwards agent events into a Tokio channel.
///
/// Used by the binary to pump events into async code; a closed receiver is
/// treated as "nobody is listening".
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<AgentEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AgentEventSink for ChannelEventSink {
    fn on_agent_event(&self, event: AgentEvent) {
        if self.tx.send(event).is_err() {
            debug!("agent event receiver closed");
        }
    }
}

// ── Notifier ──────────────────────────────────────────────────────────────────

/// Posts notifications to the worker queue for asynchronous delivery.
#[derive(Clone)]
pub struct Notifier {
    queue: WorkerQueue,
    agents: Arc<dyn AgentEventSink>,
    listener: Arc<RwLock<Option<Arc<dyn DisplayChangeListener>>>>,
}

impl Notifier {
    pub fn new(queue: WorkerQueue, agents: Arc<dyn AgentEventSink>) -> Self {
        Self {
            queue,
            agents,
            listener: Arc::new(RwLock::new(None)),
        }
    }

    /// Installs (or replaces) the display-change listener.
    pub fn set_display_change_listener(&self, listener: Arc<dyn DisplayChangeListener>) {
        *self.listener.write() = Some(listener);
    }

    pub fn notify_agents(&self, event: AgentEvent) {
        let sink = Arc::clone(&self.agents);
        self.queue.post(move || sink.on_agent_event(event));
    }

    /// Emits a group-change batch; empty batches are dropped.
    pub fn notify_group_changed(
        &self,
        trigger: &str,
        infos: Vec<ScreenInfo>,
        event: ScreenGroupChangeEvent,
    ) {
        if infos.is_empty() {
            return;
        }
        self.notify_agents(AgentEvent::ScreenGroupChanged {
            trigger: trigger.to_string(),
            infos,
            event,
        });
    }

    pub fn notify_display_state(&self, change: DisplayStateChange) {
        let Some(listener) = self.listener.read().clone() else {
            debug!(kind = ?change.kind, "no display change listener registered");
            return;
        };
        self.queue.post(move || listener.on_display_state_change(change));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
