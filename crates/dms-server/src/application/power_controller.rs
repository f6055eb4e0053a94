//! Display power state and power-event fan-out.

use parking_lot::Mutex;
use tracing::info;

use dms_core::{DisplayId, DisplayPowerEvent, DisplayState, EventStatus, ScreenPowerState};

use crate::infrastructure::notification::{AgentEvent, Notifier};

/// Tracks the logical display power state and announces power transitions.
pub struct DisplayPowerController {
    state: Mutex<DisplayState>,
    notifier: Notifier,
}

impl DisplayPowerController {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            state: Mutex::new(DisplayState::Unknown),
            notifier,
        }
    }

    /// Moves to `state`.
    ///
    /// Returns `false` when the state is unchanged.  `On` and `Off` announce
    /// the matching power event before the state is stored.
    pub fn set_display_state(&self, state: DisplayState, default_display: Option<DisplayId>) -> bool {
        let mut current = self.state.lock();
        if *current == state {
            return false;
        }
        match state {
            DisplayState::On => self.notify_power_event(DisplayPowerEvent::DisplayOn, EventStatus::Begin),
            DisplayState::Off => self.notify_power_event(DisplayPowerEvent::DisplayOff, EventStatus::Begin),
            DisplayState::Unknown => {}
        }
        *current = state;
        self.notifier.notify_agents(AgentEvent::DisplayStateChanged {
            display_id: default_display,
            state,
        });
        info!(?state, "display state changed");
        true
    }

    pub fn display_state(&self) -> DisplayState {
        *self.state.lock()
    }

    pub fn notify_power_event(&self, event: DisplayPowerEvent, status: EventStatus) {
        self.notifier.notify_agents(AgentEvent::DisplayPower { event, status });
    }

    /// Announces the end of a power change applied to every screen.
    pub fn notify_screen_power_applied(&self, power: ScreenPowerState) {
        let event = match power {
            ScreenPowerState::On => DisplayPowerEvent::DisplayOn,
            ScreenPowerState::Standby | ScreenPowerState::Suspend | ScreenPowerState::Off => {
                DisplayPowerEvent::DisplayOff
            }
        };
        self.notify_power_event(event, EventStatus::End);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::infrastructure::notification::mock::RecordingSink;
    use crate::infrastructure::worker::WorkerQueue;

    #[test]
    fn test_set_display_state_emits_begin_then_state_change() {
        // Arrange
        let (queue, _handle) = WorkerQueue::start("test-power").expect("spawn");
        let sink = Arc::new(RecordingSink::new());
        let power = DisplayPowerController::new(Notifier::new(queue.clone(), sink.clone()));

        // Act
        let changed = power.set_display_state(DisplayState::On, Some(DisplayId(0)));
        assert!(queue.flush(Duration::from_secs(2)));

        // Assert
        assert!(changed);
        assert_eq!(power.display_state(), DisplayState::On);
        assert_eq!(
            sink.events(),
            vec![
                AgentEvent::DisplayPower {
                    event: DisplayPowerEvent::DisplayOn,
                    status: EventStatus::Begin,
                },
                AgentEvent::DisplayStateChanged {
                    display_id: Some(DisplayId(0)),
                    state: DisplayState::On,
                },
            ]
        );
    }

    #[test]
    fn test_unchanged_display_state_is_noop() {
        let (queue, _handle) = WorkerQueue::start("test-power-noop").expect("spawn");
        let sink = Arc::new(RecordingSink::new());
        let power = DisplayPowerController::new(Notifier::new(queue.clone(), sink.clone()));
        power.set_display_state(DisplayState::Off, None);
        assert!(queue.flush(Duration::from_secs(2)));
        sink.take();

        assert!(!power.set_display_state(DisplayState::Off, None));
        assert!(queue.flush(Duration::from_secs(2)));

        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_screen_power_standby_counts_as_display_off() {
        let (queue, _handle) = WorkerQueue::start("test-power-all").expect("spawn");
        let sink = Arc::new(RecordingSink::new());
        let power = DisplayPowerController::new(Notifier::new(queue.clone(), sink.clone()));

        power.notify_screen_power_applied(ScreenPowerState::Standby);
        assert!(queue.flush(Duration::from_secs(2)));

        assert_eq!(
            sink.events(),
            vec![AgentEvent::DisplayPower {
                event: DisplayPowerEvent::DisplayOff,
                status: EventStatus::End,
            }]
        );
    }
}
