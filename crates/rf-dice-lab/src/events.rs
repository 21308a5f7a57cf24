//! Session events and observer registration
//!
//! Observers are registered explicitly on a session's [`EventHub`] and stay
//! subscribed until [`EventHub::unsubscribe`] is called with their id.

use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cycle::CycleId;
use crate::die::DieId;

/// Everything a presentation layer can react to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiceEvent {
    CycleStarted { cycle: CycleId },
    DieSettled { die: DieId, face: u8 },
    PayoutComputed { cycle: CycleId, payout: i64, sum: i64 },
    CycleAborted { cycle: CycleId },
    RollsChanged { rolls_left: u32 },
    BalanceChanged { balance: i64 },
    DieUnlocked { die: DieId, cost: i64 },
    DieUpgraded { die: DieId, cost: i64, multiplier: f64 },
}

impl DiceEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            DiceEvent::CycleStarted { .. } => "cycle_started",
            DiceEvent::DieSettled { .. } => "die_settled",
            DiceEvent::PayoutComputed { .. } => "payout_computed",
            DiceEvent::CycleAborted { .. } => "cycle_aborted",
            DiceEvent::RollsChanged { .. } => "rolls_changed",
            DiceEvent::BalanceChanged { .. } => "balance_changed",
            DiceEvent::DieUnlocked { .. } => "die_unlocked",
            DiceEvent::DieUpgraded { .. } => "die_upgraded",
        }
    }
}

/// Receives session events
pub trait DiceObserver: Send {
    fn on_event(&mut self, event: &DiceEvent);
}

impl<F: FnMut(&DiceEvent) + Send> DiceObserver for F {
    fn on_event(&mut self, event: &DiceEvent) {
        self(event)
    }
}

/// Handle returned by [`EventHub::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of observers
#[derive(Default)]
pub struct EventHub {
    next_id: u64,
    observers: Vec<(SubscriptionId, Box<dyn DiceObserver>)>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl DiceObserver + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns false if the id was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver to every observer in subscription order
    pub fn emit(&mut self, event: DiceEvent) {
        log::trace!("event: {}", event.type_name());
        for (_, observer) in &mut self.observers {
            observer.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Shared in-memory event log
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<DiceEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<DiceEvent> {
        self.events.lock().clone()
    }

    /// Take and clear the recorded events
    pub fn drain(&self) -> Vec<DiceEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn count(&self, type_name: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.type_name() == type_name)
            .count()
    }
}

impl DiceObserver for EventRecorder {
    fn on_event(&mut self, event: &DiceEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Forwards events into a channel; a dropped receiver is ignored
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<DiceEvent>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<DiceEvent>) -> Self {
        Self { tx }
    }
}

impl DiceObserver for ChannelObserver {
    fn on_event(&mut self, event: &DiceEvent) {
        let _ = self.tx.try_send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let mut hub = EventHub::new();
        let recorder = EventRecorder::new();
        let id = hub.subscribe(recorder.clone());

        hub.emit(DiceEvent::RollsChanged { rolls_left: 2 });
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        hub.emit(DiceEvent::RollsChanged { rolls_left: 1 });

        assert_eq!(
            recorder.events(),
            vec![DiceEvent::RollsChanged { rolls_left: 2 }]
        );
        assert!(hub.is_empty());
    }

    #[test]
    fn test_closure_observer() {
        let seen = Arc::new(Mutex::new(0i64));
        let sink = seen.clone();
        let mut hub = EventHub::new();
        hub.subscribe(move |event: &DiceEvent| {
            if let DiceEvent::BalanceChanged { balance } = event {
                *sink.lock() = *balance;
            }
        });
        hub.emit(DiceEvent::BalanceChanged { balance: 42 });
        assert_eq!(*seen.lock(), 42);
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut hub = EventHub::new();
        hub.subscribe(ChannelObserver::new(tx));
        hub.emit(DiceEvent::CycleStarted { cycle: CycleId(1) });
        assert_eq!(rx.try_recv(), Ok(DiceEvent::CycleStarted { cycle: CycleId(1) }));
        drop(rx);
        hub.emit(DiceEvent::CycleStarted { cycle: CycleId(2) });
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(DiceEvent::PayoutComputed {
            cycle: CycleId(3),
            payout: 10,
            sum: 10,
        })
        .unwrap();
        assert_eq!(json["type"], "payout_computed");
        assert_eq!(json["payout"], 10);
    }
}
