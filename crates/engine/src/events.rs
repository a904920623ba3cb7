use crate::progression::ProgressionStage;

/// Notifications produced by the registries and the progression machine.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    ItemAdded { item: String, quantity: u32 },
    ItemRemoved { item: String, quantity: u32 },
    ItemUsed { item: String },
    InventoryFull { item: String },
    ItemEquipped { item: String },
    ItemUnequipped { item: String },
    ItemsCombined { first: String, second: String, result: String },
    LocationDiscovered { location: String },
    LocationChanged { from: String, to: String },
    QuestDiscovered { quest: String },
    QuestActivated { quest: String },
    ObjectiveUpdated { quest: String, objective: String, current: u32, required: u32 },
    ObjectiveCompleted { quest: String, objective: String },
    ObjectiveUnlocked { quest: String, objective: String },
    QuestCompleted { quest: String },
    QuestFailed { quest: String },
    FrequencyDiscovered { frequency: f32 },
    RadioTuned { frequency: f32, signal: Option<String> },
    RadioPowerChanged { on: bool },
    MessageEnqueued { message: String },
    MessageDecoded { message: String },
    StageChanged { stage: ProgressionStage },
    GameCompleted,
}

/// Per-registry outbox, drained by the session after every step.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    pending: Vec<GameEvent>,
}

impl EventQueue {
    pub(crate) fn push(&mut self, event: GameEvent) {
        self.pending.push(event);
    }

    pub(crate) fn drain_into(&mut self, out: &mut Vec<GameEvent>) {
        out.append(&mut self.pending);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener = dyn FnMut(&GameEvent);

/// Synchronous observer registry. Listeners run in registration order.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Box<Listener>)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn dispatch(&mut self, event: &GameEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn dispatch_runs_listeners_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::<String>::new()));
        let mut bus = EventBus::new();
        for name in ["first", "second", "third"] {
            let seen = Rc::clone(&seen);
            bus.subscribe(move |_| seen.borrow_mut().push(name.to_string()));
        }

        bus.dispatch(&GameEvent::GameCompleted);
        assert_eq!(*seen.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let count = Rc::new(RefCell::new(0u32));
        let mut bus = EventBus::new();
        let kept = Rc::clone(&count);
        bus.subscribe(move |_| *kept.borrow_mut() += 1);
        let dropped = Rc::clone(&count);
        let id = bus.subscribe(move |_| *dropped.borrow_mut() += 10);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.dispatch(&GameEvent::RadioPowerChanged { on: true });
        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn queue_drains_in_push_order() {
        let mut queue = EventQueue::default();
        queue.push(GameEvent::ItemUsed {
            item: "medkit".to_string(),
        });
        queue.push(GameEvent::GameCompleted);
        let mut out = Vec::new();
        queue.drain_into(&mut out);
        queue.drain_into(&mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], GameEvent::GameCompleted);
    }
}
