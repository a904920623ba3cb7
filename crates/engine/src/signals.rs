use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use crate::content::{Catalog, SignalDef};
use crate::error::{accepted, EntityKind, GameError, GameResult};
use crate::events::{EventQueue, GameEvent};

pub const MIN_FREQUENCY: f32 = 88.0;
pub const MAX_FREQUENCY: f32 = 108.0;
pub const DEFAULT_FREQUENCY: f32 = 98.0;

/// Discovered frequencies and decoded messages. Both only ever grow within a session.
#[derive(Debug)]
pub struct SignalLog {
    catalog: Arc<Catalog>,
    epsilon: f32,
    frequencies: Vec<f32>,
    decoded: BTreeSet<String>,
    events: EventQueue,
}

impl SignalLog {
    pub fn new(catalog: Arc<Catalog>, epsilon: f32) -> Self {
        let decoded = initially_decoded(&catalog);
        Self {
            catalog,
            epsilon,
            frequencies: Vec::new(),
            decoded,
            events: EventQueue::default(),
        }
    }

    /// Returns `true` only when the frequency was not already within epsilon of an entry.
    pub fn add_discovered_frequency(&mut self, frequency: f32) -> bool {
        if !frequency.is_finite() || self.is_frequency_discovered(frequency) {
            return false;
        }
        self.frequencies.push(frequency);
        self.events.push(GameEvent::FrequencyDiscovered { frequency });
        true
    }

    pub fn is_frequency_discovered(&self, frequency: f32) -> bool {
        self.frequencies
            .iter()
            .any(|known| (known - frequency).abs() <= self.epsilon)
    }

    pub fn discovered_frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    pub fn decode_message(&mut self, id: &str) -> bool {
        accepted("decode_message", self.try_decode_message(id))
    }

    pub fn try_decode_message(&mut self, id: &str) -> GameResult<()> {
        if self.catalog.message(id).is_none() {
            return Err(GameError::not_found(EntityKind::Message, id));
        }
        if !self.decoded.insert(id.to_string()) {
            return Err(GameError::AlreadyDone {
                kind: EntityKind::Message,
                id: id.to_string(),
                action: "decoded",
            });
        }
        self.events.push(GameEvent::MessageDecoded {
            message: id.to_string(),
        });
        Ok(())
    }

    pub fn is_message_decoded(&self, id: &str) -> bool {
        self.decoded.contains(id)
    }

    pub fn decoded_messages(&self) -> impl Iterator<Item = &str> {
        self.decoded.iter().map(String::as_str)
    }

    pub(crate) fn restore(&mut self, frequencies: Vec<f32>, decoded: Vec<String>) {
        self.frequencies = frequencies;
        self.decoded = initially_decoded(&self.catalog);
        self.decoded.extend(decoded);
    }

    pub(crate) fn drain_events_into(&mut self, out: &mut Vec<GameEvent>) {
        self.events.drain_into(out);
    }
}

fn initially_decoded(catalog: &Catalog) -> BTreeSet<String> {
    catalog
        .messages()
        .iter()
        .filter(|message| message.decoded)
        .map(|message| message.def_name.clone())
        .collect()
}

/// Dial position and power switch.
#[derive(Debug)]
pub struct Radio {
    catalog: Arc<Catalog>,
    frequency: f32,
    on: bool,
    events: EventQueue,
}

impl Radio {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            frequency: DEFAULT_FREQUENCY,
            on: false,
            events: EventQueue::default(),
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn set_power(&mut self, on: bool) {
        if self.on == on {
            return;
        }
        self.on = on;
        self.events.push(GameEvent::RadioPowerChanged { on });
    }

    pub fn toggle_power(&mut self) -> bool {
        self.set_power(!self.on);
        self.on
    }

    /// Moves the dial (clamped to the band) and returns the signal it locks onto.
    /// A switched-off radio never locks.
    pub fn try_tune(&mut self, frequency: f32) -> GameResult<Option<&SignalDef>> {
        if !frequency.is_finite() {
            return Err(GameError::invalid_state(format!(
                "frequency {frequency} is not a number"
            )));
        }
        self.frequency = frequency.clamp(MIN_FREQUENCY, MAX_FREQUENCY);
        let signal = if self.on {
            self.catalog.signal_near(self.frequency)
        } else {
            None
        };
        self.events.push(GameEvent::RadioTuned {
            frequency: self.frequency,
            signal: signal.map(|signal| signal.def_name.clone()),
        });
        Ok(signal)
    }

    /// Strength of the best signal at the current dial position, 0.0 when off.
    pub fn signal_strength(&self) -> f32 {
        if !self.on {
            return 0.0;
        }
        self.catalog
            .signal_near(self.frequency)
            .map(|signal| signal.strength_at(self.frequency))
            .unwrap_or(0.0)
    }

    pub(crate) fn restore(&mut self, frequency: f32, on: bool) {
        self.frequency = frequency.clamp(MIN_FREQUENCY, MAX_FREQUENCY);
        self.on = on;
    }

    pub(crate) fn drain_events_into(&mut self, out: &mut Vec<GameEvent>) {
        self.events.drain_into(out);
    }
}

/// Messages waiting to be shown by the display collaborator.
#[derive(Debug)]
pub struct MessageInbox {
    catalog: Arc<Catalog>,
    pending: VecDeque<String>,
    events: EventQueue,
}

impl MessageInbox {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            pending: VecDeque::new(),
            events: EventQueue::default(),
        }
    }

    pub fn enqueue_message(&mut self, id: &str) -> bool {
        accepted("enqueue_message", self.try_enqueue_message(id))
    }

    pub fn try_enqueue_message(&mut self, id: &str) -> GameResult<()> {
        if self.catalog.message(id).is_none() {
            return Err(GameError::not_found(EntityKind::Message, id));
        }
        self.pending.push_back(id.to_string());
        self.events.push(GameEvent::MessageEnqueued {
            message: id.to_string(),
        });
        Ok(())
    }

    pub fn next_message(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn restore(&mut self, pending: Vec<String>) {
        self.pending = pending.into();
    }

    pub(crate) fn drain_events_into(&mut self, out: &mut Vec<GameEvent>) {
        self.events.drain_into(out);
    }
}
