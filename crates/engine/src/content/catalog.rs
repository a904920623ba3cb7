use std::collections::HashMap;
use std::fmt;

use super::builtin::BUILTIN_SOURCES;
use super::compiler::{compile_catalog_sources, ContentCompileError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemCategory {
    Tool,
    Consumable,
    Key,
    Document,
    Component,
}

impl ItemCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "tool" => Some(Self::Tool),
            "consumable" => Some(Self::Consumable),
            "key" => Some(Self::Key),
            "document" => Some(Self::Document),
            "component" => Some(Self::Component),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Consumable => "consumable",
            Self::Key => "key",
            Self::Document => "document",
            Self::Component => "component",
        }
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemDef {
    pub def_name: String,
    pub label: String,
    pub description: String,
    pub category: ItemCategory,
    pub usable: bool,
    pub consumable: bool,
    pub equippable: bool,
    pub combines_with: Vec<String>,
    pub combination_result: Option<String>,
}

impl ItemDef {
    /// Result of combining this item with `other`, if this def declares the pairing.
    pub fn combination_with(&self, other: &str) -> Option<&str> {
        if self.combines_with.iter().any(|partner| partner == other) {
            self.combination_result.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationDef {
    pub def_name: String,
    pub label: String,
    pub description: String,
    pub position: (f32, f32),
    pub discovered: bool,
    pub connections: Vec<String>,
    /// Items lying at the location when a new game starts.
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectiveKind {
    CollectItem,
    VisitLocation,
    UseItem,
    DecodeMessage,
    TuneFrequency,
}

impl ObjectiveKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "CollectItem" => Some(Self::CollectItem),
            "VisitLocation" => Some(Self::VisitLocation),
            "UseItem" => Some(Self::UseItem),
            "DecodeMessage" => Some(Self::DecodeMessage),
            "TuneFrequency" => Some(Self::TuneFrequency),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectiveTarget {
    CollectItem(String),
    VisitLocation(String),
    UseItem(String),
    DecodeMessage(String),
    TuneFrequency(f32),
}

impl ObjectiveTarget {
    pub fn kind(&self) -> ObjectiveKind {
        match self {
            Self::CollectItem(_) => ObjectiveKind::CollectItem,
            Self::VisitLocation(_) => ObjectiveKind::VisitLocation,
            Self::UseItem(_) => ObjectiveKind::UseItem,
            Self::DecodeMessage(_) => ObjectiveKind::DecodeMessage,
            Self::TuneFrequency(_) => ObjectiveKind::TuneFrequency,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveDef {
    pub id: String,
    pub description: String,
    pub target: ObjectiveTarget,
    pub required: u32,
    /// Optional objectives never hold back quest completion.
    pub optional: bool,
    /// Hidden objectives take no progress until an earlier objective unlocks them.
    pub hidden: bool,
    /// Objective ids of the same quest revealed when this one completes.
    pub unlocks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestReward {
    pub item: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestDef {
    pub def_name: String,
    pub label: String,
    pub description: String,
    pub discovered: bool,
    /// Higher first in priority listings.
    pub priority: i32,
    /// Visiting this location discovers the quest once its prerequisites are complete.
    pub location: Option<String>,
    pub prerequisites: Vec<String>,
    pub objectives: Vec<ObjectiveDef>,
    pub reward: Option<QuestReward>,
    pub reveals_locations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageDef {
    pub def_name: String,
    pub title: String,
    pub content: String,
    pub decoded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalDef {
    pub def_name: String,
    pub frequency: f32,
    pub message: String,
    pub bandwidth: f32,
}

impl SignalDef {
    /// 1.0 on the exact frequency, falling linearly to 0.0 at the bandwidth edge.
    pub fn strength_at(&self, frequency: f32) -> f32 {
        let distance = (frequency - self.frequency).abs();
        if distance > self.bandwidth {
            0.0
        } else {
            1.0 - distance / self.bandwidth
        }
    }
}

/// Static definitions every registry is seeded from. Defs keep document order.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    items: Vec<ItemDef>,
    locations: Vec<LocationDef>,
    quests: Vec<QuestDef>,
    messages: Vec<MessageDef>,
    signals: Vec<SignalDef>,
    item_index: HashMap<String, usize>,
    location_index: HashMap<String, usize>,
    quest_index: HashMap<String, usize>,
    message_index: HashMap<String, usize>,
    fingerprint_sha256_hex: String,
}

impl Catalog {
    pub(crate) fn from_defs(
        items: Vec<ItemDef>,
        locations: Vec<LocationDef>,
        quests: Vec<QuestDef>,
        messages: Vec<MessageDef>,
        signals: Vec<SignalDef>,
        fingerprint_sha256_hex: String,
    ) -> Self {
        Self {
            item_index: index_by_name(&items, |def| &def.def_name),
            location_index: index_by_name(&locations, |def| &def.def_name),
            quest_index: index_by_name(&quests, |def| &def.def_name),
            message_index: index_by_name(&messages, |def| &def.def_name),
            items,
            locations,
            quests,
            messages,
            signals,
            fingerprint_sha256_hex,
        }
    }

    /// Compiles the base content embedded in the engine.
    pub fn builtin() -> Result<Self, ContentCompileError> {
        compile_catalog_sources(BUILTIN_SOURCES)
    }

    pub fn item(&self, def_name: &str) -> Option<&ItemDef> {
        self.item_index
            .get(def_name)
            .and_then(|index| self.items.get(*index))
    }

    pub fn items(&self) -> &[ItemDef] {
        &self.items
    }

    pub fn location(&self, def_name: &str) -> Option<&LocationDef> {
        self.location_index
            .get(def_name)
            .and_then(|index| self.locations.get(*index))
    }

    pub fn locations(&self) -> &[LocationDef] {
        &self.locations
    }

    pub fn quest(&self, def_name: &str) -> Option<&QuestDef> {
        self.quest_index
            .get(def_name)
            .and_then(|index| self.quests.get(*index))
    }

    pub fn quests(&self) -> &[QuestDef] {
        &self.quests
    }

    pub fn message(&self, def_name: &str) -> Option<&MessageDef> {
        self.message_index
            .get(def_name)
            .and_then(|index| self.messages.get(*index))
    }

    pub fn messages(&self) -> &[MessageDef] {
        &self.messages
    }

    pub fn signals(&self) -> &[SignalDef] {
        &self.signals
    }

    /// Strongest signal audible at `frequency`, if any lies within its bandwidth.
    pub fn signal_near(&self, frequency: f32) -> Option<&SignalDef> {
        self.signals
            .iter()
            .filter(|signal| (frequency - signal.frequency).abs() <= signal.bandwidth)
            .max_by(|a, b| a.strength_at(frequency).total_cmp(&b.strength_at(frequency)))
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint_sha256_hex
    }
}

fn index_by_name<T>(defs: &[T], name: impl Fn(&T) -> &String) -> HashMap<String, usize> {
    defs.iter()
        .enumerate()
        .map(|(index, def)| (name(def).clone(), index))
        .collect()
}
