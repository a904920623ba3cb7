use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::content::{sha256_hex, Catalog};
use crate::inventory::InventoryEntry;
use crate::map::LocationState;
use crate::progression::ProgressionStage;
use crate::quests::{ObjectiveState, QuestState};
use crate::session::{GameSession, Registries};
use crate::signals::{MAX_FREQUENCY, MIN_FREQUENCY};

use super::PersistenceError;

pub const SAVE_VERSION: u32 = 2;

type ValidationResult = Result<(), PersistenceError>;

/// On-disk envelope around a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    pub save_version: u32,
    /// SHA-256 of the compact JSON encoding of `snapshot`.
    pub checksum_sha256_hex: String,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub frequency: f32,
    pub radio_on: bool,
    pub discovered_frequencies: Vec<f32>,
    pub inventory: Vec<InventoryEntry>,
    pub equipped: Vec<String>,
    pub progress: u32,
    pub quests: Vec<SavedQuest>,
    pub locations: Vec<SavedLocation>,
    pub stage: ProgressionStage,
    pub current_location: String,
    pub decoded_messages: Vec<String>,
    pub inbox: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedQuest {
    pub id: String,
    pub discovered: bool,
    pub active: bool,
    pub completed: bool,
    pub failed: bool,
    pub objectives: Vec<SavedObjective>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedObjective {
    pub id: String,
    pub current_amount: u32,
    pub completed: bool,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedLocation {
    pub id: String,
    pub discovered: bool,
    pub items: Vec<String>,
}

impl SessionSnapshot {
    pub fn capture(session: &GameSession) -> Self {
        let registries = session.registries();
        Self {
            frequency: registries.radio.frequency(),
            radio_on: registries.radio.is_on(),
            discovered_frequencies: registries.signals.discovered_frequencies().to_vec(),
            inventory: registries.inventory.entries().to_vec(),
            equipped: registries.inventory.equipped_items(),
            progress: registries.progress,
            quests: registries
                .quests
                .all_quests()
                .iter()
                .map(|quest| SavedQuest {
                    id: quest.id.clone(),
                    discovered: quest.discovered,
                    active: quest.active,
                    completed: quest.completed,
                    failed: quest.failed,
                    objectives: quest
                        .objectives
                        .iter()
                        .map(|objective| SavedObjective {
                            id: objective.id.clone(),
                            current_amount: objective.current,
                            completed: objective.completed,
                            hidden: objective.hidden,
                        })
                        .collect(),
                })
                .collect(),
            locations: registries
                .map
                .states()
                .iter()
                .map(|location| SavedLocation {
                    id: location.id.clone(),
                    discovered: location.discovered,
                    items: location.items.clone(),
                })
                .collect(),
            stage: session.stage(),
            current_location: registries.map.current_location().to_string(),
            decoded_messages: registries
                .signals
                .decoded_messages()
                .map(str::to_string)
                .collect(),
            inbox: registries.inbox.pending().map(str::to_string).collect(),
        }
    }

    pub fn checksum(&self) -> Result<String, PersistenceError> {
        let compact = serde_json::to_string(self).map_err(PersistenceError::Encode)?;
        Ok(sha256_hex(compact.as_bytes()))
    }

    /// Builds fresh registries holding this snapshot's state. Live state is never touched.
    pub(crate) fn rebuild(
        &self,
        catalog: Arc<Catalog>,
        config: &SessionConfig,
    ) -> Result<Registries, PersistenceError> {
        self.validate(&catalog, config)?;

        let mut registries = Registries::new(Arc::clone(&catalog), config);
        registries.radio.restore(self.frequency, self.radio_on);
        registries
            .signals
            .restore(self.discovered_frequencies.clone(), self.decoded_messages.clone());
        registries.inventory.restore(&self.inventory, &self.equipped);

        let mut quests = Vec::with_capacity(self.quests.len());
        for saved in &self.quests {
            let Some(def) = catalog.quest(&saved.id) else {
                continue;
            };
            quests.push(QuestState {
                id: saved.id.clone(),
                discovered: saved.discovered,
                active: saved.active,
                completed: saved.completed,
                failed: saved.failed,
                objectives: saved
                    .objectives
                    .iter()
                    .zip(&def.objectives)
                    .map(|(objective, objective_def)| ObjectiveState {
                        id: objective.id.clone(),
                        current: objective.current_amount,
                        required: objective_def.required,
                        completed: objective.completed,
                        optional: objective_def.optional,
                        hidden: objective.hidden,
                    })
                    .collect(),
            });
        }
        registries.quests.restore(quests);

        let locations = self
            .locations
            .iter()
            .map(|saved| LocationState {
                id: saved.id.clone(),
                discovered: saved.discovered,
                items: saved.items.clone(),
            })
            .collect();
        registries.map.restore(&self.current_location, locations);
        registries.inbox.restore(self.inbox.clone());
        registries.progress = self.progress;
        Ok(registries)
    }

    fn validate(&self, catalog: &Catalog, config: &SessionConfig) -> ValidationResult {
        if !self.frequency.is_finite() || !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&self.frequency)
        {
            return Err(expected_actual(
                "snapshot.frequency",
                format!("a frequency in {MIN_FREQUENCY}..={MAX_FREQUENCY}"),
                self.frequency,
            ));
        }
        for (index, frequency) in self.discovered_frequencies.iter().enumerate() {
            if !frequency.is_finite() {
                return Err(expected_actual(
                    &format!("snapshot.discovered_frequencies[{index}]"),
                    "finite number",
                    frequency,
                ));
            }
        }
        if self.progress != self.stage.index() {
            return Err(expected_actual(
                "snapshot.progress",
                format!("{} to mirror stage {}", self.stage.index(), self.stage),
                self.progress,
            ));
        }

        self.validate_inventory(catalog, config)?;
        self.validate_quests(catalog)?;
        self.validate_locations(catalog)?;

        for (field, ids) in [
            ("decoded_messages", &self.decoded_messages),
            ("inbox", &self.inbox),
        ] {
            for (index, id) in ids.iter().enumerate() {
                if catalog.message(id).is_none() {
                    return Err(validation_err(
                        &format!("snapshot.{field}[{index}]"),
                        format!("unknown message '{id}'"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_inventory(&self, catalog: &Catalog, config: &SessionConfig) -> ValidationResult {
        let mut seen = HashSet::new();
        let mut total: u64 = 0;
        for (index, entry) in self.inventory.iter().enumerate() {
            let path = format!("snapshot.inventory[{index}]");
            if catalog.item(&entry.item).is_none() {
                return Err(validation_err(
                    &format!("{path}.item"),
                    format!("unknown item '{}'", entry.item),
                ));
            }
            if !seen.insert(entry.item.as_str()) {
                return Err(validation_err(
                    &format!("{path}.item"),
                    format!("item '{}' listed twice", entry.item),
                ));
            }
            if entry.quantity == 0 {
                return Err(expected_actual(
                    &format!("{path}.quantity"),
                    "at least 1",
                    entry.quantity,
                ));
            }
            total += u64::from(entry.quantity);
        }
        if total > u64::from(config.inventory_capacity) {
            return Err(expected_actual(
                "snapshot.inventory",
                format!("at most {} items", config.inventory_capacity),
                total,
            ));
        }

        let mut equipped = HashSet::new();
        for (index, item) in self.equipped.iter().enumerate() {
            let path = format!("snapshot.equipped[{index}]");
            let Some(def) = catalog.item(item) else {
                return Err(validation_err(&path, format!("unknown item '{item}'")));
            };
            if !def.equippable {
                return Err(validation_err(&path, format!("'{item}' cannot be equipped")));
            }
            if !seen.contains(item.as_str()) {
                return Err(validation_err(&path, format!("equipped item '{item}' is not held")));
            }
            if !equipped.insert(item.as_str()) {
                return Err(validation_err(&path, format!("item '{item}' equipped twice")));
            }
        }
        Ok(())
    }

    fn validate_quests(&self, catalog: &Catalog) -> ValidationResult {
        let mut seen = HashSet::new();
        for (index, quest) in self.quests.iter().enumerate() {
            let path = format!("snapshot.quests[{index}]");
            let Some(def) = catalog.quest(&quest.id) else {
                return Err(validation_err(
                    &format!("{path}.id"),
                    format!("unknown quest '{}'", quest.id),
                ));
            };
            if !seen.insert(quest.id.as_str()) {
                return Err(validation_err(
                    &format!("{path}.id"),
                    format!("quest '{}' listed twice", quest.id),
                ));
            }
            if (quest.active || quest.completed) && !quest.discovered {
                return Err(validation_err(
                    &path,
                    "active or completed quest must be discovered",
                ));
            }
            if quest.active && quest.completed {
                return Err(validation_err(&path, "completed quest cannot stay active"));
            }
            if quest.failed && !quest.discovered {
                return Err(validation_err(&path, "failed quest must be discovered"));
            }
            if quest.failed && (quest.active || quest.completed) {
                return Err(validation_err(
                    &path,
                    "failed quest cannot be active or completed",
                ));
            }
            if quest.objectives.len() != def.objectives.len() {
                return Err(expected_actual(
                    &format!("{path}.objectives"),
                    format!("{} objectives", def.objectives.len()),
                    quest.objectives.len(),
                ));
            }

            for (objective_index, (objective, objective_def)) in
                quest.objectives.iter().zip(&def.objectives).enumerate()
            {
                let objective_path = format!("{path}.objectives[{objective_index}]");
                if objective.id != objective_def.id {
                    return Err(expected_actual(
                        &format!("{objective_path}.id"),
                        &objective_def.id,
                        &objective.id,
                    ));
                }
                if objective.current_amount > objective_def.required {
                    return Err(expected_actual(
                        &format!("{objective_path}.current_amount"),
                        format!("at most {}", objective_def.required),
                        objective.current_amount,
                    ));
                }
                let reached = objective.current_amount >= objective_def.required;
                if objective.completed != reached {
                    return Err(expected_actual(
                        &format!("{objective_path}.completed"),
                        reached,
                        objective.completed,
                    ));
                }
                if objective.hidden && !objective_def.hidden {
                    return Err(expected_actual(
                        &format!("{objective_path}.hidden"),
                        false,
                        objective.hidden,
                    ));
                }
                if objective.hidden && objective.current_amount > 0 {
                    return Err(expected_actual(
                        &format!("{objective_path}.current_amount"),
                        "0 while hidden",
                        objective.current_amount,
                    ));
                }
                if quest.completed && !objective_def.optional && !objective.completed {
                    return Err(validation_err(
                        &objective_path,
                        "completed quest has an unfinished objective",
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_locations(&self, catalog: &Catalog) -> ValidationResult {
        let mut seen = HashSet::new();
        for (index, location) in self.locations.iter().enumerate() {
            let path = format!("snapshot.locations[{index}]");
            let Some(def) = catalog.location(&location.id) else {
                return Err(validation_err(
                    &format!("{path}.id"),
                    format!("unknown location '{}'", location.id),
                ));
            };
            if !seen.insert(location.id.as_str()) {
                return Err(validation_err(
                    &format!("{path}.id"),
                    format!("location '{}' listed twice", location.id),
                ));
            }
            if def.discovered && !location.discovered {
                return Err(expected_actual(
                    &format!("{path}.discovered"),
                    "true for a starting location",
                    location.discovered,
                ));
            }
            for (item_index, item) in location.items.iter().enumerate() {
                if catalog.item(item).is_none() {
                    return Err(validation_err(
                        &format!("{path}.items[{item_index}]"),
                        format!("unknown item '{item}'"),
                    ));
                }
            }
        }

        let Some(current) = catalog.location(&self.current_location) else {
            return Err(validation_err(
                "snapshot.current_location",
                format!("unknown location '{}'", self.current_location),
            ));
        };
        let discovered = self
            .locations
            .iter()
            .find(|location| location.id == current.def_name)
            .map(|location| location.discovered)
            .unwrap_or(current.discovered);
        if !discovered {
            return Err(validation_err(
                "snapshot.current_location",
                format!("location '{}' is not discovered", self.current_location),
            ));
        }
        Ok(())
    }
}

impl SaveFile {
    pub fn new(snapshot: SessionSnapshot) -> Result<Self, PersistenceError> {
        Ok(Self {
            save_version: SAVE_VERSION,
            checksum_sha256_hex: snapshot.checksum()?,
            snapshot,
        })
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        serde_json::to_string_pretty(self).map_err(PersistenceError::Encode)
    }

    /// Parses and checks the envelope. Snapshot contents are checked by `rebuild`.
    pub fn parse(raw: &str) -> Result<Self, PersistenceError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let save: SaveFile = match serde_path_to_error::deserialize(&mut deserializer) {
            Ok(save) => save,
            Err(error) => {
                let path = error.path().to_string();
                let source = error.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_string()
                } else {
                    path
                };
                return Err(PersistenceError::Parse {
                    path,
                    message: source.to_string(),
                });
            }
        };

        if save.save_version != SAVE_VERSION {
            return Err(expected_actual(
                "save_version",
                SAVE_VERSION,
                save.save_version,
            ));
        }
        let actual = save.snapshot.checksum()?;
        if actual != save.checksum_sha256_hex {
            return Err(PersistenceError::ChecksumMismatch {
                expected: save.checksum_sha256_hex,
                actual,
            });
        }
        Ok(save)
    }
}

fn validation_err(path: &str, message: impl Into<String>) -> PersistenceError {
    PersistenceError::Validation {
        path: path.to_string(),
        message: message.into(),
    }
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> PersistenceError {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> GameSession {
        GameSession::builtin(SessionConfig::default()).expect("session")
    }

    fn snapshot_of(session: &GameSession) -> SessionSnapshot {
        SessionSnapshot::capture(session)
    }

    fn rebuild(snapshot: &SessionSnapshot) -> Result<Registries, PersistenceError> {
        let catalog = Arc::new(Catalog::builtin().expect("catalog"));
        snapshot.rebuild(catalog, &SessionConfig::default())
    }

    #[test]
    fn fresh_session_snapshot_rebuilds_cleanly() {
        let session = session();
        let snapshot = snapshot_of(&session);
        assert_eq!(snapshot.stage, ProgressionStage::Beginning);
        assert_eq!(snapshot.current_location, "bunker");

        let registries = rebuild(&snapshot).expect("rebuild");
        assert_eq!(registries.map.current_location(), "bunker");
        assert_eq!(registries.quests.all_quests(), session.quests().all_quests());
    }

    #[test]
    fn checksum_covers_snapshot_contents() {
        let session = session();
        let save = SaveFile::new(snapshot_of(&session)).expect("save");
        let json = save.to_json().expect("json");
        assert_eq!(SaveFile::parse(&json).expect("parse"), save);

        let mut tampered = save.clone();
        tampered.snapshot.radio_on = !tampered.snapshot.radio_on;
        let json = tampered.to_json().expect("json");
        assert!(matches!(
            SaveFile::parse(&json),
            Err(PersistenceError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn parse_errors_name_the_json_path() {
        let session = session();
        let save = SaveFile::new(snapshot_of(&session)).expect("save");
        let mut value = serde_json::to_value(&save).expect("value");
        value["snapshot"]["radio_on"] = serde_json::Value::String("yes".to_string());

        let error = SaveFile::parse(&value.to_string()).expect_err("must fail");
        match error {
            PersistenceError::Parse { path, .. } => assert_eq!(path, "snapshot.radio_on"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            SaveFile::parse("not json"),
            Err(PersistenceError::Parse { .. })
        ));
    }

    #[test]
    fn newer_save_version_is_rejected() {
        let session = session();
        let mut save = SaveFile::new(snapshot_of(&session)).expect("save");
        save.save_version = SAVE_VERSION + 1;
        let error = SaveFile::parse(&save.to_json().expect("json")).expect_err("must fail");
        assert_eq!(
            error.to_string(),
            format!(
                "validation failed at save_version: expected {SAVE_VERSION}, got {}",
                SAVE_VERSION + 1
            )
        );
    }

    #[test]
    fn objective_bounds_are_enforced() {
        let session = session();
        let mut snapshot = snapshot_of(&session);
        snapshot.quests[0].objectives[0].current_amount = 99;

        let error = rebuild(&snapshot).expect_err("must fail");
        assert!(matches!(
            error,
            PersistenceError::Validation { ref path, .. }
                if path == "snapshot.quests[0].objectives[0].current_amount"
        ));
    }

    #[test]
    fn quest_flag_invariants_are_enforced() {
        let session = session();
        let mut snapshot = snapshot_of(&session);
        let quest = snapshot
            .quests
            .iter_mut()
            .find(|quest| quest.id == "quest_find_town")
            .expect("quest");
        quest.active = true;

        assert!(matches!(
            rebuild(&snapshot),
            Err(PersistenceError::Validation { .. })
        ));
    }

    #[test]
    fn unknown_ids_and_stage_mismatch_are_rejected() {
        let session = session();

        let mut unknown_item = snapshot_of(&session);
        unknown_item.inventory.push(InventoryEntry {
            item: "laser_cannon".to_string(),
            quantity: 1,
        });
        assert!(rebuild(&unknown_item).is_err());

        let mut wrong_progress = snapshot_of(&session);
        wrong_progress.progress = 4;
        assert!(rebuild(&wrong_progress).is_err());

        let mut hidden_location = snapshot_of(&session);
        hidden_location.current_location = "factory".to_string();
        assert!(rebuild(&hidden_location).is_err());

        let mut unknown_message = snapshot_of(&session);
        unknown_message.inbox.push("msg_999".to_string());
        assert!(rebuild(&unknown_message).is_err());
    }

    #[test]
    fn location_without_items_is_a_parse_error() {
        let session = session();
        let save = SaveFile::new(snapshot_of(&session)).expect("save");
        let mut value = serde_json::to_value(&save).expect("value");
        let removed = value["snapshot"]["locations"][0]
            .as_object_mut()
            .expect("location object")
            .remove("items");
        assert!(removed.is_some());

        match SaveFile::parse(&value.to_string()).expect_err("must fail") {
            PersistenceError::Parse { path, message } => {
                assert!(path.starts_with("snapshot.locations[0]"), "{path}");
                assert!(message.contains("items"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failed_quest_hidden_objective_and_equipment_survive_rebuild() {
        let mut session = session();
        assert!(session.pick_up_item("flashlight"));
        assert!(session.equip_item("flashlight"));
        assert!(session.activate_quest("quest_explore_forest"));
        assert!(session.fail_quest("quest_explore_forest"));

        let snapshot = snapshot_of(&session);
        assert_eq!(snapshot.equipped, vec!["flashlight".to_string()]);
        let cabin = snapshot
            .quests
            .iter()
            .find(|quest| quest.id == "quest_find_cabin")
            .expect("cabin");
        assert!(cabin.objectives[2].hidden);

        let registries = rebuild(&snapshot).expect("rebuild");
        assert!(registries.inventory.is_equipped("flashlight"));
        assert!(registries.quests.is_quest_failed("quest_explore_forest"));
        assert_eq!(registries.quests.all_quests(), session.quests().all_quests());
    }

    #[test]
    fn failed_and_hidden_flags_are_checked() {
        let mut session = session();
        session.activate_quest("quest_explore_forest");
        session.fail_quest("quest_explore_forest");
        let base = snapshot_of(&session);
        let quest_index = |id: &str| {
            base.quests
                .iter()
                .position(|quest| quest.id == id)
                .expect("quest")
        };

        let forest = quest_index("quest_explore_forest");
        let mut failed_and_active = base.clone();
        failed_and_active.quests[forest].active = true;
        assert!(matches!(
            rebuild(&failed_and_active),
            Err(PersistenceError::Validation { ref path, .. })
                if *path == format!("snapshot.quests[{forest}]")
        ));

        let cabin = quest_index("quest_find_cabin");
        let mut hidden_progress = base.clone();
        hidden_progress.quests[cabin].objectives[2].current_amount = 1;
        hidden_progress.quests[cabin].objectives[2].completed = true;
        assert!(matches!(
            rebuild(&hidden_progress),
            Err(PersistenceError::Validation { ref path, .. })
                if *path == format!("snapshot.quests[{cabin}].objectives[2].current_amount")
        ));

        let mut not_hideable = base.clone();
        not_hideable.quests[cabin].objectives[0].hidden = true;
        assert!(matches!(
            rebuild(&not_hideable),
            Err(PersistenceError::Validation { ref path, .. })
                if *path == format!("snapshot.quests[{cabin}].objectives[0].hidden")
        ));
    }

    #[test]
    fn equipped_items_must_be_held_and_equippable() {
        let mut session = session();
        session.pick_up_item("flashlight");
        let base = snapshot_of(&session);

        let mut not_held = base.clone();
        not_held.equipped.push("radio".to_string());
        let error = rebuild(&not_held).expect_err("must fail");
        assert!(error.to_string().contains("is not held"));

        let mut held_medkit = base.clone();
        held_medkit.inventory.push(InventoryEntry {
            item: "medkit".to_string(),
            quantity: 1,
        });
        held_medkit.equipped.push("medkit".to_string());
        let error = rebuild(&held_medkit).expect_err("must fail");
        assert!(error.to_string().contains("cannot be equipped"));

        let mut twice = base;
        twice.equipped = vec!["flashlight".to_string(), "flashlight".to_string()];
        assert!(matches!(
            rebuild(&twice),
            Err(PersistenceError::Validation { ref path, .. }) if path == "snapshot.equipped[1]"
        ));
    }

    #[test]
    fn over_capacity_inventory_is_rejected() {
        let session = session();
        let mut snapshot = snapshot_of(&session);
        snapshot.inventory.push(InventoryEntry {
            item: "battery".to_string(),
            quantity: 21,
        });
        let error = rebuild(&snapshot).expect_err("must fail");
        assert!(error.to_string().contains("at most 20 items"));
    }
}
