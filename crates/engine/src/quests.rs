use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use crate::content::{Catalog, ObjectiveTarget, QuestDef};
use crate::error::{accepted, EntityKind, GameError, GameResult};
use crate::events::{EventQueue, GameEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectiveState {
    pub id: String,
    pub current: u32,
    pub required: u32,
    pub completed: bool,
    pub optional: bool,
    /// Hidden objectives ignore progress until unlocked.
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestState {
    pub id: String,
    pub discovered: bool,
    pub active: bool,
    pub completed: bool,
    pub failed: bool,
    pub objectives: Vec<ObjectiveState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveUpdate {
    /// Adds to the current amount.
    Add(u32),
    /// Replaces the current amount.
    Set(u32),
}

/// Quest lifecycle: undiscovered -> discovered -> active -> completed or failed.
/// A failed quest may be activated again and keeps its objective progress.
///
/// `current <= required` holds for every objective, and `completed` mirrors
/// `current >= required`. A quest completes the moment its last required
/// (non-optional) objective does. Hidden objectives stay at zero until an
/// objective listing them in `unlocks` completes.
#[derive(Debug)]
pub struct QuestEngine {
    catalog: Arc<Catalog>,
    quests: Vec<QuestState>,
    index: HashMap<String, usize>,
    frequency_epsilon: f32,
    events: EventQueue,
}

impl QuestEngine {
    pub fn new(catalog: Arc<Catalog>, frequency_epsilon: f32) -> Self {
        let quests = catalog
            .quests()
            .iter()
            .map(|def| QuestState {
                id: def.def_name.clone(),
                discovered: def.discovered,
                active: false,
                completed: false,
                failed: false,
                objectives: def
                    .objectives
                    .iter()
                    .map(|objective| ObjectiveState {
                        id: objective.id.clone(),
                        current: 0,
                        required: objective.required,
                        completed: false,
                        optional: objective.optional,
                        hidden: objective.hidden,
                    })
                    .collect(),
            })
            .collect::<Vec<_>>();
        let index = quests
            .iter()
            .enumerate()
            .map(|(index, quest)| (quest.id.clone(), index))
            .collect();
        Self {
            catalog,
            quests,
            index,
            frequency_epsilon,
            events: EventQueue::default(),
        }
    }

    pub fn discover_quest(&mut self, id: &str) -> bool {
        accepted("discover_quest", self.try_discover_quest(id))
    }

    pub fn try_discover_quest(&mut self, id: &str) -> GameResult<()> {
        let index = self.index_of(id)?;
        if self.quests[index].discovered {
            return Err(GameError::invalid_state(format!(
                "quest '{id}' is already discovered"
            )));
        }
        if let Some(missing) = self.first_incomplete_prerequisite(id) {
            return Err(GameError::invalid_state(format!(
                "quest '{id}' requires '{missing}' to be completed first"
            )));
        }
        self.quests[index].discovered = true;
        self.events.push(GameEvent::QuestDiscovered {
            quest: id.to_string(),
        });
        Ok(())
    }

    pub fn activate_quest(&mut self, id: &str) -> bool {
        accepted("activate_quest", self.try_activate_quest(id))
    }

    pub fn try_activate_quest(&mut self, id: &str) -> GameResult<()> {
        let index = self.index_of(id)?;
        let quest = &mut self.quests[index];
        if !quest.discovered {
            return Err(GameError::invalid_state(format!(
                "quest '{id}' has not been discovered"
            )));
        }
        if quest.active || quest.completed {
            return Err(GameError::invalid_state(format!(
                "quest '{id}' is already {}",
                if quest.active { "active" } else { "completed" }
            )));
        }
        quest.active = true;
        quest.failed = false;
        self.events.push(GameEvent::QuestActivated {
            quest: id.to_string(),
        });
        Ok(())
    }

    pub fn update_quest_objective(
        &mut self,
        quest_id: &str,
        objective_id: &str,
        update: ObjectiveUpdate,
    ) -> bool {
        accepted(
            "update_quest_objective",
            self.try_update_quest_objective(quest_id, objective_id, update),
        )
    }

    /// Returns `true` when this update completed the quest.
    pub fn try_update_quest_objective(
        &mut self,
        quest_id: &str,
        objective_id: &str,
        update: ObjectiveUpdate,
    ) -> GameResult<bool> {
        let index = self.index_of(quest_id)?;
        let quest = &mut self.quests[index];
        let Some(objective) = quest
            .objectives
            .iter_mut()
            .find(|objective| objective.id == objective_id)
        else {
            return Err(GameError::not_found(
                EntityKind::Objective,
                format!("{quest_id}/{objective_id}"),
            ));
        };
        if !quest.active {
            return Err(GameError::invalid_state(format!(
                "quest '{quest_id}' is not active"
            )));
        }
        if objective.completed {
            return Err(GameError::invalid_state(format!(
                "objective '{objective_id}' of '{quest_id}' is already complete"
            )));
        }
        if objective.hidden {
            return Err(GameError::invalid_state(format!(
                "objective '{objective_id}' of '{quest_id}' is still hidden"
            )));
        }

        let next = match update {
            ObjectiveUpdate::Add(amount) => objective.current.saturating_add(amount),
            ObjectiveUpdate::Set(amount) => amount,
        }
        .min(objective.required);
        if next == objective.current {
            return Ok(false);
        }
        objective.current = next;
        objective.completed = objective.current >= objective.required;
        let objective_completed = objective.completed;
        let (current, required) = (objective.current, objective.required);

        self.events.push(GameEvent::ObjectiveUpdated {
            quest: quest_id.to_string(),
            objective: objective_id.to_string(),
            current,
            required,
        });
        if !objective_completed {
            return Ok(false);
        }
        self.events.push(GameEvent::ObjectiveCompleted {
            quest: quest_id.to_string(),
            objective: objective_id.to_string(),
        });
        self.unlock_after(index, objective_id);

        if required_objectives_done(&self.quests[index]) {
            self.finish_quest(index);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn complete_quest(&mut self, id: &str) -> bool {
        accepted("complete_quest", self.try_complete_quest(id))
    }

    /// Marks every required objective complete, revealing hidden ones, then
    /// completes the quest. Optional objectives keep their progress.
    pub fn try_complete_quest(&mut self, id: &str) -> GameResult<()> {
        let index = self.index_of(id)?;
        if !self.quests[index].active {
            return Err(GameError::invalid_state(format!(
                "quest '{id}' is not active"
            )));
        }
        let quest = &mut self.quests[index];
        for objective in &mut quest.objectives {
            if objective.completed || objective.optional {
                continue;
            }
            if objective.hidden {
                objective.hidden = false;
                self.events.push(GameEvent::ObjectiveUnlocked {
                    quest: id.to_string(),
                    objective: objective.id.clone(),
                });
            }
            objective.current = objective.required;
            objective.completed = true;
            self.events.push(GameEvent::ObjectiveCompleted {
                quest: id.to_string(),
                objective: objective.id.clone(),
            });
        }
        self.finish_quest(index);
        Ok(())
    }

    pub fn fail_quest(&mut self, id: &str) -> bool {
        accepted("fail_quest", self.try_fail_quest(id))
    }

    pub fn try_fail_quest(&mut self, id: &str) -> GameResult<()> {
        let index = self.index_of(id)?;
        let quest = &mut self.quests[index];
        if !quest.active {
            return Err(GameError::invalid_state(format!(
                "quest '{id}' is not active"
            )));
        }
        quest.active = false;
        quest.failed = true;
        self.events.push(GameEvent::QuestFailed {
            quest: id.to_string(),
        });
        Ok(())
    }

    /// Progresses visit objectives for `location` and discovers quests it triggers.
    pub fn on_location_changed(&mut self, location: &str) {
        let updates = self.matching_objectives(|target| {
            matches!(target, ObjectiveTarget::VisitLocation(id) if id == location)
        });
        self.apply_updates(updates, ObjectiveUpdate::Add(1));

        let triggered = self
            .catalog
            .quests()
            .iter()
            .filter(|def| def.location.as_deref() == Some(location))
            .map(|def| def.def_name.clone())
            .collect::<Vec<_>>();
        for quest in triggered {
            if self.is_quest_discovered(&quest) || self.first_incomplete_prerequisite(&quest).is_some()
            {
                continue;
            }
            self.discover_quest(&quest);
        }
    }

    /// Collect objectives track holdings, capped at the required amount.
    pub fn on_item_acquired(&mut self, item: &str, held: u32) {
        let updates = self.matching_objectives(|target| {
            matches!(target, ObjectiveTarget::CollectItem(id) if id == item)
        });
        self.apply_updates(updates, ObjectiveUpdate::Set(held));
    }

    pub fn on_item_used(&mut self, item: &str) {
        let updates = self.matching_objectives(|target| {
            matches!(target, ObjectiveTarget::UseItem(id) if id == item)
        });
        self.apply_updates(updates, ObjectiveUpdate::Add(1));
    }

    pub fn on_message_decoded(&mut self, message: &str) {
        let updates = self.matching_objectives(|target| {
            matches!(target, ObjectiveTarget::DecodeMessage(id) if id == message)
        });
        self.apply_updates(updates, ObjectiveUpdate::Add(1));
    }

    pub fn on_frequency_discovered(&mut self, frequency: f32) {
        let epsilon = self.frequency_epsilon;
        let updates = self.matching_objectives(|target| {
            matches!(target, ObjectiveTarget::TuneFrequency(wanted) if (wanted - frequency).abs() <= epsilon)
        });
        self.apply_updates(updates, ObjectiveUpdate::Add(1));
    }

    pub fn quest(&self, id: &str) -> Option<&QuestState> {
        self.index.get(id).and_then(|index| self.quests.get(*index))
    }

    pub fn quest_def(&self, id: &str) -> Option<&QuestDef> {
        self.catalog.quest(id)
    }

    pub fn all_quests(&self) -> &[QuestState] {
        &self.quests
    }

    pub fn active_quests(&self) -> Vec<&QuestState> {
        self.quests.iter().filter(|quest| quest.active).collect()
    }

    pub fn completed_quests(&self) -> Vec<&QuestState> {
        self.quests.iter().filter(|quest| quest.completed).collect()
    }

    pub fn discovered_quests(&self) -> Vec<&QuestState> {
        self.quests.iter().filter(|quest| quest.discovered).collect()
    }

    pub fn is_quest_completed(&self, id: &str) -> bool {
        self.quest(id).is_some_and(|quest| quest.completed)
    }

    pub fn is_quest_discovered(&self, id: &str) -> bool {
        self.quest(id).is_some_and(|quest| quest.discovered)
    }

    pub fn is_quest_active(&self, id: &str) -> bool {
        self.quest(id).is_some_and(|quest| quest.active)
    }

    pub fn is_quest_failed(&self, id: &str) -> bool {
        self.quest(id).is_some_and(|quest| quest.failed)
    }

    pub fn failed_quests(&self) -> Vec<&QuestState> {
        self.quests.iter().filter(|quest| quest.failed).collect()
    }

    /// Discovered quests, highest priority first; ties keep catalog order.
    pub fn quests_by_priority(&self) -> Vec<&QuestState> {
        self.sorted_by_priority(|quest| quest.discovered)
    }

    pub fn active_quests_by_priority(&self) -> Vec<&QuestState> {
        self.sorted_by_priority(|quest| quest.active)
    }

    /// Replaces quest flags and objective amounts without events. States must already be validated.
    pub(crate) fn restore(&mut self, states: Vec<QuestState>) {
        for state in states {
            if let Some(index) = self.index.get(&state.id) {
                self.quests[*index] = state;
            }
        }
    }

    pub(crate) fn drain_events_into(&mut self, out: &mut Vec<GameEvent>) {
        self.events.drain_into(out);
    }

    fn index_of(&self, id: &str) -> GameResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GameError::not_found(EntityKind::Quest, id))
    }

    fn first_incomplete_prerequisite(&self, id: &str) -> Option<String> {
        self.catalog.quest(id).and_then(|def| {
            def.prerequisites
                .iter()
                .find(|prerequisite| !self.is_quest_completed(prerequisite))
                .cloned()
        })
    }

    fn sorted_by_priority(&self, keep: impl Fn(&QuestState) -> bool) -> Vec<&QuestState> {
        let mut ranked = self
            .catalog
            .quests()
            .iter()
            .zip(&self.quests)
            .filter(|(_, state)| keep(*state))
            .collect::<Vec<_>>();
        ranked.sort_by_key(|(def, _)| Reverse(def.priority));
        ranked.into_iter().map(|(_, state)| state).collect()
    }

    /// Reveals the objectives that `objective_id` lists in `unlocks`.
    fn unlock_after(&mut self, index: usize, objective_id: &str) {
        let Some(def) = self.catalog.quests()[index]
            .objectives
            .iter()
            .find(|objective| objective.id == objective_id)
        else {
            return;
        };
        let quest = &mut self.quests[index];
        for unlocked in &def.unlocks {
            let Some(objective) = quest
                .objectives
                .iter_mut()
                .find(|objective| objective.id == *unlocked && objective.hidden)
            else {
                continue;
            };
            objective.hidden = false;
            self.events.push(GameEvent::ObjectiveUnlocked {
                quest: quest.id.clone(),
                objective: objective.id.clone(),
            });
        }
    }

    fn finish_quest(&mut self, index: usize) {
        let quest = &mut self.quests[index];
        quest.completed = true;
        quest.active = false;
        self.events.push(GameEvent::QuestCompleted {
            quest: quest.id.clone(),
        });
    }

    /// `(quest, objective)` pairs of active quests whose unfinished objective matches.
    fn matching_objectives(
        &self,
        matches: impl Fn(&ObjectiveTarget) -> bool,
    ) -> Vec<(String, String)> {
        let mut found = Vec::new();
        for (def, state) in self.catalog.quests().iter().zip(&self.quests) {
            if !state.active {
                continue;
            }
            for (objective_def, objective) in def.objectives.iter().zip(&state.objectives) {
                if !objective.completed && !objective.hidden && matches(&objective_def.target) {
                    found.push((state.id.clone(), objective.id.clone()));
                }
            }
        }
        found
    }

    fn apply_updates(&mut self, targets: Vec<(String, String)>, update: ObjectiveUpdate) {
        for (quest, objective) in targets {
            self.update_quest_objective(&quest, &objective, update);
        }
    }
}

fn required_objectives_done(quest: &QuestState) -> bool {
    quest
        .objectives
        .iter()
        .all(|objective| objective.optional || objective.completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> QuestEngine {
        QuestEngine::new(Arc::new(Catalog::builtin().expect("builtin")), 0.05)
    }

    fn drain(engine: &mut QuestEngine) -> Vec<GameEvent> {
        let mut events = Vec::new();
        engine.drain_events_into(&mut events);
        events
    }

    fn assert_objective_bounds(engine: &QuestEngine) {
        for quest in engine.all_quests() {
            for objective in &quest.objectives {
                assert!(objective.current <= objective.required);
                assert_eq!(objective.completed, objective.current >= objective.required);
                if objective.hidden {
                    assert_eq!(objective.current, 0);
                }
            }
        }
    }

    #[test]
    fn prerequisite_gates_discovery_until_completed() {
        let mut engine = engine();
        assert!(!engine.discover_quest("quest_decode_signal"));

        assert!(engine.activate_quest("quest_radio_repair"));
        assert!(engine.update_quest_objective(
            "quest_radio_repair",
            "find_radio_part",
            ObjectiveUpdate::Add(1)
        ));
        assert!(engine.is_quest_completed("quest_radio_repair"));
        assert!(engine.discover_quest("quest_decode_signal"));
        assert!(!engine.discover_quest("quest_decode_signal"));
    }

    #[test]
    fn last_objective_completes_and_deactivates_quest() {
        let mut engine = engine();
        engine.activate_quest("quest_explore_forest");
        drain(&mut engine);

        assert_eq!(
            engine.try_update_quest_objective(
                "quest_explore_forest",
                "visit_forest",
                ObjectiveUpdate::Add(1)
            ),
            Ok(false)
        );
        assert_eq!(
            engine.try_update_quest_objective(
                "quest_explore_forest",
                "find_map_fragment",
                ObjectiveUpdate::Set(5)
            ),
            Ok(true)
        );
        let quest = engine.quest("quest_explore_forest").expect("quest");
        assert!(quest.completed && !quest.active);
        assert_objective_bounds(&engine);
        assert_eq!(
            drain(&mut engine).last(),
            Some(&GameEvent::QuestCompleted {
                quest: "quest_explore_forest".to_string()
            })
        );
    }

    #[test]
    fn updates_require_active_quest_and_known_objective() {
        let mut engine = engine();
        assert!(!engine.update_quest_objective(
            "quest_radio_repair",
            "find_radio_part",
            ObjectiveUpdate::Add(1)
        ));
        engine.activate_quest("quest_radio_repair");
        assert!(matches!(
            engine.try_update_quest_objective("quest_radio_repair", "nope", ObjectiveUpdate::Add(1)),
            Err(GameError::NotFound {
                kind: EntityKind::Objective,
                ..
            })
        ));
        assert!(!engine.update_quest_objective("quest_nope", "x", ObjectiveUpdate::Add(1)));
    }

    #[test]
    fn activation_requires_discovery_and_happens_once() {
        let mut engine = engine();
        assert!(!engine.activate_quest("quest_find_cabin"));
        assert!(engine.activate_quest("quest_radio_repair"));
        assert!(!engine.activate_quest("quest_radio_repair"));
        assert!(engine.is_quest_active("quest_radio_repair"));
        assert_eq!(engine.active_quests().len(), 1);
    }

    #[test]
    fn complete_quest_fills_objectives() {
        let mut engine = engine();
        assert!(!engine.complete_quest("quest_find_cabin"));
        engine.activate_quest("quest_explore_forest");
        assert!(engine.complete_quest("quest_explore_forest"));
        assert!(engine.is_quest_completed("quest_explore_forest"));
        assert!(!engine.complete_quest("quest_explore_forest"));
        assert_objective_bounds(&engine);
        assert_eq!(engine.completed_quests().len(), 1);
    }

    #[test]
    fn location_change_progresses_visits_and_triggers_discovery() {
        let mut engine = engine();
        engine.activate_quest("quest_explore_forest");
        engine.on_location_changed("forest");
        let quest = engine.quest("quest_explore_forest").expect("quest");
        assert!(quest.objectives[0].completed);
        assert!(!engine.is_quest_discovered("quest_find_cabin"));

        engine.on_item_acquired("map_fragment", 1);
        assert!(engine.is_quest_completed("quest_explore_forest"));
        engine.on_location_changed("forest");
        assert!(engine.is_quest_discovered("quest_find_cabin"));
        assert!(engine.is_quest_discovered("quest_find_town"));
    }

    #[test]
    fn hooks_only_touch_active_quests() {
        let mut engine = engine();
        engine.on_item_acquired("radio_part", 1);
        assert!(!engine.is_quest_completed("quest_radio_repair"));

        engine.activate_quest("quest_radio_repair");
        engine.on_item_acquired("radio_part", 3);
        let quest = engine.quest("quest_radio_repair").expect("quest");
        assert!(quest.completed);
        assert_eq!(quest.objectives[0].current, 1);
    }

    fn cabin_engine() -> QuestEngine {
        let mut engine = engine();
        let index = engine.index["quest_find_cabin"];
        engine.quests[index].discovered = true;
        assert!(engine.activate_quest("quest_find_cabin"));
        drain(&mut engine);
        engine
    }

    #[test]
    fn hidden_objective_unlocks_when_its_unlocker_completes() {
        let mut engine = cabin_engine();
        engine.on_item_used("key_cabin");
        let quest = engine.quest("quest_find_cabin").expect("quest");
        assert!(quest.objectives[2].hidden);
        assert_eq!(quest.objectives[2].current, 0);
        assert!(matches!(
            engine.try_update_quest_objective(
                "quest_find_cabin",
                "use_cabin_key",
                ObjectiveUpdate::Add(1)
            ),
            Err(GameError::InvalidState(_))
        ));

        engine.on_location_changed("cabin");
        let events = drain(&mut engine);
        assert!(events.contains(&GameEvent::ObjectiveUnlocked {
            quest: "quest_find_cabin".to_string(),
            objective: "use_cabin_key".to_string(),
        }));
        engine.on_item_used("key_cabin");
        let quest = engine.quest("quest_find_cabin").expect("quest");
        assert!(!quest.objectives[2].hidden && quest.objectives[2].completed);
        assert_objective_bounds(&engine);
    }

    #[test]
    fn optional_objectives_do_not_hold_back_completion() {
        let mut engine = cabin_engine();
        engine.on_item_acquired("key_cabin", 1);
        engine.on_location_changed("cabin");
        engine.on_item_used("key_cabin");

        let quest = engine.quest("quest_find_cabin").expect("quest");
        assert!(quest.completed);
        assert!(quest.objectives[3].optional && !quest.objectives[3].completed);
    }

    #[test]
    fn complete_quest_reveals_hidden_and_skips_optional_objectives() {
        let mut engine = cabin_engine();
        assert!(engine.complete_quest("quest_find_cabin"));
        let events = drain(&mut engine);
        let unlocked = events
            .iter()
            .position(|event| matches!(event, GameEvent::ObjectiveUnlocked { objective, .. } if objective == "use_cabin_key"))
            .expect("unlocked");
        let completed = events
            .iter()
            .position(|event| matches!(event, GameEvent::ObjectiveCompleted { objective, .. } if objective == "use_cabin_key"))
            .expect("completed");
        assert!(unlocked < completed);

        let quest = engine.quest("quest_find_cabin").expect("quest");
        assert_eq!(quest.objectives[3].current, 0);
        assert!(!quest.objectives[3].completed);
        assert_objective_bounds(&engine);
    }

    #[test]
    fn failing_requires_an_active_quest_and_can_be_retried() {
        let mut engine = engine();
        assert!(!engine.fail_quest("quest_radio_repair"));
        assert!(!engine.fail_quest("quest_nope"));

        engine.activate_quest("quest_explore_forest");
        engine.on_location_changed("forest");
        drain(&mut engine);
        assert!(engine.fail_quest("quest_explore_forest"));
        assert_eq!(
            drain(&mut engine),
            vec![GameEvent::QuestFailed {
                quest: "quest_explore_forest".to_string()
            }]
        );
        assert!(engine.is_quest_failed("quest_explore_forest"));
        assert!(!engine.is_quest_active("quest_explore_forest"));
        assert_eq!(engine.failed_quests().len(), 1);

        engine.on_item_acquired("map_fragment", 1);
        assert!(!engine.is_quest_completed("quest_explore_forest"));
        assert!(!engine.fail_quest("quest_explore_forest"));

        assert!(engine.activate_quest("quest_explore_forest"));
        assert!(!engine.is_quest_failed("quest_explore_forest"));
        let quest = engine.quest("quest_explore_forest").expect("quest");
        assert!(quest.objectives[0].completed);
        engine.on_item_acquired("map_fragment", 1);
        assert!(engine.is_quest_completed("quest_explore_forest"));
    }

    #[test]
    fn priority_listings_sort_high_to_low_and_keep_catalog_order_on_ties() {
        let mut engine = engine();
        for quest in &mut engine.quests {
            quest.discovered = true;
        }
        let ranked = engine.quests_by_priority();
        assert_eq!(ranked.len(), engine.all_quests().len());
        assert_eq!(ranked[0].id, "quest_radio_repair");
        let priorities = ranked
            .iter()
            .map(|quest| engine.quest_def(&quest.id).expect("def").priority)
            .collect::<Vec<_>>();
        assert!(priorities.windows(2).all(|pair| pair[0] >= pair[1]));
        let tied = ranked
            .iter()
            .filter(|quest| engine.quest_def(&quest.id).is_some_and(|def| def.priority == 9))
            .map(|quest| quest.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(tied, vec!["quest_find_signal", "quest_decode_signal"]);

        engine.activate_quest("quest_find_cabin");
        engine.activate_quest("quest_find_town");
        let active = engine
            .active_quests_by_priority()
            .into_iter()
            .map(|quest| quest.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(active, vec!["quest_find_town", "quest_find_cabin"]);
    }

    #[test]
    fn frequency_hook_matches_within_epsilon() {
        let mut engine = engine();
        engine.quests[engine.index["quest_find_signal"]].discovered = true;
        engine.activate_quest("quest_find_signal");
        engine.on_frequency_discovered(91.7);
        assert!(!engine.is_quest_completed("quest_find_signal"));
        engine.on_frequency_discovered(91.53);
        assert!(engine.is_quest_completed("quest_find_signal"));
    }
}
