use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::content::Catalog;
use crate::error::EntityKind;
use crate::events::{EventQueue, GameEvent};
use crate::session::{Registries, SessionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProgressionStage {
    Beginning,
    RadioRepair,
    FirstSignal,
    ForestExploration,
    TownDiscovery,
    SurvivorContact,
    FactoryAccess,
    Endgame,
}

impl ProgressionStage {
    pub const ALL: [ProgressionStage; 8] = [
        Self::Beginning,
        Self::RadioRepair,
        Self::FirstSignal,
        Self::ForestExploration,
        Self::TownDiscovery,
        Self::SurvivorContact,
        Self::FactoryAccess,
        Self::Endgame,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Beginning => "Beginning",
            Self::RadioRepair => "RadioRepair",
            Self::FirstSignal => "FirstSignal",
            Self::ForestExploration => "ForestExploration",
            Self::TownDiscovery => "TownDiscovery",
            Self::SurvivorContact => "SurvivorContact",
            Self::FactoryAccess => "FactoryAccess",
            Self::Endgame => "Endgame",
        }
    }
}

impl fmt::Display for ProgressionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Predicate over the registries that lets the machine leave a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    QuestCompleted(String),
    FrequencyDiscovered(f32),
    LocationDiscovered(String),
    ItemHeld(String),
    All(Vec<Requirement>),
}

impl Requirement {
    pub fn is_met(&self, registries: &Registries) -> bool {
        match self {
            Self::QuestCompleted(quest) => registries.quests.is_quest_completed(quest),
            Self::FrequencyDiscovered(frequency) => {
                registries.signals.is_frequency_discovered(*frequency)
            }
            Self::LocationDiscovered(location) => registries.map.is_location_discovered(location),
            Self::ItemHeld(item) => registries.inventory.has_item(item, 1),
            Self::All(requirements) => requirements
                .iter()
                .all(|requirement| requirement.is_met(registries)),
        }
    }

    fn references(&self, out: &mut Vec<(EntityKind, String)>) {
        match self {
            Self::QuestCompleted(quest) => out.push((EntityKind::Quest, quest.clone())),
            Self::FrequencyDiscovered(_) => {}
            Self::LocationDiscovered(location) => {
                out.push((EntityKind::Location, location.clone()))
            }
            Self::ItemHeld(item) => out.push((EntityKind::Item, item.clone())),
            Self::All(requirements) => {
                for requirement in requirements {
                    requirement.references(out);
                }
            }
        }
    }
}

/// Run once when the machine enters a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryAction {
    DiscoverQuest(String),
    ActivateQuest(String),
    DiscoverLocation(String),
    EnqueueMessage(String),
}

impl EntryAction {
    fn reference(&self) -> (EntityKind, &str) {
        match self {
            Self::DiscoverQuest(id) | Self::ActivateQuest(id) => (EntityKind::Quest, id),
            Self::DiscoverLocation(id) => (EntityKind::Location, id),
            Self::EnqueueMessage(id) => (EntityKind::Message, id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageDef {
    pub stage: ProgressionStage,
    pub description: &'static str,
    pub next_objective: &'static str,
    /// `None` only for the terminal stage.
    pub advance_when: Option<Requirement>,
    pub on_enter: Vec<EntryAction>,
}

fn quest(id: &str) -> EntryAction {
    EntryAction::DiscoverQuest(id.to_string())
}

fn activate(id: &str) -> EntryAction {
    EntryAction::ActivateQuest(id.to_string())
}

fn location(id: &str) -> EntryAction {
    EntryAction::DiscoverLocation(id.to_string())
}

fn message(id: &str) -> EntryAction {
    EntryAction::EnqueueMessage(id.to_string())
}

/// The story line, one entry per stage in order.
pub fn standard_stage_table() -> Vec<StageDef> {
    use ProgressionStage::*;

    vec![
        StageDef {
            stage: Beginning,
            description: "You've just arrived at the emergency bunker. Your radio is damaged and needs repair.",
            next_objective: "Repair your radio by finding the necessary components.",
            advance_when: Some(Requirement::QuestCompleted("quest_radio_repair".to_string())),
            on_enter: Vec::new(),
        },
        StageDef {
            stage: RadioRepair,
            description: "You've repaired your radio. Now you can search for signals and try to make contact with other survivors.",
            next_objective: "Find and tune into a radio signal.",
            advance_when: Some(Requirement::FrequencyDiscovered(91.5)),
            on_enter: vec![
                quest("quest_find_signal"),
                activate("quest_find_signal"),
                message("msg_radio_repaired"),
            ],
        },
        StageDef {
            stage: FirstSignal,
            description: "You've found your first signal. It seems to be coming from the forest. You should investigate.",
            next_objective: "Explore the forest to find signs of other survivors.",
            advance_when: Some(Requirement::QuestCompleted("quest_explore_forest".to_string())),
            on_enter: vec![
                location("forest"),
                quest("quest_explore_forest"),
                activate("quest_explore_forest"),
                message("msg_forest_signal"),
            ],
        },
        StageDef {
            stage: ForestExploration,
            description: "You've explored the forest and found some useful items. There are rumors of a town nearby.",
            next_objective: "Find the abandoned town.",
            advance_when: Some(Requirement::LocationDiscovered("town".to_string())),
            on_enter: vec![
                location("cabin"),
                location("lake"),
                location("road"),
                quest("quest_find_town"),
                activate("quest_find_town"),
                message("msg_town_rumors"),
            ],
        },
        StageDef {
            stage: TownDiscovery,
            description: "You've discovered the abandoned town. There might be survivors hiding somewhere nearby.",
            next_objective: "Decode the survivor's message and locate them.",
            advance_when: Some(Requirement::QuestCompleted("quest_survivor_message".to_string())),
            on_enter: vec![
                quest("quest_decode_signal"),
                activate("quest_decode_signal"),
                message("msg_town_discovery"),
            ],
        },
        StageDef {
            stage: SurvivorContact,
            description: "You've made contact with survivors. They're hiding in the old factory, but you need a key to get in.",
            next_objective: "Find the factory key to access the survivor's hideout.",
            advance_when: Some(Requirement::All(vec![
                Requirement::LocationDiscovered("factory".to_string()),
                Requirement::ItemHeld("factory_key".to_string()),
            ])),
            on_enter: vec![
                location("factory"),
                quest("quest_factory_key"),
                activate("quest_factory_key"),
                message("msg_survivor_contact"),
            ],
        },
        StageDef {
            stage: FactoryAccess,
            description: "You've gained access to the factory. The survivors have a plan to escape the area.",
            next_objective: "Help the survivors complete their final transmission.",
            advance_when: Some(Requirement::QuestCompleted(
                "quest_final_transmission".to_string(),
            )),
            on_enter: vec![
                quest("quest_final_transmission"),
                activate("quest_final_transmission"),
                message("msg_factory_access"),
            ],
        },
        StageDef {
            stage: Endgame,
            description: "You've completed your mission. The survivors are safe, and you've found a way out of the area.",
            next_objective: "You've completed all objectives. Congratulations!",
            advance_when: None,
            on_enter: vec![message("msg_final_transmission")],
        },
    ]
}

/// Strictly forward, single-step stage machine.
#[derive(Debug)]
pub struct ProgressionMachine {
    stage: ProgressionStage,
    table: Vec<StageDef>,
    events: EventQueue,
}

impl ProgressionMachine {
    /// The table must list every stage exactly once, in order, and only name ids the catalog knows.
    pub fn new(table: Vec<StageDef>, catalog: &Catalog) -> Result<Self, SessionError> {
        validate_stage_table(&table, catalog)?;
        Ok(Self {
            stage: ProgressionStage::Beginning,
            table,
            events: EventQueue::default(),
        })
    }

    pub fn stage(&self) -> ProgressionStage {
        self.stage
    }

    pub fn is_game_completed(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Jumps to `stage` without running entry actions of any stage.
    pub fn set_progression(&mut self, stage: ProgressionStage, registries: &mut Registries) {
        self.stage = stage;
        registries.progress = stage.index();
        info!(stage = %stage, "progression_set");
        self.events.push(GameEvent::StageChanged { stage });
    }

    /// Moves one stage forward and runs that stage's entry actions. No-op at the terminal stage.
    pub fn advance_progression(&mut self, registries: &mut Registries) -> bool {
        let Some(next) = self.stage.next() else {
            debug!(stage = %self.stage, "progression_already_terminal");
            return false;
        };
        self.stage = next;
        registries.progress = next.index();
        info!(stage = %next, "progression_advanced");
        self.events.push(GameEvent::StageChanged { stage: next });

        let actions = self.stage_def(next).on_enter.clone();
        for action in &actions {
            run_entry_action(action, registries);
        }
        if next.is_terminal() {
            self.events.push(GameEvent::GameCompleted);
        }
        true
    }

    /// Advances at most one stage. Callers needing a multi-stage catch-up call it repeatedly.
    pub fn check_progression_requirements(&mut self, registries: &mut Registries) -> bool {
        if !self.requirements_met(registries) {
            return false;
        }
        self.advance_progression(registries)
    }

    pub fn requirements_met(&self, registries: &Registries) -> bool {
        self.stage_def(self.stage)
            .advance_when
            .as_ref()
            .is_some_and(|requirement| requirement.is_met(registries))
    }

    pub fn current_stage_description(&self) -> &'static str {
        self.stage_def(self.stage).description
    }

    pub fn next_objective(&self) -> &'static str {
        self.stage_def(self.stage).next_objective
    }

    pub(crate) fn reset(&mut self) {
        self.stage = ProgressionStage::Beginning;
    }

    pub(crate) fn drain_events_into(&mut self, out: &mut Vec<GameEvent>) {
        self.events.drain_into(out);
    }

    fn stage_def(&self, stage: ProgressionStage) -> &StageDef {
        // Index matches stage order; checked in `validate_stage_table`.
        &self.table[stage.index() as usize]
    }
}

fn run_entry_action(action: &EntryAction, registries: &mut Registries) {
    // Rejections are expected here (a quest the player already accepted, a location
    // found early) and are logged by the registries.
    match action {
        EntryAction::DiscoverQuest(id) => {
            if !registries.quests.is_quest_discovered(id) {
                registries.quests.discover_quest(id);
            }
        }
        EntryAction::ActivateQuest(id) => {
            if !registries.quests.is_quest_active(id) && !registries.quests.is_quest_completed(id) {
                registries.quests.activate_quest(id);
            }
        }
        EntryAction::DiscoverLocation(id) => {
            if !registries.map.is_location_discovered(id) {
                registries.map.discover_location(id);
            }
        }
        EntryAction::EnqueueMessage(id) => {
            registries.inbox.enqueue_message(id);
        }
    }
}

fn validate_stage_table(table: &[StageDef], catalog: &Catalog) -> Result<(), SessionError> {
    if table.len() != ProgressionStage::ALL.len() {
        return Err(SessionError::StageTableLength {
            expected: ProgressionStage::ALL.len(),
            actual: table.len(),
        });
    }
    for (def, expected) in table.iter().zip(ProgressionStage::ALL) {
        if def.stage != expected {
            return Err(SessionError::StageTableOrder {
                expected,
                actual: def.stage,
            });
        }
        if def.advance_when.is_none() != expected.is_terminal() {
            return Err(SessionError::StageRequirement { stage: expected });
        }

        let mut references = def
            .on_enter
            .iter()
            .map(|action| {
                let (kind, id) = action.reference();
                (kind, id.to_string())
            })
            .collect::<Vec<_>>();
        if let Some(requirement) = &def.advance_when {
            requirement.references(&mut references);
        }
        for (kind, id) in references {
            let known = match kind {
                EntityKind::Quest => catalog.quest(&id).is_some(),
                EntityKind::Location => catalog.location(&id).is_some(),
                EntityKind::Item => catalog.item(&id).is_some(),
                EntityKind::Message => catalog.message(&id).is_some(),
                EntityKind::Objective => true,
            };
            if !known {
                return Err(SessionError::UnknownStageReference {
                    stage: expected,
                    kind,
                    id,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SessionConfig;

    fn setup() -> (ProgressionMachine, Registries) {
        let catalog = Arc::new(Catalog::builtin().expect("builtin"));
        let machine =
            ProgressionMachine::new(standard_stage_table(), &catalog).expect("stage table");
        let registries = Registries::new(catalog, &SessionConfig::default());
        (machine, registries)
    }

    fn complete(registries: &mut Registries, quest: &str) {
        if !registries.quests.is_quest_discovered(quest) {
            assert!(registries.quests.discover_quest(quest));
        }
        assert!(registries.quests.activate_quest(quest));
        assert!(registries.quests.complete_quest(quest));
    }

    #[test]
    fn stage_order_helpers() {
        assert_eq!(ProgressionStage::Beginning.next(), Some(ProgressionStage::RadioRepair));
        assert!(ProgressionStage::Endgame.is_terminal());
        assert_eq!(ProgressionStage::from_index(7), Some(ProgressionStage::Endgame));
        assert_eq!(ProgressionStage::from_index(8), None);
    }

    #[test]
    fn radio_repair_then_first_signal_scenario() {
        let (mut machine, mut registries) = setup();
        assert_eq!(machine.stage(), ProgressionStage::Beginning);
        assert!(!machine.check_progression_requirements(&mut registries));

        complete(&mut registries, "quest_radio_repair");
        assert!(machine.check_progression_requirements(&mut registries));
        assert_eq!(machine.stage(), ProgressionStage::RadioRepair);
        assert!(registries.quests.is_quest_active("quest_find_signal"));

        registries.signals.add_discovered_frequency(91.5);
        assert!(machine.check_progression_requirements(&mut registries));
        assert_eq!(machine.stage(), ProgressionStage::FirstSignal);
        assert!(registries.map.is_location_discovered("forest"));
        assert_eq!(registries.progress, ProgressionStage::FirstSignal.index());
    }

    #[test]
    fn single_check_advances_at_most_one_stage() {
        let (mut machine, mut registries) = setup();
        complete(&mut registries, "quest_radio_repair");
        registries.signals.add_discovered_frequency(91.5);
        complete(&mut registries, "quest_explore_forest");

        assert!(machine.check_progression_requirements(&mut registries));
        assert_eq!(machine.stage(), ProgressionStage::RadioRepair);
        assert!(machine.check_progression_requirements(&mut registries));
        assert_eq!(machine.stage(), ProgressionStage::FirstSignal);
        assert!(machine.check_progression_requirements(&mut registries));
        assert_eq!(machine.stage(), ProgressionStage::ForestExploration);
        assert!(!machine.check_progression_requirements(&mut registries));
    }

    #[test]
    fn set_progression_skips_entry_actions() {
        let (mut machine, mut registries) = setup();
        machine.set_progression(ProgressionStage::ForestExploration, &mut registries);
        assert_eq!(machine.stage(), ProgressionStage::ForestExploration);
        assert_eq!(registries.progress, 3);
        assert!(!registries.map.is_location_discovered("road"));
        assert!(registries.inbox.is_empty());
    }

    #[test]
    fn endgame_is_terminal_and_reports_completion() {
        let (mut machine, mut registries) = setup();
        machine.set_progression(ProgressionStage::FactoryAccess, &mut registries);
        assert!(machine.advance_progression(&mut registries));
        assert!(machine.is_game_completed());
        assert!(!machine.advance_progression(&mut registries));

        let mut events = Vec::new();
        machine.drain_events_into(&mut events);
        assert_eq!(events.last(), Some(&GameEvent::GameCompleted));
        assert_eq!(
            machine.next_objective(),
            "You've completed all objectives. Congratulations!"
        );
    }

    #[test]
    fn survivor_contact_needs_factory_and_key() {
        let (mut machine, mut registries) = setup();
        machine.set_progression(ProgressionStage::SurvivorContact, &mut registries);
        registries.map.discover_location("factory");
        assert!(!machine.requirements_met(&registries));
        registries.inventory.add_item("factory_key", 1);
        assert!(machine.requirements_met(&registries));
    }

    #[test]
    fn table_with_unknown_reference_is_rejected() {
        let catalog = Catalog::builtin().expect("builtin");
        let mut table = standard_stage_table();
        table[1].on_enter.push(EntryAction::DiscoverLocation("moon".to_string()));
        let err = ProgressionMachine::new(table, &catalog).expect_err("err");
        assert!(matches!(
            err,
            SessionError::UnknownStageReference {
                stage: ProgressionStage::RadioRepair,
                kind: EntityKind::Location,
                ..
            }
        ));
    }

    #[test]
    fn table_out_of_order_is_rejected() {
        let catalog = Catalog::builtin().expect("builtin");
        let mut table = standard_stage_table();
        table.swap(2, 3);
        assert!(matches!(
            ProgressionMachine::new(table, &catalog),
            Err(SessionError::StageTableOrder { .. })
        ));
    }
}
