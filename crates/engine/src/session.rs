use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::content::{Catalog, ContentCompileError, ObjectiveTarget};
use crate::error::{accepted, EntityKind, GameError, GameResult};
use crate::events::{EventBus, GameEvent, SubscriptionId};
use crate::inventory::Inventory;
use crate::map::MapRegistry;
use crate::progression::{standard_stage_table, ProgressionMachine, ProgressionStage, StageDef};
use crate::quests::{ObjectiveUpdate, QuestEngine};
use crate::signals::{MessageInbox, Radio, SignalLog};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to compile catalog: {0}")]
    Catalog(#[from] ContentCompileError),
    #[error("catalog defines no locations; a session needs a starting location")]
    NoLocations,
    #[error("stage table has {actual} entries, expected {expected}")]
    StageTableLength { expected: usize, actual: usize },
    #[error("stage table lists {actual} where {expected} belongs")]
    StageTableOrder {
        expected: ProgressionStage,
        actual: ProgressionStage,
    },
    #[error("stage {stage} must have an advance requirement unless it is the last stage")]
    StageRequirement { stage: ProgressionStage },
    #[error("stage {stage} references unknown {kind} '{id}'")]
    UnknownStageReference {
        stage: ProgressionStage,
        kind: EntityKind,
        id: String,
    },
}

/// Every mutable registry of a session, handed to the progression machine as one unit.
#[derive(Debug)]
pub struct Registries {
    catalog: Arc<Catalog>,
    pub inventory: Inventory,
    pub map: MapRegistry,
    pub quests: QuestEngine,
    pub signals: SignalLog,
    pub radio: Radio,
    pub inbox: MessageInbox,
    /// Numeric mirror of the current stage.
    pub progress: u32,
}

impl Registries {
    /// Fresh registries seeded from catalog defaults.
    pub fn new(catalog: Arc<Catalog>, config: &SessionConfig) -> Self {
        Self {
            inventory: Inventory::new(Arc::clone(&catalog), config.inventory_capacity),
            map: MapRegistry::new(Arc::clone(&catalog)),
            quests: QuestEngine::new(Arc::clone(&catalog), config.frequency_epsilon),
            signals: SignalLog::new(Arc::clone(&catalog), config.frequency_epsilon),
            radio: Radio::new(Arc::clone(&catalog)),
            inbox: MessageInbox::new(Arc::clone(&catalog)),
            progress: 0,
            catalog,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn drain_events_into(&mut self, out: &mut Vec<GameEvent>) {
        self.inventory.drain_events_into(out);
        self.map.drain_events_into(out);
        self.quests.drain_events_into(out);
        self.signals.drain_events_into(out);
        self.radio.drain_events_into(out);
        self.inbox.drain_events_into(out);
    }
}

/// Owns the catalog, registries, progression machine and event bus of one playthrough.
///
/// Every gameplay operation runs its cascade to completion, dispatches the produced
/// events in order, then checks progression exactly once before returning.
pub struct GameSession {
    catalog: Arc<Catalog>,
    config: SessionConfig,
    registries: Registries,
    progression: ProgressionMachine,
    bus: EventBus,
}

impl GameSession {
    pub fn new(catalog: Arc<Catalog>, config: SessionConfig) -> Result<Self, SessionError> {
        Self::with_stage_table(catalog, config, standard_stage_table())
    }

    pub fn builtin(config: SessionConfig) -> Result<Self, SessionError> {
        Self::new(Arc::new(Catalog::builtin()?), config)
    }

    pub fn with_stage_table(
        catalog: Arc<Catalog>,
        config: SessionConfig,
        table: Vec<StageDef>,
    ) -> Result<Self, SessionError> {
        if catalog.locations().is_empty() {
            return Err(SessionError::NoLocations);
        }
        let progression = ProgressionMachine::new(table, &catalog)?;
        let registries = Registries::new(Arc::clone(&catalog), &config);
        info!(
            catalog = %catalog.fingerprint(),
            inventory_capacity = config.inventory_capacity,
            start_location = %registries.map.current_location(),
            "session_created"
        );
        Ok(Self {
            catalog,
            config,
            registries,
            progression,
            bus: EventBus::new(),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn shared_catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn inventory(&self) -> &Inventory {
        &self.registries.inventory
    }

    pub fn map(&self) -> &MapRegistry {
        &self.registries.map
    }

    pub fn quests(&self) -> &QuestEngine {
        &self.registries.quests
    }

    pub fn signals(&self) -> &SignalLog {
        &self.registries.signals
    }

    pub fn radio(&self) -> &Radio {
        &self.registries.radio
    }

    pub fn inbox(&self) -> &MessageInbox {
        &self.registries.inbox
    }

    pub fn stage(&self) -> ProgressionStage {
        self.progression.stage()
    }

    pub fn progress(&self) -> u32 {
        self.registries.progress
    }

    pub fn is_game_completed(&self) -> bool {
        self.progression.is_game_completed()
    }

    pub fn current_stage_description(&self) -> &'static str {
        self.progression.current_stage_description()
    }

    pub fn next_objective(&self) -> &'static str {
        self.progression.next_objective()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + 'static,
    {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// New game: every registry back to catalog defaults, stage back to the first.
    /// Subscriptions survive.
    pub fn reset(&mut self) {
        self.registries = Registries::new(Arc::clone(&self.catalog), &self.config);
        self.progression.reset();
        info!("session_reset");
    }

    pub fn change_location(&mut self, id: &str) -> bool {
        accepted("change_location", self.try_change_location(id))
    }

    pub fn try_change_location(&mut self, id: &str) -> GameResult<()> {
        self.run(|registries| registries.map.try_change_location(id))
    }

    pub fn discover_location(&mut self, id: &str) -> bool {
        accepted("discover_location", self.try_discover_location(id))
    }

    pub fn try_discover_location(&mut self, id: &str) -> GameResult<()> {
        self.run(|registries| registries.map.try_discover_location(id))
    }

    /// Item handed over by a collaborator (found, rewarded, scripted).
    pub fn acquire_item(&mut self, item: &str, quantity: u32) -> bool {
        accepted("acquire_item", self.try_acquire_item(item, quantity))
    }

    pub fn try_acquire_item(&mut self, item: &str, quantity: u32) -> GameResult<()> {
        self.run(|registries| registries.inventory.try_add_item(item, quantity))
    }

    /// Moves one item lying at the current location into the inventory.
    pub fn pick_up_item(&mut self, item: &str) -> bool {
        accepted("pick_up_item", self.try_pick_up_item(item))
    }

    pub fn try_pick_up_item(&mut self, item: &str) -> GameResult<()> {
        self.run(|registries| {
            if !registries.map.items_here().iter().any(|here| here == item) {
                return Err(GameError::invalid_state(format!(
                    "'{item}' is not at '{}'",
                    registries.map.current_location()
                )));
            }
            registries.inventory.try_add_item(item, 1)?;
            registries.map.try_take_item(item)
        })
    }

    /// Leaves items at the current location.
    pub fn drop_item(&mut self, item: &str, quantity: u32) -> bool {
        accepted("drop_item", self.try_drop_item(item, quantity))
    }

    pub fn try_drop_item(&mut self, item: &str, quantity: u32) -> GameResult<()> {
        self.run(|registries| {
            registries.inventory.try_remove_item(item, quantity)?;
            for _ in 0..quantity {
                registries.map.try_place_item(item)?;
            }
            Ok(())
        })
    }

    pub fn use_item(&mut self, item: &str) -> bool {
        accepted("use_item", self.try_use_item(item))
    }

    pub fn try_use_item(&mut self, item: &str) -> GameResult<()> {
        self.run(|registries| registries.inventory.try_use_item(item))
    }

    pub fn combine_items(&mut self, first: &str, second: &str) -> bool {
        accepted("combine_items", self.try_combine_items(first, second))
    }

    pub fn try_combine_items(&mut self, first: &str, second: &str) -> GameResult<String> {
        self.run(|registries| registries.inventory.try_combine_items(first, second))
    }

    pub fn equip_item(&mut self, item: &str) -> bool {
        accepted("equip_item", self.try_equip_item(item))
    }

    pub fn try_equip_item(&mut self, item: &str) -> GameResult<()> {
        self.run(|registries| registries.inventory.try_equip_item(item))
    }

    pub fn unequip_item(&mut self, item: &str) -> bool {
        accepted("unequip_item", self.try_unequip_item(item))
    }

    pub fn try_unequip_item(&mut self, item: &str) -> GameResult<()> {
        self.run(|registries| registries.inventory.try_unequip_item(item))
    }

    pub fn set_radio_power(&mut self, on: bool) {
        let _ = self.run(|registries| {
            registries.radio.set_power(on);
            Ok(())
        });
    }

    pub fn toggle_radio(&mut self) -> bool {
        self.set_radio_power(!self.registries.radio.is_on());
        self.registries.radio.is_on()
    }

    /// Tunes the dial. Locking onto a signal for the first time logs its frequency
    /// and queues its message.
    pub fn try_tune_radio(&mut self, frequency: f32) -> GameResult<Option<String>> {
        self.run(|registries| {
            let locked = registries.radio.try_tune(frequency)?.map(|signal| {
                (
                    signal.def_name.clone(),
                    signal.frequency,
                    signal.message.clone(),
                )
            });
            let Some((signal, canonical, message)) = locked else {
                return Ok(None);
            };
            if registries.signals.add_discovered_frequency(canonical) {
                registries.inbox.enqueue_message(&message);
            }
            Ok(Some(signal))
        })
    }

    pub fn discover_frequency(&mut self, frequency: f32) -> bool {
        self.run(|registries| Ok(registries.signals.add_discovered_frequency(frequency)))
            .unwrap_or(false)
    }

    pub fn decode_message(&mut self, id: &str) -> bool {
        accepted("decode_message", self.try_decode_message(id))
    }

    pub fn try_decode_message(&mut self, id: &str) -> GameResult<()> {
        self.run(|registries| registries.signals.try_decode_message(id))
    }

    pub fn next_message(&mut self) -> Option<String> {
        self.registries.inbox.next_message()
    }

    pub fn discover_quest(&mut self, id: &str) -> bool {
        accepted("discover_quest", self.try_discover_quest(id))
    }

    pub fn try_discover_quest(&mut self, id: &str) -> GameResult<()> {
        self.run(|registries| registries.quests.try_discover_quest(id))
    }

    pub fn activate_quest(&mut self, id: &str) -> bool {
        accepted("activate_quest", self.try_activate_quest(id))
    }

    pub fn try_activate_quest(&mut self, id: &str) -> GameResult<()> {
        self.run(|registries| registries.quests.try_activate_quest(id))
    }

    pub fn complete_quest(&mut self, id: &str) -> bool {
        accepted("complete_quest", self.try_complete_quest(id))
    }

    pub fn try_complete_quest(&mut self, id: &str) -> GameResult<()> {
        self.run(|registries| registries.quests.try_complete_quest(id))
    }

    pub fn fail_quest(&mut self, id: &str) -> bool {
        accepted("fail_quest", self.try_fail_quest(id))
    }

    pub fn try_fail_quest(&mut self, id: &str) -> GameResult<()> {
        self.run(|registries| registries.quests.try_fail_quest(id))
    }

    pub fn update_quest_objective(
        &mut self,
        quest: &str,
        objective: &str,
        update: ObjectiveUpdate,
    ) -> bool {
        accepted(
            "update_quest_objective",
            self.run(|registries| {
                registries
                    .quests
                    .try_update_quest_objective(quest, objective, update)
            }),
        )
    }

    /// Single-step progression check. See [`ProgressionMachine::check_progression_requirements`].
    pub fn check_progression(&mut self) -> bool {
        let advanced = self
            .progression
            .check_progression_requirements(&mut self.registries);
        self.settle();
        advanced
    }

    pub fn advance_progression(&mut self) -> bool {
        let advanced = self.progression.advance_progression(&mut self.registries);
        self.settle();
        advanced
    }

    /// Repeats the single-step check until the stage stops moving. Returns stages advanced.
    pub fn catch_up_progression(&mut self) -> u32 {
        let mut advanced = 0;
        while self.check_progression() {
            advanced += 1;
        }
        advanced
    }

    /// Jumps to `stage` without running any entry actions.
    pub fn set_progression(&mut self, stage: ProgressionStage) {
        self.progression
            .set_progression(stage, &mut self.registries);
        self.settle();
    }

    /// Swaps in registries built elsewhere (a loaded save) and restores the stage.
    pub(crate) fn replace_state(&mut self, registries: Registries, stage: ProgressionStage) {
        self.registries = registries;
        self.set_progression(stage);
    }

    fn run<T>(&mut self, op: impl FnOnce(&mut Registries) -> GameResult<T>) -> GameResult<T> {
        let result = op(&mut self.registries);
        self.settle();
        self.check_progression();
        result
    }

    /// Reacts to pending events until no registry has anything left to report,
    /// dispatching each batch to subscribers in production order.
    fn settle(&mut self) {
        loop {
            let mut batch = Vec::new();
            self.registries.drain_events_into(&mut batch);
            self.progression.drain_events_into(&mut batch);
            if batch.is_empty() {
                return;
            }
            for event in &batch {
                react(&mut self.registries, event);
            }
            for event in &batch {
                self.bus.dispatch(event);
            }
        }
    }
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("stage", &self.progression.stage())
            .field("location", &self.registries.map.current_location())
            .field("bus", &self.bus)
            .finish()
    }
}

fn react(registries: &mut Registries, event: &GameEvent) {
    match event {
        GameEvent::ItemAdded { item, .. } => {
            let held = registries.inventory.quantity(item);
            registries.quests.on_item_acquired(item, held);
        }
        GameEvent::ItemUsed { item } => registries.quests.on_item_used(item),
        GameEvent::LocationChanged { to, .. } => registries.quests.on_location_changed(to),
        GameEvent::FrequencyDiscovered { frequency } => {
            registries.quests.on_frequency_discovered(*frequency)
        }
        GameEvent::MessageDecoded { message } => registries.quests.on_message_decoded(message),
        GameEvent::QuestActivated { quest } | GameEvent::ObjectiveUnlocked { quest, .. } => {
            sync_objectives(registries, quest)
        }
        GameEvent::QuestCompleted { quest } => grant_rewards(registries, quest),
        _ => {}
    }
}

/// Credits a newly active quest with progress the player already made.
fn sync_objectives(registries: &mut Registries, quest: &str) {
    let (Some(def), Some(state)) = (
        registries.catalog.quest(quest),
        registries.quests.quest(quest),
    ) else {
        return;
    };
    if !state.active {
        return;
    }

    let mut updates = Vec::new();
    for (objective_def, objective) in def.objectives.iter().zip(&state.objectives) {
        if objective.completed || objective.hidden {
            continue;
        }
        let amount = match &objective_def.target {
            ObjectiveTarget::CollectItem(item) => registries.inventory.quantity(item),
            ObjectiveTarget::VisitLocation(location) => {
                u32::from(registries.map.current_location() == location) * objective.required
            }
            ObjectiveTarget::DecodeMessage(message) => {
                u32::from(registries.signals.is_message_decoded(message)) * objective.required
            }
            ObjectiveTarget::TuneFrequency(frequency) => {
                u32::from(registries.signals.is_frequency_discovered(*frequency))
                    * objective.required
            }
            ObjectiveTarget::UseItem(_) => 0,
        };
        if amount > 0 {
            updates.push((objective.id.clone(), amount));
        }
    }

    for (objective, amount) in updates {
        registries
            .quests
            .update_quest_objective(quest, &objective, ObjectiveUpdate::Set(amount));
    }
}

fn grant_rewards(registries: &mut Registries, quest: &str) {
    let Some(def) = registries.catalog.quest(quest) else {
        return;
    };
    let reward = def.reward.clone();
    let reveals = def.reveals_locations.clone();

    if let Some(reward) = reward {
        if let Err(error) = registries
            .inventory
            .try_add_item(&reward.item, reward.quantity)
        {
            warn!(
                quest,
                item = %reward.item,
                quantity = reward.quantity,
                error = %error,
                "quest_reward_dropped"
            );
        }
    }
    for location in reveals {
        if !registries.map.is_location_discovered(&location) {
            registries.map.discover_location(&location);
        }
    }
    info!(quest, "quest_rewards_granted");
}
