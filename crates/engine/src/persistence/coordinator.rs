use tracing::{info, warn};

use crate::session::GameSession;

use super::snapshot::{SaveFile, SessionSnapshot};
use super::store::{validate_slot_name, SlotStore};
use super::PersistenceError;

/// Saves and restores whole sessions through a [`SlotStore`]. Holds no game state.
pub struct SaveCoordinator {
    store: Box<dyn SlotStore>,
}

impl SaveCoordinator {
    pub fn new(store: impl SlotStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn save_game(&mut self, session: &GameSession, slot: &str) -> bool {
        reported("save_game", slot, self.try_save_game(session, slot))
    }

    pub fn try_save_game(
        &mut self,
        session: &GameSession,
        slot: &str,
    ) -> Result<(), PersistenceError> {
        validate_slot_name(slot)?;
        let save = SaveFile::new(SessionSnapshot::capture(session))?;
        self.store.write(slot, &save.to_json()?)?;
        info!(
            slot,
            stage = %save.snapshot.stage,
            checksum = %save.checksum_sha256_hex,
            "save_slot_written"
        );
        Ok(())
    }

    pub fn load_game(&self, session: &mut GameSession, slot: &str) -> bool {
        reported("load_game", slot, self.try_load_game(session, slot))
    }

    /// On any failure the session is left exactly as it was.
    pub fn try_load_game(
        &self,
        session: &mut GameSession,
        slot: &str,
    ) -> Result<(), PersistenceError> {
        let save = self.read_save(slot)?;
        let registries = save
            .snapshot
            .rebuild(session.shared_catalog(), session.config())?;
        session.replace_state(registries, save.snapshot.stage);
        info!(slot, stage = %save.snapshot.stage, "save_slot_loaded");
        Ok(())
    }

    /// Reads and checks the envelope of a slot without applying it.
    pub fn read_save(&self, slot: &str) -> Result<SaveFile, PersistenceError> {
        validate_slot_name(slot)?;
        let raw = self.store.read(slot)?;
        SaveFile::parse(&raw)
    }

    pub fn get_save_slots(&self) -> Vec<String> {
        match self.try_get_save_slots() {
            Ok(slots) => slots,
            Err(error) => {
                warn!(error = %error, "save_slots_unavailable");
                Vec::new()
            }
        }
    }

    pub fn try_get_save_slots(&self) -> Result<Vec<String>, PersistenceError> {
        self.store.list()
    }

    pub fn delete_save_slot(&mut self, slot: &str) -> bool {
        reported("delete_save_slot", slot, self.try_delete_save_slot(slot))
    }

    pub fn try_delete_save_slot(&mut self, slot: &str) -> Result<(), PersistenceError> {
        validate_slot_name(slot)?;
        self.store.delete(slot)?;
        info!(slot, "save_slot_deleted");
        Ok(())
    }
}

impl std::fmt::Debug for SaveCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveCoordinator").finish_non_exhaustive()
    }
}

fn reported(operation: &'static str, slot: &str, result: Result<(), PersistenceError>) -> bool {
    match result {
        Ok(()) => true,
        Err(error) => {
            warn!(operation, slot, error = %error, "persistence_failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::config::SessionConfig;
    use crate::persistence::{FileSlotStore, MemorySlotStore};
    use crate::progression::ProgressionStage;

    fn session() -> GameSession {
        GameSession::builtin(SessionConfig::default()).expect("session")
    }

    fn play_to_forest(session: &mut GameSession) {
        assert!(session.activate_quest("quest_radio_repair"));
        assert!(session.pick_up_item("radio_part"));
        session.set_radio_power(true);
        session.try_tune_radio(91.5).expect("tune");
        assert!(session.change_location("forest"));
        assert!(session.pick_up_item("key_cabin"));
        assert_eq!(session.stage(), ProgressionStage::FirstSignal);
    }

    fn observable(session: &GameSession) -> SessionSnapshot {
        SessionSnapshot::capture(session)
    }

    #[test]
    fn save_reset_load_reproduces_state() {
        let mut session = session();
        let mut coordinator = SaveCoordinator::new(MemorySlotStore::new());
        play_to_forest(&mut session);
        let before = observable(&session);

        assert!(coordinator.save_game(&session, "forest"));
        session.reset();
        assert_ne!(observable(&session), before);

        assert!(coordinator.load_game(&mut session, "forest"));
        assert_eq!(observable(&session), before);
        assert_eq!(session.stage(), ProgressionStage::FirstSignal);
        assert_eq!(session.map().current_location(), "forest");
        assert!(session.signals().is_frequency_discovered(91.5));
    }

    #[test]
    fn load_does_not_rerun_entry_actions() {
        let mut session = session();
        let mut coordinator = SaveCoordinator::new(MemorySlotStore::new());
        play_to_forest(&mut session);
        while session.next_message().is_some() {}
        assert!(coordinator.save_game(&session, "quiet"));

        assert!(coordinator.load_game(&mut session, "quiet"));
        assert!(session.inbox().is_empty());
    }

    #[test]
    fn failed_load_leaves_state_untouched() {
        let temp = TempDir::new().expect("temp");
        let store = FileSlotStore::new(temp.path());
        let path = store.path_for("broken");
        let mut coordinator = SaveCoordinator::new(store);

        let mut session = session();
        play_to_forest(&mut session);
        let before = observable(&session);

        assert!(!coordinator.load_game(&mut session, "missing"));
        assert_eq!(observable(&session), before);

        assert!(coordinator.save_game(&session, "broken"));
        let raw = fs::read_to_string(&path).expect("read");
        fs::write(&path, raw.replace("\"progress\": 2", "\"progress\": 3")).expect("write");
        assert!(matches!(
            coordinator.try_load_game(&mut session, "broken"),
            Err(PersistenceError::ChecksumMismatch { .. })
        ));

        fs::write(&path, "{ \"save_version\": 1").expect("write");
        assert!(matches!(
            coordinator.try_load_game(&mut session, "broken"),
            Err(PersistenceError::Parse { .. })
        ));
        assert_eq!(observable(&session), before);
    }

    #[test]
    fn failed_save_keeps_previous_slot_readable() {
        let temp = TempDir::new().expect("temp");
        let store = FileSlotStore::new(temp.path());
        let mut partial = store.path_for("keep").into_os_string();
        partial.push(".partial");
        let mut coordinator = SaveCoordinator::new(store);

        let mut session = session();
        assert!(coordinator.save_game(&session, "keep"));
        let saved = observable(&session);

        play_to_forest(&mut session);
        fs::create_dir(&partial).expect("block partial file");
        assert!(matches!(
            coordinator.try_save_game(&session, "keep"),
            Err(PersistenceError::Io { .. })
        ));

        assert_eq!(coordinator.get_save_slots(), vec!["keep"]);
        assert!(coordinator.load_game(&mut session, "keep"));
        assert_eq!(observable(&session), saved);
    }

    #[test]
    fn slots_are_listed_and_deleted() {
        let temp = TempDir::new().expect("temp");
        let mut coordinator = SaveCoordinator::new(FileSlotStore::new(temp.path().join("saves")));
        let session = session();

        assert!(coordinator.get_save_slots().is_empty());
        assert!(coordinator.save_game(&session, "slot_b"));
        assert!(coordinator.save_game(&session, "slot_a"));
        assert!(coordinator.save_game(&session, "slot_a"));
        assert_eq!(coordinator.get_save_slots(), vec!["slot_a", "slot_b"]);

        assert!(coordinator.delete_save_slot("slot_a"));
        assert!(!coordinator.delete_save_slot("slot_a"));
        assert_eq!(coordinator.get_save_slots(), vec!["slot_b"]);
    }

    #[test]
    fn invalid_slot_names_never_reach_the_store() {
        let temp = TempDir::new().expect("temp");
        let mut coordinator = SaveCoordinator::new(FileSlotStore::new(temp.path()));
        let mut session = session();

        assert!(matches!(
            coordinator.try_save_game(&session, "../outside"),
            Err(PersistenceError::InvalidSlotName(_))
        ));
        assert!(!coordinator.load_game(&mut session, ""));
        assert!(!coordinator.delete_save_slot("a b"));
        assert!(fs::read_dir(temp.path()).expect("dir").next().is_none());
    }

    #[test]
    fn load_emits_stage_changed() {
        let mut session = session();
        let mut coordinator = SaveCoordinator::new(MemorySlotStore::new());
        play_to_forest(&mut session);
        assert!(coordinator.save_game(&session, "s"));
        session.reset();

        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = std::rc::Rc::clone(&seen);
        session.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        assert!(coordinator.load_game(&mut session, "s"));
        assert_eq!(
            *seen.borrow(),
            vec![crate::events::GameEvent::StageChanged {
                stage: ProgressionStage::FirstSignal
            }]
        );
    }
}
