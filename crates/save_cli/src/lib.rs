use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use engine::{
    compile_catalog, resolve_app_paths, AppPaths, Catalog, FileSlotStore, GameSession,
    SaveCoordinator, SessionConfig,
};

#[derive(Debug, Clone, Default)]
pub struct CommonOptions {
    /// Workspace root; resolved from the environment or the executable when absent.
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    List,
    Save { slot: String },
    Load { slot: String },
    Delete { slot: String },
}

pub fn run<W: Write>(kind: CommandKind, opts: CommonOptions, stdout: &mut W) -> Result<(), String> {
    let paths = match opts.root {
        Some(root) => AppPaths::at_root(root),
        None => resolve_app_paths(),
    }
    .map_err(|error| error.to_string())?;
    let mut saves = SaveCoordinator::new(FileSlotStore::new(&paths.save_dir));

    match kind {
        CommandKind::List => {
            let slots = saves.try_get_save_slots().map_err(|error| error.to_string())?;
            if slots.is_empty() {
                emit(stdout, "no save slots")?;
            }
            for slot in slots {
                emit(stdout, &slot)?;
            }
        }
        CommandKind::Save { slot } => {
            let session = new_session(&paths)?;
            saves
                .try_save_game(&session, &slot)
                .map_err(|error| format!("save '{slot}' failed: {error}"))?;
            emit(stdout, &format!("saved new game to slot {slot}"))?;
        }
        CommandKind::Load { slot } => {
            let mut session = new_session(&paths)?;
            saves
                .try_load_game(&mut session, &slot)
                .map_err(|error| format!("load '{slot}' failed: {error}"))?;
            emit(stdout, &summary(&slot, &session))?;
        }
        CommandKind::Delete { slot } => {
            saves
                .try_delete_save_slot(&slot)
                .map_err(|error| format!("delete '{slot}' failed: {error}"))?;
            emit(stdout, &format!("deleted slot {slot}"))?;
        }
    }
    Ok(())
}

fn new_session(paths: &AppPaths) -> Result<GameSession, String> {
    let catalog = if paths.base_content_dir.is_dir() {
        compile_catalog(&paths.base_content_dir)
    } else {
        Catalog::builtin()
    }
    .map_err(|error| error.to_string())?;
    GameSession::new(Arc::new(catalog), SessionConfig::from_env()).map_err(|error| error.to_string())
}

fn summary(slot: &str, session: &GameSession) -> String {
    let quests = session.quests();
    format!(
        "slot {slot}: stage {} (progress {}), location {}, {} items held, {}/{} quests completed, {} frequencies logged",
        session.stage(),
        session.progress(),
        session.map().current_location(),
        session.inventory().total_item_count(),
        quests.completed_quests().len(),
        quests.all_quests().len(),
        session.signals().discovered_frequencies().len(),
    )
}

fn emit<W: Write>(stdout: &mut W, line: &str) -> Result<(), String> {
    writeln!(stdout, "{line}").map_err(|error| format!("write stdout: {error}"))
}
