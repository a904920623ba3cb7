use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod inventory;
pub mod map;
pub mod persistence;
pub mod progression;
pub mod quests;
pub mod session;
pub mod signals;

pub use config::{SessionConfig, DEFAULT_INVENTORY_CAPACITY, INVENTORY_CAPACITY_ENV_VAR};
pub use content::{
    compile_catalog, Catalog, ContentCompileError, ContentErrorCode, ItemCategory, ItemDef,
    LocationDef, MessageDef, ObjectiveDef, ObjectiveKind, ObjectiveTarget, QuestDef, QuestReward,
    SignalDef, SourceLocation,
};
pub use error::{EntityKind, GameError, GameResult};
pub use events::{EventBus, GameEvent, SubscriptionId};
pub use inventory::{Inventory, InventoryEntry};
pub use map::{LocationState, MapRegistry};
pub use persistence::{
    FileSlotStore, MemorySlotStore, PersistenceError, SaveCoordinator, SaveFile, SessionSnapshot,
    SlotStore, SAVE_VERSION,
};
pub use progression::{
    standard_stage_table, EntryAction, ProgressionMachine, ProgressionStage, Requirement, StageDef,
};
pub use quests::{ObjectiveState, ObjectiveUpdate, QuestEngine, QuestState};
pub use session::{GameSession, Registries, SessionError};
pub use signals::{MessageInbox, Radio, SignalLog, MAX_FREQUENCY, MIN_FREQUENCY};

pub const ROOT_ENV_VAR: &str = "SIGNAL_LOST_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub base_content_dir: PathBuf,
    pub save_dir: PathBuf,
}

impl AppPaths {
    /// Lays out the standard directories under `root`, creating the save directory.
    pub fn at_root(root: impl Into<PathBuf>) -> Result<Self, StartupError> {
        let root = root.into();
        let base_content_dir = root.join("assets").join("base");
        let save_dir = root.join("cache").join("saves");

        fs::create_dir_all(&save_dir).map_err(|source| StartupError::CreateSaveDir {
            path: save_dir.clone(),
            source,
        })?;

        Ok(Self {
            root,
            base_content_dir,
            save_dir,
        })
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create save directory at {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "SIGNAL_LOST_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
PowerShell: $env:{env_var}=\"C:\\path\\to\\signal-lost\"\n\
Bash/zsh: export {env_var}=\"/path/to/signal-lost\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    AppPaths::at_root(resolve_root()?)
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let temp = TempDir::new().expect("temp");
        fs::create_dir(temp.path().join("assets")).expect("assets");
        assert!(!is_repo_marker(temp.path()));

        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("manifest");
        assert!(is_repo_marker(temp.path()));
    }

    #[test]
    fn workspace_root_is_a_repo_marker() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        assert!(is_repo_marker(&root));
    }

    #[test]
    fn app_paths_create_save_dir() {
        let temp = TempDir::new().expect("temp");
        let paths = AppPaths::at_root(temp.path()).expect("paths");

        assert!(paths.save_dir.is_dir());
        assert_eq!(paths.save_dir, temp.path().join("cache").join("saves"));
        assert_eq!(paths.base_content_dir, temp.path().join("assets").join("base"));
    }
}
