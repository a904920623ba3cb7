mod builtin;
mod catalog;
mod compiler;
mod hashing;

pub use catalog::{
    Catalog, ItemCategory, ItemDef, LocationDef, MessageDef, ObjectiveDef, ObjectiveKind,
    ObjectiveTarget, QuestDef, QuestReward, SignalDef,
};
pub use compiler::{compile_catalog, ContentCompileError, ContentErrorCode, SourceLocation};
pub(crate) use hashing::sha256_hex;
