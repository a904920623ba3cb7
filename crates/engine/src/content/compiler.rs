use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::info;

use super::catalog::{
    Catalog, ItemCategory, ItemDef, LocationDef, MessageDef, ObjectiveDef, ObjectiveKind,
    ObjectiveTarget, QuestDef, QuestReward, SignalDef,
};
use super::hashing::hash_catalog_sources;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDef,
    UnknownReference,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

/// Where a def was declared, kept until cross references are checked.
#[derive(Debug, Clone)]
struct Origin {
    file_path: PathBuf,
    location: SourceLocation,
}

impl Origin {
    fn error(&self, code: ContentErrorCode, message: String) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            file_path: self.file_path.clone(),
            location: Some(self.location),
        }
    }
}

#[derive(Default)]
struct PendingDefs {
    items: Vec<(ItemDef, Origin)>,
    locations: Vec<(LocationDef, Origin)>,
    quests: Vec<(QuestDef, Origin)>,
    messages: Vec<(MessageDef, Origin)>,
    signals: Vec<(SignalDef, Origin)>,
}

/// Compiles every `*.xml` file under `content_dir` into a catalog.
pub fn compile_catalog(content_dir: &Path) -> Result<Catalog, ContentCompileError> {
    let xml_files = collect_xml_files_sorted(content_dir)
        .map_err(|error| read_error(error.path, error.source))?;

    let mut loaded = Vec::<(String, PathBuf, String)>::with_capacity(xml_files.len());
    for (rel_path, abs_path) in xml_files {
        let raw = fs::read_to_string(&abs_path)
            .map_err(|source| read_error(abs_path.clone(), source))?;
        loaded.push((rel_path, abs_path, raw));
    }

    let sources = loaded
        .iter()
        .map(|(rel_path, abs_path, raw)| SourceDocument {
            rel_path,
            file_path: abs_path.clone(),
            raw,
        })
        .collect::<Vec<_>>();
    compile_documents(&sources)
}

/// Compiles in-memory `(relative path, xml)` pairs, in the given order.
pub(crate) fn compile_catalog_sources(
    sources: &[(&str, &str)],
) -> Result<Catalog, ContentCompileError> {
    let documents = sources
        .iter()
        .map(|(rel_path, raw)| SourceDocument {
            rel_path: *rel_path,
            file_path: PathBuf::from(*rel_path),
            raw: *raw,
        })
        .collect::<Vec<_>>();
    compile_documents(&documents)
}

struct SourceDocument<'a> {
    rel_path: &'a str,
    file_path: PathBuf,
    raw: &'a str,
}

fn compile_documents(documents: &[SourceDocument<'_>]) -> Result<Catalog, ContentCompileError> {
    let mut pending = PendingDefs::default();
    for document in documents {
        parse_defs_document(&document.file_path, document.raw, &mut pending)?;
    }

    reject_duplicates(&pending)?;
    validate_references(&pending)?;

    let fingerprint = hash_catalog_sources(
        documents
            .iter()
            .map(|document| (document.rel_path, document.raw.as_bytes())),
    );
    info!(
        xml_file_count = documents.len(),
        items = pending.items.len(),
        locations = pending.locations.len(),
        quests = pending.quests.len(),
        messages = pending.messages.len(),
        signals = pending.signals.len(),
        fingerprint = %fingerprint,
        "catalog_compiled"
    );

    Ok(Catalog::from_defs(
        pending.items.into_iter().map(|(def, _)| def).collect(),
        pending.locations.into_iter().map(|(def, _)| def).collect(),
        pending.quests.into_iter().map(|(def, _)| def).collect(),
        pending.messages.into_iter().map(|(def, _)| def).collect(),
        pending.signals.into_iter().map(|(def, _)| def).collect(),
        fingerprint,
    ))
}

fn parse_defs_document(
    file_path: &Path,
    raw: &str,
    pending: &mut PendingDefs,
) -> Result<(), ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = DefContext {
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    for child in root.children().filter(|node| node.is_element()) {
        let origin = ctx.origin(child);
        match child.tag_name().name() {
            "ItemDef" => pending.items.push((parse_item_def(&ctx, child)?, origin)),
            "LocationDef" => pending
                .locations
                .push((parse_location_def(&ctx, child)?, origin)),
            "QuestDef" => pending.quests.push((parse_quest_def(&ctx, child)?, origin)),
            "MessageDef" => pending
                .messages
                .push((parse_message_def(&ctx, child)?, origin)),
            "SignalDef" => pending
                .signals
                .push((parse_signal_def(&ctx, child)?, origin)),
            other => {
                return Err(ctx.error(
                    ContentErrorCode::UnknownDefType,
                    format!(
                        "unsupported def type <{other}>; expected ItemDef, LocationDef, QuestDef, MessageDef or SignalDef"
                    ),
                    child,
                ))
            }
        }
    }
    Ok(())
}

struct DefContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl DefContext<'_, '_> {
    fn error(&self, code: ContentErrorCode, message: String, node: Node<'_, '_>) -> ContentCompileError {
        let origin = self.origin(node);
        origin.error(code, message)
    }

    fn origin(&self, node: Node<'_, '_>) -> Origin {
        let pos = self.doc.text_pos_at(node.range().start);
        Origin {
            file_path: self.file_path.to_path_buf(),
            location: SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            },
        }
    }

    /// Children of a def, rejecting repeated field names.
    fn fields<'b, 'input2>(
        &self,
        def_type: &str,
        node: Node<'b, 'input2>,
    ) -> Result<Vec<(String, Node<'b, 'input2>)>, ContentCompileError> {
        let mut seen_fields = HashSet::<String>::new();
        let mut fields = Vec::new();
        for field in node.children().filter(|child| child.is_element()) {
            let field_name = field.tag_name().name().to_string();
            if !seen_fields.insert(field_name.clone()) {
                return Err(self.error(
                    ContentErrorCode::DuplicateField,
                    format!("duplicate field <{field_name}> in <{def_type}>"),
                    field,
                ));
            }
            fields.push((field_name, field));
        }
        Ok(fields)
    }

    fn required_text(&self, node: Node<'_, '_>, field_name: &str) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error(
                ContentErrorCode::MissingField,
                format!("field <{field_name}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    fn optional_text(&self, node: Node<'_, '_>) -> String {
        node.text().map(str::trim).unwrap_or_default().to_string()
    }

    fn bool_value(&self, node: Node<'_, '_>, field_name: &str) -> Result<bool, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        match value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' must be true or false"),
                node,
            )),
        }
    }

    fn positive_u32(&self, node: Node<'_, '_>, field_name: &str) -> Result<u32, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        match value.parse::<u32>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' must be a whole number >= 1"),
                node,
            )),
        }
    }

    fn i32_value(&self, node: Node<'_, '_>, field_name: &str) -> Result<i32, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        value.parse::<i32>().map_err(|_| {
            self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' must be a whole number"),
                node,
            )
        })
    }

    fn finite_f32(&self, node: Node<'_, '_>, raw: &str, field_name: &str) -> Result<f32, ContentCompileError> {
        match raw.trim().parse::<f32>() {
            Ok(parsed) if parsed.is_finite() => Ok(parsed),
            _ => Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{raw}' is not a valid number"),
                node,
            )),
        }
    }

    /// `<field><li>a</li><li>b</li></field>`.
    fn list(&self, node: Node<'_, '_>, field_name: &str) -> Result<Vec<String>, ContentCompileError> {
        let mut values = Vec::new();
        for entry in node.children().filter(|child| child.is_element()) {
            if entry.tag_name().name() != "li" {
                return Err(self.error(
                    ContentErrorCode::UnknownField,
                    format!(
                        "unexpected <{}> in <{field_name}>; list entries must be <li>",
                        entry.tag_name().name()
                    ),
                    entry,
                ));
            }
            values.push(self.required_text(entry, field_name)?);
        }
        Ok(values)
    }

    fn unknown_field(&self, def_type: &str, field_name: &str, node: Node<'_, '_>) -> ContentCompileError {
        self.error(
            ContentErrorCode::UnknownField,
            format!("unknown field <{field_name}> in <{def_type}>"),
            node,
        )
    }

    fn missing<T>(&self, value: Option<T>, def_type: &str, field_name: &str, node: Node<'_, '_>) -> Result<T, ContentCompileError> {
        value.ok_or_else(|| {
            self.error(
                ContentErrorCode::MissingField,
                format!("missing required field <{field_name}> in <{def_type}>"),
                node,
            )
        })
    }
}

fn parse_item_def(ctx: &DefContext<'_, '_>, node: Node<'_, '_>) -> Result<ItemDef, ContentCompileError> {
    let mut def_name = None;
    let mut label = None;
    let mut description = String::new();
    let mut category = None;
    let mut usable = false;
    let mut consumable = false;
    let mut equippable = false;
    let mut combines_with = Vec::new();
    let mut combination_result = None;

    for (field_name, field) in ctx.fields("ItemDef", node)? {
        match field_name.as_str() {
            "defName" => def_name = Some(ctx.required_text(field, "defName")?),
            "label" => label = Some(ctx.required_text(field, "label")?),
            "description" => description = ctx.optional_text(field),
            "category" => {
                let value = ctx.required_text(field, "category")?;
                category = Some(ItemCategory::parse(&value).ok_or_else(|| {
                    ctx.error(
                        ContentErrorCode::InvalidValue,
                        format!(
                            "invalid category '{value}'; allowed values: tool, consumable, key, document, component"
                        ),
                        field,
                    )
                })?);
            }
            "usable" => usable = ctx.bool_value(field, "usable")?,
            "consumable" => consumable = ctx.bool_value(field, "consumable")?,
            "equippable" => equippable = ctx.bool_value(field, "equippable")?,
            "combinesWith" => combines_with = ctx.list(field, "combinesWith")?,
            "combinationResult" => {
                combination_result = Some(ctx.required_text(field, "combinationResult")?)
            }
            _ => return Err(ctx.unknown_field("ItemDef", &field_name, field)),
        }
    }

    if !combines_with.is_empty() && combination_result.is_none() {
        return Err(ctx.error(
            ContentErrorCode::MissingField,
            "<combinesWith> requires <combinationResult> in <ItemDef>".to_string(),
            node,
        ));
    }

    Ok(ItemDef {
        def_name: ctx.missing(def_name, "ItemDef", "defName", node)?,
        label: ctx.missing(label, "ItemDef", "label", node)?,
        description,
        category: ctx.missing(category, "ItemDef", "category", node)?,
        usable,
        consumable,
        equippable,
        combines_with,
        combination_result,
    })
}

fn parse_location_def(
    ctx: &DefContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<LocationDef, ContentCompileError> {
    let mut def_name = None;
    let mut label = None;
    let mut description = String::new();
    let mut position = (0.0, 0.0);
    let mut discovered = false;
    let mut connections = Vec::new();
    let mut items = Vec::new();

    for (field_name, field) in ctx.fields("LocationDef", node)? {
        match field_name.as_str() {
            "defName" => def_name = Some(ctx.required_text(field, "defName")?),
            "label" => label = Some(ctx.required_text(field, "label")?),
            "description" => description = ctx.optional_text(field),
            "position" => {
                let value = ctx.required_text(field, "position")?;
                let Some((x, y)) = value.split_once(',') else {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        format!("position '{value}' must be 'x,y'"),
                        field,
                    ));
                };
                position = (
                    ctx.finite_f32(field, x, "position.x")?,
                    ctx.finite_f32(field, y, "position.y")?,
                );
            }
            "discovered" => discovered = ctx.bool_value(field, "discovered")?,
            "connections" => connections = ctx.list(field, "connections")?,
            "items" => items = ctx.list(field, "items")?,
            _ => return Err(ctx.unknown_field("LocationDef", &field_name, field)),
        }
    }

    Ok(LocationDef {
        def_name: ctx.missing(def_name, "LocationDef", "defName", node)?,
        label: ctx.missing(label, "LocationDef", "label", node)?,
        description,
        position,
        discovered,
        connections,
        items,
    })
}

fn parse_quest_def(ctx: &DefContext<'_, '_>, node: Node<'_, '_>) -> Result<QuestDef, ContentCompileError> {
    let mut def_name = None;
    let mut label = None;
    let mut description = String::new();
    let mut discovered = false;
    let mut priority = 0;
    let mut location = None;
    let mut prerequisites = Vec::new();
    let mut objectives = None;
    let mut reward_item = None;
    let mut reward_quantity = None;
    let mut reveals_locations = Vec::new();

    for (field_name, field) in ctx.fields("QuestDef", node)? {
        match field_name.as_str() {
            "defName" => def_name = Some(ctx.required_text(field, "defName")?),
            "label" => label = Some(ctx.required_text(field, "label")?),
            "description" => description = ctx.optional_text(field),
            "discovered" => discovered = ctx.bool_value(field, "discovered")?,
            "priority" => priority = ctx.i32_value(field, "priority")?,
            "location" => location = Some(ctx.required_text(field, "location")?),
            "prerequisites" => prerequisites = ctx.list(field, "prerequisites")?,
            "objectives" => objectives = Some(parse_objectives(ctx, field)?),
            "rewardItem" => reward_item = Some(ctx.required_text(field, "rewardItem")?),
            "rewardQuantity" => {
                reward_quantity = Some((ctx.positive_u32(field, "rewardQuantity")?, field))
            }
            "revealsLocations" => reveals_locations = ctx.list(field, "revealsLocations")?,
            _ => return Err(ctx.unknown_field("QuestDef", &field_name, field)),
        }
    }

    let reward = match (reward_item, reward_quantity) {
        (Some(item), quantity) => Some(QuestReward {
            item,
            quantity: quantity.map(|(value, _)| value).unwrap_or(1),
        }),
        (None, Some((_, field))) => {
            return Err(ctx.error(
                ContentErrorCode::MissingField,
                "<rewardQuantity> requires <rewardItem> in <QuestDef>".to_string(),
                field,
            ))
        }
        (None, None) => None,
    };

    let objectives = ctx.missing(objectives, "QuestDef", "objectives", node)?;
    if objectives.is_empty() {
        return Err(ctx.error(
            ContentErrorCode::MissingField,
            "<objectives> must contain at least one <li>".to_string(),
            node,
        ));
    }
    if objectives.iter().all(|objective| objective.optional) {
        return Err(ctx.error(
            ContentErrorCode::InvalidValue,
            "<objectives> needs at least one objective that is not optional".to_string(),
            node,
        ));
    }
    for objective in &objectives {
        for unlocked in &objective.unlocks {
            let known = objectives
                .iter()
                .any(|other| other.id == *unlocked && other.id != objective.id);
            if !known {
                return Err(ctx.error(
                    ContentErrorCode::UnknownReference,
                    format!(
                        "objective '{}' unlocks unknown objective '{unlocked}'",
                        objective.id
                    ),
                    node,
                ));
            }
        }
        let unlocked_by_other = objectives
            .iter()
            .any(|other| other.unlocks.contains(&objective.id));
        if objective.hidden && !unlocked_by_other {
            return Err(ctx.error(
                ContentErrorCode::InvalidValue,
                format!(
                    "hidden objective '{}' is never unlocked by another objective",
                    objective.id
                ),
                node,
            ));
        }
    }

    Ok(QuestDef {
        def_name: ctx.missing(def_name, "QuestDef", "defName", node)?,
        label: ctx.missing(label, "QuestDef", "label", node)?,
        description,
        discovered,
        priority,
        location,
        prerequisites,
        objectives,
        reward,
        reveals_locations,
    })
}

fn parse_objectives(
    ctx: &DefContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<Vec<ObjectiveDef>, ContentCompileError> {
    let mut objectives = Vec::<ObjectiveDef>::new();
    for entry in node.children().filter(|child| child.is_element()) {
        if entry.tag_name().name() != "li" {
            return Err(ctx.error(
                ContentErrorCode::UnknownField,
                format!(
                    "unexpected <{}> in <objectives>; entries must be <li>",
                    entry.tag_name().name()
                ),
                entry,
            ));
        }
        let objective = parse_objective(ctx, entry)?;
        if objectives.iter().any(|existing| existing.id == objective.id) {
            return Err(ctx.error(
                ContentErrorCode::DuplicateDef,
                format!("duplicate objective id '{}' in quest", objective.id),
                entry,
            ));
        }
        objectives.push(objective);
    }
    Ok(objectives)
}

fn parse_objective(ctx: &DefContext<'_, '_>, node: Node<'_, '_>) -> Result<ObjectiveDef, ContentCompileError> {
    let mut id = None;
    let mut description = String::new();
    let mut kind = None;
    let mut target = None;
    let mut required = 1;
    let mut optional = false;
    let mut hidden = false;
    let mut unlocks = Vec::new();

    for (field_name, field) in ctx.fields("objective", node)? {
        match field_name.as_str() {
            "id" => id = Some(ctx.required_text(field, "id")?),
            "description" => description = ctx.optional_text(field),
            "kind" => {
                let value = ctx.required_text(field, "kind")?;
                kind = Some(ObjectiveKind::parse(&value).ok_or_else(|| {
                    ctx.error(
                        ContentErrorCode::InvalidValue,
                        format!(
                            "invalid objective kind '{value}'; allowed values: CollectItem, VisitLocation, UseItem, DecodeMessage, TuneFrequency"
                        ),
                        field,
                    )
                })?);
            }
            "target" => target = Some((ctx.required_text(field, "target")?, field)),
            "required" => required = ctx.positive_u32(field, "required")?,
            "optional" => optional = ctx.bool_value(field, "optional")?,
            "hidden" => hidden = ctx.bool_value(field, "hidden")?,
            "unlocks" => unlocks = ctx.list(field, "unlocks")?,
            _ => return Err(ctx.unknown_field("objective", &field_name, field)),
        }
    }

    let kind = ctx.missing(kind, "objective", "kind", node)?;
    let (raw_target, target_node) = ctx.missing(target, "objective", "target", node)?;
    let target = match kind {
        ObjectiveKind::CollectItem => ObjectiveTarget::CollectItem(raw_target),
        ObjectiveKind::VisitLocation => ObjectiveTarget::VisitLocation(raw_target),
        ObjectiveKind::UseItem => ObjectiveTarget::UseItem(raw_target),
        ObjectiveKind::DecodeMessage => ObjectiveTarget::DecodeMessage(raw_target),
        ObjectiveKind::TuneFrequency => {
            ObjectiveTarget::TuneFrequency(ctx.finite_f32(target_node, &raw_target, "target")?)
        }
    };

    Ok(ObjectiveDef {
        id: ctx.missing(id, "objective", "id", node)?,
        description,
        target,
        required,
        optional,
        hidden,
        unlocks,
    })
}

fn parse_message_def(
    ctx: &DefContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<MessageDef, ContentCompileError> {
    let mut def_name = None;
    let mut title = None;
    let mut content = None;
    let mut decoded = false;

    for (field_name, field) in ctx.fields("MessageDef", node)? {
        match field_name.as_str() {
            "defName" => def_name = Some(ctx.required_text(field, "defName")?),
            "label" => title = Some(ctx.required_text(field, "label")?),
            "content" => content = Some(ctx.required_text(field, "content")?),
            "decoded" => decoded = ctx.bool_value(field, "decoded")?,
            _ => return Err(ctx.unknown_field("MessageDef", &field_name, field)),
        }
    }

    Ok(MessageDef {
        def_name: ctx.missing(def_name, "MessageDef", "defName", node)?,
        title: ctx.missing(title, "MessageDef", "label", node)?,
        content: ctx.missing(content, "MessageDef", "content", node)?,
        decoded,
    })
}

fn parse_signal_def(ctx: &DefContext<'_, '_>, node: Node<'_, '_>) -> Result<SignalDef, ContentCompileError> {
    let mut def_name = None;
    let mut frequency = None;
    let mut message = None;
    let mut bandwidth = None;

    for (field_name, field) in ctx.fields("SignalDef", node)? {
        match field_name.as_str() {
            "defName" => def_name = Some(ctx.required_text(field, "defName")?),
            "frequency" => {
                let value = ctx.required_text(field, "frequency")?;
                frequency = Some(ctx.finite_f32(field, &value, "frequency")?);
            }
            "message" => message = Some(ctx.required_text(field, "message")?),
            "bandwidth" => {
                let value = ctx.required_text(field, "bandwidth")?;
                let parsed = ctx.finite_f32(field, &value, "bandwidth")?;
                if parsed <= 0.0 {
                    return Err(ctx.error(
                        ContentErrorCode::InvalidValue,
                        "bandwidth must be > 0".to_string(),
                        field,
                    ));
                }
                bandwidth = Some(parsed);
            }
            _ => return Err(ctx.unknown_field("SignalDef", &field_name, field)),
        }
    }

    Ok(SignalDef {
        def_name: ctx.missing(def_name, "SignalDef", "defName", node)?,
        frequency: ctx.missing(frequency, "SignalDef", "frequency", node)?,
        message: ctx.missing(message, "SignalDef", "message", node)?,
        bandwidth: ctx.missing(bandwidth, "SignalDef", "bandwidth", node)?,
    })
}

fn reject_duplicates(pending: &PendingDefs) -> Result<(), ContentCompileError> {
    check_unique("ItemDef", pending.items.iter().map(|(def, origin)| (&def.def_name, origin)))?;
    check_unique(
        "LocationDef",
        pending.locations.iter().map(|(def, origin)| (&def.def_name, origin)),
    )?;
    check_unique("QuestDef", pending.quests.iter().map(|(def, origin)| (&def.def_name, origin)))?;
    check_unique(
        "MessageDef",
        pending.messages.iter().map(|(def, origin)| (&def.def_name, origin)),
    )?;
    check_unique(
        "SignalDef",
        pending.signals.iter().map(|(def, origin)| (&def.def_name, origin)),
    )
}

fn check_unique<'a>(
    def_type: &str,
    defs: impl Iterator<Item = (&'a String, &'a Origin)>,
) -> Result<(), ContentCompileError> {
    let mut seen = HashSet::<&str>::new();
    for (def_name, origin) in defs {
        if !seen.insert(def_name) {
            return Err(origin.error(
                ContentErrorCode::DuplicateDef,
                format!("duplicate {def_type} '{def_name}'; each defName may be defined only once"),
            ));
        }
    }
    Ok(())
}

fn validate_references(pending: &PendingDefs) -> Result<(), ContentCompileError> {
    let items = names(pending.items.iter().map(|(def, _)| &def.def_name));
    let locations = names(pending.locations.iter().map(|(def, _)| &def.def_name));
    let quests = names(pending.quests.iter().map(|(def, _)| &def.def_name));
    let messages = names(pending.messages.iter().map(|(def, _)| &def.def_name));

    for (item, origin) in &pending.items {
        for partner in &item.combines_with {
            require_known(&items, partner, "item", &item.def_name, origin)?;
        }
        if let Some(result) = &item.combination_result {
            require_known(&items, result, "item", &item.def_name, origin)?;
        }
    }

    for (location, origin) in &pending.locations {
        for connection in &location.connections {
            require_known(&locations, connection, "location", &location.def_name, origin)?;
        }
        for item in &location.items {
            require_known(&items, item, "item", &location.def_name, origin)?;
        }
    }

    for (quest, origin) in &pending.quests {
        for prerequisite in &quest.prerequisites {
            require_known(&quests, prerequisite, "quest", &quest.def_name, origin)?;
        }
        if let Some(location) = &quest.location {
            require_known(&locations, location, "location", &quest.def_name, origin)?;
        }
        for objective in &quest.objectives {
            match &objective.target {
                ObjectiveTarget::CollectItem(item) | ObjectiveTarget::UseItem(item) => {
                    require_known(&items, item, "item", &quest.def_name, origin)?
                }
                ObjectiveTarget::VisitLocation(location) => {
                    require_known(&locations, location, "location", &quest.def_name, origin)?
                }
                ObjectiveTarget::DecodeMessage(message) => {
                    require_known(&messages, message, "message", &quest.def_name, origin)?
                }
                ObjectiveTarget::TuneFrequency(_) => {}
            }
        }
        if let Some(reward) = &quest.reward {
            require_known(&items, &reward.item, "item", &quest.def_name, origin)?;
        }
        for location in &quest.reveals_locations {
            require_known(&locations, location, "location", &quest.def_name, origin)?;
        }
    }

    for (signal, origin) in &pending.signals {
        require_known(&messages, &signal.message, "message", &signal.def_name, origin)?;
    }
    Ok(())
}

fn names<'a>(defs: impl Iterator<Item = &'a String>) -> HashSet<&'a str> {
    defs.map(String::as_str).collect()
}

fn require_known(
    known: &HashSet<&str>,
    reference: &str,
    kind: &str,
    referrer: &str,
    origin: &Origin,
) -> Result<(), ContentCompileError> {
    if known.contains(reference) {
        return Ok(());
    }
    Err(origin.error(
        ContentErrorCode::UnknownReference,
        format!("'{referrer}' references unknown {kind} '{reference}'"),
    ))
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<(String, PathBuf)>, ReadError> {
    let mut files = Vec::<(String, PathBuf)>::new();
    collect_recursive(root, root, &mut files)?;
    files.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(files)
}

fn collect_recursive(
    root: &Path,
    current: &Path,
    files: &mut Vec<(String, PathBuf)>,
) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(root, &path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            files.push((normalize_rel_path(rel), path.clone()));
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML content: {source}"),
        file_path: path,
        location: None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    const MINIMAL_ITEMS: &str = r#"<Defs>
        <ItemDef><defName>lamp</defName><label>Lamp</label><category>tool</category><usable>true</usable></ItemDef>
    </Defs>"#;

    #[test]
    fn compiles_directory_in_normalized_path_order() {
        let temp = TempDir::new().expect("temp");
        write_file(
            &temp.path().join("b").join("items.xml"),
            r#"<Defs><ItemDef><defName>zeta</defName><label>Zeta</label><category>key</category></ItemDef></Defs>"#,
        );
        write_file(&temp.path().join("a.xml"), MINIMAL_ITEMS);
        write_file(&temp.path().join("notes.txt"), "ignored");

        let catalog = compile_catalog(temp.path()).expect("compile");
        let names = catalog
            .items()
            .iter()
            .map(|item| item.def_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["lamp", "zeta"]);
    }

    #[test]
    fn fingerprint_changes_when_content_changes() {
        let temp = TempDir::new().expect("temp");
        write_file(&temp.path().join("items.xml"), MINIMAL_ITEMS);
        let first = compile_catalog(temp.path()).expect("compile");

        write_file(
            &temp.path().join("items.xml"),
            &MINIMAL_ITEMS.replace("Lamp", "Oil Lamp"),
        );
        let second = compile_catalog(temp.path()).expect("compile");
        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn missing_def_name_reports_file_and_location() {
        let temp = TempDir::new().expect("temp");
        write_file(
            &temp.path().join("items.xml"),
            r#"<Defs><ItemDef><label>X</label><category>tool</category></ItemDef></Defs>"#,
        );
        let err = compile_catalog(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert!(err.file_path.ends_with("items.xml"));
        assert!(err.location.is_some());
    }

    #[test]
    fn unknown_field_errors() {
        let err = compile_catalog_sources(&[(
            "items.xml",
            r#"<Defs><ItemDef><defName>a</defName><label>A</label><category>tool</category><weight>3</weight></ItemDef></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownField);
    }

    #[test]
    fn duplicate_field_errors() {
        let err = compile_catalog_sources(&[(
            "items.xml",
            r#"<Defs><ItemDef><defName>a</defName><label>A</label><label>B</label><category>tool</category></ItemDef></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateField);
    }

    #[test]
    fn invalid_category_errors() {
        let err = compile_catalog_sources(&[(
            "items.xml",
            r#"<Defs><ItemDef><defName>a</defName><label>A</label><category>weapon</category></ItemDef></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn malformed_xml_reports_location() {
        let err = compile_catalog_sources(&[("items.xml", "<Defs><ItemDef><defName>a</defName></Defs>")])
            .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn unknown_def_type_errors() {
        let err = compile_catalog_sources(&[("x.xml", "<Defs><EntityDef/></Defs>")]).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownDefType);
    }

    #[test]
    fn duplicate_def_across_files_errors() {
        let err = compile_catalog_sources(&[("a.xml", MINIMAL_ITEMS), ("b.xml", MINIMAL_ITEMS)])
            .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateDef);
        assert!(err.file_path.ends_with("b.xml"));
    }

    #[test]
    fn unknown_connection_is_a_reference_error() {
        let err = compile_catalog_sources(&[(
            "locations.xml",
            r#"<Defs><LocationDef><defName>camp</defName><label>Camp</label><connections><li>nowhere</li></connections></LocationDef></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownReference);
        assert!(err.message.contains("nowhere"));
    }

    #[test]
    fn quest_objective_targets_are_checked_by_kind() {
        let err = compile_catalog_sources(&[
            ("items.xml", MINIMAL_ITEMS),
            (
                "quests.xml",
                r#"<Defs><QuestDef><defName>q</defName><label>Q</label>
                    <objectives><li><id>o</id><kind>DecodeMessage</kind><target>lamp</target></li></objectives>
                </QuestDef></Defs>"#,
            ),
        ])
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownReference);
        assert!(err.message.contains("message 'lamp'"));
    }

    #[test]
    fn tune_objective_target_must_be_numeric() {
        let err = compile_catalog_sources(&[(
            "quests.xml",
            r#"<Defs><QuestDef><defName>q</defName><label>Q</label>
                <objectives><li><id>o</id><kind>TuneFrequency</kind><target>loud</target></li></objectives>
            </QuestDef></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn reward_quantity_defaults_to_one() {
        let catalog = compile_catalog_sources(&[
            ("items.xml", MINIMAL_ITEMS),
            (
                "quests.xml",
                r#"<Defs><QuestDef><defName>q</defName><label>Q</label><rewardItem>lamp</rewardItem>
                    <objectives><li><id>o</id><kind>TuneFrequency</kind><target>91.5</target><required>2</required></li></objectives>
                </QuestDef></Defs>"#,
            ),
        ])
        .expect("compile");
        let quest = catalog.quest("q").expect("quest");
        assert_eq!(
            quest.reward,
            Some(QuestReward {
                item: "lamp".to_string(),
                quantity: 1
            })
        );
        assert_eq!(quest.objectives[0].required, 2);
        assert_eq!(quest.objectives[0].target, ObjectiveTarget::TuneFrequency(91.5));
    }

    const TWO_STEP_QUEST: &str = r#"<Defs><QuestDef><defName>q</defName><label>Q</label><priority>-3</priority>
        <objectives>
            <li><id>first</id><kind>TuneFrequency</kind><target>91.5</target><unlocks><li>second</li></unlocks></li>
            <li><id>second</id><kind>TuneFrequency</kind><target>93.0</target><hidden>true</hidden></li>
            <li><id>extra</id><kind>TuneFrequency</kind><target>95.0</target><optional>true</optional></li>
        </objectives>
    </QuestDef></Defs>"#;

    #[test]
    fn objective_flags_and_priority_are_compiled() {
        let catalog = compile_catalog_sources(&[("quests.xml", TWO_STEP_QUEST)]).expect("compile");
        let quest = catalog.quest("q").expect("quest");
        assert_eq!(quest.priority, -3);
        assert_eq!(quest.objectives[0].unlocks, vec!["second".to_string()]);
        assert!(!quest.objectives[0].hidden);
        assert!(quest.objectives[1].hidden);
        assert!(quest.objectives[2].optional);
        assert!(!quest.objectives[2].hidden);
    }

    #[test]
    fn unlocking_an_unknown_objective_is_a_reference_error() {
        let err = compile_catalog_sources(&[(
            "quests.xml",
            &TWO_STEP_QUEST.replace("<li>second</li></unlocks>", "<li>third</li></unlocks>"),
        )])
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownReference);
        assert!(err.message.contains("'third'"));
    }

    #[test]
    fn hidden_objective_without_an_unlocker_errors() {
        let err = compile_catalog_sources(&[(
            "quests.xml",
            &TWO_STEP_QUEST.replace("<unlocks><li>second</li></unlocks>", ""),
        )])
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
        assert!(err.message.contains("'second'"));
    }

    #[test]
    fn quest_with_only_optional_objectives_errors() {
        let err = compile_catalog_sources(&[(
            "quests.xml",
            r#"<Defs><QuestDef><defName>q</defName><label>Q</label>
                <objectives><li><id>o</id><kind>TuneFrequency</kind><target>91.5</target><optional>true</optional></li></objectives>
            </QuestDef></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn non_numeric_priority_errors() {
        let err = compile_catalog_sources(&[(
            "quests.xml",
            &TWO_STEP_QUEST.replace("<priority>-3</priority>", "<priority>high</priority>"),
        )])
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn equippable_flag_is_compiled() {
        let catalog = compile_catalog_sources(&[(
            "items.xml",
            &MINIMAL_ITEMS.replace("<usable>true</usable>", "<usable>true</usable><equippable>true</equippable>"),
        )])
        .expect("compile");
        assert!(catalog.item("lamp").expect("lamp").equippable);
    }

    #[test]
    fn base_assets_on_disk_match_embedded_copy() {
        let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("assets")
            .join("base");
        let from_disk = compile_catalog(&base).expect("compile disk");
        let embedded = Catalog::builtin().expect("builtin");
        assert_eq!(from_disk.fingerprint(), embedded.fingerprint());
        assert_eq!(from_disk.quests().len(), embedded.quests().len());
    }
}
