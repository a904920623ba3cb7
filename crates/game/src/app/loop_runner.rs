use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::rc::Rc;

use engine::{Catalog, GameEvent, GameSession, SaveCoordinator};
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::commands::{CommandRegistry, GameCommand};

const PROMPT: &str = "> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

/// Text front end: parses a line, runs it against the session, collects what to print.
pub(crate) struct Console {
    session: GameSession,
    saves: SaveCoordinator,
    registry: CommandRegistry,
    event_log: Rc<RefCell<Vec<GameEvent>>>,
}

impl Console {
    pub(crate) fn new(app: AppWiring) -> Self {
        let AppWiring { mut session, saves } = app;
        let event_log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&event_log);
        session.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        Self {
            session,
            saves,
            registry: CommandRegistry::with_game_commands(),
            event_log,
        }
    }

    pub(crate) fn process_line(&mut self, raw_line: &str, out: &mut Vec<String>) -> Flow {
        let command = match self.registry.parse_line(raw_line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(message) => {
                out.push(message);
                return Flow::Continue;
            }
        };

        let mutates = command.mutates_session();
        let flow = self.execute(command, out);
        if mutates {
            self.session.catch_up_progression();
        }
        self.flush_events(out);
        flow
    }

    fn execute(&mut self, command: GameCommand, out: &mut Vec<String>) -> Flow {
        match command {
            GameCommand::Help => out.extend(self.registry.help_lines()),
            GameCommand::Status => self.status(out),
            GameCommand::Look => self.look(out),
            GameCommand::Go { location } => {
                report(out, self.session.try_change_location(&location), || {
                    format!("you travel to {location}")
                })
            }
            GameCommand::Take { item } => {
                report(out, self.session.try_pick_up_item(&item), || {
                    format!("taken: {item}")
                })
            }
            GameCommand::Drop { item, quantity } => {
                report(out, self.session.try_drop_item(&item, quantity), || {
                    format!("dropped: {item} x{quantity}")
                })
            }
            GameCommand::Use { item } => {
                report(out, self.session.try_use_item(&item), || format!("used: {item}"))
            }
            GameCommand::Combine { first, second } => {
                match self.session.try_combine_items(&first, &second) {
                    Ok(result) => out.push(format!("combined {first} and {second} into {result}")),
                    Err(error) => out.push(format!("error: {error}")),
                }
            }
            GameCommand::Equip { item } => {
                report(out, self.session.try_equip_item(&item), || {
                    format!("equipped: {item}")
                })
            }
            GameCommand::Unequip { item } => {
                report(out, self.session.try_unequip_item(&item), || {
                    format!("unequipped: {item}")
                })
            }
            GameCommand::Power => {
                let on = self.session.toggle_radio();
                out.push(format!("radio {}", if on { "on" } else { "off" }));
            }
            GameCommand::Tune { frequency } => match self.session.try_tune_radio(frequency) {
                Ok(Some(signal)) => out.push(format!(
                    "{:.1} MHz: locked onto {signal} (strength {:.2})",
                    self.session.radio().frequency(),
                    self.session.radio().signal_strength()
                )),
                Ok(None) => out.push(format!(
                    "{:.1} MHz: static",
                    self.session.radio().frequency()
                )),
                Err(error) => out.push(format!("error: {error}")),
            },
            GameCommand::Decode { message } => {
                report(out, self.session.try_decode_message(&message), || {
                    let content = self
                        .session
                        .catalog()
                        .message(&message)
                        .map(|def| def.content.clone())
                        .unwrap_or_default();
                    format!("decoded {message}: {content}")
                })
            }
            GameCommand::Accept { quest } => {
                report(out, self.session.try_activate_quest(&quest), || {
                    format!("quest accepted: {quest}")
                })
            }
            GameCommand::Abandon { quest } => {
                report(out, self.session.try_fail_quest(&quest), || {
                    format!("quest abandoned: {quest}")
                })
            }
            GameCommand::Quests => self.quests(out),
            GameCommand::Inventory => self.inventory(out),
            GameCommand::Inbox => match self.session.next_message() {
                Some(id) => {
                    let catalog = self.session.catalog();
                    match catalog.message(&id) {
                        Some(def) if self.session.signals().is_message_decoded(&id) => {
                            out.push(format!("[{id}] {}: {}", def.title, def.content))
                        }
                        Some(def) => out.push(format!(
                            "[{id}] {}: <encoded, try: decode {id}>",
                            def.title
                        )),
                        None => out.push(format!("[{id}]")),
                    }
                }
                None => out.push("inbox empty".to_string()),
            },
            GameCommand::Save { slot } => {
                match self.saves.try_save_game(&self.session, &slot) {
                    Ok(()) => out.push(format!("saved slot {slot}")),
                    Err(error) => out.push(format!("error: {error}")),
                }
            }
            GameCommand::Load { slot } => {
                match self.saves.try_load_game(&mut self.session, &slot) {
                    Ok(()) => out.push(format!("loaded slot {slot}")),
                    Err(error) => out.push(format!("error: {error}")),
                }
            }
            GameCommand::Slots => match self.saves.try_get_save_slots() {
                Ok(slots) if slots.is_empty() => out.push("no save slots".to_string()),
                Ok(slots) => out.extend(slots),
                Err(error) => out.push(format!("error: {error}")),
            },
            GameCommand::Delete { slot } => match self.saves.try_delete_save_slot(&slot) {
                Ok(()) => out.push(format!("deleted slot {slot}")),
                Err(error) => out.push(format!("error: {error}")),
            },
            GameCommand::New => {
                self.session.reset();
                out.push("new game".to_string());
            }
            GameCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn status(&self, out: &mut Vec<String>) {
        let session = &self.session;
        out.push(format!("stage: {}", session.stage()));
        out.push(session.current_stage_description().to_string());
        out.push(format!("next: {}", session.next_objective()));
        out.push(format!("location: {}", session.map().current_location()));
        out.push(format!(
            "radio: {} at {:.1} MHz",
            if session.radio().is_on() { "on" } else { "off" },
            session.radio().frequency()
        ));
        let frequencies = session
            .signals()
            .discovered_frequencies()
            .iter()
            .map(|frequency| format!("{frequency:.1}"))
            .collect::<Vec<_>>();
        if !frequencies.is_empty() {
            out.push(format!("logged frequencies: {}", frequencies.join(", ")));
        }
        if session.is_game_completed() {
            out.push("game completed".to_string());
        }
    }

    fn look(&self, out: &mut Vec<String>) {
        let map = self.session.map();
        if let Some(def) = map.current_location_def() {
            out.push(format!("{} ({})", def.label, def.def_name));
            out.push(def.description.clone());
        }
        let exits = map
            .connected_locations()
            .iter()
            .map(|def| {
                if map.is_location_discovered(&def.def_name) {
                    def.def_name.clone()
                } else {
                    "???".to_string()
                }
            })
            .collect::<Vec<_>>();
        out.push(format!("exits: {}", exits.join(", ")));
        if !map.items_here().is_empty() {
            out.push(format!("items here: {}", map.items_here().join(", ")));
        }
    }

    fn quests(&self, out: &mut Vec<String>) {
        let quests = self.session.quests();
        let discovered = quests.quests_by_priority();
        if discovered.is_empty() {
            out.push("no quests".to_string());
            return;
        }
        for quest in discovered {
            let label = quests
                .quest_def(&quest.id)
                .map(|def| def.label.as_str())
                .unwrap_or_default();
            let state = if quest.completed {
                "done"
            } else if quest.failed {
                "failed"
            } else if quest.active {
                "active"
            } else {
                "available"
            };
            out.push(format!("{} [{state}] {label}", quest.id));
            if quest.active {
                for objective in quest.objectives.iter().filter(|objective| !objective.hidden) {
                    out.push(format!(
                        "  - {} {}/{}{}",
                        objective.id,
                        objective.current,
                        objective.required,
                        if objective.optional { " (optional)" } else { "" }
                    ));
                }
            }
        }
    }

    fn inventory(&self, out: &mut Vec<String>) {
        let inventory = self.session.inventory();
        if inventory.is_empty() {
            out.push("inventory empty".to_string());
            return;
        }
        for entry in inventory.entries() {
            let equipped = if inventory.is_equipped(&entry.item) {
                " (equipped)"
            } else {
                ""
            };
            out.push(format!("{} x{}{equipped}", entry.item, entry.quantity));
        }
        out.push(format!(
            "{}/{} slots used",
            inventory.total_item_count(),
            inventory.capacity()
        ));
    }

    fn flush_events(&mut self, out: &mut Vec<String>) {
        let events = std::mem::take(&mut *self.event_log.borrow_mut());
        let catalog = self.session.catalog();
        out.extend(events.iter().filter_map(|event| describe_event(event, catalog)));
    }
}

fn report<T>(
    out: &mut Vec<String>,
    result: engine::GameResult<T>,
    success: impl FnOnce() -> String,
) {
    match result {
        Ok(_) => out.push(success()),
        Err(error) => out.push(format!("error: {error}")),
    }
}

/// Story-level notifications only; bookkeeping events stay in the log.
fn describe_event(event: &GameEvent, catalog: &Catalog) -> Option<String> {
    let quest_label = |id: &str| {
        catalog
            .quest(id)
            .map(|def| def.label.clone())
            .unwrap_or_else(|| id.to_string())
    };
    let line = match event {
        GameEvent::InventoryFull { item } => format!("* inventory full, {item} left behind"),
        GameEvent::ItemsCombined { result, .. } => format!("* crafted {result}"),
        GameEvent::LocationDiscovered { location } => format!("* new location: {location}"),
        GameEvent::QuestDiscovered { quest } => format!("* new quest: {}", quest_label(quest)),
        GameEvent::QuestActivated { quest } => format!("* quest started: {}", quest_label(quest)),
        GameEvent::ObjectiveCompleted { quest, objective } => {
            format!("* objective done: {objective} ({quest})")
        }
        GameEvent::ObjectiveUnlocked { quest, objective } => {
            format!("* new objective: {objective} ({quest})")
        }
        GameEvent::QuestCompleted { quest } => {
            format!("* quest completed: {}", quest_label(quest))
        }
        GameEvent::QuestFailed { quest } => format!("* quest failed: {}", quest_label(quest)),
        GameEvent::ItemUnequipped { item } => format!("* {item} put away"),
        GameEvent::FrequencyDiscovered { frequency } => {
            format!("* frequency logged: {frequency:.1} MHz")
        }
        GameEvent::MessageEnqueued { message } => format!("* message received: {message}"),
        GameEvent::StageChanged { stage } => format!("* stage: {stage}"),
        GameEvent::GameCompleted => "* the final transmission is out. game completed".to_string(),
        _ => return None,
    };
    Some(line)
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut console = Console::new(app);
    let stdin = io::stdin();
    let stdout = io::stdout();
    match run_console(&mut console, stdin.lock(), stdout.lock()) {
        Ok(()) => {
            info!("console_closed");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "console_io_failed");
            ExitCode::FAILURE
        }
    }
}

pub(crate) fn run_console(
    console: &mut Console,
    input: impl BufRead,
    mut output: impl Write,
) -> io::Result<()> {
    writeln!(output, "Signal Lost. Type 'help' for commands.")?;
    let mut lines = Vec::new();
    console.process_line("status", &mut lines);
    for line in lines.drain(..) {
        writeln!(output, "{line}")?;
    }

    write!(output, "{PROMPT}")?;
    output.flush()?;
    for raw_line in input.lines() {
        let flow = console.process_line(&raw_line?, &mut lines);
        for line in lines.drain(..) {
            writeln!(output, "{line}")?;
        }
        if flow == Flow::Quit {
            return Ok(());
        }
        write!(output, "{PROMPT}")?;
        output.flush()?;
    }
    Ok(())
}
