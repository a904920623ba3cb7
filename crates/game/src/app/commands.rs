use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GameCommand {
    Help,
    Status,
    Look,
    Go { location: String },
    Take { item: String },
    Drop { item: String, quantity: u32 },
    Use { item: String },
    Combine { first: String, second: String },
    Equip { item: String },
    Unequip { item: String },
    Power,
    Tune { frequency: f32 },
    Decode { message: String },
    Accept { quest: String },
    Abandon { quest: String },
    Quests,
    Inventory,
    Inbox,
    Save { slot: String },
    Load { slot: String },
    Slots,
    Delete { slot: String },
    New,
    Quit,
}

impl GameCommand {
    /// Commands that only read state never move the story forward.
    pub(crate) fn mutates_session(&self) -> bool {
        matches!(
            self,
            Self::Go { .. }
                | Self::Take { .. }
                | Self::Drop { .. }
                | Self::Use { .. }
                | Self::Combine { .. }
                | Self::Equip { .. }
                | Self::Unequip { .. }
                | Self::Power
                | Self::Tune { .. }
                | Self::Decode { .. }
                | Self::Accept { .. }
                | Self::Abandon { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: &str) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.to_string(),
        }
    }
}

type ParseFn = dyn Fn(&[String]) -> Result<GameCommand, CommandParseError>;
type BuiltinSpec = (
    &'static str,
    &'static str,
    &'static str,
    fn(&[String]) -> Result<GameCommand, CommandParseError>,
);

struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: Box<ParseFn>,
}

pub(crate) struct CommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl CommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_game_commands() -> Self {
        let builtins: [BuiltinSpec; 24] = [
            ("help", "List commands", "", |args| {
                no_args(args, "help", GameCommand::Help)
            }),
            ("status", "Show stage, location and radio", "", |args| {
                no_args(args, "status", GameCommand::Status)
            }),
            ("look", "Describe the current location", "", |args| {
                no_args(args, "look", GameCommand::Look)
            }),
            ("go", "Travel to a connected location", "<location>", |args| {
                let location = one_arg(args, "go <location>")?;
                Ok(GameCommand::Go { location })
            }),
            ("take", "Pick up an item lying here", "<item>", |args| {
                let item = one_arg(args, "take <item>")?;
                Ok(GameCommand::Take { item })
            }),
            ("drop", "Leave items here", "<item> [qty:u32]", parse_drop),
            ("use", "Use a held item", "<item>", |args| {
                let item = one_arg(args, "use <item>")?;
                Ok(GameCommand::Use { item })
            }),
            ("combine", "Combine two held items", "<item> <item>", parse_combine),
            ("equip", "Equip a held tool", "<item>", |args| {
                let item = one_arg(args, "equip <item>")?;
                Ok(GameCommand::Equip { item })
            }),
            ("unequip", "Put an equipped tool away", "<item>", |args| {
                let item = one_arg(args, "unequip <item>")?;
                Ok(GameCommand::Unequip { item })
            }),
            ("power", "Toggle radio power", "", |args| {
                no_args(args, "power", GameCommand::Power)
            }),
            ("tune", "Tune the radio", "<mhz:f32>", parse_tune),
            ("decode", "Decode a received message", "<message>", |args| {
                let message = one_arg(args, "decode <message>")?;
                Ok(GameCommand::Decode { message })
            }),
            ("accept", "Accept a discovered quest", "<quest>", |args| {
                let quest = one_arg(args, "accept <quest>")?;
                Ok(GameCommand::Accept { quest })
            }),
            ("abandon", "Give up an active quest", "<quest>", |args| {
                let quest = one_arg(args, "abandon <quest>")?;
                Ok(GameCommand::Abandon { quest })
            }),
            ("quests", "List discovered quests", "", |args| {
                no_args(args, "quests", GameCommand::Quests)
            }),
            ("inventory", "List held items", "", |args| {
                no_args(args, "inventory", GameCommand::Inventory)
            }),
            ("inbox", "Read the next queued message", "", |args| {
                no_args(args, "inbox", GameCommand::Inbox)
            }),
            ("save", "Save to a slot", "<slot>", |args| {
                let slot = one_arg(args, "save <slot>")?;
                Ok(GameCommand::Save { slot })
            }),
            ("load", "Load a slot", "<slot>", |args| {
                let slot = one_arg(args, "load <slot>")?;
                Ok(GameCommand::Load { slot })
            }),
            ("slots", "List save slots", "", |args| {
                no_args(args, "slots", GameCommand::Slots)
            }),
            ("delete", "Delete a save slot", "<slot>", |args| {
                let slot = one_arg(args, "delete <slot>")?;
                Ok(GameCommand::Delete { slot })
            }),
            ("new", "Start a new game", "", |args| {
                no_args(args, "new", GameCommand::New)
            }),
            ("quit", "Quit", "", |args| no_args(args, "quit", GameCommand::Quit)),
        ];

        let mut registry = Self::new();
        for (name, help, arg_schema, parse) in builtins {
            registry
                .register(name, help, arg_schema, parse)
                .expect("built-in command registration should not fail");
        }
        registry
    }

    pub(crate) fn register<F>(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        arg_schema: impl Into<String>,
        parse: F,
    ) -> Result<(), String>
    where
        F: Fn(&[String]) -> Result<GameCommand, CommandParseError> + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name,
            help: help.into(),
            arg_schema: arg_schema.into(),
            parse: Box::new(parse),
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
        Ok(())
    }

    fn lookup(&self, input_name: &str) -> Option<&CommandSpec> {
        let lower = input_name.to_ascii_lowercase();
        let index = self.lookup_by_lower_name.get(&lower)?;
        self.specs.get(*index)
    }

    /// `name args - help`, in registration order.
    pub(crate) fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| {
                if spec.arg_schema.is_empty() {
                    format!("{} - {}", spec.name, spec.help)
                } else {
                    format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
                }
            })
            .collect()
    }

    /// `Ok(None)` for blank input. Errors are ready to print.
    pub(crate) fn parse_line(&self, raw_line: &str) -> Result<Option<GameCommand>, String> {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let tokens =
            tokenize_line(trimmed).map_err(|reason| format!("error: {reason}. usage: help"))?;
        let Some((command_name, args)) = tokens.split_first() else {
            return Ok(None);
        };
        let Some(spec) = self.lookup(command_name) else {
            return Err(format!("error: unknown command '{command_name}'. try: help"));
        };

        (spec.parse)(args)
            .map(Some)
            .map_err(|error| format!("error: {}. usage: {}", error.reason, error.usage))
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen_token_content = false;
    let mut just_closed_quote = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                seen_token_content = true;
                if !in_quotes {
                    just_closed_quote = true;
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_token_content || just_closed_quote || !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                    seen_token_content = false;
                    just_closed_quote = false;
                }
            }
            _ => {
                current.push(ch);
                seen_token_content = true;
                just_closed_quote = false;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }

    if seen_token_content || just_closed_quote || !current.is_empty() {
        tokens.push(current);
    }

    Ok(tokens)
}

fn parse_drop(args: &[String]) -> Result<GameCommand, CommandParseError> {
    const USAGE: &str = "drop <item> [qty]";
    let (item, quantity) = match args {
        [item] => (item.clone(), 1),
        [item, quantity] => {
            let quantity = quantity
                .parse::<u32>()
                .ok()
                .filter(|quantity| *quantity > 0)
                .ok_or_else(|| {
                    CommandParseError::new(
                        format!("invalid quantity '{quantity}' (expected u32 >= 1)"),
                        USAGE,
                    )
                })?;
            (item.clone(), quantity)
        }
        _ => {
            return Err(CommandParseError::new(
                "expected <item> or <item> <qty>",
                USAGE,
            ))
        }
    };
    Ok(GameCommand::Drop { item, quantity })
}

fn parse_combine(args: &[String]) -> Result<GameCommand, CommandParseError> {
    match args {
        [first, second] => Ok(GameCommand::Combine {
            first: first.clone(),
            second: second.clone(),
        }),
        _ => Err(CommandParseError::new(
            "expected exactly two arguments <item> <item>",
            "combine <item> <item>",
        )),
    }
}

fn parse_tune(args: &[String]) -> Result<GameCommand, CommandParseError> {
    const USAGE: &str = "tune <mhz>";
    let raw = one_arg(args, USAGE)?;
    let frequency = raw
        .parse::<f32>()
        .ok()
        .filter(|frequency| frequency.is_finite())
        .ok_or_else(|| {
            CommandParseError::new(format!("invalid frequency '{raw}' (expected f32)"), USAGE)
        })?;
    Ok(GameCommand::Tune { frequency })
}

fn one_arg(args: &[String], usage: &str) -> Result<String, CommandParseError> {
    match args {
        [value] => Ok(value.clone()),
        [] => Err(CommandParseError::new("missing required argument", usage)),
        _ => Err(CommandParseError::new("unexpected extra arguments", usage)),
    }
}

fn no_args(
    args: &[String],
    usage: &str,
    command: GameCommand,
) -> Result<GameCommand, CommandParseError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(CommandParseError::new("unexpected extra arguments", usage))
    }
}
