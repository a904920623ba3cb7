use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use save_cli::{run, CommandKind, CommonOptions};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }

    let mut options = CommonOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--root" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --root".to_string())?;
                options.root = Some(PathBuf::from(value));
                index += 2;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];

    let kind = match command {
        "list" => {
            if !command_args.is_empty() {
                return Err("list takes no arguments".to_string());
            }
            CommandKind::List
        }
        "save" => CommandKind::Save {
            slot: single_slot("save", command_args)?,
        },
        "load" => CommandKind::Load {
            slot: single_slot("load", command_args)?,
        },
        "delete" => CommandKind::Delete {
            slot: single_slot("delete", command_args)?,
        },
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    run(kind, options, &mut io::stdout())
}

fn single_slot(command: &str, args: &[String]) -> Result<String, String> {
    match args {
        [slot] => Ok(slot.clone()),
        _ => Err(format!("{command} requires exactly one slot name")),
    }
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "save_cli - manage Signal Lost save slots",
        "",
        "Usage:",
        "  save_cli [--root <dir>] list",
        "  save_cli [--root <dir>] save <slot>",
        "  save_cli [--root <dir>] load <slot>",
        "  save_cli [--root <dir>] delete <slot>",
        "",
        "Slots are 1-64 characters of A-Z, a-z, 0-9, '_' and '-'.",
        "Without --root the workspace is found via SIGNAL_LOST_ROOT or the executable location.",
    ]
    .join("\n")
}
