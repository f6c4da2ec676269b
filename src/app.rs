use std::{fs, path::Path};

use anyhow::{Context, Result};

use crate::{
    cli::{Cli, Command, ReplayArgs},
    domain::{
        self,
        identity::ChatIdentity,
        ids::{RoomId, UserId},
    },
    infra::{
        self,
        config::{AppConfig, IdentityConfig},
        error::AppError,
        history_file::FileHistorySource,
        stubs::EmptyHistorySource,
    },
    transport::{self, frames::decode_message_body},
    usecases::{
        self, bootstrap,
        load_history::HistorySource,
        replay::{parse_script, run_replay, ReplayOptions},
        room_session::SessionSettings,
    },
};

pub fn run(cli: Cli) -> Result<()> {
    let context = bootstrap::bootstrap(cli.config.as_deref())?;

    tracing::debug!(
        domain = domain::module_name(),
        transport = transport::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        "module boundaries loaded"
    );

    let output = match cli.command {
        Command::Replay(args) => replay(&context.config, &args)?,
        Command::Decode { frame } => decode(&frame)?,
    };
    println!("{output}");

    Ok(())
}

fn replay(config: &AppConfig, args: &ReplayArgs) -> Result<String> {
    let script = read_input(&args.script)?;
    let steps = parse_script(&script)?;

    let history: Box<dyn HistorySource> = match args.history.as_deref() {
        Some(path) => Box::new(FileHistorySource::open(path)?),
        None => Box::new(EmptyHistorySource),
    };
    let options = ReplayOptions {
        room_id: RoomId(args.room),
        identity: resolve_identity(&config.identity, args),
        settings: SessionSettings::from(&config.chat),
    };

    let summary = run_replay(steps, history.as_ref(), options)?;

    serde_json::to_string_pretty(&summary).context("failed to render replay summary")
}

fn decode(frame: &Path) -> Result<String> {
    let body = read_input(frame)?;
    let event = decode_message_body(&body)?.decode()?;

    serde_json::to_string_pretty(&event).context("failed to render decoded frame")
}

/// Command line identity wins over the configured one.
fn resolve_identity(config: &IdentityConfig, args: &ReplayArgs) -> ChatIdentity {
    let email = args.email.clone().unwrap_or_else(|| config.email.clone());
    let user_id = args.user_id.or(config.user_id).map(UserId);

    ChatIdentity::new(email, user_id)
}

fn read_input(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|source| AppError::InputRead {
        path: path.to_path_buf(),
        source,
    })
}
