use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "itda-chat", about = "IT-DA chat room reconciliation tools")]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Replay a JSON-lines room script and print the final room state
    Replay(ReplayArgs),
    /// Print the normalized form of one inbound message frame
    Decode {
        /// File holding the frame body as JSON
        frame: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ReplayArgs {
    /// Script with one step per line
    pub script: PathBuf,

    /// Room to enter
    #[arg(long, default_value_t = 1)]
    pub room: i64,

    /// Member email used for JOIN/READ/LEAVE and own-receipt detection
    #[arg(long)]
    pub email: Option<String>,

    /// Member user id used to recognize own messages
    #[arg(long)]
    pub user_id: Option<i64>,

    /// JSON array of messages served as the room history
    #[arg(long)]
    pub history: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn parses_replay_with_defaults() {
        let cli = Cli::parse_from(["itda-chat", "replay", "room.jsonl"]);

        let Command::Replay(args) = cli.command else {
            panic!("expected replay command");
        };
        assert_eq!(args.room, 1);
        assert_eq!(args.email, None);
        assert_eq!(args.history, None);
    }

    #[test]
    fn parses_replay_overrides_and_global_config() {
        let cli = Cli::parse_from([
            "itda-chat",
            "replay",
            "room.jsonl",
            "--room",
            "42",
            "--email",
            "me@itda.kr",
            "--user-id",
            "7",
            "--history",
            "history.json",
            "--config",
            "custom.toml",
        ]);

        let Command::Replay(args) = cli.command else {
            panic!("expected replay command");
        };
        assert_eq!(args.room, 42);
        assert_eq!(args.email.as_deref(), Some("me@itda.kr"));
        assert_eq!(args.user_id, Some(7));
        assert_eq!(
            cli.config
                .as_deref()
                .map(|p| p.to_string_lossy().to_string()),
            Some("custom.toml".to_owned())
        );
    }

    #[test]
    fn parses_decode_command() {
        let cli = Cli::parse_from(["itda-chat", "decode", "frame.json"]);

        assert!(matches!(cli.command, Command::Decode { .. }));
    }

    #[test]
    fn requires_a_subcommand() {
        assert!(Cli::try_parse_from(["itda-chat"]).is_err());
    }
}
