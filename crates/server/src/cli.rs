//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Scheduled message relay: publishes stored definitions to the broker and
/// mirrors every publish to live WebSocket observers.
#[derive(Parser, Debug)]
#[command(name = "relay-server", version, about)]
pub struct Cli {
    /// Configuration profile; keys are looked up as `{PROFILE}_{KEY}` first.
    #[arg(long, env = "RELAY_PROFILE", global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API, observer endpoint and emission scheduler (default).
    Serve {
        /// Listen port, overriding PORT.
        #[arg(long)]
        port: Option<u16>,

        /// Listen address, overriding HOST.
        #[arg(long)]
        host: Option<String>,
    },
    /// Insert definitions from a JSON array file into the configured store.
    Seed {
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_optional() {
        let cli = Cli::try_parse_from(["relay-server"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn serve_port_override() {
        let cli = Cli::try_parse_from(["relay-server", "serve", "--port", "9000"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Serve { port: Some(9000), host: None })));
    }

    #[test]
    fn seed_takes_a_path() {
        let cli = Cli::try_parse_from(["relay-server", "--profile", "dev", "seed", "data.json"]).unwrap();
        assert_eq!(cli.profile.as_deref(), Some("dev"));
        match cli.command {
            Some(Command::Seed { file }) => assert_eq!(file, PathBuf::from("data.json")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
