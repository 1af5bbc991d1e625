use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "chirp", version = crate::VERSION, about = "chirp, a multi-transport chat bot")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file (overrides ~/.chirp/chirp.toml).
    #[arg(long, global = true, env = "CHIRP_CONFIG")]
    pub config: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start every configured adapter and the HTTP listener (default).
    Run,
    /// Inspect or seed store keys such as `signal:account`.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// List registered plugins.
    Plugins,
}

#[derive(Debug, Subcommand)]
pub enum StoreAction {
    Get { key: String },
    Set { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["chirp"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn store_set_takes_key_and_value() {
        let cli = Cli::try_parse_from([
            "chirp",
            "--config",
            "/etc/chirp.toml",
            "store",
            "set",
            "signal:account",
            "a1b2",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some("/etc/chirp.toml"));
        match cli.command {
            Some(Command::Store {
                action: StoreAction::Set { key, value },
            }) => {
                assert_eq!(key, "signal:account");
                assert_eq!(value, "a1b2");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
