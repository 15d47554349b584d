// SPDX-License-Identifier: GPL-3.0-only

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::logging::LoggingLevel;

/// Snapshot, roll back and revert btrfs subvolumes
#[derive(Parser)]
#[command(name = "bread")]
#[command(about = "btrfs snapshot lifecycle and rollback", long_about = None)]
struct Cli {
    /// Default log verbosity when RUST_LOG is unset
    #[arg(long, value_enum, global = true, default_value_t = LoggingLevel::Info)]
    log_level: LoggingLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List snapshot sessions, newest last
    List {
        /// Show every session instead of the last 10
        #[arg(long)]
        all: bool,
        /// Print sessions as JSON
        #[arg(long)]
        json: bool,
    },
    /// Snapshot every live subvolume and apply retention
    Snapshot,
    /// Replace live subvolumes with a snapshot session
    Rollback {
        /// Session number as shown by `bread list --all`
        #[arg(long = "snapshot")]
        number: usize,
        /// Only these subvolumes (comma separated); defaults to the whole session
        #[arg(long, value_delimiter = ',')]
        subvols: Vec<String>,
        /// Do not prompt; refuse if the boot configuration is unsafe
        #[arg(long, short)]
        yes: bool,
    },
    /// Swap the undo buffer back into place
    Revert {
        /// Do not prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Write /etc/bread.json, prompting for any count not given
    Config {
        /// Hourly retention count
        #[arg(long)]
        hourly: Option<u32>,
        /// Daily retention count
        #[arg(long)]
        daily: Option<u32>,
        /// Weekly retention count
        #[arg(long)]
        weekly: Option<u32>,
        /// Monthly retention count
        #[arg(long)]
        monthly: Option<u32>,
    },
    /// Delete all snapshots, kernel backups and configuration
    Purge {
        /// Do not prompt
        #[arg(long, short)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let result = match cli.command {
        Commands::List { all, json } => commands::list(all, json),
        Commands::Snapshot => commands::snapshot(),
        Commands::Rollback {
            number,
            subvols,
            yes,
        } => commands::rollback(number, &subvols, yes),
        Commands::Revert { yes } => commands::revert(yes),
        Commands::Config {
            hourly,
            daily,
            weekly,
            monthly,
        } => commands::configure(hourly, daily, weekly, monthly),
        Commands::Purge { yes } => commands::purge(yes),
    };

    result.map_err(|e| {
        tracing::error!("{:#}", e);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn rollback_splits_subvolume_list() {
        let cli = Cli::try_parse_from([
            "bread",
            "rollback",
            "--snapshot",
            "3",
            "--subvols",
            "root,home",
            "--yes",
        ])
        .expect("parse");

        match cli.command {
            Commands::Rollback {
                number,
                subvols,
                yes,
            } => {
                assert_eq!(number, 3);
                assert_eq!(subvols, vec!["root".to_string(), "home".to_string()]);
                assert!(yes);
            }
            _ => panic!("expected rollback"),
        }
    }

    #[test]
    fn rollback_requires_a_session_number() {
        assert!(Cli::try_parse_from(["bread", "rollback"]).is_err());
    }

    #[test]
    fn log_level_is_global() {
        let cli = Cli::try_parse_from(["bread", "list", "--log-level", "debug"]).expect("parse");
        assert_eq!(cli.log_level, LoggingLevel::Debug);
    }
}
