pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tripdesk_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "tripdesk",
    about = "Tripdesk operator CLI",
    long_about = "Operate the tripdesk booking assistant: migrations, demo inventory, config inspection, and one-shot chat turns.",
    after_help = "Examples:\n  tripdesk migrate\n  tripdesk seed\n  tripdesk config\n  tripdesk chat --user psid-42 \"any trips to Paris next week?\""
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file to load instead of tripdesk.toml")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo trip catalogue into an empty inventory")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Run one conversation turn against the configured oracle and print the reply")]
    Chat {
        #[arg(long, help = "Channel identity of the customer the turn belongs to")]
        user: String,
        #[arg(required = true, num_args = 1.., help = "Inbound message text")]
        text: Vec<String>,
    },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            ..LoadOptions::default()
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(options),
        Command::Seed => commands::seed::run(options),
        Command::Config => commands::config::run(options),
        Command::Chat { user, text } => commands::chat::run(options, &user, &text.join(" ")),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn chat_joins_free_text_and_requires_a_user() {
        let cli = Cli::parse_from(["tripdesk", "chat", "--user", "psid-1", "trips", "to", "Paris?"]);

        match cli.command {
            Command::Chat { user, text } => {
                assert_eq!(user, "psid-1");
                assert_eq!(text.join(" "), "trips to Paris?");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["tripdesk", "chat", "hello"]).is_err());
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let cli = Cli::parse_from(["tripdesk", "--config", "ops/tripdesk.toml", "migrate"]);
        let options = cli.load_options();

        assert!(options.require_file);
        assert_eq!(options.config_path.as_deref(), Some(std::path::Path::new("ops/tripdesk.toml")));
    }
}
