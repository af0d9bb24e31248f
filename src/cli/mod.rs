//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments and runs the selected command.

pub mod card;
pub mod chat;
pub mod config;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::config::Config;
use crate::logging;
use crate::utils::url::is_http_url;

#[derive(Parser)]
#[command(name = "cardchat")]
#[command(about = "A terminal chat client where the model can answer with interactive cards")]
#[command(
    long_about = "cardchat streams replies from an OpenAI-compatible API. When the model answers \
with an Adaptive Card, the card is rendered as a numbered outline and its buttons can be \
activated from the prompt. Card actions are handled in-process, or by a remote endpoint \
started with 'cardchat serve'.\n\n\
Environment Variables:\n\
  OPENAI_API_KEY    API key (the variable name can be changed with api_key_env)\n\
  OPENAI_BASE_URL   Custom API base URL (defaults to https://api.openai.com/v1)\n\
  CARDCHAT_MODEL    Model override\n\
  CARDCHAT_LOG      Diagnostic log filter (falls back to RUST_LOG)\n\n\
Commands inside the chat:\n\
  /N                Activate control N of the most recent card\n\
  /cards            List the built-in card templates\n\
  /card NAME [k=v]  Render a built-in template locally\n\
  /help             Show this list\n\
  /quit             Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use for chat
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Append the conversation transcript to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Send card actions to this server instead of handling them in-process
    #[arg(long, global = true, value_name = "URL")]
    pub action_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat,
    /// Serve the card action endpoint over HTTP
    Serve {
        /// Address to listen on, overriding server.bind_addr
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
    /// Print a built-in card template with variables substituted
    Card {
        /// Template name (see `cardchat card --list`)
        #[arg(required_unless_present = "list")]
        name: Option<String>,
        /// Variables as key=value pairs
        variables: Vec<String>,
        /// List the template names instead
        #[arg(long)]
        list: bool,
    },
    /// Read an assistant reply from stdin and print the card it carries
    Extract,
    /// Show the effective configuration, or write a default config file
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a config file with every key set to its default
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Layers command-line flags over the loaded configuration.
pub(crate) fn apply_flags(mut config: Config, args: &Args) -> Result<Config, Box<dyn Error>> {
    if let Some(model) = args.model.as_deref().filter(|m| !m.trim().is_empty()) {
        config.model = Some(model.to_string());
    }
    if let Some(url) = args.action_url.as_deref() {
        if !is_http_url(url) {
            return Err(format!("--action-url must be an http(s) URL, got '{url}'").into());
        }
        config.action_url = Some(url.to_string());
    }
    Ok(config)
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command {
        None | Some(Commands::Chat) => {
            logging::init("warn");
            let config = apply_flags(Config::load()?, &args)?;
            // The chat loop is single threaded; every suspension point is an
            // await on stdin, the model stream, or an action round-trip.
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(chat::run_chat(config, args.log.clone()))
        }
        Some(Commands::Serve { ref bind }) => {
            logging::init("cardchat=info");
            let mut config = Config::load()?;
            if let Some(bind) = bind {
                config.server.bind_addr = Some(bind.clone());
            }
            let addr = config
                .bind_addr()
                .map_err(|err| format!("invalid bind address: {err}"))?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(crate::server::serve(addr, config.allow_framing()))?;
            Ok(())
        }
        Some(Commands::Card {
            ref name,
            ref variables,
            list,
        }) => {
            logging::init("warn");
            if list {
                card::list_templates();
                return Ok(());
            }
            let name = name.as_deref().unwrap_or_default();
            if let Err(e) = card::print_template(name, variables) {
                eprintln!("❌ {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Extract) => {
            logging::init("warn");
            if !card::extract_from_stdin()? {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Config { ref action }) => {
            logging::init("warn");
            match action {
                None => config::show(),
                Some(ConfigAction::Init { force }) => config::init(*force),
            }
        }
    }
}
