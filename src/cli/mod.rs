//! CLI entry point for Kestrel.

use clap::{Parser, Subcommand};

use crate::models::{token_limit, DEFAULT_PRIMARY_MODEL};
use crate::util::tokens::estimate_tokens;

/// Kestrel streaming agent CLI
#[derive(Parser, Debug)]
#[command(name = "kestrel", version, about = "Kestrel streaming agent loop CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream one turn from the configured model
    Chat(ChatArgs),
    /// Print the token estimate for a text
    Tokens(TokensArgs),
    /// List the tool selection policy's fixed tool lists
    Tools,
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Model id (defaults to the settings file, then x-ai/grok-code-fast-1)
    #[arg(short, long)]
    pub model: Option<String>,

    /// System instruction
    #[arg(short, long)]
    pub system: Option<String>,

    /// Maximum number of tools sent upstream
    #[arg(long)]
    pub max_tools: Option<usize>,

    /// Do not prioritize the optional essential tools
    #[arg(long)]
    pub no_optional_tools: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// User prompt
    pub prompt: String,
}

/// Arguments for the `tokens` subcommand.
#[derive(Parser, Debug)]
pub struct TokensArgs {
    /// Model whose context window the estimate is compared against
    #[arg(short, long, default_value = DEFAULT_PRIMARY_MODEL)]
    pub model: String,

    /// Text to estimate
    pub text: String,
}

impl TokensArgs {
    /// One-line report of the estimate against the model's context window.
    pub fn report(&self) -> String {
        let tokens = estimate_tokens(&self.text);
        let limit = token_limit(&self.model);
        let share = f64::from(tokens) / f64::from(limit) * 100.0;
        format!(
            "{tokens} tokens ({share:.4}% of the {limit}-token window of {})",
            self.model
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat_with_defaults() {
        let cli = Cli::try_parse_from(["kestrel", "chat", "hello"]).unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert!(args.model.is_none());
                assert!(args.system.is_none());
                assert!(args.max_tools.is_none());
                assert!(!args.no_optional_tools);
                assert_eq!(args.verbose, 0);
                assert_eq!(args.prompt, "hello");
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn parse_chat_with_all_options() {
        let cli = Cli::try_parse_from([
            "kestrel",
            "chat",
            "-m",
            "x-ai/grok-4",
            "-s",
            "Be terse",
            "--max-tools",
            "12",
            "--no-optional-tools",
            "-vv",
            "list the repo",
        ])
        .unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.model.as_deref(), Some("x-ai/grok-4"));
                assert_eq!(args.system.as_deref(), Some("Be terse"));
                assert_eq!(args.max_tools, Some(12));
                assert!(args.no_optional_tools);
                assert_eq!(args.verbose, 2);
                assert_eq!(args.prompt, "list the repo");
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn parse_tokens() {
        let cli = Cli::try_parse_from(["kestrel", "tokens", "hello world"]).unwrap();
        match cli.command {
            Commands::Tokens(args) => {
                assert_eq!(args.text, "hello world");
                assert_eq!(args.model, DEFAULT_PRIMARY_MODEL);
            }
            other => panic!("expected Tokens, got {other:?}"),
        }
    }

    #[test]
    fn tokens_report_uses_model_window() {
        let cli = Cli::try_parse_from(["kestrel", "tokens", "-m", "grok-pro", "hello world"]).unwrap();
        let Commands::Tokens(args) = cli.command else {
            panic!("expected Tokens");
        };
        let report = args.report();
        assert!(report.starts_with("3 tokens"), "{report}");
        assert!(report.contains("2097152-token window of grok-pro"), "{report}");
    }

    #[test]
    fn parse_tools() {
        let cli = Cli::try_parse_from(["kestrel", "tools"]).unwrap();
        assert!(matches!(cli.command, Commands::Tools));
    }

    #[test]
    fn chat_requires_prompt() {
        assert!(Cli::try_parse_from(["kestrel", "chat"]).is_err());
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["kestrel"]).is_err());
    }
}
