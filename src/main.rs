//! Kestrel CLI binary entry point.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use futures::{pin_mut, StreamExt};
use kestrel::agent::{ChatSession, StreamEvent, Turn};
use kestrel::cli::{ChatArgs, Cli, Commands};
use kestrel::config::KestrelConfig;
use kestrel::provider::{create_content_generator, ContentGeneratorConfig};
use kestrel::tools::selection::{ALLOWED_CHROME_TOOLS, MUST_ALWAYS_TOOLS, OPTIONAL_ESSENTIAL_TOOLS};
use kestrel::types::{GenerateContentConfig, Part};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(args) => handle_chat(args).await,
        Commands::Tokens(args) => {
            println!("{}", args.report());
            Ok(())
        }
        Commands::Tools => {
            print_tool_lists();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_chat(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    kestrel::logging::init(args.verbose);

    let config = KestrelConfig::from_env();
    let mut settings = config.settings().clone();
    if let Some(max) = args.max_tools {
        settings.max_tools = Some(max);
    }
    if args.no_optional_tools {
        settings.optional_essentials_enabled = Some(false);
    }
    let config = config.with_settings(settings);

    let mut generator_config = ContentGeneratorConfig::resolve(&config, None);
    if let Some(model) = args.model {
        generator_config = generator_config.with_model(model);
    }
    let generator = create_content_generator(&generator_config)?;

    let request_config = GenerateContentConfig::builder()
        .maybe_system_instruction(args.system)
        .temperature(config.temperature())
        .max_output_tokens(config.max_output_tokens())
        .build();
    let chat = Arc::new(ChatSession::new(
        generator,
        generator_config.model.clone(),
        request_config,
    ));

    let signal = CancellationToken::new();
    let ctrl_c = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let prompt_id = uuid::Uuid::new_v4().to_string();
    let mut turn = Turn::new(chat, prompt_id);
    let events = turn.run(vec![Part::text(args.prompt)], signal);
    pin_mut!(events);

    while let Some(event) = events.next().await {
        match event? {
            StreamEvent::Content(text) => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            StreamEvent::Thought(thought) => {
                eprintln!("\n💭 {}: {}", thought.subject, thought.description);
            }
            StreamEvent::ToolCallRequest(request) => {
                let args = serde_json::Value::Object(request.args).to_string();
                eprintln!("\n⚡ {} ({}) {args}", request.name, request.call_id);
            }
            StreamEvent::UserCancelled => eprintln!("\n⏹ cancelled"),
            StreamEvent::Error(err) => eprintln!("\n❌ {}", err.message),
            _ => {}
        }
    }

    println!(); // newline after streaming
    Ok(())
}

fn print_tool_lists() {
    println!("must-always: {}", MUST_ALWAYS_TOOLS.join(", "));
    println!("chrome:      {}", ALLOWED_CHROME_TOOLS.join(", "));
    println!("optional:    {}", OPTIONAL_ESSENTIAL_TOOLS.join(", "));
}
