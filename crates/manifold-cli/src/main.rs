//! CLI binary for routing text-generation requests across providers.

use clap::{Parser, Subcommand};

use manifold_llm::{infer_provider, LoggingMiddleware, UnifiedClient};
use manifold_types::{models, GenerationRequest, Message, Provider};

#[derive(Parser)]
#[command(
    name = "manifold",
    version,
    about = "Unified text generation across OpenAI, Anthropic, and Gemini"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt to a model and print the generated text
    Generate {
        /// Prompt text
        prompt: String,

        /// Model identifier (e.g. gpt-4o, claude-3-haiku, gemini-2.0-flash)
        #[arg(short, long, default_value = models::GPT_4O)]
        model: String,

        /// Optional system instruction prepended to the conversation
        #[arg(short, long)]
        system: Option<String>,

        /// Force the model to a provider (openai|anthropic|gemini),
        /// bypassing name-pattern classification
        #[arg(long, value_parser = parse_provider)]
        provider: Option<Provider>,
    },

    /// Show which provider a model identifier resolves to
    Resolve {
        /// Model identifier
        model: String,
    },

    /// List the pre-registered model identifiers per provider
    Models,
}

fn parse_provider(s: &str) -> Result<Provider, String> {
    match s {
        "openai" => Ok(Provider::OpenAi),
        "anthropic" => Ok(Provider::Anthropic),
        "gemini" => Ok(Provider::Gemini),
        other => Err(format!(
            "unknown provider '{other}' (expected openai, anthropic, or gemini)"
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Generate {
            prompt,
            model,
            system,
            provider,
        } => {
            cmd_generate(&prompt, &model, system.as_deref(), provider).await?;
        }
        Commands::Resolve { model } => {
            cmd_resolve(&model);
        }
        Commands::Models => {
            cmd_models();
        }
    }

    Ok(())
}

async fn cmd_generate(
    prompt: &str,
    model: &str,
    system: Option<&str>,
    provider: Option<Provider>,
) -> anyhow::Result<()> {
    let client = UnifiedClient::from_env()?.with_middleware(LoggingMiddleware);

    if let Some(provider) = provider {
        client.register_custom_model(model, provider);
    }

    let request = match system {
        Some(system) => GenerationRequest::from_messages(
            model,
            vec![Message::system(system), Message::user(prompt)],
        ),
        None => GenerationRequest::from_prompt(model, prompt),
    };

    let generation = client.generate(&request).await?;

    println!("{}", generation.text);
    println!("\nTokens used: {}", generation.tokens_used);

    Ok(())
}

fn cmd_resolve(model: &str) {
    match infer_provider(model) {
        Some(provider) => println!("{model} -> {provider}"),
        None => println!("{model} -> unknown (register an override to route it)"),
    }
}

fn cmd_models() {
    println!("openai:");
    for model in [
        models::GPT_4O,
        models::GPT_4,
        models::GPT_35_TURBO,
        models::O3_MINI,
        models::O4_MINI,
        models::GPT_41_NANO,
        models::O3,
    ] {
        println!("  {model}");
    }

    println!("anthropic:");
    for model in [
        models::CLAUDE_3_OPUS,
        models::CLAUDE_37_SONNET,
        models::CLAUDE_3_HAIKU,
    ] {
        println!("  {model}");
    }

    println!("gemini:");
    for model in [
        models::GEMINI_20_FLASH,
        models::GEMINI_20_PRO,
        models::GEMINI_25_FLASH_PREVIEW,
        models::GEMINI_25_PRO_PREVIEW,
        models::GEMINI_25_PRO,
    ] {
        println!("  {model}");
    }
}
