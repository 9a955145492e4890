use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sheets_ai::analytics::Analytics;
use sheets_ai::api::ReqwestTransport;
use sheets_ai::config::AppConfig;
use sheets_ai::llm::{OpenAiProvider, ProviderFactory, SharedProvider};
use sheets_ai::sheets::{GptOptions, SheetFunctions};
use sheets_ai::storage::{
    FileCache, FilePropertyStore, HierarchicalStorage, LlmUsageService, SecretService,
};
use sheets_ai::utils::logging::init_logging;
use sheets_ai::utils::AppError;

#[derive(Debug, Parser)]
#[command(name = "sheets-ai", version, about = "Spreadsheet GPT functions from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Evaluate =GPT(prompt) and print the cell value
    Gpt {
        prompt: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        max_tokens: Option<u32>,
    },
    /// Store your OpenAI API key
    SetKey { key: String },
    /// Remove the stored OpenAI API key
    ClearKey,
    /// Print accumulated token usage for a model
    Usage {
        #[arg(long)]
        model: Option<String>,
    },
    /// List available chat models
    Models,
    /// Opt out of (true) or back into (false) analytics
    OptOut {
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
    /// Send queued analytics events now
    Flush,
    /// Delete every stored setting
    Reset,
}

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Environment
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    // 2. Logging
    let _guard = init_logging(&config.log_dir);

    // 3. Wiring
    let functions = build_functions(&config);

    // 4. Run
    match run(cli.command, &functions).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let e = e.logged();
            eprintln!("Error: {}", e.message());
            ExitCode::FAILURE
        }
    }
}

fn build_functions(config: &AppConfig) -> SheetFunctions {
    let transport = ReqwestTransport::shared();
    let properties = Arc::new(FilePropertyStore::new(
        config.data_dir.join("user_properties.json"),
    ));
    let cache = Arc::new(FileCache::new(config.data_dir.join("user_cache.json")));

    let analytics = Analytics::new(
        config.analytics.clone(),
        cache.clone(),
        properties.clone(),
        transport.clone(),
    );

    let openai = config.openai.clone();
    let providers: ProviderFactory = Arc::new(move |key: &str| -> SharedProvider {
        Arc::new(
            OpenAiProvider::new(
                key,
                openai.base_url.clone(),
                openai.default_model.clone(),
                transport.clone(),
            )
            .with_max_retries(openai.max_retries),
        )
    });

    SheetFunctions::new(
        SecretService::new(properties.clone()),
        LlmUsageService::new(HierarchicalStorage::new(properties)),
        cache,
        analytics,
        providers,
        config.openai.default_model.clone(),
    )
    .with_fallback_key(config.openai.api_key.clone())
}

async fn run(command: Command, functions: &SheetFunctions) -> Result<(), AppError> {
    match command {
        Command::Gpt {
            prompt,
            model,
            max_tokens,
        } => {
            let text = functions
                .gpt(&prompt, GptOptions { model, max_tokens })
                .await;
            println!("{}", text);
        }
        Command::SetKey { key } => {
            functions.set_api_key(&key).await?;
            println!("API key saved");
        }
        Command::ClearKey => {
            functions.clear_api_key()?;
            println!("API key removed");
        }
        Command::Usage { model } => {
            let usage = functions.usage(model.as_deref());
            println!("{}", serde_json::to_string_pretty(&usage)?);
        }
        Command::Models => {
            for model in functions.list_models().await {
                println!("{}", model);
            }
        }
        Command::OptOut { value } => {
            functions.analytics().set_opt_out(value).await;
            println!("analytics opt-out: {}", value);
        }
        Command::Flush => {
            let outcome = functions.analytics().flush_queue().await;
            println!("{:?}", outcome);
        }
        Command::Reset => {
            functions.reset_all_settings()?;
            println!("All settings removed");
        }
    }
    Ok(())
}
