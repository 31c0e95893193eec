//! `confab chat` talks to the assistant, one-shot or interactive.

use std::io::Write;
use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use tracing::warn;

use confab_chat::{ChatEngine, ContextStore};
use confab_config::AppConfig;
use confab_core::{HistoryStore, Provider, SessionId};
use confab_history::SqliteHistory;
use confab_providers::OpenAiProvider;

pub async fn run(
    message: Option<String>,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for the API key early and give a clear error.
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    CONFAB_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!(
            "    {}",
            AppConfig::config_dir().join("config.toml").display()
        );
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider: Arc<dyn Provider> = Arc::new(OpenAiProvider::from_config(&config.provider));
    let store = Arc::new(ContextStore::new());
    let history: Arc<dyn HistoryStore> =
        Arc::new(SqliteHistory::new(&config.history.database_path).await?);

    let engine = ChatEngine::new(
        provider,
        store.clone(),
        &config.provider.model,
        config.provider.temperature,
    )
    .with_max_tokens(config.provider.max_tokens)
    .with_max_context_messages(config.context.max_messages);

    // A terminal run gets its own session unless the user names one.
    let session = session
        .map(|s| SessionId::from(&s))
        .unwrap_or_else(SessionId::new);

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let response = engine.generate(&msg, &session).await?;
        eprint!("\r              \r");
        println!("{response}");

        if let Err(e) = history.record(session.as_str(), &msg, &response).await {
            warn!(error = %e, "History write failed");
        }
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Confab interactive chat");
    println!();
    println!("  Model:     {}", config.provider.model);
    println!("  Session:   {session}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type '/clear' to reset the conversation, 'exit' to quit.");
    println!();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break; // EOF
        };
        let input = line.trim();

        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }
        if input == "/clear" {
            store.clear(&session).await;
            println!("  Conversation cleared.");
            println!();
            continue;
        }

        eprint!("  ...");
        match engine.generate(input, &session).await {
            Ok(response) => {
                eprint!("\r     \r");
                println!();
                for line in response.lines() {
                    println!("  Assistant > {line}");
                }
                println!();

                if let Err(e) = history.record(session.as_str(), input, &response).await {
                    warn!(error = %e, "History write failed");
                }
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
