//! services/rag/src/bin/rag.rs
//!
//! Console entrypoint: wires the Postgres and OpenAI adapters into an
//! `AppState` and drives the ingestion, chat, and quiz pipelines from stdin.

use async_openai::{config::OpenAIConfig, Client};
use rag_lib::{
    adapters::{DbAdapter, OpenAiEmbeddingAdapter, OpenAiGenerationAdapter, PgVectorIndex},
    state::AppState,
    Config, RagError,
};
use smartlearn_core::domain::QuizKind;
use sqlx::postgres::PgPoolOptions;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const HELP: &str = "\
Commands:
  ingest <path>                     Ingest a text file (pages separated by form feeds)
  ask <document-id> <question...>   Ask a question about an ingested document
  history <document-id>             Show the conversation log
  clear <document-id>               Reset the conversation log
  quiz <document-id> <mc|tf|short> <n>  Generate n quiz questions
  help
  quit";

#[tokio::main]
async fn main() -> Result<(), RagError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting RAG console...");

    // --- 2. Connect to Database & Run Migrations ---
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| RagError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let embedder = Arc::new(OpenAiEmbeddingAdapter::new(
        openai_client.clone(),
        config.embedding_model.clone(),
        config.embedding_dimension,
    ));
    let generator = Arc::new(OpenAiGenerationAdapter::new(
        openai_client,
        config.chat_model.clone(),
    ));
    let index = Arc::new(PgVectorIndex::new(db_pool));

    // --- 4. Build the Shared AppState ---
    let state = AppState {
        config: config.clone(),
        documents: db_adapter.clone(),
        conversations: db_adapter,
        embedder,
        index,
        generator,
    };

    run_console(state).await
}

async fn run_console(state: AppState) -> Result<(), RagError> {
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if matches!(tokens.as_slice(), ["quit"] | ["exit"]) {
            break;
        }
        // A failed command reports and keeps the console alive.
        if let Err(e) = dispatch(&state, &tokens).await {
            eprintln!("error: {e}");
        }
    }
    Ok(())
}

async fn dispatch(state: &AppState, tokens: &[&str]) -> Result<(), RagError> {
    match tokens {
        [] => Ok(()),
        ["help"] => {
            println!("{HELP}");
            Ok(())
        }
        ["ingest", path] => ingest(state, path).await,
        ["ask", id, question @ ..] if !question.is_empty() => {
            ask(state, parse_id(id)?, &question.join(" ")).await
        }
        ["history", id] => history(state, parse_id(id)?).await,
        ["clear", id] => {
            state.chat_service().clear(parse_id(id)?).await?;
            println!("Conversation cleared.");
            Ok(())
        }
        ["quiz", id, kind, n] => quiz(state, parse_id(id)?, kind, n).await,
        _ => {
            eprintln!("Unrecognized command. Type 'help' for usage.");
            Ok(())
        }
    }
}

async fn ingest(state: &AppState, path: &str) -> Result<(), RagError> {
    let text = tokio::fs::read_to_string(path).await?;
    let title = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string();
    // Pages arrive as form-feed-separated text, one page per segment.
    let pages: Vec<String> = text.split('\u{c}').map(str::to_string).collect();

    let document = state
        .ingestion_pipeline()?
        .ingest(Uuid::new_v4(), &title, pages, &CancellationToken::new())
        .await?;

    println!(
        "Ingested '{}' as document {} (namespace {})",
        document.title, document.id, document.index_namespace
    );
    Ok(())
}

async fn ask(state: &AppState, document_id: Uuid, question: &str) -> Result<(), RagError> {
    let outcome = state.chat_service().ask(document_id, question).await?;
    println!("{}", outcome.answer);
    for (i, citation) in outcome.citations.iter().enumerate() {
        println!(
            "  [{}] page {} (score {:.3})",
            i + 1,
            citation.page_number,
            citation.score
        );
    }
    Ok(())
}

async fn history(state: &AppState, document_id: Uuid) -> Result<(), RagError> {
    let messages = state.chat_service().history(document_id).await?;
    if messages.is_empty() {
        println!("No conversation yet.");
    }
    for message in messages {
        println!("{}: {}", message.role.as_str(), message.content);
    }
    Ok(())
}

async fn quiz(state: &AppState, document_id: Uuid, kind: &str, n: &str) -> Result<(), RagError> {
    let kind = match kind {
        "mc" => QuizKind::MultipleChoice,
        "tf" => QuizKind::TrueFalse,
        "short" => QuizKind::ShortAnswer,
        other => {
            return Err(RagError::Internal(format!(
                "Unknown quiz kind '{}'; expected mc, tf, or short",
                other
            )))
        }
    };
    let num_questions: usize = n
        .parse()
        .map_err(|_| RagError::Internal(format!("'{}' is not a question count", n)))?;

    let (questions, attempt) = state
        .quiz_generator()
        .generate(document_id, kind, num_questions)
        .await?;

    println!("Quiz attempt {}:", attempt.id);
    for (i, question) in questions.iter().enumerate() {
        println!("{}. {}", i + 1, question.question);
        if let Some(options) = &question.options {
            for option in options {
                println!("   - {}", option);
            }
        }
    }
    Ok(())
}

fn parse_id(raw: &str) -> Result<Uuid, RagError> {
    Uuid::parse_str(raw).map_err(|_| RagError::Internal(format!("'{}' is not a document id", raw)))
}
