use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use scholar_core::config::Config;
use scholar_core::rag::{Catalog, CourseIndex, Embedder};
use scholar_core::{ChatManager, OllamaProvider, Provider, QueryResponse};
use scholar_tool::ToolRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scholar")]
#[command(about = "Ask questions about course materials", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Model management commands")]
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },

    #[command(about = "List the courses in the catalog")]
    Courses,

    #[command(about = "Ask a single question")]
    Ask {
        question: String,

        #[arg(short, long, help = "Show the tool calls made while answering")]
        verbose: bool,
    },

    #[command(about = "Start an interactive session")]
    Chat,
}

#[derive(Subcommand)]
enum ModelCommands {
    #[command(about = "Show current model")]
    Show,

    #[command(about = "Set the LLM model")]
    Set {
        #[arg(help = "Model name (e.g., 'qwen3:4b' or 'llama3.2:latest')")]
        model: String,
    },

    #[command(about = "List available models from Ollama")]
    List {
        #[arg(short, long, default_value = "http://localhost:11434")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scholar_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show => show_config(&cli.config),
        Commands::Model { command } => match command {
            ModelCommands::Show => show_model(&cli.config),
            ModelCommands::Set { model } => set_model(&cli.config, &model),
            ModelCommands::List { url } => list_models(&url).await,
        },
        Commands::Courses => list_courses(&cli.config),
        Commands::Ask { question, verbose } => ask(&cli.config, &question, verbose).await,
        Commands::Chat => chat(&cli.config).await,
    }
}

/// Loads the config file, or the defaults when it does not exist.
fn load_config(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        Config::load(config_path).context("Failed to load config")
    } else {
        Ok(Config::default())
    }
}

fn show_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:          {}", config.llm.model.cyan());
    println!("  Base URL:       {}", config.llm.base_url);
    println!("  Temperature:    {}", config.llm.temperature);
    println!("  Max Tokens:     {}", config.llm.max_tokens);
    println!();
    println!("{}", "RAG:".bold());
    println!("  Embedding Model: {}", config.rag.embedding_model.cyan());
    println!("  Max Results:     {}", config.rag.max_results);
    println!("  Catalog:         {}", config.rag.catalog_path);
    println!();
    println!("{}", "Engine:".bold());
    println!("  Max Rounds:      {}", config.engine.max_rounds);
    println!("  Context Limit:   {} chars", config.engine.max_context_chars);
    println!("  History:         {} exchanges", config.session.max_history);

    Ok(())
}

fn show_model(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}: {}", "Current model".bold(), config.llm.model.cyan());
    Ok(())
}

fn set_model(config_path: &Path, model: &str) -> Result<()> {
    let content = std::fs::read_to_string(config_path)
        .context("Failed to read config file")?;

    let mut config: serde_yaml::Value = serde_yaml::from_str(&content)
        .context("Failed to parse config")?;

    match config.get_mut("llm").and_then(|llm| llm.as_mapping_mut()) {
        Some(llm_map) => {
            llm_map.insert(
                serde_yaml::Value::String("model".to_string()),
                serde_yaml::Value::String(model.to_string()),
            );
        }
        None => anyhow::bail!("Config file has no 'llm' section"),
    }

    let updated_content = serde_yaml::to_string(&config)
        .context("Failed to serialize config")?;

    std::fs::write(config_path, updated_content)
        .context("Failed to write config file")?;

    println!(
        "{} Model updated to: {}",
        "✓".green().bold(),
        model.cyan()
    );

    Ok(())
}

async fn list_models(base_url: &str) -> Result<()> {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct OllamaModel {
        name: String,
        size: u64,
    }

    #[derive(Deserialize)]
    struct OllamaResponse {
        models: Vec<OllamaModel>,
    }

    let url = format!("{}/api/tags", base_url);

    println!("{} Fetching models from {}...", "→".blue(), base_url);
    println!();

    let response = reqwest::get(&url)
        .await
        .context("Failed to connect to Ollama. Is it running?")?;

    if !response.status().is_success() {
        anyhow::bail!("Ollama returned error: {}", response.status());
    }

    let data: OllamaResponse = response
        .json()
        .await
        .context("Failed to parse Ollama response")?;

    if data.models.is_empty() {
        println!("{}", "No models found. Pull a model with 'ollama pull <model>'".yellow());
        return Ok(());
    }

    println!("{}", "Available models:".bold().green());
    println!();

    for model in data.models {
        let size_gb = model.size as f64 / (1024.0 * 1024.0 * 1024.0);
        println!(
            "  {} {} ({:.2} GB)",
            "•".cyan(),
            model.name.bold(),
            size_gb
        );
    }

    println!();
    println!("Use {} to set a model", "scholar -c config.yaml model set <model>".bold());

    Ok(())
}

fn list_courses(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let catalog = Catalog::load(&config.rag.catalog_path)
        .with_context(|| format!("Failed to load catalog from {}", config.rag.catalog_path))?;

    println!(
        "{} ({} courses, {} chunks)",
        "Courses:".bold().green(),
        catalog.courses.len(),
        catalog.chunk_count()
    );
    println!();
    for course in &catalog.courses {
        println!("  {} {}", "•".cyan(), course.title.bold());
        if let Some(instructor) = &course.instructor {
            println!("      Instructor: {}", instructor);
        }
        println!("      Lessons:    {}", course.lessons.len());
    }

    Ok(())
}

/// Loads the catalog into a fresh index and wires the course tools to it.
async fn build_manager(config_path: &Path) -> Result<ChatManager> {
    let config = load_config(config_path)?;
    let provider: Arc<dyn Provider> = Arc::new(OllamaProvider::from_config(&config));

    let catalog = Catalog::load(&config.rag.catalog_path)
        .with_context(|| format!("Failed to load catalog from {}", config.rag.catalog_path))?;
    let embedder = Embedder::new(Arc::clone(&provider), config.rag.embedding_model.clone());
    let index = Arc::new(CourseIndex::new(embedder, config.rag.max_results));

    println!("{} Indexing {} courses...", "→".blue(), catalog.courses.len());
    let chunks = index
        .load_catalog(&catalog)
        .await
        .context("Failed to index course catalog")?;
    println!("{} Indexed {} chunks", "✓".green().bold(), chunks);
    println!();

    let mut registry = ToolRegistry::new();
    scholar_std::register_course_tools(&mut registry, index)?;

    Ok(ChatManager::new(config, registry).with_provider(provider))
}

fn print_response(response: &QueryResponse, verbose: bool) {
    if response.is_partial() {
        println!("{}", "(partial answer)".yellow());
    }
    println!("{}", response.answer);

    if !response.sources.is_empty() {
        println!();
        println!("{}", "Sources:".bold());
        for source in &response.sources {
            match &source.link {
                Some(link) => println!("  {} {} ({})", "•".cyan(), source, link.dimmed()),
                None => println!("  {} {}", "•".cyan(), source),
            }
        }
    }

    if verbose && !response.tool_calls.is_empty() {
        println!();
        println!("{}", "Tool calls:".bold());
        println!("{}", response.call_summary().dimmed());
    }
}

async fn ask(config_path: &Path, question: &str, verbose: bool) -> Result<()> {
    let manager = build_manager(config_path).await?;

    match manager.query(None, question).await {
        Ok(response) => print_response(&response, verbose),
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e.user_message());
            return Err(e.into());
        }
    }
    Ok(())
}

async fn chat(config_path: &Path) -> Result<()> {
    let manager = build_manager(config_path).await?;
    let session = manager.create_session().await;

    println!("{}", "Ask about the courses. Type 'clear' to forget the conversation, 'exit' to quit.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        match question {
            "" => continue,
            "exit" | "quit" => break,
            "clear" => {
                manager.sessions().clear(&session).await;
                println!("{}", "Conversation cleared".dimmed());
                continue;
            }
            _ => {}
        }

        match manager.query(Some(&session), question).await {
            Ok(response) => print_response(&response, false),
            Err(e) => println!("{} {}", "✗".red().bold(), e.user_message()),
        }
    }

    Ok(())
}
