use scholar_core::provider::{ChatRequest, Message};
use scholar_core::{Config, OllamaProvider};

#[tokio::main]
async fn main() {
    println!("Welcome to Scholar!");

    let config = match Config::load("config.yaml") {
        Ok(c) => {
            println!("Config loaded");
            c
        }
        Err(e) => {
            eprintln!("Failed to load config ({}), using defaults\n", e);
            Config::default()
        }
    };
    println!("Model: {}", config.llm.model);
    println!("Base URL: {}", config.llm.base_url);

    let model = &config.llm.model;
    let provider = OllamaProvider::from_config(&config);

    println!("Testing chat with model: {}", model);
    let request = ChatRequest::new(model, vec![Message::user("Hi there!")]);

    match provider
        .chat_stream(
            request,
            Box::new(|chunk| {
                print!("{}", chunk.content());
                std::io::Write::flush(&mut std::io::stdout()).ok();
            }),
        )
        .await
    {
        Ok(_) => {
            println!("\n\nChat test successful!");
        }
        Err(e) => {
            eprintln!("\n\nChat test failed: {}", e);
            eprintln!("\nTroubleshooting:");
            eprintln!("  1. Is Ollama running? (ollama serve)");
            eprintln!("  2. Is the model pulled? (ollama pull {})", config.llm.model);
            eprintln!("  3. Is the base URL correct? ({})", config.llm.base_url);
        }
    }
}
