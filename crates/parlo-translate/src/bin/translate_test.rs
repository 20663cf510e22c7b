//! Test binary for translation.
//!
//! Usage: translate-test <api_key> <source_lang> <target_lang> <text...>

use std::env;
use std::time::Instant;

use parlo_translate::{GeminiClient, GeminiConfig, TranslateInput, Translator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 5 {
        eprintln!("Usage: {} <api_key> <source_lang> <target_lang> <text...>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} AIza... en es \"good morning\"", args[0]);
        std::process::exit(1);
    }

    let api_key = &args[1];
    let source = &args[2];
    let target = &args[3];
    let text = args[4..].join(" ");

    let config = GeminiConfig::new(api_key, source, target);
    println!("Using model: {}", config.model());

    let client = GeminiClient::new(config);

    println!("Sending translation request...");
    let start = Instant::now();

    let translated = client.translate(TranslateInput::Text(text)).await?;
    let elapsed = start.elapsed();

    println!();
    println!("Translation completed in {:.2}s", elapsed.as_secs_f64());
    println!("---");
    println!("{}", translated);
    println!("---");

    Ok(())
}
