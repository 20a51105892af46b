use std::io::Write;
use std::path::Path;

use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;

use super::commands::{
    handle_classify, handle_clear_history, handle_clear_matrices, handle_evaluate, handle_history, handle_import,
    handle_info, handle_list_models, handle_matrices, handle_prune, handle_remove, handle_use, ConsoleContext,
};
use crate::coordinator::CoordinatorHandle;
use crate::error::Result;

const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", "bye"];

fn print_help() {
    println!("\n{}", "CXAI Commands".cyan());
    println!("{}", "=".repeat(60).bright_cyan());
    let rows = [
        ("exit, quit, bye", "Leave the console"),
        ("help", "Show this help message"),
        ("clear", "Clear the screen"),
        ("models", "List registered models"),
        ("import <path>", "Copy a model file into the models directory"),
        ("use <name>", "Select the model used for classification"),
        ("remove <name>", "Unregister a model (the file is kept)"),
        ("prune", "Unregister models whose files are missing"),
        ("info <name>", "Show details of a registered model"),
        ("classify <image>", "Classify a JPG or PNG chest X-ray"),
        ("evaluate <dir>", "Evaluate the current model on <dir>/<class>/*"),
        ("history", "Show recent classifications"),
        ("matrices", "Show recent evaluations"),
        ("clear-history", "Delete the classification history"),
        ("clear-matrices", "Delete the confusion matrix history"),
    ];
    for (command, description) in rows {
        println!("{:<18} - {}", command.green(), description);
    }
    println!();
}

fn usage(text: &str) -> Result<()> {
    println!("{} {}", "Usage:".yellow(), text);
    Ok(())
}

/// Interactive loop; returns when the user exits or input ends.
pub async fn console_loop(handle: &CoordinatorHandle, class_names: &[String]) -> rustyline::Result<()> {
    println!("Starting cxai console");
    print_help();

    let context = ConsoleContext { handle, class_names };
    let mut rl = DefaultEditor::new()?;

    loop {
        let prompt = match handle.models().await {
            Ok(listing) => match listing.current {
                Some(name) => format!("[{}] > ", name),
                None => "> ".to_string(),
            },
            Err(_) => "> ".to_string(),
        };

        let input = match rl.readline(&prompt) {
            Ok(input) => input,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => {
                debug!("Readline ended: {}", e);
                println!("Goodbye!");
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(input);

        let (command, argument) = match input.split_once(char::is_whitespace) {
            Some((command, rest)) => (command.to_lowercase(), rest.trim()),
            None => (input.to_lowercase(), ""),
        };

        if EXIT_COMMANDS.contains(&command.as_str()) {
            println!("Goodbye!");
            break;
        }

        let result = match (command.as_str(), argument) {
            ("help", _) => {
                print_help();
                Ok(())
            }
            ("clear", _) => {
                print!("\x1B[2J\x1B[1;1H");
                let _ = std::io::stdout().flush();
                Ok(())
            }
            ("models", _) => handle_list_models(&context).await,
            ("prune", _) => handle_prune(&context).await,
            ("history", _) => handle_history(&context).await,
            ("matrices", _) => handle_matrices(&context).await,
            ("clear-history", _) => handle_clear_history(&context).await,
            ("clear-matrices", _) => handle_clear_matrices(&context).await,
            ("import", "") => usage("import <path>"),
            ("import", path) => handle_import(&context, Path::new(path)).await,
            ("use", "") => usage("use <name>"),
            ("use", name) => handle_use(&context, name).await,
            ("remove", "") => usage("remove <name>"),
            ("remove", name) => handle_remove(&context, name).await,
            ("info", "") => usage("info <name>"),
            ("info", name) => handle_info(&context, name).await,
            ("classify", "") => usage("classify <image>"),
            ("classify", image) => handle_classify(&context, Path::new(image)).await,
            ("evaluate", "") => usage("evaluate <dir>"),
            ("evaluate", dir) => handle_evaluate(&context, Path::new(dir)).await,
            (other, _) => {
                println!("{} {} (type 'help')", "Unknown command:".yellow(), other);
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("{} {}", "Error:".red().bold(), e);
        }
    }
    Ok(())
}
