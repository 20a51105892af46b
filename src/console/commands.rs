use std::path::Path;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::console::display::{
    display_classification, display_evaluation, display_history_table, display_matrices_table,
    display_model_info, display_models_table,
};
use crate::coordinator::CoordinatorHandle;
use crate::error::Result;
use crate::evaluation::count_samples;

/// Shared state for command handlers.
pub struct ConsoleContext<'a> {
    pub handle: &'a CoordinatorHandle,
    pub class_names: &'a [String],
}

pub async fn handle_list_models(context: &ConsoleContext<'_>) -> Result<()> {
    let listing = context.handle.models().await?;
    display_models_table(&listing);
    Ok(())
}

pub async fn handle_import(context: &ConsoleContext<'_>, path: &Path) -> Result<()> {
    let name = context.handle.import(path).await?;
    println!("{}", format!("Imported model {}", name).green());
    Ok(())
}

pub async fn handle_use(context: &ConsoleContext<'_>, name: &str) -> Result<()> {
    context.handle.select(name).await?;
    println!("{}", format!("Using model {}", name).green());
    Ok(())
}

pub async fn handle_remove(context: &ConsoleContext<'_>, name: &str) -> Result<()> {
    context.handle.remove(name).await?;
    println!("{}", format!("Removed model {} from the registry", name).green());
    Ok(())
}

pub async fn handle_prune(context: &ConsoleContext<'_>) -> Result<()> {
    let pruned = context.handle.prune().await?;
    if pruned.is_empty() {
        println!("{}", "No orphaned models".green());
    } else {
        println!("{}", format!("Pruned: {}", pruned.join(", ")).yellow());
    }
    Ok(())
}

pub async fn handle_info(context: &ConsoleContext<'_>, name: &str) -> Result<()> {
    let record = context.handle.info(name).await?;
    display_model_info(&record);
    Ok(())
}

pub async fn handle_classify(context: &ConsoleContext<'_>, image: &Path) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Classifying {}...", image.display()));

    let result = context.handle.classify(image).await;
    spinner.finish_and_clear();

    display_classification(&result?, context.class_names);
    Ok(())
}

/// Runs an evaluation while a progress bar follows the scored samples.
/// Counts dataset samples on the blocking pool; the walk touches every
/// class folder.
async fn sample_total(dataset: &Path, class_names: &[String]) -> Result<u64> {
    let dataset = dataset.to_path_buf();
    let class_names = class_names.to_vec();
    let total = tokio::task::spawn_blocking(move || count_samples(&dataset, &class_names))
        .await
        .map_err(std::io::Error::from)?;
    Ok(total as u64)
}

pub async fn handle_evaluate(context: &ConsoleContext<'_>, dataset: &Path) -> Result<()> {
    let total = sample_total(dataset, context.class_names).await?;
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_prefix("Evaluating");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let evaluation = context.handle.evaluate(dataset, Some(tx));
    tokio::pin!(evaluation);

    let result = loop {
        tokio::select! {
            Some(scored) = rx.recv() => {
                bar.set_position(scored.processed as u64);
            }
            result = &mut evaluation => break result,
        }
    };
    bar.finish_and_clear();

    display_evaluation(&result?);
    Ok(())
}

pub async fn handle_history(context: &ConsoleContext<'_>) -> Result<()> {
    let entries = context.handle.history().await?;
    display_history_table(&entries);
    Ok(())
}

pub async fn handle_matrices(context: &ConsoleContext<'_>) -> Result<()> {
    let entries = context.handle.matrices().await?;
    display_matrices_table(&entries);
    Ok(())
}

pub async fn handle_clear_history(context: &ConsoleContext<'_>) -> Result<()> {
    context.handle.clear_history().await?;
    println!("{}", "Classification history cleared".green());
    Ok(())
}

pub async fn handle_clear_matrices(context: &ConsoleContext<'_>) -> Result<()> {
    context.handle.clear_matrices().await?;
    println!("{}", "Confusion matrix history cleared".green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn sample_total_counts_images_per_class() {
        let tmp = tempfile::tempdir().unwrap();
        for (class, file) in [("A", "1.png"), ("A", "2.jpg"), ("A", "notes.txt"), ("B", "3.jpeg")] {
            let dir = tmp.path().join(class);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(file), b"x").unwrap();
        }
        let class_names = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        assert_eq!(sample_total(tmp.path(), &class_names).await.unwrap(), 3);
    }
}
