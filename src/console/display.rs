use chrono::NaiveDateTime;
use colored::*;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::coordinator::{Classification, EvaluationReport, Listed, ModelListing};
use crate::history::{ArtifactStatus, ClassificationRecord, EvaluationRecord, TIMESTAMP_FORMAT};
use crate::inference::ModelRecord;

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|title| Cell::new(title).fg(Color::Cyan).add_attribute(Attribute::Bold))
        .collect()
}

fn new_table(titles: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(header(titles))
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn format_time(time: &NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// First twelve characters of a digest, for table columns.
fn short_hash(hash: &str) -> String {
    hash.chars().take(12).collect()
}

fn artifact_cell(status: &ArtifactStatus) -> Cell {
    match status {
        ArtifactStatus::Available(path) => Cell::new(path.display()).fg(Color::DarkGrey),
        ArtifactStatus::Unavailable => Cell::new("unavailable").fg(Color::Red),
    }
}

/// Displays registered models with their selection and cache state.
pub fn display_models_table(listing: &ModelListing) {
    if listing.records.is_empty() {
        println!("{}", "No models found in registry".yellow());
        return;
    }

    let mut table = new_table(&["#", "Name", "Hash", "Registered", "Last Used", "Uses", "State"]);
    for (i, record) in listing.records.iter().enumerate() {
        let current = listing.current.as_deref() == Some(record.name.as_str());
        let state = match (current, listing.resident.contains(&record.name)) {
            (true, true) => "current, loaded",
            (true, false) => "current",
            (false, true) => "loaded",
            (false, false) => "",
        };
        let name = if current {
            Cell::new(&record.name).fg(Color::Green).add_attribute(Attribute::Bold)
        } else {
            Cell::new(&record.name).fg(Color::Green)
        };
        table.add_row(vec![
            Cell::new(i + 1).set_alignment(CellAlignment::Center),
            name,
            Cell::new(short_hash(&record.hash)).fg(Color::Magenta),
            Cell::new(format_time(&record.registered_at)).fg(Color::DarkGrey),
            Cell::new(record.last_used.as_ref().map(format_time).unwrap_or_else(|| "never".into()))
                .fg(Color::DarkGrey),
            Cell::new(record.use_count).set_alignment(CellAlignment::Right),
            Cell::new(state).fg(Color::Yellow),
        ]);
    }

    println!("\n{}", table);
    println!("{}", format!("Total models: {}", listing.records.len()).bright_green());
}

pub fn display_model_info(record: &ModelRecord) {
    println!("\n{}", record.name.bright_cyan().bold());
    println!("  {:<14} {}", "Path:".bold(), record.path.display());
    println!("  {:<14} {}", "SHA-256:".bold(), record.hash);
    println!("  {:<14} {}", "Registered:".bold(), format_time(&record.registered_at));
    println!(
        "  {:<14} {}",
        "Last used:".bold(),
        record.last_used.as_ref().map(format_time).unwrap_or_else(|| "never".into())
    );
    println!("  {:<14} {}", "Use count:".bold(), record.use_count);
}

pub fn display_classification(result: &Classification, class_names: &[String]) {
    println!("\n{} {}", "Prediction:".bold(), result.label.bright_green().bold());
    for (i, (name, p)) in class_names.iter().zip(&result.probabilities).enumerate() {
        let line = format!("  {:<22} {:>6.2}%", name, p * 100.0);
        if i == result.class_index {
            println!("{}", line.green());
        } else {
            println!("{}", line);
        }
    }
    println!("{}", format!("Saved to {}", result.artifact.display()).bright_black());
}

pub fn display_evaluation(report: &EvaluationReport) {
    println!("\n{}", report.result);
    if report.result.skipped > 0 {
        println!("{}", format!("{} image(s) could not be decoded and were skipped", report.result.skipped).yellow());
    }

    let names = &report.result.class_names;
    let mut titles: Vec<&str> = vec!["true \\ predicted"];
    titles.extend(names.iter().map(String::as_str));
    let mut table = new_table(&titles);
    for (i, row) in report.result.matrix.rows().enumerate() {
        let mut cells = vec![Cell::new(&names[i]).fg(Color::Cyan)];
        cells.extend(row.iter().enumerate().map(|(j, count)| {
            let cell = Cell::new(count).set_alignment(CellAlignment::Right);
            if i == j {
                cell.fg(Color::Green)
            } else {
                cell
            }
        }));
        table.add_row(cells);
    }
    println!("{}", table);
    println!("{}", format!("Chart saved to {}", report.artifact.display()).bright_black());
}

pub fn display_history_table(entries: &[Listed<ClassificationRecord>]) {
    if entries.is_empty() {
        println!("{}", "No classification history".yellow());
        return;
    }
    let mut table = new_table(&["Timestamp", "Image", "Model", "Result", "Probabilities", "Artifact"]);
    for entry in entries {
        let record = &entry.record;
        table.add_row(vec![
            Cell::new(&record.timestamp).fg(Color::DarkGrey),
            Cell::new(&record.image_name),
            Cell::new(&record.model).fg(Color::Green),
            Cell::new(&record.result).fg(Color::Yellow).add_attribute(Attribute::Bold),
            Cell::new(&record.probabilities),
            artifact_cell(&entry.artifact),
        ]);
    }
    println!("\n{}", table);
}

pub fn display_matrices_table(entries: &[Listed<EvaluationRecord>]) {
    if entries.is_empty() {
        println!("{}", "No confusion matrix history".yellow());
        return;
    }
    let mut table = new_table(&["Timestamp", "Model", "Dataset", "Metrics", "Chart"]);
    for entry in entries {
        let record = &entry.record;
        let metrics = match record.parsed_metrics() {
            Some(m) => format!(
                "acc {:.4}  prec {:.4}\nrec {:.4}  f1 {:.4}",
                m.accuracy, m.precision, m.recall, m.f1
            ),
            None => record.metrics.clone(),
        };
        table.add_row(vec![
            Cell::new(&record.timestamp).fg(Color::DarkGrey),
            Cell::new(&record.model).fg(Color::Green),
            Cell::new(&record.dataset).fg(Color::Magenta),
            Cell::new(metrics),
            artifact_cell(&entry.artifact),
        ]);
    }
    println!("\n{}", table);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_counts_characters() {
        assert_eq!(short_hash("0123456789abcdef"), "0123456789ab");
        assert_eq!(short_hash("abc"), "abc");
        assert_eq!(short_hash("ééééééééééééé"), "éééééééééééé");
    }
}
