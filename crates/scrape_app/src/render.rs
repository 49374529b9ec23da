//! Plain-text rendering of previews, progress and result tables.

use scrape_core::{record_columns, PreviewData, Record};
use scrape_engine::cell_text;
use serde_json::Value;

const MAX_CELL_WIDTH: usize = 40;
const MAX_SAMPLE_ITEMS: usize = 5;
const MAX_SAMPLE_WIDTH: usize = 160;
const PROGRESS_BAR_WIDTH: usize = 30;

pub fn render_preview(preview: &PreviewData) -> String {
    let mut out = format!(
        "Preview of {} ({})\n",
        preview.url,
        preview.content_type.as_str()
    );
    if let Some(run_id) = &preview.run_id {
        out.push_str(&format!("run id: {run_id}\n"));
    }
    if let Some(note) = &preview.note {
        out.push_str(&format!("note: {note}\n"));
    }
    let items = preview.sample_items();
    for (index, item) in items.iter().take(MAX_SAMPLE_ITEMS).enumerate() {
        out.push_str(&format!(
            "  [{}] {}\n",
            index + 1,
            truncate(&compact(item), MAX_SAMPLE_WIDTH)
        ));
    }
    if items.len() > MAX_SAMPLE_ITEMS {
        out.push_str(&format!("  ... {} more\n", items.len() - MAX_SAMPLE_ITEMS));
    }
    out
}

pub fn render_progress(progress: u8) -> String {
    let progress = progress.min(100) as usize;
    let filled = progress * PROGRESS_BAR_WIDTH / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        ".".repeat(PROGRESS_BAR_WIDTH - filled),
        progress
    )
}

/// Left-aligned table with a dashed rule under the header.
pub fn render_table(records: &[Record]) -> String {
    let columns = record_columns(records);
    if columns.is_empty() {
        return String::from("(no records)\n");
    }
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| {
                    truncate(
                        &record.get(column).map(cell_text).unwrap_or_default(),
                        MAX_CELL_WIDTH,
                    )
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            rows.iter()
                .map(|row| row[index].chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or(0)
                .min(MAX_CELL_WIDTH)
        })
        .collect();

    let mut out = String::new();
    push_row(&mut out, &columns, &widths);
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    push_row(&mut out, &rule, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}", width = *width))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let kept: String = single_line.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
