// src/monitor/csv_row.rs

//! Comma-separated row splitting for sampler output.
//!
//! Each line is read as a one-record CSV document, so the usual quoting
//! rules apply: `"x,y"` is one cell and `""` inside quotes is a literal quote.

use csv::ReaderBuilder;
use serde_json::{Number, Value};
use tracing::trace;

/// Split one line into its cells. A blank or unparseable line has none.
pub fn split_row(line: &str) -> Vec<String> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => record.iter().map(str::to_string).collect(),
        Some(Err(e)) => {
            trace!(error = %e, "unparseable sampler row");
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// Interpret a cell as a JSON number when it looks like one.
pub fn cell_value(cell: &str) -> Value {
    let trimmed = cell.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(cell.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_plain_and_quoted_fields() {
        assert_eq!(split_row("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_row(r#""x,y",2"#), vec!["x,y", "2"]);
        assert_eq!(split_row(r#""say ""hi""",z"#), vec![r#"say "hi""#, "z"]);
        assert_eq!(split_row("a,,"), vec!["a", "", ""]);
        assert_eq!(split_row("single"), vec!["single"]);
        assert!(split_row("").is_empty());
        assert_eq!(split_row(r#"in"side,q"#), vec![r#"in"side"#, "q"]);
    }

    #[test]
    fn numeric_cells_become_numbers() {
        assert_eq!(cell_value("1"), json!(1));
        assert_eq!(cell_value(" 2.5 "), json!(2.5));
        assert_eq!(cell_value("N/A"), json!("N/A"));
        assert_eq!(cell_value("nan"), json!("nan"));
        assert_eq!(cell_value(""), json!(""));
    }
}
