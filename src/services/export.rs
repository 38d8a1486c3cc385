// services/export.rs - Spreadsheet export rendered as CSV

use serde_json::Value;

pub const EXPORT_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const DEFAULT_FILENAME: &str = "export.xlsx";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("No data provided")]
    NoData,
}

/// Renders rows as CSV. The header line is the keys of the first row in
/// their original order; later rows are projected onto those keys.
pub fn render_csv(rows: &[Value]) -> Result<String, ExportError> {
    let headers: Vec<&String> = match rows.first() {
        Some(Value::Object(first)) => first.keys().collect(),
        _ => return Err(ExportError::NoData),
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.iter().map(|h| escape_cell(h)).collect::<Vec<_>>().join(","));
    for row in rows {
        let line = headers
            .iter()
            .map(|header| render_cell(row.get(header.as_str())))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => escape_cell(s),
        Some(other) => escape_cell(&other.to_string()),
    }
}

fn escape_cell(text: &str) -> String {
    if text.contains(',') || text.contains('"') || text.contains('\n') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// `Content-Disposition` value; quotes and line breaks are dropped from the
/// caller-supplied name.
pub fn content_disposition(filename: Option<&str>) -> String {
    let name: String = filename
        .filter(|f| !f.trim().is_empty())
        .unwrap_or(DEFAULT_FILENAME)
        .chars()
        .filter(|c| !matches!(c, '"' | '\r' | '\n'))
        .collect();
    format!("attachment; filename=\"{}\"", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_headers_in_key_order() {
        let rows = vec![
            json!({"name": "Amal", "city": "Tunis", "age": 31}),
            json!({"city": "Sfax", "name": "Karim"}),
        ];
        let csv = render_csv(&rows).unwrap();
        assert_eq!(csv, "name,city,age\nAmal,Tunis,31\nKarim,Sfax,");
    }

    #[test]
    fn quotes_cells_with_separators() {
        let rows = vec![json!({"note": "said \"hi\", left", "lines": "a\nb", "plain": "ok"})];
        let csv = render_csv(&rows).unwrap();
        assert_eq!(csv, "note,lines,plain\n\"said \"\"hi\"\", left\",\"a\nb\",ok");
    }

    #[test]
    fn keeps_falsy_values_and_blanks_nulls() {
        let rows = vec![json!({"count": 0, "active": false, "missing": null, "tags": ["a", "b"]})];
        let csv = render_csv(&rows).unwrap();
        assert_eq!(csv, "count,active,missing,tags\n0,false,,\"[\"\"a\"\",\"\"b\"\"]\"");
    }

    #[test]
    fn rejects_empty_or_non_object_data() {
        assert_eq!(render_csv(&[]), Err(ExportError::NoData));
        assert_eq!(render_csv(&[json!(42)]), Err(ExportError::NoData));
    }

    #[test]
    fn disposition_defaults_and_sanitizes() {
        assert_eq!(content_disposition(None), "attachment; filename=\"export.xlsx\"");
        assert_eq!(content_disposition(Some("")), "attachment; filename=\"export.xlsx\"");
        assert_eq!(
            content_disposition(Some("ngos\"\r\nX-Evil: 1.xlsx")),
            "attachment; filename=\"ngosX-Evil: 1.xlsx\""
        );
    }
}
