//! Tabular export of list rows.
//!
//! An export renders exactly what the list shows: the caller passes the
//! column set with its visibility flags, and hidden columns are left out of
//! the output entirely. Cell formatting happens here at export time, so the
//! row values stay the raw records the backend returned. Output is produced
//! fully in memory and only handed back on success; a failed export yields
//! no bytes.

use serde_json::Value;

/// How a cell renders in the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellFormat {
    #[default]
    Text,
    /// Rendered as a plain number; non-numeric values fall back to text.
    Number,
    /// Rendered with two decimal places.
    Currency,
}

/// One exportable column of a list view.
#[derive(Debug, Clone)]
pub struct Column {
    /// Key into the row object.
    pub key: String,
    /// Header cell text.
    pub header: String,
    pub format: CellFormat,
    /// Hidden columns are excluded from the export, matching the table.
    pub visible: bool,
}

impl Column {
    pub fn new(key: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            header: header.into(),
            format: CellFormat::Text,
            visible: true,
        }
    }

    pub fn with_format(mut self, format: CellFormat) -> Self {
        self.format = format;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no visible columns to export")]
    NoColumns,

    #[error("export failed: {0}")]
    Write(String),
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::Write(err.to_string())
    }
}

/// A file format the console can export a list to.
pub trait Exporter {
    /// Renders the rows into file bytes. All-or-nothing: an error midway
    /// yields no output.
    fn export(&self, rows: &[Value], columns: &[Column]) -> Result<Vec<u8>, ExportError>;

    /// File extension without the dot, e.g. `"csv"`.
    fn extension(&self) -> &'static str;
}

fn render_cell(row: &Value, column: &Column) -> String {
    let value = row.get(&column.key).unwrap_or(&Value::Null);
    match column.format {
        CellFormat::Text => text_of(value),
        CellFormat::Number => match numeric(value) {
            Some(n) => trim_float(n),
            None => text_of(value),
        },
        CellFormat::Currency => match numeric(value) {
            Some(n) => format!("{n:.2}"),
            None => text_of(value),
        },
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Nested structures are not cell material; render their JSON so the
        // information is at least not lost.
        other => other.to_string(),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn trim_float(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[derive(Debug, Default)]
pub struct CsvExporter;

impl Exporter for CsvExporter {
    fn export(&self, rows: &[Value], columns: &[Column]) -> Result<Vec<u8>, ExportError> {
        let visible: Vec<&Column> = columns.iter().filter(|c| c.visible).collect();
        if visible.is_empty() {
            return Err(ExportError::NoColumns);
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(visible.iter().map(|c| c.header.as_str()))?;
        for row in rows {
            writer.write_record(visible.iter().map(|c| render_cell(row, c)))?;
        }
        writer
            .into_inner()
            .map_err(|err| ExportError::Write(err.to_string()))
    }

    fn extension(&self) -> &'static str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("name", "Product"),
            Column::new("unit_price", "Unit price").with_format(CellFormat::Currency),
            Column::new("stock_qty", "In stock").with_format(CellFormat::Number),
            Column::new("internal_code", "Internal code").hidden(),
        ]
    }

    #[test]
    fn hidden_columns_are_excluded() {
        let rows = vec![json!({
            "name": "Paracetamol 500mg",
            "unit_price": 1.5,
            "stock_qty": 240,
            "internal_code": "X-9"
        })];

        let bytes = CsvExporter.export(&rows, &columns()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "Product,Unit price,In stock\nParacetamol 500mg,1.50,240\n"
        );
        assert!(!text.contains("X-9"));
    }

    #[test]
    fn currency_cells_get_two_decimals_and_strings_coerce() {
        let rows = vec![json!({
            "name": "Gauze",
            "unit_price": "4",
            "stock_qty": "12"
        })];

        let bytes = CsvExporter.export(&rows, &columns()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Gauze,4.00,12"));
    }

    #[test]
    fn missing_values_render_empty_not_null() {
        let rows = vec![json!({"name": "Gauze"})];

        let bytes = CsvExporter.export(&rows, &columns()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.ends_with("Gauze,,\n"));
    }

    #[test]
    fn all_hidden_columns_is_an_error_with_no_bytes() {
        let all_hidden = vec![Column::new("name", "Product").hidden()];
        let err = CsvExporter.export(&[], &all_hidden).unwrap_err();
        assert!(matches!(err, ExportError::NoColumns));
    }

    #[test]
    fn extension_matches_format() {
        assert_eq!(CsvExporter.extension(), "csv");
    }
}
