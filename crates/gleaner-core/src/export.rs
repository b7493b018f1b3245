//! Output flattening and the writers for text-shaped formats.
//!
//! Records are nested (list-valued fields); every format except JSON wants
//! a flat key → string mapping. The flattening contract lives here: list
//! values join with `|` for line-oriented formats and `", "` for
//! spreadsheet-shaped ones, XML element names are sanitized to valid
//! identifiers, and table-shaped formats (spreadsheet, embedded database)
//! get a header + all-text rows for their external writer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::AppError;
use crate::record::Record;

/// Output kind requested by the job configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Excel,
    Xml,
    Sqlite,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Xml => "xml",
            ExportFormat::Sqlite => "db",
        }
    }

    /// Join delimiter for list-valued fields in this format.
    pub fn list_delimiter(&self) -> &'static str {
        match self {
            ExportFormat::Excel => ", ",
            _ => "|",
        }
    }

    /// True for formats rendered by an external writer from [`TableData`].
    pub fn is_table_shaped(&self) -> bool {
        matches!(self, ExportFormat::Excel | ExportFormat::Sqlite)
    }
}

/// Header + all-text rows, the input contract for spreadsheet and
/// embedded-database writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Flatten one value to the format's string form.
fn flatten_value(value: &Value, delimiter: &str) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| flatten_value(item, delimiter))
            .collect::<Vec<_>>()
            .join(delimiter),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Union of record keys in first-seen order.
pub fn column_union(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.to_string());
            }
        }
    }
    columns
}

/// Flatten records into the table shape for a given format.
pub fn to_table(records: &[Record], format: ExportFormat) -> TableData {
    let delimiter = format.list_delimiter();
    let columns = column_union(records);
    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| {
                    record
                        .get(column)
                        .map(|v| flatten_value(v, delimiter))
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();
    TableData { columns, rows }
}

/// Pretty JSON array of records, lists kept as arrays.
pub fn to_json_string(records: &[Record]) -> Result<String, AppError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// CSV with the column union as header; missing fields render empty.
pub fn to_csv_string(records: &[Record]) -> Result<String, AppError> {
    let table = to_table(records, ExportFormat::Csv);
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&table.columns)
        .map_err(|e| AppError::Generic(format!("csv write: {e}")))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| AppError::Generic(format!("csv write: {e}")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Generic(format!("csv flush: {e}")))?;
    String::from_utf8(bytes).map_err(|e| AppError::Generic(format!("csv utf8: {e}")))
}

/// XML document with one element per record field.
///
/// Field names are sanitized into valid element names; list values join
/// with the line-oriented delimiter.
pub fn to_xml_string(records: &[Record]) -> Result<String, AppError> {
    let delimiter = ExportFormat::Xml.list_delimiter();
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let xml = |e| AppError::Generic(format!("xml write: {e}"));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml)?;
    writer
        .write_event(Event::Start(BytesStart::new("records")))
        .map_err(xml)?;

    for record in records {
        writer
            .write_event(Event::Start(BytesStart::new("record")))
            .map_err(xml)?;
        for (key, value) in record.iter() {
            let name = sanitize_element_name(key);
            writer
                .write_event(Event::Start(BytesStart::new(name.as_str())))
                .map_err(xml)?;
            writer
                .write_event(Event::Text(BytesText::new(&flatten_value(value, delimiter))))
                .map_err(xml)?;
            writer
                .write_event(Event::End(BytesEnd::new(name.as_str())))
                .map_err(xml)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("record")))
            .map_err(xml)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("records")))
        .map_err(xml)?;

    String::from_utf8(writer.into_inner()).map_err(|e| AppError::Generic(format!("xml utf8: {e}")))
}

/// Reduce a field name to a valid XML element name.
pub fn sanitize_element_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<Record> {
        let mut a = Record::new();
        a.insert_text("title", "First");
        a.insert_list("tags", vec!["x".into(), "y".into()]);

        let mut b = Record::new();
        b.insert_text("title", "Second");
        b.insert_text("price", "9.99");

        vec![a, b]
    }

    #[test]
    fn delimiters_follow_the_format() {
        assert_eq!(ExportFormat::Csv.list_delimiter(), "|");
        assert_eq!(ExportFormat::Xml.list_delimiter(), "|");
        assert_eq!(ExportFormat::Excel.list_delimiter(), ", ");
    }

    #[test]
    fn column_union_keeps_first_seen_order() {
        let columns = column_union(&sample_records());
        assert_eq!(columns, vec!["title", "tags", "price"]);
    }

    #[test]
    fn table_rows_fill_missing_fields_with_empty_strings() {
        let table = to_table(&sample_records(), ExportFormat::Csv);
        assert_eq!(table.rows[0], vec!["First", "x|y", ""]);
        assert_eq!(table.rows[1], vec!["Second", "", "9.99"]);
    }

    #[test]
    fn spreadsheet_table_joins_lists_with_comma_space() {
        let table = to_table(&sample_records(), ExportFormat::Excel);
        assert_eq!(table.rows[0][1], "x, y");
    }

    #[test]
    fn csv_output_has_header_and_one_line_per_record() {
        let csv = to_csv_string(&sample_records()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "title,tags,price");
        assert!(lines[1].starts_with("First,x|y,"));
    }

    #[test]
    fn json_output_preserves_list_values() {
        let json = to_json_string(&sample_records()).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["tags"], serde_json::json!(["x", "y"]));
    }

    #[test]
    fn xml_output_sanitizes_field_names() {
        let mut record = Record::new();
        record.insert_text("item price", "5");
        record.insert_text("2nd-field", "x");
        let xml = to_xml_string(&[record]).unwrap();
        assert!(xml.contains("<item_price>5</item_price>"));
        assert!(xml.contains("<_2nd_field>x</_2nd_field>"));
        assert!(xml.contains("<records>"));
    }

    #[test]
    fn sanitize_element_name_handles_edge_cases() {
        assert_eq!(sanitize_element_name("ok_name"), "ok_name");
        assert_eq!(sanitize_element_name("with space"), "with_space");
        assert_eq!(sanitize_element_name("9lives"), "_9lives");
        assert_eq!(sanitize_element_name(""), "_");
    }

    #[test]
    fn format_deserializes_lowercase_names() {
        let f: ExportFormat = serde_json::from_str("\"excel\"").unwrap();
        assert_eq!(f, ExportFormat::Excel);
        assert!(f.is_table_shaped());
        let f: ExportFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(f, ExportFormat::Json);
    }
}
