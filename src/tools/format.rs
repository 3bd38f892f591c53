//! Result formatting for the execute_sql tool.
//!
//! Renders a [`ResultSet`] as JSON, CSV, HTML or raw text. Temporal values
//! become ISO-8601 strings and fixed-point decimals become floats in every
//! mode; binary values are rejected.

use crate::error::{ToolError, ToolResult};
use crate::models::{ResultSet, Row, Value};
use crate::tools::message::ToolMessage;
use chrono::{NaiveDateTime, NaiveTime, SecondsFormat, Timelike};
use humansize::{DECIMAL, format_size};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::str::FromStr;
use tracing::debug;

pub const NO_DATA_FOUND: &str = "No data found";
pub const NO_DATA_AFFECTED: &str = "No data affected";

const UTF8_BOM: &str = "\u{feff}";

/// Output format selected by the `result_format` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    /// `{"status": "success", "result": ...}` (default)
    #[default]
    Json,
    /// `result.csv` attachment with a UTF-8 BOM
    Csv,
    /// `result.html` attachment
    Html,
    /// JSON rendered as plain text
    Text,
}

impl FromStr for ResultFormat {
    type Err = std::convert::Infallible;

    /// Unrecognized selectors fall back to raw text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "csv" => Self::Csv,
            "html" => Self::Html,
            _ => Self::Text,
        })
    }
}

impl<'de> Deserialize<'de> for ResultFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let Ok(format) = raw.parse::<ResultFormat>();
        Ok(format)
    }
}

/// `HH:MM:SS[.ffffff]`; a leap second shows as second 60.
fn iso_time(t: &NaiveTime) -> String {
    let base = t.format("%H:%M:%S").to_string();
    match (t.nanosecond() % 1_000_000_000) / 1_000 {
        0 => base,
        micros => format!("{}.{:06}", base, micros),
    }
}

fn iso_datetime(dt: &NaiveDateTime) -> String {
    format!("{}T{}", dt.date().format("%Y-%m-%d"), iso_time(&dt.time()))
}

/// Convert a cell to JSON, failing on types with no JSON rendering.
pub fn value_to_json(value: &Value) -> ToolResult<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::UInt(u) => JsonValue::from(*u),
        Value::Float(f) => float_to_json(*f),
        Value::Decimal(d) => {
            let parsed = d
                .parse::<f64>()
                .map_err(|_| ToolError::format(format!("Invalid decimal value '{}'", d)))?;
            float_to_json(parsed)
        }
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Json(j) => j.clone(),
        Value::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => JsonValue::String(iso_time(t)),
        Value::DateTime(dt) => JsonValue::String(iso_datetime(dt)),
        Value::DateTimeUtc(dt) => {
            JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false))
        }
        Value::Bytes(_) => return Err(ToolError::unserializable(value.type_name())),
    })
}

/// Non-finite floats have no JSON number form and become null.
fn float_to_json(f: f64) -> JsonValue {
    serde_json::Number::from_f64(f)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn row_to_json(row: &Row) -> ToolResult<JsonValue> {
    let mut map = Map::with_capacity(row.len());
    for (column, value) in row.iter() {
        map.insert(column.to_string(), value_to_json(value)?);
    }
    Ok(JsonValue::Object(map))
}

/// Convert a whole result to JSON: an array of row objects, or `{"rowcount": n}`.
pub fn result_to_json(result: &ResultSet) -> ToolResult<JsonValue> {
    match result {
        ResultSet::Rows(rows) => rows
            .iter()
            .map(row_to_json)
            .collect::<ToolResult<Vec<_>>>()
            .map(JsonValue::Array),
        ResultSet::Affected { rowcount } => Ok(json!({ "rowcount": rowcount })),
    }
}

/// Text form of a cell for CSV and HTML output.
pub fn cell_text(value: &Value) -> ToolResult<String> {
    Ok(match value_to_json(value)? {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s,
        other => other.to_string(),
    })
}

fn header_of(rows: &[Row]) -> ToolResult<Vec<String>> {
    rows.first()
        .map(|row| row.keys().map(str::to_string).collect())
        .ok_or_else(|| ToolError::format("Tabular output requires at least one row"))
}

/// Render rows as UTF-8 CSV with a leading byte-order-mark.
///
/// The header comes from the first row's keys.
pub fn to_csv(rows: &[Row]) -> ToolResult<Vec<u8>> {
    let header = header_of(rows)?;

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(UTF8_BOM.as_bytes().to_vec());
    writer.write_record(&header).map_err(csv_error)?;
    for row in rows {
        let cells = row.values().map(cell_text).collect::<ToolResult<Vec<_>>>()?;
        writer.write_record(&cells).map_err(csv_error)?;
    }
    writer
        .into_inner()
        .map_err(|e| ToolError::format(format!("CSV encoding failed: {}", e.error())))
}

fn csv_error(err: csv::Error) -> ToolError {
    ToolError::format(format!("CSV encoding failed: {}", err))
}

/// Render rows as a bordered HTML table.
///
/// Values are not HTML-escaped; callers must trust the data source.
pub fn to_html_table(rows: &[Row]) -> ToolResult<String> {
    let header = header_of(rows)?;

    let mut html = vec!["<table border='1'>".to_string()];
    html.push(format!(
        "<tr>{}</tr>",
        header
            .iter()
            .map(|col| format!("<th>{}</th>", col))
            .collect::<String>()
    ));
    for row in rows {
        let cells = row
            .values()
            .map(|v| cell_text(v).map(|text| format!("<td>{}</td>", text)))
            .collect::<ToolResult<String>>()?;
        html.push(format!("<tr>{}</tr>", cells));
    }
    html.push("</table>".to_string());
    Ok(html.concat())
}

fn tabular_rows<'a>(result: &'a ResultSet, format: &str) -> ToolResult<&'a [Row]> {
    result.rows().ok_or_else(|| {
        ToolError::format(format!(
            "{} output requires a query result; the statement returned an affected-row count",
            format
        ))
    })
}

/// Format a result into the messages returned to the host.
///
/// An empty query result is preceded by a "No data found" notice and a
/// zero-row write by "No data affected".
pub fn format_result(result: &ResultSet, format: ResultFormat) -> ToolResult<Vec<ToolMessage>> {
    let mut messages = Vec::new();
    match result {
        ResultSet::Rows(rows) if rows.is_empty() => {
            messages.push(ToolMessage::text(NO_DATA_FOUND))
        }
        ResultSet::Affected { rowcount: 0 } => messages.push(ToolMessage::text(NO_DATA_AFFECTED)),
        _ => {}
    }

    match format {
        ResultFormat::Json => {
            messages.push(ToolMessage::json(json!({
                "status": "success",
                "result": result_to_json(result)?,
            })));
        }
        ResultFormat::Csv => {
            let rows = tabular_rows(result, "CSV")?;
            if !rows.is_empty() {
                let bytes = to_csv(rows)?;
                debug!(rows = rows.len(), size = %format_size(bytes.len(), DECIMAL), "Rendered CSV");
                messages.push(
                    ToolMessage::blob(bytes, "text/csv", "result.csv").with_encoding("utf-8-sig"),
                );
            }
        }
        ResultFormat::Html => {
            let rows = tabular_rows(result, "HTML")?;
            if !rows.is_empty() {
                let html = to_html_table(rows)?;
                debug!(rows = rows.len(), size = %format_size(html.len(), DECIMAL), "Rendered HTML");
                messages.push(ToolMessage::blob(
                    html.into_bytes(),
                    "text/html",
                    "result.html",
                ));
            }
        }
        ResultFormat::Text => {
            if !matches!(result, ResultSet::Rows(rows) if rows.is_empty()) {
                let text = serde_json::to_string(&result_to_json(result)?)
                    .map_err(|e| ToolError::internal(format!("JSON encoding failed: {}", e)))?;
                messages.push(ToolMessage::text(text));
            }
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn order_row() -> Row {
        Row::new()
            .with("id", Value::Int(7))
            .with("total", Value::Decimal("12.50".into()))
            .with(
                "created_at",
                Value::DateTime(
                    NaiveDate::from_ymd_opt(2024, 3, 1)
                        .unwrap()
                        .and_hms_opt(9, 30, 0)
                        .unwrap(),
                ),
            )
            .with("note", Value::Null)
    }

    fn blob_bytes(msg: &ToolMessage) -> &[u8] {
        match msg {
            ToolMessage::Blob { data, .. } => data,
            other => panic!("expected blob, got {:?}", other),
        }
    }

    #[test]
    fn test_result_format_parsing() {
        assert_eq!("JSON".parse::<ResultFormat>().unwrap(), ResultFormat::Json);
        assert_eq!("csv".parse::<ResultFormat>().unwrap(), ResultFormat::Csv);
        assert_eq!("html".parse::<ResultFormat>().unwrap(), ResultFormat::Html);
        assert_eq!("markdown".parse::<ResultFormat>().unwrap(), ResultFormat::Text);
    }

    #[test]
    fn test_result_format_deserializes_leniently() {
        let format: ResultFormat = serde_json::from_value(json!("Csv")).unwrap();
        assert_eq!(format, ResultFormat::Csv);
        let format: ResultFormat = serde_json::from_value(json!("xml")).unwrap();
        assert_eq!(format, ResultFormat::Text);
    }

    #[test]
    fn test_temporal_and_decimal_conversion() {
        assert_eq!(
            value_to_json(&Value::Decimal("12.50".into())).unwrap(),
            json!(12.5)
        );
        assert_eq!(
            value_to_json(&Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())).unwrap(),
            json!("2024-01-02")
        );
        let with_micros = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_micro_opt(3, 4, 5, 120)
            .unwrap();
        assert_eq!(
            value_to_json(&Value::DateTime(with_micros)).unwrap(),
            json!("2024-01-02T03:04:05.000120")
        );
        let utc = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            value_to_json(&Value::DateTimeUtc(utc)).unwrap(),
            json!("2024-01-02T03:04:05+00:00")
        );
    }

    #[test]
    fn test_bytes_are_unserializable() {
        let err = value_to_json(&Value::Bytes(vec![0xde, 0xad])).unwrap_err();
        assert!(matches!(err, ToolError::Unserializable { ref type_name } if type_name == "bytes"));
    }

    #[test]
    fn test_json_mode_wraps_result() {
        let messages = format_result(&ResultSet::Rows(vec![order_row()]), ResultFormat::Json).unwrap();
        assert_eq!(messages.len(), 1);
        let ToolMessage::Json { json } = &messages[0] else {
            panic!("expected json message");
        };
        assert_eq!(json["status"], "success");
        assert_eq!(
            json["result"],
            json!([{ "id": 7, "total": 12.5, "created_at": "2024-03-01T09:30:00", "note": null }])
        );
    }

    #[test]
    fn test_json_mode_keeps_column_order() {
        let messages = format_result(&ResultSet::Rows(vec![order_row()]), ResultFormat::Json).unwrap();
        let ToolMessage::Json { json } = &messages[0] else {
            panic!("expected json message");
        };
        let keys: Vec<_> = json["result"][0].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["id", "total", "created_at", "note"]);
    }

    #[test]
    fn test_empty_rows_in_json_mode_yield_notice() {
        let messages = format_result(&ResultSet::Rows(vec![]), ResultFormat::Json).unwrap();
        assert_eq!(messages[0].as_text(), Some(NO_DATA_FOUND));
        assert_eq!(
            messages[1],
            ToolMessage::json(json!({ "status": "success", "result": [] }))
        );
    }

    #[test]
    fn test_zero_affected_yields_notice() {
        let messages =
            format_result(&ResultSet::Affected { rowcount: 0 }, ResultFormat::Json).unwrap();
        assert_eq!(messages[0].as_text(), Some(NO_DATA_AFFECTED));
        assert_eq!(
            messages[1],
            ToolMessage::json(json!({ "status": "success", "result": { "rowcount": 0 } }))
        );
    }

    #[test]
    fn test_csv_has_bom_header_and_converted_cells() {
        let messages = format_result(&ResultSet::Rows(vec![order_row()]), ResultFormat::Csv).unwrap();
        assert_eq!(messages.len(), 1);
        let bytes = blob_bytes(&messages[0]);
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
        let text = std::str::from_utf8(&bytes[3..]).unwrap();
        assert_eq!(
            text,
            "id,total,created_at,note\r\n7,12.5,2024-03-01T09:30:00,\r\n"
        );
        let ToolMessage::Blob { filename, mime_type, .. } = &messages[0] else {
            unreachable!();
        };
        assert_eq!(filename, "result.csv");
        assert_eq!(mime_type, "text/csv");
    }

    #[test]
    fn test_csv_quotes_special_fields() {
        let rows = vec![Row::new().with("q", Value::Text("say \"hi\", then\nleave".into()))];
        let bytes = to_csv(&rows).unwrap();
        let text = std::str::from_utf8(&bytes[3..]).unwrap();
        assert_eq!(text, "q\r\n\"say \"\"hi\"\", then\nleave\"\r\n");
    }

    #[test]
    fn test_csv_rejects_ragged_rows() {
        let rows = vec![
            Row::new().with("a", Value::Int(1)).with("b", Value::Int(2)),
            Row::new().with("a", Value::Int(3)),
        ];
        let err = to_csv(&rows).unwrap_err();
        assert!(matches!(err, ToolError::Format { .. }));
    }

    #[test]
    fn test_leap_second_time_keeps_six_fraction_digits() {
        let leap = NaiveTime::from_hms_nano_opt(23, 59, 59, 1_250_000_000).unwrap();
        assert_eq!(iso_time(&leap), "23:59:60.250000");
        let whole = NaiveTime::from_hms_nano_opt(23, 59, 59, 1_000_000_000).unwrap();
        assert_eq!(iso_time(&whole), "23:59:60");
    }

    #[test]
    fn test_csv_rejects_bytes() {
        let rows = vec![Row::new().with("raw", Value::Bytes(vec![1, 2]))];
        assert!(matches!(
            to_csv(&rows).unwrap_err(),
            ToolError::Unserializable { .. }
        ));
    }

    #[test]
    fn test_csv_requires_row_result() {
        let err = format_result(&ResultSet::Affected { rowcount: 3 }, ResultFormat::Csv).unwrap_err();
        assert!(matches!(err, ToolError::Format { .. }));
    }

    #[test]
    fn test_csv_empty_rows_only_notice() {
        let messages = format_result(&ResultSet::Rows(vec![]), ResultFormat::Csv).unwrap();
        assert_eq!(messages, vec![ToolMessage::text(NO_DATA_FOUND)]);
    }

    #[test]
    fn test_html_table() {
        let messages = format_result(&ResultSet::Rows(vec![order_row()]), ResultFormat::Html).unwrap();
        let html = std::str::from_utf8(blob_bytes(&messages[0])).unwrap();
        assert_eq!(
            html,
            "<table border='1'><tr><th>id</th><th>total</th><th>created_at</th><th>note</th></tr>\
             <tr><td>7</td><td>12.5</td><td>2024-03-01T09:30:00</td><td></td></tr></table>"
        );
    }

    #[test]
    fn test_html_is_not_escaped() {
        let rows = vec![Row::new().with("tag", Value::Text("<b>x</b>".into()))];
        assert!(to_html_table(&rows).unwrap().contains("<td><b>x</b></td>"));
    }

    #[test]
    fn test_html_rejects_bytes() {
        let rows = vec![Row::new().with("raw", Value::Bytes(vec![0]))];
        assert!(to_html_table(&rows).is_err());
    }

    #[test]
    fn test_text_mode() {
        let messages = format_result(&ResultSet::Rows(vec![order_row()]), ResultFormat::Text).unwrap();
        assert_eq!(
            messages[0].as_text(),
            Some(r#"[{"id":7,"total":12.5,"created_at":"2024-03-01T09:30:00","note":null}]"#)
        );

        let messages = format_result(&ResultSet::Rows(vec![]), ResultFormat::Text).unwrap();
        assert_eq!(messages, vec![ToolMessage::text(NO_DATA_FOUND)]);

        let messages = format_result(&ResultSet::Affected { rowcount: 2 }, ResultFormat::Text).unwrap();
        assert_eq!(messages, vec![ToolMessage::text(r#"{"rowcount":2}"#)]);
    }

    #[test]
    fn test_unserializable_fails_in_every_mode() {
        let result = ResultSet::Rows(vec![Row::new().with("raw", Value::Bytes(vec![9]))]);
        for format in [
            ResultFormat::Json,
            ResultFormat::Csv,
            ResultFormat::Html,
            ResultFormat::Text,
        ] {
            assert!(format_result(&result, format).is_err(), "{:?}", format);
        }
    }
}
