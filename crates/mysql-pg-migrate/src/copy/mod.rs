//! Row transcoding into PostgreSQL COPY text format.
//!
//! Each source value becomes one field token: `\N` for NULL, backslash
//! escapes for control characters, `\\x<hex>` for bytea. Fields are joined
//! with tabs into a line; the sink adds the newline.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use tracing::warn;

use crate::core::identifier::quote_pg;
use crate::core::schema::{CanonicalType, Column, Table};
use crate::core::value::SqlValue;
use crate::ddl::{DdlOptions, PgDdlGenerator};
use crate::error::{MigrateError, Result};

/// COPY text NULL sentinel.
pub const NULL_TOKEN: &str = "\\N";

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// `COPY "t" ("a", "b") FROM STDIN` for a table's columns.
pub fn copy_statement(table: &Table) -> Result<String> {
    let columns = table
        .columns
        .iter()
        .map(|c| quote_pg(&c.name))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "COPY {} ({}) FROM STDIN",
        quote_pg(&table.name)?,
        columns.join(", ")
    ))
}

/// Escape text for a COPY field. NUL characters are dropped since the
/// format cannot carry them.
pub fn escape_copy_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\t' => result.push_str("\\t"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\0' => {}
            _ => result.push(c),
        }
    }
    result
}

/// Converts source rows into COPY text fields.
///
/// The target base type of each column is derived once and memoized per
/// `(table, column)`; the cache is safe to share across tasks.
#[derive(Debug)]
pub struct RowTranscoder {
    ddl: PgDdlGenerator,
    type_names: RwLock<HashMap<(String, String), &'static str>>,
}

impl RowTranscoder {
    /// Create a transcoder for the given run options.
    pub fn new(options: DdlOptions) -> Self {
        Self {
            ddl: PgDdlGenerator::new(options),
            type_names: RwLock::new(HashMap::new()),
        }
    }

    fn timezone(&self) -> bool {
        self.ddl.options().timezone
    }

    /// Target base type name for a column, memoized.
    pub fn base_type_name(&self, column: &Column) -> Result<&'static str> {
        let key = (column.table_name.clone(), column.name.clone());

        if let Some(name) = self
            .type_names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
        {
            return Ok(name);
        }

        let name = self.ddl.base_type_name(column)?;
        self.type_names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, name);
        Ok(name)
    }

    /// Encode one row as COPY fields, in table column order.
    pub fn transcode_row(&self, table: &Table, row: &[SqlValue<'_>]) -> Result<Vec<String>> {
        if row.len() != table.columns.len() {
            return Err(MigrateError::transfer(
                &table.name,
                format!(
                    "row has {} values but the table has {} columns",
                    row.len(),
                    table.columns.len()
                ),
            ));
        }
        table
            .columns
            .iter()
            .zip(row)
            .map(|(column, value)| self.transcode_value(column, value))
            .collect()
    }

    /// Encode one row as a tab-separated COPY line (no trailing newline).
    pub fn copy_line(&self, table: &Table, row: &[SqlValue<'_>]) -> Result<String> {
        Ok(self.transcode_row(table, row)?.join("\t"))
    }

    /// Encode a single value for its column.
    pub fn transcode_value(&self, column: &Column, value: &SqlValue<'_>) -> Result<String> {
        let base = self.base_type_name(column)?;

        let token = match value {
            // Zero dates read back as NULL; restore the epoch the source
            // would have coerced them to.
            SqlValue::Null if base == "timestamp" && column.has_default() => {
                self.ddl.options().epoch_sentinel().to_string()
            }
            SqlValue::Null => NULL_TOKEN.to_string(),
            _ if base == "varbit" => self.encode_bits(column, value),
            _ if base == "boolean" => self.encode_bool(column, value),
            SqlValue::Bytes(bytes) if base == "bytea" => format!("\\\\x{}", hex::encode(bytes)),
            SqlValue::Text(text) if base == "bytea" => {
                format!("\\\\x{}", hex::encode(text.as_bytes()))
            }
            SqlValue::Text(text) if base == "text[]" => escape_copy_text(&set_literal(text)),
            SqlValue::Bytes(bytes) if base == "text[]" => {
                escape_copy_text(&set_literal(&String::from_utf8_lossy(bytes)))
            }
            SqlValue::Text(text) => escape_copy_text(text),
            SqlValue::Bytes(bytes) => escape_copy_text(&String::from_utf8_lossy(bytes)),
            SqlValue::DateTime(dt) => self.encode_datetime(dt),
            SqlValue::DateTimeOffset(dto) => {
                if self.timezone() {
                    dto.with_timezone(&Utc)
                        .to_rfc3339_opts(SecondsFormat::AutoSi, false)
                } else {
                    dto.naive_local().format("%Y-%m-%d %H:%M:%S%.f").to_string()
                }
            }
            SqlValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            SqlValue::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            SqlValue::Interval(dur) => encode_interval(column, dur),
            SqlValue::Bool(b) => bool_token(*b).to_string(),
            SqlValue::I64(i) => i.to_string(),
            SqlValue::F32(f) => encode_float(f64::from(*f), f.to_string()),
            SqlValue::F64(f) => encode_float(*f, f.to_string()),
            SqlValue::Decimal(d) => d.to_string(),
        };

        Ok(token)
    }

    fn encode_datetime(&self, dt: &NaiveDateTime) -> String {
        if self.timezone() {
            Utc.from_utc_datetime(dt)
                .to_rfc3339_opts(SecondsFormat::AutoSi, false)
        } else {
            dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
        }
    }

    /// Binary digits of a bit string, left-padded to the declared width.
    fn encode_bits(&self, column: &Column, value: &SqlValue<'_>) -> String {
        let width = match column.data_type {
            CanonicalType::Bit(width) => width as usize,
            _ => 1,
        };
        let bits = match value {
            SqlValue::Bytes(bytes) if bytes.len() <= 16 => bytes
                .iter()
                .fold(0u128, |acc, b| (acc << 8) | u128::from(*b)),
            SqlValue::I64(i) if *i >= 0 => *i as u128,
            SqlValue::Bool(b) => u128::from(*b),
            other => {
                report_conversion(
                    column,
                    format!("cannot render {} value as bit string", other.kind()),
                );
                return passthrough(other);
            }
        };
        format!("{:0width$b}", bits, width = width)
    }

    /// 0 is false, any other value is true.
    fn encode_bool(&self, column: &Column, value: &SqlValue<'_>) -> String {
        let truthy = match value {
            SqlValue::Bool(b) => *b,
            SqlValue::I64(i) => *i != 0,
            SqlValue::Decimal(d) => !d.is_zero(),
            SqlValue::F32(f) => *f != 0.0,
            SqlValue::F64(f) => *f != 0.0,
            // bit(1) arrives as a single byte
            SqlValue::Bytes(bytes) => bytes.iter().any(|b| *b != 0),
            SqlValue::Text(t) if t.trim().parse::<i64>().is_ok() => t.trim() != "0",
            other => {
                report_conversion(
                    column,
                    format!("unexpected {} value for boolean", other.kind()),
                );
                return passthrough(other);
            }
        };
        bool_token(truthy).to_string()
    }
}

fn bool_token(b: bool) -> &'static str {
    if b {
        "t"
    } else {
        "f"
    }
}

/// Array literal for a MySQL SET value: `a,c` becomes `{"a","c"}`.
fn set_literal(value: &str) -> String {
    if value.is_empty() {
        return "{}".to_string();
    }
    let members: Vec<String> = value
        .split(',')
        .map(|m| format!("\"{}\"", m.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("{{{}}}", members.join(","))
}

/// Time of day the duration reaches from midnight, wrapping at 24 hours.
fn encode_interval(column: &Column, dur: &chrono::Duration) -> String {
    let time = dur.num_microseconds().and_then(|micros| {
        let micros = micros.rem_euclid(MICROS_PER_DAY);
        NaiveTime::from_num_seconds_from_midnight_opt(
            (micros / 1_000_000) as u32,
            ((micros % 1_000_000) * 1_000) as u32,
        )
    });

    match time {
        Some(t) => t.format("%H:%M:%S%.f").to_string(),
        None => {
            report_conversion(column, "interval out of range".to_string());
            escape_copy_text(&dur.to_string())
        }
    }
}

fn encode_float(value: f64, display: String) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        display
    }
}

/// Log a value that did not fit its column; the caller passes it through.
fn report_conversion(column: &Column, message: String) {
    let err = MigrateError::ValueConversion {
        column: format!("{}.{}", column.table_name, column.name),
        message,
    };
    warn!("{}, passing through", err);
}

/// Best-effort literal form of a value that did not fit its column type.
fn passthrough(value: &SqlValue<'_>) -> String {
    match value {
        SqlValue::Null => NULL_TOKEN.to_string(),
        SqlValue::Bool(b) => bool_token(*b).to_string(),
        SqlValue::I64(i) => i.to_string(),
        SqlValue::F32(f) => encode_float(f64::from(*f), f.to_string()),
        SqlValue::F64(f) => encode_float(*f, f.to_string()),
        SqlValue::Decimal(d) => d.to_string(),
        SqlValue::Text(t) => escape_copy_text(t),
        SqlValue::Bytes(b) => escape_copy_text(&String::from_utf8_lossy(b)),
        SqlValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        SqlValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        SqlValue::DateTimeOffset(dto) => dto.to_rfc3339(),
        SqlValue::Time(t) => t.format("%H:%M:%S%.f").to_string(),
        SqlValue::Interval(d) => escape_copy_text(&d.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use std::borrow::Cow;

    fn column(name: &str, data_type: CanonicalType) -> Column {
        Column {
            name: name.to_string(),
            table_name: "t".to_string(),
            source_type: String::new(),
            data_type,
            length: None,
            scale: None,
            is_nullable: true,
            is_primary_key: false,
            is_auto_increment: false,
            default: None,
            comment: None,
            max_value: None,
        }
    }

    fn text(s: &str) -> SqlValue<'_> {
        SqlValue::Text(Cow::Borrowed(s))
    }

    fn naive() -> RowTranscoder {
        RowTranscoder::new(DdlOptions::default())
    }

    fn with_tz() -> RowTranscoder {
        RowTranscoder::new(DdlOptions {
            timezone: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_null_sentinel() {
        let col = column("name", CanonicalType::Varchar);
        assert_eq!(naive().transcode_value(&col, &SqlValue::Null).unwrap(), "\\N");
    }

    #[test]
    fn test_null_timestamp_with_default_becomes_epoch() {
        let mut col = column("created", CanonicalType::Timestamp);
        assert_eq!(naive().transcode_value(&col, &SqlValue::Null).unwrap(), "\\N");

        col.default = Some("0000-00-00 00:00:00".into());
        assert_eq!(
            naive().transcode_value(&col, &SqlValue::Null).unwrap(),
            "1970-01-01 00:00:00"
        );
        assert_eq!(
            with_tz().transcode_value(&col, &SqlValue::Null).unwrap(),
            "1970-01-01T00:00:00.000000+00:00"
        );

        // Dates keep NULL
        let mut col = column("day", CanonicalType::Date);
        col.default = Some("2000-01-01".into());
        assert_eq!(naive().transcode_value(&col, &SqlValue::Null).unwrap(), "\\N");
    }

    #[test]
    fn test_text_escapes() {
        let col = column("body", CanonicalType::Text);
        assert_eq!(
            naive()
                .transcode_value(&col, &text("a\tb\nc\\d\re\0f"))
                .unwrap(),
            "a\\tb\\nc\\\\d\\ref"
        );
    }

    #[test]
    fn test_bytea() {
        let col = column("data", CanonicalType::Blob);
        let value = SqlValue::Bytes(Cow::Owned(vec![0x00, 0xde, 0xad]));
        assert_eq!(naive().transcode_value(&col, &value).unwrap(), "\\\\x00dead");
    }

    #[test]
    fn test_set_literal() {
        let col = column(
            "tags",
            CanonicalType::Set(vec!["a".into(), "b".into(), "c".into()]),
        );
        assert_eq!(naive().transcode_value(&col, &text("a,c")).unwrap(), "{\"a\",\"c\"}");
        assert_eq!(naive().transcode_value(&col, &text("")).unwrap(), "{}");
        assert_eq!(
            naive().transcode_value(&col, &text("q\"x")).unwrap(),
            "{\"q\\\\\"x\"}"
        );
    }

    #[test]
    fn test_boolean() {
        let col = column("active", CanonicalType::Boolean);
        let t = naive();
        assert_eq!(t.transcode_value(&col, &SqlValue::I64(0)).unwrap(), "f");
        assert_eq!(t.transcode_value(&col, &SqlValue::I64(1)).unwrap(), "t");
        assert_eq!(t.transcode_value(&col, &SqlValue::I64(7)).unwrap(), "t");
        assert_eq!(t.transcode_value(&col, &SqlValue::Null).unwrap(), "\\N");
        assert_eq!(t.transcode_value(&col, &SqlValue::Bool(false)).unwrap(), "f");
        let bit = SqlValue::Bytes(Cow::Owned(vec![1]));
        assert_eq!(t.transcode_value(&col, &bit).unwrap(), "t");
    }

    #[test]
    fn test_bit_string() {
        let col = column("mask", CanonicalType::Bit(8));
        let value = SqlValue::Bytes(Cow::Owned(vec![0b0000_0101]));
        assert_eq!(naive().transcode_value(&col, &value).unwrap(), "00000101");

        let col = column("wide", CanonicalType::Bit(12));
        let value = SqlValue::Bytes(Cow::Owned(vec![0x0a, 0xbc]));
        assert_eq!(naive().transcode_value(&col, &value).unwrap(), "101010111100");
    }

    #[test]
    fn test_datetime_modes() {
        let col = column("at", CanonicalType::DateTime);
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_micro_opt(14, 5, 6, 250_000)
            .unwrap();
        let value = SqlValue::DateTime(dt);

        assert_eq!(
            naive().transcode_value(&col, &value).unwrap(),
            "2024-03-09 14:05:06.250"
        );
        assert_eq!(
            with_tz().transcode_value(&col, &value).unwrap(),
            "2024-03-09T14:05:06.250+00:00"
        );
    }

    #[test]
    fn test_offset_datetime_is_converted_to_utc() {
        let col = column("at", CanonicalType::Timestamp);
        let dto = chrono::DateTime::parse_from_rfc3339("2024-03-09T14:05:06+02:00").unwrap();
        assert_eq!(
            with_tz()
                .transcode_value(&col, &SqlValue::DateTimeOffset(dto))
                .unwrap(),
            "2024-03-09T12:05:06+00:00"
        );
    }

    #[test]
    fn test_interval_as_time_of_day() {
        let col = column("dur", CanonicalType::Time);
        let t = naive();
        assert_eq!(
            t.transcode_value(&col, &SqlValue::Interval(Duration::seconds(3723)))
                .unwrap(),
            "01:02:03"
        );
        assert_eq!(
            t.transcode_value(&col, &SqlValue::Interval(Duration::hours(25)))
                .unwrap(),
            "01:00:00"
        );
        assert_eq!(
            t.transcode_value(&col, &SqlValue::Interval(Duration::seconds(-1)))
                .unwrap(),
            "23:59:59"
        );
    }

    #[test]
    fn test_numbers() {
        let col = column("x", CanonicalType::Double);
        let t = naive();
        assert_eq!(t.transcode_value(&col, &SqlValue::F64(1.5)).unwrap(), "1.5");
        assert_eq!(
            t.transcode_value(&col, &SqlValue::F64(f64::INFINITY)).unwrap(),
            "Infinity"
        );
        assert_eq!(t.transcode_value(&col, &SqlValue::F64(f64::NAN)).unwrap(), "NaN");

        let col = column("n", CanonicalType::BigInt);
        assert_eq!(t.transcode_value(&col, &SqlValue::I64(-42)).unwrap(), "-42");
    }

    #[test]
    fn test_unrecognized_type_is_fatal() {
        let col = column("g", CanonicalType::Other("geometry".into()));
        assert!(naive().transcode_value(&col, &SqlValue::I64(1)).is_err());
    }

    #[test]
    fn test_type_name_cache() {
        let t = naive();
        let col = column("flag", CanonicalType::Boolean);
        assert_eq!(t.base_type_name(&col).unwrap(), "boolean");
        assert_eq!(t.base_type_name(&col).unwrap(), "boolean");
        assert_eq!(t.type_names.read().unwrap().len(), 1);
    }

    #[test]
    fn test_copy_line_and_statement() {
        let mut table = Table::new("users");
        table.columns = vec![
            column("id", CanonicalType::Integer),
            column("name", CanonicalType::Varchar),
        ];
        let row = vec![SqlValue::I64(1), SqlValue::Null];
        assert_eq!(naive().copy_line(&table, &row).unwrap(), "1\t\\N");
        assert_eq!(
            copy_statement(&table).unwrap(),
            "COPY \"users\" (\"id\", \"name\") FROM STDIN"
        );
    }
}
