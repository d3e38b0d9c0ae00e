//! Type normalization from MySQL column types to canonical types.
//!
//! Rules are tried in order and the first match wins; order matters because
//! the type prefixes overlap (`tinyint(1)` vs `tinyint(4)`, `bigint unsigned`
//! vs `bigint`, `datetime` vs `date`).
//!
//! Two rules are lossy policy rather than universal truth:
//! - `bit(1)` and `tinyint(1)` (signed or unsigned) are assumed to be boolean
//!   flags.
//! - `bigint unsigned` becomes numeric, since the target's signed 64-bit
//!   integer cannot hold the full unsigned range.

use tracing::warn;

use crate::core::schema::{CanonicalType, Column, SourceColumn};

/// Map a MySQL column type string to its canonical type.
pub fn normalize_type(column_type: &str) -> CanonicalType {
    let raw = column_type.trim();
    let t = raw.to_lowercase();
    let unsigned = t.contains("unsigned");

    // Character
    if t.starts_with("varchar") {
        return CanonicalType::Varchar;
    }
    if t.starts_with("char") {
        return CanonicalType::Char;
    }

    // Boolean flags
    if matches!(t.as_str(), "bit(1)" | "tinyint(1)" | "tinyint(1) unsigned") {
        return CanonicalType::Boolean;
    }

    // Integers, widened when unsigned
    if (t.starts_with("smallint") && unsigned) || t.starts_with("mediumint") {
        return CanonicalType::Integer;
    }
    if t.starts_with("smallint") || t.starts_with("tinyint") {
        return CanonicalType::TinyInt;
    }
    if t == "year" || t.starts_with("year(") {
        return CanonicalType::TinyInt;
    }
    if t.starts_with("bigint") && unsigned {
        return CanonicalType::Numeric;
    }
    if (t.starts_with("int") && unsigned) || t.starts_with("bigint") {
        return CanonicalType::BigInt;
    }
    if t.starts_with("int") {
        return CanonicalType::Integer;
    }

    // Floating and fixed point
    if t.starts_with("float") {
        return CanonicalType::Float;
    }
    if t.starts_with("decimal") {
        return CanonicalType::Decimal;
    }
    if t.starts_with("numeric") {
        return CanonicalType::Numeric;
    }
    if t.starts_with("double") || t.starts_with("real") {
        return CanonicalType::Double;
    }

    // Date/time
    if t == "date" {
        return CanonicalType::Date;
    }
    if is_bare_or_sized(&t, "datetime") {
        return CanonicalType::DateTime;
    }
    if is_bare_or_sized(&t, "timestamp") {
        return CanonicalType::Timestamp;
    }
    if is_bare_or_sized(&t, "time") {
        return CanonicalType::Time;
    }

    // Binary and text families
    if matches!(
        t.as_str(),
        "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary"
    ) || t.starts_with("binary(")
        || t.starts_with("varbinary(")
    {
        return CanonicalType::Blob;
    }
    if matches!(
        t.as_str(),
        "text" | "tinytext" | "mediumtext" | "longtext" | "json"
    ) {
        return CanonicalType::Text;
    }

    // Value lists and bit strings
    if let Some(inner) = list_body(raw, "enum") {
        return CanonicalType::Enum(parse_value_list(inner));
    }
    if let Some(inner) = list_body(raw, "set") {
        return CanonicalType::Set(parse_value_list(inner));
    }
    if let Some(width) = t
        .strip_prefix("bit(")
        .and_then(|rest| rest.strip_suffix(')'))
        .and_then(|n| n.parse::<u32>().ok())
    {
        return CanonicalType::Bit(width);
    }

    CanonicalType::Other(raw.to_string())
}

/// Build a canonical column from a raw introspection record.
pub fn build_column(table_name: &str, source: &SourceColumn) -> Column {
    let data_type = normalize_type(&source.column_type);
    let (length, scale) = if data_type.is_sized() {
        type_qualifiers(&source.column_type)
    } else {
        (None, None)
    };

    // The source reads invalid enum values and zero dates back as NULL.
    let is_nullable = source.is_nullable
        || matches!(
            data_type,
            CanonicalType::Enum(_)
                | CanonicalType::Date
                | CanonicalType::DateTime
                | CanonicalType::Timestamp
        );

    let is_auto_increment = source.extra.to_lowercase().contains("auto_increment");
    if is_auto_increment && !data_type.is_integer_family() {
        warn!(
            "Column {}.{}: auto_increment on non-integer type {}",
            table_name, source.name, source.column_type
        );
    }

    Column {
        name: source.name.clone(),
        table_name: table_name.to_string(),
        source_type: source.column_type.clone(),
        data_type,
        length,
        scale,
        is_nullable,
        is_primary_key: source.key == "PRI",
        is_auto_increment,
        default: normalize_default(source.default.as_deref()),
        comment: Some(source.comment.clone()).filter(|c| !c.is_empty()),
        max_value: None,
    }
}

/// Normalize a default literal as reported by MySQL or MariaDB.
///
/// MariaDB reports a NULL default as the string `NULL` and wraps string
/// literals in single quotes; MySQL reports the bare value.
pub fn normalize_default(default: Option<&str>) -> Option<String> {
    let default = default?;
    if default == "NULL" {
        return None;
    }
    if default.len() >= 2 && default.starts_with('\'') && default.ends_with('\'') {
        return Some(default[1..default.len() - 1].replace("''", "'"));
    }
    Some(default.to_string())
}

/// Extract `(length)` or `(precision,scale)` from a type string.
pub fn type_qualifiers(column_type: &str) -> (Option<u32>, Option<u32>) {
    let mut rest = column_type;
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(')') else {
            break;
        };
        let inner = &after[..close];
        let mut parts = inner.split(',').map(|p| p.trim().parse::<u32>());
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Ok(length)), None, _) => return (Some(length), None),
            (Some(Ok(precision)), Some(Ok(scale)), None) => return (Some(precision), Some(scale)),
            _ => {}
        }
        rest = &after[close + 1..];
    }
    (None, None)
}

fn is_bare_or_sized(t: &str, name: &str) -> bool {
    t == name
        || t.strip_prefix(name)
            .is_some_and(|rest| rest.starts_with('('))
}

/// Body of `name(...)`, case-insensitive on the name.
fn list_body<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    let head = raw.get(..name.len() + 1)?;
    if !head.eq_ignore_ascii_case(&format!("{}(", name)) {
        return None;
    }
    raw[name.len() + 1..].strip_suffix(')')
}

/// Parse `'a','b''c'` into its unescaped values.
fn parse_value_list(inner: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut value = String::new();
        while let Some(ch) = chars.next() {
            if ch == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    value.push('\'');
                    continue;
                }
                break;
            }
            value.push(ch);
        }
        values.push(value);
    }

    values
}
