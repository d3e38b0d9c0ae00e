//! PostgreSQL DDL generation from canonical table metadata.
//!
//! Every statement is emitted as a complete, semicolon-terminated string.
//! Object creation is preceded by the matching drop so that a re-run over the
//! same target converges to the same schema.

use tracing::warn;

use crate::core::identifier::{quote_literal, quote_pg};
use crate::core::schema::{CanonicalType, Column, Index, Table, TriggerEvent, TriggerTiming};
use crate::error::{MigrateError, Result};

/// Epoch substituted for MySQL zero dates in timezone mode.
pub const EPOCH_TZ: &str = "1970-01-01T00:00:00.000000+00:00";

/// Epoch substituted for MySQL zero dates without timezone mode.
pub const EPOCH_NAIVE: &str = "1970-01-01 00:00:00";

/// Per-run generation options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DdlOptions {
    /// Prefix prepended to generated index and constraint names.
    pub index_prefix: String,

    /// Emit `timestamp with time zone` columns and UTC values.
    pub timezone: bool,
}

impl DdlOptions {
    /// Epoch sentinel in the form matching the timezone mode.
    pub fn epoch_sentinel(&self) -> &'static str {
        if self.timezone {
            EPOCH_TZ
        } else {
            EPOCH_NAIVE
        }
    }
}

/// Generates PostgreSQL DDL for canonical tables.
#[derive(Debug, Clone, Default)]
pub struct PgDdlGenerator {
    options: DdlOptions,
}

impl PgDdlGenerator {
    /// Create a generator with the given options.
    pub fn new(options: DdlOptions) -> Self {
        Self { options }
    }

    /// Options this generator was built with.
    pub fn options(&self) -> &DdlOptions {
        &self.options
    }

    /// Full column definition: `"<name>" <type>[ DEFAULT ...][ NOT NULL]`.
    pub fn column_description(&self, column: &Column) -> Result<String> {
        Ok(format!(
            "{} {}",
            quote_pg(&column.name)?,
            self.column_type_info(column)?
        ))
    }

    /// Column definition without the name.
    ///
    /// Auto-increment columns replace any source default with the nextval
    /// of their sequence and are always NOT NULL.
    pub fn column_type_info(&self, column: &Column) -> Result<String> {
        let (target_type, default) = self.type_and_default(column)?;

        if column.is_auto_increment {
            return Ok(format!(
                "{} DEFAULT nextval({}::regclass) NOT NULL",
                target_type,
                quote_literal(&quote_pg(&column.sequence_name())?)
            ));
        }

        let null = if column.is_nullable { "" } else { " NOT NULL" };
        Ok(format!(
            "{}{}{}",
            target_type,
            default.unwrap_or_default(),
            null
        ))
    }

    /// Base PostgreSQL type name of a column, without size or modifiers.
    pub fn base_type_name(&self, column: &Column) -> Result<&'static str> {
        let name = match &column.data_type {
            CanonicalType::Char => "character",
            CanonicalType::Varchar | CanonicalType::Enum(_) => "character varying",
            CanonicalType::Boolean => "boolean",
            CanonicalType::TinyInt => "smallint",
            CanonicalType::Integer => "integer",
            CanonicalType::BigInt => "bigint",
            CanonicalType::Numeric | CanonicalType::Decimal => "numeric",
            CanonicalType::Float => "real",
            CanonicalType::Double => "double precision",
            CanonicalType::Date => "date",
            CanonicalType::DateTime | CanonicalType::Timestamp => "timestamp",
            CanonicalType::Time => "time",
            CanonicalType::Text => "text",
            CanonicalType::Blob => "bytea",
            CanonicalType::Set(_) => "text[]",
            CanonicalType::Bit(_) => "varbit",
            CanonicalType::Other(raw) => return Err(unrecognized(column, raw)),
        };
        Ok(name)
    }

    fn type_and_default(&self, column: &Column) -> Result<(String, Option<String>)> {
        let default = column.default.as_deref();
        let tz_suffix = if self.options.timezone {
            "with time zone"
        } else {
            "without time zone"
        };

        let pair = match &column.data_type {
            CanonicalType::Char => (
                format!("character({})", column.length.unwrap_or(1)),
                default.map(|d| format!(" DEFAULT {}::char", quote_literal(d))),
            ),
            CanonicalType::Varchar => (
                match column.length {
                    Some(len) => format!("character varying({})", len),
                    None => "character varying".to_string(),
                },
                default.map(|d| format!(" DEFAULT {}::character varying", quote_literal(d))),
            ),
            CanonicalType::TinyInt => ("smallint".to_string(), literal_default(default)),
            CanonicalType::Integer => ("integer".to_string(), literal_default(default)),
            CanonicalType::BigInt => ("bigint".to_string(), literal_default(default)),
            CanonicalType::Float => ("real".to_string(), literal_default(default)),
            CanonicalType::Double => ("double precision".to_string(), literal_default(default)),
            CanonicalType::Numeric | CanonicalType::Decimal => (
                format!(
                    "numeric({}, {})",
                    column.length.unwrap_or(20),
                    column.scale.unwrap_or(0)
                ),
                literal_default(default),
            ),
            CanonicalType::Boolean => (
                "boolean".to_string(),
                default.map(|d| {
                    if is_truthy_literal(d) {
                        " DEFAULT true".to_string()
                    } else {
                        " DEFAULT false".to_string()
                    }
                }),
            ),
            CanonicalType::DateTime | CanonicalType::Timestamp => (
                format!("timestamp {}", tz_suffix),
                default.map(|d| self.timestamp_default(d)),
            ),
            CanonicalType::Date => ("date".to_string(), default.map(date_default)),
            CanonicalType::Time => (
                format!("time {}", tz_suffix),
                default.map(|_| " DEFAULT NOW()".to_string()),
            ),
            CanonicalType::Text => (
                "text".to_string(),
                default.map(|d| format!(" DEFAULT {}", quote_literal(d))),
            ),
            CanonicalType::Blob => (
                "bytea".to_string(),
                default.map(|d| format!(" DEFAULT {}", quote_literal(d))),
            ),
            CanonicalType::Enum(values) => {
                let width = values
                    .iter()
                    .map(|v| v.chars().count())
                    .max()
                    .unwrap_or(0)
                    .max(1);
                let allowed: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
                (
                    format!(
                        "character varying({}) check({} in ({}))",
                        width,
                        quote_pg(&column.name)?,
                        allowed.join(",")
                    ),
                    default.map(|d| format!(" DEFAULT {}::character varying", quote_literal(d))),
                )
            }
            CanonicalType::Set(_) => ("text[]".to_string(), default.map(set_default)),
            CanonicalType::Bit(width) => (
                format!("varbit({})", width),
                default
                    .filter(|d| !d.is_empty())
                    .map(|d| format!(" DEFAULT {}", d.to_uppercase())),
            ),
            CanonicalType::Other(raw) => return Err(unrecognized(column, raw)),
        };

        Ok(pair)
    }

    fn timestamp_default(&self, default: &str) -> String {
        let lower = default.to_lowercase();
        if lower.contains("current_timestamp") || lower.starts_with("now(") {
            return " DEFAULT CURRENT_TIMESTAMP".to_string();
        }
        if default.contains("0000-00-00 00:00") {
            return if self.options.timezone {
                format!(" DEFAULT '{}'", EPOCH_TZ)
            } else if default.contains("0000-00-00 00:00:00") {
                format!(" DEFAULT '{}'", EPOCH_NAIVE)
            } else {
                " DEFAULT '1970-01-01 00:00'".to_string()
            };
        }
        format!(" DEFAULT {}", quote_literal(default))
    }

    /// Drop, create and seed the sequences backing auto-increment columns.
    ///
    /// The sequence is seeded with `is_called = false` so the first
    /// `nextval` returns exactly one past the highest migrated value.
    pub fn sequence_statements(&self, table: &Table) -> Result<Vec<String>> {
        let mut sql = Vec::new();
        for column in table.auto_increment_columns() {
            let seq = quote_pg(&column.sequence_name())?;
            sql.push(format!("DROP SEQUENCE IF EXISTS {} CASCADE;", seq));
            sql.push(format!(
                "CREATE SEQUENCE {} INCREMENT BY 1 NO MAXVALUE NO MINVALUE CACHE 1;",
                seq
            ));
            sql.push(reseed_statement(column)?);
        }
        Ok(sql)
    }

    /// Drop and recreate the table, followed by its comments.
    pub fn table_statements(&self, table: &Table) -> Result<Vec<String>> {
        let table_name = quote_pg(&table.name)?;
        let columns = table
            .columns
            .iter()
            .map(|c| self.column_description(c).map(|d| format!("  {}", d)))
            .collect::<Result<Vec<_>>>()?;

        let mut sql = vec![
            format!("DROP TABLE IF EXISTS {} CASCADE;", table_name),
            format!("CREATE TABLE {} (\n{}\n);", table_name, columns.join(",\n")),
        ];
        sql.extend(self.comment_statements(table)?);
        Ok(sql)
    }

    /// `COMMENT ON` statements for the table and its columns.
    pub fn comment_statements(&self, table: &Table) -> Result<Vec<String>> {
        let table_name = quote_pg(&table.name)?;
        let mut sql = Vec::new();

        if let Some(comment) = table.comment.as_deref().filter(|c| !c.is_empty()) {
            sql.push(format!(
                "COMMENT ON TABLE {} IS {};",
                table_name,
                quote_literal(comment)
            ));
        }
        for column in &table.columns {
            if let Some(comment) = column.comment.as_deref().filter(|c| !c.is_empty()) {
                sql.push(format!(
                    "COMMENT ON COLUMN {}.{} IS {};",
                    table_name,
                    quote_pg(&column.name)?,
                    quote_literal(comment)
                ));
            }
        }

        Ok(sql)
    }

    /// Truncate the table and reseed its sequences, for reloading data into
    /// an existing schema.
    pub fn truncate_statements(&self, table: &Table) -> Result<Vec<String>> {
        let mut sql = vec![format!("TRUNCATE {} CASCADE;", quote_pg(&table.name)?)];
        for column in table.auto_increment_columns() {
            sql.push(reseed_statement(column)?);
        }
        Ok(sql)
    }

    /// Name of a generated index: `<prefix><table>_<col1_col2_..>`.
    pub fn index_name(&self, table: &Table, index: &Index) -> String {
        format!(
            "{}{}_{}",
            self.options.index_prefix,
            table.name,
            index.columns().join("_")
        )
    }

    /// Primary key constraint and secondary indexes, each preceded by a drop.
    pub fn index_statements(&self, table: &Table) -> Result<Vec<String>> {
        let table_name = quote_pg(&table.name)?;
        let mut sql = Vec::new();

        if let Some(pk) = table.indexes.iter().find(|idx| idx.is_primary()) {
            let constraint = quote_pg(&format!("{}_pkey", self.index_name(table, pk)))?;
            sql.push(format!(
                "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
                table_name, constraint
            ));
            sql.push(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({});",
                table_name,
                constraint,
                quote_columns(pk.columns())?
            ));
        }

        // Names derive from the column list, so indexes over the same
        // columns collide; a unique definition outranks a plain one.
        let mut chosen: Vec<(String, &Index)> = Vec::new();
        for index in table.secondary_indexes() {
            let name = self.index_name(table, index);
            match chosen.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => {
                    if index.is_unique() && !slot.1.is_unique() {
                        slot.1 = index;
                    }
                    warn!(
                        "Table {}: indexes over the same columns share the name {}, keeping the {} definition",
                        table.name,
                        name,
                        if slot.1.is_unique() { "unique" } else { "non-unique" }
                    );
                }
                None => chosen.push((name, index)),
            }
        }

        for (name, index) in chosen {
            let quoted = quote_pg(&name)?;
            let unique = if index.is_unique() { "UNIQUE " } else { "" };
            sql.push(format!("DROP INDEX IF EXISTS {} CASCADE;", quoted));
            sql.push(format!(
                "CREATE {}INDEX {} ON {} ({});",
                unique,
                quoted,
                table_name,
                quote_columns(index.columns())?
            ));
        }

        Ok(sql)
    }

    /// Foreign key constraints, each preceded by a drop.
    pub fn foreign_key_statements(&self, table: &Table) -> Result<Vec<String>> {
        let table_name = quote_pg(&table.name)?;
        let mut sql = Vec::new();

        for fk in &table.foreign_keys {
            let name = quote_pg(&fk.name)?;
            sql.push(format!(
                "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
                table_name, name
            ));
            sql.push(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({});",
                table_name,
                name,
                quote_pg(&fk.column)?,
                quote_pg(&fk.ref_table)?,
                quote_pg(&fk.ref_column)?
            ));
        }

        Ok(sql)
    }

    /// Trigger functions and triggers.
    ///
    /// Each source trigger becomes a PL/pgSQL function `fn_<name>()` wrapping
    /// the normalized body and a row-level trigger calling it.
    pub fn trigger_statements(&self, table: &Table) -> Result<Vec<String>> {
        let table_name = quote_pg(&table.name)?;
        let mut sql = Vec::new();

        for trigger in &table.triggers {
            let name = quote_pg(&trigger.name)?;
            let function = quote_pg(&format!("fn_{}", trigger.name))?;
            let returns = match (trigger.timing, trigger.event) {
                (TriggerTiming::Before, TriggerEvent::Delete) => "OLD",
                (TriggerTiming::Before, _) => "NEW",
                (TriggerTiming::After, _) => "NULL",
            };

            sql.push(format!("DROP TRIGGER IF EXISTS {} ON {};", name, table_name));
            sql.push(format!(
                "CREATE OR REPLACE FUNCTION {}() RETURNS TRIGGER AS $trigger$\nBEGIN\n{}\nRETURN {};\nEND;\n$trigger$ LANGUAGE plpgsql;",
                function,
                trigger.statement.trim(),
                returns
            ));
            sql.push(format!(
                "CREATE TRIGGER {} {} {} ON {} FOR EACH ROW EXECUTE PROCEDURE {}();",
                name, trigger.timing, trigger.event, table_name, function
            ));
        }

        Ok(sql)
    }
}

fn unrecognized(column: &Column, raw: &str) -> MigrateError {
    MigrateError::UnrecognizedType {
        table: column.table_name.clone(),
        column: column.name.clone(),
        type_name: raw.to_string(),
    }
}

fn reseed_statement(column: &Column) -> Result<String> {
    Ok(format!(
        "SELECT pg_catalog.setval({}, {}, false);",
        quote_literal(&quote_pg(&column.sequence_name())?),
        column.next_sequence_value()
    ))
}

fn quote_columns(columns: &[String]) -> Result<String> {
    Ok(columns
        .iter()
        .map(|c| quote_pg(c))
        .collect::<Result<Vec<_>>>()?
        .join(", "))
}

/// Numeric defaults are copied through unquoted.
fn literal_default(default: Option<&str>) -> Option<String> {
    default.map(|d| format!(" DEFAULT {}", d))
}

fn is_truthy_literal(default: &str) -> bool {
    matches!(
        default.trim().to_lowercase().as_str(),
        "1" | "b'1'" | "true"
    )
}

fn date_default(default: &str) -> String {
    let lower = default.to_lowercase();
    if default.starts_with("0000-00-00") {
        " DEFAULT '1970-01-01'".to_string()
    } else if lower.contains("curdate") || lower.contains("current_date") {
        " DEFAULT CURRENT_DATE".to_string()
    } else {
        format!(" DEFAULT {}", quote_literal(default))
    }
}

/// `a,c` becomes `ARRAY['a','c']::text[]`; an empty default is the empty array.
fn set_default(default: &str) -> String {
    if default.is_empty() {
        return " DEFAULT '{}'::text[]".to_string();
    }
    let members: Vec<String> = default.split(',').map(quote_literal).collect();
    format!(" DEFAULT ARRAY[{}]::text[]", members.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ForeignKey, Trigger};
    use pretty_assertions::assert_eq;

    fn column(name: &str, data_type: CanonicalType) -> Column {
        Column {
            name: name.to_string(),
            table_name: "items".to_string(),
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

    fn generator() -> PgDdlGenerator {
        PgDdlGenerator::default()
    }

    #[test]
    fn test_char_with_default() {
        let mut col = column("flag", CanonicalType::Char);
        col.length = Some(1);
        col.is_nullable = false;
        col.default = Some("Y".into());
        assert_eq!(
            generator().column_description(&col).unwrap(),
            "\"flag\" character(1) DEFAULT 'Y'::char NOT NULL"
        );
    }

    #[test]
    fn test_varchar_and_numeric() {
        let mut col = column("title", CanonicalType::Varchar);
        col.length = Some(80);
        col.default = Some("n/a".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "character varying(80) DEFAULT 'n/a'::character varying"
        );

        let mut col = column("amount", CanonicalType::Decimal);
        col.length = Some(10);
        col.scale = Some(2);
        col.default = Some("0.00".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "numeric(10, 2) DEFAULT 0.00"
        );

        let col = column("big", CanonicalType::Numeric);
        assert_eq!(generator().column_type_info(&col).unwrap(), "numeric(20, 0)");
    }

    #[test]
    fn test_integer_family() {
        let mut col = column("qty", CanonicalType::TinyInt);
        col.default = Some("0".into());
        col.is_nullable = false;
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "smallint DEFAULT 0 NOT NULL"
        );
        let col = column("n", CanonicalType::BigInt);
        assert_eq!(generator().column_type_info(&col).unwrap(), "bigint");
    }

    #[test]
    fn test_boolean_default() {
        let mut col = column("active", CanonicalType::Boolean);
        col.default = Some("1".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "boolean DEFAULT true"
        );
        col.default = Some("0".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "boolean DEFAULT false"
        );
        col.default = Some("b'1'".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "boolean DEFAULT true"
        );
    }

    #[test]
    fn test_timestamp_zero_date_default() {
        let mut col = column("created", CanonicalType::Timestamp);
        col.default = Some("0000-00-00 00:00:00".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "timestamp without time zone DEFAULT '1970-01-01 00:00:00'"
        );

        let tz = PgDdlGenerator::new(DdlOptions {
            timezone: true,
            ..Default::default()
        });
        assert_eq!(
            tz.column_type_info(&col).unwrap(),
            "timestamp with time zone DEFAULT '1970-01-01T00:00:00.000000+00:00'"
        );
    }

    #[test]
    fn test_timestamp_current_default() {
        let mut col = column("updated", CanonicalType::DateTime);
        col.default = Some("current_timestamp()".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "timestamp without time zone DEFAULT CURRENT_TIMESTAMP"
        );
        col.default = Some("2020-01-01 10:00:00".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "timestamp without time zone DEFAULT '2020-01-01 10:00:00'"
        );
    }

    #[test]
    fn test_time_and_date_defaults() {
        let mut col = column("opens", CanonicalType::Time);
        col.default = Some("09:00:00".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "time without time zone DEFAULT NOW()"
        );

        let mut col = column("day", CanonicalType::Date);
        col.default = Some("0000-00-00".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "date DEFAULT '1970-01-01'"
        );
    }

    #[test]
    fn test_enum_column() {
        let mut col = column(
            "size",
            CanonicalType::Enum(vec!["small".into(), "it's".into(), "xl".into()]),
        );
        col.default = Some("small".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "character varying(5) check(\"size\" in ('small','it''s','xl')) DEFAULT 'small'::character varying"
        );
    }

    #[test]
    fn test_set_and_bit_columns() {
        let mut col = column(
            "tags",
            CanonicalType::Set(vec!["a".into(), "b".into(), "c".into()]),
        );
        col.default = Some("a,c".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "text[] DEFAULT ARRAY['a','c']::text[]"
        );
        col.default = Some(String::new());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "text[] DEFAULT '{}'::text[]"
        );

        let mut col = column("mask", CanonicalType::Bit(8));
        col.default = Some("b'101'".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "varbit(8) DEFAULT B'101'"
        );
    }

    #[test]
    fn test_blob_and_text() {
        assert_eq!(
            generator()
                .column_type_info(&column("data", CanonicalType::Blob))
                .unwrap(),
            "bytea"
        );
        assert_eq!(
            generator()
                .column_type_info(&column("body", CanonicalType::Text))
                .unwrap(),
            "text"
        );
    }

    #[test]
    fn test_auto_increment_overrides_default() {
        let mut col = column("id", CanonicalType::Integer);
        col.is_auto_increment = true;
        col.default = Some("5".into());
        assert_eq!(
            generator().column_type_info(&col).unwrap(),
            "integer DEFAULT nextval('\"items_id_seq\"'::regclass) NOT NULL"
        );
    }

    #[test]
    fn test_unrecognized_type_is_fatal() {
        let col = column("shape", CanonicalType::Other("geometry".into()));
        let err = generator().column_type_info(&col).unwrap_err();
        assert!(matches!(err, MigrateError::UnrecognizedType { .. }));
        assert!(generator().base_type_name(&col).is_err());
    }

    fn items_table() -> Table {
        let mut table = Table::new("items");
        let mut id = column("id", CanonicalType::Integer);
        id.is_auto_increment = true;
        id.is_primary_key = true;
        id.max_value = Some(41);
        let mut part = column("part", CanonicalType::Integer);
        part.is_nullable = false;
        part.comment = Some("partition".into());
        table.columns = vec![id, part];
        table.comment = Some("Items' table".into());
        table.indexes = vec![
            Index::Primary {
                columns: vec!["id".into(), "part".into()],
            },
            Index::Secondary {
                name: "idx_part".into(),
                columns: vec!["part".into()],
                is_unique: true,
            },
        ];
        table.foreign_keys = vec![ForeignKey {
            name: "fk_part".into(),
            column: "part".into(),
            ref_table: "parts".into(),
            ref_column: "id".into(),
        }];
        table
    }

    #[test]
    fn test_table_statements() {
        let sql = generator().table_statements(&items_table()).unwrap();
        assert_eq!(
            sql,
            vec![
                "DROP TABLE IF EXISTS \"items\" CASCADE;".to_string(),
                "CREATE TABLE \"items\" (\n  \"id\" integer DEFAULT nextval('\"items_id_seq\"'::regclass) NOT NULL,\n  \"part\" integer NOT NULL\n);".to_string(),
                "COMMENT ON TABLE \"items\" IS 'Items'' table';".to_string(),
                "COMMENT ON COLUMN \"items\".\"part\" IS 'partition';".to_string(),
            ]
        );
    }

    #[test]
    fn test_regeneration_is_identical() {
        let table = items_table();
        let ddl = generator();
        assert_eq!(
            ddl.table_statements(&table).unwrap(),
            ddl.table_statements(&table).unwrap()
        );
        assert_eq!(
            ddl.index_statements(&table).unwrap(),
            ddl.index_statements(&table).unwrap()
        );
    }

    #[test]
    fn test_sequence_statements() {
        let mut table = items_table();
        assert_eq!(
            generator().sequence_statements(&table).unwrap(),
            vec![
                "DROP SEQUENCE IF EXISTS \"items_id_seq\" CASCADE;".to_string(),
                "CREATE SEQUENCE \"items_id_seq\" INCREMENT BY 1 NO MAXVALUE NO MINVALUE CACHE 1;"
                    .to_string(),
                "SELECT pg_catalog.setval('\"items_id_seq\"', 42, false);".to_string(),
            ]
        );

        // Empty table seeds at 1
        table.columns[0].max_value = None;
        let sql = generator().sequence_statements(&table).unwrap();
        assert_eq!(sql[2], "SELECT pg_catalog.setval('\"items_id_seq\"', 1, false);");
    }

    #[test]
    fn test_truncate_statements() {
        assert_eq!(
            generator().truncate_statements(&items_table()).unwrap(),
            vec![
                "TRUNCATE \"items\" CASCADE;".to_string(),
                "SELECT pg_catalog.setval('\"items_id_seq\"', 42, false);".to_string(),
            ]
        );
    }

    #[test]
    fn test_index_statements_with_prefix() {
        let ddl = PgDdlGenerator::new(DdlOptions {
            index_prefix: "mg_".into(),
            timezone: false,
        });
        assert_eq!(
            ddl.index_statements(&items_table()).unwrap(),
            vec![
                "ALTER TABLE \"items\" DROP CONSTRAINT IF EXISTS \"mg_items_id_part_pkey\";".to_string(),
                "ALTER TABLE \"items\" ADD CONSTRAINT \"mg_items_id_part_pkey\" PRIMARY KEY (\"id\", \"part\");".to_string(),
                "DROP INDEX IF EXISTS \"mg_items_part\" CASCADE;".to_string(),
                "CREATE UNIQUE INDEX \"mg_items_part\" ON \"items\" (\"part\");".to_string(),
            ]
        );
    }

    #[test]
    fn test_same_column_indexes_keep_unique_definition() {
        let mut table = items_table();
        table.indexes = vec![
            Index::Secondary {
                name: "idx_part".into(),
                columns: vec!["part".into()],
                is_unique: false,
            },
            Index::Secondary {
                name: "uniq_part".into(),
                columns: vec!["part".into()],
                is_unique: true,
            },
        ];
        assert_eq!(
            generator().index_statements(&table).unwrap(),
            vec![
                "DROP INDEX IF EXISTS \"items_part\" CASCADE;".to_string(),
                "CREATE UNIQUE INDEX \"items_part\" ON \"items\" (\"part\");".to_string(),
            ]
        );
    }

    #[test]
    fn test_foreign_key_statements() {
        assert_eq!(
            generator().foreign_key_statements(&items_table()).unwrap(),
            vec![
                "ALTER TABLE \"items\" DROP CONSTRAINT IF EXISTS \"fk_part\";".to_string(),
                "ALTER TABLE \"items\" ADD CONSTRAINT \"fk_part\" FOREIGN KEY (\"part\") REFERENCES \"parts\" (\"id\");".to_string(),
            ]
        );
    }

    #[test]
    fn test_trigger_statements() {
        let mut table = Table::new("items");
        table.triggers.push(Trigger {
            name: "trg_touch".into(),
            event: TriggerEvent::Update,
            timing: TriggerTiming::Before,
            statement: "\nNEW.updated := NOW();\n".into(),
        });

        let sql = generator().trigger_statements(&table).unwrap();
        assert_eq!(sql.len(), 3);
        assert_eq!(sql[0], "DROP TRIGGER IF EXISTS \"trg_touch\" ON \"items\";");
        assert_eq!(
            sql[1],
            "CREATE OR REPLACE FUNCTION \"fn_trg_touch\"() RETURNS TRIGGER AS $trigger$\nBEGIN\nNEW.updated := NOW();\nRETURN NEW;\nEND;\n$trigger$ LANGUAGE plpgsql;"
        );
        assert_eq!(
            sql[2],
            "CREATE TRIGGER \"trg_touch\" BEFORE UPDATE ON \"items\" FOR EACH ROW EXECUTE PROCEDURE \"fn_trg_touch\"();"
        );
    }
}
