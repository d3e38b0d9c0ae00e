//! Schema and metadata types for tables, columns, indexes, foreign keys and triggers.
//!
//! These types are the canonical, dialect-neutral description of a source
//! table. They are built once per run by the source reader and only read
//! afterwards by the DDL generator and the row transcoder.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical, dialect-neutral column type.
///
/// Every source type string resolves to exactly one member. Strings the
/// normalizer does not recognize are kept verbatim in [`CanonicalType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalType {
    Char,
    Varchar,
    Boolean,
    TinyInt,
    Integer,
    BigInt,
    Numeric,
    Decimal,
    Float,
    Double,
    Date,
    DateTime,
    Timestamp,
    Time,
    Text,
    Blob,
    /// Enumerated string with its allowed values (quotes already unescaped).
    Enum(Vec<String>),
    /// MySQL SET with its allowed members.
    Set(Vec<String>),
    /// Bit string of the given width (width > 1; `bit(1)` is boolean).
    Bit(u32),
    /// Unrecognized source type, passed through unchanged.
    Other(String),
}

impl CanonicalType {
    /// Integer family: the only types an auto-increment column may carry.
    pub fn is_integer_family(&self) -> bool {
        matches!(
            self,
            CanonicalType::TinyInt | CanonicalType::Integer | CanonicalType::BigInt
        )
    }

    /// Date-and-time types that get the zero-date epoch substitution.
    pub fn is_timestamp_family(&self) -> bool {
        matches!(self, CanonicalType::DateTime | CanonicalType::Timestamp)
    }

    /// Whether the target needs a length (and maybe scale) for this type.
    pub fn is_sized(&self) -> bool {
        matches!(
            self,
            CanonicalType::Char
                | CanonicalType::Varchar
                | CanonicalType::Numeric
                | CanonicalType::Decimal
        )
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalType::Char => f.write_str("char"),
            CanonicalType::Varchar => f.write_str("varchar"),
            CanonicalType::Boolean => f.write_str("boolean"),
            CanonicalType::TinyInt => f.write_str("tinyint"),
            CanonicalType::Integer => f.write_str("integer"),
            CanonicalType::BigInt => f.write_str("bigint"),
            CanonicalType::Numeric => f.write_str("numeric"),
            CanonicalType::Decimal => f.write_str("decimal"),
            CanonicalType::Float => f.write_str("float"),
            CanonicalType::Double => f.write_str("double precision"),
            CanonicalType::Date => f.write_str("date"),
            CanonicalType::DateTime => f.write_str("datetime"),
            CanonicalType::Timestamp => f.write_str("timestamp"),
            CanonicalType::Time => f.write_str("time"),
            CanonicalType::Text => f.write_str("text"),
            CanonicalType::Blob => f.write_str("blob"),
            CanonicalType::Enum(values) => write!(f, "enum({})", values.len()),
            CanonicalType::Set(values) => write!(f, "set({})", values.len()),
            CanonicalType::Bit(width) => write!(f, "bit({})", width),
            CanonicalType::Other(raw) => f.write_str(raw),
        }
    }
}

/// Raw column record as reported by source introspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceColumn {
    /// Column name.
    pub name: String,

    /// Full source type string, e.g. `int(10) unsigned` or `enum('a','b')`.
    pub column_type: String,

    /// Whether the source reports the column as nullable.
    pub is_nullable: bool,

    /// Key flag (`PRI`, `UNI`, `MUL` or empty).
    pub key: String,

    /// Extra flags (`auto_increment`, `on update CURRENT_TIMESTAMP`, ...).
    pub extra: String,

    /// Default literal as reported by the source.
    pub default: Option<String>,

    /// Column comment (empty when absent).
    pub comment: String,
}

/// Table metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column definitions in source order.
    pub columns: Vec<Column>,

    /// Primary and secondary indexes in source order.
    pub indexes: Vec<Index>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,

    /// Triggers attached to the table.
    pub triggers: Vec<Trigger>,

    /// Table comment.
    pub comment: Option<String>,
}

impl Table {
    /// Create an empty table description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Columns of the synthesized primary-key index, if any.
    pub fn primary_key(&self) -> Option<&[String]> {
        self.indexes.iter().find_map(|idx| match idx {
            Index::Primary { columns } => Some(columns.as_slice()),
            Index::Secondary { .. } => None,
        })
    }

    /// Named secondary indexes.
    pub fn secondary_indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.iter().filter(|idx| !idx.is_primary())
    }

    /// Columns backed by a target sequence.
    pub fn auto_increment_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_auto_increment)
    }

    /// Column names in source order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Owning table name.
    pub table_name: String,

    /// Type string as reported by the source.
    pub source_type: String,

    /// Canonical type.
    pub data_type: CanonicalType,

    /// Length (character types) or precision (numeric types).
    pub length: Option<u32>,

    /// Decimal scale.
    pub scale: Option<u32>,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,

    /// Whether the column is auto-increment.
    pub is_auto_increment: bool,

    /// Default literal in source dialect.
    pub default: Option<String>,

    /// Column comment.
    pub comment: Option<String>,

    /// Highest value observed at introspection time (auto-increment only).
    pub max_value: Option<i64>,
}

impl Column {
    /// Name of the target sequence backing an auto-increment column.
    pub fn sequence_name(&self) -> String {
        format!("{}_{}_seq", self.table_name, self.name)
    }

    /// Value the target sequence must hand out next.
    ///
    /// An empty table (or one whose max is below 1) starts at 1.
    pub fn next_sequence_value(&self) -> i64 {
        match self.max_value {
            Some(max) if max >= 1 => max + 1,
            _ => 1,
        }
    }

    /// Whether the column carries a non-empty source default.
    pub fn has_default(&self) -> bool {
        self.default.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// Index metadata: either the primary key or a named secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Index {
    /// The table's primary key.
    Primary { columns: Vec<String> },

    /// Named secondary index.
    Secondary {
        name: String,
        columns: Vec<String>,
        is_unique: bool,
    },
}

impl Index {
    /// Indexed column names.
    pub fn columns(&self) -> &[String] {
        match self {
            Index::Primary { columns } | Index::Secondary { columns, .. } => columns,
        }
    }

    /// Whether this is the primary key.
    pub fn is_primary(&self) -> bool {
        matches!(self, Index::Primary { .. })
    }

    /// Whether the index enforces uniqueness.
    pub fn is_unique(&self) -> bool {
        match self {
            Index::Primary { .. } => true,
            Index::Secondary { is_unique, .. } => *is_unique,
        }
    }
}

/// Foreign key metadata (single column, one direction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Local column name.
    pub column: String,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column name.
    pub ref_column: String,
}

/// Event a trigger fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl FromStr for TriggerEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Ok(TriggerEvent::Insert),
            "UPDATE" => Ok(TriggerEvent::Update),
            "DELETE" => Ok(TriggerEvent::Delete),
            other => Err(format!("unknown trigger event '{}'", other)),
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerEvent::Insert => "INSERT",
            TriggerEvent::Update => "UPDATE",
            TriggerEvent::Delete => "DELETE",
        })
    }
}

/// Whether a trigger fires before or after its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerTiming {
    Before,
    After,
}

impl FromStr for TriggerTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BEFORE" => Ok(TriggerTiming::Before),
            "AFTER" => Ok(TriggerTiming::After),
            other => Err(format!("unknown trigger timing '{}'", other)),
        }
    }
}

impl fmt::Display for TriggerTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerTiming::Before => "BEFORE",
            TriggerTiming::After => "AFTER",
        })
    }
}

/// Trigger metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger name.
    pub name: String,

    /// Firing event.
    pub event: TriggerEvent,

    /// Firing time.
    pub timing: TriggerTiming,

    /// Body statements with BEGIN/END and identifier quoting removed.
    pub statement: String,
}
