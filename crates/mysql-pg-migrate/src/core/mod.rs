//! Core abstractions for the migration engine.
//!
//! - [`schema`]: Table, column, index, foreign key and trigger metadata
//! - [`value`]: runtime values delivered by the source reader
//! - [`identifier`]: identifier and literal quoting
//! - [`traits`]: source reader and target writer seams

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{
    CanonicalType, Column, ForeignKey, Index, SourceColumn, Table, Trigger, TriggerEvent,
    TriggerTiming,
};
pub use traits::{RowStream, SourceReader, TargetWriter};
pub use value::SqlValue;
