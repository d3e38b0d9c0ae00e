//! Metadata extraction from `SHOW CREATE TABLE` text and trigger listings.
//!
//! Only lines carrying a ` KEY ` marker are inspected. Each such line is
//! classified into exactly one [`KeyLine`] variant, tried in a fixed order:
//! foreign key, named secondary key, primary key. Lines matching none of the
//! shapes are reported and skipped.

mod tokenizer;

use tracing::warn;

use crate::core::schema::{ForeignKey, Index, Trigger, TriggerEvent, TriggerTiming};
use crate::error::{MigrateError, Result};

use tokenizer::{tokenize, Token};

/// Marker a create-table line must contain to be inspected.
const KEY_MARKER: &str = " KEY ";

/// Classification of one key-declaration line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLine {
    /// `CONSTRAINT `name` FOREIGN KEY (`col`) REFERENCES `table` (`col`)`
    ForeignKey(ForeignKey),
    /// `[UNIQUE|FULLTEXT|SPATIAL] KEY `name` (`col`, ...)`
    SecondaryIndex(Index),
    /// `PRIMARY KEY (`col`, ...)`
    PrimaryKey(Index),
    /// Carries the key marker but matches none of the shapes above.
    Unrecognized,
}

/// Indexes and foreign keys extracted from one create-table statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedKeys {
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    /// Key lines that were skipped, verbatim (trimmed).
    pub unrecognized: Vec<String>,
}

/// Classify a single line. Returns `None` for lines without the key marker
/// and for column definitions, which open with a quoted identifier.
pub fn classify_line(line: &str) -> Option<KeyLine> {
    if !line.contains(KEY_MARKER) {
        return None;
    }

    let tokens = tokenize(line);
    if matches!(tokens.first(), Some(Token::Ident(_))) {
        return None;
    }

    let classified = match_foreign_key(&tokens)
        .map(KeyLine::ForeignKey)
        .or_else(|| match_secondary_key(&tokens).map(KeyLine::SecondaryIndex))
        .or_else(|| match_primary_key(&tokens).map(KeyLine::PrimaryKey))
        .unwrap_or(KeyLine::Unrecognized);

    Some(classified)
}

/// Extract indexes and foreign keys from a `SHOW CREATE TABLE` statement.
pub fn parse_create_table(table: &str, create_sql: &str) -> ParsedKeys {
    let mut parsed = ParsedKeys::default();

    for line in create_sql.lines() {
        match classify_line(line) {
            None => {}
            Some(KeyLine::ForeignKey(fk)) => parsed.foreign_keys.push(fk),
            Some(KeyLine::SecondaryIndex(idx)) | Some(KeyLine::PrimaryKey(idx)) => {
                parsed.indexes.push(idx)
            }
            Some(KeyLine::Unrecognized) => {
                let trimmed = line.trim().trim_end_matches(',').to_string();
                warn!(
                    "Table {}: skipping unsupported key declaration: {}",
                    table, trimmed
                );
                parsed.unrecognized.push(trimmed);
            }
        }
    }

    parsed
}

fn match_foreign_key(tokens: &[Token]) -> Option<ForeignKey> {
    tokens.windows(12).find_map(|w| match w {
        [constraint, Token::Ident(name), foreign, key, Token::LParen, Token::Ident(column), Token::RParen, references, Token::Ident(ref_table), Token::LParen, Token::Ident(ref_column), Token::RParen]
            if constraint.is_keyword("CONSTRAINT")
                && foreign.is_keyword("FOREIGN")
                && key.is_keyword("KEY")
                && references.is_keyword("REFERENCES") =>
        {
            Some(ForeignKey {
                name: name.clone(),
                column: column.clone(),
                ref_table: ref_table.clone(),
                ref_column: ref_column.clone(),
            })
        }
        _ => None,
    })
}

fn match_secondary_key(tokens: &[Token]) -> Option<Index> {
    let pos = tokens.windows(3).position(|w| {
        w[0].is_keyword("KEY") && matches!(w[1], Token::Ident(_)) && w[2] == Token::LParen
    })?;

    let name = tokens[pos + 1].name()?.to_string();
    let columns = column_list(&tokens[pos + 3..])?;
    let is_unique = tokens[..pos].iter().any(|t| t.is_keyword("UNIQUE"));

    Some(Index::Secondary {
        name,
        columns,
        is_unique,
    })
}

fn match_primary_key(tokens: &[Token]) -> Option<Index> {
    let pos = tokens.windows(3).position(|w| {
        w[0].is_keyword("PRIMARY") && w[1].is_keyword("KEY") && w[2] == Token::LParen
    })?;

    let columns = column_list(&tokens[pos + 3..])?;
    Some(Index::Primary { columns })
}

/// Parse a parenthesized column list whose opening paren was already
/// consumed. Each element contributes its leading name; trailing length
/// qualifiers such as `(10)` and ASC/DESC are dropped.
fn column_list(tokens: &[Token]) -> Option<Vec<String>> {
    let mut columns = Vec::new();
    let mut depth = 0usize;
    let mut current: Option<String> = None;
    let mut element_started = false;

    for token in tokens {
        match token {
            Token::LParen => depth += 1,
            Token::RParen if depth == 0 => {
                columns.push(current.take()?);
                return Some(columns);
            }
            Token::RParen => depth -= 1,
            Token::Comma if depth == 0 => {
                columns.push(current.take()?);
                element_started = false;
            }
            other if depth == 0 && !element_started => {
                current = Some(other.name()?.to_string());
                element_started = true;
            }
            _ => {}
        }
    }

    // Unbalanced list
    None
}

/// Build a trigger from a source trigger listing row.
pub fn parse_trigger(name: &str, event: &str, timing: &str, statement: &str) -> Result<Trigger> {
    let event: TriggerEvent = event
        .parse()
        .map_err(|e| MigrateError::SchemaExtraction(format!("trigger {}: {}", name, e)))?;
    let timing: TriggerTiming = timing
        .parse()
        .map_err(|e| MigrateError::SchemaExtraction(format!("trigger {}: {}", name, e)))?;

    Ok(Trigger {
        name: name.to_string(),
        event,
        timing,
        statement: normalize_trigger_body(statement),
    })
}

/// Make a trigger body runnable inside a PL/pgSQL block.
///
/// Removes the leading `BEGIN` token, every line consisting only of the
/// closing `END` (at column 0, optionally followed by `;`), and all backtick
/// identifier quoting.
pub fn normalize_trigger_body(statement: &str) -> String {
    let body = strip_leading_token(statement, "BEGIN");

    let lines: Vec<&str> = body
        .split('\n')
        .map(|line| {
            let rest = line.trim_end().trim_end_matches(';');
            if rest.eq_ignore_ascii_case("END") {
                ""
            } else {
                line
            }
        })
        .collect();

    lines.join("\n").replace('`', "")
}

fn strip_leading_token<'a>(text: &'a str, token: &str) -> &'a str {
    let Some(head) = text.get(..token.len()) else {
        return text;
    };
    if !head.eq_ignore_ascii_case(token) {
        return text;
    }
    let rest = &text[token.len()..];
    match rest.chars().next() {
        Some(c) if c.is_alphanumeric() || c == '_' => text,
        _ => rest,
    }
}
