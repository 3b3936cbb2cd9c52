//! Parser for per-entity XSD declarations.
//!
//! The schema export describes each table as a nested `xs:element`
//! pair (document root, then the repeated row element) whose columns
//! are `xs:attribute` declarations with a base type and optional
//! length/digit facets. Only the pieces the catalog needs are read;
//! annotations and documentation nodes are skipped.

use std::io::{BufReader, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::SchemaError;
use crate::schema::{ColumnDefinition, ColumnType};

#[derive(Debug)]
pub(super) struct ParsedEntity {
    pub root_tag: String,
    pub row_tag: String,
    pub columns: Vec<ColumnDefinition>,
}

/// Column under construction while its facet children are read.
#[derive(Default)]
struct PendingColumn {
    name: String,
    base: Option<String>,
    required: bool,
    length: Option<u32>,
    precision: Option<u32>,
    scale: Option<u32>,
}

pub(super) fn parse_entity(
    entity: &str,
    input: &mut dyn Read,
) -> Result<ParsedEntity, SchemaError> {
    let mut reader = Reader::from_reader(BufReader::new(input));
    let mut buf = Vec::new();

    let malformed = |message: String| SchemaError::MalformedEntity {
        entity: entity.to_string(),
        message,
    };

    // Names of the xs:element nesting currently open, outermost first.
    let mut element_stack: Vec<String> = Vec::new();
    let mut root_tag: Option<String> = None;
    let mut row_tag: Option<String> = None;
    let mut columns: Vec<ColumnDefinition> = Vec::new();
    let mut pending: Option<PendingColumn> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| malformed(e.to_string()))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match local_name(e) {
                    "element" => {
                        if let Some(name) = attr_value(e, "name").map_err(&malformed)? {
                            if root_tag.is_none() {
                                root_tag = Some(name.clone());
                            }
                            if !is_empty {
                                element_stack.push(name);
                            }
                        }
                    }
                    "attribute" => {
                        let name = attr_value(e, "name")
                            .map_err(&malformed)?
                            .ok_or_else(|| malformed("xs:attribute without name".to_string()))?;
                        if row_tag.is_none() {
                            row_tag = element_stack.last().cloned();
                        }
                        let column = PendingColumn {
                            name,
                            base: attr_value(e, "type").map_err(&malformed)?,
                            required: attr_value(e, "use").map_err(&malformed)?.as_deref()
                                == Some("required"),
                            ..PendingColumn::default()
                        };
                        if is_empty {
                            columns.push(finish_column(entity, column)?);
                        } else {
                            pending = Some(column);
                        }
                    }
                    "restriction" => {
                        if let Some(col) = pending.as_mut() {
                            if let Some(base) = attr_value(e, "base").map_err(&malformed)? {
                                col.base = Some(base);
                            }
                        }
                    }
                    "maxLength" | "length" => {
                        if let Some(col) = pending.as_mut() {
                            col.length = facet_value(e).map_err(&malformed)?;
                        }
                    }
                    "totalDigits" => {
                        if let Some(col) = pending.as_mut() {
                            col.precision = facet_value(e).map_err(&malformed)?;
                        }
                    }
                    "fractionDigits" => {
                        if let Some(col) = pending.as_mut() {
                            col.scale = facet_value(e).map_err(&malformed)?;
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match local_name_end(e.name().into_inner()) {
                "element" => {
                    element_stack.pop();
                }
                "attribute" => {
                    if let Some(col) = pending.take() {
                        columns.push(finish_column(entity, col)?);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if columns.is_empty() {
        return Err(SchemaError::EmptyEntity {
            entity: entity.to_string(),
        });
    }

    let root_tag = root_tag.ok_or_else(|| malformed("no root element declared".to_string()))?;
    let row_tag = row_tag.ok_or_else(|| malformed("no row element declared".to_string()))?;

    Ok(ParsedEntity {
        root_tag,
        row_tag,
        columns,
    })
}

fn finish_column(entity: &str, col: PendingColumn) -> Result<ColumnDefinition, SchemaError> {
    let base = col.base.as_deref().unwrap_or("xs:string");
    let base = base.rsplit(':').next().unwrap_or(base);

    let (semantic, precision) = match base {
        "string" => {
            // Fixed 36-character strings are GUID references.
            if col.length == Some(36) {
                (ColumnType::Guid, None)
            } else {
                (ColumnType::Text, None)
            }
        }
        // Precision drives the rendered width; 32-bit bases stay at 9
        // digits so they land below the BIGINT boundary.
        "long" => (ColumnType::Integer, Some(col.precision.unwrap_or(19))),
        "int" | "integer" => (ColumnType::Integer, Some(col.precision.unwrap_or(9))),
        "short" => (ColumnType::Integer, Some(col.precision.unwrap_or(5))),
        "byte" => (ColumnType::Integer, Some(col.precision.unwrap_or(3))),
        "decimal" => (ColumnType::Decimal, col.precision),
        "boolean" => (ColumnType::Boolean, None),
        "date" | "dateTime" => (ColumnType::DateTime, None),
        other => {
            return Err(SchemaError::MalformedEntity {
                entity: entity.to_string(),
                message: format!("unsupported base type {other} for attribute {}", col.name),
            });
        }
    };

    Ok(ColumnDefinition {
        name: col.name.to_ascii_lowercase(),
        attribute: col.name,
        semantic,
        required: col.required,
        length: col.length,
        precision,
        scale: col.scale,
    })
}

fn local_name<'a>(e: &'a BytesStart<'a>) -> &'a str {
    local_name_end(e.name().into_inner())
}

fn local_name_end(raw: &[u8]) -> &str {
    let name = std::str::from_utf8(raw).unwrap_or("");
    name.rsplit(':').next().unwrap_or(name)
}

fn attr_value(e: &BytesStart<'_>, key: &str) -> Result<Option<String>, String> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let name = local_name_end(attr.key.as_ref());
        if name == key {
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn facet_value(e: &BytesStart<'_>) -> Result<Option<u32>, String> {
    match attr_value(e, "value")? {
        Some(v) => v
            .parse::<u32>()
            .map(Some)
            .map_err(|_| format!("non-numeric facet value {v}")),
        None => Ok(None),
    }
}
