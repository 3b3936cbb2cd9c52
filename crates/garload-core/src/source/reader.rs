//! Single-pass XML table reader.

use std::collections::HashMap;
use std::io::{BufReader, Read};
use std::ops::ControlFlow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::schema::TableDefinition;

use super::{Batch, ParsePolicy, Record};

/// Totals for one table file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Records materialized into batches.
    pub rows: u64,
    /// Malformed row elements dropped under [`ParsePolicy::SkipElement`].
    pub skipped: u64,
}

/// Streams row elements of one table into bounded [`Batch`]es.
pub struct TableReader<'a> {
    def: &'a TableDefinition,
    batch_rows: usize,
    policy: ParsePolicy,
}

impl<'a> TableReader<'a> {
    pub fn new(def: &'a TableDefinition, batch_rows: usize, policy: ParsePolicy) -> Self {
        Self {
            def,
            batch_rows: batch_rows.max(1),
            policy,
        }
    }

    /// Read the input to completion, delivering batches through the
    /// callback. `ControlFlow::Break` stops the pass early.
    ///
    /// Rows keep source-document order. Elements other than the
    /// table's row tag are skipped without being materialized.
    pub fn read_batches<R: Read>(
        &self,
        input: R,
        on_batch: &mut dyn FnMut(Batch) -> ControlFlow<()>,
    ) -> Result<ReadStats, ParseError> {
        let mut reader = Reader::from_reader(BufReader::new(input));
        let mut buf = Vec::new();

        // Attribute name (upper-cased) -> column slot.
        let columns: HashMap<String, usize> = self
            .def
            .columns
            .iter()
            .enumerate()
            .map(|(idx, col)| (col.attribute.to_ascii_uppercase(), idx))
            .collect();

        let mut stats = ReadStats::default();
        let mut batch = Batch::with_capacity(self.batch_rows);
        let mut depth: u64 = 0;

        loop {
            let position = reader.buffer_position();
            let event = reader.read_event_into(&mut buf).map_err(|source| {
                ParseError::Xml {
                    position: position as u64,
                    source,
                }
            })?;

            match event {
                Event::Start(ref e) => {
                    depth += 1;
                    if self.is_row(e) {
                        if self.consume_row(e, &columns, position as u64, &mut stats, &mut batch)? {
                            if batch.len() >= self.batch_rows {
                                let full = std::mem::replace(
                                    &mut batch,
                                    Batch::with_capacity(self.batch_rows),
                                );
                                if on_batch(full).is_break() {
                                    return Ok(stats);
                                }
                            }
                        }
                    }
                }
                Event::Empty(ref e) => {
                    if self.is_row(e)
                        && self.consume_row(e, &columns, position as u64, &mut stats, &mut batch)?
                        && batch.len() >= self.batch_rows
                    {
                        let full =
                            std::mem::replace(&mut batch, Batch::with_capacity(self.batch_rows));
                        if on_batch(full).is_break() {
                            return Ok(stats);
                        }
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => {
                    if depth > 0 {
                        return Err(ParseError::Truncated);
                    }
                    break;
                }
                _ => {}
            }
            buf.clear();
        }

        if !batch.is_empty() {
            let _ = on_batch(batch);
        }

        debug!(
            table = %self.def.name,
            rows = stats.rows,
            skipped = stats.skipped,
            "Finished reading table file"
        );

        Ok(stats)
    }

    fn is_row(&self, e: &BytesStart<'_>) -> bool {
        let name = e.name();
        let local = name.as_ref();
        let local = local
            .iter()
            .rposition(|&b| b == b':')
            .map_or(local, |i| &local[i + 1..]);
        local.eq_ignore_ascii_case(self.def.row_tag.as_bytes())
    }

    /// Decode one row element into the batch. Returns whether a record
    /// was appended.
    fn consume_row(
        &self,
        e: &BytesStart<'_>,
        columns: &HashMap<String, usize>,
        position: u64,
        stats: &mut ReadStats,
        batch: &mut Batch,
    ) -> Result<bool, ParseError> {
        let mut values: Vec<Option<String>> = vec![None; self.def.columns.len()];

        for attr in e.attributes() {
            let attr = match attr {
                Ok(attr) => attr,
                Err(err) => {
                    return match self.policy {
                        ParsePolicy::SkipElement => {
                            stats.skipped += 1;
                            warn!(
                                table = %self.def.name,
                                position,
                                error = %err,
                                "Skipping malformed row element"
                            );
                            Ok(false)
                        }
                        ParsePolicy::AbortRegion => Err(ParseError::RowAttribute {
                            position,
                            message: err.to_string(),
                        }),
                    };
                }
            };

            let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_uppercase();
            let Some(&slot) = columns.get(&key) else {
                // Unknown attributes are passed over, not errors: the
                // registry adds fields faster than its schema export.
                continue;
            };
            let value = match attr.unescape_value() {
                Ok(v) => v,
                Err(err) => {
                    return match self.policy {
                        ParsePolicy::SkipElement => {
                            stats.skipped += 1;
                            warn!(
                                table = %self.def.name,
                                position,
                                error = %err,
                                "Skipping row with undecodable attribute value"
                            );
                            Ok(false)
                        }
                        ParsePolicy::AbortRegion => Err(ParseError::RowAttribute {
                            position,
                            message: err.to_string(),
                        }),
                    };
                }
            };
            values[slot] = Some(value.into_owned());
        }

        batch.rows.push(Record { values });
        stats.rows += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::test_support::{column, table};
    use crate::schema::{ColumnType, Scope};

    fn addr_obj() -> TableDefinition {
        let mut def = table(
            "ADDR_OBJ",
            Scope::Region,
            vec![
                column("ID", ColumnType::Integer, true),
                column("NAME", ColumnType::Text, true),
                column("ISACTIVE", ColumnType::Boolean, false),
            ],
            "id",
        );
        def.root_tag = "ADDRESSOBJECTS".to_string();
        def.row_tag = "OBJECT".to_string();
        def
    }

    fn collect(
        def: &TableDefinition,
        xml: &str,
        batch_rows: usize,
        policy: ParsePolicy,
    ) -> Result<(Vec<Batch>, ReadStats), ParseError> {
        let reader = TableReader::new(def, batch_rows, policy);
        let mut batches = Vec::new();
        let stats = reader.read_batches(xml.as_bytes(), &mut |batch| {
            batches.push(batch);
            ControlFlow::Continue(())
        })?;
        Ok((batches, stats))
    }

    const THREE_ROWS: &str = r#"<?xml version="1.0"?>
<ADDRESSOBJECTS>
  <OBJECT ID="1" NAME="First" ISACTIVE="true" EXTRA="ignored" />
  <OBJECT ID="2" NAME="Second" />
  <OBJECT ID="3" NAME="&#x422;&#x440;&#x435;&#x442;&#x438;&#x439;" ISACTIVE="false" />
</ADDRESSOBJECTS>
"#;

    #[test]
    fn batches_preserve_source_order() {
        let def = addr_obj();
        let (batches, stats) = collect(&def, THREE_ROWS, 2, ParsePolicy::default()).unwrap();

        assert_eq!(stats.rows, 3);
        assert_eq!(stats.skipped, 0);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 1);

        let first = &batches[0].rows[0];
        assert_eq!(first.values[0].as_deref(), Some("1"));
        assert_eq!(first.values[1].as_deref(), Some("First"));
        assert_eq!(first.values[2].as_deref(), Some("true"));

        // Missing attribute stays unset.
        assert_eq!(batches[0].rows[1].values[2], None);

        // Entity references are decoded.
        assert_eq!(batches[1].rows[0].values[1].as_deref(), Some("Третий"));
    }

    #[test]
    fn early_break_stops_the_pass() {
        let def = addr_obj();
        let reader = TableReader::new(&def, 1, ParsePolicy::default());
        let mut seen = 0;
        reader
            .read_batches(THREE_ROWS.as_bytes(), &mut |_| {
                seen += 1;
                ControlFlow::Break(())
            })
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    fn truncated_document_aborts() {
        let def = addr_obj();
        let truncated = r#"<ADDRESSOBJECTS>
  <OBJECT ID="1" NAME="First" />
  <OBJECT ID="2" NAME="Sec"#;
        let err = collect(&def, truncated, 100, ParsePolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Truncated | ParseError::Xml { .. }
        ));
    }

    #[test]
    fn malformed_row_aborts_by_default() {
        let def = addr_obj();
        // Duplicate attribute on the second row.
        let xml = r#"<ADDRESSOBJECTS>
  <OBJECT ID="1" NAME="ok" />
  <OBJECT ID="2" ID="2" NAME="dup" />
</ADDRESSOBJECTS>"#;
        let err = collect(&def, xml, 100, ParsePolicy::AbortRegion).unwrap_err();
        assert!(matches!(err, ParseError::RowAttribute { .. }));
    }

    #[test]
    fn skip_policy_counts_dropped_rows() {
        let def = addr_obj();
        let xml = r#"<ADDRESSOBJECTS>
  <OBJECT ID="1" NAME="ok" />
  <OBJECT ID="2" ID="2" NAME="dup" />
  <OBJECT ID="3" NAME="also ok" />
</ADDRESSOBJECTS>"#;
        let (batches, stats) = collect(&def, xml, 100, ParsePolicy::SkipElement).unwrap();
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(batches[0].rows[1].values[0].as_deref(), Some("3"));
    }

    #[test]
    fn other_elements_are_not_materialized() {
        let def = addr_obj();
        let xml = r#"<ADDRESSOBJECTS>
  <COMMENT>not a row</COMMENT>
  <OBJECT ID="1" NAME="only" />
</ADDRESSOBJECTS>"#;
        let (batches, stats) = collect(&def, xml, 100, ParsePolicy::default()).unwrap();
        assert_eq!(stats.rows, 1);
        assert_eq!(batches[0].len(), 1);
    }
}
