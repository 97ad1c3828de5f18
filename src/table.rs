//! Input tables: two-column `key,payload\n` files parsed into span tuples.

use std::path::Path;

use tracing::debug;

use crate::error::{Error, MalformedReason, Result};
use crate::scan::{BlockScanner, FIELD_DELIMITER, ROW_DELIMITER, delimiter_positions};
use crate::span::{ByteSpan, Relation};

/// Fields per input row.
pub const TABLE_ARITY: usize = 2;

/// One parsed input file. Column 0 is the join key, column 1 the payload.
#[derive(Debug)]
pub struct Table {
    relation: Relation,
}

impl Table {
    /// Splits `buffer` into rows of exactly two fields.
    ///
    /// Every row, the last included, must end with `\n` and contain exactly
    /// one `,`. Anything else is rejected with [`Error::Malformed`].
    pub fn parse<S: BlockScanner>(buffer: Vec<u8>, scanner: &S) -> Result<Self> {
        let positions = delimiter_positions(scanner, &buffer)?;

        if positions.len() % TABLE_ARITY != 0 {
            // Odd delimiter count: report the first offending row.
            check_rows(&buffer, &positions)?;
        }
        let rows = positions.len() / TABLE_ARITY;
        let mut spans = Vec::new();
        spans
            .try_reserve_exact(rows * TABLE_ARITY)
            .map_err(Error::alloc("table tuples"))?;

        // The first field starts at 0, as if a delimiter sat at -1.
        let mut field_start = 0u32;
        for (line, pair) in positions.chunks_exact(TABLE_ARITY).enumerate() {
            let (comma, newline) = (pair[0], pair[1]);
            if buffer[comma as usize] != FIELD_DELIMITER || buffer[newline as usize] != ROW_DELIMITER
            {
                return Err(Error::Malformed {
                    line: line + 1,
                    reason: MalformedReason::FieldCount,
                });
            }
            spans.push(ByteSpan::new(field_start, comma - field_start));
            spans.push(ByteSpan::new(comma + 1, newline - comma - 1));
            field_start = newline + 1;
        }
        if buffer.last().is_some_and(|&b| b != ROW_DELIMITER) {
            return Err(Error::Malformed {
                line: rows + 1,
                reason: MalformedReason::MissingTerminator,
            });
        }

        debug!(rows, bytes = buffer.len(), "parsed table");
        Ok(Self {
            relation: Relation::new(buffer, spans, TABLE_ARITY),
        })
    }

    /// Reads the whole file at `path` and parses it.
    pub fn read<S: BlockScanner>(path: &Path, scanner: &S) -> Result<Self> {
        let buffer = read_file(path)?;
        Self::parse(buffer, scanner)
    }

    pub fn len(&self) -> usize {
        self.relation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relation.is_empty()
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn into_relation(self) -> Relation {
        self.relation
    }
}

/// Reads a whole file into an owned buffer.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Finds the first row whose delimiters are not `,` then `\n`.
fn check_rows(buffer: &[u8], positions: &[u32]) -> Result<()> {
    let mut line = 1;
    let mut expect = FIELD_DELIMITER;
    for &p in positions {
        let found = buffer[p as usize];
        if found != expect {
            return Err(Error::Malformed {
                line,
                reason: MalformedReason::FieldCount,
            });
        }
        if found == ROW_DELIMITER {
            line += 1;
            expect = FIELD_DELIMITER;
        } else {
            expect = ROW_DELIMITER;
        }
    }
    // Delimiters alternate correctly but the last row has only its comma.
    Err(Error::Malformed {
        line,
        reason: MalformedReason::MissingTerminator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{ScalarScanner, Scanner};

    fn parse(data: &[u8]) -> Result<Table> {
        Table::parse(data.to_vec(), &Scanner::detect())
    }

    fn rows(table: &Table) -> Vec<Vec<Vec<u8>>> {
        table.relation().rows().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn parse_two_rows() {
        let table = parse(b"k1,x\nk2,y\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            rows(&table),
            vec![
                vec![b"k1".to_vec(), b"x".to_vec()],
                vec![b"k2".to_vec(), b"y".to_vec()],
            ]
        );
        assert_eq!(
            table.relation().spans(),
            &[
                ByteSpan::new(0, 2),
                ByteSpan::new(3, 1),
                ByteSpan::new(5, 2),
                ByteSpan::new(8, 1)
            ]
        );
    }

    #[test]
    fn parse_empty_buffer() {
        let table = parse(b"").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn parse_empty_fields() {
        let table = parse(b",\nk,\n,v\n").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.relation().field(0, 0), b"");
        assert_eq!(table.relation().field(0, 1), b"");
        assert_eq!(table.relation().field(1, 0), b"k");
        assert_eq!(table.relation().field(2, 1), b"v");
    }

    #[test]
    fn parse_rows_spanning_blocks() {
        let mut data = Vec::new();
        for i in 0..500 {
            data.extend_from_slice(format!("key{i:05},payload-{i}\n").as_bytes());
        }
        let fast = Table::parse(data.clone(), &Scanner::detect()).unwrap();
        let slow = Table::parse(data, &ScalarScanner).unwrap();
        assert_eq!(fast.len(), 500);
        assert_eq!(fast.relation(), slow.relation());
        assert_eq!(fast.relation().field(321, 0), b"key00321");
        assert_eq!(fast.relation().field(321, 1), b"payload-321");
    }

    // -- Malformed input tests ------------------------------------------------

    fn malformed(data: &[u8]) -> (usize, MalformedReason) {
        match parse(data) {
            Err(Error::Malformed { line, reason }) => (line, reason),
            other => panic!("expected malformed error, got {other:?}"),
        }
    }

    #[test]
    fn reject_missing_final_newline() {
        assert_eq!(malformed(b"k1,x\nk2,y"), (2, MalformedReason::MissingTerminator));
        assert_eq!(malformed(b"k1,x"), (1, MalformedReason::MissingTerminator));
    }

    #[test]
    fn reject_unterminated_key_only() {
        assert_eq!(malformed(b"k1,x\nk2"), (2, MalformedReason::MissingTerminator));
    }

    #[test]
    fn reject_extra_field() {
        assert_eq!(malformed(b"k1,x\nk2,y,z\n"), (2, MalformedReason::FieldCount));
    }

    #[test]
    fn reject_missing_field() {
        assert_eq!(malformed(b"k1\nk2,y\n"), (1, MalformedReason::FieldCount));
    }

    #[test]
    fn reject_blank_line() {
        assert_eq!(malformed(b"k1,x\n\nk2,y\n"), (2, MalformedReason::FieldCount));
    }

    #[test]
    fn reject_swapped_shape_with_even_delimiters() {
        // Two delimiters per "row" on average, but the first row has none.
        assert_eq!(malformed(b"k1\nk2,y,z\n"), (1, MalformedReason::FieldCount));
    }

    #[test]
    fn read_missing_file() {
        let err = Table::read(Path::new("/definitely/not/here.csv"), &ScalarScanner).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
