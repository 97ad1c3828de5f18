//! Serializing relations as comma-separated, newline-terminated rows.

use std::io::Write;

use tracing::trace;

use crate::error::{Error, Result};
use crate::span::Relation;

/// Staged bytes are handed to the sink once they pass this size.
const FLUSH_THRESHOLD: usize = 64 * 1024;

/// Writes every tuple of `relation` as `f0,f1,...\n` and flushes `out`.
pub fn write_relation<W: Write>(relation: &Relation, out: &mut W) -> Result<()> {
    let mut staging: Vec<u8> = Vec::new();
    staging
        .try_reserve(FLUSH_THRESHOLD + 1024)
        .map_err(Error::alloc("output staging"))?;

    let mut batches = 0usize;
    for row in relation.rows() {
        for (col, field) in row.fields().enumerate() {
            if col > 0 {
                staging.push(b',');
            }
            staging.extend_from_slice(field);
        }
        staging.push(b'\n');

        if staging.len() >= FLUSH_THRESHOLD {
            out.write_all(&staging).map_err(Error::Output)?;
            staging.clear();
            batches += 1;
        }
    }

    if !staging.is_empty() {
        out.write_all(&staging).map_err(Error::Output)?;
        batches += 1;
    }
    out.flush().map_err(Error::Output)?;

    trace!(rows = relation.len(), batches, "wrote relation");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn render(relation: &Relation) -> String {
        let mut out = Vec::new();
        write_relation(relation, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn write_five_columns() {
        let r = Relation::from_rows([["p", "k1", "a", "x", "z"]], 5);
        assert_eq!(render(&r), "p,k1,a,x,z\n");
    }

    #[test]
    fn write_empty_relation() {
        let r = Relation::from_rows(Vec::<[&str; 5]>::new(), 5);
        assert_eq!(render(&r), "");
    }

    #[test]
    fn write_empty_fields() {
        let r = Relation::from_rows([["", "b", ""]], 3);
        assert_eq!(render(&r), ",b,\n");
    }

    #[test]
    fn write_many_batches() {
        let rows: Vec<[String; 2]> = (0..20_000)
            .map(|i| [format!("key{i}"), format!("payload{i}")])
            .collect();
        let r = Relation::from_rows(rows, 2);
        let text = render(&r);
        assert_eq!(text.lines().count(), 20_000);
        assert!(text.len() > FLUSH_THRESHOLD);
        assert_eq!(text.lines().nth(12_345), Some("key12345,payload12345"));
        assert!(text.ends_with("key19999,payload19999\n"));
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_reported() {
        let r = Relation::from_rows([["a", "b"]], 2);
        let err = write_relation(&r, &mut FailingWriter).unwrap_err();
        assert!(matches!(err, Error::Output(_)));
    }

    #[test]
    fn short_writes_are_retried() {
        struct Trickle(Vec<u8>);
        impl Write for Trickle {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                let n = buf.len().min(3);
                self.0.extend_from_slice(&buf[..n]);
                Ok(n)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let r = Relation::from_rows([["key", "payload"], ["k2", "p2"]], 2);
        let mut sink = Trickle(Vec::new());
        write_relation(&r, &mut sink).unwrap();
        assert_eq!(sink.0, b"key,payload\nk2,p2\n");
    }
}
