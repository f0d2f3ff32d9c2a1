//! JSON Lines reader for historical rows.
//!
//! One spreadsheet row per line, read without loading the whole file.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

use super::row::{ImportRow, RowRejection};
use crate::error::{MissaError, MissaResult};

/// Rows read from a JSON Lines source.
#[derive(Debug, Clone, Default)]
pub struct ParsedRows {
    /// Valid rows with the line they were read from.
    pub rows: Vec<(usize, ImportRow)>,
    /// Lines that were not valid rows, numbered by line.
    pub malformed: Vec<RowRejection>,
}

/// Read import rows from JSON Lines.
///
/// Empty lines are skipped. Malformed lines are recorded and do not abort
/// the read.
///
/// # Example
///
/// ```ignore
/// use tokio::fs::File;
/// use tokio::io::BufReader;
///
/// let file = File::open("history.jsonl").await?;
/// let parsed = read_rows_jsonl(BufReader::new(file)).await?;
/// let report = engine.import_parsed(parsed, 2019, 2021)?;
/// ```
pub async fn read_rows_jsonl<R>(reader: R) -> MissaResult<ParsedRows>
where
    R: AsyncBufRead + Unpin,
{
    let mut parsed = ParsedRows::default();
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<ImportRow>(line) {
            Ok(row) => parsed.rows.push((line_no, row)),
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed import line");
                parsed.malformed.push(RowRejection::new(
                    line_no,
                    &MissaError::parse(format!("line {}: {}", line_no, e)),
                ));
            }
        }
    }

    Ok(parsed)
}
