//! Newline-delimited JSON framing for guild record streams
//!
//! Shards push their snapshot as one `PartitionRecord` per line, and the
//! all-guilds stream is served back in the same framing.

use crate::error::CoordinatorError;
use crate::guilds::PartitionRecord;
use futures::{Stream, StreamExt};

pub const CONTENT_TYPE: &str = "application/x-ndjson";

/// Encode one record as a single NDJSON line (trailing newline included)
pub fn encode_record(record: &PartitionRecord) -> Result<Vec<u8>, serde_json::Error> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(line)
}

/// Collect every record from a chunked body stream
///
/// Lines may straddle chunk boundaries and blank lines are skipped. The
/// first undecodable line aborts the whole push, as does a body longer
/// than `max_bytes`.
pub async fn decode_records<S, B, E>(
    body: S,
    max_bytes: usize,
) -> Result<Vec<PartitionRecord>, CoordinatorError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut decoder = LineDecoder::default();
    let mut received = 0usize;
    futures::pin_mut!(body);

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| CoordinatorError::BodyStreamFailed(e.into()))?;
        let chunk = chunk.as_ref();

        received = received.saturating_add(chunk.len());
        if received > max_bytes {
            return Err(CoordinatorError::PayloadTooLarge { limit: max_bytes });
        }
        decoder.feed(chunk)?;
    }

    decoder.finish()
}

#[derive(Default)]
struct LineDecoder {
    pending: Vec<u8>,
    // bytes of `pending` already known to hold no newline
    scanned: usize,
    line: usize,
    records: Vec<PartitionRecord>,
}

impl LineDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Result<(), CoordinatorError> {
        let mut pending = std::mem::take(&mut self.pending);
        pending.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = pending[self.scanned..].iter().position(|&b| b == b'\n') {
            let newline = self.scanned + offset;
            self.decode_line(&pending[start..newline])?;
            start = newline + 1;
            self.scanned = start;
        }

        pending.drain(..start);
        self.scanned = pending.len();
        self.pending = pending;
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<PartitionRecord>, CoordinatorError> {
        // last line without a trailing newline
        let rest = std::mem::take(&mut self.pending);
        self.decode_line(&rest)?;
        Ok(self.records)
    }

    fn decode_line(&mut self, raw: &[u8]) -> Result<(), CoordinatorError> {
        self.line += 1;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let record = serde_json::from_slice(raw).map_err(|source| CoordinatorError::MalformedRecord {
            line: self.line,
            source,
        })?;
        self.records.push(record);
        Ok(())
    }
}
