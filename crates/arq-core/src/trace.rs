//! Trace sinks for send/ack timing pairs.

use arq_abstract::{TraceRecord, TraceSink};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_COLUMNS: [&str; 4] = ["SeqNo", "TimeSent", "AckNo", "TimeAcked"];

/// CSV file: a `# description` line, a header row, then one row per fresh
/// ack with times in seconds since the session started.
pub struct CsvTrace {
    out: BufWriter<File>,
}

impl CsvTrace {
    pub fn create(
        path: impl AsRef<Path>,
        description: &str,
        columns: &[&str],
    ) -> io::Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "# {description}")?;
        writeln!(out, "{}", columns.join(","))?;
        Ok(Self { out })
    }
}

impl TraceSink for CsvTrace {
    fn record(&mut self, record: &TraceRecord) -> io::Result<()> {
        writeln!(
            self.out,
            "{},{:.6},{},{:.6}",
            record.seqno,
            record.time_sent.as_secs_f64(),
            record.ackno,
            record.time_acked.as_secs_f64()
        )
    }

    fn close(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Keeps records in memory. Clones share the same buffer, so a caller can
/// hand one clone to the sender and inspect the other afterwards.
#[derive(Clone, Default)]
pub struct MemoryTrace {
    records: Arc<Mutex<Vec<TraceRecord>>>,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TraceSink for MemoryTrace {
    fn record(&mut self, record: &TraceRecord) -> io::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    #[test]
    fn csv_layout() {
        let path = std::env::temp_dir().join(format!("arq-trace-{}.csv", std::process::id()));
        let mut trace = CsvTrace::create(&path, "Log of packets", &DEFAULT_COLUMNS).unwrap();
        trace
            .record(&TraceRecord {
                seqno: 3,
                time_sent: Duration::from_millis(1500),
                ackno: 3,
                time_acked: Duration::from_millis(1750),
            })
            .unwrap();
        trace.close().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(
            text,
            "# Log of packets\nSeqNo,TimeSent,AckNo,TimeAcked\n3,1.500000,3,1.750000\n"
        );
    }

    #[test]
    fn memory_trace_clones_share_records() {
        let trace = MemoryTrace::new();
        let mut sink = trace.clone();
        let record = TraceRecord {
            seqno: 1,
            time_sent: Duration::ZERO,
            ackno: 1,
            time_acked: Duration::from_millis(20),
        };
        sink.record(&record).unwrap();
        assert_eq!(trace.records(), vec![record]);
    }
}
