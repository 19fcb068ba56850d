//! JSON-lines export diagnostics.
//!
//! One logger serves an exporter instance: pipeline stages append typed
//! event lines and bump named counters, and each export drains the counters
//! into a single summary line. Logging never fails an export; write and
//! lock errors are swallowed.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub(crate) struct DebugLogger {
    state: Arc<Mutex<LogState>>,
}

#[derive(Debug)]
struct LogState {
    out: BufWriter<File>,
    counters: HashMap<String, u64>,
    sequence: u64,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            state: Arc::new(Mutex::new(LogState {
                out: BufWriter::new(file),
                counters: HashMap::new(),
                sequence: 0,
            })),
        })
    }

    /// Appends one event line. Fields are written in caller order, after
    /// the `seq`/`ts`/`type` prelude, so lines stay grep-stable.
    pub fn event(&self, kind: &str, fields: &[(&str, &str)]) {
        let mut body = String::with_capacity(64);
        for (key, value) in fields {
            body.push_str(",\"");
            body.push_str(&json_escape(key));
            body.push_str("\":\"");
            body.push_str(&json_escape(value));
            body.push('"');
        }
        self.write_line(kind, &body);
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.state.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    /// Drains the counters into one `debug.summary` line, keys sorted,
    /// counts as bare numbers.
    pub fn emit_summary(&self, context: &str) {
        let counts = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            let mut drained: Vec<(String, u64)> = state.counters.drain().collect();
            drained.sort_by(|a, b| a.0.cmp(&b.0));
            drained
        };
        let mut body = String::from(",\"context\":\"");
        body.push_str(&json_escape(context));
        body.push_str("\",\"counts\":{");
        for (index, (key, value)) in counts.iter().enumerate() {
            if index > 0 {
                body.push(',');
            }
            body.push_str(&format!("\"{}\":{}", json_escape(key), value));
        }
        body.push('}');
        self.write_line("debug.summary", &body);
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.state.lock() {
            let _ = state.out.flush();
        }
    }

    fn write_line(&self, kind: &str, body: &str) {
        let ts = epoch_millis();
        if let Ok(mut state) = self.state.lock() {
            state.sequence += 1;
            let seq = state.sequence;
            let _ = writeln!(
                state.out,
                "{{\"seq\":{},\"ts\":{},\"type\":\"{}\"{}}}",
                seq,
                ts,
                json_escape(kind),
                body
            );
        }
    }
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}

/// Escapes a string for embedding in a JSON value. Counter values and error
/// messages can carry quotes and raw control bytes.
pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_log(path: &std::path::Path, logger: &DebugLogger) -> Vec<String> {
        logger.flush();
        std::fs::read_to_string(path)
            .expect("read log")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn event_lines_are_sequenced_and_ordered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("events.jsonl");
        let logger = DebugLogger::new(&path).expect("logger");

        logger.event("export.begin", &[("kind", "MR"), ("sections", "2")]);
        logger.event("export.finish", &[("bytes", "1024")]);

        let lines = read_log(&path, &logger);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("{\"seq\":1,"));
        assert!(lines[0].contains("\"type\":\"export.begin\",\"kind\":\"MR\",\"sections\":\"2\"}"));
        assert!(lines[1].starts_with("{\"seq\":2,"));
        assert!(lines[1].ends_with("\"type\":\"export.finish\",\"bytes\":\"1024\"}"));
    }

    #[test]
    fn summary_drains_counters_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("summary.jsonl");
        let logger = DebugLogger::new(&path).expect("logger");

        logger.increment("image.readiness_failed", 2);
        logger.increment("font.preload_failed", 1);
        logger.increment("image.readiness_failed", 1);
        logger.emit_summary("export");
        logger.emit_summary("export");

        let lines = read_log(&path, &logger);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(
            "\"context\":\"export\",\"counts\":{\"font.preload_failed\":1,\"image.readiness_failed\":3}"
        ));
        // Drained by the first summary.
        assert!(lines[1].contains("\"counts\":{}"));
    }

    #[test]
    fn escape_covers_quotes_and_control_bytes() {
        assert_eq!(json_escape("plain"), "plain");
        assert_eq!(json_escape("a\"b\\c"), "a\\\"b\\\\c");
        assert_eq!(json_escape("line\nbreak\ttab"), "line\\nbreak\\ttab");
        assert_eq!(json_escape("bell\u{7}"), "bell\\u0007");
    }
}
