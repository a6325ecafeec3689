//! NDJSON event emitter (spec §4.1).
//!
//! Ported from `emitter.py::emit`: every event is one `serde_json`-encoded
//! line written to a single sink and flushed unconditionally. The three
//! categorized log types (`debug_log`/`info_log`/`warn_log`) are filtered
//! against a configured [`Verbosity`] threshold; every other event type is
//! always emitted. There is exactly one writer per process (spec §5's
//! single-threaded model), so no internal locking is needed beyond what
//! the sink itself requires.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::events::CATEGORIZED_LOGS;
use crate::models::Verbosity;

/// Writes NDJSON events to an [`io::Write`] sink, filtering categorized
/// logs by verbosity.
pub struct Emitter<W: Write> {
    sink: W,
    verbosity: Verbosity,
}

impl<W: Write> Emitter<W> {
    pub fn new(sink: W, verbosity: Verbosity) -> Self {
        Self { sink, verbosity }
    }

    /// Emit one event, merging `event_type` into `data` under the `type`
    /// key. Categorized logs below the configured verbosity are silently
    /// dropped; every other event type is unconditionally written.
    pub fn emit(&mut self, event_type: &str, data: Value) -> io::Result<()> {
        if CATEGORIZED_LOGS.contains(&event_type) {
            let level = log_level_of(event_type);
            if level < self.verbosity {
                return Ok(());
            }
        }

        let mut object = match data {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        object.insert("type".to_string(), Value::String(event_type.to_string()));

        let line = serde_json::to_string(&Value::Object(object))?;
        writeln!(self.sink, "{line}")?;
        self.sink.flush()
    }

    /// Emit a typed payload via its `Serialize` impl.
    pub fn emit_typed<T: Serialize>(&mut self, event_type: &str, payload: &T) -> io::Result<()> {
        let value = serde_json::to_value(payload)?;
        self.emit(event_type, value)
    }
}

/// Map a categorized-log event type to the [`Verbosity`] level it
/// corresponds to, for the `log_type_map` comparison in `emitter.py`.
fn log_level_of(event_type: &str) -> Verbosity {
    match event_type {
        crate::events::DEBUG_LOG => Verbosity::Debug,
        crate::events::INFO_LOG => Verbosity::Info,
        crate::events::WARN_LOG => Verbosity::Warn,
        _ => Verbosity::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lines_of(buf: &[u8]) -> Vec<Value> {
        String::from_utf8(buf.to_vec())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn emits_one_json_line_per_event() {
        let mut buf = Vec::new();
        {
            let mut emitter = Emitter::new(&mut buf, Verbosity::Debug);
            emitter.emit("plan", json!({"request": "do it"})).unwrap();
        }
        let lines = lines_of(&buf);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], "plan");
        assert_eq!(lines[0]["request"], "do it");
    }

    #[test]
    fn non_categorized_events_always_pass_regardless_of_verbosity() {
        let mut buf = Vec::new();
        {
            let mut emitter = Emitter::new(&mut buf, Verbosity::None);
            emitter.emit("result", json!({"status": "success"})).unwrap();
            emitter.emit("unsafe", json!({"reason": "x", "explanation": "y"})).unwrap();
        }
        assert_eq!(lines_of(&buf).len(), 2);
    }

    #[test]
    fn debug_log_dropped_below_debug_verbosity() {
        let mut buf = Vec::new();
        {
            let mut emitter = Emitter::new(&mut buf, Verbosity::Info);
            emitter.emit("debug_log", json!({"message": "noisy"})).unwrap();
        }
        assert!(lines_of(&buf).is_empty());
    }

    #[test]
    fn info_log_passes_at_info_verbosity() {
        let mut buf = Vec::new();
        {
            let mut emitter = Emitter::new(&mut buf, Verbosity::Info);
            emitter.emit("info_log", json!({"message": "hello"})).unwrap();
        }
        assert_eq!(lines_of(&buf).len(), 1);
    }

    #[test]
    fn warn_log_passes_even_at_info_verbosity() {
        let mut buf = Vec::new();
        {
            let mut emitter = Emitter::new(&mut buf, Verbosity::Info);
            emitter.emit("warn_log", json!({"message": "uh oh"})).unwrap();
        }
        assert_eq!(lines_of(&buf).len(), 1);
    }

    #[test]
    fn none_verbosity_suppresses_all_categorized_logs() {
        let mut buf = Vec::new();
        {
            let mut emitter = Emitter::new(&mut buf, Verbosity::None);
            emitter.emit("debug_log", json!({"message": "a"})).unwrap();
            emitter.emit("info_log", json!({"message": "b"})).unwrap();
            emitter.emit("warn_log", json!({"message": "c"})).unwrap();
        }
        assert!(lines_of(&buf).is_empty());
    }

    #[test]
    fn emit_typed_serializes_struct_payload() {
        use crate::models::AuditVerdict;
        let mut buf = Vec::new();
        {
            let mut emitter = Emitter::new(&mut buf, Verbosity::Debug);
            let verdict = AuditVerdict {
                safe: false,
                reason: "bad".into(),
                explanation: "very bad".into(),
            };
            emitter.emit_typed("unsafe", &verdict).unwrap();
        }
        let lines = lines_of(&buf);
        assert_eq!(lines[0]["type"], "unsafe");
        assert_eq!(lines[0]["safe"], false);
    }
}
