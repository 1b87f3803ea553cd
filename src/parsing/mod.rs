//! Streaming JSON parser (C6).
//!
//! Converts a stream of arbitrary text fragments — possibly prefixed with
//! markdown code fences or leading prose, and possibly truncated — into a
//! sequence of partial-object snapshots plus one final parsed object. See
//! `spec.md` §4.6.
//!
//! # Algorithm
//!
//! A small pushdown stack tracks open `{`/`[` structures plus string/escape
//! state as each delta is appended. Two kinds of boundary are tracked:
//!
//! - a **field boundary**: the stack returns to depth 1 (directly inside the
//!   root object) after a comma or a closing bracket — a top-level key has
//!   just finished.
//! - an **array-element boundary**: a comma or closing bracket occurs while
//!   directly inside a top-level array (stack depth 2, innermost frame is
//!   `[`) — one array element has just finished.
//!
//! At each boundary the parser closes any structures still open (appending
//! the matching brackets/quote) and attempts a cheap `serde_json` parse of
//! the resulting candidate. A successful parse is diffed against the last
//! known-good snapshot: newly-present top-level keys emit `PartialField`,
//! and growth in a top-level array's length emits one `ArrayItem` per new
//! element.

use std::collections::BTreeMap;

use serde_json::Value;

/// An event produced by the streaming parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserEvent {
    /// A top-level field has a syntactically complete value.
    PartialField { path: String, value: Value },
    /// One element of a top-level array has completed.
    ArrayItem { index: usize, value: Value },
    /// The stream ended (or the object closed) and this is the final object.
    /// `partial` is `true` when the input was truncated and the object was
    /// recovered via best-effort brace/quote balancing.
    Complete { value: Value, partial: bool },
    /// The stream could not be interpreted as JSON at all.
    ParseError { reason: String },
}

/// Incremental parser for a single top-level JSON object streamed as text deltas.
pub struct StreamingJsonParser {
    raw: String,
    json_start: Option<usize>,
    stack: Vec<u8>, // b'{' or b'['
    in_string: bool,
    escape: bool,
    scan_pos: usize,
    previous_value: Value,
    array_lens: BTreeMap<String, usize>,
    completed: bool,
    completion_offset: Option<usize>,
}

impl Default for StreamingJsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingJsonParser {
    /// Create a fresh parser with no input consumed yet.
    pub fn new() -> Self {
        Self {
            raw: String::new(),
            json_start: None,
            stack: Vec::new(),
            in_string: false,
            escape: false,
            scan_pos: 0,
            previous_value: Value::Object(Default::default()),
            array_lens: BTreeMap::new(),
            completed: false,
            completion_offset: None,
        }
    }

    /// Whether a final `Complete` event has already been emitted.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// The latest known-good parsed snapshot (updated at every boundary).
    /// Used by callers that want to render "partial UI" between events.
    pub fn snapshot(&self) -> &Value {
        &self.previous_value
    }

    /// Any raw text observed after the object's closing brace (or, before
    /// completion, an empty string). Lets a caller that concatenates
    /// multiple back-to-back JSON objects in one stream hand the unconsumed
    /// tail to a fresh parser instance.
    pub fn tail(&self) -> &str {
        match self.completion_offset {
            Some(offset) => &self.raw[offset..],
            None => "",
        }
    }

    /// Feed the next text delta, returning any events it produced.
    pub fn push(&mut self, delta: &str) -> Vec<ParserEvent> {
        if self.completed {
            return Vec::new();
        }

        self.raw.push_str(delta);

        if self.json_start.is_none() {
            match self.raw.find('{') {
                Some(idx) => {
                    self.json_start = Some(idx);
                    self.scan_pos = idx;
                }
                None => return Vec::new(),
            }
        }

        let mut events = Vec::new();
        let chars: Vec<(usize, char)> = self.raw[self.scan_pos..]
            .char_indices()
            .map(|(i, c)| (i + self.scan_pos, c))
            .collect();

        for (idx, c) in chars {
            if self.escape {
                self.escape = false;
                continue;
            }

            if self.in_string {
                match c {
                    '\\' => self.escape = true,
                    '"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }

            match c {
                '"' => self.in_string = true,
                '{' | '[' => self.stack.push(c as u8),
                '}' | ']' => {
                    self.stack.pop();
                    let char_end = idx + c.len_utf8();
                    if self.stack.is_empty() {
                        self.handle_boundary(char_end, &mut events);
                        self.completed = true;
                        self.completion_offset = Some(char_end);
                        self.scan_pos = self.raw.len();
                        return events;
                    } else if self.at_field_boundary() {
                        self.handle_boundary(char_end, &mut events);
                    } else if self.at_array_element_boundary() {
                        self.handle_boundary(char_end, &mut events);
                    }
                }
                ',' => {
                    if self.stack.len() == 1 {
                        self.handle_boundary(idx, &mut events);
                    } else if self.stack.len() == 2 && self.stack.last() == Some(&b'[') {
                        self.handle_boundary(idx, &mut events);
                    }
                }
                _ => {}
            }
        }

        self.scan_pos = self.raw.len();
        events
    }

    /// Signal end-of-stream. Emits a final `Complete` (or `ParseError` if no
    /// JSON object was ever found) unless one was already emitted.
    pub fn finish(&mut self) -> Vec<ParserEvent> {
        if self.completed {
            return Vec::new();
        }

        let Some(start) = self.json_start else {
            return vec![ParserEvent::ParseError {
                reason: "no JSON object found in stream".to_string(),
            }];
        };

        let mut candidate = self.raw[start..].to_string();
        if self.in_string {
            candidate.push('"');
        }
        for b in self.stack.iter().rev() {
            candidate.push(if *b == b'{' { '}' } else { ']' });
        }

        let mut events = Vec::new();
        match serde_json::from_str::<Value>(&candidate) {
            Ok(value) => {
                self.diff_and_emit(&value, &mut events);
                self.previous_value = value.clone();
                events.push(ParserEvent::Complete { value, partial: true });
            }
            Err(_) => {
                // Best-effort recovery failed outright; fall back to the
                // last known-good snapshot rather than failing the stream.
                events.push(ParserEvent::Complete {
                    value: self.previous_value.clone(),
                    partial: true,
                });
            }
        }

        self.completed = true;
        self.completion_offset = Some(self.raw.len());
        events
    }

    fn at_field_boundary(&self) -> bool {
        self.stack.len() == 1
    }

    fn at_array_element_boundary(&self) -> bool {
        self.stack.len() == 2 && self.stack.last() == Some(&b'[')
    }

    fn handle_boundary(&mut self, end: usize, events: &mut Vec<ParserEvent>) {
        let start = self.json_start.expect("json_start set before boundaries are processed");
        let mut candidate = self.raw[start..end].to_string();
        for b in self.stack.iter().rev() {
            candidate.push(if *b == b'{' { '}' } else { ']' });
        }

        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            self.diff_and_emit(&value, events);
            self.previous_value = value;
        }
    }

    fn diff_and_emit(&mut self, value: &Value, events: &mut Vec<ParserEvent>) {
        let Some(new_obj) = value.as_object() else { return };
        let old_obj = self.previous_value.as_object();

        for (key, val) in new_obj {
            let is_new = old_obj.map(|o| !o.contains_key(key)).unwrap_or(true);
            if is_new {
                events.push(ParserEvent::PartialField { path: key.clone(), value: val.clone() });
            }

            if let Some(arr) = val.as_array() {
                let prev_len = self.array_lens.get(key).copied().unwrap_or(0);
                if arr.len() > prev_len {
                    for (i, item) in arr.iter().enumerate().skip(prev_len) {
                        events.push(ParserEvent::ArrayItem { index: i, value: item.clone() });
                    }
                    self.array_lens.insert(key.clone(), arr.len());
                }
            }
        }
    }
}

/// Convenience: parse a complete, non-streaming text blob (used by the
/// Submission Evaluator, which collects the full LLM response before
/// parsing — `spec.md` §4.8 step 5).
pub fn parse_complete(text: &str) -> Result<Value, String> {
    let mut parser = StreamingJsonParser::new();
    let mut events = parser.push(text);
    events.extend(parser.finish());

    for event in events.into_iter().rev() {
        match event {
            ParserEvent::Complete { value, partial } => {
                if partial {
                    return Err("truncated or unbalanced JSON".to_string());
                }
                return Ok(value);
            }
            ParserEvent::ParseError { reason } => return Err(reason),
            _ => continue,
        }
    }

    Err("stream produced no terminal event".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_object_in_one_delta() {
        let mut parser = StreamingJsonParser::new();
        let events = parser.push(r#"{"title":"Fix it","score":80}"#);
        assert!(events.iter().any(|e| matches!(e, ParserEvent::Complete { partial: false, .. })));
        assert!(parser.is_complete());
    }

    #[test]
    fn streams_partial_fields_incrementally() {
        let mut parser = StreamingJsonParser::new();
        let mut all_events = Vec::new();

        all_events.extend(parser.push(r#"{"title":"Fix "#));
        all_events.extend(parser.push(r#"the bug","#));
        all_events.extend(parser.push(r#""score":80}"#));

        let title_events: Vec<_> = all_events
            .iter()
            .filter(|e| matches!(e, ParserEvent::PartialField { path, .. } if path == "title"))
            .collect();
        assert_eq!(title_events.len(), 1);

        assert!(all_events.iter().any(|e| matches!(e, ParserEvent::Complete { partial: false, .. })));
    }

    #[test]
    fn emits_array_items_as_they_complete() {
        let mut parser = StreamingJsonParser::new();
        let mut all_events = Vec::new();
        all_events.extend(parser.push(r#"{"affected_skills":["Python","#));
        all_events.extend(parser.push(r#""SQL"]}"#));

        let items: Vec<_> = all_events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::ArrayItem { index, value } => Some((*index, value.clone())),
                _ => None,
            })
            .collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0], (0, Value::String("Python".to_string())));
        assert_eq!(items[1], (1, Value::String("SQL".to_string())));
    }

    #[test]
    fn nested_object_field_does_not_emit_until_fully_closed() {
        let mut parser = StreamingJsonParser::new();
        let mut all_events = Vec::new();
        all_events.extend(parser.push(r#"{"difficulty":{"level":"easy","#));
        // Not yet closed: no PartialField for "difficulty" yet.
        assert!(!all_events
            .iter()
            .any(|e| matches!(e, ParserEvent::PartialField { path, .. } if path == "difficulty")));

        all_events.extend(parser.push(r#""time_limit_minutes":30},"status":"active"}"#));
        assert!(all_events
            .iter()
            .any(|e| matches!(e, ParserEvent::PartialField { path, .. } if path == "difficulty")));
    }

    #[test]
    fn tolerates_code_fences_and_leading_prose() {
        let mut parser = StreamingJsonParser::new();
        let mut events = parser.push("Sure, here is the challenge:\n```json\n{\"title\":\"X\"}\n```\ntrailing note");
        events.extend(parser.finish());
        let complete = events.iter().find(|e| matches!(e, ParserEvent::Complete { .. }));
        assert!(complete.is_some());
        if let Some(ParserEvent::Complete { value, partial }) = complete {
            assert_eq!(value["title"], "X");
            assert!(!partial);
        }
    }

    #[test]
    fn truncated_input_recovers_with_partial_flag() {
        let mut parser = StreamingJsonParser::new();
        parser.push(r#"{"title":"Incomplete","score":"#);
        let events = parser.finish();
        let complete = events.iter().find(|e| matches!(e, ParserEvent::Complete { .. }));
        assert!(complete.is_some());
        if let Some(ParserEvent::Complete { value, partial }) = complete {
            assert!(partial);
            assert_eq!(value["title"], "Incomplete");
        }
    }

    #[test]
    fn no_json_object_is_a_parse_error() {
        let mut parser = StreamingJsonParser::new();
        parser.push("I couldn't generate a response.");
        let events = parser.finish();
        assert!(matches!(events[0], ParserEvent::ParseError { .. }));
    }

    #[test]
    fn parse_complete_helper_round_trips() {
        let value = parse_complete(r#"{"a":1,"b":[1,2,3]}"#).unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"][2], 3);
    }

    #[test]
    fn parse_complete_helper_rejects_truncation() {
        let err = parse_complete(r#"{"a":1,"#).unwrap_err();
        assert!(err.contains("truncated") || err.contains("unbalanced"));
    }

    #[test]
    fn tail_exposes_text_after_closing_brace_for_back_to_back_objects() {
        let mut parser = StreamingJsonParser::new();
        let events = parser.push(r#"{"a":1}{"b":2}"#);
        assert!(events.iter().any(|e| matches!(e, ParserEvent::Complete { partial: false, .. })));
        assert_eq!(parser.tail(), r#"{"b":2}"#);

        let mut next = StreamingJsonParser::new();
        let events = next.push(parser.tail());
        assert!(events.iter().any(|e| matches!(e, ParserEvent::Complete { partial: false, .. })));
    }
}
