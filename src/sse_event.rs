use bytes::Bytes;

/// A single Server-Sent Event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    pub fn new(data: &str) -> Self {
        Self {
            data: data.to_string(),
            ..Default::default()
        }
    }

    /// Wire form, every data line prefixed and the event closed by a blank line.
    pub fn to_bytes(&self) -> Bytes {
        let mut output = String::new();
        if let Some(id) = &self.id {
            output.push_str(&format!("id: {id}\n"));
        }
        if let Some(event) = &self.event {
            output.push_str(&format!("event: {event}\n"));
        }
        for line in self.data.split('\n') {
            output.push_str(&format!("data: {line}\n"));
        }
        output.push('\n');
        Bytes::from(output)
    }
}

/// Incremental SSE parser.
///
/// Bytes are fed as they arrive; complete events are returned once their
/// terminating blank line is seen. Lines may be split across chunks and may
/// end in `\n`, `\r\n` or `\r`.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    pending_cr: bool,
    seen_line: bool,
    event: Option<String>,
    id: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.pending_cr = true;
                    self.end_line(&mut events);
                }
                _ => self.line.push(byte),
            }
        }
        events
    }

    /// Flushes a trailing line and an event left open at end of input.
    pub fn finish(mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.line.is_empty() {
            self.end_line(&mut events);
        }
        if let Some(event) = self.take_event() {
            events.push(event);
        }
        events
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        let mut line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        if !self.seen_line {
            self.seen_line = true;
            // a stream may open with a byte-order mark
            if let Some(rest) = line.strip_prefix('\u{feff}') {
                line = rest.to_string();
            }
        }

        if line.is_empty() {
            if let Some(event) = self.take_event() {
                events.push(event);
            }
            return;
        }
        // comment
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => log::trace!("Ignoring SSE field: {field}"),
        }
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data, id })
    }
}

/// Decodes a complete SSE body in one go.
pub fn decode_sse_events(body: &[u8]) -> Vec<SseEvent> {
    let mut decoder = SseDecoder::new();
    let mut events = decoder.feed(body);
    events.extend(decoder.finish());
    events
}

/// True when a body looks SSE-framed rather than plain JSON.
pub fn looks_like_sse(content_type: Option<&str>, body: &str) -> bool {
    if content_type.is_some_and(|ct| ct.contains("text/event-stream")) {
        return true;
    }
    body.lines().any(|line| {
        let line = line.trim_start_matches('\u{feff}');
        line.starts_with("event:") || line.starts_with("data:")
    })
}
