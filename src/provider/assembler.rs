//! Streaming response assembly.
//!
//! Upstream chunks carry text and tool calls in two encodings: structured
//! `tool_calls` deltas keyed by index, and an inline tag format embedded in
//! the text itself:
//!
//! ```text
//! <xai:function_call name="write_file">
//!   <parameter name="file_path">/tmp/a.txt</parameter>
//!   <parameter name="content">hi</parameter>
//! </xai:function_call>
//! ```
//!
//! [`StreamAssembler`] turns both into canonical [`GenerateContentResponse`]s
//! in arrival order. It is a plain state machine; [`assemble_stream`] drives it
//! from an async chunk stream.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::KestrelError;
use crate::types::{FinishReason, FunctionCall, GenerateContentResponse, Usage};

use super::mapper::synthesize_call_id;
use super::wire::{StreamChunk, ToolCallDelta};

pub const INLINE_OPEN_MARKER: &str = "<xai:function_call";
pub const INLINE_CLOSE_MARKER: &str = "</xai:function_call>";

static CALL_RE: OnceLock<Regex> = OnceLock::new();
static PARAM_RE: OnceLock<Regex> = OnceLock::new();

fn call_re() -> &'static Regex {
    CALL_RE.get_or_init(|| {
        Regex::new(r#"(?s)<xai:function_call\s+name="([^"]+)">(.*?)</xai:function_call>"#)
            .expect("static regex")
    })
}

fn param_re() -> &'static Regex {
    PARAM_RE.get_or_init(|| {
        Regex::new(r#"(?s)<parameter\s+name="([^"]+)">(.*?)</parameter>"#).expect("static regex")
    })
}

/// Parse the first inline tool call found in `text`.
///
/// Parameter values are entity-decoded and, when they look like a JSON
/// object or array, parsed as JSON. The call gets a fresh `call_` id.
pub fn parse_inline_tool_call(text: &str) -> Option<FunctionCall> {
    let caps = call_re().captures(text)?;
    let name = caps.get(1)?.as_str().to_string();
    let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

    let mut args = Map::new();
    for param in param_re().captures_iter(body) {
        let (Some(key), Some(raw)) = (param.get(1), param.get(2)) else {
            continue;
        };
        args.insert(key.as_str().to_string(), parameter_value(raw.as_str()));
    }

    debug!(tool = %name, params = args.len(), "parsed inline tool call");
    Some(FunctionCall {
        id: Some(synthesize_call_id()),
        name,
        args: Value::Object(args),
    })
}

fn parameter_value(raw: &str) -> Value {
    let decoded = decode_entities(raw);
    let trimmed = decoded.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str(&decoded) {
            return value;
        }
    }
    Value::String(decoded)
}

/// Decode the five XML entities; `&amp;` goes last so `&amp;lt;` stays `&lt;`.
pub fn decode_entities(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[derive(Debug, Default)]
struct ToolCallBuilder {
    id: Option<String>,
    name: Option<String>,
    args_text: String,
    emitted: bool,
}

impl ToolCallBuilder {
    fn to_call(&self, args: Value) -> Option<FunctionCall> {
        Some(FunctionCall {
            id: self.id.clone(),
            name: self.name.clone()?,
            args,
        })
    }
}

/// Accumulates structured tool-call deltas per index.
///
/// A call is emitted once, as soon as it has a name and its argument text is
/// a complete JSON object. Empty argument text only completes a call when the
/// stream reaches a finish reason or ends.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    builders: BTreeMap<u32, ToolCallBuilder>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one delta; returns the call if it just became complete.
    pub fn update(&mut self, delta: &ToolCallDelta) -> Option<FunctionCall> {
        let builder = self.builders.entry(delta.index).or_default();
        if let Some(id) = delta.id.as_ref().filter(|id| !id.is_empty()) {
            builder.id = Some(id.clone());
        }
        if let Some(function) = &delta.function {
            if let Some(name) = function.name.as_ref().filter(|n| !n.is_empty()) {
                builder.name = Some(name.clone());
            }
            if let Some(arguments) = &function.arguments {
                builder.args_text.push_str(arguments);
                if builder.emitted && !arguments.is_empty() {
                    warn!(
                        index = delta.index,
                        tool = builder.name.as_deref().unwrap_or_default(),
                        "argument delta after tool call was emitted; ignoring"
                    );
                }
            }
        }

        if builder.emitted || builder.name.is_none() || builder.args_text.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<Value>(&builder.args_text) {
            Ok(args @ Value::Object(_)) => {
                builder.emitted = true;
                debug!(index = delta.index, tool = ?builder.name, "tool call complete");
                builder.to_call(args)
            }
            _ => None,
        }
    }

    /// Emit every named call that has not been emitted yet.
    ///
    /// Empty argument text becomes `{}`. Text that does not parse to a JSON
    /// object is dropped with a warning.
    pub fn flush(&mut self) -> Vec<FunctionCall> {
        let mut calls = Vec::new();
        for (index, builder) in self.builders.iter_mut() {
            if builder.emitted {
                continue;
            }
            let Some(name) = builder.name.clone() else {
                if !builder.args_text.is_empty() {
                    warn!(index, "dropping tool call delta without a name");
                }
                continue;
            };
            builder.emitted = true;
            let args = if builder.args_text.trim().is_empty() {
                json!({})
            } else {
                match serde_json::from_str::<Value>(&builder.args_text) {
                    Ok(args @ Value::Object(_)) => args,
                    Ok(other) => {
                        warn!(index, tool = %name, kind = json_kind(&other), "dropping tool call whose arguments are not an object");
                        continue;
                    }
                    Err(e) => {
                        warn!(index, tool = %name, error = %e, "dropping tool call with malformed arguments");
                        continue;
                    }
                }
            };
            calls.extend(builder.to_call(args));
        }
        calls
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Scans text deltas for inline tool calls.
#[derive(Debug, Default)]
struct InlineScanner {
    pending: String,
    in_call: bool,
}

impl InlineScanner {
    fn push(&mut self, delta: &str) -> Vec<GenerateContentResponse> {
        self.pending.push_str(delta);
        let mut out = Vec::new();
        loop {
            if self.in_call {
                let Some(pos) = self.pending.find(INLINE_CLOSE_MARKER) else {
                    break;
                };
                let block: String = self.pending.drain(..pos + INLINE_CLOSE_MARKER.len()).collect();
                self.in_call = false;
                match parse_inline_tool_call(&block) {
                    Some(call) => out.push(GenerateContentResponse::from_function_call(call)),
                    None => {
                        warn!(len = block.len(), "malformed inline tool call; passing through as text");
                        out.push(GenerateContentResponse::from_text(block));
                    }
                }
                continue;
            }

            if let Some(pos) = self.pending.find(INLINE_OPEN_MARKER) {
                if pos > 0 {
                    let before: String = self.pending.drain(..pos).collect();
                    out.push(GenerateContentResponse::from_text(before));
                }
                self.in_call = true;
                continue;
            }

            let emit_len = self.pending.len() - partial_marker_len(&self.pending);
            if emit_len > 0 {
                let text: String = self.pending.drain(..emit_len).collect();
                out.push(GenerateContentResponse::from_text(text));
            }
            break;
        }
        out
    }

    /// Release text held back as a possible marker prefix.
    ///
    /// An open inline block stays buffered.
    fn release_held(&mut self) -> Option<GenerateContentResponse> {
        if self.in_call || self.pending.is_empty() {
            return None;
        }
        Some(GenerateContentResponse::from_text(std::mem::take(
            &mut self.pending,
        )))
    }

    fn flush(&mut self) -> Option<GenerateContentResponse> {
        if self.in_call {
            debug!(len = self.pending.len(), "inline tool call never closed; flushing as text");
        }
        self.in_call = false;
        if self.pending.is_empty() {
            return None;
        }
        Some(GenerateContentResponse::from_text(std::mem::take(
            &mut self.pending,
        )))
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of the
/// opening marker.
fn partial_marker_len(text: &str) -> usize {
    (1..INLINE_OPEN_MARKER.len())
        .rev()
        .find(|&k| text.ends_with(&INLINE_OPEN_MARKER[..k]))
        .unwrap_or(0)
}

/// Converts upstream chunks into canonical responses.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    inline: InlineScanner,
    tool_calls: ToolCallAssembler,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one chunk completely.
    ///
    /// Text is handled before tool-call deltas; a finish reason flushes
    /// pending calls and is reported last.
    pub fn push(&mut self, chunk: &StreamChunk) -> Vec<GenerateContentResponse> {
        let mut out = Vec::new();
        let usage = chunk.usage.clone().map(Usage::from);

        let Some(choice) = chunk.choices.first() else {
            if let Some(usage) = usage {
                out.push(GenerateContentResponse {
                    usage: Some(usage),
                    ..Default::default()
                });
            }
            return out;
        };

        if let Some(text) = choice.delta.content.as_deref().filter(|t| !t.is_empty()) {
            out.extend(self.inline.push(text));
        }

        for delta in choice.delta.tool_calls.iter().flatten() {
            if let Some(call) = self.tool_calls.update(delta) {
                out.extend(self.inline.release_held());
                out.push(GenerateContentResponse::from_function_call(call));
            }
        }

        match choice.finish_reason.as_deref() {
            Some(raw) => {
                out.extend(self.flush_pending());
                out.push(GenerateContentResponse::finished(
                    FinishReason::parse(raw),
                    usage,
                ));
            }
            None => {
                if let Some(usage) = usage {
                    out.push(GenerateContentResponse {
                        usage: Some(usage),
                        ..Default::default()
                    });
                }
            }
        }
        out
    }

    /// Flush everything still buffered at end of stream.
    pub fn finish(&mut self) -> Vec<GenerateContentResponse> {
        self.flush_pending()
    }

    fn flush_pending(&mut self) -> Vec<GenerateContentResponse> {
        let mut out: Vec<GenerateContentResponse> = self.inline.flush().into_iter().collect();
        out.extend(
            self.tool_calls
                .flush()
                .into_iter()
                .map(GenerateContentResponse::from_function_call),
        );
        out
    }
}

/// Drive a [`StreamAssembler`] over an upstream chunk stream.
///
/// Each chunk is fully processed before the next is awaited. An upstream
/// error is forwarded and ends the stream.
pub fn assemble_stream<S>(
    chunks: S,
) -> BoxStream<'static, Result<GenerateContentResponse, KestrelError>>
where
    S: Stream<Item = Result<StreamChunk, KestrelError>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut assembler = StreamAssembler::new();
        let mut failed = false;
        futures::pin_mut!(chunks);

        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    for response in assembler.push(&chunk) {
                        yield Ok(response);
                    }
                }
                Err(e) => {
                    failed = true;
                    yield Err(e);
                    break;
                }
            }
        }

        if !failed {
            for response in assembler.finish() {
                yield Ok(response);
            }
        }
    };
    Box::pin(stream)
}
