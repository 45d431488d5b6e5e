//! A single turn of the agent loop.
//!
//! A [`Turn`] sends one request through its [`ChatSession`] and converts the
//! streamed responses into [`StreamEvent`]s. Tool calls are collected and
//! reported, never executed.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::KestrelError;
use crate::types::{
    ChatTurn, FinishReason, FunctionCall, GenerateContentResponse, Part, Role, ToolCallRequest,
};

use super::chat::ChatSession;
use super::events::{StreamEvent, StructuredError, ThoughtSummary, TurnState};
use super::reporting::{ErrorReporter, TracingErrorReporter};

const UNDEFINED_TOOL_NAME: &str = "undefined_tool_name";

pub struct Turn {
    chat: Arc<ChatSession>,
    prompt_id: String,
    reporter: Arc<dyn ErrorReporter>,
    pending_tool_calls: Vec<ToolCallRequest>,
    debug_responses: Vec<GenerateContentResponse>,
    finish_reason: Option<FinishReason>,
    state: TurnState,
}

impl Turn {
    pub fn new(chat: Arc<ChatSession>, prompt_id: impl Into<String>) -> Self {
        Self {
            chat,
            prompt_id: prompt_id.into(),
            reporter: Arc::new(TracingErrorReporter),
            pending_tool_calls: Vec::new(),
            debug_responses: Vec::new(),
            finish_reason: None,
            state: TurnState::NotStarted,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn prompt_id(&self) -> &str {
        &self.prompt_id
    }

    /// Tool calls requested so far, in arrival order.
    pub fn pending_tool_calls(&self) -> &[ToolCallRequest] {
        &self.pending_tool_calls
    }

    /// Every response processed by this turn.
    pub fn debug_responses(&self) -> &[GenerateContentResponse] {
        &self.debug_responses
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Run the turn.
    ///
    /// Errors arrive already normalized by the generator. Authentication
    /// failures are yielded as `Err` and end the stream. Any other failure is
    /// reported and yielded as [`StreamEvent::Error`].
    /// Cancelling `signal` yields [`StreamEvent::UserCancelled`] and ends the
    /// stream.
    pub fn run(
        &mut self,
        request: Vec<Part>,
        signal: CancellationToken,
    ) -> impl Stream<Item = Result<StreamEvent, KestrelError>> + '_ {
        async_stream::stream! {
            self.state = TurnState::Streaming;
            if signal.is_cancelled() {
                self.state = TurnState::Cancelled;
                yield Ok(StreamEvent::UserCancelled);
                return;
            }
            let sent = tokio::select! {
                biased;
                _ = signal.cancelled() => None,
                sent = self.chat.send_message_stream(request.clone(), &self.prompt_id) => Some(sent),
            };
            let mut responses = match sent {
                None => {
                    self.state = TurnState::Cancelled;
                    yield Ok(StreamEvent::UserCancelled);
                    return;
                }
                Some(Ok(responses)) => responses,
                Some(Err(err)) => {
                    yield self.handle_error(err, &request, &signal).await;
                    return;
                }
            };

            loop {
                let next = tokio::select! {
                    biased;
                    _ = signal.cancelled() => None,
                    item = responses.next() => Some(item),
                };
                let item = match next {
                    None => {
                        self.state = TurnState::Cancelled;
                        yield Ok(StreamEvent::UserCancelled);
                        return;
                    }
                    Some(None) => break,
                    Some(Some(item)) => item,
                };

                let response = match item {
                    Ok(response) => response,
                    Err(err) => {
                        yield self.handle_error(err, &request, &signal).await;
                        return;
                    }
                };
                if signal.is_cancelled() {
                    self.state = TurnState::Cancelled;
                    yield Ok(StreamEvent::UserCancelled);
                    return;
                }
                self.debug_responses.push(response.clone());

                if let Some(Part::Thought { text }) = response.parts.first() {
                    yield Ok(StreamEvent::Thought(ThoughtSummary::parse(text)));
                    continue;
                }

                if let Some(text) = response.text().filter(|t| !t.is_empty()) {
                    yield Ok(StreamEvent::Content(text));
                }

                for call in response.function_calls() {
                    let request = self.tool_call_request(call);
                    self.pending_tool_calls.push(request.clone());
                    yield Ok(StreamEvent::ToolCallRequest(request));
                }

                if let Some(reason) = response.finish_reason {
                    self.finish_reason = Some(reason);
                    self.state = TurnState::Finished;
                    yield Ok(StreamEvent::Finished(reason));
                }
            }

            if !self.state.is_terminal() {
                self.state = TurnState::Finished;
            }
        }
    }

    fn tool_call_request(&self, call: &FunctionCall) -> ToolCallRequest {
        let call_id = call
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| fallback_call_id(&call.name));
        let name = if call.name.is_empty() {
            UNDEFINED_TOOL_NAME.to_string()
        } else {
            call.name.clone()
        };
        let args = match &call.args {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        ToolCallRequest {
            call_id,
            name,
            args,
            is_client_initiated: false,
            prompt_id: self.prompt_id.clone(),
        }
    }

    async fn handle_error(
        &mut self,
        err: KestrelError,
        request: &[Part],
        signal: &CancellationToken,
    ) -> Result<StreamEvent, KestrelError> {
        if err.is_fatal() {
            self.state = TurnState::Errored;
            return Err(err);
        }
        if signal.is_cancelled() {
            self.state = TurnState::Cancelled;
            return Ok(StreamEvent::UserCancelled);
        }

        let mut context = self.chat.history();
        if context.last().map(|t| t.parts.as_slice()) != Some(request) {
            context.push(ChatTurn::new(Role::User, request.to_vec()));
        }
        if let Err(report_err) = self
            .reporter
            .report(
                &err,
                "Error when talking to the model API",
                &context,
                "turn.run",
            )
            .await
        {
            debug!(error = %report_err, "error reporter failed");
        }

        self.state = TurnState::Errored;
        Ok(StreamEvent::Error(StructuredError::from(&err)))
    }
}

/// `<name>-<unix millis>-<random hex>`.
fn fallback_call_id(name: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = Uuid::new_v4().as_u128() as u64;
    format!("{name}-{millis}-{random:x}")
}
