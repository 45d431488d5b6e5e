//! Chat session: owns the history and drives one generator.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use tracing::debug;

use crate::error::KestrelError;
use crate::provider::{ContentGenerator, ResponseStream};
use crate::types::{
    ChatTurn, GenerateContentConfig, GenerateContentRequest, GenerateContentResponse, Part, Role,
};

/// A conversation with one model.
///
/// The history holds curated turns only: user or tool turns as sent, and one
/// consolidated model turn per completed response stream.
pub struct ChatSession {
    generator: Arc<dyn ContentGenerator>,
    model: String,
    config: GenerateContentConfig,
    history: Arc<Mutex<Vec<ChatTurn>>>,
}

impl ChatSession {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        model: impl Into<String>,
        config: GenerateContentConfig,
    ) -> Self {
        Self {
            generator,
            model: model.into(),
            config,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_history(self, history: Vec<ChatTurn>) -> Self {
        *lock(&self.history) = history;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn config(&self) -> &GenerateContentConfig {
        &self.config
    }

    pub fn generator(&self) -> &Arc<dyn ContentGenerator> {
        &self.generator
    }

    pub fn history(&self) -> Vec<ChatTurn> {
        lock(&self.history).clone()
    }

    pub fn add_history(&self, turn: ChatTurn) {
        lock(&self.history).push(turn);
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear();
    }

    /// Append `message` to the history and stream the model's reply.
    ///
    /// A message made only of function responses is recorded as a tool turn.
    /// The consolidated model turn is appended once the stream ends without
    /// an error.
    pub async fn send_message_stream(
        &self,
        message: Vec<Part>,
        prompt_id: &str,
    ) -> Result<ResponseStream, KestrelError> {
        let turn = user_turn(message);
        let contents = {
            let mut history = lock(&self.history);
            history.push(turn);
            history.clone()
        };
        let request = GenerateContentRequest {
            model: self.model.clone(),
            contents,
            config: self.config.clone(),
        };
        debug!(prompt_id, turns = request.contents.len(), "sending message");

        let mut upstream = self
            .generator
            .generate_content_stream(&request, prompt_id)
            .await?;
        let history = Arc::clone(&self.history);

        let stream = async_stream::stream! {
            let mut collected = Vec::new();
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(response) => {
                        collected.push(response.clone());
                        yield Ok(response);
                    }
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
            if let Some(turn) = consolidate(&collected) {
                lock(&history).push(turn);
            }
        };
        Ok(Box::pin(stream))
    }
}

fn user_turn(parts: Vec<Part>) -> ChatTurn {
    let turn = ChatTurn::new(Role::User, parts);
    if turn.is_function_responses_only() {
        ChatTurn::new(Role::Tool, turn.parts)
    } else {
        turn
    }
}

/// Merge streamed responses into one model turn: adjacent text joined,
/// function calls kept in order, thoughts dropped.
fn consolidate(responses: &[GenerateContentResponse]) -> Option<ChatTurn> {
    let mut parts: Vec<Part> = Vec::new();
    for part in responses.iter().flat_map(|r| r.parts.iter()) {
        match part {
            Part::Thought { .. } => {}
            Part::Text { text } => match parts.last_mut() {
                Some(Part::Text { text: last }) => last.push_str(text),
                _ => parts.push(part.clone()),
            },
            other => parts.push(other.clone()),
        }
    }
    parts.retain(|p| !matches!(p, Part::Text { text } if text.is_empty()));
    (!parts.is_empty()).then(|| ChatTurn::new(Role::Model, parts))
}

fn lock(history: &Mutex<Vec<ChatTurn>>) -> MutexGuard<'_, Vec<ChatTurn>> {
    history
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
