//! Scripted chat backend for offline tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{ChatBackend, ChatMessage, ChatRequest, ChatRole, GatewayError, ModelReply, ToolCall};

enum Step {
    Reply(ModelReply),
    Fail(GatewayError),
    Stall,
}

/// Replays queued replies in order and captures every request it sees
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(self, step: Step) -> Self {
        self.script.lock().unwrap().push_back(step);
        self
    }

    pub(crate) fn text(self, text: &str) -> Self {
        self.push(Step::Reply(ModelReply::Text(text.to_string())))
    }

    pub(crate) fn tool_call(self, id: &str, name: &str, arguments: &str) -> Self {
        let call = ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        };
        let assistant = ChatMessage {
            role: ChatRole::Assistant,
            content: String::new(),
            tool_calls: vec![call.clone()],
            tool_call_id: None,
        };
        self.push(Step::Reply(ModelReply::ToolCalls {
            assistant,
            calls: vec![call],
        }))
    }

    pub(crate) fn fail(self, error: GatewayError) -> Self {
        self.push(Step::Fail(error))
    }

    /// Never answers; used to exercise deadlines and cancellation
    pub(crate) fn stall(self) -> Self {
        self.push(Step::Stall)
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ModelReply, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Stall) => std::future::pending().await,
            None => Err(GatewayError::Transport("script exhausted".to_string())),
        }
    }
}
