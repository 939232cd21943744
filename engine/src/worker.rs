//! The conversation worker: drives turns against the Messages API.
//!
//! Each turn streams an assistant message into the registered
//! [`StreamHandler`], resolves any tool calls, and repeats until the model
//! stops asking for tools. Tool execution goes through the [`ToolRuntime`]
//! seam after the permission handler approves it. The interaction tools
//! (`AskUserQuestion`, `TodoWrite`) are answered by the worker itself.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use tern_providers::{AnthropicClient, MessagesRequest, ToolDefinition};
use tern_types::{
    BlockStart, ContentBlock, Message, PermissionContext, PermissionMode, PermissionVerdict,
    Question, Role, StreamHandler, TodoItem, Usage,
};

use crate::agent::{
    Agent, AgentError, AgentFuture, AskUserHandler, CompletionClient, CompletionFuture,
    PermissionHandler, TurnCompleteFn,
};
use crate::rendezvous::permission_suggestions;

pub const DEFAULT_MAX_TOKENS: u32 = 16_384;
const COMPACT_MAX_TOKENS: u32 = 4_096;

pub const ASK_USER_TOOL: &str = "AskUserQuestion";
pub const TODO_TOOL: &str = "TodoWrite";

const SYSTEM_PROMPT: &str = "You are tern, an AI coding assistant running in the user's terminal. \
Be concise. Ask before making assumptions the user would want a say in.";

const COMPACT_PROMPT: &str = "Summarize this conversation so it can continue from the summary \
alone. Keep file paths, decisions, open tasks, and anything the user asked to remember. Reply \
with the summary only.";

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// Receives the task list whenever the agent rewrites it.
pub type TodoSink = Arc<dyn Fn(Vec<TodoItem>) + Send + Sync>;

/// Executes tools on the worker's behalf.
pub trait ToolRuntime: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Tools that never change anything run without a prompt in plan mode.
    fn is_read_only(&self, name: &str) -> bool;

    fn execute<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        name: &'a str,
        input: &'a Value,
    ) -> ToolFuture<'a>;
}

/// Exposes no tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTools;

impl ToolRuntime for NoTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    fn is_read_only(&self, _name: &str) -> bool {
        false
    }

    fn execute<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
        name: &'a str,
        _input: &'a Value,
    ) -> ToolFuture<'a> {
        Box::pin(async move { Err(format!("Unknown tool: {name}")) })
    }
}

/// Drops every event. Used until the loop registers its sink.
struct NullHandler;

impl StreamHandler for NullHandler {
    fn on_message_start(&self, _usage: Usage, _model: Option<&str>) {}
    fn on_content_block_start(&self, _index: usize, _block: &BlockStart) {}
    fn on_text_delta(&self, _index: usize, _text: &str) {}
    fn on_thinking_delta(&self, _index: usize, _thinking: &str) {}
    fn on_signature_delta(&self, _index: usize, _signature: &str) {}
    fn on_input_json_delta(&self, _index: usize, _partial_json: &str) {}
    fn on_content_block_stop(&self, _index: usize) {}
    fn on_message_delta(&self, _stop_reason: Option<&str>, _usage: Option<Usage>) {}
    fn on_message_stop(&self) {}
    fn on_error(&self, _message: &str) {}
}

#[derive(Default)]
struct Hooks {
    handler: Option<Arc<dyn StreamHandler>>,
    permission: Option<Arc<dyn PermissionHandler>>,
    ask_user: Option<Arc<dyn AskUserHandler>>,
    on_turn_complete: Option<TurnCompleteFn>,
    todos: Option<TodoSink>,
}

struct State {
    model: String,
    fast_mode: bool,
    permission_mode: PermissionMode,
    always_allowed: HashSet<String>,
    history: Vec<Message>,
}

pub struct ConversationAgent {
    client: AnthropicClient,
    tools: Arc<dyn ToolRuntime>,
    state: Mutex<State>,
    hooks: Mutex<Hooks>,
}

impl fmt::Debug for ConversationAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationAgent")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl ConversationAgent {
    #[must_use]
    pub fn new(client: AnthropicClient, model: impl Into<String>) -> Self {
        Self {
            client,
            tools: Arc::new(NoTools),
            state: Mutex::new(State {
                model: model.into(),
                fast_mode: false,
                permission_mode: PermissionMode::Default,
                always_allowed: HashSet::new(),
                history: Vec::new(),
            }),
            hooks: Mutex::new(Hooks::default()),
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Arc<dyn ToolRuntime>) -> Self {
        self.tools = tools;
        self
    }

    pub fn set_todo_sink(&self, sink: TodoSink) {
        self.hooks().todos = Some(sink);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hooks(&self) -> MutexGuard<'_, Hooks> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handler(&self) -> Arc<dyn StreamHandler> {
        self.hooks()
            .handler
            .clone()
            .unwrap_or_else(|| Arc::new(NullHandler))
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut tools = interaction_tools();
        tools.extend(self.tools.definitions());
        tools
    }

    fn notify_turn_complete(&self) {
        let callback = self.hooks().on_turn_complete.clone();
        if let Some(callback) = callback {
            let history = self.state().history.clone();
            callback(&history);
        }
    }

    async fn run_turn(&self, cancel: &CancellationToken, text: String) -> Result<(), AgentError> {
        self.state().history.push(Message::user(text));
        let handler = self.handler();
        let tools = self.tool_definitions();
        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            let request = {
                let state = self.state();
                MessagesRequest {
                    model: state.model.clone(),
                    system: Some(SYSTEM_PROMPT.to_string()),
                    messages: state.history.clone(),
                    max_tokens: DEFAULT_MAX_TOKENS,
                    tools: tools.clone(),
                }
            };
            let outcome = tokio::select! {
                () = cancel.cancelled() => return Err(AgentError::Cancelled),
                outcome = self.client.stream(&request, handler.as_ref()) => outcome?,
            };
            let wants_tools = outcome.wants_tools();
            let message = outcome.message;
            if !message.content.is_empty() {
                self.state().history.push(message.clone());
            }
            if !wants_tools || message.tool_uses().is_empty() {
                return Ok(());
            }
            let results = self.run_tools(cancel, &message).await;
            let interrupted = cancel.is_cancelled();
            self.state().history.push(Message {
                role: Role::User,
                content: results,
            });
            if interrupted {
                return Err(AgentError::Cancelled);
            }
        }
    }

    /// One result per tool call, in call order. After cancellation the
    /// remaining calls are answered as interrupted so history stays valid.
    async fn run_tools(&self, cancel: &CancellationToken, message: &Message) -> Vec<ContentBlock> {
        let mut results = Vec::new();
        for (id, name, input) in message.tool_uses() {
            let outcome = if cancel.is_cancelled() {
                Err("Interrupted by user".to_string())
            } else {
                self.run_tool(cancel, name, input).await
            };
            let (content, is_error) = match outcome {
                Ok(content) => (content, false),
                Err(content) => (content, true),
            };
            results.push(ContentBlock::ToolResult {
                tool_use_id: id.to_string(),
                content,
                is_error,
            });
        }
        results
    }

    async fn run_tool(
        &self,
        cancel: &CancellationToken,
        name: &str,
        input: &Value,
    ) -> Result<String, String> {
        match name {
            ASK_USER_TOOL => return self.ask_user(cancel, input).await,
            TODO_TOOL => return self.write_todos(input),
            _ => {}
        }
        match self.check_permission(cancel, name, input).await {
            Ok(true) => {}
            Ok(false) => return Err("The user denied this tool call.".to_string()),
            Err(AgentError::Cancelled) => return Err("Interrupted by user".to_string()),
            Err(err) => return Err(err.to_string()),
        }
        self.tools.execute(cancel, name, input).await
    }

    async fn check_permission(
        &self,
        cancel: &CancellationToken,
        name: &str,
        input: &Value,
    ) -> Result<bool, AgentError> {
        let mode = self.state().permission_mode;
        match mode {
            PermissionMode::BypassPermissions => return Ok(true),
            PermissionMode::AcceptEdits if is_edit_tool(name) => return Ok(true),
            PermissionMode::Plan if !self.tools.is_read_only(name) => return Ok(false),
            PermissionMode::Plan => return Ok(true),
            _ => {}
        }
        if self.is_always_allowed(name, input) {
            return Ok(true);
        }
        let handler = self.hooks().permission.clone();
        let Some(handler) = handler else {
            return Ok(false);
        };
        let verdict = handler.request_permission(cancel, name, input).await?;
        if verdict == PermissionVerdict::AlwaysAllow {
            let mut state = self.state();
            for rule in permission_suggestions(name, input) {
                state.always_allowed.insert(rule);
            }
        }
        Ok(verdict.is_allowed())
    }

    fn is_always_allowed(&self, name: &str, input: &Value) -> bool {
        let state = self.state();
        permission_suggestions(name, input)
            .iter()
            .any(|rule| state.always_allowed.contains(rule))
    }

    async fn ask_user(&self, cancel: &CancellationToken, input: &Value) -> Result<String, String> {
        let questions: Vec<Question> = input
            .get("questions")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| format!("Invalid questions: {e}"))?
            .unwrap_or_default();
        if questions.is_empty() {
            return Err("No questions given.".to_string());
        }
        let handler = self.hooks().ask_user.clone();
        let Some(handler) = handler else {
            return Err("Questions are not available in this session.".to_string());
        };
        let answers = handler
            .ask(cancel, questions.clone())
            .await
            .map_err(|e| e.to_string())?;
        if answers.is_empty() {
            return Err("The user dismissed the questions.".to_string());
        }
        Ok(questions
            .iter()
            .map(|q| {
                let answer = answers.get(&q.question).map_or("(no answer)", String::as_str);
                format!("{}: {answer}", q.question)
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn write_todos(&self, input: &Value) -> Result<String, String> {
        let todos: Vec<TodoItem> = input
            .get("todos")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| format!("Invalid todos: {e}"))?
            .unwrap_or_default();
        let count = todos.len();
        let sink = self.hooks().todos.clone();
        if let Some(sink) = sink {
            sink(todos);
        }
        Ok(format!("Task list updated ({count} items)."))
    }

    async fn run_compact(&self, cancel: &CancellationToken) -> Result<(), AgentError> {
        let (model, mut messages) = {
            let state = self.state();
            (state.model.clone(), state.history.clone())
        };
        if messages.len() < 2 {
            return Err(AgentError::NothingToCompact);
        }
        messages.push(Message::user(COMPACT_PROMPT));
        let request = MessagesRequest {
            model,
            system: Some(SYSTEM_PROMPT.to_string()),
            messages,
            max_tokens: COMPACT_MAX_TOKENS,
            tools: Vec::new(),
        };
        let summary = tokio::select! {
            () = cancel.cancelled() => return Err(AgentError::Cancelled),
            summary = self.client.complete(&request) => summary?,
        };
        self.state().history = vec![
            Message::user(format!("Summary of the conversation so far:\n\n{summary}")),
            Message::assistant_text("Understood. I'll continue from this summary."),
        ];
        Ok(())
    }
}

fn is_edit_tool(name: &str) -> bool {
    matches!(name, "FileEdit" | "FileWrite" | "Edit" | "Write")
}

fn interaction_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: ASK_USER_TOOL.to_string(),
            description: "Ask the user one or more multiple-choice questions. The user may \
                          also type a custom answer."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "questions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "header": {"type": "string"},
                                "question": {"type": "string"},
                                "options": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "label": {"type": "string"},
                                            "description": {"type": "string"}
                                        },
                                        "required": ["label"]
                                    }
                                }
                            },
                            "required": ["question", "options"]
                        }
                    }
                },
                "required": ["questions"]
            }),
        },
        ToolDefinition {
            name: TODO_TOOL.to_string(),
            description: "Replace the task list shown to the user.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "todos": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "content": {"type": "string"},
                                "status": {"enum": ["pending", "in_progress", "completed"]},
                                "activeForm": {"type": "string"}
                            },
                            "required": ["content", "status"]
                        }
                    }
                },
                "required": ["todos"]
            }),
        },
    ]
}

impl Agent for ConversationAgent {
    fn send_message(&self, cancel: CancellationToken, text: String) -> AgentFuture<'_> {
        Box::pin(async move {
            let result = self.run_turn(&cancel, text).await;
            if let Err(err) = &result {
                tracing::warn!(%err, "turn ended with error");
            }
            self.notify_turn_complete();
            result
        })
    }

    fn compact(&self, cancel: CancellationToken) -> AgentFuture<'_> {
        Box::pin(async move {
            self.run_compact(&cancel).await?;
            self.notify_turn_complete();
            Ok(())
        })
    }

    fn clear(&self) {
        self.state().history.clear();
    }

    fn set_model(&self, model: &str) {
        self.state().model = model.to_string();
    }

    fn model(&self) -> String {
        self.state().model.clone()
    }

    fn set_fast_mode(&self, enabled: bool) {
        self.state().fast_mode = enabled;
    }

    fn fast_mode(&self) -> bool {
        self.state().fast_mode
    }

    fn set_permission_mode(&self, mode: PermissionMode) {
        self.state().permission_mode = mode;
    }

    fn set_on_turn_complete(&self, callback: TurnCompleteFn) {
        self.hooks().on_turn_complete = Some(callback);
    }

    fn set_handler(&self, handler: Arc<dyn StreamHandler>) {
        self.hooks().handler = Some(handler);
    }

    fn set_permission_handler(&self, handler: Arc<dyn PermissionHandler>) {
        self.hooks().permission = Some(handler);
    }

    fn set_ask_user_handler(&self, handler: Arc<dyn AskUserHandler>) {
        self.hooks().ask_user = Some(handler);
    }

    fn messages(&self) -> Vec<Message> {
        self.state().history.clone()
    }

    fn set_messages(&self, messages: Vec<Message>) {
        self.state().history = messages;
    }

    fn history_len(&self) -> usize {
        self.state().history.len()
    }

    fn permission_context(&self) -> PermissionContext {
        let state = self.state();
        let mut always_allowed: Vec<String> = state.always_allowed.iter().cloned().collect();
        always_allowed.sort();
        PermissionContext {
            mode: state.permission_mode,
            always_allowed,
        }
    }
}

impl CompletionClient for AnthropicClient {
    fn complete<'a>(
        &'a self,
        model: &'a str,
        system: &'a str,
        messages: Vec<Message>,
        max_tokens: u32,
    ) -> CompletionFuture<'a> {
        Box::pin(async move {
            let request = MessagesRequest {
                model: model.to_string(),
                system: Some(system.to_string()),
                messages,
                max_tokens,
                tools: Vec::new(),
            };
            AnthropicClient::complete(self, &request)
                .await
                .map_err(AgentError::from)
        })
    }
}
