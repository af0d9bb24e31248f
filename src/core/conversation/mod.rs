//! The conversation loop as a reducer.
//!
//! Front ends feed [`LoopAction`]s into [`apply_action`] and execute the
//! returned [`LoopCommand`]s. All loop state lives in [`Conversation`] and is
//! mutated nowhere else.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::api::ChatMessage;
use crate::cards::{split, CardDocument};
use crate::core::events::{CardActionEvent, SessionId};
use crate::core::message::{ConversationMessage, MessageId, Role};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    AwaitingStream,
    Streaming,
    /// Transient: held only while a completed reply is committed, then `Idle`.
    TurnComplete,
    /// Transient: held only while a card prompt becomes a user turn, then
    /// `AwaitingStream`.
    AutoResubmitting,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopAction {
    SubmitMessage { message: String },
    AppendResponseChunk { content: String, stream_id: u64 },
    StreamErrored { message: String, stream_id: u64 },
    StreamCompleted { stream_id: u64 },
    CardActionFeedback { event: CardActionEvent },
}

#[derive(Debug, Clone, Copy)]
pub struct LoopContext {
    pub now: Instant,
}

impl LoopContext {
    pub fn now() -> Self {
        Self {
            now: Instant::now(),
        }
    }
}

/// Everything the streaming collaborator needs for one turn. The system
/// instruction is added by the collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub stream_id: u64,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTurn {
    pub message_id: MessageId,
    pub card: Option<CardDocument>,
    /// The assistant text exactly as streamed.
    pub text: String,
    /// Prose outside the card block; `None` when there is no card.
    pub commentary: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopCommand {
    SpawnStream(StreamRequest),
    CancelStream { stream_id: u64 },
    RenderTurn(RenderedTurn),
    ShowError(String),
}

pub struct Conversation {
    session_id: SessionId,
    messages: Vec<ConversationMessage>,
    next_message_id: u64,
    state: LoopState,
    last_stream_id: u64,
    active_stream: Option<u64>,
    response: String,
    pending_input: Option<String>,
    last_resubmission: Option<Instant>,
    debounce: Duration,
}

impl Conversation {
    pub fn new(session_id: SessionId) -> Self {
        Self::with_debounce(session_id, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(session_id: SessionId, debounce: Duration) -> Self {
        Self {
            session_id,
            messages: Vec::new(),
            next_message_id: 1,
            state: LoopState::Idle,
            last_stream_id: 0,
            active_stream: None,
            response: String::new(),
            pending_input: None,
            last_resubmission: None,
            debounce,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Text received so far for the stream in flight.
    pub fn partial_response(&self) -> &str {
        &self.response
    }

    pub fn pending_input(&self) -> Option<&str> {
        self.pending_input.as_deref()
    }

    pub fn active_stream(&self) -> Option<u64> {
        self.active_stream
    }

    pub fn is_current_stream(&self, stream_id: u64) -> bool {
        self.active_stream == Some(stream_id)
    }

    pub fn api_messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(ConversationMessage::to_api).collect()
    }

    fn push_message(&mut self, role: Role, content: String) -> MessageId {
        let id = MessageId(self.next_message_id);
        self.next_message_id += 1;
        self.messages.push(ConversationMessage { id, role, content });
        id
    }

    /// Commits whatever arrived for the stream in flight and forgets it.
    fn take_partial_response(&mut self) -> Option<MessageId> {
        self.active_stream = None;
        let text = std::mem::take(&mut self.response);
        if text.trim().is_empty() {
            return None;
        }
        Some(self.push_message(Role::Assistant, text))
    }
}

pub fn apply_actions(
    conversation: &mut Conversation,
    actions: impl IntoIterator<Item = LoopAction>,
    ctx: LoopContext,
) -> Vec<LoopCommand> {
    actions
        .into_iter()
        .flat_map(|action| apply_action(conversation, action, ctx))
        .collect()
}

pub fn apply_action(
    conversation: &mut Conversation,
    action: LoopAction,
    ctx: LoopContext,
) -> Vec<LoopCommand> {
    match action {
        LoopAction::SubmitMessage { message } => submit_message(conversation, message),
        LoopAction::AppendResponseChunk { content, stream_id } => {
            if !conversation.is_current_stream(stream_id) {
                debug!(stream_id, "dropping chunk from stale stream");
                return Vec::new();
            }
            if conversation.state == LoopState::AwaitingStream {
                conversation.state = LoopState::Streaming;
            }
            conversation.response.push_str(&content);
            Vec::new()
        }
        LoopAction::StreamErrored { message, stream_id } => {
            if !conversation.is_current_stream(stream_id) {
                return Vec::new();
            }
            conversation.take_partial_response();
            conversation.state = LoopState::Idle;
            vec![LoopCommand::ShowError(message)]
        }
        LoopAction::StreamCompleted { stream_id } => {
            if !conversation.is_current_stream(stream_id) {
                return Vec::new();
            }
            finalize_turn(conversation)
        }
        LoopAction::CardActionFeedback { event } => handle_feedback(conversation, event, ctx),
    }
}

fn submit_message(conversation: &mut Conversation, message: String) -> Vec<LoopCommand> {
    if message.trim().is_empty() {
        return Vec::new();
    }

    let mut commands = Vec::new();
    if let Some(stream_id) = conversation.active_stream {
        debug!(stream_id, "superseding stream in flight");
        commands.push(LoopCommand::CancelStream { stream_id });
        conversation.take_partial_response();
    }

    conversation.push_message(Role::User, message);
    conversation.last_stream_id += 1;
    let stream_id = conversation.last_stream_id;
    conversation.active_stream = Some(stream_id);
    conversation.state = LoopState::AwaitingStream;

    commands.push(LoopCommand::SpawnStream(StreamRequest {
        stream_id,
        messages: conversation.api_messages(),
    }));
    commands
}

fn finalize_turn(conversation: &mut Conversation) -> Vec<LoopCommand> {
    conversation.state = LoopState::TurnComplete;
    let text = conversation.response.clone();
    let committed = conversation.take_partial_response();
    conversation.state = LoopState::Idle;

    let Some(message_id) = committed else {
        debug!("stream completed without any text");
        return Vec::new();
    };

    let turn = split(&text);
    vec![LoopCommand::RenderTurn(RenderedTurn {
        message_id,
        card: turn.card,
        text,
        commentary: turn.commentary,
    })]
}

fn handle_feedback(
    conversation: &mut Conversation,
    event: CardActionEvent,
    ctx: LoopContext,
) -> Vec<LoopCommand> {
    if event.session_id != conversation.session_id {
        debug!(session = %event.session_id, "ignoring feedback for another session");
        return Vec::new();
    }
    let Some(prompt) = event.result.follow_up_prompt() else {
        return Vec::new();
    };

    if let Some(last) = conversation.last_resubmission {
        if ctx.now.saturating_duration_since(last) < conversation.debounce {
            debug!("resubmission already in progress, dropping feedback");
            return Vec::new();
        }
    }

    conversation.last_resubmission = Some(ctx.now);
    conversation.state = LoopState::AutoResubmitting;
    conversation.pending_input = Some(prompt.to_string());

    let Some(message) = conversation.pending_input.take() else {
        return Vec::new();
    };
    submit_message(conversation, message)
}
