//! Interactive line-based chat.
//!
//! Replies stream to stdout as they arrive. Once a card block starts, the raw
//! payload is held back and the card is shown as a numbered outline when the
//! turn completes.

use std::collections::HashMap;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::actions::{ActionSubmitter, HttpActionClient, LocalActionClient};
use crate::cards::render::{
    toggle_visibility, CardInput, CardRenderer, ControlKind, HostConfig, InputKind, Interaction,
    RenderedCard, TextRenderer,
};
use crate::cards::{card_fence_start, card_span, CardDocument, TemplateStore, VariableMap};
use crate::cli::card::parse_variables;
use crate::core::chat_stream::{ChatStreamService, StreamMessage, StreamParams};
use crate::core::config::Config;
use crate::core::conversation::{
    apply_action, Conversation, LoopAction, LoopCommand, LoopContext, RenderedTurn,
};
use crate::core::events::{ActionEventBus, CardActionEvent, SessionId};
use crate::core::system_prompt::system_prompt;
use crate::logging::TranscriptLog;

const HELP_TEXT: &str = "\
Commands:
  /N                Activate control N of the most recent card
  /cards            List the built-in card templates
  /card NAME [k=v]  Render a built-in template locally
  /help             Show this list
  /quit             Leave the chat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Message(String),
    /// One-based control number.
    Activate(usize),
    ListCards,
    RenderTemplate {
        name: String,
        variables: Vec<String>,
    },
    Help,
    Quit,
    Unknown(String),
}

/// Classifies one line of user input. Blank lines yield `None`.
pub fn parse_input(line: &str) -> Option<ChatInput> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Some(ChatInput::Message(trimmed.to_string()));
    };

    let mut parts = command.split_whitespace();
    let head = parts.next().unwrap_or_default();
    let input = match head {
        "quit" | "exit" => ChatInput::Quit,
        "help" => ChatInput::Help,
        "cards" => ChatInput::ListCards,
        "card" => match parts.next() {
            Some(name) => ChatInput::RenderTemplate {
                name: name.to_string(),
                variables: parts.map(str::to_string).collect(),
            },
            None => ChatInput::Unknown(trimmed.to_string()),
        },
        number => match number.parse::<usize>() {
            Ok(index) if index > 0 => ChatInput::Activate(index),
            _ => ChatInput::Unknown(trimmed.to_string()),
        },
    };
    Some(input)
}

/// Maps a typed answer onto the value an input submits. Blank answers yield
/// `Ok(None)` so the input's default applies.
pub fn interpret_answer(input: &CardInput, answer: &str) -> Result<Option<String>, String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(None);
    }

    match &input.kind {
        InputKind::Text { .. } => Ok(Some(answer.to_string())),
        InputKind::Choice { choices, multi } => {
            let picks: Vec<&str> = if *multi {
                answer.split(',').map(str::trim).filter(|p| !p.is_empty()).collect()
            } else {
                vec![answer]
            };
            let mut values = Vec::with_capacity(picks.len());
            for pick in picks {
                let by_number = pick
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| choices.get(i));
                let by_name = || {
                    choices.iter().find(|(title, value)| {
                        value == pick || title.eq_ignore_ascii_case(pick)
                    })
                };
                match by_number.or_else(by_name) {
                    Some((_, value)) => values.push(value.clone()),
                    None => return Err(format!("'{pick}' is not one of the choices")),
                }
            }
            Ok(Some(values.join(",")))
        }
        InputKind::Toggle {
            value_on,
            value_off,
        } => match answer.to_ascii_lowercase().as_str() {
            "y" | "yes" | "true" | "on" => Ok(Some(value_on.clone())),
            "n" | "no" | "false" | "off" => Ok(Some(value_off.clone())),
            _ => Err("Answer yes or no".to_string()),
        },
    }
}

/// How much of the streaming reply has been printed.
#[derive(Debug, Default)]
struct EchoState {
    echoed: usize,
    card_started: bool,
}

impl EchoState {
    /// Returns the part of `partial` that can be printed now. Trailing
    /// backticks wait for the next chunk since they may open a card block.
    fn advance<'a>(&mut self, partial: &'a str) -> &'a str {
        if self.card_started {
            return "";
        }
        let end = match card_fence_start(partial) {
            Some(start) => {
                self.card_started = true;
                start
            }
            None => partial.trim_end_matches('`').len(),
        };
        if end <= self.echoed {
            return "";
        }
        let fresh = &partial[self.echoed..end];
        self.echoed = end;
        fresh
    }
}

struct CardView {
    card: CardDocument,
    rendered: RenderedCard,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct ChatSession {
    config: Config,
    conversation: Conversation,
    bus: ActionEventBus,
    submitter: Box<dyn ActionSubmitter>,
    stream_service: ChatStreamService,
    client: reqwest::Client,
    api_key: Option<String>,
    transcript: TranscriptLog,
    host: HostConfig,
    card_view: Option<CardView>,
    active_stream: Option<(u64, CancellationToken)>,
    echo: EchoState,
}

fn flush_stdout() {
    let _ = std::io::stdout().flush();
}

fn build_submitter(config: &Config, client: &reqwest::Client) -> Box<dyn ActionSubmitter> {
    match config.action_url() {
        Some(url) => {
            let remote = HttpActionClient::new(client.clone(), url);
            debug!(endpoint = remote.endpoint(), "sending card actions to remote endpoint");
            Box::new(remote)
        }
        None => Box::new(LocalActionClient::default()),
    }
}

/// The user turn a feedback event started, if the loop accepted it.
fn resubmitted_prompt(commands: &[LoopCommand]) -> Option<&str> {
    commands.iter().find_map(|command| match command {
        LoopCommand::SpawnStream(request) => {
            request.messages.last().map(|message| message.content.as_str())
        }
        _ => None,
    })
}

impl ChatSession {
    fn new(
        config: Config,
        transcript: TranscriptLog,
        session_id: SessionId,
        bus: ActionEventBus,
        stream_service: ChatStreamService,
    ) -> Self {
        let client = reqwest::Client::new();
        Self {
            conversation: Conversation::with_debounce(session_id, config.debounce()),
            submitter: build_submitter(&config, &client),
            api_key: config.api_key(),
            bus,
            stream_service,
            client,
            transcript,
            host: HostConfig::default(),
            card_view: None,
            active_stream: None,
            echo: EchoState::default(),
            config,
        }
    }

    fn log_transcript(&self, result: std::io::Result<()>) {
        if let Err(err) = result {
            debug!(error = %err, "failed to write transcript");
        }
    }

    fn prompt(&self) {
        if self.conversation.active_stream().is_none() {
            print!("> ");
            flush_stdout();
        }
    }

    async fn handle_line<R>(&mut self, line: &str, lines: &mut Lines<R>) -> Result<Flow, Box<dyn Error>>
    where
        R: AsyncBufRead + Unpin,
    {
        let Some(input) = parse_input(line) else {
            self.prompt();
            return Ok(Flow::Continue);
        };

        match input {
            ChatInput::Message(message) => {
                let commands = apply_action(
                    &mut self.conversation,
                    LoopAction::SubmitMessage { message },
                    LoopContext::now(),
                );
                self.run_commands(commands);
            }
            ChatInput::Activate(number) => {
                self.activate_control(number, lines).await?;
                self.prompt();
            }
            ChatInput::ListCards => {
                for name in TemplateStore::builtin().names() {
                    println!("  {name}");
                }
                self.prompt();
            }
            ChatInput::RenderTemplate { name, variables } => {
                match parse_variables(&variables) {
                    Ok(variables) => match TemplateStore::builtin().resolve(&name, &variables) {
                        Some(card) => self.show_card(card),
                        None => eprintln!("❌ Unknown card template: {name}"),
                    },
                    Err(err) => eprintln!("❌ {err}"),
                }
                self.prompt();
            }
            ChatInput::Help => {
                println!("{HELP_TEXT}");
                self.prompt();
            }
            ChatInput::Quit => return Ok(Flow::Quit),
            ChatInput::Unknown(command) => {
                eprintln!("⚠️  Unknown command: {command} (try /help)");
                self.prompt();
            }
        }
        Ok(Flow::Continue)
    }

    fn handle_stream(&mut self, message: StreamMessage, stream_id: u64) {
        let is_chunk = matches!(message, StreamMessage::Chunk(_));
        let action = match message {
            StreamMessage::Chunk(content) => LoopAction::AppendResponseChunk { content, stream_id },
            StreamMessage::Error(message) => LoopAction::StreamErrored { message, stream_id },
            StreamMessage::End => LoopAction::StreamCompleted { stream_id },
        };
        let commands = apply_action(&mut self.conversation, action, LoopContext::now());

        if is_chunk && self.conversation.is_current_stream(stream_id) {
            let fresh = self.echo.advance(self.conversation.partial_response());
            if !fresh.is_empty() {
                print!("{fresh}");
                flush_stdout();
            }
        }
        self.run_commands(commands);
    }

    fn handle_feedback(&mut self, event: CardActionEvent) {
        let commands = apply_action(
            &mut self.conversation,
            LoopAction::CardActionFeedback { event },
            LoopContext::now(),
        );
        match resubmitted_prompt(&commands) {
            Some(prompt) => println!("↻ {prompt}"),
            None => self.prompt(),
        }
        self.run_commands(commands);
    }

    fn run_commands(&mut self, commands: Vec<LoopCommand>) {
        for command in commands {
            match command {
                LoopCommand::SpawnStream(request) => {
                    if let Some(last) = request.messages.last() {
                        self.log_transcript(self.transcript.log_user(&last.content));
                    }
                    let cancel_token = CancellationToken::new();
                    self.active_stream = Some((request.stream_id, cancel_token.clone()));
                    self.echo = EchoState::default();
                    self.stream_service.spawn_stream(StreamParams {
                        client: self.client.clone(),
                        base_url: self.config.base_url().to_string(),
                        api_key: self.api_key.clone(),
                        model: self.config.model().to_string(),
                        system_prompt: system_prompt().to_string(),
                        api_messages: request.messages,
                        max_duration: self.config.max_duration(),
                        cancel_token,
                        stream_id: request.stream_id,
                    });
                }
                LoopCommand::CancelStream { stream_id } => {
                    if let Some((active_id, token)) = self.active_stream.take() {
                        if active_id == stream_id {
                            token.cancel();
                            println!();
                        } else {
                            self.active_stream = Some((active_id, token));
                        }
                    }
                }
                LoopCommand::RenderTurn(turn) => {
                    self.active_stream = None;
                    self.finish_turn(turn);
                    self.prompt();
                }
                LoopCommand::ShowError(message) => {
                    self.active_stream = None;
                    println!();
                    eprintln!("❌ {message}");
                    self.log_transcript(self.transcript.log_note(&message));
                    self.prompt();
                }
            }
        }
    }

    fn finish_turn(&mut self, turn: RenderedTurn) {
        let echo = std::mem::take(&mut self.echo);
        let text = turn.text.as_str();

        match (turn.card, card_span(text)) {
            (Some(card), Some(span)) => {
                if span.start > echo.echoed {
                    print!("{}", &text[echo.echoed..span.start]);
                }
                println!();
                self.show_card(card);
                let after = text[span.end..].trim();
                if !after.is_empty() {
                    println!("{after}");
                }
            }
            _ => {
                println!("{}", text.get(echo.echoed..).unwrap_or_default());
            }
        }
        self.log_transcript(self.transcript.log_assistant(text));
    }

    fn show_welcome(&mut self) {
        match TemplateStore::builtin().resolve("welcome", &VariableMap::new()) {
            Some(card) => self.show_card(card),
            None => debug!("welcome template missing from catalog"),
        }
    }

    fn show_card(&mut self, card: CardDocument) {
        let rendered = TextRenderer.render(&card, &self.host);
        println!("{}", rendered.text());
        if !rendered.controls.is_empty() {
            println!("(type /N to activate a control)");
        }
        self.card_view = Some(CardView { card, rendered });
    }

    async fn collect_inputs<R>(
        inputs: &[CardInput],
        lines: &mut Lines<R>,
    ) -> Result<Option<HashMap<String, String>>, Box<dyn Error>>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut values = HashMap::new();
        for input in inputs {
            let label = if input.label.is_empty() { &input.id } else { &input.label };
            if let InputKind::Choice { choices, multi } = &input.kind {
                for (index, (title, _)) in choices.iter().enumerate() {
                    println!("    {}. {title}", index + 1);
                }
                if *multi {
                    println!("    (several allowed, separated by commas)");
                }
            }
            loop {
                match &input.default_value {
                    Some(default) => print!("  {label} [{default}]: "),
                    None => print!("  {label}: "),
                }
                flush_stdout();

                let Some(answer) = lines.next_line().await? else {
                    return Ok(None);
                };
                match interpret_answer(input, &answer) {
                    Ok(Some(value)) => {
                        values.insert(input.id.clone(), value);
                        break;
                    }
                    Ok(None) => break,
                    Err(err) => eprintln!("  ⚠️  {err}"),
                }
            }
        }
        Ok(Some(values))
    }

    async fn activate_control<R>(
        &mut self,
        number: usize,
        lines: &mut Lines<R>,
    ) -> Result<(), Box<dyn Error>>
    where
        R: AsyncBufRead + Unpin,
    {
        let Some(view) = &self.card_view else {
            eprintln!("⚠️  There is no card to act on");
            return Ok(());
        };
        let Some(control) = view.rendered.controls.get(number - 1) else {
            eprintln!("⚠️  The card has no control {number}");
            return Ok(());
        };

        let values = if matches!(control.kind, ControlKind::Submit { .. }) {
            match Self::collect_inputs(&view.rendered.inputs, lines).await? {
                Some(values) => values,
                None => return Ok(()),
            }
        } else {
            HashMap::new()
        };

        let Some(interaction) = view.rendered.activate(number - 1, &values) else {
            eprintln!("⚠️  Control {number} cannot be activated");
            return Ok(());
        };

        match interaction {
            Interaction::Submit(payload) => {
                match self.submitter.submit(&payload).await {
                    Ok(result) => {
                        if !result.message.is_empty() {
                            println!("✔ {}", result.message);
                            self.log_transcript(self.transcript.log_note(&result.message));
                        }
                        if let Some(card) = result.card.clone() {
                            self.show_card(card);
                        }
                        let session_id = self.conversation.session_id();
                        self.bus.publish(session_id, result);
                    }
                    Err(err) => {
                        debug!(error = %err, "card action failed");
                        eprintln!("{}", err.inline_message());
                    }
                }
            }
            Interaction::OpenUrl(url) => println!("🔗 {url}"),
            Interaction::ToggleVisibility(targets) => {
                let card = toggle_visibility(&view.card, &targets);
                self.show_card(card);
            }
            Interaction::ShowCard(card) => self.show_card(card),
        }
        Ok(())
    }
}

pub async fn run_chat(config: Config, log: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let transcript = TranscriptLog::from_option(log)?;
    if config.api_key().is_none() {
        eprintln!(
            "⚠️  {} is not set; requests are sent without an API key",
            config.api_key_env()
        );
    }

    let (stream_service, mut stream_rx) = ChatStreamService::new();
    let session_id = SessionId::new();
    let bus = ActionEventBus::new();
    let mut feedback_rx = bus.subscribe(session_id);

    let mut session = ChatSession::new(config, transcript, session_id, bus.clone(), stream_service);
    session.log_transcript(session.transcript.log_note(&format!(
        "Session started {}",
        Local::now().format("%Y-%m-%d %H:%M")
    )));

    println!(
        "cardchat · {} · type /help for commands",
        session.config.model()
    );
    session.show_welcome();
    session.prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if session.handle_line(&line, &mut lines).await? == Flow::Quit {
                    break;
                }
            }
            Some((message, stream_id)) = stream_rx.recv() => {
                session.handle_stream(message, stream_id);
            }
            Some(event) = feedback_rx.recv() => {
                session.handle_feedback(event);
            }
        }
    }

    if let Some((_, token)) = session.active_stream.take() {
        token.cancel();
    }
    bus.unsubscribe(session_id);
    Ok(())
}
