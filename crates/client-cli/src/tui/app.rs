//! Inbox TUI: phone lines and conversations on the left, the open
//! conversation and composer on the right.

use std::io;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event, KeyCode, KeyEvent, KeyModifiers, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};
use shared::inbox::{
    ChatState, ChatTag, Counterparty, DeliveryStatus, Direction as MessageDirection,
    DiscardReason, Inbox, InboxError,
};
use shared::ChatEnvelope;
use tokio::sync::mpsc;

use crate::relay::RelayEvent;

const MIN_SPLIT: u16 = 20;
const MAX_SPLIT: u16 = 60;
const SPLIT_STEP: u16 = 5;

/// Focus state for input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Lines,
    Chats,
    Composer,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Lines => Focus::Chats,
            Focus::Chats => Focus::Composer,
            Focus::Composer => Focus::Lines,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Connecting,
    Online,
    Offline,
}

/// Main TUI application state
pub struct App {
    inbox: Inbox,
    focus: Focus,
    /// Message being typed into the open conversation
    input: String,
    /// Width of the left column in percent
    split: u16,
    /// Last notification or error, shown in the status bar
    status: Option<String>,
    connection: Connection,
    /// Envelopes for the relay task
    outbound: mpsc::Sender<ChatEnvelope>,
    /// Events from the relay task
    events: Receiver<RelayEvent>,
    /// Composer area from the last draw, for click hit-testing
    composer_area: Rect,
    should_quit: bool,
}

impl App {
    pub fn new(
        inbox: Inbox,
        outbound: mpsc::Sender<ChatEnvelope>,
        events: Receiver<RelayEvent>,
    ) -> Self {
        Self {
            inbox,
            focus: Focus::Chats,
            input: String::new(),
            split: 35,
            status: None,
            connection: Connection::Connecting,
            outbound,
            events,
            composer_area: Rect::default(),
            should_quit: false,
        }
    }

    /// Run the TUI main loop
    pub fn run(&mut self) -> io::Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableMouseCapture,
            EnableFocusChange
        )?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            DisableFocusChange,
            DisableMouseCapture,
            LeaveAlternateScreen
        )?;
        result
    }

    fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        while !self.should_quit {
            // Apply relay traffic before drawing
            self.process_events();

            terminal.draw(|f| self.draw(f))?;

            // Handle input with timeout
            if event::poll(Duration::from_millis(50))? {
                let event = event::read()?;
                self.handle_event(event);
            }
        }
        Ok(())
    }

    /// Apply everything the relay task has delivered so far
    pub fn process_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                RelayEvent::Connected => {
                    self.connection = Connection::Online;
                    self.status = Some("Relay connected".to_string());
                }
                RelayEvent::Disconnected { retry_in } => {
                    self.connection = Connection::Offline;
                    self.status = Some(format!(
                        "Relay offline, retrying in {}s",
                        retry_in.as_secs()
                    ));
                }
                RelayEvent::Inbound(envelope) => match self.inbox.receive(envelope) {
                    Ok(Some(notification)) => {
                        self.status = Some(format!(
                            "New message from {}: {}",
                            notification.from, notification.preview
                        ));
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("Dropping inbound message: {}", e),
                },
            }
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::FocusLost => {
                self.inbox.discard_draft(DiscardReason::Blur);
            }
            Event::Mouse(mouse) if matches!(mouse.kind, MouseEventKind::Down(_)) => {
                let inside = self.composer_area.contains(Position::new(mouse.column, mouse.row));
                if !inside {
                    self.inbox.discard_draft(DiscardReason::OutsideClick);
                }
            }
            _ => {}
        }
    }

    /// Handle keyboard input
    pub fn handle_key(&mut self, key: KeyEvent) {
        // Global shortcuts
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('n') => self.start_draft(),
                KeyCode::Char('t') => self.cycle_tag(),
                KeyCode::Left => self.resize(false),
                KeyCode::Right => self.resize(true),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Tab => {
                // Leaving the number field abandons the draft
                self.inbox.discard_draft(DiscardReason::Blur);
                self.focus = self.focus.next();
                return;
            }
            KeyCode::Esc => {
                if !self.inbox.discard_draft(DiscardReason::Cancel) {
                    self.input.clear();
                }
                return;
            }
            _ => {}
        }

        match self.focus {
            Focus::Lines => match key.code {
                KeyCode::Up => self.move_line(-1),
                KeyCode::Down => self.move_line(1),
                KeyCode::Enter | KeyCode::Right => self.focus = Focus::Chats,
                _ => {}
            },
            Focus::Chats => match key.code {
                KeyCode::Up => self.move_chat(-1),
                KeyCode::Down => self.move_chat(1),
                KeyCode::Left => self.focus = Focus::Lines,
                KeyCode::Enter | KeyCode::Right => {
                    if self.inbox.active_chat().is_none() {
                        self.move_chat(0);
                    }
                    self.focus = Focus::Composer;
                }
                _ => {}
            },
            Focus::Composer if self.inbox.is_drafting() => self.handle_draft_key(key.code),
            Focus::Composer => match key.code {
                KeyCode::Enter => self.send_message(),
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Char(c) => self.input.push(c),
                _ => {}
            },
        }
    }

    fn handle_draft_key(&mut self, code: KeyCode) {
        let Some(draft) = self.inbox.draft() else {
            return;
        };
        let mut number = draft.input().to_string();
        match code {
            KeyCode::Enter => {
                match self.inbox.promote_draft() {
                    Ok(chat_id) => {
                        let name = self
                            .inbox
                            .chat(&chat_id)
                            .map(|c| c.counterparty().name().to_string())
                            .unwrap_or_default();
                        self.status = Some(format!("New conversation with {}", name));
                    }
                    Err(e) => self.status = Some(e.to_string()),
                }
                return;
            }
            KeyCode::Backspace => {
                number.pop();
            }
            KeyCode::Char(c) if c.is_ascii_digit() || "()-+ ".contains(c) => number.push(c),
            _ => return,
        }
        if let Err(e) = self.inbox.update_draft(&number) {
            tracing::debug!("Draft update ignored: {}", e);
        }
    }

    fn start_draft(&mut self) {
        match self.inbox.start_new_message() {
            Ok(_) => {
                self.focus = Focus::Composer;
                self.status = None;
            }
            Err(e) => self.status = Some(e.to_string()),
        }
    }

    fn send_message(&mut self) {
        let text = std::mem::take(&mut self.input);
        let envelope = match self.inbox.send(&text) {
            Ok(envelope) => envelope,
            Err(InboxError::EmptyMessage) => return,
            Err(e) => {
                self.input = text;
                self.status = Some(e.to_string());
                return;
            }
        };

        // Shown already; only the delivery mark can still change
        let (chat_id, message_id) = (envelope.chat_id.clone(), envelope.message.id);
        let queued = self.connection == Connection::Online
            && self.outbound.try_send(envelope).is_ok();
        if !queued {
            tracing::warn!("Relay unavailable, message {} not sent", message_id);
            if let Err(e) = self
                .inbox
                .mark_delivery(&chat_id, message_id, DeliveryStatus::Failed)
            {
                tracing::debug!("Delivery mark ignored: {}", e);
            }
            self.status = Some("Not sent: relay is offline".to_string());
        }
    }

    fn cycle_tag(&mut self) {
        let Some(chat) = self.inbox.active_chat() else {
            return;
        };
        let (chat_id, tag) = (chat.id().clone(), ChatTag::cycle(chat.tag()));
        if let Err(e) = self.inbox.set_tag(&chat_id, tag) {
            self.status = Some(e.to_string());
        }
    }

    fn resize(&mut self, grow: bool) {
        self.split = if grow {
            (self.split + SPLIT_STEP).min(MAX_SPLIT)
        } else {
            self.split.saturating_sub(SPLIT_STEP).max(MIN_SPLIT)
        };
    }

    fn move_line(&mut self, delta: isize) {
        let lines = self.inbox.lines();
        if lines.is_empty() {
            return;
        }
        let current = self
            .inbox
            .selected_line()
            .and_then(|sel| lines.iter().position(|l| l.id() == sel.id()));
        let index = step(current, delta, lines.len());
        let line_id = lines[index].id().clone();
        if let Err(e) = self.inbox.select_line(&line_id) {
            self.status = Some(e.to_string());
        }
    }

    fn move_chat(&mut self, delta: isize) {
        let Some(line) = self.inbox.selected_line() else {
            return;
        };
        let chats = line.chats();
        if chats.is_empty() {
            return;
        }
        let current = self
            .inbox
            .active_chat()
            .and_then(|active| chats.iter().position(|c| c.id() == active.id()));
        let chat_id = chats[step(current, delta, chats.len())].id().clone();
        if let Err(e) = self.inbox.select_chat(&chat_id) {
            self.status = Some(e.to_string());
        }
    }

    /// Draw the UI
    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();

        // Split into status bar and main content
        let main_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(area);

        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(self.split),
                Constraint::Percentage(100 - self.split),
            ])
            .split(main_layout[0]);

        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(self.inbox.lines().len() as u16 + 2),
                Constraint::Min(0),
            ])
            .split(panes[0]);

        self.draw_lines(frame, left[0]);
        self.draw_chats(frame, left[1]);
        self.draw_conversation(frame, panes[1]);
        self.draw_status_bar(frame, main_layout[1]);
    }

    fn border_style(&self, focus: Focus) -> Style {
        if self.focus == focus {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        }
    }

    fn draw_lines(&self, frame: &mut Frame, area: Rect) {
        let selected = self.inbox.selected_line().map(|l| l.id().clone());
        let rows: Vec<Line> = self
            .inbox
            .lines()
            .iter()
            .map(|line| {
                let mut spans = vec![Span::raw(format!("{} {}", line.name(), line.number()))];
                if line.unread() > 0 {
                    spans.push(Span::styled(
                        format!(" ({})", line.unread()),
                        Style::default().fg(Color::Yellow),
                    ));
                }
                let row = Line::from(spans);
                if Some(line.id()) == selected.as_ref() {
                    row.style(Style::default().add_modifier(Modifier::REVERSED))
                } else {
                    row
                }
            })
            .collect();

        let block = Block::default()
            .title(" Lines ")
            .borders(Borders::ALL)
            .border_style(self.border_style(Focus::Lines));
        frame.render_widget(Paragraph::new(rows).block(block), area);
    }

    fn draw_chats(&self, frame: &mut Frame, area: Rect) {
        let mut rows: Vec<Line> = Vec::new();
        if let Some(draft) = self.inbox.draft() {
            rows.push(Line::styled(
                format!("✎ New message {}", draft.display()),
                Style::default().fg(Color::Green).add_modifier(Modifier::ITALIC),
            ));
        }
        if let Some(line) = self.inbox.selected_line() {
            for chat in line.chats() {
                let state = self.inbox.chat_state(chat.id());
                let marker = match state {
                    Some(ChatState::Active) => "▶",
                    Some(ChatState::Background) => "●",
                    _ => " ",
                };
                let mut spans = vec![Span::raw(format!("{} {}", marker, chat.counterparty().name()))];
                if let Counterparty::Group { member_count, .. } = chat.counterparty() {
                    spans.push(Span::styled(
                        format!(" [{}]", member_count),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                if chat.unread() > 0 {
                    spans.push(Span::styled(
                        format!(" {}", chat.unread()),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    ));
                }
                if let Some(tag) = chat.tag() {
                    spans.push(Span::styled(
                        format!(" #{}", tag.label()),
                        Style::default().fg(Color::Magenta),
                    ));
                }
                let row = Line::from(spans);
                rows.push(if state == Some(ChatState::Active) {
                    row.style(Style::default().add_modifier(Modifier::REVERSED))
                } else {
                    row
                });
                rows.push(Line::styled(
                    format!("    {}", chat.preview(30)),
                    Style::default().fg(Color::DarkGray),
                ));
            }
        }

        let block = Block::default()
            .title(" Conversations (Ctrl+N new) ")
            .borders(Borders::ALL)
            .border_style(self.border_style(Focus::Chats));
        frame.render_widget(Paragraph::new(rows).block(block), area);
    }

    fn draw_conversation(&mut self, frame: &mut Frame, area: Rect) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(area);
        self.composer_area = layout[1];

        let (title, body) = match (self.inbox.draft(), self.inbox.active_chat()) {
            (Some(_), _) => (
                " New message ".to_string(),
                vec![Line::styled(
                    "Type a 10-digit number and press Enter",
                    Style::default().fg(Color::DarkGray),
                )],
            ),
            (None, Some(chat)) => {
                let title = match chat.tag() {
                    Some(tag) => format!(" {} · {} (Ctrl+T) ", chat.counterparty().name(), tag.label()),
                    None => format!(" {} (Ctrl+T tag) ", chat.counterparty().name()),
                };
                let lines: Vec<Line> = chat
                    .messages()
                    .iter()
                    .map(|m| {
                        let time = m.sent_at.format("%H:%M");
                        match m.direction {
                            MessageDirection::Sent => {
                                let mark = match m.status {
                                    Some(DeliveryStatus::Failed) => " ✗",
                                    Some(DeliveryStatus::Delivered) => " ✓✓",
                                    _ => " ✓",
                                };
                                Line::styled(
                                    format!("{} you: {}{}", time, m.content, mark),
                                    Style::default().fg(Color::Cyan),
                                )
                            }
                            MessageDirection::Received => Line::raw(format!("{} {}", time, m.content)),
                        }
                    })
                    .collect();
                (title, lines)
            }
            (None, None) => (
                " ProPhone ".to_string(),
                vec![Line::raw("Select a conversation or press Ctrl+N")],
            ),
        };

        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Gray));
        let scroll = (body.len() as u16).saturating_sub(layout[0].height.saturating_sub(2));
        frame.render_widget(
            Paragraph::new(body)
                .block(block)
                .wrap(Wrap { trim: false })
                .scroll((scroll, 0)),
            layout[0],
        );

        // Render input area
        let (input_title, input_text, input_color) = match self.inbox.draft() {
            Some(draft) => match draft.validation_message() {
                Some(error) => (format!(" To: {} ", error), draft.display(), Color::Red),
                None => (" To: ".to_string(), draft.display(), Color::Green),
            },
            None => (" Message ".to_string(), self.input.clone(), Color::Green),
        };
        let input_block = Block::default()
            .title(input_title)
            .borders(Borders::ALL)
            .border_style(if self.focus == Focus::Composer {
                Style::default().fg(input_color)
            } else {
                Style::default().fg(Color::DarkGray)
            });
        frame.render_widget(
            Paragraph::new(format!("{}_", input_text)).block(input_block),
            layout[1],
        );
    }

    /// Draw the status bar
    fn draw_status_bar(&self, frame: &mut Frame, area: Rect) {
        let connection = match self.connection {
            Connection::Connecting => "connecting",
            Connection::Online => "online",
            Connection::Offline => "offline",
        };
        let status = format!(
            " {} unread | relay {} | {} | Tab: focus  Ctrl+←/→: resize  Ctrl+C: quit ",
            self.inbox.total_unread(),
            connection,
            self.status.as_deref().unwrap_or("ready")
        );

        let paragraph = Paragraph::new(status)
            .style(Style::default().bg(Color::DarkGray).fg(Color::White));
        frame.render_widget(paragraph, area);
    }
}

/// Index `delta` steps from `current`, clamped; no selection starts at 0.
fn step(current: Option<usize>, delta: isize, len: usize) -> usize {
    match current {
        Some(i) => (i as isize + delta).clamp(0, len as isize - 1) as usize,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::inbox::ChatId;
    use shared::MessagePayload;
    use std::sync::mpsc as std_mpsc;

    struct Harness {
        app: App,
        outbound: mpsc::Receiver<ChatEnvelope>,
        events: std_mpsc::Sender<RelayEvent>,
    }

    fn harness() -> Harness {
        let (out_tx, out_rx) = mpsc::channel(8);
        let (ev_tx, ev_rx) = std_mpsc::channel();
        Harness {
            app: App::new(Inbox::seeded(), out_tx, ev_rx),
            outbound: out_rx,
            events: ev_tx,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn chat_count(app: &App) -> usize {
        app.inbox.lines().iter().map(|l| l.chats().len()).sum()
    }

    fn inbound(chat: &str, line: &str, text: &str) -> RelayEvent {
        RelayEvent::Inbound(ChatEnvelope {
            line_id: line.into(),
            chat_id: chat.into(),
            message: MessagePayload {
                id: uuid::Uuid::new_v4(),
                content: text.to_string(),
                sent_at: chrono::Utc::now(),
            },
        })
    }

    #[test]
    fn test_draft_promotes_to_new_chat() {
        let mut h = harness();
        let before = chat_count(&h.app);

        h.app.handle_key(ctrl('n'));
        assert!(h.app.inbox.is_drafting());
        assert_eq!(h.app.focus, Focus::Composer);

        type_text(&mut h.app, "1 555 201 9999");
        assert_eq!(h.app.inbox.draft().unwrap().display(), "(555) 201-9999");

        h.app.handle_key(key(KeyCode::Enter));
        assert!(!h.app.inbox.is_drafting());
        assert_eq!(chat_count(&h.app), before + 1);

        let active = h.app.inbox.active_chat().unwrap();
        assert_eq!(active.counterparty().name(), "(555) 201-9999");
        let line = h.app.inbox.selected_line().unwrap();
        assert_eq!(line.chats()[0].id(), active.id());
    }

    #[test]
    fn test_incomplete_number_keeps_draft_until_cancelled() {
        let mut h = harness();
        let before = chat_count(&h.app);

        h.app.handle_key(ctrl('n'));
        type_text(&mut h.app, "555");
        h.app.handle_key(key(KeyCode::Enter));
        assert!(h.app.inbox.is_drafting());
        assert!(h.app.inbox.draft().unwrap().validation_message().is_some());
        assert_eq!(chat_count(&h.app), before);

        h.app.handle_key(key(KeyCode::Esc));
        assert!(!h.app.inbox.is_drafting());
        assert_eq!(chat_count(&h.app), before);
    }

    #[test]
    fn test_blur_and_outside_click_discard_draft() {
        let mut h = harness();
        h.app.handle_key(ctrl('n'));
        h.app.handle_event(Event::FocusLost);
        assert!(!h.app.inbox.is_drafting());

        h.app.handle_key(ctrl('n'));
        h.app.composer_area = Rect::new(40, 20, 40, 3);
        h.app.handle_event(Event::Mouse(crossterm::event::MouseEvent {
            kind: MouseEventKind::Down(crossterm::event::MouseButton::Left),
            column: 41,
            row: 21,
            modifiers: KeyModifiers::NONE,
        }));
        assert!(h.app.inbox.is_drafting());

        h.app.handle_event(Event::Mouse(crossterm::event::MouseEvent {
            kind: MouseEventKind::Down(crossterm::event::MouseButton::Left),
            column: 2,
            row: 2,
            modifiers: KeyModifiers::NONE,
        }));
        assert!(!h.app.inbox.is_drafting());

        h.app.handle_key(ctrl('n'));
        h.app.handle_key(key(KeyCode::Tab));
        assert!(!h.app.inbox.is_drafting());
    }

    #[test]
    fn test_inbound_notifies_background_chat() {
        let mut h = harness();
        let jane: ChatId = "chat-jane".into();
        h.app.inbox.select_chat(&jane).unwrap();
        let total = h.app.inbox.total_unread();

        h.events.send(inbound("chat-robert", "line-sales", "Got it")).unwrap();
        h.events.send(inbound("chat-jane", "line-sales", "See you")).unwrap();
        h.events.send(inbound("chat-missing", "line-sales", "lost")).unwrap();
        h.app.process_events();

        assert_eq!(h.app.inbox.total_unread(), total + 1);
        assert_eq!(h.app.inbox.chat(&jane).unwrap().unread(), 0);
        assert!(h.app.status.as_deref().unwrap().contains("Robert Fox"));
    }

    #[test]
    fn test_send_goes_to_relay_when_online() {
        let mut h = harness();
        h.app.handle_key(key(KeyCode::Down));
        h.app.handle_key(key(KeyCode::Enter));
        assert_eq!(h.app.focus, Focus::Composer);

        h.events.send(RelayEvent::Connected).unwrap();
        h.app.process_events();
        type_text(&mut h.app, "On my way");
        h.app.handle_key(key(KeyCode::Enter));

        let envelope = h.outbound.try_recv().unwrap();
        assert_eq!(envelope.message.content, "On my way");
        assert!(h.app.input.is_empty());

        h.events
            .send(RelayEvent::Disconnected {
                retry_in: Duration::from_secs(1),
            })
            .unwrap();
        h.app.process_events();
        type_text(&mut h.app, "Offline note");
        h.app.handle_key(key(KeyCode::Enter));
        assert!(h.outbound.try_recv().is_err());

        let last = h.app.inbox.active_chat().unwrap().last_message().unwrap();
        assert_eq!(last.content, "Offline note");
        assert_eq!(last.status, Some(DeliveryStatus::Failed));
    }

    #[test]
    fn test_resize_and_tag_cycle() {
        let mut h = harness();
        for _ in 0..20 {
            h.app.handle_key(KeyEvent::new(KeyCode::Right, KeyModifiers::CONTROL));
        }
        assert_eq!(h.app.split, MAX_SPLIT);
        for _ in 0..20 {
            h.app.handle_key(KeyEvent::new(KeyCode::Left, KeyModifiers::CONTROL));
        }
        assert_eq!(h.app.split, MIN_SPLIT);

        let jane: ChatId = "chat-jane".into();
        h.app.inbox.select_chat(&jane).unwrap();
        let before = h.app.inbox.chat(&jane).unwrap().tag();
        h.app.handle_key(ctrl('t'));
        assert_eq!(h.app.inbox.chat(&jane).unwrap().tag(), ChatTag::cycle(before));
    }

    #[test]
    fn test_line_navigation_drops_draft() {
        let mut h = harness();
        h.app.handle_key(key(KeyCode::Tab)); // Chats -> Composer
        h.app.handle_key(key(KeyCode::Tab)); // Composer -> Lines
        assert_eq!(h.app.focus, Focus::Lines);

        h.app.handle_key(ctrl('n'));
        h.app.focus = Focus::Lines;
        h.app.handle_key(key(KeyCode::Down));
        assert_eq!(h.app.inbox.selected_line().unwrap().id().0, "line-support");
        assert!(!h.app.inbox.is_drafting());
    }
}
