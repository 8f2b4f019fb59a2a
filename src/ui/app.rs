use ratatui::{
    backend::CrosstermBackend,
    widgets::{Block, Borders, Paragraph, Table, TableState, Row, Cell},
    layout::{Layout, Constraint, Direction, Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    Terminal, Frame,
};
use crossterm::{
    terminal::{enable_raw_mode, disable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    event::{self, Event, KeyCode, KeyEventKind},
    ExecutableCommand,
};
use log::info;
use std::io;
use std::time::{Duration, Instant};

use crate::aggregation::{LatestSummary, QueryFacade, StoreStatus, WindowOverview};
use crate::capture::{CaptureHandle, CaptureSnapshot};
use crate::utils::formatting::{
    format_bytes, format_duration, format_ip_address, format_window_rate, format_window_span,
};

const TABS: [&str; 3] = ["Peers", "Protocols", "Windows"];

pub struct App {
    pub should_quit: bool,
    pub selected_tab: usize,
    pub monitored: String,
    query: QueryFacade,
    capture: Option<CaptureHandle>,
    refresh_rate: Duration,
    max_rows: usize,
    started: Instant,
    last_update: Option<Instant>,
    summary: LatestSummary,
    protocols: Vec<(String, u64)>,
    windows: Vec<WindowOverview>,
    status: Option<StoreStatus>,
    counters: CaptureSnapshot,
    peer_table: TableState,
}

impl App {
    pub fn new(query: QueryFacade, capture: Option<CaptureHandle>, monitored: String) -> App {
        App {
            should_quit: false,
            selected_tab: 0,
            monitored,
            query,
            capture,
            refresh_rate: Duration::from_millis(1000),
            max_rows: 50,
            started: Instant::now(),
            last_update: None,
            summary: LatestSummary::default(),
            protocols: Vec::new(),
            windows: Vec::new(),
            status: None,
            counters: CaptureSnapshot::default(),
            peer_table: TableState::default(),
        }
    }

    pub fn with_refresh(mut self, refresh_rate: Duration, max_rows: usize) -> Self {
        self.refresh_rate = refresh_rate;
        self.max_rows = max_rows.max(1);
        self
    }

    pub fn with_view(mut self, view: &str) -> Self {
        if let Some(index) = TABS.iter().position(|tab| tab.eq_ignore_ascii_case(view)) {
            self.selected_tab = index;
        }
        self
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        // Restore the terminal even when the loop failed
        disable_raw_mode()?;
        io::stdout().execute(LeaveAlternateScreen)?;

        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            if self.last_update.map_or(true, |at| at.elapsed() >= self.refresh_rate) {
                self.refresh();
            }

            terminal.draw(|f| self.draw(f))?;

            if self.should_quit {
                info!("Dashboard closed");
                return Ok(());
            }

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => {
                self.selected_tab = (self.selected_tab + 1) % TABS.len();
            }
            KeyCode::Char('1') => self.selected_tab = 0,
            KeyCode::Char('2') => self.selected_tab = 1,
            KeyCode::Char('3') => self.selected_tab = 2,
            KeyCode::Down => self.move_selection(1),
            KeyCode::Up => self.move_selection(-1),
            _ => {}
        }
    }

    /// Pulls fresh copies of every view; selection follows the peer address.
    pub fn refresh(&mut self) {
        let selected = self.selected_peer().map(str::to_string);

        self.summary = self.query.latest_summary();
        self.windows = self.query.windows();
        self.status = Some(self.query.status());
        if let Some(capture) = &self.capture {
            self.counters = capture.counters();
        }

        let position = selected
            .and_then(|address| self.summary.peers.iter().position(|p| p.address == address));
        match (position, self.summary.peers.is_empty()) {
            (_, true) => self.peer_table.select(None),
            (Some(index), false) => self.peer_table.select(Some(index)),
            (None, false) => self.peer_table.select(Some(0)),
        }
        self.load_protocols();

        self.last_update = Some(Instant::now());
    }

    pub fn selected_peer(&self) -> Option<&str> {
        self.peer_table
            .selected()
            .and_then(|index| self.summary.peers.get(index))
            .map(|peer| peer.address.as_str())
    }

    fn move_selection(&mut self, step: isize) {
        let len = self.summary.peers.len().min(self.max_rows);
        if len == 0 {
            return;
        }
        let current = self.peer_table.selected().unwrap_or(0) as isize;
        let next = (current + step).clamp(0, len as isize - 1) as usize;
        self.peer_table.select(Some(next));
        self.load_protocols();
    }

    fn load_protocols(&mut self) {
        self.protocols = match self.selected_peer() {
            Some(peer) => {
                let mut protocols: Vec<(String, u64)> = self
                    .query
                    .protocols_for_peer(peer)
                    .unwrap_or_default()
                    .into_iter()
                    .collect();
                protocols.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                protocols
            }
            None => Vec::new(),
        };
    }

    fn draw(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),  // Header
                Constraint::Min(0),     // Main content
                Constraint::Length(3),  // Footer
            ])
            .split(f.size());

        self.draw_header(f, chunks[0]);

        match self.selected_tab {
            1 => self.draw_protocols(f, chunks[1]),
            2 => self.draw_windows(f, chunks[1]),
            _ => self.draw_peers(f, chunks[1]),
        }

        self.draw_footer(f, chunks[2]);
    }

    fn draw_header(&self, f: &mut Frame, area: Rect) {
        let selected_style = Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD);
        let normal_style = Style::default().fg(Color::White);

        let spans: Vec<Span> = TABS.iter().enumerate().map(|(i, &tab)| {
            let style = if i == self.selected_tab { selected_style } else { normal_style };
            Span::styled(format!(" {}:{} ", i + 1, tab), style)
        }).collect();

        let header = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title(format!("Traffic for {}", self.monitored)))
            .alignment(Alignment::Center);

        f.render_widget(header, area);
    }

    fn draw_peers(&mut self, f: &mut Frame, area: Rect) {
        let window_size = self.query.window_size_secs();
        let rows: Vec<Row> = self.summary.peers.iter().take(self.max_rows).map(|peer| {
            Row::new(vec![
                Cell::from(format_ip_address(&peer.address)),
                Cell::from(format_bytes(peer.inbound_bytes)),
                Cell::from(format_bytes(peer.outbound_bytes)),
                Cell::from(format_bytes(peer.total_bytes)),
                Cell::from(format_window_rate(peer.total_bytes, window_size)),
            ])
        }).collect();

        let title = match (self.summary.start_ts, self.summary.end_ts) {
            (Some(start), Some(end)) => format!(
                "Latest window {} | {} total",
                format_window_span(start, end),
                format_bytes(self.summary.total_bytes)
            ),
            _ => "Latest window | no data yet".to_string(),
        };

        let table = Table::new(rows)
        .widths(&[
            Constraint::Percentage(32),
            Constraint::Percentage(17),
            Constraint::Percentage(17),
            Constraint::Percentage(17),
            Constraint::Percentage(17),
        ])
        .header(Row::new(vec!["Peer", "Inbound", "Outbound", "Total", "Avg Rate"])
            .style(Style::default().fg(Color::Yellow)))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .block(Block::default().borders(Borders::ALL).title(title));

        f.render_stateful_widget(table, area, &mut self.peer_table);
    }

    fn draw_protocols(&self, f: &mut Frame, area: Rect) {
        let Some(peer) = self.selected_peer() else {
            let empty = Paragraph::new("No peer selected")
                .block(Block::default().borders(Borders::ALL).title("Protocols"))
                .alignment(Alignment::Center);
            f.render_widget(empty, area);
            return;
        };

        let total: u64 = self.protocols.iter().map(|(_, bytes)| *bytes).sum();
        let rows: Vec<Row> = self.protocols.iter().map(|(protocol, bytes)| {
            let share = if total > 0 { *bytes as f64 / total as f64 * 100.0 } else { 0.0 };
            Row::new(vec![
                Cell::from(if protocol.is_empty() { "(unlabelled)".to_string() } else { protocol.clone() }),
                Cell::from(format_bytes(*bytes)),
                Cell::from(format!("{:.1}%", share)),
            ])
        }).collect();

        let table = Table::new(rows)
        .widths(&[
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
        ])
        .header(Row::new(vec!["Protocol", "Bytes", "Share"])
            .style(Style::default().fg(Color::Yellow)))
        .block(Block::default().borders(Borders::ALL).title(format!("Protocols for {}", peer)));

        f.render_widget(table, area);
    }

    fn draw_windows(&self, f: &mut Frame, area: Rect) {
        // newest first on screen; the store keeps insertion order
        let rows: Vec<Row> = self.windows.iter().rev().take(self.max_rows).map(|window| {
            Row::new(vec![
                Cell::from(window.index.to_string()),
                Cell::from(format_window_span(window.start_ts, window.end_ts)),
                Cell::from(window.peer_count.to_string()),
                Cell::from(format_bytes(window.total_bytes)),
            ])
        }).collect();

        let table = Table::new(rows)
        .widths(&[
            Constraint::Percentage(20),
            Constraint::Percentage(35),
            Constraint::Percentage(15),
            Constraint::Percentage(30),
        ])
        .header(Row::new(vec!["Index", "Span (local)", "Peers", "Bytes"])
            .style(Style::default().fg(Color::Yellow)))
        .block(Block::default().borders(Borders::ALL).title("Held Windows"));

        f.render_widget(table, area);
    }

    fn draw_footer(&self, f: &mut Frame, area: Rect) {
        let retention = match &self.status {
            Some(status) => format!(
                "{}/{} windows of {}s",
                status.windows_held, status.keep_windows, status.window_size_secs
            ),
            None => "-".to_string(),
        };
        let capture = match &self.capture {
            Some(handle) if handle.is_finished() => "capture stopped",
            Some(_) => "capturing",
            None => "no capture",
        };

        let text = format!(
            "q quit | Tab/1-3 views | Up/Down select | {} | {} | frames {} in {} out {} ignored {} | up {}",
            retention,
            capture,
            self.counters.frames,
            self.counters.inbound,
            self.counters.outbound,
            self.counters.ignored,
            format_duration(self.started.elapsed().as_secs()),
        );
        let footer = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);

        f.render_widget(footer, area);
    }
}
