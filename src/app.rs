use crate::cache::CacheKey;
use crate::commands::{self, Action};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::module::{ModuleContext, ModuleData};
use crate::modules::{self, DashboardData, ModuleInfo};
use crate::ui::{
  self,
  components::{CommandEvent, CommandInput, KeyResult},
  renderfns::{extract_domain, Notice},
};
use color_eyre::Result;
use crossterm::event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Result of a background scan request
#[derive(Debug)]
struct ScanOutcome {
  module: &'static str,
  result: Result<(), String>,
}

/// Main application state
pub struct App {
  /// Shared data-access collaborators
  ctx: ModuleContext,

  /// Module currently on screen
  module: &'static ModuleInfo,

  /// Data hook for the current module; replaced (and unmounted) on switch
  screen: ModuleData<DashboardData>,

  command_input: CommandInput,

  /// Latest status line message
  notice: Option<Notice>,

  title: String,

  scan_tx: mpsc::UnboundedSender<ScanOutcome>,
  scan_rx: mpsc::UnboundedReceiver<ScanOutcome>,

  should_quit: bool,
}

impl App {
  pub fn new(config: &Config, ctx: ModuleContext) -> Self {
    let module = match config.default_module.as_deref() {
      Some(name) => modules::find(name).unwrap_or_else(|| {
        warn!(module = name, "Unknown default module, using the first one");
        modules::default_module()
      }),
      None => modules::default_module(),
    };

    let title = config
      .title
      .clone()
      .unwrap_or_else(|| extract_domain(&config.api.url).to_string());

    let screen = ctx.use_module_data(module.name, module.demo_data());
    let (scan_tx, scan_rx) = mpsc::unbounded_channel();

    Self {
      ctx,
      module,
      screen,
      command_input: CommandInput::new(),
      notice: None,
      title,
      scan_tx,
      scan_rx,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Cleanup terminal, even when the loop failed
    stdout().execute(DisableFocusChange)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(250));

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::FocusGained => {
        let invalidated = self.ctx.queries.focus_changed();
        if invalidated > 0 {
          info!(invalidated, "Window focused, refreshing stale queries");
        }
        self.on_tick();
      }
      Event::Tick => self.on_tick(),
    }
  }

  /// Apply background results to the current screen
  fn on_tick(&mut self) {
    self.screen.poll();

    while let Ok(outcome) = self.scan_rx.try_recv() {
      self.notice = Some(match outcome.result {
        Ok(()) => Notice::info(format!("Scan started for {}", outcome.module)),
        Err(message) => Notice::error(format!("Scan failed for {}: {}", outcome.module, message)),
      });
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match self.command_input.handle_key(key) {
      KeyResult::Handled => return,
      KeyResult::Event(CommandEvent::Submitted(cmd)) => {
        self.execute_command(&cmd);
        return;
      }
      KeyResult::Event(CommandEvent::Cancelled) => return,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.perform(Action::Quit)
      }
      KeyCode::Char('q') => self.perform(Action::Quit),
      KeyCode::Char('r') => self.perform(Action::Refresh),
      KeyCode::Char('a') => self.perform(Action::Analyze),
      KeyCode::Char('c') => self.perform(Action::ClearAnalysis),
      KeyCode::Char('s') => self.perform(Action::Scan),
      KeyCode::Esc => self.notice = None,
      _ => {}
    }
  }

  fn execute_command(&mut self, cmd: &str) {
    if cmd.is_empty() {
      return;
    }
    match commands::parse(cmd) {
      Some(action) => self.perform(action),
      None => self.notice = Some(Notice::error(format!("Unknown command: {}", cmd))),
    }
  }

  fn perform(&mut self, action: Action) {
    match action {
      Action::Open(module) => self.open_module(module),
      Action::Refresh => {
        self.notice = None;
        self.screen.refresh();
      }
      Action::Analyze => self.screen.run_analysis(None),
      Action::ClearAnalysis => self.screen.clear_analysis(),
      Action::Scan => self.trigger_scan(),
      Action::Quit => self.should_quit = true,
    }
  }

  fn open_module(&mut self, module: &'static ModuleInfo) {
    if module == self.module {
      return;
    }
    info!(module = module.name, "Switching module");
    self.module = module;
    self.notice = None;
    // Assigning drops the previous hook, which aborts its pending work
    self.screen = self.ctx.use_module_data(module.name, module.demo_data());
  }

  /// Ask the backend for a new scan, then invalidate this module's data so
  /// the screen reloads
  fn trigger_scan(&mut self) {
    if self.screen.is_demo_mode() {
      self.notice = Some(Notice::error("Scans need a live session (use --token)"));
      return;
    }

    let module = self.module.name;
    let queries = self.ctx.queries.clone();
    let backend = Arc::clone(&self.ctx.backend);
    let tx = self.scan_tx.clone();

    self.notice = Some(Notice::info(format!("Starting scan for {}...", module)));
    tokio::spawn(async move {
      let request = backend.trigger_scan(module);
      let result = queries
        .mutate(request, &[CacheKey::module(module)])
        .await
        .map(|_| ())
        .map_err(|e| e.user_message());
      let _ = tx.send(ScanOutcome { module, result });
    });
  }

  // Accessors for UI rendering
  pub fn screen(&self) -> &ModuleData<DashboardData> {
    &self.screen
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn notice(&self) -> Option<&Notice> {
    self.notice.as_ref()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }
}
