pub mod components;
pub mod renderfns;
mod views;

use crate::app::App;
use ratatui::prelude::*;
use renderfns::{draw_footer, draw_header, HeaderInfo};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Module screen
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let screen = app.screen();
  let state = screen.state();

  draw_header(
    frame,
    chunks[0],
    &HeaderInfo {
      title: app.title(),
      module: screen.module(),
      is_demo_mode: state.is_demo_mode,
      loading: state.loading,
      updated_at: state.updated_at,
    },
  );

  let has_data = screen.is_demo_mode() || screen.has_live_data();
  views::module::draw_module(frame, chunks[1], state, has_data);

  draw_footer(frame, chunks[2], app.notice());

  // Overlay last so it sits on top of the module screen
  app.command_input().render_overlay(frame, chunks[1]);
}
