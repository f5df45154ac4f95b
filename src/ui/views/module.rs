use crate::module::ModuleState;
use crate::modules::{DashboardData, SecurityEvent, Stat};
use crate::ui::renderfns::{severity_color, trend_color, truncate};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Row, Table, Wrap};

/// Draw one module screen: stats, recent events and the analysis panel.
///
/// `has_data` is false while a live screen has nothing from the backend yet;
/// the demo seed it holds is never shown in that case.
pub fn draw_module(
  frame: &mut Frame,
  area: Rect,
  state: &ModuleState<DashboardData>,
  has_data: bool,
) {
  let error_height = if state.error.is_some() { 3 } else { 0 };
  let stats_height = if has_data {
    stats_height(state.data.stats.len(), area.height)
  } else {
    0
  };

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(error_height),
      Constraint::Length(stats_height),
      Constraint::Min(4),
      Constraint::Length(analysis_height(state, area.height)),
    ])
    .split(area);

  if let Some(error) = &state.error {
    draw_error(frame, chunks[0], error, state.loading);
  }
  if has_data {
    draw_stats(frame, chunks[1], &state.data, state.loading);
    draw_events(frame, chunks[2], &state.data.events);
  } else {
    draw_no_data(frame, chunks[2], state.loading);
  }
  draw_analysis(frame, chunks[3], state);
}

fn draw_no_data(frame: &mut Frame, area: Rect, loading: bool) {
  let block = Block::default()
    .title(" Overview ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));
  let text = if loading {
    "Loading live data..."
  } else {
    "No live data available."
  };
  let paragraph = Paragraph::new(text)
    .block(block)
    .style(Style::default().fg(Color::DarkGray));
  frame.render_widget(paragraph, area);
}

/// Rows plus header and borders, never taller than the screen.
fn stats_height(rows: usize, total: u16) -> u16 {
  u16::try_from(rows)
    .unwrap_or(u16::MAX)
    .saturating_add(3)
    .min(total)
}

fn analysis_height(state: &ModuleState<DashboardData>, total: u16) -> u16 {
  if state.analyzing || state.analysis_result.is_some() {
    (total / 3).max(5)
  } else {
    3
  }
}

fn draw_error(frame: &mut Frame, area: Rect, error: &str, loading: bool) {
  let hint = if loading { "retrying..." } else { "press r to retry" };
  let block = Block::default()
    .title(" Error ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Red));
  let line = Line::from(vec![
    Span::styled(error.to_string(), Style::default().fg(Color::Red)),
    Span::styled(format!("  ({})", hint), Style::default().fg(Color::DarkGray)),
  ]);
  frame.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_stats(frame: &mut Frame, area: Rect, data: &DashboardData, loading: bool) {
  let title = match (data.title.is_empty(), loading) {
    (true, _) => " Overview ".to_string(),
    (false, false) => format!(" {} ", data.title),
    (false, true) => format!(" {} (loading...) ", data.title),
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let rows: Vec<Row> = data.stats.iter().map(stat_row).collect();

  let table = Table::new(
    rows,
    [
      Constraint::Percentage(50),
      Constraint::Percentage(30),
      Constraint::Percentage(20),
    ],
  )
  .header(Row::new(vec!["Metric", "Value", "Trend"]).style(Style::default().fg(Color::DarkGray)))
  .block(block);

  frame.render_widget(table, area);
}

fn stat_row(stat: &Stat) -> Row<'_> {
  let trend = stat.trend.as_deref().unwrap_or("");
  Row::new(vec![
    Span::raw(stat.label.as_str()),
    Span::styled(stat.value.as_str(), Style::default().fg(Color::Cyan).bold()),
    Span::styled(trend, Style::default().fg(trend_color(trend))),
  ])
}

fn draw_events(frame: &mut Frame, area: Rect, events: &[SecurityEvent]) {
  let block = Block::default()
    .title(format!(" Recent Events ({}) ", events.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if events.is_empty() {
    let paragraph = Paragraph::new("No recent events.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let width = area.width.saturating_sub(24) as usize;
  let items: Vec<ListItem> = events
    .iter()
    .map(|event| {
      ListItem::new(Line::from(vec![
        Span::styled(
          format!("{:<6}", event.time),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(
          format!("{:<9}", truncate(&event.severity.to_uppercase(), 9)),
          Style::default().fg(severity_color(&event.severity)),
        ),
        Span::raw(" "),
        Span::raw(truncate(&event.message, width.max(10))),
      ]))
    })
    .collect();

  frame.render_widget(List::new(items).block(block), area);
}

fn draw_analysis(frame: &mut Frame, area: Rect, state: &ModuleState<DashboardData>) {
  let title = if state.analyzing {
    " AI Analysis (running...) "
  } else {
    " AI Analysis "
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Magenta));

  let paragraph = match &state.analysis_result {
    Some(text) => Paragraph::new(text.as_str()).wrap(Wrap { trim: false }),
    None if state.analyzing => {
      Paragraph::new("Waiting for the analysis service...").style(Style::default().fg(Color::DarkGray))
    }
    None => Paragraph::new("Press a to analyze this module.").style(Style::default().fg(Color::DarkGray)),
  };

  frame.render_widget(paragraph.block(block), area);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::modules::find;
  use ratatui::backend::TestBackend;

  fn state(data: DashboardData) -> ModuleState<DashboardData> {
    ModuleState {
      data,
      loading: false,
      error: None,
      analyzing: false,
      analysis_result: None,
      is_demo_mode: false,
      updated_at: None,
    }
  }

  fn render(state: &ModuleState<DashboardData>, has_data: bool, width: u16, height: u16) -> String {
    let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
    terminal
      .draw(|frame| draw_module(frame, frame.area(), state, has_data))
      .unwrap();
    terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|cell| cell.symbol())
      .collect()
  }

  #[test]
  fn test_loading_without_live_data_hides_seed() {
    let mut state = state(find("waf").unwrap().demo_data());
    state.loading = true;

    let screen = render(&state, false, 80, 24);
    assert!(screen.contains("Loading live data..."));
    assert!(!screen.contains("14.2M"));
  }

  #[test]
  fn test_renders_stats_when_data_present() {
    let state = state(find("waf").unwrap().demo_data());
    let screen = render(&state, true, 80, 24);
    assert!(screen.contains("14.2M"));
    assert!(!screen.contains("No live data"));
  }

  #[test]
  fn test_many_stats_in_short_area() {
    let mut data = find("waf").unwrap().demo_data();
    let stat = data.stats[0].clone();
    data.stats = vec![stat; 70_000];

    // Taller than the area: clamped instead of overflowing
    let screen = render(&state(data), true, 40, 8);
    assert_eq!(screen.chars().count(), 40 * 8);
  }

  #[test]
  fn test_stats_height_clamped() {
    assert_eq!(stats_height(4, 40), 7);
    assert_eq!(stats_height(70_000, 40), 40);
    assert_eq!(stats_height(usize::MAX, u16::MAX), u16::MAX);
  }
}
