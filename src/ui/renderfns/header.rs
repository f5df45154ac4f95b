use chrono::{DateTime, Local, Utc};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// What the header shows about the current screen
pub struct HeaderInfo<'a> {
  pub title: &'a str,
  pub module: &'a str,
  pub is_demo_mode: bool,
  pub loading: bool,
  pub updated_at: Option<DateTime<Utc>>,
}

/// Draw the header bar with logo, context, mode badge and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, info: &HeaderInfo) {
  let separator = || Span::styled("│", Style::default().fg(Color::DarkGray));

  let badge = if info.is_demo_mode {
    Span::styled(" DEMO ", Style::default().fg(Color::Black).bg(Color::Magenta).bold())
  } else {
    Span::styled(" LIVE ", Style::default().fg(Color::Black).bg(Color::Green).bold())
  };

  let freshness = if info.loading {
    Span::styled(" loading... ", Style::default().fg(Color::Yellow))
  } else {
    match info.updated_at {
      Some(at) => Span::styled(
        format!(" updated {} ", at.with_timezone(&Local).format("%H:%M:%S")),
        Style::default().fg(Color::DarkGray),
      ),
      None => Span::raw(" "),
    }
  };

  let header = Line::from(vec![
    Span::styled(" secdash ", Style::default().fg(Color::Cyan).bold()),
    separator(),
    Span::styled(format!(" {} ", info.title), Style::default().fg(Color::White)),
    separator(),
    Span::styled(
      format!(" {} ", info.module),
      Style::default().fg(Color::Yellow).bold(),
    ),
    badge,
    freshness,
    Span::raw(" "),
    // Shortcuts - keys and brackets highlighted, descriptions dimmed
    Span::styled("<:>", Style::default().fg(Color::Cyan)),
    Span::styled(" module", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<r>", Style::default().fg(Color::Cyan)),
    Span::styled(" refresh", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<a>", Style::default().fg(Color::Cyan)),
    Span::styled(" analyze", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<q>", Style::default().fg(Color::Cyan)),
    Span::styled(" quit", Style::default().fg(Color::DarkGray)),
  ]);

  let paragraph = Paragraph::new(header).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Extract host from the backend URL
pub fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}
