use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// One-line message shown in the footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub message: String,
  pub is_error: bool,
}

impl Notice {
  pub fn info(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      is_error: false,
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      is_error: true,
    }
  }
}

/// Draw the footer bar: the latest notice, or key hints when there is none
pub fn draw_footer(frame: &mut Frame, area: Rect, notice: Option<&Notice>) {
  let line = match notice {
    Some(notice) => {
      let color = if notice.is_error { Color::Red } else { Color::Green };
      Line::from(Span::styled(
        format!(" {}", notice.message),
        Style::default().fg(color),
      ))
    }
    None => {
      let hints = [("r", "refresh"), ("a", "analyze"), ("c", "clear"), ("s", "scan")];
      let mut spans = vec![Span::raw(" ")];
      for (i, (key, label)) in hints.iter().enumerate() {
        if i > 0 {
          spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(*key, Style::default().fg(Color::Cyan)));
        spans.push(Span::styled(
          format!(":{}", label),
          Style::default().fg(Color::DarkGray),
        ));
      }
      Line::from(spans)
    }
  };

  let paragraph = Paragraph::new(line).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}
