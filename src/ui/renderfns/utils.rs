use ratatui::prelude::Color;

/// Truncate a string to at most `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color for an event severity
pub fn severity_color(severity: &str) -> Color {
  match severity.to_lowercase().as_str() {
    "critical" => Color::Red,
    "high" => Color::LightRed,
    "medium" => Color::Yellow,
    "low" => Color::Green,
    _ => Color::White,
  }
}

/// Display color for a trend like "+12%" or "-3"
pub fn trend_color(trend: &str) -> Color {
  match trend.trim().chars().next() {
    Some('+') => Color::Yellow,
    Some('-') => Color::Cyan,
    _ => Color::DarkGray,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("Berlin → Singapore", 10), "Berlin ...");
  }

  #[test]
  fn test_severity_color() {
    assert_eq!(severity_color("critical"), Color::Red);
    assert_eq!(severity_color("HIGH"), Color::LightRed);
    assert_eq!(severity_color("medium"), Color::Yellow);
    assert_eq!(severity_color("low"), Color::Green);
    assert_eq!(severity_color("info"), Color::White);
  }

  #[test]
  fn test_trend_color() {
    assert_eq!(trend_color("+8%"), Color::Yellow);
    assert_eq!(trend_color("-0.1%"), Color::Cyan);
    assert_eq!(trend_color("n/a"), Color::DarkGray);
  }
}
