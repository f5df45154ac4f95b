//! Prompt and result text for the AI analysis panel.

use serde_json::Value;

pub fn default_prompt(module: &str) -> String {
  format!(
    "Analyze the current {} security posture and recommend remediation steps.",
    module
  )
}

/// Text shown for a successful analysis: strings as-is, anything else as
/// pretty-printed JSON.
pub fn reply_text(reply: Value) -> String {
  match reply {
    Value::String(text) => text,
    other => format!("{:#}", other),
  }
}

/// Text shown when the analysis request failed.
///
/// Demo sessions are told the result is simulated; live sessions are told the
/// service is unreachable. Simulated text must never look like a live result.
pub fn fallback_message(module: &str, demo: bool) -> String {
  if demo {
    format!(
      "[Simulated] AI analysis for {module}: this is a demo result generated without \
       contacting the analysis service. Sign in to a live backend to analyze real \
       {module} telemetry."
    )
  } else {
    format!(
      "AI analysis for {module} is unavailable: the analysis service could not be \
       reached. Check the backend connection and try again."
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_reply_text() {
    assert_eq!(reply_text(json!("plain text")), "plain text");
    assert_eq!(reply_text(json!({ "a": 1 })), "{\n  \"a\": 1\n}");
    assert_eq!(reply_text(json!([1, 2])), "[\n  1,\n  2\n]");
  }

  #[test]
  fn test_fallbacks_differ_by_mode() {
    let demo = fallback_message("ai-auto-remediation", true);
    let live = fallback_message("ai-auto-remediation", false);

    assert!(demo.contains("ai-auto-remediation"));
    assert!(demo.starts_with("[Simulated]"));
    assert!(live.contains("ai-auto-remediation"));
    assert!(!live.contains("Simulated"));
    assert_ne!(demo, live);
  }

  #[test]
  fn test_default_prompt_names_module() {
    assert!(default_prompt("siem").contains("siem"));
  }
}
