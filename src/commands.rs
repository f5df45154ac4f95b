/// Available commands and autocomplete logic
use crate::modules::{self, ModuleInfo};

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands. Module entries mirror [`modules::MODULES`].
pub const COMMANDS: &[Command] = &[
  Command {
    name: "waf",
    aliases: &["w", "firewall"],
    description: "Web application firewall",
  },
  Command {
    name: "dns-security",
    aliases: &["dns", "d"],
    description: "DNS filtering and tunneling detection",
  },
  Command {
    name: "iot-security",
    aliases: &["iot"],
    description: "Connected device inventory and anomalies",
  },
  Command {
    name: "pam",
    aliases: &["p", "privileged"],
    description: "Privileged access management",
  },
  Command {
    name: "siem",
    aliases: &["logs"],
    description: "Security event correlation",
  },
  Command {
    name: "ai-auto-remediation",
    aliases: &["ai", "remediation"],
    description: "Automated remediation playbooks",
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    description: "Reload module data",
  },
  Command {
    name: "analyze",
    aliases: &["a", "analysis"],
    description: "Run AI analysis",
  },
  Command {
    name: "clear",
    aliases: &["c"],
    description: "Clear analysis result",
  },
  Command {
    name: "scan",
    aliases: &["s"],
    description: "Trigger a scan (live mode)",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit secdash",
  },
];

/// What a submitted command asks the app to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Open(&'static ModuleInfo),
  Refresh,
  Analyze,
  ClearAnalysis,
  Scan,
  Quit,
}

/// Resolve a command name or alias to an action
pub fn parse(input: &str) -> Option<Action> {
  if let Some(module) = modules::find(input) {
    return Some(Action::Open(module));
  }

  let input = input.trim().to_lowercase();
  let cmd = COMMANDS
    .iter()
    .find(|c| c.name == input || c.aliases.contains(&input.as_str()))?;

  match cmd.name {
    "refresh" => Some(Action::Refresh),
    "analyze" => Some(Action::Analyze),
    "clear" => Some(Action::ClearAnalysis),
    "scan" => Some(Action::Scan),
    "quit" => Some(Action::Quit),
    _ => None,
  }
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    let priority = if cmd.name == input_lower {
      0
    } else if cmd.aliases.contains(&input_lower.as_str()) {
      1
    } else if cmd.name.starts_with(&input_lower) {
      2
    } else if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      3
    } else if cmd.name.contains(&input_lower) {
      4
    } else if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      5
    } else {
      continue;
    };
    matches.push((cmd, priority));
  }

  // Stable sort keeps catalog order within a priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("siem");
    assert_eq!(suggestions[0].name, "siem");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("dns");
    assert_eq!(suggestions[0].name, "dns-security");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("io");
    assert_eq!(suggestions[0].name, "iot-security");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("remed");
    assert_eq!(suggestions[0].name, "ai-auto-remediation");
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }

  #[test]
  fn test_every_module_has_a_command() {
    for module in modules::MODULES {
      let cmd = COMMANDS
        .iter()
        .find(|c| c.name == module.name)
        .unwrap_or_else(|| panic!("no command for {}", module.name));
      assert_eq!(cmd.aliases, module.aliases);
    }
  }

  #[test]
  fn test_parse() {
    assert_eq!(parse("waf"), modules::find("waf").map(Action::Open));
    assert_eq!(parse("DNS"), modules::find("dns-security").map(Action::Open));
    assert_eq!(parse("r"), Some(Action::Refresh));
    assert_eq!(parse("analyze"), Some(Action::Analyze));
    assert_eq!(parse("c"), Some(Action::ClearAnalysis));
    assert_eq!(parse("scan"), Some(Action::Scan));
    assert_eq!(parse("exit"), Some(Action::Quit));
    assert_eq!(parse("bogus"), None);
  }
}
