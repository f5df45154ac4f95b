//! Built-in security modules and their bundled demo datasets.

use serde::{Deserialize, Serialize};

/// What a module screen renders. Live backends return the same shape from
/// `GET /modules/{name}/state`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardData {
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub stats: Vec<Stat>,
  #[serde(default)]
  pub events: Vec<SecurityEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stat {
  pub label: String,
  pub value: String,
  /// Free-form change indicator, e.g. "+12%"
  #[serde(default)]
  pub trend: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
  pub time: String,
  #[serde(default = "default_severity")]
  pub severity: String,
  pub message: String,
}

fn default_severity() -> String {
  "info".to_string()
}

#[derive(Debug, Clone)]
pub struct ModuleInfo {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  demo: fn() -> DashboardData,
}

// Names are unique across the catalog
impl PartialEq for ModuleInfo {
  fn eq(&self, other: &Self) -> bool {
    self.name == other.name
  }
}

impl Eq for ModuleInfo {}

impl ModuleInfo {
  pub fn demo_data(&self) -> DashboardData {
    (self.demo)()
  }
}

pub const MODULES: &[ModuleInfo] = &[
  ModuleInfo {
    name: "waf",
    aliases: &["w", "firewall"],
    demo: waf_demo,
  },
  ModuleInfo {
    name: "dns-security",
    aliases: &["dns", "d"],
    demo: dns_demo,
  },
  ModuleInfo {
    name: "iot-security",
    aliases: &["iot"],
    demo: iot_demo,
  },
  ModuleInfo {
    name: "pam",
    aliases: &["p", "privileged"],
    demo: pam_demo,
  },
  ModuleInfo {
    name: "siem",
    aliases: &["logs"],
    demo: siem_demo,
  },
  ModuleInfo {
    name: "ai-auto-remediation",
    aliases: &["ai", "remediation"],
    demo: remediation_demo,
  },
];

/// Look up a module by name or alias (case-insensitive).
pub fn find(name: &str) -> Option<&'static ModuleInfo> {
  let name = name.trim().to_lowercase();
  MODULES
    .iter()
    .find(|m| m.name == name || m.aliases.contains(&name.as_str()))
}

pub fn default_module() -> &'static ModuleInfo {
  &MODULES[0]
}

fn stat(label: &str, value: &str, trend: Option<&str>) -> Stat {
  Stat {
    label: label.to_string(),
    value: value.to_string(),
    trend: trend.map(String::from),
  }
}

fn event(time: &str, severity: &str, message: &str) -> SecurityEvent {
  SecurityEvent {
    time: time.to_string(),
    severity: severity.to_string(),
    message: message.to_string(),
  }
}

fn waf_demo() -> DashboardData {
  DashboardData {
    title: "Web Application Firewall".into(),
    stats: vec![
      stat("Total Requests", "14.2M", Some("+8%")),
      stat("Blocked Attacks", "23,481", Some("+15%")),
      stat("Active Rules", "1,204", None),
      stat("False Positive Rate", "0.3%", Some("-0.1%")),
    ],
    events: vec![
      event("09:42", "critical", "SQL injection blocked on /api/login from 185.220.101.4"),
      event("09:37", "high", "XSS payload in query string on /search"),
      event("09:15", "medium", "Rate limit triggered for 45.155.205.0/24"),
      event("08:58", "low", "Rule set OWASP-CRS updated to 4.3"),
    ],
  }
}

fn dns_demo() -> DashboardData {
  DashboardData {
    title: "DNS Security".into(),
    stats: vec![
      stat("Queries Today", "3.8M", Some("+2%")),
      stat("Blocked Domains", "12,907", Some("+4%")),
      stat("Tunneling Suspects", "7", Some("+3")),
      stat("DGA Detections", "41", None),
    ],
    events: vec![
      event("09:40", "high", "Possible DNS tunneling from host fin-ws-022"),
      event("09:21", "medium", "Newly registered domain resolved by 14 hosts"),
      event("08:47", "low", "Blocklist feed refreshed (218k entries)"),
    ],
  }
}

fn iot_demo() -> DashboardData {
  DashboardData {
    title: "IoT Security".into(),
    stats: vec![
      stat("Managed Devices", "2,316", Some("+31")),
      stat("Unpatched Firmware", "184", Some("-12")),
      stat("Default Credentials", "9", None),
      stat("Anomalous Flows", "27", Some("+5")),
    ],
    events: vec![
      event("09:33", "critical", "Camera cam-lobby-03 contacting known C2 address"),
      event("09:02", "medium", "Thermostat fleet firmware 2.1.4 vulnerable to CVE-2024-3400"),
      event("08:30", "low", "12 new devices discovered on VLAN 40"),
    ],
  }
}

fn pam_demo() -> DashboardData {
  DashboardData {
    title: "Privileged Access Management".into(),
    stats: vec![
      stat("Privileged Accounts", "412", None),
      stat("Active Sessions", "23", Some("+6")),
      stat("Vaulted Credentials", "1,877", Some("+20")),
      stat("Policy Violations", "3", Some("+1")),
    ],
    events: vec![
      event("09:44", "high", "Root session on db-prod-01 outside change window"),
      event("09:10", "medium", "Credential checkout for svc-backup exceeded 8h"),
      event("08:55", "low", "Password rotation completed for 96 accounts"),
    ],
  }
}

fn siem_demo() -> DashboardData {
  DashboardData {
    title: "SIEM".into(),
    stats: vec![
      stat("Events / sec", "18,450", Some("+3%")),
      stat("Open Incidents", "12", Some("+2")),
      stat("Correlation Rules", "640", None),
      stat("Mean Time to Detect", "4m 12s", Some("-30s")),
    ],
    events: vec![
      event("09:45", "critical", "Impossible travel for j.doe (Berlin -> Singapore)"),
      event("09:29", "high", "Brute force against VPN gateway, 1,200 failures"),
      event("09:05", "medium", "New admin group membership in Active Directory"),
    ],
  }
}

fn remediation_demo() -> DashboardData {
  DashboardData {
    title: "AI Auto-Remediation".into(),
    stats: vec![
      stat("Playbooks", "58", None),
      stat("Auto-Resolved (24h)", "134", Some("+22")),
      stat("Pending Approval", "6", Some("+2")),
      stat("Success Rate", "97.8%", Some("+0.4%")),
    ],
    events: vec![
      event("09:41", "high", "Isolated host fin-ws-022 pending analyst approval"),
      event("09:12", "medium", "Blocked 3 IOCs at perimeter from threat feed"),
      event("08:50", "low", "Rotated leaked API key for service billing-sync"),
    ],
  }
}
