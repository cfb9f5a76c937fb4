//! Configuration for CncTerm
//!
//! Provides the typed configuration schema, file handling and validation.
//! Supports JSON and TOML files; the default location is inside the
//! platform configuration directory.
//!
//! Configuration is organized into logical sections:
//! - Application presentation (name, prompt)
//! - Transport settings (backend kind, timeouts, status streaming)
//! - Command vocabulary (system, api, macro commands and text aliases)
//! - Machine settings (work area, soft limits, spindle, simulator macros)

use crate::error::{SettingsError, SettingsResult};
use cncterm_core::{ConfigurationError, ValueMap};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application directory name inside the platform config directory
pub const APP_DIR_NAME: &str = "cncterm";

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Application presentation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Application name shown in the banner
    pub name: String,
    /// Input prompt
    pub prompt: String,
    /// Line printed when the session starts
    pub welcome: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "cncterm".to_string(),
            prompt: "> ".to_string(),
            welcome: "Type /help to list commands.".to_string(),
        }
    }
}

/// Backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process machine simulator
    #[default]
    Virtual,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Virtual => write!(f, "virtual"),
        }
    }
}

/// Transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Backend kind
    pub kind: TransportKind,
    /// Per-invocation timeout in milliseconds
    pub timeout_ms: u64,
    /// Interval between streamed status snapshots
    pub status_interval_ms: u64,
    /// Endpoint streamed into the status cache
    pub status_endpoint: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            kind: TransportKind::Virtual,
            timeout_ms: 5000,
            status_interval_ms: 50,
            status_endpoint: "get_status".to_string(),
        }
    }
}

/// A command handled inside the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemCommandConfig {
    /// Alternative names
    pub aliases: Vec<String>,
    /// Help text
    pub description: String,
    /// Handler, `builtin:<name>`
    pub action: String,
}

impl SystemCommandConfig {
    /// Create a system command bound to an action
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    /// Builder method to set the aliases
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A pattern-matched command forwarded to one backend endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiCommandConfig {
    /// Regular expression matched against the whole input (case-insensitive)
    pub pattern: String,
    /// Help text
    pub description: String,
    /// Backend endpoint name
    pub endpoint: String,
    /// Request field to value template (`$1`, `$2`, `$input` or a literal)
    pub request_mapping: IndexMap<String, String>,
    /// Template rendered against the response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_template: Option<String>,
}

impl ApiCommandConfig {
    /// Create an API command
    pub fn new(pattern: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Builder method to add a request mapping entry
    pub fn with_mapping(mut self, field: impl Into<String>, template: impl Into<String>) -> Self {
        self.request_mapping.insert(field.into(), template.into());
        self
    }

    /// Builder method to set the response template
    pub fn with_response_template(mut self, template: impl Into<String>) -> Self {
        self.response_template = Some(template.into());
        self
    }

    /// Builder method to set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One backend invocation inside a macro
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroStep {
    /// Backend endpoint name
    pub endpoint: String,
    /// Literal request payload
    pub request: ValueMap,
}

impl MacroStep {
    /// Create a step with an empty request
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request: ValueMap::new(),
        }
    }

    /// Builder method to add a request field
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.request.insert(field.into(), value.into());
        self
    }
}

/// A named sequence of backend invocations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroCommandConfig {
    /// Alternative names
    pub aliases: Vec<String>,
    /// Help text
    pub description: String,
    /// Steps, executed in order
    pub steps: Vec<MacroStep>,
    /// Template rendered against the last step's response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_template: Option<String>,
}

impl MacroCommandConfig {
    /// Create a macro from its steps
    pub fn new(steps: Vec<MacroStep>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Builder method to set the aliases
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder method to set the response template
    pub fn with_response_template(mut self, template: impl Into<String>) -> Self {
        self.response_template = Some(template.into());
        self
    }
}

/// The command vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    /// Commands handled inside the client
    pub system: IndexMap<String, SystemCommandConfig>,
    /// Pattern-matched backend commands, tried in declaration order
    pub api: IndexMap<String, ApiCommandConfig>,
    /// Multi-step backend commands
    pub macros: IndexMap<String, MacroCommandConfig>,
    /// Literal input prefix rewrites, tried in declaration order
    pub aliases: IndexMap<String, String>,
}

impl CommandSettings {
    /// A vocabulary with no commands at all
    pub fn empty() -> Self {
        Self {
            system: IndexMap::new(),
            api: IndexMap::new(),
            macros: IndexMap::new(),
            aliases: IndexMap::new(),
        }
    }
}

impl Default for CommandSettings {
    fn default() -> Self {
        let system = declared([
            (
                "help",
                SystemCommandConfig::new("builtin:help")
                    .with_aliases(["?", "h"])
                    .with_description("Show available commands"),
            ),
            (
                "exit",
                SystemCommandConfig::new("builtin:exit")
                    .with_aliases(["quit", "q"])
                    .with_description("Exit the terminal"),
            ),
            (
                "clear",
                SystemCommandConfig::new("builtin:clear")
                    .with_aliases(["cls"])
                    .with_description("Clear the screen"),
            ),
            (
                "status",
                SystemCommandConfig::new("builtin:status_panel")
                    .with_aliases(["st"])
                    .with_description("Show machine status"),
            ),
            (
                "params",
                SystemCommandConfig::new("builtin:params")
                    .with_description("List machine parameters"),
            ),
            (
                "tools",
                SystemCommandConfig::new("builtin:tools").with_description("List the tool table"),
            ),
            (
                "reset",
                SystemCommandConfig::new("builtin:reset")
                    .with_aliases(["unlock"])
                    .with_description("Clear an active alarm"),
            ),
            (
                "estop",
                SystemCommandConfig::new("builtin:estop")
                    .with_aliases(["stop"])
                    .with_description("Emergency stop"),
            ),
            (
                "hold",
                SystemCommandConfig::new("builtin:feed_hold")
                    .with_aliases(["pause", "resume"])
                    .with_description("Toggle feed hold"),
            ),
        ]);

        let api = declared([
            (
                "set",
                ApiCommandConfig::new(r"^/set\s+(\S+)\s+(\S+)$", "set_parameter")
                    .with_mapping("key", "$1")
                    .with_mapping("value", "$2")
                    .with_description("Set a machine parameter: /set <PARAM> <VALUE>"),
            ),
            (
                "gcode",
                ApiCommandConfig::new(r"^[GM]\d+(\s.*)?$", "execute")
                    .with_mapping("text", "$input")
                    .with_response_template(
                        "{{if .alarm}}ALARM: {{.alarm}}{{else}}ok X:{{.x:F2}} Y:{{.y:F2}} Z:{{.z:F2}}{{end}}",
                    )
                    .with_description("Send a G-code or M-code line"),
            ),
        ]);

        let macros = declared([
            (
                "home",
                MacroCommandConfig::new(vec![MacroStep::new("execute").with_field("text", "HOME")])
                    .with_aliases(["homing"])
                    .with_description("Home all axes")
                    .with_response_template("Homed at X:{{.x:F2}} Y:{{.y:F2}} Z:{{.z:F2}}"),
            ),
            (
                "zero",
                MacroCommandConfig::new(vec![MacroStep::new("execute").with_field("text", "ZERO")])
                    .with_description("Zero all axes")
                    .with_response_template("Position zeroed"),
            ),
            (
                "park",
                MacroCommandConfig::new(vec![
                    MacroStep::new("execute").with_field("text", "PARK"),
                    MacroStep::new("get_status"),
                ])
                .with_description("Raise Z and return to the XY origin")
                .with_response_template("Parked at X:{{.x:F2}} Y:{{.y:F2}} Z:{{.z:F2}}"),
            ),
        ]);

        let aliases = declared([("/h ", "/help ".to_string()), ("/s ", "/status ".to_string())]);

        Self {
            system,
            api,
            macros,
            aliases,
        }
    }
}

/// Builds a map from entries in declaration order
fn declared<V, const N: usize>(entries: [(&str, V); N]) -> IndexMap<String, V> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Per-axis values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    /// X axis
    pub x: f64,
    /// Y axis
    pub y: f64,
    /// Z axis
    pub z: f64,
}

impl Axes {
    /// Create per-axis values
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Machine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    /// Travel per axis, used as the soft limits
    pub work_area: Axes,
    /// Whether soft limits are enforced
    pub soft_limits: bool,
    /// Maximum velocity per axis; X doubles as the default feed
    pub max_velocity: Axes,
    /// Spindle speed ceiling in RPM
    pub max_spindle: f64,
    /// Named G-code sequences understood by the simulator
    pub macros: IndexMap<String, Vec<String>>,
    /// Number of timed steps per simulated move
    pub motion_steps: u32,
    /// Duration of each simulated step
    pub step_interval_ms: u64,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            work_area: Axes::new(500.0, 500.0, 100.0),
            soft_limits: true,
            max_velocity: Axes::new(1000.0, 1000.0, 500.0),
            max_spindle: 12000.0,
            macros: declared([(
                "PARK",
                vec!["G0 Z90".to_string(), "G0 X0 Y0".to_string()],
            )]),
            motion_steps: 20,
            step_interval_ms: 25,
        }
    }
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Application presentation
    pub app: AppSettings,
    /// Transport settings
    pub transport: TransportSettings,
    /// Command vocabulary
    pub commands: CommandSettings,
    /// Machine settings
    pub machine: MachineSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location (`<config dir>/cncterm/config.toml`)
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("No configuration directory on this platform".into())
            })
    }

    /// Load from an explicit path, else the default path if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }
        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from_file(&path),
            Ok(_) => {
                tracing::debug!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
            Err(e) => {
                tracing::warn!("{}; using built-in defaults", e);
                Ok(Self::default())
            }
        }
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match Format::from_path(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::from_path(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        // Transport
        if self.transport.timeout_ms == 0 {
            return Err(invalid("transport.timeout_ms", "must be > 0"));
        }
        if self.transport.status_interval_ms == 0 {
            return Err(invalid("transport.status_interval_ms", "must be > 0"));
        }
        if self.transport.status_endpoint.trim().is_empty() {
            return Err(invalid("transport.status_endpoint", "must not be empty"));
        }

        // Commands
        for (name, api) in self.commands.api.iter() {
            if api.endpoint.trim().is_empty() {
                return Err(invalid(
                    &format!("commands.api.{}.endpoint", name),
                    "must not be empty",
                ));
            }
        }
        for (name, macro_cmd) in self.commands.macros.iter() {
            if let Some(idx) = macro_cmd
                .steps
                .iter()
                .position(|s| s.endpoint.trim().is_empty())
            {
                return Err(invalid(
                    &format!("commands.macros.{}.steps[{}].endpoint", name, idx),
                    "must not be empty",
                ));
            }
        }

        // Machine
        let area = &self.machine.work_area;
        if area.x <= 0.0 || area.y <= 0.0 || area.z <= 0.0 {
            return Err(invalid("machine.work_area", "all axes must be > 0"));
        }
        if self.machine.max_velocity.x <= 0.0 {
            return Err(invalid("machine.max_velocity.x", "must be > 0"));
        }
        if self.machine.max_spindle <= 0.0 {
            return Err(invalid("machine.max_spindle", "must be > 0"));
        }
        if self.machine.motion_steps == 0 {
            return Err(invalid("machine.motion_steps", "must be > 0"));
        }

        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Format::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Format::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transport.timeout_ms, 5000);
        assert_eq!(config.machine.motion_steps, 20);
    }

    #[test]
    fn test_default_vocabulary_order() {
        let config = Config::default();
        let api: Vec<&str> = config.commands.api.keys().map(String::as_str).collect();
        assert_eq!(api, vec!["set", "gcode"]);
        let aliases: Vec<(&str, &str)> = config
            .commands
            .aliases
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(aliases, vec![("/h ", "/help "), ("/s ", "/status ")]);
        assert_eq!(
            config.commands.system.get("status").map(|s| s.action.as_str()),
            Some("builtin:status_panel")
        );
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.transport.timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("transport.timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_blank_step_endpoint() {
        let mut config = Config::default();
        config.commands.macros.insert(
            "broken".to_string(),
            MacroCommandConfig::new(vec![MacroStep::new("execute"), MacroStep::new(" ")]),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("commands.macros.broken.steps[1].endpoint"));
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[transport]
timeout_ms = 250

[machine.work_area]
x = 300.0
y = 200.0
z = 80.0
"#,
        )
        .unwrap();
        assert_eq!(config.transport.timeout_ms, 250);
        assert_eq!(config.transport.status_endpoint, "get_status");
        assert_eq!(config.machine.work_area.x, 300.0);
        assert_eq!(config.machine.max_spindle, 12000.0);
        assert!(config.commands.system.get("help").is_some());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = Config::load_from_file(Path::new("settings.yaml")).unwrap_err();
        assert!(matches!(err, SettingsError::LoadError(_) | SettingsError::UnsupportedFormat(_)));
    }
}
