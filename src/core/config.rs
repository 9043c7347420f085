use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::core::fan_control::curve::{default_curve, ControlPoint, CurveMode};
use crate::error::{FanError, Result};

/// Environment variable that overrides the default config location.
pub const CONFIG_ENV: &str = "SPINFAN_CONFIG";

pub const DEFAULT_DISKS_INI_PATH: &str = "/host/disks.ini";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mqtt: MqttSettings,
    pub topics: Topics,
    pub limits: Limits,
    pub hysteresis_up: f64,
    pub hysteresis_down: f64,
    #[serde(deserialize_with = "lenient_curve")]
    pub curve: Vec<ControlPoint>,
    #[serde(deserialize_with = "lenient_curve_mode")]
    pub curve_mode: CurveMode,
    /// Address of the fan actuator; empty disables the liveness probe.
    pub actuator_ip: String,
    #[serde(rename = "unraid_disks_ini")]
    pub disk_source: DiskSource,
    #[serde(rename = "all_spun_down")]
    pub idle_override: IdleOverride,
    pub live_query: LiveQuery,
    pub status: StatusSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
}

/// Topic names for every value handed to the publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topics {
    pub target_pwm: String,
    pub min_pwm: String,
    pub max_pwm: String,
    pub max_temp: String,
    pub spinning_disks: String,
    pub updated_at: String,
    pub bias_limit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    #[serde(rename = "min_pwm", deserialize_with = "lenient_percent")]
    pub min_duty: u8,
    #[serde(rename = "max_pwm", deserialize_with = "lenient_percent")]
    pub max_duty: u8,
    #[serde(deserialize_with = "lenient_percent")]
    pub bias_limit: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskSource {
    pub path: PathBuf,
    pub poll_s: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleOverride {
    pub enabled: bool,
    #[serde(rename = "after_pwm", deserialize_with = "lenient_percent")]
    pub after_duty: u8,
}

/// Settings for the live SMART temperature query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveQuery {
    pub enabled: bool,
    pub command: String,
    pub timeout_s: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSettings {
    pub bind: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttSettings::default(),
            topics: Topics::default(),
            limits: Limits::default(),
            hysteresis_up: 0.0,
            hysteresis_down: 3.0,
            curve: default_curve(),
            curve_mode: CurveMode::Linear,
            actuator_ip: String::new(),
            disk_source: DiskSource::default(),
            idle_override: IdleOverride::default(),
            live_query: LiveQuery::default(),
            status: StatusSettings::default(),
        }
    }
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            client_id: "spinfan".to_string(),
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        let topic = |name: &str| format!("unraid/hdds/{}", name);
        Self {
            target_pwm: topic("target_pwm"),
            min_pwm: topic("min_pwm"),
            max_pwm: topic("max_pwm"),
            max_temp: topic("max_temp"),
            spinning_disks: topic("spinning_disks"),
            updated_at: topic("updated_at"),
            bias_limit: topic("bias_limit"),
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_duty: 25,
            max_duty: 100,
            bias_limit: 25,
        }
    }
}

impl Default for DiskSource {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DISKS_INI_PATH),
            poll_s: 15,
        }
    }
}

impl Default for IdleOverride {
    fn default() -> Self {
        Self {
            enabled: false,
            after_duty: 25,
        }
    }
}

impl Default for LiveQuery {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "smartctl".to_string(),
            timeout_s: 3,
        }
    }
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8088".to_string(),
        }
    }
}

impl Config {
    /// Parse and validate a config document.
    ///
    /// Legacy key names are migrated before deserialization. Every value that
    /// is missing, or cannot be coerced to its field's type, falls back to its
    /// default without affecting the other fields.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let mut raw: Value = serde_json::from_str(text)?;
        if !raw.is_object() {
            return Err(FanError::config("top-level JSON must be an object"));
        }
        migrate_legacy_keys(&mut raw);
        coerce_fields(&mut raw);

        let mut config: Config = serde_json::from_value(raw)?;
        config.normalize();
        Ok(config)
    }

    /// Load the config at `path`, writing the defaults first if it is missing.
    ///
    /// A file that exists but cannot be parsed yields the defaults (with a
    /// warning) rather than an error; only I/O failures are reported.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save(path)?;
            log::info!("Wrote default config to {}", path.display());
            return Ok(config);
        }

        match Config::load(path) {
            Ok(config) => Ok(config),
            Err(FanError::Io(e)) => Err(FanError::Io(e)),
            Err(e) => {
                log::warn!("Ignoring unparseable config {}: {}", path.display(), e);
                Ok(Config::default())
            }
        }
    }

    /// Read and parse an existing config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Config::from_json_str(&text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        atomic_write(path, &text)
    }

    /// Bring every value into its valid range.
    pub fn normalize(&mut self) {
        self.curve.retain(|p| p.temperature.is_finite());
        self.curve.sort_by(|a, b| a.temperature.total_cmp(&b.temperature));
        if self.curve.is_empty() {
            self.curve = default_curve();
        }

        self.hysteresis_up = self.hysteresis_up.max(0.0);
        self.hysteresis_down = self.hysteresis_down.max(0.0);

        self.disk_source.poll_s = self.disk_source.poll_s.max(1);
        if self.disk_source.path.as_os_str().is_empty() {
            self.disk_source.path = PathBuf::from(DEFAULT_DISKS_INI_PATH);
        }

        self.live_query.timeout_s = self.live_query.timeout_s.clamp(1, 30);
        self.actuator_ip = self.actuator_ip.trim().to_string();
    }

    /// Default config location: `$SPINFAN_CONFIG`, else `<config dir>/spinfan/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| FanError::config("Could not determine config directory"))?;

        Ok(config_dir.join("spinfan").join("config.json"))
    }
}

/// Rewrite keys used by older config files to their current names.
///
/// The current name always wins when both are present.
fn migrate_legacy_keys(raw: &mut Value) {
    let Some(root) = raw.as_object_mut() else {
        return;
    };

    rename_key(root, "idle_when_all_spun_down", "all_spun_down");
    rename_key(root, "esp_ip", "actuator_ip");

    if let Some(topics) = root.get_mut("topics").and_then(Value::as_object_mut) {
        rename_key(topics, "base_pwm", "target_pwm");
    }

    if let Some(mqtt) = root.get_mut("mqtt").and_then(Value::as_object_mut) {
        rename_key(mqtt, "user", "username");
        rename_key(mqtt, "pass", "password");
    }

    // A single symmetric band used to be configured as `hysteresis_c`.
    if let Some(band) = root.remove("hysteresis_c") {
        for key in ["hysteresis_up", "hysteresis_down"] {
            if !root.contains_key(key) {
                root.insert(key.to_string(), band.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Float,
    /// Non-negative integer up to the given bound; floats are truncated.
    Unsigned(u64),
    Bool,
    Text,
}

const SECTIONS: [&str; 7] = [
    "mqtt",
    "topics",
    "limits",
    "unraid_disks_ini",
    "all_spun_down",
    "live_query",
    "status",
];

const TYPED_FIELDS: &[(&str, Option<&str>, FieldKind)] = &[
    ("hysteresis_up", None, FieldKind::Float),
    ("hysteresis_down", None, FieldKind::Float),
    ("actuator_ip", None, FieldKind::Text),
    ("host", Some("mqtt"), FieldKind::Text),
    ("port", Some("mqtt"), FieldKind::Unsigned(u16::MAX as u64)),
    ("username", Some("mqtt"), FieldKind::Text),
    ("password", Some("mqtt"), FieldKind::Text),
    ("client_id", Some("mqtt"), FieldKind::Text),
    ("target_pwm", Some("topics"), FieldKind::Text),
    ("min_pwm", Some("topics"), FieldKind::Text),
    ("max_pwm", Some("topics"), FieldKind::Text),
    ("max_temp", Some("topics"), FieldKind::Text),
    ("spinning_disks", Some("topics"), FieldKind::Text),
    ("updated_at", Some("topics"), FieldKind::Text),
    ("bias_limit", Some("topics"), FieldKind::Text),
    ("min_pwm", Some("limits"), FieldKind::Float),
    ("max_pwm", Some("limits"), FieldKind::Float),
    ("bias_limit", Some("limits"), FieldKind::Float),
    ("path", Some("unraid_disks_ini"), FieldKind::Text),
    ("poll_s", Some("unraid_disks_ini"), FieldKind::Unsigned(u64::MAX)),
    ("enabled", Some("all_spun_down"), FieldKind::Bool),
    ("after_pwm", Some("all_spun_down"), FieldKind::Float),
    ("enabled", Some("live_query"), FieldKind::Bool),
    ("command", Some("live_query"), FieldKind::Text),
    ("timeout_s", Some("live_query"), FieldKind::Unsigned(u64::MAX)),
    ("bind", Some("status"), FieldKind::Text),
];

/// Coerce hand-edited values to the types the config expects.
///
/// Values that cannot be coerced are removed so the field takes its default.
fn coerce_fields(raw: &mut Value) {
    let Some(root) = raw.as_object_mut() else {
        return;
    };

    for section in SECTIONS {
        if root.get(section).is_some_and(|v| !v.is_object()) {
            root.remove(section);
        }
    }

    for (key, section, kind) in TYPED_FIELDS {
        let map = match section {
            None => Some(&mut *root),
            Some(name) => root.get_mut(*name).and_then(Value::as_object_mut),
        };
        let Some(map) = map else {
            continue;
        };
        let Some(value) = map.get(*key) else {
            continue;
        };

        match coerce(value, *kind) {
            Some(coerced) => {
                map.insert(key.to_string(), coerced);
            }
            None => {
                map.remove(*key);
            }
        }
    }
}

fn coerce(value: &Value, kind: FieldKind) -> Option<Value> {
    match kind {
        FieldKind::Float => number(value)
            .filter(|v| v.is_finite())
            .map(Value::from),
        FieldKind::Unsigned(max) => number(value)
            .filter(|v| v.is_finite() && *v >= 0.0 && v.trunc() <= max as f64)
            .map(|v| Value::from(v.trunc() as u64)),
        FieldKind::Bool => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Number(n) => n.as_f64().map(|v| Value::Bool(v != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
                "false" | "0" | "no" | "off" | "" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldKind::Text => match value {
            Value::String(_) => Some(value.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
    }
}

fn rename_key(map: &mut Map<String, Value>, old: &str, new: &str) {
    if let Some(value) = map.remove(old) {
        let current_is_empty = match map.get(new) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if current_is_empty {
            map.insert(new.to_string(), value);
        }
    }
}

fn atomic_write(path: &Path, text: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, text)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn percent(value: f64) -> u8 {
    value.clamp(0.0, 100.0) as u8
}

fn lenient_percent<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    number(&value)
        .filter(|v| v.is_finite())
        .map(percent)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a percentage, got {}", value)))
}

/// Curve points are parsed one by one; points that do not parse are dropped.
fn lenient_curve<'de, D>(deserializer: D) -> std::result::Result<Vec<ControlPoint>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            let temperature = number(item.get("temp_c")?)?;
            let duty = number(item.get("pwm")?)?;
            duty.is_finite()
                .then(|| ControlPoint::new(temperature, percent(duty.trunc())))
        })
        .collect())
}

fn lenient_curve_mode<'de, D>(deserializer: D) -> std::result::Result<CurveMode, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .and_then(CurveMode::parse)
        .unwrap_or_default())
}

/// Supplies a fresh configuration snapshot for every poll cycle.
pub trait ConfigProvider: Send + Sync {
    fn snapshot(&self) -> Config;
}

/// Reads the config file on every call so edits take effect on the next cycle.
pub struct FileConfigProvider {
    path: PathBuf,
    last_good: Mutex<Option<Config>>,
    last_error: Mutex<Option<String>>,
}

impl FileConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_good: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfigProvider {
    fn snapshot(&self) -> Config {
        let loaded = if self.path.exists() {
            Config::load(&self.path)
        } else {
            Config::load_or_init(&self.path)
        };

        match loaded {
            Ok(config) => {
                *self.last_error.lock() = None;
                *self.last_good.lock() = Some(config.clone());
                config
            }
            Err(e) => {
                // Only log when the failure changes, the file is re-read every second.
                let message = e.to_string();
                let mut last_error = self.last_error.lock();
                if last_error.as_deref() != Some(message.as_str()) {
                    log::warn!("Config {} unavailable: {}", self.path.display(), message);
                    *last_error = Some(message);
                }
                drop(last_error);

                self.last_good.lock().clone().unwrap_or_default()
            }
        }
    }
}

/// Fixed configuration, mostly for tests and one-shot commands.
pub struct StaticConfigProvider {
    config: Mutex<Config>,
}

impl StaticConfigProvider {
    pub fn new(config: Config) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    pub fn replace(&self, config: Config) {
        *self.config.lock() = config;
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn snapshot(&self) -> Config {
        self.config.lock().clone()
    }
}
