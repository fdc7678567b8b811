use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub recognizer: RecognizerConfig,
    pub capture: CaptureConfig,
    pub rate_limit: RateLimitConfig,
    pub timeouts: TimeoutsConfig,
}

impl Config {
    /// Reject limits that must be non-zero for the daemon to run.
    /// Values that pass here can be handed to channel and rate limiter
    /// construction without panicking.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            anyhow::bail!("audio.sample_rate must be greater than zero");
        }
        if self.audio.broadcast_capacity == 0 {
            anyhow::bail!("audio.broadcast_capacity must be greater than zero");
        }
        if self.rate_limit.commands_per_second == 0 {
            anyhow::bail!("rate_limit.commands_per_second must be greater than zero");
        }
        if self.rate_limit.burst_capacity == 0 {
            anyhow::bail!("rate_limit.burst_capacity must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Informational only; capture always opens the default input device.
    pub device: String,
    pub sample_rate: u32,
    pub gain: f32,
    pub broadcast_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
            gain: default_gain(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_gain() -> f32 {
    1.0
}

fn default_broadcast_capacity() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct VadConfig {
    /// Speech threshold used until the first ambient calibration runs.
    pub energy_threshold: f32,
    /// Calibration never sets a threshold below this.
    pub energy_floor: f32,
    /// Calibrated threshold = ambient RMS * this ratio.
    pub ambient_ratio: f32,
    /// How much ambient audio one calibration pass samples.
    pub calibration_ms: u32,
    /// Trailing silence that ends a phrase.
    pub min_silence_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold: default_energy_threshold(),
            energy_floor: default_energy_floor(),
            ambient_ratio: default_ambient_ratio(),
            calibration_ms: default_calibration_ms(),
            min_silence_ms: default_min_silence_ms(),
        }
    }
}

fn default_energy_threshold() -> f32 {
    0.02
}

fn default_energy_floor() -> f32 {
    0.01
}

fn default_ambient_ratio() -> f32 {
    1.5
}

fn default_calibration_ms() -> u32 {
    1000
}

fn default_min_silence_ms() -> u32 {
    800
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RecognizerConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub language: String,
    pub request_timeout_secs: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            model: default_model(),
            language: default_language(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/audio/transcriptions".to_string()
}

fn default_model() -> String {
    "whisper-1".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// How long to wait for speech onset when the caller gives no timeout.
    pub default_timeout_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_capture_timeout(),
        }
    }
}

fn default_capture_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub commands_per_second: u32,
    pub burst_capacity: u32,
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            commands_per_second: default_commands_per_second(),
            burst_capacity: default_burst_capacity(),
            enabled: default_rate_limit_enabled(),
        }
    }
}

fn default_commands_per_second() -> u32 {
    10
}

fn default_burst_capacity() -> u32 {
    20
}

fn default_rate_limit_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub socket_connect_timeout_seconds: u64,
    pub socket_operation_timeout_seconds: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            socket_connect_timeout_seconds: default_socket_connect_timeout(),
            socket_operation_timeout_seconds: default_socket_operation_timeout(),
        }
    }
}

fn default_socket_connect_timeout() -> u64 {
    5
}

fn default_socket_operation_timeout() -> u64 {
    10
}

pub fn load_config() -> Result<Config> {
    let config_path = get_config_path();

    if !config_path.exists() {
        tracing::info!("Config file not found at {:?}, using defaults", config_path);
        return Ok(Config::default());
    }

    load_config_from(&config_path)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    tracing::info!("Loading config from {:?}", path);
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
    config.validate()?;

    tracing::info!("Config loaded successfully");
    Ok(config)
}

fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vcmd")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.audio.device, "default");
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.gain, 1.0);
        assert_eq!(config.audio.broadcast_capacity, 100);

        assert_eq!(config.vad.energy_threshold, 0.02);
        assert_eq!(config.vad.energy_floor, 0.01);
        assert_eq!(config.vad.ambient_ratio, 1.5);
        assert_eq!(config.vad.calibration_ms, 1000);
        assert_eq!(config.vad.min_silence_ms, 800);

        assert_eq!(
            config.recognizer.endpoint,
            "https://api.openai.com/v1/audio/transcriptions"
        );
        assert_eq!(config.recognizer.api_key, "");
        assert_eq!(config.recognizer.model, "whisper-1");
        assert_eq!(config.recognizer.language, "en");
        assert_eq!(config.recognizer.request_timeout_secs, 30);

        assert_eq!(config.capture.default_timeout_secs, 10);

        assert_eq!(config.rate_limit.commands_per_second, 10);
        assert_eq!(config.rate_limit.burst_capacity, 20);
        assert_eq!(config.rate_limit.enabled, true);

        assert_eq!(config.timeouts.socket_connect_timeout_seconds, 5);
        assert_eq!(config.timeouts.socket_operation_timeout_seconds, 10);
    }

    #[test]
    fn test_config_toml_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();

        assert!(toml_str.contains("[audio]"));
        assert!(toml_str.contains("[vad]"));
        assert!(toml_str.contains("[recognizer]"));
        assert!(toml_str.contains("[capture]"));
        assert!(toml_str.contains("[rate_limit]"));
        assert!(toml_str.contains("[timeouts]"));
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_with_custom_values() {
        let toml_str = r#"
            [audio]
            device = "usb_mic"
            sample_rate = 48000
            gain = 2.5

            [vad]
            energy_threshold = 0.05
            min_silence_ms = 400

            [recognizer]
            endpoint = "http://localhost:8080/transcribe"
            api_key = "secret"
            language = "de"

            [capture]
            default_timeout_secs = 4
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();

        assert_eq!(config.audio.device, "usb_mic");
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.audio.gain, 2.5);
        assert_eq!(config.vad.energy_threshold, 0.05);
        assert_eq!(config.vad.min_silence_ms, 400);
        assert_eq!(config.recognizer.endpoint, "http://localhost:8080/transcribe");
        assert_eq!(config.recognizer.api_key, "secret");
        assert_eq!(config.recognizer.language, "de");
        assert_eq!(config.capture.default_timeout_secs, 4);
    }

    #[test]
    fn test_config_with_missing_fields_uses_defaults() {
        let toml_str = r#"
            [audio]
            device = "partial"

            [vad]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();

        assert_eq!(config.audio.device, "partial");
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.gain, 1.0);
        assert_eq!(config.vad.energy_threshold, 0.02);
    }

    #[test]
    fn test_config_with_missing_sections_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.vad.ambient_ratio, 1.5);
        assert_eq!(config.recognizer.model, "whisper-1");
        assert_eq!(config.capture.default_timeout_secs, 10);
    }

    #[test]
    fn test_config_with_invalid_toml() {
        let toml_str = "invalid toml content [unclosed";
        let result: Result<Config, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_with_invalid_types() {
        let toml_str = r#"
            [audio]
            sample_rate = "not_a_number"
        "#;
        let result: Result<Config, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_energy_threshold() {
        assert_eq!(default_energy_threshold(), 0.02);
    }

    #[test]
    fn test_default_ambient_ratio() {
        assert_eq!(default_ambient_ratio(), 1.5);
    }

    #[test]
    fn test_default_capture_timeout() {
        assert_eq!(default_capture_timeout(), 10);
    }

    #[test]
    fn test_default_rate_limit_config() {
        let config = Config::default();
        assert_eq!(config.rate_limit.commands_per_second, 10);
        assert_eq!(config.rate_limit.burst_capacity, 20);
        assert_eq!(config.rate_limit.enabled, true);
    }

    #[test]
    fn test_rate_limit_with_custom_values() {
        let toml_str = r#"
            [rate_limit]
            commands_per_second = 5
            burst_capacity = 10
            enabled = false
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.rate_limit.commands_per_second, 5);
        assert_eq!(config.rate_limit.burst_capacity, 10);
        assert_eq!(config.rate_limit.enabled, false);
    }

    #[test]
    fn test_timeouts_with_partial_values() {
        let toml_str = r#"
            [timeouts]
            socket_connect_timeout_seconds = 15
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.timeouts.socket_connect_timeout_seconds, 15);
        assert_eq!(config.timeouts.socket_operation_timeout_seconds, 10);
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[recognizer]\nendpoint = \"http://127.0.0.1:9000/stt\"\n\n[vad]\nambient_ratio = 2.0"
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.recognizer.endpoint, "http://127.0.0.1:9000/stt");
        assert_eq!(config.vad.ambient_ratio, 2.0);
        assert_eq!(config.audio.sample_rate, 16000);
    }

    #[test]
    fn test_load_config_from_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(load_config_from(&path).is_err());
    }

    #[test]
    fn test_load_config_from_unparseable_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not [valid").unwrap();
        assert!(load_config_from(&path).is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_rate_limit() {
        let mut config = Config::default();
        config.rate_limit.commands_per_second = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("commands_per_second"));

        let mut config = Config::default();
        config.rate_limit.burst_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("burst_capacity"));
    }

    #[test]
    fn test_validate_rejects_zero_audio_limits() {
        let mut config = Config::default();
        config.audio.sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.audio.broadcast_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_zero_rate_limit_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[rate_limit]\ncommands_per_second = 0").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("commands_per_second"));
    }
}
