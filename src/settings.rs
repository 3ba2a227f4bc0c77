use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::jobs::payload::{ImageMediaType, JobOptions, MaskFormat};
use crate::jobs::poller::PollLimits;

pub const DEFAULT_SETTINGS_PATH: &str = "config/bilder.settings.toml";
pub const DEFAULT_API_BASE_URL: &str = "https://image.adobe.io";
pub const DEFAULT_IMS_TOKEN_URL: &str = "https://ims-na1.adobelogin.com/ims/token/v3";
pub const DEFAULT_IMS_SCOPE: &str = "openid,AdobeID,read_organizations";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdobeSettings {
    pub api_base_url: String,
    pub ims_token_url: String,
    pub ims_scope: String,
}

impl Default for AdobeSettings {
    fn default() -> Self {
        Self {
            api_base_url: String::from(DEFAULT_API_BASE_URL),
            ims_token_url: String::from(DEFAULT_IMS_TOKEN_URL),
            ims_scope: String::from(DEFAULT_IMS_SCOPE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingSettings {
    pub interval_ms: u64,
    pub timeout_secs: u64,
    pub max_attempts: Option<u32>,
    pub request_timeout_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            timeout_secs: 300,
            max_attempts: None,
            request_timeout_secs: 30,
        }
    }
}

impl PollingSettings {
    pub fn limits(&self) -> PollLimits {
        PollLimits {
            interval: Duration::from_millis(self.interval_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_attempts,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobSettings {
    pub adobe: AdobeSettings,
    pub polling: PollingSettings,
    pub options: JobOptions,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("failed to read job settings '{path}': {message}")]
    ReadFile { path: String, message: String },
    #[error("failed to parse job settings JSON '{path}': {message}")]
    ParseJson { path: String, message: String },
    #[error("failed to parse job settings TOML '{path}': {message}")]
    ParseToml { path: String, message: String },
    #[error("job settings root must be a table")]
    RootMustBeObject,
    #[error("job settings field '{field}' has invalid type or value")]
    InvalidFieldType { field: String },
}

/// Loads `explicit_path` (relative paths resolve from `app_root`) or the
/// default TOML file. A missing file yields defaults.
pub fn load_job_settings(
    app_root: &Path,
    explicit_path: Option<&str>,
) -> Result<JobSettings, SettingsError> {
    let path = explicit_path
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .map(|p| if p.is_absolute() { p } else { app_root.join(p) })
        .unwrap_or_else(|| app_root.join(DEFAULT_SETTINGS_PATH));
    if !path.exists() {
        return Ok(JobSettings::default());
    }
    let raw = fs::read_to_string(path.as_path()).map_err(|error| SettingsError::ReadFile {
        path: path.display().to_string(),
        message: error.to_string(),
    })?;
    let is_json = path
        .extension()
        .and_then(|v| v.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str::<Value>(raw.as_str()).map_err(|error| SettingsError::ParseJson {
            path: path.display().to_string(),
            message: error.to_string(),
        })?
    } else {
        let table = toml::from_str::<toml::Value>(raw.as_str()).map_err(|error| {
            SettingsError::ParseToml {
                path: path.display().to_string(),
                message: error.to_string(),
            }
        })?;
        serde_json::to_value(table).map_err(|error| SettingsError::ParseToml {
            path: path.display().to_string(),
            message: error.to_string(),
        })?
    };
    parse_job_settings_json(&parsed)
}

pub fn parse_job_settings_json(value: &Value) -> Result<JobSettings, SettingsError> {
    let root = value.as_object().ok_or(SettingsError::RootMustBeObject)?;
    let mut settings = JobSettings::default();

    if let Some(adobe) = section(root, "adobe")? {
        if let Some(v) = adobe.get("api_base_url") {
            settings.adobe.api_base_url = parse_http_url(v, "adobe.api_base_url")?;
        }
        if let Some(v) = adobe.get("ims_token_url") {
            settings.adobe.ims_token_url = parse_http_url(v, "adobe.ims_token_url")?;
        }
        if let Some(v) = adobe.get("ims_scope") {
            settings.adobe.ims_scope = parse_string(v, "adobe.ims_scope")?;
        }
    }

    if let Some(polling) = section(root, "polling")? {
        if let Some(v) = polling.get("interval_ms") {
            settings.polling.interval_ms = parse_positive_u64(v, "polling.interval_ms")?;
        }
        if let Some(v) = polling.get("timeout_secs") {
            settings.polling.timeout_secs = parse_positive_u64(v, "polling.timeout_secs")?;
        }
        if let Some(v) = polling.get("max_attempts") {
            let max = parse_positive_u64(v, "polling.max_attempts")?;
            settings.polling.max_attempts =
                Some(u32::try_from(max).map_err(|_| invalid("polling.max_attempts"))?);
        }
        if let Some(v) = polling.get("request_timeout_secs") {
            settings.polling.request_timeout_secs =
                parse_positive_u64(v, "polling.request_timeout_secs")?;
        }
    }

    if let Some(cutout) = section(root, "remove_background")? {
        if let Some(v) = cutout.get("mask_format") {
            settings.options.mask_format =
                MaskFormat::parse(parse_string(v, "remove_background.mask_format")?.as_str())
                    .ok_or_else(|| invalid("remove_background.mask_format"))?;
        }
    }

    if let Some(tone) = section(root, "auto_tone")? {
        if let Some(v) = tone.get("output_type") {
            settings.options.output_type =
                ImageMediaType::parse(parse_string(v, "auto_tone.output_type")?.as_str())
                    .ok_or_else(|| invalid("auto_tone.output_type"))?;
        }
    }

    Ok(settings)
}

fn section<'a>(
    root: &'a Map<String, Value>,
    name: &str,
) -> Result<Option<&'a Map<String, Value>>, SettingsError> {
    match root.get(name) {
        None => Ok(None),
        Some(value) => value.as_object().map(Some).ok_or_else(|| invalid(name)),
    }
}

fn invalid(field: &str) -> SettingsError {
    SettingsError::InvalidFieldType {
        field: field.to_string(),
    }
}

fn parse_string(value: &Value, field: &str) -> Result<String, SettingsError> {
    value
        .as_str()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| invalid(field))
}

fn parse_http_url(value: &Value, field: &str) -> Result<String, SettingsError> {
    let parsed = parse_string(value, field)?;
    match url::Url::parse(parsed.as_str()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(parsed),
        _ => Err(invalid(field)),
    }
}

fn parse_positive_u64(value: &Value, field: &str) -> Result<u64, SettingsError> {
    value
        .as_u64()
        .filter(|v| *v > 0)
        .ok_or_else(|| invalid(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_root(label: &str) -> PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        let root = std::env::temp_dir().join(format!("bilder_settings_{label}_{stamp}"));
        fs::create_dir_all(root.join("config")).expect("config dir");
        root
    }

    #[test]
    fn parses_all_sections() {
        let settings = parse_job_settings_json(&serde_json::json!({
            "adobe": {
                "api_base_url": "https://image-stage.adobe.io",
                "ims_scope": "openid"
            },
            "polling": {
                "interval_ms": 250,
                "timeout_secs": 60,
                "max_attempts": 40
            },
            "remove_background": {"mask_format": "binary"},
            "auto_tone": {"output_type": "image/png"}
        }))
        .expect("settings should parse");

        assert_eq!(settings.adobe.api_base_url, "https://image-stage.adobe.io");
        assert_eq!(settings.adobe.ims_token_url, DEFAULT_IMS_TOKEN_URL);
        assert_eq!(settings.adobe.ims_scope, "openid");
        assert_eq!(
            settings.polling.limits(),
            PollLimits {
                interval: Duration::from_millis(250),
                timeout: Duration::from_secs(60),
                max_attempts: Some(40),
            }
        );
        assert_eq!(
            settings.options,
            JobOptions {
                mask_format: MaskFormat::Binary,
                output_type: ImageMediaType::Png,
            }
        );
    }

    #[test]
    fn rejects_zero_interval_and_unknown_mask_format() {
        let err = parse_job_settings_json(&serde_json::json!({"polling": {"interval_ms": 0}}))
            .expect_err("zero interval");
        assert_eq!(err, invalid("polling.interval_ms"));

        let err = parse_job_settings_json(
            &serde_json::json!({"remove_background": {"mask_format": "hard"}}),
        )
        .expect_err("unknown mask format");
        assert_eq!(err, invalid("remove_background.mask_format"));
    }

    #[test]
    fn rejects_non_http_base_url_and_non_table_section() {
        let err = parse_job_settings_json(
            &serde_json::json!({"adobe": {"api_base_url": "ftp://image.adobe.io"}}),
        )
        .expect_err("ftp base");
        assert_eq!(err, invalid("adobe.api_base_url"));

        let err = parse_job_settings_json(&serde_json::json!({"polling": 5}))
            .expect_err("scalar section");
        assert_eq!(err, invalid("polling"));
    }

    #[test]
    fn loads_default_toml_file_from_app_root() {
        let root = temp_root("toml");
        fs::write(
            root.join(DEFAULT_SETTINGS_PATH),
            r#"[polling]
interval_ms = 500
timeout_secs = 120

[auto_tone]
output_type = "image/tiff"
"#,
        )
        .expect("settings write");

        let settings = load_job_settings(root.as_path(), None).expect("settings load");
        assert_eq!(settings.polling.interval_ms, 500);
        assert_eq!(settings.polling.timeout_secs, 120);
        assert_eq!(settings.options.output_type, ImageMediaType::Tiff);
        assert_eq!(settings.adobe, AdobeSettings::default());

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn explicit_json_path_resolves_from_app_root() {
        let root = temp_root("json");
        fs::write(
            root.join("config/custom.json"),
            r#"{"remove_background":{"mask_format":"binary"}}"#,
        )
        .expect("settings write");

        let settings =
            load_job_settings(root.as_path(), Some("config/custom.json")).expect("settings load");
        assert_eq!(settings.options.mask_format, MaskFormat::Binary);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn missing_file_yields_defaults_and_bad_toml_is_reported() {
        let root = temp_root("missing");
        assert_eq!(
            load_job_settings(root.as_path(), None).expect("defaults"),
            JobSettings::default()
        );

        fs::write(root.join(DEFAULT_SETTINGS_PATH), "[polling\n").expect("settings write");
        let err = load_job_settings(root.as_path(), None).expect_err("bad toml");
        assert!(matches!(err, SettingsError::ParseToml { .. }));

        let _ = fs::remove_dir_all(root);
    }
}
