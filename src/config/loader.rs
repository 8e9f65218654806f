use std::path::Path;

use ini::Ini;

use super::{AppConfig, ConfigError};

const SECTION: &str = "Settings";

/// Load configuration from an INI file with a `[Settings]` section.
/// Missing keys fall back to their defaults; unparsable values do too.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let ini = Ini::load_from_file(path)?;
    let mut config = AppConfig::default();

    if let Some(settings) = ini.section(Some(SECTION)) {
        if let Some(v) = settings.get("api_base") {
            config.api_base = v.to_string();
        }
        if let Some(v) = settings.get("api_key") {
            config.api_key = v.to_string();
        }
        if let Some(v) = settings.get("model") {
            config.model = v.to_string();
        }
        if let Some(v) = settings.get("system_prompt") {
            config.system_prompt = v.to_string();
        }
        if let Some(v) = settings.get("pre_prompt") {
            config.pre_prompt = v.to_string();
        }
        if let Some(v) = settings.get("glossary_path") {
            config.glossary_path = v.to_string();
        }
        config.port = parse_or(settings.get("port"), config.port);
        config.context_num = parse_or(settings.get("context_num"), config.context_num);
        config.temperature = parse_or(settings.get("temperature"), config.temperature);
        config.max_threads = parse_or(settings.get("max_threads"), config.max_threads);
        config.language = parse_or(settings.get("language"), config.language);
        config.enable_glossary = settings
            .get("enable_glossary")
            .map(parse_bool)
            .unwrap_or(config.enable_glossary);
    }

    validate_api_base(&config.api_base)?;

    Ok(config)
}

/// Persist configuration back to the INI file.
pub fn save_config<P: AsRef<Path>>(config: &AppConfig, path: P) -> Result<(), ConfigError> {
    let mut ini = Ini::new();
    ini.with_section(Some(SECTION))
        .set("api_base", &config.api_base)
        .set("api_key", &config.api_key)
        .set("model", &config.model)
        .set("port", config.port.to_string())
        .set("system_prompt", &config.system_prompt)
        .set("pre_prompt", &config.pre_prompt)
        .set("context_num", config.context_num.to_string())
        .set("temperature", config.temperature.to_string())
        .set("max_threads", config.max_threads.to_string())
        .set("language", config.language.to_string())
        .set("enable_glossary", config.enable_glossary.to_string())
        .set("glossary_path", &config.glossary_path);
    ini.write_to_file(path)?;
    Ok(())
}

fn parse_or<T: std::str::FromStr>(value: Option<&str>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "True" | "TRUE" | "yes" | "on")
}

/// Validate that the upstream base URL is properly formatted
fn validate_api_base(api_base: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(api_base)
        .map_err(|e| ConfigError::Validation(format!("Invalid api_base '{api_base}': {e}")))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(ConfigError::Validation(format!(
            "api_base must use http:// or https://, got '{scheme}'"
        )));
    }

    if parsed.host_str().is_none() {
        return Err(ConfigError::Validation(format!(
            "api_base must include a host: '{api_base}'"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_config() {
        let result = load_config("/nonexistent/config.ini");
        assert!(matches!(result.unwrap_err(), ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_config_valid() {
        let temp_file = std::env::temp_dir().join("test_valid_config.ini");
        let content = r#"
[Settings]
api_base=http://localhost:8080/v1
api_key=k1,k2
model=test-model
port=7800
pre_prompt=Translate:
context_num=3
temperature=0.7
max_threads=4
language=0
enable_glossary=true
glossary_path=/tmp/glossary.txt
"#;
        std::fs::write(&temp_file, content).unwrap();

        let config = load_config(&temp_file).unwrap();
        assert_eq!(config.api_base, "http://localhost:8080/v1");
        assert_eq!(config.api_keys(), vec!["k1", "k2"]);
        assert_eq!(config.model, "test-model");
        assert_eq!(config.port, 7800);
        assert_eq!(config.context_num, 3);
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_threads, 4);
        assert_eq!(config.language, 0);
        assert!(config.enable_glossary);
        assert_eq!(config.glossary_path, "/tmp/glossary.txt");

        let _ = std::fs::remove_file(&temp_file);
    }

    #[test]
    fn test_load_config_missing_keys_fall_back_to_defaults() {
        let temp_file = std::env::temp_dir().join("test_minimal_config.ini");
        std::fs::write(&temp_file, "[Settings]\nport=9000\n").unwrap();

        let config = load_config(&temp_file).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.port, 9000);
        assert_eq!(config.api_base, defaults.api_base);
        assert_eq!(config.model, defaults.model);
        assert_eq!(config.context_num, defaults.context_num);
        assert!(!config.enable_glossary);

        let _ = std::fs::remove_file(&temp_file);
    }

    #[test]
    fn test_load_config_bad_numbers_fall_back() {
        let temp_file = std::env::temp_dir().join("test_bad_numbers_config.ini");
        std::fs::write(&temp_file, "[Settings]\nport=not-a-port\ntemperature=warm\n").unwrap();

        let config = load_config(&temp_file).unwrap();
        assert_eq!(config.port, AppConfig::default().port);
        assert_eq!(config.temperature, AppConfig::default().temperature);

        let _ = std::fs::remove_file(&temp_file);
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let temp_file = std::env::temp_dir().join("test_roundtrip_config.ini");
        let config = AppConfig {
            api_base: "http://127.0.0.1:9100/v1".to_string(),
            api_key: "a,b".to_string(),
            context_num: 2,
            enable_glossary: true,
            ..AppConfig::default()
        };

        save_config(&config, &temp_file).unwrap();
        let reloaded = load_config(&temp_file).unwrap();
        assert_eq!(reloaded, config);

        let _ = std::fs::remove_file(&temp_file);
    }

    #[test]
    fn test_validate_api_base() {
        assert!(validate_api_base("http://localhost:8080/v1").is_ok());
        assert!(validate_api_base("https://api.openai.com/v1").is_ok());
        assert!(validate_api_base("not-a-url").is_err());
        assert!(validate_api_base("ftp://example.com").is_err());
    }
}
