use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "config/emotion.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub models: ModelConfig,
    /// Display-label overrides merged over the built-in table.
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub field_name: String,
    pub max_images: usize,
    pub max_image_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            field_name: "images".to_string(),
            max_images: 15,
            max_image_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub intra_threads: usize,
    pub detector: DetectorConfig,
    pub expression: ExpressionNetConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./models"),
            intra_threads: 2,
            detector: DetectorConfig::default(),
            expression: ExpressionNetConfig::default(),
        }
    }
}

impl ModelConfig {
    pub fn detector_path(&self) -> PathBuf {
        self.model_dir.join(&self.detector.file)
    }

    pub fn expression_path(&self) -> PathBuf {
        self.model_dir.join(&self.expression.file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub file: String,
    pub input_size: u32,
    pub confidence: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            file: "yolov8n-face.onnx".to_string(),
            input_size: 640,
            confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionNetConfig {
    pub file: String,
    pub input_size: u32,
    pub grayscale: bool,
    /// Multiplier applied to raw 0..255 pixel values.
    pub pixel_scale: f32,
    pub softmax: bool,
    /// Class names in model output order.
    pub labels: Vec<String>,
}

impl Default for ExpressionNetConfig {
    fn default() -> Self {
        Self {
            file: "emotion-ferplus-8.onnx".to_string(),
            input_size: 64,
            grayscale: true,
            pixel_scale: 1.0,
            softmax: true,
            labels: [
                "neutral",
                "happy",
                "surprised",
                "sad",
                "angry",
                "disgusted",
                "fearful",
                "contempt",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl AppConfig {
    /// Reads `$EMOTION_CONFIG` (or `config/emotion.yaml`) when present, then applies
    /// `HOST`/`PORT` from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("EMOTION_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            log::info!("Loading configuration from {}", path);
            Self::from_file(&path)?
        } else {
            log::info!("No config file at {}, using defaults", path);
            Self::default()
        };

        if let Ok(host) = env::var("HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            config.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "PORT",
                value: port.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.max_images == 0 {
            return Err(ConfigError::Invalid("upload.max_images must be at least 1".into()));
        }
        if self.models.expression.labels.is_empty() {
            return Err(ConfigError::Invalid("models.expression.labels must not be empty".into()));
        }
        if self.models.detector.input_size == 0 || self.models.expression.input_size == 0 {
            return Err(ConfigError::Invalid("model input sizes must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_and_limits() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.upload.max_images, 15);
        assert_eq!(config.upload.field_name, "images");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
server:
  port: 8081
labels:
  happy: Feliz
models:
  expression:
    input_size: 112
    grayscale: false
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.labels.get("happy").map(String::as_str), Some("Feliz"));
        assert_eq!(config.models.expression.input_size, 112);
        assert!(!config.models.expression.grayscale);
        assert_eq!(config.models.expression.labels.len(), 8);
        assert_eq!(config.models.detector.input_size, 640);
    }

    #[test]
    fn model_paths_join_model_dir() {
        let mut config = ModelConfig::default();
        config.model_dir = PathBuf::from("/opt/models");
        assert_eq!(config.detector_path(), PathBuf::from("/opt/models/yolov8n-face.onnx"));
        assert_eq!(
            config.expression_path(),
            PathBuf::from("/opt/models/emotion-ferplus-8.onnx")
        );
    }

    #[test]
    fn rejects_empty_label_list() {
        let mut config = AppConfig::default();
        config.models.expression.labels.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_malformed_yaml() {
        assert!(matches!(
            AppConfig::from_yaml("server: [not, a, map]"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
