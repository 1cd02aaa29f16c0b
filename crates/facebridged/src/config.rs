use facebridge_vision::OnnxLoader;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Load models at startup and announce MODEL_LOADED instead of waiting
    /// for the first request.
    pub preload: bool,
    /// Image run through the detector once after preloading.
    pub warmup_image: Option<String>,
    /// Timeout in seconds for fetching an HTTP(S) image.
    pub fetch_timeout_secs: u64,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
    /// Largest encoded image accepted, in bytes.
    pub max_image_bytes: usize,
}

impl Config {
    /// Load configuration from `FACEBRIDGE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            model_dir: var("FACEBRIDGE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(facebridge_vision::default_model_dir),
            preload: var("FACEBRIDGE_PRELOAD").map(|v| v != "0").unwrap_or(true),
            warmup_image: var("FACEBRIDGE_WARMUP_IMAGE").filter(|v| !v.is_empty()),
            fetch_timeout_secs: parse_or(var("FACEBRIDGE_FETCH_TIMEOUT_SECS"), 10),
            intra_threads: parse_or(var("FACEBRIDGE_INTRA_THREADS"), 2),
            max_image_bytes: parse_or(var("FACEBRIDGE_MAX_IMAGE_BYTES"), 16 * 1024 * 1024),
        }
    }

    /// Loader for the ONNX recognition capability.
    pub fn loader(&self) -> OnnxLoader {
        OnnxLoader {
            intra_threads: self.intra_threads.max(1),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_image_bytes: self.max_image_bytes,
            ..OnnxLoader::from_model_dir(&self.model_dir)
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.model_dir, facebridge_vision::default_model_dir());
        assert!(config.preload);
        assert!(config.warmup_image.is_none());
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.intra_threads, 2);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("FACEBRIDGE_MODEL_DIR", "/srv/models"),
            ("FACEBRIDGE_PRELOAD", "0"),
            ("FACEBRIDGE_WARMUP_IMAGE", "/srv/warmup.jpg"),
            ("FACEBRIDGE_INTRA_THREADS", "4"),
            ("FACEBRIDGE_FETCH_TIMEOUT_SECS", "not a number"),
        ]);
        assert!(!config.preload);
        assert_eq!(config.warmup_image.as_deref(), Some("/srv/warmup.jpg"));
        assert_eq!(config.fetch_timeout_secs, 10);

        let loader = config.loader();
        assert_eq!(loader.detector_path, PathBuf::from("/srv/models/det_10g.onnx"));
        assert_eq!(loader.intra_threads, 4);
    }
}
