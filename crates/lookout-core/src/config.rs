use std::path::PathBuf;

/// Runtime configuration, loaded from `LOOKOUT_*` environment variables.
///
/// Constructed once at startup by each binary and passed down by
/// reference; nothing reads the environment after this.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Root directory of the enrollment store.
    pub uploads_dir: PathBuf,
    /// V4L2 device path for the watch loop (default: /dev/video0).
    pub camera_device: String,
    /// HTTP listen address for the upload daemon.
    pub listen_addr: String,
    /// Cosine similarity threshold for a positive verification.
    pub similarity_threshold: f32,
    /// Processing resolution the watch loop resizes frames to.
    pub frame_width: u32,
    pub frame_height: u32,
    /// Number of embedding worker threads in the watch loop.
    pub embed_workers: usize,
    /// TrueType font used for overlay labels.
    pub font_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            model_dir: env_path("LOOKOUT_MODEL_DIR", "models"),
            uploads_dir: env_path("LOOKOUT_UPLOADS_DIR", "uploads"),
            camera_device: std::env::var("LOOKOUT_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            listen_addr: std::env::var("LOOKOUT_LISTEN_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:5000".to_string()),
            similarity_threshold: env_f32("LOOKOUT_SIMILARITY_THRESHOLD", 0.40),
            frame_width: env_u32("LOOKOUT_FRAME_WIDTH", 640),
            frame_height: env_u32("LOOKOUT_FRAME_HEIGHT", 480),
            embed_workers: env_usize("LOOKOUT_EMBED_WORKERS", 2),
            font_path: env_path(
                "LOOKOUT_FONT_PATH",
                "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            ),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir.join("det_10g.onnx").to_string_lossy().into_owned()
    }

    /// Path to the ArcFace embedding model.
    pub fn recognizer_model_path(&self) -> String {
        self.model_dir.join("w600k_r50.onnx").to_string_lossy().into_owned()
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
