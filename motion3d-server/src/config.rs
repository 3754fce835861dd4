//! Server configuration, loaded from environment variables at startup.

use motion3d_core::model::Device;

/// Runtime configuration for motion3d-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// Root directory for uploaded inputs and finalized outputs
    /// (default: `"./data"`).
    pub data_dir: String,

    /// Directory holding one checkpoint subdirectory per model variant
    /// (default: `"./models"`).
    pub models_dir: String,

    /// Model variant pre-loaded and designated current at startup.
    /// Startup warns and continues if it cannot be loaded.
    pub default_model: String,

    /// Compute target, `"cpu"` or `"accelerator:N"`.
    pub device: Device,

    /// Submission-queue capacity.
    pub queue_capacity: usize,

    /// Maximum concurrently running generations.
    pub worker_concurrency: usize,

    /// Cap on extracted driving frames per task.
    pub max_frames: usize,

    /// Frame rate of encoded outputs.
    pub output_fps: u32,

    /// TTL in seconds for terminal task records and their files.
    /// Unset disables the retention sweeper.
    pub task_ttl_secs: Option<u64>,

    /// Maximum multipart upload size in megabytes.
    pub max_upload_size_mb: usize,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated allowed CORS origins; unset means wildcard.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI at `/swagger-ui` (default: `true`).
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("MOTION3D_BIND", "0.0.0.0:8000"),
            data_dir: env_or("MOTION3D_DATA_DIR", "./data"),
            models_dir: env_or("MOTION3D_MODELS_DIR", "./models"),
            default_model: env_or("MOTION3D_DEFAULT_MODEL", "motion_clone"),
            device: std::env::var("MOTION3D_DEVICE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(Device::Cpu),
            queue_capacity: parse_env("MOTION3D_QUEUE_CAPACITY", 64),
            worker_concurrency: parse_env("MOTION3D_WORKER_CONCURRENCY", 2),
            max_frames: parse_env("MOTION3D_MAX_FRAMES", 100),
            output_fps: parse_env("MOTION3D_OUTPUT_FPS", 25),
            task_ttl_secs: std::env::var("MOTION3D_TASK_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
            max_upload_size_mb: parse_env("MOTION3D_MAX_UPLOAD_SIZE_MB", 100),
            log_level: env_or("MOTION3D_LOG", "info"),
            log_json: std::env::var("MOTION3D_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cors_allowed_origins: std::env::var("MOTION3D_CORS_ORIGINS").ok(),
            enable_swagger: std::env::var("MOTION3D_ENABLE_SWAGGER")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
