use std::path::PathBuf;

pub const DEFAULT_ADMIN_PASSWORD: &str = "125690";

pub const ENV_WORKSPACE: &str = "QUIZD_WORKSPACE";
pub const ENV_ADMIN_PASSWORD: &str = "QUIZD_ADMIN_PASSWORD";
pub const ENV_REPORT_TEMPLATE: &str = "QUIZD_REPORT_TEMPLATE";
pub const ENV_REPORT_FONT: &str = "QUIZD_REPORT_FONT";

#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub admin_password: String,
    pub report_template: Option<PathBuf>,
    pub report_font: Option<PathBuf>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Config {
    /// Reads the process environment, after a `.env` file if one exists.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("loaded {}", path.display());
        }
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            workspace: non_empty(get(ENV_WORKSPACE)).map(PathBuf::from),
            admin_password: non_empty(get(ENV_ADMIN_PASSWORD))
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
            report_template: non_empty(get(ENV_REPORT_TEMPLATE)).map(PathBuf::from),
            report_font: non_empty(get(ENV_REPORT_FONT)).map(PathBuf::from),
        }
    }
}
