//! 配置加载：内置默认值 -> 配置文件 -> 环境变量

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_PATH_VAR: &str = "INFOBOOK_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub bind: SocketAddr,
    pub output_dir: PathBuf,
    /// 栅格化时每 pt 的像素数
    pub dpi_scale: f32,
    pub render_timeout_secs: u64,
    pub max_concurrent_renders: usize,
    pub public_base_url: String,
    pub default_locale: String,
    pub restrict_custom_html: bool,
    /// 本地图片路径只能在此目录内解析；未设置时拒绝本地路径
    pub asset_dir: Option<PathBuf>,
}

fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::desktop_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 18088)),
            output_dir: default_output_dir(),
            dpi_scale: 2.0,
            render_timeout_secs: 60,
            max_concurrent_renders: 2,
            public_base_url: "http://localhost:18088/p".to_string(),
            default_locale: "en".to_string(),
            restrict_custom_html: true,
            asset_dir: None,
        }
    }
}

impl Config {
    /// 默认值，然后是配置文件 (如果存在)，最后是环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|d| d.join("infobook").join("config.json")));
        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(&p)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dpi_scale > 0.0 && self.dpi_scale.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "dpiScale",
                reason: format!("must be a positive number, got {}", self.dpi_scale),
            });
        }
        if self.render_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "renderTimeoutSecs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_concurrent_renders == 0 {
            return Err(ConfigError::Invalid {
                field: "maxConcurrentRenders",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// 应用通过 `get` 读取的 `INFOBOOK_*` 覆盖项
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = get("INFOBOOK_BIND") {
            self.bind = parse("INFOBOOK_BIND", v)?;
        }
        if let Some(v) = get("INFOBOOK_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("INFOBOOK_DPI_SCALE") {
            self.dpi_scale = parse("INFOBOOK_DPI_SCALE", v)?;
        }
        if let Some(v) = get("INFOBOOK_RENDER_TIMEOUT_SECS") {
            self.render_timeout_secs = parse("INFOBOOK_RENDER_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = get("INFOBOOK_MAX_RENDERS") {
            self.max_concurrent_renders = parse("INFOBOOK_MAX_RENDERS", v)?;
        }
        if let Some(v) = get("INFOBOOK_PUBLIC_BASE_URL") {
            self.public_base_url = v;
        }
        if let Some(v) = get("INFOBOOK_LOCALE") {
            self.default_locale = v;
        }
        if let Some(v) = get("INFOBOOK_RESTRICT_CUSTOM_HTML") {
            self.restrict_custom_html = parse("INFOBOOK_RESTRICT_CUSTOM_HTML", v)?;
        }
        if let Some(v) = get("INFOBOOK_ASSET_DIR") {
            self.asset_dir = Some(PathBuf::from(v)).filter(|p| !p.as_os_str().is_empty());
        }
        self.validate()
    }
}

fn parse<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}
