use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dxfview_core::document::EntityKind;
use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "DXFVIEW_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `DXFVIEW_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// HTTP 服务配置。
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    /// 浏览器端静态资源目录，缺省为 `public`；目录不存在时不挂载。
    #[serde(default = "ServerConfig::default_static_dir")]
    pub static_dir: Option<PathBuf>,
    #[serde(default = "ServerConfig::default_cors")]
    pub cors: bool,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        3000
    }

    fn default_static_dir() -> Option<PathBuf> {
        Some(PathBuf::from("public"))
    }

    fn default_cors() -> bool {
        true
    }

    /// `host:port` 形式的监听地址。
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            static_dir: Self::default_static_dir(),
            cors: Self::default_cors(),
        }
    }
}

/// 图纸目录与过滤规则。
#[derive(Debug, Clone, Deserialize)]
pub struct LibraryConfig {
    #[serde(default = "LibraryConfig::default_root")]
    pub root: PathBuf,
    /// 不含点号的扩展名，匹配时忽略大小写。
    #[serde(default = "LibraryConfig::default_extension")]
    pub extension: String,
    /// 顶层实体保留的类别；为空表示不过滤。
    #[serde(default = "LibraryConfig::default_top_level_kinds")]
    pub top_level_kinds: Vec<EntityKind>,
}

impl LibraryConfig {
    fn default_root() -> PathBuf {
        PathBuf::from("_dxf")
    }

    fn default_extension() -> String {
        "dxf".to_string()
    }

    fn default_top_level_kinds() -> Vec<EntityKind> {
        vec![EntityKind::Insert]
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            extension: Self::default_extension(),
            top_level_kinds: Self::default_top_level_kinds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "ExportConfig::default_file_name")]
    pub file_name: String,
}

impl ExportConfig {
    fn default_file_name() -> String {
        "filtered.dxf".to_string()
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: Self::default_file_name(),
        }
    }
}

/// 预览渲染的默认画布尺寸（像素）。
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "ViewerConfig::default_width")]
    pub width: u32,
    #[serde(default = "ViewerConfig::default_height")]
    pub height: u32,
}

impl ViewerConfig {
    fn default_width() -> u32 {
        1024
    }

    fn default_height() -> u32 {
        768
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
