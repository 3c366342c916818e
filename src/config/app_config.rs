use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engines::Platform;

const CONFIG_DIR_NAME: &str = ".memo-sync";
const CONFIG_FILE_NAME: &str = "config.toml";

/// 配置作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Auto,
    Local,
    Global,
}

/// 本地引擎选择（auto 时按运行平台检测）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformChoice {
    #[default]
    Auto,
    Browser,
    Native,
}

impl PlatformChoice {
    pub fn resolve(self) -> Platform {
        match self {
            PlatformChoice::Auto => Platform::detect(),
            PlatformChoice::Browser => Platform::Browser,
            PlatformChoice::Native => Platform::Native,
        }
    }
}

/// 云端同步配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CloudConfig {
    /// 是否启用云端引擎（默认: false）
    #[serde(default)]
    pub enabled: bool,

    /// 文档库项目 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// 登录用户 ID（可被 --user / MEMO_USER 覆盖）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// 应用配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 数据目录（可选，默认: ~/.memo-sync/data 或 ./.memo-sync/data）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// 本地引擎平台（auto | browser | native）
    #[serde(default)]
    pub platform: PlatformChoice,

    #[serde(default)]
    pub cloud: CloudConfig,
}

impl AppConfig {
    /// 全局配置目录：~/.memo-sync/
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
    }

    /// 本地配置目录：./.memo-sync/
    pub fn local_config_dir() -> PathBuf {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(CONFIG_DIR_NAME)
    }

    /// 检查本地配置是否存在
    /// 注意：如果当前目录是用户主目录，则不认为是本地配置
    pub fn has_local_config() -> bool {
        let current_dir = match std::env::current_dir() {
            Ok(dir) => dir,
            Err(_) => return false,
        };

        if let Some(home) = dirs::home_dir() {
            let current_canonical = current_dir.canonicalize().unwrap_or(current_dir.clone());
            let home_canonical = home.canonicalize().unwrap_or(home);

            if current_canonical == home_canonical {
                return false;
            }
        }

        Self::local_config_dir().join(CONFIG_FILE_NAME).exists()
    }

    /// 验证作用域标志（不能同时指定 local 和 global）
    pub fn validate_scope_flags(local: bool, global: bool) -> Result<()> {
        if local && global {
            anyhow::bail!("Cannot specify both --local and --global, please choose one");
        }
        Ok(())
    }

    pub fn scope_from_flags(force_local: bool, force_global: bool) -> ConfigScope {
        if force_local {
            ConfigScope::Local
        } else if force_global {
            ConfigScope::Global
        } else {
            ConfigScope::Auto
        }
    }

    /// Auto 作用域落到具体的 Local / Global
    pub fn resolve_scope(scope: ConfigScope) -> ConfigScope {
        match scope {
            ConfigScope::Auto if Self::has_local_config() => ConfigScope::Local,
            ConfigScope::Auto => ConfigScope::Global,
            other => other,
        }
    }

    /// 返回 "local" 或 "global"
    pub fn scope_name(scope: ConfigScope) -> &'static str {
        match Self::resolve_scope(scope) {
            ConfigScope::Local => "local",
            _ => "global",
        }
    }

    pub fn config_dir(scope: ConfigScope) -> PathBuf {
        match Self::resolve_scope(scope) {
            ConfigScope::Local => Self::local_config_dir(),
            _ => Self::global_config_dir(),
        }
    }

    pub fn config_path(scope: ConfigScope) -> PathBuf {
        Self::config_dir(scope).join(CONFIG_FILE_NAME)
    }

    /// 加载配置：
    /// - Local: 强制使用本地配置
    /// - Global: 强制使用全局配置
    /// - Auto: 优先本地配置，其次全局配置
    ///
    /// 配置文件不存在时返回默认配置
    pub fn load(scope: ConfigScope) -> Result<Self> {
        let scope = Self::resolve_scope(scope);
        let path = Self::config_path(scope);

        let mut config = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };

        // 本地配置未指定数据目录时使用本地目录
        if scope == ConfigScope::Local && config.data_dir.is_none() {
            config.data_dir = Some(Self::local_config_dir().join("data"));
        }
        Ok(config)
    }

    /// 从指定路径加载配置文件
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        tracing::debug!("Loaded app config from: {}", path.display());
        tracing::debug!("Platform: {:?}, cloud enabled: {}", config.platform, config.cloud.enabled);

        Ok(config)
    }

    /// 数据目录
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| Self::global_config_dir().join("data"))
    }

    /// 旧版数据所在目录
    pub fn legacy_dir(&self) -> PathBuf {
        self.data_dir().join("legacy")
    }

    /// 确保数据目录存在
    pub fn ensure_dirs(&self) -> Result<()> {
        let data_dir = self.data_dir();
        std::fs::create_dir_all(&data_dir).with_context(|| {
            format!("Failed to create data directory: {}", data_dir.display())
        })?;
        Ok(())
    }

    /// 保存配置到指定路径
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
