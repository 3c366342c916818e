use anyhow::{Context, Result};

use memo_sync::config::{AppConfig, ConfigScope};

use super::{Session, Target};
use crate::ui::Output;

/// 显式初始化：写入默认配置并打开存储
pub async fn initialize(target: &Target) -> Result<()> {
    let output = Output::new();

    // init 没有 Auto：未指定 --local 时初始化全局配置
    let scope = match target.scope {
        ConfigScope::Local => ConfigScope::Local,
        _ => ConfigScope::Global,
    };
    let config_path = AppConfig::config_path(scope);

    if config_path.exists() {
        output.resource_action("Found", "config", &config_path);
    } else {
        let mut config = AppConfig::default();
        if scope == ConfigScope::Local {
            config.data_dir = Some(AppConfig::local_config_dir().join("data"));
        }
        config
            .save_to(&config_path)
            .with_context(|| format!("Failed to initialize {}", config_path.display()))?;
        output.resource_action("Creating", "config", &config_path);
    }

    let session = Session::open(&Target {
        scope,
        user: target.user.clone(),
    })
    .await?;
    let config = AppConfig::load(scope)?;
    output.resource_action("Using", "data directory", &config.data_dir());
    eprintln!();
    session.show_info(&output).await?;

    if !config.cloud.enabled {
        output.note("cloud sync is off, set [cloud] enabled/project in the config to turn it on");
    }

    output.finish("initialization", session.scope);
    Ok(())
}
