//! 应用配置: 解码器开关与日志设置, 以 JSON 文件承载.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use eac3_codec::DecoderConfig;

use crate::logging::LoggingConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// 从 JSON 字符串解析, 缺省字段取默认值
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("解析配置 JSON 失败")
    }

    /// 读取并解析配置文件
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败, path={}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("配置文件格式错误, path={}", path.display()))
    }
}
