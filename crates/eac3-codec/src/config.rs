//! 解码器配置.

use serde::{Deserialize, Serialize};

/// 解码器能力开关与抖动种子
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DecoderConfig {
    /// 是否解析频谱扩展; 关闭时遇到频谱扩展返回 `UnsupportedFeature`
    #[serde(default)]
    pub enable_spectral_extension: bool,
    /// 是否解析增强耦合; 关闭时遇到增强耦合返回 `UnsupportedFeature`
    #[serde(default)]
    pub enable_enhanced_coupling: bool,
    #[serde(default = "default_dither_seed")]
    pub dither_seed: u32,
}

fn default_dither_seed() -> u32 {
    0x1f2e_3d4c
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            enable_spectral_extension: false,
            enable_enhanced_coupling: false,
            dither_seed: default_dither_seed(),
        }
    }
}
