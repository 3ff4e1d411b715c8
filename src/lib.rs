//! # eac3
//!
//! 纯 Rust 实现的 E-AC-3 (Dolby Digital Plus) 帧解码核心.
//!
//! 把一个独立子流的压缩帧解码为各块各声道的定点频域系数. 逆 MDCT, 加窗,
//! 下混与 PCM 输出不在本库范围内.
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `eac3-core` | 比特流读写与错误类型 |
//! | `eac3-codec` | 帧头, 音频块语法与系数重建 |

/// 比特流读写与错误类型
pub use eac3_core as core;

/// 帧解码器
pub use eac3_codec as codec;

pub mod config;
pub mod logging;

pub use config::Config;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 按配置创建解码器
pub fn create_decoder(
    config: &Config,
    allocator: Box<dyn codec::BitAllocator + Send>,
    codebook: Box<dyn codec::VqCodebook + Send>,
) -> codec::Eac3Decoder {
    tracing::debug!(
        "创建 E-AC-3 解码器: 频谱扩展={}, 增强耦合={}",
        config.decoder.enable_spectral_extension,
        config.decoder.enable_enhanced_coupling
    );
    codec::Eac3Decoder::new(config.decoder.clone(), allocator, codebook)
}
