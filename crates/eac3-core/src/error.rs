//! 统一错误类型定义.
//!
//! 解码过程中的失败分为两类: 可跳过的 "不支持的特性" (丢弃当前帧即可),
//! 以及码流本身非法导致的帧级致命错误.

use thiserror::Error;

/// E-AC-3 解码统一错误类型
#[derive(Debug, Error)]
pub enum Eac3Error {
    /// 码流使用了当前实现未支持的特性, 调用方可以跳过该帧
    #[error("不支持的特性: {0}")]
    UnsupportedFeature(String),

    /// 码流内容非法 (保留值, 越界参数, 缺失的必需字段等)
    #[error("码流错误: {0}")]
    Bitstream(String),

    /// 读取超出帧缓冲区
    #[error("数据不足, 比特流已耗尽")]
    Eof,

    /// 无效参数 (调用方误用 API)
    #[error("无效参数: {0}")]
    InvalidArgument(String),
}

impl Eac3Error {
    /// 是否为可跳过的错误 (不支持的特性)
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedFeature(_))
    }

    /// 是否为码流错误 (包括读取越界)
    pub fn is_bitstream(&self) -> bool {
        matches!(self, Self::Bitstream(_) | Self::Eof)
    }
}

/// E-AC-3 解码统一 Result 类型
pub type Eac3Result<T> = Result<T, Eac3Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Eac3Error::UnsupportedFeature("spx".into()).is_unsupported());
        assert!(!Eac3Error::UnsupportedFeature("spx".into()).is_bitstream());
        assert!(Eac3Error::Bitstream("保留帧类型".into()).is_bitstream());
        assert!(Eac3Error::Eof.is_bitstream());
        assert!(!Eac3Error::InvalidArgument("n=33".into()).is_bitstream());
    }

    #[test]
    fn test_error_message() {
        let err = Eac3Error::Bitstream("带宽码 61 超过上限 60".into());
        assert_eq!(err.to_string(), "码流错误: 带宽码 61 超过上限 60");
    }
}
