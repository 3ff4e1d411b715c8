//! # eac3-codec
//!
//! E-AC-3 (Dolby Digital Plus) 帧解码核心.
//!
//! 覆盖从同步信息到定点频域系数的全部语法层: 帧头, 音频块, 标准/增强耦合,
//! 频谱扩展语法, 重矩阵化, AC-3 尾数, AHT/GAQ 尾数与 6 点 IDCT 重建.
//! 比特分配引擎与 AHT 矢量量化码本由调用方通过 trait 提供.
//!
//! ## 使用示例
//!
//! ```rust
//! use eac3_codec::SyncInfo;
//! use eac3_core::BitReader;
//!
//! // 48 kHz, 6 块, 2/0, 帧长 256 字节
//! let data = [0x0B, 0x77, 0x00, 0x7F, 0x34, 0x00];
//! let sync = SyncInfo::parse(&mut BitReader::new(&data)).unwrap();
//! assert_eq!(sync.sample_rate, 48000);
//! assert_eq!(sync.num_blocks, 6);
//! assert_eq!(sync.frame_size, 256);
//! ```

pub mod config;
pub mod decoders;

// 重导出常用类型
pub use config::DecoderConfig;
pub use decoders::eac3::{
    BapTable, BitAllocParams, BitAllocator, ChannelCoefficients, DecodedBlock, DecodedFrame,
    DeltaBitAlloc, Eac3Decoder, FrameHeader, SyncInfo, VqCodebook,
};
pub use decoders::eac3::tables::init_tables;
