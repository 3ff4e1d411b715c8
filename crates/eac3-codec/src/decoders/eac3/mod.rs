//! E-AC-3 (Dolby Digital Plus) 帧解码器.
//!
//! 将一个独立子流的压缩帧解码为各块各声道的定点频域系数 (2^24 定标的尾数
//! 按指数右移), 供后续的逆 MDCT 与加窗使用.
//!
//! 外部协作者通过 trait 注入:
//! - [`BitAllocator`]: AC-3 参数化比特分配 (PSD, 掩蔽曲线, bap)
//! - [`VqCodebook`]: AHT 矢量量化码本
//!
//! 每帧先在状态副本上解码, 整帧成功后才提交; 失败的帧不会留下部分更新.

mod aht;
pub mod bit_alloc;
mod block;
mod coupling;
mod dither;
pub mod exponents;
pub mod header;
mod idct;
mod mantissa;
mod rematrix;
mod spx;
mod state;
pub mod sync;
pub mod tables;

use log::debug;

use eac3_core::bitreader::BitReader;
use eac3_core::{Eac3Error, Eac3Result};

use crate::config::DecoderConfig;

pub use aht::VqCodebook;
pub use bit_alloc::{BapTable, BitAllocParams, BitAllocator, DeltaBitAlloc, DbaMode};
pub use block::{ChannelCoefficients, DecodedBlock, dynamic_range_gain};
pub use header::{FrameHeader, SyntaxFlags};
pub use sync::{ChannelMode, FrameType, SyncInfo};

use block::BlockContext;
use state::DecoderState;

/// 一帧的解码结果
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub header: FrameHeader,
    pub blocks: Vec<DecodedBlock>,
    /// 帧内已消费的位数 (含同步信息)
    pub bits_consumed: usize,
}

impl DecodedFrame {
    pub fn sync(&self) -> &SyncInfo {
        &self.header.sync
    }
}

/// E-AC-3 解码器
pub struct Eac3Decoder {
    config: DecoderConfig,
    allocator: Box<dyn BitAllocator + Send>,
    codebook: Box<dyn VqCodebook + Send>,
    state: Box<DecoderState>,
    frames_decoded: u64,
}

impl Eac3Decoder {
    /// 创建解码器 (同时初始化派生表)
    pub fn new(
        config: DecoderConfig,
        allocator: Box<dyn BitAllocator + Send>,
        codebook: Box<dyn VqCodebook + Send>,
    ) -> Self {
        tables::init_tables();
        let state = Box::new(DecoderState::new(config.dither_seed));
        Self {
            config,
            allocator,
            codebook,
            state,
            frames_decoded: 0,
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// 成功解码的帧数
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// 丢弃全部跨帧状态 (例如 seek 之后)
    pub fn reset(&mut self) {
        self.state = Box::new(DecoderState::new(self.config.dither_seed));
    }

    /// 解码 `data` 开头的一帧
    ///
    /// `data` 可以比帧长; 帧长超过 `data` 时返回 `Bitstream` 错误.
    pub fn decode_frame(&mut self, data: &[u8]) -> Eac3Result<DecodedFrame> {
        let sync = SyncInfo::parse(&mut BitReader::new(data))?;
        if sync.frame_size > data.len() {
            return Err(Eac3Error::Bitstream(format!(
                "帧长 {} 超过可用数据 {}",
                sync.frame_size,
                data.len()
            )));
        }

        let mut br = BitReader::new(&data[..sync.frame_size]);
        br.skip_bits(40)?;
        let header = FrameHeader::parse(&mut br, sync)?;

        let mut staging = self.state.clone();
        staging.begin_frame(&header);

        let ctx = BlockContext {
            header: &header,
            config: &self.config,
            allocator: self.allocator.as_ref(),
            codebook: self.codebook.as_ref(),
        };
        let mut blocks = Vec::with_capacity(header.num_blocks());
        for blk in 0..header.num_blocks() {
            blocks.push(block::decode_block(&mut br, &ctx, &mut staging, blk)?);
        }

        self.state = staging;
        self.frames_decoded += 1;
        debug!(
            "E-AC-3: 帧 #{} 解码完成, {} Hz, {} 块, {} 声道, {} 位",
            self.frames_decoded,
            header.sync.sample_rate,
            header.num_blocks(),
            header.channels(),
            br.bits_read()
        );

        Ok(DecodedFrame {
            header,
            blocks,
            bits_consumed: br.bits_read(),
        })
    }
}
