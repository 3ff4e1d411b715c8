//! E-AC-3 同步信息解析.
//!
//! 帧起始 40 位: 同步字, 流类型, 子流 ID, 帧长, 采样率, 块数, 声道模式与 LFE.

use eac3_core::bitreader::BitReader;
use eac3_core::{Eac3Error, Eac3Result};

use super::tables::{BLOCKS_PER_FRAME, FBW_CHANNELS, SAMPLE_RATES, SYNC_WORD};

/// 帧类型 (strmtyp)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// 独立帧
    Independent,
    /// 依赖帧 (扩展声道)
    Dependent,
    /// 由 AC-3 转换而来的独立帧
    Ac3Convert,
    /// 保留
    Reserved,
}

impl FrameType {
    fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Independent,
            1 => Self::Dependent,
            2 => Self::Ac3Convert,
            _ => Self::Reserved,
        }
    }
}

/// 声道模式 (acmod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// 1+1 双单声道
    DualMono,
    /// 1/0
    Mono,
    /// 2/0
    Stereo,
    /// 3/0
    ThreeFront,
    /// 2/1
    TwoOne,
    /// 3/1
    ThreeOne,
    /// 2/2
    TwoTwo,
    /// 3/2
    ThreeTwo,
}

impl ChannelMode {
    fn from_code(code: u32) -> Self {
        match code & 7 {
            0 => Self::DualMono,
            1 => Self::Mono,
            2 => Self::Stereo,
            3 => Self::ThreeFront,
            4 => Self::TwoOne,
            5 => Self::ThreeOne,
            6 => Self::TwoTwo,
            _ => Self::ThreeTwo,
        }
    }

    /// 原始 acmod 值
    pub fn code(self) -> u8 {
        self as u8
    }

    /// 全带宽声道数
    pub fn fbw_channels(self) -> usize {
        FBW_CHANNELS[self as usize]
    }

    /// 是否存在中置声道
    pub fn has_center(self) -> bool {
        self.code() & 1 != 0 && self.code() > 2
    }

    /// 是否存在环绕声道
    pub fn has_surround(self) -> bool {
        self.code() & 4 != 0
    }
}

/// 同步信息
#[derive(Debug, Clone)]
pub struct SyncInfo {
    pub frame_type: FrameType,
    pub substream_id: u8,
    /// 帧长 (字节, 含同步字)
    pub frame_size: usize,
    /// 采样率码 (fscod), 3 表示降采样率
    pub sr_code: u8,
    /// 降采样率时的 fscod2
    pub sr_code2: u8,
    pub sample_rate: u32,
    /// 每帧音频块数
    pub num_blocks: usize,
    pub channel_mode: ChannelMode,
    pub lfe_on: bool,
}

impl SyncInfo {
    /// 解析同步信息, 读取器需位于帧起点
    pub fn parse(br: &mut BitReader) -> Eac3Result<Self> {
        let sync = br.read_bits(16)?;
        if sync != SYNC_WORD {
            return Err(Eac3Error::Bitstream(format!(
                "无效同步字: 0x{sync:04X}"
            )));
        }

        let frame_type = FrameType::from_code(br.read_bits(2)?);
        let substream_id = br.read_bits(3)? as u8;
        let frame_size = (br.read_bits(11)? as usize + 1) * 2;

        let sr_code = br.read_bits(2)? as u8;
        let (sr_code2, sample_rate, num_blocks) = if sr_code == 3 {
            let sr_code2 = br.read_bits(2)? as u8;
            if sr_code2 == 3 {
                return Err(Eac3Error::Bitstream("保留的降采样率码 fscod2=3".into()));
            }
            (sr_code2, SAMPLE_RATES[sr_code2 as usize] / 2, 6)
        } else {
            let num_blocks = BLOCKS_PER_FRAME[br.read_bits(2)? as usize];
            (0, SAMPLE_RATES[sr_code as usize], num_blocks)
        };

        let channel_mode = ChannelMode::from_code(br.read_bits(3)?);
        let lfe_on = br.read_flag()?;

        Ok(Self {
            frame_type,
            substream_id,
            frame_size,
            sr_code,
            sr_code2,
            sample_rate,
            num_blocks,
            channel_mode,
            lfe_on,
        })
    }

    /// 是否为降采样率帧
    pub fn is_reduced_rate(&self) -> bool {
        self.sr_code == 3
    }

    /// 全带宽声道数
    pub fn fbw_channels(&self) -> usize {
        self.channel_mode.fbw_channels()
    }

    /// 声道槽位总数 (不含耦合伪声道, 含 LFE)
    pub fn channels(&self) -> usize {
        self.fbw_channels() + usize::from(self.lfe_on)
    }

    /// LFE 声道索引
    pub fn lfe_channel(&self) -> Option<usize> {
        self.lfe_on.then(|| self.fbw_channels() + 1)
    }
}
