//! E-AC-3 帧头解析: 比特流信息 (bsi) 与音频帧 (audfrm) 元素.
//!
//! 产出 [`FrameHeader`], 其中包含整帧不变的语法开关, 各块的耦合策略与指数策略,
//! 以及 AHT 启用情况. 后续的音频块解析以它为只读输入.

use bitflags::bitflags;
use log::warn;

use eac3_core::bitreader::BitReader;
use eac3_core::{Eac3Error, Eac3Result};

use super::exponents::ExpStrategy;
use super::sync::{ChannelMode, FrameType, SyncInfo};
use super::tables::{CPL_CH, FRAME_EXP_STRATEGIES, MAX_BLOCKS, MAX_CHANNELS};

bitflags! {
    /// 音频帧级语法开关
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SyntaxFlags: u16 {
        /// 每块显式传输指数策略 (expstre)
        const EXP_STRATEGY = 1 << 0;
        /// 自适应混合变换 (ahte)
        const AHT = 1 << 1;
        /// 瞬态预噪声处理 (transproce)
        const TRANSIENT_PROC = 1 << 2;
        /// 块切换标志 (blkswe)
        const BLOCK_SWITCH = 1 << 3;
        /// 抖动标志 (dithflage)
        const DITHER = 1 << 4;
        /// 比特分配参数 (bamode)
        const BIT_ALLOC = 1 << 5;
        /// 快增益 (frmfgaincode)
        const FAST_GAIN = 1 << 6;
        /// 增量比特分配 (dbaflde)
        const DELTA_BIT_ALLOC = 1 << 7;
        /// 跳过字段 (skipflde)
        const SKIP = 1 << 8;
        /// 频谱扩展衰减 (spxattene)
        const SPX_ATTEN = 1 << 9;
    }
}

/// 混音元数据
#[derive(Debug, Clone, Copy, Default)]
pub struct MixMetadata {
    pub preferred_downmix: Option<u8>,
    pub ltrt_center_mix: Option<u8>,
    pub loro_center_mix: Option<u8>,
    pub ltrt_surround_mix: Option<u8>,
    pub loro_surround_mix: Option<u8>,
    pub lfe_mix_level: Option<u8>,
}

/// 帧头 (bsi + audfrm)
#[derive(Debug, Clone)]
pub struct FrameHeader {
    pub sync: SyncInfo,
    /// 节目数 (双单声道为 2)
    pub num_programs: usize,
    pub dialnorm: [u8; 2],
    pub compression: [Option<u8>; 2],
    pub mix: MixMetadata,
    /// 码流模式 (bsmod), 仅在携带信息元数据时存在
    pub bitstream_mode: Option<u8>,

    pub syntax: SyntaxFlags,
    /// SNR 偏移策略 (snroffststr)
    pub snr_offset_strategy: u8,
    /// snroffststr == 0 时整帧共用的 SNR 偏移
    pub frame_snr_offset: Option<i32>,

    pub cpl_strategy_exists: [bool; MAX_BLOCKS],
    pub cpl_in_use: [bool; MAX_BLOCKS],
    pub num_cpl_blocks: usize,
    /// 按 [块][声道] 的指数策略
    pub exp_strategy: [[ExpStrategy; MAX_CHANNELS]; MAX_BLOCKS],
    pub channel_uses_aht: [bool; MAX_CHANNELS],
    /// 频谱扩展衰减码 (按声道)
    pub spx_atten: [Option<u8>; MAX_CHANNELS],
}

impl FrameHeader {
    /// 在同步信息之后解析 bsi 与 audfrm
    pub fn parse(br: &mut BitReader, sync: SyncInfo) -> Eac3Result<Self> {
        match sync.frame_type {
            FrameType::Dependent => {
                warn!("E-AC-3: 依赖子流尚未实现");
                return Err(Eac3Error::UnsupportedFeature("依赖子流".into()));
            }
            FrameType::Reserved => {
                return Err(Eac3Error::Bitstream("保留的帧类型".into()));
            }
            FrameType::Independent | FrameType::Ac3Convert => {}
        }
        if sync.substream_id != 0 {
            warn!("E-AC-3: 跳过附加子流 {}", sync.substream_id);
            return Err(Eac3Error::UnsupportedFeature(format!(
                "附加子流 {}",
                sync.substream_id
            )));
        }
        if sync.is_reduced_rate() {
            warn!("E-AC-3: 降采样率尚未实现");
            return Err(Eac3Error::UnsupportedFeature("降采样率".into()));
        }

        let mut header = Self {
            num_programs: if sync.channel_mode == ChannelMode::DualMono { 2 } else { 1 },
            sync,
            dialnorm: [0; 2],
            compression: [None; 2],
            mix: MixMetadata::default(),
            bitstream_mode: None,
            syntax: SyntaxFlags::empty(),
            snr_offset_strategy: 0,
            frame_snr_offset: None,
            cpl_strategy_exists: [false; MAX_BLOCKS],
            cpl_in_use: [false; MAX_BLOCKS],
            num_cpl_blocks: 0,
            exp_strategy: [[ExpStrategy::Reuse; MAX_CHANNELS]; MAX_BLOCKS],
            channel_uses_aht: [false; MAX_CHANNELS],
            spx_atten: [None; MAX_CHANNELS],
        };
        header.parse_bsi(br)?;
        header.parse_audfrm(br)?;
        Ok(header)
    }

    /// 每帧音频块数
    pub fn num_blocks(&self) -> usize {
        self.sync.num_blocks
    }

    /// 全带宽声道数
    pub fn fbw_channels(&self) -> usize {
        self.sync.fbw_channels()
    }

    /// 最后一个声道索引 (含 LFE)
    pub fn channels(&self) -> usize {
        self.sync.channels()
    }

    fn parse_bsi(&mut self, br: &mut BitReader) -> Eac3Result<()> {
        let acmod = self.sync.channel_mode.code();
        let num_blocks = self.num_blocks();

        // bsid
        br.skip_bits(5)?;

        for i in 0..self.num_programs {
            self.dialnorm[i] = br.read_bits(5)? as u8;
            if br.read_flag()? {
                self.compression[i] = Some(br.read_bits(8)? as u8);
            }
        }

        // 混音元数据
        if br.read_flag()? {
            if acmod > 2 {
                self.mix.preferred_downmix = Some(br.read_bits(2)? as u8);
                if self.sync.channel_mode.has_center() {
                    self.mix.ltrt_center_mix = Some(br.read_bits(3)? as u8);
                    self.mix.loro_center_mix = Some(br.read_bits(3)? as u8);
                }
                if self.sync.channel_mode.has_surround() {
                    self.mix.ltrt_surround_mix = Some(br.read_bits(3)? as u8);
                    self.mix.loro_surround_mix = Some(br.read_bits(3)? as u8);
                }
            }
            if self.sync.lfe_on && br.read_flag()? {
                self.mix.lfe_mix_level = Some(br.read_bits(5)? as u8);
            }
            if self.sync.frame_type == FrameType::Independent {
                // 节目缩放因子
                for _ in 0..self.num_programs {
                    if br.read_flag()? {
                        br.skip_bits(6)?;
                    }
                }
                // 外部节目缩放因子
                if br.read_flag()? {
                    br.skip_bits(6)?;
                }
                match br.read_bits(2)? {
                    1 => br.skip_bits(5)?,
                    2 => br.skip_bits(12)?,
                    3 => {
                        let len = (br.read_bits(5)? as usize + 2) * 8;
                        br.skip_bits(len)?;
                    }
                    _ => {}
                }
                // 单声道 / 双单声道的声像信息
                if acmod < 2 {
                    for _ in 0..self.num_programs {
                        if br.read_flag()? {
                            br.skip_bits(8 + 6)?;
                        }
                    }
                }
                // 每块的混音配置
                if br.read_flag()? {
                    if num_blocks == 1 {
                        br.skip_bits(5)?;
                    } else {
                        for _ in 0..num_blocks {
                            if br.read_flag()? {
                                br.skip_bits(5)?;
                            }
                        }
                    }
                }
            }
        }

        // 信息元数据
        if br.read_flag()? {
            self.bitstream_mode = Some(br.read_bits(3)? as u8);
            // copyright, original
            br.skip_bits(2)?;
            if acmod == 2 {
                // dsurmod, dheadphonmod
                br.skip_bits(4)?;
            }
            if acmod >= 6 {
                // dsurexmod
                br.skip_bits(2)?;
            }
            for _ in 0..self.num_programs {
                if br.read_flag()? {
                    br.skip_bits(8)?;
                }
            }
            if !self.sync.is_reduced_rate() {
                // sourcefscod
                br.skip_bits(1)?;
            }
        }

        // convsync
        if self.sync.frame_type == FrameType::Independent && num_blocks != 6 {
            br.skip_bits(1)?;
        }

        // 原始 AC-3 帧长码
        if self.sync.frame_type == FrameType::Ac3Convert && (num_blocks == 6 || br.read_flag()?) {
            br.skip_bits(6)?;
        }

        // 附加 bsi
        if br.read_flag()? {
            let len = (br.read_bits(6)? as usize + 1) * 8;
            br.skip_bits(len)?;
        }

        Ok(())
    }

    fn parse_audfrm(&mut self, br: &mut BitReader) -> Eac3Result<()> {
        let num_blocks = self.num_blocks();
        let fbw = self.fbw_channels();
        let channels = self.channels();

        let mut syntax = SyntaxFlags::empty();
        if num_blocks == 6 {
            syntax.set(SyntaxFlags::EXP_STRATEGY, br.read_flag()?);
            syntax.set(SyntaxFlags::AHT, br.read_flag()?);
        } else {
            syntax.insert(SyntaxFlags::EXP_STRATEGY);
        }
        self.snr_offset_strategy = br.read_bits(2)? as u8;
        for flag in [
            SyntaxFlags::TRANSIENT_PROC,
            SyntaxFlags::BLOCK_SWITCH,
            SyntaxFlags::DITHER,
            SyntaxFlags::BIT_ALLOC,
            SyntaxFlags::FAST_GAIN,
            SyntaxFlags::DELTA_BIT_ALLOC,
            SyntaxFlags::SKIP,
            SyntaxFlags::SPX_ATTEN,
        ] {
            syntax.set(flag, br.read_flag()?);
        }
        self.syntax = syntax;

        // 耦合策略
        if self.sync.channel_mode.code() > 1 {
            for blk in 0..num_blocks {
                self.cpl_strategy_exists[blk] = blk == 0 || br.read_flag()?;
                self.cpl_in_use[blk] = if self.cpl_strategy_exists[blk] {
                    br.read_flag()?
                } else {
                    self.cpl_in_use[blk - 1]
                };
            }
        }
        self.num_cpl_blocks = self.cpl_in_use[..num_blocks].iter().filter(|&&c| c).count();

        // 指数策略
        if syntax.contains(SyntaxFlags::EXP_STRATEGY) {
            for blk in 0..num_blocks {
                let first = usize::from(!self.cpl_in_use[blk]);
                for ch in first..=fbw {
                    self.exp_strategy[blk][ch] = ExpStrategy::from_code(br.read_bits(2)?);
                }
            }
        } else {
            let first = usize::from(!(self.sync.channel_mode.code() > 1 && self.num_cpl_blocks > 0));
            for ch in first..=fbw {
                let combo = &FRAME_EXP_STRATEGIES[br.read_bits(5)? as usize];
                for blk in 0..6 {
                    self.exp_strategy[blk][ch] = ExpStrategy::from_code(u32::from(combo[blk]));
                }
            }
        }
        if let Some(lfe) = self.sync.lfe_channel() {
            for blk in 0..num_blocks {
                self.exp_strategy[blk][lfe] = if br.read_flag()? {
                    ExpStrategy::D15
                } else {
                    ExpStrategy::Reuse
                };
            }
        }

        // 转换器指数策略
        if self.sync.frame_type == FrameType::Independent && (num_blocks == 6 || br.read_flag()?) {
            br.skip_bits(5 * fbw)?;
        }

        // AHT: 仅当声道在整帧中恰好只传输一次指数时可启用
        if syntax.contains(SyntaxFlags::AHT) {
            let first = usize::from(self.num_cpl_blocks != 6);
            for ch in first..=channels {
                let regs = (0..6)
                    .filter(|&blk| {
                        if ch == CPL_CH {
                            self.cpl_strategy_exists[blk]
                                || self.exp_strategy[blk][CPL_CH] != ExpStrategy::Reuse
                        } else {
                            self.exp_strategy[blk][ch] != ExpStrategy::Reuse
                        }
                    })
                    .count();
                self.channel_uses_aht[ch] = regs == 1 && br.read_flag()?;
            }
        }

        if self.snr_offset_strategy == 0 {
            let coarse = (br.read_bits(6)? as i32 - 15) << 4;
            self.frame_snr_offset = Some((coarse + br.read_bits(4)? as i32) << 2);
        }

        // 瞬态预噪声处理数据
        if syntax.contains(SyntaxFlags::TRANSIENT_PROC) {
            for _ in 1..=fbw {
                if br.read_flag()? {
                    br.skip_bits(10 + 8)?;
                }
            }
        }

        // 频谱扩展衰减
        if syntax.contains(SyntaxFlags::SPX_ATTEN) {
            for ch in 1..=fbw {
                if br.read_flag()? {
                    self.spx_atten[ch] = Some(br.read_bits(5)? as u8);
                }
            }
        }

        // 块起始信息
        if num_blocks > 1 && br.read_flag()? {
            let size_bits = (self.sync.frame_size - 2).max(1).ilog2() as usize;
            br.skip_bits((num_blocks - 1) * (4 + size_bits))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eac3_core::bitwriter::BitWriter;

    use crate::decoders::eac3::tables::SYNC_WORD;

    fn sync_bits(bw: &mut BitWriter, strmtyp: u32, substream: u32, acmod: u32, numblkscod: u32) {
        bw.write_bits(SYNC_WORD, 16);
        bw.write_bits(strmtyp, 2);
        bw.write_bits(substream, 3);
        bw.write_bits(127, 11);
        bw.write_bits(0, 2);
        bw.write_bits(numblkscod, 2);
        bw.write_bits(acmod, 3);
        bw.write_flag(false);
    }

    fn parse(data: &[u8]) -> Eac3Result<(FrameHeader, usize)> {
        let mut br = BitReader::new(data);
        let sync = SyncInfo::parse(&mut br)?;
        let header = FrameHeader::parse(&mut br, sync)?;
        Ok((header, br.bits_read()))
    }

    /// 最简 bsi: bsid, dialnorm, 无 compr, 无元数据, 无附加 bsi
    fn minimal_bsi(bw: &mut BitWriter, num_blocks: usize) {
        bw.write_bits(16, 5);
        bw.write_bits(27, 5);
        bw.write_flag(false);
        bw.write_flag(false);
        bw.write_flag(false);
        if num_blocks != 6 {
            bw.write_flag(false); // convsync
        }
        bw.write_flag(false);
    }

    #[test]
    fn test_dependent_frame_unsupported() {
        let mut bw = BitWriter::new();
        sync_bits(&mut bw, 1, 0, 2, 3);
        bw.write_zeros(64);
        let err = parse(&bw.finish()).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_reserved_frame_type() {
        let mut bw = BitWriter::new();
        sync_bits(&mut bw, 3, 0, 2, 3);
        bw.write_zeros(64);
        let err = parse(&bw.finish()).unwrap_err();
        assert!(matches!(err, Eac3Error::Bitstream(_)));
    }

    #[test]
    fn test_additional_substream_unsupported() {
        let mut bw = BitWriter::new();
        sync_bits(&mut bw, 0, 2, 2, 3);
        bw.write_zeros(64);
        assert!(parse(&bw.finish()).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_stereo_lut_exponent_strategies() {
        let mut bw = BitWriter::new();
        sync_bits(&mut bw, 0, 0, 2, 3);
        minimal_bsi(&mut bw, 6);
        // audfrm
        bw.write_flag(false); // expstre -> LUT
        bw.write_flag(false); // ahte
        bw.write_bits(0, 2); // snroffststr
        bw.write_bits(0, 8); // transproce..spxattene 全部关闭
        bw.write_flag(false); // blk0: cplinu = 0
        for _ in 1..6 {
            bw.write_flag(false); // cplstre
        }
        bw.write_bits(7, 5); // ch1: D25, reuse, reuse, D45, D45, D45
        bw.write_bits(0, 5); // ch2: D15 然后全部复用
        // 6 块的独立帧直接携带转换器指数策略
        bw.write_bits(0, 10);
        bw.write_bits(20, 6); // csnr
        bw.write_bits(3, 4); // fsnr
        bw.write_flag(false); // blkstrtinfoe
        let expected_bits = bw.bits_written();
        bw.write_zeros(32);

        let (header, consumed) = parse(&bw.finish()).unwrap();
        assert_eq!(consumed, expected_bits);
        assert_eq!(header.num_cpl_blocks, 0);
        assert_eq!(header.exp_strategy[0][1], ExpStrategy::D25);
        assert_eq!(header.exp_strategy[3][1], ExpStrategy::D45);
        assert_eq!(header.exp_strategy[1][1], ExpStrategy::Reuse);
        assert_eq!(header.exp_strategy[0][2], ExpStrategy::D15);
        assert_eq!(header.frame_snr_offset, Some((((20 - 15) << 4) + 3) << 2));
        assert!(!header.syntax.contains(SyntaxFlags::BLOCK_SWITCH));
    }

    #[test]
    fn test_aht_flag_read_only_for_eligible_channels() {
        let mut bw = BitWriter::new();
        sync_bits(&mut bw, 0, 0, 2, 3);
        minimal_bsi(&mut bw, 6);
        bw.write_flag(false); // expstre -> LUT
        bw.write_flag(true); // ahte
        bw.write_bits(1, 2); // snroffststr != 0, 无帧级 SNR
        bw.write_bits(0, 8);
        bw.write_flag(false);
        for _ in 1..6 {
            bw.write_flag(false);
        }
        bw.write_bits(0, 5); // ch1: 仅块 0 传输指数 -> 可启用 AHT
        bw.write_bits(7, 5); // ch2: 4 次传输 -> 不可启用
        bw.write_bits(0, 10);
        bw.write_flag(true); // ch1 chahtinu
        bw.write_flag(false); // blkstrtinfoe
        let expected_bits = bw.bits_written();
        bw.write_zeros(16);

        let (header, consumed) = parse(&bw.finish()).unwrap();
        assert_eq!(consumed, expected_bits);
        assert!(header.channel_uses_aht[1]);
        assert!(!header.channel_uses_aht[2]);
        assert_eq!(header.frame_snr_offset, None);
    }

    #[test]
    fn test_direct_strategies_with_coupling() {
        let mut bw = BitWriter::new();
        sync_bits(&mut bw, 0, 0, 2, 1); // 2 块
        minimal_bsi(&mut bw, 2);
        bw.write_bits(0, 2); // snroffststr
        bw.write_bits(0, 8);
        bw.write_flag(true); // blk0 cplinu
        bw.write_flag(false); // blk1 cplstre -> 沿用
        // blk0: cpl, ch1, ch2
        bw.write_bits(1, 2);
        bw.write_bits(2, 2);
        bw.write_bits(3, 2);
        // blk1
        bw.write_bits(0, 2);
        bw.write_bits(0, 2);
        bw.write_bits(0, 2);
        bw.write_flag(false); // convexpstre
        bw.write_bits(15, 6);
        bw.write_bits(0, 4);
        bw.write_flag(false); // blkstrtinfoe
        let expected_bits = bw.bits_written();
        bw.write_zeros(16);

        let (header, consumed) = parse(&bw.finish()).unwrap();
        assert_eq!(consumed, expected_bits);
        assert_eq!(header.cpl_in_use, [true, true, false, false, false, false]);
        assert_eq!(header.exp_strategy[0][CPL_CH], ExpStrategy::D15);
        assert_eq!(header.exp_strategy[0][2], ExpStrategy::D45);
        assert_eq!(header.frame_snr_offset, Some(0));
    }
}
