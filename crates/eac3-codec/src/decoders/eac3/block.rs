//! 音频块 (audblk) 解析与系数重建.
//!
//! 顺序: 块切换/抖动 → 动态范围 → 频谱扩展 → 耦合策略与坐标 → 重矩阵化
//! → 指数策略/带宽/指数 → 比特分配参数 → 比特分配 → 尾数 → 解耦合
//! → 带外清零 → 重矩阵化.

use log::trace;

use eac3_core::bitreader::BitReader;
use eac3_core::{Eac3Error, Eac3Result};

use crate::config::DecoderConfig;

use super::aht::{self, VqCodebook};
use super::bit_alloc::{AllocStages, BapTable, BitAllocator, ChannelSpectrum, DbaMode};
use super::exponents::{self, ExpStrategy};
use super::header::{FrameHeader, SyntaxFlags};
use super::idct;
use super::mantissa::{self, MantissaGroups};
use super::state::DecoderState;
use super::sync::{ChannelMode, FrameType};
use super::tables::{CPL_CH, DEFAULT_FAST_GAIN_INDEX, FAST_GAIN, MAX_COEFS};

/// 单个声道的重建结果
#[derive(Debug, Clone)]
pub struct ChannelCoefficients {
    /// 声道索引, 0 为耦合声道
    pub channel: usize,
    pub start_freq: usize,
    /// 系数结束频点 (不含); 标准耦合声道包含解耦合区间
    pub end_freq: usize,
    /// `[start_freq, end_freq)` 的定点系数
    pub coeffs: Vec<i32>,
    /// 声道自身编码区间的指数
    pub exponents: Vec<u8>,
    /// 声道自身编码区间的 bap (AHT 声道为 hebap)
    pub bap: Vec<u8>,
}

/// 单个音频块的解码结果
#[derive(Debug, Clone)]
pub struct DecodedBlock {
    pub channels: Vec<ChannelCoefficients>,
    pub cpl_in_use: bool,
    pub enhanced_coupling: bool,
    pub spx_in_use: bool,
    /// 各重矩阵化频带的标志 (仅 2/0 模式)
    pub rematrixing: Vec<bool>,
    /// 全带宽声道的块切换标志
    pub block_switch: Vec<bool>,
    /// 全带宽声道的抖动标志
    pub dither: Vec<bool>,
    /// 动态范围码, 按节目
    pub dynamic_range: Vec<u8>,
}

impl DecodedBlock {
    /// 节目 `program` 的动态范围增益
    pub fn dynamic_range_gain(&self, program: usize) -> f32 {
        self.dynamic_range
            .get(program)
            .map_or(1.0, |&code| dynamic_range_gain(code))
    }
}

/// 动态范围码 → 线性增益: 2^X * (32 | Y) / 32, X 为有符号高 3 位
pub fn dynamic_range_gain(code: u8) -> f32 {
    let exp = i32::from((code as i8) >> 5);
    let mant = f32::from((code & 0x1f) | 0x20) / 32.0;
    mant * 2f32.powi(exp)
}

/// 块解析所需的只读上下文
pub struct BlockContext<'a> {
    pub header: &'a FrameHeader,
    pub config: &'a DecoderConfig,
    pub allocator: &'a dyn BitAllocator,
    pub codebook: &'a dyn VqCodebook,
}

/// 解析并重建第 `blk` 个音频块
pub fn decode_block(
    br: &mut BitReader,
    ctx: &BlockContext,
    state: &mut DecoderState,
    blk: usize,
) -> Eac3Result<DecodedBlock> {
    let header = ctx.header;
    let fbw = header.fbw_channels();
    let channels = header.channels();
    let lfe = header.sync.lfe_channel();
    let mode = header.sync.channel_mode;
    let stereo = mode == ChannelMode::Stereo;
    let syntax = header.syntax;
    let cpl_in_use = header.cpl_in_use[blk];
    let first_ch = usize::from(!cpl_in_use);
    let mut stages = AllocStages::default();

    if syntax.contains(SyntaxFlags::BLOCK_SWITCH) {
        for ch in 1..=fbw {
            state.block_switch[ch] = br.read_flag()?;
        }
    }
    if syntax.contains(SyntaxFlags::DITHER) {
        for ch in 1..=fbw {
            state.dither_flag[ch] = br.read_flag()?;
        }
    }

    for program in 0..header.num_programs {
        if br.read_flag()? {
            state.dynamic_range[program] = br.read_bits(8)? as u8;
        } else if blk == 0 {
            state.dynamic_range[program] = 0;
        }
    }

    state.spx.parse_strategy(
        br,
        blk,
        fbw,
        mode == ChannelMode::Mono,
        ctx.config.enable_spectral_extension,
        &mut state.end_freq,
    )?;
    state.spx.parse_coords(br, blk, fbw)?;

    if header.cpl_strategy_exists[blk] {
        stages.set_all(3);
        let range = state.coupling.parse_strategy(
            br,
            blk,
            cpl_in_use,
            fbw,
            stereo,
            &state.spx,
            ctx.config.enable_enhanced_coupling,
        )?;
        if let Some(range) = range {
            state.start_freq[CPL_CH] = range.start_freq;
            state.end_freq[CPL_CH] = range.end_freq;
            for ch in 1..=fbw {
                if state.coupling.channel_in_cpl[ch] {
                    state.end_freq[ch] = range.start_freq;
                }
            }
        }
    }
    if cpl_in_use {
        state.coupling.parse_coords(br, blk, fbw, stereo)?;
    }

    if stereo {
        let bound = if cpl_in_use || state.spx.in_use {
            state.end_freq[1].min(state.end_freq[2])
        } else {
            253
        };
        state.rematrix.parse(br, blk, bound)?;
    }

    parse_exponents(br, header, state, blk, &mut stages)?;
    parse_bit_alloc_info(br, header, state, blk, &mut stages)?;

    for ch in first_ch..=channels {
        let table = if header.channel_uses_aht[ch] {
            BapTable::Hebap
        } else {
            BapTable::Ac3
        };
        let spectrum = ChannelSpectrum {
            exponents: &state.dexps[ch],
            start: state.start_freq[ch],
            end: state.end_freq[ch],
            is_lfe: lfe == Some(ch),
            table,
        };
        state
            .alloc
            .run_channel(ctx.allocator, ch, stages.get(ch), &spectrum)?;
    }

    let mut groups = MantissaGroups::default();
    let mut got_cpl = false;
    for ch in 1..=channels {
        decode_mantissas(br, ctx, state, &mut groups, blk, ch)?;
        if cpl_in_use && !got_cpl && state.coupling.channel_in_cpl[ch] {
            decode_mantissas(br, ctx, state, &mut groups, blk, CPL_CH)?;
            got_cpl = true;
        }
    }

    if cpl_in_use && !state.coupling.enhanced {
        uncouple_channels(state, fbw);
    }

    for ch in 1..=channels {
        let end = effective_end(state, ch);
        state.fixed_coeffs[ch][end..].fill(0);
    }

    if stereo {
        let bound = state.end_freq[1].min(state.end_freq[2]);
        let (left, right) = state.fixed_coeffs.split_at_mut(2);
        state.rematrix.apply(bound, &mut left[1], &mut right[0]);
    }

    trace!(
        "E-AC-3: 块 {blk} 完成, 耦合={cpl_in_use}, 已读取 {} 位",
        br.bits_read()
    );

    Ok(collect_block(header, state, blk))
}

/// 指数策略, 声道带宽与指数
fn parse_exponents(
    br: &mut BitReader,
    header: &FrameHeader,
    state: &mut DecoderState,
    blk: usize,
    stages: &mut AllocStages,
) -> Eac3Result<()> {
    let fbw = header.fbw_channels();
    let channels = header.channels();
    let lfe = header.sync.lfe_channel();
    let cpl_in_use = header.cpl_in_use[blk];
    let strategies = &header.exp_strategy[blk];

    for ch in usize::from(!cpl_in_use)..=channels {
        if strategies[ch] == ExpStrategy::Reuse {
            if blk == 0 {
                return Err(Eac3Error::Bitstream(format!(
                    "声道 {ch} 在块 0 复用指数"
                )));
            }
        } else {
            stages.raise(ch, 3);
        }
    }

    if cpl_in_use {
        state.num_exp_groups[CPL_CH] = exponents::cpl_group_count(
            strategies[CPL_CH],
            state.start_freq[CPL_CH],
            state.end_freq[CPL_CH],
        );
    }

    for ch in 1..=fbw {
        let strategy = strategies[ch];
        if strategy == ExpStrategy::Reuse {
            continue;
        }
        state.start_freq[ch] = 0;
        if !state.coupling.channel_in_cpl[ch] && !state.spx.channel_in_spx[ch] {
            let code = br.read_bits(6)? as usize;
            if code > 60 {
                return Err(Eac3Error::Bitstream(format!("声道带宽码 {code} 超过 60")));
            }
            state.end_freq[ch] = (code + 12) * 3 + 37;
        }
        state.num_exp_groups[ch] = exponents::fbw_group_count(strategy, state.end_freq[ch]);
    }

    for ch in usize::from(!cpl_in_use)..=channels {
        let strategy = strategies[ch];
        if strategy == ExpStrategy::Reuse {
            continue;
        }
        let shift = u32::from(ch == CPL_CH);
        let absexp = (br.read_bits(4)? << shift) as u8;
        state.dexps[ch][0] = absexp;
        let offset = state.start_freq[ch] + usize::from(ch != CPL_CH);
        exponents::decode_exponents(
            br,
            strategy,
            state.num_exp_groups[ch],
            absexp,
            &mut state.dexps[ch][offset..],
        )?;
        if ch != CPL_CH && lfe != Some(ch) {
            // 增益范围码
            br.skip_bits(2)?;
        }
    }
    Ok(())
}

/// 比特分配参数, SNR 偏移, 快增益, 耦合泄漏, 增量比特分配与跳过字段
fn parse_bit_alloc_info(
    br: &mut BitReader,
    header: &FrameHeader,
    state: &mut DecoderState,
    blk: usize,
    stages: &mut AllocStages,
) -> Eac3Result<()> {
    let fbw = header.fbw_channels();
    let channels = header.channels();
    let syntax = header.syntax;
    let cpl_in_use = header.cpl_in_use[blk];
    let first_ch = usize::from(!cpl_in_use);

    if syntax.contains(SyntaxFlags::BIT_ALLOC) {
        if br.read_flag()? {
            let mut idx = [0usize; 5];
            for (i, bits) in [2, 2, 2, 2, 3].into_iter().enumerate() {
                idx[i] = br.read_bits(bits)? as usize;
            }
            state.alloc.params.set_from_indices(idx);
            for ch in first_ch..=channels {
                stages.raise(ch, 2);
            }
        } else if blk == 0 {
            return Err(Eac3Error::Bitstream("块 0 缺少比特分配参数".into()));
        }
    }

    // 块级 SNR 偏移只出现在块 0, 此时各声道均已全量重算
    if header.snr_offset_strategy != 0 && blk == 0 && br.read_flag()? {
        let coarse = (br.read_bits(6)? as i32 - 15) << 4;
        let mut snr = 0;
        for ch in first_ch..=channels {
            if ch == first_ch || header.snr_offset_strategy == 2 {
                snr = (coarse + br.read_bits(4)? as i32) << 2;
            }
            state.alloc.channels[ch].snr_offset = snr;
        }
    }

    if syntax.contains(SyntaxFlags::FAST_GAIN) && br.read_flag()? {
        for ch in first_ch..=channels {
            let gain = FAST_GAIN[br.read_bits(3)? as usize];
            let channel = &mut state.alloc.channels[ch];
            if blk > 0 && channel.fast_gain != gain {
                stages.raise(ch, 2);
            }
            channel.fast_gain = gain;
        }
    } else if blk == 0 {
        for ch in first_ch..=channels {
            state.alloc.channels[ch].fast_gain = FAST_GAIN[DEFAULT_FAST_GAIN_INDEX];
        }
    }

    if header.sync.frame_type == FrameType::Independent && br.read_flag()? {
        // 转换器 SNR 偏移
        br.skip_bits(10)?;
    }

    if cpl_in_use {
        if state.coupling.first_leak || br.read_flag()? {
            let params = &mut state.alloc.params;
            let fast = br.read_bits(3)? as i32;
            let slow = br.read_bits(3)? as i32;
            if blk > 0 && (fast != params.cpl_fast_leak || slow != params.cpl_slow_leak) {
                stages.raise(CPL_CH, 2);
            }
            params.cpl_fast_leak = fast;
            params.cpl_slow_leak = slow;
        }
        state.coupling.first_leak = false;
    }

    if syntax.contains(SyntaxFlags::DELTA_BIT_ALLOC) && br.read_flag()? {
        for ch in first_ch..=fbw {
            let mode = DbaMode::from_code(br.read_bits(2)?);
            if mode == DbaMode::Reserved {
                return Err(Eac3Error::Bitstream(format!("声道 {ch} 使用保留的增量比特分配模式")));
            }
            state.alloc.channels[ch].dba.mode = mode;
        }
        for ch in first_ch..=fbw {
            let dba = &mut state.alloc.channels[ch].dba;
            if dba.mode != DbaMode::New {
                continue;
            }
            dba.num_segs = br.read_bits(3)? as usize + 1;
            for seg in 0..dba.num_segs {
                dba.offsets[seg] = br.read_bits(5)? as u8;
                dba.lengths[seg] = br.read_bits(4)? as u8;
                dba.values[seg] = br.read_bits(3)? as u8;
            }
            stages.raise(ch, 2);
        }
    } else if blk == 0 {
        for channel in state.alloc.channels.iter_mut() {
            channel.dba.mode = DbaMode::None;
        }
    }

    if syntax.contains(SyntaxFlags::SKIP) && br.read_flag()? {
        let len = br.read_bits(9)? as usize;
        br.skip_bits(len * 8)?;
    }
    Ok(())
}

/// 解码一个声道的尾数并写入 `fixed_coeffs`
fn decode_mantissas(
    br: &mut BitReader,
    ctx: &BlockContext,
    state: &mut DecoderState,
    groups: &mut MantissaGroups,
    blk: usize,
    ch: usize,
) -> Eac3Result<()> {
    let start = state.start_freq[ch];
    let end = state.end_freq[ch];
    if ctx.header.channel_uses_aht[ch] {
        if blk == 0 {
            aht::decode_aht_channel(
                br,
                &state.alloc.channels[ch].bap,
                start,
                end,
                ctx.codebook,
                &mut state.dither,
                &mut state.pre_mantissa[ch],
            )?;
        }
        idct::reconstruct(
            &state.pre_mantissa[ch],
            &state.dexps[ch],
            blk,
            start,
            end,
            &mut state.fixed_coeffs[ch],
        );
        return Ok(());
    }

    mantissa::decode_channel(
        br,
        groups,
        &state.alloc.channels[ch].bap,
        &state.dexps[ch],
        start,
        end,
        ch == CPL_CH || state.dither_flag[ch],
        &mut state.dither,
        &mut state.fixed_coeffs[ch],
    )
}

/// 标准耦合的解耦合, 并清除不抖动声道中耦合 bap 为 0 的频点
fn uncouple_channels(state: &mut DecoderState, fbw: usize) {
    let cpl_start = state.start_freq[CPL_CH];
    let cpl_end = state.end_freq[CPL_CH];
    let (cpl, rest) = state.fixed_coeffs.split_at_mut(1);
    let cpl_bap = &state.alloc.channels[CPL_CH].bap;
    for ch in 1..=fbw {
        if !state.coupling.channel_in_cpl[ch] {
            continue;
        }
        let out = &mut rest[ch - 1];
        state.coupling.uncouple(ch, cpl_start, &cpl[0], out);
        if !state.dither_flag[ch] {
            for bin in cpl_start..cpl_end {
                if cpl_bap[bin] == 0 {
                    out[bin] = 0;
                }
            }
        }
    }
}

/// 声道系数的有效结束频点
fn effective_end(state: &DecoderState, ch: usize) -> usize {
    let coupled = state.coupling.in_use
        && !state.coupling.enhanced
        && state.coupling.channel_in_cpl[ch];
    let end = if coupled {
        state.end_freq[CPL_CH]
    } else {
        state.end_freq[ch]
    };
    end.min(MAX_COEFS)
}

fn channel_output(state: &DecoderState, ch: usize, end_freq: usize) -> ChannelCoefficients {
    let start = state.start_freq[ch];
    let coded_end = state.end_freq[ch];
    ChannelCoefficients {
        channel: ch,
        start_freq: start,
        end_freq,
        coeffs: state.fixed_coeffs[ch][start..end_freq].to_vec(),
        exponents: state.dexps[ch][start..coded_end].to_vec(),
        bap: state.alloc.channels[ch].bap[start..coded_end].to_vec(),
    }
}

fn collect_block(header: &FrameHeader, state: &DecoderState, blk: usize) -> DecodedBlock {
    let fbw = header.fbw_channels();
    let cpl_in_use = header.cpl_in_use[blk];
    let mut channels = Vec::with_capacity(header.channels() + 1);
    if cpl_in_use {
        channels.push(channel_output(state, CPL_CH, state.end_freq[CPL_CH]));
    }
    for ch in 1..=header.channels() {
        channels.push(channel_output(state, ch, effective_end(state, ch)));
    }

    let rematrixing = if header.sync.channel_mode == ChannelMode::Stereo {
        state.rematrix.flags[..state.rematrix.num_bands].to_vec()
    } else {
        Vec::new()
    };

    DecodedBlock {
        channels,
        cpl_in_use,
        enhanced_coupling: cpl_in_use && state.coupling.enhanced,
        spx_in_use: state.spx.in_use,
        rematrixing,
        block_switch: state.block_switch[1..=fbw].to_vec(),
        dither: state.dither_flag[1..=fbw].to_vec(),
        dynamic_range: state.dynamic_range[..header.num_programs].to_vec(),
    }
}
