//! 跨块, 跨帧持久的解码状态.

use super::aht::PreMantissas;
use super::bit_alloc::BitAllocState;
use super::coupling::CouplingState;
use super::dither::DitherGenerator;
use super::header::{FrameHeader, SyntaxFlags};
use super::rematrix::RematrixState;
use super::spx::SpxState;
use super::tables::{MAX_BLOCKS, MAX_CHANNELS, MAX_COEFS};

/// 解码状态
///
/// 解码一帧时先克隆出暂存副本, 整帧成功后再替换, 因此这里的全部字段都必须
/// 是值语义.
#[derive(Debug, Clone)]
pub struct DecoderState {
    pub start_freq: [usize; MAX_CHANNELS],
    pub end_freq: [usize; MAX_CHANNELS],
    pub num_exp_groups: [usize; MAX_CHANNELS],
    pub dexps: [[u8; MAX_COEFS]; MAX_CHANNELS],
    pub block_switch: [bool; MAX_CHANNELS],
    pub dither_flag: [bool; MAX_CHANNELS],
    /// 动态范围码, 按节目
    pub dynamic_range: [u8; 2],
    pub alloc: BitAllocState,
    pub coupling: CouplingState,
    pub spx: SpxState,
    pub rematrix: RematrixState,
    pub pre_mantissa: [PreMantissas; MAX_CHANNELS],
    pub fixed_coeffs: [[i32; MAX_COEFS]; MAX_CHANNELS],
    pub dither: DitherGenerator,
}

impl DecoderState {
    pub fn new(dither_seed: u32) -> Self {
        Self {
            start_freq: [0; MAX_CHANNELS],
            end_freq: [0; MAX_CHANNELS],
            num_exp_groups: [0; MAX_CHANNELS],
            dexps: [[0; MAX_COEFS]; MAX_CHANNELS],
            block_switch: [false; MAX_CHANNELS],
            dither_flag: [false; MAX_CHANNELS],
            dynamic_range: [0; 2],
            alloc: BitAllocState::default(),
            coupling: CouplingState::default(),
            spx: SpxState::default(),
            rematrix: RematrixState::default(),
            pre_mantissa: [[[0; MAX_BLOCKS]; MAX_COEFS]; MAX_CHANNELS],
            fixed_coeffs: [[0; MAX_COEFS]; MAX_CHANNELS],
            dither: DitherGenerator::new(dither_seed),
        }
    }

    /// 帧起始: 复位首次坐标标志, 应用帧头未携带语法时的默认值
    pub fn begin_frame(&mut self, header: &FrameHeader) {
        let fbw = header.fbw_channels();
        self.coupling.begin_frame();
        self.spx.begin_frame();

        if !header.syntax.contains(SyntaxFlags::BLOCK_SWITCH) {
            self.block_switch = [false; MAX_CHANNELS];
        }
        if !header.syntax.contains(SyntaxFlags::DITHER) {
            self.dither_flag = [false; MAX_CHANNELS];
            for ch in 1..=fbw {
                self.dither_flag[ch] = true;
            }
        }
        if !header.syntax.contains(SyntaxFlags::BIT_ALLOC) {
            self.alloc.params.set_defaults();
        }
        self.alloc.params.sr_code = header.sync.sr_code;
        self.alloc.params.sr_shift = 0;

        if let Some(lfe) = header.sync.lfe_channel() {
            self.start_freq[lfe] = 0;
            self.end_freq[lfe] = 7;
            self.num_exp_groups[lfe] = 2;
        }

        if let Some(snr) = header.frame_snr_offset {
            for channel in self.alloc.channels.iter_mut() {
                channel.snr_offset = snr;
            }
        }
    }
}
