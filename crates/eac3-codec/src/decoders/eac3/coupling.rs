//! 声道耦合: 策略, 子带结构, 耦合坐标与解耦合.
//!
//! 标准耦合的坐标以 Q27 定点保存 (1.0 = 1 << 27). 解耦合时乘以标准规定的
//! 系数 8, 即 `(cpl * coord) >> 24`.
//!
//! 增强耦合只解析语法 (子带, 幅度, 角度, 混沌度), 由能力开关控制.

use log::warn;

use eac3_core::bitreader::BitReader;
use eac3_core::{Eac3Error, Eac3Result};

use super::spx::SpxState;
use super::tables::{
    DEFAULT_CPL_BAND_STRUCT, DEFAULT_ECPL_BAND_STRUCT, ECPL_SUBBAND_START, MAX_CHANNELS,
    MAX_COEFS,
};

/// 标准耦合子带数上限
pub const MAX_CPL_BANDS: usize = 18;

/// 增强耦合子带数上限
pub const MAX_ECPL_BANDS: usize = 22;

/// 耦合声道的频率范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouplingRange {
    pub start_freq: usize,
    pub end_freq: usize,
}

/// 增强耦合参数
#[derive(Debug, Clone)]
pub struct EnhancedCoupling {
    pub start_subband: usize,
    pub end_subband: usize,
    pub band_struct: [bool; MAX_ECPL_BANDS + 1],
    pub num_bands: usize,
    pub band_sizes: [usize; MAX_ECPL_BANDS],
    pub angle_interp: bool,
    pub amplitudes: [[u8; MAX_ECPL_BANDS]; MAX_CHANNELS],
    pub angles: [[u8; MAX_ECPL_BANDS]; MAX_CHANNELS],
    pub chaos: [[u8; MAX_ECPL_BANDS]; MAX_CHANNELS],
    pub transient: [bool; MAX_CHANNELS],
}

impl Default for EnhancedCoupling {
    fn default() -> Self {
        Self {
            start_subband: 0,
            end_subband: 0,
            band_struct: [false; MAX_ECPL_BANDS + 1],
            num_bands: 0,
            band_sizes: [0; MAX_ECPL_BANDS],
            angle_interp: false,
            amplitudes: [[0; MAX_ECPL_BANDS]; MAX_CHANNELS],
            angles: [[0; MAX_ECPL_BANDS]; MAX_CHANNELS],
            chaos: [[0; MAX_ECPL_BANDS]; MAX_CHANNELS],
            transient: [false; MAX_CHANNELS],
        }
    }
}

/// 跨块持久的耦合状态
#[derive(Debug, Clone)]
pub struct CouplingState {
    pub in_use: bool,
    /// 当前策略是否为增强耦合
    pub enhanced: bool,
    pub channel_in_cpl: [bool; MAX_CHANNELS],
    pub phase_flags_in_use: bool,
    pub phase_flags: [bool; MAX_CPL_BANDS],
    /// 按绝对子带索引, true 表示与前一子带合并
    pub band_struct: [bool; MAX_CPL_BANDS],
    pub num_bands: usize,
    pub band_sizes: [usize; MAX_CPL_BANDS],
    /// Q27 耦合坐标, 按 [声道][频带]
    pub coords: [[i32; MAX_CPL_BANDS]; MAX_CHANNELS],
    pub first_coords: [bool; MAX_CHANNELS],
    pub first_leak: bool,
    pub ecpl: EnhancedCoupling,
}

impl Default for CouplingState {
    fn default() -> Self {
        Self {
            in_use: false,
            enhanced: false,
            channel_in_cpl: [false; MAX_CHANNELS],
            phase_flags_in_use: false,
            phase_flags: [false; MAX_CPL_BANDS],
            band_struct: [false; MAX_CPL_BANDS],
            num_bands: 0,
            band_sizes: [0; MAX_CPL_BANDS],
            coords: [[0; MAX_CPL_BANDS]; MAX_CHANNELS],
            first_coords: [true; MAX_CHANNELS],
            first_leak: true,
            ecpl: EnhancedCoupling::default(),
        }
    }
}

/// 由 4 位指数与 4 位尾数计算 Q27 坐标
pub fn coupling_coord(exp: u32, mant: u32, master: u32) -> i32 {
    let base = if exp == 15 {
        (mant as i32) << 23
    } else {
        (mant as i32 + 16) << 22
    };
    base >> (exp + master)
}

impl CouplingState {
    /// 帧起始: 坐标与泄漏参数在每个帧的首次出现时隐式传输
    pub fn begin_frame(&mut self) {
        self.first_coords = [true; MAX_CHANNELS];
        self.first_leak = true;
    }

    /// 第一个参与耦合的全带宽声道
    pub fn first_coupled_channel(&self, fbw: usize) -> Option<usize> {
        (1..=fbw).find(|&ch| self.channel_in_cpl[ch])
    }

    /// 解析耦合策略
    ///
    /// 在用时返回耦合声道的频率范围, 否则清空成员并复位首次标志.
    #[allow(clippy::too_many_arguments)]
    pub fn parse_strategy(
        &mut self,
        br: &mut BitReader,
        blk: usize,
        in_use: bool,
        fbw: usize,
        stereo: bool,
        spx: &SpxState,
        enhanced_enabled: bool,
    ) -> Eac3Result<Option<CouplingRange>> {
        self.in_use = in_use;
        if !in_use {
            for ch in 1..=fbw {
                self.channel_in_cpl[ch] = false;
                self.first_coords[ch] = true;
            }
            self.first_leak = true;
            self.phase_flags_in_use = false;
            self.enhanced = false;
            return Ok(None);
        }

        self.enhanced = br.read_flag()?;
        if self.enhanced && !enhanced_enabled {
            warn!("E-AC-3: 增强耦合未启用, 跳过该帧");
            return Err(Eac3Error::UnsupportedFeature("增强耦合".into()));
        }

        if stereo {
            self.channel_in_cpl[1] = true;
            self.channel_in_cpl[2] = true;
        } else {
            for ch in 1..=fbw {
                self.channel_in_cpl[ch] = br.read_flag()?;
            }
        }

        if self.enhanced {
            self.parse_enhanced_strategy(br, blk, spx).map(Some)
        } else {
            self.parse_standard_strategy(br, blk, stereo, spx).map(Some)
        }
    }

    fn parse_standard_strategy(
        &mut self,
        br: &mut BitReader,
        blk: usize,
        stereo: bool,
        spx: &SpxState,
    ) -> Eac3Result<CouplingRange> {
        if stereo {
            self.phase_flags_in_use = br.read_flag()?;
        }

        let begin = br.read_bits(4)? as usize;
        let end = if spx.in_use {
            spx.begin_subband - 1
        } else {
            br.read_bits(4)? as usize + 3
        };
        if begin >= end {
            return Err(Eac3Error::Bitstream(format!(
                "耦合起始子带 {begin} 不小于结束子带 {end}"
            )));
        }

        if br.read_flag()? {
            for sbnd in begin + 1..end {
                self.band_struct[sbnd] = br.read_flag()?;
            }
        } else if blk == 0 {
            self.band_struct = DEFAULT_CPL_BAND_STRUCT;
        }

        self.num_bands = 1;
        self.band_sizes[0] = 12;
        for sbnd in begin + 1..end {
            if self.band_struct[sbnd] {
                self.band_sizes[self.num_bands - 1] += 12;
            } else {
                self.band_sizes[self.num_bands] = 12;
                self.num_bands += 1;
            }
        }

        Ok(CouplingRange {
            start_freq: 37 + 12 * begin,
            end_freq: 37 + 12 * end,
        })
    }

    fn parse_enhanced_strategy(
        &mut self,
        br: &mut BitReader,
        blk: usize,
        spx: &SpxState,
    ) -> Eac3Result<CouplingRange> {
        let ecpl = &mut self.ecpl;
        let begf = br.read_bits(4)? as usize;
        ecpl.start_subband = match begf {
            0..=2 => begf * 2,
            3..=12 => begf + 2,
            _ => begf * 2 - 10,
        };
        ecpl.end_subband = if spx.in_use {
            let code = usize::from(spx.begin_code);
            if code < 6 { code + 5 } else { code * 2 }
        } else {
            br.read_bits(4)? as usize + 7
        };
        if ecpl.start_subband >= ecpl.end_subband {
            return Err(Eac3Error::Bitstream(format!(
                "增强耦合起始子带 {} 不小于结束子带 {}",
                ecpl.start_subband, ecpl.end_subband
            )));
        }

        if br.read_flag()? {
            for sbnd in (ecpl.start_subband + 1).max(9)..ecpl.end_subband {
                ecpl.band_struct[sbnd] = br.read_flag()?;
            }
        } else if blk == 0 {
            ecpl.band_struct = DEFAULT_ECPL_BAND_STRUCT;
        }

        let width = |sbnd: usize| ECPL_SUBBAND_START[sbnd + 1] - ECPL_SUBBAND_START[sbnd];
        ecpl.num_bands = 1;
        ecpl.band_sizes[0] = width(ecpl.start_subband);
        for sbnd in ecpl.start_subband + 1..ecpl.end_subband {
            if ecpl.band_struct[sbnd] {
                ecpl.band_sizes[ecpl.num_bands - 1] += width(sbnd);
            } else {
                ecpl.band_sizes[ecpl.num_bands] = width(sbnd);
                ecpl.num_bands += 1;
            }
        }

        Ok(CouplingRange {
            start_freq: ECPL_SUBBAND_START[ecpl.start_subband],
            end_freq: ECPL_SUBBAND_START[ecpl.end_subband],
        })
    }

    /// 解析耦合坐标 (标准或增强)
    pub fn parse_coords(
        &mut self,
        br: &mut BitReader,
        blk: usize,
        fbw: usize,
        stereo: bool,
    ) -> Eac3Result<()> {
        if self.enhanced {
            return self.parse_enhanced_coords(br, fbw);
        }

        let mut any_coords = false;
        for ch in 1..=fbw {
            if !self.channel_in_cpl[ch] {
                self.first_coords[ch] = true;
                continue;
            }
            let present = if self.first_coords[ch] {
                self.first_coords[ch] = false;
                true
            } else {
                br.read_flag()?
            };
            any_coords |= present;

            if present {
                let master = br.read_bits(2)? * 3;
                for bnd in 0..self.num_bands {
                    let exp = br.read_bits(4)?;
                    let mant = br.read_bits(4)?;
                    self.coords[ch][bnd] = coupling_coord(exp, mant, master);
                }
            } else if blk == 0 {
                return Err(Eac3Error::Bitstream(format!("声道 {ch} 在块 0 缺少耦合坐标")));
            }
        }

        if stereo && any_coords {
            for bnd in 0..self.num_bands {
                self.phase_flags[bnd] = self.phase_flags_in_use && br.read_flag()?;
            }
        }
        Ok(())
    }

    fn parse_enhanced_coords(&mut self, br: &mut BitReader, fbw: usize) -> Eac3Result<()> {
        let first_coupled = self.first_coupled_channel(fbw);
        let ecpl = &mut self.ecpl;
        ecpl.angle_interp = br.read_flag()?;

        for ch in 1..=fbw {
            if !self.channel_in_cpl[ch] {
                self.first_coords[ch] = true;
                continue;
            }
            let follower = first_coupled.is_some_and(|first| ch > first);
            let (amp_present, angle_present) = if self.first_coords[ch] {
                self.first_coords[ch] = false;
                (true, follower)
            } else {
                let amp = br.read_flag()?;
                let angle = follower && br.read_flag()?;
                (amp, angle)
            };

            if amp_present {
                for bnd in 0..ecpl.num_bands {
                    ecpl.amplitudes[ch][bnd] = br.read_bits(5)? as u8;
                }
            }
            if angle_present {
                for bnd in 0..ecpl.num_bands {
                    ecpl.angles[ch][bnd] = br.read_bits(6)? as u8;
                    ecpl.chaos[ch][bnd] = br.read_bits(3)? as u8;
                }
            }
            if follower {
                ecpl.transient[ch] = br.read_flag()?;
            }
        }
        Ok(())
    }

    /// 将耦合声道按坐标还原到声道 `ch` 的 `[start, end)` 区间
    pub fn uncouple(
        &self,
        ch: usize,
        start: usize,
        cpl_coeffs: &[i32; MAX_COEFS],
        out: &mut [i32; MAX_COEFS],
    ) {
        let mut bin = start;
        for bnd in 0..self.num_bands {
            let coord = i64::from(self.coords[ch][bnd]);
            let negate = ch == 2 && self.phase_flags[bnd];
            for _ in 0..self.band_sizes[bnd] {
                let value = ((i64::from(cpl_coeffs[bin]) * coord) >> 24) as i32;
                out[bin] = if negate { -value } else { value };
                bin += 1;
            }
        }
    }
}
