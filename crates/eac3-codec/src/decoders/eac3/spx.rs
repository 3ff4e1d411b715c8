//! 频谱扩展 (SPX) 语法.
//!
//! 仅解析策略与坐标并维护跨块状态, 高频合成不在解码核心内完成.
//! 能力开关关闭时, 码流一旦启用频谱扩展即返回 `UnsupportedFeature`.

use log::warn;

use eac3_core::bitreader::BitReader;
use eac3_core::{Eac3Error, Eac3Result};

use super::tables::{DEFAULT_SPX_BAND_STRUCT, MAX_CHANNELS};

/// 频谱扩展子带数上限
pub const MAX_SPX_BANDS: usize = 17;

/// 频谱扩展状态
#[derive(Debug, Clone)]
pub struct SpxState {
    pub in_use: bool,
    pub channel_in_spx: [bool; MAX_CHANNELS],
    /// 复制起始子带 (spxstrtf)
    pub start_subband: usize,
    /// 原始 spxbegf 码, 增强耦合据此推导结束子带
    pub begin_code: u8,
    /// 扩展起始子带
    pub begin_subband: usize,
    /// 扩展结束子带
    pub end_subband: usize,
    pub band_struct: [bool; MAX_SPX_BANDS],
    pub num_bands: usize,
    pub band_sizes: [usize; MAX_SPX_BANDS],
    pub blend: [u8; MAX_CHANNELS],
    pub coords: [[f32; MAX_SPX_BANDS]; MAX_CHANNELS],
    pub first_coords: [bool; MAX_CHANNELS],
}

impl Default for SpxState {
    fn default() -> Self {
        Self {
            in_use: false,
            channel_in_spx: [false; MAX_CHANNELS],
            start_subband: 0,
            begin_code: 0,
            begin_subband: 0,
            end_subband: 0,
            band_struct: [false; MAX_SPX_BANDS],
            num_bands: 0,
            band_sizes: [0; MAX_SPX_BANDS],
            blend: [0; MAX_CHANNELS],
            coords: [[0.0; MAX_SPX_BANDS]; MAX_CHANNELS],
            first_coords: [true; MAX_CHANNELS],
        }
    }
}

impl SpxState {
    /// 帧起始: 每个声道的首个坐标隐式出现
    pub fn begin_frame(&mut self) {
        self.first_coords = [true; MAX_CHANNELS];
    }

    /// 扩展起始频点
    pub fn begin_freq(&self) -> usize {
        25 + 12 * self.begin_subband
    }

    /// 解析频谱扩展策略 (块 0 必然存在, 其余块由 1 位标志决定)
    ///
    /// 参与扩展的声道, 其结束频点被改写为扩展起始频点.
    pub fn parse_strategy(
        &mut self,
        br: &mut BitReader,
        blk: usize,
        fbw: usize,
        mono: bool,
        enabled: bool,
        end_freq: &mut [usize; MAX_CHANNELS],
    ) -> Eac3Result<()> {
        if !(blk == 0 || br.read_flag()?) {
            return Ok(());
        }

        self.in_use = br.read_flag()?;
        if !self.in_use {
            for ch in 1..=fbw {
                self.channel_in_spx[ch] = false;
                self.first_coords[ch] = true;
            }
            return Ok(());
        }
        if !enabled {
            warn!("E-AC-3: 频谱扩展未启用, 跳过该帧");
            return Err(Eac3Error::UnsupportedFeature("频谱扩展".into()));
        }

        if mono {
            self.channel_in_spx[1] = true;
        } else {
            for ch in 1..=fbw {
                self.channel_in_spx[ch] = br.read_flag()?;
            }
        }

        self.start_subband = br.read_bits(2)? as usize;
        let begf = br.read_bits(3)? as usize;
        let endf = br.read_bits(3)? as usize;
        self.begin_code = begf as u8;
        self.begin_subband = if begf < 6 { begf + 2 } else { begf * 2 - 3 };
        self.end_subband = if endf < 3 { endf + 5 } else { endf * 2 + 3 };
        if self.begin_subband >= self.end_subband {
            return Err(Eac3Error::Bitstream(format!(
                "频谱扩展起始子带 {} 不小于结束子带 {}",
                self.begin_subband, self.end_subband
            )));
        }

        let begin_freq = self.begin_freq();
        for ch in 1..=fbw {
            if self.channel_in_spx[ch] {
                end_freq[ch] = begin_freq;
            }
        }

        if br.read_flag()? {
            for bnd in self.begin_subband + 1..self.end_subband {
                self.band_struct[bnd] = br.read_flag()?;
            }
        } else if blk == 0 {
            self.band_struct = DEFAULT_SPX_BAND_STRUCT;
        }

        self.num_bands = 1;
        self.band_sizes[0] = 12;
        for bnd in self.begin_subband + 1..self.end_subband {
            if self.band_struct[bnd] {
                self.band_sizes[self.num_bands - 1] += 12;
            } else {
                self.band_sizes[self.num_bands] = 12;
                self.num_bands += 1;
            }
        }
        Ok(())
    }

    /// 解析频谱扩展坐标
    pub fn parse_coords(&mut self, br: &mut BitReader, blk: usize, fbw: usize) -> Eac3Result<()> {
        if !self.in_use {
            return Ok(());
        }
        for ch in 1..=fbw {
            if !self.channel_in_spx[ch] {
                self.first_coords[ch] = true;
                continue;
            }
            let coords_present = if self.first_coords[ch] {
                self.first_coords[ch] = false;
                true
            } else {
                br.read_flag()?
            };
            if !coords_present {
                if blk == 0 {
                    return Err(Eac3Error::Bitstream(format!(
                        "声道 {ch} 在块 0 缺少频谱扩展坐标"
                    )));
                }
                continue;
            }

            self.blend[ch] = br.read_bits(5)? as u8;
            let master = br.read_bits(2)? as i32 * 3;
            for bnd in 0..self.num_bands {
                let exp = br.read_bits(4)? as i32;
                let mant = br.read_bits(2)? as f32;
                let base = if exp == 15 {
                    mant / 4.0
                } else {
                    (mant + 4.0) / 8.0
                };
                self.coords[ch][bnd] = base * 2f32.powi(-(exp + master));
            }
        }
        Ok(())
    }
}
