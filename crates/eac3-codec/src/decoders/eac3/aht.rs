//! 自适应混合变换 (AHT) 尾数解码.
//!
//! AHT 声道在块 0 一次性读出整帧 6 个块的预尾数:
//! - hebap 0: 抖动噪声
//! - hebap 1..=7: 矢量量化, 由外部码本 [`VqCodebook`] 给出 6 维矢量
//! - hebap >= 8: 增益自适应量化 (GAQ), 大尾数使用非对称重映射

use eac3_core::bitreader::BitReader;
use eac3_core::{Eac3Error, Eac3Result};

use super::dither::DitherGenerator;
use super::tables::{
    GAQ_REMAP_1, GAQ_REMAP_2_4_A, GAQ_REMAP_2_4_B, HEBAP_BITS, MAX_BLOCKS, MAX_COEFS,
    gaq_ungroup_table,
};

/// 单声道的预尾数, 按 [频点][块]
pub type PreMantissas = [[i32; MAX_BLOCKS]; MAX_COEFS];

/// AHT 矢量量化码本
pub trait VqCodebook {
    /// 取 hebap (1..=7) 对应码本中的第 `index` 个 6 维矢量, 不存在时返回 `None`
    fn vector(&self, hebap: u8, index: u32) -> Option<[i16; MAX_BLOCKS]>;
}

/// GAQ 增益模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaqMode {
    /// 无增益
    None,
    /// 增益 1 或 2 (1 位)
    Half,
    /// 增益 1 或 4 (1 位)
    Quarter,
    /// 增益 1, 2 或 4 (三个一组, 5 位)
    Mixed,
}

impl GaqMode {
    pub fn from_code(code: u32) -> Self {
        match code & 3 {
            0 => Self::None,
            1 => Self::Half,
            2 => Self::Quarter,
            _ => Self::Mixed,
        }
    }

    /// 使用 GAQ 增益的 hebap 上界 (不含)
    pub fn end_bap(self) -> u8 {
        match self {
            Self::None | Self::Half => 12,
            Self::Quarter | Self::Mixed => 17,
        }
    }
}

/// 解码一个 AHT 声道 `[start, end)` 频点的全部预尾数
pub fn decode_aht_channel(
    br: &mut BitReader,
    hebap: &[u8; MAX_COEFS],
    start: usize,
    end: usize,
    codebook: &dyn VqCodebook,
    dither: &mut DitherGenerator,
    pre: &mut PreMantissas,
) -> Eac3Result<()> {
    let mode = GaqMode::from_code(br.read_bits(2)?);
    let end_bap = mode.end_bap();
    let uses_gain = |b: u8| b > 7 && b < end_bap;

    // Mixed 模式按三个一组展开, 最多比频点数多 2 个
    let mut gains = [0u32; MAX_COEFS + 2];
    let mut num_gains = 0;
    match mode {
        GaqMode::Half | GaqMode::Quarter => {
            let shift = if mode == GaqMode::Half { 0 } else { 1 };
            for &b in &hebap[start..end] {
                if uses_gain(b) {
                    gains[num_gains] = br.read_bits(1)? << shift;
                    num_gains += 1;
                }
            }
        }
        GaqMode::Mixed => {
            let ungroup = gaq_ungroup_table();
            let mut pending = 0;
            for &b in &hebap[start..end] {
                if !uses_gain(b) {
                    continue;
                }
                if pending == 0 {
                    let group = br.read_bits(5)?;
                    if group > 26 {
                        return Err(Eac3Error::Bitstream(format!(
                            "GAQ 增益分组值 {group} 超过 26"
                        )));
                    }
                    for &g in &ungroup[group as usize] {
                        gains[num_gains] = u32::from(g);
                        num_gains += 1;
                    }
                    pending = 3;
                }
                pending -= 1;
            }
        }
        GaqMode::None => {}
    }

    let mut gs = 0;
    for bin in start..end {
        let b = hebap[bin];
        let Some(&bits) = HEBAP_BITS.get(b as usize) else {
            return Err(Eac3Error::Bitstream(format!("hebap {b} 越界")));
        };
        match b {
            0 => {
                for value in pre[bin].iter_mut() {
                    *value = dither.aht_value();
                }
            }
            1..=7 => {
                let index = br.read_bits(bits)?;
                let vector = codebook.vector(b, index).ok_or_else(|| {
                    Eac3Error::Bitstream(format!("VQ 码本 hebap={b} 缺少第 {index} 项"))
                })?;
                for (value, &v) in pre[bin].iter_mut().zip(vector.iter()) {
                    *value = i32::from(v) << 8;
                }
            }
            _ => {
                let log_gain = if mode != GaqMode::None && b < end_bap {
                    let g = gains[gs];
                    gs += 1;
                    g
                } else {
                    0
                };
                for blk in 0..MAX_BLOCKS {
                    pre[bin][blk] = gaq_mantissa(br, b, bits, log_gain)?;
                }
            }
        }
    }
    Ok(())
}

/// 读取并重映射一个 GAQ 尾数
fn gaq_mantissa(br: &mut BitReader, hebap: u8, bits: u32, log_gain: u32) -> Eac3Result<i32> {
    let row = (hebap - 8) as usize;
    let gbits = bits - log_gain;
    let value = br.read_signed_bits(gbits)?;

    // 仅在存在增益时, 最小码值才作为大尾数的转义
    if log_gain > 0 && value == -(1 << (gbits - 1)) {
        let mant = i64::from(br.read_signed_bits(bits - 2 + log_gain)? << (26 - log_gain - bits));
        let col = (log_gain - 1) as usize;
        let a = i64::from(GAQ_REMAP_2_4_A[row][col]) + 32768;
        let b = if mant >= 0 {
            i64::from(32768 >> log_gain)
        } else {
            i64::from(GAQ_REMAP_2_4_B[row][col])
        };
        return Ok(((a * mant + b) >> 15) as i32);
    }

    let mant = value << (24 - bits);
    if log_gain == 0 {
        let a = i64::from(GAQ_REMAP_1[row]) + 32768;
        return Ok(((a * i64::from(mant)) >> 15) as i32);
    }
    Ok(mant)
}
