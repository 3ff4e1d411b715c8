//! 立体声重矩阵化.

use eac3_core::bitreader::BitReader;
use eac3_core::Eac3Result;

use super::tables::{MAX_COEFS, REMATRIX_BAND_START};

/// 重矩阵化频带数上限
pub const MAX_REMATRIX_BANDS: usize = 4;

/// 重矩阵化状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RematrixState {
    pub num_bands: usize,
    pub flags: [bool; MAX_REMATRIX_BANDS],
}

/// 频带数: 起点严格小于 `bound` 的频带个数
pub fn band_count(bound: usize) -> usize {
    REMATRIX_BAND_START[..MAX_REMATRIX_BANDS]
        .iter()
        .filter(|&&start| start < bound)
        .count()
}

impl RematrixState {
    /// 解析重矩阵化标志 (块 0 必然存在, 其余块由 1 位标志决定)
    ///
    /// `bound` 为耦合或频谱扩展时两声道结束频点的较小值, 否则为 253.
    pub fn parse(&mut self, br: &mut BitReader, blk: usize, bound: usize) -> Eac3Result<()> {
        if !(blk == 0 || br.read_flag()?) {
            return Ok(());
        }
        self.num_bands = band_count(bound);
        self.flags = [false; MAX_REMATRIX_BANDS];
        for bnd in 0..self.num_bands {
            self.flags[bnd] = br.read_flag()?;
        }
        Ok(())
    }

    /// 对启用的频带执行 L' = L + R, R' = L - R
    pub fn apply(&self, bound: usize, left: &mut [i32; MAX_COEFS], right: &mut [i32; MAX_COEFS]) {
        for bnd in 0..self.num_bands {
            if !self.flags[bnd] {
                continue;
            }
            let end = REMATRIX_BAND_START[bnd + 1].min(bound);
            for bin in REMATRIX_BAND_START[bnd]..end {
                let (l, r) = (left[bin], right[bin]);
                left[bin] = l.wrapping_add(r);
                right[bin] = l.wrapping_sub(r);
            }
        }
    }
}
