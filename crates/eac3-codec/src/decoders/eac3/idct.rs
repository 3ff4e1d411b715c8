//! AHT 声道的 6 点逆 DCT 系数重建.

use super::aht::PreMantissas;
use super::tables::{MAX_COEFS, idct_cos_table};

/// 由预尾数重建块 `blk` 的 `[start, end)` 系数
///
/// `acc = pre[0] + Σ (cos[blk][i-1] * pre[i]) >> 23`, 再按指数右移.
pub fn reconstruct(
    pre: &PreMantissas,
    exps: &[u8; MAX_COEFS],
    blk: usize,
    start: usize,
    end: usize,
    out: &mut [i32; MAX_COEFS],
) {
    let cos = &idct_cos_table()[blk];
    for bin in start..end {
        let p = &pre[bin];
        let mut acc = i64::from(p[0]);
        for i in 1..6 {
            acc += (i64::from(cos[i - 1]) * i64::from(p[i])) >> 23;
        }
        out[bin] = (acc >> exps[bin]) as i32;
    }
}
