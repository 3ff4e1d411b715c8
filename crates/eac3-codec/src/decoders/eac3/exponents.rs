//! 指数策略与差分指数解码.

use eac3_core::bitreader::BitReader;
use eac3_core::{Eac3Error, Eac3Result};

/// 指数策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpStrategy {
    /// 复用上一块的指数
    #[default]
    Reuse,
    D15,
    D25,
    D45,
}

impl ExpStrategy {
    pub fn from_code(code: u32) -> Self {
        match code & 3 {
            0 => Self::Reuse,
            1 => Self::D15,
            2 => Self::D25,
            _ => Self::D45,
        }
    }

    /// 每个差分值展开的指数个数
    pub fn group_size(self) -> usize {
        match self {
            Self::Reuse => 0,
            Self::D15 => 1,
            Self::D25 => 2,
            Self::D45 => 4,
        }
    }

    /// 每个 7 位分组覆盖的频点数
    pub fn bins_per_group(self) -> usize {
        self.group_size() * 3
    }
}

/// 全带宽 / LFE 声道的指数分组数
pub fn fbw_group_count(strategy: ExpStrategy, end_freq: usize) -> usize {
    let grp = strategy.bins_per_group();
    if grp == 0 {
        return 0;
    }
    (end_freq + grp - 4) / grp
}

/// 耦合声道的指数分组数
pub fn cpl_group_count(strategy: ExpStrategy, start_freq: usize, end_freq: usize) -> usize {
    let grp = strategy.bins_per_group();
    if grp == 0 {
        return 0;
    }
    (end_freq - start_freq) / grp
}

/// 读取 `groups` 个 7 位分组并累加为绝对指数, 写入 `out` 开头
///
/// 每组给出三个差分值 (各减 2), 每个差分按策略展开为 1/2/4 个指数.
pub fn decode_exponents(
    br: &mut BitReader,
    strategy: ExpStrategy,
    groups: usize,
    absexp: u8,
    out: &mut [u8],
) -> Eac3Result<()> {
    let group_size = strategy.group_size();
    let needed = groups * 3 * group_size;
    if needed > out.len() {
        return Err(Eac3Error::Bitstream(format!(
            "指数分组数 {groups} 超出声道频率范围"
        )));
    }

    let mut prev = i32::from(absexp);
    let mut pos = 0;
    for _ in 0..groups {
        let packed = br.read_bits(7)?;
        if packed > 124 {
            return Err(Eac3Error::Bitstream(format!("指数分组值 {packed} 超过 124")));
        }
        let deltas = [packed / 25, (packed % 25) / 5, packed % 5];
        for delta in deltas {
            prev += delta as i32 - 2;
            if !(0..=24).contains(&prev) {
                return Err(Eac3Error::Bitstream(format!("指数 {prev} 超出 0..=24")));
            }
            out[pos..pos + group_size].fill(prev as u8);
            pos += group_size;
        }
    }
    Ok(())
}
