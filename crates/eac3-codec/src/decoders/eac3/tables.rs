//! E-AC-3 常量表与运行时生成的派生表.
//!
//! 常量表直接以 `const` 给出; IDCT 余弦表与 GAQ 分组反解表通过 `OnceLock`
//! 在首次使用时生成, [`init_tables`] 可以提前触发且可重复调用.

use std::f64::consts::{PI, SQRT_2};
use std::sync::OnceLock;

/// 同步字
pub const SYNC_WORD: u32 = 0x0B77;

/// 最大声道槽位数 (耦合伪声道 + 5 个全带宽声道 + LFE)
pub const MAX_CHANNELS: usize = 7;

/// 每块最大系数数
pub const MAX_COEFS: usize = 256;

/// 每帧最大音频块数
pub const MAX_BLOCKS: usize = 6;

/// 耦合伪声道索引
pub const CPL_CH: usize = 0;

/// 采样率表 (fscod 0..2)
pub const SAMPLE_RATES: [u32; 3] = [48000, 44100, 32000];

/// numblkscod → 每帧音频块数
pub const BLOCKS_PER_FRAME: [usize; 4] = [1, 2, 3, 6];

/// acmod → 全带宽声道数
pub const FBW_CHANNELS: [usize; 8] = [2, 1, 2, 3, 3, 4, 4, 5];

/// 帧级指数策略组合 (frmchexpstr → 6 个块的策略, 0=复用 1=D15 2=D25 3=D45)
pub const FRAME_EXP_STRATEGIES: [[u8; 6]; 32] = [
    [1, 0, 0, 0, 0, 0],
    [1, 0, 0, 0, 0, 3],
    [1, 0, 0, 0, 2, 0],
    [1, 0, 0, 0, 3, 3],
    [2, 0, 0, 2, 0, 0],
    [2, 0, 0, 2, 0, 3],
    [2, 0, 0, 3, 2, 0],
    [2, 0, 0, 3, 3, 3],
    [2, 0, 1, 0, 0, 0],
    [2, 0, 2, 0, 0, 3],
    [2, 0, 2, 0, 2, 0],
    [2, 0, 2, 0, 3, 3],
    [2, 0, 3, 2, 0, 0],
    [2, 0, 3, 2, 0, 3],
    [2, 0, 3, 3, 2, 0],
    [2, 0, 3, 3, 3, 3],
    [3, 1, 0, 0, 0, 0],
    [3, 1, 0, 0, 0, 3],
    [3, 2, 0, 0, 2, 0],
    [3, 2, 0, 0, 3, 3],
    [3, 2, 0, 2, 0, 0],
    [3, 2, 0, 2, 0, 3],
    [3, 2, 0, 3, 2, 0],
    [3, 2, 0, 3, 3, 3],
    [3, 3, 1, 0, 0, 0],
    [3, 3, 2, 0, 0, 3],
    [3, 3, 2, 0, 2, 0],
    [3, 3, 2, 0, 3, 3],
    [3, 3, 3, 2, 0, 0],
    [3, 3, 3, 2, 0, 3],
    [3, 3, 3, 3, 2, 0],
    [3, 3, 3, 3, 3, 3],
];

// ============================================================
// 比特分配参数表
// ============================================================

/// 慢衰减
pub const SLOW_DECAY: [i32; 4] = [0x0f, 0x11, 0x13, 0x15];
/// 快衰减
pub const FAST_DECAY: [i32; 4] = [0x3f, 0x53, 0x67, 0x7b];
/// 慢增益
pub const SLOW_GAIN: [i32; 4] = [0x540, 0x4d8, 0x478, 0x410];
/// 每比特 dB
pub const DB_PER_BIT: [i32; 4] = [0x000, 0x700, 0x900, 0xb00];
/// 掩蔽下限
pub const FLOOR: [i32; 8] = [
    0x2f0, 0x2b0, 0x270, 0x230, 0x1f0, 0x170, 0x0f0, 0xf800u32 as i16 as i32,
];
/// 快增益
pub const FAST_GAIN: [i32; 8] = [0x080, 0x100, 0x180, 0x200, 0x280, 0x300, 0x380, 0x400];

/// bamode 关闭时使用的默认参数索引: 慢衰减, 快衰减, 慢增益, 每比特 dB, 下限
pub const DEFAULT_BA_INDICES: [usize; 5] = [2, 1, 1, 2, 7];

/// 默认快增益索引
pub const DEFAULT_FAST_GAIN_INDEX: usize = 4;

// ============================================================
// 子带结构
// ============================================================

/// 标准耦合默认子带结构 (按子带 0..17)
pub const DEFAULT_CPL_BAND_STRUCT: [bool; 18] = {
    let raw = [0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1, 1, 0, 1, 1, 1, 1, 1];
    to_flags(raw)
};

/// 频谱扩展默认子带结构 (按子带 0..16)
pub const DEFAULT_SPX_BAND_STRUCT: [bool; 17] = {
    let raw = [0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1];
    to_flags(raw)
};

/// 增强耦合默认子带结构 (按子带 0..22)
pub const DEFAULT_ECPL_BAND_STRUCT: [bool; 23] = {
    let raw = [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 1, 0, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1,
    ];
    to_flags(raw)
};

/// 增强耦合子带起始频点
pub const ECPL_SUBBAND_START: [usize; 23] = [
    13, 19, 25, 31, 37, 49, 61, 73, 85, 97, 109, 121, 133, 145, 157, 169, 181, 193, 205, 217, 229,
    241, 253,
];

/// 重矩阵化频带起点 (最后一项为上界哨兵)
pub const REMATRIX_BAND_START: [usize; 5] = [13, 25, 37, 61, 253];

const fn to_flags<const N: usize>(raw: [u8; N]) -> [bool; N] {
    let mut out = [false; N];
    let mut i = 0;
    while i < N {
        out[i] = raw[i] != 0;
        i += 1;
    }
    out
}

// ============================================================
// 量化表
// ============================================================

/// AC-3 bap → 量化位数 (bap 1..5 为分组/对称量化, 此处给出电平数)
pub const QUANTIZATION_BITS: [u32; 16] = [0, 3, 5, 7, 11, 15, 5, 6, 7, 8, 9, 10, 11, 12, 14, 16];

/// E-AC-3 hebap → 每个尾数的位数 (hebap 1..7 为矢量量化码字位数)
pub const HEBAP_BITS: [u32; 20] = [0, 2, 3, 4, 5, 7, 8, 9, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 14, 16];

/// 无增益 (或增益为 1) 时的 GAQ 重映射系数 (hebap 8..19)
pub const GAQ_REMAP_1: [i32; 12] = [4681, 2185, 1057, 520, 258, 129, 64, 32, 16, 8, 2, 0];

/// 大尾数重映射系数 a, 按 [hebap - 8][增益 - 1]
pub const GAQ_REMAP_2_4_A: [[i32; 2]; 9] = [
    [-10923, -4681],
    [-14043, -6554],
    [-15292, -7399],
    [-15855, -7802],
    [-16124, -7998],
    [-16255, -8096],
    [-16320, -8144],
    [-16352, -8168],
    [-16368, -8180],
];

/// 大尾数重映射偏移 b (负尾数), 按 [hebap - 8][增益 - 1]
pub const GAQ_REMAP_2_4_B: [[i32; 2]; 9] = [
    [-5461, -1170],
    [-11703, -4915],
    [-14199, -6606],
    [-15327, -7412],
    [-15864, -7805],
    [-16126, -7999],
    [-16255, -8096],
    [-16320, -8144],
    [-16352, -8168],
];

// ============================================================
// 运行时生成的表
// ============================================================

/// AHT 逆 DCT 余弦表, 按 [块][i-1] 存放 2^23 定点值
static IDCT_COS: OnceLock<[[i32; 5]; 6]> = OnceLock::new();

/// GAQ 5 位分组码 → 3 个增益值
static GAQ_UNGROUP: OnceLock<[[u8; 3]; 32]> = OnceLock::new();

/// 获取 IDCT 余弦表
pub fn idct_cos_table() -> &'static [[i32; 5]; 6] {
    IDCT_COS.get_or_init(|| {
        let mut table = [[0i32; 5]; 6];
        for (blk, row) in table.iter_mut().enumerate() {
            for (k, entry) in row.iter_mut().enumerate() {
                let i = (k + 1) as f64;
                let angle = PI * i * (2 * blk + 1) as f64 / 12.0;
                // 加 0.5 后向零截断
                *entry = (SQRT_2 * angle.cos() * 8_388_608.0 + 0.5) as i32;
            }
        }
        table
    })
}

/// 获取 GAQ 分组反解表
pub fn gaq_ungroup_table() -> &'static [[u8; 3]; 32] {
    GAQ_UNGROUP.get_or_init(|| {
        let mut table = [[0u8; 3]; 32];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = [(i / 9) as u8, ((i % 9) / 3) as u8, (i % 3) as u8];
        }
        table
    })
}

/// 生成全部派生表, 可重复调用
pub fn init_tables() {
    idct_cos_table();
    gaq_ungroup_table();
}
