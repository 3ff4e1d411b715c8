//! 比特分配衔接层.
//!
//! 心理声学模型本身 (功率谱密度, 掩蔽曲线, bap 计算) 由外部引擎通过
//! [`BitAllocator`] 提供; 本模块负责保存各声道的分配状态, 并按每块的
//! "需要重算的阶段" 调用引擎.

use eac3_core::Eac3Result;

use super::tables::{
    DB_PER_BIT, DEFAULT_BA_INDICES, FAST_DECAY, FLOOR, MAX_CHANNELS, MAX_COEFS, SLOW_DECAY,
    SLOW_GAIN,
};

/// 临界频带数
pub const MAX_BANDS: usize = 50;

/// 最多 8 段增量比特分配
pub const MAX_DBA_SEGS: usize = 8;

/// bap 查找表选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BapTable {
    /// AC-3 标准 bap 表 (0..=15)
    Ac3,
    /// E-AC-3 高效 bap 表 (0..=19), 用于 AHT 声道
    Hebap,
}

/// 比特分配参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitAllocParams {
    pub sr_code: u8,
    pub sr_shift: u8,
    pub slow_decay: i32,
    pub fast_decay: i32,
    pub slow_gain: i32,
    pub db_per_bit: i32,
    pub floor: i32,
    /// 耦合快泄漏码 (原始 3 位值)
    pub cpl_fast_leak: i32,
    /// 耦合慢泄漏码 (原始 3 位值)
    pub cpl_slow_leak: i32,
}

impl BitAllocParams {
    /// 按表索引设置参数: 慢衰减, 快衰减, 慢增益, 每比特 dB, 下限
    pub fn set_from_indices(&mut self, idx: [usize; 5]) {
        self.slow_decay = SLOW_DECAY[idx[0]];
        self.fast_decay = FAST_DECAY[idx[1]];
        self.slow_gain = SLOW_GAIN[idx[2]];
        self.db_per_bit = DB_PER_BIT[idx[3]];
        self.floor = FLOOR[idx[4]];
    }

    /// 帧语法未携带参数时的默认值
    pub fn set_defaults(&mut self) {
        self.set_from_indices(DEFAULT_BA_INDICES);
    }
}

/// 增量比特分配模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DbaMode {
    Reuse,
    New,
    #[default]
    None,
    Reserved,
}

impl DbaMode {
    pub fn from_code(code: u32) -> Self {
        match code & 3 {
            0 => Self::Reuse,
            1 => Self::New,
            2 => Self::None,
            _ => Self::Reserved,
        }
    }
}

/// 单声道的增量比特分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeltaBitAlloc {
    pub mode: DbaMode,
    /// 段数 (1..=8)
    pub num_segs: usize,
    pub offsets: [u8; MAX_DBA_SEGS],
    pub lengths: [u8; MAX_DBA_SEGS],
    pub values: [u8; MAX_DBA_SEGS],
}

/// 外部比特分配引擎
///
/// 实现需与 AC-3 标准的参数化比特分配逐位一致.
pub trait BitAllocator {
    /// 由指数计算功率谱密度与频带 PSD
    fn compute_psd(
        &self,
        exponents: &[u8],
        start: usize,
        end: usize,
        psd: &mut [i16; MAX_COEFS],
        band_psd: &mut [i16; MAX_BANDS],
    );

    /// 计算掩蔽曲线, 非法的增量比特分配应返回错误
    #[allow(clippy::too_many_arguments)]
    fn compute_mask(
        &self,
        params: &BitAllocParams,
        band_psd: &[i16; MAX_BANDS],
        start: usize,
        end: usize,
        fast_gain: i32,
        is_lfe: bool,
        dba: &DeltaBitAlloc,
        mask: &mut [i16; MAX_BANDS],
    ) -> Eac3Result<()>;

    /// 由掩蔽曲线与 PSD 计算 bap
    #[allow(clippy::too_many_arguments)]
    fn compute_bap(
        &self,
        mask: &[i16; MAX_BANDS],
        psd: &[i16; MAX_COEFS],
        start: usize,
        end: usize,
        snr_offset: i32,
        floor: i32,
        table: BapTable,
        bap: &mut [u8; MAX_COEFS],
    );
}

/// 单声道的比特分配状态
#[derive(Debug, Clone)]
pub struct ChannelAlloc {
    pub psd: [i16; MAX_COEFS],
    pub band_psd: [i16; MAX_BANDS],
    pub mask: [i16; MAX_BANDS],
    pub bap: [u8; MAX_COEFS],
    pub snr_offset: i32,
    pub fast_gain: i32,
    pub dba: DeltaBitAlloc,
}

impl Default for ChannelAlloc {
    fn default() -> Self {
        Self {
            psd: [0; MAX_COEFS],
            band_psd: [0; MAX_BANDS],
            mask: [0; MAX_BANDS],
            bap: [0; MAX_COEFS],
            snr_offset: 0,
            fast_gain: 0,
            dba: DeltaBitAlloc::default(),
        }
    }
}

/// 全部声道的比特分配状态
#[derive(Debug, Clone)]
pub struct BitAllocState {
    pub params: BitAllocParams,
    pub channels: [ChannelAlloc; MAX_CHANNELS],
}

impl Default for BitAllocState {
    fn default() -> Self {
        Self {
            params: BitAllocParams::default(),
            channels: std::array::from_fn(|_| ChannelAlloc::default()),
        }
    }
}

/// 每块需要重算的比特分配阶段
///
/// 3 = PSD + 掩蔽 + bap, 2 = 掩蔽 + bap, 1 = 仅 bap, 0 = 沿用上一块.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStages([u8; MAX_CHANNELS]);

impl AllocStages {
    /// 所有声道全量重算
    pub fn set_all(&mut self, stage: u8) {
        self.0 = [stage; MAX_CHANNELS];
    }

    /// 提升到至少 `stage`
    pub fn raise(&mut self, ch: usize, stage: u8) {
        self.0[ch] = self.0[ch].max(stage);
    }

    pub fn get(&self, ch: usize) -> u8 {
        self.0[ch]
    }
}

/// 声道频率范围与指数, 供引擎计算使用
pub struct ChannelSpectrum<'a> {
    pub exponents: &'a [u8; MAX_COEFS],
    pub start: usize,
    pub end: usize,
    pub is_lfe: bool,
    pub table: BapTable,
}

impl BitAllocState {
    /// 按阶段为单个声道运行比特分配
    pub fn run_channel(
        &mut self,
        allocator: &dyn BitAllocator,
        ch: usize,
        stage: u8,
        spectrum: &ChannelSpectrum,
    ) -> Eac3Result<()> {
        let params = self.params;
        let state = &mut self.channels[ch];
        if stage > 2 {
            allocator.compute_psd(
                spectrum.exponents,
                spectrum.start,
                spectrum.end,
                &mut state.psd,
                &mut state.band_psd,
            );
        }
        if stage > 1 {
            allocator.compute_mask(
                &params,
                &state.band_psd,
                spectrum.start,
                spectrum.end,
                state.fast_gain,
                spectrum.is_lfe,
                &state.dba,
                &mut state.mask,
            )?;
        }
        if stage > 0 {
            allocator.compute_bap(
                &state.mask,
                &state.psd,
                spectrum.start,
                spectrum.end,
                state.snr_offset,
                params.floor,
                spectrum.table,
                &mut state.bap,
            );
        }
        Ok(())
    }
}
