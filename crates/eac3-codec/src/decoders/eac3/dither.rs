//! 抖动噪声发生器.
//!
//! 线性同余发生器, 给定种子与调用序列时输出可复现.

/// 抖动发生器
#[derive(Debug, Clone)]
pub struct DitherGenerator {
    state: u32,
}

impl DitherGenerator {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// 下一个 32 位伪随机数
    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        self.state
    }

    /// AHT 零分配频点的预尾数, 范围 [-4194304, 4194303]
    pub fn aht_value(&mut self) -> i32 {
        (self.next_u32() & 0x7F_FFFF) as i32 - 4_194_304
    }

    /// AC-3 零分配频点的尾数, 幅度约为 2^24 的 0.707 / 2
    pub fn ac3_value(&mut self) -> i32 {
        let r = i64::from(self.next_u32() >> 8);
        (((r * 181) >> 8) - 5_931_008) as i32
    }
}
