//! 比特流写入器.
//!
//! 按大端位序 (MSB first) 写入定长字段, 与 [`BitReader`](crate::bitreader::BitReader) 对应.
//! 主要用于在测试与基准中合成结构合法的 E-AC-3 帧.

/// 比特流写入器
///
/// # 示例
/// ```
/// use eac3_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0x0B77, 16);
/// bw.write_flag(true);
/// let data = bw.finish();
/// assert_eq!(data, vec![0x0B, 0x77, 0x80]);
/// ```
#[derive(Default)]
pub struct BitWriter {
    data: Vec<u8>,
    /// 尚未凑满一个字节的位 (右对齐)
    acc: u64,
    /// acc 中的有效位数 (0..8)
    acc_bits: u32,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定容量 (字节) 创建
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// 已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.acc_bits as usize
    }

    /// 写入值的低 N 位 (N <= 32)
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "write_bits: n={n} 超过 32 位");
        if n == 0 {
            return;
        }
        let mask = (1u64 << n) - 1;
        self.acc = (self.acc << n) | (u64::from(value) & mask);
        self.acc_bits += n;
        while self.acc_bits >= 8 {
            self.acc_bits -= 8;
            self.data.push((self.acc >> self.acc_bits) as u8);
        }
        self.acc &= (1u64 << self.acc_bits) - 1;
    }

    /// 写入 1 位标志
    pub fn write_flag(&mut self, flag: bool) {
        self.write_bits(u32::from(flag), 1);
    }

    /// 写入 N 位二进制补码有符号数
    pub fn write_signed_bits(&mut self, value: i32, n: u32) {
        self.write_bits(value as u32, n);
    }

    /// 写入 N 个 0 位 (N 可任意大)
    pub fn write_zeros(&mut self, mut n: usize) {
        while n > 0 {
            let chunk = n.min(32);
            self.write_bits(0, chunk as u32);
            n -= chunk;
        }
    }

    /// 以 0 填充到字节边界并返回缓冲区
    pub fn finish(mut self) -> Vec<u8> {
        if self.acc_bits > 0 {
            let pad = 8 - self.acc_bits;
            self.write_bits(0, pad);
        }
        self.data
    }
}
