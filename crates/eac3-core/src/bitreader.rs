//! 比特流读取器.
//!
//! 按大端位序 (MSB first) 从帧缓冲区读取定长字段, 与 AC-3 / E-AC-3 码流的位序一致.
//!
//! 读取越过缓冲区末尾时返回 [`Eac3Error::Eof`], 游标保持不变, 绝不会读到缓冲区之外.

use crate::{Eac3Error, Eac3Result};

/// 比特流读取器
///
/// # 示例
/// ```
/// use eac3_core::bitreader::BitReader;
///
/// let data = [0x0B, 0x77, 0b1010_0000];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(16).unwrap(), 0x0B77);
/// assert!(br.read_flag().unwrap());
/// assert_eq!(br.read_signed_bits(3).unwrap(), 2);
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    /// 已消耗的位数
    pos: usize,
    /// 缓冲区总位数
    len: usize,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            len: data.len() * 8,
        }
    }

    /// 已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.pos
    }

    /// 剩余可读位数
    pub fn bits_remaining(&self) -> usize {
        self.len - self.pos
    }

    /// 读取 N 个位 (0..=32), 返回值的低 N 位有效
    pub fn read_bits(&mut self, n: u32) -> Eac3Result<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(Eac3Error::InvalidArgument(format!(
                "read_bits: n={n} 超过 32 位"
            )));
        }
        if n as usize > self.bits_remaining() {
            return Err(Eac3Error::Eof);
        }

        // 一次最多跨越 5 个字节, 装入 64 位窗口后移位取出
        let first = self.pos >> 3;
        let last = (self.pos + n as usize - 1) >> 3;
        let mut window = 0u64;
        for &byte in &self.data[first..=last] {
            window = (window << 8) | u64::from(byte);
        }
        let tail = ((last + 1) << 3) - (self.pos + n as usize);
        let value = (window >> tail) & ((1u64 << n) - 1);

        self.pos += n as usize;
        Ok(value as u32)
    }

    /// 读取 N 位二进制补码有符号数
    pub fn read_signed_bits(&mut self, n: u32) -> Eac3Result<i32> {
        let raw = self.read_bits(n)?;
        if n == 0 || n == 32 {
            return Ok(raw as i32);
        }
        let shift = 32 - n;
        Ok(((raw << shift) as i32) >> shift)
    }

    /// 读取 1 位标志
    pub fn read_flag(&mut self) -> Eac3Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// 跳过 N 个位, 支持任意长度 (附加信息, skip 字段等)
    pub fn skip_bits(&mut self, n: usize) -> Eac3Result<()> {
        if n > self.bits_remaining() {
            return Err(Eac3Error::Eof);
        }
        self.pos += n;
        Ok(())
    }
}
