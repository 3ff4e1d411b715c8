//! AC-3 尾数反量化 (非 AHT 声道).
//!
//! bap 1/2/4 为分组量化, 一个码字携带 2 或 3 个尾数, 同一块内的分组在声道之间
//! 共享: 上一声道剩余的尾数由下一声道继续消费.

use eac3_core::bitreader::BitReader;
use eac3_core::{Eac3Error, Eac3Result};

use super::dither::DitherGenerator;
use super::tables::{MAX_COEFS, QUANTIZATION_BITS};

/// 对称量化电平值, 2^24 定标
fn symmetric(code: u32, levels: u32) -> i32 {
    ((code as i32 - (levels / 2) as i32) << 24) / levels as i32
}

/// 块内共享的分组尾数
#[derive(Debug, Clone, Default)]
pub struct MantissaGroups {
    b1: [i32; 3],
    b1_left: usize,
    b2: [i32; 3],
    b2_left: usize,
    b4: [i32; 2],
    b4_left: usize,
}

impl MantissaGroups {
    fn next_b1(&mut self, br: &mut BitReader) -> Eac3Result<i32> {
        if self.b1_left == 0 {
            let code = br.read_bits(5)?;
            self.b1 = [
                symmetric(code / 9, 3),
                symmetric((code % 9) / 3, 3),
                symmetric(code % 3, 3),
            ];
            self.b1_left = 3;
        }
        self.b1_left -= 1;
        Ok(self.b1[2 - self.b1_left])
    }

    fn next_b2(&mut self, br: &mut BitReader) -> Eac3Result<i32> {
        if self.b2_left == 0 {
            let code = br.read_bits(7)?;
            self.b2 = [
                symmetric(code / 25, 5),
                symmetric((code % 25) / 5, 5),
                symmetric(code % 5, 5),
            ];
            self.b2_left = 3;
        }
        self.b2_left -= 1;
        Ok(self.b2[2 - self.b2_left])
    }

    fn next_b4(&mut self, br: &mut BitReader) -> Eac3Result<i32> {
        if self.b4_left == 0 {
            let code = br.read_bits(7)?;
            self.b4 = [symmetric(code / 11, 11), symmetric(code % 11, 11)];
            self.b4_left = 2;
        }
        self.b4_left -= 1;
        Ok(self.b4[1 - self.b4_left])
    }
}

/// 反量化一个声道 `[start, end)` 的尾数并按指数还原系数
#[allow(clippy::too_many_arguments)]
pub fn decode_channel(
    br: &mut BitReader,
    groups: &mut MantissaGroups,
    bap: &[u8; MAX_COEFS],
    exps: &[u8; MAX_COEFS],
    start: usize,
    end: usize,
    dither_on: bool,
    dither: &mut DitherGenerator,
    out: &mut [i32; MAX_COEFS],
) -> Eac3Result<()> {
    for bin in start..end {
        let mant = match bap[bin] {
            0 => {
                if dither_on {
                    dither.ac3_value()
                } else {
                    0
                }
            }
            1 => groups.next_b1(br)?,
            2 => groups.next_b2(br)?,
            3 => symmetric(br.read_bits(3)?, 7),
            4 => groups.next_b4(br)?,
            5 => symmetric(br.read_bits(4)?, 15),
            b @ 6..=15 => {
                let bits = QUANTIZATION_BITS[b as usize];
                br.read_signed_bits(bits)? << (24 - bits)
            }
            b => {
                return Err(Eac3Error::Bitstream(format!("bap {b} 超出 AC-3 范围")));
            }
        };
        out[bin] = mant >> exps[bin];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eac3_core::bitwriter::BitWriter;

    #[test]
    fn test_symmetric_levels() {
        assert_eq!(symmetric(1, 3), 0);
        assert_eq!(symmetric(2, 3), (1 << 24) / 3);
        assert_eq!(symmetric(0, 3), -(1 << 24) / 3);
        assert_eq!(symmetric(7, 15), 0);
    }

    #[test]
    fn test_grouped_mantissas_shared_across_channels() {
        let mut bw = BitWriter::new();
        bw.write_bits(23, 5); // [2, 1, 2]
        let data = bw.finish();

        let mut bap = [0u8; MAX_COEFS];
        bap[..2].fill(1);
        let exps = [0u8; MAX_COEFS];
        let mut groups = MantissaGroups::default();
        let mut dither = DitherGenerator::new(0);
        let mut br = BitReader::new(&data);

        let mut first = [0i32; MAX_COEFS];
        decode_channel(&mut br, &mut groups, &bap, &exps, 0, 2, false, &mut dither, &mut first)
            .unwrap();
        let mut second = [0i32; MAX_COEFS];
        decode_channel(&mut br, &mut groups, &bap, &exps, 0, 1, false, &mut dither, &mut second)
            .unwrap();

        assert_eq!(br.bits_read(), 5);
        let two = symmetric(2, 3);
        assert_eq!(first[..2], [two, 0]);
        assert_eq!(second[0], two);
    }

    #[test]
    fn test_asymmetric_and_exponent_shift() {
        let mut bw = BitWriter::new();
        bw.write_signed_bits(-3, 5); // bap 6
        bw.write_signed_bits(100, 16); // bap 15
        let data = bw.finish();

        let mut bap = [0u8; MAX_COEFS];
        bap[0] = 6;
        bap[1] = 15;
        let mut exps = [0u8; MAX_COEFS];
        exps[0] = 2;
        exps[1] = 8;
        let mut out = [0i32; MAX_COEFS];
        decode_channel(
            &mut BitReader::new(&data),
            &mut MantissaGroups::default(),
            &bap,
            &exps,
            0,
            2,
            false,
            &mut DitherGenerator::new(0),
            &mut out,
        )
        .unwrap();
        assert_eq!(out[0], (-3 << 19) >> 2);
        assert_eq!(out[1], (100 << 8) >> 8);
    }

    #[test]
    fn test_zero_bap_dither() {
        let bap = [0u8; MAX_COEFS];
        let exps = [0u8; MAX_COEFS];
        let data = [0u8; 1];
        let mut out = [0i32; MAX_COEFS];
        let mut br = BitReader::new(&data);
        decode_channel(
            &mut br,
            &mut MantissaGroups::default(),
            &bap,
            &exps,
            0,
            8,
            true,
            &mut DitherGenerator::new(3),
            &mut out,
        )
        .unwrap();
        assert_eq!(br.bits_read(), 0);
        assert!(out[..8].iter().any(|&v| v != 0));

        decode_channel(
            &mut br,
            &mut MantissaGroups::default(),
            &bap,
            &exps,
            0,
            8,
            false,
            &mut DitherGenerator::new(3),
            &mut out,
        )
        .unwrap();
        assert!(out[..8].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_hebap_value_rejected() {
        let mut bap = [0u8; MAX_COEFS];
        bap[0] = 16;
        let exps = [0u8; MAX_COEFS];
        let data = [0u8; 4];
        let mut out = [0i32; MAX_COEFS];
        let err = decode_channel(
            &mut BitReader::new(&data),
            &mut MantissaGroups::default(),
            &bap,
            &exps,
            0,
            1,
            false,
            &mut DitherGenerator::new(0),
            &mut out,
        )
        .unwrap_err();
        assert!(err.is_bitstream());
    }
}
