//! E-AC-3 解码管线集成测试.
//!
//! 以合成码流驱动公开接口: 配置 → 解码器 → 逐帧解码.

use eac3::codec::decoders::eac3::bit_alloc::MAX_BANDS;
use eac3::codec::decoders::eac3::tables::{MAX_COEFS, SYNC_WORD};
use eac3::codec::{
    BapTable, BitAllocParams, BitAllocator, DeltaBitAlloc, Eac3Decoder, VqCodebook,
};
use eac3::core::{BitWriter, Eac3Error, Eac3Result};
use eac3::Config;

/// 所有频点固定 bap=5 (4 位, 15 电平)
struct FixedBap;

impl BitAllocator for FixedBap {
    fn compute_psd(
        &self,
        _exponents: &[u8],
        _start: usize,
        _end: usize,
        _psd: &mut [i16; MAX_COEFS],
        _band_psd: &mut [i16; MAX_BANDS],
    ) {
    }

    fn compute_mask(
        &self,
        _params: &BitAllocParams,
        _band_psd: &[i16; MAX_BANDS],
        _start: usize,
        _end: usize,
        _fast_gain: i32,
        _is_lfe: bool,
        _dba: &DeltaBitAlloc,
        _mask: &mut [i16; MAX_BANDS],
    ) -> Eac3Result<()> {
        Ok(())
    }

    fn compute_bap(
        &self,
        _mask: &[i16; MAX_BANDS],
        _psd: &[i16; MAX_COEFS],
        start: usize,
        end: usize,
        _snr_offset: i32,
        _floor: i32,
        _table: BapTable,
        bap: &mut [u8; MAX_COEFS],
    ) {
        bap[start..end].fill(5);
    }
}

struct EmptyCodebook;

impl VqCodebook for EmptyCodebook {
    fn vector(&self, _hebap: u8, _index: u32) -> Option<[i16; 6]> {
        None
    }
}

fn create_decoder(config_json: &str) -> Eac3Decoder {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = Config::from_json(config_json).unwrap();
    eac3::create_decoder(&config, Box::new(FixedBap), Box::new(EmptyCodebook))
}

const FLAT_GROUP: u32 = 62;
/// 带宽码 0 对应的结束频点
const END_FREQ: usize = 73;
const ABSEXP: u32 = 10;

fn level(code: u32) -> i32 {
    (((code as i32 - 7) << 24) / 15) >> ABSEXP
}

/// 无耦合的合成独立帧
struct SyntheticFrame {
    strmtyp: u32,
    acmod: u32,
    fbw: usize,
    lfe: bool,
    numblkscod: u32,
    blocks: usize,
    code: u32,
}

impl SyntheticFrame {
    fn stereo() -> Self {
        Self {
            strmtyp: 0,
            acmod: 2,
            fbw: 2,
            lfe: false,
            numblkscod: 3,
            blocks: 6,
            code: 12,
        }
    }

    fn surround_5_1() -> Self {
        Self {
            strmtyp: 0,
            acmod: 7,
            fbw: 5,
            lfe: true,
            numblkscod: 0,
            blocks: 1,
            code: 2,
        }
    }

    /// 帧长固定 1024 字节
    fn build(&self) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bits(SYNC_WORD, 16);
        bw.write_bits(self.strmtyp, 2);
        bw.write_bits(0, 3);
        bw.write_bits(511, 11);
        bw.write_bits(0, 2);
        bw.write_bits(self.numblkscod, 2);
        bw.write_bits(self.acmod, 3);
        bw.write_flag(self.lfe);

        // bsi: bsid, dialnorm, compre, mixmdate, infomdate
        bw.write_bits(16, 5);
        bw.write_bits(31, 5);
        bw.write_zeros(3);
        if self.blocks != 6 {
            bw.write_flag(false); // convsync
        }
        bw.write_flag(false); // addbsie

        // audfrm
        if self.blocks == 6 {
            bw.write_flag(true); // expstre
            bw.write_flag(false); // ahte
        }
        bw.write_bits(0, 2);
        bw.write_zeros(8);
        if self.acmod > 1 {
            bw.write_zeros(self.blocks); // cplinu / cplstre
        }
        for blk in 0..self.blocks {
            for _ in 0..self.fbw {
                bw.write_bits(u32::from(blk == 0), 2);
            }
        }
        if self.lfe {
            for blk in 0..self.blocks {
                bw.write_flag(blk == 0);
            }
        }
        if self.blocks == 6 {
            bw.write_zeros(5 * self.fbw);
        } else {
            bw.write_flag(false);
        }
        bw.write_bits(15, 6);
        bw.write_bits(0, 4);
        if self.blocks > 1 {
            bw.write_flag(false); // blkstrtinfoe
        }

        for blk in 0..self.blocks {
            bw.write_flag(false); // dynrnge
            bw.write_flag(false); // spxinu / spxstre
            if self.acmod == 2 {
                bw.write_zeros(if blk == 0 { 4 } else { 1 });
            }
            if blk == 0 {
                for _ in 0..self.fbw {
                    bw.write_bits(0, 6);
                }
                for _ in 0..self.fbw {
                    bw.write_bits(ABSEXP, 4);
                    for _ in 0..(END_FREQ - 1) / 3 {
                        bw.write_bits(FLAT_GROUP, 7);
                    }
                    bw.write_bits(0, 2);
                }
                if self.lfe {
                    bw.write_bits(ABSEXP, 4);
                    bw.write_bits(FLAT_GROUP, 7);
                    bw.write_bits(FLAT_GROUP, 7);
                }
            }
            bw.write_flag(false); // convsnroffste
            for _ in 0..self.fbw * END_FREQ {
                bw.write_bits(self.code, 4);
            }
            if self.lfe {
                for _ in 0..7 {
                    bw.write_bits(self.code, 4);
                }
            }
        }

        let mut data = bw.finish();
        data.resize(1024, 0);
        data
    }
}

#[test]
fn test_stereo_stream_decode() {
    let frame = SyntheticFrame::stereo().build();
    let mut stream = frame.clone();
    stream.extend_from_slice(&frame);

    let mut decoder = create_decoder("{}");
    let mut offset = 0;
    while offset < stream.len() {
        let decoded = decoder.decode_frame(&stream[offset..]).unwrap();
        assert_eq!(decoded.blocks.len(), 6);
        for block in &decoded.blocks {
            assert_eq!(block.channels.len(), 2);
            for channel in &block.channels {
                assert_eq!(channel.end_freq, END_FREQ);
                assert!(channel.coeffs.iter().all(|&c| c == level(12)));
            }
        }
        offset += decoded.sync().frame_size;
    }
    assert_eq!(decoder.frames_decoded(), 2);
}

#[test]
fn test_surround_single_block_with_lfe() {
    let frame = SyntheticFrame::surround_5_1().build();
    let mut decoder = create_decoder(r#"{"decoder": {"dither_seed": 1}}"#);
    let decoded = decoder.decode_frame(&frame).unwrap();

    assert_eq!(decoded.header.num_blocks(), 1);
    assert_eq!(decoded.header.channels(), 6);
    let block = &decoded.blocks[0];
    assert!(block.rematrixing.is_empty());
    assert_eq!(block.channels.len(), 6);

    let lfe = &block.channels[5];
    assert_eq!(lfe.channel, 6);
    assert_eq!((lfe.start_freq, lfe.end_freq), (0, 7));
    assert_eq!(lfe.coeffs, vec![level(2); 7]);
    assert_eq!(block.channels[4].coeffs.len(), END_FREQ);
    assert_eq!(block.block_switch.len(), 5);
}

#[test]
fn test_bits_consumed_within_frame() {
    let frame = SyntheticFrame::surround_5_1().build();
    let mut decoder = create_decoder("{}");
    let decoded = decoder.decode_frame(&frame).unwrap();
    let expected = 40 + 13 + 1 + 1 + 2 + 8 + 1 + 10 + 1 + 1 + 10 // 帧头
        + 2                                                      // dynrnge, spxinu
        + 5 * 6 + 5 * (4 + 24 * 7 + 2) + (4 + 2 * 7)             // 带宽与指数
        + 1                                                      // convsnroffste
        + (5 * END_FREQ + 7) * 4; // 尾数
    assert_eq!(decoded.bits_consumed, expected);
}

#[test]
fn test_dependent_frame_then_recover() {
    let mut dependent = SyntheticFrame::stereo();
    dependent.strmtyp = 1;
    let mut decoder = create_decoder("{}");

    let err = decoder.decode_frame(&dependent.build()).unwrap_err();
    assert!(matches!(err, Eac3Error::UnsupportedFeature(_)));
    assert_eq!(decoder.frames_decoded(), 0);

    decoder
        .decode_frame(&SyntheticFrame::stereo().build())
        .unwrap();
    assert_eq!(decoder.frames_decoded(), 1);
}

#[test]
fn test_garbage_is_bitstream_error() {
    let mut decoder = create_decoder("{}");
    let err = decoder.decode_frame(&[0xFF; 64]).unwrap_err();
    assert!(err.is_bitstream());
}

#[test]
fn test_reset_keeps_config() {
    let mut decoder = create_decoder(r#"{"decoder": {"enable_enhanced_coupling": true}}"#);
    decoder
        .decode_frame(&SyntheticFrame::stereo().build())
        .unwrap();
    decoder.reset();
    assert!(decoder.config().enable_enhanced_coupling);
    decoder
        .decode_frame(&SyntheticFrame::stereo().build())
        .unwrap();
}
