//! End-to-end pipeline tests.

use hscodec_rs::{
    decompress, BandDeletion, CodecError, CodingParams, Compressor, HyperImage, ImageHeader,
};

fn ramp_image(bands: usize, lines: usize, samples: usize) -> HyperImage {
    let header = ImageHeader::new(bands, lines, samples, 16, true);
    let mut data = Vec::with_capacity(bands * lines * samples);
    for b in 0..bands {
        for l in 0..lines {
            for s in 0..samples {
                // Smooth ramps plus a band-dependent texture term.
                let v = (l as i32 * 37 + s as i32 * 23) % 400 - 200 + (b as i32 * 11);
                data.push(v);
            }
        }
    }
    HyperImage::from_samples(header, data).unwrap()
}

fn max_abs_error(a: &HyperImage, b: &HyperImage) -> i32 {
    let mut worst = 0;
    for band in 0..a.bands() {
        for line in 0..a.lines() {
            for sample in 0..a.samples() {
                let d = (a.get(band, line, sample) - b.get(band, line, sample)).abs();
                worst = worst.max(d);
            }
        }
    }
    worst
}

#[test]
fn one_band_roundtrip_within_quantizer_bound() {
    let _ = env_logger::builder().is_test(true).try_init();

    let image = ramp_image(1, 8, 8);
    let params = CodingParams {
        wave_passes: 2,
        ..CodingParams::default()
    };
    let compressor = Compressor::new(params).unwrap();
    let mut reduction = BandDeletion::identity();

    let stream = compressor.compress(&image, &mut reduction).unwrap();
    let decoded = decompress(&stream, image.header()).unwrap();

    let worst = max_abs_error(&image, &decoded);
    assert!(worst <= 2, "worst reconstruction error {worst}");
}

#[test]
fn multi_band_odd_geometry_roundtrip() {
    let image = ramp_image(3, 13, 11);
    let params = CodingParams {
        wave_passes: 2,
        nominal_block_dim: 4,
        max_block_dim: 16,
        ..CodingParams::default()
    };
    let compressor = Compressor::new(params).unwrap();
    let mut reduction = BandDeletion::identity();

    let stream = compressor.compress(&image, &mut reduction).unwrap();
    let decoded = decompress(&stream, image.header()).unwrap();

    let worst = max_abs_error(&image, &decoded);
    assert!(worst <= 2, "worst reconstruction error {worst}");
}

#[test]
fn band_deletion_zeroes_dropped_bands() {
    let image = ramp_image(4, 8, 8);
    let compressor = Compressor::new(CodingParams::default()).unwrap();
    let mut reduction = BandDeletion::new(2);

    let stream = compressor.compress(&image, &mut reduction).unwrap();
    let decoded = decompress(&stream, image.header()).unwrap();

    // Kept bands reconstruct closely, deleted bands are zero.
    for line in 0..8 {
        for sample in 0..8 {
            assert!((decoded.get(0, line, sample) - image.get(0, line, sample)).abs() <= 2);
            assert_eq!(decoded.get(3, line, sample), 0);
        }
    }
}

#[test]
fn bitstream_is_deterministic() {
    let image = ramp_image(2, 16, 16);
    let compressor = Compressor::new(CodingParams::default()).unwrap();

    let a = compressor
        .compress(&image, &mut BandDeletion::identity())
        .unwrap();
    let b = compressor
        .compress(&image, &mut BandDeletion::identity())
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn truncated_stream_fails_cleanly() {
    let image = ramp_image(1, 8, 8);
    let compressor = Compressor::new(CodingParams::default()).unwrap();
    let stream = compressor
        .compress(&image, &mut BandDeletion::identity())
        .unwrap();

    let cut = &stream[..stream.len() / 2];
    match decompress(cut, image.header()) {
        Err(CodecError::TruncatedStream) => {}
        other => panic!("expected TruncatedStream, got {other:?}"),
    }
}

#[test]
fn corrupt_reduction_tag_is_rejected() {
    let image = ramp_image(1, 8, 8);
    let compressor = Compressor::new(CodingParams::default()).unwrap();
    let mut stream = compressor
        .compress(&image, &mut BandDeletion::identity())
        .unwrap();

    // The reduction tag byte sits right after the 9-byte parameter block.
    stream[9] = 0x7E;
    assert_eq!(
        decompress(&stream, image.header()).err(),
        Some(CodecError::UnknownReductionTag(0x7E))
    );
}
