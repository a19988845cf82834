// Unit tests for the format converter's frame-count and channel-map
// guarantees.

use parley::audio::FormatConverter;

#[test]
fn test_output_frame_count_matches_ceiling() {
    let cases: &[(u32, usize)] = &[
        (8000, 800),
        (16000, 1600),
        (22050, 2205),
        (44100, 4410),
        (44100, 441),
        (48000, 4800),
        (48000, 479),
        (96000, 9600),
    ];

    for &(rate, frames) in cases {
        let conv = FormatConverter::new(rate, 1).unwrap();
        let expected = (frames * 16000).div_ceil(rate as usize);

        assert_eq!(
            conv.output_capacity(frames),
            expected,
            "capacity for {} frames at {}Hz",
            frames,
            rate
        );

        let out = conv.convert(&vec![100i16; frames]).unwrap();
        let diff = out.len() as i64 - expected as i64;
        assert!(
            diff.abs() <= 1,
            "{} frames at {}Hz: got {} output frames, expected {}",
            frames,
            rate,
            out.len(),
            expected
        );
    }
}

#[test]
fn test_downsample_preserves_constant_signal() {
    let conv = FormatConverter::new(48000, 1).unwrap();
    let out = conv.convert(&vec![5000i16; 4800]).unwrap();

    assert_eq!(out.len(), 1600);
    assert!(out.iter().all(|&s| s == 5000));
}

#[test]
fn test_upsample_from_low_rate() {
    let conv = FormatConverter::new(8000, 1).unwrap();
    let out = conv.convert(&vec![1000i16; 800]).unwrap();

    // 8 kHz -> 16 kHz doubles the frame count
    assert_eq!(out.len(), 1600);
    assert!(out.iter().all(|&s| s == 1000));
}

#[test]
fn test_channel_map_selects_channel_zero() {
    let conv = FormatConverter::new(16000, 3).unwrap();
    // 3-channel interleaved: only channel 0 carries signal
    let interleaved = vec![10, -999, -999, 20, -999, -999, 30, -999, -999];

    assert_eq!(conv.convert(&interleaved).unwrap(), vec![10, 20, 30]);
}

#[test]
fn test_single_frame_conversion_is_not_an_error() {
    // A near-miss conversion window: one 44.1 kHz frame still yields
    // ceil(1 * 16000 / 44100) = 1 output frame, never an error.
    let conv = FormatConverter::new(44100, 1).unwrap();
    let out = conv.convert(&[1234]).unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0], 1234);
}

#[test]
fn test_invalid_format_is_hard_error() {
    assert!(FormatConverter::new(0, 2).is_err());
    assert!(FormatConverter::new(44100, 0).is_err());
}
