//! Parse containers back with hound and compare against what was appended.

use murmur_wav::{StreamingWavWriter, WavSpec};

fn quantize(s: f32) -> i16 {
    (s.clamp(-1.0, 1.0) * 32767.0) as i16
}

#[test]
fn written_container_parses_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.wav");

    let spec = WavSpec::default();
    let mut writer = StreamingWavWriter::create(&path, spec).unwrap();

    // A low-frequency sine plus a partial trailing frame.
    let samples: Vec<f32> = (0..512 * 5 + 133)
        .map(|i| (i as f32 * 0.01).sin() * 0.8)
        .collect();
    for chunk in samples.chunks(512) {
        writer.append(chunk).unwrap();
    }
    writer.finalize().unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    let read_spec = reader.spec();
    assert_eq!(read_spec.channels, 1);
    assert_eq!(read_spec.sample_rate, 16_000);
    assert_eq!(read_spec.bits_per_sample, 16);
    assert_eq!(read_spec.sample_format, hound::SampleFormat::Int);

    let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    let expected: Vec<i16> = samples.iter().map(|&s| quantize(s)).collect();
    assert_eq!(decoded, expected);
}

#[test]
fn empty_container_is_playable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.wav");

    let mut writer = StreamingWavWriter::create(&path, WavSpec::default()).unwrap();
    writer.finalize().unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.duration(), 0);
    assert_eq!(reader.samples::<i16>().count(), 0);
}
