mod common;
use common::gaussian_signal;
use eegcond::io::{Signal, SignalFile, StWriter};
use eegcond::{condition, ChannelLayout, ConditionerConfig, FilterConfig};

#[test]
fn f32_recording_round_trips_with_sfreq() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.safetensors");
    let raw = gaussian_signal(5, 40, 1).mapv(|v| v as f32);

    let mut w = StWriter::new();
    w.add_f32_arr2("data", &raw);
    w.add_f32("sfreq", &[250.0], &[1]);
    w.write(&path).unwrap();

    let file = SignalFile::load(&path).unwrap();
    assert_eq!(file.sfreq, Some(250.0));
    assert_eq!(file.data, Signal::F32(raw));
}

#[test]
fn f64_recording_without_sfreq() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rec.safetensors");
    let raw = gaussian_signal(3, 17, 2);

    let mut w = StWriter::new();
    w.add_signal("data", &Signal::F64(raw.clone()));
    w.add_indices("unused", &[4, 5]);
    w.write(&path).unwrap();

    let file = SignalFile::load(&path).unwrap();
    assert_eq!(file.sfreq, None);
    assert_eq!(file.data.dtype(), "F64");
    assert_eq!(file.data, Signal::F64(raw));
}

#[test]
fn missing_data_key_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.safetensors");
    let mut w = StWriter::new();
    w.add_f64("sfreq", &[1000.0], &[1]);
    w.write(&path).unwrap();

    let err = SignalFile::load(&path).err().unwrap();
    assert!(err.to_string().contains("'data'"), "{err}");
}

#[test]
fn three_dimensional_data_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("epochs.safetensors");
    let mut w = StWriter::new();
    w.add_f32("data", &[0.0; 8], &[2, 2, 2]);
    w.write(&path).unwrap();

    assert!(SignalFile::load(&path).is_err());
}

#[test]
fn truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.safetensors");
    std::fs::write(&path, [1u8, 0, 0]).unwrap();
    assert!(SignalFile::load(&path).is_err());
}

#[test]
fn conditioned_output_survives_a_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cleaned.safetensors");
    let raw = gaussian_signal(8, 200, 3);
    let cfg = ConditionerConfig::new(
        FilterConfig::new(250.0, 1.0, 40.0, 4).unwrap(),
        ChannelLayout::new("eight", [7]),
    );
    let out = condition(raw.view(), &cfg).unwrap();

    let mut w = StWriter::new();
    w.add_f64_arr2("data", &out.data);
    w.add_f64("sfreq", &[250.0], &[1]);
    w.write(&path).unwrap();

    let back = SignalFile::load(&path).unwrap();
    let Signal::F64(data) = back.data else {
        panic!("expected F64 data");
    };
    assert_eq!(data.dim(), (7, 200));
    assert_eq!(data, out.data);
}
