//! File round trips for PNG, sidecar and history.

use std::fs;

use normproc_compute::{HeightImage, NormalMap};
use normproc_core::{AtlasState, Preset, PresetHistory, ResponseCurve, TileCoord, TileGrid};
use normproc_io::{
    decode_height, encode_png, load_history, load_sidecar, read_height, save_history,
    save_sidecar, sidecar_path, write_png,
};
use tempfile::TempDir;

fn custom(name: &str, intensity: f32) -> Preset {
    Preset {
        curve: ResponseCurve::from_points(&[(0.0, 0.1), (0.4, 0.7), (1.0, 0.9)]).unwrap(),
        smoothness: 1.5,
        intensity,
        do_tiling: true,
        use_scharr: true,
        name: name.to_string(),
    }
}

#[test]
fn test_normal_png_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("n.png");
    let bytes: Vec<u8> = (0..4 * 4 * 4).map(|i| i as u8).collect();
    let map = NormalMap::new(bytes.clone(), 4, 4).unwrap();
    write_png(&path, &map).unwrap();

    let decoder = png::Decoder::new(std::io::BufReader::new(fs::File::open(&path).unwrap()));
    let mut reader = decoder.read_info().unwrap();
    let mut buf = vec![0; reader.output_buffer_size().unwrap()];
    let info = reader.next_frame(&mut buf).unwrap();
    assert_eq!(info.color_type, png::ColorType::Rgba);
    assert_eq!(&buf[..info.buffer_size()], &bytes[..]);

    assert_eq!(encode_png(&map).unwrap(), fs::read(&path).unwrap());
}

#[test]
fn test_normal_png_reads_back_as_height() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gray.png");
    // Equal channels: luminance equals the channel value.
    let bytes: Vec<u8> = [0u8, 51, 204, 255].iter().flat_map(|&v| [v, v, v, 255]).collect();
    write_png(&path, &NormalMap::new(bytes, 2, 2).unwrap()).unwrap();

    let h = read_height(&path).unwrap();
    assert_eq!(h.dimensions(), (2, 2));
    approx::assert_abs_diff_eq!(h.get(1, 0), 0.2, epsilon = 1e-5);
    approx::assert_abs_diff_eq!(h.get(1, 1), 1.0, epsilon = 1e-5);

    let from_bytes = decode_height(std::io::Cursor::new(fs::read(&path).unwrap())).unwrap();
    assert_eq!(from_bytes, h);
}

#[test]
fn test_sidecar_roundtrip() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("atlas.png");

    let mut atlas = AtlasState::new(TileGrid::new(2, 2).unwrap());
    atlas.set_preset(TileCoord::new(1, 0), custom("rock", 3.0)).unwrap();
    atlas.set_preset(TileCoord::new(0, 1), custom("moss", 0.5)).unwrap();
    let written = save_sidecar(&source, &atlas).unwrap();
    assert_eq!(written, sidecar_path(&source));

    let mut loaded = AtlasState::default();
    assert!(load_sidecar(&source, &mut loaded).unwrap());
    assert_eq!(loaded.grid(), atlas.grid());
    assert_eq!(loaded.presets(), atlas.presets());
}

#[test]
fn test_missing_sidecar_keeps_state() {
    let dir = TempDir::new().unwrap();
    let mut atlas = AtlasState::new(TileGrid::new(3, 1).unwrap());
    let before = atlas.presets().to_vec();
    assert!(!load_sidecar(dir.path().join("none.png"), &mut atlas).unwrap());
    assert_eq!(atlas.presets(), &before[..]);
}

#[test]
fn test_mismatched_sidecar_keeps_state() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("atlas.png");
    let json = serde_json::json!({
        "Size": { "x": 2, "y": 2 },
        "presets": [serde_json::to_value(custom("only", 1.0)).unwrap()],
    });
    fs::write(sidecar_path(&source), json.to_string()).unwrap();

    let mut atlas = AtlasState::new(TileGrid::new(1, 2).unwrap());
    atlas.fill(&custom("mine", 2.0));
    let before = atlas.presets().to_vec();

    assert!(!load_sidecar(&source, &mut atlas).unwrap());
    assert_eq!(atlas.grid(), TileGrid::new(1, 2).unwrap());
    assert_eq!(atlas.presets(), &before[..]);
}

#[test]
fn test_corrupt_sidecar_keeps_state() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("atlas.png");
    fs::write(sidecar_path(&source), "{ not json").unwrap();

    let mut atlas = AtlasState::default();
    let version = atlas.version();
    assert!(!load_sidecar(&source, &mut atlas).unwrap());
    assert_eq!(atlas.version(), version);
}

#[test]
fn test_history_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("history.json");

    let mut history = PresetHistory::new();
    for i in 0..7 {
        history.add(custom(&format!("p{i}"), i as f32));
    }
    save_history(&path, &history).unwrap();

    let loaded = load_history(&path);
    assert_eq!(loaded, history);
    assert_eq!(loaded.len(), 5);
    assert_eq!(loaded.get(0).unwrap().name, "p6");
}

#[test]
fn test_corrupt_history_is_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("history.json");
    fs::write(&path, "[1, 2").unwrap();
    assert!(load_history(&path).is_empty());
    assert!(load_history(dir.path().join("missing.json")).is_empty());
}
