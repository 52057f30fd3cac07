//! End-to-end runs of the `normproc` binary.

use std::path::Path;
use std::process::{Command, Output};

use normproc_compute::NormalMap;
use normproc_io::{read_sidecar, sidecar_path};
use tempfile::TempDir;

fn normproc(dir: &Path, args: &[&str]) -> Output {
    let output = Command::new(env!("CARGO_BIN_EXE_normproc"))
        .args(["--backend", "cpu"])
        .args(args)
        .env("NORMPROC_HISTORY", dir.join("history.json"))
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "normproc {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

/// 16x16 horizontal ramp saved as a gray RGBA PNG.
fn write_ramp(path: &Path) {
    let bytes: Vec<u8> = (0..16 * 16)
        .flat_map(|i| {
            let v = ((i % 16) * 17) as u8;
            [v, v, v, 255]
        })
        .collect();
    normproc_io::write_png(path, &NormalMap::new(bytes, 16, 16).unwrap()).unwrap();
}

fn read_normals(path: &Path) -> Vec<u8> {
    let decoder = png::Decoder::new(std::io::BufReader::new(std::fs::File::open(path).unwrap()));
    let mut reader = decoder.read_info().unwrap();
    let mut buf = vec![0; reader.output_buffer_size().unwrap()];
    let info = reader.next_frame(&mut buf).unwrap();
    buf.truncate(info.buffer_size());
    buf
}

fn pixel(bytes: &[u8], x: usize, y: usize) -> [u8; 4] {
    let i = (y * 16 + x) * 4;
    [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]
}

#[test]
fn test_convert_writes_default_output_and_history() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("ramp.png");
    write_ramp(&input);

    normproc(dir.path(), &["convert", input.to_str().unwrap(), "-i", "3", "--name", "steep"]);
    let normals = read_normals(&dir.path().join("ramp_Normal.png"));
    assert!(pixel(&normals, 8, 8)[0] < 128);

    let out = normproc(dir.path(), &["history"]);
    let listing = String::from_utf8_lossy(&out.stdout);
    assert!(listing.starts_with("0: steep"), "{listing}");

    let out = dir.path().join("again.png");
    normproc(dir.path(), &["convert", input.to_str().unwrap(), "--from-history", "0", "-o", out.to_str().unwrap()]);
    assert_eq!(read_normals(&out), normals);
}

#[test]
fn test_atlas_then_tile_edit() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sheet.png");
    write_ramp(&input);
    let input_arg = input.to_str().unwrap();

    normproc(dir.path(), &["atlas", input_arg, "--grid", "2x2", "--fill", "-i", "0"]);
    let sidecar = read_sidecar(sidecar_path(&input)).unwrap();
    assert_eq!((sidecar.size.x, sidecar.size.y), (2, 2));
    assert!(sidecar.presets.iter().all(|p| p.intensity == 0.0));
    let flat = read_normals(&dir.path().join("sheet_Normal.png"));
    assert_eq!(pixel(&flat, 12, 12), [128, 128, 255, 255]);

    // Bottom-right tile gets a slope; the rest stays flat.
    normproc(dir.path(), &["tile", input_arg, "--tile", "1,1", "-i", "2"]);
    let sidecar = read_sidecar(sidecar_path(&input)).unwrap();
    assert_eq!(sidecar.presets[3].intensity, 2.0);
    assert_eq!(sidecar.presets[0].intensity, 0.0);

    let edited = read_normals(&dir.path().join("sheet_Normal.png"));
    assert!(pixel(&edited, 12, 12)[0] < 128);
    assert_eq!(pixel(&edited, 4, 4), [128, 128, 255, 255]);
    assert_eq!(pixel(&edited, 12, 4), [128, 128, 255, 255]);
}

#[test]
fn test_backends_lists_cpu() {
    let dir = TempDir::new().unwrap();
    let out = normproc(dir.path(), &["backends"]);
    assert!(String::from_utf8_lossy(&out.stdout).contains("[+] CPU"));
}
