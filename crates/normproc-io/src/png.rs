//! PNG format support.
//!
//! Height sources are read as 8 or 16-bit gray, gray+alpha, RGB or RGBA
//! (palette and sub-byte depths are expanded by the decoder) and reduced to
//! Rec.709 luminance in `[0, 1]`. Alpha is ignored. Normal maps are written
//! as 8-bit RGBA.
//!
//! # Example
//!
//! ```rust,ignore
//! use normproc_io::png;
//!
//! let height = png::read_height("rock.png")?;
//! png::write_png(png::default_output_path("rock.png"), &normals)?;
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use normproc_compute::{HeightImage, NormalMap};
use tracing::debug;

use crate::{IoError, IoResult};

/// Rec.709 luma weights.
const REC709: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Suffix appended to the source stem for the default output file.
pub const OUTPUT_SUFFIX: &str = "_Normal";

/// Reads a PNG file as a height field.
pub fn read_height<P: AsRef<Path>>(path: P) -> IoResult<HeightImage> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let image = decode_height(BufReader::new(file))?;
    debug!(path = %path.display(), width = image.width(), height = image.height(), "read height source");
    Ok(image)
}

/// Decodes PNG data as a height field.
pub fn decode_height<R: BufRead + Seek>(reader: R) -> IoResult<HeightImage> {
    let mut decoder = png::Decoder::new(reader);
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder.read_info()
        .map_err(|e: png::DecodingError| IoError::DecodeError(e.to_string()))?;

    let buf_size = reader.output_buffer_size()
        .ok_or_else(|| IoError::DecodeError("cannot determine output buffer size".into()))?;
    let mut buf = vec![0u8; buf_size];
    let info = reader.next_frame(&mut buf)
        .map_err(|e: png::DecodingError| IoError::DecodeError(e.to_string()))?;
    let bytes = &buf[..info.buffer_size()];

    let channels = match info.color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        other => {
            return Err(IoError::UnsupportedFormat(format!("{other:?} {:?}", info.bit_depth)));
        }
    };
    let samples = match info.bit_depth {
        png::BitDepth::Eight => bytes.iter().map(|&b| b as f32 / 255.0).collect::<Vec<_>>(),
        png::BitDepth::Sixteen => bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]) as f32 / 65535.0)
            .collect(),
        other => {
            return Err(IoError::UnsupportedFormat(format!("{:?} {other:?}", info.color_type)));
        }
    };

    let heights = luminance(&samples, channels);
    Ok(HeightImage::new(heights, info.width, info.height)?)
}

/// Reduces interleaved samples to one height per pixel.
fn luminance(samples: &[f32], channels: usize) -> Vec<f32> {
    samples
        .chunks_exact(channels)
        .map(|px| match channels {
            1 | 2 => px[0],
            _ => REC709[0] * px[0] + REC709[1] * px[1] + REC709[2] * px[2],
        })
        .collect()
}

/// Encodes a normal map as an 8-bit RGBA PNG.
pub fn encode_png(normals: &NormalMap) -> IoResult<Vec<u8>> {
    let mut out = Vec::new();
    write_rgba8(&mut out, normals)?;
    Ok(out)
}

/// Writes a normal map to a PNG file.
pub fn write_png<P: AsRef<Path>>(path: P, normals: &NormalMap) -> IoResult<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_rgba8(&mut writer, normals)?;
    writer.flush()?;
    debug!(path = %path.display(), "wrote normal map");
    Ok(())
}

fn write_rgba8<W: Write>(writer: W, normals: &NormalMap) -> IoResult<()> {
    let mut encoder = png::Encoder::new(writer, normals.width(), normals.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::default());
    // Normals are vectors, not color: no sRGB chunk.

    let mut png_writer = encoder.write_header()
        .map_err(|e| IoError::EncodeError(e.to_string()))?;
    png_writer.write_image_data(normals.as_bytes())
        .map_err(|e| IoError::EncodeError(e.to_string()))?;
    png_writer.finish()
        .map_err(|e| IoError::EncodeError(e.to_string()))?;
    Ok(())
}

/// `<dir>/<stem>_Normal.png` next to `source`.
pub fn default_output_path<P: AsRef<Path>>(source: P) -> PathBuf {
    let source = source.as_ref();
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    source.with_file_name(format!("{stem}{OUTPUT_SUFFIX}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_raw(color: png::ColorType, depth: png::BitDepth, w: u32, h: u32, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, w, h);
            encoder.set_color(color);
            encoder.set_depth(depth);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(data).unwrap();
        }
        out
    }

    #[test]
    fn test_decode_gray8() {
        let bytes = encode_raw(png::ColorType::Grayscale, png::BitDepth::Eight, 2, 1, &[0, 255]);
        let h = decode_height(Cursor::new(bytes)).unwrap();
        assert_eq!(h.dimensions(), (2, 1));
        assert_eq!(h.get(0, 0), 0.0);
        assert_eq!(h.get(1, 0), 1.0);
    }

    #[test]
    fn test_decode_gray16() {
        let bytes = encode_raw(png::ColorType::Grayscale, png::BitDepth::Sixteen, 1, 1, &[0x80, 0x00]);
        let h = decode_height(Cursor::new(bytes)).unwrap();
        approx::assert_abs_diff_eq!(h.get(0, 0), 32768.0 / 65535.0, epsilon = 1e-6);
    }

    #[test]
    fn test_decode_rgba_uses_luma_and_ignores_alpha() {
        let bytes = encode_raw(png::ColorType::Rgba, png::BitDepth::Eight, 1, 1, &[0, 255, 0, 0]);
        let h = decode_height(Cursor::new(bytes)).unwrap();
        approx::assert_abs_diff_eq!(h.get(0, 0), 0.7152, epsilon = 1e-6);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_height(Cursor::new(b"not a png".to_vec())),
            Err(IoError::DecodeError(_))
        ));
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(default_output_path("tex/rock.png"), PathBuf::from("tex/rock_Normal.png"));
        assert_eq!(default_output_path("rock"), PathBuf::from("rock_Normal.png"));
    }
}
