//! Minimal, self-contained FITS reader/writer: single-HDU, monochrome,
//! `BITPIX` in `{8, 16, 32, -32, -64}`, no WCS, no compression, no
//! extensions. This is not a general astronomical FITS library — it covers
//! exactly the subset this crate's pipeline needs to round-trip the
//! frame/dark/flat inputs and its own registered-frame outputs.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array2;

use crate::error::{LuckyError, Result};
use crate::frame::Frame;

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

/// Parsed subset of a FITS primary header relevant to pixel decoding.
struct Header {
    bitpix: i32,
    width: usize,
    height: usize,
    bzero: f64,
    bscale: f64,
}

fn parse_header(cards: &[String]) -> Result<Header> {
    let mut bitpix = None;
    let mut naxis1 = None;
    let mut naxis2 = None;
    let mut bzero = 0.0f64;
    let mut bscale = 1.0f64;

    for card in cards {
        let Some((key, rest)) = card.split_once('=') else {
            continue;
        };
        let key = key.trim();
        // Strip an inline comment (after `/`), keep only the value token.
        let value = rest.split('/').next().unwrap_or("").trim();
        match key {
            "BITPIX" => bitpix = value.parse::<i32>().ok(),
            "NAXIS1" => naxis1 = value.parse::<usize>().ok(),
            "NAXIS2" => naxis2 = value.parse::<usize>().ok(),
            "BZERO" => bzero = value.parse::<f64>().unwrap_or(0.0),
            "BSCALE" => bscale = value.parse::<f64>().unwrap_or(1.0),
            _ => {}
        }
    }

    let bitpix =
        bitpix.ok_or_else(|| LuckyError::Io(std::io::Error::other("FITS header missing BITPIX")))?;
    let width = naxis1
        .ok_or_else(|| LuckyError::Io(std::io::Error::other("FITS header missing NAXIS1")))?;
    let height = naxis2
        .ok_or_else(|| LuckyError::Io(std::io::Error::other("FITS header missing NAXIS2")))?;

    Ok(Header {
        bitpix,
        width,
        height,
        bzero,
        bscale,
    })
}

/// Read all 80-byte header cards up to and including `END`, consuming
/// whole 2880-byte blocks as the format requires.
fn read_header_cards(reader: &mut impl Read) -> Result<Vec<String>> {
    let mut cards = Vec::new();
    let mut block = [0u8; BLOCK_SIZE];
    loop {
        reader.read_exact(&mut block)?;
        let mut done = false;
        for chunk in block.chunks(CARD_SIZE) {
            let card = String::from_utf8_lossy(chunk).to_string();
            if card.trim_start().starts_with("END") {
                done = true;
            }
            cards.push(card);
        }
        if done {
            break;
        }
    }
    Ok(cards)
}

/// Load a monochrome FITS frame from `path`, converting every pixel to
/// `f32`. Integer sample types are scaled by their type's full range so the
/// result lands near `[0, 1]`, matching the float convention the rest of
/// the pipeline assumes; float sample types (`BITPIX` -32/-64) are used as
/// physical values directly, post `BZERO`/`BSCALE`.
pub fn load_fits(path: &Path, frame_index: usize) -> Result<Frame> {
    let bytes = std::fs::read(path)?;
    let mut cursor = Cursor::new(&bytes);
    let cards = read_header_cards(&mut cursor)?;
    let header = parse_header(&cards)?;

    let npix = header.width * header.height;
    let mut data = Array2::<f32>::zeros((header.height, header.width));

    match header.bitpix {
        8 => {
            let mut raw = vec![0u8; npix];
            cursor.read_exact(&mut raw)?;
            for (dst, &v) in data.iter_mut().zip(raw.iter()) {
                let physical = v as f64 * header.bscale + header.bzero;
                *dst = (physical / 255.0) as f32;
            }
        }
        16 => {
            for dst in data.iter_mut() {
                let v = cursor.read_i16::<BigEndian>()?;
                let physical = v as f64 * header.bscale + header.bzero;
                *dst = (physical / 65535.0) as f32;
            }
        }
        32 => {
            for dst in data.iter_mut() {
                let v = cursor.read_i32::<BigEndian>()?;
                let physical = v as f64 * header.bscale + header.bzero;
                *dst = (physical / i32::MAX as f64) as f32;
            }
        }
        -32 => {
            for dst in data.iter_mut() {
                let v = cursor.read_f32::<BigEndian>()?;
                *dst = (v as f64 * header.bscale + header.bzero) as f32;
            }
        }
        -64 => {
            for dst in data.iter_mut() {
                let v = cursor.read_f64::<BigEndian>()?;
                *dst = (v * header.bscale + header.bzero) as f32;
            }
        }
        other => {
            return Err(LuckyError::Io(std::io::Error::other(format!(
                "unsupported FITS BITPIX {other}"
            ))))
        }
    }

    let bit_depth = match header.bitpix {
        8 => 8,
        16 => 16,
        _ => 32,
    };
    Ok(Frame::new(data, bit_depth, frame_index))
}

fn pad_to_block(buf: &mut Vec<u8>, pad_byte: u8) {
    let rem = buf.len() % BLOCK_SIZE;
    if rem != 0 {
        buf.resize(buf.len() + (BLOCK_SIZE - rem), pad_byte);
    }
}

fn push_card(buf: &mut Vec<u8>, card: &str) {
    let mut bytes = card.as_bytes().to_vec();
    bytes.resize(CARD_SIZE, b' ');
    buf.extend_from_slice(&bytes[..CARD_SIZE]);
}

/// Write `frame` as a single-HDU, `BITPIX=-32` FITS file: every sample is a
/// big-endian IEEE float32, `BZERO=0`, `BSCALE=1`.
pub fn save_fits(frame: &Frame, path: &Path) -> Result<()> {
    let (h, w) = frame.data.dim();

    let mut header = Vec::new();
    push_card(&mut header, "SIMPLE  =                    T");
    push_card(&mut header, "BITPIX  =                  -32");
    push_card(&mut header, "NAXIS   =                    2");
    push_card(&mut header, &format!("NAXIS1  = {w:20}"));
    push_card(&mut header, &format!("NAXIS2  = {h:20}"));
    push_card(&mut header, "BZERO   =                  0.0");
    push_card(&mut header, "BSCALE  =                  1.0");
    push_card(&mut header, "END");
    pad_to_block(&mut header, b' ');

    let mut body = Vec::with_capacity(h * w * 4);
    for &v in frame.data.iter() {
        body.write_f32::<BigEndian>(v)?;
    }
    pad_to_block(&mut body, 0);

    let mut out = std::fs::File::create(path)?;
    out.write_all(&header)?;
    out.write_all(&body)?;
    Ok(())
}

/// Scan `dir` for files with extension `.fit` or `.fits` (case-insensitive),
/// returning their paths sorted lexicographically by filename. This sort
/// order fixes the template frame (index 0) and the sequence of "previous
/// frame" references for every later frame.
pub fn scan_frame_directory(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    if !dir.is_dir() {
        return Err(LuckyError::Usage(format!(
            "input path {} is not a directory",
            dir.display()
        )));
    }

    let mut paths: Vec<std::path::PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("fit") || ext.eq_ignore_ascii_case("fits"))
                .unwrap_or(false)
        })
        .collect();

    if paths.is_empty() {
        return Err(LuckyError::Usage(format!(
            "no .fit/.fits files found in {}",
            dir.display()
        )));
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_float_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.fits");

        let data = Array2::from_shape_fn((8, 6), |(r, c)| (r * 6 + c) as f32 / 47.0);
        let frame = Frame::new(data.clone(), 32, 0);
        save_fits(&frame, &path).unwrap();

        let loaded = load_fits(&path, 0).unwrap();
        assert_eq!(loaded.width(), 6);
        assert_eq!(loaded.height(), 8);
        for (a, b) in data.iter().zip(loaded.data.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn scan_sorts_lexicographically_and_filters_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.fits", "a.FIT", "c.txt", "d.Fits"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let found = scan_frame_directory(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.FIT", "b.fits", "d.Fits"]);
    }

    #[test]
    fn empty_directory_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_frame_directory(dir.path()).unwrap_err();
        assert!(matches!(err, LuckyError::Usage(_)));
    }
}
