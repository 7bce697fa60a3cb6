//! Minimal XISF writer: enough of the monolithic XISF 1.0 container format
//! to hold one single-channel float32 image, which is all the
//! `registration_only` output path needs. Not a general XISF
//! implementation: no metadata properties, no compression, no multi-image
//! files.

use std::io::Write;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::Result;
use crate::frame::Frame;

const SIGNATURE: &[u8; 8] = b"XISF0100";
/// XISF headers are block-aligned to this size; we pad the XML header to
/// the next multiple so the attached data block starts cleanly.
const HEADER_ALIGNMENT: usize = 16;

/// Write `frame` to `path` as a monolithic XISF file: a single
/// `Grayscale` `Float32` image, pixel data attached immediately after the
/// (padded) XML header, stored little-endian.
pub fn save_xisf(frame: &Frame, path: &Path) -> Result<()> {
    let (h, w) = frame.data.dim();
    let data_size = h * w * std::mem::size_of::<f32>();

    // The attachment offset is fixed once we know the padded header size;
    // since the header's own XML must quote that offset, we compute the
    // unpadded header first, then the final (padded) offset, which only
    // affects the attachment position digit count in degenerate cases, so
    // one fixed-width field is used to keep the offset self-consistent.
    let preamble_len = SIGNATURE.len() + 4 + 4;
    let attachment_pos_placeholder = 0u64;
    let xml = build_xml_header(w, h, attachment_pos_placeholder, data_size);
    let header_len = xml.len();
    let total_before_pad = preamble_len + header_len;
    let padded_total = total_before_pad.div_ceil(HEADER_ALIGNMENT) * HEADER_ALIGNMENT;
    let attachment_pos = padded_total as u64;

    let xml = build_xml_header(w, h, attachment_pos, data_size);
    let header_len = xml.len();
    let pad_len = padded_total - (preamble_len + header_len);

    let mut out = std::fs::File::create(path)?;
    out.write_all(SIGNATURE)?;
    out.write_u32::<LittleEndian>(header_len as u32)?;
    out.write_u32::<LittleEndian>(0)?; // reserved
    out.write_all(xml.as_bytes())?;
    out.write_all(&vec![b' '; pad_len])?;

    for &v in frame.data.iter() {
        out.write_f32::<LittleEndian>(v)?;
    }
    Ok(())
}

fn build_xml_header(width: usize, height: usize, attachment_pos: u64, data_size: usize) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
            "<xisf version=\"1.0\" xmlns=\"http://www.pixinsight.com/xisf\">",
            "<Image geometry=\"{w}:{h}:1\" sampleFormat=\"Float32\" colorSpace=\"Gray\" ",
            "location=\"attachment:{pos}:{size}\"/>",
            "</xisf>"
        ),
        w = width,
        h = height,
        pos = attachment_pos,
        size = data_size,
    )
}

/// Derive the registration output path for `input_basename` under
/// `output_dir`: `{output_dir}/{basename_of_input}.xisf`.
pub fn registration_output_path(output_dir: &Path, input_path: &Path) -> std::path::PathBuf {
    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "frame".to_string());
    output_dir.join(format!("{stem}.xisf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn writes_well_formed_header_and_correct_byte_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xisf");
        let data = Array2::from_shape_fn((4, 3), |(r, c)| (r * 3 + c) as f32);
        let frame = Frame::new(data, 32, 0);
        save_xisf(&frame, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..8], SIGNATURE);
        let header_len = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
        let xml = std::str::from_utf8(&bytes[16..16 + header_len]).unwrap();
        assert!(xml.contains("geometry=\"3:4:1\""));
        assert!(bytes.len() >= 4 * 3 * 4);
    }

    #[test]
    fn naming_uses_input_stem() {
        let out_dir = Path::new("/tmp/reg");
        let input = Path::new("/data/frames/light_0007.fits");
        let p = registration_output_path(out_dir, input);
        assert_eq!(p, Path::new("/tmp/reg/light_0007.xisf"));
    }
}
