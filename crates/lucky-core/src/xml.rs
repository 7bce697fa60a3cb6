//! Star-detection handoff XML: the persisted bridge between the detection
//! stage and the registration/integration stage (§6).
//!
//! ```xml
//! <StarDetection version="1.0">
//!   <Frame id="0">
//!     <Star id="0" x="10.5" y="20.25" background="0.01" peak="0.8"
//!           sizeX="4.7" sizeY="4.6"/>
//!   </Frame>
//! </StarDetection>
//! ```

use std::io::BufReader;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::consts::STAR_DETECTION_XML_VERSION;
use crate::error::{LuckyError, Result};
use crate::frame::Star;

/// Write the full detection table to `{input_dir}/star_detections.xml`.
pub fn write_detections(path: &Path, detections: &[Vec<Star>]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = Writer::new_with_indent(file, b' ', 2);

    let mut root = BytesStart::new("StarDetection");
    root.push_attribute(("version", STAR_DETECTION_XML_VERSION));
    writer
        .write_event(Event::Start(root.clone()))
        .map_err(xml_err)?;

    for (frame_idx, stars) in detections.iter().enumerate() {
        let mut frame_tag = BytesStart::new("Frame");
        frame_tag.push_attribute(("id", frame_idx.to_string().as_str()));
        writer
            .write_event(Event::Start(frame_tag))
            .map_err(xml_err)?;

        for star in stars {
            let mut star_tag = BytesStart::new("Star");
            star_tag.push_attribute(("id", star.id.to_string().as_str()));
            star_tag.push_attribute(("x", star.x.to_string().as_str()));
            star_tag.push_attribute(("y", star.y.to_string().as_str()));
            star_tag.push_attribute(("background", star.background.to_string().as_str()));
            star_tag.push_attribute(("peak", star.peak.to_string().as_str()));
            star_tag.push_attribute(("sizeX", star.size_x.to_string().as_str()));
            star_tag.push_attribute(("sizeY", star.size_y.to_string().as_str()));
            writer
                .write_event(Event::Empty(star_tag))
                .map_err(xml_err)?;
        }

        writer
            .write_event(Event::End(quick_xml::events::BytesEnd::new("Frame")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(quick_xml::events::BytesEnd::new(
            "StarDetection",
        )))
        .map_err(xml_err)?;

    Ok(())
}

fn xml_err(e: impl std::fmt::Display) -> LuckyError {
    LuckyError::Xml(e.to_string())
}

fn attr_str(tag: &BytesStart, name: &str) -> Result<String> {
    for attr in tag.attributes() {
        let attr = attr.map_err(xml_err)?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(attr.unescape_value().map_err(xml_err)?.into_owned());
        }
    }
    Err(LuckyError::Xml(format!("missing attribute {name}")))
}

fn attr_f32(tag: &BytesStart, name: &str) -> Result<f32> {
    attr_str(tag, name)?
        .parse::<f32>()
        .map_err(|e| LuckyError::Xml(format!("bad float attribute {name}: {e}")))
}

fn attr_usize(tag: &BytesStart, name: &str) -> Result<usize> {
    attr_str(tag, name)?
        .parse::<usize>()
        .map_err(|e| LuckyError::Xml(format!("bad integer attribute {name}: {e}")))
}

/// Read the full detection table back from a previously-written
/// `star_detections.xml`. Fails on an unknown root/child element name or a
/// version mismatch.
pub fn read_detections(path: &Path) -> Result<Vec<Vec<Star>>> {
    let file = std::fs::File::open(path)?;
    let mut reader = Reader::from_reader(BufReader::new(file));

    let mut detections: Vec<Vec<Star>> = Vec::new();
    let mut current_frame: Option<Vec<Star>> = None;
    let mut buf = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(tag) | Event::Empty(tag) => {
                let name = tag.name().as_ref().to_vec();
                match name.as_slice() {
                    b"StarDetection" => {
                        seen_root = true;
                        let version = attr_str(&tag, "version")?;
                        if version != STAR_DETECTION_XML_VERSION {
                            return Err(LuckyError::Xml(format!(
                                "unsupported StarDetection version {version}"
                            )));
                        }
                    }
                    b"Frame" => {
                        let id = attr_usize(&tag, "id")?;
                        while detections.len() <= id {
                            detections.push(Vec::new());
                        }
                        current_frame = Some(Vec::new());
                    }
                    b"Star" => {
                        let star = Star {
                            id: attr_usize(&tag, "id")?,
                            x: attr_f32(&tag, "x")?,
                            y: attr_f32(&tag, "y")?,
                            background: attr_f32(&tag, "background")?,
                            peak: attr_f32(&tag, "peak")?,
                            size_x: attr_f32(&tag, "sizeX")?,
                            size_y: attr_f32(&tag, "sizeY")?,
                        };
                        match current_frame.as_mut() {
                            Some(stars) => stars.push(star),
                            None => {
                                return Err(LuckyError::Xml(
                                    "Star element outside Frame".to_string(),
                                ))
                            }
                        }
                    }
                    other => {
                        return Err(LuckyError::Xml(format!(
                            "unknown element {}",
                            String::from_utf8_lossy(other)
                        )))
                    }
                }
            }
            Event::End(tag) if tag.name().as_ref() == b"Frame" => {
                if let Some(stars) = current_frame.take() {
                    let idx = detections.len() - 1;
                    detections[idx] = stars;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(LuckyError::Xml(
            "missing StarDetection root element".to_string(),
        ));
    }

    Ok(detections)
}
