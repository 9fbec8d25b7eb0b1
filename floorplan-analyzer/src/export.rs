//! gbXML and OBJ writers for extruded room boxes.
//!
//! Each room becomes a box from z = 0 to the floor height. Output depends
//! only on the input, so repeated exports are byte-identical.

use crate::error::{AnalysisError, Result};
use crate::projector::{MetricRoomRect, SpaceType};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fmt::Write as _;
use std::path::Path;

const GBXML_NAMESPACE: &str = "http://www.gbxml.org/schema";
const GBXML_VERSION: &str = "6.01";

type Vertex = [f64; 3];

/// Corners of the extruded box: bottom ring then top ring, counter-clockwise
fn box_vertices(room: &MetricRoomRect, floor_height: f64) -> [Vertex; 8] {
    let (x0, y0) = (room.x, room.y);
    let (x1, y1) = (room.x + room.width, room.y + room.height);
    [
        [x0, y0, 0.0],
        [x1, y0, 0.0],
        [x1, y1, 0.0],
        [x0, y1, 0.0],
        [x0, y0, floor_height],
        [x1, y0, floor_height],
        [x1, y1, floor_height],
        [x0, y1, floor_height],
    ]
}

/// Vertex indices of the six faces, wound outward
const BOX_FACES: [[usize; 4]; 6] = [
    [0, 3, 2, 1], // floor
    [4, 5, 6, 7], // ceiling
    [0, 1, 5, 4],
    [1, 2, 6, 5],
    [2, 3, 7, 6],
    [3, 0, 4, 7],
];

fn space_id(index: usize) -> String {
    format!("space-{:03}", index)
}

fn space_name(room: &MetricRoomRect, index: usize) -> String {
    format!("{}_{:03}", SpaceType::classify(room.width, room.height), index)
}

fn coord(value: f64) -> String {
    format!("{:.4}", value)
}

/// Render rooms as a gbXML document with one `Space` per room
pub fn to_gbxml(rooms: &[MetricRoomRect], floor_height: f64, building_name: &str) -> Result<String> {
    build_gbxml(rooms, floor_height, building_name).map_err(|e| AnalysisError::pipeline("writing gbXML", e))
}

fn build_gbxml(rooms: &[MetricRoomRect], floor_height: f64, building_name: &str) -> quick_xml::Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("gbXML");
    root.push_attribute(("xmlns", GBXML_NAMESPACE));
    root.push_attribute(("version", GBXML_VERSION));
    root.push_attribute(("useSIUnitsForResults", "true"));
    root.push_attribute(("temperatureUnit", "C"));
    root.push_attribute(("lengthUnit", "Meters"));
    root.push_attribute(("areaUnit", "SquareMeters"));
    root.push_attribute(("volumeUnit", "CubicMeters"));
    writer.write_event(Event::Start(root))?;

    let mut campus = BytesStart::new("Campus");
    campus.push_attribute(("id", "campus-1"));
    writer.write_event(Event::Start(campus))?;
    text_element(&mut writer, "Name", &format!("{} Campus", building_name))?;

    let mut building = BytesStart::new("Building");
    building.push_attribute(("id", "building-1"));
    building.push_attribute(("buildingType", "Unknown"));
    writer.write_event(Event::Start(building))?;
    text_element(&mut writer, "Name", building_name)?;
    let total_area: f64 = rooms.iter().map(|r| r.area_m2).sum();
    text_element(&mut writer, "Area", &coord(total_area))?;

    for (i, room) in rooms.iter().enumerate() {
        write_space(&mut writer, room, i + 1, floor_height)?;
    }

    writer.write_event(Event::End(BytesEnd::new("Building")))?;
    writer.write_event(Event::End(BytesEnd::new("Campus")))?;
    writer.write_event(Event::End(BytesEnd::new("gbXML")))?;

    let mut xml = String::from_utf8_lossy(&writer.into_inner()).into_owned();
    xml.push('\n');
    Ok(xml)
}

fn write_space(
    writer: &mut Writer<Vec<u8>>,
    room: &MetricRoomRect,
    index: usize,
    floor_height: f64,
) -> quick_xml::Result<()> {
    let id = space_id(index);
    let mut space = BytesStart::new("Space");
    space.push_attribute(("id", id.as_str()));
    writer.write_event(Event::Start(space))?;

    text_element(writer, "Name", &space_name(room, index))?;
    text_element(writer, "Area", &coord(room.area_m2))?;
    text_element(writer, "Volume", &coord(room.area_m2 * floor_height))?;

    let shell_id = format!("{}-shell", id);
    let mut shell = BytesStart::new("ShellGeometry");
    shell.push_attribute(("id", shell_id.as_str()));
    shell.push_attribute(("unit", "Meters"));
    writer.write_event(Event::Start(shell))?;
    writer.write_event(Event::Start(BytesStart::new("ClosedShell")))?;

    let vertices = box_vertices(room, floor_height);
    for face in BOX_FACES {
        writer.write_event(Event::Start(BytesStart::new("PolyLoop")))?;
        for &v in &face {
            writer.write_event(Event::Start(BytesStart::new("CartesianPoint")))?;
            for value in vertices[v] {
                text_element(writer, "Coordinate", &coord(value))?;
            }
            writer.write_event(Event::End(BytesEnd::new("CartesianPoint")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("PolyLoop")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("ClosedShell")))?;
    writer.write_event(Event::End(BytesEnd::new("ShellGeometry")))?;
    writer.write_event(Event::End(BytesEnd::new("Space")))?;
    Ok(())
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Render rooms as a Wavefront OBJ mesh, one object per room
pub fn to_obj(rooms: &[MetricRoomRect], floor_height: f64) -> String {
    let mut obj = String::new();
    let _ = writeln!(obj, "# Floor plan export");
    let _ = writeln!(obj, "# rooms: {}", rooms.len());

    for (i, room) in rooms.iter().enumerate() {
        let index = i + 1;
        let base = i * 8 + 1;
        let _ = writeln!(obj, "o {}", space_name(room, index));
        for [x, y, z] in box_vertices(room, floor_height) {
            let _ = writeln!(obj, "v {} {} {}", coord(x), coord(y), coord(z));
        }
        for face in BOX_FACES {
            let _ = writeln!(
                obj,
                "f {} {} {} {}",
                base + face[0],
                base + face[1],
                base + face[2],
                base + face[3]
            );
        }
    }
    obj
}

pub fn write_gbxml(path: &Path, rooms: &[MetricRoomRect], floor_height: f64, building_name: &str) -> Result<()> {
    let xml = to_gbxml(rooms, floor_height, building_name)?;
    std::fs::write(path, xml).map_err(|e| AnalysisError::pipeline(format!("writing {}", path.display()), e))
}

pub fn write_obj(path: &Path, rooms: &[MetricRoomRect], floor_height: f64) -> Result<()> {
    std::fs::write(path, to_obj(rooms, floor_height))
        .map_err(|e| AnalysisError::pipeline(format!("writing {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rooms() -> Vec<MetricRoomRect> {
        vec![
            MetricRoomRect {
                x: 0.0,
                y: 0.0,
                width: 4.0,
                height: 3.0,
                area_m2: 12.0,
            },
            MetricRoomRect {
                x: 4.0,
                y: 0.0,
                width: 1.0,
                height: 6.0,
                area_m2: 6.0,
            },
        ]
    }

    #[test]
    fn test_gbxml_structure() {
        let xml = to_gbxml(&rooms(), 3.0, "Test & Co").unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<Name>Test &amp; Co</Name>"));
        assert!(xml.contains("<Space id=\"space-001\">"));
        assert!(xml.contains("<Name>Room_001</Name>"));
        assert!(xml.contains("<Name>Corridor_002</Name>"));
        assert!(xml.contains("<Volume>36.0000</Volume>"));
        assert_eq!(xml.matches("<Space ").count(), 2);
        assert_eq!(xml.matches("<PolyLoop>").count(), 12);
        assert_eq!(xml.matches("<CartesianPoint>").count(), 48);
    }

    #[test]
    fn test_gbxml_parses_back() {
        let xml = to_gbxml(&rooms(), 2.5, "Building").unwrap();
        let mut reader = quick_xml::Reader::from_str(&xml);
        let mut spaces = 0;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) if e.name().as_ref() == b"Space" => spaces += 1,
                Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!(spaces, 2);
    }

    #[test]
    fn test_export_is_deterministic() {
        assert_eq!(
            to_gbxml(&rooms(), 3.0, "B").unwrap(),
            to_gbxml(&rooms(), 3.0, "B").unwrap()
        );
        assert_eq!(to_obj(&rooms(), 3.0), to_obj(&rooms(), 3.0));
    }

    #[test]
    fn test_obj_layout() {
        let obj = to_obj(&rooms(), 3.0);
        let lines: Vec<&str> = obj.lines().collect();

        assert_eq!(lines.iter().filter(|l| l.starts_with("o ")).count(), 2);
        assert_eq!(lines.iter().filter(|l| l.starts_with("v ")).count(), 16);
        assert_eq!(lines.iter().filter(|l| l.starts_with("f ")).count(), 12);
        assert!(lines.contains(&"o Room_001"));
        assert!(lines.contains(&"v 4.0000 3.0000 3.0000"));
        // Second room's indices start after the first room's 8 vertices
        assert!(lines.contains(&"f 13 14 15 16"));
    }

    #[test]
    fn test_empty_room_list() {
        let obj = to_obj(&[], 3.0);
        assert_eq!(obj, "# Floor plan export\n# rooms: 0\n");

        let xml = to_gbxml(&[], 3.0, "Empty").unwrap();
        assert!(!xml.contains("<Space"));
    }

    #[test]
    fn test_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        write_gbxml(&dir.path().join("plan.xml"), &rooms(), 3.0, "B").unwrap();
        write_obj(&dir.path().join("plan.obj"), &rooms(), 3.0).unwrap();

        assert!(dir.path().join("plan.xml").exists());
        assert!(std::fs::read_to_string(dir.path().join("plan.obj")).unwrap().contains("o Corridor_002"));
    }
}
