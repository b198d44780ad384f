//! Readers for the line-oriented and XML sidecar members.
//!
//! Records in these files are best-effort: a malformed or duplicated record
//! is reported to the diagnostics sink and skipped, and the remaining
//! records still load. Only XML-level syntax errors in the ranges file are
//! fatal.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use super::attrs::{attr_int, attr_string, collect_attributes};
use super::model_xml::local_name;
use crate::error::{Diagnostics, Result};
use crate::model::{DynamicConfig, LayerConfigRange, SupportPoint};
use crate::names::*;

/// Tolerance of the island-flag comparison in version 1 support points.
const EPSILON: f64 = 1e-4;

/// Head radius assumed for version 0 support points.
const LEGACY_HEAD_RADIUS: f32 = 0.4;

/// Parse `Metadata/Slic3r_PE_layer_heights_profile.txt`.
///
/// One record per line: `object_id=<1-based index>|v0;v1;…` with an even
/// value count of at least four.
pub(super) fn parse_layer_heights_profiles(
    text: &str,
    profiles: &mut BTreeMap<i32, Vec<f64>>,
    diagnostics: &mut Diagnostics,
) {
    let text = text.strip_suffix('\n').unwrap_or(text);

    for record in text.split('\n') {
        let Some((id_part, payload)) = split_record(record) else {
            diagnostics.report("error while reading layer heights profile record");
            continue;
        };

        let Some(object_id) = parse_object_id(id_part) else {
            diagnostics.report("found invalid object id in layer heights profile");
            continue;
        };

        if profiles.contains_key(&object_id) {
            diagnostics.report("found duplicated layer heights profile");
            continue;
        }

        let values: Vec<&str> = payload.split(';').collect();
        if values.len() < 4 || values.len() % 2 != 0 {
            diagnostics.report("found invalid layer heights profile");
            continue;
        }

        let profile: Vec<f64> = values
            .iter()
            .map(|value| value.trim().parse().unwrap_or(0.0))
            .collect();
        profiles.insert(object_id, profile);
    }
}

/// Parse `Metadata/Slic3r_PE_sla_support_points.txt`.
///
/// An optional `support_points_format_version=N` header selects the record
/// layout; see the format docs on [`SupportPoint`].
pub(super) fn parse_sla_support_points(
    text: &str,
    support_points: &mut BTreeMap<i32, Vec<SupportPoint>>,
    diagnostics: &mut Diagnostics,
) {
    let text = text.strip_suffix('\n').unwrap_or(text);
    let mut records: Vec<&str> = text.split('\n').collect();

    let mut version = 0u32;
    if let Some(first) = records.first() {
        if let Some(rest) = first.strip_prefix(SUPPORT_POINTS_VERSION_KEY) {
            version = rest.trim().parse().unwrap_or(0);
            records.remove(0);
        }
    }

    if version > SUPPORT_POINTS_FORMAT_VERSION {
        diagnostics.report(format!(
            "unsupported SLA support points format version {version}, ignoring the file"
        ));
        return;
    }

    for record in records {
        let Some((id_part, payload)) = split_record(record) else {
            diagnostics.report("error while reading SLA support points record");
            continue;
        };

        let Some(object_id) = parse_object_id(id_part) else {
            diagnostics.report("found invalid object id in SLA support points");
            continue;
        };

        if support_points.contains_key(&object_id) {
            diagnostics.report("found duplicated SLA support points");
            continue;
        }

        let tokens: Vec<f64> = payload
            .split(' ')
            .map(|token| token.trim().parse().unwrap_or(0.0))
            .collect();

        let points: Vec<SupportPoint> = match version {
            0 => tokens
                .chunks_exact(3)
                .map(|p| {
                    SupportPoint::new(
                        [p[0] as f32, p[1] as f32, p[2] as f32],
                        LEGACY_HEAD_RADIUS,
                        false,
                    )
                })
                .collect(),
            1 => tokens
                .chunks_exact(5)
                .map(|p| {
                    // the island flag is stored as a 0/1 float
                    SupportPoint::new(
                        [p[0] as f32, p[1] as f32, p[2] as f32],
                        p[3] as f32,
                        (p[4] - 1.0).abs() < EPSILON,
                    )
                })
                .collect(),
            _ => Vec::new(),
        };

        if !points.is_empty() {
            support_points.insert(object_id, points);
        }
    }
}

/// Parse `Metadata/Prusa_Slicer_layer_config_ranges.xml`.
pub(super) fn parse_layer_config_ranges(
    text: &str,
    ranges: &mut BTreeMap<i32, Vec<LayerConfigRange>>,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let mut xml = Reader::from_str(text);
    xml.config_mut().trim_text(true);
    let mut buf = Vec::with_capacity(1024);

    // None while the children of an invalid or duplicated object are skipped
    let mut curr_object_id: Option<i32> = None;
    let mut curr_ranges: Vec<LayerConfigRange> = Vec::new();
    let mut curr_range: Option<LayerConfigRange> = None;
    let mut curr_opt_key = String::new();
    let mut curr_value = String::new();

    loop {
        let event = xml.read_event_into(&mut buf)?;
        let is_empty = matches!(&event, Event::Empty(_));
        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let name = element.name();
                let name = String::from_utf8_lossy(name.as_ref()).into_owned();
                match local_name(&name) {
                    OBJECT_TAG => {
                        let attributes = collect_attributes(element)?;
                        let object_id = attr_int(&attributes, ID_ATTR);
                        if object_id <= 0 {
                            diagnostics.report("found invalid object id in layer config ranges");
                            curr_object_id = None;
                        } else if ranges.contains_key(&object_id) {
                            diagnostics.report("found duplicated layer config range");
                            curr_object_id = None;
                        } else {
                            curr_object_id = Some(object_id);
                        }
                        curr_ranges.clear();
                    }
                    "range" => {
                        let attributes = collect_attributes(element)?;
                        // z bounds are doubles, unlike the f32 mesh data
                        let parse_z =
                            |key| attr_string(&attributes, key).trim().parse().unwrap_or(0.0);
                        curr_range = Some(LayerConfigRange {
                            min_z: parse_z(MIN_Z_ATTR),
                            max_z: parse_z(MAX_Z_ATTR),
                            config: DynamicConfig::new(),
                        });
                        if is_empty {
                            if let Some(range) = curr_range.take() {
                                curr_ranges.push(range);
                            }
                        }
                    }
                    "option" => {
                        let attributes = collect_attributes(element)?;
                        curr_opt_key = attr_string(&attributes, OPT_KEY_ATTR).to_string();
                        curr_value.clear();
                    }
                    _ => {}
                }
            }
            Event::Text(textual) => curr_value.push_str(&textual.unescape()?),
            Event::End(ref element) => {
                let name = element.name();
                let name = String::from_utf8_lossy(name.as_ref()).into_owned();
                match local_name(&name) {
                    "option" => {
                        if let Some(range) = &mut curr_range {
                            range.config.set_deserialize(&curr_opt_key, &curr_value);
                        }
                        curr_value.clear();
                    }
                    "range" => {
                        if let Some(range) = curr_range.take() {
                            curr_ranges.push(range);
                        }
                    }
                    OBJECT_TAG => {
                        if let Some(object_id) = curr_object_id.take() {
                            if !curr_ranges.is_empty() {
                                ranges.insert(object_id, std::mem::take(&mut curr_ranges));
                            }
                        }
                        curr_ranges.clear();
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Split a sidecar record into its `object_id=N` head and the payload.
///
/// Records with any other number of `|` separated parts are malformed.
fn split_record(record: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = record.split('|').collect();
    match parts[..] {
        [head, payload] => Some((head, payload)),
        _ => None,
    }
}

/// Extract the integer after `=` in an `object_id=N` head; 0 is invalid.
fn parse_object_id(head: &str) -> Option<i32> {
    let parts: Vec<&str> = head.split('=').collect();
    let [_, id] = parts[..] else {
        return None;
    };
    let object_id = id.trim().parse().unwrap_or(0);
    if object_id == 0 {
        return None;
    }
    Some(object_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_heights_profiles_parse() {
        let mut profiles = BTreeMap::new();
        let mut diagnostics = Diagnostics::new();
        parse_layer_heights_profiles(
            "object_id=1|0;0.2;10;0.3\nobject_id=2|0;0.15;5;0.15;20;0.2\n",
            &mut profiles,
            &mut diagnostics,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(profiles[&1], vec![0.0, 0.2, 10.0, 0.3]);
        assert_eq!(profiles[&2].len(), 6);
    }

    #[test]
    fn malformed_profile_record_skips_only_itself() {
        let mut profiles = BTreeMap::new();
        let mut diagnostics = Diagnostics::new();
        parse_layer_heights_profiles(
            "object_id=1|0;0.2;10\nobject_id=2|0;0.2;10;0.3",
            &mut profiles,
            &mut diagnostics,
        );
        // first record has an odd/short payload and is dropped
        assert_eq!(profiles.len(), 1);
        assert!(profiles.contains_key(&2));
        assert_eq!(diagnostics.messages().len(), 1);
    }

    #[test]
    fn duplicated_profile_keeps_the_first() {
        let mut profiles = BTreeMap::new();
        let mut diagnostics = Diagnostics::new();
        parse_layer_heights_profiles(
            "object_id=1|0;0.2;10;0.3\nobject_id=1|0;0.1;5;0.1",
            &mut profiles,
            &mut diagnostics,
        );
        assert_eq!(profiles[&1][1], 0.2);
        assert_eq!(diagnostics.messages().len(), 1);
    }

    #[test]
    fn sla_points_version_0() {
        let mut points = BTreeMap::new();
        let mut diagnostics = Diagnostics::new();
        parse_sla_support_points("object_id=1|1 2 3 4 5 6", &mut points, &mut diagnostics);
        let loaded = &points[&1];
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].pos, [1.0, 2.0, 3.0]);
        assert_eq!(loaded[0].head_front_radius, LEGACY_HEAD_RADIUS);
        assert!(!loaded[0].is_new_island);
    }

    #[test]
    fn sla_points_version_1() {
        let mut points = BTreeMap::new();
        let mut diagnostics = Diagnostics::new();
        parse_sla_support_points(
            "support_points_format_version=1\nobject_id=1|0 0 0 0.5 1\nobject_id=2|1 1 1 0.3 0",
            &mut points,
            &mut diagnostics,
        );
        assert!(diagnostics.is_empty());
        assert_eq!(points[&1][0].head_front_radius, 0.5);
        assert!(points[&1][0].is_new_island);
        assert!(!points[&2][0].is_new_island);
    }

    #[test]
    fn sla_points_unknown_version_is_ignored() {
        let mut points = BTreeMap::new();
        let mut diagnostics = Diagnostics::new();
        parse_sla_support_points(
            "support_points_format_version=9\nobject_id=1|0 0 0 0.5 1",
            &mut points,
            &mut diagnostics,
        );
        assert!(points.is_empty());
        assert_eq!(diagnostics.messages().len(), 1);
    }

    #[test]
    fn layer_config_ranges_parse() {
        let mut ranges = BTreeMap::new();
        let mut diagnostics = Diagnostics::new();
        parse_layer_config_ranges(
            r#"<?xml version="1.0" encoding="utf-8"?>
<objects>
 <object id="1">
  <range min_z="0" max_z="10">
   <option opt_key="layer_height">0.15</option>
   <option opt_key="fill_density">42%</option>
  </range>
  <range min_z="10" max_z="20">
   <option opt_key="layer_height">0.3</option>
  </range>
 </object>
</objects>"#,
            &mut ranges,
            &mut diagnostics,
        )
        .unwrap();
        assert!(diagnostics.is_empty());
        let object_ranges = &ranges[&1];
        assert_eq!(object_ranges.len(), 2);
        assert_eq!(object_ranges[0].min_z, 0.0);
        assert_eq!(object_ranges[0].max_z, 10.0);
        assert_eq!(
            object_ranges[0].config.opt_serialize("fill_density"),
            Some("42%")
        );
        assert_eq!(
            object_ranges[1].config.opt_serialize("layer_height"),
            Some("0.3")
        );
    }

    #[test]
    fn duplicated_ranges_object_is_reported_and_skipped() {
        let mut ranges = BTreeMap::new();
        let mut diagnostics = Diagnostics::new();
        parse_layer_config_ranges(
            r#"<objects>
 <object id="1"><range min_z="0" max_z="5"><option opt_key="a">1</option></range></object>
 <object id="1"><range min_z="0" max_z="5"><option opt_key="a">2</option></range></object>
</objects>"#,
            &mut ranges,
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(ranges[&1][0].config.opt_serialize("a"), Some("1"));
        assert_eq!(diagnostics.messages().len(), 1);
    }
}
