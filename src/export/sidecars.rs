//! Writers for the sidecar members, symmetric to the readers in
//! `crate::import::sidecars` and `crate::import::config_xml`.
//!
//! All sidecars are keyed by the 1-based index of the object in the source
//! model, except the model config which is keyed by the object's first
//! instance ID in the geometry document.

use std::fmt::Write as FmtWrite;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::model_xml::ObjectData;
use crate::error::Result;
use crate::model::{DynamicConfig, Model};
use crate::names::*;

/// Print-config keys never written to the archive.
const PRINT_CONFIG_DENYLIST: &[&str] = &["compatible_printers"];

/// Serialize the model-config member.
pub(super) fn model_config(model: &Model, objects_data: &[ObjectData]) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new(CONFIG_TAG)))?;

    for data in objects_data {
        let object = &model.objects[data.object_index];

        let mut object_element = BytesStart::new(OBJECT_TAG);
        object_element.push_attribute((ID_ATTR, data.first_instance_id.to_string().as_str()));
        writer.write_event(Event::Start(object_element))?;

        if !object.name.is_empty() {
            write_metadata(&mut writer, OBJECT_TYPE, NAME_KEY, &object.name)?;
        }
        for key in object.config.keys() {
            let value = object.config.opt_serialize(key).unwrap_or_default();
            write_metadata(&mut writer, OBJECT_TYPE, key, value)?;
        }

        for (volume, offsets) in object.volumes.iter().zip(data.volume_offsets.iter()) {
            let mut volume_element = BytesStart::new(VOLUME_TAG);
            volume_element.push_attribute((
                FIRST_TRIANGLE_ID_ATTR,
                offsets.first_triangle_id.to_string().as_str(),
            ));
            volume_element.push_attribute((
                LAST_TRIANGLE_ID_ATTR,
                offsets.last_triangle_id.to_string().as_str(),
            ));
            writer.write_event(Event::Start(volume_element))?;

            if !volume.name.is_empty() {
                write_metadata(&mut writer, VOLUME_TYPE, NAME_KEY, &volume.name)?;
            }
            // the legacy modifier flag keeps old readers working
            if volume.is_modifier() {
                write_metadata(&mut writer, VOLUME_TYPE, MODIFIER_KEY, "1")?;
            }
            write_metadata(
                &mut writer,
                VOLUME_TYPE,
                VOLUME_TYPE_KEY,
                volume.volume_type().to_str(),
            )?;
            write_metadata(
                &mut writer,
                VOLUME_TYPE,
                MATRIX_KEY,
                &volume.transformation().to_matrix_string(),
            )?;

            if !volume.source.input_file.is_empty() {
                let source = &volume.source;
                write_metadata(&mut writer, VOLUME_TYPE, SOURCE_FILE_KEY, &source.input_file)?;
                write_metadata(
                    &mut writer,
                    VOLUME_TYPE,
                    SOURCE_OBJECT_ID_KEY,
                    &source.object_idx.to_string(),
                )?;
                write_metadata(
                    &mut writer,
                    VOLUME_TYPE,
                    SOURCE_VOLUME_ID_KEY,
                    &source.volume_idx.to_string(),
                )?;
                write_metadata(
                    &mut writer,
                    VOLUME_TYPE,
                    SOURCE_OFFSET_X_KEY,
                    &source.mesh_offset[0].to_string(),
                )?;
                write_metadata(
                    &mut writer,
                    VOLUME_TYPE,
                    SOURCE_OFFSET_Y_KEY,
                    &source.mesh_offset[1].to_string(),
                )?;
                write_metadata(
                    &mut writer,
                    VOLUME_TYPE,
                    SOURCE_OFFSET_Z_KEY,
                    &source.mesh_offset[2].to_string(),
                )?;
            }

            for key in volume.config.keys() {
                let value = volume.config.opt_serialize(key).unwrap_or_default();
                write_metadata(&mut writer, VOLUME_TYPE, key, value)?;
            }

            writer.write_event(Event::End(BytesEnd::new(VOLUME_TAG)))?;
        }

        writer.write_event(Event::End(BytesEnd::new(OBJECT_TAG)))?;
    }

    writer.write_event(Event::End(BytesEnd::new(CONFIG_TAG)))?;
    Ok(writer.into_inner())
}

fn write_metadata<W: std::io::Write>(
    writer: &mut Writer<W>,
    scope: &str,
    key: &str,
    value: &str,
) -> Result<()> {
    let mut element = BytesStart::new(METADATA_TAG);
    element.push_attribute((TYPE_ATTR, scope));
    element.push_attribute((KEY_ATTR, key));
    element.push_attribute((VALUE_ATTR, value));
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

/// Serialize the layer-heights profile member; `None` when no object
/// carries a usable profile.
pub(super) fn layer_heights_profiles(model: &Model) -> Option<Vec<u8>> {
    let mut out = String::new();
    for (index, object) in model.objects.iter().enumerate() {
        let profile = &object.layer_height_profile;
        if profile.len() < 4 || profile.len() % 2 != 0 {
            continue;
        }
        let _ = write!(out, "object_id={}|", index + 1);
        for (i, value) in profile.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            let _ = write!(out, "{value}");
        }
        out.push('\n');
    }
    (!out.is_empty()).then(|| out.into_bytes())
}

/// Serialize the SLA support-points member; `None` when no object carries
/// points. A version header line always precedes the records.
pub(super) fn sla_support_points(model: &Model) -> Option<Vec<u8>> {
    let mut out = String::new();
    for (index, object) in model.objects.iter().enumerate() {
        if object.sla_support_points.is_empty() {
            continue;
        }
        let _ = write!(out, "object_id={}|", index + 1);
        for (i, point) in object.sla_support_points.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(
                out,
                "{} {} {} {} {}",
                point.pos[0],
                point.pos[1],
                point.pos[2],
                point.head_front_radius,
                u8::from(point.is_new_island)
            );
        }
        out.push('\n');
    }
    if out.is_empty() {
        return None;
    }
    let header = format!(
        "{}{}\n",
        SUPPORT_POINTS_VERSION_KEY, SUPPORT_POINTS_FORMAT_VERSION
    );
    Some((header + &out).into_bytes())
}

/// Serialize the layer-config ranges member; `None` when no object carries
/// ranges.
pub(super) fn layer_config_ranges(model: &Model) -> Result<Option<Vec<u8>>> {
    if model
        .objects
        .iter()
        .all(|object| object.layer_config_ranges.is_empty())
    {
        return Ok(None);
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("objects")))?;

    for (index, object) in model.objects.iter().enumerate() {
        if object.layer_config_ranges.is_empty() {
            continue;
        }

        let mut object_element = BytesStart::new(OBJECT_TAG);
        object_element.push_attribute((ID_ATTR, (index + 1).to_string().as_str()));
        writer.write_event(Event::Start(object_element))?;

        for range in &object.layer_config_ranges {
            let mut range_element = BytesStart::new("range");
            range_element.push_attribute((MIN_Z_ATTR, range.min_z.to_string().as_str()));
            range_element.push_attribute((MAX_Z_ATTR, range.max_z.to_string().as_str()));
            writer.write_event(Event::Start(range_element))?;

            for key in range.config.keys() {
                let value = range.config.opt_serialize(key).unwrap_or_default();
                let mut option_element = BytesStart::new("option");
                option_element.push_attribute((OPT_KEY_ATTR, key));
                writer.write_event(Event::Start(option_element))?;
                writer.write_event(Event::Text(BytesText::new(value)))?;
                writer.write_event(Event::End(BytesEnd::new("option")))?;
            }

            writer.write_event(Event::End(BytesEnd::new("range")))?;
        }

        writer.write_event(Event::End(BytesEnd::new(OBJECT_TAG)))?;
    }

    writer.write_event(Event::End(BytesEnd::new("objects")))?;
    Ok(Some(writer.into_inner()))
}

/// Serialize the print-config member.
pub(super) fn print_config(config: &DynamicConfig) -> Vec<u8> {
    let mut out = format!(
        "; generated by {} {}\n\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    for key in config.keys() {
        if PRINT_CONFIG_DENYLIST.contains(&key) {
            continue;
        }
        let value = config.opt_serialize(key).unwrap_or_default();
        let _ = writeln!(out, "; {key} = {value}");
    }
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LayerConfigRange, SupportPoint};

    #[test]
    fn layer_heights_skip_invalid_profiles() {
        let mut model = Model::new();
        model.add_object().layer_height_profile = vec![0.0, 0.2, 10.0]; // odd
        model.add_object().layer_height_profile = vec![0.0, 0.2, 10.0, 0.3];
        let out = layer_heights_profiles(&model).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "object_id=2|0;0.2;10;0.3\n");
    }

    #[test]
    fn no_profiles_no_member() {
        let mut model = Model::new();
        model.add_object();
        assert!(layer_heights_profiles(&model).is_none());
        assert!(sla_support_points(&model).is_none());
        assert!(layer_config_ranges(&model).unwrap().is_none());
    }

    #[test]
    fn sla_points_carry_version_header() {
        let mut model = Model::new();
        model.add_object().sla_support_points =
            vec![SupportPoint::new([0.0, 0.0, 0.0], 0.5, true)];
        let out = sla_support_points(&model).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("support_points_format_version=1\n"));
        assert!(text.contains("object_id=1|0 0 0 0.5 1"));
    }

    #[test]
    fn ranges_serialize_options_as_text() {
        let mut model = Model::new();
        let object = model.add_object();
        let mut range = LayerConfigRange {
            min_z: 0.0,
            max_z: 7.5,
            config: DynamicConfig::new(),
        };
        range.config.set_deserialize("layer_height", "0.1");
        object.layer_config_ranges.push(range);

        let out = layer_config_ranges(&model).unwrap().unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(r#"<range min_z="0" max_z="7.5">"#));
        assert!(text.contains(r#"<option opt_key="layer_height">0.1</option>"#));
    }

    #[test]
    fn print_config_denylist() {
        let mut config = DynamicConfig::new();
        config.set_deserialize("layer_height", "0.2");
        config.set_deserialize("compatible_printers", "MK3S");
        let text = String::from_utf8(print_config(&config)).unwrap();
        assert!(text.starts_with("; generated by "));
        assert!(text.contains("; layer_height = 0.2\n"));
        assert!(!text.contains("compatible_printers"));
    }
}
