//! Streaming reader for the model-config sidecar
//! (`Metadata/Slic3r_PE_model.config`).
//!
//! The document associates per-object metadata and per-volume triangle
//! ranges with objects imported from the geometry document. Unlike the
//! line-oriented sidecars, structural problems here are fatal: without the
//! volume ranges the mesh cannot be split correctly.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::attrs::{attr_int, attr_string, collect_attributes};
use super::model_xml::local_name;
use super::{Importer, Metadata, ObjectMetadata, VolumeMetadata};
use crate::error::{Error, Result};
use crate::names::*;

/// Parse the model-config document into the importer's metadata table.
pub(super) fn parse_model_config<R: BufRead>(importer: &mut Importer, reader: R) -> Result<()> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);
    let mut buf = Vec::with_capacity(1024);

    // the object the following volume/metadata elements attach to
    let mut curr_object_id: Option<i32> = None;

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let name = element.name();
                let name = String::from_utf8_lossy(name.as_ref()).into_owned();
                match local_name(&name) {
                    OBJECT_TAG => handle_object(importer, element, &mut curr_object_id)?,
                    VOLUME_TAG => handle_volume(importer, element, curr_object_id)?,
                    METADATA_TAG => handle_metadata(importer, element, curr_object_id)?,
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

fn handle_object(
    importer: &mut Importer,
    element: &BytesStart<'_>,
    curr_object_id: &mut Option<i32>,
) -> Result<()> {
    let attributes = collect_attributes(element)?;
    let object_id = attr_int(&attributes, ID_ATTR);

    if importer.objects_metadata.contains_key(&object_id) {
        return Err(Error::DuplicateObjectId(object_id));
    }

    importer
        .objects_metadata
        .insert(object_id, ObjectMetadata::default());
    *curr_object_id = Some(object_id);
    Ok(())
}

fn handle_volume(
    importer: &mut Importer,
    element: &BytesStart<'_>,
    curr_object_id: Option<i32>,
) -> Result<()> {
    let object = curr_object_id
        .and_then(|id| importer.objects_metadata.get_mut(&id))
        .ok_or_else(|| {
            Error::InvalidModelConfig(String::from("cannot assign volume to a valid object"))
        })?;

    let attributes = collect_attributes(element)?;
    object.volumes.push(VolumeMetadata {
        first_triangle_id: attr_int(&attributes, FIRST_TRIANGLE_ID_ATTR) as u32,
        last_triangle_id: attr_int(&attributes, LAST_TRIANGLE_ID_ATTR) as u32,
        metadata: Vec::new(),
    });
    Ok(())
}

fn handle_metadata(
    importer: &mut Importer,
    element: &BytesStart<'_>,
    curr_object_id: Option<i32>,
) -> Result<()> {
    let object = curr_object_id
        .and_then(|id| importer.objects_metadata.get_mut(&id))
        .ok_or_else(|| {
            Error::InvalidModelConfig(String::from("cannot assign metadata to a valid object"))
        })?;

    let attributes = collect_attributes(element)?;
    let metadata_type = attr_string(&attributes, TYPE_ATTR);
    let metadata = Metadata {
        key: attr_string(&attributes, KEY_ATTR).to_string(),
        value: attr_string(&attributes, VALUE_ATTR).to_string(),
    };

    if metadata_type == OBJECT_TYPE {
        object.metadata.push(metadata);
    } else if metadata_type == VOLUME_TYPE {
        // volume metadata attaches to the most recently opened volume
        if let Some(volume) = object.volumes.last_mut() {
            volume.metadata.push(metadata);
        }
    } else {
        return Err(Error::BadMetadataType(metadata_type.to_string()));
    }
    Ok(())
}
