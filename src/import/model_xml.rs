//! Streaming reader for the 3MF geometry document.
//!
//! Events from the XML stream are dispatched on the local element name into
//! small `handle_*` methods that drive the import state machine: the current
//! object's geometry buffers, the component list, the build items and the
//! version metadata. The stream comes straight from the decompressing ZIP
//! member reader, so the document is never held in memory as a whole.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::attrs::{attr_bool, attr_float, attr_int, attr_string, collect_attributes, AttributeList};
use super::{Component, CurrentObject, Geometry, Importer};
use crate::error::{Error, Result};
use crate::names::*;
use crate::transform::{transform_from_attribute, unit_factor};

/// Initial buffer capacity for XML event reads.
const XML_BUFFER_CAPACITY: usize = 4096;

/// Element name without its namespace prefix.
pub(super) fn local_name(name: &str) -> &str {
    match name.rfind(':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// Object types that produce model objects. Anything else (supports,
/// surfaces, "other") is skipped without an error.
fn is_importable_object_type(object_type: &str) -> bool {
    object_type.is_empty() || object_type == "model"
}

/// Parse one geometry document into the importer state.
pub(super) fn parse_geometry_document<R: BufRead>(
    importer: &mut Importer,
    reader: R,
) -> Result<()> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);
    let mut buf = Vec::with_capacity(XML_BUFFER_CAPACITY);

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref element) => {
                let name = element.name();
                let name = String::from_utf8_lossy(name.as_ref()).into_owned();
                dispatch_start(importer, local_name(&name), element)?;
            }
            Event::Empty(ref element) => {
                // an empty element is a start immediately followed by an end
                let name = element.name();
                let name = String::from_utf8_lossy(name.as_ref()).into_owned();
                let local = local_name(&name);
                dispatch_start(importer, local, element)?;
                dispatch_end(importer, local)?;
            }
            Event::End(ref element) => {
                let name = element.name();
                let name = String::from_utf8_lossy(name.as_ref()).into_owned();
                dispatch_end(importer, local_name(&name))?;
            }
            Event::Text(text) => {
                importer.curr_characters.push_str(&text.unescape()?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn dispatch_start(importer: &mut Importer, local: &str, element: &BytesStart<'_>) -> Result<()> {
    match local {
        MODEL_TAG => {
            let attributes = collect_attributes(element)?;
            importer.handle_start_model(&attributes)
        }
        OBJECT_TAG => {
            let attributes = collect_attributes(element)?;
            importer.handle_start_object(&attributes)
        }
        MESH_TAG => {
            importer.handle_start_mesh();
            Ok(())
        }
        VERTICES_TAG => {
            importer.handle_start_vertices();
            Ok(())
        }
        VERTEX_TAG => {
            let attributes = collect_attributes(element)?;
            importer.handle_vertex(&attributes);
            Ok(())
        }
        TRIANGLES_TAG => {
            importer.handle_start_triangles();
            Ok(())
        }
        TRIANGLE_TAG => {
            let attributes = collect_attributes(element)?;
            importer.handle_triangle(&attributes);
            Ok(())
        }
        COMPONENTS_TAG => {
            importer.handle_start_components();
            Ok(())
        }
        COMPONENT_TAG => {
            let attributes = collect_attributes(element)?;
            importer.handle_component(&attributes)
        }
        ITEM_TAG => {
            let attributes = collect_attributes(element)?;
            importer.handle_item(&attributes)
        }
        METADATA_TAG => {
            let attributes = collect_attributes(element)?;
            importer.handle_start_metadata(&attributes);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn dispatch_end(importer: &mut Importer, local: &str) -> Result<()> {
    match local {
        OBJECT_TAG => importer.handle_end_object(),
        METADATA_TAG => importer.handle_end_metadata(),
        MODEL_TAG => {
            importer.finish_model_document();
            Ok(())
        }
        _ => Ok(()),
    }
}

impl Importer {
    fn handle_start_model(&mut self, attributes: &AttributeList) -> Result<()> {
        self.unit_factor = unit_factor(attr_string(attributes, UNIT_ATTR));
        Ok(())
    }

    fn handle_start_object(&mut self, attributes: &AttributeList) -> Result<()> {
        self.curr_object = None;

        if !is_importable_object_type(attr_string(attributes, TYPE_ATTR)) {
            return Ok(());
        }

        let id = attr_int(attributes, ID_ATTR);
        if id <= 0 {
            return Err(Error::BadAttribute {
                element: OBJECT_TAG,
                attribute: ID_ATTR,
                reason: format!("object ids must be positive, got {id}"),
            });
        }

        // create the model object now; it is removed again at </object> or
        // </model> if it turns out to carry no geometry or no instance
        let model_object_idx = self.model.objects.len();
        let object = self.model.add_object();
        let name = attr_string(attributes, NAME_ATTR);
        object.name = if name.is_empty() {
            format!("{}_{}", self.archive_stem, model_object_idx + 1)
        } else {
            name.to_string()
        };

        self.curr_object = Some(CurrentObject {
            id,
            model_object_idx,
            geometry: Geometry::default(),
            components: Vec::new(),
        });
        Ok(())
    }

    fn handle_end_object(&mut self) -> Result<()> {
        let Some(curr) = self.curr_object.take() else {
            return Ok(());
        };

        if curr.geometry.is_empty() {
            // no geometry: drop the placeholder model object
            self.model.delete_object(curr.model_object_idx);
            if curr.components.is_empty() {
                // neither geometry nor components: forget the id entirely
                self.objects.remove(&curr.id);
                self.aliases.remove(&curr.id);
            } else {
                self.aliases.entry(curr.id).or_insert(curr.components);
            }
        } else {
            if self.objects.contains_key(&curr.id) {
                return Err(Error::DuplicateObjectId(curr.id));
            }
            self.geometries.insert(curr.id, curr.geometry);
            self.objects.insert(curr.id, curr.model_object_idx);
            self.aliases
                .insert(curr.id, vec![Component::self_alias(curr.id)]);
        }
        Ok(())
    }

    fn handle_start_mesh(&mut self) {
        if let Some(curr) = &mut self.curr_object {
            curr.geometry.reset();
        }
    }

    fn handle_start_vertices(&mut self) {
        if let Some(curr) = &mut self.curr_object {
            curr.geometry.vertices.clear();
        }
    }

    fn handle_vertex(&mut self, attributes: &AttributeList) {
        let unit = self.unit_factor;
        if let Some(curr) = &mut self.curr_object {
            // missing coordinates default to zero
            curr.geometry
                .vertices
                .push(unit * attr_float(attributes, X_ATTR));
            curr.geometry
                .vertices
                .push(unit * attr_float(attributes, Y_ATTR));
            curr.geometry
                .vertices
                .push(unit * attr_float(attributes, Z_ATTR));
        }
    }

    fn handle_start_triangles(&mut self) {
        if let Some(curr) = &mut self.curr_object {
            curr.geometry.triangles.clear();
        }
    }

    fn handle_triangle(&mut self, attributes: &AttributeList) {
        if let Some(curr) = &mut self.curr_object {
            // p1/p2/p3/pid property attributes are ignored
            curr.geometry
                .triangles
                .push(attr_int(attributes, V1_ATTR) as u32);
            curr.geometry
                .triangles
                .push(attr_int(attributes, V2_ATTR) as u32);
            curr.geometry
                .triangles
                .push(attr_int(attributes, V3_ATTR) as u32);
        }
    }

    fn handle_start_components(&mut self) {
        if let Some(curr) = &mut self.curr_object {
            curr.components.clear();
        }
    }

    fn handle_component(&mut self, attributes: &AttributeList) -> Result<()> {
        if self.curr_object.is_none() {
            return Ok(());
        }

        let object_id = attr_int(attributes, OBJECTID_ATTR);
        let transform = transform_from_attribute(attr_string(attributes, TRANSFORM_ATTR));

        // the referenced object must have been defined earlier in the document
        if !self.objects.contains_key(&object_id) && !self.aliases.contains_key(&object_id) {
            return Err(Error::UnknownComponent(object_id));
        }

        self.curr_object
            .as_mut()
            .unwrap()
            .components
            .push(Component {
                object_id,
                transform,
            });
        Ok(())
    }

    fn handle_item(&mut self, attributes: &AttributeList) -> Result<()> {
        let object_id = attr_int(attributes, OBJECTID_ATTR);
        let transform = transform_from_attribute(attr_string(attributes, TRANSFORM_ATTR));
        let printable = attr_bool(attributes, PRINTABLE_ATTR);
        self.create_object_instance(object_id, transform, printable, 1)
    }

    fn handle_start_metadata(&mut self, attributes: &AttributeList) {
        self.curr_characters.clear();
        let name = attr_string(attributes, NAME_ATTR);
        if !name.is_empty() {
            self.curr_metadata_name = name.to_string();
        }
    }

    fn handle_end_metadata(&mut self) -> Result<()> {
        if self.curr_metadata_name == VERSION_METADATA_NAME {
            let version = self.curr_characters.trim().parse().unwrap_or(0);
            self.record_version(version)?;
        }
        Ok(())
    }
}
