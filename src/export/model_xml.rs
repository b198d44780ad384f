//! Writer for the 3MF geometry document.
//!
//! Every instance of every model object gets its own `<object>` element and
//! a dense 1-based ID. The first instance of an object carries the single
//! indexed triangle set holding all of the object's volumes (vertices
//! pre-multiplied by the volume matrix, so the file stores world-frame
//! coordinates); later instances are component-only objects pointing back at
//! the canonical one. The per-volume offsets into the shared triangle set
//! are collected for the model-config writer.

use std::io::Write;

use nalgebra::{Matrix4, Point3};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{Error, Result};
use crate::model::{Model, ModelObject};
use crate::names::*;
use crate::transform::transform_to_attribute;
use crate::FORMAT_VERSION;

/// 3MF core namespace.
const CORE_NAMESPACE: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

/// Namespace of the application metadata (the version entry).
const SLIC3RPE_NAMESPACE: &str = "http://schemas.slic3r.org/3mf/2017/06";

/// Position of one volume inside its object's shared triangle set.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Offsets {
    /// Index of the volume's first vertex.
    pub(crate) first_vertex_id: u32,
    /// Index of the volume's first triangle.
    pub(crate) first_triangle_id: u32,
    /// Index of the volume's last triangle, inclusive.
    pub(crate) last_triangle_id: u32,
}

/// What the geometry writer learned about one emitted object; consumed by
/// the model-config writer.
#[derive(Debug)]
pub(crate) struct ObjectData {
    /// Index of the object in the source model.
    pub(crate) object_index: usize,
    /// ID of the object's first (canonical, mesh-bearing) instance.
    pub(crate) first_instance_id: u32,
    /// Offsets per volume, in volume order.
    pub(crate) volume_offsets: Vec<Offsets>,
}

struct BuildItem {
    id: u32,
    transform: Matrix4<f64>,
    printable: bool,
}

/// Serialize the geometry document. Returns the document bytes and the
/// per-object data the model-config writer needs.
pub(super) fn write_model_document(model: &Model) -> Result<(Vec<u8>, Vec<ObjectData>)> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut model_element = BytesStart::new(MODEL_TAG);
    model_element.push_attribute((UNIT_ATTR, "millimeter"));
    model_element.push_attribute(("xml:lang", "en-US"));
    model_element.push_attribute(("xmlns", CORE_NAMESPACE));
    model_element.push_attribute(("xmlns:slic3rpe", SLIC3RPE_NAMESPACE));
    writer.write_event(Event::Start(model_element))?;

    let mut version = BytesStart::new(METADATA_TAG);
    version.push_attribute((NAME_ATTR, VERSION_METADATA_NAME));
    writer.write_event(Event::Start(version))?;
    writer.write_event(Event::Text(BytesText::new(&FORMAT_VERSION.to_string())))?;
    writer.write_event(Event::End(BytesEnd::new(METADATA_TAG)))?;

    writer.write_event(Event::Start(BytesStart::new(RESOURCES_TAG)))?;

    let mut build_items: Vec<BuildItem> = Vec::new();
    let mut objects_data: Vec<ObjectData> = Vec::new();
    // IDs number the instances of all objects in one dense 1-based sequence
    let mut next_object_id: u32 = 1;

    for (object_index, object) in model.objects.iter().enumerate() {
        if object.instances.is_empty() {
            tracing::debug!(
                target: "slicer3mf",
                "skipping object '{}' with no instances",
                object.name
            );
            continue;
        }

        let first_instance_id = next_object_id;
        let mut volume_offsets = Vec::new();

        for (instance_index, instance) in object.instances.iter().enumerate() {
            let instance_id = next_object_id + instance_index as u32;

            let mut object_element = BytesStart::new(OBJECT_TAG);
            object_element.push_attribute((ID_ATTR, instance_id.to_string().as_str()));
            object_element.push_attribute((TYPE_ATTR, "model"));
            writer.write_event(Event::Start(object_element))?;

            if instance_index == 0 {
                volume_offsets = write_mesh(&mut writer, object)?;
            } else {
                writer.write_event(Event::Start(BytesStart::new(COMPONENTS_TAG)))?;
                let mut component = BytesStart::new(COMPONENT_TAG);
                component.push_attribute((OBJECTID_ATTR, first_instance_id.to_string().as_str()));
                writer.write_event(Event::Empty(component))?;
                writer.write_event(Event::End(BytesEnd::new(COMPONENTS_TAG)))?;
            }

            writer.write_event(Event::End(BytesEnd::new(OBJECT_TAG)))?;

            build_items.push(BuildItem {
                id: instance_id,
                transform: *instance.matrix(),
                printable: instance.printable,
            });
        }

        next_object_id += object.instances.len() as u32;
        objects_data.push(ObjectData {
            object_index,
            first_instance_id,
            volume_offsets,
        });
    }

    writer.write_event(Event::End(BytesEnd::new(RESOURCES_TAG)))?;

    write_build(&mut writer, &build_items)?;

    writer.write_event(Event::End(BytesEnd::new(MODEL_TAG)))?;

    Ok((writer.into_inner(), objects_data))
}

/// Emit the shared triangle set of one object and record volume offsets.
fn write_mesh<W: Write>(writer: &mut Writer<W>, object: &ModelObject) -> Result<Vec<Offsets>> {
    let mut offsets: Vec<Offsets> = Vec::with_capacity(object.volumes.len());

    writer.write_event(Event::Start(BytesStart::new(MESH_TAG)))?;
    writer.write_event(Event::Start(BytesStart::new(VERTICES_TAG)))?;

    let mut vertex_count: u32 = 0;
    for volume in &object.volumes {
        if !volume.mesh.repaired {
            return Err(Error::MeshNotRepaired);
        }
        if volume.mesh.is_empty() {
            return Err(Error::EmptyMesh);
        }

        offsets.push(Offsets {
            first_vertex_id: vertex_count,
            ..Offsets::default()
        });
        vertex_count += volume.mesh.vertices.len() as u32;

        // the file stores vertices in the object's frame
        let matrix = volume.matrix();
        for vertex in &volume.mesh.vertices {
            let p = matrix.transform_point(&Point3::new(
                f64::from(vertex[0]),
                f64::from(vertex[1]),
                f64::from(vertex[2]),
            ));
            let mut element = BytesStart::new(VERTEX_TAG);
            element.push_attribute((X_ATTR, (p.x as f32).to_string().as_str()));
            element.push_attribute((Y_ATTR, (p.y as f32).to_string().as_str()));
            element.push_attribute((Z_ATTR, (p.z as f32).to_string().as_str()));
            writer.write_event(Event::Empty(element))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new(VERTICES_TAG)))?;
    writer.write_event(Event::Start(BytesStart::new(TRIANGLES_TAG)))?;

    let mut triangle_count: u32 = 0;
    for (volume, volume_offsets) in object.volumes.iter().zip(offsets.iter_mut()) {
        volume_offsets.first_triangle_id = triangle_count;
        triangle_count += volume.mesh.indices.len() as u32;
        volume_offsets.last_triangle_id = triangle_count - 1;

        for triangle in &volume.mesh.indices {
            let mut element = BytesStart::new(TRIANGLE_TAG);
            for (attr, index) in [V1_ATTR, V2_ATTR, V3_ATTR].iter().zip(triangle.iter()) {
                let shifted = index + volume_offsets.first_vertex_id;
                element.push_attribute((*attr, shifted.to_string().as_str()));
            }
            writer.write_event(Event::Empty(element))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new(TRIANGLES_TAG)))?;
    writer.write_event(Event::End(BytesEnd::new(MESH_TAG)))?;

    Ok(offsets)
}

/// Emit the build section referencing every instance ID.
fn write_build<W: Write>(writer: &mut Writer<W>, build_items: &[BuildItem]) -> Result<()> {
    if build_items.is_empty() {
        return Err(Error::NoBuildItems);
    }

    writer.write_event(Event::Start(BytesStart::new(BUILD_TAG)))?;

    for item in build_items {
        let mut element = BytesStart::new(ITEM_TAG);
        element.push_attribute((OBJECTID_ATTR, item.id.to_string().as_str()));
        element.push_attribute((
            TRANSFORM_ATTR,
            transform_to_attribute(&item.transform).as_str(),
        ));
        element.push_attribute((PRINTABLE_ATTR, if item.printable { "1" } else { "0" }));
        writer.write_event(Event::Empty(element))?;
    }

    writer.write_event(Event::End(BytesEnd::new(BUILD_TAG)))?;
    Ok(())
}
