//! Import side: archive walking, geometry and config parsing, and the
//! materialization of volumes into the model.
//!
//! Loading is strictly two-pass. The first pass over the archive entries only
//! streams geometry documents (`3D/*.model`), which fills the object, alias
//! and geometry tables and resolves build items into pending instances. The
//! second pass handles the sidecar members, whose records reference object
//! IDs and 1-based model indices established by the first pass.

pub(crate) mod attrs;
mod config_xml;
mod model_xml;
mod sidecars;

use std::collections::BTreeMap;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use nalgebra::{Matrix4, Point3};

use crate::error::{Diagnostics, Error, Result};
use crate::model::{
    DynamicConfig, LayerConfigRange, Model, ModelInstance, ModelObject, ModelVolumeType,
    SlaPointsStatus, SupportPoint, Transformation, TriangleMesh,
};
use crate::names::*;
use crate::opc::{self, PackageReader};
use crate::FORMAT_VERSION;

/// Recursion limit of the component resolver; guards cyclic alias graphs.
const MAX_RECURSIONS: u32 = 10;

/// A reference from one object to another, with a placement.
#[derive(Debug, Clone)]
pub(crate) struct Component {
    pub(crate) object_id: i32,
    pub(crate) transform: Matrix4<f64>,
}

impl Component {
    fn self_alias(object_id: i32) -> Self {
        Self {
            object_id,
            transform: Matrix4::identity(),
        }
    }
}

/// Raw indexed-triangle-set buffers of one object.
#[derive(Debug, Default)]
pub(crate) struct Geometry {
    /// Vertex components, three per vertex, already scaled to millimeters.
    pub(crate) vertices: Vec<f32>,
    /// Vertex indices, three per triangle.
    pub(crate) triangles: Vec<u32>,
}

impl Geometry {
    pub(crate) fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.triangles.is_empty()
    }

    pub(crate) fn reset(&mut self) {
        self.vertices.clear();
        self.triangles.clear();
    }

    pub(crate) fn triangle_count(&self) -> u32 {
        (self.triangles.len() / 3) as u32
    }

    pub(crate) fn vertex_count(&self) -> u32 {
        (self.vertices.len() / 3) as u32
    }
}

/// Parser scratch for the object currently being read.
pub(crate) struct CurrentObject {
    pub(crate) id: i32,
    pub(crate) model_object_idx: usize,
    pub(crate) geometry: Geometry,
    pub(crate) components: Vec<Component>,
}

/// One key/value pair from the model-config sidecar.
#[derive(Debug, Clone)]
pub(crate) struct Metadata {
    pub(crate) key: String,
    pub(crate) value: String,
}

/// Triangle range and metadata of one volume, from the model-config sidecar.
#[derive(Debug, Default)]
pub(crate) struct VolumeMetadata {
    pub(crate) first_triangle_id: u32,
    pub(crate) last_triangle_id: u32,
    pub(crate) metadata: Vec<Metadata>,
}

/// Per-object data from the model-config sidecar.
#[derive(Debug, Default)]
pub(crate) struct ObjectMetadata {
    pub(crate) metadata: Vec<Metadata>,
    pub(crate) volumes: Vec<VolumeMetadata>,
}

/// A resolved build item waiting for its transform to be applied at
/// `</model>`.
struct PendingInstance {
    object_id: i32,
    instance_idx: usize,
    transform: Matrix4<f64>,
}

/// State of one `load` call.
pub(crate) struct Importer {
    pub(crate) model: Model,
    pub(crate) config: DynamicConfig,
    check_version: bool,
    pub(crate) version: u32,
    pub(crate) unit_factor: f32,
    pub(crate) archive_stem: String,
    pub(crate) curr_object: Option<CurrentObject>,
    /// 3MF object ID -> model object index, for mesh-bearing objects.
    pub(crate) objects: BTreeMap<i32, usize>,
    /// 3MF object ID -> expansion list; mesh-bearing objects alias themselves.
    pub(crate) aliases: BTreeMap<i32, Vec<Component>>,
    pub(crate) geometries: BTreeMap<i32, Geometry>,
    instances: Vec<PendingInstance>,
    pub(crate) objects_metadata: BTreeMap<i32, ObjectMetadata>,
    /// Keyed by 1-based model object index.
    pub(crate) layer_heights_profiles: BTreeMap<i32, Vec<f64>>,
    /// Keyed by 1-based model object index.
    pub(crate) layer_config_ranges: BTreeMap<i32, Vec<LayerConfigRange>>,
    /// Keyed by 1-based model object index.
    pub(crate) sla_support_points: BTreeMap<i32, Vec<SupportPoint>>,
    pub(crate) curr_metadata_name: String,
    pub(crate) curr_characters: String,
    pub(crate) diagnostics: Diagnostics,
}

impl Importer {
    fn new(archive_stem: String, check_version: bool) -> Self {
        Self {
            model: Model::new(),
            config: DynamicConfig::new(),
            check_version,
            version: 0,
            unit_factor: 1.0,
            archive_stem,
            curr_object: None,
            objects: BTreeMap::new(),
            aliases: BTreeMap::new(),
            geometries: BTreeMap::new(),
            instances: Vec::new(),
            objects_metadata: BTreeMap::new(),
            layer_heights_profiles: BTreeMap::new(),
            layer_config_ranges: BTreeMap::new(),
            sla_support_points: BTreeMap::new(),
            curr_metadata_name: String::new(),
            curr_characters: String::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Check the version recorded in the geometry document against the
    /// writer version.
    pub(crate) fn record_version(&mut self, version: u32) -> Result<()> {
        self.version = version;
        if self.check_version && version > FORMAT_VERSION {
            return Err(Error::VersionTooNew {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        Ok(())
    }

    /// Resolve a build item (or a component reached from one) into concrete
    /// instances, composing transforms along the way.
    pub(crate) fn create_object_instance(
        &mut self,
        object_id: i32,
        transform: Matrix4<f64>,
        printable: bool,
        recursion: u32,
    ) -> Result<()> {
        if recursion > MAX_RECURSIONS {
            return Err(Error::AliasDepthExceeded(object_id));
        }

        let components = self
            .aliases
            .get(&object_id)
            .cloned()
            .ok_or(Error::UnknownBuildItem(object_id))?;

        if components.len() == 1 && components[0].object_id == object_id {
            // aliasing to itself: attach a concrete instance
            let model_idx = *self
                .objects
                .get(&object_id)
                .ok_or(Error::UnknownBuildItem(object_id))?;
            let object = &mut self.model.objects[model_idx];
            let instance_idx = object.instances.len();
            object.add_instance().printable = printable;
            self.instances.push(PendingInstance {
                object_id,
                instance_idx,
                transform,
            });
        } else {
            for component in &components {
                self.create_object_instance(
                    component.object_id,
                    transform * component.transform,
                    printable,
                    recursion + 1,
                )?;
            }
        }

        Ok(())
    }

    /// End-of-document bookkeeping: drop objects that never acquired an
    /// instance (remapping the ID table to the shifted indices) and apply
    /// the recorded instance transforms.
    pub(crate) fn finish_model_document(&mut self) {
        let mut doomed: Vec<(i32, usize)> = self
            .objects
            .iter()
            .filter(|(_, &idx)| self.model.objects[idx].instances.is_empty())
            .map(|(&id, &idx)| (id, idx))
            .collect();
        doomed.sort_by_key(|&(_, idx)| std::cmp::Reverse(idx));
        for (id, idx) in doomed {
            self.model.delete_object(idx);
            self.objects.remove(&id);
            self.geometries.remove(&id);
            for index in self.objects.values_mut() {
                if *index > idx {
                    *index -= 1;
                }
            }
        }

        for pending in &self.instances {
            let Some(&model_idx) = self.objects.get(&pending.object_id) else {
                continue;
            };
            let Some(instance) = self.model.objects[model_idx]
                .instances
                .get_mut(pending.instance_idx)
            else {
                continue;
            };
            apply_instance_transform(instance, &pending.transform);
        }
        self.instances.clear();
    }

    /// Materialize volumes for every imported object and attach the sidecar
    /// state, then hand the finished model back.
    fn finalize(mut self) -> Result<(Model, DynamicConfig, Diagnostics)> {
        let object_table: Vec<(i32, usize)> =
            self.objects.iter().map(|(&id, &idx)| (id, idx)).collect();

        for (id, model_idx) in object_table {
            let geometry = self
                .geometries
                .get(&id)
                .ok_or(Error::MissingGeometry(id))?;
            let model_object = &mut self.model.objects[model_idx];

            let sidecar_key = model_idx as i32 + 1;
            if let Some(profile) = self.layer_heights_profiles.get(&sidecar_key) {
                model_object.layer_height_profile = profile.clone();
            }
            if let Some(ranges) = self.layer_config_ranges.get(&sidecar_key) {
                model_object.layer_config_ranges = ranges.clone();
            }
            if let Some(points) = self.sla_support_points.get(&sidecar_key) {
                if !points.is_empty() {
                    model_object.sla_support_points = points.clone();
                    model_object.sla_points_status = SlaPointsStatus::UserModified;
                }
            }

            let default_volumes;
            let volumes: &[VolumeMetadata] = match self.objects_metadata.get(&id) {
                Some(object_metadata) => {
                    // config data found: the file was saved by this application
                    for metadata in &object_metadata.metadata {
                        if metadata.key == NAME_KEY {
                            model_object.name = metadata.value.clone();
                        } else {
                            model_object
                                .config
                                .set_deserialize(&metadata.key, &metadata.value);
                        }
                    }
                    &object_metadata.volumes
                }
                None => {
                    // no config data: the whole geometry becomes one volume
                    default_volumes = [VolumeMetadata {
                        first_triangle_id: 0,
                        last_triangle_id: geometry.triangle_count() - 1,
                        metadata: Vec::new(),
                    }];
                    &default_volumes
                }
            };

            generate_volumes(model_object, geometry, volumes, self.version)?;
        }

        self.model.adjust_min_z();
        Ok((self.model, self.config, self.diagnostics))
    }
}

/// Apply a build-item transform to an instance.
///
/// A transform with a zero scale component is not invertible; it is skipped
/// and the instance keeps its identity placement.
fn apply_instance_transform(instance: &mut ModelInstance, matrix: &Matrix4<f64>) {
    let transformation = Transformation::from_matrix(*matrix);
    let scale = transformation.scaling_factor();
    if scale.x == 0.0 || scale.y == 0.0 || scale.z == 0.0 {
        return;
    }
    instance.set_transformation(transformation);
}

/// Slice per-volume meshes out of an object's shared geometry.
fn generate_volumes(
    model_object: &mut ModelObject,
    geometry: &Geometry,
    volumes: &[VolumeMetadata],
    version: u32,
) -> Result<()> {
    let triangle_count = geometry.triangle_count();
    let vertex_count = geometry.vertex_count();

    for volume_data in volumes {
        let first = volume_data.first_triangle_id;
        let last = volume_data.last_triangle_id;
        if last < first || last >= triangle_count {
            return Err(Error::BadTriangleRange {
                first,
                last,
                triangle_count,
            });
        }

        // volumes of version > 1 files store their local placement in the
        // `matrix` metadata; the shared geometry is in world frame
        let mut transformation = Transformation::identity();
        let mut has_matrix = false;
        if version > 1 {
            if let Some(metadata) = volume_data
                .metadata
                .iter()
                .find(|m| m.key == MATRIX_KEY)
            {
                transformation.set_from_string(&metadata.value);
                has_matrix = true;
            }
        }
        let inverse = transformation
            .matrix()
            .try_inverse()
            .unwrap_or_else(Matrix4::identity);

        let facet_count = (last - first + 1) as usize;
        let mut facets = Vec::with_capacity(facet_count);
        for triangle in first..=last {
            let mut facet = [[0.0f32; 3]; 3];
            for (corner, slot) in facet.iter_mut().enumerate() {
                let index = geometry.triangles[(triangle * 3) as usize + corner];
                if index >= vertex_count {
                    return Err(Error::BadVertexIndex {
                        index,
                        vertex_count,
                    });
                }
                let base = (index * 3) as usize;
                let mut vertex = [
                    geometry.vertices[base],
                    geometry.vertices[base + 1],
                    geometry.vertices[base + 2],
                ];
                if has_matrix {
                    // revert to the volume's own reference frame
                    let p = inverse.transform_point(&Point3::new(
                        f64::from(vertex[0]),
                        f64::from(vertex[1]),
                        f64::from(vertex[2]),
                    ));
                    vertex = [p.x as f32, p.y as f32, p.z as f32];
                }
                *slot = vertex;
            }
            facets.push(facet);
        }

        let mut mesh = TriangleMesh::from_facets(&facets);
        mesh.repair();

        let volume = model_object.add_volume(mesh);
        if has_matrix {
            volume.set_transformation(transformation);
        }
        volume.calculate_convex_hull();

        for metadata in &volume_data.metadata {
            let value = metadata.value.as_str();
            match metadata.key.as_str() {
                NAME_KEY => volume.name = value.to_string(),
                MODIFIER_KEY => {
                    // legacy flag, superseded by volume_type below
                    if value == "1" {
                        volume.set_type(ModelVolumeType::ParameterModifier);
                    }
                }
                VOLUME_TYPE_KEY => volume.set_type(ModelVolumeType::from_string(value)),
                SOURCE_FILE_KEY => volume.source.input_file = value.to_string(),
                SOURCE_OBJECT_ID_KEY => volume.source.object_idx = value.parse().unwrap_or(0),
                SOURCE_VOLUME_ID_KEY => volume.source.volume_idx = value.parse().unwrap_or(0),
                SOURCE_OFFSET_X_KEY => volume.source.mesh_offset[0] = value.parse().unwrap_or(0.0),
                SOURCE_OFFSET_Y_KEY => volume.source.mesh_offset[1] = value.parse().unwrap_or(0.0),
                SOURCE_OFFSET_Z_KEY => volume.source.mesh_offset[2] = value.parse().unwrap_or(0.0),
                MATRIX_KEY => {}
                _ => volume.config.set_deserialize(&metadata.key, value),
            }
        }
    }

    Ok(())
}

/// True for archive members holding a geometry document.
fn is_model_member(name: &str) -> bool {
    let folder = opc::MODEL_FOLDER;
    let extension = opc::MODEL_EXTENSION;
    name.len() >= folder.len() + extension.len()
        && name[..folder.len()].eq_ignore_ascii_case(folder)
        && name[name.len() - extension.len()..].eq_ignore_ascii_case(extension)
}

/// Load a 3MF container from disk.
pub(crate) fn load_from_path(
    path: &Path,
    check_version: bool,
) -> Result<(Model, DynamicConfig, Diagnostics)> {
    let mut package = opc::open_path(path)?;
    let archive_stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    load_from_package(&mut package, archive_stem, check_version)
}

/// Load a 3MF container from an already open archive.
pub(crate) fn load_from_package<R: Read + Seek>(
    package: &mut PackageReader<R>,
    archive_stem: String,
    check_version: bool,
) -> Result<(Model, DynamicConfig, Diagnostics)> {
    let mut importer = Importer::new(archive_stem, check_version);
    let entries = package.entries()?;

    // first pass: geometry documents only, so the version and the object
    // tables exist before any sidecar record references them
    let mut found_model = false;
    for entry in &entries {
        if is_model_member(&entry.name) {
            found_model = true;
            let reader = package.member_reader(entry)?;
            model_xml::parse_geometry_document(&mut importer, BufReader::new(reader))?;
        }
    }
    if !found_model {
        return Err(Error::MemberRead {
            name: opc::MODEL_FILE.to_string(),
            reason: String::from("the archive does not contain a geometry document"),
        });
    }

    // second pass: sidecar members
    for entry in &entries {
        let name = entry.name.as_str();
        if name.eq_ignore_ascii_case(opc::LAYER_HEIGHTS_PROFILE_FILE) {
            match package.read_to_memory(entry) {
                Ok(data) => sidecars::parse_layer_heights_profiles(
                    &String::from_utf8_lossy(&data),
                    &mut importer.layer_heights_profiles,
                    &mut importer.diagnostics,
                ),
                Err(e) => importer.diagnostics.report(e.to_string()),
            }
        } else if name.eq_ignore_ascii_case(opc::LAYER_CONFIG_RANGES_FILE) {
            match package.read_to_memory(entry) {
                Ok(data) => sidecars::parse_layer_config_ranges(
                    &String::from_utf8_lossy(&data),
                    &mut importer.layer_config_ranges,
                    &mut importer.diagnostics,
                )?,
                Err(e) => importer.diagnostics.report(e.to_string()),
            }
        } else if name.eq_ignore_ascii_case(opc::SLA_SUPPORT_POINTS_FILE) {
            match package.read_to_memory(entry) {
                Ok(data) => sidecars::parse_sla_support_points(
                    &String::from_utf8_lossy(&data),
                    &mut importer.sla_support_points,
                    &mut importer.diagnostics,
                ),
                Err(e) => importer.diagnostics.report(e.to_string()),
            }
        } else if name.eq_ignore_ascii_case(opc::PRINT_CONFIG_FILE) {
            match package.read_to_memory(entry) {
                Ok(data) => importer
                    .config
                    .load_from_gcode_string(&String::from_utf8_lossy(&data)),
                Err(e) => importer.diagnostics.report(e.to_string()),
            }
        } else if name.eq_ignore_ascii_case(opc::MODEL_CONFIG_FILE) {
            let reader = package.member_reader(entry)?;
            config_xml::parse_model_config(&mut importer, BufReader::new(reader))?;
        }
    }

    importer.finalize()
}
