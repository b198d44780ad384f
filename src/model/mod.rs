//! In-memory model collaborators.
//!
//! These are the data structures the container reader/writer populates and
//! serializes. The full slicer carries far richer versions of them; the ones
//! here implement exactly the surface the container touches, so the crate is
//! usable and testable on its own.

mod config;
mod mesh;

pub use config::DynamicConfig;
pub use mesh::{convex_hull_2d, TriangleMesh};

use nalgebra::{Matrix4, Point3, Vector3};

use crate::transform;

/// A rigid/affine placement, stored as a 4x4 matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformation {
    matrix: Matrix4<f64>,
}

impl Default for Transformation {
    fn default() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }
}

impl Transformation {
    /// Identity placement.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Wrap an existing matrix.
    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// The underlying matrix.
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Replace the matrix from a 16-value row-major string (the model-config
    /// `matrix` metadata). Malformed input resets to the identity.
    pub fn set_from_string(&mut self, text: &str) {
        self.matrix = transform::matrix_from_string(text);
    }

    /// Serialize as the 16-value row-major `matrix` metadata string.
    pub fn to_matrix_string(&self) -> String {
        transform::matrix_to_string(&self.matrix)
    }

    /// Per-axis scale factors.
    pub fn scaling_factor(&self) -> Vector3<f64> {
        transform::scaling_factor(&self.matrix)
    }

    /// Shift the placement along Z.
    pub fn translate_z(&mut self, dz: f64) {
        self.matrix[(2, 3)] += dz;
    }
}

/// Where a volume's mesh originally came from.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSource {
    /// Path of the input file the mesh was loaded from.
    pub input_file: String,
    /// Object index inside the input file, -1 when unknown.
    pub object_idx: i32,
    /// Volume index inside the input file, -1 when unknown.
    pub volume_idx: i32,
    /// Offset applied to the source mesh on import.
    pub mesh_offset: [f64; 3],
}

impl Default for VolumeSource {
    fn default() -> Self {
        Self {
            input_file: String::new(),
            object_idx: -1,
            volume_idx: -1,
            mesh_offset: [0.0; 3],
        }
    }
}

/// Role of a volume inside its object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelVolumeType {
    /// A printable part.
    #[default]
    ModelPart,
    /// A modifier that overrides parameters inside its shape.
    ParameterModifier,
    /// Forces supports inside its shape.
    SupportEnforcer,
    /// Blocks supports inside its shape.
    SupportBlocker,
}

impl ModelVolumeType {
    /// Parse the serialized volume type; unknown strings map to a part.
    pub fn from_string(text: &str) -> Self {
        match text {
            "ParameterModifier" => Self::ParameterModifier,
            "SupportEnforcer" => Self::SupportEnforcer,
            "SupportBlocker" => Self::SupportBlocker,
            _ => Self::ModelPart,
        }
    }

    /// Serialized name of the volume type.
    pub fn to_str(self) -> &'static str {
        match self {
            Self::ModelPart => "ModelPart",
            Self::ParameterModifier => "ParameterModifier",
            Self::SupportEnforcer => "SupportEnforcer",
            Self::SupportBlocker => "SupportBlocker",
        }
    }
}

/// A contiguous part of an object's mesh with its own placement and
/// parameter overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelVolume {
    /// Display name.
    pub name: String,
    /// The volume's mesh, in the volume's local frame.
    pub mesh: TriangleMesh,
    /// Per-volume parameter overrides.
    pub config: DynamicConfig,
    /// Provenance of the mesh.
    pub source: VolumeSource,
    transformation: Transformation,
    volume_type: ModelVolumeType,
    convex_hull_2d: Vec<[f64; 2]>,
}

impl ModelVolume {
    /// Wrap a mesh into a volume with identity placement.
    pub fn new(mesh: TriangleMesh) -> Self {
        Self {
            mesh,
            ..Self::default()
        }
    }

    /// The volume's local placement inside its object.
    pub fn transformation(&self) -> &Transformation {
        &self.transformation
    }

    /// Matrix of the local placement.
    pub fn matrix(&self) -> &Matrix4<f64> {
        self.transformation.matrix()
    }

    /// Replace the local placement.
    pub fn set_transformation(&mut self, transformation: Transformation) {
        self.transformation = transformation;
    }

    /// The volume's role.
    pub fn volume_type(&self) -> ModelVolumeType {
        self.volume_type
    }

    /// Change the volume's role.
    pub fn set_type(&mut self, volume_type: ModelVolumeType) {
        self.volume_type = volume_type;
    }

    /// True for parameter-modifier volumes (the legacy `modifier` flag).
    pub fn is_modifier(&self) -> bool {
        self.volume_type == ModelVolumeType::ParameterModifier
    }

    /// Recompute the build-plate footprint hull of the placed mesh.
    ///
    /// The slicer uses this 2D hull for plate arrangement; the full 3D hull
    /// is a heavier collaborator that the container does not need.
    pub fn calculate_convex_hull(&mut self) {
        let matrix = self.transformation.matrix();
        let footprint: Vec<[f64; 2]> = self
            .mesh
            .vertices
            .iter()
            .map(|v| {
                let p = matrix.transform_point(&Point3::new(
                    f64::from(v[0]),
                    f64::from(v[1]),
                    f64::from(v[2]),
                ));
                [p.x, p.y]
            })
            .collect();
        self.convex_hull_2d = convex_hull_2d(&footprint);
    }

    /// The footprint hull computed by [`ModelVolume::calculate_convex_hull`].
    pub fn convex_hull_2d(&self) -> &[[f64; 2]] {
        &self.convex_hull_2d
    }
}

/// One placement of an object on the build plate.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInstance {
    transformation: Transformation,
    /// Whether the instance participates in the print.
    pub printable: bool,
}

impl Default for ModelInstance {
    fn default() -> Self {
        Self {
            transformation: Transformation::identity(),
            printable: true,
        }
    }
}

impl ModelInstance {
    /// The instance's world placement.
    pub fn transformation(&self) -> &Transformation {
        &self.transformation
    }

    /// Matrix of the world placement.
    pub fn matrix(&self) -> &Matrix4<f64> {
        self.transformation.matrix()
    }

    /// Replace the world placement.
    pub fn set_transformation(&mut self, transformation: Transformation) {
        self.transformation = transformation;
    }
}

/// A single SLA support point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportPoint {
    /// Position on the mesh, in object coordinates.
    pub pos: [f32; 3],
    /// Radius of the support head.
    pub head_front_radius: f32,
    /// Whether the point supports a freshly emerging island.
    pub is_new_island: bool,
}

impl SupportPoint {
    /// Create a support point.
    pub fn new(pos: [f32; 3], head_front_radius: f32, is_new_island: bool) -> Self {
        Self {
            pos,
            head_front_radius,
            is_new_island,
        }
    }
}

/// Provenance of an object's SLA support points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlaPointsStatus {
    /// No points were generated or loaded.
    #[default]
    NoPoints,
    /// Points were generated automatically.
    AutoGenerated,
    /// Points were placed or edited by the user.
    UserModified,
}

/// A Z interval with parameter overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerConfigRange {
    /// Lower bound of the interval, millimeters.
    pub min_z: f64,
    /// Upper bound of the interval, millimeters.
    pub max_z: f64,
    /// Options overriding the object config inside the interval.
    pub config: DynamicConfig,
}

/// A printable object: volumes plus instances plus per-object state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelObject {
    /// Display name.
    pub name: String,
    /// Per-object parameter overrides.
    pub config: DynamicConfig,
    /// Volumes sharing the object's indexed triangle set.
    pub volumes: Vec<ModelVolume>,
    /// Placements on the build plate.
    pub instances: Vec<ModelInstance>,
    /// Variable layer-height profile (alternating z / height pairs).
    pub layer_height_profile: Vec<f64>,
    /// Z ranges with parameter overrides.
    pub layer_config_ranges: Vec<LayerConfigRange>,
    /// SLA support points.
    pub sla_support_points: Vec<SupportPoint>,
    /// Provenance of the SLA support points.
    pub sla_points_status: SlaPointsStatus,
}

impl ModelObject {
    /// Append a volume wrapping `mesh` and return it for further setup.
    pub fn add_volume(&mut self, mesh: TriangleMesh) -> &mut ModelVolume {
        self.volumes.push(ModelVolume::new(mesh));
        self.volumes.last_mut().unwrap()
    }

    /// Append a default (identity, printable) instance and return it.
    pub fn add_instance(&mut self) -> &mut ModelInstance {
        self.instances.push(ModelInstance::default());
        self.instances.last_mut().unwrap()
    }

    /// Smallest placed Z over all volumes, ignoring instance placement.
    fn raw_min_z(&self) -> Option<f64> {
        let mut min_z: Option<f64> = None;
        for volume in &self.volumes {
            let matrix = volume.matrix();
            for vertex in &volume.mesh.vertices {
                let p = matrix.transform_point(&Point3::new(
                    f64::from(vertex[0]),
                    f64::from(vertex[1]),
                    f64::from(vertex[2]),
                ));
                min_z = Some(min_z.map_or(p.z, |m: f64| m.min(p.z)));
            }
        }
        min_z
    }
}

/// The whole scene being loaded or stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    /// Objects in scene order.
    pub objects: Vec<ModelObject>,
}

impl Model {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an empty object and return it for further setup.
    pub fn add_object(&mut self) -> &mut ModelObject {
        self.objects.push(ModelObject::default());
        self.objects.last_mut().unwrap()
    }

    /// Remove the object at `index`.
    pub fn delete_object(&mut self, index: usize) {
        self.objects.remove(index);
    }

    /// Lift objects sitting below the build plate back onto it.
    ///
    /// Runs per object: when the object's lowest point (volume placement
    /// applied) is below Z = 0, every instance is shifted up by the deficit.
    pub fn adjust_min_z(&mut self) {
        for object in &mut self.objects {
            if let Some(min_z) = object.raw_min_z() {
                if min_z < 0.0 {
                    for instance in &mut object.instances {
                        instance.transformation.translate_z(-min_z);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle_mesh() -> TriangleMesh {
        let mut mesh = TriangleMesh::from_facets(&[[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        ]]);
        mesh.repair();
        mesh
    }

    #[test]
    fn volume_type_round_trip() {
        for t in [
            ModelVolumeType::ModelPart,
            ModelVolumeType::ParameterModifier,
            ModelVolumeType::SupportEnforcer,
            ModelVolumeType::SupportBlocker,
        ] {
            assert_eq!(ModelVolumeType::from_string(t.to_str()), t);
        }
        assert_eq!(
            ModelVolumeType::from_string("whatever"),
            ModelVolumeType::ModelPart
        );
    }

    #[test]
    fn footprint_hull_follows_volume_matrix(){
        let mut object = ModelObject::default();
        let volume = object.add_volume(unit_triangle_mesh());
        let mut placement = Transformation::identity();
        placement.set_from_string("1 0 0 10 0 1 0 0 0 0 1 0 0 0 0 1");
        volume.set_transformation(placement);
        volume.calculate_convex_hull();
        assert!(volume.convex_hull_2d().iter().all(|p| p[0] >= 10.0));
    }

    #[test]
    fn adjust_min_z_lifts_objects() {
        let mut model = Model::new();
        let object = model.add_object();
        let mut mesh = TriangleMesh::from_facets(&[[
            [0.0, 0.0, -3.0],
            [1.0, 0.0, -3.0],
            [0.0, 1.0, 2.0],
        ]]);
        mesh.repair();
        object.add_volume(mesh);
        object.add_instance();
        model.adjust_min_z();
        let instance = &model.objects[0].instances[0];
        assert_eq!(instance.matrix()[(2, 3)], 3.0);
    }

    #[test]
    fn instance_defaults_are_printable_identity() {
        let instance = ModelInstance::default();
        assert!(instance.printable);
        assert_eq!(*instance.matrix(), nalgebra::Matrix4::identity());
    }
}
