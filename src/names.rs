//! Element, attribute and metadata-key names shared by the readers and
//! writers of the geometry document and the model-config sidecar.

// geometry document elements
pub(crate) const MODEL_TAG: &str = "model";
pub(crate) const RESOURCES_TAG: &str = "resources";
pub(crate) const OBJECT_TAG: &str = "object";
pub(crate) const MESH_TAG: &str = "mesh";
pub(crate) const VERTICES_TAG: &str = "vertices";
pub(crate) const VERTEX_TAG: &str = "vertex";
pub(crate) const TRIANGLES_TAG: &str = "triangles";
pub(crate) const TRIANGLE_TAG: &str = "triangle";
pub(crate) const COMPONENTS_TAG: &str = "components";
pub(crate) const COMPONENT_TAG: &str = "component";
pub(crate) const BUILD_TAG: &str = "build";
pub(crate) const ITEM_TAG: &str = "item";
pub(crate) const METADATA_TAG: &str = "metadata";

// model-config elements
pub(crate) const CONFIG_TAG: &str = "config";
pub(crate) const VOLUME_TAG: &str = "volume";

// attributes
pub(crate) const UNIT_ATTR: &str = "unit";
pub(crate) const NAME_ATTR: &str = "name";
pub(crate) const TYPE_ATTR: &str = "type";
pub(crate) const ID_ATTR: &str = "id";
pub(crate) const X_ATTR: &str = "x";
pub(crate) const Y_ATTR: &str = "y";
pub(crate) const Z_ATTR: &str = "z";
pub(crate) const V1_ATTR: &str = "v1";
pub(crate) const V2_ATTR: &str = "v2";
pub(crate) const V3_ATTR: &str = "v3";
pub(crate) const OBJECTID_ATTR: &str = "objectid";
pub(crate) const TRANSFORM_ATTR: &str = "transform";
pub(crate) const PRINTABLE_ATTR: &str = "printable";
pub(crate) const KEY_ATTR: &str = "key";
pub(crate) const VALUE_ATTR: &str = "value";
pub(crate) const FIRST_TRIANGLE_ID_ATTR: &str = "firstid";
pub(crate) const LAST_TRIANGLE_ID_ATTR: &str = "lastid";
pub(crate) const MIN_Z_ATTR: &str = "min_z";
pub(crate) const MAX_Z_ATTR: &str = "max_z";
pub(crate) const OPT_KEY_ATTR: &str = "opt_key";

// model-config metadata scopes
pub(crate) const OBJECT_TYPE: &str = "object";
pub(crate) const VOLUME_TYPE: &str = "volume";

// recognized volume metadata keys
pub(crate) const NAME_KEY: &str = "name";
pub(crate) const MODIFIER_KEY: &str = "modifier";
pub(crate) const VOLUME_TYPE_KEY: &str = "volume_type";
pub(crate) const MATRIX_KEY: &str = "matrix";
pub(crate) const SOURCE_FILE_KEY: &str = "source_file";
pub(crate) const SOURCE_OBJECT_ID_KEY: &str = "source_object_id";
pub(crate) const SOURCE_VOLUME_ID_KEY: &str = "source_volume_id";
pub(crate) const SOURCE_OFFSET_X_KEY: &str = "source_offset_x";
pub(crate) const SOURCE_OFFSET_Y_KEY: &str = "source_offset_y";
pub(crate) const SOURCE_OFFSET_Z_KEY: &str = "source_offset_z";

/// Metadata name carrying the container version in the geometry document.
pub(crate) const VERSION_METADATA_NAME: &str = "slic3rpe:Version3mf";

/// Version header key of the SLA support-points sidecar.
pub(crate) const SUPPORT_POINTS_VERSION_KEY: &str = "support_points_format_version=";

/// Version of the SLA support-points sidecar this writer emits.
pub(crate) const SUPPORT_POINTS_FORMAT_VERSION: u32 = 1;
