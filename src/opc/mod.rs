//! Archive (ZIP/OPC) layer.
//!
//! A 3MF container is a ZIP archive. This module owns the member names the
//! application recognizes and the thin reader/writer wrappers the importer
//! and exporter stream members through. Member-name matching is
//! case-insensitive and backslash-tolerant, because archives written on
//! Windows show up with either separator.

mod reader;
mod writer;

pub use reader::{open_path, Entry, PackageReader};
pub use writer::PackageWriter;

/// Folder that geometry documents live in.
pub const MODEL_FOLDER: &str = "3D/";

/// Extension of geometry documents.
pub const MODEL_EXTENSION: &str = ".model";

/// The geometry document the writer emits. The exact name matters for
/// interoperability with other slicers.
pub const MODEL_FILE: &str = "3D/3dmodel.model";

/// OPC content-types member.
pub const CONTENT_TYPES_FILE: &str = "[Content_Types].xml";

/// OPC package-relationships member.
pub const RELATIONSHIPS_FILE: &str = "_rels/.rels";

/// Optional PNG preview.
pub const THUMBNAIL_FILE: &str = "Metadata/thumbnail.png";

/// Full print configuration, `; key = value` comment lines.
pub const PRINT_CONFIG_FILE: &str = "Metadata/Slic3r_PE.config";

/// Per-object and per-volume metadata, XML.
pub const MODEL_CONFIG_FILE: &str = "Metadata/Slic3r_PE_model.config";

/// Variable layer-height profiles, line oriented.
pub const LAYER_HEIGHTS_PROFILE_FILE: &str = "Metadata/Slic3r_PE_layer_heights_profile.txt";

/// Per-object layer-config ranges, XML.
pub const LAYER_CONFIG_RANGES_FILE: &str = "Metadata/Prusa_Slicer_layer_config_ranges.xml";

/// SLA support points, line oriented with a version header.
pub const SLA_SUPPORT_POINTS_FILE: &str = "Metadata/Slic3r_PE_sla_support_points.txt";

/// Normalize an archive member name: backslashes become forward slashes.
pub fn normalize_name(name: &str) -> String {
    name.replace('\\', "/")
}
