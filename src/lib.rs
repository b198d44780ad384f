//! # slicer3mf
//!
//! Reader/writer for the 3MF container the slicer uses to persist projects.
//!
//! A container is a ZIP archive holding the 3MF Core geometry document
//! (`3D/3dmodel.model`) plus application sidecar members carrying slicer
//! state: per-object/per-volume configuration, variable layer-height
//! profiles, layer-config ranges, SLA support points, the full print
//! configuration, and an optional PNG thumbnail.
//!
//! Reading resolves the 3MF component/item graph into concrete mesh
//! instances with world transforms, splits each object's shared indexed
//! triangle set into the application's volumes, and reconciles per-volume
//! local frames. Writing is the exact inverse and guarantees that stored
//! vertices round-trip through the text representation bit-identically.
//!
//! ## Reading
//!
//! ```no_run
//! use slicer3mf::{load_3mf, DynamicConfig, Model};
//!
//! # fn main() -> slicer3mf::Result<()> {
//! let mut model = Model::new();
//! let mut config = DynamicConfig::new();
//! let diagnostics = load_3mf("project.3mf", &mut model, &mut config, true)?;
//! for message in diagnostics.messages() {
//!     eprintln!("warning: {message}");
//! }
//! println!("loaded {} objects", model.objects.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Writing
//!
//! ```no_run
//! use slicer3mf::{store_3mf, Model, TriangleMesh};
//!
//! # fn main() -> slicer3mf::Result<()> {
//! let mut model = Model::new();
//! let object = model.add_object();
//! let mut mesh = TriangleMesh::from_facets(&[[
//!     [0.0, 0.0, 0.0],
//!     [10.0, 0.0, 0.0],
//!     [0.0, 10.0, 0.0],
//! ]]);
//! mesh.repair();
//! object.add_volume(mesh);
//! object.add_instance();
//! store_3mf("out.3mf", &model, None, None)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod model;
pub mod opc;
pub mod transform;

mod export;
mod import;
mod names;

pub use error::{Diagnostics, Error, Result};
pub use export::ThumbnailData;
pub use model::{
    DynamicConfig, LayerConfigRange, Model, ModelInstance, ModelObject, ModelVolume,
    ModelVolumeType, SlaPointsStatus, SupportPoint, Transformation, TriangleMesh,
};

use std::io::{Read, Seek, Write};
use std::path::Path;

use opc::PackageReader;

/// Version of the container format this crate writes
/// (the `slic3rpe:Version3mf` metadata entry).
pub const FORMAT_VERSION: u32 = 2;

/// Load a 3MF container from disk.
///
/// `model` and `config` are replaced on success and left untouched on
/// failure. With `check_version` set, a file written by a newer version of
/// the application is rejected with [`Error::VersionTooNew`].
///
/// Returns the diagnostics accumulated from non-fatal sidecar problems.
pub fn load_3mf(
    path: impl AsRef<Path>,
    model: &mut Model,
    config: &mut DynamicConfig,
    check_version: bool,
) -> Result<Diagnostics> {
    let (loaded_model, loaded_config, diagnostics) =
        import::load_from_path(path.as_ref(), check_version)?;
    *model = loaded_model;
    *config = loaded_config;
    Ok(diagnostics)
}

/// Load a 3MF container from an in-memory or already open archive.
///
/// Objects without a name are synthesized one from the stem `model`, since
/// a reader has no file name.
pub fn load_3mf_from_reader<R: Read + Seek>(
    reader: R,
    check_version: bool,
) -> Result<(Model, DynamicConfig, Diagnostics)> {
    let mut package = PackageReader::new(reader)?;
    import::load_from_package(&mut package, String::from("model"), check_version)
}

/// Store a model (and optionally its print config and a thumbnail) as a 3MF
/// container on disk.
///
/// Requires every volume mesh to be repaired. On any failure the partially
/// written file is removed.
pub fn store_3mf(
    path: impl AsRef<Path>,
    model: &Model,
    config: Option<&DynamicConfig>,
    thumbnail: Option<&ThumbnailData>,
) -> Result<()> {
    export::store_to_path(path.as_ref(), model, config, thumbnail)
}

/// Store a model as a 3MF container into `writer`, handing the writer back.
pub fn store_3mf_to_writer<W: Write + Seek>(
    writer: W,
    model: &Model,
    config: Option<&DynamicConfig>,
    thumbnail: Option<&ThumbnailData>,
) -> Result<W> {
    export::store_to_writer(writer, model, config, thumbnail)
}

/// Read the raw PNG bytes of the container's thumbnail, if it has one.
pub fn read_thumbnail(path: impl AsRef<Path>) -> Result<Option<Vec<u8>>> {
    let mut package = opc::open_path(path.as_ref())?;
    let Some(entry) = package.find(opc::THUMBNAIL_FILE)? else {
        return Ok(None);
    };
    let mut data = Vec::with_capacity(entry.size as usize);
    package.stream(&entry, |_, chunk, _| {
        data.extend_from_slice(chunk);
        Ok(())
    })?;
    Ok(Some(data))
}
