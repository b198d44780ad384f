//! Error types and the non-fatal diagnostics sink.
//!
//! Fatal problems abort the current load/store and surface as [`Error`].
//! Recoverable problems found in the sidecar files (a malformed profile
//! record, a duplicated sidecar key) only skip the offending record; they are
//! accumulated on a [`Diagnostics`] sink that every sidecar codec receives by
//! reference, and emitted through `tracing` as they occur.

use std::io;
use thiserror::Error;

/// Result type for 3MF container operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort reading or writing a 3MF container.
#[derive(Error, Debug)]
pub enum Error {
    /// The archive could not be opened for reading or writing.
    #[error("unable to open archive '{path}': {reason}")]
    ArchiveOpen {
        /// Path of the archive on disk.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// An archive member could not be located or read.
    #[error("unable to read archive member '{name}': {reason}")]
    MemberRead {
        /// Normalized member name.
        name: String,
        /// Underlying failure.
        reason: String,
    },

    /// An archive member could not be written.
    #[error("unable to write archive member '{name}': {reason}")]
    MemberWrite {
        /// Member name.
        name: String,
        /// Underlying failure.
        reason: String,
    },

    /// The archive central directory could not be finalized.
    #[error("unable to finalize the archive: {0}")]
    FinalizeFailed(String),

    /// Malformed XML in one of the container documents.
    #[error("XML error: {0}")]
    XmlSyntax(#[from] quick_xml::Error),

    /// Malformed XML attribute list.
    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// An attribute value violates the format.
    #[error("bad attribute '{attribute}' on <{element}>: {reason}")]
    BadAttribute {
        /// Element carrying the attribute.
        element: &'static str,
        /// Attribute name.
        attribute: &'static str,
        /// What was wrong with the value.
        reason: String,
    },

    /// Two `<object>` definitions share the same 3MF ID.
    #[error("found object with duplicate id {0}")]
    DuplicateObjectId(i32),

    /// A `<component>` references an object ID that was never defined.
    #[error("found component with invalid object id {0}")]
    UnknownComponent(i32),

    /// A `<build><item>` references an object ID that was never defined.
    #[error("found item with invalid object id {0}")]
    UnknownBuildItem(i32),

    /// The component graph re-entered itself while resolving a build item.
    #[error("too many recursions while resolving components of object {0}")]
    AliasDepthExceeded(i32),

    /// A volume's triangle range does not fit the owning object's geometry.
    #[error("found invalid triangle range [{first}, {last}] for an object with {triangle_count} triangles")]
    BadTriangleRange {
        /// First triangle of the range.
        first: u32,
        /// Last triangle of the range (inclusive).
        last: u32,
        /// Triangle count of the owning geometry.
        triangle_count: u32,
    },

    /// A triangle references a vertex past the end of the vertex buffer.
    #[error("found triangle with invalid vertex index {index} (object has {vertex_count} vertices)")]
    BadVertexIndex {
        /// Offending vertex index.
        index: u32,
        /// Vertex count of the owning geometry.
        vertex_count: u32,
    },

    /// A mesh scheduled for export has no vertices.
    #[error("found invalid (empty) mesh")]
    EmptyMesh,

    /// A mesh scheduled for export has not been repaired.
    #[error("storing a 3MF requires repaired meshes")]
    MeshNotRepaired,

    /// The model offers no instance to put on the build plate.
    #[error("no build item found")]
    NoBuildItems,

    /// An imported object ended up with no geometry to materialize.
    #[error("unable to find geometry for object {0}")]
    MissingGeometry(i32),

    /// Structurally invalid model config document.
    #[error("invalid model config: {0}")]
    InvalidModelConfig(String),

    /// A model-config `<metadata>` carries a `type` other than
    /// `object`/`volume`.
    #[error("found invalid metadata type '{0}'")]
    BadMetadataType(String),

    /// The file was written by a newer version of the application.
    #[error("the 3mf file was saved with a newer version ({found}) than supported ({supported}) and is not compatible")]
    VersionTooNew {
        /// Version recorded in the file.
        found: u32,
        /// Newest version this writer understands.
        supported: u32,
    },

    /// Archive-level failure reported by the zip backend.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Plain I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Accumulates non-fatal import/export problems.
///
/// Matches the error policy of the container format: a bad sidecar record is
/// skipped, reported here, and the rest of the file keeps loading.
#[derive(Debug, Default)]
pub struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a non-fatal problem.
    pub fn report(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "slicer3mf", "{message}");
        self.messages.push(message);
    }

    /// All messages reported so far, in order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// True when nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_accumulate_in_order() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());
        diagnostics.report("first");
        diagnostics.report(String::from("second"));
        assert_eq!(diagnostics.messages(), ["first", "second"]);
    }

    #[test]
    fn version_error_message_names_both_versions() {
        let err = Error::VersionTooNew {
            found: 7,
            supported: 2,
        };
        let text = err.to_string();
        assert!(text.contains('7'));
        assert!(text.contains('2'));
    }
}
