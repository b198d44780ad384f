//! Shared helpers for the integration tests.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Archive member holding the geometry document.
pub const MODEL_MEMBER: &str = "3D/3dmodel.model";

/// Build an in-memory ZIP archive from (name, content) pairs.
pub fn build_archive(members: &[(&str, &str)]) -> Cursor<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in members {
        zip.start_file(*name, SimpleFileOptions::default())
            .unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap()
}

/// Wrap resources/build XML into a complete geometry document.
pub fn geometry_document(unit: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <model unit=\"{unit}\" xml:lang=\"en-US\" \
         xmlns=\"http://schemas.microsoft.com/3dmanufacturing/core/2015/02\" \
         xmlns:slic3rpe=\"http://schemas.slic3r.org/3mf/2017/06\">\n{body}\n</model>"
    )
}

/// A mesh-bearing `<object>` with one unit triangle in the XY plane.
pub fn triangle_object(id: u32) -> String {
    format!(
        r#"<object id="{id}" type="model"><mesh>
<vertices><vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/></vertices>
<triangles><triangle v1="0" v2="1" v3="2"/></triangles>
</mesh></object>"#
    )
}
