//! Export side: the store pipeline assembling all archive members.
//!
//! Member order matches what the application has always written: content
//! types, optional thumbnail, relationships, the geometry document, the
//! sidecars, and finally the model config (which needs the volume offsets
//! collected while the geometry document was written). A failure anywhere
//! removes the partially written file.

mod model_xml;
mod sidecars;

use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{DynamicConfig, Model};
use crate::opc::{self, PackageWriter};

/// RGBA pixels of the plate preview, rasterized by the caller.
#[derive(Debug, Clone, Default)]
pub struct ThumbnailData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA8 pixels, row major, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl ThumbnailData {
    /// Wrap an RGBA pixel buffer.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// True when the buffer matches the dimensions and is not empty.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() as u64 == u64::from(self.width) * u64::from(self.height) * 4
    }
}

/// Write the whole container into `writer` and hand it back.
pub(crate) fn store_to_writer<W: Write + Seek>(
    writer: W,
    model: &Model,
    config: Option<&DynamicConfig>,
    thumbnail: Option<&ThumbnailData>,
) -> Result<W> {
    let thumbnail = thumbnail.filter(|t| t.is_valid());
    let mut package = PackageWriter::new(writer);

    package.add(
        opc::CONTENT_TYPES_FILE,
        content_types(thumbnail.is_some()).as_bytes(),
    )?;

    if let Some(thumbnail) = thumbnail {
        package.add(opc::THUMBNAIL_FILE, &encode_thumbnail_png(thumbnail)?)?;
    }

    package.add(
        opc::RELATIONSHIPS_FILE,
        relationships(thumbnail.is_some()).as_bytes(),
    )?;

    let (model_document, objects_data) = model_xml::write_model_document(model)?;
    package.add(opc::MODEL_FILE, &model_document)?;

    if let Some(data) = sidecars::layer_heights_profiles(model) {
        package.add(opc::LAYER_HEIGHTS_PROFILE_FILE, &data)?;
    }
    if let Some(data) = sidecars::layer_config_ranges(model)? {
        package.add(opc::LAYER_CONFIG_RANGES_FILE, &data)?;
    }
    if let Some(data) = sidecars::sla_support_points(model) {
        package.add(opc::SLA_SUPPORT_POINTS_FILE, &data)?;
    }
    if let Some(config) = config {
        package.add(opc::PRINT_CONFIG_FILE, &sidecars::print_config(config))?;
    }

    package.add(
        opc::MODEL_CONFIG_FILE,
        &sidecars::model_config(model, &objects_data)?,
    )?;

    package.finish()
}

/// Write the whole container to a file, removing it again on any failure.
pub(crate) fn store_to_path(
    path: &Path,
    model: &Model,
    config: Option<&DynamicConfig>,
    thumbnail: Option<&ThumbnailData>,
) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::ArchiveOpen {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let result = store_to_writer(BufWriter::new(file), model, config, thumbnail)
        .and_then(|writer| {
            writer
                .into_inner()
                .map_err(|e| Error::FinalizeFailed(e.to_string()))
        })
        .and_then(|file| file.sync_all().map_err(Error::from));

    if let Err(error) = result {
        let _ = fs::remove_file(path);
        return Err(error);
    }
    Ok(())
}

/// `[Content_Types].xml`, identical for every archive written by this crate
/// apart from the optional png entry.
fn content_types(with_thumbnail: bool) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\n \
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\" />\n \
         <Default Extension=\"model\" ContentType=\"application/vnd.ms-package.3dmanufacturing-3dmodel+xml\" />\n",
    );
    if with_thumbnail {
        out.push_str(" <Default Extension=\"png\" ContentType=\"image/png\" />\n");
    }
    out.push_str("</Types>");
    out
}

/// `_rels/.rels`, pointing at the geometry document and, when present, the
/// thumbnail.
fn relationships(with_thumbnail: bool) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\n",
    );
    out.push_str(&format!(
        " <Relationship Target=\"/{}\" Id=\"rel-1\" Type=\"http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel\" />\n",
        opc::MODEL_FILE
    ));
    if with_thumbnail {
        out.push_str(&format!(
            " <Relationship Target=\"/{}\" Id=\"rel-2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/thumbnail\" />\n",
            opc::THUMBNAIL_FILE
        ));
    }
    out.push_str("</Relationships>");
    out
}

/// Encode the RGBA pixels as PNG.
fn encode_thumbnail_png(thumbnail: &ThumbnailData) -> Result<Vec<u8>> {
    let image =
        image::RgbaImage::from_raw(thumbnail.width, thumbnail.height, thumbnail.pixels.clone())
            .ok_or_else(|| Error::MemberWrite {
                name: opc::THUMBNAIL_FILE.to_string(),
                reason: String::from("thumbnail pixel buffer does not match its dimensions"),
            })?;
    let mut data = Cursor::new(Vec::new());
    image
        .write_to(&mut data, image::ImageFormat::Png)
        .map_err(|e| Error::MemberWrite {
            name: opc::THUMBNAIL_FILE.to_string(),
            reason: e.to_string(),
        })?;
    Ok(data.into_inner())
}
