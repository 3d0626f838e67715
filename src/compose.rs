//! PDF composition from selected page images.
//!
//! Builds one A4 document with one page per usable image, each image scaled
//! to fit inside uniform margins and centered. JPEG bytes are embedded
//! directly (DCTDecode); PNG is decoded to raw RGB8 samples. Anything else,
//! or an unreadable/undecodable image, is skipped per-image rather than
//! failing the batch.

use std::path::{Path, PathBuf};

use image::GenericImageView;
use lopdf::{dictionary, Document, Object, Stream};
use thiserror::Error;
use tracing::warn;

/// A4 page size in points.
const PAGE_WIDTH: f64 = 595.0;
const PAGE_HEIGHT: f64 = 842.0;
const MARGIN: f64 = 50.0;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("failed to write PDF: {0}")]
    Pdf(String),
}

/// Compose a PDF from the given image paths. Returns the document bytes and
/// the number of pages actually embedded (skipped images produce no page).
pub fn compose_pdf(images: &[PathBuf]) -> Result<(Vec<u8>, usize), ComposeError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();

    for path in images {
        match embed_image_page(&mut doc, pages_id, path) {
            Some(page_id) => kids.push(page_id.into()),
            None => warn!("Skipping unsupported image: {}", path.display()),
        }
    }

    let count = kids.len();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ComposeError::Pdf(e.to_string()))?;

    Ok((buffer, count))
}

/// Embed one image as a full page. Returns `None` when the image cannot be
/// used (unsupported extension, unreadable file, undecodable content).
fn embed_image_page(
    doc: &mut Document,
    pages_id: lopdf::ObjectId,
    path: &Path,
) -> Option<lopdf::ObjectId> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Cannot read image {}: {}", path.display(), e);
            return None;
        }
    };

    let img = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => {
            warn!("Cannot decode image {}: {}", path.display(), e);
            return None;
        }
    };
    let (width, height) = img.dimensions();

    let image_stream = match extension.as_str() {
        "jpg" | "jpeg" => Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            bytes,
        ),
        "png" => Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            img.to_rgb8().into_raw(),
        ),
        _ => return None,
    };

    let image_id = doc.add_object(Object::Stream(image_stream));

    let resources_id = doc.add_object(Object::Dictionary(dictionary! {
        "XObject" => dictionary! {
            "Im1" => image_id,
        },
    }));

    // Scale to fit inside the margins and center on the page
    let available_width = PAGE_WIDTH - 2.0 * MARGIN;
    let available_height = PAGE_HEIGHT - 2.0 * MARGIN;
    let scale = (available_width / width as f64).min(available_height / height as f64);

    let img_width = (width as f64 * scale) as i64;
    let img_height = (height as f64 * scale) as i64;
    let x = ((PAGE_WIDTH - img_width as f64) / 2.0) as i64;
    let y = ((PAGE_HEIGHT - img_height as f64) / 2.0) as i64;

    let content = format!(
        "q\n{} 0 0 {} {} {} cm\n/Im1 Do\nQ\n",
        img_width, img_height, x, y
    );
    let content_id = doc.add_object(Object::Stream(Stream::new(
        dictionary! {},
        content.into_bytes(),
    )));

    let page_id = doc.add_object(Object::Dictionary(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    }));

    Some(page_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let img = image::RgbImage::from_pixel(40, 60, image::Rgb([200, 10, 10]));
        img.save(&path).unwrap();
        path
    }

    fn write_jpg(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let img = image::RgbImage::from_pixel(60, 40, image::Rgb([10, 200, 10]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn composes_one_page_per_supported_image() {
        let dir = tempfile::tempdir().unwrap();
        let images = vec![
            write_jpg(dir.path(), "page_1.jpg"),
            write_png(dir.path(), "page_2.png"),
        ];

        let (bytes, pages) = compose_pdf(&images).unwrap();
        assert_eq!(pages, 2);

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn unsupported_images_are_skipped_individually() {
        let dir = tempfile::tempdir().unwrap();
        let tiff = dir.path().join("page_1.tiff");
        std::fs::write(&tiff, b"not an image").unwrap();
        let images = vec![write_jpg(dir.path(), "page_2.jpg"), tiff];

        let (bytes, pages) = compose_pdf(&images).unwrap();
        assert_eq!(pages, 1);

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn missing_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let images = vec![dir.path().join("gone.jpg")];
        let (_bytes, pages) = compose_pdf(&images).unwrap();
        assert_eq!(pages, 0);
    }
}
