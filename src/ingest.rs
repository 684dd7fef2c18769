//! Ingestion: turn uploaded files into slides.
//!
//! Image files become one slide each, payload passed through untouched.
//! PDF files go through the [`Rasterizer`] collaborator — rasterization is
//! outside this crate; implement the trait with whatever renders pages in
//! your environment — which must yield one image per page, in page order.
//!
//! ## Why 2× scale and JPEG quality 85?
//!
//! Rendered at natural resolution, small slide text is frequently
//! illegible to a vision model; at 2× it survives. JPEG at quality 85
//! keeps a 40-page deck's payload far below request limits where lossless
//! PNG would blow past them, and the artefacts at 85 are below what
//! affects reading rendered text. Both constants are part of the
//! ingestion contract, not tunables.

use crate::deck::{Slide, SlideImage};
use crate::error::CoachError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Render scale applied to every PDF page, relative to natural size.
pub const RENDER_SCALE: f32 = 2.0;

/// JPEG quality for rendered pages (1–100).
pub const JPEG_QUALITY: u8 = 85;

/// Error reported by a rasterization collaborator.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RasterizeError(pub String);

/// External page renderer: one PDF in, ordered page images out.
///
/// Implementations must return exactly one image per page, in page order,
/// rendered at `scale` times the page's natural size.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(
        &self,
        bytes: &[u8],
        scale: f32,
    ) -> Result<Vec<DynamicImage>, RasterizeError>;
}

/// An uploaded file, classified by mime type.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    kind: SourceKind,
}

#[derive(Debug, Clone)]
enum SourceKind {
    Image { mime: String, bytes: Vec<u8> },
    Pdf { bytes: Vec<u8> },
}

impl SourceFile {
    /// Classify an upload by its mime type.
    ///
    /// Anything that is not `image/*` or `application/pdf` is rejected
    /// here, before any slide is created.
    pub fn new(
        name: impl Into<String>,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<Self, CoachError> {
        let name = name.into();
        if mime == "application/pdf" {
            Ok(Self {
                name,
                kind: SourceKind::Pdf { bytes },
            })
        } else if mime.starts_with("image/") {
            Ok(Self {
                name,
                kind: SourceKind::Image {
                    mime: mime.to_string(),
                    bytes,
                },
            })
        } else {
            Err(CoachError::UnsupportedFile { name })
        }
    }

    /// An image upload, one slide.
    pub fn image(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Image {
                mime: mime.into(),
                bytes,
            },
        }
    }

    /// A PDF upload, one slide per page.
    pub fn pdf(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Pdf { bytes },
        }
    }
}

/// Turn uploads into slides: file append order, page order within a PDF.
///
/// The whole batch is all-or-nothing: a rasterization or encoding failure
/// returns the error and contributes no slides, leaving whatever the
/// caller already has loaded untouched.
pub async fn ingest_files(
    files: Vec<SourceFile>,
    rasterizer: &dyn Rasterizer,
) -> Result<Vec<Slide>, CoachError> {
    let mut slides = Vec::new();

    for file in files {
        match file.kind {
            SourceKind::Image { mime, bytes } => {
                slides.push(Slide::new(
                    SlideImage::new(STANDARD.encode(&bytes), mime),
                    file.name,
                ));
            }
            SourceKind::Pdf { bytes } => {
                let pages = rasterizer
                    .rasterize(&bytes, RENDER_SCALE)
                    .await
                    .map_err(|e| CoachError::Rasterization {
                        name: file.name.clone(),
                        detail: e.to_string(),
                    })?;
                debug!("Rasterized '{}' → {} pages", file.name, pages.len());

                for (i, page) in pages.iter().enumerate() {
                    let image =
                        encode_page(page).map_err(|e| CoachError::PageEncoding {
                            name: file.name.clone(),
                            page: i + 1,
                            detail: e.to_string(),
                        })?;
                    slides.push(Slide::new(image, format!("Pg {} - {}", i + 1, file.name)));
                }
            }
        }
    }

    Ok(slides)
}

/// Encode a rendered page as base64 JPEG at the contract quality.
pub fn encode_page(img: &DynamicImage) -> Result<SlideImage, image::ImageError> {
    // JPEG has no alpha; flatten before encoding.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page → {} bytes base64", b64.len());

    Ok(SlideImage::new(b64, "image/jpeg"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    struct FixedPages(usize);

    #[async_trait]
    impl Rasterizer for FixedPages {
        async fn rasterize(
            &self,
            _bytes: &[u8],
            scale: f32,
        ) -> Result<Vec<DynamicImage>, RasterizeError> {
            assert_eq!(scale, RENDER_SCALE);
            Ok((0..self.0)
                .map(|_| {
                    DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                        8,
                        8,
                        Rgba([10, 20, 30, 255]),
                    ))
                })
                .collect())
        }
    }

    struct FailingRasterizer;

    #[async_trait]
    impl Rasterizer for FailingRasterizer {
        async fn rasterize(
            &self,
            _bytes: &[u8],
            _scale: f32,
        ) -> Result<Vec<DynamicImage>, RasterizeError> {
            Err(RasterizeError("encrypted document".into()))
        }
    }

    #[test]
    fn classification_by_mime() {
        assert!(SourceFile::new("a.png", "image/png", vec![1]).is_ok());
        assert!(SourceFile::new("a.pdf", "application/pdf", vec![1]).is_ok());
        assert!(matches!(
            SourceFile::new("a.docx", "application/msword", vec![1]),
            Err(CoachError::UnsupportedFile { .. })
        ));
    }

    #[tokio::test]
    async fn slide_count_is_images_plus_pdf_pages() {
        let files = vec![
            SourceFile::image("cover.png", "image/png", vec![1, 2, 3]),
            SourceFile::pdf("lecture.pdf", vec![0]),
            SourceFile::image("extra.jpg", "image/jpeg", vec![4]),
        ];

        let slides = ingest_files(files, &FixedPages(3)).await.unwrap();
        assert_eq!(slides.len(), 1 + 3 + 1);

        let names: Vec<&str> = slides.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "cover.png",
                "Pg 1 - lecture.pdf",
                "Pg 2 - lecture.pdf",
                "Pg 3 - lecture.pdf",
                "extra.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn image_payload_passes_through_as_base64() {
        let files = vec![SourceFile::image("x.png", "image/png", vec![0xDE, 0xAD])];
        let slides = ingest_files(files, &FixedPages(0)).await.unwrap();

        assert_eq!(slides[0].image.mime, "image/png");
        assert_eq!(STANDARD.decode(&slides[0].image.data).unwrap(), vec![0xDE, 0xAD]);
    }

    #[tokio::test]
    async fn rasterization_failure_yields_no_slides() {
        let files = vec![
            SourceFile::image("ok.png", "image/png", vec![1]),
            SourceFile::pdf("bad.pdf", vec![0]),
        ];

        let err = ingest_files(files, &FailingRasterizer).await.unwrap_err();
        match err {
            CoachError::Rasterization { name, detail } => {
                assert_eq!(name, "bad.pdf");
                assert!(detail.contains("encrypted"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn encode_page_produces_valid_jpeg_base64() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let payload = encode_page(&img).expect("encode should succeed");

        assert_eq!(payload.mime, "image/jpeg");
        let bytes = STANDARD.decode(&payload.data).expect("valid base64");
        // JPEG SOI marker.
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
