//! Editing-tool fingerprints and error level analysis.

use tracing::debug;

use super::{find_suspicious_tool, ContentKind, TamperScanner};
use crate::error::Result;
use crate::finding::{Finding, FindingKind};

/// Confidence for an editing-tool marker in the raw bytes.
pub const TOOL_MARKER_CONFIDENCE: f32 = 0.8;

/// Confidence for an ELA hit.
pub const ELA_CONFIDENCE: f32 = 0.6;

/// JPEG quality used for the ELA re-save.
pub const ELA_JPEG_QUALITY: u8 = 90;

/// Largest per-channel difference tolerated after the re-save.
pub const ELA_THRESHOLD: u8 = 30;

/// Raw-byte signature scan plus, for images, error level analysis.
///
/// ELA re-encodes the image as JPEG and measures how far any channel of any
/// pixel moved. Regions pasted in from another source recompress
/// differently from the rest of the image. ELA needs the `perceptual-hash`
/// feature; without it only the signature scan runs.
#[derive(Debug, Clone)]
pub struct SignatureTamperScanner {
    ela_threshold: u8,
}

impl Default for SignatureTamperScanner {
    fn default() -> Self {
        Self {
            ela_threshold: ELA_THRESHOLD,
        }
    }
}

impl SignatureTamperScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ela_threshold(mut self, threshold: u8) -> Self {
        self.ela_threshold = threshold;
        self
    }

    #[cfg(feature = "perceptual-hash")]
    fn ela_finding(&self, file_bytes: &[u8]) -> Result<Option<Finding>> {
        let max_diff = ela::max_channel_difference(file_bytes)?;
        debug!(max_diff, threshold = self.ela_threshold, "Error level analysis");
        if max_diff > self.ela_threshold {
            return Ok(Some(Finding::new(
                FindingKind::PixelTamper,
                format!("Pixel-level inconsistencies detected (ELA difference {max_diff})"),
                ELA_CONFIDENCE,
            )?));
        }
        Ok(None)
    }

    #[cfg(not(feature = "perceptual-hash"))]
    fn ela_finding(&self, _file_bytes: &[u8]) -> Result<Option<Finding>> {
        Ok(None)
    }
}

impl TamperScanner for SignatureTamperScanner {
    fn scan(&self, file_bytes: &[u8]) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();

        if let Some(tool) = find_suspicious_tool(file_bytes) {
            findings.push(Finding::new(
                FindingKind::SuspiciousTool,
                format!("'{tool}' marker found in raw file data"),
                TOOL_MARKER_CONFIDENCE,
            )?);
        }

        if ContentKind::sniff(file_bytes) == ContentKind::Image {
            if let Some(finding) = self.ela_finding(file_bytes)? {
                findings.push(finding);
            }
        }

        Ok(findings)
    }

    fn name(&self) -> &'static str {
        "tamper_scanner"
    }
}

#[cfg(feature = "perceptual-hash")]
mod ela {
    use std::io::Cursor;

    use image::codecs::jpeg::JpegEncoder;
    use image::ImageFormat;

    use super::ELA_JPEG_QUALITY;
    use crate::error::{Result, SleuthError};

    /// Maximum absolute per-channel difference between the image and its
    /// JPEG re-save.
    pub(super) fn max_channel_difference(file_bytes: &[u8]) -> Result<u8> {
        let original = image::load_from_memory(file_bytes)
            .map_err(|e| SleuthError::PerceptualHashError(format!("Failed to decode image: {e}")))?
            .to_rgb8();

        let mut buffer = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buffer, ELA_JPEG_QUALITY);
        original
            .write_with_encoder(encoder)
            .map_err(|e| SleuthError::PerceptualHashError(format!("JPEG re-encode failed: {e}")))?;

        let resaved = image::load_from_memory_with_format(buffer.get_ref(), ImageFormat::Jpeg)
            .map_err(|e| SleuthError::PerceptualHashError(format!("JPEG decode failed: {e}")))?
            .to_rgb8();

        Ok(original
            .pixels()
            .zip(resaved.pixels())
            .flat_map(|(a, b)| a.0.into_iter().zip(b.0).map(|(x, y)| x.abs_diff(y)))
            .max()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_marker() {
        let findings = SignatureTamperScanner::new()
            .scan(b"%PDF-1.4 /Creator (Adobe Illustrator 27.0)")
            .unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::SuspiciousTool);
        assert_eq!(findings[0].confidence, TOOL_MARKER_CONFIDENCE);
        assert!(findings[0].description.contains("adobe"));
    }

    #[test]
    fn test_clean_text_has_no_findings() {
        assert!(SignatureTamperScanner::new()
            .scan(b"Invoice #12345, amount 500")
            .unwrap()
            .is_empty());
    }

    #[cfg(feature = "perceptual-hash")]
    mod ela_tests {
        use super::*;
        use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
        use std::io::Cursor;

        fn png(image: &RgbImage) -> Vec<u8> {
            let mut buffer = Cursor::new(Vec::new());
            image.write_to(&mut buffer, ImageFormat::Png).unwrap();
            buffer.into_inner()
        }

        #[test]
        fn test_flat_image_passes_ela() {
            let flat: RgbImage = ImageBuffer::from_pixel(64, 64, Rgb([128, 128, 128]));
            let findings = SignatureTamperScanner::new().scan(&png(&flat)).unwrap();
            assert!(findings.is_empty(), "{findings:?}");
        }

        #[test]
        fn test_hard_edges_trip_ela() {
            // single-pixel checkerboard: worst case for 8x8 DCT blocks
            let board: RgbImage = ImageBuffer::from_fn(64, 64, |x, y| {
                if (x + y) % 2 == 0 {
                    Rgb([255, 0, 0])
                } else {
                    Rgb([0, 255, 255])
                }
            });
            let findings = SignatureTamperScanner::new().scan(&png(&board)).unwrap();
            assert!(findings
                .iter()
                .any(|f| f.kind == FindingKind::PixelTamper));
        }

        #[test]
        fn test_undecodable_image_is_an_error() {
            let truncated = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
            assert!(SignatureTamperScanner::new().scan(&truncated).is_err());
        }
    }
}
