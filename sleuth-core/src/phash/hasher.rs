//! Image decoding and hash computation.
//!
//! Both algorithms produce 64-bit hashes that hold up under JPEG
//! re-compression, resizing and small crops:
//!
//! - **Blockhash64** (`blockhash`): mean brightness over a 8x8 block grid
//! - **PHash64** (`image_hasher`): 8x8 mean hash after a DCT preprocessing
//!   step
//!
//! ```no_run
//! use sleuth_core::phash::{HashAlgorithm, ImageHasher, PerceptualHasher};
//!
//! let image_data = std::fs::read("receipt.jpg").unwrap();
//! let hasher = PerceptualHasher::new(HashAlgorithm::PHash64);
//! let hash = hasher.hash_bytes(&image_data).unwrap();
//! println!("{}", hash.to_hex());
//! ```

use blockhash::{blockhash64, Blockhash64};
use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};
use tracing::debug;

use super::{HashAlgorithm, ImageHasher, PerceptualHash, DEFAULT_HASH_BITS};
use crate::error::{Result, SleuthError};

/// Perceptual hasher configuration and computation.
#[derive(Debug, Clone, Default)]
pub struct PerceptualHasher {
    algorithm: HashAlgorithm,
}

impl PerceptualHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Compute the hash of an already decoded image.
    pub fn hash_image(&self, image: &DynamicImage) -> Result<PerceptualHash> {
        let hash = match self.algorithm {
            HashAlgorithm::Blockhash64 => {
                let hash: Blockhash64 = blockhash64(image);
                let bytes: [u8; 8] = hash.into();
                bytes.to_vec()
            }
            HashAlgorithm::PHash64 => {
                let hasher = HasherConfig::new()
                    .hash_size(8, 8)
                    .hash_alg(HashAlg::Mean)
                    .preproc_dct()
                    .to_hasher();
                hasher.hash_image(image).as_bytes().to_vec()
            }
        };

        if hash.len() * 8 != DEFAULT_HASH_BITS as usize {
            return Err(SleuthError::PerceptualHashError(format!(
                "{} produced {} bits, expected {}",
                self.algorithm,
                hash.len() * 8,
                DEFAULT_HASH_BITS
            )));
        }

        Ok(PerceptualHash::from_bytes(hash, self.algorithm))
    }

    /// Check if the provided bytes appear to be a supported image format.
    pub fn is_supported_format(data: &[u8]) -> bool {
        image::guess_format(data).is_ok()
    }
}

impl ImageHasher for PerceptualHasher {
    fn hash_bytes(&self, image_data: &[u8]) -> Result<PerceptualHash> {
        let image = image::load_from_memory(image_data)
            .map_err(|e| SleuthError::PerceptualHashError(format!("Failed to decode image: {e}")))?;

        let hash = self.hash_image(&image)?;
        debug!(algorithm = %self.algorithm, hash = %hash.to_hex(), "Computed perceptual hash");
        Ok(hash)
    }

    fn supports(&self, data: &[u8]) -> bool {
        Self::is_supported_format(data)
    }

    fn bit_len(&self) -> u32 {
        DEFAULT_HASH_BITS
    }

    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width) as u8,
                (y * 255 / height) as u8,
                ((x + y) * 127 / (width + height)) as u8,
            ])
        })
    }

    fn encode_png(image: &RgbImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_default_algorithm() {
        assert_eq!(
            PerceptualHasher::default().algorithm(),
            HashAlgorithm::Blockhash64
        );
    }

    #[test]
    fn test_both_algorithms_produce_64_bits() {
        let png = encode_png(&gradient(64, 64));
        for algorithm in [HashAlgorithm::Blockhash64, HashAlgorithm::PHash64] {
            let hash = PerceptualHasher::new(algorithm).hash_bytes(&png).unwrap();
            assert_eq!(hash.bit_len(), 64, "{algorithm}");
            assert_eq!(hash.algorithm, algorithm);
        }
    }

    #[test]
    fn test_deterministic() {
        let png = encode_png(&gradient(48, 32));
        let hasher = PerceptualHasher::new(HashAlgorithm::PHash64);
        assert_eq!(
            hasher.hash_bytes(&png).unwrap(),
            hasher.hash_bytes(&png).unwrap()
        );
    }

    #[test]
    fn test_invalid_image_rejected() {
        let hasher = PerceptualHasher::default();
        assert!(matches!(
            hasher.hash_bytes(b"%PDF-1.7 not an image"),
            Err(SleuthError::PerceptualHashError(_))
        ));
    }

    #[test]
    fn test_is_supported_format() {
        assert!(PerceptualHasher::is_supported_format(&[
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A
        ]));
        assert!(PerceptualHasher::is_supported_format(&[0xFF, 0xD8, 0xFF]));
        assert!(!PerceptualHasher::is_supported_format(&[0x00, 0x00, 0x00]));
    }
}
