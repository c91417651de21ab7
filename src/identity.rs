//! Registry of the distinct people seen in a video.
//!
//! Records are append-only between [`IdentityRegistry::clear`] calls, and
//! matching is first-match in registration order: an encoding belongs to the
//! earliest identity strictly within the threshold, not the nearest one.

use crate::{
    detection::FaceAnalyzer,
    landmarks::{FaceEncoding, LandmarkSet},
    utils::ensure_bgr,
    Error, Result,
};
use log::{debug, info};
use opencv::{
    core::{Mat, Rect},
    imgcodecs,
    prelude::*,
};
use std::path::Path;

/// Replacement face for one identity
pub struct SwapSource {
    /// Source image, 8-bit BGR
    pub image: Mat,
    /// Landmarks of the face in `image`
    pub landmarks: LandmarkSet,
}

/// One distinct person
pub struct IdentityRecord {
    /// Index in the registry
    pub id: usize,
    /// Encoding of the first observation
    pub encoding: FaceEncoding,
    /// Padded crop of the first observation
    pub face_image: Mat,
    /// Face box in the frame it was first seen in
    pub face_rect: Rect,
    /// Landmarks of the first observation
    pub landmarks: LandmarkSet,
    /// Assigned replacement, if any
    pub swap_source: Option<SwapSource>,
}

/// Append-only collection of identities
pub struct IdentityRegistry {
    threshold: f64,
    records: Vec<IdentityRecord>,
}

impl IdentityRegistry {
    /// Empty registry matching encodings closer than `threshold`
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the threshold is not positive and finite
    pub fn new(threshold: f64) -> Result<Self> {
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(Error::ConfigError(format!(
                "Recognition threshold must be positive, got {threshold}"
            )));
        }
        Ok(Self {
            threshold,
            records: Vec::new(),
        })
    }

    /// Matching threshold
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Index of the first identity strictly closer than the threshold
    #[must_use]
    pub fn find_match(&self, encoding: &FaceEncoding) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.encoding.distance(encoding) < self.threshold)
    }

    /// Matching record, see [`find_match`](Self::find_match)
    #[must_use]
    pub fn match_record(&self, encoding: &FaceEncoding) -> Option<&IdentityRecord> {
        self.find_match(encoding).map(|i| &self.records[i])
    }

    /// Append a new identity and return its index
    pub fn register(&mut self, face_image: Mat, encoding: FaceEncoding, face_rect: Rect, landmarks: LandmarkSet) -> usize {
        let id = self.records.len();
        self.records.push(IdentityRecord {
            id,
            encoding,
            face_image,
            face_rect,
            landmarks,
            swap_source: None,
        });
        info!("Registered identity {} at {:?}", id, face_rect);
        id
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.records.len() {
            Ok(())
        } else {
            Err(Error::IdentityOutOfRange {
                index,
                len: self.records.len(),
            })
        }
    }

    /// Use the first face found in `image` as the replacement for identity `index`
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentityOutOfRange`], [`Error::ImageDecode`] for an
    /// empty or unsupported image, [`Error::NoFaceFound`] if the detector
    /// finds nothing, or the collaborator's landmark error
    pub fn assign_swap_source<A: FaceAnalyzer + ?Sized>(
        &mut self,
        index: usize,
        image: &Mat,
        analyzer: &mut A,
    ) -> Result<()> {
        self.check_index(index)?;
        let image = ensure_bgr(image).map_err(|e| Error::ImageDecode(e.to_string()))?;
        self.attach(index, image, analyzer, "swap source image")
    }

    /// Like [`assign_swap_source`](Self::assign_swap_source), reading the image from `path`
    ///
    /// # Errors
    ///
    /// As [`assign_swap_source`](Self::assign_swap_source); unreadable files give [`Error::ImageDecode`]
    pub fn assign_swap_source_from_path<A: FaceAnalyzer + ?Sized, P: AsRef<Path>>(
        &mut self,
        index: usize,
        path: P,
        analyzer: &mut A,
    ) -> Result<()> {
        self.check_index(index)?;
        let path = path.as_ref();
        let name = path.display().to_string();
        let image = match imgcodecs::imread(&name, imgcodecs::IMREAD_COLOR) {
            Ok(image) if !image.empty() => image,
            Ok(_) => return Err(Error::ImageDecode(name)),
            Err(e) => {
                debug!("imread failed for {}: {}", name, e);
                return Err(Error::ImageDecode(name));
            }
        };
        self.attach(index, image, analyzer, &name)
    }

    fn attach<A: FaceAnalyzer + ?Sized>(&mut self, index: usize, image: Mat, analyzer: &mut A, what: &str) -> Result<()> {
        let faces = analyzer.detect(&image, 1.0)?;
        let Some(region) = faces.first() else {
            return Err(Error::NoFaceFound(what.to_string()));
        };
        if faces.len() > 1 {
            debug!("{} faces in {}, using the first", faces.len(), what);
        }
        let landmarks = analyzer.landmarks(&image, region)?;
        self.records[index].swap_source = Some(SwapSource { image, landmarks });
        info!("Assigned swap source to identity {}", index);
        Ok(())
    }

    /// Detach the replacement from identity `index`
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentityOutOfRange`] for an unknown index
    pub fn clear_swap_source(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.records[index].swap_source = None;
        Ok(())
    }

    /// True when there is at least one identity and every one has a replacement
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.records.is_empty() && self.records.iter().all(|r| r.swap_source.is_some())
    }

    /// Drop all identities
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number of identities
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// No identities yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All identities in registration order
    #[must_use]
    pub fn records(&self) -> &[IdentityRecord] {
        &self.records
    }

    /// Identity at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&IdentityRecord> {
        self.records.get(index)
    }
}
