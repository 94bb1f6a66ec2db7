//! Face-presence validation. A candidate passes only when a detected face
//! occupies at least a minimum fraction of the image area; every failure
//! mode rejects, because a validation error must never admit an image.

use image::RgbImage;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Minimum face bounding-box area relative to image area.
pub const DEFAULT_MIN_FACE_AREA: f64 = 0.10;

/// Axis-aligned face bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Detector seam: the validator only needs bounding boxes, so stricter
/// detectors can be swapped in without touching the pipeline.
pub trait FaceDetector {
    fn detect_faces(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, FaceError>;
}

/// SeetaFace frontal detector.
pub struct SeetaDetector {
    inner: Box<dyn rustface::Detector>,
}

impl SeetaDetector {
    /// Loads the detection model from disk. A missing or malformed model is
    /// a fatal setup error at the caller's boundary.
    pub fn from_model(path: &Path) -> Result<Self, FaceError> {
        let model_path = path.to_str().ok_or_else(|| {
            FaceError::ModelLoad(format!("model path is not valid UTF-8: {}", path.display()))
        })?;
        let mut inner = rustface::create_detector(model_path)
            .map_err(|error| FaceError::ModelLoad(error.to_string()))?;
        inner.set_min_face_size(20);
        inner.set_score_thresh(2.0);
        inner.set_pyramid_scale_factor(0.8);
        inner.set_slide_window_step(4, 4);
        Ok(Self { inner })
    }
}

impl FaceDetector for SeetaDetector {
    fn detect_faces(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, FaceError> {
        let grayscale = image::imageops::grayscale(image);
        let (width, height) = grayscale.dimensions();
        let mut data = rustface::ImageData::new(grayscale.as_raw(), width, height);
        let faces = self.inner.detect(&mut data);
        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceRegion {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width(),
                    height: bbox.height(),
                }
            })
            .collect())
    }
}

/// Accepts an image only if at least one detected face is large enough.
pub struct FaceValidator {
    detector: Box<dyn FaceDetector>,
    min_relative_area: f64,
}

impl FaceValidator {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self {
            detector,
            min_relative_area: DEFAULT_MIN_FACE_AREA,
        }
    }

    pub fn with_min_relative_area(mut self, min_relative_area: f64) -> Self {
        self.min_relative_area = min_relative_area;
        self
    }

    /// Decodes the image at `path` and checks for a sufficiently large face.
    /// Unreadable images, detector failures and zero detections all reject.
    pub fn has_valid_face(&mut self, path: &Path) -> bool {
        let image = match image::open(path) {
            Ok(image) => image.to_rgb8(),
            Err(_) => return false,
        };
        self.image_has_valid_face(&image)
    }

    /// In-memory variant of `has_valid_face`. The area boundary is
    /// inclusive: a face at exactly the minimum fraction passes.
    pub fn image_has_valid_face(&mut self, image: &RgbImage) -> bool {
        let (width, height) = image.dimensions();
        let image_area = u64::from(width) * u64::from(height);
        if image_area == 0 {
            return false;
        }

        let faces = match self.detector.detect_faces(image) {
            Ok(faces) => faces,
            Err(_) => return false,
        };

        faces
            .iter()
            .any(|face| face.area() as f64 / image_area as f64 >= self.min_relative_area)
    }
}

#[derive(Debug)]
pub enum FaceError {
    ModelLoad(String),
    Detection(String),
}

impl Display for FaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModelLoad(reason) => write!(f, "failed to load face model: {}", reason),
            Self::Detection(reason) => write!(f, "face detection failed: {}", reason),
        }
    }
}

impl Error for FaceError {}
