use image::GenericImageView;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;

use super::model::{softmax, Classification, ExpressionClassifier, ExpressionScores, InferenceError};
use super::preprocess::{best_face, crop_face, expression_tensor, letterbox, FaceBox, Letterbox};
use crate::config::ModelConfig;

/// Face detector followed by an expression network, both on ONNX Runtime.
///
/// `Session::run` needs exclusive access, so each session sits behind its own lock.
pub struct OnnxExpressionClassifier {
    detector: Mutex<Session>,
    expression_net: Mutex<Session>,
    config: ModelConfig,
}

impl OnnxExpressionClassifier {
    pub fn load(config: &ModelConfig) -> Result<Self, InferenceError> {
        let detector = load_session(&config.detector_path(), config.intra_threads)?;
        let expression_net = load_session(&config.expression_path(), config.intra_threads)?;

        Ok(Self {
            detector: Mutex::new(detector),
            expression_net: Mutex::new(expression_net),
            config: config.clone(),
        })
    }

    fn detect_face(
        &self,
        input: Array4<f32>,
        letterbox: &Letterbox,
        image_size: (u32, u32),
    ) -> Result<Option<FaceBox>, InferenceError> {
        let mut session = self
            .detector
            .lock()
            .map_err(|_| InferenceError::Poisoned("face detector"))?;
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();

        let face = best_face(
            &dims,
            data,
            letterbox,
            self.config.detector.confidence,
            image_size,
        )?;
        Ok(face)
    }

    fn score_expressions(&self, input: Array4<f32>) -> Result<ExpressionScores, InferenceError> {
        let mut session = self
            .expression_net
            .lock()
            .map_err(|_| InferenceError::Poisoned("expression network"))?;
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, logits) = outputs[0].try_extract_tensor::<f32>()?;

        let settings = &self.config.expression;
        let scores = if settings.softmax {
            softmax(logits)
        } else {
            logits.to_vec()
        };
        ExpressionScores::from_outputs(&settings.labels, &scores)
    }
}

impl ExpressionClassifier for OnnxExpressionClassifier {
    fn classify(&self, image: &[u8]) -> Result<Classification, InferenceError> {
        let image = image::load_from_memory(image)?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(InferenceError::UnexpectedOutput("image has no pixels".into()));
        }

        let (input, info) = letterbox(&image, self.config.detector.input_size);
        let Some(face) = self.detect_face(input, &info, (width, height))? else {
            log::debug!("No face above confidence {}", self.config.detector.confidence);
            return Ok(Classification::NoFace);
        };
        log::debug!(
            "Face at ({:.0}, {:.0}) {:.0}x{:.0}, confidence {:.2}",
            face.x,
            face.y,
            face.width,
            face.height,
            face.confidence
        );

        let settings = &self.config.expression;
        let crop = crop_face(&image, &face);
        let input = expression_tensor(&crop, settings.input_size, settings.grayscale, settings.pixel_scale);
        Ok(Classification::Expressions(self.score_expressions(input)?))
    }
}

fn load_session(path: &Path, intra_threads: usize) -> Result<Session, InferenceError> {
    if !path.exists() {
        return Err(InferenceError::ModelNotFound(path.display().to_string()));
    }

    let session = Session::builder()?
        .with_intra_threads(intra_threads)?
        .commit_from_file(path)?;

    log::info!(
        "Loaded model {} (inputs: {:?}, outputs: {:?})",
        path.display(),
        session.inputs().iter().map(|i| i.name().to_string()).collect::<Vec<_>>(),
        session.outputs().iter().map(|o| o.name().to_string()).collect::<Vec<_>>()
    );
    Ok(session)
}
