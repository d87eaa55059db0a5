use shared::{ResultsMapping, NO_FACE_DETECTED};
use std::sync::Arc;

use super::translation::LabelTranslator;
use crate::inference::model::{Classification, ExpressionClassifier, InferenceError};

/// Classifies uploaded images and turns each result into a display label.
#[derive(Clone)]
pub struct EmotionService {
    classifier: Arc<dyn ExpressionClassifier>,
    translator: Arc<LabelTranslator>,
}

impl EmotionService {
    pub fn new(classifier: Arc<dyn ExpressionClassifier>, translator: LabelTranslator) -> Self {
        Self {
            classifier,
            translator: Arc::new(translator),
        }
    }

    pub fn label_for(&self, image: &[u8]) -> Result<String, InferenceError> {
        match self.classifier.classify(image)? {
            Classification::NoFace => Ok(NO_FACE_DETECTED.to_string()),
            Classification::Expressions(scores) => {
                let dominant = scores.dominant().ok_or_else(|| {
                    InferenceError::UnexpectedOutput("no expression scores".into())
                })?;
                Ok(self.translator.translate(dominant).to_string())
            }
        }
    }

    /// Labels every image in submission order. The first failure aborts the batch.
    pub fn detect_batch(&self, images: &[Vec<u8>]) -> Result<ResultsMapping, InferenceError> {
        let mut results = ResultsMapping::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            let label = self.label_for(image)?;
            log::debug!("Image {} of {}: {}", index + 1, images.len(), label);
            results.push_label(label);
        }
        Ok(results)
    }
}
