#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
    #[error("{0} session lock poisoned")]
    Poisoned(&'static str),
    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),
}

/// Confidence per expression class, in model output order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionScores {
    scores: Vec<(String, f32)>,
}

impl ExpressionScores {
    pub fn new(scores: Vec<(String, f32)>) -> Self {
        Self { scores }
    }

    /// Pairs class labels with model outputs; both must have the same length.
    pub fn from_outputs(labels: &[String], outputs: &[f32]) -> Result<Self, InferenceError> {
        if labels.len() != outputs.len() {
            return Err(InferenceError::UnexpectedOutput(format!(
                "expected {} expression scores, got {}",
                labels.len(),
                outputs.len()
            )));
        }
        Ok(Self::new(
            labels.iter().cloned().zip(outputs.iter().copied()).collect(),
        ))
    }

    /// Arg-max label. On equal scores the later class wins.
    pub fn dominant(&self) -> Option<&str> {
        let mut iter = self.scores.iter();
        let mut best = iter.next()?;
        for candidate in iter {
            if candidate.1 >= best.1 {
                best = candidate;
            }
        }
        Some(best.0.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    NoFace,
    Expressions(ExpressionScores),
}

/// Face-expression model seam. Implementations must be shareable across workers.
pub trait ExpressionClassifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> Result<Classification, InferenceError>;
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.iter().map(|&e| e / sum).collect()
    } else {
        exps
    }
}
