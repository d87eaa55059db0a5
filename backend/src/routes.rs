use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use log::{error, info, warn};
use std::collections::HashMap;
use uuid::Uuid;

use crate::analysis::feasibility::{analyze_feasibility, FeasibilityCriteria};
use crate::config::UploadConfig;
use crate::emotion::service::EmotionService;
use crate::error::ApiError;

const EMOTION_PREDICTION_FIELD: &str = "emotionPrediction";
const PERCENTAGE_FIELD: &str = "percentage";
const CONSECUTIVE_FIELD: &str = "consecutiveRecognitionSuccess";
const PARAMETER_FIELDS: [&str; 3] = [EMOTION_PREDICTION_FIELD, PERCENTAGE_FIELD, CONSECUTIVE_FIELD];
const MAX_PARAMETER_BYTES: usize = 1024;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/detect-emotion").route(web::post().to(detect_emotion)));
}

#[derive(Debug, Default)]
struct Upload {
    images: Vec<Vec<u8>>,
    fields: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
struct DetectionParameters {
    emotion_prediction: String,
    criteria: FeasibilityCriteria,
}

impl DetectionParameters {
    fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ApiError> {
        let emotion_prediction = fields
            .get(EMOTION_PREDICTION_FIELD)
            .cloned()
            .ok_or(ApiError::MissingParameter(EMOTION_PREDICTION_FIELD))?;

        Ok(Self {
            emotion_prediction,
            criteria: FeasibilityCriteria {
                percentage: parse_integer(fields, PERCENTAGE_FIELD)?,
                consecutive_threshold: parse_integer(fields, CONSECUTIVE_FIELD)?,
            },
        })
    }
}

fn parse_integer(fields: &HashMap<String, String>, field: &'static str) -> Result<i64, ApiError> {
    let value = fields.get(field).ok_or(ApiError::MissingParameter(field))?;
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| ApiError::InvalidParameter {
            field,
            value: value.clone(),
        })
}

async fn read_field(field: &mut Field, max_bytes: usize) -> Result<Option<Vec<u8>>, ApiError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        if data.len() + chunk.len() > max_bytes {
            return Ok(None);
        }
        data.extend_from_slice(&chunk);
    }
    Ok(Some(data))
}

async fn read_upload(mut payload: Multipart, limits: &UploadConfig) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();
    let mut image_parts = 0;

    while let Some(mut field) = payload.try_next().await? {
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .unwrap_or_default()
            .to_string();

        if name == limits.field_name {
            if upload.images.len() == limits.max_images {
                return Err(ApiError::TooManyImages {
                    max: limits.max_images,
                });
            }
            // Position within the form, empty parts included.
            image_parts += 1;
            let data = read_field(&mut field, limits.max_image_bytes)
                .await?
                .ok_or(ApiError::ImageTooLarge {
                    position: image_parts,
                    max_bytes: limits.max_image_bytes,
                })?;
            if !data.is_empty() {
                upload.images.push(data);
            }
        } else if let Some(&param) = PARAMETER_FIELDS.iter().find(|&&f| f == name) {
            let data = read_field(&mut field, MAX_PARAMETER_BYTES)
                .await?
                .ok_or_else(|| ApiError::InvalidParameter {
                    field: param,
                    value: format!("<more than {} bytes>", MAX_PARAMETER_BYTES),
                })?;
            let value = String::from_utf8(data).map_err(|_| ApiError::InvalidParameter {
                field: param,
                value: "<invalid UTF-8>".to_string(),
            })?;
            upload.fields.insert(name, value);
        } else {
            warn!("Ignoring unexpected form field {:?}", name);
            while field.try_next().await?.is_some() {}
        }
    }

    Ok(upload)
}

async fn detect_emotion(
    service: web::Data<EmotionService>,
    limits: web::Data<UploadConfig>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let request_id = Uuid::new_v4();

    let upload = read_upload(payload, &limits)
        .await
        .inspect_err(|e| warn!("[{}] Rejected upload: {}", request_id, e))?;

    if upload.images.is_empty() {
        warn!("[{}] No images in request", request_id);
        return Err(ApiError::NoImages);
    }

    let params = DetectionParameters::from_fields(&upload.fields)
        .inspect_err(|e| warn!("[{}] Invalid parameters: {}", request_id, e))?;

    info!(
        "[{}] Detecting emotions in {} images (prediction {:?}, percentage {}, consecutive {})",
        request_id,
        upload.images.len(),
        params.emotion_prediction,
        params.criteria.percentage,
        params.criteria.consecutive_threshold
    );

    let images = upload.images;
    let service = service.into_inner();
    let results = web::block(move || service.detect_batch(&images))
        .await
        .map_err(|e| {
            error!("[{}] Detection task failed: {}", request_id, e);
            ApiError::Processing
        })?
        .map_err(|e| {
            error!("[{}] Error processing images: {}", request_id, e);
            ApiError::Processing
        })?;

    let verdict = analyze_feasibility(&params.emotion_prediction, results, params.criteria);
    info!(
        "[{}] success={} reliability={} consecutive_recognition={}",
        request_id, verdict.success, verdict.reliability, verdict.consecutive_recognition
    );

    Ok(HttpResponse::Ok().json(verdict))
}
