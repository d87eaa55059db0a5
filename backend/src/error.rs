use actix_multipart::MultipartError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No se han enviado imágenes")]
    NoImages,
    #[error("Se permiten como máximo {max} imágenes")]
    TooManyImages { max: usize },
    #[error("La imagen {position} supera el tamaño máximo de {max_bytes} bytes")]
    ImageTooLarge { position: usize, max_bytes: usize },
    #[error("Falta el campo {0}")]
    MissingParameter(&'static str),
    #[error("Valor inválido en el campo {field}: {value:?}")]
    InvalidParameter { field: &'static str, value: String },
    #[error("Formulario inválido: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Error al procesar las imágenes.")]
    Processing,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NoImages => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Processing => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            ApiError::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyImages { .. }
            | ApiError::MissingParameter(_)
            | ApiError::InvalidParameter { .. }
            | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
