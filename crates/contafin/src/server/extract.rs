use axum::{
    Json, async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header,
};
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// JSON body that may be left out. An empty body yields `None`; any other
/// body must be well-formed JSON of the expected shape.
pub(super) struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let declares_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(is_json_media_type);
        let body = Bytes::from_request(req, state).await.map_err(|rejection| {
            ApiError::BadRequest(format!(
                "No se pudo leer el cuerpo de la petición: {}",
                rejection.body_text()
            ))
        })?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(None));
        }
        if !declares_json {
            return Err(ApiError::BadRequest(
                "Se esperaba 'Content-Type: application/json'".to_string(),
            ));
        }
        let Json(value) = Json::<T>::from_bytes(&body)?;
        Ok(Self(Some(value)))
    }
}

fn is_json_media_type(value: &str) -> bool {
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}
