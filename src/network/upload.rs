use image::DynamicImage;
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use super::service::{NetworkService, decode_envelope};
use crate::error::Error;
use crate::imaging::{EncodedImage, EncodingPipeline};
use crate::types::NewCard;

/// Form field carrying the encoded image.
pub const IMAGE_PART: &str = "image";
/// Form field carrying the JSON request body.
pub const REQUEST_PART: &str = "request";

impl NetworkService {
    /// Uploads an already-encoded image with its JSON request body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the server answers with a non-success
    /// envelope, plus everything [`execute`](Self::execute) can return.
    pub async fn upload_encoded<B>(
        &self,
        path: &str,
        image: &EncodedImage,
        body: &B,
    ) -> Result<NewCard, Error>
    where
        B: Serialize + ?Sized,
    {
        let url = self.config().endpoint(path)?;
        let json = serde_json::to_vec(body)?;

        let response = self
            .execute_with(|http| {
                let image_part = Part::bytes(image.bytes.clone())
                    .file_name(image.suggested_file_name.clone())
                    .mime_str(image.mime_type)?;
                let request_part = Part::bytes(json.clone()).mime_str("application/json")?;
                let form = Form::new()
                    .part(IMAGE_PART, image_part)
                    .part(REQUEST_PART, request_part);
                Ok(http.post(url.clone()).multipart(form))
            })
            .await?;

        let card: NewCard = decode_envelope(response).await?;
        tracing::info!(
            card_id = card.new_card_id,
            bytes = image.bytes.len(),
            mime = image.mime_type,
            "Meal card uploaded"
        );
        Ok(card)
    }

    /// Encodes `image` under `max_bytes` off the async runtime, then uploads it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageTooLarge`] if no codec fits the budget; the
    /// upload is not attempted in that case.
    pub async fn upload_card<B>(
        &self,
        path: &str,
        pipeline: &EncodingPipeline,
        image: DynamicImage,
        max_bytes: usize,
        body: &B,
    ) -> Result<NewCard, Error>
    where
        B: Serialize + ?Sized,
    {
        let encoded = pipeline
            .encode_off_thread(image, max_bytes)
            .await?
            .ok_or(Error::ImageTooLarge { max_bytes })?;
        self.upload_encoded(path, &encoded, body).await
    }
}
