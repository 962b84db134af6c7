use super::{decode_records, ensure_success, CollectionRemote, RemoteClient, RemoteError, UploadRemote};
use crate::models::remote_models::{
    ConfirmPhoto, ConfirmPhotosRequest, ConfirmPhotosResponse, GenerateUploadUrlsRequest,
    GenerateUploadUrlsResponse, UploadFileSpec, UploadTarget,
};
use crate::models::{Photo, PhotoPayload, RecordId};
use actix_web::web::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use reqwest::header::CONTENT_TYPE;

impl CollectionRemote<Photo> for RemoteClient {
    fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Photo>, RemoteError>> {
        async move {
            let endpoint = self.endpoint(&["photos", ""])?;
            let response = self.http.get(endpoint.clone()).send().await?;
            let raw = ensure_success(&endpoint, response)?
                .json::<Vec<serde_json::Value>>()
                .await?;
            Ok(decode_records(&endpoint, raw))
        }
        .boxed()
    }

    fn delete<'a>(&'a self, id: &'a RecordId) -> BoxFuture<'a, Result<(), RemoteError>> {
        async move {
            let endpoint = self.endpoint(&["photos", id.as_str()])?;
            let response = self.http.delete(endpoint.clone()).send().await?;
            ensure_success(&endpoint, response)?;
            Ok(())
        }
        .boxed()
    }
}

impl UploadRemote for RemoteClient {
    fn generate_upload_urls<'a>(
        &'a self,
        files: &'a [UploadFileSpec],
    ) -> BoxFuture<'a, Result<Vec<UploadTarget>, RemoteError>> {
        async move {
            let endpoint = self.endpoint(&["photos", "generate-upload-url"])?;
            let response = self
                .http
                .post(endpoint.clone())
                .json(&GenerateUploadUrlsRequest { files })
                .send()
                .await?;
            let body = ensure_success(&endpoint, response)?
                .json::<GenerateUploadUrlsResponse>()
                .await?;
            Ok(body.items)
        }
        .boxed()
    }

    fn transfer<'a>(
        &'a self,
        target: &'a UploadTarget,
        content_type: &'a str,
        body: Bytes,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        async move {
            // Write locations are pre-signed and absolute; they do not hang off the base URL.
            let endpoint = url::Url::parse(&target.url)?;
            let response = self
                .http
                .put(endpoint.clone())
                .header(CONTENT_TYPE, content_type)
                .body(body)
                .send()
                .await?;
            ensure_success(&endpoint, response)?;
            Ok(())
        }
        .boxed()
    }

    fn confirm<'a>(
        &'a self,
        photos: &'a [ConfirmPhoto],
    ) -> BoxFuture<'a, Result<Vec<PhotoPayload>, RemoteError>> {
        async move {
            let endpoint = self.endpoint(&["photos", "confirm"])?;
            let response = self
                .http
                .post(endpoint.clone())
                .json(&ConfirmPhotosRequest { photos })
                .send()
                .await?;
            let body = ensure_success(&endpoint, response)?
                .json::<ConfirmPhotosResponse>()
                .await?;
            Ok(body.items)
        }
        .boxed()
    }
}
