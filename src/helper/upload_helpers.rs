use crate::upload_pipeline::{is_image_type, SelectedFile, MAX_PENDING_UPLOADS};
use actix_multipart::Multipart;
use actix_web::web::{Bytes, BytesMut};
use futures_util::StreamExt;
use thiserror::Error;

pub const MAX_FILE_SIZE_MB: usize = 25;
const MAX_FILE_SIZE_BYTES: usize = MAX_FILE_SIZE_MB * 1024 * 1024;

#[derive(Error, Debug)]
pub enum UploadHelperError {
    #[error("Multipart error: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),
    #[error("File '{0}' exceeds the size limit")]
    TooLarge(String),
    #[error("No file was uploaded")]
    NoFiles,
}

impl UploadHelperError {
    pub fn notice(&self) -> String {
        match self {
            UploadHelperError::Multipart(_) => "No se pudieron leer los archivos.".to_string(),
            UploadHelperError::TooLarge(name) => {
                format!("'{}' supera el tamaño máximo de {}MB.", name, MAX_FILE_SIZE_MB)
            }
            UploadHelperError::NoFiles => "Selecciona al menos una foto.".to_string(),
        }
    }
}

/// What came in with one selection request.
#[derive(Debug, Default)]
pub struct SelectedUploads {
    pub files: Vec<SelectedFile>,
    /// Image parts beyond [`MAX_PENDING_UPLOADS`], skipped without buffering.
    pub over_cap: usize,
}

/// Reads the `file` fields of the request. At most [`MAX_PENDING_UPLOADS`]
/// image parts are buffered; further image parts are only counted. Parts
/// that are not images are passed on without their bytes so the pipeline
/// can name them in its notice.
pub async fn read_selected_files(mut payload: Multipart) -> Result<SelectedUploads, UploadHelperError> {
    let mut selection = SelectedUploads::default();
    let mut images = 0;

    while let Some(item) = payload.next().await {
        let mut field = item?;
        if field.content_disposition().get_name() != Some("file") {
            continue;
        }

        let file_name = field
            .content_disposition()
            .get_filename()
            .unwrap_or("foto")
            .to_string();
        let content_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();

        let keep_bytes = is_image_type(&content_type) && images < MAX_PENDING_UPLOADS;
        if !keep_bytes {
            while let Some(chunk) = field.next().await {
                chunk?;
            }
            if is_image_type(&content_type) {
                selection.over_cap += 1;
            } else {
                selection.files.push(SelectedFile { file_name, content_type, bytes: Bytes::new() });
            }
            continue;
        }

        let mut data = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if data.len() + chunk.len() > MAX_FILE_SIZE_BYTES {
                return Err(UploadHelperError::TooLarge(file_name));
            }
            data.extend_from_slice(&chunk);
        }

        images += 1;
        selection.files.push(SelectedFile { file_name, content_type, bytes: data.freeze() });
    }

    if selection.files.is_empty() && selection.over_cap == 0 {
        return Err(UploadHelperError::NoFiles);
    }
    Ok(selection)
}
