//! PDF upload and processing endpoints

use axum::{
    extract::{Multipart, State},
    Json,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::UploadedFile;
use crate::server::state::AppState;
use crate::types::ProcessResponse;

/// Multipart field carrying the uploaded PDFs
pub const FILES_FIELD: &str = "pdf_docs";
/// Multipart field carrying the page session
pub const SESSION_FIELD: &str = "session";

/// Contents of an upload form
#[derive(Debug, Default)]
pub struct UploadForm {
    pub session: Option<Uuid>,
    pub files: Vec<UploadedFile>,
}

/// Read the session id and every uploaded file from a multipart body
pub async fn read_upload_form(multipart: &mut Multipart) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Internal(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == SESSION_FIELD {
            let value = field
                .text()
                .await
                .map_err(|e| Error::Internal(format!("Failed to read session field: {}", e)))?;
            form.session = Uuid::parse_str(value.trim()).ok();
            continue;
        }

        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            tracing::debug!("Ignoring multipart field '{}'", name);
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::file_parse(&filename, format!("Failed to read upload: {}", e)))?;

        // Browsers send an empty part when no file was chosen
        if filename.is_empty() && data.is_empty() {
            continue;
        }

        tracing::info!("Received file: {} ({} bytes)", filename, data.len());
        form.files.push(UploadedFile::new(filename, data.to_vec()));
    }

    Ok(form)
}

/// POST /api/process - Upload PDFs and rebuild the index
pub async fn process_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>> {
    let form = read_upload_form(&mut multipart).await?;
    let response = state.process_uploads(form.files).await?;
    Ok(Json(response))
}
