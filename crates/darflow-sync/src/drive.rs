//! Google Drive v3: period folders, tracker spreadsheets, DAR uploads.

use darflow_core::{PeriodKey, PeriodResources};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::http::{GoogleAuth, SyncError, send_json, trim_base};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const PDF_MIME: &str = "application/pdf";
const FILE_FIELDS: &str = "id,webViewLink";
const BOUNDARY: &str = "darflow-upload-boundary";

/// A created Drive file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub web_view_link: String,
}

pub struct DriveClient {
    auth: GoogleAuth,
    base_url: String,
    upload_url: String,
}

impl DriveClient {
    pub fn new(auth: GoogleAuth, base_url: &str, upload_url: &str) -> Self {
        Self {
            auth,
            base_url: trim_base(base_url),
            upload_url: trim_base(upload_url),
        }
    }

    async fn create_file(
        &self,
        name: &str,
        mime_type: &str,
        parent: Option<&str>,
    ) -> Result<DriveFile, SyncError> {
        let url = format!("{}/files?fields={FILE_FIELDS}", self.base_url);
        let body = file_metadata(name, mime_type, parent);
        send_json(self.auth.post(&url).json(&body)).await
    }

    pub async fn create_folder(&self, name: &str, parent: Option<&str>) -> Result<DriveFile, SyncError> {
        let folder = self.create_file(name, FOLDER_MIME, parent).await?;
        info!(name, id = %folder.id, "created Drive folder");
        Ok(folder)
    }

    pub async fn create_spreadsheet(&self, title: &str, folder_id: &str) -> Result<DriveFile, SyncError> {
        let sheet = self
            .create_file(title, SPREADSHEET_MIME, Some(folder_id))
            .await?;
        info!(title, id = %sheet.id, "created tracker spreadsheet");
        Ok(sheet)
    }

    /// Upload a DAR PDF into `folder_id` and make it readable by link.
    pub async fn upload_pdf(
        &self,
        folder_id: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<DriveFile, SyncError> {
        let url = format!(
            "{}/files?uploadType=multipart&fields={FILE_FIELDS}",
            self.upload_url
        );
        let metadata = file_metadata(file_name, PDF_MIME, Some(folder_id));
        let size = data.len();
        let body = multipart_related(&metadata, PDF_MIME, data);
        let file: DriveFile = send_json(
            self.auth
                .post(&url)
                .header(
                    "Content-Type",
                    format!("multipart/related; boundary={BOUNDARY}"),
                )
                .body(body),
        )
        .await?;
        info!(file_name, bytes = size, id = %file.id, "uploaded DAR PDF");
        self.share_with_link(&file.id).await?;
        Ok(file)
    }

    /// Anyone with the link may view.
    pub async fn share_with_link(&self, file_id: &str) -> Result<(), SyncError> {
        let url = format!("{}/files/{file_id}/permissions", self.base_url);
        let _: serde_json::Value = send_json(
            self.auth
                .post(&url)
                .json(&json!({ "role": "reader", "type": "anyone" })),
        )
        .await?;
        Ok(())
    }

    /// Create the folder and tracker spreadsheet for a new MCM period.
    pub async fn provision_period(
        &self,
        key: PeriodKey,
        parent_folder: Option<&str>,
    ) -> Result<PeriodResources, SyncError> {
        let folder = self.create_folder(&key.folder_title(), parent_folder).await?;
        let sheet = self
            .create_spreadsheet(&key.spreadsheet_title(), &folder.id)
            .await?;
        Ok(PeriodResources {
            folder_id: folder.id,
            folder_url: folder.web_view_link,
            spreadsheet_id: sheet.id,
            spreadsheet_url: sheet.web_view_link,
        })
    }
}

fn file_metadata(name: &str, mime_type: &str, parent: Option<&str>) -> serde_json::Value {
    let mut meta = json!({ "name": name, "mimeType": mime_type });
    if let Some(parent) = parent {
        meta["parents"] = json!([parent]);
    }
    meta
}

/// `multipart/related` body: JSON metadata part, then the media part.
fn multipart_related(metadata: &serde_json::Value, media_type: &str, data: Vec<u8>) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{BOUNDARY}\r\nContent-Type: {media_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(&data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
