//! Where sheets and DAR PDFs live: Google Workspace, or a local mirror.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use darflow_core::{McmPeriod, PeriodKey, PeriodResources, Settings};
use darflow_store::{DuckSheet, SheetStore};
use darflow_sync::{DriveClient, GoogleAuth, SheetsClient};
use tracing::info;

pub enum Backend {
    /// DuckDB mirror for sheets, a directory tree for PDFs.
    Local { sheets: DuckSheet, dar_dir: PathBuf },
    Google {
        sheets: SheetsClient,
        drive: DriveClient,
        parent_folder: Option<String>,
    },
}

impl Backend {
    pub fn open(settings: &Settings, local: bool, token: Option<String>) -> anyhow::Result<Self> {
        if local {
            let path = settings.sheet_db_path();
            let sheets = DuckSheet::open_persistent(&path)
                .with_context(|| format!("opening sheet mirror {}", path.display()))?;
            return Ok(Self::Local {
                sheets,
                dar_dir: settings.data_dir.join("dars"),
            });
        }
        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            bail!("GOOGLE_ACCESS_TOKEN is not set; pass --local to use the local mirror");
        };
        let auth = GoogleAuth::new(token);
        Ok(Self::Google {
            sheets: SheetsClient::new(auth.clone(), &settings.sheets_base_url),
            drive: DriveClient::new(auth, &settings.drive_base_url, &settings.drive_upload_url),
            parent_folder: settings.drive_parent_folder_id.clone(),
        })
    }

    pub fn sheets(&self) -> &dyn SheetStore {
        match self {
            Self::Local { sheets, .. } => sheets,
            Self::Google { sheets, .. } => sheets,
        }
    }

    /// Create the folder and spreadsheet a new period needs.
    pub async fn provision(&self, key: PeriodKey) -> anyhow::Result<PeriodResources> {
        match self {
            Self::Local { dar_dir, .. } => {
                let folder = dar_dir.join(key.folder_title());
                create_dir(&folder)?;
                Ok(PeriodResources {
                    folder_id: folder.display().to_string(),
                    folder_url: file_url(&folder)?,
                    spreadsheet_id: format!("local:{key}"),
                    spreadsheet_url: format!("local:{}", key.spreadsheet_title()),
                })
            }
            Self::Google {
                drive,
                parent_folder,
                ..
            } => Ok(drive
                .provision_period(key, parent_folder.as_deref())
                .await
                .with_context(|| format!("creating Drive resources for {key}"))?),
        }
    }

    /// Store an uploaded DAR in the period's folder. Returns its URL.
    pub async fn store_pdf(
        &self,
        period: &McmPeriod,
        file_name: &str,
        data: Vec<u8>,
    ) -> anyhow::Result<String> {
        match self {
            Self::Local { .. } => {
                let folder = PathBuf::from(&period.folder_id);
                create_dir(&folder)?;
                let dest = folder.join(file_name);
                std::fs::write(&dest, data)
                    .with_context(|| format!("writing {}", dest.display()))?;
                info!(path = %dest.display(), "stored DAR locally");
                file_url(&dest)
            }
            Self::Google { drive, .. } => {
                let file = drive
                    .upload_pdf(&period.folder_id, file_name, data)
                    .await
                    .context("uploading DAR to Drive")?;
                Ok(file.web_view_link)
            }
        }
    }
}

fn create_dir(path: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("creating {}", path.display()))
}

fn file_url(path: &Path) -> anyhow::Result<String> {
    let abs = std::path::absolute(path)
        .with_context(|| format!("resolving {}", path.display()))?;
    Ok(format!("file://{}", abs.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(dir: &Path) -> Settings {
        Settings {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn google_backend_needs_a_token() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = Backend::open(&settings(tmp.path()), false, None).err().unwrap();
        assert!(err.to_string().contains("GOOGLE_ACCESS_TOKEN"));
        assert!(Backend::open(&settings(tmp.path()), false, Some("tok".into())).is_ok());
    }

    #[tokio::test]
    async fn local_period_and_pdf_storage() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = Backend::open(&settings(tmp.path()), true, None).unwrap();
        let key = PeriodKey::new(2025, 4).unwrap();

        let resources = backend.provision(key).await.unwrap();
        assert_eq!(resources.spreadsheet_id, "local:2025-04");
        assert!(Path::new(&resources.folder_id).is_dir());

        let period = McmPeriod::new(key, resources);
        let url = backend
            .store_pdf(&period, "dar.pdf", b"%PDF-1.4".to_vec())
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("MCM_DARs_April_2025/dar.pdf"));
        assert!(backend.sheets().read_rows("local:2025-04").await.unwrap().is_empty());
    }
}
