//! Staged uploads on disk, so a reviewer can edit rows between `extract`
//! and `submit`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use darflow_core::{FlattenedRow, PendingUpload, PeriodKey, SessionContext};
use serde::{Deserialize, Serialize};

/// `<data_dir>/staged/<period>_<pdf stem>.json`.
pub fn default_path(data_dir: &Path, period: PeriodKey, pdf: &Path) -> PathBuf {
    let stem = pdf
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dar");
    data_dir.join("staged").join(format!("{period}_{stem}.json"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedUpload {
    /// `YYYY-MM`.
    pub period: String,
    pub dar_pdf_url: String,
    pub rows: Vec<FlattenedRow>,
}

impl StagedUpload {
    pub fn from_pending(pending: &PendingUpload) -> Self {
        Self {
            period: pending.period.to_string(),
            dar_pdf_url: pending.dar_pdf_url.clone(),
            rows: pending.rows.clone(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading staged rows {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
    }

    pub fn period_key(&self) -> anyhow::Result<PeriodKey> {
        self.period
            .parse()
            .with_context(|| format!("staged file has bad period '{}'", self.period))
    }

    /// Put these rows into the session's pending slot.
    pub fn stage_into(self, session: &mut SessionContext) -> anyhow::Result<()> {
        let period = self.period_key()?;
        session.stage(period, &self.dar_pdf_url, self.rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darflow_core::Role;

    #[test]
    fn save_load_and_stage() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("dar.json");
        let staged = StagedUpload {
            period: "2025-04".into(),
            dar_pdf_url: "https://drive.example/f".into(),
            rows: vec![FlattenedRow::default()],
        };
        staged.save(&path).unwrap();
        let loaded = StagedUpload::load(&path).unwrap();
        assert_eq!(loaded, staged);

        let mut session = SessionContext::new("ag3", Role::AuditGroup { group: 3 });
        loaded.stage_into(&mut session).unwrap();
        let pending = session.pending().unwrap();
        assert_eq!(pending.rows[0].audit_group_number, Some(3));
        assert_eq!(StagedUpload::from_pending(pending).period, "2025-04");
    }

    #[test]
    fn default_path_lives_under_data_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let key: PeriodKey = "2025-04".parse().unwrap();
        let path = default_path(tmp.path(), key, Path::new("/uploads/acme dar.pdf"));
        assert_eq!(path, tmp.path().join("staged").join("2025-04_acme dar.json"));

        let staged = StagedUpload {
            period: key.to_string(),
            dar_pdf_url: "file:///x.pdf".into(),
            rows: vec![FlattenedRow::default()],
        };
        staged.save(&path).unwrap();
        assert_eq!(StagedUpload::load(&path).unwrap(), staged);
    }

    #[test]
    fn bad_period_is_rejected() {
        let staged = StagedUpload {
            period: "April".into(),
            dar_pdf_url: String::new(),
            rows: vec![],
        };
        assert!(staged.period_key().is_err());
    }
}
