//! Coordinator commands for MCM periods.

use anyhow::{Context, bail};
use clap::Subcommand;
use darflow_core::{McmPeriod, PeriodKey, SessionContext};
use darflow_store::PeriodIndexStore;
use tracing::info;

use crate::backend::Backend;
use crate::display;

#[derive(Subcommand)]
pub enum PeriodCommand {
    /// Create the folder and tracker sheet for a month and add it to the index
    Create {
        /// Month as YYYY-MM
        key: PeriodKey,
        /// Leave the new period inactive
        #[arg(long)]
        inactive: bool,
    },
    /// List periods, oldest first
    List {
        /// Only periods open for upload, newest first
        #[arg(long)]
        active: bool,
    },
    /// Open a period for uploads
    Activate { key: PeriodKey },
    /// Close a period for uploads
    Deactivate { key: PeriodKey },
    /// Drop a period from the index (its folder and sheet are kept)
    Remove { key: PeriodKey },
}

pub async fn run(
    cmd: PeriodCommand,
    session: &SessionContext,
    index: &PeriodIndexStore,
    backend: &Backend,
) -> anyhow::Result<()> {
    if !session.is_coordinator() {
        bail!("only the coordinator can manage MCM periods");
    }

    match cmd {
        PeriodCommand::Create { key, inactive } => {
            if index.load()?.get(key).is_some() {
                bail!("period {key} already exists");
            }
            let resources = backend.provision(key).await?;
            let mut period = McmPeriod::new(key, resources);
            period.active = !inactive;
            let url = period.spreadsheet_url.clone();
            index.update(|idx| -> anyhow::Result<_> { Ok(idx.insert(period)?) })?;
            info!(period = %key, spreadsheet = %url, "period created");
            println!("Created {key}: {url}");
        }
        PeriodCommand::List { active } => {
            let idx = index.load()?;
            if idx.is_empty() {
                println!("No MCM periods.");
            } else if active {
                display::print_periods(idx.active().into_iter());
            } else {
                display::print_periods(idx.iter());
            }
        }
        PeriodCommand::Activate { key } => set_active(index, key, true)?,
        PeriodCommand::Deactivate { key } => set_active(index, key, false)?,
        PeriodCommand::Remove { key } => {
            let removed = index
                .update(|idx| -> anyhow::Result<_> { Ok(idx.remove(key)?) })
                .with_context(|| format!("removing {key}"))?;
            println!(
                "Removed {key} from the index. Folder kept: {}",
                removed.folder_url
            );
        }
    }
    Ok(())
}

fn set_active(index: &PeriodIndexStore, key: PeriodKey, active: bool) -> anyhow::Result<()> {
    index.update(|idx| -> anyhow::Result<_> { Ok(idx.set_active(key, active)?) })?;
    println!("{key} is now {}", if active { "active" } else { "inactive" });
    Ok(())
}

/// The period rows for `key` go to, provided it is open for uploads.
pub fn open_period(index: &PeriodIndexStore, key: PeriodKey) -> anyhow::Result<McmPeriod> {
    let idx = index.load()?;
    let Some(period) = idx.get(key) else {
        bail!("no MCM period {key}; ask the coordinator to create it");
    };
    if !period.active {
        bail!("MCM period {key} is not open for uploads");
    }
    Ok(period.clone())
}

/// Any indexed period, active or not.
pub fn known_period(index: &PeriodIndexStore, key: PeriodKey) -> anyhow::Result<McmPeriod> {
    index
        .load()?
        .get(key)
        .cloned()
        .with_context(|| format!("no MCM period {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use darflow_core::{Role, Settings};

    fn fixture() -> (tempfile::TempDir, PeriodIndexStore, Backend) {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = Settings {
            data_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let index = PeriodIndexStore::new(settings.period_index_path());
        let backend = Backend::open(&settings, true, None).unwrap();
        (tmp, index, backend)
    }

    fn key() -> PeriodKey {
        "2025-04".parse().unwrap()
    }

    #[tokio::test]
    async fn coordinator_lifecycle() {
        let (_tmp, index, backend) = fixture();
        let coord = SessionContext::new("planning", Role::Coordinator);

        run(PeriodCommand::Create { key: key(), inactive: false }, &coord, &index, &backend)
            .await
            .unwrap();
        assert!(open_period(&index, key()).is_ok());

        let dup = run(PeriodCommand::Create { key: key(), inactive: false }, &coord, &index, &backend).await;
        assert!(dup.is_err());

        run(PeriodCommand::Deactivate { key: key() }, &coord, &index, &backend)
            .await
            .unwrap();
        let err = open_period(&index, key()).unwrap_err();
        assert!(err.to_string().contains("not open"));
        assert!(known_period(&index, key()).is_ok());

        run(PeriodCommand::Remove { key: key() }, &coord, &index, &backend)
            .await
            .unwrap();
        assert!(known_period(&index, key()).is_err());
    }

    #[tokio::test]
    async fn group_users_cannot_manage_periods() {
        let (_tmp, index, backend) = fixture();
        let user = SessionContext::new("ag3", Role::AuditGroup { group: 3 });
        let err = run(PeriodCommand::List { active: false }, &user, &index, &backend)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("coordinator"));
    }
}
