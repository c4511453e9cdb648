mod backend;
mod display;
mod extract;
mod period;
mod staged;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand};
use darflow_core::{Credentials, PeriodKey, SessionContext, Settings, SheetRow, summarize};
use darflow_store::{PeriodIndexStore, delete_dar, delete_group_rows, submit_rows};
use tracing::{Level, info, warn};

use crate::backend::Backend;
use crate::period::PeriodCommand;
use crate::staged::StagedUpload;

#[derive(Parser)]
#[command(name = "darflow", version, about = "Extract, review and file GST Draft Audit Reports")]
struct Cli {
    /// JSON settings file
    #[arg(long, global = true, env = "DARFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, short, global = true, env = "DARFLOW_USER")]
    user: Option<String>,

    #[arg(long, global = true, env = "DARFLOW_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Generative model API key
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_key: Option<String>,

    /// OAuth access token with Drive and Sheets scopes
    #[arg(long, global = true, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    google_token: Option<String>,

    /// Use the local DuckDB mirror and a local folder tree instead of Google
    #[arg(long, global = true)]
    local: bool,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract rows from a DAR PDF and stage them for review
    Extract {
        pdf: PathBuf,
        /// MCM period as YYYY-MM
        #[arg(long)]
        period: PeriodKey,
        /// Write the staged rows here for editing (default: under the data directory)
        #[arg(long, short)]
        out: Option<PathBuf>,
        /// Submit straight away if validation passes
        #[arg(long)]
        submit: bool,
        /// Print every row as a table after the card
        #[arg(long)]
        table: bool,
    },
    /// Check a staged file against the submission rules
    Validate { staged: PathBuf },
    /// Validate a staged file and append its rows to the period sheet
    Submit { staged: PathBuf },
    /// Delete submitted rows from a period sheet
    Delete {
        #[arg(long)]
        period: PeriodKey,
        /// Only rows of this DAR
        #[arg(long)]
        url: Option<String>,
        /// Only rows of this audit group (coordinator only)
        #[arg(long)]
        group: Option<u32>,
    },
    /// Per-group totals for a period
    Summary {
        #[arg(long)]
        period: PeriodKey,
        /// Also print the rows
        #[arg(long)]
        rows: bool,
    },
    /// Manage MCM periods
    Period {
        #[command(subcommand)]
        cmd: PeriodCommand,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn login(settings: &Settings, user: Option<&str>, password: Option<&str>) -> anyhow::Result<SessionContext> {
    let (Some(user), Some(password)) = (user, password) else {
        bail!("--user and --password (or DARFLOW_USER / DARFLOW_PASSWORD) are required");
    };
    let path = settings.credentials_path();
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("reading credentials {}", path.display()))?;
    let creds = Credentials::from_json(&json)?;
    Ok(creds.login(user, password)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    info!("darflow v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(cli.config.as_deref())?;
    let mut session = login(&settings, cli.user.as_deref(), cli.password.as_deref())?;
    let index = PeriodIndexStore::new(settings.period_index_path());
    let open_backend = || Backend::open(&settings, cli.local, cli.google_token.clone());

    match cli.command {
        Command::Extract {
            pdf,
            period,
            out,
            submit,
            table,
        } => {
            let opts = ExtractOpts {
                pdf: &pdf,
                key: period,
                out: out.as_deref(),
                submit,
                table,
            };
            let backend = open_backend()?;
            cmd_extract(&settings, cli.gemini_key, &mut session, &index, &backend, opts).await?;
        }
        Command::Validate { staged } => {
            StagedUpload::load(&staged)?.stage_into(&mut session)?;
            let errors = session.validate_pending().unwrap_or_default();
            display::print_validation(errors);
            if !errors.is_empty() {
                bail!("{} validation issue(s)", errors.len());
            }
        }
        Command::Submit { staged } => {
            StagedUpload::load(&staged)?.stage_into(&mut session)?;
            submit_pending(&mut session, &index, &open_backend()?).await?;
        }
        Command::Delete { period, url, group } => {
            cmd_delete(&session, &index, &open_backend()?, period, url.as_deref(), group).await?;
        }
        Command::Summary { period, rows } => {
            cmd_summary(&session, &index, &open_backend()?, period, rows).await?;
        }
        Command::Period { cmd } => period::run(cmd, &session, &index, &open_backend()?).await?,
    }

    session.logout();
    Ok(())
}

struct ExtractOpts<'a> {
    pdf: &'a Path,
    key: PeriodKey,
    out: Option<&'a Path>,
    submit: bool,
    table: bool,
}

async fn cmd_extract(
    settings: &Settings,
    api_key: Option<String>,
    session: &mut SessionContext,
    index: &PeriodIndexStore,
    backend: &Backend,
    opts: ExtractOpts<'_>,
) -> anyhow::Result<()> {
    let period = period::open_period(index, opts.key)?;
    let data = std::fs::read(opts.pdf)
        .with_context(|| format!("reading {}", opts.pdf.display()))?;

    let controller = extract::gemini_controller(settings, api_key);
    eprintln!("Extracting {} ...", opts.pdf.display());
    let extracted = extract::extract_pdf(&controller, opts.pdf).await?;
    eprintln!(
        "  {} attempt(s), {} row(s), {:.1}s",
        extracted.outcome.attempts,
        extracted.rows.len(),
        extracted.elapsed_secs
    );
    if let Some(err) = extracted.error() {
        eprintln!("  Extraction reported: {err}");
    }
    if extracted.rows.is_empty() {
        bail!("no rows extracted from {}", opts.pdf.display());
    }

    let file_name = opts
        .pdf
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dar.pdf");
    let url = backend.store_pdf(&period, file_name, data).await?;
    session.stage(opts.key, &url, extracted.rows);

    if let Some(pending) = session.pending() {
        let stamped: Vec<SheetRow> = pending
            .rows
            .iter()
            .map(|r| SheetRow {
                row: r.clone(),
                dar_pdf_url: url.clone(),
                created_at: String::new(),
            })
            .collect();
        display::print_dar_card(&stamped)?;
        if opts.table {
            display::print_rows_table(&stamped)?;
        }
        let out = opts.out.map_or_else(
            || staged::default_path(&settings.data_dir, opts.key, opts.pdf),
            Path::to_path_buf,
        );
        StagedUpload::from_pending(pending).save(&out)?;
        eprintln!(
            "Staged rows written to {}; edit them and run `darflow submit {}`",
            out.display(),
            out.display()
        );
    }

    let errors = session.validate_pending().unwrap_or_default();
    println!();
    display::print_validation(errors);

    if opts.submit {
        submit_pending(session, index, backend).await?;
    }
    Ok(())
}

async fn submit_pending(
    session: &mut SessionContext,
    index: &PeriodIndexStore,
    backend: &Backend,
) -> anyhow::Result<()> {
    if let Some(errors) = session.validate_pending()
        && !errors.is_empty()
    {
        display::print_validation(errors);
        bail!("fix the validation errors before submitting");
    }
    let Some(upload) = session.take_ready() else {
        bail!("nothing staged to submit");
    };
    let period = period::open_period(index, upload.period)?;
    let report = submit_rows(
        backend.sheets(),
        &period.spreadsheet_id,
        &upload.dar_pdf_url,
        upload.rows,
        &chrono::Local::now(),
    )
    .await?;
    println!(
        "Submitted {} row(s) to {} ({}).",
        report.appended, upload.period, period.spreadsheet_url
    );
    Ok(())
}

async fn cmd_delete(
    session: &SessionContext,
    index: &PeriodIndexStore,
    backend: &Backend,
    key: PeriodKey,
    url: Option<&str>,
    group: Option<u32>,
) -> anyhow::Result<()> {
    let period = period::known_period(index, key)?;
    let sheet = period.spreadsheet_id.as_str();
    let store = backend.sheets();

    let removed = match (session.group(), group, url) {
        (Some(own), Some(asked), _) if own != asked => {
            bail!("audit group {own} cannot delete rows of group {asked}");
        }
        (Some(own), _, url) => delete_group_rows(store, sheet, own, url).await?,
        (None, Some(group), url) => delete_group_rows(store, sheet, group, url).await?,
        (None, None, Some(url)) => delete_dar(store, sheet, url).await?,
        (None, None, None) => bail!("give --url or --group to choose rows to delete"),
    };
    if removed == 0 {
        warn!(period = %key, "no rows matched");
    }
    println!("Deleted {removed} row(s) from {key}.");
    Ok(())
}

async fn cmd_summary(
    session: &SessionContext,
    index: &PeriodIndexStore,
    backend: &Backend,
    key: PeriodKey,
    show_rows: bool,
) -> anyhow::Result<()> {
    let period = period::known_period(index, key)?;
    let mut rows = backend.sheets().read_rows(&period.spreadsheet_id).await?;
    if let Some(own) = session.group() {
        rows.retain(|r| r.row.audit_group_number == Some(own));
    }
    println!("{} {} ({} row(s))", period.month_name, period.year, rows.len());
    display::print_summary(&summarize(&rows));
    if show_rows && !rows.is_empty() {
        display::print_rows_table(&rows)?;
    }
    Ok(())
}
