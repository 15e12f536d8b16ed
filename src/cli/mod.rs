//! Command-line interface for casetrack.
//!
//! Provides commands for creating and listing cases, uploading evidence,
//! and following its analysis until the backend finishes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{CaseRepository, HttpCaseRepository};
use crate::config::{self, ResolvedConfig};
use crate::core::{CaseSession, SessionUpdate};
use crate::domain::{CaseId, EvidenceId, EvidenceStatus, EvidenceUpload};

pub mod evidence;

use evidence::{case_row, state_label, CaseReport, EvidenceReport};

/// casetrack - Legal case and evidence analysis client
#[derive(Parser, Debug)]
#[command(name = "casetrack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL (overrides config file and environment)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all cases
    Cases,

    /// Create a new case
    Create {
        /// Case title
        title: String,

        /// Preliminary summary of the facts
        #[arg(short, long, default_value = "")]
        summary: String,
    },

    /// Show a case with its evidence and analysis
    Show {
        /// Case ID
        case_id: String,
    },

    /// Upload an evidence file and follow its analysis
    Upload {
        /// Case ID
        case_id: String,

        /// File to upload
        file: PathBuf,

        /// Return right after the upload instead of following processing
        #[arg(short, long)]
        detach: bool,
    },

    /// Follow an evidence item that is still being processed
    Watch {
        /// Case ID
        case_id: String,

        /// Evidence ID (defaults to the newest item still in progress)
        evidence_id: Option<String>,
    },

    /// Fetch the processing state of an evidence item once
    Status {
        /// Evidence ID
        evidence_id: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = config::config()?.clone().with_api_url(self.api_url);

        match self.command {
            Commands::Cases => list_cases(&config).await,
            Commands::Create { title, summary } => create_case(&config, &title, &summary).await,
            Commands::Show { case_id } => show_case(&config, &case_id).await,
            Commands::Upload {
                case_id,
                file,
                detach,
            } => upload_evidence(&config, &case_id, file, detach).await,
            Commands::Watch {
                case_id,
                evidence_id,
            } => watch_evidence(&config, &case_id, evidence_id.as_deref()).await,
            Commands::Status { evidence_id } => show_status(&config, &evidence_id).await,
            Commands::Config => show_config(&config),
        }
    }
}

fn repository(config: &ResolvedConfig) -> Arc<dyn CaseRepository> {
    Arc::new(HttpCaseRepository::new(config.api_base_url.clone()))
}

fn session(config: &ResolvedConfig) -> CaseSession {
    CaseSession::new(repository(config), config.poll)
}

fn log_completion(status: &EvidenceStatus) {
    tracing::info!("Analysis finished: {}", status.state);
}

/// List cases
async fn list_cases(config: &ResolvedConfig) -> Result<()> {
    let mut session = session(config);
    session.refresh().await.context("Failed to load cases")?;

    if session.cases().is_empty() {
        println!("No cases found");
        return Ok(());
    }

    println!("{:<38} {:<40} {:>3}", "CASE ID", "TITLE", "EV");
    println!("{}", "-".repeat(83));

    for case in session.cases() {
        println!("{}", case_row(case));
    }

    Ok(())
}

/// Create a case
async fn create_case(config: &ResolvedConfig, title: &str, summary: &str) -> Result<()> {
    let mut session = session(config);
    let case = session
        .create_case(title, summary)
        .await
        .context("Failed to create case")?;

    println!("{}", case.id);
    eprintln!("[Case '{}' created]", case.title);

    Ok(())
}

/// Show case detail
async fn show_case(config: &ResolvedConfig, case_id: &str) -> Result<()> {
    let case = repository(config)
        .fetch_case(&CaseId::new(case_id))
        .await
        .with_context(|| format!("Failed to load case {}", case_id))?;

    print!("{}", CaseReport(&case));

    Ok(())
}

/// Select the case, or fail if the backend doesn't know it
async fn open_case(session: &mut CaseSession, case_id: &str) -> Result<()> {
    session
        .select(CaseId::new(case_id))
        .await
        .context("Failed to load cases")?;

    if session.selected_case().is_none() {
        anyhow::bail!("Case '{}' not found", case_id);
    }

    Ok(())
}

/// Upload evidence and (unless detached) follow it
async fn upload_evidence(
    config: &ResolvedConfig,
    case_id: &str,
    file: PathBuf,
    detach: bool,
) -> Result<()> {
    let mut session = session(config);
    open_case(&mut session, case_id).await?;

    let upload = EvidenceUpload::from_path(&file).await?;
    let updated = session
        .upload_evidence(upload, log_completion)
        .await
        .with_context(|| format!("Failed to upload {}", file.display()))?;

    if let Some(newest) = updated.latest_evidence() {
        println!("{}", newest.id);
        eprintln!("[{} uploaded: {}]", newest.file_name, state_label(newest.state()));
    }

    if detach || !session.is_processing() {
        return Ok(());
    }

    follow(&mut session).await
}

/// Resume following an evidence item
async fn watch_evidence(
    config: &ResolvedConfig,
    case_id: &str,
    evidence_id: Option<&str>,
) -> Result<()> {
    let mut session = session(config);
    open_case(&mut session, case_id).await?;

    let evidence_id = match evidence_id {
        Some(id) => EvidenceId::new(id),
        None => {
            let pending = session
                .selected_case()
                .and_then(|case| case.pending_evidence().last())
                .map(|evidence| evidence.id.clone());

            match pending {
                Some(id) => id,
                None => {
                    eprintln!("[No evidence in progress for case {}]", case_id);
                    return Ok(());
                }
            }
        }
    };
    if session
        .track_evidence(evidence_id.clone(), log_completion)?
        .is_none()
    {
        if let Some(evidence) = session
            .selected_case()
            .and_then(|case| case.find_evidence(&evidence_id))
        {
            print!("{}", EvidenceReport(evidence));
        }
        return Ok(());
    }

    follow(&mut session).await
}

/// Print poll progress until the tracked evidence finishes or Ctrl-C
async fn follow(session: &mut CaseSession) -> Result<()> {
    let Some(tracked) = session.tracking().cloned() else {
        return Ok(());
    };

    eprintln!(
        "[Following {} every {:?}; Ctrl-C to stop]",
        tracked.evidence_id,
        session.poll_settings().interval
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let interrupted = loop {
        let update = tokio::select! {
            update = session.next_update() => update,
            _ = &mut ctrl_c => break true,
        };

        match update {
            Some(SessionUpdate::Progress { attempt, state, .. }) => {
                eprintln!("[poll {}] {}", attempt, state_label(&state));
            }
            Some(SessionUpdate::Finished {
                status, refreshed, ..
            }) => {
                eprintln!("[finished] {}", state_label(&status.state));
                if !refreshed {
                    eprintln!("[warning] case list could not be refreshed");
                }
                break false;
            }
            None => break false,
        }
    };

    if interrupted {
        session.close();
        eprintln!("\n[Stopped following {}]", tracked.evidence_id);
        return Ok(());
    }

    if let Some(evidence) = session
        .selected_case()
        .and_then(|case| case.find_evidence(&tracked.evidence_id))
    {
        print!("{}", EvidenceReport(evidence));
    }

    Ok(())
}

/// One-shot status fetch
async fn show_status(config: &ResolvedConfig, evidence_id: &str) -> Result<()> {
    let status = repository(config)
        .fetch_evidence_status(&EvidenceId::new(evidence_id))
        .await;

    println!("State: {}", state_label(&status.state));
    if status.results().is_some() {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("Failed to format status")?
        );
    }

    Ok(())
}

/// Show resolved configuration
fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!("casetrack configuration");
    println!();
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!("API base URL:  {}", config.api_base_url);
    println!("Poll interval: {:?}", config.poll.interval);
    println!(
        "Max polls:     {}",
        config
            .poll
            .max_attempts
            .map(|max| max.to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    );

    Ok(())
}
