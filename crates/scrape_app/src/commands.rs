use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use scrape_core::{
    extraction_from_value, resolve_environment, EnvironmentConfig, EnvironmentSignals, Phase,
    PreviewData, Record, RetryTarget, WorkflowError, WorkflowView,
};
use scrape_engine::{
    cell_text, export_records, ClientSettings, ExportFormat, ReqwestApiClient, RuntimeSettings,
    ScrapeResults, ScraperHandle,
};
use scrape_logging::{scrape_debug, scrape_error, scrape_info};
use serde_json::Value;
use tokio::sync::watch;

use crate::cli::{Cli, Command, FormatArg, RunArgs, SubmitArgs, Toggle};
use crate::render::{render_preview, render_progress, render_table};
use crate::settings::{load_settings, save_settings};

const MODE_ENV: &str = "SCRAPE_MODE";
/// Time given to the fire-and-forget cancel request before the runtime exits.
const DECISION_GRACE: Duration = Duration::from_millis(500);

pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let environment = environment_for(&cli);
    scrape_info!(
        "environment {:?} api={} mock={}",
        environment.kind,
        environment.api_base_url,
        environment.use_mock_data
    );
    match cli.command {
        Command::Run(args) => run(&environment, args).await,
        Command::Submit(args) => submit(&environment, args).await,
        Command::Status { job_id } => status(&environment, &job_id).await,
        Command::Results { job_id } => results(&environment, &job_id).await,
        Command::Urls => urls(&environment).await,
        Command::LocalMode { action } => local_mode(&cli.settings_dir, action),
    }
}

fn environment_for(cli: &Cli) -> EnvironmentConfig {
    let settings = load_settings(&cli.settings_dir);
    resolve_environment(&EnvironmentSignals {
        origin: cli.origin.clone(),
        mode_param: cli.mode.clone(),
        mode_env: std::env::var(MODE_ENV).ok(),
        persisted_local_mode: settings.local_mode,
        api_url_override: cli.api_url.clone(),
    })
}

fn client(environment: &EnvironmentConfig) -> anyhow::Result<ReqwestApiClient> {
    ReqwestApiClient::new(ClientSettings::new(&environment.api_base_url))
        .with_context(|| format!("cannot use API base {}", environment.api_base_url))
}

async fn run(environment: &EnvironmentConfig, args: RunArgs) -> anyhow::Result<()> {
    let settings = RuntimeSettings::default();
    let api = Arc::new(client(environment)?);
    let handle = ScraperHandle::spawn(api, settings.clone(), environment.use_mock_data);
    if environment.use_mock_data {
        eprintln!("Using mock data (development origin).");
    }

    handle.handle_form_submit(args.target.to_request());
    let preview = await_preview(&handle, settings.preview_timeout * 2).await?;
    print!("{}", render_preview(&preview));

    if !(args.yes || confirm("Approve scraping?").await?) {
        handle.cancel_preview();
        handle.wait_for(|view| view.phase == Phase::Idle).await;
        tokio::time::sleep(DECISION_GRACE).await;
        handle.shutdown();
        println!("Preview cancelled.");
        return Ok(());
    }

    let mut views = handle.subscribe();
    handle.start_scraping(preview.resume_link.clone().unwrap_or_default());
    let view = loop {
        let err = match await_results(&mut views).await {
            Ok(view) => break view,
            Err(err) => err,
        };
        let retryable = err.retry_target() == RetryTarget::RestartScraping && !args.yes;
        if retryable && confirm(&format!("{err} Retry?")).await? {
            handle.retry();
            // Skip the failed view still held by the receiver.
            let _ = views.changed().await;
            continue;
        }
        scrape_error!("scrape run failed: {:?}", err);
        handle.shutdown();
        bail!("{err}");
    };
    handle.shutdown();

    let records = view.extracted.unwrap_or_default();
    print!("{}", render_table(&records));
    if let Some(origin_url) = &view.origin_url {
        println!("origin: {origin_url}");
    }
    if let Some(path) = &args.export {
        export(path, args.format, &records, view.origin_url.as_deref())?;
    }
    Ok(())
}

/// Waits for the preview, echoing advisories. The stream stays open after the
/// preview timeout, so waiting continues until `ceiling`.
async fn await_preview(handle: &ScraperHandle, ceiling: Duration) -> anyhow::Result<PreviewData> {
    let mut views = handle.subscribe();
    let wait = async {
        let mut reported: Option<WorkflowError> = None;
        loop {
            let view = views.borrow_and_update().clone();
            if let Some(err) = &view.error {
                if reported.as_ref() != Some(err) {
                    eprintln!("{err}");
                    reported = Some(err.clone());
                }
            }
            if view.phase == Phase::PreviewReady {
                if let Some(preview) = view.preview {
                    return Ok(preview);
                }
            }
            if views.changed().await.is_err() {
                bail!("workflow stopped before a preview arrived");
            }
        }
    };
    tokio::time::timeout(ceiling, wait)
        .await
        .map_err(|_| anyhow!("no preview after {:?}", ceiling))?
}

/// Shows progress until the run completes or fails.
async fn await_results(
    views: &mut watch::Receiver<WorkflowView>,
) -> Result<WorkflowView, WorkflowError> {
    let mut shown: Option<u8> = None;
    loop {
        let view = views.borrow_and_update().clone();
        if view.scraping && shown != Some(view.progress) {
            eprint!("\r{}", render_progress(view.progress));
            let _ = io::stderr().flush();
            shown = Some(view.progress);
        }
        if view.phase == Phase::ScrapeComplete {
            eprintln!("\r{}", render_progress(100));
            return Ok(view);
        }
        if let Some(err) = view.error.filter(WorkflowError::is_fatal) {
            if shown.is_some() {
                eprintln!();
            }
            return Err(err);
        }
        if views.changed().await.is_err() {
            return Err(WorkflowError::fatal(
                scrape_core::ErrorKind::Network,
                scrape_core::WorkflowStage::Extraction,
                "workflow stopped before results arrived",
            ));
        }
    }
}

async fn confirm(prompt: &str) -> anyhow::Result<bool> {
    let prompt = prompt.to_string();
    let answer = tokio::task::spawn_blocking(move || -> io::Result<bool> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt} [y/N] ")?;
        stdout.flush()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        Ok(matches!(
            line.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    })
    .await??;
    Ok(answer)
}

fn export(
    path: &Path,
    format: Option<FormatArg>,
    records: &[Record],
    origin_url: Option<&str>,
) -> anyhow::Result<()> {
    let format = format
        .map(ExportFormat::from)
        .or_else(|| ExportFormat::from_path(path))
        .unwrap_or(ExportFormat::Csv);
    let summary = export_records(path, format, records, origin_url)
        .with_context(|| format!("export to {} failed", path.display()))?;
    println!(
        "Exported {} rows x {} columns to {}",
        summary.row_count,
        summary.column_count,
        summary.output_path.display()
    );
    Ok(())
}

async fn submit(environment: &EnvironmentConfig, args: SubmitArgs) -> anyhow::Result<()> {
    let api = client(environment)?;
    let ticket = api.submit_scrape_request(&args.target.to_request()).await?;
    println!("job {}", ticket.job_id);
    if !args.wait {
        return Ok(());
    }

    let status = api
        .wait_for_job(
            &ticket.job_id,
            Duration::from_millis(args.poll_interval_ms),
            Duration::from_secs(args.wait_ceiling_secs),
        )
        .await?;
    scrape_debug!("job {} settled as {}", ticket.job_id, status.status);
    if status.is_failed() {
        bail!(
            "job {} {}: {}",
            ticket.job_id,
            status.status,
            status.message.unwrap_or_default()
        );
    }
    let results = api.get_scrape_results(&ticket.job_id).await?;
    print_results(results);
    Ok(())
}

async fn status(environment: &EnvironmentConfig, job_id: &str) -> anyhow::Result<()> {
    let status = client(environment)?.get_scrape_status(job_id).await?;
    let mut line = format!("{job_id}: {}", status.status);
    if let Some(progress) = status.progress {
        line.push_str(&format!(" {progress:.0}%"));
    }
    if let Some(message) = status.message.filter(|m| !m.is_empty()) {
        line.push_str(&format!(" ({message})"));
    }
    println!("{line}");
    Ok(())
}

async fn results(environment: &EnvironmentConfig, job_id: &str) -> anyhow::Result<()> {
    let results = client(environment)?.get_scrape_results(job_id).await?;
    print_results(results);
    Ok(())
}

fn print_results(results: ScrapeResults) {
    println!(
        "job {} target={} url={} at {}",
        results.job_id, results.target, results.url, results.timestamp
    );
    let outcome = extraction_from_value(&Value::Array(results.data));
    print!("{}", render_table(&outcome.records));
}

async fn urls(environment: &EnvironmentConfig) -> anyhow::Result<()> {
    let list = client(environment)?.get_url_list().await?;
    if list.data.is_empty() {
        println!("(no urls)");
    }
    for entry in &list.data {
        println!("{}\t{}", cell_text(&entry.id), entry.origin_url);
    }
    Ok(())
}

fn local_mode(settings_dir: &Path, action: Toggle) -> anyhow::Result<()> {
    let mut settings = load_settings(settings_dir);
    match action {
        Toggle::Show => {}
        Toggle::On | Toggle::Off => {
            settings.local_mode = action == Toggle::On;
            save_settings(settings_dir, &settings)?;
        }
    }
    println!(
        "local mode is {}",
        if settings.local_mode { "on" } else { "off" }
    );
    Ok(())
}
