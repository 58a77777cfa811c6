mod bootstrap;

use anyhow::{bail, Result};
use clap::Parser;
use dashboard_core::settings::{Command, Settings};
use dashboard_data::analysis::load_snapshot;
use dashboard_data::reader::save_merged_snapshot;
use dashboard_runtime::data_manager::LoadOptions;
use dashboard_runtime::session::SessionRegistry;
use dashboard_ui::app::{serve, AppState};
use dashboard_ui::page::PageRenderer;
use dashboard_ui::themes::Theme;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse().resolve();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;
    settings.validate()?;

    tracing::info!("TikTok Dashboard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Data: {}, Timezone: {}, Date format: {}",
        settings.data_dir.display(),
        settings.timezone,
        settings.date_format
    );

    let paths = settings.data_paths();
    let date_format = settings.parsed_date_format()?;
    let timezone = settings.timezone_handler();

    match settings.effective_command() {
        Command::Serve => {
            let mappings_path = settings.mappings_path();
            if settings.mappings.is_none() && bootstrap::ensure_mappings(&mappings_path)? {
                tracing::info!("Wrote default mappings to {}", mappings_path.display());
            }

            let options = LoadOptions::new(paths, date_format, timezone)
                .with_snapshot_out(settings.snapshot_out.clone());
            let state = AppState::new(
                SessionRegistry::new(options).with_idle_timeout(settings.session_idle_timeout()),
                settings.load_mappings(),
                PageRenderer::new()?,
                Theme::from_name(&settings.theme),
                &settings.timezone,
            );

            let addr = settings.bind_address();
            tokio::select! {
                result = serve(state, &addr) => {
                    result?;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received; shutting down");
                }
            }
        }

        Command::Import {
            metrics,
            clicks,
            accounts,
        } => {
            let today = chrono::Local::now().date_naive();
            let copied = bootstrap::import_inputs(
                &paths,
                today,
                metrics.as_deref(),
                clicks.as_deref(),
                accounts.as_deref(),
            )?;
            for (from, to) in &copied {
                println!("{} -> {}", from.display(), to.display());
            }
        }

        Command::Snapshot { out } => {
            let snapshot = tokio::task::spawn_blocking(move || {
                load_snapshot(&paths, &date_format, &timezone)
            })
            .await?;

            let merged = match &snapshot.merged {
                Ok(table) => table,
                Err(issue) => bail!("cannot build snapshot: {issue}"),
            };
            save_merged_snapshot(&merged.records, &out)?;
            println!(
                "Wrote {} rows to {} ({} matched, {} unmatched)",
                merged.records.len(),
                out.display(),
                merged.stats.matched,
                merged.stats.unmatched
            );
        }
    }

    Ok(())
}
