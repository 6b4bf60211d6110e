//! Orgload CLI - import education-NGO Excel data into Strapi
//!
//! ```bash
//! orgload                      # Import using env configuration
//! orgload --dry-run            # Transform and report, no remote writes
//! orgload --file data.xlsx --max-rows 50
//! ```
//!
//! Configuration comes from the environment (see `config`); the flags
//! below override it per invocation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use orgload::import::print_stats;
use orgload::logs::{log_info, log_success};
use orgload::{
    read_excel_file, transform_row, Config, ImportLogger, ImportRecord, ImportResult, Importer,
    StrapiClient,
};

/// How many transformed records a dry run prints in full.
const DRY_RUN_SAMPLE: usize = 3;

#[derive(Parser)]
#[command(name = "orgload")]
#[command(about = "Import education-NGO Excel data into Strapi", long_about = None)]
struct Cli {
    /// Input Excel file (overrides EXCEL_FILE)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Worksheet name (overrides SHEET_NAME; default: first sheet)
    #[arg(short, long)]
    sheet: Option<String>,

    /// Transform and report without touching the server
    #[arg(short, long)]
    dry_run: bool,

    /// Import at most this many rows (0 = all; overrides MAX_ROWS)
    #[arg(long)]
    max_rows: Option<usize>,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> ImportResult<()> {
    let mut config = Config::from_env()?;
    if let Some(file) = cli.file {
        config.excel_file = file;
    }
    if let Some(sheet) = cli.sheet {
        config.sheet_name = Some(sheet);
    }
    if let Some(max_rows) = cli.max_rows {
        config.max_rows = max_rows;
    }
    config.dry_run = config.dry_run || cli.dry_run;
    config.validate()?;

    let rows = read_excel_file(&config.excel_file, config.sheet_name.as_deref())?;
    let rows = if config.max_rows > 0 && rows.len() > config.max_rows {
        log_info(format!("限制导入行数: {}", config.max_rows));
        &rows[..config.max_rows]
    } else {
        &rows[..]
    };

    log_info(format!("转换 {} 行数据...", rows.len()));
    let records: Vec<ImportRecord> = rows.iter().map(transform_row).collect();

    if config.dry_run {
        println!();
        println!("=== DRY RUN 模式 ===");
        for record in records.iter().take(DRY_RUN_SAMPLE) {
            match serde_json::to_string_pretty(&record.organization) {
                Ok(json) => println!("{json}"),
                Err(e) => log_info(format!("无法序列化记录: {e}")),
            }
        }
        if records.len() > DRY_RUN_SAMPLE {
            println!("... 以及另外 {} 条记录", records.len() - DRY_RUN_SAMPLE);
        }
        println!();
    }

    let client = StrapiClient::new(&config.strapi_url, &config.strapi_token);
    let logger = Arc::new(ImportLogger::new()?);
    let importer = Arc::new(Importer::new(client, Arc::clone(&logger), &config));

    spawn_signal_handler(Arc::clone(&importer), Arc::clone(&logger));

    let stats = importer.run(&records).await;

    print_stats(&stats);
    logger.finalize();
    log_success("导入完成");

    Ok(())
}

/// Flush the audit log and print the summary before dying on
/// Ctrl-C / SIGTERM / SIGQUIT, so an interrupted run still leaves a
/// complete record behind.
fn spawn_signal_handler(importer: Arc<Importer>, logger: Arc<ImportLogger>) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        println!();
        log_info("收到中断信号，正在保存日志...");
        print_stats(&importer.stats());
        logger.finalize();
        std::process::exit(0);
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(_) => return std::future::pending().await,
    };
    let mut quit = match signal(SignalKind::quit()) {
        Ok(s) => s,
        Err(_) => return std::future::pending().await,
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
        _ = quit.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
