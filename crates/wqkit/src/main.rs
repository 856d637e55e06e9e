use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use wqkit::config::{C_ENV_EXPORT_PATH, C_ENV_STORE_PATH};
use wqkit::{Config, ExportError, export_store_to_xlsx, import_xlsx, load_store, render_summary, save_store};
use wqkit_record::{EnumSheetOrder, EnumSite};

#[derive(Parser)]
#[command(name = "wqkit")]
#[command(about = "Record daily water-quality measurements and export monthly pivot sheets", long_about = None)]
struct Cli {
    /// Store snapshot file
    #[arg(long, global = true, env = C_ENV_STORE_PATH)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert or replace one day's measurement
    Submit {
        #[arg(long)]
        site: EnumSite,
        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        ph: f64,
        /// Temperature in °C
        #[arg(long)]
        temperature: Option<f64>,
        /// Flow in L/s
        #[arg(long)]
        flow: f64,
    },
    /// Submit every row of a flat input workbook
    Import {
        #[arg(long)]
        input: PathBuf,
    },
    /// Write the pivot workbook
    Export {
        #[arg(long, env = C_ENV_EXPORT_PATH)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = EnumOrderArg::SiteMonth)]
        order: EnumOrderArg,
    },
    /// List monthly aggregates
    Summary {
        #[arg(long)]
        site: Option<EnumSite>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EnumOrderArg {
    SiteMonth,
    MonthSite,
}

impl From<EnumOrderArg> for EnumSheetOrder {
    fn from(value: EnumOrderArg) -> Self {
        match value {
            EnumOrderArg::SiteMonth => EnumSheetOrder::SiteThenMonth,
            EnumOrderArg::MonthSite => EnumSheetOrder::MonthThenSite,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wqkit=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env();
    let path_store = cli.store.unwrap_or_else(|| config.store_path.clone());
    let store = load_store(&path_store)?;

    match cli.command {
        Command::Submit {
            site,
            date,
            ph,
            temperature,
            flow,
        } => {
            let outcome = store.upsert_measurement(site, date, ph, temperature, flow)?;
            save_store(&store, &path_store)?;
            info!("{} {}: {:?}", site, date, outcome);
        }
        Command::Import { input } => {
            let report = import_xlsx(&store, &input)?;
            save_store(&store, &path_store)?;
            println!(
                "{} row(s) read: {} inserted, {} replaced, {} rejected",
                report.n_rows_read,
                report.n_inserted,
                report.n_replaced,
                report.rejections.len()
            );
            for rejection in &report.rejections {
                println!("  row {}: {}", rejection.row_num, rejection.reason);
            }
        }
        Command::Export { output, order } => {
            let path_out = output.unwrap_or_else(|| config.export_path.clone());
            match export_store_to_xlsx(&store, &path_out, &config.font_name, order.into()) {
                Ok(report) => {
                    println!(
                        "Wrote {} sheet(s) to {}",
                        report.sheet_names.len(),
                        report.path.display()
                    );
                    for failure in &report.failures {
                        println!("  skipped: {failure}");
                    }
                }
                Err(ExportError::EmptyWorkbook) => {
                    warn!("Store {} has no measurements; nothing exported", path_store.display());
                }
                Err(ExportError::AllSitesFailed(l_failures)) => {
                    for failure in &l_failures {
                        println!("  skipped: {failure}");
                    }
                    return Err(ExportError::AllSitesFailed(l_failures).into());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::Summary { site } => {
            for c_line in render_summary(&store, site) {
                println!("{c_line}");
            }
        }
    }

    Ok(())
}
