use chrono::Local;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use bizlens::aggregate::Summary;
use bizlens::config::{LensConfig, expand_path};
use bizlens::controller::Controller;
use bizlens::domain::LensError;
use bizlens::export;
use bizlens::logging::{self, LogTarget};
use bizlens::model::{Model, Status};
use bizlens::narrative::{FALLBACK_NARRATIVE, GroqClient, narrate_or_fallback};
use bizlens::session::Session;
use bizlens::ui::TableUI;

#[derive(Parser, Debug)]
#[command(name = "bizlens", version, about = "Summarize, page and export business review tables")]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Append log output to this file
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the summary of a table followed by a narrative
    Analyze {
        file: PathBuf,
        /// Print the summary as JSON (no narrative)
        #[arg(long)]
        json: bool,
        /// Skip the narrative request
        #[arg(long)]
        no_narrative: bool,
    },
    /// Print one page of rows as JSON
    Page {
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Write the flattened report as CSV
    Export {
        file: PathBuf,
        /// Directory for the report, defaults to the configured output_dir
        #[arg(short, long)]
        out_dir: Option<String>,
    },
    /// Browse the summary and rows in the terminal
    View { file: PathBuf },
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            eprintln!("Error: {e}");
            if e.is_recoverable() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run() -> Result<(), LensError> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let mut config = LensConfig::load(cli.config.as_deref())?;
    if cli.log_file.is_some() {
        config.log_file = cli.log_file.clone();
    }

    let target = match (&config.log_file, &cli.command) {
        (Some(path), _) => LogTarget::File(path.clone()),
        (None, Command::View { .. }) => LogTarget::Silent,
        (None, _) => LogTarget::Stderr,
    };
    logging::init(&config.log_level, target)?;

    let mut session = Session::new(config.columns.clone());
    match cli.command {
        Command::Analyze {
            file,
            json,
            no_narrative,
        } => {
            let summary = session.load_path(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(summary)?);
                return Ok(());
            }
            print_summary(summary)?;
            if !no_narrative {
                println!("\nInsights:\n{}", narrative(&config, summary));
            }
        }
        Command::Page {
            file,
            page,
            page_size,
        } => {
            session.load_path(&file)?;
            let page = session.page(page, page_size.unwrap_or(config.page_size))?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Command::Export { file, out_dir } => {
            session.load_path(&file)?;
            let rows = session.export()?;
            let dir = out_dir
                .map(|d| expand_path(&d))
                .unwrap_or_else(|| config.resolved_output_dir());
            let path = export::save_report(&rows, &dir, &Local::now())?;
            println!("{}", path.display());
        }
        Command::View { file } => {
            session.load_path(&file)?;
            view(&config, session, &file)?;
        }
    }
    Ok(())
}

// The summary is printed and flushed before the narrative request starts.
fn print_summary(summary: &Summary) -> Result<(), LensError> {
    let mut out = std::io::stdout().lock();
    for row in export::flatten(summary) {
        writeln!(out, "{:<16} {:<32} {}", row.section, row.label, row.value)?;
    }
    if !summary.categories.is_empty() {
        writeln!(out, "\nCategories:")?;
        for c in summary.categories.iter() {
            writeln!(out, "  {:<30} {}", c.category, c.count)?;
        }
    }
    writeln!(out, "\nRating distribution:")?;
    for bucket in summary.rating_distribution.iter() {
        writeln!(out, "  {:<6} {}", bucket.rating, bucket.count)?;
    }
    out.flush()?;
    Ok(())
}

fn narrative(config: &LensConfig, summary: &Summary) -> String {
    match GroqClient::from_config(&config.narrative) {
        Ok(client) => narrate_or_fallback(&client, summary),
        Err(e) => {
            warn!("Narrative unavailable: {e}");
            FALLBACK_NARRATIVE.to_string()
        }
    }
}

fn view(config: &LensConfig, session: Session, file: &Path) -> Result<(), LensError> {
    let name = file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("???")
        .to_string();
    let mut model = Model::init(config, session, name);
    let mut ui = TableUI::new();
    let controller = Controller::new(config.event_poll_time);

    info!("Starting viewer");
    let mut terminal = ratatui::init();
    let result = (|| -> Result<(), LensError> {
        while model.status != Status::QUITTING {
            // Render the current view
            terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

            // Handle events and map to a Message
            if let Some(message) = controller.handle_event(&model)? {
                model.update(Some(message))?;
            };
        }
        Ok(())
    })();
    ratatui::restore();
    result
}
