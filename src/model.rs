use chrono::Local;
use std::path::PathBuf;
use tracing::{debug, trace, warn};

use crate::aggregate::Summary;
use crate::config::LensConfig;
use crate::domain::{HELP_TEXT, LensError, Message};
use crate::export;
use crate::paginate::{Page, total_pages};
use crate::session::Session;

#[derive(Debug, PartialEq)]
pub enum Status {
    EMPTY,
    READY,
    QUITTING,
}

/// Everything the UI needs for one frame, already rendered to strings.
#[derive(Debug, Clone)]
pub struct UIData {
    pub name: String,
    pub summary_lines: Vec<String>,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub page_info: String,
    pub show_popup: bool,
    pub popup_message: String,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            summary_lines: Vec::new(),
            header: Vec::new(),
            rows: Vec::new(),
            page_info: String::new(),
            show_popup: false,
            popup_message: String::new(),
            status_message: String::new(),
        }
    }
}

pub struct Model {
    config: LensConfig,
    session: Session,
    name: String,
    pub status: Status,
    current_page: usize,
    page: Option<Page>,
    show_help: bool,
    uidata: UIData,
    status_message: String,
}

impl Model {
    pub fn init(config: &LensConfig, session: Session, name: impl Into<String>) -> Self {
        let status = if session.is_active() {
            Status::READY
        } else {
            Status::EMPTY
        };
        let mut model = Self {
            config: config.clone(),
            session,
            name: name.into(),
            status,
            current_page: 1,
            page: None,
            show_help: false,
            uidata: UIData::empty(),
            status_message: String::new(),
        };
        model.load_page(1);
        model.set_status_message("Press ? for help");
        model
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), LensError> {
        let Some(msg) = message else {
            return Ok(());
        };
        trace!("Update: {msg:?}");

        match msg {
            Message::Quit => self.quit(),
            Message::Help => self.show_help = !self.show_help,
            Message::Exit => self.show_help = false,
            Message::Resize(width, height) => trace!("UI resized to {width}x{height}"),
            _ if self.show_help => (),
            Message::NextPage => self.load_page(self.current_page + 1),
            Message::PreviousPage => self.load_page(self.current_page.saturating_sub(1)),
            Message::FirstPage => self.load_page(1),
            Message::LastPage => self.load_page(self.last_page()),
            Message::Export => self.export(),
            Message::Close => self.close(),
        }
        self.update_uidata();
        Ok(())
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn last_page(&self) -> usize {
        self.page
            .as_ref()
            .map(|p| p.pagination.total_pages)
            .unwrap_or(1)
            .max(1)
    }

    // Clamps to the available pages, paging past either end is a no-op.
    fn load_page(&mut self, page: usize) {
        let page = match &self.page {
            Some(current) => page.clamp(1, current.pagination.total_pages.max(1)),
            None => page.max(1),
        };
        match self.session.page(page, self.config.page_size) {
            Ok(p) => {
                debug!(
                    "Showing page {}/{}",
                    p.pagination.page, p.pagination.total_pages
                );
                self.current_page = page;
                self.page = Some(p);
            }
            Err(e) => {
                self.page = None;
                self.set_status_message(e.to_string());
            }
        }
        self.update_uidata();
    }

    fn export(&mut self) {
        let result = self.session.export().and_then(|rows| {
            export::save_report(&rows, &self.config.resolved_output_dir(), &Local::now())
        });
        match result {
            Ok(path) => self.set_status_message(format!("Exported {}", display_path(path))),
            Err(e) => {
                warn!("Export failed: {e}");
                self.set_status_message(e.to_string());
            }
        }
    }

    fn close(&mut self) {
        self.session.close();
        self.page = None;
        self.current_page = 1;
        self.status = Status::EMPTY;
        self.set_status_message("Dataset closed, restart with a new file to analyze again");
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    fn update_uidata(&mut self) {
        let (header, rows, page_info) = match &self.page {
            Some(page) => {
                let header: Vec<String> = page
                    .rows
                    .first()
                    .map(|r| r.cells.iter().map(|(name, _)| name.clone()).collect())
                    .or_else(|| {
                        self.session
                            .dataset()
                            .map(|d| d.table.columns().to_vec())
                    })
                    .unwrap_or_default();
                let rows: Vec<Vec<String>> = page
                    .rows
                    .iter()
                    .map(|r| r.cells.iter().map(|(_, v)| v.to_string()).collect())
                    .collect();
                let p = &page.pagination;
                let info = format!(
                    "Page {}/{} | {} rows per page | {} rows",
                    p.page,
                    total_pages(p.total_rows, p.page_size),
                    p.page_size,
                    p.total_rows
                );
                (header, rows, info)
            }
            None => (Vec::new(), Vec::new(), "No dataset".to_string()),
        };

        self.uidata = UIData {
            name: self.name.clone(),
            summary_lines: self
                .session
                .summary()
                .map(summary_lines)
                .unwrap_or_default(),
            header,
            rows,
            page_info,
            show_popup: self.show_help,
            popup_message: HELP_TEXT.to_string(),
            status_message: self.status_message.clone(),
        };
    }
}

fn summary_lines(summary: &Summary) -> Vec<String> {
    let stats = &summary.statistics;
    vec![
        format!(
            "Businesses: {}  Avg rating: {}  Avg reviews: {}  Total reviews: {}",
            stats.total_businesses, stats.avg_rating, stats.avg_reviews, stats.total_reviews
        ),
        format!(
            "Highest rated: {} ({})  Most reviewed: {} ({})",
            summary.highest_rated.name,
            summary.highest_rated.rating,
            summary.most_reviewed.name,
            summary.most_reviewed.review_count
        ),
        format!(
            "Lowest rated: {} ({})",
            summary.lowest_rated.name, summary.lowest_rated.rating
        ),
    ]
}

fn display_path(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}
