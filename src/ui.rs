use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Style, Stylize},
    symbols::border,
    text::{Line, Text},
    widgets::{Block, Clear, Paragraph, Row, Table},
};

use crate::model::UIData;

pub const SUMMARY_HEIGHT: u16 = 5;
pub const STATUSLINE_HEIGHT: u16 = 1;
const POPUP_WIDTH: u16 = 44;
const POPUP_HEIGHT: u16 = 12;

#[derive(Debug, Default)]
pub struct TableUI;

impl TableUI {
    pub fn new() -> Self {
        Self
    }

    pub fn draw(&mut self, uidata: &UIData, frame: &mut Frame) {
        let [summary_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(SUMMARY_HEIGHT),
            Constraint::Min(3),
            Constraint::Length(STATUSLINE_HEIGHT),
        ])
        .areas(frame.area());

        self.render_summary(uidata, frame, summary_area);
        self.render_table(uidata, frame, table_area);
        self.render_statusline(uidata, frame, status_area);

        if uidata.show_popup {
            self.render_popup(uidata, frame);
        }
    }

    fn render_summary(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let title = Line::from(format!(" {} ", uidata.name).bold());
        let block = Block::bordered()
            .title(title.centered())
            .border_set(border::THICK);
        let text = Text::from(
            uidata
                .summary_lines
                .iter()
                .map(|l| Line::from(l.as_str()))
                .collect::<Vec<Line>>(),
        );
        frame.render_widget(Paragraph::new(text).block(block), area);
    }

    fn render_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(uidata.header.clone()).style(Style::new().bold().yellow());
        let rows = uidata.rows.iter().map(|r| Row::new(r.clone()));
        let widths = vec![Constraint::Fill(1); uidata.header.len().max(1)];
        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .block(Block::bordered().title(Line::from(uidata.page_info.as_str()).centered()));
        frame.render_widget(table, area);
    }

    fn render_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let line = Line::from(vec![
            " ".into(),
            uidata.status_message.as_str().into(),
            "  ".into(),
            "<?>".blue().bold(),
            " help ".into(),
            "<Q>".blue().bold(),
            " quit".into(),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let area = centered(frame.area(), POPUP_WIDTH, POPUP_HEIGHT);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.as_str()).block(block),
            area,
        );
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
