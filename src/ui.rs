use std::time::Instant;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::model::{Model, PanelState};
use crate::position;
use crate::table::TableLike;

pub const TITLE_BAR_HEIGHT: i32 = 1;
pub const STATUS_LINE_HEIGHT: i32 = 1;
pub const TABLE_HEADER_HEIGHT: i32 = 1;

const MAX_COLUMN_WIDTH: usize = 40;
// "[ON ]" / "[OFF]" on the right of the panel header.
const TOGGLE_WIDTH: i32 = 5;
// Cells on the right of a place line that remove it when clicked.
const REMOVE_WIDTH: i32 = 3;
// Rows above the first place: top border, input line, "Places" label.
const PLACES_OFFSET: i32 = 3;

/// Rendered panel height: borders and one status line when collapsed;
/// borders, input line, label and the place list when expanded.
pub fn panel_height(expanded: bool, nplaces: usize) -> i32 {
    if expanded {
        2 + 2 + nplaces.max(1) as i32
    } else {
        3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelHit {
    Outside,
    Header,
    Toggle,
    Input,
    Place(usize),
    RemovePlace(usize),
    Body,
}

/// Which part of the panel drawn at `rect` lies under `point`.
pub fn hit_test(rect: position::Rect, point: position::Point, expanded: bool, nplaces: usize) -> PanelHit {
    if !rect.contains(point) {
        return PanelHit::Outside;
    }
    let dy = point.y - rect.origin.y;
    if dy == 0 {
        let toggle_start = rect.right() - 1 - TOGGLE_WIDTH;
        if point.x >= toggle_start && point.x < rect.right() - 1 {
            return PanelHit::Toggle;
        }
        return PanelHit::Header;
    }
    if !expanded {
        return PanelHit::Body;
    }
    if dy == 1 {
        return PanelHit::Input;
    }
    let idx = dy - PLACES_OFFSET;
    if idx >= 0 && (idx as usize) < nplaces {
        let idx = idx as usize;
        if point.x >= rect.right() - 1 - REMOVE_WIDTH && point.x < rect.right() - 1 {
            return PanelHit::RemovePlace(idx);
        }
        return PanelHit::Place(idx);
    }
    PanelHit::Body
}

#[derive(Debug, Default)]
pub struct TableUI {}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        self.draw_at(model, frame, Instant::now());
    }

    pub fn draw_at(&mut self, model: &Model, frame: &mut Frame, now: Instant) {
        let area = frame.area();
        let title_height = if model.show_title_bar() { TITLE_BAR_HEIGHT as u16 } else { 0 };
        let [title_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(title_height),
            Constraint::Fill(1),
            Constraint::Length(STATUS_LINE_HEIGHT as u16),
        ])
        .areas(area);

        if model.show_title_bar() {
            self.draw_title_bar(model, frame, title_area);
        }
        self.draw_table(model, frame, table_area);
        self.draw_status_line(model, frame, status_area);

        if let Some(rect) = model.panel_rect(now) {
            let moving = model.panel_repositioning(now);
            self.draw_panel(model, frame, rect, moving);
        }
        if let Some(popup) = model.popup() {
            self.draw_popup(&popup.title, &popup.message, frame);
        }
    }

    fn draw_title_bar(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let (idx, count) = model.table_position();
        let name = model
            .current_table()
            .map(|t| format!(" {} ({}/{}) ", t.name(), idx + 1, count))
            .unwrap_or_else(|| " no tables loaded ".to_string());
        let line = Line::from(vec![" locfilter ".bold(), "|".into(), name.into()]);
        frame.render_widget(Paragraph::new(line).reversed(), area);
    }

    fn draw_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let Some(table) = model.current_table() else {
            let text = Text::from("Pass csv, parquet or arrow files, or --watch a directory.");
            frame.render_widget(Paragraph::new(text).centered().dim(), area);
            return;
        };

        let height = area.height.saturating_sub(TABLE_HEADER_HEIGHT as u16) as usize;
        let rows = table.visible_rows();
        let window: Vec<_> = rows.iter().skip(model.offset_row()).take(height).collect();
        let header: Vec<String> = table
            .header_cells()
            .map(|h| h.to_vec())
            .unwrap_or_default();

        let ncols = window
            .iter()
            .map(|(_, r)| r.cells.len())
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);
        let widths = (0..ncols).map(|c| {
            let width = window
                .iter()
                .filter_map(|(_, r)| r.cells.get(c))
                .chain(header.get(c))
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(1);
            Constraint::Length(width.min(MAX_COLUMN_WIDTH) as u16)
        });

        let body = window.iter().enumerate().map(|(i, (_, row))| {
            let style = if i == model.curser_row() {
                Style::new().reversed()
            } else {
                Style::new()
            };
            Row::new(row.cells.iter().map(|c| Cell::from(c.as_str()))).style(style)
        });
        let widget = Table::new(body, widths)
            .header(Row::new(header.iter().map(|h| Cell::from(h.as_str()))).bold().underlined())
            .column_spacing(2);
        frame.render_widget(widget, area);
    }

    fn draw_status_line(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let rows = model
            .current_table()
            .map(|t| format!("{}/{} rows ", t.visible_rows().len(), t.data_row_count()))
            .unwrap_or_default();
        let line = Line::from(vec![
            Span::from(format!(" {}", model.status_message())),
            Span::from("  "),
            Span::from(rows).dim(),
            "<?> help ".blue().bold(),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_panel(&self, model: &Model, frame: &mut Frame, rect: position::Rect, moving: bool) {
        let panel = model.panel();
        let area = to_area(rect).intersection(frame.area());
        if area.is_empty() {
            return;
        }

        let toggle = if panel.enabled {
            "[ON ]".green().bold()
        } else {
            "[OFF]".red().bold()
        };
        let arrow = if panel.expanded { "▾" } else { "▸" };
        let border_style = if moving { Style::new().dim() } else { Style::new() };
        let block = Block::bordered()
            .border_set(border::ROUNDED)
            .border_style(border_style)
            .title_top(Line::from(format!(" {arrow} Location Filter ")).left_aligned())
            .title_top(Line::from(toggle).right_aligned());

        let inner_width = (rect.size.width - 2).max(0) as usize;
        let lines = if panel.expanded {
            self.expanded_lines(model, panel, inner_width)
        } else {
            vec![Line::from(Self::summary(panel)).dim()]
        };

        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(lines).block(block), area);

        if let Some((_, cursor)) = model.input_view(inner_width.saturating_sub(2)) {
            let x = rect.origin.x + 1 + 2 + cursor as i32;
            let y = rect.origin.y + 1;
            if x >= 0 && y >= 0 {
                frame.set_cursor_position((x as u16, y as u16));
            }
        }
    }

    fn summary(panel: &PanelState) -> String {
        match panel.places.len() {
            0 => "no places".to_string(),
            1 => format!("only {}", panel.places[0]),
            n => format!("{n} places"),
        }
    }

    fn expanded_lines<'a>(&self, model: &Model, panel: &'a PanelState, width: usize) -> Vec<Line<'a>> {
        let mut lines = Vec::with_capacity(panel.places.len() + 2);
        match model.input_view(width.saturating_sub(2)) {
            Some((text, _)) => lines.push(Line::from(vec!["+ ".bold(), text.into()])),
            None => lines.push(Line::from("+ add place <a>").dim()),
        }
        lines.push(Line::from("Places").underlined());
        if panel.places.is_empty() {
            lines.push(Line::from("(none)").dim().italic());
        }
        for (i, place) in panel.places.iter().enumerate() {
            let name_width = width.saturating_sub(REMOVE_WIDTH as usize);
            let name: String = place.chars().take(name_width).collect();
            let pad = " ".repeat(name_width.saturating_sub(name.chars().count()));
            let mut line = Line::from(vec![Span::from(name), Span::from(pad), " × ".red()]);
            if i == panel.selected {
                line = line.reversed();
            }
            lines.push(line);
        }
        lines
    }

    fn draw_popup(&self, title: &str, message: &str, frame: &mut Frame) {
        let area = frame.area();
        let width = (area.width * 3 / 5).max(40).min(area.width);
        let height = (message.lines().count() as u16 + 2).min(area.height);
        let popup = Rect::new(
            area.x + (area.width - width) / 2,
            area.y + (area.height - height) / 2,
            width,
            height,
        );
        let block = Block::bordered()
            .title(Line::from(format!(" {title} ").bold()).centered())
            .title_bottom(Line::from(" <Esc> close ").centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(message).wrap(Wrap { trim: false }).block(block),
            popup,
        );
    }
}

fn to_area(rect: position::Rect) -> Rect {
    let x = rect.origin.x.max(0);
    let y = rect.origin.y.max(0);
    let width = (rect.right() - x).max(0);
    let height = (rect.bottom() - y).max(0);
    Rect::new(x as u16, y as u16, width as u16, height as u16)
}
