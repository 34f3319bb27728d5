use ratatui::crossterm::event::KeyEvent;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, trace};

use crate::domain::{HELP_TEXT, LFConfig, LFError, Message};
use crate::filter::{FilterController, Notice};
use crate::inputter::Inputter;
use crate::position::{PanelPositioner, Point, Rect, Size};
use crate::store::PreferenceStore;
use crate::table::{Page, Table, TableId, TableLike};
use crate::timing::{Periodic, Scheduler};
use crate::ui::{self, PanelHit, STATUS_LINE_HEIGHT, TABLE_HEADER_HEIGHT, TITLE_BAR_HEIGHT};
use crate::watcher::TableWatcher;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    INPUT,
}

#[derive(Debug, Clone, PartialEq)]
enum Task {
    ReplayFilterState(bool),
    EnsureBounds,
    EnsureBoundsAfterTransition,
}

/// What the location filter panel shows.
#[derive(Debug, Default, Clone)]
pub struct PanelState {
    pub created: bool,
    pub expanded: bool,
    pub enabled: bool,
    pub places: Vec<String>,
    pub selected: usize,
}

#[derive(Debug, Clone)]
pub struct Popup {
    pub title: String,
    pub message: String,
}

pub struct Model {
    config: LFConfig,
    pub status: Status,
    modus: Modus,
    page: Page,
    current_table: usize,
    offset_row: usize,
    curser_row: usize,
    filter: FilterController,
    positioner: PanelPositioner,
    panel: PanelState,
    input: Inputter,
    popup: Option<Popup>,
    scheduler: Scheduler<Task>,
    position_recheck: Periodic,
    watcher: Option<TableWatcher>,
    viewport: Size,
    show_title_bar: bool,
    status_message: String,
}

impl Model {
    pub fn init(
        config: &LFConfig,
        store: Box<dyn PreferenceStore>,
        ui_width: u16,
        ui_height: u16,
        now: Instant,
    ) -> Self {
        Self {
            modus: Modus::TABLE,
            status: Status::READY,
            page: Page::default(),
            current_table: 0,
            offset_row: 0,
            curser_row: 0,
            filter: FilterController::new(store),
            positioner: PanelPositioner::new(config.positioner.clone()),
            panel: PanelState::default(),
            input: Inputter::default(),
            popup: None,
            scheduler: Scheduler::default(),
            position_recheck: Periodic::new(config.timing.position_recheck, now),
            watcher: None,
            viewport: Size::new(ui_width as i32, ui_height as i32),
            show_title_bar: config.show_title_bar,
            status_message: "Started locfilter!".to_string(),
            config: config.clone(),
        }
    }

    // --------------------------- Page management --------------------------- //

    pub fn load_tables(&mut self, paths: Vec<PathBuf>, now: Instant) {
        let mut loaded = Vec::new();
        for path in paths {
            if self.page.contains_path(&path) {
                trace!("{} is already loaded", path.display());
                continue;
            }
            let id = self.page.next_id();
            match Table::load(id, &path, self.config.has_header) {
                Ok(table) => loaded.push(table),
                Err(e) => {
                    error!("Failed to load {}: {e}", path.display());
                    self.set_status_message(format!("Failed to load {}", path.display()));
                }
            }
        }
        self.add_tables(loaded, now);
    }

    pub fn add_tables(&mut self, tables: Vec<Table>, now: Instant) {
        if tables.is_empty() {
            return;
        }
        let count = tables.len();
        for table in tables {
            self.page.push(table);
        }
        info!("{count} tables added, {} on page", self.page.len());

        if let Some(bootstrap) = self.filter.on_tables_added(self.page.tables_mut())
            && bootstrap.replay
        {
            self.scheduler.schedule(
                Task::ReplayFilterState(bootstrap.saved_enabled),
                now + self.config.timing.settle_delay,
            );
        }
        self.sync_panel(now);
        self.set_status_message(format!("{} tables loaded", self.page.len()));
        self.clamp_cursor();
    }

    /// Loads the table files in `dir` and follows tables appearing in or
    /// vanishing from it.
    pub fn watch(&mut self, dir: PathBuf, now: Instant) -> Result<(), LFError> {
        let mut watcher = TableWatcher::new(dir)?;
        let existing = watcher.existing()?;
        self.watcher = Some(watcher);
        self.load_tables(existing.added, now);
        Ok(())
    }

    fn remove_tables(&mut self, paths: &[PathBuf]) {
        let ids: Vec<TableId> = self
            .page
            .tables()
            .iter()
            .filter(|t| t.path().is_some_and(|p| paths.iter().any(|q| q == p)))
            .map(|t| t.id())
            .collect();
        for id in &ids {
            self.page.remove(*id);
        }
        self.filter.forget_tables(&ids);
        debug!("Removed tables {ids:?}");
        self.current_table = self.current_table.min(self.page.len().saturating_sub(1));
        self.clamp_cursor();
    }

    // ------------------------------ Messages ------------------------------- //

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::INPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Message) {
        self.update_at(message, Instant::now());
    }

    pub fn update_at(&mut self, message: Message, now: Instant) {
        trace!("Update: Modus {:?}, Message {:?}", self.modus, message);
        match self.modus {
            Modus::TABLE => match message {
                Message::Quit => self.quit(),
                Message::Help => self.show_popup("Help", HELP_TEXT),
                Message::MoveUp => self.move_selection(-1),
                Message::MoveDown => self.move_selection(1),
                Message::MovePageUp => self.move_selection(-(self.table_height() as i64)),
                Message::MovePageDown => self.move_selection(self.table_height() as i64),
                Message::MoveBeginning => self.move_selection(i64::MIN / 2),
                Message::MoveEnd => self.move_selection(i64::MAX / 2),
                Message::NextTable => self.switch_table(1),
                Message::PreviousTable => self.switch_table(-1),
                Message::ToggleFilter => self.toggle_filter(now),
                Message::TogglePanel => self.toggle_panel(now),
                Message::ToggleTitleBar => self.toggle_title_bar(),
                Message::AddPlace => self.start_add_place(now),
                Message::SelectPreviousPlace => self.select_place(-1),
                Message::SelectNextPlace => self.select_place(1),
                Message::RemoveSelectedPlace => self.remove_selected_place(now),
                Message::Scroll(delta) => self.scroll(delta),
                other => self.handle_common(other, now),
            },
            Modus::INPUT => match message {
                Message::RawKey(key) => self.raw_input(key, now),
                other => self.handle_common(other, now),
            },
            Modus::POPUP => match message {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help | Message::PointerDown(..) => self.close_popup(),
                other => self.handle_common(other, now),
            },
        }
    }

    // Messages handled the same way in every modus.
    fn handle_common(&mut self, message: Message, now: Instant) {
        match message {
            Message::Resize(width, height) => self.ui_resize(width, height, now),
            Message::PointerDown(x, y, primary) => self.pointer_down(x, y, primary, now),
            Message::PointerMove(x, y) => self.pointer_move(x, y),
            Message::PointerUp(x, y) => self.pointer_up(x, y, now),
            Message::TablesAdded(paths) => self.load_tables(paths, now),
            Message::TablesRemoved(paths) => self.remove_tables(&paths),
            _ => (),
        }
    }

    /// Runs deferred work that is due: the persisted state replay, bounds
    /// checks and the periodic position re-check. Table files reported by
    /// the watcher since the last tick are handed on as one batch.
    pub fn tick(&mut self, now: Instant, viewport: Size) {
        for task in self.scheduler.due(now) {
            trace!("Running {task:?}");
            match task {
                Task::ReplayFilterState(saved_enabled) => {
                    self.filter
                        .replay_persisted(self.page.tables_mut(), saved_enabled);
                    self.sync_panel(now);
                    self.clamp_cursor();
                }
                Task::EnsureBounds | Task::EnsureBoundsAfterTransition => {
                    if let Some(rect) = self.panel_rect(now) {
                        self.positioner
                            .ensure_within_bounds(self.viewport, rect, now);
                    }
                }
            }
        }

        if self.position_recheck.due(now) {
            if viewport != self.viewport {
                debug!("Viewport changed unnoticed: {:?} -> {viewport:?}", self.viewport);
                self.viewport = viewport;
            }
            self.adjust_panel();
        }

        let Some(changes) = self.watcher.as_mut().map(TableWatcher::drain) else {
            return;
        };
        if !changes.removed.is_empty() {
            self.update_at(Message::TablesRemoved(changes.removed), now);
        }
        if !changes.added.is_empty() {
            self.update_at(Message::TablesAdded(changes.added), now);
        }
    }

    // ---------------------------- Filter panel ----------------------------- //

    fn sync_panel(&mut self, now: Instant) {
        for notice in self.filter.drain_notices() {
            trace!("Panel notice {notice:?}");
            match notice {
                Notice::PanelCreated => {
                    self.panel.created = true;
                    self.adjust_panel();
                }
                Notice::Status(enabled) => {
                    self.panel.enabled = enabled;
                    self.set_status_message(format!(
                        "Location filter {}",
                        if enabled { "on" } else { "off" }
                    ));
                }
                Notice::Places(places) => {
                    self.panel.places = places;
                    self.panel.selected = self
                        .panel
                        .selected
                        .min(self.panel.places.len().saturating_sub(1));
                    self.scheduler
                        .schedule(Task::EnsureBounds, now + self.config.timing.bounds_check_delay);
                }
                Notice::Warning(message) => self.show_popup("Location Filter", &message),
            }
        }
    }

    fn toggle_filter(&mut self, now: Instant) {
        if !self.filter.panel_created() {
            self.set_status_message("No table with a location column");
            return;
        }
        self.filter.toggle(self.page.tables_mut());
        debug!("Filter toggled, enabled {}", self.filter.is_enabled());
        self.sync_panel(now);
        self.clamp_cursor();
    }

    fn toggle_panel(&mut self, now: Instant) {
        if !self.panel.created {
            return;
        }
        self.panel.expanded = !self.panel.expanded;
        self.schedule_bounds_checks(now);
    }

    fn schedule_bounds_checks(&mut self, now: Instant) {
        let timing = &self.config.timing;
        self.scheduler
            .schedule(Task::EnsureBounds, now + timing.bounds_check_delay);
        self.scheduler.schedule(
            Task::EnsureBoundsAfterTransition,
            now + timing.expand_transition,
        );
    }

    fn start_add_place(&mut self, now: Instant) {
        if !self.panel.created {
            return;
        }
        if !self.panel.expanded {
            self.panel.expanded = true;
            self.schedule_bounds_checks(now);
        }
        self.input.clear();
        self.modus = Modus::INPUT;
    }

    fn raw_input(&mut self, key: KeyEvent, now: Instant) {
        let result = self.input.read(key);
        if !result.finished {
            return;
        }
        if !result.canceled {
            if self.filter.add_place(self.page.tables_mut(), &result.input) {
                self.sync_panel(now);
                self.clamp_cursor();
            } else if self.filter.places().contains(&result.input) {
                self.set_status_message(format!("Already filtering by {:?}", result.input.trim()));
            } else {
                self.set_status_message("Not adding an empty place");
            }
        }
        self.input.clear();
        self.modus = Modus::TABLE;
    }

    fn select_place(&mut self, step: i64) {
        let n = self.panel.places.len();
        if n == 0 {
            return;
        }
        self.panel.selected = (self.panel.selected as i64 + step).rem_euclid(n as i64) as usize;
    }

    fn remove_selected_place(&mut self, now: Instant) {
        self.remove_place(self.panel.selected, now);
    }

    fn remove_place(&mut self, idx: usize, now: Instant) {
        let Some(name) = self.filter.places().get(idx).map(str::to_string) else {
            return;
        };
        self.filter.remove_place(self.page.tables_mut(), &name);
        self.sync_panel(now);
        self.clamp_cursor();
    }

    // ---------------------------- Panel geometry --------------------------- //

    fn header_height(&self) -> Option<i32> {
        self.show_title_bar.then_some(TITLE_BAR_HEIGHT)
    }

    pub fn panel_height(&self) -> i32 {
        ui::panel_height(self.panel.expanded, self.panel.places.len())
    }

    pub fn panel_rect(&self, now: Instant) -> Option<Rect> {
        self.panel.created.then(|| {
            self.positioner
                .rect(now, self.viewport, self.panel_height())
        })
    }

    pub fn panel_repositioning(&self, now: Instant) -> bool {
        self.positioner.is_repositioning(now)
    }

    fn adjust_panel(&mut self) {
        self.positioner
            .adjust(self.viewport, self.header_height(), self.panel_height());
    }

    fn ui_resize(&mut self, width: u16, height: u16, now: Instant) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.viewport.width, width, self.viewport.height, height
        );
        self.viewport = Size::new(width as i32, height as i32);
        self.positioner.on_resize(
            self.viewport,
            self.header_height(),
            self.panel_height(),
            now,
        );
        self.clamp_cursor();
    }

    fn pointer_down(&mut self, x: u16, y: u16, primary: bool, now: Instant) {
        let Some(rect) = self.panel_rect(now) else {
            return;
        };
        let point = Point::new(x as i32, y as i32);
        match ui::hit_test(rect, point, self.panel.expanded, self.panel.places.len()) {
            PanelHit::Toggle if primary => self.toggle_filter(now),
            PanelHit::Header => {
                if self.positioner.begin_drag(point, rect, false, primary) {
                    self.scheduler.cancel(&Task::EnsureBounds);
                    self.scheduler.cancel(&Task::EnsureBoundsAfterTransition);
                }
            }
            PanelHit::Input if primary => self.start_add_place(now),
            PanelHit::RemovePlace(idx) if primary => self.remove_place(idx, now),
            PanelHit::Place(idx) => self.panel.selected = idx,
            _ => (),
        }
    }

    fn pointer_move(&mut self, x: u16, y: u16) {
        self.positioner
            .drag_to(Point::new(x as i32, y as i32), self.viewport);
    }

    fn pointer_up(&mut self, x: u16, y: u16, now: Instant) {
        if !self.positioner.is_dragging() {
            return;
        }
        // Moves are throttled, the release point is where the drag ends.
        self.positioner
            .drag_to(Point::new(x as i32, y as i32), self.viewport);
        self.positioner.end_drag(now);
        if self.positioner.accept_header_click(now) {
            self.toggle_panel(now);
        }
    }

    // ------------------------------ Table view ----------------------------- //

    fn table_height(&self) -> usize {
        let title = if self.show_title_bar { TITLE_BAR_HEIGHT } else { 0 };
        (self.viewport.height - title - STATUS_LINE_HEIGHT - TABLE_HEADER_HEIGHT).max(1) as usize
    }

    fn visible_row_count(&self) -> usize {
        self.current_table()
            .map(|t| t.visible_rows().len())
            .unwrap_or(0)
    }

    fn move_selection(&mut self, step: i64) {
        let nrows = self.visible_row_count();
        if nrows == 0 {
            return;
        }
        let height = self.table_height();
        let abs = (self.offset_row + self.curser_row) as i64;
        let target = (abs + step).clamp(0, nrows as i64 - 1) as usize;
        if target < self.offset_row {
            self.offset_row = target;
        } else if target >= self.offset_row + height {
            self.offset_row = target + 1 - height;
        }
        self.curser_row = target - self.offset_row;
    }

    // Scrolling moves the view and keeps the panel where it belongs.
    fn scroll(&mut self, delta: i32) {
        self.move_selection(delta as i64);
        self.adjust_panel();
    }

    fn clamp_cursor(&mut self) {
        let nrows = self.visible_row_count();
        let height = self.table_height();
        let abs = (self.offset_row + self.curser_row).min(nrows.saturating_sub(1));
        self.offset_row = self.offset_row.min(abs);
        if abs >= self.offset_row + height {
            self.offset_row = abs + 1 - height;
        }
        self.curser_row = abs - self.offset_row;
    }

    fn switch_table(&mut self, step: i64) {
        if self.page.is_empty() {
            return;
        }
        let n = self.page.len();
        self.current_table = (self.current_table as i64 + step).rem_euclid(n as i64) as usize;
        self.offset_row = 0;
        self.curser_row = 0;
        // Switching tables is a navigation; the panel follows the layout.
        self.adjust_panel();
    }

    fn toggle_title_bar(&mut self) {
        self.show_title_bar = !self.show_title_bar;
        self.adjust_panel();
        self.clamp_cursor();
    }

    // ------------------------------- Popups -------------------------------- //

    fn show_popup(&mut self, title: &str, message: &str) {
        self.popup = Some(Popup {
            title: title.to_string(),
            message: message.to_string(),
        });
        self.input.clear();
        self.modus = Modus::POPUP;
    }

    fn close_popup(&mut self) {
        self.popup = None;
        self.modus = Modus::TABLE;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    // ------------------------------ Accessors ------------------------------ //

    pub fn current_table(&self) -> Option<&Table> {
        self.page.get(self.current_table)
    }

    pub fn table_position(&self) -> (usize, usize) {
        (self.current_table, self.page.len())
    }

    pub fn offset_row(&self) -> usize {
        self.offset_row
    }

    pub fn curser_row(&self) -> usize {
        self.curser_row
    }

    pub fn show_title_bar(&self) -> bool {
        self.show_title_bar
    }

    pub fn panel(&self) -> &PanelState {
        &self.panel
    }

    /// Visible input text and cursor column while a place is being typed.
    pub fn input_view(&self, width: usize) -> Option<(String, usize)> {
        (self.modus == Modus::INPUT).then(|| self.input.visible(width))
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Placement;
    use crate::store::{ENABLED_KEY, MemoryStore, PLACES_KEY};
    use crate::table::tests::{job_table, strings};
    use crate::table::Row;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use serde_json::json;
    use std::fs;
    use std::thread;
    use std::time::Duration;

    const VIEWPORT: Size = Size {
        width: 120,
        height: 40,
    };

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn model_with(store: MemoryStore, t0: Instant) -> Model {
        Model::init(&LFConfig::default(), Box::new(store), 120, 40, t0)
    }

    fn visible(model: &Model) -> Vec<bool> {
        let table = model.current_table().unwrap();
        (0..table.data_row_count())
            .map(|r| table.is_row_visible(r))
            .collect()
    }

    fn key(code: KeyCode) -> Message {
        Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn panel_is_created_for_location_tables_only() {
        let t0 = Instant::now();
        let mut model = model_with(MemoryStore::default(), t0);
        let plain = Table::from_rows(0, "t", Some(strings(&["Role"])), vec![]);
        model.add_tables(vec![plain], t0);
        assert!(model.panel_rect(t0).is_none());

        model.add_tables(vec![job_table(1)], t0);
        let rect = model.panel_rect(t0).unwrap();
        // anchored right, one line below the title bar
        assert_eq!(rect, Rect::new(84, 2, 34, 3));
        assert_eq!(model.panel().places, vec!["remote"]);
        assert!(!model.panel().enabled);
    }

    #[test]
    fn persisted_state_is_replayed_after_settle_delay() {
        let t0 = Instant::now();
        let store = MemoryStore::default()
            .with_value(PLACES_KEY, json!(["berlin"]))
            .with_value(ENABLED_KEY, json!(true));
        let mut model = model_with(store, t0);
        model.add_tables(vec![job_table(0)], t0);
        assert_eq!(visible(&model), vec![true, true]);

        model.tick(t0 + ms(50), VIEWPORT);
        assert!(!model.panel().enabled);
        model.tick(t0 + ms(100), VIEWPORT);
        assert!(model.panel().enabled);
        assert_eq!(visible(&model), vec![false, true]);
    }

    #[test]
    fn enabling_without_places_shows_warning() {
        let t0 = Instant::now();
        let mut model = model_with(MemoryStore::default(), t0);
        model.add_tables(vec![job_table(0)], t0);
        model.update_at(Message::RemoveSelectedPlace, t0);
        assert!(model.panel().places.is_empty());

        model.update_at(Message::ToggleFilter, t0);
        assert!(model.popup().is_some());
        assert!(!model.panel().enabled);
        assert_eq!(visible(&model), vec![true, true]);

        model.update_at(Message::Exit, t0);
        assert!(model.popup().is_none());
    }

    #[test]
    fn typing_a_place_applies_the_filter() {
        let t0 = Instant::now();
        let mut model = model_with(MemoryStore::default(), t0);
        model.add_tables(vec![job_table(0)], t0);

        model.update_at(Message::AddPlace, t0);
        assert!(model.raw_keyevents());
        assert!(model.panel().expanded);
        for c in "Berlin".chars() {
            model.update_at(key(KeyCode::Char(c)), t0);
        }
        assert_eq!(model.input_view(20), Some(("Berlin".to_string(), 6)));
        model.update_at(key(KeyCode::Enter), t0);

        assert!(!model.raw_keyevents());
        assert_eq!(model.panel().places, vec!["remote", "berlin"]);
        assert!(model.panel().enabled);
        assert_eq!(visible(&model), vec![true, true]);

        model.update_at(Message::SelectPreviousPlace, t0);
        model.update_at(Message::RemoveSelectedPlace, t0);
        assert_eq!(model.panel().places, vec!["remote"]);
        assert_eq!(visible(&model), vec![true, false]);
    }

    #[test]
    fn clicking_the_toggle_filters() {
        let t0 = Instant::now();
        let mut model = model_with(MemoryStore::default(), t0);
        model.add_tables(vec![job_table(0)], t0);
        model.update_at(Message::PointerDown(114, 2, true), t0);
        model.update_at(Message::PointerUp(114, 2), t0);
        assert!(model.panel().enabled);
        assert!(!model.panel().expanded);
        assert_eq!(visible(&model), vec![true, false]);
    }

    #[test]
    fn header_click_expands_but_drag_does_not() {
        let t0 = Instant::now();
        let mut model = model_with(MemoryStore::default(), t0);
        model.add_tables(vec![job_table(0)], t0);

        model.update_at(Message::PointerDown(90, 2, true), t0);
        model.update_at(Message::PointerUp(90, 2), t0);
        assert!(model.panel().expanded);

        model.update_at(Message::PointerDown(90, 2, true), t0);
        model.update_at(Message::PointerMove(60, 10), t0);
        model.update_at(Message::PointerUp(60, 10), t0);
        assert!(model.panel().expanded);
        assert_eq!(model.positioner.placement(), Placement::Pinned(Point::new(54, 10)));
    }

    #[test]
    fn drag_ends_at_release_point_after_dropped_moves() {
        let t0 = Instant::now();
        let mut model = model_with(MemoryStore::default(), t0);
        model.add_tables(vec![job_table(0)], t0);
        model.update_at(Message::PointerDown(90, 2, true), t0);
        model.update_at(Message::PointerMove(60, 10), t0 + ms(1));
        // the move to (70, 20) fell inside the drag throttle window
        model.update_at(Message::PointerUp(70, 20), t0 + ms(6));
        assert_eq!(model.positioner.placement(), Placement::Pinned(Point::new(64, 20)));
        assert!(!model.panel().expanded);
    }

    #[test]
    fn release_without_move_keeps_panel_anchored() {
        let t0 = Instant::now();
        let mut model = model_with(MemoryStore::default(), t0);
        model.add_tables(vec![job_table(0)], t0);
        model.update_at(Message::PointerDown(90, 2, true), t0);
        model.update_at(Message::PointerUp(90, 2), t0);
        assert_eq!(model.positioner.placement(), Placement::Anchored);
        assert!(model.panel().expanded);
    }

    #[test]
    fn dragged_panel_stays_inside_after_shrink() {
        let t0 = Instant::now();
        let mut model = model_with(MemoryStore::default(), t0);
        model.add_tables(vec![job_table(0)], t0);
        model.update_at(Message::PointerDown(90, 2, true), t0);
        model.update_at(Message::PointerMove(500, 500), t0);
        model.update_at(Message::PointerUp(500, 500), t0);
        let rect = model.panel_rect(t0).unwrap();
        assert_eq!((rect.right(), rect.bottom()), (119, 39));

        model.update_at(Message::Resize(80, 24), t0);
        let rect = model.panel_rect(t0 + ms(400)).unwrap();
        assert_eq!((rect.right(), rect.bottom()), (79, 23));
    }

    #[test]
    fn expanding_near_the_bottom_pulls_panel_up() {
        let t0 = Instant::now();
        let mut model = model_with(MemoryStore::default(), t0);
        model.add_tables(vec![job_table(0)], t0);
        model.update_at(Message::PointerDown(90, 2, true), t0);
        model.update_at(Message::PointerMove(90, 100), t0);
        model.update_at(Message::PointerUp(90, 100), t0);

        model.update_at(Message::TogglePanel, t0);
        assert!(model.panel().expanded);
        // bounds are re-checked on the next tick
        model.tick(t0, VIEWPORT);
        let rect = model.panel_rect(t0 + ms(400)).unwrap();
        assert_eq!(rect.bottom(), 39);
    }

    #[test]
    fn removed_tables_lose_their_registration() {
        let t0 = Instant::now();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.csv");
        fs::write(&path, "Role,Location\nEng,Remote\nOps,Oslo\n").unwrap();

        let mut model = model_with(MemoryStore::default(), t0);
        model.update_at(Message::TablesAdded(vec![path.clone()]), t0);
        model.update_at(Message::ToggleFilter, t0);
        assert_eq!(visible(&model), vec![true, false]);
        assert!(model.filter.is_registered(0));

        model.update_at(Message::TablesRemoved(vec![path]), t0);
        assert!(model.current_table().is_none());
        assert!(!model.filter.is_registered(0));
    }

    #[test]
    fn watched_directory_feeds_tables() {
        let t0 = Instant::now();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("jobs.csv"), "Role,Location\nEng,Remote\n").unwrap();

        let mut model = model_with(MemoryStore::default(), t0);
        model.watch(dir.path().to_path_buf(), t0).unwrap();
        assert_eq!(model.table_position(), (0, 1));
        assert!(model.panel().created);

        let path = dir.path().join("offices.csv");
        fs::write(&path, "Office,Team\nBerlin,Core\nRemote,Ops\n").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while model.table_position().1 < 2 && Instant::now() < deadline {
            thread::sleep(ms(20));
            model.tick(Instant::now(), VIEWPORT);
        }
        assert_eq!(model.table_position(), (0, 2));

        fs::remove_file(&path).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while model.table_position().1 > 1 && Instant::now() < deadline {
            thread::sleep(ms(20));
            model.tick(Instant::now(), VIEWPORT);
        }
        assert_eq!(model.table_position(), (0, 1));
    }

    #[test]
    fn watching_a_missing_directory_fails() {
        let t0 = Instant::now();
        let mut model = model_with(MemoryStore::default(), t0);
        assert!(model.watch(PathBuf::from("/definitely/not/here"), t0).is_err());
    }

    #[test]
    fn cursor_stays_on_visible_rows() {
        let t0 = Instant::now();
        let mut model = model_with(MemoryStore::default(), t0);
        let rows = (0..10)
            .map(|i| {
                let city = if i % 2 == 0 { "Remote" } else { "Paris" };
                Row::new(strings(&["Eng", city]))
            })
            .collect();
        let table = Table::from_rows(0, "t", Some(strings(&["Role", "City"])), rows);
        model.add_tables(vec![table], t0);
        model.update_at(Message::MoveEnd, t0);
        assert_eq!(model.curser_row(), 9);
        model.update_at(Message::ToggleFilter, t0);
        assert_eq!(model.offset_row() + model.curser_row(), 4);
    }
}
