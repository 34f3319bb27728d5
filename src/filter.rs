use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

use crate::domain::EMPTY_PLACES_WARNING;
use crate::locator::{has_location_column, locate_column};
use crate::matcher::PlaceMatcher;
use crate::places::PlaceSet;
use crate::store::{self, PreferenceStore};
use crate::table::{TableId, TableLike};

/// State changes the panel has to reflect.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    PanelCreated,
    Status(bool),
    Places(Vec<String>),
    Warning(String),
}

/// Returned when the panel gets created. `replay` asks the host to call
/// `replay_persisted` after the settle delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bootstrap {
    pub saved_enabled: bool,
    pub replay: bool,
}

pub struct FilterController {
    places: PlaceSet,
    enabled: bool,
    // Original visibility of every data row, captured the first time a table is filtered.
    registrations: HashMap<TableId, Vec<bool>>,
    panel_created: bool,
    store: Box<dyn PreferenceStore>,
    notices: Vec<Notice>,
}

impl FilterController {
    pub fn new(store: Box<dyn PreferenceStore>) -> Self {
        Self {
            places: PlaceSet::default(),
            enabled: false,
            registrations: HashMap::new(),
            panel_created: false,
            store,
            notices: Vec::new(),
        }
    }

    pub fn places(&self) -> &PlaceSet {
        &self.places
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn panel_created(&self) -> bool {
        self.panel_created
    }

    pub fn is_registered(&self, id: TableId) -> bool {
        self.registrations.contains_key(&id)
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // -------------------------- Filter operations -------------------------- //

    pub fn apply<T: TableLike>(&mut self, tables: &mut [T], show_warning_if_empty: bool) {
        if self.places.is_empty() {
            if show_warning_if_empty {
                self.notices
                    .push(Notice::Warning(EMPTY_PLACES_WARNING.to_string()));
            }
            self.clear(tables);
            return;
        }
        let Some(matcher) = self.matcher() else {
            return;
        };

        let mut hidden = 0;
        for table in tables.iter_mut() {
            hidden += self.filter_table(&matcher, table).unwrap_or(0);
        }
        info!(
            "Location filter ({} places) applied to {} tables, {hidden} rows hidden",
            self.places.len(),
            tables.len()
        );

        self.set_enabled(true);
    }

    pub fn clear<T: TableLike>(&mut self, tables: &mut [T]) {
        for table in tables.iter_mut() {
            self.restore_table(table);
        }
        debug!("Location filter cleared");
        self.set_enabled(false);
    }

    pub fn toggle<T: TableLike>(&mut self, tables: &mut [T]) {
        if self.enabled {
            self.clear(tables);
        } else {
            self.apply(tables, true);
        }
    }

    pub fn add_place<T: TableLike>(&mut self, tables: &mut [T], raw: &str) -> bool {
        if !self.places.insert(raw) {
            trace!("Not adding place {raw:?}");
            return false;
        }
        debug!("Added place {:?}", PlaceSet::normalize(raw));
        self.places_changed();
        if !tables.is_empty() {
            self.apply(tables, false);
        }
        true
    }

    pub fn remove_place<T: TableLike>(&mut self, tables: &mut [T], name: &str) -> bool {
        if !self.places.remove(name) {
            return false;
        }
        debug!("Removed place {name:?}");
        self.places_changed();
        if self.enabled {
            self.apply(tables, false);
        }
        true
    }

    /// Reacts to tables that appeared on the page. Creates the panel the
    /// first time any table has a location column and filters tables that
    /// were never filtered before while the filter is on.
    pub fn on_tables_added<T: TableLike>(&mut self, tables: &mut [T]) -> Option<Bootstrap> {
        let bootstrap = if !self.panel_created && has_location_column(tables) {
            Some(self.bootstrap())
        } else {
            None
        };

        if self.enabled && !self.places.is_empty() {
            if let Some(matcher) = self.matcher() {
                for table in tables.iter_mut() {
                    if !self.registrations.contains_key(&table.id()) {
                        self.filter_table(&matcher, table);
                    }
                }
            }
        }
        bootstrap
    }

    /// Restores the persisted on/off state once the page had time to settle.
    pub fn replay_persisted<T: TableLike>(&mut self, tables: &mut [T], saved_enabled: bool) {
        self.enabled = saved_enabled && !self.places.is_empty();
        if self.enabled
            && let Some(matcher) = self.matcher()
        {
            for table in tables.iter_mut() {
                self.filter_table(&matcher, table);
            }
        }
        debug!("Replayed persisted filter state: {}", self.enabled);
        self.notices.push(Notice::Status(self.enabled));
    }

    pub fn forget_tables(&mut self, ids: &[TableId]) {
        for id in ids {
            if self.registrations.remove(id).is_some() {
                trace!("Dropped registration of table {id}");
            }
        }
    }

    // ------------------------------ Internals ------------------------------ //

    fn bootstrap(&mut self) -> Bootstrap {
        self.places = store::load_places(self.store.as_ref());
        let saved_enabled = store::load_enabled(self.store.as_ref());
        self.panel_created = true;
        info!(
            "Creating location filter panel, places {:?}, saved state {saved_enabled}",
            self.places.to_vec()
        );
        self.notices.push(Notice::PanelCreated);
        self.notices.push(Notice::Places(self.places.to_vec()));
        self.notices.push(Notice::Status(self.enabled));
        Bootstrap {
            saved_enabled,
            replay: saved_enabled && !self.places.is_empty(),
        }
    }

    fn matcher(&self) -> Option<PlaceMatcher> {
        match PlaceMatcher::new(&self.places) {
            Ok(matcher) => Some(matcher),
            Err(e) => {
                warn!("Could not build place patterns: {e}");
                None
            }
        }
    }

    // Returns the number of hidden rows, or None if the table has no location column.
    fn filter_table<T: TableLike>(&mut self, matcher: &PlaceMatcher, table: &mut T) -> Option<usize> {
        let Some(column) = locate_column(table) else {
            trace!("Table {} has no location column", table.id());
            return None;
        };

        let nrows = table.data_row_count();
        self.registrations
            .entry(table.id())
            .or_insert_with(|| (0..nrows).map(|r| table.is_row_visible(r)).collect());

        let mut hidden = 0;
        for row in 0..nrows {
            let Some(text) = table.cell_text(row, column) else {
                continue;
            };
            let keep = matcher.matches(text);
            table.set_row_visible(row, keep);
            table.set_row_filtered(row, !keep);
            if !keep {
                hidden += 1;
            }
        }
        trace!("Table {}: {hidden}/{nrows} rows hidden", table.id());
        Some(hidden)
    }

    fn restore_table<T: TableLike>(&self, table: &mut T) {
        let Some(snapshot) = self.registrations.get(&table.id()) else {
            return;
        };
        for (row, visible) in snapshot.iter().enumerate() {
            table.set_row_visible(row, *visible);
            table.set_row_filtered(row, false);
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        store::save_enabled(self.store.as_mut(), enabled);
        self.notices.push(Notice::Status(enabled));
    }

    fn places_changed(&mut self) {
        store::save_places(self.store.as_mut(), &self.places);
        self.notices.push(Notice::Places(self.places.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ENABLED_KEY, MemoryStore, PLACES_KEY};
    use crate::table::tests::{job_table, strings};
    use crate::table::{Row, Table};
    use proptest::prelude::*;
    use serde_json::{Value, json};

    fn controller(places: &[&str]) -> FilterController {
        let store = MemoryStore::default().with_value(PLACES_KEY, json!(places));
        let mut c = FilterController::new(Box::new(store));
        c.places = PlaceSet::from_values(places.iter().copied());
        c
    }

    fn visible(table: &Table) -> Vec<bool> {
        (0..table.data_row_count())
            .map(|r| table.is_row_visible(r))
            .collect()
    }

    fn stored_enabled(c: &FilterController) -> Value {
        c.store.get(ENABLED_KEY, Value::Null).unwrap()
    }

    #[test]
    fn apply_hides_rows_without_place() {
        let mut tables = vec![job_table(0)];
        let mut c = controller(&["remote"]);
        c.apply(&mut tables, false);

        assert_eq!(visible(&tables[0]), vec![true, false]);
        assert!(tables[0].is_row_filtered(1));
        assert!(!tables[0].is_row_filtered(0));
        assert!(c.is_enabled());
        assert_eq!(stored_enabled(&c), json!(true));
        assert_eq!(c.drain_notices(), vec![Notice::Status(true)]);
    }

    #[test]
    fn enabling_with_no_places_warns_and_stays_off() {
        let mut tables = vec![job_table(0)];
        let mut c = controller(&[]);
        c.toggle(&mut tables);

        assert!(!c.is_enabled());
        assert_eq!(visible(&tables[0]), vec![true, true]);
        assert_eq!(
            c.drain_notices(),
            vec![
                Notice::Warning(EMPTY_PLACES_WARNING.to_string()),
                Notice::Status(false)
            ]
        );
    }

    #[test]
    fn clear_restores_original_visibility() {
        let mut table = job_table(0);
        table.set_row_visible(0, false);
        let mut tables = vec![table];
        let mut c = controller(&["remote", "berlin"]);

        c.apply(&mut tables, false);
        // a matching row is shown even if it was hidden before filtering
        assert_eq!(visible(&tables[0]), vec![true, true]);
        c.clear(&mut tables);
        assert_eq!(visible(&tables[0]), vec![false, true]);
        assert!(!c.is_enabled());
        assert!(c.is_registered(0));
    }

    #[test]
    fn snapshot_is_never_retaken() {
        let mut tables = vec![job_table(0)];
        let mut c = controller(&["remote"]);
        c.apply(&mut tables, false);
        c.apply(&mut tables, false);
        c.clear(&mut tables);
        c.apply(&mut tables, false);
        c.clear(&mut tables);
        assert_eq!(visible(&tables[0]), vec![true, true]);
    }

    #[test]
    fn toggle_flips_state() {
        let mut tables = vec![job_table(0)];
        let mut c = controller(&["berlin"]);
        c.toggle(&mut tables);
        assert_eq!(visible(&tables[0]), vec![false, true]);
        c.toggle(&mut tables);
        assert_eq!(visible(&tables[0]), vec![true, true]);
        assert_eq!(stored_enabled(&c), json!(false));
    }

    #[test]
    fn tables_without_location_column_are_skipped() {
        let mut tables = vec![Table::from_rows(
            0,
            "t",
            Some(strings(&["Role", "Team"])),
            vec![Row::new(strings(&["Eng", "Core"]))],
        )];
        let mut c = controller(&["remote"]);
        c.apply(&mut tables, false);
        assert_eq!(visible(&tables[0]), vec![true]);
        assert!(!c.is_registered(0));
        assert!(c.is_enabled());
    }

    #[test]
    fn short_rows_are_left_alone() {
        let mut tables = vec![Table::from_rows(
            0,
            "t",
            Some(strings(&["Role", "Location"])),
            vec![Row::new(strings(&["Eng"])), Row::new(strings(&["Ops", "Oslo"]))],
        )];
        let mut c = controller(&["remote"]);
        c.apply(&mut tables, false);
        assert_eq!(visible(&tables[0]), vec![true, false]);
    }

    #[test]
    fn add_place_applies_when_tables_exist() {
        let mut tables = vec![job_table(0)];
        let mut c = controller(&["remote"]);
        assert!(c.add_place(&mut tables, "  Berlin "));
        assert!(c.is_enabled());
        assert_eq!(visible(&tables[0]), vec![true, true]);
        assert_eq!(
            c.store.get(PLACES_KEY, Value::Null).unwrap(),
            json!(["remote", "berlin"])
        );

        let mut none: Vec<Table> = Vec::new();
        let mut c = controller(&["remote"]);
        assert!(c.add_place(&mut none, "Oslo"));
        assert!(!c.is_enabled());
    }

    #[test]
    fn duplicate_and_empty_places_are_ignored() {
        let mut tables = vec![job_table(0)];
        let mut c = controller(&["remote"]);
        assert!(!c.add_place(&mut tables, "Remote"));
        assert!(!c.add_place(&mut tables, "  "));
        assert_eq!(c.places().to_vec(), vec!["remote"]);
        assert!(c.drain_notices().is_empty());
    }

    #[test]
    fn add_then_remove_round_trips() {
        let mut tables: Vec<Table> = Vec::new();
        let mut c = controller(&["remote"]);
        let before = c.places().clone();
        c.add_place(&mut tables, "Austin");
        assert!(c.remove_place(&mut tables, "austin"));
        assert_eq!(c.places(), &before);
        assert!(!c.remove_place(&mut tables, "austin"));
    }

    #[test]
    fn remove_place_reapplies_when_enabled() {
        let mut tables = vec![job_table(0)];
        let mut c = controller(&["remote", "berlin"]);
        c.apply(&mut tables, false);
        assert_eq!(visible(&tables[0]), vec![true, true]);
        c.remove_place(&mut tables, "Berlin");
        assert_eq!(visible(&tables[0]), vec![true, false]);

        // removing the last place turns the filter off without a warning
        c.drain_notices();
        c.remove_place(&mut tables, "remote");
        assert!(!c.is_enabled());
        assert_eq!(visible(&tables[0]), vec![true, true]);
        assert!(
            !c.drain_notices()
                .iter()
                .any(|n| matches!(n, Notice::Warning(_)))
        );
    }

    #[test]
    fn remove_place_while_disabled_does_not_filter() {
        let mut tables = vec![job_table(0)];
        let mut c = controller(&["remote", "berlin"]);
        c.remove_place(&mut tables, "berlin");
        assert!(!c.is_enabled());
        assert!(!c.is_registered(0));
    }

    #[test]
    fn first_location_table_bootstraps_panel() {
        let store = MemoryStore::default()
            .with_value(PLACES_KEY, json!(["Berlin"]))
            .with_value(ENABLED_KEY, json!(true));
        let mut c = FilterController::new(Box::new(store));

        let mut plain = vec![Table::from_rows(0, "t", Some(strings(&["Role"])), vec![])];
        assert_eq!(c.on_tables_added(&mut plain), None);
        assert!(!c.panel_created());

        let mut tables = vec![job_table(1)];
        let boot = c.on_tables_added(&mut tables).unwrap();
        assert_eq!(
            boot,
            Bootstrap {
                saved_enabled: true,
                replay: true
            }
        );
        assert!(c.panel_created());
        assert_eq!(c.places().to_vec(), vec!["berlin"]);
        assert!(!c.is_enabled());

        c.replay_persisted(&mut tables, boot.saved_enabled);
        assert!(c.is_enabled());
        assert_eq!(visible(&tables[0]), vec![false, true]);
        assert_eq!(c.on_tables_added(&mut tables), None);
    }

    #[test]
    fn bootstrap_with_failing_store_uses_defaults() {
        let store = MemoryStore::failing(true, true);
        let mut c = FilterController::new(Box::new(store));
        let mut tables = vec![job_table(0)];
        let boot = c.on_tables_added(&mut tables).unwrap();
        assert!(!boot.replay);
        assert_eq!(c.places(), &PlaceSet::default());

        // writes fail silently, state still changes in memory
        c.apply(&mut tables, false);
        assert!(c.is_enabled());
        assert_eq!(visible(&tables[0]), vec![true, false]);
    }

    #[test]
    fn new_tables_are_filtered_once_while_enabled() {
        let mut c = controller(&["remote"]);
        let mut tables = vec![job_table(0)];
        c.on_tables_added(&mut tables);
        c.apply(&mut tables, false);

        // a row that the user hid after registration keeps its snapshot
        let mut second = job_table(1);
        second.set_row_visible(0, false);
        tables.push(second);
        tables[0].set_row_visible(0, false);
        c.on_tables_added(&mut tables);

        assert!(c.is_registered(1));
        assert_eq!(visible(&tables[1]), vec![true, false]);
        // already registered table was not reprocessed
        assert_eq!(visible(&tables[0]), vec![false, false]);

        c.clear(&mut tables);
        assert_eq!(visible(&tables[0]), vec![true, true]);
        assert_eq!(visible(&tables[1]), vec![false, true]);
    }

    #[test]
    fn forgotten_tables_get_a_fresh_snapshot() {
        let mut c = controller(&["remote"]);
        let mut tables = vec![job_table(0)];
        c.apply(&mut tables, false);
        c.forget_tables(&[0]);
        assert!(!c.is_registered(0));
        c.apply(&mut tables, false);
        c.clear(&mut tables);
        // the second snapshot saw the filtered layout
        assert_eq!(visible(&tables[0]), vec![true, false]);
    }

    fn arb_table() -> impl Strategy<Value = (Vec<(usize, bool)>, Vec<usize>)> {
        (
            prop::collection::vec((0usize..5, any::<bool>()), 0..12),
            prop::collection::vec(0usize..5, 0..4),
        )
    }

    const CITIES: [&str; 5] = ["Remote, US", "Berlin", "St. Louis", "Oslo (HQ)", "Paris"];
    const PLACES: [&str; 5] = ["remote", "berlin", "st. louis", "oslo", "fremont"];

    proptest! {
        #[test]
        fn apply_and_clear_follow_matcher((rows, places) in arb_table(), cycles in 1usize..4) {
            let table_rows: Vec<Row> = rows
                .iter()
                .map(|(city, vis)| {
                    let mut row = Row::new(vec!["x".to_string(), CITIES[*city].to_string()]);
                    row.visible = *vis;
                    row
                })
                .collect();
            let original: Vec<bool> = rows.iter().map(|(_, v)| *v).collect();
            let mut tables = vec![Table::from_rows(
                0,
                "t",
                Some(strings(&["Role", "Location"])),
                table_rows,
            )];
            let place_names: Vec<&str> = places.iter().map(|p| PLACES[*p]).collect();
            let mut c = controller(&place_names);
            let matcher = PlaceMatcher::new(c.places()).unwrap();

            for _ in 0..cycles {
                c.apply(&mut tables, false);
                c.apply(&mut tables, false);
                if place_names.is_empty() {
                    prop_assert_eq!(visible(&tables[0]), original.clone());
                } else {
                    let expected: Vec<bool> = rows
                        .iter()
                        .map(|(city, _)| matcher.matches(CITIES[*city]))
                        .collect();
                    prop_assert_eq!(visible(&tables[0]), expected);
                }
                c.clear(&mut tables);
                prop_assert_eq!(visible(&tables[0]), original.clone());
            }
        }
    }
}
