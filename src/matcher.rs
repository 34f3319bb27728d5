use regex::Regex;
use tracing::trace;

use crate::places::PlaceSet;

/// The strategy that accepted a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    WordBoundary,
    Substring,
    Separated,
}

struct CompiledPlace {
    name: String,
    word: Regex,
    separated: Regex,
}

impl CompiledPlace {
    fn new(place: &str) -> Result<Self, regex::Error> {
        let name = place.trim().to_lowercase();
        let escaped = regex::escape(&name);
        Ok(Self {
            word: Regex::new(&format!(r"(?i)\b{escaped}\b"))?,
            separated: Regex::new(&format!(r"(?i)(^|[,\s]){escaped}([,\s]|$)"))?,
            name,
        })
    }

    fn strategy(&self, text: &str) -> Option<Strategy> {
        if self.word.is_match(text) {
            Some(Strategy::WordBoundary)
        } else if text.contains(&self.name) {
            Some(Strategy::Substring)
        } else if self.separated.is_match(text) {
            Some(Strategy::Separated)
        } else {
            None
        }
    }
}

// Decides whether the text of a location cell names one of the configured places.
// The substring strategy also accepts superstrings ("remotely" for "remote").
pub struct PlaceMatcher {
    places: Vec<CompiledPlace>,
}

impl PlaceMatcher {
    pub fn new(places: &PlaceSet) -> Result<Self, regex::Error> {
        let places = places
            .iter()
            .map(CompiledPlace::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { places })
    }

    /// Lower-cases, collapses whitespace runs into single spaces and trims.
    pub fn normalize_cell(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<&str>>()
            .join(" ")
            .to_lowercase()
    }

    pub fn matches(&self, cell: &str) -> bool {
        self.matched_by(cell).is_some()
    }

    /// Returns the first place that accepts the cell together with the strategy that fired.
    pub fn matched_by(&self, cell: &str) -> Option<(&str, Strategy)> {
        let text = Self::normalize_cell(cell);
        let hit = self
            .places
            .iter()
            .find_map(|p| p.strategy(&text).map(|s| (p.name.as_str(), s)));
        trace!("Cell {text:?} => {hit:?}");
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(places: &[&str]) -> PlaceMatcher {
        PlaceMatcher::new(&PlaceSet::from_values(places.iter().copied())).unwrap()
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(
            PlaceMatcher::normalize_cell("  Remote,\n\t US  "),
            "remote, us"
        );
    }

    #[test]
    fn word_boundary_matches_parenthesized() {
        let m = matcher(&["remote"]);
        assert_eq!(
            m.matched_by("Remote (US only)"),
            Some(("remote", Strategy::WordBoundary))
        );
    }

    #[test]
    fn cell_without_place_is_rejected() {
        let m = matcher(&["remote"]);
        assert!(!m.matches("Berlin"));
        assert!(!m.matches(""));
    }

    #[test]
    fn substring_strategy_accepts_superstrings() {
        let m = matcher(&["remote"]);
        assert_eq!(
            m.matched_by("Remotely in EMEA"),
            Some(("remote", Strategy::Substring))
        );
    }

    #[test]
    fn fremont_is_not_a_superstring_of_remote() {
        let m = matcher(&["remote"]);
        assert!(!m.matches("Fremont, CA"));
        let m = matcher(&["mont"]);
        assert_eq!(m.matched_by("Fremont"), Some(("mont", Strategy::Substring)));
    }

    #[test]
    fn special_characters_are_literal() {
        let m = matcher(&["St. Louis"]);
        assert!(m.matches("St. Louis, MO"));
        assert!(!m.matches("Stx Louis"));

        let m = matcher(&["c++ (city)"]);
        assert!(m.matches("C++ (City), remote-ish"));
    }

    #[test]
    fn separated_strategy_catches_non_word_edges() {
        // "(" is not a word character so \b does not fire after it, and the
        // whole cell is not a substring hit either.
        let m = matcher(&["(hq)"]);
        assert_eq!(
            m.matched_by("Berlin, (HQ)"),
            Some(("(hq)", Strategy::Substring))
        );
        let compiled = CompiledPlace::new("(hq)").unwrap();
        assert!(compiled.separated.is_match("berlin, (hq)"));
        assert!(!compiled.word.is_match("berlin, (hq)"));
    }

    #[test]
    fn any_place_may_match() {
        let m = matcher(&["berlin", "remote"]);
        assert_eq!(
            m.matched_by("Remote - Europe"),
            Some(("remote", Strategy::WordBoundary))
        );
        assert!(m.matches("Berlin"));
        assert!(!m.matches("Munich"));
    }

    #[test]
    fn empty_matcher_matches_nothing() {
        let m = matcher(&[]);
        assert!(!m.matches("Remote"));
    }
}
