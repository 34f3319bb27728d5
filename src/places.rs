/// Place used when nothing usable was persisted yet.
pub const DEFAULT_PLACE: &str = "remote";

// Ordered list of normalized place names. Entries are unique ignoring case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceSet {
    places: Vec<String>,
}

impl Default for PlaceSet {
    fn default() -> Self {
        Self {
            places: vec![DEFAULT_PLACE.to_string()],
        }
    }
}

impl PlaceSet {
    pub fn empty() -> Self {
        Self { places: Vec::new() }
    }

    /// Builds a set from persisted values, normalizing and dropping duplicates.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::empty();
        for v in values {
            set.insert(v.as_ref());
        }
        set
    }

    pub fn normalize(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    /// Returns false if the name is empty after normalization or already present.
    pub fn insert(&mut self, raw: &str) -> bool {
        let name = Self::normalize(raw);
        if name.is_empty() || self.contains(&name) {
            return false;
        }
        self.places.push(name);
        true
    }

    pub fn remove(&mut self, raw: &str) -> bool {
        let name = Self::normalize(raw);
        let before = self.places.len();
        self.places.retain(|p| *p != name);
        before != self.places.len()
    }

    pub fn contains(&self, raw: &str) -> bool {
        let name = Self::normalize(raw);
        self.places.iter().any(|p| *p == name)
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.places.get(idx).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.places.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.places.clone()
    }
}
