use crate::table::TableLike;

const LOCATION_KEYWORDS: [&str; 3] = ["location", "city", "office"];

/// Index of the first header cell that looks like a location column.
pub fn locate_column<T: TableLike + ?Sized>(table: &T) -> Option<usize> {
    let header = table.header_cells()?;
    header.iter().position(|cell| {
        let text = cell.trim().to_lowercase();
        LOCATION_KEYWORDS.iter().any(|k| text.contains(k))
    })
}

pub fn has_location_column<T: TableLike>(tables: &[T]) -> bool {
    tables.iter().any(|t| locate_column(t).is_some())
}
