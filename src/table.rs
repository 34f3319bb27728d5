use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::domain::LFError;

pub type TableId = usize;

/// What the filter needs to know about (and do to) a table.
///
/// Row indices always address data rows. When a table has no designated
/// header the first row serves as header and is not a data row.
pub trait TableLike {
    fn id(&self) -> TableId;
    fn header_cells(&self) -> Option<&[String]>;
    fn data_row_count(&self) -> usize;
    /// `None` when the row has fewer cells than `column + 1`.
    fn cell_text(&self, row: usize, column: usize) -> Option<&str>;
    fn is_row_visible(&self, row: usize) -> bool;
    fn set_row_visible(&mut self, row: usize, visible: bool);
    fn is_row_filtered(&self, row: usize) -> bool;
    fn set_row_filtered(&mut self, row: usize, filtered: bool);
}

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<String>,
    pub visible: bool,
    // Set while the location filter hides this row.
    pub filtered: bool,
}

impl Row {
    pub fn new(cells: Vec<String>) -> Self {
        Self {
            cells,
            visible: true,
            filtered: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    id: TableId,
    name: String,
    path: Option<PathBuf>,
    head: Option<Vec<String>>,
    rows: Vec<Row>,
}

impl Table {
    pub fn from_rows(
        id: TableId,
        name: impl Into<String>,
        head: Option<Vec<String>>,
        rows: Vec<Row>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            path: None,
            head,
            rows,
        }
    }

    /// Loads a csv, parquet or arrow file. Without `has_header` the first
    /// record is kept as a row and later serves as the header row.
    pub fn load(id: TableId, path: &Path, has_header: bool) -> Result<Self, LFError> {
        let file_type = Self::detect_file_type(path)?;
        Self::check_file(path)?;

        let start_time = Instant::now();
        let frame = match file_type {
            FileType::CSV => Self::load_csv(path, has_header)?,
            FileType::PARQUET => Self::load_parquet(path)?,
            FileType::ARROW => Self::load_arrow(path)?,
        };
        let df = frame.collect()?;

        // Each column is converted to strings in its own thread.
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        let columns = names
            .par_iter()
            .map(|name| Self::load_column(&df, name))
            .collect::<Result<Vec<Vec<String>>, PolarsError>>()?;

        let nrows = df.height();
        let rows = (0..nrows)
            .map(|r| Row::new(columns.iter().map(|c| c[r].clone()).collect()))
            .collect();

        let head = match file_type {
            FileType::CSV if !has_header => None,
            _ => Some(names),
        };
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        info!(
            "Loaded {name} ({nrows} rows) in {}ms",
            start_time.elapsed().as_millis()
        );

        Ok(Self {
            id,
            name,
            path: Some(path.to_path_buf()),
            head,
            rows,
        })
    }

    fn load_column(df: &DataFrame, name: &str) -> Result<Vec<String>, PolarsError> {
        let col = df.column(name)?.cast(&DataType::String)?;
        let series = col.str()?;
        Ok(series
            .into_iter()
            .map(|value| match value {
                Some(s) => s.replace("\r\n", " ↵ ").replace('\n', " ↵ "),
                None => String::from("∅"),
            })
            .collect())
    }

    fn check_file(path: &Path) -> Result<(), LFError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LFError::FileNotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => LFError::PermissionDenied(path.to_path_buf()),
            _ => LFError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(LFError::LoadingFailed(format!(
                "{} is not a file",
                path.display()
            )));
        }
        Ok(())
    }

    fn detect_file_type(path: &Path) -> Result<FileType, LFError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(LFError::UnknownFileType(path.to_path_buf())),
        }
    }

    pub fn is_table_file(path: &Path) -> bool {
        Self::detect_file_type(path).is_ok()
    }

    fn load_csv(path: &Path, has_header: bool) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(has_header)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn first_data_row(&self) -> usize {
        if self.head.is_some() { 0 } else { 1 }
    }

    pub fn data_row(&self, row: usize) -> Option<&Row> {
        self.rows.get(row + self.first_data_row())
    }

    fn data_row_mut(&mut self, row: usize) -> Option<&mut Row> {
        let first = self.first_data_row();
        self.rows.get_mut(row + first)
    }

    /// Data rows currently shown, with their data row index.
    pub fn visible_rows(&self) -> Vec<(usize, &Row)> {
        self.rows
            .iter()
            .skip(self.first_data_row())
            .enumerate()
            .filter(|(_, r)| r.visible)
            .collect()
    }
}

impl TableLike for Table {
    fn id(&self) -> TableId {
        self.id
    }

    fn header_cells(&self) -> Option<&[String]> {
        match &self.head {
            Some(head) => Some(head.as_slice()),
            None => self.rows.first().map(|r| r.cells.as_slice()),
        }
    }

    fn data_row_count(&self) -> usize {
        self.rows.len().saturating_sub(self.first_data_row())
    }

    fn cell_text(&self, row: usize, column: usize) -> Option<&str> {
        self.data_row(row)
            .and_then(|r| r.cells.get(column))
            .map(String::as_str)
    }

    fn is_row_visible(&self, row: usize) -> bool {
        self.data_row(row).is_some_and(|r| r.visible)
    }

    fn set_row_visible(&mut self, row: usize, visible: bool) {
        if let Some(r) = self.data_row_mut(row) {
            r.visible = visible;
        }
    }

    fn is_row_filtered(&self, row: usize) -> bool {
        self.data_row(row).is_some_and(|r| r.filtered)
    }

    fn set_row_filtered(&mut self, row: usize, filtered: bool) {
        if let Some(r) = self.data_row_mut(row) {
            r.filtered = filtered;
        }
    }
}

/// All tables currently shown by the viewer.
#[derive(Debug, Default)]
pub struct Page {
    tables: Vec<Table>,
    next_id: TableId,
}

impl Page {
    pub fn next_id(&mut self) -> TableId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn push(&mut self, table: Table) -> TableId {
        let id = table.id();
        debug!("Adding table {} ({id}) to page", table.name());
        self.next_id = self.next_id.max(id + 1);
        self.tables.push(table);
        id
    }

    pub fn remove(&mut self, id: TableId) -> Option<Table> {
        let idx = self.tables.iter().position(|t| t.id() == id)?;
        Some(self.tables.remove(idx))
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.tables.iter().any(|t| t.path() == Some(path))
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn tables_mut(&mut self) -> &mut [Table] {
        &mut self.tables
    }

    pub fn get(&self, idx: usize) -> Option<&Table> {
        self.tables.get(idx)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
