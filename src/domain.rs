use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use std::fmt;
use std::io::Error;
use std::path::PathBuf;
use std::time::Duration;

use crate::position::PositionerConfig;

#[derive(Debug)]
pub enum LFError {
    IoError(Error),
    PolarsError(PolarsError),
    JsonError(serde_json::Error),
    WatchError(notify::Error),
    LoadingFailed(String),
    FileNotFound(PathBuf),
    PermissionDenied(PathBuf),
    UnknownFileType(PathBuf),
}

impl fmt::Display for LFError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LFError::IoError(e) => write!(f, "io error: {e}"),
            LFError::PolarsError(e) => write!(f, "polars error: {e}"),
            LFError::JsonError(e) => write!(f, "json error: {e}"),
            LFError::WatchError(e) => write!(f, "watch error: {e}"),
            LFError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            LFError::FileNotFound(p) => write!(f, "file not found: {}", p.display()),
            LFError::PermissionDenied(p) => write!(f, "permission denied: {}", p.display()),
            LFError::UnknownFileType(p) => write!(f, "unknown file type: {}", p.display()),
        }
    }
}

impl std::error::Error for LFError {}

impl From<Error> for LFError {
    fn from(err: Error) -> Self {
        LFError::IoError(err)
    }
}

impl From<PolarsError> for LFError {
    fn from(err: PolarsError) -> Self {
        LFError::PolarsError(err)
    }
}

impl From<notify::Error> for LFError {
    fn from(err: notify::Error) -> Self {
        LFError::WatchError(err)
    }
}

impl From<serde_json::Error> for LFError {
    fn from(err: serde_json::Error) -> Self {
        LFError::JsonError(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Help,
    Exit,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    NextTable,
    PreviousTable,
    ToggleFilter,
    TogglePanel,
    ToggleTitleBar,
    AddPlace,
    SelectPreviousPlace,
    SelectNextPlace,
    RemoveSelectedPlace,
    RawKey(KeyEvent),
    Resize(u16, u16),
    Scroll(i32),
    PointerDown(u16, u16, bool),
    PointerMove(u16, u16),
    PointerUp(u16, u16),
    TablesAdded(Vec<PathBuf>),
    TablesRemoved(Vec<PathBuf>),
}

/// Delays of the deferred work driven by `Model::tick`.
#[derive(Debug, Clone)]
pub struct TimingConfig {
    pub settle_delay: Duration,
    pub bounds_check_delay: Duration,
    pub expand_transition: Duration,
    pub position_recheck: Duration,
    pub resize_throttle: Duration,
    pub scroll_throttle: Duration,
    pub drag_throttle: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            bounds_check_delay: Duration::ZERO,
            expand_transition: Duration::from_millis(300),
            position_recheck: Duration::from_secs(2),
            resize_throttle: Duration::from_millis(100),
            scroll_throttle: Duration::from_millis(100),
            drag_throttle: Duration::from_millis(16),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LFConfig {
    pub event_poll_time: u64,
    pub has_header: bool,
    pub show_title_bar: bool,
    pub watch_dir: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
    pub timing: TimingConfig,
    pub positioner: PositionerConfig,
}

impl Default for LFConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 50,
            has_header: true,
            show_title_bar: true,
            watch_dir: None,
            store_path: None,
            timing: TimingConfig::default(),
            positioner: PositionerConfig::terminal(),
        }
    }
}

pub const EMPTY_PLACES_WARNING: &str = "Please add at least one place to filter by.";

pub const HELP_TEXT: &str = "\
q          quit
?          this help
Esc        close popup / cancel input
Up/Down    move one row
PgUp/PgDn  move one page
Home/End   first / last row
Tab        next table (Shift-Tab previous)
f          toggle the location filter
p          expand / collapse the filter panel
a          add a place
[ ]        select previous / next place
x, Del     remove the selected place
t          show / hide the title bar

Mouse: drag the panel header to move the panel, click it to
expand or collapse, click [ON]/[OFF] to toggle the filter and
the x next to a place to remove it.";
