use derive_setters::Setters;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn right(&self) -> i32 {
        self.origin.x + self.size.width
    }

    pub fn bottom(&self) -> i32 {
        self.origin.y + self.size.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.origin.x && p.x < self.right() && p.y >= self.origin.y && p.y < self.bottom()
    }
}

/// Panel width and right margin used up to (and including) a viewport width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    pub max_viewport_width: i32,
    pub panel_width: i32,
    pub right_margin: i32,
}

#[derive(Debug, Clone, Setters)]
pub struct PositionerConfig {
    /// Minimum distance between panel and viewport edges.
    pub edge_margin: i32,
    /// Sorted by `max_viewport_width`, narrowest first.
    pub breakpoints: Vec<Breakpoint>,
    pub panel_width: i32,
    pub right_margin: i32,
    /// Gap between the page header and an anchored panel.
    pub header_gap: i32,
    /// Top offset of an anchored panel when no header is shown.
    pub fallback_top: i32,
    pub transition: Duration,
    pub click_suppression: Duration,
}

impl Default for PositionerConfig {
    fn default() -> Self {
        Self {
            edge_margin: 15,
            breakpoints: vec![
                Breakpoint {
                    max_viewport_width: 480,
                    panel_width: 200,
                    right_margin: 10,
                },
                Breakpoint {
                    max_viewport_width: 768,
                    panel_width: 220,
                    right_margin: 15,
                },
            ],
            panel_width: 240,
            right_margin: 20,
            header_gap: 20,
            fallback_top: 120,
            transition: Duration::from_millis(400),
            click_suppression: Duration::from_millis(10),
        }
    }
}

impl PositionerConfig {
    /// Same rules in terminal cells.
    pub fn terminal() -> Self {
        Self::default()
            .edge_margin(1)
            .breakpoints(vec![
                Breakpoint {
                    max_viewport_width: 60,
                    panel_width: 26,
                    right_margin: 1,
                },
                Breakpoint {
                    max_viewport_width: 100,
                    panel_width: 30,
                    right_margin: 1,
                },
            ])
            .panel_width(34)
            .right_margin(2)
            .header_gap(1)
            .fallback_top(3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Anchored,
    Pinned(Point),
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    start: Point,
    offset: Point,
    // Rendered size at drag start, used for clamping until the drag ends.
    frozen: Size,
    moved: bool,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: Point,
    to: Point,
    start: Instant,
    duration: Duration,
}

impl Transition {
    fn at(&self, now: Instant) -> Option<Point> {
        let elapsed = now.saturating_duration_since(self.start);
        if elapsed >= self.duration || self.duration.is_zero() {
            return None;
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let lerp = |a: i32, b: i32| a + ((b - a) as f64 * t).round() as i32;
        Some(Point::new(
            lerp(self.from.x, self.to.x),
            lerp(self.from.y, self.to.y),
        ))
    }
}

/// Keeps the floating panel inside the viewport across drags, resizes and
/// expand/collapse.
#[derive(Debug)]
pub struct PanelPositioner {
    config: PositionerConfig,
    placement: Placement,
    anchor: Point,
    drag: Option<Drag>,
    transition: Option<Transition>,
    suppress_click_until: Option<Instant>,
}

impl PanelPositioner {
    pub fn new(config: PositionerConfig) -> Self {
        Self {
            config,
            placement: Placement::Anchored,
            anchor: Point::default(),
            drag: None,
            transition: None,
            suppress_click_until: None,
        }
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn is_repositioning(&self, now: Instant) -> bool {
        self.transition.is_some_and(|t| t.at(now).is_some())
    }

    fn breakpoint(&self, viewport_width: i32) -> (i32, i32) {
        self.config
            .breakpoints
            .iter()
            .find(|b| viewport_width <= b.max_viewport_width)
            .map(|b| (b.panel_width, b.right_margin))
            .unwrap_or((self.config.panel_width, self.config.right_margin))
    }

    pub fn responsive_width(&self, viewport_width: i32) -> i32 {
        self.breakpoint(viewport_width).0
    }

    /// Clamps each axis into `[margin, viewport - size - margin]`. When the
    /// panel does not fit, the minimum wins.
    pub fn clamp(&self, p: Point, size: Size, viewport: Size) -> Point {
        let m = self.config.edge_margin;
        let max_x = viewport.width - size.width - m;
        let max_y = viewport.height - size.height - m;
        Point::new(p.x.min(max_x).max(m), p.y.min(max_y).max(m))
    }

    pub fn anchored_origin(&self, viewport: Size, header_height: Option<i32>) -> Point {
        let (width, right_margin) = self.breakpoint(viewport.width);
        let top = header_height
            .map(|h| h + self.config.header_gap)
            .unwrap_or(self.config.fallback_top);
        Point::new(
            viewport.width - right_margin - width,
            top.max(self.config.edge_margin),
        )
    }

    /// Where the panel is drawn at `now`, following a running transition.
    pub fn origin(&self, now: Instant) -> Point {
        if let Some(p) = self.transition.and_then(|t| t.at(now)) {
            return p;
        }
        match self.placement {
            Placement::Anchored => self.anchor,
            Placement::Pinned(p) => p,
        }
    }

    pub fn rect(&self, now: Instant, viewport: Size, panel_height: i32) -> Rect {
        let origin = self.origin(now);
        Rect {
            origin,
            size: Size::new(self.responsive_width(viewport.width), panel_height),
        }
    }

    // ------------------------------- Dragging ------------------------------ //

    /// Starts a drag from the panel header. Only the primary button starts a
    /// drag and never from the toggle control.
    pub fn begin_drag(&mut self, pointer: Point, panel: Rect, on_toggle: bool, primary: bool) -> bool {
        if !primary || on_toggle {
            return false;
        }
        self.drag = Some(Drag {
            start: pointer,
            offset: Point::new(pointer.x - panel.origin.x, pointer.y - panel.origin.y),
            frozen: panel.size,
            moved: false,
        });
        self.transition = None;
        trace!("Drag started at {pointer:?}, panel {panel:?}");
        true
    }

    pub fn drag_to(&mut self, pointer: Point, viewport: Size) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        if pointer == drag.start && !drag.moved {
            return;
        }
        drag.moved = true;
        let wanted = Point::new(pointer.x - drag.offset.x, pointer.y - drag.offset.y);
        let frozen = drag.frozen;
        let pinned = self.clamp(wanted, frozen, viewport);
        self.placement = Placement::Pinned(pinned);
        self.transition = None;
    }

    /// Ends the drag. Returns whether the panel was actually moved; in that
    /// case the following header click is swallowed.
    pub fn end_drag(&mut self, now: Instant) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        if drag.moved {
            self.suppress_click_until = Some(now + self.config.click_suppression);
            debug!("Panel pinned at {:?}", self.placement);
        }
        drag.moved
    }

    pub fn accept_header_click(&mut self, now: Instant) -> bool {
        match self.suppress_click_until.take() {
            Some(until) if now <= until => false,
            _ => true,
        }
    }

    // ----------------------------- Repositioning --------------------------- //

    pub fn on_resize(&mut self, viewport: Size, header_height: Option<i32>, panel_height: i32, now: Instant) {
        if self.is_dragging() {
            return;
        }
        match self.placement {
            Placement::Pinned(_) => self.reclamp(viewport, panel_height, Some(now)),
            Placement::Anchored => self.anchor = self.anchored_origin(viewport, header_height),
        }
    }

    /// Periodic, scroll and navigation path. Never animates.
    pub fn adjust(&mut self, viewport: Size, header_height: Option<i32>, panel_height: i32) {
        match self.placement {
            Placement::Pinned(_) => self.reclamp(viewport, panel_height, None),
            Placement::Anchored => self.anchor = self.anchored_origin(viewport, header_height),
        }
    }

    /// Called once the panel body finished expanding or collapsing.
    pub fn ensure_within_bounds(&mut self, viewport: Size, panel: Rect, now: Instant) {
        if self.is_dragging() {
            return;
        }
        if let Placement::Pinned(_) = self.placement {
            self.reclamp(viewport, panel.size.height, Some(now));
            return;
        }

        let m = self.config.edge_margin;
        let mut target = panel.origin;
        let mut reposition = false;
        if panel.origin.x < m {
            target.x = m;
            reposition = true;
        } else if panel.right() > viewport.width - m {
            target.x = viewport.width - panel.size.width - m;
            reposition = true;
        }
        if panel.origin.y < m {
            target.y = m;
            reposition = true;
        } else if panel.bottom() > viewport.height - m {
            target.y = m.max(viewport.height - panel.size.height - m);
            reposition = true;
        }

        if reposition {
            // Pin at the spot where the panel is drawn, then move into bounds.
            self.placement = Placement::Pinned(panel.origin);
            self.transition = None;
            let size = Size::new(self.responsive_width(viewport.width), panel.size.height);
            let to = self.clamp(target, size, viewport);
            self.move_to(to, Some(now));
        }
    }

    fn reclamp(&mut self, viewport: Size, panel_height: i32, animate: Option<Instant>) {
        let Placement::Pinned(current) = self.placement else {
            return;
        };
        let size = Size::new(self.responsive_width(viewport.width), panel_height);
        let target = self.clamp(current, size, viewport);
        self.move_to(target, animate);
    }

    fn move_to(&mut self, target: Point, animate: Option<Instant>) {
        let Placement::Pinned(current) = self.placement else {
            return;
        };
        if target == current {
            return;
        }
        match animate {
            Some(now) => {
                let from = self.origin(now);
                self.transition = Some(Transition {
                    from,
                    to: target,
                    start: now,
                    duration: self.config.transition,
                });
            }
            None => self.transition = None,
        }
        trace!("Panel moved {current:?} -> {target:?}");
        self.placement = Placement::Pinned(target);
    }
}
