//! Floating launcher bubble: a position with visible, peeking, and dragging modes.
//!
//! [`BubbleState`] holds the transition rules. [`BubblePositionStore`] owns one state, the current
//! screen bounds, and a debounced writer for the remembered visible position.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::Duration,
};

use leptos::logging;
use platform_host::{PrefsStore, TaskHost};
use serde::{Deserialize, Serialize};

use crate::{
    debounce::Debouncer,
    listeners::{Listeners, SubscriptionId},
    model::{Point, ScreenBounds},
    persistence::{self, StorageKeys},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BubbleConfig {
    pub width: f64,
    pub height: f64,
    /// Distance from a side within which a release snaps to peeking.
    pub edge_threshold: f64,
    /// Visible grab-handle width while peeking.
    pub peek_width: f64,
    /// Visible position used when nothing is remembered; right edge, mid-height when `None`.
    pub default_position: Option<Point>,
}

impl Default for BubbleConfig {
    fn default() -> Self {
        Self {
            width: 56.0,
            height: 56.0,
            edge_threshold: 24.0,
            peek_width: 16.0,
            default_position: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Edge {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BubbleMode {
    Visible,
    Peeking(Edge),
    Dragging,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BubbleState {
    config: BubbleConfig,
    mode: BubbleMode,
    position: Point,
    last_visible: Option<Point>,
    push_aside: bool,
    /// The user chose visible while push-aside was active.
    user_override: bool,
    /// The current peek was caused by push-aside rather than by the user.
    hidden_by_push_aside: bool,
}

impl BubbleState {
    pub fn new(config: BubbleConfig, bounds: &ScreenBounds) -> Self {
        let mut state = Self {
            config,
            mode: BubbleMode::Visible,
            position: Point::default(),
            last_visible: None,
            push_aside: false,
            user_override: false,
            hidden_by_push_aside: false,
        };
        state.position = state.default_position(bounds);
        state
    }

    pub fn config(&self) -> &BubbleConfig {
        &self.config
    }

    pub fn mode(&self) -> BubbleMode {
        self.mode
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn last_visible(&self) -> Option<Point> {
        self.last_visible
    }

    pub fn is_peeking(&self) -> bool {
        matches!(self.mode, BubbleMode::Peeking(_))
    }

    pub fn user_override(&self) -> bool {
        self.user_override
    }

    /// Applies a stored visible position, clamped to `bounds`.
    pub fn load(&mut self, stored: Option<Point>, bounds: &ScreenBounds) {
        let Some(stored) = stored else {
            return;
        };
        let clamped = self.clamp(stored, bounds);
        self.last_visible = Some(clamped);
        match self.mode {
            BubbleMode::Visible => self.position = clamped,
            BubbleMode::Peeking(edge) => {
                self.position = self.peek_position(edge, clamped.y, bounds)
            }
            BubbleMode::Dragging => {}
        }
    }

    pub fn begin_drag(&mut self) {
        self.mode = BubbleMode::Dragging;
        self.hidden_by_push_aside = false;
    }

    /// Follows the pointer; ignored unless dragging.
    pub fn drag_to(&mut self, position: Point) -> bool {
        if self.mode != BubbleMode::Dragging {
            return false;
        }
        self.position = position;
        true
    }

    /// Ends a drag. Returns the new remembered visible position, or `None` when the bubble
    /// snapped to an edge or was not being dragged.
    pub fn release(&mut self, bounds: &ScreenBounds) -> Option<Point> {
        if self.mode != BubbleMode::Dragging {
            return None;
        }
        let threshold = self.config.edge_threshold;
        let edge = if self.position.x <= bounds.min_x() + threshold {
            Some(Edge::Left)
        } else if self.position.x + self.config.width >= bounds.max_x() - threshold {
            Some(Edge::Right)
        } else {
            None
        };

        if let Some(edge) = edge {
            self.mode = BubbleMode::Peeking(edge);
            self.position = self.peek_position(edge, self.position.y, bounds);
            return None;
        }

        let clamped = self.clamp(self.position, bounds);
        self.mode = BubbleMode::Visible;
        self.position = clamped;
        self.last_visible = Some(clamped);
        if self.push_aside {
            self.user_override = true;
        }
        Some(clamped)
    }

    /// A tap while peeking returns to the remembered visible position.
    pub fn tap(&mut self, bounds: &ScreenBounds) -> bool {
        if !self.is_peeking() {
            return false;
        }
        self.show(bounds);
        self.hidden_by_push_aside = false;
        if self.push_aside {
            self.user_override = true;
        }
        true
    }

    /// Feeds the push-aside signal. Returns `true` when the mode or position changed.
    pub fn set_push_aside(&mut self, active: bool, bounds: &ScreenBounds) -> bool {
        if active == self.push_aside {
            return false;
        }
        self.push_aside = active;
        if self.mode == BubbleMode::Dragging {
            return false;
        }

        if active {
            self.user_override = false;
            if self.mode != BubbleMode::Visible {
                return false;
            }
            let edge = self.nearest_edge(bounds);
            self.mode = BubbleMode::Peeking(edge);
            self.position = self.peek_position(edge, self.position.y, bounds);
            self.hidden_by_push_aside = true;
            true
        } else if self.hidden_by_push_aside {
            self.hidden_by_push_aside = false;
            self.show(bounds);
            true
        } else {
            false
        }
    }

    /// Re-clamps after a screen size or safe-area change.
    pub fn set_bounds(&mut self, bounds: &ScreenBounds) {
        self.last_visible = self.last_visible.map(|p| self.clamp(p, bounds));
        match self.mode {
            BubbleMode::Visible => self.position = self.clamp(self.position, bounds),
            BubbleMode::Peeking(edge) => {
                self.position = self.peek_position(edge, self.position.y, bounds)
            }
            BubbleMode::Dragging => {}
        }
    }

    pub fn clamp(&self, position: Point, bounds: &ScreenBounds) -> Point {
        let max_x = (bounds.max_x() - self.config.width).max(bounds.min_x());
        let max_y = (bounds.max_y() - self.config.height).max(bounds.min_y());
        Point::new(
            position.x.clamp(bounds.min_x(), max_x),
            position.y.clamp(bounds.min_y(), max_y),
        )
    }

    pub fn default_position(&self, bounds: &ScreenBounds) -> Point {
        let candidate = self.config.default_position.unwrap_or_else(|| {
            Point::new(
                bounds.max_x() - self.config.width - self.config.edge_threshold,
                (bounds.min_y() + bounds.max_y() - self.config.height) / 2.0,
            )
        });
        self.clamp(candidate, bounds)
    }

    fn show(&mut self, bounds: &ScreenBounds) {
        let target = self
            .last_visible
            .unwrap_or_else(|| self.default_position(bounds));
        self.mode = BubbleMode::Visible;
        self.position = self.clamp(target, bounds);
    }

    fn nearest_edge(&self, bounds: &ScreenBounds) -> Edge {
        let center = self.position.x + self.config.width / 2.0;
        if center < (bounds.min_x() + bounds.max_x()) / 2.0 {
            Edge::Left
        } else {
            Edge::Right
        }
    }

    fn peek_position(&self, edge: Edge, y: f64, bounds: &ScreenBounds) -> Point {
        let x = match edge {
            Edge::Left => bounds.min_x() - (self.config.width - self.config.peek_width),
            Edge::Right => bounds.max_x() - self.config.peek_width,
        };
        let max_y = (bounds.max_y() - self.config.height).max(bounds.min_y());
        Point::new(x, y.clamp(bounds.min_y(), max_y))
    }
}

struct BubbleInner {
    state: RefCell<BubbleState>,
    bounds: Cell<ScreenBounds>,
    /// Any gesture before the stored position arrives keeps the live position.
    touched: Cell<bool>,
    prefs: Rc<dyn PrefsStore>,
    tasks: Rc<dyn TaskHost>,
    keys: StorageKeys,
    writer: Debouncer,
    listeners: Listeners<BubbleState>,
}

/// Shared handle to the bubble state with debounced position persistence.
#[derive(Clone)]
pub struct BubblePositionStore {
    inner: Rc<BubbleInner>,
}

impl BubblePositionStore {
    pub fn new(
        prefs: Rc<dyn PrefsStore>,
        tasks: Rc<dyn TaskHost>,
        keys: StorageKeys,
        debounce: Duration,
        config: BubbleConfig,
        bounds: ScreenBounds,
    ) -> Self {
        let writer = Debouncer::new(tasks.clone(), debounce);
        Self {
            inner: Rc::new(BubbleInner {
                state: RefCell::new(BubbleState::new(config, &bounds)),
                bounds: Cell::new(bounds),
                touched: Cell::new(false),
                prefs,
                tasks,
                keys,
                writer,
                listeners: Listeners::default(),
            }),
        }
    }

    pub fn start(&self) {
        let weak = Rc::downgrade(&self.inner);
        let prefs = self.inner.prefs.clone();
        let keys = self.inner.keys.clone();
        self.inner.tasks.spawn_local(Box::pin(async move {
            let stored = persistence::load_bubble_position(prefs.as_ref(), &keys).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.touched.get() {
                return;
            }
            let store = BubblePositionStore { inner };
            store.mutate(|state, bounds| {
                state.load(stored, bounds);
                true
            });
        }));
    }

    pub fn state(&self) -> BubbleState {
        self.inner.state.borrow().clone()
    }

    pub fn bounds(&self) -> ScreenBounds {
        self.inner.bounds.get()
    }

    pub fn set_bounds(&self, bounds: ScreenBounds) {
        self.inner.bounds.set(bounds);
        self.mutate(|state, bounds| {
            state.set_bounds(bounds);
            true
        });
    }

    pub fn begin_drag(&self) {
        self.inner.touched.set(true);
        self.mutate(|state, _| {
            state.begin_drag();
            true
        });
    }

    pub fn drag_to(&self, position: Point) {
        self.mutate(|state, _| state.drag_to(position));
    }

    pub fn release(&self) {
        let mut remembered = None;
        self.mutate(|state, bounds| {
            let was_dragging = state.mode() == BubbleMode::Dragging;
            remembered = state.release(bounds);
            was_dragging
        });
        if let Some(position) = remembered {
            self.schedule_persist(position);
        }
    }

    pub fn tap(&self) {
        self.inner.touched.set(true);
        self.mutate(|state, bounds| state.tap(bounds));
    }

    pub fn set_push_aside(&self, active: bool) {
        self.mutate(|state, bounds| state.set_push_aside(active, bounds));
    }

    pub fn subscribe(&self, listener: impl Fn(&BubbleState) + 'static) -> SubscriptionId {
        self.inner.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    pub fn dispose(&self) {
        self.inner.writer.cancel();
    }

    fn mutate(&self, apply: impl FnOnce(&mut BubbleState, &ScreenBounds) -> bool) {
        let bounds = self.inner.bounds.get();
        let changed = apply(&mut self.inner.state.borrow_mut(), &bounds);
        if changed {
            self.inner.listeners.emit(&self.state());
        }
    }

    fn schedule_persist(&self, position: Point) {
        let prefs = self.inner.prefs.clone();
        let tasks = self.inner.tasks.clone();
        let keys = self.inner.keys.clone();
        self.inner.writer.schedule(move || {
            tasks.spawn_local(Box::pin(async move {
                if let Err(err) =
                    persistence::save_bubble_position(prefs.as_ref(), &keys, position).await
                {
                    logging::warn!("persist bubble position failed: {err}");
                }
            }));
        });
    }
}
