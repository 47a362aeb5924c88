//! Viewport anchoring for the message list.
//!
//! Pure arithmetic over [`ScrollMetrics`] reported by the view. Mutations of
//! the message window are bracketed: the caller captures a snapshot right
//! before prepending or appending, and hands the post-render metrics back
//! once the view reflects the change.
//!
//! - Prepend: `scroll_top` grows by exactly the added height so the visible
//!   content does not move.
//! - Append: scroll to the bottom only if the viewer was within the
//!   threshold of it before the append.
//! - Reaching the very top requests an older page.

/// Distance from the bottom (px) under which the viewer counts as "at the
/// bottom".
pub const DEFAULT_BOTTOM_THRESHOLD: f64 = 150.0;

/// Scroll container measurements, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    /// Offset of the visible area from the top of the content.
    pub scroll_top: f64,
    /// Total content height.
    pub scroll_height: f64,
    /// Visible area height.
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Create metrics.
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self { scroll_top, scroll_height, client_height }
    }

    /// Distance between the bottom of the visible area and the end of the
    /// content.
    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - self.scroll_top - self.client_height).max(0.0)
    }

    /// `scroll_top` that shows the end of the content.
    pub fn bottom(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }
}

/// Viewport state captured immediately before a mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSnapshot {
    /// Content height before the mutation.
    pub previous_scroll_height: f64,
    /// Viewer was within the threshold of the bottom.
    pub was_at_bottom: bool,
}

/// How the view should move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    /// Jump without animation.
    Instant,
    /// Animate.
    Smooth,
}

/// Commands produced by the anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollCommand {
    /// Set the container's `scroll_top`.
    ScrollTo {
        /// Target offset.
        top: f64,
        /// Animation.
        behavior: ScrollBehavior,
    },
    /// Request the next older page.
    LoadMore,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pending {
    None,
    Prepend(ScrollSnapshot),
    Append(ScrollSnapshot),
}

/// Scroll bookkeeping for one room activation.
#[derive(Debug, Clone)]
pub struct ScrollAnchor {
    threshold: f64,
    /// First non-empty render has been scrolled to the bottom.
    initial_done: bool,
    /// Viewer was near the bottom at the last scroll event.
    was_at_bottom: bool,
    pending: Pending,
}

impl Default for ScrollAnchor {
    fn default() -> Self {
        Self::new(DEFAULT_BOTTOM_THRESHOLD)
    }
}

impl ScrollAnchor {
    /// Create an anchor with the given bottom threshold (px).
    pub fn new(threshold: f64) -> Self {
        Self { threshold, initial_done: false, was_at_bottom: true, pending: Pending::None }
    }

    /// Initial scroll to the bottom has happened.
    pub fn is_initial_done(&self) -> bool {
        self.initial_done
    }

    /// Viewer was near the bottom at the last observation.
    pub fn was_at_bottom(&self) -> bool {
        self.was_at_bottom
    }

    /// Snapshot waiting for the next render, if any.
    pub fn pending_snapshot(&self) -> Option<ScrollSnapshot> {
        match self.pending {
            Pending::None => None,
            Pending::Prepend(s) | Pending::Append(s) => Some(s),
        }
    }

    /// Observe a scroll event. Returns [`ScrollCommand::LoadMore`] when the
    /// top is reached and an older page may be requested.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics, can_load_more: bool) -> Option<ScrollCommand> {
        self.was_at_bottom = self.is_near_bottom(&metrics);

        if self.initial_done && metrics.scroll_top <= 0.0 && can_load_more {
            return Some(ScrollCommand::LoadMore);
        }
        None
    }

    /// Capture state before older messages are prepended.
    pub fn before_prepend(&mut self, metrics: ScrollMetrics) {
        self.pending = Pending::Prepend(self.snapshot(&metrics));
    }

    /// Capture state before new messages are appended.
    ///
    /// An outstanding prepend snapshot wins: its height delta already covers
    /// the appended content once the view renders.
    pub fn before_append(&mut self, metrics: ScrollMetrics) {
        if !matches!(self.pending, Pending::Prepend(_)) {
            self.pending = Pending::Append(self.snapshot(&metrics));
        }
    }

    /// Drop a snapshot whose mutation did not happen.
    pub fn discard_pending(&mut self) {
        self.pending = Pending::None;
    }

    /// The view rendered `message_count` messages with these metrics.
    pub fn after_render(&mut self, metrics: ScrollMetrics, message_count: usize) -> Option<ScrollCommand> {
        if !self.initial_done {
            self.pending = Pending::None;
            if message_count == 0 {
                return None;
            }
            self.initial_done = true;
            self.was_at_bottom = true;
            return Some(ScrollCommand::ScrollTo {
                top: metrics.bottom(),
                behavior: ScrollBehavior::Instant,
            });
        }

        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::None => None,
            Pending::Prepend(snapshot) => {
                let delta = metrics.scroll_height - snapshot.previous_scroll_height;
                Some(ScrollCommand::ScrollTo {
                    top: metrics.scroll_top + delta,
                    behavior: ScrollBehavior::Instant,
                })
            },
            Pending::Append(snapshot) if snapshot.was_at_bottom => {
                self.was_at_bottom = true;
                Some(ScrollCommand::ScrollTo {
                    top: metrics.bottom(),
                    behavior: ScrollBehavior::Smooth,
                })
            },
            Pending::Append(_) => None,
        }
    }

    /// Clear all bookkeeping for a new activation.
    pub fn reset(&mut self) {
        *self = Self::new(self.threshold);
    }

    fn is_near_bottom(&self, metrics: &ScrollMetrics) -> bool {
        metrics.distance_from_bottom() < self.threshold
    }

    fn snapshot(&self, metrics: &ScrollMetrics) -> ScrollSnapshot {
        ScrollSnapshot {
            previous_scroll_height: metrics.scroll_height,
            was_at_bottom: self.is_near_bottom(metrics),
        }
    }
}
