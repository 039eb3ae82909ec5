// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

/// Pointer travel (sum of absolute deltas, in pixels) that turns a header
/// press into a drag.
pub const DRAG_THRESHOLD: f64 = 5.0;

/// Horizontal extent of a header cell, captured when the pointer goes down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderBox {
    pub left: f64,
    pub width: f64,
}

impl HeaderBox {
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width }
    }

    pub fn center(&self) -> f64 {
        self.left + self.width / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureState {
    Idle,
    Tracking {
        column: usize,
        sortable: bool,
        last: (f64, f64),
        travelled: f64,
        boxes: Vec<HeaderBox>,
    },
    Dragging {
        source: usize,
        marker: usize,
        boxes: Vec<HeaderBox>,
    },
    Sorting {
        column: usize,
    },
    Dropped {
        from: usize,
        to: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    Nothing,
    SortToggle { column: usize },
    Reorder { from: usize, to: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderGesture {
    state: GestureState,
}

impl Default for HeaderGesture {
    fn default() -> Self {
        Self {
            state: GestureState::Idle,
        }
    }
}

impl HeaderGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, GestureState::Idle)
    }

    /// Insertion marker while dragging: the slot before which the dragged
    /// column would land.
    pub fn marker(&self) -> Option<usize> {
        match &self.state {
            GestureState::Dragging { marker, .. } => Some(*marker),
            _ => None,
        }
    }

    pub fn press(&mut self, column: usize, sortable: bool, x: f64, y: f64, boxes: Vec<HeaderBox>) {
        self.state = if column < boxes.len() {
            GestureState::Tracking {
                column,
                sortable,
                last: (x, y),
                travelled: 0.0,
                boxes,
            }
        } else {
            GestureState::Idle
        };
    }

    /// Feeds a pointer position and returns the live insertion marker once
    /// the gesture has become a drag.
    pub fn move_to(&mut self, x: f64, y: f64) -> Option<usize> {
        let state = std::mem::replace(&mut self.state, GestureState::Idle);
        self.state = match state {
            GestureState::Tracking {
                column,
                sortable,
                last,
                travelled,
                boxes,
            } => {
                let travelled = travelled + (x - last.0).abs() + (y - last.1).abs();
                if travelled > DRAG_THRESHOLD {
                    let marker = insertion_marker(&boxes, x);
                    GestureState::Dragging {
                        source: column,
                        marker,
                        boxes,
                    }
                } else {
                    GestureState::Tracking {
                        column,
                        sortable,
                        last: (x, y),
                        travelled,
                        boxes,
                    }
                }
            }
            GestureState::Dragging { source, boxes, .. } => GestureState::Dragging {
                source,
                marker: insertion_marker(&boxes, x),
                boxes,
            },
            other => other,
        };
        self.marker()
    }

    pub fn release(&mut self, x: f64, y: f64) -> GestureOutcome {
        self.move_to(x, y);
        let state = std::mem::replace(&mut self.state, GestureState::Idle);
        match state {
            GestureState::Tracking {
                column,
                sortable: true,
                ..
            } => {
                self.state = GestureState::Sorting { column };
                GestureOutcome::SortToggle { column }
            }
            GestureState::Dragging { source, marker, .. } => {
                let to = if marker > source { marker - 1 } else { marker };
                if to == source {
                    return GestureOutcome::Nothing;
                }
                self.state = GestureState::Dropped { from: source, to };
                GestureOutcome::Reorder { from: source, to }
            }
            _ => GestureOutcome::Nothing,
        }
    }

    /// Returns to idle after the caller applied a sort or drop.
    pub fn settle(&mut self) {
        if matches!(
            self.state,
            GestureState::Sorting { .. } | GestureState::Dropped { .. }
        ) {
            self.state = GestureState::Idle;
        }
    }

    pub fn cancel(&mut self) {
        self.state = GestureState::Idle;
    }
}

fn insertion_marker(boxes: &[HeaderBox], x: f64) -> usize {
    boxes
        .iter()
        .position(|header| header.center() > x)
        .unwrap_or(boxes.len())
}

#[cfg(test)]
mod tests {
    use super::{GestureOutcome, GestureState, HeaderBox, HeaderGesture};

    fn boxes() -> Vec<HeaderBox> {
        (0..4)
            .map(|index| HeaderBox::new(f64::from(index) * 100.0, 100.0))
            .collect()
    }

    #[test]
    fn small_wiggle_resolves_as_sort() {
        let mut gesture = HeaderGesture::new();
        gesture.press(1, true, 150.0, 10.0, boxes());
        assert_eq!(gesture.move_to(152.0, 11.0), None);
        assert_eq!(
            gesture.release(153.0, 11.0),
            GestureOutcome::SortToggle { column: 1 }
        );
        assert_eq!(gesture.state(), &GestureState::Sorting { column: 1 });
        gesture.settle();
        assert!(gesture.is_idle());
    }

    #[test]
    fn movement_accumulates_across_directions() {
        let mut gesture = HeaderGesture::new();
        gesture.press(0, true, 50.0, 10.0, boxes());
        gesture.move_to(53.0, 10.0);
        gesture.move_to(50.0, 10.0);
        assert!(matches!(gesture.state(), GestureState::Dragging { .. }));
    }

    #[test]
    fn unsortable_click_does_nothing() {
        let mut gesture = HeaderGesture::new();
        gesture.press(2, false, 250.0, 10.0, boxes());
        assert_eq!(gesture.release(250.0, 10.0), GestureOutcome::Nothing);
        assert!(gesture.is_idle());
    }

    #[test]
    fn drag_right_reports_spliced_destination() {
        let mut gesture = HeaderGesture::new();
        gesture.press(0, true, 50.0, 10.0, boxes());
        assert_eq!(gesture.move_to(260.0, 10.0), Some(3));
        assert_eq!(
            gesture.release(260.0, 10.0),
            GestureOutcome::Reorder { from: 0, to: 2 }
        );
        assert_eq!(gesture.state(), &GestureState::Dropped { from: 0, to: 2 });
    }

    #[test]
    fn drag_past_last_header_moves_to_end() {
        let mut gesture = HeaderGesture::new();
        gesture.press(1, true, 150.0, 10.0, boxes());
        assert_eq!(
            gesture.release(900.0, 10.0),
            GestureOutcome::Reorder { from: 1, to: 3 }
        );
    }

    #[test]
    fn drag_left_and_drop_in_place() {
        let mut gesture = HeaderGesture::new();
        gesture.press(3, true, 350.0, 10.0, boxes());
        assert_eq!(
            gesture.release(10.0, 10.0),
            GestureOutcome::Reorder { from: 3, to: 0 }
        );

        gesture.settle();
        gesture.press(1, true, 150.0, 10.0, boxes());
        assert_eq!(gesture.release(190.0, 10.0), GestureOutcome::Nothing);
        assert!(gesture.is_idle());
    }

    #[test]
    fn cancel_returns_to_idle() {
        let mut gesture = HeaderGesture::new();
        gesture.press(0, true, 50.0, 10.0, boxes());
        gesture.move_to(200.0, 10.0);
        gesture.cancel();
        assert!(gesture.is_idle());
        assert_eq!(gesture.release(200.0, 10.0), GestureOutcome::Nothing);
    }
}
