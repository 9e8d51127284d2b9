//! Presentation state that sits beside the engine.
//!
//! [`UiState`] tracks the dropdown, the highlighted suggestion and which
//! committed expression is being edited. It never stores the grammar step or
//! the in-progress field and operator: those live only in the
//! [`StateMachine`](crate::StateMachine). Hosts feed it [`UiEvent`]s,
//! including [`UiEvent::StepChanged`] after every applied transition.

use crate::machine::StepKind;

/// Input to [`UiState::reduce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    /// The engine moved to a new step.
    StepChanged(StepKind),
    /// The suggestion list was replaced and now has this many items.
    ItemsChanged(usize),
    /// The committed list now has this many expressions.
    ListChanged(usize),
    Open,
    Close,
    HighlightNext,
    HighlightPrevious,
    /// Highlight a specific item, e.g. on hover. Out-of-range is ignored.
    Highlight(usize),
    /// Start editing the committed expression at this index.
    BeginEdit(usize),
    EndEdit,
}

/// Dropdown and editing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UiState {
    pub dropdown_open: bool,
    /// Highlighted suggestion; always `< item_count` when set.
    pub highlighted: Option<usize>,
    pub item_count: usize,
    /// Committed expression under edit.
    pub editing: Option<usize>,
    list_len: usize,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event and returns the next state.
    pub fn reduce(self, event: UiEvent) -> UiState {
        let mut next = self;
        match event {
            UiEvent::StepChanged(step) => {
                next.dropdown_open = step != StepKind::Idle;
                next.highlighted = None;
                if step == StepKind::Idle {
                    next.editing = None;
                }
            }
            UiEvent::ItemsChanged(count) => {
                next.item_count = count;
                next.highlighted = (count > 0 && next.dropdown_open).then_some(0);
            }
            UiEvent::ListChanged(len) => {
                next.list_len = len;
                next.editing = next.editing.filter(|&i| i < len);
            }
            UiEvent::Open => next.dropdown_open = true,
            UiEvent::Close => {
                next.dropdown_open = false;
                next.highlighted = None;
            }
            UiEvent::HighlightNext => next.highlighted = next.step_highlight(1),
            UiEvent::HighlightPrevious => next.highlighted = next.step_highlight(-1),
            UiEvent::Highlight(index) => {
                if next.dropdown_open && index < next.item_count {
                    next.highlighted = Some(index);
                }
            }
            UiEvent::BeginEdit(index) => {
                if index < next.list_len {
                    next.editing = Some(index);
                }
            }
            UiEvent::EndEdit => next.editing = None,
        }
        next
    }

    /// Wrapping move through the suggestion list.
    fn step_highlight(&self, delta: isize) -> Option<usize> {
        if !self.dropdown_open || self.item_count == 0 {
            return None;
        }
        let count = self.item_count as isize;
        let start = match self.highlighted {
            Some(i) => i as isize,
            None if delta > 0 => -1,
            None => count,
        };
        Some((start + delta).rem_euclid(count) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_with(items: usize) -> UiState {
        UiState::new()
            .reduce(UiEvent::StepChanged(StepKind::SelectingField))
            .reduce(UiEvent::ItemsChanged(items))
    }

    #[test]
    fn focus_opens_and_idle_closes() {
        let ui = open_with(3);
        assert!(ui.dropdown_open);
        assert_eq!(ui.highlighted, Some(0));

        let ui = ui.reduce(UiEvent::StepChanged(StepKind::Idle));
        assert!(!ui.dropdown_open);
        assert_eq!(ui.highlighted, None);
    }

    #[test]
    fn highlight_wraps() {
        let ui = open_with(3);
        let ui = ui.reduce(UiEvent::HighlightPrevious);
        assert_eq!(ui.highlighted, Some(2));
        let ui = ui.reduce(UiEvent::HighlightNext);
        assert_eq!(ui.highlighted, Some(0));
        assert_eq!(ui.reduce(UiEvent::Highlight(7)).highlighted, Some(0));
    }

    #[test]
    fn closed_or_empty_dropdown_has_no_highlight() {
        let ui = open_with(0).reduce(UiEvent::HighlightNext);
        assert_eq!(ui.highlighted, None);

        let ui = open_with(2).reduce(UiEvent::Close).reduce(UiEvent::HighlightNext);
        assert_eq!(ui.highlighted, None);
    }

    #[test]
    fn editing_tracks_list_length() {
        let ui = UiState::new().reduce(UiEvent::ListChanged(2));
        assert_eq!(ui.reduce(UiEvent::BeginEdit(5)).editing, None);

        let ui = ui.reduce(UiEvent::BeginEdit(1));
        assert_eq!(ui.editing, Some(1));
        assert_eq!(ui.reduce(UiEvent::ListChanged(1)).editing, None);
        assert_eq!(ui.reduce(UiEvent::EndEdit).editing, None);
    }
}
