//! List presentation: rows, styling, gestures and terminal rendering.
//!
//! The presentation never edits items itself. It mirrors the latest
//! [`SyncState`] and turns gestures into [`SyncAction`]s for the view-model.

use crate::screen::MenuItem;
use crate::sync::{SyncAction, SyncState};
use crate::types::{Item, ItemRef};
use owo_colors::OwoColorize;
use std::io;

/// How an item label is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextStyle {
    /// Normal weight, no decoration
    Plain,
    /// Strikethrough and italic
    Done,
}

impl TextStyle {
    /// Style for `item`: done items are struck through and italic.
    #[must_use]
    pub const fn for_item(item: &Item) -> Self {
        if item.is_done { Self::Done } else { Self::Plain }
    }

    /// `true` if the label is struck through.
    #[must_use]
    pub const fn is_strikethrough(self) -> bool {
        matches!(self, Self::Done)
    }

    /// `true` if the label is italic.
    #[must_use]
    pub const fn is_italic(self) -> bool {
        matches!(self, Self::Done)
    }
}

/// One rendered list entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    /// Item shown in this row
    pub item: ItemRef,
    /// Label style
    pub style: TextStyle,
}

impl From<&ItemRef> for Row {
    fn from(item: &ItemRef) -> Self {
        Self {
            style: TextStyle::for_item(&item.item),
            item: item.clone(),
        }
    }
}

/// A user interaction with the list or the entry field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gesture {
    /// Tap on the label of row `n`
    TapLabel(usize),
    /// Tap on the delete icon of row `n`
    TapDelete(usize),
    /// Submit the entry field
    Submit(String),
}

/// Current rows and entry field of the screen.
#[derive(Debug, Default)]
pub struct ListPresentation {
    rows: Vec<Row>,
    revision: Option<u64>,
    redraws: u64,
    entry: String,
}

impl ListPresentation {
    /// An empty list that has not been drawn yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror `state`, redrawing the whole list if it was replaced.
    ///
    /// Returns `true` if a redraw happened.
    pub fn apply(&mut self, state: &SyncState) -> bool {
        if self.revision == Some(state.revision) {
            return false;
        }
        self.revision = Some(state.revision);
        self.rows = state.items.iter().map(Row::from).collect();
        self.redraws += 1;
        tracing::trace!(rows = self.rows.len(), redraws = self.redraws, "List redrawn");
        true
    }

    /// Rows in display order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of whole-list redraws so far.
    #[must_use]
    pub const fn redraws(&self) -> u64 {
        self.redraws
    }

    /// Text currently in the entry field.
    #[must_use]
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Replace the text in the entry field.
    pub fn set_entry(&mut self, text: impl Into<String>) {
        self.entry = text.into();
    }

    /// Translate a gesture into a view-model action.
    ///
    /// Taps on rows that no longer exist yield `None`. Submitting clears the
    /// entry field and always produces an add, even for empty text.
    pub fn gesture(&mut self, gesture: Gesture) -> Option<SyncAction> {
        match gesture {
            Gesture::TapLabel(index) => self
                .rows
                .get(index)
                .map(|row| SyncAction::Toggle(row.item.clone())),
            Gesture::TapDelete(index) => self
                .rows
                .get(index)
                .map(|row| SyncAction::Delete(row.item.clone())),
            Gesture::Submit(text) => {
                self.entry.clear();
                Some(SyncAction::Add(Item::new(text)))
            },
        }
    }

    /// Write the list and the menu as ANSI-styled text.
    ///
    /// # Errors
    ///
    /// Returns any error from `out`.
    pub fn render<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        if self.rows.is_empty() {
            writeln!(out, "  {}", "(no items)".dimmed())?;
        }
        for (index, row) in self.rows.iter().enumerate() {
            let text = row.item.item.text.as_str();
            match row.style {
                TextStyle::Done => writeln!(
                    out,
                    "  {index:>2}. {}  {}",
                    text.strikethrough().italic(),
                    "[x]".red()
                )?,
                TextStyle::Plain => writeln!(out, "  {index:>2}. {text}  {}", "[x]".red())?,
            }
        }
        let menu: Vec<_> = MenuItem::ALL.iter().map(|item| item.label()).collect();
        writeln!(out, "  {} {}", "menu:".bold(), menu.join(" | "))
    }
}
