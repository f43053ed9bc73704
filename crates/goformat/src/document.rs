use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;

use crate::utils::TextChange;
use crate::utils::apply_text_changes;
use crate::utils::get_inverse_text_changes;
use crate::utils::get_text_changes;
use crate::utils::shift_offset;

/// An editable text buffer owned by the host.
pub trait Document {
  /// Whether this is a live buffer that may be edited. Formatting a
  /// document that isn't is a no-op.
  fn is_editable(&self) -> bool;
  /// The file backing the buffer. `None` for unsaved buffers.
  fn file_path(&self) -> Option<&Path>;
  fn text(&self) -> &str;
  /// Replaces the text by applying the minimal edits needed to reach
  /// `new_text`, so anchors outside the edits stay where they are.
  fn set_text_via_diff(&mut self, new_text: &str) -> Result<()>;
}

/// In-memory document with a cursor and an undo history.
#[derive(Debug, Clone, Default)]
pub struct TextDocument {
  file_path: Option<PathBuf>,
  text: String,
  cursor: usize,
  read_only: bool,
  closed: bool,
  undo_stack: Vec<Vec<TextChange>>,
}

impl TextDocument {
  pub fn new(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      ..Default::default()
    }
  }

  pub fn with_file_path(mut self, file_path: impl Into<PathBuf>) -> Self {
    self.file_path = Some(file_path.into());
    self
  }

  pub fn set_read_only(&mut self, read_only: bool) {
    self.read_only = read_only;
  }

  /// Detaches the buffer from its editor.
  pub fn close(&mut self) {
    self.closed = true;
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  /// Moves the cursor, snapping back to the nearest char boundary.
  pub fn set_cursor(&mut self, offset: usize) {
    let mut offset = offset.min(self.text.len());
    while !self.text.is_char_boundary(offset) {
      offset -= 1;
    }
    self.cursor = offset;
  }

  pub fn can_undo(&self) -> bool {
    !self.undo_stack.is_empty()
  }

  /// Reverts the last replacement. Returns false when there's nothing to undo.
  pub fn undo(&mut self) -> Result<bool> {
    let Some(changes) = self.undo_stack.pop() else {
      return Ok(false);
    };
    self.apply_changes(changes)?;
    Ok(true)
  }

  fn apply_changes(&mut self, changes: Vec<TextChange>) -> Result<Vec<TextChange>> {
    let inverse = get_inverse_text_changes(&self.text, &changes);
    let cursor = shift_offset(self.cursor, &changes);
    self.text = apply_text_changes(&self.text, changes)?;
    self.cursor = cursor;
    Ok(inverse)
  }
}

impl Document for TextDocument {
  fn is_editable(&self) -> bool {
    !self.closed && !self.read_only
  }

  fn file_path(&self) -> Option<&Path> {
    self.file_path.as_deref()
  }

  fn text(&self) -> &str {
    &self.text
  }

  fn set_text_via_diff(&mut self, new_text: &str) -> Result<()> {
    let changes = get_text_changes(&self.text, new_text);
    if changes.is_empty() {
      return Ok(());
    }
    let inverse = self.apply_changes(changes)?;
    self.undo_stack.push(inverse);
    Ok(())
  }
}
