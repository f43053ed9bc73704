// apply_text_changes lifted from:
//   https://github.com/denoland/deno_ast/blob/0074ac42a1a57e7805c0c4cc03b95a5717b47f3a/src/text_changes.rs
// Copyright 2018-2023 the Deno authors. All rights reserved. MIT license.

use anyhow::bail;
use anyhow::Result;
use std::cmp::Ordering;
use std::ops::Range;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChange {
  /// Range start to end byte index.
  pub range: Range<usize>,
  /// New text to insert or replace at the provided range.
  pub new_text: String,
}

impl TextChange {
  pub fn new(start: usize, end: usize, new_text: String) -> Self {
    Self { range: start..end, new_text }
  }
}

/// Gets the minimal changes that turn `old_text` into `new_text`.
///
/// The changes are ordered, don't overlap, and have ranges that fall on
/// char boundaries of `old_text`.
pub fn get_text_changes(old_text: &str, new_text: &str) -> Vec<TextChange> {
  let mut changes = Vec::new();
  let mut pending: Option<TextChange> = None;
  let mut index = 0;

  for chunk in dissimilar::diff(old_text, new_text) {
    match chunk {
      dissimilar::Chunk::Equal(text) => {
        if let Some(change) = pending.take() {
          changes.push(change);
        }
        index += text.len();
      }
      dissimilar::Chunk::Delete(text) => {
        let change = pending.get_or_insert_with(|| TextChange::new(index, index, String::new()));
        change.range.end += text.len();
        index += text.len();
      }
      dissimilar::Chunk::Insert(text) => {
        let change = pending.get_or_insert_with(|| TextChange::new(index, index, String::new()));
        change.new_text.push_str(text);
      }
    }
  }
  if let Some(change) = pending {
    changes.push(change);
  }

  changes
}

/// Gets the changes that undo the provided changes once they've been applied.
///
/// The provided changes must be sorted and must not overlap.
pub fn get_inverse_text_changes(old_text: &str, changes: &[TextChange]) -> Vec<TextChange> {
  let mut delta = 0isize;
  let mut inverse = Vec::with_capacity(changes.len());
  for change in changes {
    let start = (change.range.start as isize + delta) as usize;
    inverse.push(TextChange::new(start, start + change.new_text.len(), old_text[change.range.clone()].to_string()));
    delta += change.new_text.len() as isize - change.range.len() as isize;
  }
  inverse
}

/// Maps a byte offset in the original text to where it lands after
/// the changes are applied. An offset within a replaced range moves
/// to the end of the replacement text.
pub fn shift_offset(offset: usize, changes: &[TextChange]) -> usize {
  let mut delta = 0isize;
  for change in changes {
    if change.range.end <= offset {
      delta += change.new_text.len() as isize - change.range.len() as isize;
    } else if change.range.start < offset {
      return (change.range.start as isize + delta) as usize + change.new_text.len();
    } else {
      break;
    }
  }
  (offset as isize + delta) as usize
}

/// Applies the text changes to the given source text.
pub fn apply_text_changes(source: &str, mut changes: Vec<TextChange>) -> Result<String> {
  changes.sort_by(|a, b| match a.range.start.cmp(&b.range.start) {
    Ordering::Equal => a.range.end.cmp(&b.range.end),
    ordering => ordering,
  });

  let mut last_index = 0;
  let mut final_text = String::new();

  for (i, change) in changes.iter().enumerate() {
    if change.range.start > change.range.end {
      bail!(
        "Text change had start index {} greater than end index {}.\n\n{:?}",
        change.range.start,
        change.range.end,
        &changes[0..i + 1],
      )
    }
    if change.range.start < last_index {
      bail!(
        "Text changes were overlapping. Past index was {}, but new change had index {}.\n\n{:?}",
        last_index,
        change.range.start,
        &changes[0..i + 1]
      );
    } else if change.range.start > last_index && last_index < source.len() {
      final_text.push_str(&source[last_index..std::cmp::min(source.len(), change.range.start)]);
    }
    final_text.push_str(&change.new_text);
    last_index = change.range.end;
  }

  if last_index < source.len() {
    final_text.push_str(&source[last_index..]);
  }

  Ok(final_text)
}
