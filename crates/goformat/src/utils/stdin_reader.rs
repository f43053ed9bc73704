use anyhow::Context;
use anyhow::Result;
use std::io::Read;

#[cfg(test)]
pub use test_reader::TestStdInReader;

/// Source of the document text for `fmt --stdin`.
pub trait StdInReader: Clone + Send + Sync {
  fn read_text(&self) -> Result<String>;
}

#[derive(Default, Clone, Copy)]
pub struct RealStdInReader;

impl StdInReader for RealStdInReader {
  fn read_text(&self) -> Result<String> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text).context("Error reading stdin as UTF-8 text.")?;
    Ok(text)
  }
}
