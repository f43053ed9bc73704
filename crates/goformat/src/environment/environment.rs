use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use futures::future::BoxFuture;

use crate::tools::ToolName;
use crate::utils::LogLevel;

/// Options for running a tool process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
  pub cwd: Option<PathBuf>,
  /// Variables added to the inherited environment.
  pub env: HashMap<String, String>,
  /// Text piped to stdin.
  pub input: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
  pub exit_code: i32,
  pub stdout: String,
  pub stderr: String,
}

impl ExecOutput {
  pub fn is_success(&self) -> bool {
    self.exit_code == 0
  }
}

pub trait Environment: Clone + Send + Sync + 'static {
  fn log_level(&self) -> LogLevel;
  fn is_verbose(&self) -> bool {
    self.log_level() == LogLevel::Debug
  }
  fn log(&self, text: &str);
  fn log_stderr(&self, text: &str);
  /// Writes text to stdout as-is. Used for output read by other programs.
  fn write_stdout(&self, text: &str);
  fn cwd(&self) -> PathBuf;
  fn read_file(&self, file_path: &Path) -> Result<String>;
  fn write_file(&self, file_path: &Path, file_text: &str) -> Result<()>;
  fn path_exists(&self, path: &Path) -> bool;
  /// Searches for the tool's executable on behalf of the provided project.
  ///
  /// Resolves to `Ok(None)` when the tool isn't installed. Errors are
  /// reserved for failures of the search itself.
  fn find_tool(&self, tool: ToolName, project_root: Option<&Path>) -> BoxFuture<'static, Result<Option<String>>>;
  /// Gets the options for running a tool within a project.
  fn exec_options(&self, project_root: Option<&Path>) -> ExecOptions;
  /// Runs the command to completion, blocking the current thread.
  fn exec_sync(&self, command: &str, args: &[String], options: &ExecOptions) -> Result<ExecOutput>;
}

// use macros here so the expressions provided are only evaluated when the level is enabled

macro_rules! log_debug {
  ($environment:expr, $($arg:tt)*) => {
    if $environment.is_verbose() {
      let mut text = String::from("[DEBUG]: ");
      text.push_str(&format!($($arg)*));
      $environment.log_stderr(&text);
    }
  }
}

macro_rules! log_warn {
  ($environment:expr, $($arg:tt)*) => {
    if $environment.log_level() <= $crate::utils::LogLevel::Warn {
      $environment.log_stderr(&format!($($arg)*));
    }
  }
}

macro_rules! log_error {
  ($environment:expr, $($arg:tt)*) => {
    if $environment.log_level() <= $crate::utils::LogLevel::Error {
      $environment.log_stderr(&format!($($arg)*));
    }
  }
}
