use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use anyhow::bail;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use super::Environment;
use super::ExecOptions;
use super::ExecOutput;
use crate::tools::ToolName;
use crate::utils::LogLevel;

type ExecHandler = Arc<dyn Fn(&[String], &ExecOptions) -> ExecOutput + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCall {
  pub command: String,
  pub args: Vec<String>,
  pub options: ExecOptions,
}

#[derive(Clone)]
pub struct TestEnvironment {
  cwd: Arc<Mutex<PathBuf>>,
  log_level: LogLevel,
  files: Arc<Mutex<HashMap<PathBuf, String>>>,
  /// Installed tools. A `None` root means the tool is found from any project.
  tools: Arc<Mutex<HashMap<(ToolName, Option<PathBuf>), String>>>,
  tool_lookup_error: Arc<Mutex<Option<String>>>,
  tool_lookups: Arc<Mutex<Vec<(ToolName, Option<PathBuf>)>>>,
  exec_handlers: Arc<Mutex<HashMap<String, ExecHandler>>>,
  exec_calls: Arc<Mutex<Vec<ExecCall>>>,
  stdout_text: Arc<Mutex<String>>,
  logged_messages: Arc<Mutex<Vec<String>>>,
  logged_errors: Arc<Mutex<Vec<String>>>,
}

impl Default for TestEnvironment {
  fn default() -> Self {
    Self::new()
  }
}

impl TestEnvironment {
  pub fn new() -> TestEnvironment {
    TestEnvironment {
      cwd: Arc::new(Mutex::new(PathBuf::from("/"))),
      log_level: LogLevel::Debug,
      files: Default::default(),
      tools: Default::default(),
      tool_lookup_error: Default::default(),
      tool_lookups: Default::default(),
      exec_handlers: Default::default(),
      exec_calls: Default::default(),
      stdout_text: Default::default(),
      logged_messages: Default::default(),
      logged_errors: Default::default(),
    }
  }

  pub fn set_cwd(&self, cwd: impl Into<PathBuf>) {
    *self.cwd.lock() = cwd.into();
  }

  /// Installs a tool found from every project.
  pub fn add_tool(&self, tool: ToolName, path: &str) {
    self.tools.lock().insert((tool, None), path.to_string());
  }

  /// Installs a tool only found from within the provided project.
  pub fn add_project_tool(&self, tool: ToolName, project_root: &str, path: &str) {
    self.tools.lock().insert((tool, Some(PathBuf::from(project_root))), path.to_string());
  }

  /// Makes every tool search fail with the provided message.
  pub fn set_tool_lookup_error(&self, message: Option<&str>) {
    *self.tool_lookup_error.lock() = message.map(|m| m.to_string());
  }

  pub fn take_tool_lookups(&self) -> Vec<(ToolName, Option<PathBuf>)> {
    std::mem::take(&mut *self.tool_lookups.lock())
  }

  pub fn set_exec_handler(&self, command: &str, handler: impl Fn(&[String], &ExecOptions) -> ExecOutput + Send + Sync + 'static) {
    self.exec_handlers.lock().insert(command.to_string(), Arc::new(handler));
  }

  /// Adds a command that transforms its stdin, failing with exit code 2
  /// when the transform returns an error.
  pub fn add_formatter(&self, command: &str, format: impl Fn(&str) -> Result<String, String> + Send + Sync + 'static) {
    self.set_exec_handler(command, move |_, options| {
      let input = options.input.as_deref().unwrap_or("");
      match format(input) {
        Ok(stdout) => ExecOutput {
          exit_code: 0,
          stdout,
          stderr: String::new(),
        },
        Err(stderr) => ExecOutput {
          exit_code: 2,
          stdout: String::new(),
          stderr,
        },
      }
    });
  }

  pub fn take_exec_calls(&self) -> Vec<ExecCall> {
    std::mem::take(&mut *self.exec_calls.lock())
  }

  pub fn take_stdout_text(&self) -> String {
    std::mem::take(&mut *self.stdout_text.lock())
  }

  pub fn take_logged_messages(&self) -> Vec<String> {
    std::mem::take(&mut *self.logged_messages.lock())
  }

  pub fn take_logged_errors(&self) -> Vec<String> {
    std::mem::take(&mut *self.logged_errors.lock())
  }

  fn resolve_tool(&self, tool: ToolName, project_root: Option<&Path>) -> Option<String> {
    let tools = self.tools.lock();
    project_root
      .and_then(|root| tools.get(&(tool, Some(root.to_path_buf()))))
      .or_else(|| tools.get(&(tool, None)))
      .cloned()
  }
}

impl Environment for TestEnvironment {
  fn log_level(&self) -> LogLevel {
    self.log_level
  }

  fn log(&self, text: &str) {
    self.logged_messages.lock().push(text.to_string());
  }

  fn log_stderr(&self, text: &str) {
    self.logged_errors.lock().push(text.to_string());
  }

  fn write_stdout(&self, text: &str) {
    self.stdout_text.lock().push_str(text);
  }

  fn cwd(&self) -> PathBuf {
    self.cwd.lock().clone()
  }

  fn read_file(&self, file_path: &Path) -> Result<String> {
    match self.files.lock().get(file_path) {
      Some(text) => Ok(text.clone()),
      None => bail!("Could not find file at path {}", file_path.display()),
    }
  }

  fn write_file(&self, file_path: &Path, file_text: &str) -> Result<()> {
    self.files.lock().insert(file_path.to_path_buf(), file_text.to_string());
    Ok(())
  }

  fn path_exists(&self, path: &Path) -> bool {
    self.files.lock().contains_key(path) || self.tools.lock().values().any(|p| Path::new(p) == path)
  }

  fn find_tool(&self, tool: ToolName, project_root: Option<&Path>) -> BoxFuture<'static, Result<Option<String>>> {
    let environment = self.clone();
    let project_root = project_root.map(|p| p.to_path_buf());
    async move {
      // suspend like a real search would so concurrent callers interleave
      tokio::task::yield_now().await;
      environment.tool_lookups.lock().push((tool, project_root.clone()));
      let lookup_error = environment.tool_lookup_error.lock().clone();
      if let Some(message) = lookup_error {
        bail!("{}", message);
      }
      Ok(environment.resolve_tool(tool, project_root.as_deref()))
    }
    .boxed()
  }

  fn exec_options(&self, project_root: Option<&Path>) -> ExecOptions {
    ExecOptions {
      cwd: Some(project_root.map(|p| p.to_path_buf()).unwrap_or_else(|| self.cwd())),
      ..Default::default()
    }
  }

  fn exec_sync(&self, command: &str, args: &[String], options: &ExecOptions) -> Result<ExecOutput> {
    self.exec_calls.lock().push(ExecCall {
      command: command.to_string(),
      args: args.to_vec(),
      options: options.clone(),
    });
    let handler = self.exec_handlers.lock().get(command).cloned();
    match handler {
      Some(handler) => Ok(handler(args, options)),
      None => bail!("Error starting {}", command),
    }
  }
}
