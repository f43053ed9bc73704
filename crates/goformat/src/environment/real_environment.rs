use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
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

pub struct RealEnvironmentOptions {
  pub log_level: LogLevel,
  /// Whether stdout will be read by a program.
  pub is_stdout_machine_readable: bool,
}

#[derive(Clone)]
pub struct RealEnvironment {
  output_lock: Arc<Mutex<()>>,
  log_level: LogLevel,
  is_stdout_machine_readable: bool,
}

impl RealEnvironment {
  pub fn new(options: RealEnvironmentOptions) -> Self {
    RealEnvironment {
      output_lock: Default::default(),
      log_level: options.log_level,
      is_stdout_machine_readable: options.is_stdout_machine_readable,
    }
  }
}

impl Environment for RealEnvironment {
  fn log_level(&self) -> LogLevel {
    self.log_level
  }

  fn log(&self, text: &str) {
    if self.log_level == LogLevel::Silent || self.is_stdout_machine_readable {
      return;
    }
    let _g = self.output_lock.lock();
    #[allow(clippy::print_stdout)]
    {
      println!("{}", text);
    }
  }

  fn log_stderr(&self, text: &str) {
    let _g = self.output_lock.lock();
    #[allow(clippy::print_stderr)]
    {
      eprintln!("{}", text);
    }
  }

  fn write_stdout(&self, text: &str) {
    let _g = self.output_lock.lock();
    let mut stdout = std::io::stdout().lock();
    // nothing sensible to do if stdout was closed
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
  }

  fn cwd(&self) -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
  }

  fn read_file(&self, file_path: &Path) -> Result<String> {
    log_debug!(self, "Reading file: {}", file_path.display());
    std::fs::read_to_string(file_path).with_context(|| format!("Error reading file {}", file_path.display()))
  }

  fn write_file(&self, file_path: &Path, file_text: &str) -> Result<()> {
    log_debug!(self, "Writing file: {}", file_path.display());
    std::fs::write(file_path, file_text).with_context(|| format!("Error writing file {}", file_path.display()))
  }

  fn path_exists(&self, path: &Path) -> bool {
    path.exists()
  }

  fn find_tool(&self, tool: ToolName, project_root: Option<&Path>) -> BoxFuture<'static, Result<Option<String>>> {
    let cwd = project_root.map(|p| p.to_path_buf()).unwrap_or_else(|| self.cwd());
    let environment = self.clone();
    async move {
      log_debug!(environment, "Searching for {} from {}", tool, cwd.display());
      let search = tokio::task::spawn_blocking(move || which::which_in(tool.executable_name(), std::env::var_os("PATH"), cwd));
      match search.await? {
        Ok(path) => Ok(Some(path.to_string_lossy().to_string())),
        Err(which::Error::CannotFindBinaryPath) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("Error searching for {}.", tool)),
      }
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
    log_debug!(self, "Running: {} {}", command, args.join(" "));
    let mut cmd = Command::new(command);
    cmd
      .args(args)
      .envs(&options.env)
      .stdin(if options.input.is_some() { Stdio::piped() } else { Stdio::null() })
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    if let Some(cwd) = &options.cwd {
      cmd.current_dir(cwd);
    }
    let mut child = cmd.spawn().with_context(|| format!("Error starting {}", command))?;

    // write on another thread so a process filling its stdout pipe can't deadlock us
    let writer = match (child.stdin.take(), options.input.clone()) {
      (Some(mut stdin), Some(input)) => Some(std::thread::spawn(move || stdin.write_all(input.as_bytes()))),
      _ => None,
    };
    let output = child.wait_with_output().with_context(|| format!("Error waiting on {}", command))?;
    if let Some(writer) = writer {
      match writer.join() {
        Ok(result) => {
          // the process may exit without reading all its input
          if let Err(err) = result {
            log_debug!(self, "Error writing stdin of {}: {}", command, err);
          }
        }
        Err(_) => bail!("Thread writing stdin of {} panicked.", command),
      }
    }

    Ok(ExecOutput {
      exit_code: output.status.code().unwrap_or(-1),
      stdout: String::from_utf8(output.stdout).with_context(|| format!("Output of {} was not UTF-8.", command))?,
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
  }
}

#[cfg(all(test, unix))]
mod test {
  use super::*;

  fn environment() -> RealEnvironment {
    RealEnvironment::new(RealEnvironmentOptions {
      log_level: LogLevel::Silent,
      is_stdout_machine_readable: false,
    })
  }

  #[tokio::test]
  async fn resolves_missing_tool_without_error() {
    let environment = environment();
    // gofmt may or may not be installed, but searching must not fail either way
    let result = environment.find_tool(ToolName::Fmt, None).await.unwrap();
    if let Some(path) = result {
      assert!(Path::new(&path).is_absolute());
    }
  }

  #[test]
  fn pipes_input_through_process() {
    let environment = environment();
    let options = ExecOptions {
      input: Some("package main\n".to_string()),
      ..environment.exec_options(None)
    };
    let output = environment.exec_sync("cat", &[], &options).unwrap();
    assert!(output.is_success());
    assert_eq!(output.stdout, "package main\n");
  }

  #[test]
  fn reports_exit_code_and_stderr() {
    let environment = environment();
    let args = vec!["-c".to_string(), "echo 'bad syntax' >&2; exit 2".to_string()];
    let output = environment.exec_sync("sh", &args, &environment.exec_options(None)).unwrap();
    assert_eq!(output.exit_code, 2);
    assert_eq!(output.stdout, "");
    assert_eq!(output.stderr, "bad syntax\n");
  }

  #[test]
  fn runs_in_project_dir() {
    let dir = tempfile::tempdir().unwrap();
    let environment = environment();
    let output = environment.exec_sync("pwd", &[], &environment.exec_options(Some(dir.path()))).unwrap();
    let expected = std::fs::canonicalize(dir.path()).unwrap();
    assert_eq!(std::fs::canonicalize(output.stdout.trim()).unwrap(), expected);
  }

  #[test]
  fn errors_for_missing_command() {
    let environment = environment();
    let err = environment
      .exec_sync("goformat-testing-not-exists", &[], &environment.exec_options(None))
      .err()
      .unwrap();
    assert_eq!(err.to_string(), "Error starting goformat-testing-not-exists");
  }
}
