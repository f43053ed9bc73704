use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use anyhow::anyhow;
use thiserror::Error;
use tokio::sync::watch;

use crate::arg_parser::CliArgs;
use crate::arg_parser::FmtSubCommand;
use crate::arg_parser::ParseArgsError;
use crate::arg_parser::StdInFmtSubCommand;
use crate::arg_parser::SubCommand;
use crate::cache::ProjectRoot;
use crate::configuration::FormatConfig;
use crate::configuration::resolve_config;
use crate::coordinator::FormatCoordinator;
use crate::coordinator::FormatOutcome;
use crate::document::Document;
use crate::document::TextDocument;
use crate::environment::Environment;
use crate::tools::ToolName;
use crate::utils::get_table_text;

#[derive(Debug, Error)]
#[error("{inner:#}")]
pub struct AppError {
  pub inner: anyhow::Error,
  pub exit_code: i32,
}

impl From<anyhow::Error> for AppError {
  fn from(inner: anyhow::Error) -> Self {
    AppError { inner, exit_code: 1 }
  }
}

impl From<ParseArgsError> for AppError {
  fn from(err: ParseArgsError) -> Self {
    AppError {
      inner: err.into(),
      exit_code: 1,
    }
  }
}

pub async fn run_cli<TEnvironment: Environment>(args: &CliArgs, environment: &TEnvironment) -> Result<(), AppError> {
  match &args.sub_command {
    SubCommand::Help(help_text) => {
      environment.log(help_text);
      Ok(())
    }
    SubCommand::Version => {
      environment.log(&format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));
      Ok(())
    }
    SubCommand::Fmt(cmd) => {
      let coordinator = create_coordinator(args, cmd.tool, &cmd.projects, environment).await?;
      let result = format_files(cmd, &coordinator, environment).await;
      coordinator.dispose();
      result
    }
    SubCommand::StdInFmt(cmd) => {
      let coordinator = create_coordinator(args, cmd.tool, &cmd.projects, environment).await?;
      let result = format_stdin(cmd, &coordinator, environment).await;
      coordinator.dispose();
      result
    }
    SubCommand::OutputTools(cmd) => {
      let coordinator = create_coordinator(args, None, &cmd.projects, environment).await?;
      let result = output_tools(&coordinator, environment);
      coordinator.dispose();
      result
    }
  }
}

async fn create_coordinator<TEnvironment: Environment>(
  args: &CliArgs,
  tool: Option<ToolName>,
  projects: &[String],
  environment: &TEnvironment,
) -> Result<FormatCoordinator<TEnvironment>> {
  let mut config: FormatConfig = resolve_config(args.config.as_deref(), environment)?;
  if let Some(tool) = tool {
    config.tool = tool;
  }
  let cwd = environment.cwd();
  let project_roots = projects.iter().map(|p| ProjectRoot::from(resolve_path(&cwd, p))).collect();
  let (_, settings) = watch::channel(config);
  let coordinator = FormatCoordinator::new(environment.clone(), settings, project_roots);
  coordinator.rebuild().await;
  Ok(coordinator)
}

async fn format_files<TEnvironment: Environment>(
  cmd: &FmtSubCommand,
  coordinator: &FormatCoordinator<TEnvironment>,
  environment: &TEnvironment,
) -> Result<(), AppError> {
  let cwd = environment.cwd();
  let mut formatted_count = 0;
  let mut error_count = 0;
  for file_path in &cmd.file_paths {
    let file_path = resolve_path(&cwd, file_path);
    let file_text = match environment.read_file(&file_path) {
      Ok(text) => text,
      Err(err) => {
        log_error!(environment, "{:#}", err);
        error_count += 1;
        continue;
      }
    };
    let mut document = TextDocument::new(file_text).with_file_path(&file_path);
    match coordinator.format(&mut document, None, None).await {
      FormatOutcome::Formatted => match environment.write_file(&file_path, document.text()) {
        Ok(()) => formatted_count += 1,
        Err(err) => {
          log_error!(environment, "{:#}", err);
          error_count += 1;
        }
      },
      FormatOutcome::Unchanged | FormatOutcome::Skipped => {}
      FormatOutcome::ToolNotFound | FormatOutcome::Failed => {
        log_error!(environment, "Error formatting {}", file_path.display());
        error_count += 1;
      }
    }
  }

  if formatted_count > 0 {
    let suffix = if formatted_count == 1 { "file" } else { "files" };
    environment.log(&format!("Formatted {} {}.", formatted_count, suffix));
  }
  if error_count > 0 {
    let suffix = if error_count == 1 { "error" } else { "errors" };
    return Err(anyhow!("Had {} {} formatting.", error_count, suffix).into());
  }
  Ok(())
}

async fn format_stdin<TEnvironment: Environment>(
  cmd: &StdInFmtSubCommand,
  coordinator: &FormatCoordinator<TEnvironment>,
  environment: &TEnvironment,
) -> Result<(), AppError> {
  let file_path = resolve_path(&environment.cwd(), &cmd.file_path);
  let mut document = TextDocument::new(cmd.file_text.as_str()).with_file_path(&file_path);
  let outcome = coordinator.format(&mut document, None, None).await;
  // the document is left as-is when formatting fails
  environment.write_stdout(document.text());
  match outcome {
    FormatOutcome::ToolNotFound | FormatOutcome::Failed => Err(anyhow!("Error formatting {}", file_path.display()).into()),
    FormatOutcome::Formatted | FormatOutcome::Unchanged | FormatOutcome::Skipped => Ok(()),
  }
}

fn output_tools<TEnvironment: Environment>(coordinator: &FormatCoordinator<TEnvironment>, environment: &TEnvironment) -> Result<(), AppError> {
  let Some(cache) = coordinator.cache() else {
    return Err(anyhow!("Could not resolve tools.").into());
  };
  if cache.is_empty() {
    log_warn!(environment, "No tools found.");
    return Ok(());
  }

  let entries = cache
    .iter()
    .map(|(key, path)| {
      let root = key.root.as_ref().map(|r| r.display().to_string()).unwrap_or_else(|| "*".to_string());
      (key.tool.to_string(), root, path.to_string())
    })
    .collect::<Vec<_>>();
  let rows = entries
    .iter()
    .map(|(tool, root, path)| vec![tool.as_str(), root.as_str(), path.as_str()])
    .collect();
  environment.log(&get_table_text(rows).render(0));
  Ok(())
}

/// Makes the path absolute, dropping any `.` components.
fn resolve_path(cwd: &Path, path: &str) -> PathBuf {
  cwd.join(path).components().filter(|c| *c != Component::CurDir).collect()
}
