use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use serde::Deserialize;
use serde::Serialize;

use crate::environment::Environment;
use crate::tools::ToolName;

pub const DEFAULT_CONFIG_FILE_NAME: &str = "goformat.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct FormatConfig {
  /// The tool used when none is explicitly requested.
  pub tool: ToolName,
  pub format_on_save: bool,
  /// Executables to use instead of searching for the tool.
  pub tool_paths: BTreeMap<ToolName, String>,
}

pub fn parse_config_text(text: &str) -> Result<FormatConfig> {
  let value = jsonc_parser::parse_to_serde_value(text, &Default::default()).context("Error parsing config file.")?;
  match value {
    Some(value) => serde_json::from_value(value).context("Error deserializing config file."),
    None => Ok(FormatConfig::default()),
  }
}

/// Loads the config from the provided path, or from `goformat.json` in the
/// current directory when it exists.
pub fn resolve_config<TEnvironment: Environment>(config_path: Option<&str>, environment: &TEnvironment) -> Result<FormatConfig> {
  let file_path = match config_path {
    Some(config_path) => {
      let file_path = environment.cwd().join(config_path);
      if !environment.path_exists(&file_path) {
        bail!("Could not find config file at {}", file_path.display());
      }
      file_path
    }
    None => {
      let file_path: PathBuf = environment.cwd().join(DEFAULT_CONFIG_FILE_NAME);
      if !environment.path_exists(&file_path) {
        log_debug!(environment, "No config file found. Using defaults.");
        return Ok(FormatConfig::default());
      }
      file_path
    }
  };

  log_debug!(environment, "Resolving config from {}", file_path.display());
  let text = environment.read_file(&file_path)?;
  parse_config_text(&text).with_context(|| format!("Error loading config at {}", file_path.display()))
}
