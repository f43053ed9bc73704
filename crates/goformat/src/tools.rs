use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

/// One of the interchangeable Go formatters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolName {
  /// `gofmt`
  #[default]
  Fmt,
  /// `goimports`, which also organizes imports.
  Imports,
  /// `goreturns`
  Returns,
}

impl ToolName {
  pub const ALL: [ToolName; 3] = [ToolName::Fmt, ToolName::Imports, ToolName::Returns];

  pub fn executable_name(&self) -> &'static str {
    match self {
      ToolName::Fmt => "gofmt",
      ToolName::Imports => "goimports",
      ToolName::Returns => "goreturns",
    }
  }

  /// Arguments to provide the tool when the file text is piped via stdin.
  pub fn format_args(&self, file_path: Option<&Path>) -> Vec<String> {
    // report all errors rather than only the first ten
    let mut args = vec!["-e".to_string()];
    if self.resolves_imports_from_source_dir() {
      if let Some(file_path) = file_path {
        args.push("--srcdir".to_string());
        args.push(containing_dir_text(file_path));
      }
    }
    args
  }

  /// The text is piped in, so this tool needs to be told where the
  /// file lives in order to resolve imports relative to it.
  fn resolves_imports_from_source_dir(&self) -> bool {
    matches!(self, ToolName::Imports)
  }
}

fn containing_dir_text(file_path: &Path) -> String {
  match file_path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_string_lossy().to_string(),
    _ => ".".to_string(),
  }
}

impl fmt::Display for ToolName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.executable_name())
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown format tool '{0}'. Expected one of: gofmt, goimports, goreturns")]
pub struct ParseToolNameError(String);

impl FromStr for ToolName {
  type Err = ParseToolNameError;

  fn from_str(text: &str) -> Result<Self, Self::Err> {
    match text.trim() {
      "gofmt" | "fmt" => Ok(ToolName::Fmt),
      "goimports" | "imports" => Ok(ToolName::Imports),
      "goreturns" | "returns" => Ok(ToolName::Returns),
      _ => Err(ParseToolNameError(text.to_string())),
    }
  }
}

impl Serialize for ToolName {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.executable_name())
  }
}

impl<'de> Deserialize<'de> for ToolName {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod test {
  use std::path::PathBuf;

  use super::*;

  #[test]
  fn parses_executable_names_and_aliases() {
    assert_eq!("gofmt".parse::<ToolName>().unwrap(), ToolName::Fmt);
    assert_eq!("imports".parse::<ToolName>().unwrap(), ToolName::Imports);
    assert_eq!(" goreturns ".parse::<ToolName>().unwrap(), ToolName::Returns);
    assert_eq!(
      "rustfmt".parse::<ToolName>().err().unwrap().to_string(),
      "Unknown format tool 'rustfmt'. Expected one of: gofmt, goimports, goreturns"
    );
  }

  #[test]
  fn always_reports_all_errors() {
    for tool in ToolName::ALL {
      assert_eq!(tool.format_args(None), vec!["-e"]);
    }
  }

  #[test]
  fn provides_src_dir_only_for_goimports_with_file_path() {
    let file_path = PathBuf::from("/a/pkg/x.go");
    assert_eq!(ToolName::Imports.format_args(Some(&file_path)), vec!["-e", "--srcdir", "/a/pkg"]);
    assert_eq!(ToolName::Fmt.format_args(Some(&file_path)), vec!["-e"]);
    assert_eq!(ToolName::Returns.format_args(Some(&file_path)), vec!["-e"]);
    assert_eq!(ToolName::Imports.format_args(Some(Path::new("x.go"))), vec!["-e", "--srcdir", "."]);
  }
}
