use anyhow::Result;
use clap::ArgMatches;
use thiserror::Error;

use crate::tools::ToolName;
use crate::utils::LogLevel;
use crate::utils::StdInReader;

pub struct CliArgs {
  pub sub_command: SubCommand,
  pub log_level: LogLevel,
  pub config: Option<String>,
}

impl CliArgs {
  pub fn is_stdout_machine_readable(&self) -> bool {
    // the formatted text is read from stdout
    matches!(self.sub_command, SubCommand::StdInFmt(..))
  }

  fn new_with_sub_command(sub_command: SubCommand) -> CliArgs {
    CliArgs {
      sub_command,
      log_level: LogLevel::Info,
      config: None,
    }
  }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubCommand {
  Fmt(FmtSubCommand),
  StdInFmt(StdInFmtSubCommand),
  OutputTools(OutputToolsSubCommand),
  Version,
  Help(String),
}

#[derive(Debug, PartialEq, Eq)]
pub struct FmtSubCommand {
  pub tool: Option<ToolName>,
  pub projects: Vec<String>,
  pub file_paths: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct StdInFmtSubCommand {
  pub tool: Option<ToolName>,
  pub projects: Vec<String>,
  pub file_path: String,
  pub file_text: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct OutputToolsSubCommand {
  pub projects: Vec<String>,
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct ParseArgsError(#[from] anyhow::Error);

pub fn parse_args<TStdInReader: StdInReader>(args: Vec<String>, std_in_reader: TStdInReader) -> Result<CliArgs, ParseArgsError> {
  inner_parse_args(args, std_in_reader).map_err(ParseArgsError)
}

fn inner_parse_args<TStdInReader: StdInReader>(args: Vec<String>, std_in_reader: TStdInReader) -> Result<CliArgs> {
  if args.len() == 1 || (args.len() == 2 && (args[1] == "help" || args[1] == "--help")) {
    let mut cli_parser = create_cli_parser(CliArgParserKind::ForOutputtingMainHelp);
    cli_parser.try_get_matches_from_mut(vec![""])?;
    let help_text = format!("{}", cli_parser.render_help());
    return Ok(CliArgs::new_with_sub_command(SubCommand::Help(help_text)));
  } else if args.len() == 2 && (args[1] == "-v" || args[1] == "-V" || args[1] == "--version") {
    return Ok(CliArgs::new_with_sub_command(SubCommand::Version));
  }

  let cli_parser = create_cli_parser(CliArgParserKind::Default);
  let matches = cli_parser.try_get_matches_from(&args)?;

  let sub_command = match matches.subcommand() {
    Some(("fmt", matches)) => match matches.get_one::<String>("stdin") {
      Some(file_path) => SubCommand::StdInFmt(StdInFmtSubCommand {
        tool: parse_tool(matches)?,
        projects: values_to_vec(matches.get_many("project")),
        file_path: file_path.to_string(),
        file_text: std_in_reader.read_text()?,
      }),
      None => SubCommand::Fmt(FmtSubCommand {
        tool: parse_tool(matches)?,
        projects: values_to_vec(matches.get_many("project")),
        file_paths: values_to_vec(matches.get_many("files")),
      }),
    },
    Some(("output-tools", matches)) => SubCommand::OutputTools(OutputToolsSubCommand {
      projects: values_to_vec(matches.get_many("project")),
    }),
    Some(("version", _)) => SubCommand::Version,
    _ => unreachable!(),
  };

  Ok(CliArgs {
    sub_command,
    log_level: LogLevel::from_flags(matches.get_flag("verbose"), matches.get_flag("silent")),
    config: matches.get_one::<String>("config").map(String::from),
  })
}

fn parse_tool(matches: &ArgMatches) -> Result<Option<ToolName>> {
  match matches.get_one::<String>("tool") {
    Some(tool) => Ok(Some(tool.parse()?)),
    None => Ok(None),
  }
}

fn values_to_vec(values: Option<clap::parser::ValuesRef<String>>) -> Vec<String> {
  values.map(|x| x.map(std::string::ToString::to_string).collect()).unwrap_or_default()
}

#[derive(Default, PartialEq, Eq)]
pub enum CliArgParserKind {
  ForOutputtingMainHelp,
  #[default]
  Default,
}

pub fn create_cli_parser(kind: CliArgParserKind) -> clap::Command {
  use clap::Arg;
  use clap::Command;

  let mut app = Command::new("goformat");

  app = if kind == CliArgParserKind::ForOutputtingMainHelp {
    app.disable_help_subcommand(true).disable_version_flag(true).disable_help_flag(true)
  } else {
    app.subcommand_required(true)
  };

  app
    .bin_name("goformat")
    .version(env!("CARGO_PKG_VERSION"))
    .about("Formats Go source files with gofmt, goimports or goreturns.")
    .override_usage("goformat <SUBCOMMAND> [OPTIONS] [--] [files]...")
    .help_template(r#"{bin} {version}

{about}

USAGE:
    {usage}

SUBCOMMANDS:
{subcommands}

OPTIONS:
{options}{after-help}"#)
    .after_help(
      r#"EXAMPLES:
  Format files in place with the configured tool:

    goformat fmt main.go util.go

  Organize imports, resolving the tool for a project:

    goformat fmt --tool goimports --project . cmd/main.go

  Format stdin and output the result to stdout:

    goformat fmt --stdin cmd/main.go < cmd/main.go"#,
    )
    .subcommand(
      Command::new("fmt")
        .about("Formats the files and writes the result to the file system.")
        .add_tool_arg()
        .add_project_arg()
        .arg(
          Arg::new("files")
            .help("Paths of the files to format.")
            .required_unless_present("stdin")
            .num_args(1..),
        )
        .arg(
          Arg::new("stdin")
            .long("stdin")
            .value_name("file-path")
            .help("Format stdin and output the result to stdout. The file path is used to find the project and import paths.")
            .conflicts_with("files")
            .num_args(1),
        ),
    )
    .subcommand(
      Command::new("output-tools")
        .about("Prints the resolved path of each tool for each project.")
        .add_project_arg(),
    )
    .subcommand(Command::new("version").hide(true))
    .arg(
      Arg::new("config")
        .long("config")
        .short('c')
        .help("Path to JSON configuration file. Defaults to goformat.json in the current directory when it exists.")
        .global(true)
        .num_args(1),
    )
    .arg(
      Arg::new("verbose")
        .long("verbose")
        .help("Prints additional diagnostic information.")
        .global(true)
        .conflicts_with("silent")
        .num_args(0),
    )
    .arg(
      Arg::new("silent")
        .long("silent")
        .help("Only prints errors.")
        .global(true)
        .num_args(0),
    )
}

trait ClapExtensions {
  fn add_tool_arg(self) -> Self;
  fn add_project_arg(self) -> Self;
}

impl ClapExtensions for clap::Command {
  fn add_tool_arg(self) -> Self {
    self.arg(
      clap::Arg::new("tool")
        .long("tool")
        .value_name("gofmt|goimports|goreturns")
        .help("Tool to format with. This overrides what is specified in the config file.")
        .num_args(1),
    )
  }

  fn add_project_arg(self) -> Self {
    self.arg(
      clap::Arg::new("project")
        .long("project")
        .short('p')
        .value_name("dir")
        .help("Root directory of a project to resolve tools for. May be specified multiple times.")
        .action(clap::ArgAction::Append)
        .num_args(1),
    )
  }
}
