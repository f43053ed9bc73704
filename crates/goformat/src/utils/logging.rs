#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
  Debug,
  #[default]
  Info,
  Warn,
  Error,
  Silent,
}

impl LogLevel {
  pub fn from_flags(verbose: bool, silent: bool) -> Self {
    if silent {
      LogLevel::Silent
    } else if verbose {
      LogLevel::Debug
    } else {
      LogLevel::Info
    }
  }
}
