#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]

use goformat::arg_parser::parse_args;
use goformat::environment::RealEnvironment;
use goformat::environment::RealEnvironmentOptions;
use goformat::run_cli::AppError;
use goformat::run_cli::run_cli;
use goformat::utils::LogLevel;
use goformat::utils::RealStdInReader;

fn main() {
  let rt = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
    Ok(rt) => rt,
    Err(err) => {
      #[allow(clippy::print_stderr)]
      {
        eprintln!("Error creating runtime: {:#}", err);
      }
      std::process::exit(1);
    }
  };
  rt.block_on(async move {
    match run().await {
      Ok(_) => {}
      Err((err, log_level)) => {
        if log_level != LogLevel::Silent {
          let result = format!("{:#}", err.inner);
          #[allow(clippy::print_stderr)]
          if !result.is_empty() {
            eprintln!("{}", result);
          }
        }
        std::process::exit(err.exit_code);
      }
    }
  });
}

async fn run() -> Result<(), (AppError, LogLevel)> {
  let args = parse_args(std::env::args().collect(), RealStdInReader).map_err(|err| (err.into(), LogLevel::Info))?;

  let environment = RealEnvironment::new(RealEnvironmentOptions {
    log_level: args.log_level,
    is_stdout_machine_readable: args.is_stdout_machine_readable(),
  });
  run_cli(&args, &environment).await.map_err(|err| (err, args.log_level))
}
