use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

#[derive(Parser, Debug)]
#[command(name = "gocc", version, about = "Compile a Go-like source file to x86-64 assembly")]
struct Cli {
  /// Source file to compile.
  path: PathBuf,

  /// Write the assembly here instead of stdout.
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Log every compilation stage.
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logger(cli.verbose);

  let source = fs::read_to_string(&cli.path)
    .with_context(|| format!("failed to read {}", cli.path.display()))?;
  info!("compiling {}", cli.path.display());

  let asm = match gocc::generate_assembly(&source) {
    Ok(asm) => asm,
    Err(err) => {
      eprintln!("{}", err.render(&cli.path.display().to_string(), &source));
      process::exit(1);
    }
  };

  match &cli.output {
    Some(out) => fs::write(out, &asm)
      .with_context(|| format!("failed to write {}", out.display()))?,
    None => print!("{asm}"),
  }
  Ok(())
}

fn init_logger(verbose: bool) {
  let default = if verbose {
    LevelFilter::Debug
  } else {
    LevelFilter::Warn
  };
  env_logger::Builder::new()
    .filter_level(default)
    .parse_default_env()
    .format_timestamp(None)
    .init();
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_path_and_flags() {
    let cli = Cli::parse_from(["gocc", "prog.go", "-o", "prog.s", "-v"]);
    assert_eq!(cli.path, PathBuf::from("prog.go"));
    assert_eq!(cli.output, Some(PathBuf::from("prog.s")));
    assert!(cli.verbose);
  }

  #[test]
  fn path_is_required() {
    assert!(Cli::try_parse_from(["gocc"]).is_err());
    assert!(Cli::try_parse_from(["gocc", "a.go", "b.go"]).is_err());
  }
}
