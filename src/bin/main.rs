use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use emulator::program::{LoadError, Program};
use emulator::vm::Vm;
use log::LevelFilter;
use simple_logger::SimpleLogger;

/// Run an LS-8 program listing
#[derive(Parser)]
#[command(name = "ls8", version)]
struct Args {
  /// Listing of binary literals to load and run
  file: Option<PathBuf>,
}

fn main() -> ExitCode {
  // RUST_LOG=trace prints the machine state before every instruction
  if let Err(err) = SimpleLogger::new().with_level(LevelFilter::Warn).env().init() {
    eprintln!("could not start logger: {err}");
  }

  let args = Args::parse();
  match run(args.file, io::stdout(), io::stderr()) {
    Ok(status) => ExitCode::from(status),
    Err(_) => ExitCode::FAILURE,
  }
}

/// Load and run the listing at `file`, printing to `out` and reporting
/// problems on `diag`. Returns the process exit status.
fn run<W, E>(file: Option<PathBuf>, out: W, mut diag: E) -> io::Result<u8>
where
  W: Write,
  E: Write,
{
  let Some(path) = file else {
    writeln!(diag, "You must specify the file to run.")?;
    return Ok(1);
  };

  let program = match Program::from_file(&path) {
    Ok(program) => program,
    Err(LoadError::NotFound(path)) => {
      writeln!(diag, "File not found: {}", path.display())?;
      return Ok(1);
    }
    Err(err) => {
      writeln!(diag, "{err}")?;
      return Ok(1);
    }
  };

  let mut vm = Vm::with_output(out);
  match vm.load(&program).and_then(|()| vm.run()) {
    Ok(()) => Ok(0),
    Err(err) => {
      log::error!("{}", vm.trace());
      writeln!(diag, "{err}")?;
      Ok(1)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn listing(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
      .join("programs")
      .join(name)
  }

  fn run_captured(file: Option<PathBuf>) -> (u8, String, String) {
    let mut out = Vec::new();
    let mut diag = Vec::new();
    let status = run(file, &mut out, &mut diag).unwrap();
    (
      status,
      String::from_utf8(out).unwrap(),
      String::from_utf8(diag).unwrap(),
    )
  }

  #[test]
  fn missing_argument() {
    let (status, out, diag) = run_captured(None);
    assert_eq!(status, 1);
    assert_eq!(out, "");
    assert_eq!(diag, "You must specify the file to run.\n");
  }

  #[test]
  fn missing_file() {
    let (status, out, diag) = run_captured(Some(PathBuf::from("nope.ls8")));
    assert_eq!(status, 1);
    assert_eq!(out, "");
    assert_eq!(diag, "File not found: nope.ls8\n");
  }

  #[test]
  fn runs_to_halt() {
    let (status, out, diag) = run_captured(Some(listing("sctest.ls8")));
    assert_eq!(status, 0);
    assert_eq!(out, "1\n2\n3\n4\n");
    assert_eq!(diag, "");
  }

  #[test]
  fn illegal_instruction_fails() {
    let path = std::env::temp_dir().join(format!("ls8-illegal-{}.ls8", std::process::id()));
    std::fs::write(&path, "11111111 # not an instruction\n").unwrap();
    let result = run_captured(Some(path.clone()));
    std::fs::remove_file(&path).unwrap();
    let (status, out, diag) = result;
    assert_eq!(status, 1);
    assert_eq!(out, "");
    assert!(diag.starts_with("illegal instruction"), "{diag}");
  }
}
