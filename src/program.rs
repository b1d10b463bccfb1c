use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::vm::MEMORY_SIZE;

/// A region of bytes that can be placed in machine memory
pub trait Region {
  fn bytes(&self) -> &[u8];
}

impl Region for [u8] {
  fn bytes(&self) -> &[u8] {
    self
  }
}

impl Region for Vec<u8> {
  fn bytes(&self) -> &[u8] {
    self
  }
}

/// A failure turning a listing into a `Program`
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
  #[error("file not found: {}", .0.display())]
  NotFound(PathBuf),

  #[error("could not read {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("line {line}: `{text}` is not an 8-bit binary literal")]
  InvalidLiteral { line: usize, text: String },

  #[error("program is {len} bytes but memory only holds {max}", max = MEMORY_SIZE)]
  TooLarge { len: usize },
}

/// A `Program` is the ordered byte sequence parsed from an LS-8 listing,
/// destined for memory starting at address 0.
///
/// Listings hold one binary literal per line. Anything after a `#` is a
/// comment, and lines left empty once the comment is gone are skipped:
///
/// ```text
/// 10000010 # LDI R0,8
/// 00000000
/// 00001000
///
/// 00000001 # HLT
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
  bytes: Vec<u8>,
}

impl Program {
  /// Parse a listing held in memory
  pub fn parse(listing: &str) -> Result<Self, LoadError> {
    let mut bytes = Vec::new();
    for (index, line) in listing.lines().enumerate() {
      let text = match line.split_once('#') {
        Some((code, _comment)) => code,
        None => line,
      }
      .trim();
      if text.is_empty() {
        continue;
      }
      let byte = u8::from_str_radix(text, 2).map_err(|_| LoadError::InvalidLiteral {
        line: index + 1,
        text: text.to_owned(),
      })?;
      bytes.push(byte);
    }
    if bytes.len() > MEMORY_SIZE {
      return Err(LoadError::TooLarge { len: bytes.len() });
    }
    Ok(Self { bytes })
  }

  /// Read and parse the listing at `path`
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
    let path = path.as_ref();
    let listing = fs::read_to_string(path).map_err(|source| match source.kind() {
      io::ErrorKind::NotFound => LoadError::NotFound(path.to_owned()),
      _ => LoadError::Io {
        path: path.to_owned(),
        source,
      },
    })?;
    let program = Self::parse(&listing)?;
    log::debug!("loaded {} bytes from {}", program.len(), path.display());
    Ok(program)
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }
}

impl FromStr for Program {
  type Err = LoadError;

  fn from_str(listing: &str) -> Result<Self, Self::Err> {
    Self::parse(listing)
  }
}

impl From<Vec<u8>> for Program {
  fn from(bytes: Vec<u8>) -> Self {
    Self { bytes }
  }
}

impl Region for Program {
  fn bytes(&self) -> &[u8] {
    &self.bytes
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_strips_comments_and_blank_lines() {
    let listing = "\
# print8.ls8
10000010 # LDI R0,8
00000000

00001000
   01000111   # PRN R0
00000000
#00000000 commented out entirely
00000001
";
    let program = Program::parse(listing).unwrap();
    assert_eq!(
      program.bytes(),
      &[0b1000_0010, 0, 8, 0b0100_0111, 0, 0b0000_0001]
    );
  }

  #[test]
  fn parse_empty_listing() {
    let program = Program::parse("\n   \n# nothing here\n").unwrap();
    assert!(program.is_empty());
  }

  #[test]
  fn parse_accepts_short_literals() {
    let program: Program = "1\n101\n".parse().unwrap();
    assert_eq!(program.bytes(), &[1, 5]);
  }

  #[test]
  fn parse_rejects_non_binary() {
    let err = Program::parse("00000001\n00000002\n").unwrap_err();
    match err {
      LoadError::InvalidLiteral { line, text } => {
        assert_eq!(line, 2);
        assert_eq!(text, "00000002");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn parse_rejects_wide_literals() {
    let err = Program::parse("100000000\n").unwrap_err();
    assert!(matches!(err, LoadError::InvalidLiteral { line: 1, .. }));
  }

  #[test]
  fn parse_rejects_oversized_programs() {
    let listing = "00000000\n".repeat(MEMORY_SIZE + 1);
    let err = Program::parse(&listing).unwrap_err();
    assert!(matches!(err, LoadError::TooLarge { len } if len == MEMORY_SIZE + 1));
  }

  #[test]
  fn parse_fills_all_of_memory() {
    let listing = "00000001\n".repeat(MEMORY_SIZE);
    assert_eq!(Program::parse(&listing).unwrap().len(), MEMORY_SIZE);
  }

  #[test]
  fn from_file_missing() {
    let err = Program::from_file("does/not/exist.ls8").unwrap_err();
    assert!(matches!(err, LoadError::NotFound(path) if path == Path::new("does/not/exist.ls8")));
  }

  #[test]
  fn from_file_reads_listing() {
    let path = std::env::temp_dir().join(format!("ls8-from-file-{}.ls8", std::process::id()));
    fs::write(&path, "10000010 # LDI\n00000001\n00000010\n00000001\n").unwrap();
    let program = Program::from_file(&path);
    fs::remove_file(&path).unwrap();
    assert_eq!(program.unwrap().bytes(), &[0b1000_0010, 1, 2, 1]);
  }
}
