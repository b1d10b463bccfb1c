use std::fmt;

/// Mask selecting the two bits of an opcode that encode its operand count
const OPERAND_MASK: u8 = 0b1100_0000;

/// Number of operand bytes following `byte` in memory.
///
/// The top two bits of every LS-8 opcode hold this count, so it can be
/// derived without knowing which instruction the byte names.
pub const fn operand_count(byte: u8) -> u8 {
  (byte & OPERAND_MASK) >> 6
}

/// A byte that names no instruction
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown opcode {0:#010b}")]
pub struct UnknownOpcode(pub u8);

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
  /// Halts the machine.
  ///
  /// | Operation | Semantics/RTL      | Assembly |
  /// |-----------|--------------------|----------|
  /// | Halt      | `(stop execution)` | `HLT`    |
  Hlt = 0b0000_0001,

  /// Returns from a subroutine.
  ///
  /// | Operation | Semantics/RTL                      | Assembly |
  /// |-----------|------------------------------------|----------|
  /// | Return    | `pc ← m[r[7]]; r[7] ← r[7] + 1`    | `RET`    |
  Ret = 0b0001_0001,

  /// | Operation | Semantics/RTL                     | Assembly  |
  /// |-----------|-----------------------------------|-----------|
  /// | Push      | `r[7] ← r[7] − 1; m[r[7]] ← r[a]` | `PUSH ra` |
  Push = 0b0100_0101,

  /// | Operation | Semantics/RTL                     | Assembly |
  /// |-----------|-----------------------------------|----------|
  /// | Pop       | `r[a] ← m[r[7]]; r[7] ← r[7] + 1` | `POP ra` |
  Pop = 0b0100_0110,

  /// Prints the decimal value of a register, newline terminated.
  ///
  /// | Operation      | Semantics/RTL   | Assembly |
  /// |----------------|-----------------|----------|
  /// | Print Register | `out ← r[a]`    | `PRN ra` |
  Prn = 0b0100_0111,

  /// Calls the subroutine whose address is held in a register.
  ///
  /// | Operation | Semantics/RTL                                   | Assembly  |
  /// |-----------|-------------------------------------------------|-----------|
  /// | Call      | `r[7] ← r[7] − 1; m[r[7]] ← pc + 2; pc ← r[a]`  | `CALL ra` |
  Call = 0b0101_0000,

  /// | Operation | Semantics/RTL | Assembly |
  /// |-----------|---------------|----------|
  /// | Jump      | `pc ← r[a]`   | `JMP ra` |
  Jmp = 0b0101_0100,

  /// | Operation     | Semantics/RTL            | Assembly |
  /// |---------------|--------------------------|----------|
  /// | Jump If Equal | `if E : pc ← r[a]`       | `JEQ ra` |
  Jeq = 0b0101_0101,

  /// | Operation         | Semantics/RTL             | Assembly |
  /// |-------------------|---------------------------|----------|
  /// | Jump If Not Equal | `if !E : pc ← r[a]`       | `JNE ra` |
  Jne = 0b0101_0110,

  /// Loads an immediate value into a register.
  ///
  /// | Operation      | Semantics/RTL | Assembly     |
  /// |----------------|---------------|--------------|
  /// | Load Immediate | `r[a] ← vv`   | `LDI ra, vv` |
  Ldi = 0b1000_0010,

  /// | Operation | Semantics/RTL              | Assembly     |
  /// |-----------|----------------------------|--------------|
  /// | Add       | `r[a] ← r[a] + r[b]`       | `ADD ra, rb` |
  Add = 0b1010_0000,

  /// | Operation | Semantics/RTL              | Assembly     |
  /// |-----------|----------------------------|--------------|
  /// | Multiply  | `r[a] ← r[a] × r[b]`       | `MUL ra, rb` |
  Mul = 0b1010_0010,

  /// Sets exactly one of the E, L or G flags.
  ///
  /// | Operation | Semantics/RTL                  | Assembly     |
  /// |-----------|--------------------------------|--------------|
  /// | Compare   | `fl ← cmp(r[a], r[b])`         | `CMP ra, rb` |
  Cmp = 0b1010_0111,
}

impl Opcode {
  /// Number of operand bytes this instruction consumes
  pub const fn operand_count(self) -> u8 {
    operand_count(self as u8)
  }

  /// Size of the whole instruction in memory, opcode included
  pub const fn width(self) -> u8 {
    1 + self.operand_count()
  }

  pub const fn mnemonic(self) -> &'static str {
    match self {
      Self::Hlt => "HLT",
      Self::Ret => "RET",
      Self::Push => "PUSH",
      Self::Pop => "POP",
      Self::Prn => "PRN",
      Self::Call => "CALL",
      Self::Jmp => "JMP",
      Self::Jeq => "JEQ",
      Self::Jne => "JNE",
      Self::Ldi => "LDI",
      Self::Add => "ADD",
      Self::Mul => "MUL",
      Self::Cmp => "CMP",
    }
  }
}

impl fmt::Display for Opcode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.mnemonic())
  }
}

impl TryFrom<u8> for Opcode {
  type Error = UnknownOpcode;

  fn try_from(byte: u8) -> Result<Self, Self::Error> {
    let op = match byte {
      0b0000_0001 => Self::Hlt,
      0b0001_0001 => Self::Ret,
      0b0100_0101 => Self::Push,
      0b0100_0110 => Self::Pop,
      0b0100_0111 => Self::Prn,
      0b0101_0000 => Self::Call,
      0b0101_0100 => Self::Jmp,
      0b0101_0101 => Self::Jeq,
      0b0101_0110 => Self::Jne,
      0b1000_0010 => Self::Ldi,
      0b1010_0000 => Self::Add,
      0b1010_0010 => Self::Mul,
      0b1010_0111 => Self::Cmp,
      _ => return Err(UnknownOpcode(byte)),
    };
    Ok(op)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALL: [Opcode; 13] = [
    Opcode::Hlt,
    Opcode::Ret,
    Opcode::Push,
    Opcode::Pop,
    Opcode::Prn,
    Opcode::Call,
    Opcode::Jmp,
    Opcode::Jeq,
    Opcode::Jne,
    Opcode::Ldi,
    Opcode::Add,
    Opcode::Mul,
    Opcode::Cmp,
  ];

  #[test]
  fn operand_count_reads_top_bits() {
    assert_eq!(operand_count(0b0000_0000), 0);
    assert_eq!(operand_count(0b0111_1111), 1);
    assert_eq!(operand_count(0b1000_0000), 2);
    assert_eq!(operand_count(0b1111_1111), 3);
  }

  #[test]
  fn widths() {
    assert_eq!(Opcode::Hlt.width(), 1);
    assert_eq!(Opcode::Ret.width(), 1);
    assert_eq!(Opcode::Prn.width(), 2);
    assert_eq!(Opcode::Jeq.width(), 2);
    assert_eq!(Opcode::Ldi.width(), 3);
    assert_eq!(Opcode::Cmp.width(), 3);
  }

  #[test]
  fn every_opcode_decodes_to_itself() {
    for op in ALL {
      assert_eq!(Opcode::try_from(op as u8).ok(), Some(op), "{op}");
    }
  }

  #[test]
  fn unknown_byte_is_rejected() {
    assert_eq!(Opcode::try_from(0x00), Err(UnknownOpcode(0x00)));
    assert_eq!(Opcode::try_from(0xFF), Err(UnknownOpcode(0xFF)));
    // right operand count, wrong low bits
    assert_eq!(Opcode::try_from(0b1010_0001), Err(UnknownOpcode(0b1010_0001)));
  }
}
