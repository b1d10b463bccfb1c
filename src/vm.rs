use std::cmp::Ordering;
use std::io::{self, Write};

use crate::opcode::{Opcode, UnknownOpcode};
use crate::program::Region;

/// Bytes of addressable memory
pub const MEMORY_SIZE: usize = 256;

/// Number of general purpose registers
pub const REGISTER_COUNT: usize = 8;

/// Register reserved for the stack pointer
pub const SP: usize = 7;

/// Initial stack pointer, the stack grows down from here
pub const STACK_START: u8 = 0xF3;

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
  Active,
  Halted,
}

/// The flags register, laid out as `00000LGE`.
///
/// Zero until the first `CMP`, after which exactly one bit is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
  pub const EQUAL: u8 = 0b001;
  pub const GREATER: u8 = 0b010;
  pub const LESS: u8 = 0b100;

  fn from_ordering(ordering: Ordering) -> Self {
    match ordering {
      Ordering::Equal => Self(Self::EQUAL),
      Ordering::Greater => Self(Self::GREATER),
      Ordering::Less => Self(Self::LESS),
    }
  }

  pub fn bits(self) -> u8 {
    self.0
  }

  pub fn equal(self) -> bool {
    self.0 & Self::EQUAL != 0
  }

  pub fn greater(self) -> bool {
    self.0 & Self::GREATER != 0
  }

  pub fn less(self) -> bool {
    self.0 & Self::LESS != 0
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AluOp {
  Add,
  Mul,
  Cmp,
}

/// An error that occurred during execution of instructions
#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("illegal instruction {opcode:#010b} at address {address:#04x}")]
  IllegalInstruction { opcode: u8, address: usize },

  #[error("address {0:#04x} is outside of memory")]
  AddressOutOfRange(usize),

  #[error("register R{0} does not exist")]
  InvalidRegister(u8),

  #[error("stack overflow: stack pointer cannot move below 0x00")]
  StackOverflow,

  #[error("stack underflow: stack pointer cannot move above 0xff")]
  StackUnderflow,

  #[error("program is {0} bytes but memory only holds {max}", max = MEMORY_SIZE)]
  ProgramTooLarge(usize),

  #[error("machine is halted")]
  MachineHalted,

  #[error("could not write program output")]
  Output(#[from] io::Error),
}

/// A virtual machine for the LS-8, an 8-bit computer with 256 bytes of
/// memory and eight registers, the last of which is the stack pointer.
///
/// `PRN` output goes to `W`, which is stdout unless the machine was built
/// with [`Vm::with_output`].
#[derive(Debug)]
pub struct Vm<W = io::Stdout> {
  // address of the instruction about to execute
  pc: usize,
  memory: [u8; MEMORY_SIZE],
  registers: [u8; REGISTER_COUNT],
  flags: Flags,
  state: State,
  out: W,
}

impl Vm {
  /// Create a new machine that prints to stdout
  pub fn new() -> Self {
    Self::with_output(io::stdout())
  }
}

impl Default for Vm {
  fn default() -> Self {
    Self::new()
  }
}

impl<W> Vm<W>
where
  W: Write,
{
  /// Create a new machine with zeroed memory that prints to `out`
  pub fn with_output(out: W) -> Self {
    let mut registers = [0; REGISTER_COUNT];
    registers[SP] = STACK_START;
    Self {
      pc: 0,
      memory: [0; MEMORY_SIZE],
      registers,
      flags: Flags::default(),
      state: State::Active,
      out,
    }
  }

  /// Reset the machine and copy a region into memory starting at address 0.
  ///
  /// Everything but the output sink goes back to its power-on state, so a
  /// machine that has already run starts the new program from scratch.
  pub fn load<R>(&mut self, region: &R) -> Result<(), Error>
  where
    R: Region + ?Sized,
  {
    let bytes = region.bytes();
    if bytes.len() > MEMORY_SIZE {
      return Err(Error::ProgramTooLarge(bytes.len()));
    }
    self.pc = 0;
    self.memory = [0; MEMORY_SIZE];
    self.registers = [0; REGISTER_COUNT];
    self.registers[SP] = STACK_START;
    self.flags = Flags::default();
    self.state = State::Active;
    self.memory[..bytes.len()].copy_from_slice(bytes);
    log::debug!("loaded {} bytes into memory", bytes.len());
    Ok(())
  }

  /// Execute a single instruction
  pub fn step(&mut self) -> Result<(), Error> {
    if self.state == State::Halted {
      return Err(Error::MachineHalted);
    }
    if log::log_enabled!(log::Level::Trace) {
      log::trace!("{}", self.trace());
    }
    let address = self.pc;
    let op = Opcode::try_from(self.fetch(address)?)
      .map_err(|UnknownOpcode(opcode)| Error::IllegalInstruction { opcode, address })?;
    Task::new(self, op).run()
  }

  /// Step until the machine halts or an instruction fails
  pub fn run(&mut self) -> Result<(), Error> {
    while self.state == State::Active {
      self.step()?;
    }
    Ok(())
  }

  /// One line summary of the machine: pc, the three bytes at pc, then every
  /// register
  pub fn trace(&self) -> String {
    let at = |offset: usize| self.memory.get(self.pc + offset).copied().unwrap_or(0);
    let registers: String = self
      .registers
      .iter()
      .map(|register| format!(" {register:02X}"))
      .collect();
    format!(
      "TRACE: {:02X} | {:02X} {:02X} {:02X} |{registers}",
      self.pc,
      at(0),
      at(1),
      at(2)
    )
  }

  pub fn pc(&self) -> usize {
    self.pc
  }

  pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
    &self.registers
  }

  pub fn sp(&self) -> u8 {
    self.registers[SP]
  }

  pub fn flags(&self) -> Flags {
    self.flags
  }

  pub fn is_halted(&self) -> bool {
    self.state == State::Halted
  }

  pub fn ram_read(&self, address: u8) -> u8 {
    self.memory[address as usize]
  }

  pub fn ram_write(&mut self, address: u8, value: u8) {
    self.memory[address as usize] = value;
  }

  pub fn output(&self) -> &W {
    &self.out
  }

  pub fn into_output(self) -> W {
    self.out
  }

  fn fetch(&self, address: usize) -> Result<u8, Error> {
    self
      .memory
      .get(address)
      .copied()
      .ok_or(Error::AddressOutOfRange(address))
  }

  fn alu(&mut self, op: AluOp, a: usize, b: usize) {
    let (ra, rb) = (self.registers[a], self.registers[b]);
    match op {
      AluOp::Add => self.registers[a] = ra.wrapping_add(rb),
      AluOp::Mul => self.registers[a] = ra.wrapping_mul(rb),
      AluOp::Cmp => self.flags = Flags::from_ordering(ra.cmp(&rb)),
    }
  }

  // r[7] ← r[7] − 1; m[r[7]] ← value(r)
  //
  // `value` sees the registers after the decrement, so pushing R7 stores the
  // new stack pointer.
  fn push<F>(&mut self, value: F) -> Result<(), Error>
  where
    F: FnOnce(&[u8; REGISTER_COUNT]) -> u8,
  {
    let sp = self.registers[SP].checked_sub(1).ok_or(Error::StackOverflow)?;
    self.registers[SP] = sp;
    self.memory[sp as usize] = value(&self.registers);
    Ok(())
  }

  // r[a] ← m[r[7]]; r[7] ← r[7] + 1
  //
  // The increment reads R7 after the write, so popping into R7 leaves the
  // popped value plus one. Nothing changes if the increment would overflow.
  fn pop_into(&mut self, a: usize) -> Result<(), Error> {
    let mut registers = self.registers;
    registers[a] = self.memory[registers[SP] as usize];
    registers[SP] = registers[SP].checked_add(1).ok_or(Error::StackUnderflow)?;
    self.registers = registers;
    Ok(())
  }

  // pc ← m[r[7]]; r[7] ← r[7] + 1
  fn pop(&mut self) -> Result<u8, Error> {
    let sp = self.registers[SP];
    let next = sp.checked_add(1).ok_or(Error::StackUnderflow)?;
    self.registers[SP] = next;
    Ok(self.memory[sp as usize])
  }
}

struct Task<'vm, W> {
  vm: &'vm mut Vm<W>,
  op: Opcode,
}

impl<'vm, W> Task<'vm, W>
where
  W: Write,
{
  fn new(vm: &'vm mut Vm<W>, op: Opcode) -> Self {
    Self { vm, op }
  }

  /// The `n`th byte after the opcode
  fn operand(&self, n: usize) -> Result<u8, Error> {
    self.vm.fetch(self.vm.pc + 1 + n)
  }

  /// The `n`th operand, checked to name a register
  fn register(&self, n: usize) -> Result<usize, Error> {
    let index = self.operand(n)?;
    if (index as usize) < REGISTER_COUNT {
      Ok(index as usize)
    } else {
      Err(Error::InvalidRegister(index))
    }
  }

  // pc ← pc + width(op)
  fn advance(&mut self) {
    self.vm.pc += self.op.width() as usize;
  }

  fn jump(&mut self, target: u8) {
    self.vm.pc = target as usize;
  }

  fn run(&mut self) -> Result<(), Error> {
    match self.op {
      Opcode::Hlt => hlt(self),
      Opcode::Ret => ret(self)?,
      Opcode::Push => push(self)?,
      Opcode::Pop => pop(self)?,
      Opcode::Prn => prn(self)?,
      Opcode::Call => call(self)?,
      Opcode::Jmp => jmp(self)?,
      Opcode::Jeq => jeq(self)?,
      Opcode::Jne => jne(self)?,
      Opcode::Ldi => ldi(self)?,
      Opcode::Add => alu(self, AluOp::Add)?,
      Opcode::Mul => alu(self, AluOp::Mul)?,
      Opcode::Cmp => alu(self, AluOp::Cmp)?,
    }
    Ok(())
  }
}

// (stop execution)
fn hlt<W: Write>(task: &mut Task<'_, W>) {
  task.vm.state = State::Halted;
  log::debug!("halted at {:#04x}", task.vm.pc);
}

// pc ← m[r[7]]; r[7] ← r[7] + 1
fn ret<W: Write>(task: &mut Task<'_, W>) -> Result<(), Error> {
  let target = task.vm.pop()?;
  task.jump(target);
  Ok(())
}

// r[7] ← r[7] − 1; m[r[7]] ← r[a]
fn push<W: Write>(task: &mut Task<'_, W>) -> Result<(), Error> {
  let a = task.register(0)?;
  task.vm.push(|registers| registers[a])?;
  task.advance();
  Ok(())
}

// r[a] ← m[r[7]]; r[7] ← r[7] + 1
fn pop<W: Write>(task: &mut Task<'_, W>) -> Result<(), Error> {
  let a = task.register(0)?;
  task.vm.pop_into(a)?;
  task.advance();
  Ok(())
}

// out ← r[a]
fn prn<W: Write>(task: &mut Task<'_, W>) -> Result<(), Error> {
  let a = task.register(0)?;
  writeln!(task.vm.out, "{}", task.vm.registers[a])?;
  task.advance();
  Ok(())
}

// r[7] ← r[7] − 1; m[r[7]] ← pc + 2; pc ← r[a]
fn call<W: Write>(task: &mut Task<'_, W>) -> Result<(), Error> {
  let a = task.register(0)?;
  let next = task.vm.pc + task.op.width() as usize;
  let next = u8::try_from(next).map_err(|_| Error::AddressOutOfRange(next))?;
  task.vm.push(|_| next)?;
  let target = task.vm.registers[a];
  task.jump(target);
  Ok(())
}

// pc ← r[a]
fn jmp<W: Write>(task: &mut Task<'_, W>) -> Result<(), Error> {
  let a = task.register(0)?;
  let target = task.vm.registers[a];
  task.jump(target);
  Ok(())
}

// if E : pc ← r[a]
fn jeq<W: Write>(task: &mut Task<'_, W>) -> Result<(), Error> {
  let equal = task.vm.flags.equal();
  jump_if(task, equal)
}

// if !E : pc ← r[a]
fn jne<W: Write>(task: &mut Task<'_, W>) -> Result<(), Error> {
  let equal = task.vm.flags.equal();
  jump_if(task, !equal)
}

fn jump_if<W: Write>(task: &mut Task<'_, W>, taken: bool) -> Result<(), Error> {
  let a = task.register(0)?;
  if taken {
    let target = task.vm.registers[a];
    task.jump(target);
  } else {
    task.advance();
  }
  Ok(())
}

// r[a] ← vv
fn ldi<W: Write>(task: &mut Task<'_, W>) -> Result<(), Error> {
  let a = task.register(0)?;
  let value = task.operand(1)?;
  task.vm.registers[a] = value;
  task.advance();
  Ok(())
}

// r[a] ← r[a] op r[b], or fl ← cmp(r[a], r[b])
fn alu<W: Write>(task: &mut Task<'_, W>, op: AluOp) -> Result<(), Error> {
  let a = task.register(0)?;
  let b = task.register(1)?;
  task.vm.alu(op, a, b);
  task.advance();
  Ok(())
}
