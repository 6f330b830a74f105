use std::{fmt, path::PathBuf};

/// Result type for CHIP-8 CPU cycle execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip8Result {
    /// Continue executing instructions in the current frame.
    Continue,
    /// The display changed; present it before continuing.
    WaitForNextFrame,
    /// FX0A found no key pressed and rewound the program counter,
    /// so the next cycle executes the same instruction again.
    WaitingForKey,
}

/// Errors raised while placing a program into memory.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read ROM file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ROM is empty")]
    Empty,

    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    Capacity { size: usize, max_size: usize },
}

/// What went wrong while executing an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error("Unknown opcode: {opcode:#06X}")]
    UnknownOpcode { opcode: u16 },

    #[error("Stack overflow: call depth exceeds 16 entries")]
    StackOverflow,

    #[error("Stack underflow: attempted to return from a subroutine with empty call stack")]
    StackUnderflow,

    #[error("Memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: usize },

    #[error("Index register overflow: {index:#06X} + {offset:#04X} does not fit in 16 bits")]
    IndexOverflow { index: u16, offset: u8 },

    #[error("Invalid key {key:#04X}, keypad has 16 keys")]
    InvalidKey { key: u8 },
}

/// A [`Fault`] together with the machine context it occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{fault} (pc {pc:#05X}, opcode {}, cycle {cycle})", OpcodeText(.opcode))]
pub struct Chip8Error {
    pub fault: Fault,
    /// Address of the instruction that faulted.
    pub pc: u16,
    /// `None` when the fault happened while fetching.
    pub opcode: Option<u16>,
    pub cycle: u64,
}

struct OpcodeText<'a>(&'a Option<u16>);

impl fmt::Display for OpcodeText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.0 {
            Some(opcode) => write!(f, "{opcode:#06X}"),
            None => f.write_str("<unfetched>"),
        }
    }
}

/// Rejected instruction rate for a [`Chip8Runner`](super::Chip8Runner).
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("CPU rate must be a positive number of instructions per second, got {0}")]
pub struct InvalidCpuHz(pub f32);

/// How the delay and sound timers are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerMode {
    /// Every executed instruction decrements both timers.
    #[default]
    PerCycle,
    /// Timers only move when [`Chip8::tick_timers`](super::Chip8::tick_timers) is called.
    External,
}

/// What a runner does when the program contains an undecodable word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownOpcodePolicy {
    #[default]
    Halt,
    /// Log the fault and carry on with the next instruction.
    Skip,
}

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
/// A type alias for the CHIP-8 display buffer representation
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];
