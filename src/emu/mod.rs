mod chip8;
mod execute;
mod font;
mod machine;
mod opcode;
mod runner;
mod types;

pub use chip8::*;
pub use font::*;
pub use machine::*;
pub use opcode::*;
pub use runner::*;
pub use types::*;
