pub mod asm;
pub mod disasm;
pub mod ir;
pub mod lower;
pub mod op;

pub use asm::{assemble, CodeBuffer, LabelMap};
pub use disasm::disassemble;
pub use ir::{Ins, InstructionList};
pub use lower::lower;
pub use op::{CodeAddr, Opcode};
