//! Message reassembly and the receive state machine.

pub mod assembler;

#[allow(clippy::module_inception)]
mod receiver;

pub use assembler::MessageAssembler;
pub use receiver::{
    BinaryHandler, CloseHandler, ControlHandler, ErrorHandler, Receiver, TextHandler,
};
