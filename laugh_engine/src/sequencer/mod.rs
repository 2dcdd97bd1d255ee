/// Command buffer recording for the precompute work and the steady frame

pub mod command_sequencer;

pub use command_sequencer::*;
