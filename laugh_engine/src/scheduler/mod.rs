/// Queue submission: fenced precompute and the semaphore-chained steady frame

pub mod frame_scheduler;

pub use frame_scheduler::*;
