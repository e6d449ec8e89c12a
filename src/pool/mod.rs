//! Worker Pool Module
//!
//! A fixed-size pool of OS threads draining one shared, unbounded FIFO queue.
//! The server submits one task per accepted connection.
//!
//! ```text
//!  submit() ──> ┌──────────────────────────────┐
//!               │ Mutex<VecDeque<Task>>        │──notify_one──┐
//!               └──────────────────────────────┘              │
//!                      │ pop_front (under lock)               ▼
//!          ┌───────────┼───────────┬───────────┐        ┌───────────┐
//!          ▼           ▼           ▼           ▼        │  Condvar  │
//!      worker-0    worker-1    worker-2    worker-N     └───────────┘
//!      (runs task outside the lock)
//! ```

pub mod worker;

pub use worker::{Task, WorkerPool};
