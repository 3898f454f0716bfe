//! Display server connections.
//!
//! | Implementation    | Platform      | Purpose                               |
//! |-------------------|---------------|---------------------------------------|
//! | `X11Connection`   | Linux         | Production, over `x11rb`              |
//! | `MockDisplay`     | all           | In-memory X server for tests          |
//!
//! The production implementation is compiled only on Linux; everywhere else
//! the engine can only be driven through the mock.

pub mod mock;

#[cfg(target_os = "linux")]
pub mod x11;
