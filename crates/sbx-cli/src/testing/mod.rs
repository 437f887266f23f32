//! Test doubles for the machine and the host platform.

mod mock_machine;
mod mock_platform;

pub use mock_machine::MockMachine;
pub use mock_platform::MockPlatform;
