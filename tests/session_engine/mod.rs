//! Session engine integration tests
//!
//! Each test starts an in-process SSH proxy on a loopback port with a freshly
//! generated host key. It accepts one user and one-time code, answers exec
//! requests with an exit status or signal, and echoes direct-tcpip channels.
//!
//! ```bash
//! cargo test --test session_engine
//! ```

pub mod fixtures;

mod host_key_tests;
mod session_tests;
