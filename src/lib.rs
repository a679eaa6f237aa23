//! A Redis-protocol key-value server backed by an ordered storage engine.
//!
//! Clients speak RESP over TCP or a unix socket; commands are routed through
//! a static handler table onto an abstract [`storage::Store`], so engines can
//! be swapped at server construction.

pub mod commands;
pub mod protocol;
pub mod server;
pub mod storage;

pub use commands::{CommandDispatcher, ConnContext};
pub use protocol::{CommandFrame, Reply, RespParser, RespSerializer};
pub use server::{Server, ServerConfig};
pub use storage::{MemoryStore, Store};
