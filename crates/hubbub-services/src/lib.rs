//! hubbub-services — the relay core.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `registry` | live connections, their addresses and outbound queues |
//! | `reassembler` | per-connection chunked upload state machine |
//! | `dispatcher` | fan-out of server events onto outbound queues |
//! | `controller` | connect / event / disconnect orchestration |

pub mod controller;
pub mod dispatcher;
pub mod reassembler;
pub mod registry;

pub use controller::SessionController;
pub use dispatcher::{BroadcastDispatcher, DeliveryReport};
pub use reassembler::{ChunkReassembler, ProtocolError, ReassemblyOutcome, UploadProgress};
pub use registry::{Connection, ConnectionInfo, ConnectionRegistry, Frame, Outbound, RegistryError};
