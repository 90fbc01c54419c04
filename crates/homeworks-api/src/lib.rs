// homeworks-api: Async transport and protocol engine for Lutron Homeworks processors

pub mod address;
pub mod command;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod framing;
pub mod handshake;
pub mod parser;
pub mod transport;
pub mod writer;

pub use address::{ADDRESS_SPACE_LEN, AddressSpace, DeviceAddress};
pub use command::Command;
pub use config::{ConnectionConfig, HandshakeMode, TransportKind};
pub use connection::{Connection, ConnectionEvent, ConnectionEvents, ConnectionState};
pub use discovery::ScanReport;
pub use error::Error;
pub use framing::LineFramer;
pub use handshake::{Classification, HandshakeState, LoginHandshake};
pub use parser::DeviceUpdate;
pub use transport::{StreamTransport, Transport, TransportEvent};
pub use writer::{CommandWriter, Pacing};
