//! MSTP simulation daemon.
//!
//! Hosts one [`sonic_mstp::MstpNode`] behind an HTTP RPC surface, and
//! provides the collaborators the node relies on from outside: the
//! configuration file, the HTTP transport to other nodes and the status
//! poller that assembles the global port-state snapshot.

pub mod config_file;
pub mod error;
pub mod http_transport;
pub mod poller;
pub mod rest_api;

pub use config_file::MstpdConfig;
pub use error::{MstpdError, Result};
pub use http_transport::HttpTransport;
pub use poller::{NetworkStatus, StatusPoller};
pub use rest_api::{router, AppState};
