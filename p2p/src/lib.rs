pub mod connection;
pub mod error;
pub mod peer_manager;
pub mod protocol;
pub mod server;
pub mod sync;

pub use connection::{ConnectionContext, ConnectionState, Dispatcher};
pub use error::P2pError;
pub use peer_manager::{PeerManager, Peerlist};
pub use server::{default_node_data, P2pServer};
pub use sync::{find_split_height, plan_sync, SyncAction};
