//! The accept loop: binds a listener, spawns one task per inbound
//! connection, and drives each through the frame codec and [`Dispatcher`].
//! Outbound connections reuse the same per-connection drive loop.

use std::net::SocketAddr;
use std::sync::Arc;

use ember_core::{BlockchainBackend, Mempool};
use log::{info, warn};
use tokio::net::{TcpListener, TcpStream};

use crate::{
    connection::{ConnectionContext, Dispatcher},
    error::P2pError,
    peer_manager::PeerManager,
    protocol::{codec::read_frame, commands::BasicNodeData},
};

pub struct P2pServer<B: BlockchainBackend> {
    dispatcher: Arc<Dispatcher<B>>,
    peers: Arc<PeerManager>,
    allow_local_peers: bool,
}

impl<B: BlockchainBackend + Send + Sync + 'static> P2pServer<B> {
    pub fn new(dispatcher: Arc<Dispatcher<B>>, peers: Arc<PeerManager>, allow_local_peers: bool) -> Self {
        P2pServer { dispatcher, peers, allow_local_peers }
    }

    pub async fn listen(&self, bind_addr: SocketAddr) -> Result<(), P2pError> {
        let listener = TcpListener::bind(bind_addr).await?;
        info!(
            "p2p server listening on {bind_addr} at {}",
            chrono::Utc::now().to_rfc3339()
        );
        loop {
            let (stream, remote) = listener.accept().await?;
            if let std::net::IpAddr::V4(ip) = remote.ip() {
                if self.peers.is_banned(u32::from(ip)) {
                    continue;
                }
                if !PeerManager::is_ip_allowed(ip, self.allow_local_peers) {
                    continue;
                }
            }
            let dispatcher = self.dispatcher.clone();
            tokio::spawn(async move {
                if let Err(err) = drive_connection(stream, remote, dispatcher).await {
                    warn!("connection to {remote} ended: {err}");
                }
            });
        }
    }
}

/// Reads frames from `stream` until it closes or the peer sends something
/// the current connection state doesn't permit, dispatching each one.
pub async fn drive_connection<B: BlockchainBackend>(
    mut stream: TcpStream,
    remote: SocketAddr,
    dispatcher: Arc<Dispatcher<B>>,
) -> Result<(), P2pError> {
    let remote_ip = match remote.ip() {
        std::net::IpAddr::V4(ip) => u32::from(ip),
        std::net::IpAddr::V6(_) => 0,
    };
    let mut ctx = ConnectionContext::new(remote_ip, remote.port() as u32, true);

    loop {
        let frame = read_frame(&mut stream).await?;
        match dispatcher.dispatch(&mut ctx, frame.command_id, &frame.payload) {
            Ok(Some(response)) => {
                use tokio::io::AsyncWriteExt;
                stream.write_all(&response).await?;
            }
            Ok(None) => {}
            Err(err) => return Err(err),
        }
        if ctx.state == crate::connection::ConnectionState::Shutdown {
            return Ok(());
        }
    }
}

pub fn default_node_data(peer_id: u64, my_port: u32, network_id: [u8; 16]) -> BasicNodeData {
    BasicNodeData {
        network_id,
        version: 1,
        local_time: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
        my_port,
        peer_id,
        node_version: env!("CARGO_PKG_VERSION").to_string(),
        support_flags: crate::protocol::commands::PeerSupportFlags::FLUFFY_BLOCKS,
    }
}
