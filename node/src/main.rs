mod cli;
mod miner;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ember_common::{EmberConfig, Shutdown};
use ember_core::chain_storage::LmdbBackend;
use ember_core::consensus::{Checkpoints, MixinBounds};
use ember_core::difficulty::DifficultyParams;
use ember_core::{Block, BlockHeader, Blockchain, ChainParams, Mempool, Transaction, TransactionInput, TransactionOutput, TransactionPrefix};
use ember_crypto::Hash;
use ember_p2p::{default_node_data, Dispatcher, P2pServer, PeerManager};
use log::info;

const LOG_TARGET: &str = "ember::node";

#[derive(Parser, Debug)]
#[clap(name = "ember_node", about = "The Ember full node")]
struct Args {
    /// Path to the node's TOML config file. Defaults to `<base_dir>/config.toml`.
    #[clap(long)]
    config: Option<PathBuf>,
    /// Overrides `storage.data_dir` from the config file.
    #[clap(long)]
    data_dir: Option<PathBuf>,
    #[clap(long, default_value = "ember_node=info,ember_core=info,ember_p2p=info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    ember_common::logging::init_logging(&args.log_filter);

    let base_dir = EmberConfig::default_base_dir()?;
    let config_path = args.config.unwrap_or_else(|| base_dir.join("config.toml"));
    let mut config = if config_path.exists() {
        EmberConfig::load(&config_path)?
    } else {
        info!(target: LOG_TARGET, "no config at {}, using defaults", config_path.display());
        EmberConfig::default()
    };
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    std::fs::create_dir_all(&config.storage.data_dir)?;

    let backend = LmdbBackend::open(&config.storage.data_dir, config.storage.lmdb_map_size_mb)?;
    let params = ChainParams {
        checkpoints: Checkpoints::embedded(),
        mixin_bounds: MixinBounds::new(config.network.mixin_limits_v1_height),
        difficulty_params: DifficultyParams {
            target_seconds: config.network.difficulty_target as i64,
            window: config.network.difficulty_window as i64,
            future_time_limit: config.network.block_future_time_limit as i64,
        },
        block_future_time_limit: config.network.block_future_time_limit,
        minimum_fee: 1,
        soft_shell_active_from: Some(config.network.soft_shell_activation_height),
        timestamp_check_window: 60,
    };
    let chain = Arc::new(Blockchain::new(backend, params)?);
    if chain.height() == 0 {
        info!(target: LOG_TARGET, "bootstrapping genesis block");
        chain.add_block(genesis_block(), vec![])?;
    }
    info!(target: LOG_TARGET, "chain opened at height {}", chain.height());

    let pool = Arc::new(Mempool::new(1));
    let peers = Arc::new(PeerManager::new(config.p2p.white_list_attempt_weight));

    let (_miner_secret, miner_key) = miner::miner_keypair(config.storage.data_dir.to_string_lossy().as_bytes());
    let mining_handle = Arc::new(miner::MiningHandle::new());
    let shutdown = Shutdown::new();

    let node_data = default_node_data(rand_peer_id(), config.p2p.listen_port as u32, config.p2p.network_id);
    let dispatcher = Arc::new(Dispatcher::new(chain.clone(), pool.clone(), peers.clone(), node_data));
    let p2p_server = P2pServer::new(dispatcher, peers.clone(), config.p2p.allow_local_ip);
    let bind_addr: std::net::SocketAddr = ([0, 0, 0, 0], config.p2p.listen_port).into();
    let p2p_shutdown = shutdown.to_signal();
    tokio::spawn(async move {
        tokio::select! {
            result = p2p_server.listen(bind_addr) => {
                if let Err(err) = result {
                    info!(target: LOG_TARGET, "p2p server stopped: {err}");
                }
            }
            _ = wait(p2p_shutdown) => {}
        }
    });

    let miner_chain = chain.clone();
    let miner_pool = pool.clone();
    let miner_handle = mining_handle.clone();
    let miner_shutdown = shutdown.to_signal();
    tokio::spawn(miner::run(miner_chain, miner_pool, miner_handle, miner_key, miner_shutdown));

    let console = cli::Console::new(chain, pool, peers, mining_handle, shutdown);
    console.run().await;
    Ok(())
}

async fn wait(mut signal: ember_common::ShutdownSignal) {
    signal.wait().await;
}

fn rand_peer_id() -> u64 {
    use rand::RngCore;
    rand::thread_rng().next_u64()
}

/// A fixed genesis block every node of this network bootstraps from,
/// analogous to the hard-coded genesis transaction in `original_source`'s
/// `CryptoNoteConfig.h`.
fn genesis_block() -> Block {
    let genesis_pubkey = ember_crypto::SecretKey::from_bytes_mod_order(&[0u8; 32]).public_key();
    let prefix = TransactionPrefix {
        version: 1,
        unlock_time: 60,
        inputs: vec![TransactionInput::Coinbase { block_index: 0 }],
        outputs: vec![TransactionOutput::key(0, genesis_pubkey)],
        extra: Vec::new(),
    };
    let coinbase = Transaction::new(prefix, vec![]);
    let header = BlockHeader {
        major_version: 1,
        minor_version: 0,
        timestamp: 1_700_000_000,
        previous_block_hash: Hash::ZERO,
        nonce: 0,
        parent_block: None,
    };
    Block::new(header, coinbase, vec![], 0, None)
}
