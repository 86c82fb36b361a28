//! Interactive command console, grounded on the teacher's
//! `base_node`/wallet console command pattern: read a line, split on
//! whitespace, dispatch to a handler, print a result. No JSON-RPC surface
//! sits behind it; every command goes straight to the in-process chain,
//! pool and peer-manager handles.

use std::io::Write;
use std::sync::Arc;

use ember_core::chain_storage::LmdbBackend;
use ember_core::Blockchain;
use ember_crypto::Hash;
use ember_p2p::PeerManager;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::miner::MiningHandle;

pub struct Console {
    chain: Arc<Blockchain<LmdbBackend>>,
    pool: Arc<ember_core::Mempool>,
    peers: Arc<PeerManager>,
    mining: Arc<MiningHandle>,
    shutdown: ember_common::Shutdown,
}

impl Console {
    pub fn new(
        chain: Arc<Blockchain<LmdbBackend>>,
        pool: Arc<ember_core::Mempool>,
        peers: Arc<PeerManager>,
        mining: Arc<MiningHandle>,
        shutdown: ember_common::Shutdown,
    ) -> Self {
        Console { chain, pool, peers, mining, shutdown }
    }

    /// Reads commands from stdin until `exit` or EOF. Runs on its own task;
    /// triggers the shared [`ember_common::Shutdown`] on exit so every
    /// other subsystem unwinds with it.
    pub async fn run(&self) {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        print_prompt();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if !line.is_empty() {
                if self.dispatch(line).await {
                    break;
                }
            }
            print_prompt();
        }
        self.shutdown.trigger();
    }

    /// Returns `true` if the console should stop reading further commands.
    async fn dispatch(&self, line: &str) -> bool {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else { return false };
        let args: Vec<&str> = parts.collect();
        match command {
            "help" => self.help(),
            "status" => self.status(),
            "print_bc" => self.print_bc(&args),
            "print_block" => self.print_block(&args),
            "print_tx" => self.print_tx(&args),
            "start_mining" => self.mining.start(),
            "stop_mining" => self.mining.stop(),
            "ban" => self.ban(&args),
            "unban" => self.unban(&args),
            "exit" | "quit" => return true,
            other => println!("unknown command {other:?}, try `help`"),
        }
        false
    }

    fn help(&self) {
        println!(
            "commands: help, status, print_bc [count], print_block <height|hash>, \
             print_tx <hash>, start_mining, stop_mining, ban <ip>, unban <ip>, exit"
        );
    }

    fn status(&self) {
        println!(
            "height={} top={} pool_size={} mining={}",
            self.chain.height(),
            self.chain.top_hash().map(|h| h.to_hex()).unwrap_or_else(|| "none".to_string()),
            self.pool.len(),
            self.mining.is_running(),
        );
    }

    fn print_bc(&self, args: &[&str]) {
        let count = args.first().and_then(|a| a.parse::<u64>().ok()).unwrap_or(10);
        let top = self.chain.height();
        let start = top.saturating_sub(count);
        for height in start..top {
            match self.chain.get_block_by_height(height) {
                Ok(Some(block)) => println!("{height}: {}", block.hash().to_hex()),
                Ok(None) => println!("{height}: <missing>"),
                Err(err) => println!("{height}: error: {err}"),
            }
        }
    }

    fn print_block(&self, args: &[&str]) {
        let Some(arg) = args.first() else {
            println!("usage: print_block <height|hash>");
            return;
        };
        let block = if let Ok(height) = arg.parse::<u64>() {
            self.chain.get_block_by_height(height)
        } else if let Some(hash) = Hash::from_hex(arg) {
            self.chain.get_block_by_hash(&hash)
        } else {
            println!("{arg:?} is neither a height nor a hex hash");
            return;
        };
        match block {
            Ok(Some(block)) => println!(
                "hash={} merkle_root={} timestamp={} txs={}",
                block.hash().to_hex(),
                block.merkle_root().to_hex(),
                block.header.timestamp,
                block.transaction_hashes.len(),
            ),
            Ok(None) => println!("not found"),
            Err(err) => println!("error: {err}"),
        }
    }

    fn print_tx(&self, args: &[&str]) {
        let Some(hash) = args.first().and_then(|a| Hash::from_hex(a)) else {
            println!("usage: print_tx <hex hash>");
            return;
        };
        if self.pool.contains(&hash) {
            println!("{} is in the pool", hash.to_hex());
        } else {
            println!("{} not found in the pool (chain lookup by tx hash is not indexed)", hash.to_hex());
        }
    }

    fn ban(&self, args: &[&str]) {
        let Some(ip) = args.first().and_then(|a| a.parse::<std::net::Ipv4Addr>().ok()) else {
            println!("usage: ban <ipv4>");
            return;
        };
        self.peers.ban(u32::from(ip));
        println!("banned {ip}");
    }

    fn unban(&self, args: &[&str]) {
        let Some(ip) = args.first().and_then(|a| a.parse::<std::net::Ipv4Addr>().ok()) else {
            println!("usage: unban <ipv4>");
            return;
        };
        self.peers.unban(u32::from(ip));
        println!("unbanned {ip}");
    }
}

fn print_prompt() {
    print!("ember> ");
    let _ = std::io::stdout().flush();
}
