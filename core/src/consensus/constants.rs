/// Target seconds between blocks.
pub const DIFFICULTY_TARGET: u64 = 120;

/// LWMA-2 window size for the V5 (current) difficulty variant.
pub const DIFFICULTY_WINDOW: usize = 60;

/// Allowed future drift for a block's timestamp, in seconds.
pub const BLOCK_FUTURE_TIME_LIMIT: u64 = 7_200;

/// Number of past timestamps the median-timestamp check considers.
pub const TIMESTAMP_CHECK_WINDOW: usize = 60;

/// Height at which the tighter mixin bounds (`mixin_bounds` V1) take
/// effect; configurable per network, defaults to "always on".
pub const DEFAULT_MIXIN_LIMITS_V1_HEIGHT: u64 = 0;

/// Namespace base for P2P-level command IDs (`HANDSHAKE`, `TIMED_SYNC`,
/// `PING`); block/tx-gossip and sync commands use their own base so the
/// two command spaces never collide.
pub const P2P_COMMANDS_POOL_BASE: u32 = 1000;

/// Default per-peer transaction push rate limit: at most this many
/// `NOTIFY_NEW_TRANSACTIONS` pushes within `TX_PUSH_WINDOW_SECS`.
pub const DEFAULT_TX_PUSH_LIMIT: u32 = 15;
pub const DEFAULT_TX_PUSH_WINDOW_SECS: u64 = 240;

/// Fraction (percent) of connection attempts steered toward the
/// ping-confirmed white peer list rather than the gray list.
pub const WHITE_LIST_CONNECTION_WEIGHT_PERCENT: u8 = 70;

/// Minimum fee a transaction must pay (Σinputs - Σoutputs), in atomic
/// units, below which it is rejected regardless of block inclusion.
pub const MINIMUM_FEE: u64 = 10;

/// Alt-chain blocks deeper than this behind the main tip are pruned as
/// permanently orphaned.
pub const MAX_ALT_CHAIN_DEPTH: u64 = 2_000;

/// How long a pool transaction may sit unmined before `clean()` evicts
/// it, in seconds.
pub const POOL_TX_LIVE_TIME_SECS: u64 = 86_400;

/// How long an evicted transaction hash is remembered in the "recently
/// deleted" set before it may be re-admitted, in seconds.
pub const POOL_TX_RECENTLY_DELETED_TTL_SECS: u64 = 3_600;
