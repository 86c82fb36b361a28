pub mod extra;
pub mod input;
pub mod output;
pub mod transaction;

pub use extra::{parse_extra, ExtraField};
pub use input::TransactionInput;
pub use output::{OutputTarget, TransactionOutput};
pub use transaction::{Transaction, TransactionPrefix};
