//! Streaming image writes into erased NOR flash.

mod ledger;
mod stream;

pub use ledger::EraseLedger;
pub use stream::FlashWriteStream;

/// Flash program granularity the stream aligns to.
pub const WORD_SIZE: usize = 4;
