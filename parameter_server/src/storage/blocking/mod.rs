mod shard;
mod store;

use shard::BlockingShard;
pub use store::BlockingStore;
