//! Framing and messages exchanged between workers and parameter servers.
//!
//! Every frame is a big endian `u64` body length followed by the body. Control messages are
//! JSON, gradients and parameters travel as raw floats behind the global step they belong to.

mod align;
mod deserialize;
pub mod msg;
mod receiver;
mod sender;
mod serialize;
pub mod specs;

use tokio::io::{AsyncRead, AsyncWrite};

pub use align::{Align1, Align4};
pub use deserialize::Deserialize;
pub use receiver::OnoReceiver;
pub use sender::OnoSender;
pub use serialize::Serialize;

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

/// The largest frame body either end accepts, in bytes.
pub const MAX_FRAME_LEN: usize = 1 << 30;

/// Wraps both halves of a connection between a worker and a parameter server.
///
/// # Arguments
/// * `rx` - The reading half.
/// * `tx` - The writing half.
///
/// # Returns
/// The framed receiver and sender.
pub fn channel<R, W>(rx: R, tx: W) -> (OnoReceiver<R>, OnoSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (OnoReceiver::new(rx), OnoSender::new(tx))
}
