use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{LEN_TYPE_SIZE, LenType, MAX_FRAME_LEN, Serialize};

/// Writes length prefixed frames.
///
/// The owned part of every message is staged in a reusable buffer, bulk float data borrowed
/// by the message goes straight to the writer after it.
pub struct OnoSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: W,
    frame: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> OnoSender<W> {
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            frame: Vec::new(),
        }
    }

    /// Sends `msg` as a single frame and flushes the writer.
    ///
    /// # Arguments
    /// * `msg` - The message to send.
    ///
    /// # Returns
    /// An `InvalidInput` io error if the frame is too large, or the writer's error.
    pub async fn send<'a, T: Serialize<'a>>(&mut self, msg: &'a T) -> io::Result<()> {
        self.frame.clear();
        self.frame.extend_from_slice(&[0; LEN_TYPE_SIZE]);

        let borrowed = msg.serialize(&mut self.frame);
        let body_len = self.frame.len() - LEN_TYPE_SIZE + borrowed.map_or(0, <[u8]>::len);

        if body_len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame of {body_len} bytes exceeds the limit of {MAX_FRAME_LEN}"),
            ));
        }

        self.frame[..LEN_TYPE_SIZE].copy_from_slice(&(body_len as LenType).to_be_bytes());
        self.tx.write_all(&self.frame).await?;

        if let Some(data) = borrowed {
            self.tx.write_all(data).await?;
        }

        self.tx.flush().await
    }
}
