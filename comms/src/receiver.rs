use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Align4, Deserialize, LEN_TYPE_SIZE, LenType, MAX_FRAME_LEN};

/// Reads length prefixed frames.
pub struct OnoReceiver<R: AsyncRead + Unpin> {
    rx: R,
}

impl<R: AsyncRead + Unpin> OnoReceiver<R> {
    pub(super) fn new(rx: R) -> Self {
        Self { rx }
    }

    /// Waits for the next frame and decodes it.
    ///
    /// The frame body is read into `buf`, resized to fit it. Its element type keeps the body
    /// four byte aligned so float payloads can be borrowed without copying.
    ///
    /// # Arguments
    /// * `buf` - The receive buffer, the returned `T` may borrow from it.
    ///
    /// # Returns
    /// The decoded message, an `InvalidData` io error if the announced length is over the
    /// limit, or the reader's error.
    pub async fn recv_into<'buf, T, B>(&mut self, buf: &'buf mut Vec<B>) -> io::Result<T>
    where
        T: Deserialize<'buf>,
        B: Align4,
    {
        let mut len = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut len).await?;

        let len = LenType::from_be_bytes(len);
        let len = usize::try_from(len)
            .ok()
            .filter(|&len| len <= MAX_FRAME_LEN)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("announced frame of {len} bytes exceeds the limit of {MAX_FRAME_LEN}"),
                )
            })?;

        buf.clear();
        buf.resize(len.div_ceil(size_of::<B>()), <B as bytemuck::Zeroable>::zeroed());

        let body = &mut bytemuck::cast_slice_mut::<B, u8>(buf)[..len];
        self.rx.read_exact(body).await?;

        T::deserialize(body)
    }
}
