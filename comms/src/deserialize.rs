use std::io;

/// Types that can be read from an `OnoReceiver`, the result may borrow from the receive buffer.
pub trait Deserialize<'a>: Sized {
    fn deserialize(buf: &'a mut [u8]) -> io::Result<Self>;
}
