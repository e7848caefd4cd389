/// Types that can be written into an `OnoSender`.
pub trait Serialize<'a> {
    /// Writes the owned part of the message into `buf`.
    ///
    /// # Arguments
    /// * `buf` - The buffer to write the framed header and any copied data to.
    ///
    /// # Returns
    /// An optional borrowed slice that will be written right after `buf` without copying it.
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]>;
}
