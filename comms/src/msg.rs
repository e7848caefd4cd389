use std::{borrow::Cow, io};

use crate::{Deserialize, Serialize, specs::server::ServerSpec};

type Header = u32;
const HEADER_SIZE: usize = size_of::<Header>();

type Step = u64;
const STEP_SIZE: usize = size_of::<Step>();

const ERR_H: Header = 0;
const CONTROL_H: Header = 1;
const GRADIENT_H: Header = 2;
const PARAMS_H: Header = 3;

/// The payload data for the `Data` variant of the `Msg` enum.
///
/// Both variants carry the global step they refer to: for a gradient it's the step
/// the gradient was computed against, for parameters it's the step they belong to.
#[derive(Debug)]
pub enum Payload<'a> {
    Gradient { step: u64, grad: &'a [f32] },
    Params { step: u64, params: &'a [f32] },
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Join { worker_index: usize, is_chief: bool },
    Initialize(ServerSpec),
    Ready { step: u64 },
    Disconnect,
}

/// The application layer message for the entire system.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    /// Returns a short name of this message's kind, useful for logging protocol violations.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(Command::Join { .. }) => "control/join",
            Msg::Control(Command::Initialize(_)) => "control/initialize",
            Msg::Control(Command::Ready { .. }) => "control/ready",
            Msg::Control(Command::Disconnect) => "control/disconnect",
            Msg::Data(Payload::Gradient { .. }) => "data/gradient",
            Msg::Data(Payload::Params { .. }) => "data/params",
            Msg::Err(_) => "err",
        }
    }

    fn buf_is_too_small<T>(size: usize, min: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {min} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid kind header {kind}"),
        ))
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]> {
        match self {
            Msg::Err(e) => {
                buf.extend_from_slice(&ERR_H.to_be_bytes());
                Some(e.as_bytes())
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&CONTROL_H.to_be_bytes());

                // SAFETY: Serialize impl for `Command` is derived and not implemented
                //         by hand. Nor has a non string-key map inside.
                serde_json::to_writer(buf, &cmd).unwrap();
                None
            }
            Msg::Data(payload) => {
                let (kind, step, nums) = match payload {
                    Payload::Gradient { step, grad } => (GRADIENT_H, step, grad),
                    Payload::Params { step, params } => (PARAMS_H, step, params),
                };

                buf.extend_from_slice(&kind.to_be_bytes());
                buf.extend_from_slice(&step.to_be_bytes());
                Some(bytemuck::cast_slice(nums))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a mut [u8]) -> io::Result<Self> {
        let buf: &'a [u8] = buf;

        if buf.len() < HEADER_SIZE {
            return Self::buf_is_too_small(buf.len(), HEADER_SIZE);
        }

        let (kind_buf, rest) = buf.split_at(HEADER_SIZE);

        // SAFETY: We splitted the buffer to be of size `HEADER_SIZE` just above.
        let kind = Header::from_be_bytes(kind_buf.try_into().unwrap());

        match kind {
            ERR_H => {
                let string = std::str::from_utf8(rest)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Err(Cow::Borrowed(string)))
            }
            CONTROL_H => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            GRADIENT_H | PARAMS_H => {
                if rest.len() < STEP_SIZE {
                    return Self::buf_is_too_small(buf.len(), HEADER_SIZE + STEP_SIZE);
                }

                let (step_buf, nums) = rest.split_at(STEP_SIZE);

                // SAFETY: We splitted the buffer to be of size `STEP_SIZE` just above.
                let step = Step::from_be_bytes(step_buf.try_into().unwrap());
                let nums = bytemuck::try_cast_slice(nums).map_err(|err| {
                    io::Error::new(io::ErrorKind::InvalidData, format!("{err:?}"))
                })?;

                let payload = match kind {
                    GRADIENT_H => Payload::Gradient { step, grad: nums },
                    _ => Payload::Params { step, params: nums },
                };

                Ok(Self::Data(payload))
            }
            kind => Self::invalid_kind(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_kind() {
        let mut buf = 9u32.to_be_bytes().to_vec();
        let err = Msg::deserialize(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_data_without_step() {
        let mut buf = GRADIENT_H.to_be_bytes().to_vec();
        buf.extend_from_slice(&[0; 3]);
        assert!(Msg::deserialize(&mut buf).is_err());
    }

    #[test]
    fn data_header_is_kind_then_step() {
        let grad = [1., 2.];
        let msg = Msg::Data(Payload::Gradient { step: 7, grad: &grad });

        let mut buf = Vec::new();
        let data = msg.serialize(&mut buf).unwrap();

        assert_eq!(buf[..HEADER_SIZE], GRADIENT_H.to_be_bytes());
        assert_eq!(buf[HEADER_SIZE..], 7u64.to_be_bytes());
        assert_eq!(data.len(), 2 * size_of::<f32>());
    }

    #[test]
    fn empty_params_are_valid() {
        let mut buf = PARAMS_H.to_be_bytes().to_vec();
        buf.extend_from_slice(&3u64.to_be_bytes());

        match Msg::deserialize(&mut buf).unwrap() {
            Msg::Data(Payload::Params { step, params }) => {
                assert_eq!(step, 3);
                assert!(params.is_empty());
            }
            msg => panic!("unexpected message {msg:?}"),
        }
    }
}
