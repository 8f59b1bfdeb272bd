//! On-the-wire framing for published payloads.
//!
//! Every published message carries a leading kind byte: `0x00` for a
//! plain payload, `0x01` for one sealed to a single recipient key.
//! Sealed frames that none of the registered secrets can open are
//! dropped at the transport and never delivered.

use tracing::trace;

use causerie_shared::{crypto, CryptoError, Identity, Pubkey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Plain = 0x00,
    Sealed = 0x01,
}

impl FrameKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::Plain),
            0x01 => Some(Self::Sealed),
            _ => None,
        }
    }
}

/// Frame a payload for publishing, sealing it when a recipient is given.
pub fn encode_frame(payload: &[u8], seal_to: Option<&Pubkey>) -> Result<Vec<u8>, CryptoError> {
    match seal_to {
        None => {
            let mut framed = Vec::with_capacity(1 + payload.len());
            framed.push(FrameKind::Plain as u8);
            framed.extend_from_slice(payload);
            Ok(framed)
        }
        Some(recipient) => {
            let sealed = crypto::seal(recipient, payload)?;
            let mut framed = Vec::with_capacity(1 + sealed.len());
            framed.push(FrameKind::Sealed as u8);
            framed.extend_from_slice(&sealed);
            Ok(framed)
        }
    }
}

/// Unframe an inbound payload. Returns the inner payload when the frame
/// is plain or sealed to one of `secrets`; `None` means drop it.
pub fn open_frame(framed: &[u8], secrets: &[Identity]) -> Option<Vec<u8>> {
    let (&kind_byte, body) = framed.split_first()?;

    match FrameKind::from_byte(kind_byte)? {
        FrameKind::Plain => Some(body.to_vec()),
        FrameKind::Sealed => {
            for secret in secrets {
                if let Ok(plain) = crypto::open(secret, body) {
                    return Some(plain);
                }
            }
            trace!(len = framed.len(), "dropping sealed frame for another recipient");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_frame_roundtrip() {
        let framed = encode_frame(b"hello", None).unwrap();
        assert_eq!(framed[0], FrameKind::Plain as u8);
        assert_eq!(open_frame(&framed, &[]).unwrap(), b"hello");
    }

    #[test]
    fn sealed_frame_opens_only_for_the_holder() {
        let holder = Identity::generate();
        let bystander = Identity::generate();

        let framed = encode_frame(b"for your eyes", Some(&holder.public())).unwrap();
        assert_eq!(framed[0], FrameKind::Sealed as u8);

        assert_eq!(
            open_frame(&framed, &[bystander.clone(), holder.clone()]).unwrap(),
            b"for your eyes"
        );
        assert!(open_frame(&framed, &[bystander]).is_none());
        assert!(open_frame(&framed, &[]).is_none());
    }

    #[test]
    fn unknown_kind_and_empty_input_are_dropped() {
        assert!(open_frame(&[0x7F, 1, 2, 3], &[]).is_none());
        assert!(open_frame(&[], &[]).is_none());
    }
}
