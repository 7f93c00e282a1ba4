// Copyright (c) Bridge Sequencer Contributors
// SPDX-License-Identifier: Apache-2.0

//! A fixed-width hex-encoded prefix of a byte string, cheap to copy and safe to
//! print in logs without dumping an entire 256-bit id.

use static_assertions::const_assert;
use std::fmt;
use thiserror::Error;

const SHORT_STR_LEN: usize = 16;
const_assert!(SHORT_STR_LEN % 2 == 0);

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ShortHexStr([u8; SHORT_STR_LEN]);

#[derive(Debug, Error)]
pub enum ShortHexStrError {
    #[error("input must have at least {0} bytes, has {1}")]
    TooShort(usize, usize),
}

impl ShortHexStr {
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, ShortHexStrError> {
        let needed = SHORT_STR_LEN / 2;
        if bytes.len() < needed {
            return Err(ShortHexStrError::TooShort(needed, bytes.len()));
        }
        let mut out = [0u8; SHORT_STR_LEN];
        hex::encode_to_slice(&bytes[..needed], &mut out).expect("buffer is exactly sized");
        Ok(Self(out))
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).expect("hex encoding is always valid utf8")
    }
}

impl fmt::Display for ShortHexStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ShortHexStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortHexStr({})", self.as_str())
    }
}
