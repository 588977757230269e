//! Raw binary images for NOR-backed targets
//!
//! No parsing happens here: the file is the image. Validation is a size
//! check against the backend's region capacity, and the tail is padded
//! with 0xFF (the NOR erased value) to a whole number of program pages.

use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::nor::PAGE_SIZE;

/// A validated raw flash image, padded to a page multiple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    data: Vec<u8>,
    len: usize,
}

impl RawImage {
    /// Validate `bytes` against the backend's maximum image size
    pub fn from_bytes(bytes: &[u8], max: usize) -> Result<Self> {
        if bytes.len() > max {
            return Err(Error::ImageTooLarge {
                size: bytes.len(),
                max,
            });
        }
        let mut data = bytes.to_vec();
        let tail = data.len() % PAGE_SIZE;
        if tail != 0 {
            data.resize(data.len() + PAGE_SIZE - tail, 0xFF);
        }
        Ok(Self {
            data,
            len: bytes.len(),
        })
    }

    /// The padded image contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length of the original file, before padding
    pub fn original_len(&self) -> usize {
        self.len
    }
}
