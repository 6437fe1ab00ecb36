//! Minimal big-endian parsing helpers for caveat terms and packed execution calldata.

use alloy_primitives::{Address, U256};

pub fn read_vec(bytes: &[u8], i: &mut usize, len: usize) -> Result<Vec<u8>, ()> {
    if bytes.len() < *i + len {
        return Err(());
    }
    let out = bytes[*i..*i + len].to_vec();
    *i += len;
    Ok(out)
}

pub fn read_u256_be(bytes: &[u8], i: &mut usize) -> Result<U256, ()> {
    if bytes.len() < *i + 32 {
        return Err(());
    }
    let out = U256::from_be_slice(&bytes[*i..*i + 32]);
    *i += 32;
    Ok(out)
}

/// A 32-byte word that must fit in a `u64`.
pub fn read_u64_word(bytes: &[u8], i: &mut usize) -> Result<u64, ()> {
    let word = read_u256_be(bytes, i)?;
    u64::try_from(word).map_err(|_| ())
}

pub fn read_address(bytes: &[u8], i: &mut usize) -> Result<Address, ()> {
    if bytes.len() < *i + 20 {
        return Err(());
    }
    let out = Address::from_slice(&bytes[*i..*i + 20]);
    *i += 20;
    Ok(out)
}
