//! Checked conversions between rust and sql integer types.

use super::*;
use std::fmt::Display;

fn out_of_range(value: impl Display, target: &str) -> StoreError {
    StoreError::Query(format!("{value} cannot be converted to {target}"))
}

pub fn i64_to_u64(i: i64) -> Result<u64, StoreError> {
    u64::try_from(i).map_err(|_| out_of_range(i, "u64"))
}
pub fn u64_to_i64(i: u64) -> Result<i64, StoreError> {
    i64::try_from(i).map_err(|_| out_of_range(i, "i64"))
}

pub fn i32_to_u32(i: i32) -> Result<u32, StoreError> {
    u32::try_from(i).map_err(|_| out_of_range(i, "u32"))
}
pub fn u32_to_i32(i: u32) -> Result<i32, StoreError> {
    i32::try_from(i).map_err(|_| out_of_range(i, "i32"))
}

pub fn u32_to_i64(i: u32) -> i64 {
    i64::from(i)
}
