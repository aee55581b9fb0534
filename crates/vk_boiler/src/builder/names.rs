//! Conversions between Vulkan's fixed-size name arrays and Rust strings

use crate::error::{BoilerError, BoilerResult};
use std::collections::BTreeSet;
use std::ffi::CString;
use std::os::raw::c_char;

/// Read a NUL-terminated name out of a fixed-size Vulkan array
pub(crate) fn vk_name(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub(crate) fn to_c_strings(names: &BTreeSet<String>) -> BoilerResult<Vec<CString>> {
    names
        .iter()
        .map(|name| CString::new(name.as_str()).map_err(|_| BoilerError::InvalidName(name.clone())))
        .collect()
}
