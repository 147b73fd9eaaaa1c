// Copyright 2020 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <jonas@bmc-labs.com>

use crate::fubar::{Fubar, Result};
use std::{ffi::{CStr, CString},
          os::raw::c_char,
          path::Path};


/// Converts a `*const c_char`, i.e. a raw C string (`const char *` in C), to a
/// Rust `std::ffi::CString`, which is owned. This guarantees lifetime safety.
pub fn strptr_to_cstring(strptr: *const c_char) -> Result<CString> {
  if strptr.is_null() {
    return Err(Fubar::InvalidString("fetched null pointer".to_owned()));
  }
  Ok(unsafe { CStr::from_ptr(strptr) }.to_owned())
}

/// Convenience function to convert directly to Rust's `String` type from a
/// `*const c_char`, i.e. a raw C string (`const char *` in C).
pub fn strptr_to_string(strptr: *const c_char) -> Result<String> {
  Ok(strptr_to_cstring(strptr)?.to_str()?.to_owned())
}

/// Like `strptr_to_string`, but never fails: a null pointer becomes an empty
/// string and invalid UTF-8 is replaced. Used for error messages, where
/// failing to convert the message must not hide the original error.
pub fn strptr_to_string_lossy(strptr: *const c_char) -> String {
  if strptr.is_null() {
    return String::new();
  }
  unsafe { CStr::from_ptr(strptr) }.to_string_lossy().into_owned()
}

/// Convenience function to convert directly from a Rust `&str` to a
/// `std::ffi::CString`, i.e. a lifetime safe object capable of providing a raw
/// C string (`*const c_char` in Rust, `const char *` in C).
pub fn strref_to_cstring(strref: &str) -> Result<CString> {
  Ok(CString::new(strref)?)
}

/// Converts a Rust `std::path::Path` to a `std::ffi::CString` object. The path
/// is made absolute if it exists; a path that doesn't is passed on as is and
/// left to the decoder to complain about.
pub fn path_to_cstring(path: &Path) -> Result<CString> {
  let path = path.canonicalize().unwrap_or_else(|_| path.to_owned());
  strref_to_cstring(path.to_str().ok_or_else(|| {
                              Fubar::InvalidString(format!("path '{}' invalid",
                                                           path.display()))
                            })?)
}
