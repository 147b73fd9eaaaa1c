// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use crate::{decoder::{DecodeResult,
                      Decoder,
                      DecoderFault,
                      Format,
                      LibraryVersion,
                      RawBlock,
                      RawInfo,
                      RawShot},
            fubar::{Fubar, Result},
            fwifcbindings::{self as riegl, fwifc_file, fwifc_sbl_t, FwifcApi},
            service as srv,
            storage::CalibrationKind};
use lazy_static::lazy_static;
use libloading::Library;
use log::{debug, warn};
use std::{collections::HashMap,
          env,
          os::raw::c_char,
          path::{Path, PathBuf},
          ptr,
          slice,
          sync::{Arc, Mutex, MutexGuard, PoisonError, Weak}};


lazy_static! {
  /// The RIEGL libraries keep their last error message (and the buffers
  /// handed out by `read` and `get_calib`) in library global state. Every
  /// call, the fetch of its error message and the copy of its buffers happen
  /// while holding this lock.
  static ref LIBCALL_MTX: Mutex<()> = Mutex::new(());

  /// Libraries currently loaded, shared by all decoders of a format.
  static ref LOADED: Mutex<HashMap<Format, Weak<FwLibrary>>> =
    Mutex::new(HashMap::new());
}

fn libcall() -> MutexGuard<'static, ()> {
  LIBCALL_MTX.lock().unwrap_or_else(PoisonError::into_inner)
}


/// A loaded RIEGL library together with its resolved entry points.
struct FwLibrary {
  api:      FwifcApi,
  // must outlive `api`
  _library: Library,
}

impl FwLibrary {
  /// Returns the library for `format`, loading it if no decoder holds it yet.
  fn get(format: Format) -> Result<Arc<Self>> {
    let mut loaded = LOADED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(library) = loaded.get(&format).and_then(Weak::upgrade) {
      return Ok(library);
    }

    let (candidate, (api, library)) =
      first_loadable(candidates(format), |candidate| {
        let library = unsafe { Library::new(candidate) }?;
        let api = unsafe { FwifcApi::load(&library) }?;
        Ok((api, library))
      }).map_err(Fubar::LibraryUnavailable)?;

    debug!("loaded {} decoder from '{}'", format, candidate.display());
    let library = Arc::new(Self { api,
                                  _library: library });
    loaded.insert(format, Arc::downgrade(&library));
    Ok(library)
  }
}

/// Tries `load` on every candidate in turn and returns the first success. A
/// candidate that exists but fails to load, e.g. an old build lacking entry
/// points, doesn't stop the search.
fn first_loadable<T, F>(candidates: Vec<PathBuf>,
                        mut load: F)
                        -> std::result::Result<(PathBuf, T), String>
  where F: FnMut(&Path) -> std::result::Result<T, libloading::Error>
{
  let mut failures = Vec::new();
  for candidate in candidates {
    match load(&candidate) {
      Ok(loaded) => return Ok((candidate, loaded)),
      Err(err) => {
        debug!("skipping '{}': {}", candidate.display(), err);
        failures.push(format!("{}: {}", candidate.display(), err));
      }
    }
  }
  Err(failures.join("; "))
}

/// Locations to try for the library of `format`: every name in
/// `FWIFC_LIB_DIR`, then in the directory the build script bundled the vendor
/// libraries to, then the bare names for the system loader to resolve.
fn candidates(format: Format) -> Vec<PathBuf> {
  let dirs: Vec<PathBuf> = env::var_os("FWIFC_LIB_DIR").map(PathBuf::from)
                                                       .into_iter()
                                                       .chain(option_env!("FWIFC_BUNDLED_DIR").map(PathBuf::from))
                                                       .collect();
  let file_names: Vec<_> = format.library_names()
                                 .iter()
                                 .map(libloading::library_filename)
                                 .collect();

  let mut candidates = Vec::new();
  for dir in &dirs {
    for file_name in &file_names {
      candidates.push(dir.join(file_name));
    }
  }
  candidates.extend(file_names.into_iter().map(PathBuf::from));
  candidates
}


/// `Decoder` over the RIEGL full waveform libraries.
pub struct NativeDecoder {
  library: Arc<FwLibrary>,
  file:    fwifc_file,
}

impl NativeDecoder {
  /// Binds a decoder to the library of `format`. No file is opened yet.
  pub fn bind(format: Format) -> Result<Self> {
    Ok(Self { library: FwLibrary::get(format)?,
              file:    ptr::null_mut(), })
  }

  fn api(&self) -> &FwifcApi {
    &self.library.api
  }

  /// Must be called with the `LIBCALL_MTX` held, right after the failing
  /// call.
  fn last_error(&self) -> String {
    let mut message: *const c_char = ptr::null();
    unsafe { (self.api().get_last_error)(&mut message) };
    srv::strptr_to_string_lossy(message)
  }

  fn check(&self, code: i32) -> DecodeResult<()> {
    if code == riegl::FWIFC_NO_ERROR {
      Ok(())
    } else {
      Err(DecoderFault::new(code, self.last_error()))
    }
  }

  fn handle(&self) -> DecodeResult<fwifc_file> {
    if self.file.is_null() {
      return Err(DecoderFault::new(riegl::FWIFC_ERR_BAD_ARG, "no file open"));
    }
    Ok(self.file)
  }

  /// Runs a call returning nothing but a status code.
  fn invoke<F>(&self, call: F) -> DecodeResult<()>
    where F: FnOnce(&FwifcApi, fwifc_file) -> i32
  {
    let file = self.handle()?;
    let _guard = libcall();
    let code = call(self.api(), file);
    self.check(code)
  }
}

/// Copies `count` values from a library owned buffer.
///
/// # Safety
/// `values` must be null or point to at least `count` valid values.
unsafe fn copy_out<T: Copy>(values: *const T, count: u32) -> Vec<T> {
  if values.is_null() || count == 0 {
    return Vec::new();
  }
  slice::from_raw_parts(values, count as usize).to_vec()
}

/// # Safety
/// `sbl` must be null or point to `count` descriptors whose sample pointers
/// are valid for their `sample_count`.
unsafe fn copy_blocks(sbl: *const fwifc_sbl_t, count: u32) -> Vec<RawBlock> {
  copy_out(sbl, count).into_iter()
                      .map(|block| RawBlock { time_sosbl: block.time_sosbl,
                                              channel:    block.channel,
                                              samples:    copy_out(block.sample as *const u16,
                                                                   block.sample_count), })
                      .collect()
}

impl Decoder for NativeDecoder {
  fn library_version(&mut self) -> DecodeResult<LibraryVersion> {
    let mut version = LibraryVersion::default();
    let mut build_version: *const c_char = ptr::null();
    let mut build_tag: *const c_char = ptr::null();

    let _guard = libcall();
    let code = unsafe {
      (self.api().get_library_version)(&mut version.api_major,
                                       &mut version.api_minor,
                                       &mut build_version,
                                       &mut build_tag)
    };
    self.check(code)?;

    version.build_version = srv::strptr_to_string_lossy(build_version);
    version.build_tag = srv::strptr_to_string_lossy(build_tag);
    Ok(version)
  }

  fn open(&mut self, path: &Path) -> DecodeResult<()> {
    let c_path = srv::path_to_cstring(path).map_err(|err| {
                   DecoderFault::new(riegl::FWIFC_ERR_BAD_ARG, err.to_string())
                 })?;

    let _guard = libcall();
    let mut file: fwifc_file = ptr::null_mut();
    let code = unsafe { (self.api().open)(c_path.as_ptr(), &mut file) };
    self.check(code)?;
    if file.is_null() {
      return Err(DecoderFault::new(riegl::FWIFC_ERR_RUNTIME,
                                   "library returned no file handle"));
    }
    self.file = file;
    Ok(())
  }

  fn close(&mut self) -> DecodeResult<()> {
    if self.file.is_null() {
      return Ok(());
    }
    let _guard = libcall();
    let code = unsafe { (self.api().close)(self.file) };
    // the handle is gone either way, the library doesn't take it back
    self.file = ptr::null_mut();
    self.check(code)
  }

  fn info(&mut self) -> DecodeResult<RawInfo> {
    let file = self.handle()?;
    let mut instrument: *const c_char = ptr::null();
    let mut serial: *const c_char = ptr::null();
    let mut epoch: *const c_char = ptr::null();
    let mut info = RawInfo::default();

    let _guard = libcall();
    let code = unsafe {
      (self.api().get_info)(file,
                            &mut instrument,
                            &mut serial,
                            &mut epoch,
                            &mut info.v_group,
                            &mut info.sampling_time,
                            &mut info.flags,
                            &mut info.num_facets)
    };
    self.check(code)?;

    let text = |strptr| {
      srv::strptr_to_string(strptr).map_err(|err| {
                                     DecoderFault::new(riegl::FWIFC_ERR_RUNTIME,
                                                       err.to_string())
                                   })
    };
    info.instrument = text(instrument)?;
    info.serial = text(serial)?;
    info.epoch = text(epoch)?;
    Ok(info)
  }

  fn set_sosbl_relative(&mut self, relative: bool) -> DecodeResult<()> {
    self.invoke(|api, file| unsafe {
          (api.set_sosbl_relative)(file, relative as i32)
        })
  }

  fn read(&mut self) -> DecodeResult<Option<RawShot>> {
    let file = self.handle()?;
    let mut shot = RawShot::default();
    let mut sbl_count = 0_u32;
    let mut sbl_size = 0_u32;
    let mut sbl: *mut fwifc_sbl_t = ptr::null_mut();

    let _guard = libcall();
    let code = unsafe {
      (self.api().read)(file,
                        &mut shot.time_sorg,
                        &mut shot.time_external,
                        shot.origin.as_mut_ptr(),
                        shot.direction.as_mut_ptr(),
                        &mut shot.flags,
                        &mut shot.facet,
                        &mut sbl_count,
                        &mut sbl_size,
                        &mut sbl)
    };
    if code < 0 {
      return Ok(None);
    }
    self.check(code)?;

    shot.blocks = unsafe { copy_blocks(sbl, sbl_count) };
    Ok(Some(shot))
  }

  fn seek(&mut self, record: u32) -> DecodeResult<()> {
    self.invoke(|api, file| unsafe { (api.seek)(file, record) })
  }

  fn seek_time(&mut self, time: f64) -> DecodeResult<()> {
    self.invoke(|api, file| unsafe { (api.seek_time)(file, time) })
  }

  fn seek_time_external(&mut self, time: f64) -> DecodeResult<()> {
    self.invoke(|api, file| unsafe { (api.seek_time_external)(file, time) })
  }

  fn tell(&mut self) -> DecodeResult<u32> {
    let mut record = 0_u32;
    self.invoke(|api, file| unsafe { (api.tell)(file, &mut record) })?;
    Ok(record)
  }

  fn reindex(&mut self) -> DecodeResult<()> {
    self.invoke(|api, file| unsafe { (api.reindex)(file) })
  }

  fn calib(&mut self,
           kind: CalibrationKind)
           -> DecodeResult<(Vec<f64>, Vec<f64>)> {
    let file = self.handle()?;
    let mut count = 0_u32;
    let mut abscissa: *mut f64 = ptr::null_mut();
    let mut ordinate: *mut f64 = ptr::null_mut();

    let _guard = libcall();
    let code = unsafe {
      (self.api().get_calib)(file,
                             kind.table_index(),
                             &mut count,
                             &mut abscissa,
                             &mut ordinate)
    };
    self.check(code)?;

    let (abscissa, ordinate) = (abscissa as *const f64, ordinate as *const f64);
    Ok(unsafe { (copy_out(abscissa, count), copy_out(ordinate, count)) })
  }
}

// DESTRUCTOR - CLOSES FILE ------------------------------------------------ //
impl Drop for NativeDecoder {
  /// Close the file if the owner didn't
  fn drop(&mut self) {
    if let Err(fault) = self.close() {
      warn!("closing waveform file failed: {}", fault);
    }
  }
}
