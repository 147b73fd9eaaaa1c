// Copyright 2020 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <jonas@bmc-labs.com>

use crate::{decoder::{DecodeResult, Decoder, Format, LibraryVersion},
            fubar::{Fubar, Result},
            storage::{CalibrationKind, CalibrationTable, FileInfo, ShotRecord}};
use getset::{CopyGetters, Getters};
use log::{debug, trace, warn};
use std::{fmt,
          iter::FusedIterator,
          path::{Path, PathBuf},
          rc::Rc};


/// Produces a fresh, unopened decoder for a format.
type Binder = Rc<dyn Fn(Format) -> Result<Box<dyn Decoder>>>;


/// Holds access information for a full waveform file and provides access to
/// it.
///
/// The decoder handle is owned exclusively and released on `close` or when the
/// `FwFile` goes out of scope. A `FwFile` is not meant to be shared between
/// threads; open another one on the same path for an independent cursor.
#[derive(CopyGetters, Getters)]
pub struct FwFile {
  #[getset(get = "pub")]
  path:    PathBuf,
  #[getset(get_copy = "pub")]
  format:  Format,
  decoder: Option<Box<dyn Decoder>>,
  info:    Option<FileInfo>,
  binder:  Binder,
}

impl fmt::Debug for FwFile {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("FwFile")
     .field("path", &self.path)
     .field("format", &self.format)
     .field("open", &self.is_open())
     .field("info", &self.info)
     .finish()
  }
}

// FILE OPENING / CLOSING FUNCTIONS ---------------------------------------- //
impl FwFile {
  /// Opens a .wfm or .sdf file with the matching RIEGL library.
  ///
  /// Segment times (`time_sosbl`) are switched to be relative to the start of
  /// the range gate of their shot.
  pub fn open(path: &Path) -> Result<Self> {
    Self::open_with(path, Format::bind)
  }

  /// Opens a file with decoders produced by `bind` instead of the RIEGL
  /// libraries. `bind` is called again whenever the file is iterated.
  pub fn open_with<F>(path: &Path, bind: F) -> Result<Self>
    where F: Fn(Format) -> Result<Box<dyn Decoder>> + 'static
  {
    Self::open_bound(path.to_owned(), Rc::new(bind))
  }

  fn open_bound(path: PathBuf, binder: Binder) -> Result<Self> {
    let format = Format::from_path(&path)?;
    let mut file = Self { path,
                          format,
                          decoder: None,
                          info: None,
                          binder };
    file.reopen()?;
    Ok(file)
  }

  /// Closes the file if open and opens it again, positioned at the start.
  pub fn reopen(&mut self) -> Result<()> {
    self.close()?;

    let mut decoder = (self.binder)(self.format)?;
    decoder.open(&self.path)
           .map_err(|fault| Fubar::open_failed(self.path.clone(), fault))?;

    // the handle is ours from here on, so a failure must give it back
    let info = match Self::configure(&mut *decoder) {
      Ok(info) => info,
      Err(fault) => {
        if let Err(close_fault) = decoder.close() {
          warn!("closing '{}' after failed open: {}",
                self.path.display(),
                close_fault);
        }
        return Err(Fubar::open_failed(self.path.clone(), fault));
      }
    };

    debug!("opened '{}' ({} {}, sampling every {} s)",
           self.path.display(),
           info.instrument(),
           info.serial(),
           info.sampling_time());
    self.decoder = Some(decoder);
    self.info = Some(info);
    Ok(())
  }

  fn configure(decoder: &mut dyn Decoder) -> DecodeResult<FileInfo> {
    decoder.set_sosbl_relative(true)?;
    Ok(FileInfo::from_raw(decoder.info()?))
  }

  /// Closes the file. Closing a closed file does nothing.
  pub fn close(&mut self) -> Result<()> {
    self.info = None;
    match self.decoder.take() {
      Some(mut decoder) => {
        debug!("closing '{}'", self.path.display());
        decoder.close().map_err(|fault| Fubar::call_failed("close", fault))
      }
      None => Ok(()),
    }
  }

  pub fn is_open(&self) -> bool {
    self.decoder.is_some()
  }

  fn decoder(&mut self) -> Result<&mut dyn Decoder> {
    match self.decoder.as_mut() {
      Some(decoder) => Ok(&mut **decoder),
      None => Err(Fubar::NotOpen),
    }
  }
}

// DESTRUCTOR - CLOSES FILE ------------------------------------------------ //
impl Drop for FwFile {
  /// Close the waveform file on `FwFile` destruction
  fn drop(&mut self) {
    if let Err(err) = self.close() {
      warn!("{}", err);
    }
  }
}

// FILE INFORMATION FUNCTIONS ---------------------------------------------- //
impl FwFile {
  /// Metadata of the file, as read when it was opened.
  pub fn info(&self) -> Result<&FileInfo> {
    self.info.as_ref().ok_or(Fubar::NotOpen)
  }

  /// Group velocity of light in m/s.
  pub fn v_group(&self) -> Result<f64> {
    Ok(self.info()?.v_group())
  }

  /// Sampling interval in s.
  pub fn sampling_time(&self) -> Result<f64> {
    Ok(self.info()?.sampling_time())
  }

  /// Version of the decoder library serving this file.
  pub fn library_version(&mut self) -> Result<LibraryVersion> {
    self.decoder()?
        .library_version()
        .map_err(|fault| Fubar::call_failed("get_library_version", fault))
  }

  /// Calibration table of the given kind, fetched from the library on every
  /// call.
  pub fn calibration(&mut self,
                     kind: CalibrationKind)
                     -> Result<CalibrationTable> {
    let (abscissa, ordinate) =
      self.decoder()?
          .calib(kind)
          .map_err(|fault| Fubar::call_failed("get_calib", fault))?;
    Ok(CalibrationTable::new(kind, abscissa, ordinate))
  }
}

// READING / SEEKING FUNCTIONS --------------------------------------------- //
impl FwFile {
  /// Reads the shot at the current position and moves on. `Ok(None)` once
  /// there are no more shots.
  pub fn read(&mut self) -> Result<Option<ShotRecord>> {
    let sampling_time = self.sampling_time()?;
    let raw = self.decoder()?.read().map_err(Fubar::read_failed)?;

    let shot = match raw {
      Some(raw) => ShotRecord::from_raw(raw, sampling_time)?,
      None => return Ok(None),
    };
    trace!("read shot at t_sorg = {} s", shot.time_sorg());
    Ok(Some(shot))
  }

  /// Moves to a 1-based record number.
  pub fn seek(&mut self, record: u32) -> Result<()> {
    self.decoder()?.seek(record).map_err(Fubar::seek_failed)
  }

  /// Moves to the first record whose `time_sorg` is at or after `time`. Needs
  /// an index, see `reindex`.
  pub fn seek_time(&mut self, time: f64) -> Result<()> {
    debug!("seeking internal time {} s", time);
    self.decoder()?.seek_time(time).map_err(Fubar::seek_failed)
  }

  /// Moves to the first record whose `time_external` is at or after `time`.
  /// Needs an index, see `reindex`.
  pub fn seek_time_external(&mut self, time: f64) -> Result<()> {
    debug!("seeking external time {} s", time);
    self.decoder()?
        .seek_time_external(time)
        .map_err(Fubar::seek_failed)
  }

  /// The current 1-based record position.
  pub fn tell(&mut self) -> Result<u32> {
    self.decoder()?
        .tell()
        .map_err(|fault| Fubar::call_failed("tell", fault))
  }

  /// (Re)builds the index the library needs for time based seeking.
  pub fn reindex(&mut self) -> Result<()> {
    debug!("reindexing '{}'", self.path.display());
    self.decoder()?
        .reindex()
        .map_err(|fault| Fubar::call_failed("reindex", fault))
  }

  /// Total number of records.
  ///
  /// A seek to the highest position leaves some libraries on the last record
  /// and others behind it, so the position reported is checked by reading
  /// there. This moves the read position; seek before reading on.
  pub fn record_count(&mut self) -> Result<u32> {
    self.seek(u32::MAX)?;
    let position = self.tell()?;
    if position == 0 {
      return Ok(0);
    }

    self.seek(position)?;
    match self.read()? {
      Some(_) => Ok(position),
      None => Ok(position - 1),
    }
  }

  /// Reads the record at the 0-based `index`.
  pub fn get(&mut self, index: u32) -> Result<Option<ShotRecord>> {
    self.seek(index.saturating_add(1))?;
    self.read()
  }

  /// External time of the last record, i.e. the largest external time stamp
  /// in the file. `None` for a file without records.
  ///
  /// This moves the read position; seek before reading on.
  pub fn max_external_time(&mut self) -> Result<Option<f64>> {
    let count = self.record_count()?;
    if count == 0 {
      return Ok(None);
    }
    self.seek(count)?;
    Ok(self.read()?.map(|shot| shot.time_external()))
  }

  /// Iterates over all shots of the file from the start, with a session of
  /// its own: the position of `self` is left alone.
  pub fn iter(&self) -> Shots {
    Shots { path:    self.path.clone(),
            binder:  Rc::clone(&self.binder),
            file:    None,
            done:    false, }
  }
}


/// Lazy iterator over the shots of a file, see `FwFile::iter`.
///
/// The file is opened on the first call to `next` and closed once the shots
/// are exhausted or reading failed; a failure is yielded once, then the
/// iterator ends.
pub struct Shots {
  path:   PathBuf,
  binder: Binder,
  file:   Option<FwFile>,
  done:   bool,
}

impl Shots {
  fn finish(&mut self) {
    self.done = true;
    self.file = None;
  }
}

impl Iterator for Shots {
  type Item = Result<ShotRecord>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    if self.file.is_none() {
      match FwFile::open_bound(self.path.clone(), Rc::clone(&self.binder)) {
        Ok(file) => self.file = Some(file),
        Err(err) => {
          self.finish();
          return Some(Err(err));
        }
      }
    }

    let read = self.file.as_mut()?.read();
    match read {
      Ok(Some(shot)) => Some(Ok(shot)),
      Ok(None) => {
        self.finish();
        None
      }
      Err(err) => {
        self.finish();
        Some(Err(err))
      }
    }
  }
}

impl FusedIterator for Shots {}

impl<'a> IntoIterator for &'a FwFile {
  type Item = Result<ShotRecord>;
  type IntoIter = Shots;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}
