// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use crate::{clock::ClockPolicy,
            decoder::{Decoder, Format},
            fubar::{Fubar, Result},
            fwfile::FwFile,
            search::{range_to_time,
                     time_to_range,
                     ChannelRole,
                     ChannelRoles,
                     SearchOutcome,
                     SegmentSearch,
                     Trace}};
use getset::{CopyGetters, Getters};
use log::{debug, warn};
use serde::Deserialize;
use std::{convert::TryFrom,
          fmt,
          path::{Path, PathBuf},
          rc::Rc};


/// A point picked in the point cloud, as described by the JSON the point
/// cloud software puts on the clipboard.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(try_from = "Descriptor")]
pub struct PointOfInterest {
  pub wfm_file:   PathBuf,
  /// external time stamp of the shot in s
  pub time_stamp: f64,
  /// measured range in m
  pub range:      f64,
  pub project:    Option<String>,
  /// project coordinates
  pub prcs:       [Option<f64>; 3],
  /// scanner's own coordinates
  pub socs:       [Option<f64>; 3],
  pub theta:      Option<f64>,
  pub phi:        Option<f64>,
}

impl PointOfInterest {
  /// Parses a descriptor. Backslashes are taken for path separators, since
  /// Windows paths tend to arrive unescaped.
  pub fn parse(text: &str) -> Result<Self> {
    Ok(serde_json::from_str(&text.replace('\\', "/"))?)
  }
}

#[derive(Deserialize)]
struct Descriptor {
  #[serde(rename = "laser-data-wfm-file")]
  wfm_file:   Option<PathBuf>,
  #[serde(rename = "laser-data-rxp-file")]
  rxp_file:   Option<PathBuf>,
  #[serde(rename = "point-time-stamp")]
  time_stamp: f64,
  #[serde(rename = "point-socs-range")]
  range:      f64,
  #[serde(rename = "project-name")]
  project:    Option<String>,
  #[serde(rename = "point-prcs-x")]
  prcs_x:     Option<f64>,
  #[serde(rename = "point-prcs-y")]
  prcs_y:     Option<f64>,
  #[serde(rename = "point-prcs-z")]
  prcs_z:     Option<f64>,
  #[serde(rename = "point-socs-x")]
  socs_x:     Option<f64>,
  #[serde(rename = "point-socs-y")]
  socs_y:     Option<f64>,
  #[serde(rename = "point-socs-z")]
  socs_z:     Option<f64>,
  #[serde(rename = "point-socs-theta")]
  theta:      Option<f64>,
  #[serde(rename = "point-socs-phi")]
  phi:        Option<f64>,
}

impl TryFrom<Descriptor> for PointOfInterest {
  type Error = String;

  fn try_from(desc: Descriptor) -> std::result::Result<Self, Self::Error> {
    // the waveforms live next to the point data unless told otherwise
    let wfm_file = match (desc.wfm_file, desc.rxp_file) {
      (Some(wfm), _) => wfm,
      (None, Some(rxp)) => rxp.with_extension("wfm"),
      (None, None) => {
        return Err("neither laser-data-wfm-file nor laser-data-rxp-file given"
                     .to_owned())
      }
    };

    Ok(Self { wfm_file,
              time_stamp: desc.time_stamp,
              range: desc.range,
              project: desc.project,
              prcs: [desc.prcs_x, desc.prcs_y, desc.prcs_z],
              socs: [desc.socs_x, desc.socs_y, desc.socs_z],
              theta: desc.theta,
              phi: desc.phi })
  }
}

impl fmt::Display for PointOfInterest {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f,
           "{} m at {} s in '{}'",
           self.range,
           self.time_stamp,
           self.wfm_file.display())
  }
}


/// Settings of an `Inspector`.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct InspectorConfig {
  pub roles:   ChannelRoles,
  pub clock:   ClockPolicy,
  /// rebuild the time index of every file when it's opened, for files that
  /// come without one
  pub reindex: bool,
}


/// What `Inspector::inspect` found for a point.
#[derive(Clone, Debug, PartialEq, CopyGetters, Getters)]
pub struct Inspection {
  #[getset(get = "pub")]
  point:      PointOfInterest,
  /// the point's time stamp on the file's external clock
  #[getset(get_copy = "pub")]
  query_time: f64,
  /// reference time of the shot on the `time_sorg` clock
  #[getset(get_copy = "pub")]
  t_ref:      f64,
  /// the point on the `time_sorg` clock
  #[getset(get_copy = "pub")]
  t_point:    f64,
  /// position of the point on the range axis of the traces, in m
  #[getset(get_copy = "pub")]
  marker:     f64,
  #[getset(get = "pub")]
  outcome:    SearchOutcome,
  /// low channel first, if found
  #[getset(get = "pub")]
  traces:     Vec<Trace>,
}


type Binder = Rc<dyn Fn(Format) -> Result<Box<dyn Decoder>>>;

struct Session {
  file:         FwFile,
  max_external: Option<f64>,
}

/// Looks up the waveforms behind points of interest.
///
/// The file of the last point is kept open, along with its largest external
/// time stamp, so a series of points from the same scan doesn't reopen it.
pub struct Inspector {
  config:  InspectorConfig,
  binder:  Binder,
  session: Option<Session>,
}

impl fmt::Debug for Inspector {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Inspector")
     .field("config", &self.config)
     .field("file", &self.current_file())
     .finish()
  }
}

impl Inspector {
  pub fn new(config: InspectorConfig) -> Self {
    Self::with_decoders(config, Format::bind)
  }

  /// An inspector opening files with decoders produced by `bind`, see
  /// `FwFile::open_with`.
  pub fn with_decoders<F>(config: InspectorConfig, bind: F) -> Self
    where F: Fn(Format) -> Result<Box<dyn Decoder>> + 'static
  {
    Self { config,
           binder: Rc::new(bind),
           session: None }
  }

  pub fn config(&self) -> &InspectorConfig {
    &self.config
  }

  /// Path of the file currently held open.
  pub fn current_file(&self) -> Option<&Path> {
    self.session.as_ref().map(|session| session.file.path().as_path())
  }

  /// Closes the file held open, if any.
  pub fn close(&mut self) -> Result<()> {
    match self.session.take() {
      Some(mut session) => session.file.close(),
      None => Ok(()),
    }
  }

  /// Parses a point descriptor and locates its waveforms. A malformed
  /// descriptor is rejected with `Fubar::InvalidPoint` and leaves the
  /// inspector as it was.
  pub fn inspect(&mut self, text: &str) -> Result<Inspection> {
    let point = PointOfInterest::parse(text).map_err(|err| {
                                              warn!("rejected point: {}", err);
                                              err
                                            })?;
    self.locate(point)
  }

  /// Locates the sampling blocks of the low and high channel holding `point`
  /// and lays them out as traces.
  pub fn locate(&mut self, point: PointOfInterest) -> Result<Inspection> {
    let InspectorConfig { roles, clock, .. } = self.config;
    let session = self.session(&point.wfm_file)?;
    let file = &mut session.file;
    let v_group = file.v_group()?;
    let epoch = file.info()?.epoch().clone();

    let query_time =
      clock.reconcile(point.time_stamp, session.max_external, &epoch);
    file.seek_time_external(query_time)?;

    let t_range = range_to_time(point.range, v_group);
    let first = file.read()?
                    .ok_or(Fubar::PointNotFound { t_point: t_range })?;

    let search = SegmentSearch::new(roles);
    let t_ref = search.reference_time(&first)?;
    let t_point = t_range + t_ref;
    let outcome = search.run(file, first, t_point)?;

    let traces = [ChannelRole::Low, ChannelRole::High]
      .iter()
      .filter_map(|&role| {
        outcome.get(role)
               .map(|located| Trace::new(role, located, t_ref, v_group))
      })
      .collect();

    debug!("located {}", point);
    Ok(Inspection { point,
                    query_time,
                    t_ref,
                    t_point,
                    marker: time_to_range(t_point - t_ref, v_group),
                    outcome,
                    traces })
  }

  /// The session for `path`, opening it unless it's the one held already.
  fn session(&mut self, path: &Path) -> Result<&mut Session> {
    let held = matches!(&self.session, Some(s) if s.file.path() == path);
    if !held {
      // the old file goes first, errors on the new one leave nothing open
      self.close()?;

      let binder = Rc::clone(&self.binder);
      let mut file = FwFile::open_with(path, move |format| binder(format))?;
      if self.config.reindex {
        file.reindex()?;
      }
      let max_external = file.max_external_time()?;
      debug!("largest external time of '{}': {:?} s",
             path.display(),
             max_external);

      self.session = Some(Session { file,
                                    max_external });
    }
    self.session.as_mut().ok_or(Fubar::NotOpen)
  }
}
