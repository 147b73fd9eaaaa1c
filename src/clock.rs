// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use crate::storage::Epoch;
use log::warn;
use serde::{Deserialize, Serialize};


pub const DAY_SECONDS: f64 = 24.0 * 3600.0;
pub const WEEK_SECONDS: f64 = 7.0 * DAY_SECONDS;


/// How an external time stamp from elsewhere (e.g. a point picked in the
/// point cloud) is mapped onto the external clock of a waveform file.
///
/// Whether a file counts day seconds or week seconds is not always known, so
/// this is a policy rather than a fact: none of the variants can tell whether
/// the reduced value is actually right.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockPolicy {
  /// Use the time stamp as is.
  Verbatim,
  /// If the time stamp lies beyond the largest external time of the file,
  /// assume the file counts day seconds and reduce it modulo 24 h.
  DaySecondsFallback,
  /// Trust the epoch reported by the file (day or week seconds) and reduce
  /// modulo its period; without a usable epoch, act like
  /// `DaySecondsFallback`.
  FromEpoch,
}

impl Default for ClockPolicy {
  fn default() -> Self {
    Self::DaySecondsFallback
  }
}

impl ClockPolicy {
  /// Maps `query` onto the file's external clock. `max_external` is the
  /// largest external time found in the file, if it has any records.
  pub fn reconcile(self,
                   query: f64,
                   max_external: Option<f64>,
                   epoch: &Epoch)
                   -> f64 {
    match self {
      Self::Verbatim => query,
      Self::DaySecondsFallback => day_seconds_fallback(query, max_external),
      Self::FromEpoch => match epoch.period() {
        Some(period) if query >= period => reduce(query, period),
        Some(_) => query,
        None => day_seconds_fallback(query, max_external),
      },
    }
  }
}

fn day_seconds_fallback(query: f64, max_external: Option<f64>) -> f64 {
  match max_external {
    Some(max) if query > max => reduce(query, DAY_SECONDS),
    _ => query,
  }
}

fn reduce(query: f64, period: f64) -> f64 {
  let reduced = query.rem_euclid(period);
  warn!("time stamp {} s taken modulo {} s: {} s", query, period, reduced);
  reduced
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::mock;
  use pretty_assertions::assert_eq;


  #[test]
  fn verbatim_test() {
    assert_eq!(90000.0,
               ClockPolicy::Verbatim.reconcile(90000.0,
                                               Some(100.0),
                                               &Epoch::DaySeconds));
  }

  #[test]
  fn day_seconds_fallback_test() {
    let policy = ClockPolicy::default();
    assert_eq!(ClockPolicy::DaySecondsFallback, policy);

    assert_eq!(3600.0,
               policy.reconcile(90000.0, Some(86000.0), &Epoch::Unknown));
    assert_eq!(80000.0,
               policy.reconcile(80000.0, Some(86000.0), &Epoch::Unknown));
    // beyond the largest time stamp but a week second file: the heuristic
    // still reduces, that's what makes it a heuristic
    assert_eq!(3600.0,
               policy.reconcile(90000.0, Some(89000.0), &Epoch::WeekSeconds));
    assert_eq!(90000.0, policy.reconcile(90000.0, None, &Epoch::Unknown));
  }

  #[test]
  fn from_epoch_test() {
    let policy = ClockPolicy::FromEpoch;

    assert_eq!(3600.0, policy.reconcile(90000.0, None, &Epoch::DaySeconds));
    assert_eq!(90000.0,
               policy.reconcile(90000.0, Some(1.0), &Epoch::WeekSeconds));
    assert_eq!(3600.0,
               policy.reconcile(WEEK_SECONDS + 3600.0,
                                Some(1.0),
                                &Epoch::WeekSeconds));
    assert_eq!(3600.0,
               policy.reconcile(90000.0, Some(86000.0), &Epoch::Unknown));
  }

  #[test]
  fn serde_test() {
    assert_eq!(ClockPolicy::FromEpoch,
               serde_json::from_str::<ClockPolicy>("\"from-epoch\"").unwrap());
    assert_eq!("\"day-seconds-fallback\"",
               serde_json::to_string(&ClockPolicy::DaySecondsFallback).unwrap());
  }

  #[test]
  fn wrapped_query_lands_on_record_test() {
    // external times of the file are 3599, 3600 and 3601 s, the query counts
    // from some other origin a day earlier
    let mut file = mock::three_shots().session("./testdata/scan.wfm")
                                      .unwrap();
    let max_external = file.max_external_time().unwrap();
    let epoch = file.info().unwrap().epoch().clone();

    let query = 90000.0;
    assert!(query > max_external.unwrap());
    let time = ClockPolicy::DaySecondsFallback.reconcile(query,
                                                        max_external,
                                                        &epoch);
    assert_eq!(3600.0, time);

    file.seek_time_external(time).unwrap();
    let shot = file.read().unwrap().unwrap();
    assert_eq!(3600.0, shot.time_external());
    assert_eq!(1.0, shot.time_sorg());
  }
}
