// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use fwifc::{CalibrationKind,
            FwFile,
            Inspector,
            InspectorConfig,
            ShotRecord,
            CHANNELS};
use log::{info, LevelFilter};
use std::{fs,
          io::{self, Read},
          path::{Path, PathBuf}};


#[derive(Debug, Parser)]
#[command(name = "fwinspect",
          version = env!("CARGO_PKG_VERSION"),
          about = "Look into RIEGL full waveform files (.wfm, .sdf)")]
struct Cli {
  /// off, error, warn, info, debug or trace
  #[arg(long, global = true, default_value = "warn")]
  log_level: LevelFilter,

  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Print the metadata of a file
  Info { file: PathBuf },

  /// Print a summary line per shot
  Dump {
    file:  PathBuf,
    /// 0-based index of the first shot
    #[arg(long, default_value = "0")]
    start: u32,
    #[arg(long, default_value = "10")]
    count: u32,
  },

  /// Print the waveforms behind a point as `range amplitude` rows
  Locate {
    /// JSON point descriptor, `-` to read it from stdin
    #[arg(default_value = "-")]
    descriptor: String,
    /// JSON file with inspector settings
    #[arg(long)]
    config:     Option<PathBuf>,
  },
}


fn main() -> Result<()> {
  color_eyre::install()?;
  let cli = Cli::parse();

  env_logger::Builder::new().filter_level(cli.log_level)
                            .format_target(false)
                            .format_timestamp_secs()
                            .init();

  match cli.command {
    Command::Info { file } => show_info(&file),
    Command::Dump { file, start, count } => dump(&file, start, count),
    Command::Locate { descriptor, config } => {
      locate(&descriptor, config.as_deref())
    }
  }
}


fn show_info(path: &Path) -> Result<()> {
  let mut file = FwFile::open(path)?;
  let info = file.info()?.clone();

  println!("file:          {}", path.display());
  println!("format:        {}", file.format());
  println!("library:       {}", file.library_version()?);
  println!("instrument:    {} ({})", info.instrument(), info.serial());
  println!("epoch:         {}", info.epoch());
  println!("v_group:       {} m/s", info.v_group());
  println!("sampling time: {} s", info.sampling_time());
  println!("gps:           {}", info.gps_available());
  println!("facets:        {}", info.num_facets());
  println!("records:       {}", file.record_count()?);
  match file.max_external_time()? {
    Some(time) => println!("last external: {} s", time),
    None => println!("last external: -"),
  }

  for kind in CalibrationKind::ALL.iter().copied() {
    match file.calibration(kind) {
      Ok(table) => println!("calibration:   {}, {} entries", kind, table.len()),
      Err(err) => info!("no {} calibration: {}", kind, err),
    }
  }
  Ok(())
}


fn dump(path: &Path, start: u32, count: u32) -> Result<()> {
  let mut file = FwFile::open(path)?;
  file.seek(start.saturating_add(1))?;

  println!("index\ttime_sorg\ttime_external\tfacet\tblocks per channel");
  for index in start..start.saturating_add(count) {
    let shot = match file.read()? {
      Some(shot) => shot,
      None => break,
    };
    println!("{}\t{}\t{}\t{}\t{}",
             index,
             shot.time_sorg(),
             shot.time_external(),
             shot.facet(),
             block_summary(&shot));
  }
  Ok(())
}

fn block_summary(shot: &ShotRecord) -> String {
  (0..CHANNELS).map(|n| {
                 let samples: usize = shot.channel(n).iter().map(|b| b.len()).sum();
                 format!("{}:{}/{}", n, shot.channel(n).len(), samples)
               })
               .collect::<Vec<_>>()
               .join(" ")
}


fn locate(descriptor: &str, config: Option<&Path>) -> Result<()> {
  let config = match config {
    Some(path) => {
      let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config '{}'", path.display()))?;
      serde_json::from_str(&text)
        .wrap_err_with(|| format!("parsing config '{}'", path.display()))?
    }
    None => InspectorConfig::default(),
  };

  let text = if descriptor == "-" {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text)?;
    text
  } else {
    fs::read_to_string(descriptor)
      .wrap_err_with(|| format!("reading descriptor '{}'", descriptor))?
  };

  let mut inspector = Inspector::new(config);
  let inspection = inspector.inspect(&text)?;
  if inspection.traces().is_empty() {
    return Err(eyre!("no sampling block holds {}", inspection.point()));
  }

  println!("# {}", inspection.point());
  println!("# marker\t{}", inspection.marker());
  for trace in inspection.traces() {
    println!("# {}", trace.role());
    for (range, amplitude) in trace.rows() {
      println!("{}\t{}", range, amplitude);
    }
  }
  Ok(())
}
