// Copyright 2021 bmc::labs Gmbh. All rights reserved.
//
// Authors:
//   Florian Eich <florian@bmc-labs.com>
//   Jonas Reitemeyer <alumni@bmc-labs.com>

use std::{env, fs, path::Path};


fn main() {
  // the RIEGL libraries are not linked, they are loaded at run time (one
  // library per file format, and both export the very same symbols). what we
  // still do here is ship them along: if the repo has a `riegl` directory,
  // its contents get copied to the OUT_DIR and the location is handed to the
  // crate as `FWIFC_BUNDLED_DIR`.
  println!("cargo:rerun-if-changed=riegl");

  #[rustfmt::skip]
  let project_dir = env::var(
    "CARGO_MANIFEST_DIR"
  ).expect("unable to read CARGO_MANIFEST_DIR env variable");

  #[rustfmt::skip]
  let out_dir = env::var(
    "OUT_DIR"
  ).expect("unable to read OUT_DIR env variable");

  let lib_src_path = format!("{}/riegl", project_dir);
  let lib_dst_path = format!("{}/lib", out_dir);

  // no vendor libraries in the repo is fine, they are then looked up via
  // `FWIFC_LIB_DIR` or the system loader at run time
  if !Path::new(&lib_src_path).is_dir() {
    return;
  }

  if !Path::new(&lib_dst_path).exists() {
    fs::create_dir(&lib_dst_path).expect("unable to create lib dir");
  }

  let files = fs::read_dir(&lib_src_path).expect("unable to read riegl dir");
  for file in files {
    let src_path = file.expect("could not read file").path();
    if !src_path.is_file() {
      continue;
    }
    let file_name = match src_path.file_name().and_then(|name| name.to_str()) {
      Some(file_name) => file_name.to_owned(),
      None => continue,
    };
    let dst_path = format!("{}/{}", &lib_dst_path, file_name);

    fs::copy(&src_path, dst_path).expect("unable to copy libs to target dir");
  }

  println!("cargo:rustc-env=FWIFC_BUNDLED_DIR={}", lib_dst_path);
}
