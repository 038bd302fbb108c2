//! Windows build script: stamps the produced `.exe` with product metadata so it doesn't show up
//! as an anonymous binary in Explorer/Task Manager.
//!
//! Grounded on `rpfm_cli/build.rs`'s `winres::WindowsResource` usage; dropped the icon call since
//! this project ships no `.ico` asset.

#[cfg(target_os = "windows")]
fn main() {
    let mut res = winres::WindowsResource::new();
    res.set("ProductName", "KOTOR/KOTOR II Mod Patcher");
    res.set("FileDescription", "Command-line front end for the KOTOR/KOTOR II mod patching engine");
    if let Err(error) = res.compile() {
        println!("cargo:warning=failed to embed Windows resources: {error}");
    }
}

#[cfg(not(target_os = "windows"))]
fn main() {}
