//! Integration tests for the `run` command.
use lecsim::cli::{RunOpts, handle_run_command};
use lecsim::output::{
    CLEARING_PRICES_FILE_NAME, FINAL_STATE_FILE_NAME, STORAGE_LEVELS_FILE_NAME,
    THERMAL_MASS_LEVELS_FILE_NAME, TRADES_FILE_NAME,
};
use lecsim::settings::Settings;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("LECSIM_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        ..Default::default()
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();

    for file_name in [
        TRADES_FILE_NAME,
        CLEARING_PRICES_FILE_NAME,
        STORAGE_LEVELS_FILE_NAME,
        THERMAL_MASS_LEVELS_FILE_NAME,
        FINAL_STATE_FILE_NAME,
        "metadata.toml",
    ] {
        assert!(output_dir.join(file_name).is_file(), "{file_name} missing");
    }

    // The output folder is no longer empty, so a second run needs --overwrite
    assert!(handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).is_err());
    let opts = RunOpts {
        overwrite: true,
        ..opts
    };
    handle_run_command(&get_model_dir(), &opts, Some(Settings::default())).unwrap();
}
