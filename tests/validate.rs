//! Integration tests for the `validate` command.
use lecsim::cli::handle_validate_command;
use lecsim::log::is_logger_initialised;
use lecsim::settings::Settings;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("LECSIM_LOG_LEVEL", "off") };

    assert!(!is_logger_initialised());

    handle_validate_command(&get_model_dir(), Some(Settings::default())).unwrap();

    assert!(is_logger_initialised());

    // A model without agents is rejected
    let dir = tempdir().unwrap();
    fs::copy(
        get_model_dir().join("model.toml"),
        dir.path().join("model.toml"),
    )
    .unwrap();
    assert!(handle_validate_command(dir.path(), Some(Settings::default())).is_err());
}
