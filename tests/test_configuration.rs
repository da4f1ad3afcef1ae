use fsstats::{load_environment, FsConfig, FsStatsError, FsWrapper, ToolRunner};

use std::collections::HashMap;
use std::fs;

use tempfile::tempdir;

#[test]
fn exported_variables_are_loaded_without_pwd() {
    let dir = tempdir().unwrap();
    let script = dir.path().join("setup.sh");
    fs::write(&script, "export A=1\nB=two\nexport B\n").unwrap();

    let env = load_environment(&script, &HashMap::new()).unwrap();

    assert_eq!(Some(&String::from("1")), env.get("A"));
    assert_eq!(Some(&String::from("two")), env.get("B"));
    assert!(!env.contains_key("PWD"));
}

#[test]
fn the_base_environment_is_visible_to_the_script() {
    let dir = tempdir().unwrap();
    let script = dir.path().join("setup.sh");
    fs::write(&script, "export FREESURFER_HOME=\"$FS_ROOT/freesurfer\"\n").unwrap();
    let mut base = HashMap::new();
    base.insert(String::from("FS_ROOT"), String::from("/opt"));

    let env = load_environment(&script, &base).unwrap();

    assert_eq!("/opt/freesurfer", env["FREESURFER_HOME"]);
    assert_eq!("/opt", env["FS_ROOT"]);
}

#[test]
fn a_failing_script_is_a_configuration_error_with_its_stderr() {
    let dir = tempdir().unwrap();
    let script = dir.path().join("broken.sh");
    fs::write(&script, "echo 'freesurfer is not installed' >&2\nexit 1\n").unwrap();

    match load_environment(&script, &HashMap::new()) {
        Err(FsStatsError::Configuration(stderr)) => assert!(stderr.contains("freesurfer is not installed")),
        other => panic!("expected a configuration error, got {:?}", other),
    }
}

#[test]
fn wrapped_tools_see_the_configured_environment() {
    let dir = tempdir().unwrap();
    let script = dir.path().join("setup.sh");
    fs::write(&script, "export FSSTATS_TEST_VALUE=configured\n").unwrap();
    let wrapper = FsWrapper::new(FsConfig::new(&script));

    let cmd: Vec<String> = vec!["sh", "-c", "printf %s \"$FSSTATS_TEST_VALUE:$SUBJECTS_DIR\""]
        .into_iter()
        .map(String::from)
        .collect();
    let output = wrapper.run(&cmd, Some(dir.path())).unwrap();

    assert!(output.success());
    assert_eq!(format!("configured:{}", dir.path().display()), output.stdout);
}
