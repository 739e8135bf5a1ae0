// HYBRIDSWEEP SWEEP DRIVER TESTS
// AN EXECUTABLE SHELL SCRIPT STANDS IN FOR THE LAUNCHER. IT SEES THE SAME ARGUMENTS mpirun WOULD:
//   $1 = -n   $2 = RANKS   $3 = EXECUTABLE   $4 = CONFIG FILE
// AND THE THREAD COUNT IN $OMP_NUM_THREADS.
//
// TESTS THAT SPAWN TAKE THE SERIAL LOCK: A SCRIPT STILL OPEN FOR WRITING IN ONE
// THREAD WHEN ANOTHER THREAD FORKS FAILS TO EXEC WITH ETXTBSY.
//
// RUN: cargo test --test sweep

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, MutexGuard};

use hybridsweep::point::{ConfigurationPoint, Device};
use hybridsweep::profile::{Profile, SweepPlan};
use hybridsweep::store::{load_records, ResultsWriter, Schema};
use hybridsweep::sweep::{run_sweep, LaunchSpec, PointOutcome, SweepDriver};

// ---------------------------------------------------------------------------
// HELPERS
// ---------------------------------------------------------------------------

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

fn fake_launcher(dir: &Path, body: &str) -> LaunchSpec {
    let script = dir.join("fake_mpirun");
    fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    let mut spec = LaunchSpec::new("./aiquamplusplus", "aiquam.json", dir.join("build"));
    spec.launcher = script.into_os_string();
    spec
}

fn plan(ranks: &[u32], threads: &[u32]) -> SweepPlan {
    SweepPlan {
        ranks: ranks.to_vec(),
        threads: threads.to_vec(),
        device: None,
    }
}

fn sweep(spec: LaunchSpec, plan: &SweepPlan, csv: &Path) -> hybridsweep::sweep::SweepSummary {
    run_sweep(spec, plan, csv, &AtomicBool::new(false)).unwrap()
}

fn single_point(body: &str) -> PointOutcome {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let spec = fake_launcher(dir.path(), body);
    fs::create_dir_all(&spec.build_dir).unwrap();
    let mut driver = SweepDriver::new(spec).unwrap();
    let point = ConfigurationPoint { ranks: 2, threads: 1, device: None };
    driver.run_point(&point).unwrap()
}

fn csv_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
}

// ---------------------------------------------------------------------------
// EXTRACTION THROUGH A REAL CHILD
// ---------------------------------------------------------------------------

#[test]
fn single_timing_line_is_recorded() {
    match single_point(r#"echo "Compute time: 3.14 s""#) {
        PointOutcome::Recorded(r) => {
            assert_eq!(r.time_s, 3.14);
            assert_eq!((r.ranks, r.threads), (2, 1));
        }
        other => panic!("EXPECTED RECORD, GOT {:?}", other),
    }
}

#[test]
fn last_timing_line_wins() {
    let body = r#"
echo "Compute time: 1.0 s"
echo "progress 50%"
echo "Compute time: 2.5 s"
echo "done"
"#;
    match single_point(body) {
        PointOutcome::Recorded(r) => assert_eq!(r.time_s, 2.5),
        other => panic!("EXPECTED RECORD, GOT {:?}", other),
    }
}

#[test]
fn timing_on_stderr_is_captured() {
    let body = r#"
echo "Compute time: 1.0 s"
echo "Compute time: 7.25 s" 1>&2
"#;
    match single_point(body) {
        PointOutcome::Recorded(r) => assert_eq!(r.time_s, 7.25),
        other => panic!("EXPECTED RECORD, GOT {:?}", other),
    }
}

#[test]
fn invalid_utf8_output_does_not_break_extraction() {
    let body = r#"printf '\377\376 binary noise\nCompute time: 4.5 s\n'"#;
    match single_point(body) {
        PointOutcome::Recorded(r) => assert_eq!(r.time_s, 4.5),
        other => panic!("EXPECTED RECORD, GOT {:?}", other),
    }
}

#[test]
fn nonzero_exit_is_failure_even_with_timing() {
    let body = r#"
echo "Compute time: 3.14 s"
exit 1
"#;
    assert_eq!(single_point(body), PointOutcome::Failed { code: Some(1) });
}

#[test]
fn zero_exit_without_timing_is_no_timing() {
    assert_eq!(single_point(r#"echo "all good, no clock""#), PointOutcome::NoTiming);
}

#[test]
fn signal_death_is_failure_without_code() {
    assert_eq!(single_point("kill -9 $$"), PointOutcome::Failed { code: None });
}

#[test]
fn missing_launcher_is_an_error() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let mut spec = LaunchSpec::new("./aiquamplusplus", "aiquam.json", dir.path());
    spec.launcher = dir.path().join("no-such-launcher").into_os_string();
    let mut driver = SweepDriver::new(spec).unwrap();
    let point = ConfigurationPoint { ranks: 1, threads: 1, device: None };
    let err = driver.run_point(&point).unwrap_err();
    assert!(format!("{:#}", err).contains("FAILED TO LAUNCH"));
}

// ---------------------------------------------------------------------------
// SWEEP ORDER AND ENVIRONMENT
// ---------------------------------------------------------------------------

#[test]
fn attempts_every_point_ranks_outer() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("invocations.log");
    let body = format!(
        "echo \"$2 $OMP_NUM_THREADS\" >> '{}'\necho \"Compute time: 1.0 s\"",
        log.display()
    );
    let spec = fake_launcher(dir.path(), &body);
    let csv = dir.path().join("results.csv");

    let summary = sweep(spec, &plan(&[1, 2, 3], &[1, 4]), &csv);

    let calls = csv_lines(&log);
    assert_eq!(calls, vec!["1 1", "1 4", "2 1", "2 4", "3 1", "3 4"]);
    assert_eq!(summary.attempted, 6);
    assert_eq!(summary.recorded, 6);
}

#[test]
fn child_gets_arguments_and_runs_in_build_dir() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("args.log");
    let body = format!(
        "printf '%s|%s|%s|%s|%s\\n' \"$1\" \"$2\" \"$3\" \"$4\" \"$(pwd)\" >> '{}'\necho \"Compute time: 1.0 s\"",
        log.display()
    );
    let spec = fake_launcher(dir.path(), &body);
    let build_dir = spec.build_dir.clone();
    assert!(!build_dir.exists());

    sweep(spec, &plan(&[5], &[2]), &dir.path().join("results.csv"));

    assert!(build_dir.is_dir());
    let line = csv_lines(&log).remove(0);
    let fields: Vec<&str> = line.split('|').collect();
    assert_eq!(&fields[..4], ["-n", "5", "./aiquamplusplus", "aiquam.json"]);
    assert_eq!(
        fs::canonicalize(fields[4]).unwrap(),
        fs::canonicalize(&build_dir).unwrap()
    );
}

#[test]
fn thread_variable_is_not_leaked_to_parent() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let spec = fake_launcher(dir.path(), r#"echo "Compute time: $OMP_NUM_THREADS s""#);
    let csv = dir.path().join("results.csv");
    let before = std::env::var_os("OMP_NUM_THREADS");

    sweep(spec, &plan(&[1], &[3, 8]), &csv);

    let times: Vec<f64> = load_records(&csv).unwrap().iter().map(|r| r.time_s).collect();
    assert_eq!(times, vec![3.0, 8.0]);
    assert_eq!(std::env::var_os("OMP_NUM_THREADS"), before);
}

// ---------------------------------------------------------------------------
// RESULTS FILE
// ---------------------------------------------------------------------------

#[test]
fn failed_and_silent_points_are_dropped() {
    let _serial = serial();
    // 1x2 EXITS 1, 2x1 PRINTS NO TIMING, EVERYTHING ELSE SUCCEEDS
    let dir = tempfile::tempdir().unwrap();
    let body = r#"
case "$2:$OMP_NUM_THREADS" in
  1:2) echo "Compute time: 9.9 s"; exit 1 ;;
  2:1) echo "finished" ;;
  *)   echo "Compute time: $2.$OMP_NUM_THREADS s" ;;
esac
"#;
    let spec = fake_launcher(dir.path(), body);
    let csv = dir.path().join("results.csv");

    let summary = sweep(spec, &plan(&[1, 2], &[1, 2]), &csv);

    assert_eq!(summary.attempted, 4);
    assert_eq!(summary.recorded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.missing_timing, 1);

    let lines = csv_lines(&csv);
    assert_eq!(lines, vec!["ranks,threads,time_s", "1,1,1.1", "2,2,2.2"]);
}

#[test]
fn all_points_failing_leaves_header_only() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let spec = fake_launcher(dir.path(), "exit 2");
    let csv = dir.path().join("results.csv");

    let summary = sweep(spec, &plan(&[1, 2, 3], &[1]), &csv);

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.failed, 3);
    assert_eq!(csv_lines(&csv), vec!["ranks,threads,time_s"]);
}

#[test]
fn previous_results_are_truncated() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("results.csv");
    fs::write(&csv, "ranks,threads,time_s\n7,7,7.0\n8,8,8.0\n").unwrap();
    let spec = fake_launcher(dir.path(), r#"echo "Compute time: 0.5 s""#);

    sweep(spec, &plan(&[1], &[1]), &csv);

    assert_eq!(csv_lines(&csv), vec!["ranks,threads,time_s", "1,1,0.5"]);
}

#[test]
fn raised_shutdown_launches_nothing() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("invocations.log");
    let body = format!("echo run >> '{}'", log.display());
    let spec = fake_launcher(dir.path(), &body);
    let csv = dir.path().join("results.csv");

    let summary = run_sweep(spec, &plan(&[1, 2], &[1, 2]), &csv, &AtomicBool::new(true)).unwrap();

    assert_eq!(summary.attempted, 0);
    assert!(!log.exists());
    assert_eq!(csv_lines(&csv), vec!["ranks,threads,time_s"]);
}

#[test]
fn device_profile_writes_device_column() {
    let _serial = serial();
    // THE DEVICE LABEL ONLY REACHES THE CSV. THE SCRIPT FAILS IF THE CHILD'S
    // CUDA_VISIBLE_DEVICES DIFFERS FROM THE PARENT'S.
    let dir = tempfile::tempdir().unwrap();
    let inherited = std::env::var("CUDA_VISIBLE_DEVICES").unwrap_or_else(|_| "unset".to_string());
    let body = format!(
        "[ \"${{CUDA_VISIBLE_DEVICES-unset}}\" = '{}' ] || exit 3\necho \"Compute time: 1.5 s\"",
        inherited
    );
    let spec = fake_launcher(dir.path(), &body);
    let csv = dir.path().join("results.csv");
    let plan = SweepPlan::resolve(Profile::Device, Some(Device::Cpu), Some(vec![1, 2]), Some(vec![1])).unwrap();

    let summary = sweep(spec, &plan, &csv);

    assert_eq!(summary.recorded, 2);
    assert_eq!(
        csv_lines(&csv),
        vec!["ranks,threads,device,time_s", "1,1,CPU,1.5", "2,1,CPU,1.5"]
    );
    let records = load_records(&csv).unwrap();
    assert!(records.iter().all(|r| r.device == Some(Device::Cpu)));
}

#[test]
fn rows_are_flushed_while_sweep_is_running() {
    let _serial = serial();
    // EACH CHILD COUNTS THE DATA ROWS ALREADY ON DISK. NO BUFFERING MEANS 0, 1, 2.
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("results.csv");
    let body = format!(
        "n=$(($(wc -l < '{}') - 1))\necho \"Compute time: $n s\"",
        csv.display()
    );
    let spec = fake_launcher(dir.path(), &body);

    sweep(spec, &plan(&[1, 2, 3], &[1]), &csv);

    let times: Vec<f64> = load_records(&csv).unwrap().iter().map(|r| r.time_s).collect();
    assert_eq!(times, vec![0.0, 1.0, 2.0]);
}

#[test]
fn driver_appends_to_caller_owned_writer() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let spec = fake_launcher(dir.path(), r#"echo "Compute time: 2 s""#);
    let csv = dir.path().join("results.csv");
    let mut writer = ResultsWriter::create(&csv, Schema::Plain).unwrap();
    let mut driver = SweepDriver::new(spec).unwrap();

    let summary = driver
        .run(&plan(&[4], &[1, 2]), &mut writer, &AtomicBool::new(false))
        .unwrap();

    assert_eq!(summary.recorded, 2);
    assert_eq!(writer.rows(), 2);
    assert_eq!(csv_lines(&csv), vec!["ranks,threads,time_s", "4,1,2", "4,2,2"]);
}
