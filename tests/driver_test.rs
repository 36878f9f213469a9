//! End-to-end driver runs on small systems with the built-in
//! Lennard-Jones potential and a shell-script model runner.

use clap::Parser;
use omol_driver::app::run_with_options;
use omol_driver::config::{Args, RunOptions};
use omol_driver::io::{parse_xyz_frames, read_structure};
use omol_driver::units::{BOHR, HARTREE};
use std::path::{Path, PathBuf};

fn options_for(dir: &Path, structure: &Path, extra: &[&str]) -> RunOptions {
    let mut argv: Vec<String> = vec!["omol-driver".into()];
    argv.extend(extra.iter().map(|s| s.to_string()));
    argv.push(structure.display().to_string());
    let args = Args::try_parse_from(argv).unwrap();
    RunOptions::from_args_in(&args, dir.to_path_buf()).unwrap()
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn gradient_rows(text: &str) -> Vec<Vec<f64>> {
    text.lines()
        .filter(|l| !l.starts_with('$') && !l.contains("cycle"))
        .map(|l| l.split_whitespace().filter_map(|t| t.parse::<f64>().ok()).collect())
        .collect()
}

#[test]
fn test_single_point_lj_dimer() {
    let dir = tempfile::tempdir().unwrap();
    let r0 = 2f64.powf(1.0 / 6.0);
    let content = format!("2\nargon\nAr 0.0 0.0 0.0\nAr {} 0.0 0.0\n", r0);
    let xyz = write_file(dir.path(), "dimer.xyz", &content);

    let options = options_for(dir.path(), &xyz, &["--model", "lj"]);
    let summary = run_with_options(&options).unwrap();
    assert_eq!(summary.natoms, 2);
    assert!((summary.energy + 1.0 / HARTREE).abs() < 1e-12);
    assert!(summary.gradient_norm < 1e-10);
    assert!(summary.optimization.is_none());

    let energy = std::fs::read_to_string(dir.path().join("energy")).unwrap();
    let e = format!("{:.10}", summary.energy);
    assert_eq!(energy, format!("$energy\n     1     {e}     {e}     {e}\n$end\n"));

    let gradient = std::fs::read_to_string(dir.path().join("gradient")).unwrap();
    assert!(gradient.starts_with("$grad\n cycle = 1   SCF energy = "));
    assert!(gradient.ends_with("$end\n"));
    let rows = gradient_rows(&gradient);
    assert_eq!(rows.len(), 4);
    assert!((rows[1][0] - r0 / BOHR).abs() < 1e-10);
    assert!(gradient.lines().nth(3).unwrap().trim_end().ends_with("ar"));

    assert!(!dir.path().join("omol25-opt.xyz").exists());
    assert!(!dir.path().join("trajectory.out").exists());
}

#[test]
fn test_optimization_writes_relaxed_structure() {
    let dir = tempfile::tempdir().unwrap();
    let xyz = write_file(
        dir.path(),
        "trimer.xyz",
        "3\n\nAr 0.0 0.0 0.0\nAr 1.3 0.0 0.0\nAr 0.6 1.0 0.0\n",
    );

    let options = options_for(dir.path(), &xyz, &["--model", "lj", "--opt", "--fmax", "1e-4"]);
    let summary = run_with_options(&options).unwrap();
    let report = summary.optimization.unwrap();
    assert!(report.converged);
    assert!((summary.energy + 3.0 / HARTREE).abs() < 1e-7);

    let relaxed = read_structure(&dir.path().join("omol25-opt.xyz")).unwrap();
    let input = read_structure(&xyz).unwrap();
    assert_eq!(relaxed.elements, input.elements);

    let traj_path = dir.path().join("trajectory.out");
    let text = std::fs::read_to_string(&traj_path).unwrap();
    let frames = parse_xyz_frames(&text, &traj_path).unwrap();
    assert_eq!(frames.len(), report.steps + 1);
}

#[test]
fn test_marker_files_reach_the_model() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), ".CHRG", "1\n");
    write_file(dir.path(), ".UHF", "1\n");
    let xyz = write_file(dir.path(), "oh.xyz", "2\n\nO 0.0 0.0 0.0\nH 0.0 0.0 0.97\n");
    // echo charge and spin back as the energy
    let runner = write_file(
        dir.path(),
        "runner.sh",
        r#"while IFS= read -r line; do
  charge=$(echo "$line" | sed 's/.*"charge":\([-0-9]*\).*/\1/')
  spin=$(echo "$line" | sed 's/.*"spin":\([-0-9]*\).*/\1/')
  echo "{\"energy\": $charge$spin, \"forces\": [[0.0, 0.0, 0.1], [0.0, 0.0, -0.1]]}"
done
"#,
    );
    let runner_cmd = format!("sh {}", runner.display());

    let options = options_for(dir.path(), &xyz, &["--runner", &runner_cmd, "--device", "cpu"]);
    assert_eq!(options.charge, 1);
    assert_eq!(options.multiplicity, 2);

    let summary = run_with_options(&options).unwrap();
    assert!((summary.energy - 12.0 / HARTREE).abs() < 1e-12);

    let gradient = std::fs::read_to_string(dir.path().join("gradient")).unwrap();
    let rows = gradient_rows(&gradient);
    let expected = 0.1 * BOHR / HARTREE;
    assert!((rows[2][2] + expected).abs() < 1e-14);
    assert!((rows[3][2] - expected).abs() < 1e-14);
}

#[test]
fn test_cli_overrides_marker_files() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), ".CHRG", "2\n");
    let xyz = write_file(dir.path(), "mol.xyz", "1\n\nNe 0.0 0.0 0.0\n");

    let extra = ["--model", "lj", "--charge", "-1", "--multiplicity", "2"];
    let options = options_for(dir.path(), &xyz, &extra);
    assert_eq!(options.charge, -1);
    assert_eq!(options.multiplicity, 2);
}

#[test]
fn test_failures_leave_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let xyz = write_file(dir.path(), "bad.xyz", "2\n\nXx 0.0 0.0 0.0\nH 0.0 0.0 1.0\n");
    let options = options_for(dir.path(), &xyz, &["--model", "lj"]);
    assert!(run_with_options(&options).is_err());
    assert!(!dir.path().join("gradient").exists());

    let good = write_file(dir.path(), "h2.xyz", "2\n\nH 0.0 0.0 0.0\nH 0.0 0.0 0.74\n");
    let options = options_for(dir.path(), &good, &["--runner", "/nonexistent/omol-runner"]);
    assert!(run_with_options(&options).is_err());
    assert!(!dir.path().join("energy").exists());
}

#[test]
fn test_optimization_stops_on_overlapping_atoms() {
    let dir = tempfile::tempdir().unwrap();
    let xyz = write_file(dir.path(), "clash.xyz", "2\n\nAr 0.0 0.0 0.0\nAr 0.0 0.0 0.0\n");

    let options = options_for(dir.path(), &xyz, &["--model", "lj", "--opt"]);
    let err = run_with_options(&options).unwrap_err();
    assert!(format!("{:?}", err).contains("non-finite"));
    assert!(!dir.path().join("omol25-opt.xyz").exists());
    assert!(!dir.path().join("gradient").exists());
}

#[test]
fn test_invalid_marker_file() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), ".CHRG", "one\n");
    let xyz = write_file(dir.path(), "mol.xyz", "1\n\nNe 0.0 0.0 0.0\n");

    let argv = ["omol-driver".to_string(), xyz.display().to_string()];
    let args = Args::try_parse_from(argv).unwrap();
    assert!(RunOptions::from_args_in(&args, dir.path().to_path_buf()).is_err());
}
