//! Machine-learned potentials served by an external runner process
//!
//! The runner is started once and kept alive for the whole run, so the model
//! weights are loaded only once even during a geometry optimization. Driver
//! and runner exchange one JSON document per line:
//!
//! ```text
//! -> {"model":"uma-sm","task":"omol","charge":0,"spin":2,"symbols":["H"],"positions":[[0,0,0]]}
//! <- {"energy":-13.6,"forces":[[0,0,0]]}
//! ```
//!
//! Energies are in eV and forces in eV/Angstrom. A reply carrying an
//! `error` field aborts the calculation.

use super::{ChemicalModel, Computed};
use crate::structure::Molecule;
use color_eyre::eyre::{bail, eyre, Result, WrapErr};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Lines, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Serialize)]
struct Request<'a> {
    model: &'a str,
    task: &'a str,
    charge: i32,
    spin: i32,
    symbols: Vec<&'static str>,
    positions: Vec<[f64; 3]>,
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    energy: Option<f64>,
    #[serde(default)]
    forces: Option<Vec<[f64; 3]>>,
    #[serde(default)]
    error: Option<String>,
}

/// A running runner process with its pipes
struct Session {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        // closing stdin tells the runner to exit
        drop(self.stdin.take());
        for _ in 0..20 {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!("runner exited with status {:?}", status);
                    return;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(100)),
                Err(e) => {
                    error!("waiting for runner failed: {:?}", e);
                    break;
                }
            }
        }
        info!("Runner {} is still running, killing it.", self.child.id());
        if let Err(e) = self.child.kill() {
            error!("Kill runner process failure: {:?}", e);
        }
        let _ = self.child.wait();
    }
}

pub struct BlackBoxModel {
    /// runner program followed by its arguments
    cmdline: Vec<String>,
    model: String,
    device: String,
    task: String,
    session: Option<Session>,
    /// Record the number of potential evaluations.
    ncalls: usize,
}

impl BlackBoxModel {
    /// Prepare a model served by `runner` (program and arguments separated
    /// by whitespace). The process is started on the first evaluation.
    pub fn new(runner: &str, model: &str, device: &str, task: &str) -> Result<Self> {
        let cmdline: Vec<String> = runner.split_whitespace().map(String::from).collect();
        if cmdline.is_empty() {
            bail!("empty runner command for model {}", model);
        }
        Ok(BlackBoxModel {
            cmdline,
            model: model.to_string(),
            device: device.to_string(),
            task: task.to_string(),
            session: None,
            ncalls: 0,
        })
    }

    fn start_session(&self) -> Result<Session> {
        debug!("starting runner: {:?}", self.cmdline);
        let mut child = Command::new(&self.cmdline[0])
            .args(&self.cmdline[1..])
            .env("OMOL_MODEL", &self.model)
            .env("OMOL_DEVICE", &self.device)
            .env("OMOL_TASK", &self.task)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .wrap_err_with(|| {
                format!(
                    "Failed to start runner {:?} for model {}",
                    self.cmdline, self.model
                )
            })?;

        let stdin = child.stdin.take().ok_or_else(|| eyre!("Failed to open runner stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| eyre!("Failed to open runner stdout"))?;
        Ok(Session {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
        })
    }

    fn encode_request(&self, mol: &Molecule) -> Result<String> {
        for (i, p) in mol.positions.iter().enumerate() {
            if p.iter().any(|x| !x.is_finite()) {
                error!("Invalid position of atom {}: {:?}", i, p);
                bail!("Molecule has invalid data in positions.");
            }
        }
        let request = Request {
            model: &self.model,
            task: &self.task,
            charge: mol.charge,
            spin: mol.spin,
            symbols: mol.symbols().collect(),
            positions: mol.positions.iter().map(|p| [p.x, p.y, p.z]).collect(),
        };
        Ok(serde_json::to_string(&request)?)
    }

    // feed one request line and wait for one reply line
    fn communicate(&mut self, line: &str) -> Result<String> {
        if self.session.is_none() {
            self.session = Some(self.start_session()?);
        }
        let session = self.session.as_mut().ok_or_else(|| eyre!("runner session unavailable"))?;

        let stdin = session.stdin.as_mut().ok_or_else(|| eyre!("runner stdin closed"))?;
        writeln!(stdin, "{}", line)
            .and_then(|_| stdin.flush())
            .wrap_err("Failed to write to runner stdin")?;

        match session.stdout.next() {
            Some(reply) => reply.wrap_err("Failed to read runner stdout"),
            None => {
                // the runner is gone; start a fresh one on the next call
                self.session = None;
                bail!("runner for model {} exited without a reply", self.model)
            }
        }
    }
}

fn decode_reply(text: &str, natoms: usize) -> Result<Computed> {
    let reply: Reply = serde_json::from_str(text.trim())
        .wrap_err_with(|| format!("failed to parse runner reply: {:?}", text))?;
    if let Some(msg) = reply.error {
        bail!("runner reported an error: {}", msg);
    }

    let mut computed = Computed::default();
    if let Some(energy) = reply.energy {
        computed.set_energy(energy);
    }
    if let Some(forces) = reply.forces {
        if forces.len() != natoms {
            bail!("runner returned forces for {} atoms, expected {}", forces.len(), natoms);
        }
        computed.set_forces(forces.into_iter().map(Vector3::from).collect());
    }
    if computed.get_energy().is_none() && computed.get_forces().is_none() {
        warn!("runner reply has neither energy nor forces: {:?}", text);
    }
    Ok(computed)
}

impl ChemicalModel for BlackBoxModel {
    fn compute(&mut self, mol: &Molecule) -> Result<Computed> {
        let request = self.encode_request(mol)?;
        let reply = self.communicate(&request)?;
        let computed = decode_reply(&reply, mol.natoms())?;
        self.ncalls += 1;
        debug!("runner evaluation #{} done", self.ncalls);
        Ok(computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use periodic_table_on_an_enum::Element;
    use std::path::Path;

    fn dimer() -> Molecule {
        let h = Element::from_symbol("H").unwrap();
        let mut mol = Molecule::new(
            vec![h.clone(), h],
            vec![Vector3::zeros(), Vector3::new(0.0, 0.0, 0.74)],
        );
        mol.set_charge_and_spin(0, 3);
        mol
    }

    // a runner script executed through sh, one reply per request line
    fn script_runner(dir: &Path, body: &str) -> String {
        let path = dir.join("runner.sh");
        std::fs::write(&path, body).unwrap();
        format!("sh {}", path.display())
    }

    #[test]
    fn test_decode_reply() {
        let text = r#"{"energy": -31.5, "forces": [[0, 0, 1], [0, 0, -1]]}"#;
        let computed = decode_reply(text, 2).unwrap();
        assert_eq!(computed.get_energy(), Some(-31.5));
        assert_eq!(computed.get_forces().unwrap()[1], Vector3::new(0.0, 0.0, -1.0));

        assert!(decode_reply(r#"{"error": "CUDA unavailable"}"#, 2).is_err());
        assert!(decode_reply(r#"{"energy": -1.0, "forces": [[0, 0, 1]]}"#, 2).is_err());
        assert!(decode_reply("not json", 2).is_err());
    }

    #[test]
    fn test_encode_request() {
        let bbm = BlackBoxModel::new("omol-runner", "uma-sm", "cpu", "omol").unwrap();
        let line = bbm.encode_request(&dimer()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["model"], "uma-sm");
        assert_eq!(value["task"], "omol");
        assert_eq!(value["spin"], 3);
        assert_eq!(value["symbols"][1], "H");
        assert_eq!(value["positions"][1][2], 0.74);
        assert!(!line.contains('\n'));

        let mut bad = dimer();
        bad.positions[0].x = f64::NAN;
        assert!(bbm.encode_request(&bad).is_err());
    }

    #[test]
    fn test_empty_runner() {
        assert!(BlackBoxModel::new("  ", "uma-sm", "cpu", "omol").is_err());
    }

    #[test]
    fn test_runner_session() {
        let dir = tempfile::tempdir().unwrap();
        let runner = script_runner(
            dir.path(),
            r#"while IFS= read -r line; do
  echo '{"energy": -10.0, "forces": [[0.0, 0.0, 0.5], [0.0, 0.0, -0.5]]}'
done
"#,
        );
        let mut bbm = BlackBoxModel::new(&runner, "uma-sm", "cpu", "omol").unwrap();
        let mol = dimer();
        for _ in 0..3 {
            let computed = bbm.compute(&mol).unwrap();
            assert_eq!(computed.get_energy(), Some(-10.0));
            assert_eq!(computed.get_forces().unwrap()[0].z, 0.5);
        }
        assert_eq!(bbm.ncalls, 3);
    }

    #[test]
    fn test_runner_environment_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let runner = script_runner(
            dir.path(),
            r#"read -r line
echo "{\"error\": \"$OMOL_MODEL on $OMOL_DEVICE\"}"
"#,
        );
        let mut bbm = BlackBoxModel::new(&runner, "uma-md", "cpu", "omol").unwrap();
        let err = bbm.compute(&dimer()).unwrap_err();
        assert!(format!("{:?}", err).contains("uma-md on cpu"));
    }

    #[test]
    fn test_runner_exits_early() {
        let dir = tempfile::tempdir().unwrap();
        let runner = script_runner(dir.path(), "exit 0\n");
        let mut bbm = BlackBoxModel::new(&runner, "uma-sm", "cpu", "omol").unwrap();
        assert!(bbm.compute(&dimer()).is_err());
    }

    #[test]
    fn test_missing_runner() {
        let mut bbm =
            BlackBoxModel::new("/nonexistent/omol-runner", "uma-sm", "cpu", "omol").unwrap();
        assert!(bbm.compute(&dimer()).is_err());
    }
}
