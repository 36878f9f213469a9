//! Driver application: read, optionally relax, evaluate, write results

mod runner;

pub use runner::{evaluate, Evaluation};

use crate::config::{Args, RunOptions};
use crate::io::{
    read_structure, setup_output, write_energy_block, write_gradient_block, write_xyz,
    TrajectoryWriter,
};
use crate::model::{build_model, Calculator};
use crate::optim_impl::{GeometryOptimizer, Lbfgs, OptimizationReport};
use crate::structure::Molecule;
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;

pub struct DriverApplication {
    args: Args,
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Total energy in Hartree
    pub energy: f64,
    pub gradient_norm: f64,
    pub natoms: usize,
    pub optimization: Option<OptimizationReport>,
}

impl DriverApplication {
    pub fn from_cli() -> Result<Self> {
        let args = Args::parse();
        Ok(Self { args })
    }

    pub fn run(self) -> Result<()> {
        setup_output(self.args.verbose);
        let options = RunOptions::from_args(&self.args)?;
        run_with_options(&options)?;
        Ok(())
    }
}

/// Carry out one driver run with resolved options.
pub fn run_with_options(options: &RunOptions) -> Result<RunSummary> {
    let mut mol = read_structure(&options.structure_file).wrap_err_with(|| {
        format!(
            "Unable to read structure: {}",
            options.structure_file.display()
        )
    })?;
    mol.set_charge_and_spin(options.charge, options.multiplicity);
    info!(
        "Read {} atoms from {} (charge={}, multiplicity={})",
        mol.natoms(),
        options.structure_file.display(),
        options.charge,
        options.multiplicity
    );

    if mol.has_constraints() {
        let nfixed = mol.fixed.iter().filter(|&&f| f).count();
        info!("{} atoms are fixed in place", nfixed);
    }

    let model = build_model(options)?;
    let mut calc = Calculator::new(model, &options.model);

    let optimization = if options.optimize {
        Some(optimize(&mut mol, &mut calc, options)?)
    } else {
        None
    };

    let evaluation = evaluate(&mut calc, &mol)?;
    println!("Total energy: {:.10}", evaluation.energy);
    info!("Used model: {}", calc.name());

    let gradient_path = options.gradient_path();
    let gradient_norm = write_gradient_block(
        &gradient_path,
        evaluation.energy,
        &evaluation.forces,
        &mol,
    )
    .wrap_err_with(|| format!("Failed to write {}", gradient_path.display()))?;
    println!("Gradient Norm: {:.10}", gradient_norm);

    let energy_path = options.energy_path();
    write_energy_block(&energy_path, evaluation.energy)
        .wrap_err_with(|| format!("Failed to write {}", energy_path.display()))?;

    Ok(RunSummary {
        energy: evaluation.energy,
        gradient_norm,
        natoms: mol.natoms(),
        optimization,
    })
}

fn optimize(
    mol: &mut Molecule,
    calc: &mut Calculator,
    options: &RunOptions,
) -> Result<OptimizationReport> {
    let trajectory = TrajectoryWriter::create(&options.trajectory_path())?;
    let mut optimizer = Lbfgs::new(options.fmax, options.max_steps).with_trajectory(trajectory);
    let report = optimizer.run(mol, calc)?;

    let comment = format!(
        "energy={:.10} converged={}",
        report.energy, report.converged
    );
    write_xyz(&options.optimized_path(), mol, &comment)?;
    info!(
        "Optimized geometry written to {}",
        options.optimized_path().display()
    );
    Ok(report)
}
