//! Single-point energies and gradients from machine-learned potentials,
//! written as Turbomole `gradient` and `energy` files.

pub mod app;
pub mod config;
pub mod io;
pub mod model;
pub mod optim_impl;
pub mod structure;
pub mod units;
