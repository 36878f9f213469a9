//! Command-line entry point of the driver

use color_eyre::eyre::Result;
use omol_driver::app::DriverApplication;

fn main() -> Result<()> {
    color_eyre::install()?;
    DriverApplication::from_cli()?.run()
}
