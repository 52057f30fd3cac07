//! Backends command

use anyhow::Result;
use normproc_compute::probe_backends;

pub fn run(verbose: u8) -> Result<()> {
    let probes = probe_backends();
    for probe in &probes {
        println!("{probe}");
    }
    if verbose > 0 {
        if let Some(best) = probes.iter().find(|p| p.is_ready()) {
            println!("auto selects: {}", best.backend.name());
        }
    }
    Ok(())
}
