// HYBRIDSWEEP -- MPI x OPENMP COMPUTE-TIME SWEEPS
// LIBRARY CRATE: CONFIGURATION SPACE, TIMING EXTRACTION, RESULTS STORE, SWEEP DRIVER,
// RESULTS VISUALIZER. THE BINARY (main.rs) IS A THIN CLAP FRONT END OVER THESE.

pub mod extract;
pub mod plot;
pub mod point;
pub mod profile;
pub mod store;
pub mod sweep;
