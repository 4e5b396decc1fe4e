use thiserror::Error;

// Unified error type for lathmc

#[derive(Error, Debug)]
pub enum HmcError {
    #[error("inverter hit iteration cap after {iterations} iterations (residual^2 {final_res2:e})")]
    NotConverged { iterations: usize, final_res2: f64 },
}
