//! Damped precession of a chain of unit vectors around a field.
//!
//! The state is a field of 3-vectors; every accepted step is followed by a
//! renormalization and the error is measured per vector. Configuration is
//! read from TOML, and a second thread stops the run after a wall-clock
//! deadline.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example spin_precession

use std::thread;
use std::time::Duration;

use heun::{normalize_vectors, Heun, RunOutcome, SolverConfig, System};

const CONFIG: &str = r#"
initial_step = 1e-3
max_error = 1e-5
min_step = 1e-8
max_step = 0.05

[error_norm]
kind = "max_vector"
components = 3
"#;

/// m' = -m x B - alpha m x (m x B), with gamma = 1
struct Precession {
    field: [f64; 3],
    alpha: f64,
    dm: Vec<f64>,
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

impl System for Precession {
    fn derivative(&mut self, m: &[f64], _t: f64) -> &[f64] {
        for (out, v) in self.dm.chunks_exact_mut(3).zip(m.chunks_exact(3)) {
            let v = [v[0], v[1], v[2]];
            let torque = cross(v, self.field);
            let damping = cross(v, torque);
            for ((d, t), g) in out.iter_mut().zip(torque).zip(damping) {
                *d = -t - self.alpha * g;
            }
        }
        &self.dm
    }

    fn normalize(&mut self, m: &mut [f64]) {
        normalize_vectors(m, 3);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = SolverConfig::from_toml_str(CONFIG)?;

    let cells = 1000;
    let mut m = Vec::with_capacity(3 * cells);
    for i in 0..cells {
        let theta = 3.0 * i as f64 / cells as f64;
        m.extend_from_slice(&[theta.sin(), 0.0, theta.cos()]);
    }
    let sys = Precession {
        field: [0.0, 0.0, 1.0],
        alpha: 0.05,
        dm: vec![0.0; 3 * cells],
    };

    let mut solver = Heun::from_config(&mut m, sys, &config)?;

    let stop = solver.stop_handle();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(10));
        stop.request_stop();
    });

    let outcome = solver.advance(50.0)?;
    let mz = solver
        .state()
        .chunks_exact(3)
        .map(|v| v[2])
        .sum::<f64>()
        / cells as f64;

    println!("Spin precession ({cells} cells, alpha = 0.05)");
    match outcome {
        RunOutcome::Completed => println!("  Completed at t = {:.4}", solver.elapsed()),
        RunOutcome::Stopped => println!("  Stopped at t = {:.4}", solver.elapsed()),
    }
    println!("  <mz> = {mz:.8}");
    println!("  Stats: {:?}", solver.stats());
    Ok(())
}
