//! Basic usage: exponential decay y' = -y.
//!
//! Integrates from y(0) = 1 over one time unit and compares with exp(-t).
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example exponential_decay

use heun::{FnSystem, Heun};

fn main() {
    env_logger::init();

    let mut y = vec![1.0];
    let sys = FnSystem::new(1, |y: &[f64], _t: f64, dy: &mut [f64]| dy[0] = -y[0]);

    let mut solver = Heun::new(&mut y, sys, 0.1, 1.0).expect("valid step size");
    solver.controller_mut().set_max_error(1e-3).expect("valid tolerance");
    solver.advance(1.0).expect("integration failed");

    let t = solver.elapsed();
    let exact = (-t).exp();
    let stats = solver.stats().clone();

    println!("Exponential decay (max_error = 1e-3)");
    println!("  Final time:     {t:.6}");
    println!("  y(t)          = {:.12}   (exact: {exact:.12})", solver.state()[0]);
    println!("  Error:          {:.2e}", (solver.state()[0] - exact).abs());
    println!("  Final step:     {:.4e}", solver.step_size());
    println!();
    println!("  Accepted steps: {}", stats.accepted_steps);
    println!("  Rejected steps: {}", stats.rejected_steps);
    println!("  Function evals: {}", stats.fn_evals);
}
