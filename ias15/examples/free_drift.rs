// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Drifts a single particle under zero acceleration and reports how far
//! its position deviates from `x0 + v0 * t`, the closed-form answer.
//!
//! Run with `cargo run --example free_drift`.

use ias15::{ForceField, Ias15Config, Ias15Integrator, Particle};

struct NoForce;

impl ForceField for NoForce {
    fn evaluate(&self, particles: &mut [Particle]) {
        for p in particles {
            p.acceleration = [0.0; 3];
        }
    }
}

fn main() {
    let config = Ias15Config::new(0.1).unwrap();
    let mut integrator = Ias15Integrator::new(config);
    let mut particles = vec![Particle::new([0.0, 0.0, 0.0], [1.0, 0.5, 0.0])];
    let force_field = NoForce;
    let mut t = 0.0_f64;

    let steps = 50;
    for _ in 0..steps {
        integrator.part1();
        let report = integrator.part2(&mut t, &mut particles, &force_field, None);
        println!(
            "t = {t:.4}  dt = {:.6}  iterations = {}  converged = {}",
            report.dt, report.iterations, report.converged
        );
    }

    let expected = [t * 1.0, t * 0.5, 0.0];
    let actual = particles[0].position;
    let drift = ((actual[0] - expected[0]).powi(2) + (actual[1] - expected[1]).powi(2)).sqrt();
    println!("final position: {actual:?}");
    println!("expected position: {expected:?}");
    println!("drift from closed form: {drift:e}");
}
