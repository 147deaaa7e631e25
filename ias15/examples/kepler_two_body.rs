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
//! Integrates a Sun-mass / Earth-mass two-body system for several orbits
//! and reports the drift in total (specific) energy, a standard sanity
//! check for a non-symplectic integrator: IAS15 should hold energy to
//! within a few `epsilon`-scaled units over this span, not grow linearly.
//!
//! Run with `cargo run --example kepler_two_body --release`.

use ias15::{ForceField, Ias15Config, Ias15Integrator, Particle};

const G: f64 = 1.0;

struct NewtonianGravity {
    masses: Vec<f64>,
}

impl ForceField for NewtonianGravity {
    fn evaluate(&self, particles: &mut [Particle]) {
        let n = particles.len();
        for p in particles.iter_mut() {
            p.acceleration = [0.0; 3];
        }
        for i in 0..n {
            for j in (i + 1)..n {
                let mut dx = [0.0; 3];
                let mut r2 = 0.0;
                for k in 0..3 {
                    dx[k] = particles[j].position[k] - particles[i].position[k];
                    r2 += dx[k] * dx[k];
                }
                let r = r2.sqrt();
                let inv_r3 = 1.0 / (r2 * r);
                for k in 0..3 {
                    particles[i].acceleration[k] += G * self.masses[j] * dx[k] * inv_r3;
                    particles[j].acceleration[k] -= G * self.masses[i] * dx[k] * inv_r3;
                }
            }
        }
    }
}

fn total_energy(particles: &[Particle], masses: &[f64]) -> f64 {
    let n = particles.len();
    let mut kinetic = 0.0;
    for i in 0..n {
        let v2: f64 = particles[i].velocity.iter().map(|v| v * v).sum();
        kinetic += 0.5 * masses[i] * v2;
    }
    let mut potential = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let mut r2 = 0.0;
            for k in 0..3 {
                let d = particles[j].position[k] - particles[i].position[k];
                r2 += d * d;
            }
            potential -= G * masses[i] * masses[j] / r2.sqrt();
        }
    }
    kinetic + potential
}

fn main() {
    let masses = vec![1.0, 3e-6];
    let config = Ias15Config::new(0.05).unwrap().with_epsilon(1e-9).unwrap();
    let mut integrator = Ias15Integrator::new(config);

    // A near-circular orbit at unit distance: v_circ = sqrt(G * m_sun / r).
    let v_circ = (G * masses[0]).sqrt();
    let mut particles = vec![
        Particle::new([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]),
        Particle::new([1.0, 0.0, 0.0], [0.0, v_circ, 0.0]),
    ];

    let gravity = NewtonianGravity {
        masses: masses.clone(),
    };
    let mut t = 0.0_f64;

    let e0 = total_energy(&particles, &masses);
    let orbits = 5.0;
    let period = 2.0 * std::f64::consts::PI / v_circ;
    let t_end = orbits * period;

    let mut steps = 0u64;
    while t < t_end {
        integrator.part1();
        integrator.part2(&mut t, &mut particles, &gravity, None);
        steps += 1;
    }

    let e1 = total_energy(&particles, &masses);
    println!("steps taken: {steps}");
    println!("initial energy: {e0:.12e}");
    println!("final energy:   {e1:.12e}");
    println!("relative drift: {:.3e}", ((e1 - e0) / e0).abs());
}
