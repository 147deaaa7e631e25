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
//! A particle under zero acceleration must follow `x(t) = x0 + v0 * t`
//! exactly to machine precision: no force law means no predictor-corrector
//! nonlinearity, so this scenario exercises only the polynomial
//! integration and compensated summation, not convergence.

use ias15::{ForceField, Ias15Config, Ias15Integrator, Particle};

struct NoForce;

impl ForceField for NoForce {
    fn evaluate(&self, particles: &mut [Particle]) {
        for p in particles {
            p.acceleration = [0.0; 3];
        }
    }
}

#[test]
fn single_particle_drifts_linearly() {
    let config = Ias15Config::new(0.1).unwrap();
    let mut integrator = Ias15Integrator::new(config);
    let mut particles = vec![Particle::new([1.0, -2.0, 0.5], [0.3, 0.0, -0.1])];
    let force_field = NoForce;
    let mut t = 0.0_f64;

    for _ in 0..200 {
        integrator.part1();
        integrator.part2(&mut t, &mut particles, &force_field, None);
    }

    let expected = [1.0 + 0.3 * t, -2.0, 0.5 - 0.1 * t];
    for k in 0..3 {
        assert!(
            (particles[0].position[k] - expected[k]).abs() < 1e-9,
            "component {k}: got {}, expected {}",
            particles[0].position[k],
            expected[k]
        );
    }
}

#[test]
fn multiple_particles_drift_independently() {
    let config = Ias15Config::new(0.2).unwrap();
    let mut integrator = Ias15Integrator::new(config);
    let mut particles = vec![
        Particle::new([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
        Particle::new([0.0, 0.0, 0.0], [0.0, 2.0, 0.0]),
        Particle::new([0.0, 0.0, 0.0], [0.0, 0.0, -3.0]),
    ];
    let force_field = NoForce;
    let mut t = 0.0_f64;

    for _ in 0..50 {
        integrator.part1();
        integrator.part2(&mut t, &mut particles, &force_field, None);
    }

    assert!((particles[0].position[0] - t).abs() < 1e-9);
    assert!((particles[1].position[1] - 2.0 * t).abs() < 1e-9);
    assert!((particles[2].position[2] - (-3.0 * t)).abs() < 1e-9);
}

#[test]
fn time_is_reversible_under_free_drift() {
    let config = Ias15Config::new(0.1).unwrap();
    let mut integrator = Ias15Integrator::new(config);
    let mut particles = vec![Particle::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])];
    let force_field = NoForce;
    let mut t = 0.0_f64;

    for _ in 0..20 {
        integrator.part1();
        integrator.part2(&mut t, &mut particles, &force_field, None);
    }

    let forward_position = particles[0].position;

    // Reverse velocity and integrate back over the same span.
    particles[0].velocity = [-1.0, -1.0, -1.0];
    particles[0].tdone = 0.0;
    particles[0].dtdone = 0.0;
    let mut backward_config_integrator = Ias15Integrator::new(Ias15Config::new(0.1).unwrap());
    let mut t_back = 0.0_f64;
    for _ in 0..20 {
        backward_config_integrator.part1();
        backward_config_integrator.part2(&mut t_back, &mut particles, &force_field, None);
    }

    for k in 0..3 {
        assert!(
            (particles[0].position[k] - 0.0).abs() < 1e-8,
            "reversed drift should return to the origin, got {forward_position:?} then {:?}",
            particles[0].position
        );
    }
}
