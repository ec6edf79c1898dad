//! End-to-end tests of the collision/remediation pipeline.
//!
//! These drive the full tick loop — movement, grid rebuild, collision,
//! lifecycle dispatch, background outcomes — against scripted backends.

use std::sync::Arc;

use glam::Vec2;

use cellgrid::Aabb;

use crate::entity::{EntityFlags, EntityState};
use crate::remediation::{RemediationError, RequestState};
use crate::simulation::RemediationMode;

use super::helpers::*;

mod candidate_bound_tests {
    use super::*;

    /// Narrow-phase work per query must track local density, not population
    /// size: the same interior query point yields the same candidate count
    /// whether 64 or 1024 entities are loaded.
    #[test]
    fn candidate_counts_do_not_grow_with_population() {
        let sample_points = [
            Vec2::new(100.0, 100.0),
            Vec2::new(52.0, 76.0),
            Vec2::new(120.0, 48.0),
        ];

        let mut per_population: Vec<Vec<usize>> = Vec::new();
        for n in [64usize, 256, 1024] {
            let mut sim = sim_with(RemediationMode::Direct, Arc::new(OkClient));
            sim.load_session(lattice_specs(n, 24.0));
            sim.step();

            let counts = sample_points
                .iter()
                .map(|&point| {
                    let region = Aabb::from_center_half_extent(point, Vec2::splat(2.0));
                    sim.grid().query(&region).len()
                })
                .collect::<Vec<_>>();
            per_population.push(counts);
        }

        // Identical local neighborhoods at every population size.
        assert_eq!(per_population[0], per_population[1]);
        assert_eq!(per_population[1], per_population[2]);
        // And bounded by the density constant, far below any n.
        assert!(per_population[0].iter().all(|&count| count <= 16));
    }

    #[test]
    fn occupancy_stays_bounded_at_fixed_density() {
        for n in [64usize, 1024] {
            let mut sim = sim_with(RemediationMode::Direct, Arc::new(OkClient));
            sim.load_session(lattice_specs(n, 24.0));
            sim.step();

            let stats = sim.grid().occupancy();
            assert!(
                stats.max <= 8,
                "cell occupancy {} grew beyond the density bound at n={n}",
                stats.max
            );
        }
    }
}

mod pending_lock_tests {
    use super::*;

    /// While a remediation is in flight the entity is locked: further hits
    /// change nothing and no second request is ever issued.
    #[test]
    fn pending_entity_ignores_further_hits() {
        init_tracing();
        let gate = GateClient::new();
        let mut sim = sim_with(RemediationMode::Direct, gate.clone());
        let ids = sim.load_session(vec![resource_spec("vm/worker-01", 10.0, 10.0)]);

        // Drain the resource's 3 health in one tick.
        for _ in 0..3 {
            sim.spawn_projectile(shot(10.0, 10.0, 1));
        }
        sim.step();
        assert_eq!(
            sim.arena().get(ids[0]).unwrap().state,
            EntityState::PendingRemediation
        );

        // Keep shooting while the backend call is held open.
        for _ in 0..5 {
            sim.spawn_projectile(shot(10.0, 10.0, 1));
            sim.step();
        }
        let entity = sim.arena().get(ids[0]).unwrap();
        assert_eq!(entity.state, EntityState::PendingRemediation);
        assert_eq!(entity.health, 0);

        gate.release();
        assert!(step_until(&mut sim, 500, |sim| sim.arena().get(ids[0]).is_none()));
        // Exactly one backend call for the whole barrage.
        assert_eq!(gate.calls(), 1);
        assert_eq!(sim.summary().succeeded, 1);
    }
}

mod direct_mode_tests {
    use super::*;

    #[test]
    fn successful_remediation_removes_entity_from_queries() {
        let mut sim = sim_with(RemediationMode::Direct, Arc::new(OkClient));
        let ids = sim.load_session(vec![resource_spec("bucket/public-read", 10.0, 10.0)]);

        sim.spawn_projectile(shot(10.0, 10.0, 3));
        sim.step();

        assert!(step_until(&mut sim, 500, |sim| sim.arena().get(ids[0]).is_none()));

        // Absent from spatial queries at its former position from now on.
        let former = Aabb::from_center_half_extent(Vec2::new(10.0, 10.0), Vec2::splat(20.0));
        sim.step();
        assert!(sim.query_visible(&former).is_empty());
        assert_eq!(sim.summary().succeeded, 1);
    }

    #[test]
    fn failed_remediation_restores_entity() {
        let mut sim = sim_with(
            RemediationMode::Direct,
            Arc::new(FailClient(RemediationError::NotFound)),
        );
        let ids = sim.load_session(vec![resource_spec("bucket/public-read", 10.0, 10.0)]);

        sim.spawn_projectile(shot(10.0, 10.0, 3));
        sim.step();

        assert!(step_until(&mut sim, 500, |sim| {
            sim.arena()
                .get(ids[0])
                .is_some_and(|e| e.state == EntityState::Active)
        }));

        let entity = sim.arena().get(ids[0]).unwrap();
        assert!(entity.health >= 1);
        assert!(entity.flags.contains(EntityFlags::RESTORED));
        assert!(entity.is_targetable());

        // Back in spatial queries: visible and attackable again.
        sim.step();
        let region = Aabb::from_center_half_extent(Vec2::new(10.0, 10.0), Vec2::splat(20.0));
        assert_eq!(sim.query_visible(&region), vec![ids[0]]);
        assert_eq!(sim.summary().failed, 1);
    }

    #[test]
    fn two_timeouts_then_success_is_an_overall_success() {
        let client = Arc::new(ScriptedClient::new([
            Err(RemediationError::Timeout),
            Err(RemediationError::Timeout),
            Ok(()),
        ]));
        let mut sim = sim_with(RemediationMode::Direct, client.clone());
        let ids = sim.load_session(vec![resource_spec("vm/worker-01", 10.0, 10.0)]);

        sim.spawn_projectile(shot(10.0, 10.0, 3));
        sim.step();

        assert!(step_until(&mut sim, 500, |sim| sim.arena().get(ids[0]).is_none()));
        assert_eq!(client.calls(), 3);
        assert_eq!(sim.summary().succeeded, 1);
        assert_eq!(sim.summary().failed, 0);
    }
}

mod protected_entity_tests {
    use super::*;

    #[test]
    fn protected_entity_shrugs_off_one_hundred_hits() {
        let mut sim = sim_with(RemediationMode::Direct, Arc::new(OkClient));
        let ids = sim.load_session(vec![protected_grant_spec("role/break-glass", 10.0, 10.0)]);
        let initial_health = sim.arena().get(ids[0]).unwrap().health;

        for _ in 0..100 {
            sim.spawn_projectile(shot(10.0, 10.0, 1));
            sim.step();
        }

        let entity = sim.arena().get(ids[0]).unwrap();
        assert_eq!(entity.state, EntityState::Active);
        assert_eq!(entity.health, initial_health);
        assert_eq!(sim.summary().attempted, 0);
    }
}

mod elimination_threshold_tests {
    use super::*;

    #[test]
    fn three_hits_produce_exactly_one_transition() {
        let gate = GateClient::new();
        let mut sim = sim_with(RemediationMode::Direct, gate.clone());
        let ids = sim.load_session(vec![resource_spec("vm/worker-01", 10.0, 10.0)]);

        // One hit per tick: Active at 2, Active at 1, then the transition.
        for expected_health in [2u32, 1] {
            sim.spawn_projectile(shot(10.0, 10.0, 1));
            sim.step();
            let entity = sim.arena().get(ids[0]).unwrap();
            assert_eq!(entity.state, EntityState::Active);
            assert_eq!(entity.health, expected_health);
        }

        sim.spawn_projectile(shot(10.0, 10.0, 1));
        sim.step();
        assert_eq!(
            sim.arena().get(ids[0]).unwrap().state,
            EntityState::PendingRemediation
        );

        // A few more ticks cannot fire a second request.
        for _ in 0..5 {
            sim.step();
        }
        gate.release();
        assert!(step_until(&mut sim, 500, |sim| sim.arena().get(ids[0]).is_none()));
        assert_eq!(gate.calls(), 1);
    }
}

mod speculative_removal_tests {
    use super::*;

    #[test]
    fn removed_entity_round_trips_to_empty_queries() {
        let mut sim = sim_with(RemediationMode::Deferred, Arc::new(OkClient));
        let ids = sim.load_session(vec![resource_spec("vm/worker-01", 10.0, 10.0)]);
        let region = Aabb::from_center_half_extent(Vec2::new(10.0, 10.0), Vec2::splat(20.0));

        sim.step();
        assert_eq!(sim.query_visible(&region), ids);

        sim.spawn_projectile(shot(10.0, 10.0, 3));
        sim.step();
        assert!(sim.arena().get(ids[0]).is_none());

        // After the next rebuild the former position queries empty.
        sim.step();
        assert!(sim.query_visible(&region).is_empty());
    }

    #[test]
    fn failed_deferred_entry_does_not_restore_the_entity() {
        let mut sim = sim_with(
            RemediationMode::Deferred,
            Arc::new(FailClient(RemediationError::Unauthorized)),
        );
        let ids = sim.load_session(vec![resource_spec("vm/worker-01", 10.0, 10.0)]);

        sim.spawn_projectile(shot(10.0, 10.0, 3));
        sim.step();

        let report = sim.end_session();

        // The remediation failed, but the simulation outcome stands: the
        // entity stays gone. That divergence is the mode's contract.
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.entry_outcomes[0].state, RequestState::FailedPermanent);
        assert!(sim.arena().get(ids[0]).is_none());
        assert!(sim.arena().is_empty());
    }
}

mod batch_flush_tests {
    use super::*;

    #[test]
    fn twenty_five_eliminations_flush_in_three_batches() {
        // Calls flush in queue order; fail the 3rd and 18th.
        let script: Vec<Result<(), RemediationError>> = (0..25)
            .map(|i| {
                if i == 2 || i == 17 {
                    Err(RemediationError::NotFound)
                } else {
                    Ok(())
                }
            })
            .collect();
        let client = Arc::new(ScriptedClient::new(script));
        let mut sim = sim_with(RemediationMode::Deferred, client.clone());

        sim.load_session(lattice_specs(25, 40.0));
        // One lethal shot per lattice entity, in slot order.
        for spec in lattice_specs(25, 40.0) {
            sim.spawn_projectile(shot(spec.position.x, spec.position.y, 3));
        }
        sim.step();
        assert_eq!(sim.arcade_queue().len(), 25);

        let report = sim.end_session();

        assert_eq!(report.batches, 3); // 10 + 10 + 5
        assert_eq!(report.entry_outcomes.len(), 25);
        assert_eq!(client.calls(), 25);
        assert_eq!(report.summary.attempted, 25);
        assert_eq!(report.summary.succeeded, 23);
        assert_eq!(report.summary.failed, 2);

        // Each entry's recorded outcome matches its own result, regardless
        // of which batch it rode in.
        for (i, outcome) in report.entry_outcomes.iter().enumerate() {
            let expected = if i == 2 || i == 17 {
                RequestState::FailedPermanent
            } else {
                RequestState::Succeeded
            };
            assert_eq!(outcome.state, expected, "entry {i}");
        }
    }
}

mod session_teardown_tests {
    use super::*;

    /// A result that arrives after its session was torn down must not touch
    /// the session that replaced it.
    #[test]
    fn stale_results_are_discarded_after_session_reload() {
        let gate = GateClient::new();
        let mut sim = sim_with(RemediationMode::Direct, gate.clone());
        sim.load_session(vec![resource_spec("vm/worker-01", 10.0, 10.0)]);

        sim.spawn_projectile(shot(10.0, 10.0, 3));
        sim.step();

        // Tear down mid-flight and load a fresh session with an entity in
        // the same spot.
        let new_ids = sim.load_session(vec![resource_spec("vm/worker-02", 10.0, 10.0)]);
        gate.release();

        // Give the stale outcome ample time to arrive and be discarded.
        assert!(!step_until(&mut sim, 50, |sim| {
            sim.summary().attempted > 0 || sim.arena().get(new_ids[0]).is_none()
        }));

        let entity = sim.arena().get(new_ids[0]).unwrap();
        assert_eq!(entity.state, EntityState::Active);
        assert_eq!(sim.summary().attempted, 0);
    }
}
