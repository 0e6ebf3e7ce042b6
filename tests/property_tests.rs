#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;
    use dyna::approximator::Approximator;
    use dyna::network::NeuralNetwork;
    use dyna::optimizer::{OptimizerWrapper, SGD};
    use dyna::planning::AdmissionPolicy;
    use dyna::queue::BoundedPriorityQueue;
    use dyna::schedule::{EpsilonSchedule, ScheduleState};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn priorities_strategy() -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-100.0f32..100.0, 1..200)
    }

    proptest! {
        #[test]
        fn test_queue_never_exceeds_capacity(
            capacity in 1usize..20,
            priorities in priorities_strategy()
        ) {
            let mut queue: BoundedPriorityQueue<usize> = BoundedPriorityQueue::with_capacity(capacity).unwrap();
            for (i, &p) in priorities.iter().enumerate() {
                queue.push(i, p).unwrap();
                prop_assert!(queue.len() <= capacity);
                prop_assert_eq!(queue.len(), (i + 1).min(capacity));
            }
        }

        #[test]
        fn test_pop_max_returns_highest(priorities in priorities_strategy()) {
            let mut queue: BoundedPriorityQueue<usize> = BoundedPriorityQueue::with_capacity(priorities.len()).unwrap();
            for (i, &p) in priorities.iter().enumerate() {
                queue.push(i, p).unwrap();
            }
            while !queue.is_empty() {
                let (_, popped) = queue.pop_max().unwrap();
                prop_assert!(queue.priorities().all(|p| popped >= p));
            }
        }

        #[test]
        fn test_eviction_removes_lowest(
            priorities in priorities_strategy(),
            incoming in -100.0f32..100.0
        ) {
            let capacity = priorities.len();
            let mut queue: BoundedPriorityQueue<usize> = BoundedPriorityQueue::with_capacity(capacity).unwrap();
            for (i, &p) in priorities.iter().enumerate() {
                queue.push(i, p).unwrap();
            }

            let evicted = queue.push(usize::MAX, incoming).unwrap();
            prop_assert_eq!(queue.len(), capacity);
            let (_, evicted_priority) = evicted.unwrap();
            prop_assert!(evicted_priority <= incoming);
            prop_assert!(queue.priorities().all(|p| evicted_priority <= p));
        }

        #[test]
        fn test_priority_decays_geometrically(
            td_error in 0.01f32..100.0,
            decay in 0.01f32..=1.0
        ) {
            let policy = AdmissionPolicy {
                priority_threshold: 0.0,
                priority_decay: decay,
                max_rollout_length: None,
            };
            for depth in 0..10 {
                let current = policy.priority(td_error, depth);
                let next = policy.priority(td_error, depth + 1);
                prop_assert!(next <= current);
                prop_assert!((next - decay * current).abs() <= 1e-5 * current);
            }
        }

        #[test]
        fn test_admission_boundary(
            threshold in 0.0f32..10.0,
            max_depth in 1usize..10
        ) {
            let policy = AdmissionPolicy {
                priority_threshold: threshold,
                priority_decay: 0.9,
                max_rollout_length: Some(max_depth),
            };
            prop_assert_eq!(policy.admit(threshold, 0), None);
            prop_assert_eq!(policy.admit(threshold + 1e6, max_depth), None);
            prop_assert!(policy.admit(threshold + 1e6, max_depth - 1).is_some());
        }

        #[test]
        fn test_epsilon_monotonicity(
            decay in 0.5f32..=1.0,
            final_epsilon in 0.0f32..0.5,
            warmup in 0u64..20,
            steps in 1usize..100
        ) {
            let schedule = EpsilonSchedule::new(decay, final_epsilon, warmup).unwrap();
            let mut state = ScheduleState::initial();
            for _ in 0..steps {
                let next = schedule.tick(state);
                if next.step_count < warmup {
                    prop_assert_eq!(next.epsilon, state.epsilon);
                } else {
                    prop_assert!(next.epsilon <= state.epsilon);
                }
                prop_assert!(next.epsilon >= final_epsilon);
                state = next;
            }
        }

        #[test]
        fn test_soft_update_blends_parameters(
            tau in 0.0f32..=1.0,
            seed in 0u64..1000
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let online = NeuralNetwork::mlp(3, &[5], 2, OptimizerWrapper::SGD(SGD::new()), &mut rng).unwrap();
            let mut target = NeuralNetwork::mlp(3, &[5], 2, OptimizerWrapper::SGD(SGD::new()), &mut rng).unwrap();
            let before = target.parameters();

            target.soft_update_from(&online, tau).unwrap();
            let after = target.parameters();
            for ((&a, &o), &t) in after.iter().zip(online.parameters().iter()).zip(before.iter()) {
                prop_assert!((a - (tau * o + (1.0 - tau) * t)).abs() < 1e-6);
            }

            target.hard_update_from(&online).unwrap();
            prop_assert_eq!(target.parameters(), online.parameters());
        }
    }
}
