//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{instance::Instance, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through the healthy instances.
///
/// Each selection is a single `fetch_add`, so concurrent callers never lose
/// or duplicate a step of the rotation.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_instance(&self, candidates: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(Arc::clone(&candidates[index]))
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let b1 = Arc::new(Instance::new("127.0.0.1:8080"));
        let b2 = Arc::new(Instance::new("127.0.0.1:8081"));
        let instances = vec![b1.clone(), b2.clone()];

        let s1 = lb.next_instance(&instances).unwrap();
        assert_eq!(s1.address(), b1.address());

        let s2 = lb.next_instance(&instances).unwrap();
        assert_eq!(s2.address(), b2.address());

        let s3 = lb.next_instance(&instances).unwrap();
        assert_eq!(s3.address(), b1.address());
    }

    #[test]
    fn test_each_instance_once_per_cycle() {
        let lb = RoundRobin::new();
        let instances: Vec<_> = (0..5)
            .map(|i| Arc::new(Instance::new(format!("10.0.0.{i}:80"))))
            .collect();

        // Start mid-rotation to show any N consecutive picks cover all N.
        lb.next_instance(&instances);
        let picked: HashSet<String> = (0..instances.len())
            .map(|_| lb.next_instance(&instances).unwrap().address().to_string())
            .collect();
        assert_eq!(picked.len(), instances.len());
    }

    #[test]
    fn test_concurrent_selection_is_fair() {
        let lb = Arc::new(RoundRobin::new());
        let instances: Arc<Vec<_>> = Arc::new(
            (0..4)
                .map(|i| Arc::new(Instance::new(format!("10.0.0.{i}:80"))))
                .collect(),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lb = lb.clone();
                let instances = instances.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| lb.next_instance(&instances).unwrap().address().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts = std::collections::HashMap::new();
        for handle in handles {
            for address in handle.join().unwrap() {
                *counts.entry(address).or_insert(0) += 1;
            }
        }
        assert!(counts.values().all(|&c| c == 200), "uneven rotation: {counts:?}");
    }
}
