//! Decomposition of arbitrary rotations into supported primitive steps.

use std::collections::VecDeque;

/// Maps every achievable rotation amount to a minimal ordered sequence of
/// natively supported rotation steps.
///
/// The supported offsets act as generators of the cyclic group
/// `Z/slot_count`; a shortest composition is a shortest path in the induced
/// Cayley graph, computed once by BFS from residue 0 and memoized. When the
/// public key was generated with a restricted rotation-key set the offsets
/// may not generate the full group, in which case some targets are simply
/// unreachable.
#[derive(Debug, Clone)]
pub struct RotateDependencyMapper {
    slot_count: usize,
    supported: Vec<i32>,
    /// Per residue: the last rotation step on a shortest path from 0.
    dependency: Vec<Option<i32>>,
    /// Per residue: minimal number of steps, `None` when unreachable.
    depths: Vec<Option<usize>>,
}

/// The default native rotation set: ± powers of two below the slot count.
pub fn default_rotation_steps(slot_count: usize) -> Vec<i32> {
    let mut steps = Vec::new();
    let mut p = 1usize;
    while p < slot_count {
        steps.push(p as i32);
        steps.push(-(p as i32));
        p *= 2;
    }
    steps
}

impl RotateDependencyMapper {
    pub fn new(slot_count: usize, supported: &[i32]) -> Self {
        assert!(slot_count > 0, "slot count must be positive");
        let supported: Vec<i32> = supported
            .iter()
            .copied()
            .filter(|&s| s.rem_euclid(slot_count as i32) != 0)
            .collect();

        let mut dependency = vec![None; slot_count];
        let mut depths = vec![None; slot_count];
        depths[0] = Some(0);

        let mut queue = VecDeque::new();
        queue.push_back(0usize);
        while let Some(cur) = queue.pop_front() {
            let next_depth = depths[cur].unwrap() + 1;
            for &step in &supported {
                let next = (cur as i32 + step).rem_euclid(slot_count as i32) as usize;
                if depths[next].is_none() {
                    depths[next] = Some(next_depth);
                    dependency[next] = Some(step);
                    queue.push_back(next);
                }
            }
        }

        Self {
            slot_count,
            supported,
            dependency,
            depths,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn supported_steps(&self) -> &[i32] {
        &self.supported
    }

    pub fn is_supported(&self, step: i32) -> bool {
        self.supported.contains(&step)
    }

    /// Minimal number of primitive rotations needed to realize `target`,
    /// `None` when the supported steps do not reach it. Rotating by 0 costs
    /// nothing.
    pub fn rotate_depth(&self, target: i32) -> Option<usize> {
        self.depths[target.rem_euclid(self.slot_count as i32) as usize]
    }

    /// Returns a minimal ordered sequence of supported rotations summing to
    /// `target` modulo the slot count, or `None` when `target` is not
    /// reachable by any composition.
    pub fn compose_rotate(&self, target: i32) -> Option<Vec<i32>> {
        let mut residue = target.rem_euclid(self.slot_count as i32) as usize;
        self.depths[residue]?;
        let mut steps = Vec::with_capacity(self.depths[residue].unwrap());
        while residue != 0 {
            let step = self.dependency[residue].expect("reachable residue has a dependency");
            steps.push(step);
            residue = (residue as i32 - step).rem_euclid(self.slot_count as i32) as usize;
        }
        steps.reverse();
        Some(steps)
    }
}
