//! # Greedy preferred-class assignment.
//!
//! The coordinator gives every new camera a preferred resource class: fill the
//! highest-priority class up to its capacity, then the next one, and send any overflow
//! to the lowest-priority class. The assignment is advisory; the pool's fallback in
//! [`ResourcePool::acquire`](crate::ResourcePool::acquire) is what actually keeps
//! capacities safe.

use crate::resources::class::ResourceClass;

/// Greedy assigner of preferred classes, in roster order.
#[derive(Debug, Clone)]
pub struct ClassAssigner {
    classes: Vec<ResourceClass>,
    assigned: Vec<usize>,
}

impl ClassAssigner {
    /// Creates an assigner over classes in priority order.
    pub fn new(classes: &[ResourceClass]) -> Self {
        Self {
            classes: classes.to_vec(),
            assigned: vec![0; classes.len()],
        }
    }

    /// Picks the preferred class of the next camera.
    ///
    /// Returns `None` only when there are no classes at all.
    pub fn assign(&mut self) -> Option<ResourceClass> {
        let idx = self
            .classes
            .iter()
            .zip(&self.assigned)
            .position(|(class, n)| *n < class.capacity())
            .or_else(|| self.classes.len().checked_sub(1))?;

        self.assigned[idx] += 1;
        Some(self.classes[idx].clone())
    }

    /// Cameras assigned to `class` so far.
    pub fn assigned(&self, class: &str) -> usize {
        self.classes
            .iter()
            .position(|c| c.name() == class)
            .map(|idx| self.assigned[idx])
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::EncoderFamily;

    #[test]
    fn test_fills_higher_priority_first() {
        let classes = [
            ResourceClass::new("nvenc", 2, EncoderFamily::Nvenc),
            ResourceClass::new("vaapi", 2, EncoderFamily::Vaapi),
        ];
        let mut a = ClassAssigner::new(&classes);
        let picks: Vec<String> = (0..5)
            .map(|_| a.assign().unwrap().name().to_string())
            .collect();
        assert_eq!(picks, ["nvenc", "nvenc", "vaapi", "vaapi", "vaapi"]);
        assert_eq!(a.assigned("nvenc"), 2);
        assert_eq!(a.assigned("vaapi"), 3);
    }

    #[test]
    fn test_no_classes() {
        let mut a = ClassAssigner::new(&[]);
        assert!(a.assign().is_none());
    }
}
