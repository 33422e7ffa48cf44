use std::collections::BTreeMap;

use crate::goal::MemoryAllocationGoal;

/// Goals keyed by device UID, at most one per device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryAllocationGoalCollection {
    goals: BTreeMap<String, MemoryAllocationGoal>,
}

impl MemoryAllocationGoalCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `goal`, replacing any goal already held for the same device.
    /// Returns the replaced goal.
    pub fn push(&mut self, goal: MemoryAllocationGoal) -> Option<MemoryAllocationGoal> {
        self.goals.insert(goal.device.uid.clone(), goal)
    }

    pub fn get(&self, uid: &str) -> Option<&MemoryAllocationGoal> {
        self.goals.get(uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.goals.contains_key(uid)
    }

    pub fn device_uids(&self) -> impl Iterator<Item = &str> {
        self.goals.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryAllocationGoal> {
        self.goals.values()
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    pub fn clear(&mut self) {
        self.goals.clear();
    }
}

impl FromIterator<MemoryAllocationGoal> for MemoryAllocationGoalCollection {
    fn from_iter<I: IntoIterator<Item = MemoryAllocationGoal>>(iter: I) -> Self {
        let mut collection = Self::new();
        for goal in iter {
            collection.push(goal);
        }
        collection
    }
}

impl IntoIterator for MemoryAllocationGoalCollection {
    type Item = MemoryAllocationGoal;
    type IntoIter = std::collections::btree_map::IntoValues<String, MemoryAllocationGoal>;

    fn into_iter(self) -> Self::IntoIter {
        self.goals.into_values()
    }
}
