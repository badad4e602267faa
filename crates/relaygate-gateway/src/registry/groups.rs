use dashmap::{DashMap, DashSet};

/// Group membership: group -> users, user -> groups.
///
/// Membership outlives connections so offline members still receive group
/// traffic through the offline pipeline.
#[derive(Default)]
pub struct GroupStore {
    group_to_users: DashMap<String, DashSet<String>>,
    user_to_groups: DashMap<String, DashSet<String>>,
}

impl GroupStore {
    pub fn new() -> Self {
        Self {
            group_to_users: DashMap::new(),
            user_to_groups: DashMap::new(),
        }
    }

    pub fn join(&self, group: &str, user: &str) {
        self.group_to_users
            .entry(group.to_string())
            .or_default()
            .insert(user.to_string());

        self.user_to_groups
            .entry(user.to_string())
            .or_default()
            .insert(group.to_string());
    }

    pub fn leave(&self, group: &str, user: &str) {
        if let Some(set) = self.group_to_users.get(group) {
            set.remove(user);
            if set.is_empty() {
                drop(set);
                self.group_to_users.remove_if(group, |_, s| s.is_empty());
            }
        }
        if let Some(set) = self.user_to_groups.get(user) {
            set.remove(group);
            if set.is_empty() {
                drop(set);
                self.user_to_groups.remove_if(user, |_, s| s.is_empty());
            }
        }
    }

    pub fn members(&self, group: &str) -> Vec<String> {
        self.group_to_users
            .get(group)
            .map(|set| set.iter().map(|u| u.key().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn groups_of(&self, user: &str) -> Vec<String> {
        self.user_to_groups
            .get(user)
            .map(|set| set.iter().map(|g| g.key().to_string()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_leave_keep_both_indexes() {
        let groups = GroupStore::new();
        groups.join("g1", "a");
        groups.join("g1", "b");
        groups.join("g2", "a");

        let mut members = groups.members("g1");
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(groups.groups_of("a").len(), 2);

        groups.leave("g1", "a");
        assert_eq!(groups.members("g1"), vec!["b".to_string()]);
        assert_eq!(groups.groups_of("a"), vec!["g2".to_string()]);

        groups.leave("g1", "b");
        assert!(groups.members("g1").is_empty());
    }

    #[test]
    fn unknown_group_is_empty() {
        assert!(GroupStore::new().members("nope").is_empty());
    }
}
