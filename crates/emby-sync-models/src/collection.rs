use serde::{Deserialize, Serialize};

/// A box-set on the media server as seen during one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Collection {
    pub id: Option<String>,
    pub name: String,
    /// Member names in insertion order. Treated as a set.
    pub member_names: Vec<String>,
}

impl Collection {
    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            member_names: Vec::new(),
        }
    }

    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.member_names.iter().any(|m| m == name)
    }

    /// Records a member unless it is already present.
    pub fn push_member(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.contains(&name) {
            self.member_names.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_member_keeps_set_semantics() {
        let mut c = Collection::absent("Weekly");
        c.push_member("A");
        c.push_member("B");
        c.push_member("A");
        assert_eq!(c.member_names, vec!["A", "B"]);
        assert!(!c.exists());
    }
}
