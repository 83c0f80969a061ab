use std::collections::HashMap;

/// Tracker login -> board username. Read-only for the whole run.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    by_login: HashMap<String, String>,
}

impl UserDirectory {
    pub fn new(by_login: HashMap<String, String>) -> Self {
        Self { by_login }
    }

    pub fn board_username(&self, login: &str) -> Option<&str> {
        self.by_login.get(login).map(String::as_str)
    }
}

/// Issue label -> board color token.
#[derive(Debug, Clone, Default)]
pub struct LabelColors {
    by_label: HashMap<String, String>,
}

impl LabelColors {
    pub fn new(by_label: HashMap<String, String>) -> Self {
        Self { by_label }
    }

    pub fn color_for(&self, label: &str) -> Option<&str> {
        self.by_label.get(label).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_miss_quietly() {
        let users = UserDirectory::new(HashMap::from([("alice".into(), "alice_t".into())]));
        assert_eq!(users.board_username("alice"), Some("alice_t"));
        assert_eq!(users.board_username("bob"), None);

        let colors = LabelColors::new(HashMap::from([("bug".into(), "red".into())]));
        assert_eq!(colors.color_for("bug"), Some("red"));
        assert_eq!(colors.color_for("feature"), None);
    }
}
