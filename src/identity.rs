/// A resolved user, as far as score submission cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub display_name: String,
}

/// Who is typing. `None` means scores stay local and unsubmitted.
pub trait IdentityProvider {
    fn current_user(&self) -> Option<User>;
}

/// Identity backed by the persisted config (or the `--user` flag). The
/// chosen name doubles as the stable id.
#[derive(Debug, Clone, Default)]
pub struct StoredIdentity {
    user: Option<User>,
}

impl StoredIdentity {
    pub fn new(name: Option<String>) -> Self {
        let user = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .map(|n| User {
                id: n.to_lowercase(),
                display_name: n,
            });
        Self { user }
    }
}

impl IdentityProvider for StoredIdentity {
    fn current_user(&self) -> Option<User> {
        self.user.clone()
    }
}
