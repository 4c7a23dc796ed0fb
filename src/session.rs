use crate::outcome::UserId;

/// Supplies the authenticated user for the current request.
///
/// Credential checks live outside this crate; probes only need to know
/// who is asking, or that nobody is.
pub trait SessionProvider: Send + Sync {
    fn current_user_id(&self) -> Option<UserId>;
}

/// A session fixed at construction: a known user or anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSession(Option<UserId>);

impl StaticSession {
    pub fn user(id: UserId) -> Self {
        StaticSession(Some(id))
    }

    pub fn anonymous() -> Self {
        StaticSession(None)
    }
}

impl SessionProvider for StaticSession {
    fn current_user_id(&self) -> Option<UserId> {
        self.0
    }
}
