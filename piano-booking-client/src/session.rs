use piano_booking_http::Transport;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::api::BookingApi;
use crate::error::{ClientError, StoreError};
use crate::model::Profile;
use crate::role::UserRole;
use crate::store::LocalStore;

/// Authentication state of one signed in user.
///
/// Every program run (or test) owns its own session; the profile is memoized here rather than in
/// a process wide cache, so nothing leaks between sessions.
#[derive(Debug)]
#[must_use]
pub struct Session {
    role: UserRole,
    token: Option<String>,
    profile: OnceCell<Profile>,
}

impl Session {
    pub fn anonymous(role: UserRole) -> Self {
        Self {
            role,
            token: None,
            profile: OnceCell::new(),
        }
    }

    pub fn with_token(role: UserRole, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::anonymous(role)
        }
    }

    /// Picks up the token a previous login left in `store` for `role`.
    pub fn initialize(role: UserRole, store: &LocalStore) -> Self {
        match store.get(&role.auth_token_key()) {
            Some(token) => {
                debug!(%role, "restored stored token");
                Self::with_token(role, token)
            }
            None => Self::anonymous(role),
        }
    }

    pub async fn login_with_token(
        self,
        store: &mut LocalStore,
        token: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let token = token.into();
        store.set(self.role.auth_token_key(), token.clone()).await?;
        info!(role = %self.role, "signed in");
        Ok(Self::with_token(self.role, token))
    }

    /// Forgets the token in memory and in `store`.
    pub async fn teardown(self, store: &mut LocalStore) -> Result<(), StoreError> {
        store.remove(&self.role.auth_token_key()).await?;
        info!(role = %self.role, "signed out");
        Ok(())
    }

    #[must_use]
    pub const fn role(&self) -> UserRole {
        self.role
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn bearer_token(&self) -> Result<&str, ClientError> {
        self.token
            .as_deref()
            .ok_or(ClientError::NotAuthenticated(self.role))
    }

    /// Fetched on first use, then served from this session.
    pub async fn profile<T: Transport>(
        &self,
        api: &BookingApi<T>,
    ) -> Result<&Profile, ClientError> {
        let token = self.bearer_token()?;
        self.profile
            .get_or_try_init(|| async { api.profile(token, self.role).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::profile_path;
    use crate::model::RecordId;
    use crate::testing::{MockReply, MockTransport};

    const PROFILE: &str = r#"{"data":{"id":3,"name":"陳太","students":[{"id":10,"name":"小明","grade":"5"},{"id":11,"name":"小明","grade":null}]}}"#;

    #[tokio::test]
    async fn profile_is_fetched_once_per_session() {
        let transport = MockTransport::default();
        transport.reply(profile_path(UserRole::Student), MockReply::ok(PROFILE));
        transport.reply(profile_path(UserRole::Student), MockReply::ok(PROFILE));
        let api = BookingApi::new(transport);

        let session = Session::with_token(UserRole::Student, "abc");
        let first = session.profile(&api).await.unwrap().clone();
        let second = session.profile(&api).await.unwrap();
        assert_eq!(&first, second);
        assert_eq!(api.transport().requests().len(), 1);

        // a fresh session does not see the previous session's profile
        let other = Session::with_token(UserRole::Student, "abc");
        other.profile(&api).await.unwrap();
        assert_eq!(api.transport().requests().len(), 2);
    }

    #[tokio::test]
    async fn students_with_the_same_name_stay_distinct() {
        let transport = MockTransport::default();
        transport.reply(profile_path(UserRole::Student), MockReply::ok(PROFILE));
        let api = BookingApi::new(transport);
        let session = Session::with_token(UserRole::Student, "abc");

        let profile = session.profile(&api).await.unwrap();
        let graded = profile.student(&RecordId::Number(10)).unwrap();
        let ungraded = profile.student(&RecordId::Number(11)).unwrap();
        assert_eq!(graded.name, ungraded.name);
        assert!(graded.is_graded());
        assert!(!ungraded.is_graded());
    }

    #[tokio::test]
    async fn anonymous_sessions_never_reach_the_network() {
        let api = BookingApi::new(MockTransport::default());
        let session = Session::anonymous(UserRole::Teacher);

        let error = session.profile(&api).await.unwrap_err();
        assert!(matches!(error, ClientError::NotAuthenticated(UserRole::Teacher)));
        assert!(api.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn login_and_teardown_round_trip_through_the_store() {
        let mut store = LocalStore::in_memory();
        store.set("teacher_auth_token", "other-role").await.unwrap();

        let session = Session::initialize(UserRole::Student, &store);
        assert!(!session.is_authenticated());

        let session = session.login_with_token(&mut store, "student-token").await.unwrap();
        assert_eq!(session.bearer_token().unwrap(), "student-token");
        assert_eq!(store.get("student_auth_token"), Some("student-token"));

        let restored = Session::initialize(UserRole::Student, &store);
        assert_eq!(restored.bearer_token().unwrap(), "student-token");

        restored.teardown(&mut store).await.unwrap();
        assert_eq!(store.get("student_auth_token"), None);
        assert_eq!(store.get("teacher_auth_token"), Some("other-role"));
    }
}
