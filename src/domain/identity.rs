use super::ids::UserId;

/// The signed-in member on whose behalf a room session publishes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatIdentity {
    pub email: String,
    pub user_id: Option<UserId>,
}

impl ChatIdentity {
    pub fn new(email: impl Into<String>, user_id: Option<UserId>) -> Self {
        Self {
            email: email.into(),
            user_id,
        }
    }

    /// Messages without a sender, or seen before the local user id is
    /// known, count as someone else's.
    pub fn is_sender(&self, sender_id: Option<UserId>) -> bool {
        self.user_id.is_some() && self.user_id == sender_id
    }

    pub fn is_own_email(&self, email: Option<&str>) -> bool {
        email == Some(self.email.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_local_user_never_matches() {
        let identity = ChatIdentity::new("me@itda.kr", None);

        assert!(!identity.is_sender(None));
        assert!(!identity.is_sender(Some(UserId(1))));
    }

    #[test]
    fn matches_same_user_id() {
        let identity = ChatIdentity::new("me@itda.kr", Some(UserId(1)));

        assert!(identity.is_sender(Some(UserId(1))));
        assert!(!identity.is_sender(Some(UserId(2))));
    }

    #[test]
    fn email_comparison_is_exact() {
        let identity = ChatIdentity::new("me@itda.kr", None);

        assert!(identity.is_own_email(Some("me@itda.kr")));
        assert!(!identity.is_own_email(Some("other@itda.kr")));
        assert!(!identity.is_own_email(None));
    }
}
