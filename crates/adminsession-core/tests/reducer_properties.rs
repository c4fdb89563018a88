use adminsession_core::{Action, Credential, Identity, Role, Session};
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use proptest::test_runner::Config;

fn identity_strategy() -> impl Strategy<Value = Identity> {
    (1_i64..1000, "[a-z]{1,12}", prop_oneof![Just(Role::Admin), Just(Role::SuperAdmin)]).prop_map(
        |(id, username, role)| Identity {
            id,
            email: format!("{}@example.com", username),
            username,
            role,
            avatar_url: None,
            last_login_at: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        },
    )
}

fn credential_strategy() -> impl Strategy<Value = Credential> {
    "[A-Za-z0-9]{1,24}".prop_map(Credential::new)
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::LoginStart),
        (identity_strategy(), credential_strategy())
            .prop_map(|(identity, credential)| Action::LoginSuccess { identity, credential }),
        "[a-z ]{0,20}".prop_map(Action::LoginFailure),
        Just(Action::Logout),
        identity_strategy().prop_map(Action::SetIdentity),
        any::<bool>().prop_map(Action::SetLoading),
        credential_strategy().prop_map(Action::ReplaceCredential),
    ]
}

fn holds_invariant(session: &Session) -> bool {
    session.authenticated == (session.identity.is_some() && session.credential.is_some())
}

proptest! {
    #![proptest_config(Config::with_cases(256))]

    #[test]
    fn authenticated_iff_identity_and_credential(actions in prop::collection::vec(action_strategy(), 0..40)) {
        let mut session = Session::default();
        prop_assert!(holds_invariant(&session));
        for action in actions {
            session = session.apply(action);
            prop_assert!(holds_invariant(&session), "violated by {:?}", session);
        }
    }

    #[test]
    fn logout_is_idempotent(actions in prop::collection::vec(action_strategy(), 0..20)) {
        let session = actions
            .into_iter()
            .fold(Session::default(), |session, action| session.apply(action));
        let once = session.apply(Action::Logout);
        let twice = once.apply(Action::Logout);
        prop_assert_eq!(&once, &twice);
        prop_assert!(!once.authenticated);
        prop_assert!(!once.loading);
    }

    #[test]
    fn set_identity_never_changes_authentication(
        actions in prop::collection::vec(action_strategy(), 0..20),
        identity in identity_strategy(),
    ) {
        let session = actions
            .into_iter()
            .fold(Session::default(), |session, action| session.apply(action));
        let updated = session.apply(Action::SetIdentity(identity));
        prop_assert_eq!(updated.authenticated, session.authenticated);
        prop_assert_eq!(&updated.credential, &session.credential);
    }
}
