use std::sync::Arc;
use std::time::Duration;

use menagerie::identity::{
    AuthProvider, LocalAuthProvider, LoginRequest, ManualClock, MemorySessionStore, Principal, SessionStore, SharedSessionStore,
};
use menagerie::repository::{DocumentUserRepository, UserRepository};
use menagerie::security::ensure_default_admin;
use menagerie::storage::MemoryStore;

#[test]
fn session_lives_exactly_one_ttl() {
    for ttl_secs in [1u64, 60, 3600] {
        let ttl = Duration::from_secs(ttl_secs);
        let clock = Arc::new(ManualClock::default());
        let store = MemorySessionStore::with_clock(ttl, clock.clone());
        let s = store.issue(Principal::new("admin")).unwrap();
        assert_eq!(store.validate(&s.session_id), Some(Principal::new("admin")));

        clock.advance(ttl - Duration::from_millis(1));
        assert!(store.validate(&s.session_id).is_some(), "still valid just before ttl={}s", ttl_secs);

        clock.advance(Duration::from_millis(1));
        assert!(store.validate(&s.session_id).is_none(), "expired at ttl={}s", ttl_secs);
    }
}

#[test]
fn unknown_tokens_never_validate() {
    let store = MemorySessionStore::default();
    assert!(store.validate("").is_none());
    assert!(store.validate("not-a-session").is_none());
    assert!(!store.revoke("not-a-session"));
}

#[test]
fn concurrent_issue_and_validate() {
    let store: SharedSessionStore = Arc::new(MemorySessionStore::default());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || {
                (0..50)
                    .map(|_| store.issue(Principal::new("admin")).unwrap().session_id)
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let mut all = Vec::new();
    for h in handles { all.extend(h.join().unwrap()); }
    for sid in &all { assert!(store.validate(sid).is_some()); }
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 400);
}

async fn provider(password: &str) -> (LocalAuthProvider, SharedSessionStore) {
    let store = Arc::new(MemoryStore::new());
    let users: Arc<dyn UserRepository> = Arc::new(DocumentUserRepository::new(store));
    ensure_default_admin(users.as_ref(), Some(password)).await.unwrap();
    let sessions: SharedSessionStore = Arc::new(MemorySessionStore::default());
    (LocalAuthProvider::new(users, sessions.clone()), sessions)
}

fn creds(username: &str, password: &str) -> LoginRequest {
    LoginRequest { username: username.to_string(), password: password.to_string() }
}

#[tokio::test]
async fn login_issues_session_and_logout_revokes_it() {
    let (auth, sessions) = provider("hunter2").await;
    let resp = auth.login(&creds("admin", "hunter2")).await.unwrap();
    let sid = resp.session.session_id;
    assert_eq!(sessions.validate(&sid), Some(Principal::new("admin")));

    auth.logout(&sid);
    assert!(sessions.validate(&sid).is_none());
    // second logout is harmless
    auth.logout(&sid);
}

#[tokio::test]
async fn bad_credentials_are_auth_errors() {
    let (auth, _) = provider("hunter2").await;
    let wrong_pw = auth.login(&creds("admin", "nope")).await.unwrap_err();
    assert_eq!(wrong_pw.http_status(), 401);
    let wrong_user = auth.login(&creds("root", "hunter2")).await.unwrap_err();
    assert_eq!(wrong_user.http_status(), 401);
}

#[tokio::test]
async fn admin_bootstrap_resets_ambiguous_user_tables() {
    let store = Arc::new(MemoryStore::new());
    let users = DocumentUserRepository::new(store);

    // nothing stored and no password: refuse to start
    assert!(ensure_default_admin(&users, None).await.is_err());

    ensure_default_admin(&users, Some("first")).await.unwrap();
    assert_eq!(users.list_users().await.unwrap().len(), 1);

    // a single stored user is kept as-is
    ensure_default_admin(&users, Some("second")).await.unwrap();
    let admin = users.get_user("admin").await.unwrap().unwrap();
    assert!(menagerie::security::verify_password(&admin.password, "first"));

    // more than one user: wiped and recreated
    users
        .insert_user(menagerie::repository::User { username: "intruder".into(), password: "x".into() })
        .await
        .unwrap();
    ensure_default_admin(&users, Some("third")).await.unwrap();
    let all = users.list_users().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].username, "admin");
    assert!(menagerie::security::verify_password(&all[0].password, "third"));
}
