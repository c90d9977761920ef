use accountgate::{
    repositories::SqliteUserRepository,
    services::{
        user_service::{
            CreateUserRequest, RegisterRequest, RehashReport, UserService, UserServiceError,
            VerificationOutcome,
        },
        EmailTokenSigner, MockEmailService, EMAIL_CONFIRM_MAX_AGE,
    },
    test_utils::test_helpers,
};
use std::sync::Arc;

fn user_service(pool: sqlx::SqlitePool) -> (UserService, Arc<MockEmailService>) {
    let outbox = Arc::new(MockEmailService::new());
    let service = UserService::new(
        Arc::new(SqliteUserRepository::new(pool)),
        Arc::new(EmailTokenSigner::new(test_helpers::TEST_SECRET_KEY)),
        outbox.clone(),
        test_helpers::TEST_BASE_URL,
    );
    (service, outbox)
}

fn token_from_body(body: &str) -> String {
    let marker = "/verify_email/";
    let start = body.find(marker).expect("body should contain a link") + marker.len();
    body[start..].trim().to_string()
}

fn register_request(email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: password.to_string(),
        password_confirm: None,
    }
}

#[tokio::test]
async fn test_create_user_success() {
    // Create isolated test database
    let pool = test_helpers::create_test_db().await.unwrap();
    let (service, outbox) = user_service(pool);

    let user = service
        .create_user(CreateUserRequest {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
            email_verified: false,
            is_admin: false,
        })
        .await
        .unwrap();

    assert_eq!(user.email, "test@example.com");
    assert!(!user.email_verified);
    assert!(user.password_hash.starts_with("$argon2"));
    // Operator-created accounts are not mailed
    assert!(outbox.sent().is_empty());
}

#[tokio::test]
async fn test_create_user_duplicate_email() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (service, _) = user_service(pool);

    let request = |password: &str| CreateUserRequest {
        email: "duplicate@example.com".to_string(),
        password: password.to_string(),
        email_verified: false,
        is_admin: false,
    };

    service.create_user(request("password123")).await.unwrap();

    let result = service.create_user(request("password456")).await;
    assert!(matches!(result, Err(UserServiceError::DuplicateEmail)));
}

#[tokio::test]
async fn test_register_sends_working_link() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (service, outbox) = user_service(pool);

    let user = service
        .register(register_request("a@x.com", "pw1"))
        .await
        .unwrap();
    assert!(!user.email_verified);

    let mail = outbox.last_sent_to("a@x.com").expect("mail to be sent");
    assert_eq!(mail.subject, "Verify Your Email");
    assert!(mail
        .body
        .starts_with("Click the link to verify your email: http://localhost:8080/verify_email/"));

    let outcome = service
        .verify_email(&token_from_body(&mail.body))
        .await
        .unwrap();
    match outcome {
        VerificationOutcome::Verified(verified) => {
            assert_eq!(verified.id, user.id);
            assert!(verified.email_verified);
        }
        other => panic!("expected Verified, got {:?}", other),
    }

    let stored = service.find_user_by_id(user.id).await.unwrap().unwrap();
    assert!(stored.email_verified);
}

#[tokio::test]
async fn test_register_duplicate_keeps_first_account() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (service, outbox) = user_service(pool);

    let first = service
        .register(register_request("a@x.com", "pw1"))
        .await
        .unwrap();

    let result = service.register(register_request("A@X.com", "pw2")).await;
    assert!(matches!(result, Err(UserServiceError::DuplicateEmail)));

    let stored = service
        .find_user_by_email("a@x.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, first.id);
    assert_eq!(stored.password_hash, first.password_hash);
    assert_eq!(outbox.sent().len(), 1);
}

#[tokio::test]
async fn test_register_validation() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (service, outbox) = user_service(pool);

    let no_at = service.register(register_request("not-an-email", "pw1")).await;
    assert!(matches!(no_at, Err(UserServiceError::InvalidEmail)));

    let empty = service.register(register_request("", "pw1")).await;
    assert!(matches!(empty, Err(UserServiceError::InvalidEmail)));

    let no_password = service.register(register_request("a@x.com", "")).await;
    assert!(matches!(no_password, Err(UserServiceError::MissingPassword)));

    let mismatch = service
        .register(RegisterRequest {
            email: "a@x.com".to_string(),
            password: "pw1".to_string(),
            password_confirm: Some("pw2".to_string()),
        })
        .await;
    assert!(matches!(mismatch, Err(UserServiceError::PasswordMismatch)));

    assert!(outbox.sent().is_empty());
    assert!(service.list_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_verify_twice_is_idempotent() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (service, outbox) = user_service(pool);

    service
        .register(register_request("a@x.com", "pw1"))
        .await
        .unwrap();
    let token = token_from_body(&outbox.last_sent_to("a@x.com").unwrap().body);

    assert!(matches!(
        service.verify_email(&token).await.unwrap(),
        VerificationOutcome::Verified(_)
    ));
    assert!(matches!(
        service.verify_email(&token).await.unwrap(),
        VerificationOutcome::AlreadyVerified(_)
    ));
}

#[tokio::test]
async fn test_verify_rejects_expired_and_foreign_tokens() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (service, _) = user_service(pool.clone());
    test_helpers::insert_test_user(&pool, "a@x.com", "pw1", false, false)
        .await
        .unwrap();

    let signer = EmailTokenSigner::new(test_helpers::TEST_SECRET_KEY);
    let issued = chrono::Utc::now().timestamp() - EMAIL_CONFIRM_MAX_AGE - 1;
    let expired = signer.issue_at("a@x.com", issued).unwrap();
    assert!(matches!(
        service.verify_email(&expired).await,
        Err(UserServiceError::InvalidOrExpiredToken)
    ));

    let foreign = EmailTokenSigner::new("some-other-deployment-key")
        .issue("a@x.com")
        .unwrap();
    assert!(matches!(
        service.verify_email(&foreign).await,
        Err(UserServiceError::InvalidOrExpiredToken)
    ));

    let unknown_user = signer.issue("ghost@x.com").unwrap();
    assert!(matches!(
        service.verify_email(&unknown_user).await,
        Err(UserServiceError::InvalidOrExpiredToken)
    ));

    let stored = service.find_user_by_email("a@x.com").await.unwrap().unwrap();
    assert!(!stored.email_verified);
}

#[tokio::test]
async fn test_resend_only_for_unverified_accounts() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (service, outbox) = user_service(pool.clone());
    test_helpers::insert_test_user(&pool, "pending@x.com", "pw1", false, false)
        .await
        .unwrap();
    test_helpers::insert_test_user(&pool, "done@x.com", "pw1", true, false)
        .await
        .unwrap();

    assert!(service.resend_verification("pending@x.com").await.unwrap());
    assert!(!service.resend_verification("done@x.com").await.unwrap());
    assert!(!service.resend_verification("nobody@x.com").await.unwrap());

    assert_eq!(outbox.sent().len(), 1);
    let token = token_from_body(&outbox.last_sent_to("pending@x.com").unwrap().body);
    assert!(matches!(
        service.verify_email(&token).await.unwrap(),
        VerificationOutcome::Verified(_)
    ));
}

#[tokio::test]
async fn test_update_password() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (service, _) = user_service(pool.clone());
    test_helpers::insert_test_user(&pool, "update@example.com", "oldpassword", true, false)
        .await
        .unwrap();

    service
        .update_password("update@example.com", "newpassword456")
        .await
        .unwrap();

    let user = service
        .find_user_by_email("update@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(accountgate::services::password::verify_password(
        "newpassword456",
        &user.password_hash
    ));

    let missing = service.update_password("nobody@example.com", "pw").await;
    assert!(matches!(missing, Err(UserServiceError::UserNotFound)));
}

#[tokio::test]
async fn test_set_admin_and_list_users() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (service, _) = user_service(pool.clone());
    test_helpers::insert_test_user(&pool, "first@example.com", "pw", true, false)
        .await
        .unwrap();
    test_helpers::insert_test_user(&pool, "second@example.com", "pw", false, false)
        .await
        .unwrap();

    let admin = service.set_admin("first@example.com", true).await.unwrap();
    assert!(admin.is_admin);

    let users = service.list_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].email, "first@example.com");
    assert!(users[0].is_admin);
    assert!(!users[1].is_admin);

    let revoked = service.set_admin("first@example.com", false).await.unwrap();
    assert!(!revoked.is_admin);
}

#[tokio::test]
async fn test_mark_verified() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (service, _) = user_service(pool.clone());
    test_helpers::insert_test_user(&pool, "cli@example.com", "pw", false, false)
        .await
        .unwrap();

    assert!(matches!(
        service.mark_verified("cli@example.com").await.unwrap(),
        VerificationOutcome::Verified(_)
    ));
    assert!(matches!(
        service.mark_verified("cli@example.com").await.unwrap(),
        VerificationOutcome::AlreadyVerified(_)
    ));
}

#[tokio::test]
async fn test_rehash_legacy_passwords() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let (service, _) = user_service(pool.clone());

    test_helpers::insert_raw_user(&pool, "plain@example.com", "pw1", true, false)
        .await
        .unwrap();
    test_helpers::insert_test_user(&pool, "hashed@example.com", "pw2", true, false)
        .await
        .unwrap();
    let bcrypt = "$2b$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW";
    test_helpers::insert_raw_user(&pool, "bcrypt@example.com", bcrypt, true, false)
        .await
        .unwrap();

    let hashed_before = service
        .find_user_by_email("hashed@example.com")
        .await
        .unwrap()
        .unwrap()
        .password_hash;

    let report = service.rehash_legacy_passwords().await.unwrap();
    assert_eq!(
        report,
        RehashReport {
            rehashed: 1,
            already_hashed: 1,
            skipped_bcrypt: 1,
        }
    );

    let plain = service
        .find_user_by_email("plain@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(accountgate::services::password::verify_password(
        "pw1",
        &plain.password_hash
    ));

    let hashed_after = service
        .find_user_by_email("hashed@example.com")
        .await
        .unwrap()
        .unwrap()
        .password_hash;
    assert_eq!(hashed_before, hashed_after);

    let untouched = service
        .find_user_by_email("bcrypt@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.password_hash, bcrypt);

    // A second run has nothing left to do
    let again = service.rehash_legacy_passwords().await.unwrap();
    assert_eq!(again.rehashed, 0);
    assert_eq!(again.already_hashed, 2);
}
