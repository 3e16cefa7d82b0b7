use std::sync::Arc;
use starberry_grant::{
    AccessTokenStorage, AuthorizeCodeStorage, Client, CredentialStore, ErrorKind, MemoryStore, RefreshTokenStorage,
    Request, RequestContext, StoredRequest,
};

fn stored(client: &str) -> StoredRequest {
    Request::new(Arc::new(Client::new(client))).sanitize(&[])
}

#[tokio::test]
async fn test_access_token_sessions() {
    let store = MemoryStore::new();
    let ctx = RequestContext::new();
    let record = stored("c1");
    store.create_access_token_session(&ctx, "sig-a", record.clone()).await.unwrap();
    assert_eq!(store.get_access_token_session(&ctx, "sig-a").await.unwrap(), record);
    assert_eq!(store.access_token_count().await, 1);

    store.delete_access_token_session(&ctx, "sig-a").await.unwrap();
    let err = store.get_access_token_session(&ctx, "sig-a").await.unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_refresh_token_revocation() {
    let store = MemoryStore::new();
    let ctx = RequestContext::new();
    store.create_refresh_token_session(&ctx, "sig-r", stored("c1")).await.unwrap();
    store.revoke_refresh_token(&ctx, "sig-r").await.unwrap();
    let err = store.get_refresh_token_session(&ctx, "sig-r").await.unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_rotation_revokes_grant_access_tokens() {
    let store = MemoryStore::new();
    let ctx = RequestContext::new();
    let grant = stored("c1");
    let unrelated = stored("c1");
    store.create_access_token_session(&ctx, "at-1", grant.clone()).await.unwrap();
    store.create_access_token_session(&ctx, "at-2", unrelated).await.unwrap();
    store.create_refresh_token_session(&ctx, "rt-1", grant.clone()).await.unwrap();

    store.rotate_refresh_token(&ctx, "rt-1", "rt-2", grant.clone()).await.unwrap();
    assert!(store.get_refresh_token_session(&ctx, "rt-1").await.is_err());
    assert_eq!(store.get_refresh_token_session(&ctx, "rt-2").await.unwrap().id, grant.id);
    assert!(store.get_access_token_session(&ctx, "at-1").await.is_err());
    assert!(store.get_access_token_session(&ctx, "at-2").await.is_ok());

    let err = store.rotate_refresh_token(&ctx, "rt-1", "rt-3", grant).await.unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
    assert!(store.get_refresh_token_session(&ctx, "rt-3").await.is_err());
}

#[tokio::test]
async fn test_concurrent_rotation_has_one_winner() {
    let store = Arc::new(MemoryStore::new());
    let ctx = RequestContext::new();
    let grant = stored("c1");
    store.create_refresh_token_session(&ctx, "rt-old", grant.clone()).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let grant = grant.clone();
        tasks.push(tokio::spawn(async move {
            let ctx = RequestContext::new();
            store.rotate_refresh_token(&ctx, "rt-old", &format!("rt-{i}"), grant).await
        }));
    }
    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(store.refresh_token_count().await, 1);
}

#[tokio::test]
async fn test_authorize_codes_are_single_use() {
    let store = MemoryStore::new();
    let ctx = RequestContext::new();
    store.create_authorize_code_session(&ctx, "code-sig", stored("c1")).await.unwrap();
    assert_eq!(store.get_authorize_code_session(&ctx, "code-sig").await.unwrap().client_id, "c1");

    store.invalidate_authorize_code_session(&ctx, "code-sig").await.unwrap();
    assert!(store.get_authorize_code_session(&ctx, "code-sig").await.is_err());
    let err = store.invalidate_authorize_code_session(&ctx, "code-sig").await.unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_credentials() {
    let store = MemoryStore::new().with_user("peter", "pan");
    let ctx = RequestContext::new();
    store.authenticate(&ctx, "peter", "pan").await.unwrap();
    assert!(store.authenticate(&ctx, "peter", "hook").await.unwrap_err().is(ErrorKind::NotFound));
    assert!(store.authenticate(&ctx, "wendy", "pan").await.unwrap_err().is(ErrorKind::NotFound));

    store.add_user("peter", "hook");
    store.authenticate(&ctx, "peter", "hook").await.unwrap();
}
