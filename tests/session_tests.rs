mod common;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use linkdrop::links::{LinkError, ShareRequest};
use linkdrop::storage::StorageLayout;

use common::{seed_upload, test_state, test_state_with_entropy, Stuck, Stutter};

fn share(filename: &str) -> ShareRequest {
    ShareRequest {
        filename: filename.to_string(),
        short_link: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn share_copies_upload_into_a_new_session() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    seed_upload(&state, "summary.txt", b"all good").await;

    let outcome = state.sessions.share(share("summary.txt")).await.unwrap();
    assert_eq!(outcome.filename, "summary.txt");
    assert_eq!(
        outcome.download_url,
        format!("{}/{}/summary.txt", common::BASE_URL, outcome.session_id)
    );
    let short_url = outcome.short_url.expect("short link requested");
    let key = short_url.rsplit('/').next().unwrap();
    assert_eq!(key.len(), 8);

    let by_key = state.resolver.resolve_short(key).await.unwrap();
    assert_eq!(by_key.display_name, "summary.txt");
    assert_eq!(by_key.size, 8);

    let session = state.sessions.get(&outcome.session_id).await.unwrap();
    assert!(session.files[0].stored_path.starts_with(&format!("sessions/{}/", session.id)));
}

#[tokio::test]
async fn share_into_existing_session_appends() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    seed_upload(&state, "a.txt", b"a").await;
    seed_upload(&state, "b.txt", b"bb").await;

    let first = state.sessions.share(share("a.txt")).await.unwrap();
    let second = state
        .sessions
        .share(ShareRequest {
            session_id: Some(first.session_id.clone()),
            short_link: false,
            ..share("b.txt")
        })
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert!(second.short_url.is_none());

    let links = state.sessions.get_links(&first.session_id).await.unwrap();
    let names: Vec<&str> = links.iter().map(|l| l.display_name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert!(links[0].short_url.is_some());
    assert!(links[1].short_url.is_none());

    // Same name twice in one session is refused.
    let err = state
        .sessions
        .share(ShareRequest {
            session_id: Some(first.session_id.clone()),
            ..share("a.txt")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::DuplicateFile(name) if name == "a.txt"));
}

#[tokio::test]
async fn share_reports_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    let err = state.sessions.share(share("ghost.txt")).await.unwrap_err();
    assert!(matches!(err, LinkError::NotFound(_)));
    assert!(state.sessions.list().await.is_empty());

    let err = state.sessions.share(share("../../etc")).await.unwrap_err();
    assert!(matches!(err, LinkError::NotFound(_)));
}

#[tokio::test]
async fn share_content_writes_into_shared_dir() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    let outcome = state
        .sessions
        .share_content("report.md", b"# Report", ShareRequest::default())
        .await
        .unwrap();
    let written: Vec<String> = std::fs::read_dir(state.layout.shared_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(written.len(), 1);
    assert!(written[0].ends_with("_report.md"));

    let file = state
        .resolver
        .resolve_session_file(&outcome.session_id, "report.md")
        .await
        .unwrap();
    assert_eq!(file.size, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_share_content_with_same_name_keeps_each_body() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    let mut handles = Vec::new();
    for i in 0..64 {
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            let body = format!("body number {i}");
            let outcome = state
                .sessions
                .share_content("same.txt", body.as_bytes(), ShareRequest::default())
                .await;
            (body, outcome)
        }));
    }

    let mut sessions = HashSet::new();
    for handle in handles {
        let (body, outcome) = handle.await.unwrap();
        let outcome = outcome.unwrap();
        assert_eq!(outcome.filename, "same.txt");
        assert!(sessions.insert(outcome.session_id.clone()));

        let file = state
            .resolver
            .resolve_session_file(&outcome.session_id, "same.txt")
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&file.stored_path).await.unwrap(), body.as_bytes());
    }
    assert_eq!(sessions.len(), 64);
}

#[tokio::test]
async fn failed_session_directory_leaves_no_row() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    // A plain file where the sessions directory should be.
    let sessions_root = state.layout.root().join("sessions");
    std::fs::remove_dir_all(&sessions_root).unwrap();
    std::fs::write(&sessions_root, b"not a directory").unwrap();

    let err = state.sessions.create(Duration::hours(1), None).await.unwrap_err();
    assert!(matches!(err, LinkError::Io(_)));
    assert!(state.sessions.list().await.is_empty());
    assert!(state.store.sessions.is_empty().await);
}

#[tokio::test]
async fn add_file_validates_input() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let session = state.sessions.create(Duration::hours(1), None).await.unwrap();

    assert!(matches!(
        state.sessions.add_file(&session.id, "uploads/x", "///").await,
        Err(LinkError::InvalidName(_))
    ));
    assert!(matches!(
        state.sessions.add_file(&session.id, "../outside", "x.txt").await,
        Err(LinkError::InvalidPath(_))
    ));
    assert!(matches!(
        state.sessions.add_file("no-such-session", "uploads/x", "x.txt").await,
        Err(LinkError::NotFound(_))
    ));

    let file = state
        .sessions
        .add_file(&session.id, "uploads/x", "my report.pdf")
        .await
        .unwrap();
    assert_eq!(file.display_name, "my_report.pdf");
}

#[tokio::test]
async fn expired_session_is_gone_everywhere() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    seed_upload(&state, "late.txt", b"late").await;
    let outcome = state.sessions.share(share("late.txt")).await.unwrap();
    let key = outcome.short_url.unwrap().rsplit('/').next().unwrap().to_string();

    let mut stale = state.sessions.get(&outcome.session_id).await.unwrap();
    stale.expires_at = Utc::now() - Duration::seconds(1);
    state.store.sessions.put(stale).await.unwrap();

    assert!(matches!(
        state.resolver.resolve_short(&key).await,
        Err(LinkError::Expired(_))
    ));
    assert!(matches!(
        state.resolver.resolve_session_file(&outcome.session_id, "late.txt").await,
        Err(LinkError::Expired(_))
    ));
    assert!(matches!(
        state.sessions.get_links(&outcome.session_id).await,
        Err(LinkError::Expired(_))
    ));
    assert!(state.sessions.list().await[0].expired);
}

#[tokio::test]
async fn cleanup_removes_exactly_the_expired_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    seed_upload(&state, "doc.txt", b"doc").await;

    let short_lived = state
        .sessions
        .share(ShareRequest {
            ttl: Some(Duration::minutes(1)),
            ..share("doc.txt")
        })
        .await
        .unwrap();
    let long_lived = state
        .sessions
        .share(ShareRequest {
            ttl: Some(Duration::hours(2)),
            ..share("doc.txt")
        })
        .await
        .unwrap();
    let short_dir = state.layout.session_dir(&short_lived.session_id).unwrap();
    assert!(short_dir.exists());

    let later = Utc::now() + Duration::minutes(30);
    assert_eq!(state.sessions.cleanup(later).await.unwrap(), 1);
    assert!(!short_dir.exists());
    assert!(matches!(
        state.sessions.get(&short_lived.session_id).await,
        Err(LinkError::NotFound(_))
    ));

    let key = short_lived.short_url.unwrap().rsplit('/').next().unwrap().to_string();
    assert!(matches!(
        state.resolver.resolve_short(&key).await,
        Err(LinkError::NotFound(_))
    ));

    let kept = state
        .resolver
        .resolve_session_file(&long_lived.session_id, "doc.txt")
        .await
        .unwrap();
    assert_eq!(kept.size, 3);

    // The source upload is not part of any session.
    assert!(state.layout.uploads_dir().join("doc.txt").exists());

    // Idempotent.
    assert_eq!(state.sessions.cleanup(later).await.unwrap(), 0);
}

#[tokio::test]
async fn concurrent_short_links_are_unique() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state_with_entropy(&dir, Arc::new(Stutter::new()));

    let mut session_ids = Vec::new();
    for _ in 0..10 {
        let session = state.sessions.create(Duration::hours(1), None).await.unwrap();
        let blob = StorageLayout::session_key(&session.id, "blob");
        state
            .sessions
            .add_file(&session.id, &blob, "data.bin")
            .await
            .unwrap();
        session_ids.push(session.id);
    }

    let mut handles = Vec::new();
    for i in 0..1000 {
        let state = Arc::clone(&state);
        let id = session_ids[i % session_ids.len()].clone();
        handles.push(tokio::spawn(async move {
            state.sessions.create_short_link(&id, "data.bin").await
        }));
    }

    let mut keys = HashSet::new();
    for handle in handles {
        let key = handle.await.unwrap().unwrap();
        assert!(!session_ids.contains(&key));
        assert!(keys.insert(key), "duplicate short key");
    }
    assert_eq!(keys.len(), 1000);

    let total: usize = state
        .sessions
        .list()
        .await
        .iter()
        .map(|view| view.session.short_links.len())
        .sum();
    assert_eq!(total, 1000);
}

#[tokio::test]
async fn stuck_entropy_cannot_mint_second_short_link() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state_with_entropy(&dir, Arc::new(Stuck));
    let session = state.sessions.create(Duration::hours(1), None).await.unwrap();
    let blob = StorageLayout::session_key(&session.id, "blob");
    state.sessions.add_file(&session.id, &blob, "a.txt").await.unwrap();

    state.sessions.create_short_link(&session.id, "a.txt").await.unwrap();
    let err = state
        .sessions
        .create_short_link(&session.id, "a.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::IdentifierCollision { .. }));
    assert_eq!(state.sessions.get(&session.id).await.unwrap().short_links.len(), 1);
}
