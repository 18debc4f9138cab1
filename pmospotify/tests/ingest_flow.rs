mod common;

use common::{FakeRenderer, FakeSpotify, interleaved_collection, playlist_entry};
use pmospotify::{
    FsInstanceStore, InstanceId, InstanceStore, MemoryInstanceStore, PlaylistDescriptor,
    ReportSessions, SpotifyError, SpotifySettings, TokenSet,
};
use std::sync::Arc;

async fn authorized(store: &dyn InstanceStore, raw: &str) -> anyhow::Result<InstanceId> {
    let id = InstanceId::from_raw(raw);
    store.create(&id, "verifier").await?;
    let mut tokens = TokenSet::new();
    tokens.insert("access_token".into(), "access-1".into());
    store.set_tokens(&id, tokens).await?;
    Ok(id)
}

fn sessions(
    store: Arc<dyn InstanceStore>,
    service: FakeSpotify,
    broken: Option<usize>,
) -> ReportSessions {
    ReportSessions::new(
        &SpotifySettings::default(),
        store,
        Arc::new(service),
        Arc::new(FakeRenderer { broken }),
    )
}

#[tokio::test]
async fn ingest_requires_authorization() -> anyhow::Result<()> {
    let store = Arc::new(MemoryInstanceStore::new());
    let id = InstanceId::from_raw("1_pending");
    store.create(&id, "verifier").await?;

    let sessions = sessions(store, FakeSpotify::new(), None);
    let err = sessions.ingest(&id).await.unwrap_err();
    assert!(matches!(err, SpotifyError::NotAuthorized(_)));

    let err = sessions
        .ingest(&InstanceId::from_raw("9_gone"))
        .await
        .unwrap_err();
    assert!(err.is_instance_not_found());

    Ok(())
}

#[tokio::test]
async fn ingest_writes_twenty_playlists_in_source_order() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(FsInstanceStore::new(dir.path())?);
    let id = authorized(store.as_ref(), "1_abcdef").await?;

    let service = FakeSpotify::new().with_playlists(interleaved_collection());
    let sessions = sessions(store.clone(), service, None);

    let report = sessions.ingest(&id).await?;
    assert_eq!(report.selected, 20);
    assert_eq!(report.rendered, (0..20).collect::<Vec<usize>>());
    assert!(report.failed.is_empty());

    let descriptors: Vec<PlaylistDescriptor> =
        serde_json::from_slice(&store.read_artifact(&id, "data/playlist_data.json").await?)?;
    assert_eq!(descriptors.len(), 20);
    for (n, descriptor) in descriptors.iter().enumerate() {
        assert_eq!(descriptor.link_id, format!("ok{}", n));
        assert_eq!(descriptor.playlist_number, n);
        assert!(!descriptor.link_id.starts_with("curated"));
    }

    let instance_dir = dir.path().join(id.as_str());
    for file in ["data.json", "playlist_image.png", "graph.jpg", "final_heading.jpg"] {
        assert!(instance_dir.join("playlist19").join(file).is_file(), "{}", file);
    }
    assert!(!instance_dir.join("playlist20").exists());

    Ok(())
}

#[tokio::test]
async fn failed_playlists_are_skipped() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(FsInstanceStore::new(dir.path())?);
    let id = authorized(store.as_ref(), "3_xyz").await?;

    let items: Vec<_> = (0..12)
        .map(|i| playlist_entry(&format!("p{}", i), "alice", 5))
        .collect();
    let service = FakeSpotify::new()
        .with_playlists(items)
        .with_missing_detail("p4");
    let sessions = sessions(store.clone(), service, Some(7));

    let report = sessions.ingest(&id).await?;
    assert_eq!(report.selected, 12);
    assert_eq!(report.failed, vec![4, 7]);
    assert_eq!(report.rendered.len(), 10);

    let paths = sessions.list_rendered_artifact_paths(&id).await?;
    let expected: Vec<String> = [0, 1, 2, 3, 5, 6, 8, 9, 10, 11]
        .iter()
        .map(|n| format!("3_xyz/playlist{}", n))
        .collect();
    assert_eq!(paths, expected);
    assert!(!dir.path().join("3_xyz").join("escape.jpg").exists());

    Ok(())
}

#[tokio::test]
async fn fewer_qualifying_playlists_are_all_kept() -> anyhow::Result<()> {
    let store = Arc::new(MemoryInstanceStore::new());
    let id = authorized(store.as_ref(), "1_few").await?;

    let items = vec![
        playlist_entry("a", "alice", 4),
        playlist_entry("b", "alice", 3),
        playlist_entry("c", "Spotify", 50),
        playlist_entry("d", "bob", 30),
    ];
    let sessions = sessions(store.clone(), FakeSpotify::new().with_playlists(items), None);

    let report = sessions.ingest(&id).await?;
    assert_eq!(report.selected, 2);
    assert_eq!(
        sessions.list_rendered_artifact_paths(&id).await?,
        vec!["1_few/playlist0".to_string(), "1_few/playlist1".to_string()]
    );

    Ok(())
}

#[tokio::test]
async fn collection_failure_is_archived() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(FsInstanceStore::new(dir.path())?);
    let id = authorized(store.as_ref(), "2_expired").await?;

    let body = r#"{"error":{"status":401,"message":"The access token expired"}}"#;
    let service = FakeSpotify::new().with_playlists_response(401, body);
    let sessions = sessions(store.clone(), service, None);

    let err = sessions.ingest(&id).await.unwrap_err();
    assert!(matches!(err, SpotifyError::PlaylistFetchFailed { .. }));
    assert_eq!(store.read_artifact(&id, "data/error.json").await?, body.as_bytes());
    assert!(sessions.list_rendered_artifact_paths(&id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn collection_transport_error_is_archived() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(FsInstanceStore::new(dir.path())?);
    let id = authorized(store.as_ref(), "2_timeout").await?;

    let sessions = sessions(store.clone(), FakeSpotify::new().with_transport_failure(), None);

    let err = sessions.ingest(&id).await.unwrap_err();
    assert!(matches!(err, SpotifyError::PlaylistFetchFailed { .. }));

    let diagnostic: serde_json::Value =
        serde_json::from_slice(&store.read_artifact(&id, "data/error.json").await?)?;
    assert_eq!(diagnostic["error"], "transport_error");
    assert!(
        diagnostic["error_description"]
            .as_str()
            .unwrap()
            .contains("timed out")
    );
    assert!(!dir.path().join("2_timeout").join("playlist0").exists());

    Ok(())
}

#[tokio::test]
async fn ingest_after_eviction_leaves_no_trace() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(FsInstanceStore::new(dir.path())?);
    let id = authorized(store.as_ref(), "1_evicted").await?;
    store.delete(&id).await?;

    let sessions = sessions(
        store.clone(),
        FakeSpotify::new().with_playlists(interleaved_collection()),
        None,
    );
    assert!(sessions.ingest(&id).await.unwrap_err().is_instance_not_found());
    assert!(!dir.path().join(id.as_str()).exists());

    Ok(())
}
