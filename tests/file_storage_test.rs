use azure_bridge::client::MemoryFileService;
use azure_bridge::{AzureFileStorage, BridgeError, FileEntry, Filesystem, WriteOptions};
use bytes::Bytes;
use std::sync::Arc;

fn storage(service: &MemoryFileService, auto_create: bool) -> AzureFileStorage {
    AzureFileStorage::new(Arc::new(service.clone()), "s1", auto_create)
}

fn paths(entries: &[FileEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.path.as_str()).collect()
}

async fn seeded() -> (MemoryFileService, AzureFileStorage) {
    let service = MemoryFileService::new();
    let fs = storage(&service, true);
    for path in ["docs/a.txt", "docs/sub/b.txt", "top.txt"] {
        fs.write(path, Bytes::from_static(b"abc"), &WriteOptions::default())
            .await
            .unwrap();
    }
    (service, fs)
}

#[tokio::test]
async fn test_write_returns_entry_with_timestamp() {
    let service = MemoryFileService::with_shares(&["s1"]);
    let entry = storage(&service, false)
        .write("/note.md", Bytes::from_static(b"# hi"), &WriteOptions::default())
        .await
        .unwrap();

    assert_eq!(entry.path, "note.md");
    assert_eq!(entry.dirname.as_deref(), Some(""));
    assert!(entry.timestamp.is_some());
    assert_eq!(entry.contents, Some(Bytes::from_static(b"# hi")));
}

#[tokio::test]
async fn test_missing_parent_without_auto_create_is_not_found() {
    let service = MemoryFileService::with_shares(&["s1"]);
    let err = storage(&service, false)
        .write("a/b.txt", Bytes::from_static(b"x"), &WriteOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.error_code(), Some("ParentNotFound"));
}

#[tokio::test]
async fn test_auto_create_tolerates_existing_directories() {
    let (service, fs) = seeded().await;
    fs.write("docs/sub/c.txt", Bytes::from_static(b"x"), &WriteOptions::default())
        .await
        .unwrap();
    fs.write("docs/other/d.txt", Bytes::from_static(b"x"), &WriteOptions::default())
        .await
        .unwrap();
    assert!(service.directory_exists("s1", "docs/other").await);
}

#[tokio::test]
async fn test_listing_joins_names_to_directory() {
    let (_, fs) = seeded().await;

    let entries = fs.list_contents("docs", false).await.unwrap();
    assert_eq!(paths(&entries), vec!["docs/a.txt", "docs/sub"]);
    assert!(entries[0].is_file());
    assert_eq!(entries[0].size, Some(3));
    assert_eq!(entries[0].dirname.as_deref(), Some("docs"));
    assert!(entries[1].is_dir());

    let root = fs.list_contents("/", false).await.unwrap();
    assert_eq!(paths(&root), vec!["docs", "top.txt"]);
}

#[tokio::test]
async fn test_recursive_listing_is_invalid_argument() {
    let (_, fs) = seeded().await;
    let err = fs.list_contents("docs", true).await.unwrap_err();
    assert!(matches!(err, BridgeError::InvalidArgument { .. }));
}

#[tokio::test]
async fn test_create_and_delete_directory() {
    let service = MemoryFileService::with_shares(&["s1"]);
    let fs = storage(&service, false);

    let entry = fs.create_dir("/reports/", &WriteOptions::default()).await.unwrap();
    assert_eq!(entry.path, "reports/");
    assert!(entry.is_dir());
    assert!(service.directory_exists("s1", "reports").await);

    assert!(fs.delete_dir("reports/").await.unwrap());
    assert!(!service.directory_exists("s1", "reports").await);
}

#[tokio::test]
async fn test_delete_non_empty_directory_fails() {
    let (_, fs) = seeded().await;
    let err = fs.delete_dir("docs/sub").await.unwrap_err();
    assert_eq!(err.error_code(), Some("DirectoryNotEmpty"));
}

#[tokio::test]
async fn test_copy_rename_delete_within_share() {
    let (_, fs) = seeded().await;

    assert!(fs.copy("top.txt", "docs/copy.txt").await.unwrap());
    assert!(fs.rename("docs/copy.txt", "docs/moved.txt").await.unwrap());

    assert!(fs.has("docs/moved.txt").await.unwrap());
    assert!(!fs.has("docs/copy.txt").await.unwrap());

    assert!(fs.delete("docs/moved.txt").await.unwrap());
    assert!(!fs.has("docs/moved.txt").await.unwrap());
}

#[tokio::test]
async fn test_read_and_metadata() {
    let (_, fs) = seeded().await;

    let entry = fs.read("docs/a.txt").await.unwrap();
    assert_eq!(entry.contents, Some(Bytes::from_static(b"abc")));
    assert_eq!(entry.mimetype.as_deref(), Some("text/plain"));

    let meta = fs.get_timestamp("docs/a.txt").await.unwrap();
    assert!(meta.timestamp.is_some());
    assert_eq!(meta.size, Some(3));

    assert!(fs.get_metadata("docs/none.txt").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_every_operation_normalizes_paths() {
    let service = MemoryFileService::new();
    let fs = storage(&service, true);
    fs.write("/foo//bar.txt", Bytes::from_static(b"hello"), &WriteOptions::default())
        .await
        .unwrap();

    assert!(fs.has("/foo//bar.txt").await.unwrap());
    let read = fs.read("/foo//bar.txt").await.unwrap();
    assert_eq!(read.path, "foo/bar.txt");
    assert_eq!(read.contents, Some(Bytes::from_static(b"hello")));
    assert_eq!(fs.get_size("foo\\bar.txt").await.unwrap().size, Some(5));

    assert_eq!(paths(&fs.list_contents("/foo", false).await.unwrap()), vec!["foo/bar.txt"]);

    assert!(fs.rename("/foo/bar.txt", "//foo/./moved.txt").await.unwrap());
    assert!(fs.delete("foo//moved.txt").await.unwrap());

    assert!(fs.delete_dir("/foo/").await.unwrap());
    assert!(!service.directory_exists("s1", "foo").await);
}

#[tokio::test]
async fn test_service_rejects_unnormalized_paths() {
    use azure_bridge::domain::ports::FileService;

    let service = MemoryFileService::with_shares(&["s1"]);
    let err = service.get_file_metadata("s1", "/a.txt").await.unwrap_err();
    assert_eq!(err.status_code(), Some(400));
    assert_eq!(err.error_code(), Some("InvalidUri"));
}
