use std::sync::Arc;

use axum::body::Bytes;
use futures::stream;
use menagerie::attachments::AttachmentManager;
use menagerie::domain::{Animal, AnimalType};
use menagerie::repository::{AnimalRepository, DocumentAnimalRepository};
use menagerie::storage::MemoryStore;

struct Fixture {
    _tmp: tempfile::TempDir,
    dir: std::path::PathBuf,
    repo: Arc<dyn AnimalRepository>,
    manager: AttachmentManager,
}

fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("images");
    let repo: Arc<dyn AnimalRepository> = Arc::new(DocumentAnimalRepository::new(Arc::new(MemoryStore::new())));
    let manager = AttachmentManager::new(&dir, repo.clone());
    Fixture { _tmp: tmp, dir, repo, manager }
}

fn body(chunks: &[&'static [u8]]) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> {
    stream::iter(chunks.iter().map(|c| Ok(Bytes::from_static(c))).collect::<Vec<_>>())
}

fn files_in(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|rd| rd.flatten().map(|e| e.file_name().to_string_lossy().to_string()).collect())
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn replace_points_at_a_complete_file_and_drops_the_old_one() {
    let f = fixture();
    let animal = f.repo.insert(Animal::new("Rex", AnimalType::Dog)).await.unwrap();
    let id = animal.id_string();

    let first = f.manager.replace(&animal, "rex.png", body(&[b"first ", b"image"])).await.unwrap();
    assert!(first.starts_with("images/") && first.ends_with(".png"));
    let stored = f.repo.get_by_id(&id).await.unwrap();
    assert_eq!(stored.image_url, first);
    assert!(f.manager.exists(&first));
    assert_eq!(std::fs::read(f.manager.resolve(&first).unwrap()).unwrap(), b"first image");

    let second = f.manager.replace(&stored, "rex.jpg", body(&[b"second"])).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(f.repo.get_by_id(&id).await.unwrap().image_url, second);
    assert!(f.manager.exists(&second));
    assert!(!f.manager.exists(&first), "previous image removed");
    assert_eq!(files_in(&f.dir).len(), 1);
}

#[tokio::test]
async fn interrupted_upload_leaves_animal_and_old_image_alone() {
    let f = fixture();
    let animal = f.repo.insert(Animal::new("Tom", AnimalType::Cat)).await.unwrap();
    let first = f.manager.replace(&animal, "tom.png", body(&[b"ok"])).await.unwrap();
    let stored = f.repo.get_by_id(&animal.id_string()).await.unwrap();

    let broken = stream::iter(vec![
        Ok(Bytes::from_static(b"partial")),
        Err(std::io::Error::other("connection reset")),
    ]);
    let err = f.manager.replace(&stored, "tom2.png", broken).await.unwrap_err();
    assert_eq!(err.http_status(), 400);

    assert_eq!(f.repo.get_by_id(&animal.id_string()).await.unwrap().image_url, first);
    assert!(f.manager.exists(&first));
    assert_eq!(files_in(&f.dir).len(), 1, "partial file cleaned up");
}

#[tokio::test]
async fn oversized_upload_is_rejected_and_removed() {
    let f = fixture();
    let manager = AttachmentManager::new(&f.dir, f.repo.clone()).with_max_bytes(8);
    let animal = f.repo.insert(Animal::new("Hen", AnimalType::Chicken)).await.unwrap();

    let err = manager.replace(&animal, "hen.png", body(&[b"0123", b"45678"])).await.unwrap_err();
    assert_eq!(err.http_status(), 400);
    assert!(f.repo.get_by_id(&animal.id_string()).await.unwrap().image_url.is_empty());
    assert!(files_in(&f.dir).is_empty());
}

#[tokio::test]
async fn pointer_failure_removes_the_new_file() {
    let f = fixture();
    let animal = f.repo.insert(Animal::new("Ghost", AnimalType::Dog)).await.unwrap();
    f.repo.delete(&animal.id_string()).await.unwrap();

    let err = f.manager.replace(&animal, "ghost.png", body(&[b"boo"])).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(files_in(&f.dir).is_empty());
}

#[tokio::test]
async fn names_without_extension_are_kept_bare() {
    let f = fixture();
    let animal = f.repo.insert(Animal::new("Rex", AnimalType::Dog)).await.unwrap();
    let url = f.manager.replace(&animal, "blob", body(&[b"x"])).await.unwrap();
    let file = url.strip_prefix("images/").unwrap();
    assert!(file.chars().all(|c| c.is_ascii_digit()));
}
