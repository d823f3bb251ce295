use anyhow::Context;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::photos::derive;
use crate::photos::names::PhotoNames;
use crate::photos::upload::AcceptedUpload;
use crate::storage::StorageClient;
use crate::users::repo_types::User;

/// Stage a validated upload: render the three variants and write them all to
/// storage. Nothing touches the user record here; callers apply the names to
/// the record only after this returns Ok, so a failed write can never leave
/// the record pointing at files that do not exist.
pub async fn stage(
    storage: &dyn StorageClient,
    prefix: &str,
    upload: &AcceptedUpload,
    names: &PhotoNames,
) -> Result<(), ApiError> {
    let variants = derive::render(&upload.image, upload.format)?;
    let content_type = upload.content_type();

    for (name, body) in [
        (&names.photo, variants.original),
        (&names.thumbnail, variants.thumbnail),
        (&names.square, variants.square),
    ] {
        let key = format!("{prefix}{name}");
        storage
            .put_object(&key, body, content_type)
            .await
            .with_context(|| format!("put_object {key}"))?;
    }

    info!(photo = %names.photo, "photo set staged");
    Ok(())
}

/// Point the record at a freshly staged photo set. The three fields always
/// change together.
pub fn apply(user: &mut User, names: &PhotoNames) {
    user.photo = Some(names.photo.clone());
    user.thumbnail = Some(names.thumbnail.clone());
    user.square = Some(names.square.clone());
}

/// Remove every referenced object and clear the reference fields. Deleting a
/// missing object is not an error, and a failed storage delete is logged but
/// does not keep the field from being cleared, so the whole flow is
/// idempotent. Returns whether any field was non-null going in.
pub async fn remove(storage: &dyn StorageClient, prefix: &str, user: &mut User) -> bool {
    let mut removed = false;
    for field in [&mut user.photo, &mut user.thumbnail, &mut user.square] {
        if let Some(name) = field.take() {
            removed = true;
            let key = format!("{prefix}{name}");
            if let Err(e) = storage.delete_object(&key).await {
                warn!(error = %e, %key, "photo delete failed; reference cleared anyway");
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::async_trait;
    use bytes::Bytes;
    use image::ImageFormat;
    use time::OffsetDateTime;

    use super::*;
    use crate::photos::derive::test_support::encode_test_image;
    use crate::photos::names::NamePolicy;
    use crate::photos::upload;
    use crate::storage::MemoryStorage;
    use crate::users::repo_types::test_support::sample_user;

    fn accepted_jpeg() -> AcceptedUpload {
        let bytes = encode_test_image(200, 200, ImageFormat::Jpeg);
        upload::accept(&bytes, "avatar.jpg", 1999).expect("valid upload")
    }

    fn update_names() -> PhotoNames {
        PhotoNames::derive(&NamePolicy::Update, OffsetDateTime::now_utc(), "jpg")
    }

    /// Storage that fails after a configurable number of successful writes.
    struct FlakyStorage {
        inner: MemoryStorage,
        allowed_puts: AtomicUsize,
    }

    #[async_trait]
    impl StorageClient for FlakyStorage {
        async fn put_object(
            &self,
            key: &str,
            body: Bytes,
            content_type: &str,
        ) -> anyhow::Result<()> {
            let allowed = self
                .allowed_puts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if !allowed {
                anyhow::bail!("storage write refused");
            }
            self.inner.put_object(key, body, content_type).await
        }

        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            self.inner.delete_object(key).await
        }
    }

    #[tokio::test]
    async fn stage_writes_exactly_three_objects() {
        let storage = MemoryStorage::new();
        let names = update_names();

        stage(&storage, "photos/", &accepted_jpeg(), &names)
            .await
            .unwrap();

        assert_eq!(storage.len(), 3);
        for name in [&names.photo, &names.thumbnail, &names.square] {
            assert!(storage.contains(&format!("photos/{name}")));
        }

        let thumb = storage.object(&format!("photos/{}", names.thumbnail)).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (150, 100));

        let square = storage.object(&format!("photos/{}", names.square)).unwrap();
        let decoded = image::load_from_memory(&square).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (150, 150));
    }

    #[tokio::test]
    async fn failed_derivative_write_leaves_record_untouched() {
        let storage = FlakyStorage {
            inner: MemoryStorage::new(),
            // Original succeeds, first derivative write fails.
            allowed_puts: AtomicUsize::new(1),
        };
        let mut user = sample_user();
        let names = update_names();

        let result = stage(&storage, "photos/", &accepted_jpeg(), &names).await;
        assert!(result.is_err());

        // Commit only happens on Ok; the record keeps its previous state.
        assert_eq!(user.photo, None);
        assert_eq!(user.thumbnail, None);
        assert_eq!(user.square, None);
        // Mirror the handler flow to make the contrast explicit.
        if result.is_ok() {
            apply(&mut user, &names);
        }
        assert_eq!(user.photo, None);
    }

    #[tokio::test]
    async fn absent_attachment_writes_nothing() {
        let storage = MemoryStorage::new();
        let mut user = sample_user();

        // Mirror the handler flow: no attachment means the whole photo
        // branch is skipped and neither storage nor the record is touched.
        let attachment: Option<AcceptedUpload> = None;
        if let Some(upload) = &attachment {
            let names = update_names();
            stage(&storage, "photos/", upload, &names).await.unwrap();
            apply(&mut user, &names);
        }

        assert!(storage.is_empty());
        assert_eq!(user.photo, None);
        assert_eq!(user.thumbnail, None);
        assert_eq!(user.square, None);
    }

    #[tokio::test]
    async fn apply_sets_all_three_fields() {
        let mut user = sample_user();
        let names = update_names();
        apply(&mut user, &names);
        assert_eq!(user.photo.as_deref(), Some(names.photo.as_str()));
        assert_eq!(user.thumbnail.as_deref(), Some(names.thumbnail.as_str()));
        assert_eq!(user.square.as_deref(), Some(names.square.as_str()));
    }

    #[tokio::test]
    async fn remove_deletes_objects_and_clears_fields() {
        let storage = MemoryStorage::new();
        let names = update_names();
        let mut user = sample_user();

        stage(&storage, "photos/", &accepted_jpeg(), &names)
            .await
            .unwrap();
        apply(&mut user, &names);
        assert_eq!(storage.len(), 3);

        assert!(remove(&storage, "photos/", &mut user).await);
        assert!(storage.is_empty());
        assert_eq!(user.photo, None);
        assert_eq!(user.thumbnail, None);
        assert_eq!(user.square, None);

        // Second call: nothing referenced, nothing to do, still no error.
        assert!(!remove(&storage, "photos/", &mut user).await);
        assert_eq!(user.photo, None);
    }

    #[tokio::test]
    async fn remove_tolerates_missing_objects() {
        let storage = MemoryStorage::new();
        let mut user = sample_user();
        user.photo = Some("gone.jpg".into());
        user.thumbnail = Some("gone_thumbnail.jpg".into());
        user.square = Some("gone_square.jpg".into());

        assert!(remove(&storage, "photos/", &mut user).await);
        assert_eq!(user.photo, None);
        assert_eq!(user.thumbnail, None);
        assert_eq!(user.square, None);
    }
}
