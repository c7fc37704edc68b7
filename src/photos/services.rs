use anyhow::Context;
use bytes::Bytes;
use uuid::Uuid;

use crate::state::AppState;

const PRESIGN_TTL_SECS: u64 = 30 * 60;

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Upload one photo object; returns its id and storage key.
pub async fn upload_photo(
    st: &AppState,
    user_id: Uuid,
    body: Bytes,
    content_type: &str,
) -> anyhow::Result<(Uuid, String)> {
    let id = Uuid::new_v4();
    let ext = ext_from_mime(content_type).unwrap_or("bin");
    let key = format!("meals/{}/{}.{}", user_id, id, ext);
    st.storage
        .put_object(&key, body, content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok((id, key))
}

pub async fn presign_many(st: &AppState, keys: Vec<String>) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::with_capacity(keys.len());
    for k in keys {
        out.push(st.storage.presign_get(&k, PRESIGN_TTL_SECS).await?);
    }
    Ok(out)
}

pub async fn presign_one(st: &AppState, s3_key: &str) -> anyhow::Result<String> {
    st.storage
        .presign_get(s3_key, PRESIGN_TTL_SECS)
        .await
        .with_context(|| format!("presign url for s3_key {}", s3_key))
}
