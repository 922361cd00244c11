// AES-128 key retrieval and segment decryption.

use std::sync::Arc;

use aes::Aes128;
use bytes::Bytes;
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};
use moka::future::Cache;
use reqwest::header::HeaderMap;
use tracing::debug;

use crate::hls::HlsDownloaderError;
use crate::hls::config::HlsDecryptionConfig;
use crate::hls::http::{HttpTransport, RequestKind};
use crate::hls::playlist::{KeyInfo, KeyMethod};

type Aes128CbcDec = cbc::Decryptor<Aes128>;

const AES128_KEY_LEN: usize = 16;

/// Fetches keys once per key URI and decrypts segment payloads.
pub struct DecryptionService {
    transport: Arc<dyn HttpTransport>,
    keys: Cache<String, Bytes>,
}

impl DecryptionService {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &HlsDecryptionConfig) -> Self {
        let keys = Cache::builder()
            .max_capacity(config.key_cache_capacity)
            .time_to_live(config.key_cache_ttl)
            .build();
        Self { transport, keys }
    }

    /// Returns the key at `uri`, fetching it on first use. Concurrent
    /// callers asking for the same URI share one request.
    pub async fn key(&self, uri: &str, headers: &HeaderMap) -> Result<Bytes, HlsDownloaderError> {
        let transport = self.transport.clone();
        let owned_uri = uri.to_string();
        self.keys
            .try_get_with(owned_uri.clone(), async move {
                debug!(uri = %owned_uri, "Fetching decryption key");
                let key = transport
                    .get(&owned_uri, headers, RequestKind::Key)
                    .await
                    .map_err(|e| HlsDownloaderError::KeyFetchError(format!("{owned_uri}: {e}")))?;
                if key.len() != AES128_KEY_LEN {
                    return Err(HlsDownloaderError::KeyFetchError(format!(
                        "key from {owned_uri} has {} bytes (expected {AES128_KEY_LEN})",
                        key.len()
                    )));
                }
                Ok(key)
            })
            .await
            .map_err(|e: Arc<HlsDownloaderError>| (*e).clone())
    }

    /// Decrypts `data` for the segment with the given key state and
    /// sequence number. Clear segments pass through untouched.
    pub async fn decrypt_segment(
        &self,
        data: Bytes,
        key_info: &KeyInfo,
        sequence: u64,
        headers: &HeaderMap,
    ) -> Result<Bytes, HlsDownloaderError> {
        match &key_info.method {
            KeyMethod::None => Ok(data),
            KeyMethod::Other(method) => Err(HlsDownloaderError::DrmUnsupported(method.clone())),
            KeyMethod::Aes128 => {
                let uri = key_info
                    .uri
                    .as_deref()
                    .ok_or_else(|| HlsDownloaderError::KeyMissing(sequence.to_string()))?;
                let key = self.key(uri, headers).await?;
                let iv = key_info.iv_for(sequence);

                tokio::task::spawn_blocking(move || decrypt_aes128_cbc(&data, &key, &iv))
                    .await
                    .map_err(|e| {
                        HlsDownloaderError::DecryptionError(format!("decryption task failed: {e}"))
                    })?
            }
        }
    }
}

/// AES-128-CBC with PKCS#7 padding.
pub fn decrypt_aes128_cbc(data: &[u8], key: &[u8], iv: &[u8; 16]) -> Result<Bytes, HlsDownloaderError> {
    let cipher = Aes128CbcDec::new_from_slices(key, iv).map_err(|e| {
        HlsDownloaderError::DecryptionError(format!("Failed to initialize AES decryptor: {e}"))
    })?;
    let mut buffer = data.to_vec();
    let decrypted_len = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|e| HlsDownloaderError::DecryptionError(format!("Decryption failed: {e}")))?
        .len();
    buffer.truncate(decrypted_len);
    Ok(Bytes::from(buffer))
}
