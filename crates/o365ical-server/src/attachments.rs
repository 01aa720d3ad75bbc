//! Local mirror of meeting attachments.
//!
//! Each attachment is downloaded at most once per id: the metadata row is
//! written before the download starts and acts as the dedup barrier. The
//! download itself runs as a detached task; its failures are logged and never
//! reach the request that discovered the attachment.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use o365ical_core::AttachmentRef;
use o365ical_providers::{GraphAttachment, GraphClient};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};
use crate::store::{AttachmentRecord, Storage};

/// Content type recorded when Graph does not report one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Resolves attachments to stable local URLs, mirroring new ones to disk.
#[derive(Clone)]
pub struct AttachmentMirror {
    store: Arc<dyn Storage>,
    root: PathBuf,
}

impl std::fmt::Debug for AttachmentMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentMirror")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl AttachmentMirror {
    /// Creates a mirror storing files under `root`.
    pub fn new(store: Arc<dyn Storage>, root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            root: root.into(),
        }
    }

    /// Directory holding every mirrored attachment.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a mirrored file: `<root>/<encoded id>/<file name>`.
    pub fn local_path(&self, attachment_id: &str, file_name: &str) -> PathBuf {
        self.root
            .join(urlencoding::encode(attachment_id).as_ref())
            .join(file_name)
    }

    /// Looks up the record of a mirrored attachment.
    pub fn record(&self, attachment_id: &str) -> ServerResult<AttachmentRecord> {
        self.store.find_attachment(attachment_id).map_err(|e| {
            if e.is_not_found() {
                ServerError::not_found(format!("attachment {}", attachment_id))
            } else {
                e.into()
            }
        })
    }

    /// Resolves the attachments of an event.
    ///
    /// Returns nothing, without any network call, when `has_attachments` is
    /// false. Known attachments are served from their record; new ones are
    /// recorded and their download is spawned in the background.
    pub async fn resolve(
        &self,
        client: &GraphClient,
        event_id: &str,
        has_attachments: bool,
        base_url: &str,
    ) -> ServerResult<Vec<AttachmentRef>> {
        if !has_attachments {
            return Ok(Vec::new());
        }

        let attachments = client.attachments(event_id).await?;
        let mut refs = Vec::with_capacity(attachments.len());

        for attachment in &attachments {
            let record = match self.store.find_attachment(&attachment.id) {
                Ok(record) => record,
                Err(e) if e.is_not_found() => self.record_new(client, event_id, attachment)?,
                Err(e) => return Err(e.into()),
            };
            refs.push(AttachmentRef::new(
                attachment_url(base_url, &record.attachment_id, &record.file_name),
                record.content_type,
            ));
        }

        Ok(refs)
    }

    fn record_new(
        &self,
        client: &GraphClient,
        event_id: &str,
        attachment: &GraphAttachment,
    ) -> ServerResult<AttachmentRecord> {
        let record = AttachmentRecord {
            attachment_id: attachment.id.clone(),
            file_name: safe_file_name(attachment.name.as_deref()),
            content_type: attachment
                .content_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            refreshed_at: Utc::now(),
        };

        match self.store.insert_attachment(&record) {
            Ok(()) => {
                // Detached: the request never waits for the body.
                drop(self.spawn_download(client.clone(), event_id, &record));
                Ok(record)
            }
            Err(e) if e.is_duplicate() => {
                debug!(
                    attachment_id = %attachment.id,
                    "attachment recorded concurrently, skipping download"
                );
                Ok(self.store.find_attachment(&attachment.id)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Streams one attachment to its local path in a background task.
    pub fn spawn_download(
        &self,
        client: GraphClient,
        event_id: &str,
        record: &AttachmentRecord,
    ) -> JoinHandle<()> {
        let event_id = event_id.to_string();
        let attachment_id = record.attachment_id.clone();
        let dest = self.local_path(&record.attachment_id, &record.file_name);

        tokio::spawn(async move {
            match client
                .download_attachment(&event_id, &attachment_id, &dest)
                .await
            {
                Ok(bytes) => info!(
                    attachment_id = %attachment_id,
                    bytes,
                    path = %dest.display(),
                    "attachment mirrored"
                ),
                Err(e) => warn!(
                    attachment_id = %attachment_id,
                    error = %e,
                    "attachment download failed"
                ),
            }
        })
    }
}

/// Public URL of a mirrored attachment.
pub fn attachment_url(base_url: &str, attachment_id: &str, file_name: &str) -> String {
    format!(
        "{}/attachment/{}/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(attachment_id),
        urlencoding::encode(file_name)
    )
}

/// Reduces a provider file name to a single path component.
fn safe_file_name(name: Option<&str>) -> String {
    let cleaned = name.unwrap_or_default().trim().replace(['/', '\\'], "_");
    match cleaned.as_str() {
        "" | "." | ".." => "attachment".to_string(),
        _ => cleaned,
    }
}
