//! Marker-block read-modify-write over the Asterisk config files.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::blocks::{self, NumberEntry, PhoneEntry, TrunkEntry};
use crate::{PbxError, ReloadModule, DIALPLAN_MODULE, PJSIP_MODULE};

/// Locations of the managed config files.
#[derive(Debug, Clone)]
pub struct PbxPaths {
    /// Dial-plan file, usually `<config dir>/extensions.conf`.
    pub extensions: PathBuf,
    /// SIP endpoint/trunk file, usually `<config dir>/pjsip.conf`.
    pub pjsip: PathBuf,
}

impl PbxPaths {
    /// Standard file names under one Asterisk config directory.
    pub fn under(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            extensions: dir.join("extensions.conf"),
            pjsip: dir.join("pjsip.conf"),
        }
    }
}

/// One managed file plus the lock serializing its read-modify-write cycles.
struct ManagedFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ManagedFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Creates the file (and its directory) empty if missing, so first use
    /// never fails on a fresh install.
    async fn ensure_exists(&self) -> Result<(), PbxError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if tokio::fs::metadata(&self.path).await.is_err() {
            tokio::fs::write(&self.path, "").await?;
        }
        Ok(())
    }

    /// Inserts or replaces the marker-delimited region for `identifier`.
    async fn upsert_block(&self, identifier: &str, block: &str) -> Result<(), PbxError> {
        let _guard = self.lock.lock().await;
        self.ensure_exists().await?;
        let content = tokio::fs::read_to_string(&self.path).await?;

        let begin = begin_marker(identifier);
        let end = end_marker(identifier);
        let replacement = format!("{begin}\n{block}\n{end}\n");

        let next = match find_region(&content, &begin, &end) {
            Some((start, stop)) => {
                format!("{}{replacement}{}", &content[..start], &content[stop..])
            }
            None => {
                let separator = if content.is_empty() || content.ends_with('\n') {
                    ""
                } else {
                    "\n"
                };
                format!("{content}{separator}{replacement}")
            }
        };

        tokio::fs::write(&self.path, next).await?;
        debug!(path = %self.path.display(), identifier, "upserted config block");
        Ok(())
    }

    /// Deletes the marker-delimited region for `identifier`, including its
    /// trailing newline. A missing region is a no-op.
    async fn remove_block(&self, identifier: &str) -> Result<(), PbxError> {
        let _guard = self.lock.lock().await;
        self.ensure_exists().await?;
        let content = tokio::fs::read_to_string(&self.path).await?;

        let begin = begin_marker(identifier);
        let end = end_marker(identifier);
        let Some((start, stop)) = find_region(&content, &begin, &end) else {
            return Ok(());
        };

        let mut next = format!("{}{}", &content[..start], &content[stop..]);
        if next.trim().is_empty() {
            next.clear();
        }
        tokio::fs::write(&self.path, next).await?;
        debug!(path = %self.path.display(), identifier, "removed config block");
        Ok(())
    }
}

fn begin_marker(identifier: &str) -> String {
    format!("; BEGIN {identifier}")
}

fn end_marker(identifier: &str) -> String {
    format!("; END {identifier}")
}

/// Finds `marker` occupying a whole line at or after `from`. Requiring a
/// full line keeps `number-1` from matching inside `number-10`.
fn find_marker_line(content: &str, marker: &str, from: usize) -> Option<usize> {
    let mut search = from;
    while let Some(rel) = content[search..].find(marker) {
        let start = search + rel;
        let at_line_start = start == 0 || content.as_bytes()[start - 1] == b'\n';
        let after = &content[start + marker.len()..];
        let at_line_end = after.is_empty() || after.starts_with('\n') || after.starts_with("\r\n");
        if at_line_start && at_line_end {
            return Some(start);
        }
        search = start + marker.len();
    }
    None
}

/// Returns the byte range of the region: begin marker through end marker
/// plus one trailing newline, when both markers are present in order.
fn find_region(content: &str, begin: &str, end: &str) -> Option<(usize, usize)> {
    let start = find_marker_line(content, begin, 0)?;
    let end_start = find_marker_line(content, end, start)?;
    let mut stop = end_start + end.len();
    if content[stop..].starts_with("\r\n") {
        stop += 2;
    } else if content[stop..].starts_with('\n') {
        stop += 1;
    }
    Some((start, stop))
}

/// Idempotent writer for the PBX config files.
///
/// The reload channel is injected so orchestration tests can observe reload
/// requests without a PBX. Reload failures never propagate: the write
/// already succeeded and the file is the source of truth.
pub struct ConfigWriter<R> {
    extensions: ManagedFile,
    pjsip: ManagedFile,
    reload: R,
}

impl<R: ReloadModule> ConfigWriter<R> {
    pub fn new(paths: PbxPaths, reload: R) -> Self {
        Self {
            extensions: ManagedFile::new(paths.extensions),
            pjsip: ManagedFile::new(paths.pjsip),
            reload,
        }
    }

    async fn request_reload(&self, module: &str) {
        if let Err(e) = self.reload.reload_module(module).await {
            error!(module, error = %e, "unable to reload module");
        } else {
            debug!(module, "reloaded module");
        }
    }

    /// Writes a number's dial-plan block and reloads the dial-plan module.
    pub async fn provision_number(&self, entry: &NumberEntry) -> Result<(), PbxError> {
        let block = blocks::number_block(entry)?;
        self.extensions
            .upsert_block(&format!("number-{}", entry.id), &block)
            .await?;
        self.request_reload(DIALPLAN_MODULE).await;
        Ok(())
    }

    /// Best-effort removal of a number's dial-plan block.
    pub async fn remove_number(&self, number_id: &str) {
        if let Err(e) = self
            .extensions
            .remove_block(&format!("number-{number_id}"))
            .await
        {
            error!(number_id, error = %e, "failed to remove dial-plan block");
            return;
        }
        self.request_reload(DIALPLAN_MODULE).await;
    }

    /// Writes a phone's PJSIP block and reloads the SIP module.
    pub async fn provision_phone(&self, entry: &PhoneEntry) -> Result<(), PbxError> {
        let block = blocks::phone_block(entry)?;
        self.pjsip
            .upsert_block(&format!("phone-{}", entry.id), &block)
            .await?;
        self.request_reload(PJSIP_MODULE).await;
        Ok(())
    }

    /// Best-effort removal of a phone's PJSIP block.
    pub async fn remove_phone(&self, phone_id: &str) {
        if let Err(e) = self.pjsip.remove_block(&format!("phone-{phone_id}")).await {
            error!(phone_id, error = %e, "failed to remove pjsip block");
            return;
        }
        self.request_reload(PJSIP_MODULE).await;
    }

    /// Writes a trunk's PJSIP block and reloads the SIP module.
    pub async fn provision_trunk(&self, entry: &TrunkEntry) -> Result<(), PbxError> {
        let block = blocks::trunk_block(entry)?;
        self.pjsip
            .upsert_block(&format!("trunk-{}", entry.id), &block)
            .await?;
        self.request_reload(PJSIP_MODULE).await;
        Ok(())
    }

    /// Best-effort removal of a trunk's PJSIP block.
    pub async fn remove_trunk(&self, trunk_id: &str) {
        if let Err(e) = self.pjsip.remove_block(&format!("trunk-{trunk_id}")).await {
            error!(trunk_id, error = %e, "failed to remove pjsip block");
            return;
        }
        self.request_reload(PJSIP_MODULE).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Records reload requests instead of talking to a PBX.
    struct RecordingReload {
        modules: StdMutex<Vec<String>>,
    }

    impl RecordingReload {
        fn new() -> Self {
            Self {
                modules: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReloadModule for RecordingReload {
        async fn reload_module(&self, module: &str) -> Result<(), PbxError> {
            self.modules.lock().unwrap().push(module.to_string());
            Ok(())
        }
    }

    fn writer(dir: &Path) -> ConfigWriter<RecordingReload> {
        ConfigWriter::new(PbxPaths::under(dir), RecordingReload::new())
    }

    fn number(id: &str, value: &str) -> NumberEntry {
        NumberEntry {
            id: id.to_string(),
            value: value.to_string(),
            agent_id: "a1".to_string(),
            agent_label: "support-line".to_string(),
            port: 5123,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());

        writer.provision_number(&number("n1", "+39061234")).await.unwrap();
        let first = tokio::fs::read_to_string(dir.path().join("extensions.conf"))
            .await
            .unwrap();

        writer.provision_number(&number("n1", "+39061234")).await.unwrap();
        let second = tokio::fs::read_to_string(dir.path().join("extensions.conf"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.matches("; BEGIN number-n1").count(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());

        writer.provision_number(&number("n1", "+39061111")).await.unwrap();
        writer.provision_number(&number("n2", "+39062222")).await.unwrap();
        writer.provision_number(&number("n1", "+39063333")).await.unwrap();

        let content = tokio::fs::read_to_string(dir.path().join("extensions.conf"))
            .await
            .unwrap();
        assert!(!content.contains("+39061111"));
        assert!(content.contains("+39063333"));
        // n1's block stays ahead of n2's.
        assert!(content.find("number-n1").unwrap() < content.find("number-n2").unwrap());
    }

    #[tokio::test]
    async fn remove_deletes_exactly_one_block() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());

        writer.provision_number(&number("n1", "+39061111")).await.unwrap();
        writer.provision_number(&number("n2", "+39062222")).await.unwrap();
        let before = tokio::fs::read_to_string(dir.path().join("extensions.conf"))
            .await
            .unwrap();

        writer.remove_number("n1").await;
        let after = tokio::fs::read_to_string(dir.path().join("extensions.conf"))
            .await
            .unwrap();

        assert!(!after.contains("number-n1"));
        assert!(after.contains("number-n2"));
        // Only n1's region disappeared; what is left matches the original tail.
        assert!(before.ends_with(&after));
    }

    #[tokio::test]
    async fn remove_twice_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());

        writer.provision_number(&number("n1", "+39061234")).await.unwrap();
        writer.remove_number("n1").await;
        writer.remove_number("n1").await;

        let content = tokio::fs::read_to_string(dir.path().join("extensions.conf"))
            .await
            .unwrap();
        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn marker_ids_do_not_prefix_match() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());

        writer.provision_number(&number("n1", "+39061111")).await.unwrap();
        writer.provision_number(&number("n10", "+39062222")).await.unwrap();

        writer.remove_number("n1").await;
        let content = tokio::fs::read_to_string(dir.path().join("extensions.conf"))
            .await
            .unwrap();
        assert!(!content.contains("BEGIN number-n1\n"));
        assert!(content.contains("; BEGIN number-n10"));
        assert!(content.contains("+39062222"));
    }

    #[tokio::test]
    async fn provision_requests_matching_module_reload() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());

        writer.provision_number(&number("n1", "+39061234")).await.unwrap();
        writer
            .provision_phone(&PhoneEntry {
                id: "ph1".to_string(),
                display_name: None,
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        writer
            .provision_trunk(&TrunkEntry {
                id: "t1".to_string(),
                name: "carrier".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();

        let modules = writer.reload.modules.lock().unwrap().clone();
        assert_eq!(
            modules,
            vec![
                DIALPLAN_MODULE.to_string(),
                PJSIP_MODULE.to_string(),
                PJSIP_MODULE.to_string()
            ]
        );
    }

    #[tokio::test]
    async fn phones_and_trunks_share_pjsip_without_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(dir.path());

        writer
            .provision_phone(&PhoneEntry {
                id: "x1".to_string(),
                display_name: None,
                password: "pw".to_string(),
            })
            .await
            .unwrap();
        writer
            .provision_trunk(&TrunkEntry {
                id: "x1".to_string(),
                name: "carrier".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();

        writer.remove_phone("x1").await;
        let content = tokio::fs::read_to_string(dir.path().join("pjsip.conf"))
            .await
            .unwrap();
        assert!(!content.contains("phone-x1"));
        assert!(content.contains("trunk-x1"));
    }
}
