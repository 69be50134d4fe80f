use std::io::{ErrorKind, Read};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::trace;

use crate::btree::Node;
use crate::core::errors::{BTreeError, ProviderError};

use super::Provider;

const NODE_PREFIX: &str = "node-";
const NODE_SUFFIX: &str = ".bin";
const ROOT_FILE: &str = "ROOT";
/// crc32 + payload length.
const RECORD_HEADER_SIZE: usize = 4 + 4;

#[derive(Debug, Clone, Default)]
pub struct FileProviderConfig {
    /// fsync every node file before it replaces the previous version.
    pub sync_on_save: bool,
}

impl FileProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync_on_save(mut self, enabled: bool) -> Self {
        self.sync_on_save = enabled;
        self
    }
}

/// Stores each node in its own checksummed file inside a directory.
///
/// Record layout:
/// ```text
/// [crc32 of payload: u32 LE][payload length: u32 LE][payload: JSON node]
/// ```
/// A write goes to `node-<id>.bin.tmp` first and is renamed over the old
/// record, so a reader sees either the previous or the new version.
#[derive(Debug)]
pub struct FileProvider<K, V> {
    dir: PathBuf,
    config: FileProviderConfig,
    next_id: AtomicU64,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> FileProvider<K, V> {
    /// Open (or create) a node directory. Fresh ids continue after the highest
    /// id already present.
    pub async fn open<P: AsRef<Path>>(
        dir: P,
        config: FileProviderConfig,
    ) -> Result<Self, BTreeError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let mut max_id = 0u64;
        let mut listing = fs::read_dir(&dir).await?;
        while let Some(entry) = listing.next_entry().await? {
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(parse_node_file_name) {
                max_id = max_id.max(id);
            }
        }

        Ok(Self {
            dir,
            config,
            next_id: AtomicU64::new(max_id + 1),
            _marker: PhantomData,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn node_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{NODE_PREFIX}{id}{NODE_SUFFIX}"))
    }

    /// Persist the id of the tree root so the tree can be reopened later.
    pub async fn store_root(&self, root_id: u64) -> Result<(), BTreeError> {
        let mut buf = Vec::with_capacity(8);
        buf.write_u64::<LittleEndian>(root_id)?;
        self.replace_file(&self.dir.join(ROOT_FILE), &buf).await
    }

    pub async fn load_root(&self) -> Result<Option<u64>, BTreeError> {
        let bytes = match fs::read(self.dir.join(ROOT_FILE)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut rdr = std::io::Cursor::new(bytes);
        let root_id = rdr
            .read_u64::<LittleEndian>()
            .map_err(|_| ProviderError("corrupt root record".into()))?;
        Ok(Some(root_id))
    }

    async fn replace_file(&self, path: &Path, bytes: &[u8]) -> Result<(), BTreeError> {
        use tokio::io::AsyncWriteExt;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        if self.config.sync_on_save {
            file.sync_all().await?;
        }
        drop(file);
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

impl<K, V> FileProvider<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    async fn write_node(&self, id: u64, node: &Node<K, V, u64>) -> Result<(), BTreeError> {
        let record = encode_record(node)?;
        trace!(node = id, bytes = record.len(), "write node");
        self.replace_file(&self.node_path(id), &record).await
    }

    async fn read_node(&self, id: u64) -> Result<Node<K, V, u64>, BTreeError> {
        let bytes = match fs::read(self.node_path(id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ProviderError(format!("node {id} not found")).into())
            }
            Err(e) => return Err(e.into()),
        };
        trace!(node = id, bytes = bytes.len(), "read node");
        let node: Node<K, V, u64> = decode_record(id, &bytes)?;
        if node.id != id {
            return Err(ProviderError(format!(
                "node file {id} holds node {}",
                node.id
            ))
            .into());
        }
        Ok(node)
    }
}

fn parse_node_file_name(name: &str) -> Option<u64> {
    name.strip_prefix(NODE_PREFIX)?
        .strip_suffix(NODE_SUFFIX)?
        .parse()
        .ok()
}

fn encode_record<T: Serialize>(value: &T) -> Result<Vec<u8>, BTreeError> {
    let payload = serde_json::to_vec(value)?;
    let len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| ProviderError("node record too large".into()))?;
    let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len());
    buf.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
    buf.write_u32::<LittleEndian>(len)?;
    buf.extend_from_slice(&payload);
    Ok(buf)
}

fn decode_record<T: DeserializeOwned>(id: u64, bytes: &[u8]) -> Result<T, BTreeError> {
    if bytes.len() < RECORD_HEADER_SIZE {
        return Err(ProviderError(format!("node {id} record truncated")).into());
    }
    let mut rdr = std::io::Cursor::new(bytes);
    let stored_checksum = rdr.read_u32::<LittleEndian>()?;
    let len = rdr.read_u32::<LittleEndian>()? as usize;
    if len > bytes.len() - RECORD_HEADER_SIZE {
        return Err(ProviderError(format!("node {id} record truncated")).into());
    }
    let mut payload = Vec::with_capacity(len);
    rdr.take(len as u64).read_to_end(&mut payload)?;
    if payload.len() != len {
        return Err(ProviderError(format!("node {id} record truncated")).into());
    }
    if crc32fast::hash(&payload) != stored_checksum {
        return Err(ProviderError(format!("node {id} checksum mismatch")).into());
    }
    Ok(serde_json::from_slice(&payload)?)
}

#[async_trait]
impl<K, V> Provider<K, V> for FileProvider<K, V>
where
    K: Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Id = u64;

    async fn create_node(&self, parent: Option<&u64>) -> Result<Node<K, V, u64>, BTreeError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let node = Node::new(id, parent.copied());
        self.write_node(id, &node).await?;
        Ok(node)
    }

    async fn load(&self, id: &u64) -> Result<Node<K, V, u64>, BTreeError> {
        self.read_node(*id).await
    }

    async fn save(&self, node: &Node<K, V, u64>) -> Result<(), BTreeError> {
        if !fs::try_exists(self.node_path(node.id)).await? {
            return Err(ProviderError(format!("node {} not found", node.id)).into());
        }
        self.write_node(node.id, node).await
    }

    async fn set_child(&self, child_id: &u64, node: &Node<K, V, u64>) -> Result<(), BTreeError> {
        if *child_id != node.id {
            return Err(ProviderError(format!(
                "cannot install node {} at slot of node {child_id}",
                node.id
            ))
            .into());
        }
        self.write_node(*child_id, node).await
    }
}
