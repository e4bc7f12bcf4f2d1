//! Storage seams for container bytes and signed documents.
//!
//! All stores are trait objects injected into the services so tests can
//! substitute in-memory fakes without process-wide state. The filesystem
//! implementations are the production defaults.

use crate::domain::types::{DocumentRef, SignatureHash};
use crate::infra::error::{SignError, SignResult};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Content-addressed blob store for certificate containers.
///
/// Containers are stored opaquely and referenced by the sha256 hex of their
/// bytes; metadata records never inline the container.
pub trait ContentStore: Send + Sync {
    /// Store bytes, returning their content address.
    fn put(&self, bytes: &[u8]) -> SignResult<String>;
    /// Fetch bytes by content address.
    fn get(&self, address: &str) -> SignResult<Vec<u8>>;
}

/// Store for signed document byte streams, keyed by document identity plus
/// signature hash. The hash in the key means concurrent attempts on the same
/// document write distinct entries and can never replace each other's bytes;
/// the registry record names the authoritative entry. Retrieval for end users
/// is owned by an external collaborator; this service only writes through and
/// reads back for diagnostics.
pub trait DocumentStore: Send + Sync {
    fn put_signed(
        &self,
        document: &DocumentRef,
        hash: &SignatureHash,
        bytes: &[u8],
    ) -> SignResult<()>;
    fn get_signed(
        &self,
        document: &DocumentRef,
        hash: &SignatureHash,
    ) -> SignResult<Option<Vec<u8>>>;
    /// Drop an entry whose signature lost the registry race. Removing a
    /// missing entry is not an error.
    fn remove_signed(&self, document: &DocumentRef, hash: &SignatureHash) -> SignResult<()>;
}

/// Collaborator supplying the exact rendered bytes to protect. The signing
/// core treats them as opaque and never re-renders.
pub trait DocumentSource: Send + Sync {
    /// Rendered bytes for a document, or `None` if the document is unknown.
    fn rendered_bytes(&self, document: &DocumentRef) -> SignResult<Option<Vec<u8>>>;
}

fn check_address(address: &str) -> SignResult<()> {
    if address.len() != 64 || !address.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(SignError::ValidationError(format!(
            "invalid content address '{address}'"
        )));
    }
    Ok(())
}

/// Filesystem-backed content store: `<root>/<first 2 hex>/<rest>`.
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn open(root: impl Into<PathBuf>) -> SignResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, address: &str) -> PathBuf {
        self.root.join(&address[..2]).join(&address[2..])
    }
}

impl ContentStore for FsContentStore {
    fn put(&self, bytes: &[u8]) -> SignResult<String> {
        use sha2::{Digest, Sha256};
        let address = hex::encode(Sha256::digest(bytes));
        let path = self.path_for(&address);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            fs::write(&path, bytes)?;
        }
        Ok(address)
    }

    fn get(&self, address: &str) -> SignResult<Vec<u8>> {
        check_address(address)?;
        let path = self.path_for(address);
        fs::read(&path).map_err(|e| {
            SignError::StorageError(format!("container {address} unreadable: {e}"))
        })
    }
}

/// Filesystem-backed signed-document store: `<root>/<KIND>-<id>.p7s`.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn open(root: impl Into<PathBuf>) -> SignResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, document: &DocumentRef, hash: &SignatureHash) -> PathBuf {
        self.root.join(format!(
            "{}-{}-{}.p7s",
            document.kind.as_label(),
            document.id,
            hash
        ))
    }
}

impl DocumentStore for FsDocumentStore {
    fn put_signed(
        &self,
        document: &DocumentRef,
        hash: &SignatureHash,
        bytes: &[u8],
    ) -> SignResult<()> {
        fs::write(self.path_for(document, hash), bytes)?;
        Ok(())
    }

    fn get_signed(
        &self,
        document: &DocumentRef,
        hash: &SignatureHash,
    ) -> SignResult<Option<Vec<u8>>> {
        let path = self.path_for(document, hash);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }

    fn remove_signed(&self, document: &DocumentRef, hash: &SignatureHash) -> SignResult<()> {
        let path = self.path_for(document, hash);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Filesystem-backed document source: `<root>/<KIND>-<id>` holds the rendered
/// bytes placed there by the rendering collaborator.
pub struct FsDocumentSource {
    root: PathBuf,
}

impl FsDocumentSource {
    pub fn open(root: impl Into<PathBuf>) -> SignResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }
}

impl DocumentSource for FsDocumentSource {
    fn rendered_bytes(&self, document: &DocumentRef) -> SignResult<Option<Vec<u8>>> {
        let path = self
            .root
            .join(format!("{}-{}", document.kind.as_label(), document.id));
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }
}

/// In-memory stores for tests and embedding.
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryContentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentStore for MemoryContentStore {
    fn put(&self, bytes: &[u8]) -> SignResult<String> {
        use sha2::{Digest, Sha256};
        let address = hex::encode(Sha256::digest(bytes));
        self.blobs
            .lock()
            .unwrap()
            .insert(address.clone(), bytes.to_vec());
        Ok(address)
    }

    fn get(&self, address: &str) -> SignResult<Vec<u8>> {
        check_address(address)?;
        self.blobs
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| SignError::StorageError(format!("container {address} not stored")))
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<(DocumentRef, SignatureHash), Vec<u8>>>,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn put_signed(
        &self,
        document: &DocumentRef,
        hash: &SignatureHash,
        bytes: &[u8],
    ) -> SignResult<()> {
        self.documents
            .lock()
            .unwrap()
            .insert((*document, hash.clone()), bytes.to_vec());
        Ok(())
    }

    fn get_signed(
        &self,
        document: &DocumentRef,
        hash: &SignatureHash,
    ) -> SignResult<Option<Vec<u8>>> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(&(*document, hash.clone()))
            .cloned())
    }

    fn remove_signed(&self, document: &DocumentRef, hash: &SignatureHash) -> SignResult<()> {
        self.documents
            .lock()
            .unwrap()
            .remove(&(*document, hash.clone()));
        Ok(())
    }
}

/// In-memory rendered-document source, pre-seeded by tests.
#[derive(Default)]
pub struct MemoryDocumentSource {
    rendered: Mutex<HashMap<DocumentRef, Vec<u8>>>,
}

impl MemoryDocumentSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document: DocumentRef, bytes: Vec<u8>) {
        self.rendered.lock().unwrap().insert(document, bytes);
    }
}

impl DocumentSource for MemoryDocumentSource {
    fn rendered_bytes(&self, document: &DocumentRef) -> SignResult<Option<Vec<u8>>> {
        Ok(self.rendered.lock().unwrap().get(document).cloned())
    }
}
