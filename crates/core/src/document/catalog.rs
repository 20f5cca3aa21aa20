//! PDF Document - main entry point for PDF parsing.
//!
//! Handles:
//! - header and trailer checks (encrypted files are rejected)
//! - object resolution through the xref chain, object streams and the
//!   scanned fallback index
//! - the shared object cache
//! - page list construction

use super::page::{PageDescriptor, flatten_page_tree};
use super::xref::{
    XRef, XRefEntry, find_header, find_startxref, load_xref_chain, load_xref_fallback,
};
use crate::codec;
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
use crate::parser::pdf_parser::ObjectParser;
use bytes::Bytes;
use memmap2::Mmap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Longest `Ref -> Ref -> ...` chain followed by [`PDFDocument::deref`].
const MAX_REF_CHAIN: usize = 32;

static NEXT_DOC_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Objects currently being resolved on this thread, keyed by document.
    static RESOLVING: RefCell<FxHashSet<(u64, u32)>> = RefCell::new(FxHashSet::default());
}

struct ResolvingGuard {
    key: (u64, u32),
}

impl ResolvingGuard {
    fn enter(doc_id: u64, objid: u32) -> Result<Self> {
        let key = (doc_id, objid);
        let fresh = RESOLVING.with(|set| set.borrow_mut().insert(key));
        if fresh {
            Ok(Self { key })
        } else {
            Err(PdfError::CircularReference(objid))
        }
    }
}

impl Drop for ResolvingGuard {
    fn drop(&mut self) {
        RESOLVING.with(|set| {
            set.borrow_mut().remove(&self.key);
        });
    }
}

/// Parsed objects, stored once and addressed by object number.
///
/// Objects are never evicted, so a resolved reference is never parsed twice.
struct ObjectArena {
    objects: Vec<Arc<PDFObject>>,
    index: FxHashMap<u32, usize>,
}

impl ObjectArena {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            objects: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    fn get(&self, objid: u32) -> Option<Arc<PDFObject>> {
        self.index
            .get(&objid)
            .and_then(|&slot| self.objects.get(slot))
            .cloned()
    }

    /// Insert unless another thread got there first; returns the stored copy.
    fn insert(&mut self, objid: u32, obj: Arc<PDFObject>) -> Arc<PDFObject> {
        if let Some(existing) = self.get(objid) {
            return existing;
        }
        self.index.insert(objid, self.objects.len());
        self.objects.push(Arc::clone(&obj));
        obj
    }
}

/// Decoded object stream with its `objid offset` header.
struct ObjectStream {
    data: Vec<u8>,
    /// `(objid, absolute offset into data)` in header order
    entries: Vec<(u32, usize)>,
}

impl ObjectStream {
    fn parse(doc: &PDFDocument, stream_id: u32, stream: &PDFStream) -> Result<Self> {
        let data = doc.decode_stream(stream)?;
        let int_attr = |key: &str| -> Result<usize> {
            let value = stream
                .get(key)
                .ok_or_else(|| PdfError::malformed(0, format!("object stream {stream_id} has no /{key}")))?;
            usize::try_from(doc.deref(value)?.as_int()?)
                .map_err(|_| PdfError::malformed(0, format!("object stream {stream_id} has negative /{key}")))
        };
        let n = int_attr("N")?;
        let first = int_attr("First")?;
        if first > data.len() {
            return Err(PdfError::TruncatedFile(format!(
                "object stream {stream_id}: /First {first} past decoded length {}",
                data.len()
            )));
        }

        let mut header = ObjectParser::new(&data[..first]);
        let mut entries = Vec::with_capacity(n.min(1 << 16));
        for _ in 0..n {
            let objid = header.parse_object()?.as_int()?;
            let offset = header.parse_object()?.as_int()?;
            let (Ok(objid), Ok(offset)) = (u32::try_from(objid), usize::try_from(offset)) else {
                return Err(PdfError::malformed(0, format!("object stream {stream_id} has a bad header entry")));
            };
            entries.push((objid, first.saturating_add(offset)));
        }
        Ok(Self { data, entries })
    }

    /// Parse the object `objid`, preferring its header entry over `index`.
    fn object(&self, objid: u32, index: usize) -> Result<PDFObject> {
        let offset = self
            .entries
            .iter()
            .find(|(id, _)| *id == objid)
            .or_else(|| self.entries.get(index))
            .map(|&(_, off)| off)
            .ok_or(PdfError::ObjectNotFound(objid))?;
        if offset >= self.data.len() {
            return Err(PdfError::TruncatedFile(format!(
                "object {objid} offset {offset} past end of object stream"
            )));
        }
        ObjectParser::at(&self.data, offset).parse_object()
    }
}

/// An object reached through [`PDFDocument::deref`]: either the original
/// direct object or a shared cached one.
#[derive(Debug, Clone)]
pub enum Resolved<'o> {
    Direct(&'o PDFObject),
    Shared(Arc<PDFObject>),
}

impl std::ops::Deref for Resolved<'_> {
    type Target = PDFObject;

    fn deref(&self) -> &PDFObject {
        match self {
            Self::Direct(obj) => obj,
            Self::Shared(obj) => obj,
        }
    }
}

/// An opened PDF document.
///
/// Immutable after [`PDFDocument::open`]; the object cache is the only state
/// filled in later, behind a mutex.
pub struct PDFDocument {
    id: u64,
    data: Bytes,
    /// Newest section first
    xrefs: Vec<XRef>,
    fallback: OnceLock<Option<XRef>>,
    trailer: PDFDict,
    catalog: PDFDict,
    pages: Vec<PageDescriptor>,
    cache: Mutex<ObjectArena>,
    objstms: Mutex<FxHashMap<u32, Arc<ObjectStream>>>,
}

impl std::fmt::Debug for PDFDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PDFDocument")
            .field("bytes", &self.data.len())
            .field("xref_sections", &self.xrefs.len())
            .field("pages", &self.pages.len())
            .finish_non_exhaustive()
    }
}

impl PDFDocument {
    fn new_with_cache_inner(data: Bytes, cache_capacity: usize) -> Result<Self> {
        let mut doc = Self {
            id: NEXT_DOC_ID.fetch_add(1, Ordering::Relaxed),
            data,
            xrefs: Vec::new(),
            fallback: OnceLock::new(),
            trailer: PDFDict::new(),
            catalog: PDFDict::new(),
            pages: Vec::new(),
            cache: Mutex::new(ObjectArena::with_capacity(cache_capacity)),
            objstms: Mutex::new(FxHashMap::default()),
        };
        doc.parse()?;
        Ok(doc)
    }

    /// Open a document from raw PDF data (copied).
    pub fn open<D: AsRef<[u8]>>(data: D) -> Result<Self> {
        Self::open_with_cache(data, DEFAULT_CACHE_CAPACITY)
    }

    /// Open with an explicit object cache capacity.
    ///
    /// The capacity only sizes the initial allocation; cached objects are
    /// never evicted.
    pub fn open_with_cache<D: AsRef<[u8]>>(data: D, cache_capacity: usize) -> Result<Self> {
        Self::new_with_cache_inner(Bytes::copy_from_slice(data.as_ref()), cache_capacity)
    }

    /// Open from shared bytes without copying.
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        Self::new_with_cache_inner(data, DEFAULT_CACHE_CAPACITY)
    }

    /// Open a memory-mapped file without copying.
    pub fn from_mmap(mmap: Mmap) -> Result<Self> {
        Self::new_with_cache_inner(Bytes::from_owner(mmap), DEFAULT_CACHE_CAPACITY)
    }

    /// Raw file bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn parse(&mut self) -> Result<()> {
        let header = find_header(&self.data).ok_or(PdfError::InvalidHeader)?;
        if header > 0 {
            tracing::debug!(offset = header, "PDF header is preceded by junk");
        }

        self.xrefs = match find_startxref(&self.data) {
            Some(pos) => match load_xref_chain(&self.data, pos) {
                Ok(xrefs) if !xrefs.is_empty() => xrefs,
                Ok(_) => self.fallback_only()?,
                Err(err) => {
                    tracing::warn!(startxref = pos, error = %err, "xref unreadable, scanning for objects");
                    self.fallback_only()?
                }
            },
            None => {
                tracing::warn!("no startxref found, scanning for objects");
                self.fallback_only()?
            }
        };

        // The newest trailer wins; older ones fill in missing keys.
        let mut trailer = PDFDict::new();
        for xref in &self.xrefs {
            for (key, value) in &xref.trailer {
                trailer.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        if !trailer.contains_key("Root")
            && let Some(root) = self.fallback_xref().and_then(|f| f.trailer.get("Root"))
        {
            tracing::warn!("trailer has no /Root, using the one found by scanning");
            trailer.insert("Root".into(), root.clone());
        }
        if trailer.contains_key("Encrypt") {
            return Err(PdfError::EncryptedUnsupported);
        }
        self.trailer = trailer;

        let root = self
            .trailer
            .get("Root")
            .ok_or_else(|| PdfError::malformed(0, "trailer has no /Root"))?;
        let catalog = PDFDocument::deref(self, root)?.as_dict()?.clone();
        self.catalog = catalog;

        self.pages = flatten_page_tree(self)?;
        tracing::debug!(
            pages = self.pages.len(),
            xref_sections = self.xrefs.len(),
            "opened document"
        );
        Ok(())
    }

    fn fallback_only(&self) -> Result<Vec<XRef>> {
        match self.fallback_xref() {
            Some(xref) => Ok(vec![xref.clone()]),
            None => Err(PdfError::TruncatedFile(
                "no cross-reference data and no objects found".into(),
            )),
        }
    }

    /// Index rebuilt by scanning the file, computed on first use.
    fn fallback_xref(&self) -> Option<&XRef> {
        self.fallback
            .get_or_init(|| match load_xref_fallback(&self.data) {
                Ok(xref) => Some(xref),
                Err(err) => {
                    tracing::debug!(error = %err, "fallback object scan found nothing");
                    None
                }
            })
            .as_ref()
    }

    /// Document catalog (`/Root`).
    pub const fn catalog(&self) -> &PDFDict {
        &self.catalog
    }

    /// Merged trailer dictionary.
    pub const fn trailer(&self) -> &PDFDict {
        &self.trailer
    }

    /// Number of leaf pages in the flattened page tree.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All pages in document order.
    pub fn pages(&self) -> &[PageDescriptor] {
        &self.pages
    }

    /// Descriptor of page `index` (zero-based).
    pub fn page_descriptor(&self, index: usize) -> Result<&PageDescriptor> {
        self.pages.get(index).ok_or(PdfError::PageIndexOutOfRange {
            index,
            count: self.pages.len(),
        })
    }

    /// Parse the indirect object whose header starts at `offset`.
    pub fn parse_object_at(&self, offset: usize) -> Result<PDFObject> {
        if offset >= self.data.len() {
            return Err(PdfError::TruncatedFile(format!(
                "object offset {offset} past end of file ({} bytes)",
                self.data.len()
            )));
        }
        let resolve_length = |r: PDFObjRef| -> Result<i64> { self.deref_ref(r)?.as_int() };
        let (_, obj) = ObjectParser::at(&self.data, offset).parse_indirect(&resolve_length)?;
        Ok(obj)
    }

    /// Resolve `id gen R`.
    ///
    /// Lookup is by object number; the newest definition wins. A generation
    /// mismatch is tolerated and logged.
    pub fn resolve(&self, objid: u32, genno: u32) -> Result<Arc<PDFObject>> {
        let obj = self.getobj_shared(objid)?;
        if let PDFObject::Stream(s) = obj.as_ref()
            && let Some(found) = s.genno
            && found != genno
        {
            tracing::debug!(objid, requested = genno, found, "generation number mismatch");
        }
        Ok(obj)
    }

    fn deref_ref(&self, r: PDFObjRef) -> Result<Arc<PDFObject>> {
        self.getobj_shared(r.objid)
    }

    /// Get an object by number, parsing and caching it on first access.
    pub fn getobj_shared(&self, objid: u32) -> Result<Arc<PDFObject>> {
        if objid == 0 {
            return Err(PdfError::ObjectNotFound(0));
        }

        let _guard = ResolvingGuard::enter(self.id, objid)?;

        if let Ok(cache) = self.cache.lock()
            && let Some(obj) = cache.get(objid)
        {
            return Ok(obj);
        }

        // The cache lock is not held while parsing: parsing may resolve
        // other objects (indirect lengths, object streams).
        let obj = self.load_object(objid)?;
        let obj = Arc::new(obj);
        match self.cache.lock() {
            Ok(mut cache) => Ok(cache.insert(objid, obj)),
            Err(_) => Ok(obj),
        }
    }

    fn load_object(&self, objid: u32) -> Result<PDFObject> {
        let mut last_err = None;
        let primary = self.xrefs.iter().filter_map(|x| x.get(objid));
        for entry in primary {
            if *entry == XRefEntry::Free {
                tracing::debug!(objid, "object is free in the newest section listing it");
                return Err(PdfError::ObjectNotFound(objid));
            }
            match self.load_entry(objid, *entry) {
                Ok(obj) => return Ok(obj),
                Err(err @ PdfError::CircularReference(_)) => return Err(err),
                Err(err) => {
                    tracing::debug!(objid, error = %err, "xref entry unusable, trying older sections");
                    last_err = Some(err);
                }
            }
        }

        if !self.xrefs.iter().all(|x| x.is_fallback)
            && let Some(entry) = self.fallback_xref().and_then(|x| x.get(objid))
        {
            match self.load_entry(objid, *entry) {
                Ok(obj) => {
                    tracing::warn!(objid, "recovered object from scanned offsets");
                    return Ok(obj);
                }
                Err(err @ PdfError::CircularReference(_)) => return Err(err),
                Err(err) => last_err = Some(err),
            }
        }

        Err(last_err.unwrap_or(PdfError::ObjectNotFound(objid)))
    }

    fn load_entry(&self, objid: u32, entry: XRefEntry) -> Result<PDFObject> {
        match entry {
            XRefEntry::InFile { offset, .. } => {
                if offset >= self.data.len() {
                    return Err(PdfError::TruncatedFile(format!(
                        "object {objid} offset {offset} past end of file"
                    )));
                }
                let resolve_length = |r: PDFObjRef| -> Result<i64> { self.deref_ref(r)?.as_int() };
                let (found, obj) =
                    ObjectParser::at(&self.data, offset).parse_indirect(&resolve_length)?;
                if found.objid != objid {
                    return Err(PdfError::malformed(
                        offset,
                        format!("expected object {objid}, found {}", found.objid),
                    ));
                }
                Ok(obj)
            }
            XRefEntry::InStream { stream_id, index } => {
                self.object_stream(stream_id)?.object(objid, index)
            }
            XRefEntry::Free => Err(PdfError::ObjectNotFound(objid)),
        }
    }

    fn object_stream(&self, stream_id: u32) -> Result<Arc<ObjectStream>> {
        if let Ok(map) = self.objstms.lock()
            && let Some(stm) = map.get(&stream_id)
        {
            return Ok(Arc::clone(stm));
        }
        let container = self.getobj_shared(stream_id)?;
        let parsed = Arc::new(ObjectStream::parse(self, stream_id, container.as_stream()?)?);
        if let Ok(mut map) = self.objstms.lock() {
            map.entry(stream_id).or_insert_with(|| Arc::clone(&parsed));
        }
        Ok(parsed)
    }

    /// Follow references until a direct object is reached.
    pub fn deref<'o>(&self, obj: &'o PDFObject) -> Result<Resolved<'o>> {
        let PDFObject::Ref(first) = obj else {
            return Ok(Resolved::Direct(obj));
        };
        let mut seen = FxHashSet::default();
        seen.insert(first.objid);
        let mut current = self.getobj_shared(first.objid)?;
        for _ in 0..MAX_REF_CHAIN {
            let next_id = match current.as_ref() {
                PDFObject::Ref(next) => next.objid,
                _ => return Ok(Resolved::Shared(Arc::clone(&current))),
            };
            if !seen.insert(next_id) {
                return Err(PdfError::CircularReference(next_id));
            }
            current = self.getobj_shared(next_id)?;
        }
        Err(PdfError::malformed(0, format!("reference chain from object {} is too long", first.objid)))
    }

    /// Dereference `obj` and clone it as a dictionary (streams give their
    /// attributes).
    pub fn deref_dict(&self, obj: &PDFObject) -> Result<PDFDict> {
        Ok(self.deref(obj)?.as_dict()?.clone())
    }

    /// Decode a stream's data through its `/Filter` chain.
    pub fn decode_stream(&self, stream: &PDFStream) -> Result<Vec<u8>> {
        let filter = match stream.get_any(&["Filter", "F"]) {
            Some(f) => Some(self.deref_deep(f)?),
            None => None,
        };
        let parms = match stream.get_any(&["DecodeParms", "DP"]) {
            Some(p) => Some(self.deref_deep(p)?),
            None => None,
        };
        let chain = codec::filter_chain(filter.as_ref(), parms.as_ref())?;
        if chain.is_empty() {
            return Ok(stream.get_rawdata().to_vec());
        }
        codec::apply_filters(stream.get_rawdata(), &chain)
    }

    /// Dereference `obj` and any references directly inside an array.
    fn deref_deep(&self, obj: &PDFObject) -> Result<PDFObject> {
        match &*self.deref(obj)? {
            PDFObject::Array(items) => Ok(PDFObject::Array(
                items
                    .iter()
                    .map(|item| self.deref(item).map(|r| (*r).clone()))
                    .collect::<Result<_>>()?,
            )),
            other => Ok(other.clone()),
        }
    }

    /// Decoded content of a page: every content stream, joined by a newline.
    pub fn page_contents(&self, page: &PageDescriptor) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for entry in &page.contents {
            let obj = self.deref(entry)?;
            let stream = match obj.as_stream() {
                Ok(s) => s,
                Err(_) if obj.is_null() => continue,
                Err(err) => return Err(err),
            };
            if !out.is_empty() {
                out.push(b'\n');
            }
            out.extend_from_slice(&self.decode_stream(stream)?);
        }
        Ok(out)
    }
}
