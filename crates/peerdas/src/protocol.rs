//! Sample exchange protocol: message set, sample cache and the request path.
//!
//! Four message kinds travel between peers, framed as a one-byte message
//! code followed by the RLP-encoded payload. The request path is the only
//! suspension point in the crate: a requester registers a single-reader
//! response channel, hands the request to the transport and waits out a
//! fixed deadline. Pending entries are removed on both the response and the
//! timeout path.

use crate::erasure::shard_commitment;
use crate::error::{DasError, DasResult};
use crate::sampler::DataSample;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use shared_types::{BlockNumber, Hash};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Protocol name advertised during handshakes.
pub const PROTOCOL_NAME: &str = "peerdas";

/// Protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Message code: sample request.
pub const SAMPLE_REQUEST_MSG: u8 = 0x00;
/// Message code: sample response.
pub const SAMPLE_RESPONSE_MSG: u8 = 0x01;
/// Message code: sample availability announcement.
pub const SAMPLE_ANNOUNCE_MSG: u8 = 0x02;
/// Message code: proactive sample push.
pub const SAMPLE_PUSH_MSG: u8 = 0x03;

/// Deadline for one sample request.
pub const SAMPLE_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum sample indices in one request.
pub const MAX_SAMPLES_PER_REQUEST: usize = 16;

/// Maximum outstanding requests.
pub const MAX_PENDING_REQUESTS: usize = 64;

/// Sample cache capacity.
pub const SAMPLE_CACHE_CAPACITY: usize = 1024;

/// Age past which a cached sample is discarded.
pub const SAMPLE_MAX_AGE: Duration = Duration::from_secs(3600);

/// Peer identifier assigned by the transport.
pub type PeerId = String;

/// Request for data availability samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRequest {
    /// Unique request identifier.
    pub request_id: u64,
    /// Block to sample.
    pub block_number: BlockNumber,
    /// Block hash for verification.
    pub block_hash: Hash,
    /// Sample indices being requested.
    pub indices: Vec<u64>,
}

/// Response carrying requested samples, possibly partial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleResponse {
    /// Request this responds to.
    pub request_id: u64,
    /// The samples the responder could serve.
    pub samples: Vec<DataSample>,
    /// Error text when some samples were unavailable.
    pub error: String,
}

/// Announcement of locally available samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleAnnouncement {
    /// Block the samples belong to.
    pub block_number: BlockNumber,
    /// Block hash.
    pub block_hash: Hash,
    /// Indices the announcer can serve.
    pub available_indices: Vec<u64>,
    /// Total shards for the block.
    pub total_shards: u64,
}

/// Proactive delivery of samples to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePush {
    /// Block the samples belong to.
    pub block_number: BlockNumber,
    /// Block hash.
    pub block_hash: Hash,
    /// The pushed samples.
    pub samples: Vec<DataSample>,
}

/// A protocol message with its wire code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `0x00`
    Request(SampleRequest),
    /// `0x01`
    Response(SampleResponse),
    /// `0x02`
    Announcement(SampleAnnouncement),
    /// `0x03`
    Push(SamplePush),
}

impl Message {
    /// The one-byte wire code of this message.
    pub fn code(&self) -> u8 {
        match self {
            Message::Request(_) => SAMPLE_REQUEST_MSG,
            Message::Response(_) => SAMPLE_RESPONSE_MSG,
            Message::Announcement(_) => SAMPLE_ANNOUNCE_MSG,
            Message::Push(_) => SAMPLE_PUSH_MSG,
        }
    }
}

/// Encode a message as its code byte followed by the RLP payload.
pub fn encode_message(message: &Message) -> Vec<u8> {
    let payload = match message {
        Message::Request(m) => rlp::encode(m),
        Message::Response(m) => rlp::encode(m),
        Message::Announcement(m) => rlp::encode(m),
        Message::Push(m) => rlp::encode(m),
    };

    let mut out = Vec::with_capacity(payload.len() + 1);
    out.push(message.code());
    out.extend_from_slice(&payload);
    out
}

/// Decode a framed message.
pub fn decode_message(data: &[u8]) -> DasResult<Message> {
    let (&code, payload) = data
        .split_first()
        .ok_or(DasError::InvalidMessage(0))?;

    match code {
        SAMPLE_REQUEST_MSG => Ok(Message::Request(rlp::decode(payload)?)),
        SAMPLE_RESPONSE_MSG => Ok(Message::Response(rlp::decode(payload)?)),
        SAMPLE_ANNOUNCE_MSG => Ok(Message::Announcement(rlp::decode(payload)?)),
        SAMPLE_PUSH_MSG => Ok(Message::Push(rlp::decode(payload)?)),
        other => Err(DasError::InvalidMessage(other)),
    }
}

impl Encodable for DataSample {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(6);
        stream.append(&self.block_number);
        stream.append(&self.data_hash);
        stream.append(&self.index);
        stream.append(&self.data);
        stream.append_list(&self.merkle_proof);
        stream.append(&self.commitment);
    }
}

impl Decodable for DataSample {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            block_number: rlp.val_at(0)?,
            data_hash: rlp.val_at(1)?,
            index: rlp.val_at(2)?,
            data: rlp.val_at(3)?,
            merkle_proof: rlp.list_at(4)?,
            commitment: rlp.val_at(5)?,
        })
    }
}

impl Encodable for SampleRequest {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(4);
        stream.append(&self.request_id);
        stream.append(&self.block_number);
        stream.append(&self.block_hash);
        stream.append_list(&self.indices);
    }
}

impl Decodable for SampleRequest {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            request_id: rlp.val_at(0)?,
            block_number: rlp.val_at(1)?,
            block_hash: rlp.val_at(2)?,
            indices: rlp.list_at(3)?,
        })
    }
}

impl Encodable for SampleResponse {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(3);
        stream.append(&self.request_id);
        stream.append_list(&self.samples);
        stream.append(&self.error.as_bytes().to_vec());
    }
}

impl Decodable for SampleResponse {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let error_bytes: Vec<u8> = rlp.val_at(2)?;
        Ok(Self {
            request_id: rlp.val_at(0)?,
            samples: rlp.list_at(1)?,
            error: String::from_utf8(error_bytes)
                .map_err(|_| DecoderError::Custom("error field is not utf-8"))?,
        })
    }
}

impl Encodable for SampleAnnouncement {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(4);
        stream.append(&self.block_number);
        stream.append(&self.block_hash);
        stream.append_list(&self.available_indices);
        stream.append(&self.total_shards);
    }
}

impl Decodable for SampleAnnouncement {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            block_number: rlp.val_at(0)?,
            block_hash: rlp.val_at(1)?,
            available_indices: rlp.list_at(2)?,
            total_shards: rlp.val_at(3)?,
        })
    }
}

impl Encodable for SamplePush {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(3);
        stream.append(&self.block_number);
        stream.append(&self.block_hash);
        stream.append_list(&self.samples);
    }
}

impl Decodable for SamplePush {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            block_number: rlp.val_at(0)?,
            block_hash: rlp.val_at(1)?,
            samples: rlp.list_at(2)?,
        })
    }
}

/// Transport callback through which the protocol reaches its peers.
#[async_trait]
pub trait SampleTransport: Send + Sync {
    /// Deliver a message to one peer.
    async fn send(&self, peer: &PeerId, message: Message) -> DasResult<()>;

    /// Currently connected peers.
    fn peers(&self) -> Vec<PeerId>;
}

struct CachedSample {
    sample: DataSample,
    cached_at: Instant,
}

/// Bounded sample cache keyed by `(data_hash, sample_index)`.
///
/// Insertion into a full cache evicts the entry with the oldest insertion
/// time; reads discard entries past the maximum age.
pub struct SampleCache {
    samples: Mutex<HashMap<(Hash, u64), CachedSample>>,
    capacity: usize,
    max_age: Duration,
}

impl Default for SampleCache {
    fn default() -> Self {
        Self::new(SAMPLE_CACHE_CAPACITY, SAMPLE_MAX_AGE)
    }
}

impl SampleCache {
    /// Create a cache with explicit bounds.
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            samples: Mutex::new(HashMap::new()),
            capacity,
            max_age,
        }
    }

    /// Insert a sample, evicting the oldest entry when full.
    pub fn put(&self, sample: DataSample) {
        let mut samples = self.samples.lock();
        let key = (sample.data_hash, sample.index);

        if !samples.contains_key(&key) && samples.len() >= self.capacity {
            if let Some(oldest) = samples
                .iter()
                .min_by_key(|(_, cached)| cached.cached_at)
                .map(|(key, _)| *key)
            {
                samples.remove(&oldest);
            }
        }

        samples.insert(
            key,
            CachedSample {
                sample,
                cached_at: Instant::now(),
            },
        );
    }

    /// Fetch an unexpired sample. Expired entries are dropped on read.
    pub fn get(&self, data_hash: &Hash, index: u64) -> Option<DataSample> {
        let mut samples = self.samples.lock();
        let key = (*data_hash, index);

        let cached = samples.get(&key)?;
        if cached.cached_at.elapsed() <= self.max_age {
            return Some(cached.sample.clone());
        }
        samples.remove(&key);
        None
    }

    /// All unexpired samples for one payload hash.
    pub fn get_for_block(&self, data_hash: &Hash) -> Vec<DataSample> {
        self.samples
            .lock()
            .iter()
            .filter(|((hash, _), cached)| {
                hash == data_hash && cached.cached_at.elapsed() <= self.max_age
            })
            .map(|(_, cached)| cached.sample.clone())
            .collect()
    }

    /// Remove one entry.
    pub fn remove(&self, data_hash: &Hash, index: u64) {
        self.samples.lock().remove(&(*data_hash, index));
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.samples.lock().clear();
    }

    /// Number of cached samples, expired entries included.
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

/// Protocol handler: request/response bookkeeping plus the sample cache.
pub struct Protocol<T: SampleTransport> {
    transport: T,
    cache: SampleCache,
    pending: DashMap<u64, oneshot::Sender<SampleResponse>>,
    next_request_id: AtomicU64,
    /// Peer availability learned from announcements: block hash to the
    /// indices each peer can serve.
    announced: Mutex<HashMap<Hash, HashMap<PeerId, Vec<u64>>>>,
    /// Block hash to payload hash. Requests address samples by block hash;
    /// the cache is keyed by payload hash.
    block_index: Mutex<HashMap<Hash, Hash>>,
}

impl<T: SampleTransport> Protocol<T> {
    /// Create a protocol handler over a transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cache: SampleCache::default(),
            pending: DashMap::new(),
            next_request_id: AtomicU64::new(1),
            announced: Mutex::new(HashMap::new()),
            block_index: Mutex::new(HashMap::new()),
        }
    }

    /// Record which payload hash a block's samples are cached under.
    pub fn register_block(&self, block_hash: Hash, data_hash: Hash) {
        self.block_index.lock().insert(block_hash, data_hash);
    }

    /// The payload hash a block's samples are cached under; blocks never
    /// registered resolve to the given hash unchanged.
    fn resolve_data_hash(&self, block_hash: &Hash) -> Hash {
        self.block_index
            .lock()
            .get(block_hash)
            .copied()
            .unwrap_or(*block_hash)
    }

    /// The sample cache.
    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Request samples, serving cache hits and fetching misses from a peer.
    ///
    /// Waits up to [`SAMPLE_REQUEST_TIMEOUT`] for the response; the pending
    /// entry is removed on the response path and on the timeout path.
    pub async fn request_samples(
        &self,
        block_number: BlockNumber,
        block_hash: Hash,
        indices: &[u64],
    ) -> DasResult<Vec<DataSample>> {
        if indices.is_empty() {
            return Ok(Vec::new());
        }
        if indices.len() > MAX_SAMPLES_PER_REQUEST {
            return Err(DasError::TooManySamples {
                requested: indices.len(),
                max: MAX_SAMPLES_PER_REQUEST,
            });
        }

        let data_hash = self.resolve_data_hash(&block_hash);
        let mut samples = Vec::with_capacity(indices.len());
        let mut missing = Vec::new();
        for &index in indices {
            match self.cache.get(&data_hash, index) {
                Some(sample) => samples.push(sample),
                None => missing.push(index),
            }
        }
        if missing.is_empty() {
            return Ok(samples);
        }

        if self.pending.len() >= MAX_PENDING_REQUESTS {
            return Err(DasError::TooManyRequests {
                pending: self.pending.len(),
                max: MAX_PENDING_REQUESTS,
            });
        }

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (response_tx, response_rx) = oneshot::channel();
        self.pending.insert(request_id, response_tx);

        let request = SampleRequest {
            request_id,
            block_number,
            block_hash,
            indices: missing,
        };

        let peers = self.transport.peers();
        let Some(peer) = peers.first() else {
            self.pending.remove(&request_id);
            return Err(DasError::Transport("no peers available".into()));
        };

        debug!(request_id, peer = %peer, block = %block_hash, "requesting samples");

        if let Err(err) = self.transport.send(peer, Message::Request(request)).await {
            self.pending.remove(&request_id);
            return Err(err);
        }

        match tokio::time::timeout(SAMPLE_REQUEST_TIMEOUT, response_rx).await {
            Ok(Ok(response)) => {
                if !response.error.is_empty() {
                    if response.samples.is_empty() {
                        return Err(DasError::Transport(response.error));
                    }
                    warn!(request_id, error = %response.error, "partial sample response");
                }
                for sample in response.samples {
                    if sample.commitment == shard_commitment(&sample.data, sample.index) {
                        self.register_block(block_hash, sample.data_hash);
                        self.cache.put(sample.clone());
                        samples.push(sample);
                    } else {
                        warn!(request_id, index = sample.index, "discarding invalid sample");
                    }
                }
                Ok(samples)
            }
            Ok(Err(_)) => {
                // Sender dropped without a response.
                self.pending.remove(&request_id);
                Err(DasError::RequestTimeout)
            }
            Err(_) => {
                self.pending.remove(&request_id);
                Err(DasError::RequestTimeout)
            }
        }
    }

    /// Serve an incoming sample request from the local cache.
    pub async fn handle_request(&self, peer: &PeerId, request: SampleRequest) -> DasResult<()> {
        let data_hash = self.resolve_data_hash(&request.block_hash);
        let mut served = Vec::with_capacity(request.indices.len());
        for &index in &request.indices {
            if let Some(sample) = self.cache.get(&data_hash, index) {
                served.push(sample);
            }
        }

        let error = if served.len() < request.indices.len() {
            "partial response - some samples unavailable".to_string()
        } else {
            String::new()
        };

        let response = SampleResponse {
            request_id: request.request_id,
            samples: served,
            error,
        };

        self.transport.send(peer, Message::Response(response)).await
    }

    /// Complete the pending request a response belongs to.
    ///
    /// Responses for unknown or already-completed requests are dropped.
    pub fn handle_response(&self, response: SampleResponse) {
        match self.pending.remove(&response.request_id) {
            Some((_, sender)) => {
                // The requester may have given up between removal and delivery.
                let _ = sender.send(response);
            }
            None => {
                debug!(
                    request_id = response.request_id,
                    "response for unknown or expired request"
                );
            }
        }
    }

    /// Record which indices a peer announced for a block.
    pub fn handle_announcement(&self, peer: &PeerId, announcement: SampleAnnouncement) {
        self.announced
            .lock()
            .entry(announcement.block_hash)
            .or_default()
            .insert(peer.clone(), announcement.available_indices);
    }

    /// Verify and cache samples pushed by a peer.
    pub fn handle_push(&self, peer: &PeerId, push: SamplePush) {
        for sample in push.samples {
            if sample.commitment == shard_commitment(&sample.data, sample.index) {
                self.register_block(push.block_hash, sample.data_hash);
                self.cache.put(sample);
            } else {
                warn!(peer = %peer, index = sample.index, "discarding invalid pushed sample");
            }
        }
    }

    /// Peers known to hold samples for a block.
    pub fn announced_peers(&self, block_hash: &Hash) -> Vec<PeerId> {
        self.announced
            .lock()
            .get(block_hash)
            .map(|peers| peers.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Broadcast availability of local samples to every peer.
    pub async fn announce_samples(
        &self,
        block_number: BlockNumber,
        block_hash: Hash,
        indices: Vec<u64>,
        total_shards: u64,
    ) -> DasResult<()> {
        let announcement = SampleAnnouncement {
            block_number,
            block_hash,
            available_indices: indices,
            total_shards,
        };

        for peer in self.transport.peers() {
            self.transport
                .send(&peer, Message::Announcement(announcement.clone()))
                .await?;
        }
        Ok(())
    }

    /// Proactively push samples to one peer.
    pub async fn push_samples(&self, peer: &PeerId, samples: Vec<DataSample>) -> DasResult<()> {
        let Some(first) = samples.first() else {
            return Ok(());
        };

        let push = SamplePush {
            block_number: first.block_number,
            block_hash: first.data_hash,
            samples,
        };

        self.transport.send(peer, Message::Push(push)).await
    }

    /// Store samples in the local cache.
    pub fn store_samples(&self, samples: Vec<DataSample>) {
        for sample in samples {
            self.cache.put(sample);
        }
    }

    /// Cached samples for one payload hash.
    pub fn cached_samples(&self, data_hash: &Hash) -> Vec<DataSample> {
        self.cache.get_for_block(data_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(hash_byte: u8, index: u64, data: &[u8]) -> DataSample {
        DataSample {
            block_number: 1,
            data_hash: Hash::repeat_byte(hash_byte),
            index,
            data: data.to_vec(),
            merkle_proof: Vec::new(),
            commitment: shard_commitment(data, index),
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(PeerId, Message)>>,
        peer_list: Vec<PeerId>,
    }

    #[async_trait]
    impl SampleTransport for RecordingTransport {
        async fn send(&self, peer: &PeerId, message: Message) -> DasResult<()> {
            self.sent.lock().push((peer.clone(), message));
            Ok(())
        }
        fn peers(&self) -> Vec<PeerId> {
            self.peer_list.clone()
        }
    }

    fn protocol_with_peer() -> Protocol<RecordingTransport> {
        Protocol::new(RecordingTransport {
            sent: Mutex::new(Vec::new()),
            peer_list: vec!["peer-1".to_string()],
        })
    }

    #[test]
    fn message_roundtrips() {
        let messages = vec![
            Message::Request(SampleRequest {
                request_id: 7,
                block_number: 100,
                block_hash: Hash::repeat_byte(0xaa),
                indices: vec![0, 2, 4],
            }),
            Message::Response(SampleResponse {
                request_id: 7,
                samples: vec![sample(0xaa, 2, b"chunk")],
                error: "partial response - some samples unavailable".to_string(),
            }),
            Message::Announcement(SampleAnnouncement {
                block_number: 100,
                block_hash: Hash::repeat_byte(0xaa),
                available_indices: vec![0, 1, 2, 3, 4, 5],
                total_shards: 6,
            }),
            Message::Push(SamplePush {
                block_number: 100,
                block_hash: Hash::repeat_byte(0xaa),
                samples: vec![sample(0xaa, 0, b"zero"), sample(0xaa, 1, b"one")],
            }),
        ];

        for message in messages {
            let encoded = encode_message(&message);
            assert_eq!(encoded[0], message.code());
            assert_eq!(decode_message(&encoded).unwrap(), message);
        }
    }

    #[test]
    fn unknown_code_is_invalid() {
        assert!(matches!(
            decode_message(&[0x09, 0xc0]),
            Err(DasError::InvalidMessage(0x09))
        ));
        assert!(matches!(
            decode_message(&[]),
            Err(DasError::InvalidMessage(0))
        ));
    }

    #[test]
    fn cache_put_get_and_remove() {
        let cache = SampleCache::default();
        let s = sample(0xaa, 3, b"bytes");

        cache.put(s.clone());
        assert_eq!(cache.get(&s.data_hash, 3), Some(s.clone()));
        assert_eq!(cache.get(&s.data_hash, 4), None);

        cache.remove(&s.data_hash, 3);
        assert_eq!(cache.get(&s.data_hash, 3), None);
    }

    #[test]
    fn cache_expires_by_age() {
        let cache = SampleCache::new(16, Duration::ZERO);
        let s = sample(0xaa, 0, b"stale");

        cache.put(s.clone());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&s.data_hash, 0), None);
    }

    #[test]
    fn cache_evicts_oldest_when_full() {
        let cache = SampleCache::new(2, SAMPLE_MAX_AGE);

        cache.put(sample(0x01, 0, b"first"));
        std::thread::sleep(Duration::from_millis(2));
        cache.put(sample(0x02, 0, b"second"));
        std::thread::sleep(Duration::from_millis(2));
        cache.put(sample(0x03, 0, b"third"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&Hash::repeat_byte(0x01), 0).is_none());
        assert!(cache.get(&Hash::repeat_byte(0x02), 0).is_some());
        assert!(cache.get(&Hash::repeat_byte(0x03), 0).is_some());
    }

    #[test]
    fn cache_collects_per_block() {
        let cache = SampleCache::default();
        cache.put(sample(0xaa, 0, b"a"));
        cache.put(sample(0xaa, 1, b"b"));
        cache.put(sample(0xbb, 0, b"c"));

        assert_eq!(cache.get_for_block(&Hash::repeat_byte(0xaa)).len(), 2);
        assert_eq!(cache.get_for_block(&Hash::repeat_byte(0xbb)).len(), 1);
    }

    #[tokio::test]
    async fn request_served_entirely_from_cache() {
        let protocol = protocol_with_peer();
        let hash = Hash::repeat_byte(0xaa);
        protocol.cache().put(sample(0xaa, 0, b"zero"));
        protocol.cache().put(sample(0xaa, 1, b"one"));

        let samples = protocol.request_samples(1, hash, &[0, 1]).await.unwrap();
        assert_eq!(samples.len(), 2);
        // Nothing went over the wire.
        assert!(protocol.transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn request_times_out_and_clears_pending() {
        tokio::time::pause();
        let protocol = protocol_with_peer();

        let fut = protocol.request_samples(1, Hash::repeat_byte(0xaa), &[0]);
        tokio::pin!(fut);

        // Let the request register, then run past the deadline.
        let result = fut.await;
        assert!(matches!(result, Err(DasError::RequestTimeout)));
        assert_eq!(protocol.pending.len(), 0);
    }

    #[tokio::test]
    async fn request_rejects_oversized_index_lists() {
        let protocol = protocol_with_peer();
        let indices: Vec<u64> = (0..17).collect();

        assert!(matches!(
            protocol
                .request_samples(1, Hash::repeat_byte(0xaa), &indices)
                .await,
            Err(DasError::TooManySamples { requested: 17, .. })
        ));
    }

    #[tokio::test]
    async fn request_without_peers_fails_fast() {
        let protocol = Protocol::new(RecordingTransport::default());

        assert!(matches!(
            protocol
                .request_samples(1, Hash::repeat_byte(0xaa), &[0])
                .await,
            Err(DasError::Transport(_))
        ));
        assert_eq!(protocol.pending.len(), 0);
    }

    #[tokio::test]
    async fn response_completes_pending_request() {
        let protocol = std::sync::Arc::new(protocol_with_peer());
        let hash = Hash::repeat_byte(0xaa);

        let requester = std::sync::Arc::clone(&protocol);
        let task = tokio::spawn(async move { requester.request_samples(1, hash, &[0, 1]).await });

        // Wait until the request is registered and sent.
        while protocol.pending.is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let request_id = *protocol
            .pending
            .iter()
            .next()
            .expect("request registered")
            .key();

        protocol.handle_response(SampleResponse {
            request_id,
            samples: vec![sample(0xaa, 0, b"zero"), sample(0xaa, 1, b"one")],
            error: String::new(),
        });

        let samples = task.await.unwrap().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(protocol.pending.len(), 0);
        // Responses were verified and cached.
        assert!(protocol.cache().get(&hash, 0).is_some());
    }

    #[tokio::test]
    async fn invalid_samples_in_response_are_discarded() {
        let protocol = std::sync::Arc::new(protocol_with_peer());
        let hash = Hash::repeat_byte(0xaa);

        let requester = std::sync::Arc::clone(&protocol);
        let task = tokio::spawn(async move { requester.request_samples(1, hash, &[0]).await });

        while protocol.pending.is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let request_id = *protocol.pending.iter().next().unwrap().key();

        let mut bad = sample(0xaa, 0, b"zero");
        bad.commitment = Hash::repeat_byte(0x66);
        protocol.handle_response(SampleResponse {
            request_id,
            samples: vec![bad],
            error: String::new(),
        });

        let samples = task.await.unwrap().unwrap();
        assert!(samples.is_empty());
        assert!(protocol.cache().get(&hash, 0).is_none());
    }

    #[tokio::test]
    async fn handle_request_serves_partial_with_error_note() {
        let protocol = protocol_with_peer();
        let hash = Hash::repeat_byte(0xaa);
        protocol.cache().put(sample(0xaa, 0, b"zero"));

        let peer = "peer-2".to_string();
        protocol
            .handle_request(
                &peer,
                SampleRequest {
                    request_id: 9,
                    block_number: 1,
                    block_hash: hash,
                    indices: vec![0, 1],
                },
            )
            .await
            .unwrap();

        let sent = protocol.transport.sent.lock();
        let (to, message) = &sent[0];
        assert_eq!(to, &peer);
        match message {
            Message::Response(response) => {
                assert_eq!(response.request_id, 9);
                assert_eq!(response.samples.len(), 1);
                assert!(!response.error.is_empty());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn push_is_verified_then_cached() {
        let protocol = protocol_with_peer();
        let peer = "peer-2".to_string();

        let good = sample(0xaa, 0, b"good");
        let mut bad = sample(0xaa, 1, b"bad");
        bad.commitment = Hash::repeat_byte(0x13);

        protocol.handle_push(
            &peer,
            SamplePush {
                block_number: 1,
                block_hash: Hash::repeat_byte(0xaa),
                samples: vec![good.clone(), bad],
            },
        );

        assert_eq!(protocol.cache().get(&good.data_hash, 0), Some(good));
        assert!(protocol.cache().get(&Hash::repeat_byte(0xaa), 1).is_none());
    }

    #[tokio::test]
    async fn announcements_record_peer_availability() {
        let protocol = protocol_with_peer();
        let hash = Hash::repeat_byte(0xcc);
        let peer = "peer-3".to_string();

        protocol.handle_announcement(
            &peer,
            SampleAnnouncement {
                block_number: 5,
                block_hash: hash,
                available_indices: vec![0, 1],
                total_shards: 6,
            },
        );

        assert_eq!(protocol.announced_peers(&hash), vec![peer]);
        assert!(protocol.announced_peers(&Hash::zero()).is_empty());
    }

    #[tokio::test]
    async fn announce_broadcasts_to_all_peers() {
        let protocol = Protocol::new(RecordingTransport {
            sent: Mutex::new(Vec::new()),
            peer_list: vec!["a".to_string(), "b".to_string()],
        });

        protocol
            .announce_samples(5, Hash::repeat_byte(0x01), vec![0, 1, 2], 6)
            .await
            .unwrap();

        assert_eq!(protocol.transport.sent.lock().len(), 2);
    }
}
