use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::application::ports::StorageError;
use crate::domain::value_objects::{HashAlgorithm, ObjectKey};

/// Buffer size for I/O operations. 256KB provides optimal throughput
/// for most modern storage systems while balancing memory usage.
pub const BUFFER_SIZE: usize = 256 * 1024;

/// Incremental digest for one algorithm.
pub enum HashAccumulator {
    Sha256(Sha256),
    Sha512(Sha512),
    Blake3(Box<blake3::Hasher>),
    Sha1(Sha1),
    Md5(Md5),
}

impl HashAccumulator {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => HashAccumulator::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => HashAccumulator::Sha512(Sha512::new()),
            HashAlgorithm::Blake3 => HashAccumulator::Blake3(Box::new(blake3::Hasher::new())),
            HashAlgorithm::Sha1 => HashAccumulator::Sha1(Sha1::new()),
            HashAlgorithm::Md5 => HashAccumulator::Md5(Md5::new()),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            HashAccumulator::Sha256(h) => h.update(bytes),
            HashAccumulator::Sha512(h) => h.update(bytes),
            HashAccumulator::Blake3(h) => {
                h.update(bytes);
            }
            HashAccumulator::Sha1(h) => h.update(bytes),
            HashAccumulator::Md5(h) => h.update(bytes),
        }
    }

    /// Lowercase hex digest
    pub fn finalize_hex(self) -> String {
        match self {
            HashAccumulator::Sha256(h) => hex::encode(h.finalize()),
            HashAccumulator::Sha512(h) => hex::encode(h.finalize()),
            HashAccumulator::Blake3(h) => h.finalize().to_hex().to_string(),
            HashAccumulator::Sha1(h) => hex::encode(h.finalize()),
            HashAccumulator::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

/// The accumulators of one upload session plus the digests the caller
/// expects.
///
/// Every supported algorithm is fed on every update, so an expectation
/// registered halfway through a stream still covers all of its bytes.
pub struct DigestSet {
    key_algorithm: HashAlgorithm,
    accumulators: Vec<(HashAlgorithm, HashAccumulator)>,
    expected: Vec<(HashAlgorithm, String)>,
}

impl DigestSet {
    pub fn new(key_algorithm: HashAlgorithm) -> Self {
        Self {
            key_algorithm,
            accumulators: HashAlgorithm::ALL
                .iter()
                .map(|a| (*a, HashAccumulator::new(*a)))
                .collect(),
            expected: Vec::new(),
        }
    }

    pub fn key_algorithm(&self) -> HashAlgorithm {
        self.key_algorithm
    }

    pub fn expect(&mut self, algorithm: HashAlgorithm, expected: String) {
        self.expected
            .push((algorithm, expected.trim().to_ascii_lowercase()));
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for (_, acc) in self.accumulators.iter_mut() {
            acc.update(bytes);
        }
    }

    /// Finish all digests, check expectations and return the content key.
    pub fn finalize(self) -> Result<ObjectKey, StorageError> {
        let digests: Vec<(HashAlgorithm, String)> = self
            .accumulators
            .into_iter()
            .map(|(a, acc)| (a, acc.finalize_hex()))
            .collect();
        let lookup = |algorithm: HashAlgorithm| {
            digests
                .iter()
                .find(|(a, _)| *a == algorithm)
                .map(|(_, d)| d.clone())
                .unwrap_or_default()
        };

        for (algorithm, expected) in self.expected {
            let actual = lookup(algorithm);
            if actual != expected {
                return Err(StorageError::HashMismatch {
                    algorithm,
                    expected,
                    actual,
                });
            }
        }

        ObjectKey::from_hex(lookup(self.key_algorithm))
            .map_err(|e| StorageError::Internal(e.to_string()))
    }
}

/// One-shot hashing helpers.
pub struct ContentHasher;

impl ContentHasher {
    /// Hex digest of an in-memory buffer
    pub fn digest(algorithm: HashAlgorithm, data: &[u8]) -> String {
        let mut acc = HashAccumulator::new(algorithm);
        acc.update(data);
        acc.finalize_hex()
    }

    /// Hex digest of everything a reader yields.
    ///
    /// Used to re-verify stored content against its key.
    pub async fn hash_reader(
        algorithm: HashAlgorithm,
        mut reader: impl AsyncRead + Unpin,
    ) -> Result<String, StorageError> {
        let mut acc = HashAccumulator::new(algorithm);
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let n = reader
                .read(&mut buffer)
                .await
                .map_err(StorageError::io("hash read"))?;
            if n == 0 {
                break;
            }
            acc.update(&buffer[..n]);
        }

        Ok(acc.finalize_hex())
    }
}
