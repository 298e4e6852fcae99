//! Content fingerprints and file keys.
//!
//! The fingerprint is a BLAKE3 hash over the raw file bytes, computed while the file is read in
//! fixed-size chunks. The file key binds that fingerprint to the owner, the bucket, the file name
//! and the size. Every variable-length field is length-prefixed before hashing so that distinct
//! tuples never produce the same input stream.
use std::io;

use alloy_primitives::Address;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::ids::{BucketId, FileKey, Fingerprint};
use crate::FileSize;

pub const READ_CHUNK_SIZE: usize = 64 * 1024; // 64 KiB

const FILE_KEY_CONTEXT: &str = "haven 2024-06-01 file key";

/// Hashes everything `reader` yields and keeps the bytes around for the later transfer.
pub async fn fingerprint_reader<R>(mut reader: R) -> io::Result<(Fingerprint, Bytes)>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = blake3::Hasher::new();
    let mut retained = BytesMut::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        let Some(bytes) = chunk.get(..read) else {
            return Err(io::Error::other("reader reported more bytes than the buffer holds"));
        };
        hasher.update(bytes);
        retained.extend_from_slice(bytes);
    }

    Ok((
        Fingerprint::new(*hasher.finalize().as_bytes()),
        retained.freeze(),
    ))
}

pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
    Fingerprint::new(*blake3::hash(data).as_bytes())
}

pub fn derive_file_key(
    owner: &Address,
    bucket_id: &BucketId,
    location: &str,
    size: FileSize,
    fingerprint: &Fingerprint,
) -> FileKey {
    let mut hasher = blake3::Hasher::new_derive_key(FILE_KEY_CONTEXT);
    hasher.update(owner.as_slice());
    hasher.update(bucket_id.as_bytes());
    hasher.update(&(location.len() as u64).to_le_bytes());
    hasher.update(location.as_bytes());
    hasher.update(&size.to_le_bytes());
    hasher.update(fingerprint.as_bytes());
    FileKey::new(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use alloy_primitives::Address;

    use super::{READ_CHUNK_SIZE, derive_file_key, fingerprint_bytes, fingerprint_reader};
    use crate::ids::{BucketId, Fingerprint};

    #[tokio::test]
    async fn streaming_matches_one_shot() {
        // Spans several read chunks with a ragged tail.
        let data: Vec<u8> = (0..READ_CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        let (fingerprint, retained) = fingerprint_reader(Cursor::new(data.clone())).await.unwrap();
        assert_eq!(fingerprint, fingerprint_bytes(&data));
        assert_eq!(&retained[..], &data[..]);
    }

    #[tokio::test]
    async fn empty_input() {
        let (fingerprint, retained) = fingerprint_reader(Cursor::new(Vec::new())).await.unwrap();
        assert_eq!(fingerprint, fingerprint_bytes(b""));
        assert!(retained.is_empty());
    }

    #[test]
    fn file_key_depends_on_every_field() {
        let owner = Address::repeat_byte(0xaa);
        let bucket = BucketId::new([1; 32]);
        let fingerprint = Fingerprint::new([2; 32]);
        let base = derive_file_key(&owner, &bucket, "sword.json", 10, &fingerprint);

        assert_eq!(base, derive_file_key(&owner, &bucket, "sword.json", 10, &fingerprint));
        assert_ne!(
            base,
            derive_file_key(&Address::repeat_byte(0xbb), &bucket, "sword.json", 10, &fingerprint)
        );
        assert_ne!(
            base,
            derive_file_key(&owner, &BucketId::new([3; 32]), "sword.json", 10, &fingerprint)
        );
        assert_ne!(base, derive_file_key(&owner, &bucket, "shield.json", 10, &fingerprint));
        assert_ne!(base, derive_file_key(&owner, &bucket, "sword.json", 11, &fingerprint));
        assert_ne!(
            base,
            derive_file_key(&owner, &bucket, "sword.json", 10, &Fingerprint::new([4; 32]))
        );
    }
}
