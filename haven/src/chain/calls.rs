use alloy_primitives::Bytes;
use alloy_sol_types::{SolCall, sol};
use haven_core::{PreparedUpload, ProviderId, ValuePropId};

sol! {
    /// File system precompile of the storage chain.
    interface IFileSystem {
        function createBucket(bytes32 mspId, bytes name, bool isPrivate, bytes32 valuePropId) external;

        function issueStorageRequest(
            bytes32 bucketId,
            bytes location,
            bytes32 fingerprint,
            uint64 size,
            bytes32 mspId,
            bytes[] peerIds,
            uint8 replicationLevel,
            uint32 replicas
        ) external;
    }
}

/// `replicationLevel` value which makes the chain honour the explicit `replicas` count.
pub const REPLICATION_LEVEL_CUSTOM: u8 = 5;

pub fn create_bucket(
    msp_id: ProviderId,
    name: &str,
    is_private: bool,
    value_prop_id: ValuePropId,
) -> Bytes {
    IFileSystem::createBucketCall {
        mspId: msp_id.as_b256(),
        name: Bytes::copy_from_slice(name.as_bytes()),
        isPrivate: is_private,
        valuePropId: value_prop_id.as_b256(),
    }
    .abi_encode()
    .into()
}

pub fn issue_storage_request(
    prepared: &PreparedUpload,
    msp_id: ProviderId,
    peer_ids: &[String],
    replicas: u32,
) -> Bytes {
    IFileSystem::issueStorageRequestCall {
        bucketId: prepared.bucket_id.as_b256(),
        location: Bytes::copy_from_slice(prepared.file_name.as_bytes()),
        fingerprint: prepared.fingerprint.as_b256(),
        size: prepared.file_size,
        mspId: msp_id.as_b256(),
        peerIds: peer_ids
            .iter()
            .map(|id| Bytes::copy_from_slice(id.as_bytes()))
            .collect(),
        replicationLevel: REPLICATION_LEVEL_CUSTOM,
        replicas,
    }
    .abi_encode()
    .into()
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::SolCall;
    use haven_core::{ProviderId, ValuePropId};

    use super::{IFileSystem, create_bucket};

    #[test]
    fn create_bucket_calldata_round_trips() {
        let data = create_bucket(
            ProviderId::new([1; 32]),
            "game-assets",
            false,
            ValuePropId::new([2; 32]),
        );
        assert_eq!(&data[..4], IFileSystem::createBucketCall::SELECTOR.as_slice());
        let call = IFileSystem::createBucketCall::abi_decode(&data).unwrap();
        assert_eq!(call.name.as_ref(), b"game-assets");
        assert!(!call.isPrivate);
        assert_eq!(call.valuePropId, ValuePropId::new([2; 32]).as_b256());
    }
}
