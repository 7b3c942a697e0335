// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use azstorage::raw::format_content_md5;
use azstorage::raw::oio::read_up_to;
use azstorage::raw::oio::BytesSource;
use azstorage::raw::Operation;
use azstorage::services::BlockEntry;
use azstorage::services::BlockListingFilter;
use azstorage::services::BlockSearchMode;
use azstorage::*;
use base64::engine::general_purpose;
use base64::Engine;
use bytes::Bytes;
use common::*;
use http::StatusCode;
use pretty_assertions::assert_eq;

const BLOCK_SIZE: usize = 256 * KIB;

fn small_options() -> BlobRequestOptions {
    BlobRequestOptions::default()
        .with_single_blob_put_threshold(MIB)
        .with_block_size(BLOCK_SIZE)
}

/// Index encoded in the tail of a block id.
fn block_index(id: &str) -> usize {
    let raw = general_purpose::STANDARD.decode(id).unwrap();
    let raw = String::from_utf8(raw).unwrap();
    raw.rsplit('-').next().unwrap().parse().unwrap()
}

#[derive(Debug)]
struct XorPolicy;

struct XorEncryptor;

impl Encryptor for XorEncryptor {
    fn update(&mut self, plaintext: &[u8]) -> Result<Bytes> {
        Ok(plaintext.iter().map(|b| b ^ 0x5a).collect::<Vec<_>>().into())
    }

    fn finalize(&mut self) -> Result<Bytes> {
        Ok(Bytes::from_static(b"\x00\x00"))
    }
}

impl EncryptionPolicy for XorPolicy {
    fn create_encryptor(
        &self,
        metadata: &mut HashMap<String, String>,
    ) -> Result<Box<dyn Encryptor>> {
        metadata.insert("encryption".to_string(), "xor".to_string());
        Ok(Box::new(XorEncryptor))
    }

    fn decrypt(&self, metadata: &HashMap<String, String>, data: Bytes) -> Result<Bytes> {
        assert_eq!(metadata.get("encryption").map(String::as_str), Some("xor"));
        let body = &data[..data.len() - 2];
        Ok(body.iter().map(|b| b ^ 0x5a).collect::<Vec<_>>().into())
    }
}

#[tokio::test]
async fn test_upload_small_blob_with_single_put() -> Result<()> {
    init_logger();
    let service = FakeBlobService::new();
    let mut blob = service.client().block_blob("container", "hello.txt");
    let ctx = OperationContext::new();

    let mut source = BytesSource::from("Hello, World!");
    blob.upload(&mut source, Some(13), None, None, &ctx).await?;

    assert_eq!(service.count(Operation::PutBlob), 1);
    assert_eq!(service.count(Operation::PutBlock), 0);
    assert_eq!(blob.properties().length, Some(13));
    assert!(blob.properties().etag.is_some());

    let bs = blob.download(None, None, &ctx).await?;
    assert_eq!(bs.as_ref(), b"Hello, World!");
    Ok(())
}

#[tokio::test]
async fn test_upload_empty_blob() -> Result<()> {
    let service = FakeBlobService::new();
    let mut blob = service.client().block_blob("container", "empty");
    let ctx = OperationContext::new();

    let mut source = BytesSource::from(Vec::new());
    blob.upload(&mut source, None, None, None, &ctx).await?;

    assert_eq!(service.count(Operation::PutBlob), 1);
    assert_eq!(service.blob("container", "empty").unwrap().content, Vec::<u8>::new());
    Ok(())
}

#[tokio::test]
async fn test_upload_threshold_boundary() -> Result<()> {
    let options = small_options();

    for length in [None, Some(MIB as u64)] {
        let service = FakeBlobService::new();
        let mut blob = service.client().block_blob("container", "exact");
        let content = gen_bytes(MIB);

        let mut source = BytesSource::new(content.clone());
        blob.upload(&mut source, length, None, Some(&options), &OperationContext::new())
            .await?;

        assert_eq!(service.count(Operation::PutBlob), 1, "length: {length:?}");
        assert_eq!(service.count(Operation::PutBlock), 0, "length: {length:?}");
        assert_eq!(service.blob("container", "exact").unwrap().content, content.to_vec());
    }

    for length in [None, Some(MIB as u64 + 1)] {
        let service = FakeBlobService::new();
        let mut blob = service.client().block_blob("container", "over");
        let content = gen_bytes(MIB + 1);

        let mut source = BytesSource::new(content.clone());
        blob.upload(&mut source, length, None, Some(&options), &OperationContext::new())
            .await?;

        assert_eq!(service.count(Operation::PutBlob), 0, "length: {length:?}");
        assert_eq!(service.count(Operation::PutBlock), 5, "length: {length:?}");
        assert_eq!(service.count(Operation::PutBlockList), 1, "length: {length:?}");
        assert_eq!(service.blob("container", "over").unwrap().content, content.to_vec());
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_upload_commits_blocks_in_source_order() -> Result<()> {
    init_logger();
    let service = FakeBlobService::new();
    service.delay_blocks(Duration::from_millis(50));
    let mut blob = service.client().block_blob("container", "ordered");
    let options = small_options().with_concurrent_request_count(4);

    let content = gen_bytes(8 * BLOCK_SIZE + 100);
    let mut source = BytesSource::new(content.clone());
    blob.upload(&mut source, None, None, Some(&options), &OperationContext::new())
        .await?;

    assert_eq!(service.count(Operation::PutBlock), 9);
    assert_eq!(service.count(Operation::PutBlockList), 1);
    assert!(service.max_in_flight() <= 4);

    let stored = service.blob("container", "ordered").unwrap();
    assert_eq!(stored.content, content.to_vec());
    let indexes: Vec<usize> = stored.committed.iter().map(|(id, _)| block_index(id)).collect();
    assert_eq!(indexes, (0..9).collect::<Vec<_>>());

    // Every id has the same length.
    let lens: Vec<usize> = stored.committed.iter().map(|(id, _)| id.len()).collect();
    assert!(lens.windows(2).all(|w| w[0] == w[1]));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_upload_retries_failed_block_with_same_body() -> Result<()> {
    let service = FakeBlobService::new();
    service.fail(Operation::PutBlock, StatusCode::SERVICE_UNAVAILABLE, 2);
    let mut blob = service.client().block_blob("container", "retried");
    let options = small_options().with_concurrent_request_count(1);

    let content = gen_bytes(3 * BLOCK_SIZE);
    let mut source = BytesSource::new(content.clone());
    blob.upload(
        &mut source,
        Some(content.len() as u64),
        None,
        Some(&options),
        &OperationContext::new(),
    )
    .await?;

    let requests = service.requests();
    let failed: Vec<_> = requests
        .iter()
        .filter(|r| r.operation == Operation::PutBlock && r.status.is_server_error())
        .collect();
    assert_eq!(failed.len(), 2);
    for f in failed {
        let success = requests
            .iter()
            .find(|r| {
                r.operation == Operation::PutBlock
                    && r.status == StatusCode::CREATED
                    && r.query.get("blockid") == f.query.get("blockid")
            })
            .expect("failed block must be retried");
        assert_eq!(success.body, f.body);
    }

    assert_eq!(service.count(Operation::PutBlockList), 1);
    assert_eq!(service.blob("container", "retried").unwrap().content, content.to_vec());
    Ok(())
}

#[tokio::test]
async fn test_upload_block_failure_skips_commit() -> Result<()> {
    let service = FakeBlobService::new();
    service.fail(Operation::PutBlock, StatusCode::BAD_REQUEST, 1);
    let mut blob = service.client().block_blob("container", "broken");

    let content = gen_bytes(4 * BLOCK_SIZE);
    let mut source = BytesSource::new(content);
    let err = blob
        .upload(&mut source, None, None, Some(&small_options()), &OperationContext::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unexpected);
    assert_eq!(err.context("status"), Some("400"));
    assert_eq!(service.count(Operation::PutBlockList), 0);
    assert!(service.blob("container", "broken").is_none());
    assert!(blob.properties().etag.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_block_failure_cancels_other_uploads() -> Result<()> {
    let service = FakeBlobService::new();
    service.delay_blocks(Duration::from_millis(50));
    service.fail(Operation::PutBlock, StatusCode::BAD_REQUEST, 1);
    let mut blob = service.client().block_blob("container", "cancelled");
    let options = small_options().with_concurrent_request_count(4);

    let content = gen_bytes(8 * BLOCK_SIZE + 3);
    let length = content.len() as u64;
    let mut source = BytesSource::new(content);
    let err = blob
        .upload(&mut source, Some(length), None, Some(&options), &OperationContext::new())
        .await
        .unwrap_err();

    assert_eq!(err.context("status"), Some("400"));
    assert!(service.max_in_flight() > 1);
    assert_eq!(service.in_flight(), 0);

    // Nothing still running can reach the service later.
    let seen = service.requests().len();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(service.requests().len(), seen);
    assert_eq!(service.in_flight(), 0);
    assert_eq!(service.count(Operation::PutBlockList), 0);
    assert!(service.blob("container", "cancelled").is_none());
    Ok(())
}

#[tokio::test]
async fn test_upload_rejects_small_custom_block_size() -> Result<()> {
    let service = FakeBlobService::new();
    let mut blob = service.client().block_blob("container", "huge");
    let options = BlobRequestOptions::default().with_block_size(MIN_BLOCK_SIZE);

    let mut source = BytesSource::from(Vec::new());
    let length = MIN_BLOCK_SIZE as u64 * MAX_BLOCK_COUNT + 1;
    let err = blob
        .upload(&mut source, Some(length), None, Some(&options), &OperationContext::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    assert!(service.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_upload_rejects_invalid_options() -> Result<()> {
    let service = FakeBlobService::new();
    let mut blob = service.client().block_blob("container", "invalid");
    let options = BlobRequestOptions::default().with_concurrent_request_count(0);

    let mut source = BytesSource::from("data");
    let err = blob
        .upload(&mut source, None, None, Some(&options), &OperationContext::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    assert!(service.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_upload_short_source() -> Result<()> {
    let service = FakeBlobService::new();
    let mut blob = service.client().block_blob("container", "short");

    let mut source = BytesSource::new(gen_bytes(MIB + BLOCK_SIZE));
    let err = blob
        .upload(
            &mut source,
            Some(2 * MIB as u64),
            None,
            Some(&small_options()),
            &OperationContext::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(service.count(Operation::PutBlockList), 0);
    Ok(())
}

#[tokio::test]
async fn test_upload_stores_content_md5() -> Result<()> {
    let service = FakeBlobService::new();
    let mut blob = service.client().block_blob("container", "md5");
    let options = small_options()
        .with_store_blob_content_md5(true)
        .with_use_transactional_md5(true);

    let content = gen_bytes(2 * MIB);
    let mut source = BytesSource::new(content.clone());
    blob.upload(&mut source, None, None, Some(&options), &OperationContext::new())
        .await?;

    let expected = format_content_md5(&content);
    let commit = service
        .requests()
        .into_iter()
        .find(|r| r.operation == Operation::PutBlockList)
        .unwrap();
    assert_eq!(commit.header("x-ms-blob-content-md5"), Some(expected.as_str()));
    for r in service.requests().iter().filter(|r| r.operation == Operation::PutBlock) {
        assert_eq!(r.header("content-md5"), Some(format_content_md5(&r.body).as_str()));
    }

    let bs = blob.download(None, None, &OperationContext::new()).await?;
    assert_eq!(bs, content);
    assert_eq!(blob.properties().content_md5.as_deref(), Some(expected.as_str()));
    Ok(())
}

#[tokio::test]
async fn test_upload_sends_metadata_and_condition() -> Result<()> {
    let service = FakeBlobService::new();
    let mut blob = service.client().block_blob("container", "meta");
    blob.metadata_mut()
        .insert("owner".to_string(), "tests".to_string());

    let ctx = OperationContext::new();
    let mut source = BytesSource::from("first");
    blob.upload(&mut source, None, Some(&AccessCondition::if_not_exists()), None, &ctx)
        .await?;
    assert_eq!(
        service.blob("container", "meta").unwrap().metadata.get("owner"),
        Some(&"tests".to_string())
    );

    let mut source = BytesSource::from("second");
    let err = blob
        .upload(&mut source, None, Some(&AccessCondition::if_not_exists()), None, &ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConditionNotMatch);
    assert_eq!(service.blob("container", "meta").unwrap().content, b"first".to_vec());
    Ok(())
}

#[tokio::test]
async fn test_upload_encrypted() -> Result<()> {
    let service = FakeBlobService::new();
    let mut blob = service.client().block_blob("container", "secret");
    let options = small_options().with_encryption_policy(XorPolicy);

    for size in [100, 5 * BLOCK_SIZE + 7] {
        let content = gen_bytes(size);
        let mut source = BytesSource::new(content.clone());
        blob.upload(
            &mut source,
            Some(size as u64),
            None,
            Some(&options),
            &OperationContext::new(),
        )
        .await?;

        let stored = service.blob("container", "secret").unwrap();
        assert_eq!(stored.content.len(), size + 2);
        assert_ne!(stored.content[..size], content[..]);

        let bs = blob
            .download(None, Some(&options), &OperationContext::new())
            .await?;
        assert_eq!(bs, content);
    }
    Ok(())
}

#[tokio::test]
async fn test_upload_encrypted_stops_at_length() -> Result<()> {
    let service = FakeBlobService::new();
    let mut blob = service.client().block_blob("container", "secret");
    let options = small_options().with_encryption_policy(XorPolicy);

    for (size, length) in [(100, 10), (6 * BLOCK_SIZE, 5 * BLOCK_SIZE + 7)] {
        let content = gen_bytes(size);
        let mut source = BytesSource::new(content.clone());
        blob.upload(
            &mut source,
            Some(length as u64),
            None,
            Some(&options),
            &OperationContext::new(),
        )
        .await?;

        let stored = service.blob("container", "secret").unwrap();
        assert_eq!(stored.content.len(), length + 2);
        let bs = blob
            .download(None, Some(&options), &OperationContext::new())
            .await?;
        assert_eq!(bs, content.slice(..length));

        // Bytes past the length are left in the source.
        let rest = read_up_to(&mut source, size).await?;
        assert_eq!(rest, content.slice(length..));
    }
    Ok(())
}

#[tokio::test]
async fn test_upload_block_rejects_encryption() -> Result<()> {
    let service = FakeBlobService::new();
    let blob = service.client().block_blob("container", "secret");
    let options = BlobRequestOptions::default().with_encryption_policy(XorPolicy);

    let mut source = BytesSource::from("block");
    let err = blob
        .upload_block("AAAA", &mut source, None, None, Some(&options), &OperationContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    assert!(service.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_commit_and_download_block_list() -> Result<()> {
    let service = FakeBlobService::new();
    let mut blob = service.client().block_blob("container", "manual");
    let ctx = OperationContext::new();

    for (id, data) in [("AAAA", "hello "), ("AAAB", "world"), ("AAAC", "!")] {
        let mut source = BytesSource::from(data);
        blob.upload_block(id, &mut source, None, None, None, &ctx).await?;
    }
    assert_eq!(service.uncommitted("container", "manual").len(), 3);

    blob.commit_block_list(
        &[BlockEntry::latest("AAAA"), BlockEntry::uncommitted("AAAB")],
        None,
        None,
        &ctx,
    )
    .await?;
    assert_eq!(service.blob("container", "manual").unwrap().content, b"hello world".to_vec());

    let mut source = BytesSource::from("again");
    blob.upload_block("AAAD", &mut source, Some(5), None, None, &ctx).await?;

    let committed = blob
        .download_block_list(BlockListingFilter::Committed, None, None, &ctx)
        .await?;
    assert_eq!(
        committed,
        vec![
            BlockEntry {
                id: "AAAA".to_string(),
                size: Some(6),
                search_mode: BlockSearchMode::Committed,
            },
            BlockEntry {
                id: "AAAB".to_string(),
                size: Some(5),
                search_mode: BlockSearchMode::Committed,
            },
        ]
    );

    let all = blob
        .download_block_list(BlockListingFilter::All, None, None, &ctx)
        .await?;
    assert_eq!(all.len(), 3);
    assert_eq!(all[2].id, "AAAD");
    assert_eq!(all[2].search_mode, BlockSearchMode::Uncommitted);

    // Keep the committed blocks and append the new one.
    blob.commit_block_list(
        &[
            BlockEntry::committed("AAAA"),
            BlockEntry::committed("AAAB"),
            BlockEntry::latest("AAAD"),
        ],
        None,
        None,
        &ctx,
    )
    .await?;
    let bs = blob.download(None, None, &ctx).await?;
    assert_eq!(bs.as_ref(), b"hello worldagain");
    Ok(())
}

#[tokio::test]
async fn test_commit_unknown_block_fails() -> Result<()> {
    let service = FakeBlobService::new();
    let mut blob = service.client().block_blob("container", "unknown");

    let err = blob
        .commit_block_list(&[BlockEntry::latest("ZZZZ")], None, None, &OperationContext::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unexpected);
    assert_eq!(err.context("error_code"), Some("InvalidBlockList"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_download_retries_md5_mismatch() -> Result<()> {
    let service = FakeBlobService::new();
    let mut blob = service.client().block_blob("container", "corrupted");
    let ctx = OperationContext::new();

    let mut source = BytesSource::from("original");
    blob.upload(&mut source, None, None, None, &ctx).await?;
    service.corrupt("container", "corrupted", b"tampered");

    let ctx = OperationContext::new();
    let err = blob.download(None, None, &ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContentMismatch);
    assert!(err.is_persistent());
    assert_eq!(ctx.attempts(), DEFAULT_MAX_ATTEMPTS);

    let options = BlobRequestOptions::default().with_disable_content_md5_validation(true);
    let bs = blob.download(None, Some(&options), &OperationContext::new()).await?;
    assert_eq!(bs.as_ref(), b"tampered");
    Ok(())
}

#[tokio::test]
async fn test_fetch_properties_and_delete() -> Result<()> {
    let service = FakeBlobService::new();
    let client = service.client();
    let mut blob = client.block_blob("container", "dir/props");
    let ctx = OperationContext::new();

    let mut source = BytesSource::from("0123456789");
    blob.upload(&mut source, None, None, None, &ctx).await?;

    let props = blob.fetch_properties(None, None, &ctx).await?;
    assert_eq!(props.blob_type, BlobType::BlockBlob);
    assert_eq!(props.length, Some(10));
    assert_eq!(blob.properties(), &props);

    let mut page = client.page_blob("container", "dir/props");
    let err = page.fetch_properties(None, None, &ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConditionNotMatch);

    blob.delete(None, None, &ctx).await?;
    assert!(service.blob("container", "dir/props").is_none());

    let err = blob.delete(None, None, &ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn test_open_write_block_blob() -> Result<()> {
    let service = FakeBlobService::new();
    let blob = service.client().block_blob("container", "stream");
    let options = small_options().with_store_blob_content_md5(true);

    let mut w = blob.open_write(None, Some(&options), &OperationContext::new()).await?;
    assert_eq!(w.blob_type(), BlobType::BlockBlob);

    let content = gen_bytes(3 * BLOCK_SIZE + 1000);
    for chunk in content.chunks(100_000) {
        w.write(Bytes::copy_from_slice(chunk)).await?;
    }
    assert_eq!(service.count(Operation::PutBlockList), 0);
    assert!(w.properties().is_none());

    w.close().await?;
    assert_eq!(service.count(Operation::PutBlock), 4);
    assert_eq!(service.count(Operation::PutBlockList), 1);
    assert!(w.properties().is_some());

    let stored = service.blob("container", "stream").unwrap();
    assert_eq!(stored.content, content.to_vec());
    assert_eq!(stored.content_md5, Some(format_content_md5(&content)));

    let err = w.write(Bytes::from("more")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unexpected);
    Ok(())
}

#[tokio::test]
async fn test_open_write_abort() -> Result<()> {
    let service = FakeBlobService::new();
    let blob = service.client().block_blob("container", "aborted");

    let mut w = blob
        .open_write(None, Some(&small_options()), &OperationContext::new())
        .await?;
    w.write(gen_bytes(2 * BLOCK_SIZE + 10)).await?;
    w.abort().await?;

    assert_eq!(service.count(Operation::PutBlockList), 0);
    assert!(service.blob("container", "aborted").is_none());
    assert!(w.close().await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_open_write_failure_poisons_writer() -> Result<()> {
    let service = FakeBlobService::new();
    service.fail(Operation::PutBlock, StatusCode::FORBIDDEN, 1);
    let blob = service.client().block_blob("container", "poisoned");
    let options = small_options().with_concurrent_request_count(1);

    let mut w = blob.open_write(None, Some(&options), &OperationContext::new()).await?;
    let mut failed = None;
    for _ in 0..3 {
        if let Err(err) = w.write(gen_bytes(BLOCK_SIZE)).await {
            failed = Some(err);
            break;
        }
    }
    let failed = match failed {
        Some(err) => err,
        None => w.close().await.unwrap_err(),
    };
    assert_eq!(failed.kind(), ErrorKind::PermissionDenied);

    assert!(w.write(Bytes::from("x")).await.is_err());
    assert!(w.close().await.is_err());
    assert_eq!(service.count(Operation::PutBlockList), 0);
    Ok(())
}
