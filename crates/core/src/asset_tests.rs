// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn write_temp(content: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file.flush().unwrap();
    file
}

fn read_asset(asset: &FileAsset) -> Vec<u8> {
    let mut out = Vec::new();
    asset.copy_to(&mut out).unwrap();
    out
}

#[test]
fn local_small_file_hashes_and_caches() {
    let content = "test content ♥".as_bytes();
    let file = write_temp(content);

    let mut asset = FileAsset::local(file.path());
    assert_eq!(read_asset(&asset), content);

    let sum = asset.sha1sum().unwrap();
    assert_eq!(sum, "e5a07c60318532612d09da40e729bccf71018ed7");

    // Small files are cached after one hash pass, and the cache serves reads.
    assert_eq!(asset.cached(), Some(content));
    assert_eq!(read_asset(&asset), content);
}

#[test]
fn large_file_is_not_cached() {
    let content = vec![0x41u8; 17 * 1024];
    let file = write_temp(&content);

    let mut asset = FileAsset::local(file.path());
    let sum = asset.sha1sum().unwrap();
    assert!(asset.cached().is_none());

    // The hash matches what a plain stream hash of open() produces.
    let mut reader = asset.open().unwrap();
    let streamed = FileAsset::stream_sha1(&mut reader).unwrap();
    assert_eq!(sum, streamed);
}

#[test]
fn zip_entry_reads_and_hashes() {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("assets.zip");
    let file = std::fs::File::create(&archive_path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("roles/web/motd", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"welcome\n").unwrap();
    zip.finish().unwrap();

    let mut asset = FileAsset::zip(&archive_path, "roles/web/motd");
    assert_eq!(read_asset(&asset), b"welcome\n");

    asset.sha1sum().unwrap();
    assert_eq!(asset.cached(), Some(b"welcome\n".as_slice()));
}

#[test]
fn serialised_assets_ship_cached_bytes_inline() {
    let file = write_temp(b"inline me");
    let mut asset = FileAsset::local(file.path());
    asset.sha1sum().unwrap();

    let value = serde_json::to_value(&asset).unwrap();
    assert_eq!(value["type"], "local");
    assert!(value["cached"].is_string());

    let parsed: FileAsset = serde_json::from_value(value).unwrap();
    assert_eq!(parsed.cached(), Some(b"inline me".as_slice()));
    assert_eq!(parsed, asset);
}

#[test]
fn uncached_asset_serialises_without_cached_key() {
    let asset = FileAsset::local("/srv/data.bin");
    let value = serde_json::to_value(&asset).unwrap();
    assert!(value.get("cached").is_none());
    assert!(value.get("archive").is_none());
}

#[test]
fn unknown_asset_type_is_rejected() {
    let err = serde_json::from_value::<FileAsset>(serde_json::json!({
        "type": "ftp",
        "path": "/x",
    }))
    .unwrap_err();
    assert!(err.to_string().contains("unknown file asset type"));
}

#[test]
fn remote_assets_serialise_as_their_local_path() {
    struct NoFetch;
    impl FetchFile for NoFetch {
        fn fetch(&self, _path: &Path, _out: &mut dyn Write) -> Result<(), ActionError> {
            Err(ActionError::Message("unreachable".to_string()))
        }
    }

    let asset = FileAsset::Remote {
        path: PathBuf::from("/srv/data.bin"),
        fetch: Arc::new(NoFetch),
    };
    let value = serde_json::to_value(&asset).unwrap();
    assert_eq!(value["type"], "local");
    assert_eq!(value["path"], "/srv/data.bin");
}
