//! Upload → finalize → build → store → delete, end to end

use drvpack::exceptions::DrvpackError;
use drvpack::store::{FilesystemBlobStore, LocalIndex, MemoryBlobStore, PackageStore, blob_key};
use drvpack::upload::SessionManager;
use drvpack::{BuildOptions, build_package};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const INF: &str = r#"; Contoso universal print driver
[Version]
Signature="$Windows NT$"
Class=Printer
ClassGUID={4D36E979-E325-11CE-BFC1-08002BE10318}
Provider=%Contoso%
DriverVer=11/04/2022,10.0.22621.1

[Manufacturer]
%Contoso%=Contoso,NTamd64.10.0,NTarm64.10.0

[Contoso.NTamd64.10.0]
%Model1%=Contoso_Install,USBPRINT\ContosoOffice_5E1A
%Model2%=Contoso_Install,USBPRINT\ContosoOffice_7F20

[Contoso.NTarm64.10.0]
%Model1%=Contoso_Install,USBPRINT\ContosoOffice_5E1A

[Contoso_Install]
CopyFiles=Contoso_Files,@contoso.ini
DriverFile=unidrv.dll
DataFile=contoso.gpd

[Contoso_Files]
unidrv.dll
contoso.gpd

[SourceDisksFiles]
unidrv.dl_=1
contoso.gpd=1

[DestinationDirs]
DefaultDestDir=66000

[Strings]
Contoso="Contoso"
Model1="Contoso Office 5E1A"
Model2="Contoso Office 7F20"
"#;

/// Upload `files` through a session in shuffled, duplicated chunks
fn upload(manager: &SessionManager, files: &[(&str, Vec<u8>)]) -> drvpack::Result<(String, std::path::PathBuf)> {
    let status = manager.create_session(None)?;
    let id = status.session_id;
    for (name, bytes) in files {
        let chunks: Vec<&[u8]> = bytes.chunks(7).collect();
        let total = chunks.len().max(1) as u32;
        if chunks.is_empty() {
            manager.save_chunk(&id, name, 0, &[], 1)?;
            continue;
        }
        let mut order: Vec<usize> = (0..chunks.len()).rev().collect();
        order.push(0);
        for i in order {
            manager.save_chunk(&id, name, i as u32, chunks[i], total)?;
        }
    }
    let root = manager.finalize_session(&id)?;
    Ok((id, root))
}

fn driver_files() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("Contoso/contoso.inf", INF.as_bytes().to_vec()),
        ("Contoso/unidrv.dl_", b"MSCF compressed unidrv".to_vec()),
        ("Contoso/contoso.gpd", b"*GPDFileVersion: \"1.0\"\r\n*ModelName: \"Contoso\"".to_vec()),
        ("Contoso/contoso.ini", b"[Options]\r\nDuplex=1".to_vec()),
    ]
}

fn options(seed: &str, at: i64) -> BuildOptions {
    BuildOptions {
        key_seed: Some(seed.to_string()),
        created_at: chrono::DateTime::from_timestamp(at, 0),
        ..Default::default()
    }
}

#[test]
fn test_full_pipeline() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let manager = SessionManager::new(Duration::from_secs(60), Some(temp.path().join("uploads")));

    let (session_id, root) = upload(&manager, &driver_files())?;
    assert_eq!(fs::read_to_string(root.join("Contoso/contoso.inf"))?, INF);

    let built = build_package(&root, &temp.path().join("out/contoso.pd"), "uploader", &options("pipeline", 1_650_000_000))?;
    assert_eq!(built.manifest.driver_metadata.entry_point, "Contoso/contoso.inf");
    assert_eq!(built.manifest.driver_metadata.display_name, "Contoso Office 5E1A");
    assert!(built.manifest.driver_metadata.architecture.contains(&"amd64".to_string()));
    assert!(built.manifest.driver_metadata.architecture.contains(&"arm64".to_string()));
    assert!(built.dependency_report.valid);
    assert!(manager.cleanup_session(&session_id));
    assert!(!root.exists());

    let storage = TempDir::new()?;
    let blobs = Arc::new(FilesystemBlobStore::new(storage.path().join("blobs"))?);
    let index = Arc::new(LocalIndex::open(storage.path().join("index.json"))?);
    let store = PackageStore::new(blobs.clone(), index);

    let saved = store.save(&built.archive, "contoso.pd", "uploader", Some(&built.content_hash))?;
    assert!(!saved.is_duplicate);
    let key = blob_key(&built.content_hash)?;
    assert!(storage.path().join("blobs").join(&key).is_file());

    let models = store.list_models()?;
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].pnp_id.as_deref(), Some("USBPRINT\\ContosoOffice_5E1A"));

    // Same driver uploaded again and rebuilt at a later time
    let (second_session, second_root) = upload(&manager, &driver_files())?;
    let rebuilt = build_package(&second_root, &temp.path().join("out/again.pd"), "someone", &options("pipeline", 1_750_000_000))?;
    assert_eq!(rebuilt.content_hash, built.content_hash);
    let duplicate = store.save(&rebuilt.archive, "again.pd", "someone", None)?;
    assert!(duplicate.is_duplicate);
    assert_eq!(duplicate.record.id, saved.record.id);
    assert_eq!(store.list_packages()?.len(), 1);
    manager.cleanup_session(&second_session);

    let deleted = store.delete(saved.record.id, false)?;
    assert!(deleted.file_deleted);
    assert!(!storage.path().join("blobs").join(&key).exists());
    assert!(!storage.path().join("blobs").join(&key[..2]).exists());
    assert!(store.list_packages()?.is_empty());
    Ok(())
}

#[test]
fn test_dedupe_performs_no_blob_writes() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let manager = SessionManager::new(Duration::from_secs(60), Some(temp.path().to_path_buf()));
    let (_, root) = upload(&manager, &driver_files())?;

    let blobs = Arc::new(MemoryBlobStore::new());
    let store = PackageStore::new(blobs.clone(), Arc::new(LocalIndex::in_memory()));

    let first = build_package(&root, &temp.path().join("a.pd"), "a", &options("one", 1))?;
    let second = build_package(&root, &temp.path().join("b.pd"), "b", &options("two", 2))?;
    store.save(&first.archive, "a.pd", "a", None)?;
    assert_eq!(blobs.write_count(), 1);
    let outcome = store.save(&second.archive, "b.pd", "b", None)?;
    assert!(outcome.is_duplicate);
    assert_eq!(blobs.write_count(), 1);
    Ok(())
}

#[test]
fn test_incomplete_upload_cannot_be_built() -> anyhow::Result<()> {
    let temp = TempDir::new()?;
    let manager = SessionManager::new(Duration::from_secs(60), Some(temp.path().to_path_buf()));
    let status = manager.create_session(None)?;

    manager.save_chunk(&status.session_id, "contoso.inf", 1, b"tail", 2)?;
    match manager.finalize_session(&status.session_id) {
        Err(DrvpackError::MissingChunk { file_name, index }) => {
            assert_eq!(file_name, "contoso.inf");
            assert_eq!(index, 0);
        }
        other => panic!("expected MissingChunk, got {other:?}"),
    }
    assert!(!status.directory.join("_assembled/contoso.inf").exists());

    // The sweep wins the race against a late finalize
    manager.sweep_expired_at(status.expires_at);
    assert!(matches!(
        manager.finalize_session(&status.session_id),
        Err(DrvpackError::SessionNotFound(_))
    ));
    assert!(!status.directory.exists());
    Ok(())
}
