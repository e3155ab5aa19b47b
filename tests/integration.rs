use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::fs;

use vaultcrypt::codec::{Direction, FileCodec};
use vaultcrypt::config::Config;
use vaultcrypt::error::VaultError;
use vaultcrypt::external::{Editor, FolderBrowser, TarArchiver};
use vaultcrypt::kdf::KdfParams;
use vaultcrypt::walker::{self, OpDescriptor};
use vaultcrypt::workflow::{Engine, Operation};

/// Cheap Argon2 parameters so tests do not pay the moderate preset
fn test_params() -> KdfParams {
    KdfParams {
        memory_cost: 16,
        time_cost: 1,
        parallelism: 1,
    }
}

/// Editor stub that appends a marker line to the file it is given
struct AppendingEditor;

#[async_trait]
impl Editor for AppendingEditor {
    async fn edit(&self, file: &Path) -> vaultcrypt::error::Result<()> {
        let mut content = fs::read(file).await?;
        content.extend_from_slice(b"\nedited");
        fs::write(file, content).await?;
        Ok(())
    }
}

/// Browser stub that drops a marker file into the directory
struct MarkingBrowser;

#[async_trait]
impl FolderBrowser for MarkingBrowser {
    async fn browse(&self, dir: &Path) -> vaultcrypt::error::Result<()> {
        fs::write(dir.join("visited.txt"), b"browsed").await?;
        Ok(())
    }
}

struct TestEnv {
    _tmp: TempDir,
    work: PathBuf,
    config: Config,
    engine: Engine,
}

fn setup_env() -> Result<TestEnv> {
    let tmp = TempDir::new()?;
    let root = tmp.path();
    let config = Config {
        enc_store: root.join("EncStore").to_string_lossy().into_owned(),
        dec_store: root.join("DecStore").to_string_lossy().into_owned(),
        compress_store: root.join("CompressStore").to_string_lossy().into_owned(),
        decompress_store: root.join("DecompressStore").to_string_lossy().into_owned(),
        editor: "true".to_string(),
        browser: "true".to_string(),
    };
    let archiver = Box::new(TarArchiver::new(
        &config.compress_store,
        &config.decompress_store,
    ));
    let engine = Engine::with_collaborators(
        config.clone(),
        test_params(),
        archiver,
        Box::new(AppendingEditor),
        Box::new(MarkingBrowser),
    )?;
    let work = root.join("work");
    std::fs::create_dir_all(&work)?;
    Ok(TestEnv {
        work,
        config,
        engine,
        _tmp: tmp,
    })
}

fn enc_store(env: &TestEnv) -> PathBuf {
    PathBuf::from(&env.config.enc_store)
}

fn dec_store(env: &TestEnv) -> PathBuf {
    PathBuf::from(&env.config.dec_store)
}

#[tokio::test]
async fn single_file_round_trip_boundary_sizes() -> Result<()> {
    let env = setup_env()?;

    // Chunk boundary sizes plus the degenerate empty file
    for size in [0usize, 1, 4095, 4096, 4097, 1_000_000] {
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        let name = format!("blob_{size}.bin");
        let source = env.work.join(&name);
        fs::write(&source, &data).await?;

        let encrypted = env
            .engine
            .try_run(Operation::Encrypt, &source, "round trip pw")
            .await?;
        assert_eq!(encrypted, enc_store(&env).join(format!("{name}.vlt")));
        // Destructive move: the plaintext source is consumed
        assert!(!source.exists());

        let decrypted = env
            .engine
            .try_run(Operation::Decrypt, &encrypted, "round trip pw")
            .await?;
        assert!(!encrypted.exists());
        assert_eq!(fs::read(&decrypted).await?, data, "size {size} mismatch");
    }
    Ok(())
}

#[tokio::test]
async fn wrong_password_fails_authentication() -> Result<()> {
    let env = setup_env()?;
    let source = env.work.join("secret.txt");
    fs::write(&source, b"confidential").await?;

    let encrypted = env
        .engine
        .try_run(Operation::Encrypt, &source, "pw1")
        .await?;

    let err = env
        .engine
        .try_run(Operation::Decrypt, &encrypted, "pw2")
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Authentication));

    // The failed decrypt must not leave a partial artifact behind
    assert!(!dec_store(&env).join("secret.txt").exists());
    // and must not consume the encrypted input
    assert!(encrypted.exists());
    Ok(())
}

#[tokio::test]
async fn salt_and_header_are_fresh_per_encryption() -> Result<()> {
    let codec = FileCodec::new(test_params());
    let tmp = TempDir::new()?;
    let source = tmp.path().join("same.txt");
    fs::write(&source, b"identical plaintext").await?;

    let out1 = tmp.path().join("one.vlt");
    let out2 = tmp.path().join("two.vlt");
    codec.encode(&source, &out1, "same password").await?;
    codec.encode(&source, &out2, "same password").await?;

    // header(24) + salt(16) prefixes must differ between encryptions
    let prefix1 = &fs::read(&out1).await?[..40];
    let prefix2 = &fs::read(&out2).await?[..40];
    assert_ne!(prefix1, prefix2);
    Ok(())
}

async fn build_sample_tree(root: &Path) -> Result<()> {
    fs::create_dir_all(root.join("sub/empty_dir")).await?;
    fs::write(root.join("a.txt"), b"alpha").await?;
    fs::write(root.join("sub/b.txt"), b"bravo").await?;
    Ok(())
}

#[tokio::test]
async fn folder_round_trip_preserves_structure() -> Result<()> {
    let env = setup_env()?;
    let source = env.work.join("tree");
    build_sample_tree(&source).await?;

    let encrypted_root = env
        .engine
        .try_run(Operation::Encrypt, &source, "tree pw")
        .await?;
    assert!(!source.exists());
    assert!(encrypted_root.join("a.txt.vlt").exists());
    assert!(encrypted_root.join("sub/b.txt.vlt").exists());

    let decrypted_root = env
        .engine
        .try_run(Operation::Decrypt, &encrypted_root, "tree pw")
        .await?;
    assert_eq!(fs::read(decrypted_root.join("a.txt")).await?, b"alpha");
    assert_eq!(fs::read(decrypted_root.join("sub/b.txt")).await?, b"bravo");
    // The empty directory survives the round trip
    assert!(decrypted_root.join("sub/empty_dir").is_dir());
    Ok(())
}

#[tokio::test]
async fn failed_tree_decrypt_rolls_back_completely() -> Result<()> {
    let env = setup_env()?;
    let source = env.work.join("tree");
    build_sample_tree(&source).await?;

    let encrypted_root = env
        .engine
        .try_run(Operation::Encrypt, &source, "tree pw")
        .await?;

    // Corrupt one encrypted file past its header and salt
    let victim = encrypted_root.join("sub/b.txt.vlt");
    let mut bytes = fs::read(&victim).await?;
    bytes[45] ^= 0xFF;
    fs::write(&victim, &bytes).await?;

    let err = env
        .engine
        .try_run(Operation::Decrypt, &encrypted_root, "tree pw")
        .await
        .unwrap_err();
    assert!(err.is_authentication());

    // All-or-nothing: no partial target tree remains
    assert!(!dec_store(&env).join("tree").exists());
    // The encrypted source tree is untouched
    assert!(encrypted_root.join("a.txt.vlt").exists());
    assert!(victim.exists());
    Ok(())
}

#[tokio::test]
async fn tree_walk_rejects_plain_files() -> Result<()> {
    let env = setup_env()?;
    let source = env.work.join("not_a_dir.txt");
    fs::write(&source, b"flat").await?;

    let codec = FileCodec::new(test_params());
    let store = enc_store(&env);
    let desc = OpDescriptor {
        target_dir: &store,
        source: &source,
        password: "pw",
        cleanup: false,
    };
    assert!(walker::encrypt_tree(&codec, &desc).await.is_err());
    Ok(())
}

#[tokio::test]
async fn temp_edit_reencrypts_and_removes_scratch() -> Result<()> {
    let env = setup_env()?;
    let source = env.work.join("diary.txt");
    fs::write(&source, b"day one").await?;

    let encrypted = env
        .engine
        .try_run(Operation::Encrypt, &source, "edit pw")
        .await?;

    let reencrypted = env
        .engine
        .try_run(Operation::TempEdit, &encrypted, "edit pw")
        .await?;
    assert_eq!(reencrypted, enc_store(&env).join("diary.txt.vlt"));

    // No plaintext scratch file survives the workflow
    assert!(!dec_store(&env).join("diary.txt").exists());

    // The re-encrypted artifact holds the edited content
    let decrypted = env
        .engine
        .try_run(Operation::Decrypt, &reencrypted, "edit pw")
        .await?;
    assert_eq!(fs::read(&decrypted).await?, b"day one\nedited");
    Ok(())
}

#[tokio::test]
async fn archive_encrypt_decrypt_round_trip() -> Result<()> {
    let env = setup_env()?;
    let source = env.work.join("project");
    build_sample_tree(&source).await?;

    let encrypted = env
        .engine
        .try_run(Operation::ArchiveEncrypt, &source, "tar pw")
        .await?;
    assert_eq!(encrypted, enc_store(&env).join("project.tar.gz.vlt"));
    // Archive encryption leaves the original source in place
    assert!(source.exists());

    // Drop the original so the extracted copy is the only one
    fs::remove_dir_all(&source).await?;

    let extracted = env
        .engine
        .try_run(Operation::ArchiveDecrypt, &encrypted, "tar pw")
        .await?;
    assert!(!encrypted.exists());
    assert_eq!(fs::read(extracted.join("a.txt")).await?, b"alpha");
    assert_eq!(fs::read(extracted.join("sub/b.txt")).await?, b"bravo");
    assert!(extracted.join("sub/empty_dir").is_dir());

    // The intermediate archive was consumed
    assert!(!dec_store(&env).join("project.tar.gz").exists());
    Ok(())
}

#[tokio::test]
async fn archive_temp_edit_removes_scratch_tree() -> Result<()> {
    let env = setup_env()?;
    let source = env.work.join("bundle");
    build_sample_tree(&source).await?;

    let encrypted = env
        .engine
        .try_run(Operation::ArchiveEncrypt, &source, "tar edit pw")
        .await?;
    fs::remove_dir_all(&source).await?;

    let reencrypted = env
        .engine
        .try_run(Operation::ArchiveTempEdit, &encrypted, "tar edit pw")
        .await?;
    assert_eq!(reencrypted, enc_store(&env).join("bundle.tar.gz.vlt"));

    // The extracted scratch tree is gone once re-encryption succeeds
    let scratch = PathBuf::from(&env.config.decompress_store).join("bundle");
    assert!(!scratch.exists());

    // The browser stub's marker made it into the re-encrypted archive
    let extracted = env
        .engine
        .try_run(Operation::ArchiveDecrypt, &reencrypted, "tar edit pw")
        .await?;
    assert_eq!(fs::read(extracted.join("visited.txt")).await?, b"browsed");
    assert_eq!(fs::read(extracted.join("a.txt")).await?, b"alpha");
    Ok(())
}

#[tokio::test]
async fn truncated_input_fails_authentication() -> Result<()> {
    let env = setup_env()?;
    let source = env.work.join("short.bin");
    fs::write(&source, b"not an encrypted file").await?;

    // Shorter than header + salt: must be rejected, not crash
    let err = env
        .engine
        .try_run(Operation::Decrypt, &source, "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Authentication));
    assert!(source.exists());
    Ok(())
}

#[tokio::test]
async fn run_reports_failure_as_false() -> Result<()> {
    let env = setup_env()?;
    let missing = env.work.join("nope.txt");
    assert!(!env.engine.run(Operation::Encrypt, &missing, "pw").await);

    let present = env.work.join("yes.txt");
    fs::write(&present, b"ok").await?;
    assert!(env.engine.run(Operation::Encrypt, &present, "pw").await);
    Ok(())
}

#[tokio::test]
async fn editor_failure_keeps_scratch_for_recovery() -> Result<()> {
    struct FailingEditor;

    #[async_trait]
    impl Editor for FailingEditor {
        async fn edit(&self, _file: &Path) -> vaultcrypt::error::Result<()> {
            Err(VaultError::editor("editor crashed"))
        }
    }

    let tmp = TempDir::new()?;
    let root = tmp.path();
    let config = Config {
        enc_store: root.join("EncStore").to_string_lossy().into_owned(),
        dec_store: root.join("DecStore").to_string_lossy().into_owned(),
        compress_store: root.join("CompressStore").to_string_lossy().into_owned(),
        decompress_store: root.join("DecompressStore").to_string_lossy().into_owned(),
        editor: "true".to_string(),
        browser: "true".to_string(),
    };
    let archiver = Box::new(TarArchiver::new(
        &config.compress_store,
        &config.decompress_store,
    ));
    let engine = Engine::with_collaborators(
        config.clone(),
        test_params(),
        archiver,
        Box::new(FailingEditor),
        Box::new(MarkingBrowser),
    )?;

    let source = root.join("note.txt");
    fs::write(&source, b"content").await?;
    let encrypted = engine.try_run(Operation::Encrypt, &source, "pw").await?;

    let err = engine
        .try_run(Operation::TempEdit, &encrypted, "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Editor(_)));

    // The decrypted scratch stays on disk so the user can recover it
    assert!(PathBuf::from(&config.dec_store).join("note.txt").exists());
    Ok(())
}

#[tokio::test]
async fn target_name_mapping() {
    let enc = FileCodec::target_name(Direction::Encrypt, Path::new("report.pdf")).unwrap();
    assert_eq!(enc, PathBuf::from("report.pdf.vlt"));
    let dec = FileCodec::target_name(Direction::Decrypt, Path::new("report.pdf.vlt")).unwrap();
    assert_eq!(dec, PathBuf::from("report.pdf"));
}
