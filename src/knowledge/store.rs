//! Knowledge Store - rusqlite 기반 인덱스 매니페스트
//!
//! 디스크에 저장된 벡터 인덱스가 어떤 PDF/설정으로 만들어졌는지 기록합니다.
//! 지문(fingerprint)이 일치하면 인덱스를 재사용하고, 다르면 다시 만듭니다.
//! 저장 위치: ~/.medical-rag/index.db

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::AppConfig;

// ============================================================================
// Types
// ============================================================================

/// 인덱스 지문 (SHA-256 hex)
///
/// PDF 내용, 분할 설정, 청크 제한, 임베딩 모델이 하나라도 바뀌면 달라집니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IndexFingerprint(String);

impl IndexFingerprint {
    /// 지문 계산
    pub fn compute(pdf_bytes: &[u8], config: &AppConfig) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(pdf_bytes);
        hasher.update(format!(
            "|chunk_size={}|chunk_overlap={}|max_chunks={:?}|embed_model={}",
            config.chunk_size, config.chunk_overlap, config.max_chunks, config.embed_model
        ));
        Self(format!("{:x}", hasher.finalize()))
    }

    /// PDF 파일을 읽어 지문 계산
    pub fn from_file(path: &Path, config: &AppConfig) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read PDF for fingerprint: {}", path.display()))?;
        Ok(Self::compute(&bytes, config))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 표시용 앞 12자리
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

/// 인덱스 매니페스트
#[derive(Debug, Clone, Serialize)]
pub struct IndexManifest {
    pub fingerprint: IndexFingerprint,
    pub pdf_path: String,
    pub chunk_count: usize,
    pub embed_model: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// KnowledgeStore
// ============================================================================

/// Knowledge Store - 매니페스트 저장소
pub struct KnowledgeStore {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl KnowledgeStore {
    /// 저장소 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite database")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.to_path_buf(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// DB 경로 반환
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    /// 스키마 초기화
    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS index_manifest (
                fingerprint TEXT PRIMARY KEY,
                pdf_path TEXT NOT NULL,
                chunk_count INTEGER NOT NULL,
                embed_model TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create index_manifest table")?;

        tracing::debug!("Manifest store initialized at {:?}", self.db_path);
        Ok(())
    }

    /// 매니페스트 기록
    ///
    /// 벡터 테이블은 하나뿐이므로 이전 매니페스트는 모두 지웁니다.
    pub fn record_manifest(&self, manifest: &IndexManifest) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM index_manifest", [])?;
        tx.execute(
            "INSERT INTO index_manifest
                (fingerprint, pdf_path, chunk_count, embed_model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                manifest.fingerprint.as_str(),
                manifest.pdf_path,
                manifest.chunk_count as i64,
                manifest.embed_model,
                manifest.created_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert manifest")?;
        tx.commit()?;

        tracing::info!(
            "Recorded index manifest {} ({} chunks)",
            manifest.fingerprint.short(),
            manifest.chunk_count
        );
        Ok(())
    }

    /// 지문으로 매니페스트 조회
    pub fn get_manifest(&self, fingerprint: &IndexFingerprint) -> Result<Option<IndexManifest>> {
        let conn = self.lock()?;

        let manifest = conn
            .query_row(
                "SELECT fingerprint, pdf_path, chunk_count, embed_model, created_at
                 FROM index_manifest WHERE fingerprint = ?1",
                params![fingerprint.as_str()],
                row_to_manifest,
            )
            .optional()?;

        Ok(manifest)
    }

    /// 가장 최근 매니페스트
    pub fn latest_manifest(&self) -> Result<Option<IndexManifest>> {
        let conn = self.lock()?;

        let manifest = conn
            .query_row(
                "SELECT fingerprint, pdf_path, chunk_count, embed_model, created_at
                 FROM index_manifest ORDER BY created_at DESC LIMIT 1",
                [],
                row_to_manifest,
            )
            .optional()?;

        Ok(manifest)
    }

    /// 매니페스트 모두 삭제
    pub fn clear(&self) -> Result<usize> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM index_manifest", [])?)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn row_to_manifest(row: &Row<'_>) -> rusqlite::Result<IndexManifest> {
    Ok(IndexManifest {
        fingerprint: IndexFingerprint(row.get(0)?),
        pdf_path: row.get(1)?,
        chunk_count: row.get::<_, i64>(2)?.max(0) as usize,
        embed_model: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
    })
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ============================================================================
// Tests
// ============================================================================
