//! CLI 모듈
//!
//! medical-rag CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chat::{ChatSession, Role};
use crate::config::{normalize_host, AppConfig};
use crate::embedding::create_embedder;
use crate::knowledge::{KnowledgeStore, LanceVectorStore, VectorStore};
use crate::llm::setup_llm;
use crate::rag::{
    build_or_load_index, format_medical_answer, get_sources_from_response,
    initialize_rag_components, IndexStatus, RagComponents,
};

const TITLE: &str = "Medical Information Assistant 🩺";

const ABOUT: &str = "\
Ask your medical questions and get information from the Gale Encyclopedia of Medicine.
Answers are generated with RAG (Retrieval Augmented Generation) over a local Ollama model.

How to use:
  1. Type your medical question and press Enter
  2. Wait for the response (it may take a few seconds)
  3. Type /help for commands";

const REPL_HELP: &str = "\
Commands:
  /history   show the conversation so far
  /clear     clear chat history
  /sources   toggle source display
  /help      show this help
  /quit      exit (Ctrl-D also works)";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "medical-rag")]
#[command(version, about = "의료 백과사전 기반 RAG 챗봇", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 원본 PDF 경로
    #[arg(long, global = true)]
    pub pdf: Option<PathBuf>,

    /// 답변 생성 모델
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// 임베딩 모델
    #[arg(long, global = true)]
    pub embed_model: Option<String>,

    /// 인덱싱할 최대 청크 수 (0 = 전체)
    #[arg(long, global = true)]
    pub max_chunks: Option<usize>,

    /// 질문당 검색할 청크 수
    #[arg(long, global = true)]
    pub top_k: Option<usize>,

    /// Ollama 서버 주소
    #[arg(long, global = true)]
    pub ollama_host: Option<String>,

    /// 디스크 인덱스를 쓰지 않고 메모리에서만 인덱싱
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// 진행 로그 출력
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 대화형 채팅
    Chat,

    /// 질문 하나에 답변
    Ask {
        /// 질문
        question: String,
    },

    /// 벡터 인덱스 생성
    Index {
        /// 기존 인덱스가 있어도 다시 생성
        #[arg(long)]
        force: bool,
    },

    /// 상태 확인
    Status,
}

impl Cli {
    /// 환경변수 설정 위에 CLI 플래그 적용
    pub fn config(&self) -> Result<AppConfig> {
        self.apply(AppConfig::from_env()?)
    }

    fn apply(&self, mut config: AppConfig) -> Result<AppConfig> {
        if let Some(ref pdf) = self.pdf {
            config.pdf_path = pdf.clone();
        }
        if let Some(ref model) = self.model {
            config.llm_model = model.clone();
        }
        if let Some(ref model) = self.embed_model {
            config.embed_model = model.clone();
        }
        if let Some(max) = self.max_chunks {
            config.max_chunks = (max > 0).then_some(max);
        }
        if let Some(k) = self.top_k {
            config.top_k = k;
        }
        if let Some(ref host) = self.ollama_host {
            config.ollama_host = normalize_host(host)?;
        }
        if self.no_cache {
            config.use_cache = false;
        }

        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.config()?;

    match cli.command {
        Commands::Chat => cmd_chat(config).await,
        Commands::Ask { ref question } => cmd_ask(config, question).await,
        Commands::Index { force } => cmd_index(config, force).await,
        Commands::Status => cmd_status(config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 채팅 명령어 (chat)
///
/// 체인을 한 번 초기화한 뒤 표준 입력에서 질문을 읽습니다.
async fn cmd_chat(config: AppConfig) -> Result<()> {
    println!("{}", TITLE);
    println!();
    println!("{}", ABOUT);
    println!();

    println!("[*] 의료 지식베이스 준비 중: {}", config.pdf_path.display());
    let components = RagComponents::new(config);
    let chain = components.chain().await.context("RAG 초기화 실패")?;
    println!("[OK] 준비 완료 (모델: {})", chain.llm_name());
    println!();

    let mut session = ChatSession::new();
    let mut show_sources = true;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{}", REPL_HELP),
            ReplCommand::History => print_history(&session),
            ReplCommand::Clear => {
                session.clear();
                println!("[OK] 대화 기록을 삭제했습니다");
            }
            ReplCommand::ToggleSources => {
                show_sources = !show_sources;
                println!(
                    "[OK] 출처 표시: {}",
                    if show_sources { "켜짐" } else { "꺼짐" }
                );
            }
            ReplCommand::Unknown(cmd) => {
                println!("[!] 알 수 없는 명령어: {} (/help 참고)", cmd);
            }
            ReplCommand::Question(question) => {
                println!("Thinking...");
                if let Some(turn) = session.ask(&chain, &question).await {
                    println!();
                    println!("{}", turn.message.content);
                    if show_sources {
                        print_sources(&turn.sources);
                    }
                    println!();
                }
            }
        }
    }

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(config: AppConfig, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("질문이 비어 있습니다");
    }

    let chain = initialize_rag_components(&config)
        .await
        .context("RAG 초기화 실패")?;

    println!("Thinking...");
    let response = chain.invoke(question).await.context("답변 생성 실패")?;

    println!();
    println!("{}", format_medical_answer(&response.answer));
    print_sources(&get_sources_from_response(&response));

    Ok(())
}

/// 인덱스 명령어 (index)
///
/// PDF를 분할/임베딩하여 디스크 인덱스를 만듭니다.
async fn cmd_index(config: AppConfig, force: bool) -> Result<()> {
    let embedder = create_embedder(&config)?;

    println!("[*] 인덱싱 대상: {}", config.pdf_path.display());
    println!(
        "    청크: {} chars / overlap {} / 최대 {}",
        config.chunk_size,
        config.chunk_overlap,
        config
            .max_chunks
            .map(|m| m.to_string())
            .unwrap_or_else(|| "전체".to_string())
    );
    println!("    임베딩 모델: {}", config.embed_model);

    let started = Instant::now();
    let (_, status) = build_or_load_index(&config, &embedder, force)
        .await
        .context("인덱스 생성 실패")?;

    match status {
        IndexStatus::Reused { chunks } => {
            println!("[OK] 기존 인덱스 사용: {} 청크 (--force로 재생성)", chunks);
        }
        IndexStatus::Built { chunks } => {
            println!(
                "[OK] 인덱스 생성 완료: {} 청크 ({:.1}s)",
                chunks,
                started.elapsed().as_secs_f64()
            );
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
///
/// 설정, Ollama 연결, 인덱스 상태를 확인합니다.
async fn cmd_status(config: AppConfig) -> Result<()> {
    println!("medical-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    // 원본 문서
    match std::fs::metadata(&config.pdf_path) {
        Ok(meta) => println!(
            "[OK] PDF: {} ({})",
            config.pdf_path.display(),
            format_bytes(meta.len() as usize)
        ),
        Err(_) => println!("[!] PDF 없음: {}", config.pdf_path.display()),
    }

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!(
        "[*] 모델: {} (임베딩: {}), top-k {}",
        config.llm_model, config.embed_model, config.top_k
    );

    // Ollama 연결
    let llm = setup_llm(&config)?;
    match llm.health_check().await {
        Ok(()) => println!("[OK] Ollama: {}", config.ollama_host),
        Err(e) => {
            println!("[!] Ollama 연결 실패: {}", e);
            println!("    설치: https://ollama.com  /  실행: ollama pull {}", config.llm_model);
        }
    }

    if !config.use_cache {
        println!("[*] 디스크 캐시: 사용 안 함");
        return Ok(());
    }

    // 매니페스트
    let manifest_path = config.manifest_path();
    if !manifest_path.exists() {
        println!("[!] 인덱스 없음 (medical-rag index로 생성)");
        return Ok(());
    }

    match KnowledgeStore::open(&manifest_path).and_then(|store| store.latest_manifest()) {
        Ok(Some(manifest)) => {
            println!(
                "[OK] 인덱스 {}: {} 청크, {}",
                manifest.fingerprint.short(),
                manifest.chunk_count,
                manifest.embed_model
            );
            println!(
                "     {} | {}",
                manifest.created_at.format("%Y-%m-%d %H:%M"),
                truncate_text(&manifest.pdf_path, 60)
            );
        }
        Ok(None) => println!("[!] 인덱스 없음 (medical-rag index로 생성)"),
        Err(e) => println!("[!] 매니페스트 조회 실패: {}", e),
    }

    // 벡터 수
    match LanceVectorStore::open(&config.lance_path()).await {
        Ok(store) => match store.count().await {
            Ok(count) => println!("[OK] 벡터 인덱스: {} 청크", count),
            Err(e) => tracing::debug!("벡터 수 조회 실패: {}", e),
        },
        Err(e) => tracing::debug!("LanceDB 열기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// REPL
// ============================================================================

/// REPL 입력 한 줄의 해석 결과
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Empty,
    Quit,
    Help,
    History,
    Clear,
    ToggleSources,
    Unknown(String),
    Question(String),
}

impl ReplCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        if !line.starts_with('/') {
            return ReplCommand::Question(line.to_string());
        }

        match line.to_lowercase().as_str() {
            "/quit" | "/exit" | "/q" => ReplCommand::Quit,
            "/help" | "/?" => ReplCommand::Help,
            "/history" => ReplCommand::History,
            "/clear" => ReplCommand::Clear,
            "/sources" => ReplCommand::ToggleSources,
            _ => ReplCommand::Unknown(line.to_string()),
        }
    }
}

fn print_history(session: &ChatSession) {
    if session.is_empty() {
        println!("[!] 대화 기록이 없습니다.");
        return;
    }

    for message in session.messages() {
        let label = match message.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        println!(
            "[{}] {}: {}",
            message.timestamp.format("%H:%M:%S"),
            label,
            truncate_text(&message.content, 200)
        );
    }
}

fn print_sources(sources: &[String]) {
    if sources.is_empty() {
        return;
    }

    println!();
    println!("Sources:");
    for source in sources {
        println!("  - {}", source);
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
