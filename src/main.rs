use clap::{Parser, Subcommand};
use readpub::epub::text::html_to_text;
use readpub::{BookManager, Config, DataPathStatus, MetadataPatch, ReadpubError, Result, Status, get_datapath};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 📚 readpub - 个人EPUB书库
#[derive(Parser)]
#[command(name = "readpub")]
#[command(about = "一个管理EPUB电子书的个人书库")]
#[command(version)]
struct Cli {
    /// 配置文件路径
    #[arg(long, global = true, help = "配置文件路径（默认使用系统配置目录）")]
    config: Option<PathBuf>,

    /// 书库目录
    #[arg(long, global = true, help = "书库根目录（覆盖配置文件中的datapath）")]
    datapath: Option<PathBuf>,

    /// 详细输出模式
    #[arg(short, long, global = true, help = "显示调试日志")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 添加一本书
    Add {
        /// EPUB文件路径
        file: PathBuf,
    },
    /// 列出书籍
    List {
        /// 只显示指定状态的书籍
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// 包括回收站中的书籍
        #[arg(long)]
        all: bool,
    },
    /// 显示书籍的全部元数据
    Info { id: String },
    /// 移入回收站
    Delete { id: String },
    /// 从回收站恢复
    Recover { id: String },
    /// 置顶
    Pin { id: String },
    /// 取消置顶
    Unpin { id: String },
    /// 彻底删除
    Purge { id: String },
    /// 阅读指定页
    Read {
        id: String,
        /// 页码（从0开始）
        #[arg(short, long, default_value = "0")]
        page: usize,
        /// 最大显示字符数（0表示不限制）
        #[arg(long, default_value = "2000")]
        max_length: usize,
    },
    /// 生成默认配置文件
    InitConfig,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StatusArg {
    Normal,
    Deleted,
    Pinned,
}

impl From<StatusArg> for Status {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Normal => Status::Normal,
            StatusArg::Deleted => Status::Deleted,
            StatusArg::Pinned => Status::Pinned,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "readpub=debug" } else { "readpub=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("❌ 错误: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().or_else(Config::default_path);

    if let Command::InitConfig = cli.command {
        let path = config_path.ok_or_else(|| ReadpubError::Config("无法确定配置文件路径".to_string()))?;
        Config::generate_default_config(&path)?;
        println!("✅ 已生成配置文件: {}", path.display());
        return Ok(());
    }

    let config = match &config_path {
        Some(path) => Config::load_or_init(path)?,
        None => Config::default(),
    };

    let (datapath, status) = get_datapath(cli.datapath.clone().or_else(|| config.datapath.clone()));
    match status {
        DataPathStatus::Ok => {}
        DataPathStatus::MkdirFailed => {
            return Err(ReadpubError::Config(format!("无法创建书库目录: {}", datapath.display())));
        }
        DataPathStatus::NotADir => return Err(ReadpubError::NotADirectory(datapath)),
    }

    let mut manager = BookManager::with_config(&datapath, &config)?;

    match cli.command {
        Command::Add { file } => {
            let (id, metadata) = manager.add_book(&file)?;
            println!("✅ 已添加: {} 《{}》 {}", id, metadata.title, metadata.author);
        }
        Command::List { status, all } => list_books(&mut manager, status.map(Status::from), all),
        Command::Info { id } => show_info(&mut manager, &id)?,
        Command::Delete { id } => {
            manager.soft_delete(&id)?;
            println!("🗑️  已移入回收站: {}", id);
        }
        Command::Recover { id } => {
            manager.recover(&id)?;
            println!("♻️  已恢复: {}", id);
        }
        Command::Pin { id } => {
            manager.pin(&id)?;
            println!("📌 已置顶: {}", id);
        }
        Command::Unpin { id } => {
            manager.unpin(&id)?;
            println!("已取消置顶: {}", id);
        }
        Command::Purge { id } => {
            manager.hard_delete(&id)?;
            println!("💥 已彻底删除: {}", id);
        }
        Command::Read { id, page, max_length } => read_page(&mut manager, &id, page, max_length)?,
        Command::InitConfig => {}
    }

    Ok(())
}

/// 列出书籍
fn list_books(manager: &mut BookManager, status: Option<Status>, all: bool) {
    let books = match status {
        Some(status) => manager.find(&MetadataPatch::new().status(status)),
        None if all => manager.find(&MetadataPatch::new()),
        None => manager.list(),
    };

    if books.is_empty() {
        println!("📭 书库中没有符合条件的书籍");
        return;
    }

    println!("📚 共 {} 本书:", books.len());
    for book in books {
        if let Some(metadata) = book.metadata() {
            println!(
                "  {}  [{}] 《{}》 {}  {}",
                book.id(),
                metadata.status,
                metadata.title,
                metadata.author,
                metadata.progress.label()
            );
        }
    }
}

/// 显示元数据
fn show_info(manager: &mut BookManager, id: &str) -> Result<()> {
    let user = manager.user().to_string();
    let book = manager
        .get_mut(id)
        .ok_or_else(|| ReadpubError::UnknownBook(id.to_string()))?;
    let metadata = book.get_metadata(&user)?;

    println!("📖 {}", id);
    println!("  标题: {}", metadata.title);
    println!("  作者: {}", metadata.author);
    println!("  文件: {}", metadata.filepath);
    if !metadata.coverpath.is_empty() {
        println!("  封面: {}", metadata.coverpath);
    }
    println!("  上传者: {}", metadata.uploader);
    println!("  上传时间: {}", metadata.uploadtime);
    println!("  状态: {}", metadata.status);
    println!(
        "  进度: {} ({}/{})",
        metadata.progress.label(),
        metadata.progress.current(),
        metadata.progress.total()
    );
    Ok(())
}

/// 显示指定页的内容并记录阅读进度
fn read_page(manager: &mut BookManager, id: &str, page: usize, max_length: usize) -> Result<()> {
    manager.load_book(id)?;
    manager.open_book(id)?;

    let result = show_page(manager, id, page, max_length);

    manager.close_book(id)?;
    manager.release_book(id)?;
    result
}

fn show_page(manager: &mut BookManager, id: &str, page: usize, max_length: usize) -> Result<()> {
    manager.turn_to_page(id, page)?;

    let book = manager
        .get(id)
        .ok_or_else(|| ReadpubError::UnknownBook(id.to_string()))?;
    let page_count = book.page_count();
    let Some((part_id, content)) = book.current_part() else {
        println!("  ❌ 无效的页码: {}。可用范围: 0-{}", page, page_count.saturating_sub(1));
        return Ok(());
    };

    let text = html_to_text(content);
    let total_chars = text.chars().count();
    println!("📄 第 {}/{} 页 ({})", page, page_count, part_id);

    let display = if max_length > 0 && total_chars > max_length {
        text.chars().take(max_length).collect()
    } else {
        text
    };
    println!("{}", "━".repeat(20));
    println!("{}", display);
    println!("{}", "━".repeat(20));
    if max_length > 0 && total_chars > max_length {
        println!("  💡 提示: 还有 {} 个字符未显示。使用 --max-length 0 显示完整内容。", total_chars - max_length);
    }

    manager.save_progress(id)
}
