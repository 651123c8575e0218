use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rand::Rng;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use quill_hash::buffer::{BufferManager, PageId, PAGE_SIZE};
use quill_hash::config::{BufferPoolConfig, HashTableConfig};
use quill_hash::container::hash::{OrdComparator, XxHasher};
use quill_hash::storage::disk_manager::DiskManager;
use quill_hash::utils::util::{pretty_format_stats, pretty_format_values};
use quill_hash::{LinearProbeHashTable, QuillHashError, QuillHashResult};

type Index = LinearProbeHashTable<i64, i64>;

// first page handed out on an empty file
const DEFAULT_HEADER_PAGE: PageId = 1;

#[derive(Debug, Parser, PartialEq)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(short = 'f', long, help = "Path to your database file")]
    file: Option<PathBuf>,
    #[clap(long, default_value_t = 256, help = "Number of buffer pool frames")]
    pool_size: usize,
    #[clap(long, help = "Slots per block page (default: as many as fit)")]
    block_capacity: Option<usize>,
    #[clap(long, default_value_t = 64, help = "Initial slot count of a new table")]
    initial_slots: usize,
    #[clap(long, help = "Header page of an existing table", value_name = "PAGE")]
    header_page: Option<PageId>,
}

enum Command {
    Put(i64, i64),
    Get(i64),
    Del(i64, i64),
    Fill(usize),
    Resize,
    Stats,
    Flush,
    Help,
    Exit,
}

const HELP: &str = "\
put <key> <value>   insert a pair
get <key>           list values stored under key
del <key> <value>   remove a pair
fill <n>            insert n random pairs
resize              double the table
stats               capacity, blocks, live entries and tombstones
flush               write dirty pages to disk
exit                quit";

fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();
    let int = |s: &str| {
        s.parse::<i64>()
            .map_err(|_| format!("'{}' is not an integer", s))
    };
    match (verb, args.as_slice()) {
        ("put", [k, v]) => Ok(Command::Put(int(*k)?, int(*v)?)),
        ("get", [k]) => Ok(Command::Get(int(*k)?)),
        ("del", [k, v]) => Ok(Command::Del(int(*k)?, int(*v)?)),
        ("fill", [n]) => n
            .parse()
            .map(Command::Fill)
            .map_err(|_| format!("'{}' is not a count", n)),
        ("resize", []) => Ok(Command::Resize),
        ("stats", []) => Ok(Command::Stats),
        ("flush", []) => Ok(Command::Flush),
        ("help", []) => Ok(Command::Help),
        ("exit", []) | ("\\q", []) => Ok(Command::Exit),
        _ => Err(format!("unrecognized command '{}', try 'help'", line.trim())),
    }
}

fn open_index(args: &Args, bpm: Arc<BufferManager>, existing: bool) -> QuillHashResult<Index> {
    let config = HashTableConfig::default().with_block_capacity(args.block_capacity);
    if existing || args.header_page.is_some() {
        let header_page = args.header_page.unwrap_or(DEFAULT_HEADER_PAGE);
        Index::open_with_config(
            "shell",
            bpm,
            header_page,
            OrdComparator,
            XxHasher::default(),
            config,
        )
    } else {
        Index::new_with_config(
            "shell",
            bpm,
            OrdComparator,
            args.initial_slots,
            XxHasher::default(),
            config,
        )
    }
}

/// Returns `false` when the shell should stop.
fn execute(index: &Index, bpm: &Arc<BufferManager>, command: Command) -> QuillHashResult<bool> {
    match command {
        Command::Put(key, value) => {
            if index.insert(&key, &value)? {
                println!("inserted");
            } else {
                println!("({}, {}) already present", key, value);
            }
        }
        Command::Get(key) => {
            let values = index.get_value(&key)?;
            if values.is_empty() {
                println!("(no values)");
            } else {
                println!("{}", pretty_format_values(&key, &values));
            }
        }
        Command::Del(key, value) => {
            if index.remove(&key, &value)? {
                println!("removed");
            } else {
                println!("({}, {}) not found", key, value);
            }
        }
        Command::Fill(count) => {
            let mut rng = rand::rng();
            let mut inserted = 0;
            for _ in 0..count {
                let key = rng.random_range(0..(count as i64 * 4).max(1));
                if index.insert(&key, &rng.random())? {
                    inserted += 1;
                }
            }
            println!("inserted {} of {} random pairs", inserted, count);
        }
        Command::Resize => {
            index.resize(index.get_size()?)?;
            println!("capacity is now {}", index.get_size()?);
        }
        Command::Stats => {
            println!("{}", pretty_format_stats(index.name(), &index.stats()?));
        }
        Command::Flush => {
            bpm.flush_all_pages()?;
            println!("flushed");
        }
        Command::Help => println!("{}", HELP),
        Command::Exit => {
            println!("bye!");
            return Ok(false);
        }
    }
    Ok(true)
}

fn run(args: Args) -> QuillHashResult<()> {
    let (_temp_dir, path) = match &args.file {
        Some(path) => (None, path.clone()),
        None => {
            let dir = tempfile::tempdir()?;
            let path = dir.path().join("shell.db");
            (Some(dir), path)
        }
    };
    let existing = std::fs::metadata(&path)
        .map(|m| m.len() > PAGE_SIZE as u64)
        .unwrap_or(false);

    let disk_manager = Arc::new(DiskManager::try_new(&path)?);
    let pool_config = BufferPoolConfig::default().with_buffer_pool_size(args.pool_size);
    let bpm = Arc::new(BufferManager::new_with_config(pool_config, disk_manager));
    let index = open_index(&args, bpm.clone(), existing)?;

    println!(
        ":) hash index '{}' on {:?} (header page {}), type 'help'.",
        index.name(),
        path,
        index.header_page_id()
    );
    let mut rl = DefaultEditor::new().map_err(|e| QuillHashError::Internal(e.to_string()))?;
    rl.load_history(".history").ok();

    loop {
        match rl.readline("quillhash=# ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(msg) => {
                        println!("{}", msg);
                        continue;
                    }
                };
                match execute(&index, &bpm, command) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    bpm.flush_all_pages()?;
    rl.save_history(".history").ok();
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
