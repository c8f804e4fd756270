//! `pagehash-cli` — a small command-line harness around the engine.
//!
//! A real embedder (e.g. a contract-execution VM) holds an [`Engine`] for the
//! lifetime of a long-running process and writes into its mapped memory
//! directly; there is no cross-process "open this region back up" operation,
//! since the mapping, the fault channel, and the handler thread are all
//! process-local. This is not part of the library's external programmatic
//! surface — it is a convenience shell for manual testing, analogous to the
//! `lz4` binary being a convenience shell over `lz4::block`/`lz4::frame`.
//!
//! - `hash` — a one-shot reference digest of a file, independent of any
//!   engine.
//! - `run` — executes a sequence of named operations (`create`, `write`,
//!   `digest`, `mark-changed`, `evict`, `flush`, `stats`) against one shared
//!   registry, in order, within this one process lifetime. Each `--op` flag
//!   is one operation token; see [`Op::parse`] for the token grammar.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use pagehash::config::{set_display_level, CHUNK_SIZE};
use pagehash::util::backend::contract_state_dir;
use pagehash::util::get_total_file_size;
use pagehash::{diagnostic, k12_reference, Engine, EngineRegistry};

#[derive(Parser)]
#[command(name = "pagehash-cli", version, about = "Incremental pageable KangarooTwelve hashing engine")]
struct Cli {
    /// Diagnostics verbosity: 0 = silent, 1 = errors, 2 = normal, 3 = verbose.
    #[arg(short = 'v', long, default_value_t = 1)]
    verbosity: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute a one-shot KangarooTwelve digest of a file.
    Hash {
        file: PathBuf,
        #[arg(long, default_value_t = 32)]
        out_len: usize,
    },
    /// Run a sequence of engine operations against one shared registry.
    Run {
        /// Directory under which chunk files are persisted.
        #[arg(long, default_value = "./pagehash-state")]
        storage_root: PathBuf,
        /// Process-wide RAM budget in bytes.
        #[arg(long, default_value_t = CHUNK_SIZE as u64 * 4)]
        ram_budget: u64,
        /// One operation per flag, executed in the order given. Grammar:
        /// `create:<contract>:<len>`, `write:<contract>:<offset>:<len>:<byte>`,
        /// `digest:<contract>`, `mark-changed:<contract>:<chunk>`,
        /// `evict:<contract>:<chunk>`, `flush:<contract>[:<changed_only>]`,
        /// `stats:<contract>`. `<changed_only>` is `true`/`false`
        /// (default `false`) and selects between flushing every resident
        /// chunk or only chunks marked dirty since they were last flushed.
        #[arg(long = "op")]
        ops: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    set_display_level(cli.verbosity);

    match cli.command {
        Command::Hash { file, out_len } => run_hash(&file, out_len),
        Command::Run {
            storage_root,
            ram_budget,
            ops,
        } => run_ops(storage_root, ram_budget, ops),
    }
}

fn run_hash(file: &PathBuf, out_len: usize) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let digest = k12_reference(&bytes, out_len).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("{}", digest.iter().map(|b| format!("{b:02x}")).collect::<String>());
    Ok(())
}

/// One token from a `--op` flag, parsed from its `:`-separated grammar.
enum Op {
    Create { contract: u32, len: usize },
    Write { contract: u32, offset: usize, len: usize, byte: u8 },
    Digest { contract: u32 },
    MarkChanged { contract: u32, chunk: usize },
    Evict { contract: u32, chunk: usize },
    Flush { contract: u32, changed_only: bool },
    Stats { contract: u32 },
}

impl Op {
    fn parse(token: &str) -> Result<Op> {
        let parts: Vec<&str> = token.split(':').collect();
        let op = match parts.as_slice() {
            ["create", contract, len] => Op::Create {
                contract: contract.parse().context("contract index")?,
                len: len.parse().context("len")?,
            },
            ["write", contract, offset, len, byte] => Op::Write {
                contract: contract.parse().context("contract index")?,
                offset: offset.parse().context("offset")?,
                len: len.parse().context("len")?,
                byte: byte.parse().context("byte")?,
            },
            ["digest", contract] => Op::Digest {
                contract: contract.parse().context("contract index")?,
            },
            ["mark-changed", contract, chunk] => Op::MarkChanged {
                contract: contract.parse().context("contract index")?,
                chunk: chunk.parse().context("chunk index")?,
            },
            ["evict", contract, chunk] => Op::Evict {
                contract: contract.parse().context("contract index")?,
                chunk: chunk.parse().context("chunk index")?,
            },
            ["flush", contract] => Op::Flush {
                contract: contract.parse().context("contract index")?,
                changed_only: false,
            },
            ["flush", contract, changed_only] => Op::Flush {
                contract: contract.parse().context("contract index")?,
                changed_only: changed_only.parse().context("changed_only")?,
            },
            ["stats", contract] => Op::Stats {
                contract: contract.parse().context("contract index")?,
            },
            _ => bail!("unrecognized --op token {token:?}"),
        };
        Ok(op)
    }
}

fn run_ops(storage_root: PathBuf, ram_budget: u64, op_tokens: Vec<String>) -> Result<()> {
    let registry = EngineRegistry::with_ram_budget(&storage_root, ram_budget);

    for token in &op_tokens {
        let op = Op::parse(token)?;
        apply_op(&registry, &storage_root, op).with_context(|| format!("executing --op {token:?}"))?;
    }
    Ok(())
}

fn apply_op(registry: &EngineRegistry, storage_root: &std::path::Path, op: Op) -> Result<()> {
    match op {
        Op::Create { contract, len } => {
            diagnostic!(2, "pagehash: create contract {contract} ({len} bytes)");
            registry
                .create_engine(contract, len)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }
        Op::Write { contract, offset, len, byte } => {
            let engine = engine_for(registry, contract)?;
            if offset + len > engine.padded_len() {
                bail!("write of {len} bytes at offset {offset} exceeds the region's padded length");
            }
            diagnostic!(2, "pagehash: write {len} bytes of 0x{byte:02x} at offset {offset} (contract {contract})");
            // SAFETY: bounds checked against `padded_len()` above.
            unsafe {
                std::ptr::write_bytes(engine.as_mut_ptr().add(offset), byte, len);
            }
        }
        Op::Digest { contract } => {
            let engine = engine_for(registry, contract)?;
            let mut out = vec![0u8; 32];
            engine
                .digest_and_reprotect(&mut out, true)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            println!(
                "digest contract={contract}: {}",
                out.iter().map(|b| format!("{b:02x}")).collect::<String>()
            );
        }
        Op::MarkChanged { contract, chunk } => {
            let engine = engine_for(registry, contract)?;
            engine.mark_chunk_changed(chunk);
            diagnostic!(2, "pagehash: marked chunk {chunk} of contract {contract} changed");
        }
        Op::Evict { contract, chunk } => {
            let engine = engine_for(registry, contract)?;
            engine.evict_chunk(chunk).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            diagnostic!(2, "pagehash: evicted chunk {chunk} of contract {contract}");
        }
        Op::Flush { contract, changed_only } => {
            let engine = engine_for(registry, contract)?;
            engine
                .flush_all(changed_only)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            diagnostic!(2, "pagehash: flushed contract {contract} (changed_only={changed_only})");
        }
        Op::Stats { contract } => {
            let engine = engine_for(registry, contract)?;
            let contract_dir = contract_state_dir(storage_root, Some(&contract.to_string()));
            let on_disk_bytes = disk_bytes(&contract_dir);
            println!(
                "stats contract={contract}: resident_bytes={} max_chunks={} on_disk_bytes={} process_resident_bytes={}",
                engine.total_resident_bytes(),
                engine.max_chunks(),
                on_disk_bytes,
                registry.total_resident_bytes(),
            );
        }
    }
    Ok(())
}

fn engine_for(registry: &EngineRegistry, contract: u32) -> Result<Arc<Engine>> {
    registry
        .get(contract)
        .ok_or_else(|| anyhow::anyhow!("no engine for contract {contract}; run a `create` op first"))
}

/// Sums the size of every chunk file currently persisted for a contract.
fn disk_bytes(contract_dir: &std::path::Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(contract_dir) else {
        return 0;
    };
    let paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    let refs: Vec<&std::path::Path> = paths.iter().map(|p| p.as_path()).collect();
    get_total_file_size(&refs)
}
