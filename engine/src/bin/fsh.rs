//! Interactive shell for the filesystem engine.
//!
//! Grounded in `original_source/terminal.py`: the same command set, the
//! same `fs@fs:<cwd>$ ` prompt, and the same "print the bare exception
//! class name" error-reporting convention on failure. The original
//! dispatches on half a dozen regexes tried in a fixed order; this
//! reimplements that same fixed-order dispatch with a hand-written
//! tokenizer rather than pulling in a regex engine for shapes this fixed.
//!
//! `FsError`s from individual commands are reported per-line (the REPL
//! keeps going, matching the original). `anyhow` covers the shell's own
//! plumbing instead — stdin/stdout I/O outside of a per-command failure —
//! so a broken pipe or closed terminal exits with context instead of a
//! silent `break`.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use fsengine::{FileSystem, FsError, FsResult};

const BLOCK_SIZE: u64 = 4096;
const DISK_BLOCKS: u64 = 50;
const STORAGE_FILE: &str = "storage";

fn prompt(text: &str) -> io::Result<String> {
    print!("{}", text);
    io::stdout().flush()?;
    let mut line = String::new();
    let bytes = io::stdin().read_line(&mut line)?;
    if bytes == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
    }
    Ok(line.trim().to_string())
}

/// Block on `mkfs <n>` until it parses and succeeds, the way the original
/// terminal's `start_session` loop reprompts on anything else.
fn bootstrap() -> FileSystem {
    loop {
        let line = match prompt("fs> ") {
            Ok(l) => l,
            Err(_) => std::process::exit(0),
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if let ["mkfs", n] = tokens.as_slice() {
            if let Ok(inodes_number) = n.parse::<u64>() {
                let path = PathBuf::from(STORAGE_FILE);
                match FileSystem::mkfs(&path, BLOCK_SIZE, DISK_BLOCKS, inodes_number, false) {
                    Ok(fs) => return fs,
                    Err(e) => println!("{}", e.name()),
                }
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    run()
}

fn run() -> anyhow::Result<()> {
    let mut fs = bootstrap();
    let mut descriptors: HashMap<String, u64> = HashMap::new();

    loop {
        let line = match prompt(&format!("fs@fs:{}$ ", fs.cwd())) {
            Ok(l) => l,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("reading a command from stdin"),
        };
        if line.is_empty() {
            continue;
        }
        if let Err(e) = dispatch(&mut fs, &mut descriptors, &line) {
            println!("{}", e.name());
        }
    }
    Ok(())
}

fn dispatch(fs: &mut FileSystem, descriptors: &mut HashMap<String, u64>, line: &str) -> FsResult<()> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    if tokens.as_slice() == ["ls"] {
        println!("{}", fs.ls()?);
        return Ok(());
    }

    if let Some(eq) = line.find('=') {
        let var = line[..eq].trim();
        let rhs = line[eq + 1..].trim();
        if let Some(path) = rhs.strip_prefix("open").map(str::trim) {
            if !var.is_empty() && !path.is_empty() {
                let fd = fs.open(path)?;
                descriptors.insert(var.to_string(), fd);
                return Ok(());
            }
        }
    }

    match tokens.as_slice() {
        ["write", var, data, size] => {
            let fd = *descriptors.get(*var).ok_or(FsError::InvalidInput)?;
            let size: u64 = size.parse().map_err(|_| FsError::InvalidInput)?;
            fs.write(fd, data.as_bytes(), size)
        }
        ["close", var] => {
            let fd = descriptors.remove(*var).ok_or(FsError::InvalidInput)?;
            fs.close(fd)
        }
        ["truncate", path, size] => {
            let size: u64 = size.parse().map_err(|_| FsError::InvalidInput)?;
            fs.truncate(path, size)
        }
        ["seek", var, n] => {
            let fd = *descriptors.get(*var).ok_or(FsError::InvalidInput)?;
            let pos: u64 = n.parse().map_err(|_| FsError::InvalidInput)?;
            fs.seek(fd, pos)
        }
        ["read", var, n] => {
            let fd = *descriptors.get(*var).ok_or(FsError::InvalidInput)?;
            let count: u64 = n.parse().map_err(|_| FsError::InvalidInput)?;
            let data = fs.read(fd, count)?;
            println!("{}", String::from_utf8_lossy(&data));
            Ok(())
        }
        ["link", src, dst] => fs.link(src, dst),
        ["symlink", target, link] => fs.symlink(target, link),
        ["stat", path] => {
            println!("{}", fs.stat(path)?);
            Ok(())
        }
        ["create", path] => fs.create(path),
        ["unlink", path] => fs.unlink(path),
        ["mkdir", path] => fs.mkdir(path),
        ["rmdir", path] => fs.rmdir(path),
        ["cd", path] => fs.cd(path),
        [] => Ok(()),
        _ => Err(FsError::InvalidInput),
    }
}
