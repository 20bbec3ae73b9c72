//! Main entry point for the zipcodec CLI application.
//!
//! Lists and extracts ZIP archives unzip-style, and can add, remove and
//! comment entries in place.

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zipcodec::{Archive, Cli, CompressionMethod, CompressionMode, CreateMode, Entry, RemoveMode, ZipFile};

/// Application entry point.
///
/// Parses command-line arguments, sets up logging and dispatches to the
/// editing or the read-only handlers.
fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .init();

    if cli.is_editing() {
        return edit_archive(&cli);
    }

    let mut archive = Archive::open_path(Path::new(&cli.file))
        .with_context(|| format!("cannot open {}", cli.file))?;

    if cli.list || cli.verbose {
        list_files(&archive, cli.verbose);
        return Ok(());
    }

    extract_files(&mut archive, &cli)
}

/// Extract the entries selected by the positional patterns and `-x`.
fn extract_files(archive: &mut Archive, cli: &Cli) -> Result<()> {
    // Directories are created on demand for the files inside them
    let selected: Vec<usize> = archive
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_directory())
        .filter(|(_, e)| cli.files.is_empty() || cli.files.iter().any(|f| name_matches(f, e.full_name())))
        .filter(|(_, e)| {
            !cli.exclude
                .iter()
                .any(|x| e.full_name().contains(x.as_str()) || glob_match(x, e.full_name()))
        })
        .map(|(index, _)| index)
        .collect();

    if selected.is_empty() && !cli.files.is_empty() {
        bail!("no entries in {} match {:?}", cli.file, cli.files);
    }

    let multiple_files = cli.pipe && selected.len() > 1;
    for index in selected {
        let entry = &mut archive[index];
        if cli.password.is_some() {
            entry.set_password(cli.password.as_deref());
        }
        extract_file(entry, cli, multiple_files)?;
    }

    Ok(())
}

/// Whether a positional argument selects the entry `name`.
///
/// Patterns with wildcards are globbed; plain arguments match the full
/// name or the last path segment.
fn name_matches(pattern: &str, name: &str) -> bool {
    if has_glob_chars(pattern) {
        return glob_match(pattern, name);
    }
    let basename = Path::new(name)
        .file_name()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    name == pattern || basename == pattern
}

/// List files in the archive.
///
/// `-l` prints one name per line; `-v` prints a table with sizes, method,
/// timestamp and CRC-32, followed by totals.
fn list_files(archive: &Archive, verbose: bool) {
    if !verbose {
        for entry in archive {
            println!("{}", entry.full_name());
        }
        return;
    }

    if !archive.comment().is_empty() {
        println!("Archive comment: {}", archive.comment());
    }
    println!(
        "{:>10}  {:<7}  {:>10}  {:>5}  {:>10}  {:>5}  {:>8}  Name",
        "Length", "Method", "Size", "Cmpr", "Date", "Time", "CRC-32"
    );
    println!("{}", "-".repeat(80));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in archive {
        let (year, month, day, hour, minute, _second) = entry.modified();
        let marker = if entry.is_password_protected() { "*" } else { "" };
        println!(
            "{:>10}  {:<7}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {:08x}  {}{}",
            entry.size(),
            method_label(archive, entry.compression_method()),
            entry.compressed_size(),
            ratio(entry.compressed_size(), entry.size()),
            year,
            month,
            day,
            hour,
            minute,
            entry.crc32(),
            entry.full_name(),
            marker
        );

        if !entry.is_directory() {
            total_uncompressed += entry.size();
            total_compressed += entry.compressed_size();
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(80));
    println!(
        "{:>10}  {:<7}  {:>10}  {}  {:>31}  {} files",
        total_uncompressed,
        "",
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );
}

fn method_label(archive: &Archive, code: u16) -> String {
    archive
        .registry()
        .resolve(code)
        .map(|m| m.name().to_string())
        .unwrap_or_else(|| format!("#{code}"))
}

/// Compression ratio as percentage saved.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Extract a single entry to disk or, with `-p`, to stdout.
fn extract_file(entry: &mut Entry, cli: &Cli, show_filename: bool) -> Result<()> {
    let name = entry.full_name().to_string();

    if cli.pipe {
        let Some(stream) = entry.decompression_stream()? else {
            bail!("cannot extract {name}: missing or wrong password, or unsupported version");
        };
        let mut stdout = io::stdout().lock();
        if show_filename {
            writeln!(stdout, "--- {name} ---")?;
        }
        io::copy(stream, &mut stdout)?;
        return Ok(());
    }

    let file_name = if cli.junk_paths {
        entry.name().to_string()
    } else {
        name.clone()
    };
    let output_path = match cli.extract_dir {
        Some(ref dir) => PathBuf::from(dir).join(&file_name),
        None => PathBuf::from(&file_name),
    };

    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {name} (file exists)");
            }
            return Ok(());
        }
        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {name} (use -o to overwrite)");
            }
            return Ok(());
        }
    }

    let Some(stream) = entry.decompression_stream()? else {
        if !cli.is_very_quiet() {
            eprintln!("Skipping: {name} (missing or wrong password, or unsupported version)");
        }
        return Ok(());
    };

    if !cli.is_quiet() {
        println!("  extracting: {name}");
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut out = File::create(&output_path)
        .with_context(|| format!("cannot create {}", output_path.display()))?;
    let written = io::copy(stream, &mut out)?;
    debug!("wrote {written} bytes to {}", output_path.display());

    Ok(())
}

/// Apply `-a`, `-r` and `-z` to the archive and save it in place.
fn edit_archive(cli: &Cli) -> Result<()> {
    let zip = ZipFile::new(&cli.file);
    let mut archive = zip
        .open()
        .with_context(|| format!("cannot open {}", cli.file))?;

    if cli.add {
        let method = archive
            .registry()
            .by_name(&cli.method)
            .with_context(|| format!("unknown compression method {}", cli.method))?;
        for file in &cli.files {
            add_path(&mut archive, Path::new(file), &method, cli)?;
        }
    }

    if cli.remove {
        for pattern in &cli.files {
            remove_matching(&mut archive, pattern, cli)?;
        }
    }

    if let Some(comment) = &cli.comment {
        archive.set_comment(comment);
    }

    zip.rewrite(archive)
        .with_context(|| format!("cannot write {}", cli.file))
}

/// Add a file, or a directory and everything below it.
fn add_path(
    archive: &mut Archive,
    path: &Path,
    method: &Arc<dyn CompressionMethod>,
    cli: &Cli,
) -> Result<()> {
    if path == Path::new(&cli.file) {
        warn!("not adding the archive to itself");
        return Ok(());
    }

    let name = if cli.junk_paths {
        path.file_name()
            .map(|s| s.to_string_lossy().to_string())
            .with_context(|| format!("no file name in {}", path.display()))?
    } else {
        path.to_string_lossy().to_string()
    };

    let metadata = fs::metadata(path).with_context(|| format!("cannot read {}", path.display()))?;
    if metadata.is_dir() {
        if !cli.junk_paths {
            archive
                .entry_mut(&format!("{name}/"))
                .create(CreateMode::IfNotExists)?;
        }
        let mut children: Vec<PathBuf> = fs::read_dir(path)?
            .map(|dirent| dirent.map(|d| d.path()))
            .collect::<io::Result<_>>()?;
        children.sort();
        for child in children {
            add_path(archive, &child, method, cli)?;
        }
        return Ok(());
    }

    if !cli.is_quiet() {
        println!("  adding: {name} ({})", format_size(metadata.len()));
    }

    let input = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut lookup = archive.entry_mut(&name);
    let entry = lookup.create(CreateMode::Overwrite)?.get_mut()?;
    if let Ok(modified) = metadata.modified() {
        if let Ok(since_epoch) = modified.duration_since(std::time::UNIX_EPOCH) {
            entry.set_last_write_time(since_epoch.as_secs() as i64);
        }
    }
    entry.set_password(cli.password.as_deref());
    entry.use_data_descriptor(cli.data_descriptor || cli.password.is_some());
    entry.set_compression_stream(input, method.clone(), CompressionMode::Deferred)?;
    Ok(())
}

/// Remove every entry matching `pattern`.
fn remove_matching(archive: &mut Archive, pattern: &str, cli: &Cli) -> Result<()> {
    let names: Vec<String> = archive
        .iter()
        .map(|e| e.full_name().to_string())
        .filter(|name| name_matches(pattern, name))
        .collect();

    if names.is_empty() {
        warn!("{pattern} matched no entries");
    }
    for name in names {
        if !cli.is_quiet() {
            println!("  deleting: {name}");
        }
        archive.entry_mut(&name).remove(RemoveMode::IfExists)?;
    }
    Ok(())
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            // Either the star matches nothing, or it eats one more character
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
