use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use memmap2::Mmap;

use msort_rs::common::reset_sigpipe;
use msort_rs::sort::{
    BufferStrategy, DEFAULT_OVERSAMPLING, SortOptions, SplittingMode, parallel_mergesort,
};

/// 4MB buffer for output — reduces flush frequency for large files.
const OUTPUT_BUF_SIZE: usize = 4 * 1024 * 1024;

/// Buffer that holds file data, either memory-mapped or heap-allocated.
enum FileData {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl std::ops::Deref for FileData {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        match self {
            FileData::Mmap(m) => m,
            FileData::Owned(v) => v,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SplittingArg {
    /// Approximate balance from sorted samples (cheap)
    Sampling,
    /// Perfect balance via exact rank selection
    Exact,
}

#[derive(Clone, Copy, ValueEnum)]
enum BufferArg {
    /// Copy each chunk to a private buffer, merge straight into place
    Copy,
    /// Sort chunks in place, merge to private buffers, write back
    InPlace,
}

#[derive(Parser)]
#[command(
    name = "fmsort",
    about = "Sort lines of text files with a parallel multiway mergesort"
)]
struct Cli {
    /// Reverse the result of comparisons
    #[arg(short = 'r', long = "reverse")]
    reverse: bool,

    /// Preserve the input order of equal lines
    #[arg(short = 's', long = "stable")]
    stable: bool,

    /// Output only the first of an equal run
    #[arg(short = 'u', long = "unique")]
    unique: bool,

    /// Write result to FILE instead of standard output
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<String>,

    /// Line delimiter is NUL, not newline
    #[arg(short = 'z', long = "zero-terminated")]
    zero_terminated: bool,

    /// Number of worker threads (default: all cores)
    #[arg(long = "parallel", value_name = "N")]
    parallel: Option<usize>,

    /// Splitting mode for the parallel merge
    #[arg(long = "splitting", value_enum, default_value = "sampling")]
    splitting: SplittingArg,

    /// Buffer strategy for the local sort stage
    #[arg(long = "buffer", value_enum, default_value = "copy")]
    buffer: BufferArg,

    /// Oversampling factor for sampling mode
    #[arg(long = "oversampling", value_name = "V", default_value_t = DEFAULT_OVERSAMPLING)]
    oversampling: usize,

    /// Files to sort ('-' for stdin)
    files: Vec<String>,
}

/// Output writer enum to avoid Box<dyn Write> vtable dispatch overhead.
enum SortOutput<'a> {
    Stdout(BufWriter<io::StdoutLock<'a>>),
    File(BufWriter<File>),
}

impl Write for SortOutput<'_> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            SortOutput::Stdout(w) => w.write(buf),
            SortOutput::File(w) => w.write(buf),
        }
    }
    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        match self {
            SortOutput::Stdout(w) => w.flush(),
            SortOutput::File(w) => w.flush(),
        }
    }
}

/// Read all input into a single contiguous buffer and compute line offsets.
/// Uses mmap for single-file input (zero-copy), Vec for stdin/multi-file.
fn read_all_input(inputs: &[String], zero_terminated: bool) -> Result<(FileData, Vec<(usize, usize)>)> {
    let delimiter = if zero_terminated { b'\0' } else { b'\n' };

    let buffer = if inputs.len() == 1 && inputs[0] != "-" {
        let file =
            File::open(&inputs[0]).with_context(|| format!("open failed: {}", &inputs[0]))?;
        let metadata = file.metadata()?;
        if metadata.len() > 0 {
            let mmap = unsafe { Mmap::map(&file)? };
            #[cfg(target_os = "linux")]
            {
                let _ = mmap.advise(memmap2::Advice::Sequential);
            }
            FileData::Mmap(mmap)
        } else {
            FileData::Owned(Vec::new())
        }
    } else {
        let mut data = Vec::new();
        for input in inputs {
            if input == "-" {
                io::stdin().lock().read_to_end(&mut data)?;
            } else {
                let mut file =
                    File::open(input).with_context(|| format!("open failed: {}", input))?;
                file.read_to_end(&mut data)?;
            }
        }
        FileData::Owned(data)
    };

    // Find line boundaries using SIMD-accelerated memchr
    let data = &*buffer;
    let mut offsets = Vec::with_capacity(data.len() / 40 + 1);
    let mut start = 0usize;

    for pos in memchr::memchr_iter(delimiter, data) {
        let mut end = pos;
        // Strip trailing CR before LF
        if delimiter == b'\n' && end > start && data[end - 1] == b'\r' {
            end -= 1;
        }
        offsets.push((start, end));
        start = pos + 1;
    }

    // Handle last line without trailing delimiter
    if start < data.len() {
        let mut end = data.len();
        if delimiter == b'\n' && end > start && data[end - 1] == b'\r' {
            end -= 1;
        }
        offsets.push((start, end));
    }

    Ok((buffer, offsets))
}

fn main() -> Result<()> {
    reset_sigpipe();
    let cli = Cli::parse();

    let inputs = if cli.files.is_empty() {
        vec!["-".to_string()]
    } else {
        cli.files.clone()
    };

    let (buffer, mut offsets) = read_all_input(&inputs, cli.zero_terminated)?;
    let data: &[u8] = &buffer;

    let options = SortOptions {
        stable: cli.stable,
        threads: cli.parallel.unwrap_or_else(|| SortOptions::default().threads),
        oversampling: cli.oversampling,
        splitting: match cli.splitting {
            SplittingArg::Sampling => SplittingMode::Sampling,
            SplittingArg::Exact => SplittingMode::Exact,
        },
        strategy: match cli.buffer {
            BufferArg::Copy => BufferStrategy::CopyToTemp,
            BufferArg::InPlace => BufferStrategy::InPlace,
        },
    };

    // Comparisons jump to arbitrary lines during the sort phase.
    #[cfg(target_os = "linux")]
    if let FileData::Mmap(ref mmap) = buffer {
        let _ = mmap.advise(memmap2::Advice::Random);
    }

    // Sort lightweight index pairs instead of moving line data.
    let reverse = cli.reverse;
    let compare = |a: &(usize, usize), b: &(usize, usize)| -> Ordering {
        let ord = data[a.0..a.1].cmp(&data[b.0..b.1]);
        if reverse { ord.reverse() } else { ord }
    };
    parallel_mergesort(&mut offsets, compare, &options);

    // Switch to sequential access for the output pass.
    #[cfg(target_os = "linux")]
    if let FileData::Mmap(ref mmap) = buffer {
        let _ = mmap.advise(memmap2::Advice::Sequential);
    }

    let terminator: &[u8] = if cli.zero_terminated { b"\0" } else { b"\n" };
    let stdout = io::stdout();
    let mut writer = match cli.output {
        Some(ref path) => SortOutput::File(BufWriter::with_capacity(
            OUTPUT_BUF_SIZE,
            File::create(path).with_context(|| format!("create failed: {}", path))?,
        )),
        None => SortOutput::Stdout(BufWriter::with_capacity(OUTPUT_BUF_SIZE, stdout.lock())),
    };

    let mut prev: Option<(usize, usize)> = None;
    for &(s, e) in &offsets {
        if cli.unique {
            if let Some((ps, pe)) = prev {
                if data[ps..pe] == data[s..e] {
                    continue;
                }
            }
            prev = Some((s, e));
        }
        writer.write_all(&data[s..e])?;
        writer.write_all(terminator)?;
    }
    writer.flush()?;
    Ok(())
}
