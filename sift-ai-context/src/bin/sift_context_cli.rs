use clap::Parser;
use sift_ai_context::text::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, Metadata, ParagraphChunker};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};

/// A CLI tool to chunk a text file into JSON output using sift-ai-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    input: Option<String>,

    /// Character budget for each chunk.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Trailing characters carried into the next chunk.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    overlap: usize,

    /// Source URL recorded in each chunk's metadata.
    #[arg(short, long, default_value = "unknown")]
    source_url: String,
}

#[derive(Serialize)]
struct SerializableChunk<'a> {
    sequence: usize,
    chars: usize,
    text: &'a str,
    metadata: &'a Metadata,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    if args.chunk_size == 0 || args.overlap >= args.chunk_size {
        eprintln!(
            "Error: overlap ({}) must be smaller than a non-zero chunk size ({})",
            args.overlap, args.chunk_size
        );
        std::process::exit(2);
    }

    let file_content = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let mut metadata = Metadata::new();
    metadata.insert("source_url".to_string(), args.source_url);

    let chunker = ParagraphChunker::new(args.chunk_size, args.overlap);
    let drafts = chunker.chunk(&file_content, &metadata);

    let serializable_chunks: Vec<SerializableChunk> = drafts
        .iter()
        .enumerate()
        .map(|(sequence, draft)| SerializableChunk {
            sequence,
            chars: draft.char_len(),
            text: &draft.text,
            metadata: &draft.metadata,
        })
        .collect();

    let json_output = serde_json::to_string_pretty(&serializable_chunks)?;
    println!("{json_output}");

    Ok(())
}
