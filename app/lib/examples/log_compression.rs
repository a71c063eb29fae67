//! Compress a small log, search it, and decompress the matches.
//!
//! Run with: `cargo run --example log_compression`

use logpack_compression::{plan_query, LogCompressor, Schema, SearchConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log = "\
2024-01-01 08:00:00 session job-red opened by 1001\n\
2024-01-01 08:00:05 session job-blue opened by 1002\n\
2024-01-01 08:01:00 session job-red closed after 55.2 seconds\n";

    let mut schema = Schema::standard();
    schema.add_variable("jobid", "job-[a-z]+", 0)?;

    let compressor = LogCompressor::new();
    let archive = compressor.compress_with_schema(&schema, log.as_bytes())?;
    let stats = compressor.stats().snapshot();
    println!(
        "compressed {} messages into {} logtypes",
        stats.messages, stats.logtypes
    );

    let query = plan_query(&archive, "job-red", &SearchConfig::default(), Some(&schema))?;
    for (index, text) in archive.find_matches(&query)? {
        print!("match {}: {}", index, text);
    }

    Ok(())
}
