use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use mhtml2html::ConvertOptions;

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let mut options = ConvertOptions::default();
    let mut path: Option<String> = None;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--convert-iframes" => options.convert_iframes = true,
            "-h" | "--help" => {
                println!("usage: convert [--convert-iframes] [FILE]");
                println!("reads an MHTML archive from FILE or stdin, writes self-contained HTML to stdout");
                return ExitCode::SUCCESS;
            }
            other => path = Some(other.to_string()),
        }
    }

    let data = match path {
        Some(path) => match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("error: failed to read {path}: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut bytes = Vec::new();
            if let Err(err) = io::stdin().read_to_end(&mut bytes) {
                eprintln!("error: failed to read stdin: {err}");
                return ExitCode::FAILURE;
            }
            bytes
        }
    };

    match mhtml2html::convert(&data, &options) {
        Ok(html) => {
            if io::stdout().write_all(html.as_bytes()).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
