//! Interactive console commands.

use std::path::PathBuf;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Choose the letterhead PDF.
    Letterhead(PathBuf),
    /// Choose the folder to watch.
    Folder(PathBuf),
    /// Start watching the configured folder.
    Watch,
    /// Stop watching.
    Stop,
    /// Merge one file into an explicit output.
    Merge {
        /// Invoice to merge.
        source: PathBuf,
        /// Where to save the merged copy.
        output: PathBuf,
    },
    /// Merge several files into a folder.
    Batch {
        /// Folder receiving the merged copies.
        out_dir: PathBuf,
        /// Invoices to merge.
        files: Vec<PathBuf>,
    },
    /// Show the configuration and watch state.
    Status,
    /// Download a newer release, if there is one.
    Update,
    /// List the commands.
    Help,
    /// Leave the console.
    Quit,
}

/// Command reference printed by `help`.
pub const HELP: &str = "\
Commands:
  letterhead <path>              Choose the single-page letterhead PDF
  folder <path>                  Choose the folder to watch
  watch                          Start watching the folder
  stop                           Stop watching
  merge <source> <output>        Merge one file into <output>
  batch <out_dir> <files...>     Merge files into <out_dir>/<name>.merged.pdf
  status                         Show the current settings
  update                         Download the latest release if it is newer
  help                           Show this list
  quit                           Stop watching and exit

Paths containing spaces can be wrapped in double quotes.";

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = tokenize(line)?.into_iter();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<String> = words.collect();

        let command = match (name.to_lowercase().as_str(), args.as_slice()) {
            ("letterhead" | "lh", [path]) => Self::Letterhead(PathBuf::from(path)),
            ("folder" | "dir", [path]) => Self::Folder(PathBuf::from(path)),
            ("watch" | "start", []) => Self::Watch,
            ("stop", []) => Self::Stop,
            ("merge", [source, output]) => Self::Merge {
                source: PathBuf::from(source),
                output: PathBuf::from(output),
            },
            ("batch", [out_dir, files @ ..]) if !files.is_empty() => Self::Batch {
                out_dir: PathBuf::from(out_dir),
                files: files.iter().map(PathBuf::from).collect(),
            },
            ("status", []) => Self::Status,
            ("update", []) => Self::Update,
            ("help" | "?", []) => Self::Help,
            ("quit" | "exit" | "q", []) => Self::Quit,
            (
                "letterhead" | "lh" | "folder" | "dir" | "watch" | "start" | "stop" | "merge"
                | "batch" | "status" | "update" | "help" | "quit" | "exit",
                _,
            ) => {
                return Err(format!("Wrong arguments for '{name}'. Type 'help' for usage."));
            }
            _ => return Err(format!("Unknown command '{name}'. Type 'help' for usage.")),
        };
        Ok(Some(command))
    }
}

/// Split a line on whitespace, keeping double-quoted runs together.
fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        return Err("Unterminated quote".to_string());
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
