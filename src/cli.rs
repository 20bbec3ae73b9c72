use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "zipcodec")]
#[command(version)]
#[command(about = "Read, extract and edit ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipcodec data1.zip -x joe              extract all files except joe from data1.zip\n  \
  zipcodec -p foo.zip | more             send contents of foo.zip via pipe into more\n  \
  zipcodec -a -m lzma -P pw out.zip a b  add a and b to out.zip, LZMA and encrypted\n  \
  zipcodec -r out.zip a                  remove a from out.zip")]
pub struct Cli {
    /// ZIP file path
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract, add or remove (default for extraction: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely / more log output
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Password for encrypting (with -a) or decrypting
    #[arg(short = 'P', value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Add FILES to the archive, creating it if needed
    #[arg(short = 'a', conflicts_with_all = ["remove", "list"])]
    pub add: bool,

    /// Compression method for added files
    #[arg(short = 'm', value_name = "METHOD", default_value = "deflate",
          value_parser = ["store", "deflate", "lzma"])]
    pub method: String,

    /// Write a data descriptor after each added file
    #[arg(short = 'D')]
    pub data_descriptor: bool,

    /// Remove FILES from the archive
    #[arg(short = 'r', conflicts_with = "list")]
    pub remove: bool,

    /// Set the archive comment
    #[arg(short = 'z', value_name = "COMMENT")]
    pub comment: Option<String>,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Whether the archive gets rewritten rather than only read.
    pub fn is_editing(&self) -> bool {
        self.add || self.remove || self.comment.is_some()
    }

    /// Default `log` filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.is_very_quiet() {
            "off"
        } else if self.quiet > 0 {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }
}
