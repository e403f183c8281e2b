use tidings_derive::tidings_error;

#[tidings_error]
pub enum LedgerError {
    #[error("IO error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
}

fn main() {}
