use tidings_derive::tidings_error;

#[tidings_error]
pub enum LedgerError {
    Io(std::io::Error),
}

fn main() {}
