use std::borrow::Cow;
use tidings_derive::tidings_error;

#[tidings_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read() -> Result<(), DemoError> {
    let io: Result<(), std::io::Error> = Err(std::io::Error::other("disk"));
    io.context("reading journal")?;
    Ok(())
}

fn main() {
    let err = read().unwrap_err();
    assert_eq!(err.to_string(), "IO error (reading journal): disk");

    let internal: Result<(), DemoError> = Err("broken".into());
    let err = internal.context("replay").unwrap_err();
    assert_eq!(err.to_string(), "Internal error (replay): broken");
}
