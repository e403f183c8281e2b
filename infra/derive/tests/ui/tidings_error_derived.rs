use std::borrow::Cow;
use tidings_derive::tidings_error;

#[tidings_error]
#[derive(Debug)]
pub enum SlotError {
    #[error("Slot closed{}", format_context(.context))]
    Closed { context: Option<Cow<'static, str>> },
}

fn main() {
    let closed: Result<(), SlotError> = Err(SlotError::Closed { context: None });
    let err = closed.context("emit").unwrap_err();
    assert_eq!(format!("{err}"), "Slot closed (emit)");
}
