mod api {
    pub use tidings::*;
}

use std::sync::Arc;

struct Tick;

struct Clock;

#[tidings::bindings(crate = "crate::api")]
impl Clock {
    #[subscriber]
    async fn on_tick(&self, _event: Arc<Tick>) {}
}

fn main() {
    let binding = tidings::BindingCache::new().resolve::<Clock>().unwrap();
    assert_eq!(binding.subscribers().len(), 1);
    assert_eq!(binding.subscribers()[0].order(), tidings::DEFAULT_ORDER);
}
