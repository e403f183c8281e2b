use tidings::bindings;

struct Tick;
struct Meter;

#[bindings]
impl Meter {
    #[subscriber]
    fn on_tick(&self, event: std::sync::Arc<Tick>, count: u32) {}
}

fn main() {
    let _ = (Meter, Tick);
}
