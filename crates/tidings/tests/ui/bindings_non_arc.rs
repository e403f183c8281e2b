use tidings::bindings;

struct Tick;
struct Meter;

#[bindings]
impl Meter {
    #[subscriber]
    fn on_tick(&self, event: Tick) {}
}

fn main() {
    let _ = (Meter, Tick);
}
