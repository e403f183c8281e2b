use tidings::bindings;

struct Tick;
struct Meter;

#[bindings]
impl Meter {
    #[subscriber]
    fn on_tick(&self) {}
}

fn main() {
    let _ = (Meter, Tick);
}
