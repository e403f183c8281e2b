use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tidings::{BindingCache, ConcurrentBus, PublisherSlot, Registrar, bindings};

struct Deposit(u32);

#[derive(Default)]
struct Account {
    balance: AtomicU32,
    deposits: PublisherSlot<Deposit>,
}

#[bindings(publisher = deposits)]
impl Account {
    #[subscriber(order = -1)]
    fn on_deposit(&self, event: Arc<Deposit>) -> Result<(), std::io::Error> {
        self.balance.fetch_add(event.0, Ordering::SeqCst);
        Ok(())
    }

    pub fn balance(&self) -> u32 {
        self.balance.load(Ordering::SeqCst)
    }
}

fn main() {
    let registrar = Registrar::with_cache(ConcurrentBus::new(), BindingCache::new());
    let account = Arc::new(Account::default());
    registrar.blocking_register(&account).unwrap();

    futures::executor::block_on(async {
        account.deposits.emit(Deposit(5)).await.unwrap();
    });

    assert_eq!(account.balance(), 5);
}
