mod fixtures {
    use futures::future;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tidings_bus::{Callback, Completion};

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct TestEvent(pub usize);

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct OtherEvent(pub usize);

    #[derive(Debug, thiserror::Error)]
    #[error("subscriber {0} rejected the event")]
    pub struct Rejected(pub &'static str);

    pub type Journal = Arc<Mutex<Vec<String>>>;

    pub fn journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().clone()
    }

    pub fn recorder(journal: &Journal, tag: &'static str) -> Callback<TestEvent> {
        let journal = Arc::clone(journal);
        Callback::from_closure(move |event: Arc<TestEvent>| -> Completion {
            journal.lock().push(format!("{tag}:{}", event.0));
            Box::pin(future::ready(Ok(())))
        })
    }

    pub fn failing(journal: &Journal, tag: &'static str) -> Callback<TestEvent> {
        let journal = Arc::clone(journal);
        Callback::from_closure(move |_: Arc<TestEvent>| -> Completion {
            journal.lock().push(tag.to_owned());
            Box::pin(future::ready(Err(Rejected(tag).into())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use futures::future;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tidings_bus::*;

    #[tokio::test]
    async fn test_single_subscriber_delivery() {
        let bus = ConcurrentBus::new();
        let log = journal();
        bus.subscribe(recorder(&log, "only")).await.unwrap();

        bus.publish(TestEvent(42)).await.unwrap();

        assert_eq!(entries(&log), vec!["only:42"]);
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_subscriber() {
        let bus = ConcurrentBus::new();
        let log = journal();
        bus.subscribe(recorder(&log, "a")).await.unwrap();
        bus.subscribe(recorder(&log, "b")).await.unwrap();

        bus.publish(TestEvent(1)).await.unwrap();

        assert_eq!(entries(&log), vec!["a:1", "b:1"]);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = ConcurrentBus::new();
        let log = journal();
        let callback = recorder(&log, "gone");
        bus.subscribe(callback.clone()).await.unwrap();

        assert!(bus.unsubscribe(&callback).await.unwrap());
        bus.publish(TestEvent(1)).await.unwrap();

        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_of_absent_callback_changes_nothing() {
        let bus = ConcurrentBus::new();
        let log = journal();
        bus.subscribe(recorder(&log, "kept")).await.unwrap();

        assert!(!bus.unsubscribe(&recorder(&log, "never")).await.unwrap());
        bus.publish(TestEvent(5)).await.unwrap();

        assert_eq!(entries(&log), vec!["kept:5"]);
    }

    #[tokio::test]
    async fn test_subscribers_run_by_ascending_order() {
        let bus = ConcurrentBus::new();
        let log = journal();
        bus.subscribe_with_order(recorder(&log, "3"), 3).await.unwrap();
        bus.subscribe_with_order(recorder(&log, "1"), 1).await.unwrap();
        bus.subscribe_with_order(recorder(&log, "2"), 2).await.unwrap();

        bus.publish(TestEvent(0)).await.unwrap();

        assert_eq!(entries(&log), vec!["1:0", "2:0", "3:0"]);
    }

    #[tokio::test]
    async fn test_ties_keep_registration_order() {
        let bus = ConcurrentBus::new();
        let log = journal();
        bus.subscribe(recorder(&log, "default")).await.unwrap();
        bus.subscribe_with_order(recorder(&log, "first"), 7).await.unwrap();
        bus.subscribe_with_order(recorder(&log, "second"), 7).await.unwrap();

        bus.publish(TestEvent(0)).await.unwrap();

        assert_eq!(entries(&log), vec!["first:0", "second:0", "default:0"]);
    }

    #[tokio::test]
    async fn test_duplicate_subscription_fires_twice_and_unsubscribes_together() {
        let bus = ConcurrentBus::new();
        let log = journal();
        let callback = recorder(&log, "dup");
        bus.subscribe(callback.clone()).await.unwrap();
        bus.subscribe(callback.clone()).await.unwrap();

        bus.publish(TestEvent(1)).await.unwrap();
        assert_eq!(entries(&log), vec!["dup:1", "dup:1"]);

        assert!(bus.unsubscribe(&callback).await.unwrap());
        assert_eq!(bus.read().await.subscriber_count::<TestEvent>(), 0);
    }

    #[tokio::test]
    async fn test_multiple_event_types_are_isolated() {
        let bus = ConcurrentBus::new();
        let log = journal();
        bus.subscribe(recorder(&log, "test")).await.unwrap();

        bus.publish(OtherEvent(13)).await.unwrap();
        bus.publish(TestEvent(7)).await.unwrap();

        assert_eq!(entries(&log), vec!["test:7"]);
    }

    #[tokio::test]
    async fn test_failures_are_aggregated_in_subscriber_order() {
        let bus = ConcurrentBus::new();
        let log = journal();
        bus.subscribe_with_order(failing(&log, "late"), 5).await.unwrap();
        bus.subscribe_with_order(recorder(&log, "ok"), 3).await.unwrap();
        bus.subscribe_with_order(failing(&log, "early"), 1).await.unwrap();

        let err = bus.publish(TestEvent(9)).await.unwrap_err();

        assert_eq!(entries(&log), vec!["early", "ok:9", "late"]);
        let failure = err.dispatch_failure().expect("dispatch failure");
        assert_eq!(failure.invoked(), 3);
        let messages: Vec<_> = failure.failures().iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec!["subscriber early rejected the event", "subscriber late rejected the event"]
        );
        assert!(failure.first().unwrap().downcast_ref::<Rejected>().is_some());
    }

    #[tokio::test]
    async fn test_publish_waits_for_every_async_subscriber() {
        let bus = ConcurrentBus::new();
        let done = Arc::new(AtomicUsize::new(0));

        for delay in [30_u64, 10, 20] {
            let done = Arc::clone(&done);
            bus.subscribe(Callback::from_closure(move |_: Arc<TestEvent>| -> Completion {
                let done = Arc::clone(&done);
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }))
            .await
            .unwrap();
        }

        bus.publish(TestEvent(0)).await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_subscriber_may_publish_and_mutate_the_bus() {
        let bus = ConcurrentBus::new();
        let log = journal();
        bus.subscribe(recorder(&log, "other")).await.unwrap();

        let inner = bus.clone();
        let relay = Callback::from_closure(move |event: Arc<OtherEvent>| -> Completion {
            let bus = inner.clone();
            Box::pin(async move {
                bus.subscribe(Callback::from_closure(|_: Arc<OtherEvent>| -> Completion {
                    Box::pin(future::ready(Ok(())))
                }))
                .await?;
                bus.publish(TestEvent(event.0)).await?;
                Ok(())
            })
        });
        bus.subscribe(relay).await.unwrap();

        bus.publish(OtherEvent(3)).await.unwrap();

        assert_eq!(entries(&log), vec!["other:3"]);
        assert_eq!(bus.read().await.subscriber_count::<OtherEvent>(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishers_and_subscribers() {
        let bus = ConcurrentBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let bus = bus.clone();
            let hits = Arc::clone(&hits);
            tasks.push(tokio::spawn(async move {
                let callback = Callback::from_closure(move |_: Arc<TestEvent>| -> Completion {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Box::pin(future::ready(Ok(())))
                });
                bus.subscribe(callback.clone()).await.unwrap();
                bus.publish(TestEvent(0)).await.unwrap();
                bus.unsubscribe(&callback).await.unwrap()
            }));
        }

        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert!(hits.load(Ordering::SeqCst) >= 8);
        assert!(bus.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_publisher_slot_forwards_to_the_bus() {
        let bus = ConcurrentBus::new();
        let log = journal();
        bus.subscribe(recorder(&log, "bus")).await.unwrap();

        let slot = PublisherSlot::<TestEvent>::new();
        slot.add_handler(bus.forwarder());
        slot.emit(TestEvent(11)).await.unwrap();

        assert!(slot.remove_handler(&bus.forwarder()));
        slot.emit(TestEvent(12)).await.unwrap();

        assert_eq!(entries(&log), vec!["bus:11"]);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_skipped() {
        struct Listener {
            hits: AtomicUsize,
        }

        fn on_event(listener: Arc<Listener>, _: Arc<TestEvent>) -> Completion {
            listener.hits.fetch_add(1, Ordering::SeqCst);
            Box::pin(future::ready(Ok(())))
        }

        let bus = ConcurrentBus::new();
        let listener = Arc::new(Listener { hits: AtomicUsize::new(0) });
        bus.subscribe(Callback::method(&listener, "on_event", on_event)).await.unwrap();

        bus.publish(TestEvent(1)).await.unwrap();
        assert_eq!(listener.hits.load(Ordering::SeqCst), 1);

        drop(listener);
        bus.publish(TestEvent(2)).await.unwrap();
    }

    #[test]
    fn test_blocking_variants_match_async_ones() {
        let bus = ConcurrentBus::new();
        let log = journal();
        let callback = recorder(&log, "sync");

        bus.blocking_subscribe_with_order(callback.clone(), 2).unwrap();
        bus.blocking_subscribe_with_order(recorder(&log, "first"), 1).unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(bus.publish(TestEvent(4))).unwrap();
        assert_eq!(entries(&log), vec!["first:4", "sync:4"]);

        assert!(bus.blocking_unsubscribe(&callback).unwrap());
        assert!(!bus.blocking_unsubscribe(&callback).unwrap());
    }
}
