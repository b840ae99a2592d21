use std::{
  sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc, Arc, Mutex,
  },
  time::Duration,
};

use futures::StreamExt;
use rxbridge::prelude::*;

const TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

#[derive(Debug)]
struct Message {
  shard: SourceId,
  text: &'static str,
}
rxbridge::impl_event!(Message, source = shard);

fn message(text: &'static str) -> DynEvent { Arc::new(Message { shard: SourceId::new(0), text }) }

fn shutdown() -> DynEvent { Arc::new(Shutdown::new(SourceId::new(0))) }

fn inline_config() -> ManagerConfig {
  ManagerConfig { scheduler: Some(Arc::new(InlineScheduler::new())), ..ManagerConfig::default() }
}

#[derive(Debug, PartialEq)]
enum Seen {
  Text(&'static str),
  Exception(String),
  Shutdown,
  End,
}

/// Subscribes to every event; `Seen::End` arrives once the stream completes.
fn record(manager: &EventManager) -> (mpsc::Receiver<Seen>, EventSubscription) {
  let (tx, rx) = mpsc::channel();
  let end = tx.clone();
  let subscription = manager.events().subscribe_all(
    move |event: DynEvent| {
      let seen = if let Some(m) = event.downcast_ref::<Message>() {
        Seen::Text(m.text)
      } else if let Some(x) = event.downcast_ref::<ExceptionEvent>() {
        Seen::Exception(x.error.to_string())
      } else if event.is::<Shutdown>() {
        Seen::Shutdown
      } else {
        unreachable!("unexpected event {event:?}")
      };
      let _ = tx.send(seen);
    },
    |err| panic!("stream failed: {err}"),
    move || {
      let _ = end.send(Seen::End);
    },
  );
  (rx, subscription)
}

fn collect_until_end(rx: &mpsc::Receiver<Seen>) -> Vec<Seen> {
  let mut seen = vec![];
  loop {
    let next = rx.recv_timeout(TIMEOUT).expect("stream never ended");
    let done = next == Seen::End;
    seen.push(next);
    if done {
      return seen;
    }
  }
}

#[test]
fn every_subscriber_sees_the_same_order() {
  init_tracing();
  let manager = EventManager::with_config(ManagerConfig {
    scheduler: Some(Arc::new(ThreadPoolScheduler::pool("ordering", 4))),
    ..ManagerConfig::default()
  });
  let subscribers: Vec<_> = (0..3).map(|_| record(&manager)).collect();

  const TEXTS: [&str; 5] = ["a", "b", "c", "d", "e"];
  for _ in 0..20 {
    for text in TEXTS {
      manager.handle(message(text));
    }
  }
  manager.complete();

  let expected: Vec<_> = (0..20)
    .flat_map(|_| TEXTS.map(Seen::Text))
    .chain([Seen::End])
    .collect();
  for (rx, _) in &subscribers {
    assert_eq!(collect_until_end(rx), expected);
  }
}

#[test]
fn shutdown_completes_then_ignores_events() {
  init_tracing();
  let manager = EventManager::new();
  let (tx, rx) = mpsc::channel();
  let end = tx.clone();
  let typed = manager.on::<Message>().subscribe_all(
    move |m| tx.send(Some(m.text)).unwrap(),
    |err| panic!("stream failed: {err}"),
    move || end.send(None).unwrap(),
  );
  let (all, _all) = record(&manager);
  let calls = Arc::new(AtomicUsize::new(0));
  let c_calls = calls.clone();
  let listener: Arc<dyn EventListener> = Arc::new(ListenerFn::new(move |_| {
    c_calls.fetch_add(1, Ordering::SeqCst);
  }));
  manager.register(listener).unwrap();

  manager.handle(message("A"));
  manager.handle(message("B"));
  manager.handle(shutdown());
  manager.handle(message("C"));

  let typed_seen: Vec<_> = (0..3).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
  assert_eq!(typed_seen, [Some("A"), Some("B"), None]);
  assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
  assert!(typed.is_closed());

  assert_eq!(
    collect_until_end(&all),
    [Seen::Text("A"), Seen::Text("B"), Seen::Shutdown, Seen::End]
  );
  assert!(manager.is_closed());
  assert_eq!(manager.state(), LifecycleState::Disposed);
  assert!(manager.registered_listeners().is_empty());
  assert!(manager.scheduler().is_disposed());
}

#[test]
fn stream_end_is_signalled_once() {
  let manager = EventManager::with_config(inline_config());
  let ends = Arc::new(AtomicUsize::new(0));
  let c_ends = ends.clone();
  let _subscription = manager.events().subscribe_all(
    |_| {},
    |_| {},
    move || {
      c_ends.fetch_add(1, Ordering::SeqCst);
    },
  );

  manager.complete();
  manager.handle(shutdown());
  manager.complete();
  assert_eq!(ends.load(Ordering::SeqCst), 1);
}

#[test]
fn dispose_twice_matches_dispose_once() {
  let observe = |manager: &EventManager| {
    (manager.state(), manager.is_closed(), manager.registered_listeners().len(), manager.scheduler().is_disposed())
  };
  let make = || {
    let manager = EventManager::new();
    manager.register(Arc::new(ListenerFn::new(|_| {}))).unwrap();
    manager
  };

  let once = make();
  once.dispose();
  let twice = make();
  twice.dispose();
  twice.dispose();

  assert_eq!(observe(&once), observe(&twice));
  assert_eq!(observe(&twice), (LifecycleState::Disposed, false, 0, true));
}

#[test]
fn register_then_unregister_leaves_nothing_behind() {
  let manager = EventManager::with_config(ManagerConfig { auto_subscribe: false, ..inline_config() });
  let calls = Arc::new(AtomicUsize::new(0));
  let c_calls = calls.clone();
  let listener: Arc<dyn EventListener> = Arc::new(ListenerFn::new(move |_| {
    c_calls.fetch_add(1, Ordering::SeqCst);
  }));

  manager.register(listener.clone()).unwrap();
  assert!(manager.unregister(&listener));
  assert!(manager.registered_listeners().is_empty());
  assert!(!manager.unregister(&listener));

  manager.handle(message("nobody listens"));
  assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn two_listeners_then_one() {
  init_tracing();
  let manager = EventManager::new();
  let (tx, rx) = mpsc::channel::<(&'static str, &'static str)>();
  let listener = |name: &'static str| -> Arc<dyn EventListener> {
    let tx = Mutex::new(tx.clone());
    Arc::new(ListenerFn::new(move |event| {
      if let Some(m) = event.downcast_ref::<Message>() {
        tx.lock().unwrap().send((name, m.text)).unwrap();
      }
    }))
  };
  let l1 = listener("L1");
  let l2 = listener("L2");
  manager.register(l1.clone()).unwrap();
  manager.register(l2.clone()).unwrap();
  assert_eq!(manager.registered_listeners().len(), 2);

  manager.handle(message("X"));
  let mut first: Vec<_> = (0..2).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
  first.sort();
  assert_eq!(first, [("L1", "X"), ("L2", "X")]);

  assert!(manager.unregister(&l1));
  manager.handle(message("Y"));
  assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), ("L2", "Y"));
  assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
}

#[test]
fn unsupported_listener_is_rejected_without_side_effects() {
  let manager = EventManager::with_config(inline_config());
  manager.register_object(Arc::new(ListenerFn::new(|_| {}))).unwrap();
  let before = manager.registered_objects();

  struct NotAListener;
  let result = manager.register_object(Arc::new(NotAListener));
  assert_eq!(
    result,
    Err(RegistryError::UnsupportedCapability { type_id: std::any::TypeId::of::<NotAListener>() })
  );

  let after = manager.registered_objects();
  assert_eq!(before.len(), after.len());
  assert!(before.iter().zip(&after).all(|(a, b)| Arc::ptr_eq(a, b)));
}

#[test]
fn failure_sits_between_its_neighbours() {
  init_tracing();
  let pipeline = Pipeline::identity().try_map(|event: DynEvent| match event.downcast_ref::<Message>() {
    Some(m) if m.text == "E" => Err("cannot decode E"),
    _ => Ok(event),
  });
  let manager = EventManager::with_config(ManagerConfig { pipeline, ..ManagerConfig::default() });
  let (rx, _subscription) = record(&manager);

  manager.handle(message("D"));
  manager.handle(message("E"));
  manager.handle(message("F"));
  manager.complete();

  assert_eq!(
    collect_until_end(&rx),
    [
      Seen::Text("D"),
      Seen::Exception("event pipeline failed: cannot decode E".to_owned()),
      Seen::Text("F"),
      Seen::End,
    ]
  );
}

#[test]
fn drop_latest_with_stalled_consumer() {
  init_tracing();
  const N: usize = 4;
  let manager = EventManager::with_config(ManagerConfig {
    overflow: OverflowPolicy::DropLatest { capacity: N },
    auto_subscribe: false,
    ..ManagerConfig::default()
  });

  let (entered_tx, entered) = mpsc::channel();
  let (release, release_rx) = mpsc::channel::<()>();
  let (tx, rx) = mpsc::channel();
  let mut stalled = true;
  let subscription = manager.on::<Message>().subscribe_all(
    move |m| {
      if std::mem::take(&mut stalled) {
        entered_tx.send(()).unwrap();
        release_rx.recv_timeout(TIMEOUT).unwrap();
      }
      tx.send(m.text).unwrap();
    },
    |err| panic!("drop policy must not error: {err}"),
    || {},
  );

  const TEXTS: [&str; N + 1] = ["1", "2", "3", "4", "5"];
  manager.handle(message(TEXTS[0]));
  entered.recv_timeout(TIMEOUT).unwrap();
  for text in TEXTS[1..].iter().copied() {
    manager.handle(message(text));
  }
  release.send(()).unwrap();

  let seen: Vec<&str> = (0..N).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
  assert_eq!(seen, &TEXTS[..N]);
  assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
  assert_eq!(subscription.dropped_events(), 1);
  assert!(!subscription.is_closed());
}

#[test]
fn error_policy_reports_overflow_to_the_subscriber() {
  let manager = EventManager::with_config(ManagerConfig {
    overflow: OverflowPolicy::Error { capacity: 0 },
    ..inline_config()
  });
  let (tx, rx) = mpsc::channel();
  let subscription = manager.events().subscribe_all(|_| {}, move |err| tx.send(err).unwrap(), || {});

  manager.handle(message("too much"));
  assert_eq!(rx.try_recv(), Ok(StreamError::Overflow { capacity: 0 }));
  assert!(subscription.is_closed());
  assert_eq!(manager.state(), LifecycleState::Active);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn views_as_async_streams() {
  init_tracing();
  let manager = EventManager::new();
  let mut texts = manager.on::<Message>().map(|m| m.text).into_stream();
  let mut shutdowns = manager.on::<ManagerEvents>().into_stream();

  let producer = manager.clone();
  std::thread::spawn(move || {
    for text in ["x", "y"] {
      producer.handle(message(text));
    }
    producer.handle(shutdown());
  });

  assert_eq!(texts.next().await, Some(Ok("x")));
  assert_eq!(texts.next().await, Some(Ok("y")));
  assert_eq!(texts.next().await, None);

  let event = shutdowns.next().await.unwrap().unwrap();
  assert!(event.is::<Shutdown>());
  assert!(shutdowns.next().await.is_none());
}

#[tokio::test]
async fn forwards_an_async_source() {
  let manager = EventManager::with_config(inline_config());
  let (tx, rx) = mpsc::channel();
  let _subscription = manager.on::<Message>().subscribe(move |m| tx.send(m.text).unwrap());

  let source = futures::stream::iter([message("p"), message("q"), shutdown(), message("r")]);
  let forwarded = manager.forward(source).await;

  assert_eq!(forwarded, 3);
  assert_eq!(rx.try_iter().collect::<Vec<_>>(), ["p", "q"]);
  assert_eq!(manager.state(), LifecycleState::Disposed);
}

#[tokio::test]
async fn stream_ends_once_the_manager_worker_is_gone() {
  let manager = EventManager::with_config(ManagerConfig { complete_on_shutdown: false, ..ManagerConfig::default() });
  let mut texts = manager.on::<Message>().map(|m| m.text).into_stream();

  manager.dispose();
  manager.handle(message("after dispose"));

  let first = tokio::time::timeout(TIMEOUT, texts.next()).await.expect("stream never terminated");
  assert_eq!(first, Some(Err(StreamError::SchedulerUnavailable)));
  assert_eq!(texts.next().await, None);
  assert!(texts.subscription().is_closed());
  assert!(!manager.is_closed());
}
