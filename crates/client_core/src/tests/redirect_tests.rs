use super::*;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::oneshot;

#[tokio::test]
async fn fires_after_delay() {
    let (tx, rx) = oneshot::channel();
    let mut timer = RedirectTimer::new();
    assert!(timer.schedule(Duration::from_millis(20), move || {
        let _ = tx.send(());
    }));
    assert!(timer.is_pending());

    tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .expect("redirect fired in time")
        .expect("sender kept");
}

#[tokio::test]
async fn second_schedule_is_ignored() {
    let fired = Arc::new(AtomicUsize::new(0));
    let mut timer = RedirectTimer::new();
    for _ in 0..3 {
        let fired = Arc::clone(&fired);
        timer.schedule(Duration::from_millis(10), move || {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!timer.is_pending());

    let fired_again = Arc::clone(&fired);
    assert!(!timer.schedule(Duration::from_millis(1), move || {
        fired_again.fetch_add(1, Ordering::SeqCst);
    }));
}

#[tokio::test]
async fn cancel_suppresses_redirect() {
    let fired = Arc::new(AtomicUsize::new(0));
    let mut timer = RedirectTimer::new();
    let counter = Arc::clone(&fired);
    timer.schedule(Duration::from_millis(50), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    timer.cancel();
    assert!(!timer.is_pending());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn drop_suppresses_redirect() {
    let fired = Arc::new(AtomicUsize::new(0));
    {
        let mut timer = RedirectTimer::new();
        let counter = Arc::clone(&fired);
        timer.schedule(Duration::from_millis(50), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}
