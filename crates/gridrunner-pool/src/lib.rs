pub mod client;
pub mod error;
pub mod locator;
pub mod pool;

pub use client::{FakeClient, FakeSnapshot, FantocciniClient, GridClient};
pub use error::PoolError;
pub use locator::ScriptLocator;
pub use pool::{FantocciniFactory, SessionFactory, SessionGuard, SessionPool, SessionState};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct FakeFactory {
        fail_next: Arc<std::sync::atomic::AtomicBool>,
        created: AtomicUsize,
    }

    impl FakeFactory {
        fn new() -> Self {
            FakeFactory {
                fail_next: Arc::new(std::sync::atomic::AtomicBool::new(false)),
                created: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SessionFactory for FakeFactory {
        async fn create(&self) -> error::Result<Box<dyn GridClient>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(PoolError::GridUnreachable("fake grid down".to_string()));
            }
            Ok(Box::new(FakeClient::new()))
        }
    }

    #[tokio::test]
    async fn warm_up_populates_the_registry() {
        let pool = SessionPool::new(Arc::new(FakeFactory::new()), Duration::from_secs(1));
        let started = pool.warm_up(3).await.unwrap();
        assert_eq!(started, 3);
        assert_eq!(pool.list().await.len(), 3);
    }

    #[tokio::test]
    async fn acquire_lends_a_session_without_blocking_others() {
        let pool = SessionPool::new(Arc::new(FakeFactory::new()), Duration::from_secs(1));
        pool.warm_up(2).await.unwrap();
        let ids = pool.list().await;
        let mut a = pool.acquire(&ids[0]).await.unwrap();
        let mut b = pool.acquire(&ids[1]).await.unwrap();
        a.client_mut().goto("https://a.example").await.unwrap();
        b.client_mut().goto("https://b.example").await.unwrap();
        assert_eq!(a.client_mut().current_url().await.unwrap(), "https://a.example");
        assert_eq!(b.client_mut().current_url().await.unwrap(), "https://b.example");
    }

    #[tokio::test]
    async fn dead_session_is_excluded_from_list() {
        let pool = SessionPool::new(Arc::new(FakeFactory::new()), Duration::from_secs(1));
        pool.warm_up(2).await.unwrap();
        let ids = pool.list().await;
        // force replacement to fail by making the factory error once more
        // than retire() will call it.
        pool.retire(&ids[0]).await.ok();
        assert_eq!(pool.list().await.len(), 2, "retire with a working factory replaces in place");
    }

    #[tokio::test]
    async fn retire_leaves_session_dead_when_replacement_fails() {
        let factory = Arc::new(FakeFactory::new());
        let pool = SessionPool::new(Arc::clone(&factory) as Arc<dyn SessionFactory>, Duration::from_secs(1));
        pool.warm_up(1).await.unwrap();
        let ids = pool.list().await;
        factory.fail_next.store(true, Ordering::SeqCst);
        let result = pool.retire(&ids[0]).await;
        assert!(result.is_err());
        assert!(pool.list().await.is_empty());

        // acquire() also attempts a replacement for a dead entry; if that
        // attempt fails too, the session stays unreachable.
        factory.fail_next.store(true, Ordering::SeqCst);
        assert!(matches!(pool.acquire(&ids[0]).await, Err(PoolError::NoSuchSession(_))));
    }

    #[tokio::test]
    async fn acquire_self_heals_a_dead_session_by_replacing_it() {
        let factory = Arc::new(FakeFactory::new());
        let pool = SessionPool::new(Arc::clone(&factory) as Arc<dyn SessionFactory>, Duration::from_secs(1));
        pool.warm_up(1).await.unwrap();
        let ids = pool.list().await;
        factory.fail_next.store(true, Ordering::SeqCst);
        pool.retire(&ids[0]).await.ok();
        assert!(pool.list().await.is_empty(), "session is dead after the failed retire");

        // The factory is healthy again by the time acquire is called: per
        // the handle-lending contract, acquire replaces the dead entry
        // before lending rather than just surfacing the stale Dead flag.
        let guard = pool.acquire(&ids[0]).await.unwrap();
        assert_eq!(guard.session_id(), ids[0]);
        assert_eq!(pool.list().await.len(), 1);
    }

    #[tokio::test]
    async fn acquire_replaces_a_session_that_fails_its_liveness_probe() {
        struct BrokenThenFixedFactory {
            calls: AtomicUsize,
        }
        #[async_trait]
        impl SessionFactory for BrokenThenFixedFactory {
            async fn create(&self) -> error::Result<Box<dyn GridClient>> {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call == 0 {
                    Ok(Box::new(FakeClient::new().with_broken_probe()))
                } else {
                    Ok(Box::new(FakeClient::new()))
                }
            }
        }

        let pool =
            SessionPool::new(Arc::new(BrokenThenFixedFactory { calls: AtomicUsize::new(0) }), Duration::from_secs(1));
        pool.warm_up(1).await.unwrap();
        let ids = pool.list().await;

        // The first session's probe fails; acquire must replace it with a
        // healthy one rather than lending the broken handle.
        let mut guard = pool.acquire(&ids[0]).await.unwrap();
        assert!(guard.client_mut().current_url().await.is_ok());
    }

    #[tokio::test]
    async fn pick_any_prefers_least_recently_checked() {
        let pool = SessionPool::new(Arc::new(FakeFactory::new()), Duration::from_secs(1));
        pool.warm_up(2).await.unwrap();
        let id = pool.pick_any().await.unwrap();
        assert!(pool.list().await.contains(&id));
    }

    #[tokio::test]
    async fn acquire_unknown_session_fails() {
        let pool = SessionPool::new(Arc::new(FakeFactory::new()), Duration::from_secs(1));
        assert!(matches!(pool.acquire("missing").await, Err(PoolError::NoSuchSession(_))));
    }
}
