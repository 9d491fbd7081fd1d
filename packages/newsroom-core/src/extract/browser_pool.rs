//! Fixed-size pool of headless browser sessions.

use crate::error::{NewsroomError, Result};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct PooledBrowser {
    pub browser: Browser,
}

pub struct BrowserPoolStats {
    pub size: usize,
    pub available: usize,
    pub in_use: usize,
    pub closed: bool,
}

/// A fixed-size channel of stealth-configured headless sessions. `acquire`
/// blocks on receive; `release` is a non-blocking send back into the pool.
pub struct BrowserPool {
    size: usize,
    sender: mpsc::Sender<PooledBrowser>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<PooledBrowser>>,
    in_use: AtomicUsize,
    closed: AtomicBool,
}

impl BrowserPool {
    pub async fn new(size: usize) -> Result<Arc<Self>> {
        let (tx, rx) = mpsc::channel(size);
        for _ in 0..size {
            let browser = launch_stealth_browser().await?;
            tx.send(PooledBrowser { browser })
                .await
                .map_err(|_| NewsroomError::RemoteError("browser pool channel closed during init".into()))?;
        }

        Ok(Arc::new(Self {
            size,
            sender: tx,
            receiver: tokio::sync::Mutex::new(rx),
            in_use: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }))
    }

    /// Blocks on receive, with a 5s acquisition timeout.
    pub async fn acquire(&self) -> Result<PooledBrowser> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NewsroomError::RemoteError("browser pool closed".into()));
        }
        let mut rx = self.receiver.lock().await;
        let result = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        match result {
            Ok(Some(browser)) => {
                self.in_use.fetch_add(1, Ordering::SeqCst);
                Ok(browser)
            }
            Ok(None) => Err(NewsroomError::RemoteError("browser pool closed".into())),
            Err(_) => Err(NewsroomError::Timeout("browser acquisition timed out".into())),
        }
    }

    /// Non-blocking; if the channel is somehow full (should not happen under
    /// normal acquire/release pairing) the browser is dropped rather than
    /// leaked as a stuck waiter.
    pub fn release(&self, browser: PooledBrowser) {
        self.in_use.fetch_sub(1, Ordering::SeqCst);
        let _ = self.sender.try_send(browser);
    }

    pub fn stats(&self) -> BrowserPoolStats {
        let in_use = self.in_use.load(Ordering::SeqCst);
        BrowserPoolStats {
            size: self.size,
            available: self.size.saturating_sub(in_use),
            in_use,
            closed: self.closed.load(Ordering::SeqCst),
        }
    }

    /// Drains and terminates all pooled sessions. Subsequent `acquire` calls
    /// return a closed error.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut rx = self.receiver.lock().await;
        rx.close();
        while let Ok(pooled) = rx.try_recv() {
            drop(pooled.browser);
        }
    }
}

async fn launch_stealth_browser() -> Result<Browser> {
    let config = BrowserConfig::builder()
        .no_sandbox()
        .window_size(1920, 1080)
        .build()
        .map_err(|e| NewsroomError::RemoteError(format!("browser config error: {e}")))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| NewsroomError::RemoteError(format!("browser launch failed: {e}")))?;

    tokio::spawn(async move { while handler.next().await.is_some() {} });

    Ok(browser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_reflect_size_and_initial_availability() {
        // Constructing BrowserPool requires a real Chrome binary, so this
        // only checks the stats arithmetic in isolation.
        let pool = BrowserPool {
            size: 3,
            sender: mpsc::channel(1).0,
            receiver: tokio::sync::Mutex::new(mpsc::channel(1).1),
            in_use: AtomicUsize::new(1),
            closed: AtomicBool::new(false),
        };
        let stats = pool.stats();
        assert_eq!(stats.size, 3);
        assert_eq!(stats.in_use, 1);
        assert_eq!(stats.available, 2);
        assert!(!stats.closed);
    }
}
